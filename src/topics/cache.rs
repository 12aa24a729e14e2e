use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Topic → most recent payload
///
/// Last writer wins per topic; no history is kept.
#[derive(Debug, Default)]
pub struct TopicCache {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl TopicCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `payload` as the latest value of `topic`
    pub async fn update(&self, topic: &str, payload: Bytes) {
        let mut entries = self.entries.write().await;
        match entries.get_mut(topic) {
            Some(value) => *value = payload,
            None => {
                entries.insert(topic.to_string(), payload);
            }
        }
    }

    /// Latest payload seen on exactly `topic`
    pub async fn get(&self, topic: &str) -> Option<Bytes> {
        self.entries.read().await.get(topic).cloned()
    }

    /// Point-in-time copy of every entry, ordered by topic
    pub async fn snapshot(&self) -> BTreeMap<String, Bytes> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(topic, payload)| (topic.clone(), payload.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = TopicCache::new();

        for value in ["20.0", "20.5", "21.5"] {
            cache.update("room/temp", Bytes::from(value)).await;
        }

        assert_eq!(cache.get("room/temp").await, Some(Bytes::from("21.5")));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = TopicCache::new();
        assert!(cache.is_empty().await);
        assert_eq!(cache.get("room/temp").await, None);

        cache.update("room/temp", Bytes::from("21.5")).await;
        // Exact match only
        assert_eq!(cache.get("room").await, None);
        assert_eq!(cache.get("room/+").await, None);
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let cache = TopicCache::new();
        cache.update("lamp/state", Bytes::from("off")).await;
        cache.update("door/front", Bytes::from("closed")).await;

        let snapshot = cache.snapshot().await;
        cache.update("lamp/state", Bytes::from("on")).await;

        let topics: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(topics, vec!["door/front", "lamp/state"]);
        assert_eq!(snapshot["lamp/state"], Bytes::from("off"));
        assert_eq!(cache.get("lamp/state").await, Some(Bytes::from("on")));
    }

    #[tokio::test]
    async fn test_concurrent_updates_distinct_topics() {
        let cache = Arc::new(TopicCache::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    cache
                        .update(&format!("sensor/{i}"), Bytes::from(i.to_string()))
                        .await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len().await, 16);
        assert_eq!(cache.get("sensor/7").await, Some(Bytes::from("7")));
    }
}
