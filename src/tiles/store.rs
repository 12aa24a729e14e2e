//! Tile Store
//!
//! In-memory layout backed by a JSON document. `replace` writes the new
//! document next to the old one and renames it into place while holding the
//! write lock, and only swaps the in-memory layout once that succeeded.

use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::error::{TileError, TileResult};
use super::types::TileDefinition;

/// Ordered collection of tile definitions
#[derive(Debug)]
pub struct TileStore {
    path: PathBuf,
    tiles: RwLock<Vec<TileDefinition>>,
}

impl TileStore {
    /// Load the layout document at `path`
    ///
    /// A missing document yields an empty layout; it is created on the first
    /// `replace`.
    pub async fn load(path: impl Into<PathBuf>) -> TileResult<Self> {
        let path = path.into();

        let tiles = match tokio::fs::read(&path).await {
            Ok(content) => {
                serde_json::from_slice::<Vec<TileDefinition>>(&content).map_err(|e| {
                    TileError::Load {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Tile layout {:?} not found, starting with an empty layout", path);
                Vec::new()
            }
            Err(e) => {
                return Err(TileError::Load {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        tracing::info!(tiles = tiles.len(), "Loaded tile layout from {:?}", path);
        Ok(Self::with_tiles(path, tiles))
    }

    /// Create a store around an existing layout without touching the disk
    pub fn with_tiles(path: impl Into<PathBuf>, tiles: Vec<TileDefinition>) -> Self {
        Self {
            path: path.into(),
            tiles: RwLock::new(tiles),
        }
    }

    /// Current layout, in order
    pub async fn list(&self) -> Vec<TileDefinition> {
        self.tiles.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.tiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tiles.read().await.is_empty()
    }

    /// Replace the whole layout and persist it
    ///
    /// On any error the stored layout is left exactly as it was.
    pub async fn replace(&self, tiles: Vec<TileDefinition>) -> TileResult<()> {
        for (index, tile) in tiles.iter().enumerate() {
            tile.validate()
                .map_err(|reason| TileError::Invalid { index, reason })?;
        }

        let document = serde_json::to_vec_pretty(&tiles).map_err(|e| TileError::Persist {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        // Readers wait here rather than observe a layout that is not on disk yet
        let mut current = self.tiles.write().await;

        write_atomically(&self.path, &document)
            .await
            .map_err(|e| TileError::Persist {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(tiles = tiles.len(), "Saved tile layout to {:?}", self.path);
        *current = tiles;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write to a sibling temp file, then rename over `path`
async fn write_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, content).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileKind;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn sample_layout() -> Vec<TileDefinition> {
        vec![
            TileDefinition::button("Lamp on", "lamp/cmd", "on").at(1, 1),
            TileDefinition::button("Lamp off", "lamp/cmd", "off").at(1, 2),
            TileDefinition::text("Temperature", "room/temp").at(2, 1),
        ]
    }

    #[tokio::test]
    async fn test_load_missing_document() {
        let dir = tempdir().unwrap();
        let store = TileStore::load(dir.path().join("tiles.json")).await.unwrap();

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_load_existing_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        std::fs::write(
            &path,
            r#"[
                {"type": "button", "title": "On", "publish_topic": "lamp/cmd", "publish_payload": "on"},
                {"type": "text", "name": "Temp", "topic": "room/temp", "row": 1, "col": 2}
            ]"#,
        )
        .unwrap();

        let store = TileStore::load(&path).await.unwrap();
        let tiles = store.list().await;

        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].kind, TileKind::Button);
        assert_eq!(tiles[0].label(), "On");
        assert_eq!(tiles[0].publish_target(), Some("lamp/cmd"));
        assert_eq!(tiles[1].watched_topic(), Some("room/temp"));
    }

    #[tokio::test]
    async fn test_dashboard_document_served_as_stored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        let document = serde_json::json!([
            {"type": "button", "name": "On", "topic": "lamp/cmd", "payload": "on", "row": 1, "col": 1},
            {"type": "button", "name": "Off", "topic": "lamp/cmd", "payload": "off", "row": 1, "col": 2},
            {"type": "text", "name": "Temperature", "topic": "room/temp", "row": 2, "col": 1}
        ]);
        std::fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();

        let store = TileStore::load(&path).await.unwrap();
        let served = serde_json::to_value(store.list().await).unwrap();
        assert_eq!(served, document);
        assert_eq!(served[0]["topic"], "lamp/cmd");
        assert_eq!(served[0]["payload"], "on");

        store.replace(store.list().await).await.unwrap();
        let on_disk: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk, document);
    }

    #[tokio::test]
    async fn test_load_corrupt_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        std::fs::write(&path, "[{\"type\": ").unwrap();

        let err = TileStore::load(&path).await.unwrap_err();
        assert!(matches!(err, TileError::Load { .. }));
    }

    #[tokio::test]
    async fn test_replace_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        let store = TileStore::load(&path).await.unwrap();

        store.replace(sample_layout()).await.unwrap();
        assert_eq!(store.list().await, sample_layout());

        let reloaded = TileStore::load(&path).await.unwrap();
        assert_eq!(reloaded.list().await, sample_layout());
        assert!(!dir.path().join("tiles.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_replace_is_not_a_merge() {
        let dir = tempdir().unwrap();
        let store = TileStore::with_tiles(dir.path().join("tiles.json"), sample_layout());

        let replacement = vec![TileDefinition::text("Humidity", "room/humidity")];
        store.replace(replacement.clone()).await.unwrap();
        assert_eq!(store.list().await, replacement);

        store.replace(Vec::new()).await.unwrap();
        assert!(store.list().await.is_empty());

        let on_disk = std::fs::read_to_string(dir.path().join("tiles.json")).unwrap();
        assert_eq!(on_disk.trim(), "[]");
    }

    #[tokio::test]
    async fn test_persist_failure_leaves_layout_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("tiles.json");
        let store = TileStore::with_tiles(&path, sample_layout());

        let err = store
            .replace(vec![TileDefinition::text("Humidity", "room/humidity")])
            .await
            .unwrap_err();

        assert!(matches!(err, TileError::Persist { .. }));
        assert_eq!(store.list().await, sample_layout());
    }

    #[tokio::test]
    async fn test_invalid_definition_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        let store = TileStore::with_tiles(&path, sample_layout());

        let mut broken = TileDefinition::button("Broken", "x", "y");
        broken.topic = None;
        let err = store
            .replace(vec![TileDefinition::text("Ok", "a/b"), broken])
            .await
            .unwrap_err();

        assert!(matches!(err, TileError::Invalid { index: 1, .. }));
        assert_eq!(store.list().await, sample_layout());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_reads_see_whole_layouts() {
        let dir = tempdir().unwrap();
        let store = Arc::new(TileStore::with_tiles(
            dir.path().join("tiles.json"),
            sample_layout(),
        ));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    for _ in 0..50 {
                        let len = store.list().await.len();
                        assert!(len == 3 || len == 1 || len == 0, "partial layout of {len}");
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for round in 0..20 {
            let layout = match round % 3 {
                0 => Vec::new(),
                1 => vec![TileDefinition::text("Humidity", "room/humidity")],
                _ => sample_layout(),
            };
            store.replace(layout).await.unwrap();
        }

        for reader in readers {
            reader.await.unwrap();
        }
    }
}
