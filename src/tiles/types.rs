//! Tile definition types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Widget type of a tile
///
/// Types this server does not know are kept verbatim so an editor can
/// round-trip them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TileKind {
    /// Publishes its payload on its topic when pressed
    Button,
    /// Shows the latest value of its topic
    Text,
    Other(String),
}

impl From<String> for TileKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "button" => TileKind::Button,
            "text" => TileKind::Text,
            _ => TileKind::Other(kind),
        }
    }
}

impl From<TileKind> for String {
    fn from(kind: TileKind) -> Self {
        match kind {
            TileKind::Button => "button".to_string(),
            TileKind::Text => "text".to_string(),
            TileKind::Other(other) => other,
        }
    }
}

/// One dashboard tile
///
/// Both key spellings are kept as separate fields so a document serializes
/// back exactly as it was written. Use the accessors to read the bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileDefinition {
    #[serde(rename = "type")]
    pub kind: TileKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Grid position (1-based in the dashboard grid)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,

    /// Dashboard binding: published to by buttons, watched by text tiles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe_topic: Option<String>,

    /// Editor-specific fields, preserved as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TileDefinition {
    fn blank(kind: TileKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            title: None,
            row: None,
            col: None,
            topic: None,
            payload: None,
            publish_topic: None,
            publish_payload: None,
            subscribe_topic: None,
            extra: Map::new(),
        }
    }

    /// Button in the dashboard's format
    pub fn button(
        name: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            topic: Some(topic.into()),
            payload: Some(payload.into()),
            ..Self::blank(TileKind::Button, name)
        }
    }

    /// Text tile in the dashboard's format
    pub fn text(name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::blank(TileKind::Text, name)
        }
    }

    pub fn at(mut self, row: u32, col: u32) -> Self {
        self.row = Some(row);
        self.col = Some(col);
        self
    }

    /// Display name, whichever key carried it
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or_default()
    }

    /// Topic a button publishes to
    pub fn publish_target(&self) -> Option<&str> {
        self.publish_topic.as_deref().or(self.topic.as_deref())
    }

    /// Payload a button publishes
    pub fn publish_value(&self) -> Option<&str> {
        self.publish_payload.as_deref().or(self.payload.as_deref())
    }

    /// Topic a text tile displays
    pub fn watched_topic(&self) -> Option<&str> {
        self.subscribe_topic.as_deref().or(self.topic.as_deref())
    }

    /// Topic this tile displays or publishes to
    pub fn bound_topic(&self) -> Option<&str> {
        match self.kind {
            TileKind::Button => self.publish_target(),
            _ => self.watched_topic().or(self.publish_target()),
        }
    }

    /// Check the definition carries what its type needs
    pub fn validate(&self) -> Result<(), String> {
        if self.label().trim().is_empty() {
            return Err("tile name cannot be empty".to_string());
        }

        let present = |topic: Option<&str>| topic.is_some_and(|t| !t.is_empty());
        match self.kind {
            TileKind::Button if !present(self.publish_target()) => {
                Err("button tile needs a topic".to_string())
            }
            TileKind::Text if !present(self.watched_topic()) => {
                Err("text tile needs a topic".to_string())
            }
            TileKind::Other(ref kind) if kind.is_empty() => {
                Err("tile type cannot be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}
