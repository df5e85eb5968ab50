//! Raw records as delivered by the external fetchers (issue trackers, chat
//! exports). The pipeline only requires text plus pass-through metadata;
//! everything else is carried along verbatim.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Origin of a batch of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Github,
    Slack,
}

impl SourceKind {
    /// Record type stored in chunk metadata.
    fn record_type(self) -> &'static str {
        match self {
            SourceKind::Github => "issue",
            SourceKind::Slack => "message",
        }
    }

    fn comment_type(self) -> &'static str {
        match self {
            SourceKind::Github => "issue_comment",
            SourceKind::Slack => "thread_reply",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Github => write!(f, "github"),
            SourceKind::Slack => write!(f, "slack"),
        }
    }
}

/// One record from an external source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "text")]
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub comments: Vec<RawComment>,
    /// Source-specific fields passed through into chunk metadata.
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawComment {
    pub id: String,
    #[serde(default, alias = "text")]
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A chunkable unit derived from a record: the record body itself, plus one
/// unit per comment/reply with its own derived record id.
#[derive(Debug, Clone)]
pub struct RecordUnit {
    pub record_id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl RawRecord {
    /// Flatten the record into chunkable units. Empty bodies produce no
    /// unit; comments with empty bodies are skipped the same way.
    pub fn units(&self, kind: SourceKind) -> Vec<RecordUnit> {
        let mut units = Vec::new();

        let text = match (kind, &self.title) {
            (SourceKind::Github, Some(title)) if !title.trim().is_empty() => {
                format!("Issue: {title}\n\n{}", self.body)
            }
            _ => self.body.clone(),
        };

        if !text.trim().is_empty() {
            units.push(RecordUnit {
                record_id: self.id.clone(),
                text,
                metadata: self.base_metadata(kind),
            });
        }

        for comment in &self.comments {
            if comment.body.trim().is_empty() {
                continue;
            }
            let record_id = format!("{}_c{}", self.id, comment.id);
            let mut metadata = self.base_metadata(kind);
            metadata.insert("type".to_string(), kind.comment_type().to_string());
            // Comments chunk under their own record id so their chunk ids
            // never collide with the parent's.
            metadata.insert("id".to_string(), record_id.clone());
            metadata.insert("parent_id".to_string(), self.id.clone());
            metadata.insert("comment_id".to_string(), comment.id.clone());
            if let Some(author) = &comment.author {
                metadata.insert("comment_author".to_string(), author.clone());
            }
            if let Some(created_at) = &comment.created_at {
                metadata.insert("comment_created_at".to_string(), created_at.clone());
            }
            if let Some(url) = &comment.url {
                metadata.insert("comment_url".to_string(), url.clone());
            }
            units.push(RecordUnit {
                record_id,
                text: comment.body.clone(),
                metadata,
            });
        }

        units
    }

    fn base_metadata(&self, kind: SourceKind) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), kind.to_string());
        metadata.insert("type".to_string(), kind.record_type().to_string());
        metadata.insert("id".to_string(), self.id.clone());
        if let Some(title) = &self.title {
            metadata.insert("title".to_string(), title.clone());
        }
        if let Some(author) = &self.author {
            metadata.insert("author".to_string(), author.clone());
        }
        if let Some(created_at) = &self.created_at {
            metadata.insert("created_at".to_string(), created_at.clone());
        }
        if let Some(url) = &self.url {
            metadata.insert("url".to_string(), url.clone());
        }
        for (key, value) in &self.extra {
            metadata.insert(key.clone(), scalar_to_string(value));
        }
        metadata
    }
}

/// Every metadata value must be representable as a string at persistence
/// time; non-scalar extras are JSON-encoded.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
