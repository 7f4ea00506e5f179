//! Workspace, document and vector records mirrored from remote stores.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local mirror of one remote namespace/collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// Unique within the owning organization.
    pub slug: String,
    pub created_at: Timestamp,
}

/// One ingested file/URL inside a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Externally-visible id correlating many vectors back to one source.
    pub doc_id: Uuid,
    pub workspace_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub created_at: Timestamp,
}

/// Input for creating a document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub doc_id: Uuid,
    pub workspace_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
}

impl NewDocument {
    /// Creates a document input with a fresh correlation id.
    pub fn new(workspace_id: Uuid, organization_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            doc_id: Uuid::new_v4(),
            workspace_id,
            organization_id,
            name: name.into(),
        }
    }
}

/// One row per embedded chunk, linking the remote vector id to its document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVector {
    pub id: Uuid,
    pub doc_id: Uuid,
    pub document_id: Uuid,
    pub workspace_id: Uuid,
    pub organization_id: Uuid,
    /// The remote vector store's own id for this chunk.
    pub vector_id: String,
}

/// Input for creating a document vector row.
#[derive(Debug, Clone)]
pub struct NewDocumentVector {
    pub doc_id: Uuid,
    pub document_id: Uuid,
    pub workspace_id: Uuid,
    pub organization_id: Uuid,
    pub vector_id: String,
}

/// Severity/source marker for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSymbol {
    Info,
    Warning,
    Error,
}

/// Operator-facing notification raised by background jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub text_content: String,
    pub symbol: NotificationSymbol,
    pub link: Option<String>,
    pub seen: bool,
    pub created_at: Timestamp,
}

/// Input for creating a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub organization_id: Uuid,
    pub text_content: String,
    pub symbol: NotificationSymbol,
    pub link: Option<String>,
}

/// Normalizes a workspace name into a URL-safe slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes() {
        assert_eq!(slugify("My Workspace"), "my-workspace");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("already-slugged"), "already-slugged");
        assert_eq!(slugify("Caps_And_Underscores"), "caps-and-underscores");
    }
}
