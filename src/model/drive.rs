//! Drive model for grantdrive.
//!
//! A drive is the root container of a remote document store. The importer
//! only ever holds a cached snapshot of it; the store owns the real thing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Document type tag of the drive document itself.
pub const DRIVE_DOCUMENT_TYPE: &str = "powerhouse/document-drive";

/// Cached snapshot of a remote drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    /// Stable drive identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// URL slug
    #[serde(default)]
    pub slug: Option<String>,

    /// Number of operations in the drive's own log
    #[serde(default)]
    pub revision: u64,

    /// Node tree at `revision`
    #[serde(default)]
    pub state: DriveState,
}

/// The node hierarchy of a drive.
///
/// Nodes keep insertion order on the wire; lookups by id go through an
/// index rebuilt on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DriveStateWire")]
pub struct DriveState {
    nodes: Vec<Node>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct DriveStateWire {
    #[serde(default)]
    nodes: Vec<Node>,
}

impl From<DriveStateWire> for DriveState {
    fn from(wire: DriveStateWire) -> Self {
        Self::from_nodes(wire.nodes)
    }
}

impl DriveState {
    #[must_use]
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id().to_string(), i))
            .collect();
        Self { nodes, index }
    }

    /// All nodes, in the order they were added.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Append a node. Callers check id uniqueness first.
    pub(crate) fn push(&mut self, node: Node) {
        self.index.insert(node.id().to_string(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Find a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).and_then(|&i| self.nodes.get(i))
    }

    /// True if `id` names an existing folder.
    #[must_use]
    pub fn has_folder(&self, id: &str) -> bool {
        matches!(self.node(id), Some(Node::Folder(_)))
    }

    /// Number of folder nodes.
    #[must_use]
    pub fn folder_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Folder(_))).count()
    }

    /// Number of document nodes.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Document(_))).count()
    }
}

/// A node in the drive tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Folder(FolderNode),
    Document(DocumentNode),
}

impl Node {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Folder(f) => &f.id,
            Self::Document(d) => &d.id,
        }
    }

    #[must_use]
    pub fn parent_folder(&self) -> Option<&str> {
        match self {
            Self::Folder(f) => f.parent_folder.as_deref(),
            Self::Document(d) => d.parent_folder.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNode {
    pub id: String,
    pub name: String,
    pub document_type: String,
    #[serde(default)]
    pub parent_folder: Option<String>,
}

/// A document as returned by the existence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub id: String,
    pub document_type: String,
    /// Number of operations in the document log
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub state: serde_json::Value,
}

/// The store's view of a target after a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgment {
    pub target_id: String,
    pub revision: u64,
    pub state: serde_json::Value,
}

impl Acknowledgment {
    /// Decode the acknowledged state into a typed document state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state does not match `T`.
    pub fn state_as<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_value(self.state.clone())?)
    }
}

// ── Attach configuration ─────────────────────────────────────

/// Visibility of a drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SharingType {
    #[default]
    Private,
    Shared,
    Public,
}

/// How a listener receives updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TransmitterType {
    #[default]
    Internal,
    SwitchboardPush,
    PullResponder,
    MatrixConnect,
    RestWebhook,
    SecureConnect,
}

/// Which operations a listener is interested in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerFilter {
    #[serde(default = "wildcard")]
    pub branch: Vec<String>,
    #[serde(default = "wildcard")]
    pub document_id: Vec<String>,
    #[serde(default = "wildcard")]
    pub document_type: Vec<String>,
    #[serde(default = "wildcard")]
    pub scope: Vec<String>,
}

fn wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ListenerFilter {
    fn default() -> Self {
        Self {
            branch: wildcard(),
            document_id: wildcard(),
            document_type: wildcard(),
            scope: wildcard(),
        }
    }
}

/// A listener registered with the drive at attach time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerDescriptor {
    pub listener_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub filter: ListenerFilter,
    #[serde(default)]
    pub transmitter_type: TransmitterType,
    #[serde(default)]
    pub block: bool,
}

/// Settings sent when attaching a remote drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveAttachConfig {
    #[serde(default = "default_true")]
    pub available_offline: bool,
    #[serde(default)]
    pub listeners: Vec<ListenerDescriptor>,
    #[serde(default)]
    pub sharing_type: SharingType,
    /// How often the replica polls the remote, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

pub(crate) const fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for DriveAttachConfig {
    fn default() -> Self {
        Self {
            available_offline: true,
            listeners: Vec::new(),
            sharing_type: SharingType::Private,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// ── Sync notifications ───────────────────────────────────────

/// Replication status reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    InitialSync,
    Syncing,
    Success,
    Conflict,
    Missing,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSync => "INITIAL_SYNC",
            Self::Syncing => "SYNCING",
            Self::Success => "SUCCESS",
            Self::Conflict => "CONFLICT",
            Self::Missing => "MISSING",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(driveId, status)` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub drive_id: String,
    pub status: SyncStatus,
}

impl SyncEvent {
    #[must_use]
    pub fn new(drive_id: impl Into<String>, status: SyncStatus) -> Self {
        Self {
            drive_id: drive_id.into(),
            status,
        }
    }

    /// True if this event releases the import for `drive_id`.
    #[must_use]
    pub fn is_success_for(&self, drive_id: &str) -> bool {
        self.status == SyncStatus::Success && self.drive_id == drive_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_wire_format() {
        let node = Node::Document(DocumentNode {
            id: "doc-1".into(),
            name: "Frank".into(),
            document_type: "x/y".into(),
            parent_folder: Some("bucket-a-f".into()),
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "document");
        assert_eq!(json["documentType"], "x/y");
        assert_eq!(json["parentFolder"], "bucket-a-f");
    }

    #[test]
    fn test_drive_state_index_survives_round_trip() {
        let mut state = DriveState::default();
        for i in 0..3 {
            state.push(Node::Folder(FolderNode {
                id: format!("f{i}"),
                name: format!("F{i}"),
                parent_folder: None,
            }));
        }
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("index").is_none());

        let back: DriveState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
        assert!(back.has_folder("f2"));
        assert!(back.node("f3").is_none());
        assert_eq!(back.nodes()[1].id(), "f1");
    }

    #[test]
    fn test_attach_config_defaults_from_empty_object() {
        let config: DriveAttachConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DriveAttachConfig::default());
        assert!(config.available_offline);
        assert_eq!(config.sharing_type, SharingType::Private);
    }

    #[test]
    fn test_listener_filter_defaults_to_wildcards() {
        let listener: ListenerDescriptor =
            serde_json::from_str(r#"{"listenerId":"l1","block":true}"#).unwrap();
        assert_eq!(listener.filter.scope, vec!["*"]);
        assert_eq!(listener.transmitter_type, TransmitterType::Internal);
        assert!(listener.block);
    }

    #[test]
    fn test_sync_event_matching() {
        let ok = SyncEvent::new("drive-1", SyncStatus::Success);
        assert!(ok.is_success_for("drive-1"));
        assert!(!ok.is_success_for("drive-2"));
        assert!(!SyncEvent::new("drive-1", SyncStatus::Syncing).is_success_for("drive-1"));
    }

    #[test]
    fn test_sync_status_wire_format() {
        let event: SyncEvent =
            serde_json::from_str(r#"{"driveId":"d","status":"INITIAL_SYNC"}"#).unwrap();
        assert_eq!(event.status, SyncStatus::InitialSync);
    }
}
