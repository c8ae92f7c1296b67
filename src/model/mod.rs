//! Data models for grantdrive.
//!
//! This module contains the domain models:
//! - Drive, Node (folders and documents) and the drive attach settings
//! - Sync status notifications
//! - Raw and normalized grant records, and the grant document state

pub mod drive;
pub mod grant;

pub use drive::{
    Acknowledgment, DocumentNode, Drive, DriveAttachConfig, DriveState, FolderNode,
    ListenerDescriptor, ListenerFilter, Node, RemoteDocument, SharingType, SyncEvent, SyncStatus,
    TransmitterType, DRIVE_DOCUMENT_TYPE,
};
pub use grant::{GrantRecordNormalized, GrantRecordRaw, GrantState, GRANT_DOCUMENT_TYPE};
