//! Pure reducers: fold one action into a document state.
//!
//! The same reducers run in two places: the importer uses them to build
//! records and their hashes from a cached snapshot, and the local store uses
//! them to apply submitted records.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::action::Action;
use crate::error::Error;
use crate::model::{DocumentNode, DriveState, FolderNode, GrantState, Node};

/// Why an action could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReduceError {
    #[error("{action} is not supported by this document type")]
    Unsupported { action: &'static str },

    #[error("node {0} already exists")]
    DuplicateNode(String),

    #[error("parent {parent} of {child} does not exist")]
    MissingParent { child: String, parent: String },

    #[error("parent {parent} of {child} is not a folder")]
    ParentNotFolder { child: String, parent: String },

    #[error("document is not initialized")]
    NotInitialized,

    #[error("document is already initialized")]
    AlreadyInitialized,

    #[error("editor {0} already present")]
    DuplicateEditor(String),
}

impl ReduceError {
    /// Convert into a crate error for `target`.
    ///
    /// A missing parent is an ordering violation; everything else is an
    /// invalid action.
    #[must_use]
    pub fn into_error(self, target: &str) -> Error {
        match self {
            Self::MissingParent { child, parent } => Error::OrderingViolation { child, parent },
            other => Error::InvalidAction {
                target: target.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// State of a document type that can be built by folding actions.
pub trait DocumentState: Clone + Default + Serialize + DeserializeOwned + Send + Sync {
    /// Apply one action in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the action is invalid for the current state; the
    /// state is left unchanged in that case.
    fn reduce(&mut self, action: &Action) -> Result<(), ReduceError>;
}

impl DocumentState for DriveState {
    fn reduce(&mut self, action: &Action) -> Result<(), ReduceError> {
        let (node, parent) = match action {
            Action::AddFolder(input) => (
                Node::Folder(FolderNode {
                    id: input.id.clone(),
                    name: input.name.clone(),
                    parent_folder: input.parent_folder.clone(),
                }),
                input.parent_folder.as_deref(),
            ),
            Action::AddFile(input) => (
                Node::Document(DocumentNode {
                    id: input.id.clone(),
                    name: input.name.clone(),
                    document_type: input.document_type.clone(),
                    parent_folder: input.parent_folder.clone(),
                }),
                input.parent_folder.as_deref(),
            ),
            other => {
                return Err(ReduceError::Unsupported {
                    action: other.type_name(),
                });
            }
        };

        if self.node(node.id()).is_some() {
            return Err(ReduceError::DuplicateNode(node.id().to_string()));
        }

        if let Some(parent) = parent {
            match self.node(parent) {
                Some(Node::Folder(_)) => {}
                Some(Node::Document(_)) => {
                    return Err(ReduceError::ParentNotFolder {
                        child: node.id().to_string(),
                        parent: parent.to_string(),
                    });
                }
                None => {
                    return Err(ReduceError::MissingParent {
                        child: node.id().to_string(),
                        parent: parent.to_string(),
                    });
                }
            }
        }

        self.push(node);
        Ok(())
    }
}

impl DocumentState for GrantState {
    fn reduce(&mut self, action: &Action) -> Result<(), ReduceError> {
        match action {
            Action::InitGrantee(input) => {
                if self.is_initialized() {
                    return Err(ReduceError::AlreadyInitialized);
                }
                self.grantee_name = Some(input.grantee_name.clone());
                self.start_date = Some(input.start_date.clone());
                self.grant_size = Some(input.grant_size);
                self.matching_grant_size = Some(input.matching_grant_size);
                self.grant_summary = Some(input.grant_summary.clone());
                self.metrics_dashboard_link = Some(input.metrics_dashboard_link.clone());
                self.disbursement_contract_address =
                    Some(input.disbursement_contract_address.clone());
                self.funding_address = Some(input.funding_address.clone());
                self.funding_type.clone_from(&input.funding_type);
                Ok(())
            }
            Action::AddEditor(input) => {
                if !self.is_initialized() {
                    return Err(ReduceError::NotInitialized);
                }
                if self
                    .editor_addresses
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(&input.editor_address))
                {
                    return Err(ReduceError::DuplicateEditor(input.editor_address.clone()));
                }
                self.editor_addresses.push(input.editor_address.clone());
                Ok(())
            }
            other => Err(ReduceError::Unsupported {
                action: other.type_name(),
            }),
        }
    }
}
