//! Actions carried by mutation records, and the intents that expand into them.

use serde::{Deserialize, Serialize};

use crate::model::GrantRecordNormalized;

/// One state change, as it appears on the wire.
///
/// Serialized adjacently tagged: `{"type":"ADD_FOLDER","input":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "input", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    AddFolder(AddFolderInput),
    AddFile(AddFileInput),
    InitGrantee(InitGranteeInput),
    AddEditor(AddEditorInput),
}

impl Action {
    /// Wire name of the action type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::AddFolder(_) => "ADD_FOLDER",
            Self::AddFile(_) => "ADD_FILE",
            Self::InitGrantee(_) => "INIT_GRANTEE",
            Self::AddEditor(_) => "ADD_EDITOR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFolderInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFileInput {
    pub id: String,
    pub name: String,
    pub document_type: String,
    #[serde(default)]
    pub parent_folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitGranteeInput {
    pub grantee_name: String,
    pub start_date: String,
    pub grant_size: f64,
    pub matching_grant_size: f64,
    pub grant_summary: String,
    pub metrics_dashboard_link: String,
    pub disbursement_contract_address: String,
    pub funding_address: String,
    #[serde(default)]
    pub funding_type: Vec<String>,
}

impl From<&GrantRecordNormalized> for InitGranteeInput {
    fn from(record: &GrantRecordNormalized) -> Self {
        Self {
            grantee_name: record.grantee_name.clone(),
            start_date: record.start_date.clone(),
            grant_size: record.grant_size,
            matching_grant_size: record.matching_grant_size,
            grant_summary: record.grant_summary.clone(),
            metrics_dashboard_link: record.metrics_dashboard_link.clone(),
            disbursement_contract_address: record.disbursement_contract_address.clone(),
            funding_address: record.funding_address.clone(),
            funding_type: record.funding_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEditorInput {
    pub editor_address: String,
}

/// What the importer wants to happen to one target.
///
/// An intent expands into one or more actions; each becomes one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    AddFolder(AddFolderInput),
    AddDocument(AddFileInput),
    /// `INIT_GRANTEE` followed by one `ADD_EDITOR` per editor, in order.
    InitializeGrant {
        grant: InitGranteeInput,
        editors: Vec<String>,
    },
}

impl Intent {
    /// Build the initialize intent for a normalized grant.
    #[must_use]
    pub fn initialize_grant(record: &GrantRecordNormalized) -> Self {
        Self::InitializeGrant {
            grant: record.into(),
            editors: record.authorized_signer_addresses.clone(),
        }
    }

    /// The actions this intent produces, in application order.
    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        match self {
            Self::AddFolder(input) => vec![Action::AddFolder(input.clone())],
            Self::AddDocument(input) => vec![Action::AddFile(input.clone())],
            Self::InitializeGrant { grant, editors } => {
                let mut actions = Vec::with_capacity(1 + editors.len());
                actions.push(Action::InitGrantee(grant.clone()));
                actions.extend(editors.iter().map(|address| {
                    Action::AddEditor(AddEditorInput {
                        editor_address: address.clone(),
                    })
                }));
                actions
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format() {
        let action = Action::AddEditor(AddEditorInput {
            editor_address: "0xabc".into(),
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "ADD_EDITOR");
        assert_eq!(json["input"]["editorAddress"], "0xabc");

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back.type_name(), "ADD_EDITOR");
    }

    #[test]
    fn test_initialize_intent_expands_in_editor_order() {
        let intent = Intent::InitializeGrant {
            grant: InitGranteeInput {
                grantee_name: "Frank".into(),
                start_date: "2024-06-03T00:00:00.000Z".into(),
                grant_size: 1.0,
                matching_grant_size: 0.0,
                grant_summary: String::new(),
                metrics_dashboard_link: String::new(),
                disbursement_contract_address: "0x1".into(),
                funding_address: "0x2".into(),
                funding_type: Vec::new(),
            },
            editors: vec!["0xa".into(), "0xb".into()],
        };

        let types: Vec<_> = intent.actions().iter().map(Action::type_name).collect();
        assert_eq!(types, vec!["INIT_GRANTEE", "ADD_EDITOR", "ADD_EDITOR"]);
        match &intent.actions()[2] {
            Action::AddEditor(input) => assert_eq!(input.editor_address, "0xb"),
            other => panic!("unexpected action {other:?}"),
        }
    }
}
