//! Alphabetic buckets that group imported documents under folders.

use serde::Serialize;

use crate::error::{Error, Result};

/// One of the four fixed folders grant documents are filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Bucket {
    AtoF,
    GtoL,
    MtoR,
    StoZ,
}

impl Bucket {
    /// All buckets, in folder creation order.
    pub const ALL: [Self; 4] = [Self::AtoF, Self::GtoL, Self::MtoR, Self::StoZ];

    /// Assign a bucket from the first letter of `name`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the name does not start with an ASCII letter.
    pub fn for_name(name: &str) -> Result<Self> {
        let first = name
            .chars()
            .next()
            .filter(char::is_ascii_alphabetic)
            .ok_or_else(|| Error::InvalidName {
                name: name.to_string(),
            })?;

        Ok(match first.to_ascii_uppercase() {
            'A'..='F' => Self::AtoF,
            'G'..='L' => Self::GtoL,
            'M'..='R' => Self::MtoR,
            _ => Self::StoZ,
        })
    }

    /// Folder display name.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AtoF => "A-F",
            Self::GtoL => "G-L",
            Self::MtoR => "M-R",
            Self::StoZ => "S-Z",
        }
    }

    /// Stable folder node id, identical across runs.
    #[must_use]
    pub const fn folder_id(&self) -> &'static str {
        match self {
            Self::AtoF => "bucket-a-f",
            Self::GtoL => "bucket-g-l",
            Self::MtoR => "bucket-m-r",
            Self::StoZ => "bucket-s-z",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
