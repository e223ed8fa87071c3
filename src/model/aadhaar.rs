use std::fmt::Display;

use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

/// The natural key identifying a voter. Treated as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aadhaar(String);

impl Aadhaar {
    pub fn new(aadhaar: impl Into<String>) -> Self {
        Self(aadhaar.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A filter selecting the records belonging to this aadhaar.
    pub fn as_doc(&self) -> Document {
        doc! {
            "aadhaar": self.as_str(),
        }
    }
}

impl Display for Aadhaar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Aadhaar {
    fn from(aadhaar: &str) -> Self {
        Self::new(aadhaar)
    }
}
