use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::store::{Id, StoredRecord};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    pub party: Option<String>,
}

impl CandidateCore {
    pub fn new(name: impl Into<String>, party: Option<&str>) -> Self {
        Self {
            name: name.into(),
            party: party.map(str::to_string),
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

const CANDIDATES: &str = "candidates";
impl StoredRecord for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl StoredRecord for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}
