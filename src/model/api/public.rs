use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::candidate::Candidate;

/// API-friendly representation of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDesc {
    pub id: String,
    pub name: String,
    pub party: Option<String>,
}

impl From<Candidate> for CandidateDesc {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.to_string(),
            name: candidate.candidate.name,
            party: candidate.candidate.party,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateList {
    pub candidates: Vec<CandidateDesc>,
}

/// One line of the election results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyRow {
    pub candidate_id: String,
    pub name: String,
    pub party: Option<String>,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultList {
    pub results: Vec<TallyRow>,
}

/// Liveness and store check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub backend: String,
    pub database: String,
    /// Record count per collection, empty if the store could not be reached.
    pub collections: BTreeMap<String, u64>,
}
