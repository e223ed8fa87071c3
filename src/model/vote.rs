use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    aadhaar::Aadhaar,
    store::{Id, StoredRecord},
};

/// A recorded ballot. Votes are only ever appended, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub aadhaar: Aadhaar,
    /// Foreign key candidate ID.
    pub candidate_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoteCore {
    pub fn new(aadhaar: Aadhaar, candidate_id: Id) -> Self {
        Self {
            aadhaar,
            candidate_id,
            created_at: Utc::now(),
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

const VOTES: &str = "votes";
impl StoredRecord for Vote {
    const NAME: &'static str = VOTES;
}
impl StoredRecord for NewVote {
    const NAME: &'static str = VOTES;
}
