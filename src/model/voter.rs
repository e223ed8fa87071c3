use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    aadhaar::Aadhaar,
    face::FaceDigest,
    sms::Sms,
    store::{Id, StoredRecord},
};

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Unique natural key.
    pub aadhaar: Aadhaar,
    pub name: String,
    pub phone: Sms,
    /// Digest of the enrolled face image; written once, on first face check.
    pub face_hash: Option<FaceDigest>,
    /// Flips to true exactly once, when the voter's ballot is recorded.
    pub has_voted: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoterCore {
    /// A freshly registered voter: no face enrolled, not yet voted.
    pub fn new(aadhaar: Aadhaar, name: impl Into<String>, phone: Sms) -> Self {
        Self {
            aadhaar,
            name: name.into(),
            phone,
            face_hash: None,
            has_voted: false,
            created_at: Utc::now(),
        }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

const VOTERS: &str = "voters";
impl StoredRecord for Voter {
    const NAME: &'static str = VOTERS;
}
impl StoredRecord for NewVoter {
    const NAME: &'static str = VOTERS;
}
