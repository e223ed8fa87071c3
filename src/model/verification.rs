use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    aadhaar::Aadhaar,
    store::{Coll, Id, StoredRecord},
};

/// Per-voter record of which identity checks have passed, and when.
///
/// There is exactly one of these per aadhaar. It is created by whichever
/// check passes first and updated in place afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCore {
    pub aadhaar: Aadhaar,
    pub otp_verified_at: Option<BsonDateTime>,
    pub face_verified_at: Option<BsonDateTime>,
}

impl VerificationCore {
    pub fn otp_verified(&self) -> bool {
        self.otp_verified_at.is_some()
    }

    pub fn face_verified(&self) -> bool {
        self.face_verified_at.is_some()
    }

    /// Both checks have passed, in either order.
    pub fn is_complete(&self) -> bool {
        self.otp_verified() && self.face_verified()
    }
}

/// A verification record from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub verification: VerificationCore,
}

impl Deref for Verification {
    type Target = VerificationCore;

    fn deref(&self) -> &Self::Target {
        &self.verification
    }
}

impl StoredRecord for Verification {
    const NAME: &'static str = "verifications";
}

/// One of the two independent identity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStep {
    Otp,
    Face,
}

impl VerificationStep {
    fn field(self) -> &'static str {
        match self {
            Self::Otp => "otp_verified_at",
            Self::Face => "face_verified_at",
        }
    }
}

/// Record that `step` passed for `aadhaar` at `now`, creating the voter's
/// verification record if needed. The other step's timestamp is untouched.
pub async fn mark_verified(
    verifications: &Coll<Verification>,
    aadhaar: &Aadhaar,
    step: VerificationStep,
    now: DateTime<Utc>,
) -> Result<()> {
    let set = doc! {
        step.field(): BsonDateTime::from_chrono(now),
    };
    verifications.upsert(aadhaar.as_doc(), set).await
}
