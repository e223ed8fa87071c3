use std::ops::Deref;

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::{
    aadhaar::Aadhaar,
    store::{Id, StoredRecord},
};

mod code;
mod policy;

pub use code::{Code, ParseError};
pub use policy::{CodeSource, FixedCode, OtpPolicy};

/// An issued one-time password. Every issue is kept; a new request does not
/// invalidate older ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRequestCore {
    pub aadhaar: Aadhaar,
    pub otp: Code,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl OtpRequestCore {
    pub fn new(aadhaar: Aadhaar, otp: Code, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            aadhaar,
            otp,
            expires_at: created_at + ttl,
            verified: false,
            created_at,
        }
    }

    /// Expired strictly after `expires_at`; the expiry instant itself is valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// An OTP request without an ID.
pub type NewOtpRequest = OtpRequestCore;

/// An OTP request from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRequest {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub request: OtpRequestCore,
}

impl Deref for OtpRequest {
    type Target = OtpRequestCore;

    fn deref(&self) -> &Self::Target {
        &self.request
    }
}

impl OtpRequest {
    /// Newest first; requests issued in the same instant fall back to ID order.
    pub fn newest_first() -> Document {
        doc! {
            "created_at": -1,
            "_id": -1,
        }
    }
}

const OTP_REQUESTS: &str = "otp_requests";
impl StoredRecord for OtpRequest {
    const NAME: &'static str = OTP_REQUESTS;
}
impl StoredRecord for NewOtpRequest {
    const NAME: &'static str = OTP_REQUESTS;
}
