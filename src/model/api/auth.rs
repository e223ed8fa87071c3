use chrono::{serde::ts_seconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gate::identity::IssuedOtp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOtpRequest {
    pub aadhaar: String,
}

/// Response to an OTP request. The code itself is included because no SMS is
/// actually sent; a real deployment must never return it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOtpResponse {
    pub message: String,
    pub otp_demo: String,
    pub masked: String,
    /// Unix timestamp (seconds).
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
    pub voter_name: String,
}

impl From<IssuedOtp> for SendOtpResponse {
    fn from(issued: IssuedOtp) -> Self {
        Self {
            message: "OTP sent (demo)".to_string(),
            otp_demo: issued.code.to_string(),
            masked: issued.code.masked(),
            expires_at: issued.expires_at,
            voter_name: issued.voter_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub aadhaar: String,
    pub otp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyFaceRequest {
    pub aadhaar: String,
    /// Base64 image, raw or as a `data:` URI.
    pub image_base64: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyFaceResponse {
    pub message: String,
    /// True if this call enrolled the voter's face rather than matching it.
    pub enrolled: bool,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl SendOtpRequest {
        pub fn example() -> Self {
            Self {
                aadhaar: "111122223333".to_string(),
            }
        }
    }

    impl VerifyFaceRequest {
        pub fn example() -> Self {
            Self {
                aadhaar: "111122223333".to_string(),
                image_base64: "data:image/png;base64,ZmFjZS1vZi1yYXZp".to_string(),
            }
        }
    }
}
