use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub aadhaar: String,
    pub candidate_id: String,
}

/// Where a voter is in the verification flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterStatus {
    pub aadhaar: String,
    pub name: String,
    pub has_voted: bool,
    pub otp_verified: bool,
    pub face_verified: bool,
}
