//! The checks a voter passes through, in order: identity (OTP), face, and
//! finally the vote itself. Each gate borrows the store it works against.

pub mod face;
pub mod identity;
pub mod tally;
pub mod voting;

pub use face::{FaceGate, FaceOutcome};
pub use identity::{IdentityGate, IssuedOtp};
pub use tally::TallyEngine;
pub use voting::VotingGate;
