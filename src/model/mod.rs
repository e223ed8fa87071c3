//! Records held in the store, the value types they are built from, and the
//! request/response bodies of the HTTP API.

pub mod aadhaar;
pub mod api;
pub mod candidate;
pub mod face;
pub mod otp;
pub mod sms;
pub mod store;
pub mod verification;
pub mod vote;
pub mod voter;
