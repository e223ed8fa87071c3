use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::Code;

/// Something that can produce OTP codes.
pub trait CodeSource: Send + Sync {
    fn generate(&self, now: DateTime<Utc>) -> Code;
}

/// The built-in code generation policies, selected by the `otp_policy`
/// config key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpPolicy {
    /// Derived from the current second. Predictable; demo use only.
    #[default]
    Clock,
    /// Six uniformly random digits.
    Random,
}

impl CodeSource for OtpPolicy {
    fn generate(&self, now: DateTime<Utc>) -> Code {
        match self {
            Self::Clock => Code::from_clock(now),
            Self::Random => Code::random(),
        }
    }
}

/// Always hands out the same code.
#[derive(Debug, Clone, Copy)]
pub struct FixedCode(pub Code);

impl CodeSource for FixedCode {
    fn generate(&self, _now: DateTime<Utc>) -> Code {
        self.0
    }
}
