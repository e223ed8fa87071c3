use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LENGTH: usize = 6;

/// Shown in place of the hidden digits of a masked code.
const MASK: &str = "****";

/// A one-time-password code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code {
    code: [u8; LENGTH],
}

impl Code {
    /// Generate a random code.
    pub fn random() -> Self {
        let mut code = [0; LENGTH];
        let digit_dist = Uniform::from(0..=9);
        let mut rng = rand::thread_rng();
        for digit in &mut code {
            *digit = digit_dist.sample(&mut rng);
        }
        Self { code }
    }

    /// Derive a code from the wall clock: `unix seconds % 900000 + 100000`.
    ///
    /// Anyone who knows roughly when a code was issued can guess it, so this
    /// is for demonstrations only.
    pub fn from_clock(now: DateTime<Utc>) -> Self {
        let number = now.timestamp().rem_euclid(900_000) + 100_000;
        Self::from_number(number as u32)
    }

    /// The last six decimal digits of `number`, zero padded.
    pub fn from_number(mut number: u32) -> Self {
        let mut code = [0; LENGTH];
        for digit in code.iter_mut().rev() {
            *digit = (number % 10) as u8;
            number /= 10;
        }
        Self { code }
    }

    /// The first two digits followed by a fixed mask, e.g. `48****`.
    pub fn masked(&self) -> String {
        let shown = self.code[..2]
            .iter()
            .map(|digit| char::from(b'0' + digit))
            .collect::<String>();
        format!("{shown}{MASK}")
    }
}

impl Deref for Code {
    type Target = [u8; LENGTH];

    fn deref(&self) -> &Self::Target {
        &self.code
    }
}

impl Display for Code {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self
            .code
            .iter()
            .map(|digit| char::from(b'0' + digit))
            .collect::<String>();
        formatter.write_str(&digits)
    }
}

impl FromStr for Code {
    type Err = ParseError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let len = string.chars().count();
        if len != LENGTH {
            return Err(Self::Err::InvalidLength(len));
        }
        let mut code = [0; LENGTH];
        for (digit, c) in code.iter_mut().zip(string.chars()) {
            *digit = c
                .to_digit(10)
                .ok_or(Self::Err::InvalidChar(c))? as u8;
        }
        Ok(Self { code })
    }
}

impl TryFrom<String> for Code {
    type Error = ParseError;

    fn try_from(string: String) -> Result<Self, Self::Error> {
        string.parse()
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.to_string()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("code must contain exactly 6 characters, got {0}")]
    InvalidLength(usize),
    #[error("code must contain only digits, found {0:?}")]
    InvalidChar(char),
}
