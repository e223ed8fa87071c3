use std::{fmt::Display, ops::Deref, str::FromStr};

use phonenumber::PhoneNumber;
use serde::{Deserialize, Serialize};

/// A voter's SMS number, always in international format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sms {
    inner: PhoneNumber,
}

impl Sms {
    /// The number with all but the last two digits hidden, for log lines.
    pub fn masked(&self) -> String {
        let number = self.to_string();
        let visible = number.len().saturating_sub(2);
        number
            .char_indices()
            .map(|(i, c)| if i < visible && c.is_ascii_digit() { '*' } else { c })
            .collect()
    }
}

impl Deref for Sms {
    type Target = PhoneNumber;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Display for Sms {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(formatter)
    }
}

impl FromStr for Sms {
    type Err = phonenumber::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Sms {
            inner: s.parse::<PhoneNumber>()?,
        })
    }
}

impl TryFrom<String> for Sms {
    type Error = phonenumber::ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Sms> for String {
    fn from(sms: Sms) -> Self {
        sms.to_string()
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Sms {
        pub fn example() -> Self {
            "+441234567890".parse().unwrap()
        }
    }
}
