//! Census tract GEOID handling.
//!
//! Tract GEOIDs are 11 digits: state FIPS (2) + county FIPS (3) + tract
//! code (6). Spreadsheet round trips routinely strip the leading zero of
//! low-numbered states, so ids shorter than 11 digits are left-padded.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a raw string is not a usable tract GEOID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TractIdError {
    #[error("empty tract id")]
    Empty,

    #[error("tract id {raw:?} contains non-digit characters")]
    NonDigit { raw: String },

    #[error("tract id {raw:?} is longer than {} digits", TractId::LEN)]
    TooLong { raw: String },
}

/// A validated, zero-padded 11-character census tract GEOID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TractId(String);

impl TractId {
    pub const LEN: usize = 11;

    /// Parses and left-pads a tract GEOID.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty, has non-digit characters, or
    /// has more than [`TractId::LEN`] digits.
    pub fn parse(raw: &str) -> Result<Self, TractIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TractIdError::Empty);
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TractIdError::NonDigit {
                raw: raw.to_string(),
            });
        }
        if trimmed.len() > Self::LEN {
            return Err(TractIdError::TooLong {
                raw: raw.to_string(),
            });
        }
        Ok(Self(format!("{trimmed:0>width$}", width = Self::LEN)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-digit state FIPS prefix.
    #[must_use]
    pub fn state_fips(&self) -> &str {
        &self.0[..2]
    }

    /// Five-digit county GEOID prefix.
    #[must_use]
    pub fn county_geoid(&self) -> &str {
        &self.0[..5]
    }
}

impl fmt::Display for TractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TractId {
    type Error = TractIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TractId> for String {
    fn from(value: TractId) -> Self {
        value.0
    }
}
