//! Upload uniqueness suffixes.

use crate::{UuidError, UuidResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::{fmt, str::FromStr};

/// Upper bound (exclusive) of the random component.
const NONCE_BOUND: u32 = 1_000_000_000;

/// A `<millisecond-timestamp>-<random-int>` token.
///
/// Example: `1718000000123-482913377`
///
/// The timestamp gives human-readable ordering of uploads; the random component separates uploads
/// that land in the same millisecond. Neither part is interpreted when resolving files, so a stale
/// suffix in a catalog record is tolerated by the resolver's structural tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniqueSuffix {
    millis: i64,
    nonce: u32,
}

impl UniqueSuffix {
    /// Generates a suffix from the current time and a random nonce.
    pub fn generate() -> Self {
        Self::at(Utc::now())
    }

    /// Generates a suffix for a given instant with a random nonce.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            millis: now.timestamp_millis(),
            nonce: rand::thread_rng().gen_range(0..NONCE_BOUND),
        }
    }

    /// Builds a suffix from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if the timestamp is negative or the nonce is out of
    /// range.
    pub fn from_parts(millis: i64, nonce: u32) -> UuidResult<Self> {
        if millis < 0 {
            return Err(UuidError::InvalidInput(format!(
                "suffix timestamp must not be negative, got {}",
                millis
            )));
        }
        if nonce >= NONCE_BOUND {
            return Err(UuidError::InvalidInput(format!(
                "suffix nonce must be below {}, got {}",
                NONCE_BOUND, nonce
            )));
        }
        Ok(Self { millis, nonce })
    }

    /// Milliseconds since the Unix epoch.
    pub fn millis(&self) -> i64 {
        self.millis
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }
}

impl fmt::Display for UniqueSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.nonce)
    }
}

impl FromStr for UniqueSuffix {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (millis, nonce) = s
            .split_once('-')
            .ok_or_else(|| UuidError::InvalidInput(format!("invalid suffix format: '{}'", s)))?;
        let millis = millis
            .parse::<i64>()
            .map_err(|e| UuidError::InvalidInput(format!("invalid suffix timestamp '{}': {}", s, e)))?;
        let nonce = nonce
            .parse::<u32>()
            .map_err(|e| UuidError::InvalidInput(format!("invalid suffix nonce '{}': {}", s, e)))?;
        Self::from_parts(millis, nonce)
    }
}
