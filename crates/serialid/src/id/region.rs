use core::{fmt, str::FromStr};

use crate::{Error, Result};

/// Number of letters in a region code.
pub const REGION_CODE_LEN: usize = 2;

/// A two-letter region code such as `PT` or `GR`.
///
/// Codes are stored as uppercase ASCII. [`Region::new`] accepts either case
/// and normalizes; anything other than exactly two ASCII letters is rejected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region([u8; REGION_CODE_LEN]);

impl Region {
    /// Parses and normalizes a region code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless `code` is exactly two ASCII
    /// letters.
    pub fn new(code: &str) -> Result<Self> {
        match code.as_bytes() {
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                Ok(Self([a.to_ascii_uppercase(), b.to_ascii_uppercase()]))
            }
            _ => Err(Error::invalid(format!(
                "region code must be exactly {REGION_CODE_LEN} ASCII letters, got {code:?}"
            ))),
        }
    }

    /// Builds a region from two bytes already known to be uppercase letters.
    pub(crate) const fn from_ascii(code: [u8; REGION_CODE_LEN]) -> Self {
        debug_assert!(code[0].is_ascii_uppercase() && code[1].is_ascii_uppercase());
        Self(code)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        core::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Returns the raw code bytes.
    pub const fn as_bytes(&self) -> &[u8; REGION_CODE_LEN] {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Region").field(&self.as_str()).finish()
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Region {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}
