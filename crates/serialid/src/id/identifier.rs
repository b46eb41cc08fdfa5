use core::{fmt, str::FromStr};

use crate::{Error, Region, Result, id::codec};

/// Largest sequence number that fits the five-digit field.
pub const MAX_SEQUENCE: u32 = 99_999;

/// Largest year that fits the four-digit field.
pub const MAX_YEAR: u16 = 9_999;

/// Length of the rendered identifier: `YYYY` + `RR` + `NNNNN`.
pub const IDENTIFIER_LEN: usize = 11;

/// An issued serial number: `{year, region, sequence}`.
///
/// The string form is the fixed-width concatenation `YYYYRRNNNNN`, for example
/// `2024PT00001`. Identifiers order by year, then region, then sequence, which
/// matches the lexicographic order of their string form.
///
/// # Example
///
/// ```
/// use serialid::{Identifier, Region};
///
/// let id = Identifier::new(2024, Region::new("PT")?, 1)?;
/// assert_eq!(id.to_string(), "2024PT00001");
/// assert_eq!("2024PT00001".parse::<Identifier>()?, id);
/// # Ok::<(), serialid::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    year: u16,
    region: Region,
    sequence: u32,
}

impl Identifier {
    /// Creates an identifier from its components.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `year` exceeds [`MAX_YEAR`] or
    /// `sequence` exceeds [`MAX_SEQUENCE`].
    pub fn new(year: u16, region: Region, sequence: u32) -> Result<Self> {
        if year > MAX_YEAR {
            return Err(Error::invalid(format!(
                "year {year} does not fit in four digits"
            )));
        }
        if sequence > MAX_SEQUENCE {
            return Err(Error::invalid(format!(
                "sequence {sequence} does not fit in five digits"
            )));
        }
        Ok(Self::from_parts(year, region, sequence))
    }

    pub(crate) const fn from_parts(year: u16, region: Region, sequence: u32) -> Self {
        Self {
            year,
            region,
            sequence,
        }
    }

    pub const fn year(&self) -> u16 {
        self.year
    }

    pub const fn region(&self) -> Region {
        self.region
    }

    pub const fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{}{:05}", self.year, self.region, self.sequence)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identifier")
            .field("year", &self.year)
            .field("region", &self.region.as_str())
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        codec::parse(s)
    }
}
