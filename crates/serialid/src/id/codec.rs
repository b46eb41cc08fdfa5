//! Fixed-width text codec for serial numbers.
//!
//! The layout is `YEAR(4) REGION(2) SEQUENCE(5)`, all ASCII, with the numeric
//! fields zero-padded. [`format`] and [`parse`] are exact inverses over every
//! valid input.

use crate::{Error, IDENTIFIER_LEN, Identifier, MAX_SEQUENCE, MAX_YEAR, Region, Result};

const YEAR_DIGITS: usize = 4;
const SEQUENCE_DIGITS: usize = 5;

/// Renders `{year, region, sequence}` as `YYYYRRNNNNN`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `sequence > 99999`, `year > 9999`, or
/// `region` is not exactly two ASCII letters.
///
/// # Example
///
/// ```
/// assert_eq!(serialid::format(2024, "PT", 42)?, "2024PT00042");
/// # Ok::<(), serialid::Error>(())
/// ```
pub fn format(year: u16, region: &str, sequence: u32) -> Result<String> {
    let region = Region::new(region)?;
    Ok(Identifier::new(year, region, sequence)?.to_string())
}

/// Parses `YYYYRRNNNNN` back into an [`Identifier`].
///
/// The region must already be uppercase: only the canonical rendering is
/// accepted, so `format(parse(s)) == s` for every accepted `s`.
///
/// # Errors
///
/// Returns [`Error::MalformedIdentifier`] if the length or any field does not
/// match the layout.
pub fn parse(input: &str) -> Result<Identifier> {
    let bytes = input.as_bytes();
    if bytes.len() != IDENTIFIER_LEN {
        return Err(Error::malformed(input, "expected exactly 11 characters"));
    }

    let (year, rest) = bytes.split_at(YEAR_DIGITS);
    let (region, sequence) = rest.split_at(IDENTIFIER_LEN - YEAR_DIGITS - SEQUENCE_DIGITS);

    let year = parse_digits(year).ok_or_else(|| Error::malformed(input, "year must be 4 digits"))?;
    let region = match *region {
        [a, b] if a.is_ascii_uppercase() && b.is_ascii_uppercase() => Region::from_ascii([a, b]),
        _ => return Err(Error::malformed(input, "region must be 2 uppercase letters")),
    };
    let sequence = parse_digits(sequence)
        .ok_or_else(|| Error::malformed(input, "sequence must be 5 digits"))?;

    debug_assert!(year <= u32::from(MAX_YEAR) && sequence <= MAX_SEQUENCE);
    // Four decimal digits always fit in a u16.
    let year = u16::try_from(year).map_err(|_| Error::malformed(input, "year out of range"))?;
    Ok(Identifier::from_parts(year, region, sequence))
}

fn parse_digits(digits: &[u8]) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, &b| {
        b.is_ascii_digit().then(|| acc * 10 + u32::from(b - b'0'))
    })
}
