use core::{fmt, str::FromStr};

use crate::{Error, Identifier, Region, Result};

/// How sequence numbers are partitioned across years.
///
/// Identifiers embed their year, but whether the five-digit sequence restarts
/// every year is a deployment decision:
///
/// - [`NumberingScheme::PerRegion`] keeps one counter per region forever. A new
///   year continues where the previous one stopped. This is the default and
///   matches the numbering already issued in the field.
/// - [`NumberingScheme::PerRegionYear`] keeps one counter per region and year,
///   so `2025PT00001` follows `2024PT00731`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NumberingScheme {
    #[default]
    PerRegion,
    PerRegionYear,
}

impl NumberingScheme {
    /// Returns the counter partition an identifier for `(region, year)`
    /// belongs to under this scheme.
    pub const fn partition(self, region: Region, year: u16) -> Partition {
        match self {
            Self::PerRegion => Partition::of_region(region),
            Self::PerRegionYear => Partition::of_region_year(region, year),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerRegion => "per-region",
            Self::PerRegionYear => "per-region-year",
        }
    }
}

impl fmt::Display for NumberingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumberingScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "per-region" => Ok(Self::PerRegion),
            "per-region-year" => Ok(Self::PerRegionYear),
            other => Err(Error::invalid(format!(
                "unknown numbering scheme {other:?}, expected per-region or per-region-year"
            ))),
        }
    }
}

/// The key a sequence counter is kept under.
///
/// Displays as `PT` for a region-wide counter and `PT/2024` for a per-year
/// one; stores that persist counters use that form as their key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition {
    region: Region,
    year: Option<u16>,
}

impl Partition {
    pub const fn of_region(region: Region) -> Self {
        Self { region, year: None }
    }

    pub const fn of_region_year(region: Region, year: u16) -> Self {
        Self {
            region,
            year: Some(year),
        }
    }

    pub const fn region(&self) -> Region {
        self.region
    }

    pub const fn year(&self) -> Option<u16> {
        self.year
    }

    /// Returns `true` if `identifier` is counted under this partition.
    pub fn contains(&self, identifier: &Identifier) -> bool {
        identifier.region() == self.region && self.year.is_none_or(|y| y == identifier.year())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{}/{year:04}", self.region),
            None => write!(f, "{}", self.region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_selects_partition() {
        let pt = Region::new("PT").unwrap();
        assert_eq!(
            NumberingScheme::PerRegion.partition(pt, 2024).to_string(),
            "PT"
        );
        assert_eq!(
            NumberingScheme::PerRegionYear.partition(pt, 2024).to_string(),
            "PT/2024"
        );
    }

    #[test]
    fn scheme_parses_its_own_display() {
        for scheme in [NumberingScheme::PerRegion, NumberingScheme::PerRegionYear] {
            assert_eq!(scheme.to_string().parse::<NumberingScheme>().unwrap(), scheme);
        }
        assert!("yearly".parse::<NumberingScheme>().is_err());
    }

    #[test]
    fn partition_membership() {
        let id: Identifier = "2024PT00010".parse().unwrap();
        let pt = Region::new("PT").unwrap();
        assert!(Partition::of_region(pt).contains(&id));
        assert!(Partition::of_region_year(pt, 2024).contains(&id));
        assert!(!Partition::of_region_year(pt, 2025).contains(&id));
        assert!(!Partition::of_region(Region::new("GR").unwrap()).contains(&id));
    }
}
