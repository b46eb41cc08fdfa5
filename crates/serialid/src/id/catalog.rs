use std::collections::{BTreeMap, BTreeSet};

use crate::{Region, Result};

/// The enumerated set of regions an allocator will issue for, with the
/// human-facing names that resolve to each code.
///
/// Names map many-to-one onto codes: both `"Petrolina"` and `"PT"` resolve to
/// `PT`. Lookups ignore case and surrounding whitespace.
///
/// # Example
///
/// ```
/// use serialid::{Region, RegionCatalog};
///
/// let catalog = RegionCatalog::default();
/// assert_eq!(catalog.resolve("Serra Talhada"), Some(Region::new("ST")?));
/// assert_eq!(catalog.resolve(" st "), Some(Region::new("ST")?));
/// assert_eq!(catalog.resolve("Lisboa"), None);
/// # Ok::<(), serialid::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionCatalog {
    regions: BTreeSet<Region>,
    names: BTreeMap<String, Region>,
}

impl RegionCatalog {
    /// Creates an empty catalog.
    pub const fn empty() -> Self {
        Self {
            regions: BTreeSet::new(),
            names: BTreeMap::new(),
        }
    }

    /// Adds `code` to the catalog along with any extra names that should
    /// resolve to it. The code itself always resolves.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if `code` is not a valid
    /// region code.
    pub fn with_region<'a>(
        mut self,
        code: &str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let region = Region::new(code)?;
        self.insert(region, names);
        Ok(self)
    }

    fn insert<'a>(&mut self, region: Region, names: impl IntoIterator<Item = &'a str>) {
        self.regions.insert(region);
        self.names.insert(normalize(region.as_str()), region);
        for name in names {
            self.names.insert(normalize(name), region);
        }
    }

    /// Resolves a name or code to its region.
    pub fn resolve(&self, name: &str) -> Option<Region> {
        self.names.get(&normalize(name)).copied()
    }

    /// Returns `true` if `region` belongs to the catalog.
    pub fn contains(&self, region: Region) -> bool {
        self.regions.contains(&region)
    }

    /// Iterates over the catalog's codes in ascending order.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.regions.iter().copied()
    }

    /// Iterates over every name that resolves to `region`, codes included.
    pub fn names_for(&self, region: Region) -> impl Iterator<Item = &str> + '_ {
        self.names
            .iter()
            .filter(move |(_, r)| **r == region)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Default for RegionCatalog {
    /// The seven regional offices serial numbers are issued for.
    fn default() -> Self {
        const OFFICES: [([u8; 2], &str); 7] = [
            (*b"PT", "Petrolina"),
            (*b"GR", "Garanhuns"),
            (*b"AV", "Arcoverde"),
            (*b"CR", "Caruaru"),
            (*b"RF", "Recife"),
            (*b"ST", "Serra Talhada"),
            (*b"OC", "Ouricuri"),
        ];

        let mut catalog = Self::empty();
        for (code, name) in OFFICES {
            catalog.insert(Region::from_ascii(code), [name]);
        }
        catalog
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
