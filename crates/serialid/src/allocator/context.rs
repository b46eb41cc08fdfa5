use std::collections::BTreeSet;

use crate::{Principal, Region};

/// The regions a principal may allocate for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizedRegions {
    /// Every region in the catalog.
    All,
    /// Only the listed regions.
    Only(BTreeSet<Region>),
}

impl AuthorizedRegions {
    pub fn permits(&self, region: Region) -> bool {
        match self {
            Self::All => true,
            Self::Only(regions) => regions.contains(&region),
        }
    }
}

impl FromIterator<Region> for AuthorizedRegions {
    fn from_iter<I: IntoIterator<Item = Region>>(iter: I) -> Self {
        Self::Only(iter.into_iter().collect())
    }
}

/// Who is asking, and for which regions they are allowed to ask.
///
/// Passed explicitly to every allocation; the allocator keeps no session
/// state between calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationContext {
    principal: Principal,
    authorized: AuthorizedRegions,
}

impl AllocationContext {
    pub const fn new(principal: Principal, authorized: AuthorizedRegions) -> Self {
        Self {
            principal,
            authorized,
        }
    }

    pub const fn principal(&self) -> &Principal {
        &self.principal
    }

    pub const fn authorized(&self) -> &AuthorizedRegions {
        &self.authorized
    }

    pub fn permits(&self, region: Region) -> bool {
        self.authorized.permits(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_permits_listed_regions() {
        let pt = Region::new("PT").unwrap();
        let gr = Region::new("GR").unwrap();
        let authorized: AuthorizedRegions = [pt].into_iter().collect();

        assert!(authorized.permits(pt));
        assert!(!authorized.permits(gr));
        assert!(AuthorizedRegions::All.permits(gr));
        assert!(!AuthorizedRegions::Only(BTreeSet::new()).permits(pt));
    }
}
