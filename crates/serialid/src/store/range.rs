use core::{fmt, ops::RangeInclusive};

use crate::{Error, Identifier, MAX_SEQUENCE, MAX_YEAR, Partition, Region, Result};

/// A contiguous, inclusive block of sequence numbers claimed in one
/// reservation. Never empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SequenceRange {
    first: u32,
    last: u32,
}

impl SequenceRange {
    /// Creates a range `first..=last`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless
    /// `1 <= first <= last <= MAX_SEQUENCE`.
    pub fn new(first: u32, last: u32) -> Result<Self> {
        if first == 0 || first > last || last > MAX_SEQUENCE {
            return Err(Error::invalid(format!(
                "sequence range {first}..={last} is not within 1..={MAX_SEQUENCE}"
            )));
        }
        Ok(Self { first, last })
    }

    /// Plans the block of `count` numbers that follows `highest` in
    /// `partition`.
    ///
    /// Every store computes its reservation through this so that quantity and
    /// capacity checks are identical everywhere.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidQuantity`] if `count` is zero.
    /// - [`Error::CapacityExceeded`] if the block would end past
    ///   [`MAX_SEQUENCE`].
    pub fn next_block(partition: &Partition, highest: u32, count: u32) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidQuantity {
                requested: count,
                max: MAX_SEQUENCE,
            });
        }
        match highest.checked_add(count) {
            Some(last) if last <= MAX_SEQUENCE => Ok(Self {
                first: highest + 1,
                last,
            }),
            _ => Err(Error::CapacityExceeded {
                partition: *partition,
                highest,
                requested: count,
            }),
        }
    }

    pub const fn first(&self) -> u32 {
        self.first
    }

    pub const fn last(&self) -> u32 {
        self.last
    }

    /// Number of sequence numbers in the block.
    pub const fn count(&self) -> u32 {
        self.last - self.first + 1
    }

    pub const fn contains(&self, sequence: u32) -> bool {
        self.first <= sequence && sequence <= self.last
    }

    pub const fn overlaps(&self, other: &Self) -> bool {
        self.first <= other.last && other.first <= self.last
    }

    /// Iterates the block in ascending order.
    pub fn iter(&self) -> RangeInclusive<u32> {
        self.first..=self.last
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}..={:05}", self.first, self.last)
    }
}

impl IntoIterator for SequenceRange {
    type Item = u32;
    type IntoIter = RangeInclusive<u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A committed block together with what is needed to render it: the
/// partition it was taken from and the year stamped on its identifiers.
///
/// Once a store hands one out the block is consumed for good. An allocation
/// that fails before every identifier is recorded returns its reservation so
/// the ledger can be completed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Reservation {
    partition: Partition,
    year: u16,
    range: SequenceRange,
}

impl Reservation {
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `year` exceeds [`MAX_YEAR`] or
    /// disagrees with a per-year `partition`.
    pub fn new(partition: Partition, year: u16, range: SequenceRange) -> Result<Self> {
        if year > MAX_YEAR {
            return Err(Error::invalid(format!(
                "year {year} does not fit in four digits"
            )));
        }
        if partition.year().is_some_and(|y| y != year) {
            return Err(Error::invalid(format!(
                "year {year} does not belong to partition {partition}"
            )));
        }
        Ok(Self {
            partition,
            year,
            range,
        })
    }

    pub const fn partition(&self) -> Partition {
        self.partition
    }

    pub const fn region(&self) -> Region {
        self.partition.region()
    }

    pub const fn year(&self) -> u16 {
        self.year
    }

    pub const fn range(&self) -> SequenceRange {
        self.range
    }

    /// Renders the reserved block as identifiers, ascending.
    pub fn identifiers(&self) -> impl Iterator<Item = Identifier> + use<> {
        let (year, region) = (self.year, self.region());
        self.range
            .iter()
            .map(move |sequence| Identifier::from_parts(year, region, sequence))
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.partition, self.year, self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt() -> Partition {
        Partition::of_region(Region::new("PT").unwrap())
    }

    #[test]
    fn next_block_follows_highest() {
        let range = SequenceRange::next_block(&pt(), 0, 3).unwrap();
        assert_eq!((range.first(), range.last(), range.count()), (1, 3, 3));

        let range = SequenceRange::next_block(&pt(), 3, 2).unwrap();
        assert_eq!((range.first(), range.last()), (4, 5));
    }

    #[test]
    fn next_block_rejects_zero_and_overflow() {
        assert!(matches!(
            SequenceRange::next_block(&pt(), 0, 0),
            Err(Error::InvalidQuantity { requested: 0, .. })
        ));
        assert!(matches!(
            SequenceRange::next_block(&pt(), MAX_SEQUENCE, 1),
            Err(Error::CapacityExceeded {
                highest: MAX_SEQUENCE,
                requested: 1,
                ..
            })
        ));
        assert!(SequenceRange::next_block(&pt(), MAX_SEQUENCE - 1, 1).is_ok());
        assert!(SequenceRange::next_block(&pt(), u32::MAX, 1).is_err());
    }

    #[test]
    fn overlap_detection() {
        let a = SequenceRange::new(1, 5).unwrap();
        let b = SequenceRange::new(5, 9).unwrap();
        let c = SequenceRange::new(6, 9).unwrap();
        assert!(a.overlaps(&b) && b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(SequenceRange::new(0, 1).is_err());
        assert!(SequenceRange::new(3, 2).is_err());
    }

    #[test]
    fn reservation_renders_identifiers() {
        let pt = Region::new("PT").unwrap();
        let reservation = Reservation::new(
            Partition::of_region(pt),
            2024,
            SequenceRange::new(7, 9).unwrap(),
        )
        .unwrap();
        let rendered: Vec<_> = reservation.identifiers().map(|id| id.to_string()).collect();
        assert_eq!(rendered, ["2024PT00007", "2024PT00008", "2024PT00009"]);
    }

    #[test]
    fn reservation_year_must_match_partition() {
        let pt = Region::new("PT").unwrap();
        let range = SequenceRange::new(1, 1).unwrap();
        assert!(Reservation::new(Partition::of_region_year(pt, 2024), 2025, range).is_err());
        assert!(Reservation::new(Partition::of_region_year(pt, 2024), 2024, range).is_ok());
    }
}
