use chrono::{DateTime, Utc};

/// A source of issuance timestamps.
///
/// This abstraction lets tests pin the timestamp written to each issuance
/// record.
///
/// # Example
/// ```
/// use chrono::{DateTime, TimeZone, Utc};
/// use serialid::Clock;
///
/// struct Fixed;
/// impl Clock for Fixed {
///     fn now(&self) -> DateTime<Utc> {
///         Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
///     }
/// }
///
/// assert_eq!(Fixed.now().timestamp(), 1_704_067_200);
/// ```
pub trait Clock {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
