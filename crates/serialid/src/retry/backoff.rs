use core::time::Duration;

use rand::{Rng, rng};

use crate::{Error, Result, RetryPolicy};

/// What a single try of a retried operation produced.
pub(crate) enum Outcome<T> {
    /// The operation committed.
    Done(T),
    /// The operation lost a race; try again no sooner than the hint.
    Wait(Duration),
}

/// Attempt bookkeeping for one retried call.
pub(crate) struct Backoff<'a> {
    policy: &'a RetryPolicy,
    attempts: u32,
}

impl<'a> Backoff<'a> {
    pub(crate) const fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Records a failed try and returns how long to wait before the next one,
    /// or `None` once the attempt budget is spent.
    fn next_delay(&mut self, hint: Duration) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        Some(hint.max(jitter(self.policy.delay_for(self.attempts))))
    }

    /// Folds one try's result into the retry decision.
    ///
    /// Terminal errors pass straight through. Transient errors and lost races
    /// become [`Outcome::Wait`] until the budget runs out, after which the last
    /// transient error, or `exhausted(attempts)` for a lost race, is returned.
    pub(crate) fn settle<T>(
        &mut self,
        result: Result<Outcome<T>>,
        exhausted: &impl Fn(u32) -> Error,
    ) -> Result<Outcome<T>> {
        let delay = match result {
            Ok(Outcome::Done(value)) => return Ok(Outcome::Done(value)),
            Ok(Outcome::Wait(hint)) => self
                .next_delay(hint)
                .ok_or_else(|| exhausted(self.attempts))?,
            Err(err) if err.is_transient() => match self.next_delay(Duration::ZERO) {
                Some(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(attempt = self.attempts, ?delay, error = %err, "retrying after transient failure");
                    delay
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        };
        Ok(Outcome::Wait(delay))
    }
}

fn jitter(delay: Duration) -> Duration {
    let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rng().random_range(nanos / 2..=nanos))
}

/// Runs `op` until it commits, blocking the thread between tries.
pub(crate) fn run_blocking<T>(
    policy: &RetryPolicy,
    exhausted: impl Fn(u32) -> Error,
    mut op: impl FnMut() -> Result<Outcome<T>>,
) -> Result<T> {
    let mut backoff = Backoff::new(policy);
    loop {
        match backoff.settle(op(), &exhausted)? {
            Outcome::Done(value) => return Ok(value),
            Outcome::Wait(delay) if delay.is_zero() => std::thread::yield_now(),
            Outcome::Wait(delay) => std::thread::sleep(delay),
        }
    }
}

/// Runs `op` until it commits, sleeping through `S` between tries.
#[cfg(feature = "async")]
pub(crate) async fn run_async<S, T>(
    policy: &RetryPolicy,
    exhausted: impl Fn(u32) -> Error,
    mut op: impl FnMut() -> Result<Outcome<T>>,
) -> Result<T>
where
    S: crate::SleepProvider,
{
    let mut backoff = Backoff::new(policy);
    loop {
        match backoff.settle(op(), &exhausted)? {
            Outcome::Done(value) => return Ok(value),
            Outcome::Wait(delay) => S::sleep_for(delay).await,
        }
    }
}
