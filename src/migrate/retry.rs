//! Per-key retry policy

use tracing::debug;

use super::counters::RunCounters;

/// How many times a key is re-attempted after a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Run `op`, repeating it while `is_transient` accepts the error and
    /// attempts remain. Every repeat is recorded in `counters`.
    pub fn run<T, E, F, P>(&self, label: &str, counters: &RunCounters, mut op: F, is_transient: P) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    counters.record_retry();
                    debug!("Retrying {} ({}/{}): {}", label, attempt, self.max_retries, e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
