//! Poll-until-condition helpers.
//!
//! The assembler itself never retries: flaky document state is handled by
//! explicit polling with a caller-supplied timeout, never silent loops.
//! These helpers are what component methods reach for when an element is
//! expected to appear or a predicate to flip.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::driver::{Driver, NodeHandle};
use crate::locator::Locator;
use crate::page::UrlMatcher;
use crate::result::{ArmarError, ArmarResult};

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Options for wait operations
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Wait until a predicate returns true.
///
/// The predicate runs at least once even with a zero timeout.
///
/// # Errors
///
/// [`ArmarError::Timeout`] when the predicate never flips.
pub fn wait_until<F>(predicate: F, options: &WaitOptions) -> ArmarResult<()>
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    loop {
        if predicate() {
            return Ok(());
        }
        if start.elapsed() >= options.timeout() {
            return Err(ArmarError::Timeout {
                ms: options.timeout_ms,
            });
        }
        std::thread::sleep(options.poll_interval());
    }
}

/// Driver-backed waiter for document state.
#[derive(Clone)]
pub struct Waiter {
    driver: Arc<dyn Driver>,
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter").finish_non_exhaustive()
    }
}

impl Waiter {
    /// Create a waiter over a driver session
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Poll until a locator resolves to a node.
    ///
    /// "Not found" keeps polling; any other driver error propagates
    /// immediately - an unavailable session will not heal by waiting.
    ///
    /// # Errors
    ///
    /// [`ArmarError::Timeout`] when nothing appears in time.
    pub fn wait_for_node(&self, locator: &Locator, options: &WaitOptions) -> ArmarResult<NodeHandle> {
        let start = Instant::now();
        loop {
            match self.driver.find_node(locator) {
                Ok(node) => return Ok(node),
                Err(ArmarError::NodeNotFound { .. }) => {}
                Err(other) => return Err(other),
            }
            if start.elapsed() >= options.timeout() {
                return Err(ArmarError::Timeout {
                    ms: options.timeout_ms,
                });
            }
            std::thread::sleep(options.poll_interval());
        }
    }

    /// Poll until the session's URL matches a path pattern.
    ///
    /// # Errors
    ///
    /// [`ArmarError::Timeout`] when the URL never matches.
    pub fn wait_for_url(&self, matcher: &UrlMatcher, options: &WaitOptions) -> ArmarResult<String> {
        let start = Instant::now();
        loop {
            let current = self.driver.current_url()?;
            if matcher.matches(&current) {
                return Ok(current);
            }
            if start.elapsed() >= options.timeout() {
                return Err(ArmarError::Timeout {
                    ms: options.timeout_ms,
                });
            }
            std::thread::sleep(options.poll_interval());
        }
    }
}
