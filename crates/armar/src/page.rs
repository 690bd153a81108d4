//! Page binding: navigation plus URL-pattern confirmation.
//!
//! A page is bound to an entire document. Its `load` navigates the driver
//! session to the target URL and confirms arrival against an optional
//! segment pattern. Concrete pages embed an [`Arc<PageCore>`](PageCore) and
//! delegate their [`Loadable`](crate::Loadable) implementation to it -
//! explicit composition instead of a base-class `Load` chain.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::driver::Driver;
use crate::lifecycle::{LoadState, StateCell};
use crate::result::{ArmarError, ArmarResult};

/// URL path matcher for confirming page navigation.
///
/// Patterns support:
/// - Literal segments: `/login`
/// - Wildcards: `/users/*`
/// - Named parameters: `/users/:id`
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    pattern: String,
    segments: Vec<UrlSegment>,
}

#[derive(Debug, Clone)]
enum UrlSegment {
    Literal(String),
    Wildcard,
    Parameter(String),
}

impl UrlMatcher {
    /// Create a matcher from a pattern
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "*" {
                    UrlSegment::Wildcard
                } else if let Some(name) = s.strip_prefix(':') {
                    UrlSegment::Parameter(name.to_string())
                } else {
                    UrlSegment::Literal(s.to_string())
                }
            })
            .collect();

        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    /// Check whether a URL's path matches the pattern.
    ///
    /// Wildcards and parameters each consume exactly one segment.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let path = Self::path_of(url);
        let url_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if url_segments.len() != self.segments.len() {
            return false;
        }

        self.segments.iter().enumerate().all(|(i, segment)| match segment {
            UrlSegment::Literal(lit) => url_segments.get(i) == Some(&lit.as_str()),
            UrlSegment::Wildcard | UrlSegment::Parameter(_) => true,
        })
    }

    /// Extract named parameters from a URL's path
    #[must_use]
    pub fn extract_params(&self, url: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();
        let path = Self::path_of(url);
        let url_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        for (i, segment) in self.segments.iter().enumerate() {
            if let UrlSegment::Parameter(name) = segment {
                if let Some(value) = url_segments.get(i) {
                    let _ = params.insert(name.clone(), (*value).to_string());
                }
            }
        }

        params
    }

    /// The original pattern
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The path portion of a URL, without scheme, host, or query.
    fn path_of(url: &str) -> &str {
        let without_scheme = url
            .split_once("://")
            .map_or(url, |(_, rest)| rest.find('/').map_or("", |i| &rest[i..]));
        without_scheme
            .split_once('?')
            .map_or(without_scheme, |(path, _)| path)
    }
}

/// Navigation-and-confirmation plumbing shared by concrete pages.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use armar::{Assembler, ArmarResult, Loadable, LoadState, MockDriver, MockNode, PageCore};
///
/// struct LoginPage {
///     core: Arc<PageCore>,
/// }
///
/// impl Loadable for LoginPage {
///     fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
///         self.core.bind()
///     }
///
///     fn load_state(&self) -> LoadState {
///         self.core.state()
///     }
/// }
///
/// let driver = Arc::new(MockDriver::new());
/// driver.install_page("https://app.test/login", MockNode::new("main"));
///
/// let page = LoginPage {
///     core: Arc::new(
///         PageCore::new(driver, "https://app.test/login").confirm_path("/login"),
///     ),
/// };
/// # let assembler = Assembler::new(page.core.driver(), armar::AssemblerOptions::hermetic()).unwrap();
/// # page.load(&assembler).unwrap();
/// # assert_eq!(page.load_state(), LoadState::Loaded);
/// ```
pub struct PageCore {
    driver: Arc<dyn Driver>,
    url: String,
    matcher: Option<UrlMatcher>,
    state: StateCell,
    name: String,
}

impl std::fmt::Debug for PageCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCore")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl PageCore {
    /// Create a page core targeting a URL
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, url: impl Into<String>) -> Self {
        Self {
            driver,
            url: url.into(),
            matcher: None,
            state: StateCell::new(),
            name: "page".to_string(),
        }
    }

    /// Name used in logs and error context (defaults to `"page"`)
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Confirm arrival against a path pattern after navigation
    #[must_use]
    pub fn confirm_path(mut self, pattern: &str) -> Self {
        self.matcher = Some(UrlMatcher::new(pattern));
        self
    }

    /// The shared driver session
    #[must_use]
    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    /// The target URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state.get()
    }

    /// Navigate and confirm, driving the lifecycle state machine.
    ///
    /// # Errors
    ///
    /// [`ArmarError::Navigation`] when the target cannot be reached or the
    /// confirmation pattern does not match; driver errors pass through with
    /// the page name attached. Either way the state becomes `Failed`.
    pub fn bind(&self) -> ArmarResult<()> {
        self.state.advance(LoadState::Loading);
        match self.try_bind() {
            Ok(()) => {
                self.state.advance(LoadState::Loaded);
                debug!(page = self.name.as_str(), url = self.url.as_str(), "page bound");
                Ok(())
            }
            Err(err) => {
                self.state.advance(LoadState::Failed);
                Err(err.in_component(self.name.clone()))
            }
        }
    }

    /// Navigate, confirm, then run `children` to assemble nested components.
    ///
    /// A failure in `children` moves the page to `Failed` so a half-built
    /// page is never observed as usable.
    pub fn bind_with<F>(&self, children: F) -> ArmarResult<()>
    where
        F: FnOnce() -> ArmarResult<()>,
    {
        self.bind()?;
        if let Err(err) = children() {
            self.state.advance(LoadState::Failed);
            return Err(err);
        }
        Ok(())
    }

    fn try_bind(&self) -> ArmarResult<()> {
        self.driver.navigate(&self.url)?;
        if let Some(matcher) = &self.matcher {
            let current = self.driver.current_url()?;
            if !matcher.matches(&current) {
                return Err(ArmarError::Navigation {
                    url: current,
                    message: format!("expected path matching '{}'", matcher.pattern()),
                });
            }
        }
        Ok(())
    }

    /// The URL the session is currently at
    pub fn current_url(&self) -> ArmarResult<String> {
        self.driver.current_url()
    }
}
