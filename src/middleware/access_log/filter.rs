use regex::Regex;

use crate::error::Error;

/// Decides from the request URL whether a request is logged at all.
///
/// With no pattern nothing is skipped. A matching request is forwarded
/// untouched: no timing, no observer, no line.
#[derive(Clone, Debug, Default)]
pub struct Exclusion(Option<Regex>);

impl Exclusion {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(pattern: Regex) -> Self {
        Self(Some(pattern))
    }

    /// Compiles `pattern` with the `regex` crate.
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        Ok(Self::new(Regex::new(pattern)?))
    }

    /// Unanchored search, so `\.gif` matches anywhere in the URL.
    pub fn should_skip(&self, url: &str) -> bool {
        self.0.as_ref().is_some_and(|re| re.is_match(url))
    }
}

impl From<Regex> for Exclusion {
    fn from(pattern: Regex) -> Self {
        Self::new(pattern)
    }
}
