//! Navigation targets.
//!
//! A target is the page the host is currently showing. Only its canonical
//! form is compared, so two locators that differ in fragment alone are the
//! same unit of work.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Canonical identity of a navigation target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetIdentity(String);

impl TargetIdentity {
    /// Canonicalize a locator. Returns `None` for anything that does not
    /// parse as an absolute URL.
    pub fn from_locator(locator: &str) -> Option<Self> {
        let mut url = Url::parse(locator).ok()?;
        url.set_fragment(None);
        Some(Self(url.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Default watched-target predicate: a YouTube watch page carrying a `v`
/// query parameter.
pub fn is_watch_locator(locator: &str) -> bool {
    match Url::parse(locator) {
        Ok(url) => {
            url.host_str() == Some("www.youtube.com")
                && url.path() == "/watch"
                && url.query_pairs().any(|(key, _)| key == "v")
        }
        Err(_) => false,
    }
}
