//! Version tokens embedded in artifact filenames.
//!
//! Artifacts carry a `MAJOR.MINOR.PATCH[+metadata]` token somewhere in their
//! name. Ordering looks at the three numeric components only; the metadata
//! suffix is kept so the token can be shown exactly as it was found.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

const VERSION_PATTERN: &str = r"[0-9]+\.[0-9]+\.[0-9]+(?:\+[A-Za-z0-9-]+)?";

/// A parsed artifact version.
///
/// The token is kept exactly as it appeared, so `4.06.0` displays as
/// `4.06.0`. Equality compares tokens; use [`Version::cmp_precedence`] for
/// ordering. Numeric components may be arbitrarily long.
///
/// # Examples
///
/// ```
/// use revanced_assist::version::Version;
///
/// let found = Version::find_in("revanced-cli-4.6.0+dsl.jar").expect("version");
/// assert_eq!(found.to_string(), "4.6.0+dsl");
/// assert_eq!(found.as_str(), "4.6.0+dsl");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    token: String,
}

impl Version {
    /// Parse a complete version token such as `2.10.0` or `4.6.0+dsl-all`.
    ///
    /// Returns `None` for anything that is not exactly a version token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let (core, metadata) = match token.split_once('+') {
            Some((core, meta)) => (core, Some(meta)),
            None => (token, None),
        };

        let components = core.split('.').collect::<Vec<_>>();
        if components.len() != 3 || !components.iter().all(|part| is_numeric(part)) {
            return None;
        }
        if metadata.is_some_and(|meta| !is_valid_metadata(meta)) {
            return None;
        }

        Some(Self {
            token: token.to_owned(),
        })
    }

    /// Find the first version token inside `name`.
    #[must_use]
    pub fn find_in(name: &str) -> Option<Self> {
        let token = version_regex()?.find(name)?;
        Self::parse(token.as_str())
    }

    /// The token as it was found.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Compare by `MAJOR`, `MINOR`, `PATCH` numerically, ignoring metadata.
    ///
    /// ```
    /// use revanced_assist::version::Version;
    /// use std::cmp::Ordering;
    ///
    /// let newer = Version::parse("2.10.0").expect("valid");
    /// let older = Version::parse("2.9.9").expect("valid");
    /// assert_eq!(newer.cmp_precedence(&older), Ordering::Greater);
    /// ```
    #[must_use]
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.components()
            .zip(other.components())
            .map(|(a, b)| cmp_numeric(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    fn components(&self) -> impl Iterator<Item = &str> {
        let core = self.token.split('+').next().unwrap_or_default();
        core.split('.')
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn is_numeric(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

/// Compare two digit strings by value without converting them to integers.
fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn is_valid_metadata(meta: &str) -> bool {
    !meta.is_empty() && meta.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn version_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(VERSION_PATTERN).ok())
        .as_ref()
}
