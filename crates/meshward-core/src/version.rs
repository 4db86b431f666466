//! Semantic versions compared on `major.minor.patch` only

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// A `major.minor.patch` version with an optional suffix
///
/// The suffix (pre-release tag and build metadata) is kept for display only.
/// Equality and ordering look at the numeric triple, so `1.2.3-distroless`
/// and `1.2.3` are the same version as far as compatibility is concerned.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    suffix: String,
}

impl SemanticVersion {
    /// Create a version without suffix
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            suffix: String::new(),
        }
    }

    /// Parse a strict semantic version (`1.2.3`, `1.2.3-suffix`)
    ///
    /// Prefixed (`v1.2.3`, `prefix-1.2.3`) or truncated (`1.2.`, `1.23`) inputs are rejected.
    /// Leading zeros in the numeric triple are accepted: `1.02.3` is `1.2.3`.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = strip_leading_zeros(input);
        let parsed =
            semver::Version::parse(&normalized).map_err(|source| CoreError::InvalidVersion {
                input: input.to_string(),
                source,
            })?;

        let mut suffix = String::new();
        if !parsed.pre.is_empty() {
            suffix.push('-');
            suffix.push_str(parsed.pre.as_str());
        }
        if !parsed.build.is_empty() {
            suffix.push('+');
            suffix.push_str(parsed.build.as_str());
        }

        Ok(Self {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            suffix,
        })
    }

    /// The ignored suffix, including its leading `-` or `+`
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn major_minor_patch(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// Total order over `(major, minor, patch)`
    pub fn compare(&self, other: &SemanticVersion) -> Ordering {
        self.major_minor_patch().cmp(&other.major_minor_patch())
    }
}

/// `01.002.3-rc` -> `1.2.3-rc`; anything but a numeric triple is passed through untouched
fn strip_leading_zeros(input: &str) -> Cow<'_, str> {
    let (core, suffix) = input.split_at(input.find(['-', '+']).unwrap_or(input.len()));
    let parts: Vec<&str> = core.split('.').collect();

    let numeric = |part: &&str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if parts.len() != 3 || !parts.iter().all(numeric) {
        return Cow::Borrowed(input);
    }
    if !parts.iter().any(|part| part.len() > 1 && part.starts_with('0')) {
        return Cow::Borrowed(input);
    }

    let trimmed: Vec<&str> = parts
        .iter()
        .map(|part| match part.trim_start_matches('0') {
            "" => "0",
            digits => digits,
        })
        .collect();
    Cow::Owned(format!("{}{}", trimmed.join("."), suffix))
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl FromStr for SemanticVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}{}", self.major, self.minor, self.patch, self.suffix)
    }
}
