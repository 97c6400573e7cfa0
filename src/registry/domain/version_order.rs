//! Version precedence for the latest-flag decision.
//!
//! Publishers supply free-form version tokens, so ordering is best-effort:
//! tokens that parse as semver-compatible structures compare by semver
//! precedence (build metadata ignored), anything else falls back to lexical
//! comparison, and exact ties are broken by publish time.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Decides which of two published versions takes the latest flag.
///
/// Returns `Ordering::Greater` when `(version_a, published_a)` should be
/// considered newer than `(version_b, published_b)`. The ordering is total
/// and stable under equal inputs.
#[must_use]
pub fn version_precedence(
    version_a: &str,
    published_a: DateTime<Utc>,
    version_b: &str,
    published_b: DateTime<Utc>,
) -> Ordering {
    let by_token = match (SemverToken::parse(version_a), SemverToken::parse(version_b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => version_a.cmp(version_b),
    };
    by_token.then_with(|| published_a.cmp(&published_b))
}

/// Parsed `major.minor.patch[-prerelease][+build]` token.
///
/// Build metadata is stripped before comparison, per semver precedence
/// rules. Missing minor or patch components default to zero.
#[derive(Debug, PartialEq, Eq)]
struct SemverToken {
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: Option<String>,
}

impl SemverToken {
    fn parse(token: &str) -> Option<Self> {
        let without_build = token.split_once('+').map_or(token, |(core, _)| core);
        let (core, prerelease) = match without_build.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_owned())),
            Some(_) => return None,
            None => (without_build, None),
        };

        let mut parts = core.split('.');
        let major = parse_numeric(parts.next()?)?;
        let minor = match parts.next() {
            Some(part) => parse_numeric(part)?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(part) => parse_numeric(part)?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            major,
            minor,
            patch,
            prerelease,
        })
    }
}

impl Ord for SemverToken {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| compare_prerelease(self.prerelease.as_deref(), other.prerelease.as_deref()))
    }
}

impl PartialOrd for SemverToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn parse_numeric(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Semver rule: a release outranks any pre-release of the same core, and
/// pre-release identifiers compare field by field, numeric before
/// alphanumeric.
fn compare_prerelease(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let mut a_fields = a.split('.');
            let mut b_fields = b.split('.');
            loop {
                match (a_fields.next(), b_fields.next()) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(x), Some(y)) => {
                        let ordering = compare_prerelease_field(x, y);
                        if ordering != Ordering::Equal {
                            return ordering;
                        }
                    }
                }
            }
        }
    }
}

fn compare_prerelease_field(a: &str, b: &str) -> Ordering {
    match (parse_numeric(a), parse_numeric(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
