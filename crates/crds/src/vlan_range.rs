//! VLAN range text codec
//!
//! Converts between the compact range syntax stored in CRD fields
//! (`"1-10,15,20-22"`) and a canonical set of integers.
//!
//! The set is held as sorted, disjoint, non-adjacent inclusive runs, so a
//! pool such as `"1-4094"` costs one entry rather than four thousand.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing range text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RangeError {
    /// A token is empty, signed, contains whitespace, or is not a number
    #[error("invalid range token `{token}` in `{text}`")]
    InvalidToken {
        /// Full text being parsed
        text: String,
        /// Offending token
        token: String,
    },

    /// A `lo-hi` token whose lower bound is above its upper bound
    #[error("range `{token}` in `{text}` has its lower bound above its upper bound")]
    Inverted {
        /// Full text being parsed
        text: String,
        /// Offending token
        token: String,
    },
}

/// Canonical integer set built from range text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RangeSet {
    runs: Vec<(u32, u32)>,
}

impl RangeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses range text. Empty text is the empty set.
    pub fn parse(text: &str) -> Result<Self, RangeError> {
        if text.is_empty() {
            return Ok(Self::new());
        }

        let mut runs = Vec::new();
        for token in text.split(',') {
            let invalid = || RangeError::InvalidToken {
                text: text.to_string(),
                token: token.to_string(),
            };

            let (lo, hi) = match token.split_once('-') {
                Some((lo, hi)) => (
                    parse_bound(lo).ok_or_else(invalid)?,
                    parse_bound(hi).ok_or_else(invalid)?,
                ),
                None => {
                    let value = parse_bound(token).ok_or_else(invalid)?;
                    (value, value)
                }
            };

            if lo > hi {
                return Err(RangeError::Inverted {
                    text: text.to_string(),
                    token: token.to_string(),
                });
            }
            runs.push((lo, hi));
        }

        Ok(Self::from_runs(runs))
    }

    /// Builds a set from a single value.
    pub fn single(value: u32) -> Self {
        Self { runs: vec![(value, value)] }
    }

    fn from_runs(mut runs: Vec<(u32, u32)>) -> Self {
        runs.sort_unstable();

        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(runs.len());
        for (lo, hi) in runs {
            match merged.last_mut() {
                // Overlapping or directly adjacent runs collapse into one
                Some(last) if u64::from(lo) <= u64::from(last.1) + 1 => {
                    last.1 = last.1.max(hi);
                }
                _ => merged.push((lo, hi)),
            }
        }

        Self { runs: merged }
    }

    /// Returns true when the set holds no values.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of values in the set.
    pub fn len(&self) -> u64 {
        self.runs
            .iter()
            .map(|(lo, hi)| u64::from(*hi) - u64::from(*lo) + 1)
            .sum()
    }

    /// Returns true when `value` is a member.
    pub fn contains(&self, value: u32) -> bool {
        self.runs.iter().any(|(lo, hi)| (*lo..=*hi).contains(&value))
    }

    /// Smallest member, if any.
    pub fn first(&self) -> Option<u32> {
        self.runs.first().map(|(lo, _)| *lo)
    }

    /// Iterates over every member in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.runs.iter().flat_map(|(lo, hi)| *lo..=*hi)
    }

    /// Set union.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut runs = self.runs.clone();
        runs.extend_from_slice(&other.runs);
        Self::from_runs(runs)
    }

    /// Set difference (`self − other`).
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut out = Vec::with_capacity(self.runs.len());
        let mut first_candidate = 0;

        for &(lo, hi) in &self.runs {
            while first_candidate < other.runs.len() && other.runs[first_candidate].1 < lo {
                first_candidate += 1;
            }

            let mut cursor = lo;
            let mut exhausted = false;
            for &(other_lo, other_hi) in other.runs[first_candidate..]
                .iter()
                .take_while(|(other_lo, _)| *other_lo <= hi)
            {
                if other_lo > cursor {
                    out.push((cursor, other_lo - 1));
                }
                match other_hi.checked_add(1) {
                    Some(next) if next <= hi => cursor = next,
                    _ => {
                        exhausted = true;
                        break;
                    }
                }
            }

            if !exhausted {
                out.push((cursor, hi));
            }
        }

        Self { runs: out }
    }

    /// Set intersection.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        self.difference(&self.difference(other))
    }

    /// Returns true when every member of `self` is in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.difference(other).is_empty()
    }
}

fn parse_bound(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (lo, hi)) in self.runs.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}-{hi}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for RangeSet {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromIterator<u32> for RangeSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self::from_runs(iter.into_iter().map(|v| (v, v)).collect())
    }
}

/// Parses range text into its canonical set.
pub fn parse_range(text: &str) -> Result<RangeSet, RangeError> {
    RangeSet::parse(text)
}

/// Formats a set as canonical range text.
pub fn format_range(set: &RangeSet) -> String {
    set.to_string()
}

/// Union of two range texts, in canonical form.
pub fn union(a: &str, b: &str) -> Result<String, RangeError> {
    Ok(RangeSet::parse(a)?.union(&RangeSet::parse(b)?).to_string())
}

/// Difference of two range texts (`a − b`), in canonical form.
pub fn difference(a: &str, b: &str) -> Result<String, RangeError> {
    Ok(RangeSet::parse(a)?.difference(&RangeSet::parse(b)?).to_string())
}
