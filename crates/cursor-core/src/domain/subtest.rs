//! Subtest naming, the cursor size sequence, and subtest selection.
//!
//! Every supported cursor size registers two subtests:
//! `cursor-<size>-onscreen` and `cursor-<size>-offscreen`.  Sizes start at
//! [`MIN_CURSOR_SIZE`] and double up to the hardware limit, so a size the
//! hardware cannot scan out is never registered at all.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use super::display::CursorSize;
use super::geometry::{offscreen_probes, onscreen_probes, Envelope, Expectation, Probe};

/// Smallest cursor edge exercised by the test.
pub const MIN_CURSOR_SIZE: u32 = 64;

/// Which side of the screen boundary a subtest probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestVariant {
    /// Cursor at least partly visible; checksums must differ from reference.
    Onscreen,
    /// Cursor fully clipped; checksums must equal the reference.
    Offscreen,
}

impl TestVariant {
    /// Both variants in registration order.
    pub const ALL: [TestVariant; 2] = [TestVariant::Onscreen, TestVariant::Offscreen];

    pub fn as_str(self) -> &'static str {
        match self {
            TestVariant::Onscreen => "onscreen",
            TestVariant::Offscreen => "offscreen",
        }
    }

    /// What every probe of this variant expects.
    pub fn expectation(self) -> Expectation {
        match self {
            TestVariant::Onscreen => Expectation::DifferFromReference,
            TestVariant::Offscreen => Expectation::MatchReference,
        }
    }

    /// Generates this variant's probe list.
    pub fn probes(self, envelope: &Envelope, cursor: CursorSize) -> Vec<Probe> {
        match self {
            TestVariant::Onscreen => onscreen_probes(envelope, cursor),
            TestVariant::Offscreen => offscreen_probes(envelope, cursor),
        }
    }
}

impl fmt::Display for TestVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Iterates the square cursor sizes `64, 128, 256, …` not exceeding `max`.
pub fn cursor_sizes(max: u32) -> impl Iterator<Item = u32> {
    std::iter::successors(Some(MIN_CURSOR_SIZE), |size| size.checked_mul(2))
        .take_while(move |size| *size <= max)
}

/// A registered subtest, e.g. `cursor-128-offscreen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubtestName {
    pub size: u32,
    pub variant: TestVariant,
}

impl SubtestName {
    pub fn new(size: u32, variant: TestVariant) -> Self {
        Self { size, variant }
    }

    /// The cursor this subtest draws.
    pub fn cursor(&self) -> CursorSize {
        CursorSize::square(self.size)
    }
}

impl fmt::Display for SubtestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor-{}-{}", self.size, self.variant)
    }
}

impl Serialize for SubtestName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Error returned when a string is not a well-formed subtest name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed subtest name: {0:?}")]
pub struct SubtestNameError(pub String);

impl FromStr for SubtestName {
    type Err = SubtestNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SubtestNameError(s.to_string());
        let rest = s.strip_prefix("cursor-").ok_or_else(malformed)?;
        let (size, variant) = rest.split_once('-').ok_or_else(malformed)?;
        let size = size.parse::<u32>().map_err(|_| malformed())?;
        let variant = match variant {
            "onscreen" => TestVariant::Onscreen,
            "offscreen" => TestVariant::Offscreen,
            _ => return Err(malformed()),
        };
        Ok(SubtestName { size, variant })
    }
}

/// Every subtest registered for a device whose square cursor limit is `max`.
pub fn registered_subtests(max: u32) -> Vec<SubtestName> {
    cursor_sizes(max)
        .flat_map(|size| {
            TestVariant::ALL
                .into_iter()
                .map(move |variant| SubtestName::new(size, variant))
        })
        .collect()
}

/// Selects subtests by name using `*` / `?` wildcard patterns.
///
/// An empty filter selects everything.
#[derive(Debug, Clone, Default)]
pub struct SubtestFilter {
    patterns: Vec<String>,
}

impl SubtestFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if no patterns were given.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, name: &SubtestName) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let name = name.to_string();
        self.patterns.iter().any(|p| glob_match(p.as_bytes(), name.as_bytes()))
    }
}

/// Iterative wildcard match with single-star backtracking.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
