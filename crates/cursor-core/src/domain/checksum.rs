//! Per-frame checksum values.

use std::fmt;

use serde::Serialize;

/// A checksum of one composited frame, as produced by a pipe's CRC source.
///
/// Hardware CRC blocks emit several 32-bit words per frame (commonly one per
/// colour channel).  The frame counter records *when* the capture happened
/// and is deliberately excluded from [`Checksum::matches`]: two captures of
/// identical content on different frames are the same checksum.
#[derive(Debug, Clone, Serialize)]
pub struct Checksum {
    frame: u32,
    words: Vec<u32>,
}

impl Checksum {
    pub fn new(frame: u32, words: Vec<u32>) -> Self {
        Self { frame, words }
    }

    /// The frame counter value at capture time.
    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Returns `true` if both checksums describe the same frame content.
    pub fn matches(&self, other: &Checksum) -> bool {
        self.words == other.words
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, word) in self.words.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{word:08x}")?;
        }
        Ok(())
    }
}
