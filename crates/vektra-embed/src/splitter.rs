//! Text splitting for chunk creation.

use text_splitter::{ChunkConfig, TextSplitter};

use crate::error::{EmbedError, EmbedResult};

/// Character budget and overlap for one splitting pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProfile {
    pub max_characters: usize,
    pub overlap: usize,
}

impl ChunkProfile {
    /// Narrow chunks for stores that search many small vectors well.
    pub const STANDARD: Self = Self {
        max_characters: 1_000,
        overlap: 20,
    };

    /// Wide chunks for stores that prefer fewer, larger documents.
    pub const WIDE: Self = Self {
        max_characters: 3_000,
        overlap: 100,
    };
}

impl Default for ChunkProfile {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Text splitter service for creating document chunks.
#[derive(Debug, Clone)]
pub struct Splitter {
    profile: ChunkProfile,
}

impl Splitter {
    /// Creates a splitter with the given profile.
    pub fn new(profile: ChunkProfile) -> Self {
        Self { profile }
    }

    /// Splits text into trimmed, overlapping chunks.
    ///
    /// Fails when the profile's overlap is not smaller than its character
    /// budget.
    pub fn split(&self, text: &str) -> EmbedResult<Vec<String>> {
        let chunk_config = ChunkConfig::new(self.profile.max_characters)
            .with_overlap(self.profile.overlap)
            .map_err(|err| EmbedError::config(err.to_string()))?
            .with_trim(true);
        let splitter = TextSplitter::new(chunk_config);

        Ok(splitter.chunks(text).map(str::to_string).collect())
    }
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(ChunkProfile::STANDARD)
    }
}
