//! Compression quality tiers

use std::fmt;

/// Quality preset for PDF compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionTier {
    /// Screen resolution (~72 dpi)
    Low,
    /// Ebook resolution (~150 dpi)
    #[default]
    Medium,
    /// Print resolution (~300 dpi)
    High,
}

impl CompressionTier {
    /// Parse a tier name. Anything unrecognized falls back to `Medium`.
    pub fn parse_lenient(tier: &str) -> Self {
        match tier.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "medium" => Self::Medium,
            other => {
                tracing::debug!(tier = other, "Unknown compression tier, using medium");
                Self::Medium
            }
        }
    }

    /// Ghostscript `-dPDFSETTINGS` preset for this tier
    pub fn preset(self) -> &'static str {
        match self {
            Self::Low => "/screen",
            Self::Medium => "/ebook",
            Self::High => "/printer",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl From<&str> for CompressionTier {
    fn from(tier: &str) -> Self {
        Self::parse_lenient(tier)
    }
}

impl fmt::Display for CompressionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
