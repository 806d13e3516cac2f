//! Page range specifications for splitting

use crate::error::{Error, Result};
use std::fmt;

/// Closed interval of 1-indexed page numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    /// Number of pages covered
    pub fn page_count(&self) -> u32 {
        self.end - self.start + 1
    }

    /// 0-indexed page indices, in order
    pub fn indices(&self) -> impl Iterator<Item = u32> {
        (self.start - 1)..self.end
    }

    /// Parse a comma-separated spec (`"1-3,5,7-9"`) against a document of
    /// `total_pages` pages. One range per non-empty token, in token order.
    ///
    /// Fails if no range is given, a token is not `n` or `a-b`, a page falls
    /// outside `[1, total_pages]`, or `a > b`.
    pub fn parse_spec(spec: &str, total_pages: u32) -> Result<Vec<PageRange>> {
        if total_pages == 0 {
            return Err(Error::invalid_input("PDF has no pages"));
        }

        let mut ranges = Vec::new();
        for token in spec.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            ranges.push(Self::parse_token(token, total_pages)?);
        }

        if ranges.is_empty() {
            return Err(Error::InvalidPageRange {
                range: spec.to_string(),
            });
        }
        Ok(ranges)
    }

    fn parse_token(token: &str, total_pages: u32) -> Result<PageRange> {
        let range = match token.split_once('-') {
            Some((start, end)) => PageRange {
                start: parse_page(start, token)?,
                end: parse_page(end, token)?,
            },
            None => PageRange::single(parse_page(token, token)?),
        };

        if range.start < 1 || range.end > total_pages {
            return Err(Error::InvalidPageRange {
                range: format!("{} out of range (1-{})", token, total_pages),
            });
        }
        if range.start > range.end {
            return Err(Error::InvalidPageRange {
                range: format!("{} has start after end", token),
            });
        }
        Ok(range)
    }
}

/// Page numbers are plain ASCII digits; `u32::from_str` alone would also take `+3`.
fn parse_page(s: &str, token: &str) -> Result<u32> {
    let s = s.trim();
    let invalid = || Error::InvalidPageRange {
        range: token.to_string(),
    };
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    s.parse().map_err(|_| invalid())
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}
