//! Ignore-line filtering on raw output bytes.

use std::borrow::Cow;

use anyhow::{Context, Result};
use regex::bytes::Regex;

/// Deletes whole lines matching any registered pattern.
///
/// Patterns are matched against one line at a time, without its terminator, so
/// `^` and `$` anchor at the line boundaries and a pattern can never reach into
/// a neighbouring line.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    patterns: Vec<Regex>,
}

impl Normalizer {
    /// Compile textual patterns into a normalizer.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).with_context(|| format!("compile ignore line {pattern:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Remove every matching line together with its trailing line terminator.
    ///
    /// Borrows the input when nothing matched. Idempotent.
    pub fn strip_ignored<'a>(&self, raw: &'a [u8]) -> Cow<'a, [u8]> {
        if self.patterns.is_empty() || raw.is_empty() {
            return Cow::Borrowed(raw);
        }

        let mut kept: Option<Vec<u8>> = None;
        let mut offset = 0usize;
        for line in raw.split_inclusive(|byte| *byte == b'\n') {
            if self.is_ignored(line_content(line)) {
                kept.get_or_insert_with(|| {
                    let mut buf = Vec::with_capacity(raw.len());
                    buf.extend_from_slice(&raw[..offset]);
                    buf
                });
            } else if let Some(buf) = kept.as_mut() {
                buf.extend_from_slice(line);
            }
            offset += line.len();
        }

        match kept {
            Some(buf) => Cow::Owned(buf),
            None => Cow::Borrowed(raw),
        }
    }

    fn is_ignored(&self, line: &[u8]) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(line))
    }
}

fn line_content(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
