//! Masking of credential material before it reaches a destination.

use std::borrow::Cow;
use std::iter;

/// Character written over redacted text.
pub const MASK_CHARACTER: char = 'x';

/// Characters masked after each token marker.
pub const TOKEN_MASK_LENGTH: usize = 20;

/// Markers preceding authentication tokens in URLs and headers.
pub const TOKEN_MARKERS: &[&str] = &["X-Plex-Token=", "X-Plex-Token%3D"];

/// Replaces the characters following a marker with [`MASK_CHARACTER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionRule {
    marker: String,
    mask_len: usize,
}

impl RedactionRule {
    /// Builds a rule masking `mask_len` characters after `marker`.
    pub fn new(marker: impl Into<String>, mask_len: usize) -> Self {
        Self {
            marker: marker.into(),
            mask_len,
        }
    }

    /// Rules for the authentication token markers.
    #[must_use]
    pub fn token_rules() -> Vec<Self> {
        TOKEN_MARKERS
            .iter()
            .map(|marker| Self::new(*marker, TOKEN_MASK_LENGTH))
            .collect()
    }

    /// Applies the rule to `text`.
    ///
    /// Every occurrence of the marker followed by at least `mask_len`
    /// characters is masked. The scan stops at the first occurrence with a
    /// shorter tail, leaving it and anything after it untouched. Lengths are
    /// counted in characters, so the character count of the text is
    /// preserved.
    #[must_use]
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.marker.is_empty() || self.mask_len == 0 {
            return Cow::Borrowed(text);
        }

        let mut output: Option<String> = None;
        let mut rest = text;
        while let Some(index) = rest.find(self.marker.as_str()) {
            let (head, tail) = rest.split_at(index + self.marker.len());
            let Some(masked_end) = byte_offset_after(tail, self.mask_len) else {
                break;
            };
            let (_, remainder) = tail.split_at(masked_end);
            let buffer = output.get_or_insert_with(|| String::with_capacity(text.len()));
            buffer.push_str(head);
            buffer.extend(iter::repeat_n(MASK_CHARACTER, self.mask_len));
            rest = remainder;
        }

        match output {
            Some(mut buffer) => {
                buffer.push_str(rest);
                Cow::Owned(buffer)
            }
            None => Cow::Borrowed(text),
        }
    }
}

/// Applies each rule in order.
#[must_use]
pub fn redact<'a>(rules: &[RedactionRule], text: &'a str) -> Cow<'a, str> {
    let mut current = Cow::Borrowed(text);
    for rule in rules {
        let masked = match rule.apply(&current) {
            Cow::Owned(masked) => Some(masked),
            Cow::Borrowed(_) => None,
        };
        if let Some(masked) = masked {
            current = Cow::Owned(masked);
        }
    }
    current
}

/// Byte offset just past `count` characters, or `None` when fewer remain.
fn byte_offset_after(text: &str, count: usize) -> Option<usize> {
    text.char_indices()
        .map(|(offset, _)| offset)
        .chain(iter::once(text.len()))
        .nth(count)
}
