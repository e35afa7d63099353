//! Session metadata lookup.
//!
//! Session info is an indentation-structured YAML-like document rewritten by
//! the producer whenever the session changes. It is not parsed into a tree.
//! A lookup walks the text once, line by line, matching `Key:` segments of a
//! path against keys at increasing depth:
//!
//! ```text
//! WeekendInfo:
//!  TrackName: spa up
//! DriverInfo:
//!  Drivers:
//!  - CarIdx: 0
//!    UserName: Foo
//! ```
//!
//! The path `DriverInfo:Drivers:CarIdx:{0}UserName:` selects `Foo`. A
//! `Key:{value}` segment is a predicate: the key's value on that line must
//! equal `value` exactly, and matching continues among that entry's keys.
//!
//! Lookups return the raw value bytes (without the trailing newline) as a
//! slice into the document. A line is only examined once its newline has been
//! read, so a final line without one never matches.

use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::header::TelemetryHeader;
use crate::region::{SharedRegion, checked_range};
use crate::{Result, TelemetryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Space,
    Key,
    KeySeparator,
    Value,
    NewLine,
}

/// Find the value at `path` in `document`.
///
/// Scanning stops at the first NUL byte. Returns `None` when the path does not
/// match, including when the walk leaves the subtree of the last matched key.
pub fn lookup<'d>(document: &'d [u8], path: &str) -> Option<&'d [u8]> {
    let mut remaining = path.as_bytes();
    let mut depth = 0usize;
    let mut path_depth = 0usize;
    let mut state = ScanState::Space;
    let mut key_start = 0usize;
    let mut key_len = 0usize;
    let mut value_start = 0usize;
    let mut value_len = 0usize;

    for (position, &byte) in document.iter().enumerate() {
        match byte {
            0 => break,
            b' ' | b'-' => {
                if state == ScanState::NewLine {
                    state = ScanState::Space;
                }
                match state {
                    ScanState::Space => depth += 1,
                    ScanState::Key => key_len += 1,
                    ScanState::Value => value_len += 1,
                    ScanState::KeySeparator if byte == b'-' => {
                        state = ScanState::Value;
                        value_start = position;
                        value_len = 1;
                    }
                    _ => {}
                }
            }
            b':' => match state {
                ScanState::Key => {
                    state = ScanState::KeySeparator;
                    // The key keeps its colon so it lines up with the path.
                    key_len += 1;
                }
                ScanState::KeySeparator => {
                    state = ScanState::Value;
                    value_start = position;
                }
                ScanState::Value => value_len += 1,
                _ => {}
            },
            b'\n' | b'\r' => {
                if state != ScanState::NewLine {
                    if depth < path_depth {
                        return None;
                    }

                    let key = &document[key_start..key_start + key_len];
                    let value = &document[value_start..value_start + value_len];
                    if key_len > 0 {
                        if let Some(rest) = match_segment(remaining, key, value) {
                            remaining = rest;
                            path_depth = depth;
                            if remaining.is_empty() {
                                return Some(value);
                            }
                        }
                    }

                    depth = 0;
                    key_len = 0;
                    value_start = position + 1;
                    value_len = 0;
                }
                state = ScanState::NewLine;
            }
            _ => {
                match state {
                    ScanState::Space | ScanState::NewLine => {
                        state = ScanState::Key;
                        key_start = position;
                        key_len = 0;
                    }
                    ScanState::KeySeparator => {
                        state = ScanState::Value;
                        value_start = position;
                        value_len = 0;
                    }
                    _ => {}
                }
                match state {
                    ScanState::Key => key_len += 1,
                    ScanState::Value => value_len += 1,
                    _ => {}
                }
            }
        }
    }

    None
}

/// Match one line's key (and optional predicate) against the head of the
/// remaining path, returning what is left of the path.
fn match_segment<'p>(remaining: &'p [u8], key: &[u8], value: &[u8]) -> Option<&'p [u8]> {
    let rest = remaining.strip_prefix(key)?;
    match rest.split_first() {
        Some((b'{', predicate)) => {
            let close = predicate.iter().position(|&b| b == b'}')?;
            (predicate[..close] == *value).then(|| &predicate[close + 1..])
        }
        _ => Some(rest),
    }
}

/// Leading integer of `text`, after optional whitespace and sign.
///
/// Trailing text is ignored (`"3 laps"` is 3). No digits, or a value that
/// does not fit, yields `None`.
pub fn parse_leading_int(text: &str) -> Option<i32> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = bytes[sign..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    text[..sign + digits].parse().ok()
}

/// Leading decimal number of `text`, after optional whitespace.
///
/// Accepts a sign, a fraction and an exponent; trailing text such as units is
/// ignored (`"5.51 km"` is 5.51).
pub fn parse_leading_float(text: &str) -> Option<f32> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let count_digits = |from: usize| {
        bytes.get(from..).map_or(0, |tail| tail.iter().take_while(|b| b.is_ascii_digit()).count())
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let whole = count_digits(end);
    end += whole;
    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = count_digits(end + 1);
        if whole > 0 || fraction > 0 {
            end += 1 + fraction;
        }
    }
    if whole == 0 && fraction == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let digits = count_digits(exponent);
        if digits > 0 {
            end = exponent + digits;
        }
    }

    text[..end].parse().ok()
}

/// Path into session metadata, built segment by segment.
///
/// ```rust
/// use irsdk_poll::SessionPath;
///
/// let path = SessionPath::new()
///     .key("DriverInfo")
///     .key("Drivers")
///     .key_eq("CarIdx", 3)
///     .key("UserName");
/// assert_eq!(path.as_str(), "DriverInfo:Drivers:CarIdx:{3}UserName:");
/// ```
///
/// A segment containing path syntax (`:`, `{`, `}`) or a line break cannot
/// be expressed; the path is then marked invalid and never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPath {
    raw: String,
    invalid: bool,
}

impl SessionPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descend into `key`.
    pub fn key(mut self, key: &str) -> Self {
        if self.accept(key, &[':', '{', '}', '\n', '\r']) {
            self.raw.push_str(key);
            self.raw.push(':');
        }
        self
    }

    /// Descend into the entry whose `key` equals `value`.
    pub fn key_eq(mut self, key: &str, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        let accepted = self.accept(key, &[':', '{', '}', '\n', '\r'])
            && self.accept(&value, &['}', '\n', '\r']);
        if accepted {
            self.raw.push_str(key);
            self.raw.push_str(":{");
            self.raw.push_str(&value);
            self.raw.push('}');
        }
        self
    }

    fn accept(&mut self, segment: &str, forbidden: &[char]) -> bool {
        if segment.contains(forbidden) {
            self.invalid = true;
            self.raw.clear();
        }
        !self.invalid
    }

    pub fn is_valid(&self) -> bool {
        !self.invalid && !self.raw.is_empty()
    }

    /// The encoded path; empty for an invalid path.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for SessionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for SessionPath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

/// A copy of the session info document and the update counter it was
/// published under. Cloning shares the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    text: Arc<[u8]>,
    update: i32,
}

impl SessionMetadata {
    pub fn new(text: impl Into<Arc<[u8]>>, update: i32) -> Self {
        Self { text: text.into(), update }
    }

    /// Copy the document out of the region.
    ///
    /// The text is cut at the first NUL. If the update counter changes while
    /// copying, the copy is repeated, up to `max_attempts` times.
    pub fn read_from<R: SharedRegion + ?Sized>(region: &R, max_attempts: u32) -> Result<Self> {
        let mut header = TelemetryHeader::read_from(region)?;
        for _ in 0..max_attempts.max(1) {
            header.validate_tables()?;
            let offset = header.session_info_offset as usize;
            checked_range(offset, header.session_info_len as usize, region.len())?;
            let mut text = vec![0u8; header.session_info_len as usize];
            region.copy_to(offset, &mut text)?;

            let after = TelemetryHeader::read_from(region)?;
            if after.session_info_update == header.session_info_update {
                if let Some(end) = text.iter().position(|&b| b == 0) {
                    text.truncate(end);
                }
                trace!(
                    update = header.session_info_update,
                    bytes = text.len(),
                    "Copied session info"
                );
                return Ok(Self::new(text, header.session_info_update));
            }
            header = after;
        }

        Err(TelemetryError::parse_error(
            "Session info",
            format!("Document changed during {} copy attempts", max_attempts.max(1)),
        ))
    }

    /// Update counter the document was published under.
    pub fn update(&self) -> i32 {
        self.update
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.text
    }

    /// Raw value bytes at `path`.
    pub fn lookup(&self, path: impl AsRef<str>) -> Option<&[u8]> {
        lookup(&self.text, path.as_ref())
    }

    /// Value at `path` as text; `None` when missing or not UTF-8.
    pub fn text(&self, path: impl AsRef<str>) -> Option<&str> {
        self.lookup(path).and_then(|value| std::str::from_utf8(value).ok())
    }

    /// Owned copy of the value at `path`, with invalid UTF-8 replaced.
    pub fn string(&self, path: impl AsRef<str>) -> Option<String> {
        self.lookup(path).map(|value| String::from_utf8_lossy(value).into_owned())
    }

    /// Leading integer of the value at `path`.
    pub fn int(&self, path: impl AsRef<str>) -> Option<i32> {
        self.text(path).and_then(parse_leading_int)
    }

    /// Leading number of the value at `path`.
    pub fn float(&self, path: impl AsRef<str>) -> Option<f32> {
        self.text(path).and_then(parse_leading_float)
    }
}
