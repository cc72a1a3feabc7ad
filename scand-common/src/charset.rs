//! Byte-string to UTF-8 conversion for tag data read by parser plugins.
//!
//! Plugins hand this converter raw tag bytes plus, where the format
//! supplies one, an encoding hint (e.g. `UTF-16LE` for an ID3v2 frame with
//! a byte-order mark). The contract is: output is always valid UTF-8, or
//! an empty string — never an error.

use encoding_rs::Encoding;

/// Ordered list of candidate encodings plus the `check` and `fallback`
/// policy switches described in the scan engine's parser contract.
#[derive(Clone)]
pub struct CharsetConverter {
    candidates: Vec<&'static Encoding>,
    check_utf8_first: bool,
    fallback: bool,
}

impl Default for CharsetConverter {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            check_utf8_first: true,
            fallback: true,
        }
    }
}

impl CharsetConverter {
    /// New converter with no registered encodings and both `check` and
    /// `fallback` enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate encoding by its IANA label (e.g. `"windows-1252"`).
    /// Unknown labels are silently ignored, matching the original's
    /// tolerance of unrecognized `-C`/`--charset` arguments.
    pub fn add(mut self, label: &str) -> Self {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            self.candidates.push(enc);
        }
        self
    }

    /// Enable/disable the "try as UTF-8 first" shortcut.
    pub fn with_check(mut self, check: bool) -> Self {
        self.check_utf8_first = check;
        self
    }

    /// Enable/disable the lossy-replace fallback when no candidate decodes.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Convert `bytes` to UTF-8 following the three-step policy:
    /// 1. If `check` is enabled, try decoding as UTF-8 unchanged.
    /// 2. Otherwise try each registered encoding in registration order.
    /// 3. If all fail and `fallback` is enabled, lossy-decode and replace
    ///    any remaining non-printable byte with `?`.
    pub fn convert(&self, bytes: &[u8]) -> String {
        self.convert_hinted(bytes, None)
    }

    /// Same as [`convert`](Self::convert) but tries `hint` (an encoding
    /// label supplied by the plugin, e.g. from an ID3v2 BOM) before the
    /// registered candidate list.
    pub fn convert_hinted(&self, bytes: &[u8], hint: Option<&str>) -> String {
        if bytes.is_empty() {
            return String::new();
        }

        if self.check_utf8_first {
            if let Ok(s) = std::str::from_utf8(bytes) {
                return s.to_string();
            }
        }

        if let Some(hint) = hint {
            if let Some(enc) = Encoding::for_label(hint.as_bytes()) {
                if let Some(s) = decode_strict(enc, bytes) {
                    return s;
                }
            }
        }

        for enc in &self.candidates {
            if let Some(s) = decode_strict(enc, bytes) {
                return s;
            }
        }

        if self.fallback {
            return replace_non_printable(&lossy_decode(bytes));
        }

        String::new()
    }
}

/// Decode with `encoding`, failing (returning `None`) if the bytes contain
/// any malformed sequence for that encoding — "strict" in the sense that a
/// replacement character anywhere means this candidate didn't actually fit.
fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let (cow, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(cow.into_owned())
    }
}

fn lossy_decode(bytes: &[u8]) -> String {
    let (cow, _, _) = encoding_rs::UTF_8.decode(bytes);
    cow.into_owned()
}

/// Second fallback stage: `str::from_utf8_lossy`-style decoding only
/// replaces invalid *byte sequences*; it leaves valid-but-non-printable
/// bytes (most control characters) untouched. Overwrite those with `?` too,
/// matching the two-stage fallback of the reference implementation.
fn replace_non_printable(decoded: &str) -> String {
    decoded
        .chars()
        .map(|c| {
            if c == '\u{FFFD}' || (c.is_control() && c != '\n' && c != '\t') {
                '?'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_passes_through() {
        let conv = CharsetConverter::new();
        assert_eq!(conv.convert(b"hello world"), "hello world");
    }

    #[test]
    fn valid_utf8_bypasses_candidate_list() {
        let conv = CharsetConverter::new().add("windows-1252");
        let bytes = "caf\u{e9}".as_bytes();
        assert_eq!(conv.convert(bytes), "caf\u{e9}");
    }

    #[test]
    fn latin1_candidate_decodes_high_bytes() {
        // 0xE9 in windows-1252 is U+00E9 (e acute); invalid as UTF-8 alone.
        let bytes = [0x63, 0x61, 0x66, 0xE9];
        let conv = CharsetConverter::new().with_check(false).add("windows-1252");
        assert_eq!(conv.convert(&bytes), "caf\u{e9}");
    }

    #[test]
    fn hint_is_tried_before_candidates() {
        // UTF-16LE "ab" = 61 00 62 00
        let bytes = [0x61, 0x00, 0x62, 0x00];
        let conv = CharsetConverter::new().with_check(false);
        assert_eq!(conv.convert_hinted(&bytes, Some("UTF-16LE")), "ab");
    }

    #[test]
    fn no_candidates_and_no_fallback_returns_empty() {
        let bytes = [0xFF, 0xFE, 0x00, 0x01];
        let conv = CharsetConverter::new().with_check(false).with_fallback(false);
        assert_eq!(conv.convert(&bytes), "");
    }

    #[test]
    fn fallback_replaces_invalid_and_nonprintable_bytes() {
        let bytes = [b'a', 0x01, 0xFF];
        let conv = CharsetConverter::new().with_check(false).with_fallback(true);
        assert_eq!(conv.convert(&bytes), "a??");
    }
}
