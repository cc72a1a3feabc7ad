//! DLNA profile rule engine.
//!
//! Static, domain-partitioned rule tables matched first-match-wins against
//! the metadata a parser plugin extracted. Every constraint field is an
//! `Option`/`Option<RangeInclusive<_>>` rather than a bare number or range,
//! so "this rule doesn't care about sampling rate" is never confused with
//! "this rule requires sampling rate == 0" — the nullable-as-don't-care
//! semantics the rule tables depend on. Ported, as a representative subset,
//! from `original_source/src/lib/lightmediascanner_dlna_rules.c`.

mod rules;

pub use rules::{AUDIO_RULES, IMAGE_RULES, VIDEO_RULES};

use std::ops::RangeInclusive;

/// Video framerates are compared with a 0.1fps tolerance: 29.97 and 30.0
/// are the same rule bucket.
pub const FRAMERATE_EPSILON: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct AudioRule {
    pub container: Option<&'static str>,
    pub codec: Option<&'static str>,
    pub channels: Option<RangeInclusive<i64>>,
    pub sampling_rate: Option<RangeInclusive<i64>>,
    pub bitrate: Option<RangeInclusive<i64>>,
    pub profile: &'static str,
    pub mime: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageRule {
    pub container: Option<&'static str>,
    pub width: Option<RangeInclusive<i64>>,
    pub height: Option<RangeInclusive<i64>>,
    pub profile: &'static str,
    pub mime: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct VideoRule {
    pub container: Option<&'static str>,
    pub codec: Option<&'static str>,
    pub width: Option<RangeInclusive<i64>>,
    pub height: Option<RangeInclusive<i64>>,
    pub framerate: Option<f64>,
    /// MPEG-TS/PS packet size in bytes (188 vs 192), evaluated before any
    /// other stream predicate since it decides PS vs TS at the container
    /// level rather than describing the stream itself.
    pub packet_size: Option<i64>,
    pub bitrate: Option<RangeInclusive<i64>>,
    pub pixel_aspect_ratio: Option<&'static str>,
    pub profile_name: Option<&'static str>,
    pub level: Option<&'static str>,
    pub profile: &'static str,
    pub mime: &'static str,
}

fn in_range(value: i64, range: &Option<RangeInclusive<i64>>) -> bool {
    match range {
        Some(r) => r.contains(&value),
        None => true,
    }
}

fn matches_str(value: &str, candidate: Option<&str>) -> bool {
    match candidate {
        Some(expected) => value.eq_ignore_ascii_case(expected),
        None => true,
    }
}

/// Split a parser-supplied codec string of the form `<codec>-p<PROFILE>-l<LEVEL>`
/// into its bare codec, profile, and level parts. Any suffix part that's
/// absent yields `None` for that component.
pub fn split_codec_profile_level(codec: &str) -> (&str, Option<&str>, Option<&str>) {
    let mut profile = None;
    let mut level = None;
    let mut base_end = codec.len();

    if let Some(l_idx) = codec.rfind("-l") {
        level = Some(&codec[l_idx + 2..]);
        base_end = base_end.min(l_idx);
    }
    if let Some(p_idx) = codec.rfind("-p") {
        if p_idx < base_end {
            let end = level.map(|_| codec[p_idx..].find("-l").map(|i| p_idx + i)).flatten().unwrap_or(codec.len());
            profile = Some(&codec[p_idx + 2..end]);
            base_end = base_end.min(p_idx);
        }
    }

    (&codec[..base_end], profile, level)
}

pub fn match_audio(
    container: &str,
    codec: &str,
    channels: Option<i64>,
    sampling_rate: Option<i64>,
    bitrate: Option<i64>,
) -> Option<(&'static str, &'static str)> {
    AUDIO_RULES.iter().find_map(|rule| {
        if !matches_str(container, rule.container) {
            return None;
        }
        if !matches_str(codec, rule.codec) {
            return None;
        }
        if let Some(value) = channels {
            if !in_range(value, &rule.channels) {
                return None;
            }
        } else if rule.channels.is_some() {
            return None;
        }
        if let Some(value) = sampling_rate {
            if !in_range(value, &rule.sampling_rate) {
                return None;
            }
        } else if rule.sampling_rate.is_some() {
            return None;
        }
        if let Some(value) = bitrate {
            if !in_range(value, &rule.bitrate) {
                return None;
            }
        } else if rule.bitrate.is_some() {
            return None;
        }
        Some((rule.profile, rule.mime))
    })
}

pub fn match_image(
    container: &str,
    width: i64,
    height: i64,
) -> Option<(&'static str, &'static str)> {
    IMAGE_RULES.iter().find_map(|rule| {
        if !matches_str(container, rule.container) {
            return None;
        }
        if !in_range(width, &rule.width) || !in_range(height, &rule.height) {
            return None;
        }
        Some((rule.profile, rule.mime))
    })
}

#[allow(clippy::too_many_arguments)]
pub fn match_video(
    container: &str,
    codec: &str,
    width: Option<i64>,
    height: Option<i64>,
    framerate: Option<f64>,
    packet_size: Option<i64>,
    bitrate: Option<i64>,
    pixel_aspect_ratio: Option<&str>,
) -> Option<(&'static str, &'static str)> {
    let (bare_codec, profile, level) = split_codec_profile_level(codec);
    VIDEO_RULES.iter().find_map(|rule| {
        // packet_size decides PS vs TS container framing, so it's checked
        // before any predicate that only makes sense once that's settled.
        match (packet_size, rule.packet_size) {
            (_, None) => {}
            (Some(value), Some(expected)) if value == expected => {}
            _ => return None,
        }
        if !matches_str(container, rule.container) {
            return None;
        }
        if !matches_str(bare_codec, rule.codec) {
            return None;
        }
        if let Some(value) = width {
            if !in_range(value, &rule.width) {
                return None;
            }
        } else if rule.width.is_some() {
            return None;
        }
        if let Some(value) = height {
            if !in_range(value, &rule.height) {
                return None;
            }
        } else if rule.height.is_some() {
            return None;
        }
        if let (Some(actual), Some(expected)) = (framerate, rule.framerate) {
            if (actual - expected).abs() > FRAMERATE_EPSILON {
                return None;
            }
        } else if rule.framerate.is_some() && framerate.is_none() {
            return None;
        }
        if let Some(value) = bitrate {
            if !in_range(value, &rule.bitrate) {
                return None;
            }
        } else if rule.bitrate.is_some() {
            return None;
        }
        if !matches_opt_str(pixel_aspect_ratio, rule.pixel_aspect_ratio) {
            return None;
        }
        if !matches_opt_str(profile, rule.profile_name) {
            return None;
        }
        if !matches_opt_str(level, rule.level) {
            return None;
        }
        Some((rule.profile, rule.mime))
    })
}

/// Like [`matches_str`], but the candidate may itself be absent (a codec
/// string with no `-p`/`-l` suffix never matches a rule that requires one).
fn matches_opt_str(value: Option<&str>, candidate: Option<&str>) -> bool {
    match (value, candidate) {
        (_, None) => true,
        (Some(value), Some(expected)) => value.eq_ignore_ascii_case(expected),
        (None, Some(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_codec_profile_and_level() {
        let (codec, profile, level) = split_codec_profile_level("h264-pHigh-l4.1");
        assert_eq!(codec, "h264");
        assert_eq!(profile, Some("High"));
        assert_eq!(level, Some("4.1"));
    }

    #[test]
    fn splits_bare_codec_with_no_suffix() {
        let (codec, profile, level) = split_codec_profile_level("mp3");
        assert_eq!(codec, "mp3");
        assert_eq!(profile, None);
        assert_eq!(level, None);
    }

    #[test]
    fn first_match_wins_for_audio() {
        let result = match_audio("mp3", "mp3", Some(2), Some(44100), Some(128000));
        assert!(result.is_some());
    }

    #[test]
    fn unset_rule_field_matches_any_value() {
        let a = match_audio("mp3", "mp3", Some(1), Some(8000), Some(8000));
        let b = match_audio("mp3", "mp3", Some(2), Some(48000), Some(320000));
        assert_eq!(a.map(|(p, _)| p), b.map(|(p, _)| p));
    }

    #[test]
    fn framerate_within_epsilon_matches() {
        let result = match_video(
            "mpeg", "mpeg2", Some(720), Some(480), Some(29.97), Some(2_048), None, None,
        );
        assert!(result.is_some());
    }

    #[test]
    fn packet_size_mismatch_rejects_before_other_predicates() {
        let result = match_video(
            "mpeg", "mpeg2", Some(720), Some(480), Some(29.97), Some(188), None, None,
        );
        assert!(result.is_none());
    }

    #[test]
    fn profile_and_level_suffix_must_match_the_rule() {
        let result = match_video(
            "mp4", "h264-pHigh-l4.1", Some(1280), Some(720), None, None, None, None,
        );
        assert!(result.is_some());

        let baseline = match_video(
            "mp4", "h264-pBaseline-l3.0", Some(1280), Some(720), None, None, None, None,
        );
        assert!(baseline.is_none());
    }
}
