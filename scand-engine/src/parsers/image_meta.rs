//! `jpeg`/`png` plugin: dimensions via the `image` crate, EXIF/GPS via
//! `kamadak-exif`. Grounded on
//! `original_source/src/plugins/jpeg/lightmediascanner_jpeg.c` and
//! `_png.c`, merged into one plugin since both containers share the same
//! metadata shape in our schema.

use super::{ParseContext, ParsedMedia, ParserPlugin};
use crate::dlna;
use crate::error::{Result, ScanError};
use crate::storage::ImageMeta;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub struct ImageMetaPlugin;

fn container_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("jpeg"),
        "png" => Some("png"),
        _ => None,
    }
}

fn rational_to_degrees(values: &[exif::Rational]) -> Option<f64> {
    if values.len() != 3 {
        return None;
    }
    let deg = values[0].to_f64();
    let min = values[1].to_f64();
    let sec = values[2].to_f64();
    Some(deg + min / 60.0 + sec / 3600.0)
}

fn read_exif(path: &Path) -> Option<exif::Exif> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    exif::Reader::new().read_from_container(&mut reader).ok()
}

fn exif_string(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    exif.get_field(tag, exif::In::PRIMARY)
        .map(|f| f.display_value().to_string())
}

fn exif_orientation(exif: &exif::Exif) -> Option<i64> {
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(|v| v as i64)
}

fn exif_gps(exif: &exif::Exif) -> (Option<f64>, Option<f64>, Option<f64>) {
    let lat = exif
        .get_field(exif::Tag::GPSLatitude, exif::In::PRIMARY)
        .and_then(|f| match &f.value {
            exif::Value::Rational(v) => rational_to_degrees(v),
            _ => None,
        })
        .map(|deg| {
            let sign = exif
                .get_field(exif::Tag::GPSLatitudeRef, exif::In::PRIMARY)
                .map(|f| f.display_value().to_string())
                .map(|s| if s.starts_with('S') { -1.0 } else { 1.0 })
                .unwrap_or(1.0);
            deg * sign
        });
    let long = exif
        .get_field(exif::Tag::GPSLongitude, exif::In::PRIMARY)
        .and_then(|f| match &f.value {
            exif::Value::Rational(v) => rational_to_degrees(v),
            _ => None,
        })
        .map(|deg| {
            let sign = exif
                .get_field(exif::Tag::GPSLongitudeRef, exif::In::PRIMARY)
                .map(|f| f.display_value().to_string())
                .map(|s| if s.starts_with('W') { -1.0 } else { 1.0 })
                .unwrap_or(1.0);
            deg * sign
        });
    let alt = exif
        .get_field(exif::Tag::GPSAltitude, exif::In::PRIMARY)
        .and_then(|f| match &f.value {
            exif::Value::Rational(v) => v.first().map(|r| r.to_f64()),
            _ => None,
        });
    (lat, long, alt)
}

impl ParserPlugin for ImageMetaPlugin {
    fn name(&self) -> &'static str {
        "image_meta"
    }

    fn order(&self) -> i32 {
        30
    }

    fn categories(&self) -> &'static [&'static str] {
        &["image"]
    }

    fn matches(&self, path: &Path) -> bool {
        super::extension_lower(path)
            .and_then(|ext| container_for_extension(&ext).map(|_| ()))
            .is_some()
    }

    fn parse(&self, ctx: &ParseContext) -> Result<ParsedMedia> {
        let ext = super::extension_lower(ctx.path).unwrap_or_default();
        let container = container_for_extension(&ext)
            .ok_or_else(|| ScanError::ParseFailed("unsupported image extension".into()))?;

        let dims = image::image_dimensions(ctx.path)
            .map_err(|e| ScanError::ParseFailed(format!("image dimensions: {e}")))?;
        let (width, height) = (dims.0 as i64, dims.1 as i64);

        let exif = read_exif(ctx.path);
        let (title, date, orientation, gps_lat, gps_long, gps_alt) = match &exif {
            Some(exif) => (
                exif_string(exif, exif::Tag::ImageDescription)
                    .map(|s| ctx.charset.convert(s.as_bytes())),
                exif_string(exif, exif::Tag::DateTimeOriginal).and_then(|s| parse_exif_date(&s)),
                exif_orientation(exif),
                exif_gps(exif).0,
                exif_gps(exif).1,
                exif_gps(exif).2,
            ),
            None => (None, None, None, None, None, None),
        };

        let (profile, mime) = dlna::match_image(container, width, height).unwrap_or(("", ""));

        Ok(ParsedMedia::Image(ImageMeta {
            title,
            artist: None,
            date,
            width: Some(width),
            height: Some(height),
            orientation,
            gps_lat,
            gps_long,
            gps_alt,
            container: Some(container.into()),
            dlna_profile: (!profile.is_empty()).then(|| profile.into()),
            dlna_mime: (!mime.is_empty()).then(|| mime.into()),
        }))
    }
}

/// EXIF dates are `"YYYY:MM:DD HH:MM:SS"`; parsed to a unix timestamp, UTC.
fn parse_exif_date(value: &str) -> Option<i64> {
    let naive = chrono::NaiveDateTime::parse_from_str(value, "%Y:%m:%d %H:%M:%S").ok()?;
    Some(naive.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_detected_for_known_extensions() {
        assert_eq!(container_for_extension("jpg"), Some("jpeg"));
        assert_eq!(container_for_extension("jpeg"), Some("jpeg"));
        assert_eq!(container_for_extension("png"), Some("png"));
        assert_eq!(container_for_extension("gif"), None);
    }

    #[test]
    fn parses_exif_date_format() {
        let ts = parse_exif_date("2024:01:15 10:30:00").unwrap();
        assert!(ts > 0);
    }
}
