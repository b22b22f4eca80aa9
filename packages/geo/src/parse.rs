//! Location text parsing.
//!
//! Submitted locations come in several shapes:
//! - Pasted coordinate pairs: `"37.7749, -122.4194"`
//! - Shared maps URLs: `"https://maps.google.com/?q=37.7749,-122.4194"`
//! - Free text that happens to contain numbers: `"mile 42 on route 9"`
//!
//! Parsing tries a strict decimal-degree pair first, then a `q`/`query`
//! URL parameter, then a loose scan for any two decimal numbers. The loose
//! scan keeps the first two numbers it finds whatever they mean, so text
//! with two unrelated numbers can be read as a coordinate; callers treat a
//! parse as a best-effort hint, not ground truth.

use regex::Regex;
use std::sync::LazyLock;

use crate::{CoordinateError, NormalizedCoordinate};

/// Regex for a signed decimal-degree pair: latitude with 1-2 integer digits,
/// longitude with 1-3, both with a fractional part.
static DECIMAL_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?[0-9]{1,2}\.[0-9]+)[ \t]*,[ \t]*(-?[0-9]{1,3}\.[0-9]+)").expect("valid regex")
});

/// Regex for a single signed decimal number with 1-3 integer digits and an
/// optional fraction, used by the loose scan.
static DECIMAL_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[0-9]{1,3}(?:\.[0-9]+)?").expect("valid regex"));

/// Parses free-form location text into a normalized coordinate.
///
/// Strategies are tried in order and the first success wins:
/// 1. Strict decimal-degree pair anywhere in the text.
/// 2. For URL-shaped input, the strict pair against the `q` or `query`
///    parameter value.
/// 3. Loose scan: the first two decimal numbers in the text, first as
///    latitude, second as longitude.
///
/// # Errors
///
/// Returns [`CoordinateError::OutOfRange`] when a pair was extracted but
/// fell outside valid latitude/longitude ranges, and
/// [`CoordinateError::Unparsable`] when no strategy found a pair at all.
pub fn parse_location(raw: &str) -> Result<NormalizedCoordinate, CoordinateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoordinateError::Unparsable {
            input: raw.to_string(),
        });
    }

    let mut out_of_range = None;

    match decimal_pair(trimmed) {
        Ok(coord) => return Ok(coord),
        Err(err @ CoordinateError::OutOfRange { .. }) => out_of_range = Some(err),
        Err(CoordinateError::Unparsable { .. }) => {}
    }

    if let Some(target) = url_query_target(trimmed) {
        match decimal_pair(&target) {
            Ok(coord) => return Ok(coord),
            Err(err @ CoordinateError::OutOfRange { .. }) => out_of_range = Some(err),
            Err(CoordinateError::Unparsable { .. }) => {}
        }
    }

    match number_scan(trimmed) {
        Ok(coord) => return Ok(coord),
        Err(err @ CoordinateError::OutOfRange { .. }) => out_of_range = Some(err),
        Err(CoordinateError::Unparsable { .. }) => {}
    }

    Err(out_of_range.unwrap_or_else(|| CoordinateError::Unparsable {
        input: raw.to_string(),
    }))
}

/// Strict strategy: a decimal-degree pair separated by a comma.
fn decimal_pair(input: &str) -> Result<NormalizedCoordinate, CoordinateError> {
    let Some(caps) = DECIMAL_PAIR_RE.captures(input) else {
        return Err(CoordinateError::Unparsable {
            input: input.to_string(),
        });
    };

    let latitude = parse_f64(&caps[1], input)?;
    let longitude = parse_f64(&caps[2], input)?;
    NormalizedCoordinate::new(latitude, longitude)
}

/// Loose strategy: the first two decimal numbers in the text, whatever
/// they are.
fn number_scan(input: &str) -> Result<NormalizedCoordinate, CoordinateError> {
    let mut numbers = DECIMAL_NUMBER_RE.find_iter(input);
    let (Some(first), Some(second)) = (numbers.next(), numbers.next()) else {
        return Err(CoordinateError::Unparsable {
            input: input.to_string(),
        });
    };

    let latitude = parse_f64(first.as_str(), input)?;
    let longitude = parse_f64(second.as_str(), input)?;
    NormalizedCoordinate::new(latitude, longitude)
}

/// For URL-shaped input, returns the value of the first `q` or `query`
/// parameter with the percent-encoded comma restored.
fn url_query_target(input: &str) -> Option<String> {
    if !input.starts_with("http://") && !input.starts_with("https://") {
        return None;
    }

    let (_, query) = input.split_once('?')?;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == "q" || key == "query" {
            // Maps links percent-encode the comma between lat and lon.
            return Some(value.replace("%2C", ",").replace("%2c", ","));
        }
    }
    None
}

fn parse_f64(text: &str, input: &str) -> Result<f64, CoordinateError> {
    text.parse().map_err(|_| CoordinateError::Unparsable {
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_decimal_pair() {
        let coord = parse_location("37.7749, -122.4194").unwrap();
        assert_eq!(coord.to_string(), "37.774900,-122.419400");
    }

    #[test]
    fn parses_pair_without_space() {
        let coord = parse_location("37.7749,-122.4194").unwrap();
        assert_eq!(coord.to_string(), "37.774900,-122.419400");
    }

    #[test]
    fn parses_pair_embedded_in_text() {
        let coord = parse_location("near 37.7749, -122.4194 by the park").unwrap();
        assert_eq!(coord.to_string(), "37.774900,-122.419400");
    }

    #[test]
    fn rejects_plain_text() {
        assert!(matches!(
            parse_location("not a place"),
            Err(CoordinateError::Unparsable { .. })
        ));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_location("   ").is_err());
    }

    #[test]
    fn extracts_q_parameter_from_url() {
        let coord = parse_location("https://maps.google.com/?q=37.7749,-122.4194").unwrap();
        assert_eq!(coord.to_string(), "37.774900,-122.419400");
    }

    #[test]
    fn extracts_percent_encoded_q_parameter() {
        let coord =
            parse_location("https://www.google.com/maps?q=37.7749%2C-122.4194&z=15").unwrap();
        assert_eq!(coord.to_string(), "37.774900,-122.419400");
    }

    #[test]
    fn extracts_query_parameter_from_url() {
        let coord =
            parse_location("https://example.com/search?query=40.7128,-74.0060").unwrap();
        assert_eq!(coord.to_string(), "40.712800,-74.006000");
    }

    #[test]
    fn falls_back_to_number_scan() {
        let coord = parse_location("lat 37.7749 lon -122.4194").unwrap();
        assert_eq!(coord.to_string(), "37.774900,-122.419400");
    }

    #[test]
    fn number_scan_accepts_integers() {
        let coord = parse_location("37, -122").unwrap();
        assert_eq!(coord.to_string(), "37.000000,-122.000000");
    }

    #[test]
    fn number_scan_grabs_first_two_numbers() {
        // Known weakness kept on purpose: unrelated numbers read as a pair.
        let coord = parse_location("engine 3 responded to 12 Main St").unwrap();
        assert_eq!(coord.to_string(), "3.000000,12.000000");
    }

    #[test]
    fn rejects_out_of_range_pair() {
        assert!(matches!(
            parse_location("95.5, 10.0"),
            Err(CoordinateError::OutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        assert!(matches!(
            parse_location("37.7749, -922.4194"),
            Err(CoordinateError::OutOfRange { .. })
        ));
    }
}
