//! Coercion of raw textual parameter values into typed configuration values.
//!
//! Every origin of raw text (loaded `.int` lines, command-line overrides)
//! funnels through this one set of rules: empty input means the default,
//! `none` (any case) disables a field that accepts absence, recognized
//! values are normalized, and anything else falls back to the default with
//! a warning. The single exception is the radial point count, where a
//! non-numeric value aborts the whole setup instead of being coerced.

use itertools::Itertools;
use strum::IntoEnumIterator;

use crate::config::{
    ConfigError, DataSource, ErrorModel, RadialUnit, SplitMethod, DEFAULT_AUTOMASK,
    DEFAULT_RADIAL_POINTS,
};

type Result<T> = std::result::Result<T, ConfigError>;

fn accepted<E: IntoEnumIterator + std::fmt::Display>() -> String {
    E::iter().map(|v| v.to_string()).join(", ")
}

/// Data source; an unrecognized value is fatal
pub fn data_source(raw: &str) -> Result<DataSource> {
    DataSource::new(raw.trim())
}

/// Pixel splitting method; falls back to `full`
pub fn split_method(raw: &str) -> SplitMethod {
    let raw = raw.trim();
    if raw.is_empty() {
        return Default::default();
    }
    SplitMethod::new(raw).unwrap_or_else(|| {
        let default = SplitMethod::default();
        log::warn!(
            "pixel splitting method {raw:?} is not one of {}, using the default: {default}",
            accepted::<SplitMethod>()
        );
        default
    })
}

/// Radial unit; resolves the `tth` and `q` shorthands, falls back to `2th_deg`
pub fn unit(raw: &str) -> RadialUnit {
    let raw = raw.trim();
    if raw.is_empty() {
        return Default::default();
    }
    RadialUnit::new(raw).unwrap_or_else(|| {
        let default = RadialUnit::default();
        log::warn!(
            "x unit {raw:?} is not one of {}, using the default: {default}",
            accepted::<RadialUnit>()
        );
        default
    })
}

/// Number of radial bins; a non-numeric value is fatal, there is no fallback
pub fn radial_points(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_RADIAL_POINTS);
    }
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::RadialPoints(raw.to_string())),
    }
}

/// Radial or azimuthal range; falls back to the full range (absent)
///
/// Accepts a comma-separated pair of numbers, with or without surrounding
/// parentheses or brackets; `field` names the parameter in warnings.
pub fn range(raw: &str, field: &str) -> Option<(f64, f64)> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return None;
    }
    let inner = raw
        .trim_start_matches(['(', '['])
        .trim_end_matches([')', ']']);
    let bounds: Vec<&str> = inner.split(',').map(str::trim).collect();
    if bounds.len() != 2 {
        log::warn!(
            "{field} set to {} value(s), must provide a pair of values, using the full range",
            bounds.len()
        );
        return None;
    }
    let lower = bounds[0].parse::<f64>();
    let upper = bounds[1].parse::<f64>();
    match (lower, upper) {
        (Ok(lower), Ok(upper)) => Some((lower, upper)),
        (Err(_), _) => {
            log::warn!(
                "lower limit of {field} set to unaccepted value {:?}, using the full range",
                bounds[0]
            );
            None
        }
        (_, Err(_)) => {
            log::warn!(
                "upper limit of {field} set to unaccepted value {:?}, using the full range",
                bounds[1]
            );
            None
        }
    }
}

/// Automask threshold; `none` disables automasking, falls back to `-1e-10`
///
/// The disabled sentinel is checked before any numeric conversion, so
/// `none` always wins; after that any value parseable as a number becomes
/// the threshold.
pub fn automask(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(DEFAULT_AUTOMASK);
    }
    if raw.eq_ignore_ascii_case("none") {
        return None;
    }
    match raw.trim_matches(['\'', '"']).parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!(
                "automask value {raw:?} is not a number or \"None\", using the default: {DEFAULT_AUTOMASK:e}"
            );
            Some(DEFAULT_AUTOMASK)
        }
    }
}

/// Intensity error model; falls back to `none`
pub fn error_model(raw: &str) -> ErrorModel {
    let raw = raw.trim();
    if raw.is_empty() {
        return Default::default();
    }
    ErrorModel::new(raw).unwrap_or_else(|| {
        let default = ErrorModel::default();
        log::warn!(
            "intensity error model {raw:?} is not one of {}, using the default: {default}",
            accepted::<ErrorModel>()
        );
        default
    })
}

/// Optional mask file path; `none` (any case) or empty means no mask
pub fn mask_file(raw: &str) -> Option<std::path::PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(raw.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_default() {
        assert_eq!(split_method(""), SplitMethod::Full);
        assert_eq!(unit(""), RadialUnit::TwoThetaDeg);
        assert_eq!(radial_points("").unwrap(), 6000);
        assert_eq!(range("", "rad_range"), None);
        assert_eq!(automask(""), Some(-1e-10));
        assert_eq!(error_model(""), ErrorModel::None);
    }

    #[test]
    fn unrecognized_enums_fall_back() {
        assert_eq!(split_method("hexagonal"), SplitMethod::Full);
        assert_eq!(unit("parsec"), RadialUnit::TwoThetaDeg);
        assert_eq!(error_model("gaussian"), ErrorModel::None);
    }

    #[test]
    fn case_is_normalized() {
        assert_eq!(split_method("BBOX"), SplitMethod::Bbox);
        assert_eq!(unit("2TH_RAD"), RadialUnit::TwoThetaRad);
        assert_eq!(error_model("Poisson"), ErrorModel::Poisson);
        assert_eq!(data_source("nsls-ii").unwrap(), DataSource::NslsII);
    }

    #[test]
    fn unit_shorthands() {
        assert_eq!(unit("tth"), RadialUnit::TwoThetaDeg);
        assert_eq!(unit("q"), RadialUnit::QAngstrom);
        assert_eq!(unit("Q"), RadialUnit::QAngstrom);
    }

    #[test]
    fn radial_points_has_no_fallback() {
        assert!(radial_points("sixty").is_err());
        assert!(radial_points("0").is_err());
        assert!(radial_points("-10").is_err());
        assert_eq!(radial_points("3000").unwrap(), 3000);
    }

    #[test]
    fn range_pairs() {
        assert_eq!(range("0.0,15.4", "rad_range"), Some((0.0, 15.4)));
        assert_eq!(range("(0.0, 15.4)", "rad_range"), Some((0.0, 15.4)));
        assert_eq!(range("0,180", "azim_range"), Some((0.0, 180.0)));
        // single value, non-numeric bound and over-long literals all fall back
        assert_eq!(range("15.4", "rad_range"), None);
        assert_eq!(range("0.0,abc", "rad_range"), None);
        assert_eq!(range("xyz,15.4", "rad_range"), None);
        assert_eq!(range("1,2,3", "rad_range"), None);
        assert_eq!(range("None", "rad_range"), None);
    }

    #[test]
    fn automask_sentinel_beats_numbers() {
        assert_eq!(automask("none"), None);
        assert_eq!(automask("NONE"), None);
        assert_eq!(automask("-1e-10"), Some(-1e-10));
        assert_eq!(automask("0.5"), Some(0.5));
        assert_eq!(automask("'0.5'"), Some(0.5));
        assert_eq!(automask("below zero"), Some(-1e-10));
    }

    #[test]
    fn unknown_data_source_is_fatal() {
        assert!(data_source("DESY").is_err());
    }

    #[test]
    fn mask_path() {
        assert_eq!(mask_file("None"), None);
        assert_eq!(mask_file(""), None);
        assert_eq!(
            mask_file("/cal/mask.msk"),
            Some(std::path::PathBuf::from("/cal/mask.msk"))
        );
    }
}
