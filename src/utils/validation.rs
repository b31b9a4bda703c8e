use crate::utils::error::{InferenceError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(InferenceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(InferenceError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(InferenceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(InferenceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(InferenceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// 價格來源可以是 http(s) URL 或本機路徑
pub fn validate_price_source(field_name: &str, source: &str) -> Result<()> {
    if is_remote_source(source) {
        validate_url(field_name, source)
    } else {
        validate_path(field_name, source)
    }
}

/// URL scheme 不分大小寫；無法解析的 `http(s)://` 仍視為遠端，交給 `validate_url` 報錯
pub fn is_remote_source(source: &str) -> bool {
    match Url::parse(source) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => source
            .split_once("://")
            .map(|(scheme, _)| {
                scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
            })
            .unwrap_or(false),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(InferenceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_positive_float(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(InferenceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value must be a finite number greater than zero".to_string(),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| InferenceError::MissingConfigError {
            field: field_name.to_string(),
        })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(InferenceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(InferenceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Float range check that also rejects NaN and infinities.
pub fn validate_float_range(field_name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(InferenceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value must be a finite number".to_string(),
        });
    }
    validate_range(field_name, value, min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("market.source", "https://example.com/prices.csv").is_ok());
        assert!(validate_url("market.source", "http://example.com").is_ok());
        assert!(validate_url("market.source", "").is_err());
        assert!(validate_url("market.source", "invalid-url").is_err());
        assert!(validate_url("market.source", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_price_source() {
        assert!(validate_price_source("market.source", "./data/financial/RIO.csv").is_ok());
        assert!(validate_price_source("market.source", "https://prices.example.com/RIO").is_ok());
        assert!(validate_price_source("market.source", "https://").is_err());
        assert!(validate_price_source("market.source", "").is_err());
        assert!(validate_price_source("market.source", "HTTPS://").is_err());
    }

    #[test]
    fn test_is_remote_source_ignores_scheme_case() {
        assert!(is_remote_source("https://prices.example.com/FCX.csv"));
        assert!(is_remote_source("HTTPS://prices.example.com/FCX.csv"));
        assert!(is_remote_source("Http://prices.example.com/FCX.csv"));
        assert!(!is_remote_source("./data/financial/FCX.csv"));
        assert!(!is_remote_source("/data/http_prices.csv"));
        assert!(!is_remote_source("ftp://prices.example.com/FCX.csv"));
    }

    #[test]
    fn test_validate_positive_float() {
        assert!(validate_positive_float("volume.pixel_area_m2", 100.0).is_ok());
        assert!(validate_positive_float("volume.pixel_area_m2", 0.0).is_err());
        assert!(validate_positive_float("volume.pixel_area_m2", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("render.significance_ratio", 0.1, 0.0, 1.0).is_ok());
        assert!(validate_range("render.significance_ratio", 1.5, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_validate_float_range_rejects_non_finite() {
        assert!(validate_float_range("render.significance_ratio", 0.1, 0.0, 1.0).is_ok());
        assert!(validate_float_range("render.significance_ratio", 1.0, 0.0, 1.0).is_ok());
        assert!(validate_float_range("render.significance_ratio", f64::NAN, 0.0, 1.0).is_err());
        assert!(
            validate_float_range("render.significance_ratio", f64::INFINITY, 0.0, 1.0).is_err()
        );
        assert!(validate_float_range("render.significance_ratio", -0.5, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("concurrent_loads", 4, 1).is_ok());
        assert!(validate_positive_number("concurrent_loads", 0, 1).is_err());
    }
}
