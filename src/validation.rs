//! Feature Validation Module
//!
//! Data checks run on a truncated feature frame before it is written, so
//! malformed rows are reported instead of flowing into the exported arrays.
//!
//! # Validation Categories
//!
//! 1. **Feature Ranges**: NaN/Inf in any kept column (error)
//! 2. **Date Ordering**: strictly increasing dates (error)
//! 3. **Price Sanity**: high >= low (warning)
//! 4. **Volume Sanity**: non-negative volume (warning)
//!
//! # Usage
//!
//! ```ignore
//! use stock_features::validation::check_data;
//!
//! let result = check_data(&frame)?; // Err on any error-level finding
//! for warning in result.warnings() {
//!     println!("Warning: {}", warning);
//! }
//! ```

use crate::error::{PipelineError, Result};
use crate::features::FeatureFrame;
use crate::price::PriceField;
use std::fmt;

/// Validation result for a single check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    /// Data is valid
    Valid,
    /// Data has minor issues (warnings)
    Warning(String),
    /// Data has serious issues (errors)
    Error(String),
}

impl ValidationLevel {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationLevel::Valid)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationLevel::Warning(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationLevel::Error(_))
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationLevel::Valid => write!(f, "Valid"),
            ValidationLevel::Warning(msg) => write!(f, "Warning: {msg}"),
            ValidationLevel::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Aggregated validation result.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    results: Vec<(String, ValidationLevel)>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, check_name: &str, level: ValidationLevel) {
        self.results.push((check_name.to_string(), level));
    }

    /// Check if all validations passed (no errors or warnings).
    pub fn is_valid(&self) -> bool {
        self.results.iter().all(|(_, level)| level.is_valid())
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_error())
    }

    pub fn has_warnings(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_warning())
    }

    /// Warnings as `check: message`.
    pub fn warnings(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(name, level)| match level {
                ValidationLevel::Warning(msg) => Some(format!("{name}: {msg}")),
                _ => None,
            })
            .collect()
    }

    /// Errors as `check: message`.
    pub fn errors(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(name, level)| match level {
                ValidationLevel::Error(msg) => Some(format!("{name}: {msg}")),
                _ => None,
            })
            .collect()
    }

    pub fn all_results(&self) -> &[(String, ValidationLevel)] {
        &self.results
    }

    pub fn check_count(&self) -> usize {
        self.results.len()
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|(_, l)| l.is_valid()).count()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passed = self.passed_count();
        let total = self.check_count();
        writeln!(f, "Validation: {passed}/{total} checks passed")?;

        for (name, level) in &self.results {
            if !level.is_valid() {
                writeln!(f, "  - {name}: {level}")?;
            }
        }

        Ok(())
    }
}

/// Configuration for feature validation.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Check for NaN/Inf values in every column
    pub check_nan_inf: bool,

    /// Check that dates strictly increase
    pub check_date_order: bool,

    /// Check high >= low
    pub check_price_range: bool,

    /// Check volume >= 0
    pub check_volume: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_nan_inf: true,
            check_date_order: true,
            check_price_range: true,
            check_volume: true,
        }
    }
}

/// Validator for feature frames.
#[derive(Debug, Clone, Default)]
pub struct FeatureValidator {
    config: ValidationConfig,
}

impl FeatureValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Run all enabled checks on a frame.
    pub fn validate_frame(&self, frame: &FeatureFrame) -> ValidationResult {
        let mut result = ValidationResult::new();

        if frame.is_empty() {
            result.add(
                "row_count",
                ValidationLevel::Warning("frame has no rows".to_string()),
            );
            return result;
        }

        if self.config.check_nan_inf {
            self.validate_finite(frame, &mut result);
        }
        if self.config.check_date_order {
            self.validate_date_order(frame, &mut result);
        }
        if self.config.check_price_range {
            self.validate_price_range(frame, &mut result);
        }
        if self.config.check_volume {
            self.validate_volume(frame, &mut result);
        }

        result
    }

    fn validate_finite(&self, frame: &FeatureFrame, result: &mut ValidationResult) {
        let mut all_finite = true;
        for name in frame.column_names() {
            let Some(values) = frame.column(name) else {
                continue;
            };
            let bad: Vec<usize> = values
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_finite())
                .map(|(i, _)| i)
                .collect();
            if let Some(&first) = bad.first() {
                all_finite = false;
                result.add(
                    &format!("finite_{name}"),
                    ValidationLevel::Error(format!(
                        "{} non-finite value(s) in '{}', first on {}",
                        bad.len(),
                        name,
                        frame.dates()[first]
                    )),
                );
            }
        }
        if all_finite {
            result.add("nan_inf_check", ValidationLevel::Valid);
        }
    }

    fn validate_date_order(&self, frame: &FeatureFrame, result: &mut ValidationResult) {
        let violation = frame.dates().windows(2).find(|w| w[1] <= w[0]);
        match violation {
            Some(w) => result.add(
                "date_order",
                ValidationLevel::Error(format!("date {} does not follow {}", w[1], w[0])),
            ),
            None => result.add("date_order", ValidationLevel::Valid),
        }
    }

    fn validate_price_range(&self, frame: &FeatureFrame, result: &mut ValidationResult) {
        let (Some(high), Some(low)) = (
            frame.column(PriceField::High.column_name()),
            frame.column(PriceField::Low.column_name()),
        ) else {
            return;
        };
        let crossed = high.iter().zip(low).filter(|(h, l)| h < l).count();
        if crossed > 0 {
            result.add(
                "price_range",
                ValidationLevel::Warning(format!("{crossed} row(s) with high < low")),
            );
        } else {
            result.add("price_range", ValidationLevel::Valid);
        }
    }

    fn validate_volume(&self, frame: &FeatureFrame, result: &mut ValidationResult) {
        let Some(volume) = frame.column(PriceField::Volume.column_name()) else {
            return;
        };
        let negative = volume.iter().filter(|&&v| v < 0.0).count();
        if negative > 0 {
            result.add(
                "volume",
                ValidationLevel::Warning(format!("{negative} row(s) with negative volume")),
            );
        } else {
            result.add("volume", ValidationLevel::Valid);
        }
    }
}

/// Validate a frame before it is written.
///
/// Warnings are logged; any error-level finding fails the run.
pub fn check_data(frame: &FeatureFrame) -> Result<ValidationResult> {
    let result = FeatureValidator::new().validate_frame(frame);
    for warning in result.warnings() {
        tracing::warn!("{}", warning);
    }
    if result.has_errors() {
        return Err(PipelineError::Validation(result.errors().join("; ")));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn frame(high: Vec<f64>, low: Vec<f64>, volume: Vec<f64>) -> FeatureFrame {
        let start = NaiveDate::from_ymd_opt(2013, 3, 1).unwrap();
        let dates = (0..high.len())
            .map(|i| start + chrono::Days::new(i as u64))
            .collect();
        let mut frame = FeatureFrame::new(dates);
        frame.push_column("High", high).unwrap();
        frame.push_column("Low", low).unwrap();
        frame.push_column("Volume", volume).unwrap();
        frame
    }

    #[test]
    fn test_clean_frame_passes() {
        let f = frame(vec![2.0, 3.0], vec![1.0, 2.0], vec![10.0, 0.0]);
        let result = check_data(&f).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.passed_count(), result.check_count());
    }

    #[test]
    fn test_nan_is_error() {
        let f = frame(vec![2.0, f64::NAN], vec![1.0, 2.0], vec![10.0, 5.0]);
        let result = FeatureValidator::new().validate_frame(&f);
        assert!(result.has_errors());
        assert!(result.errors()[0].contains("'High'"));
        assert!(matches!(check_data(&f), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_price_sanity_is_warning() {
        let f = frame(vec![1.0, 3.0], vec![2.0, 2.0], vec![-1.0, 5.0]);
        let result = check_data(&f).unwrap();
        assert!(result.has_warnings());
        assert!(!result.has_errors());
        assert_eq!(result.warnings().len(), 2);
    }

    #[test]
    fn test_date_order() {
        let d = NaiveDate::from_ymd_opt(2013, 3, 1).unwrap();
        let mut f = FeatureFrame::new(vec![d, d]);
        f.push_column("Close", vec![1.0, 1.0]).unwrap();
        let result = FeatureValidator::new().validate_frame(&f);
        assert!(result.errors().iter().any(|e| e.starts_with("date_order")));
    }

    #[test]
    fn test_disabled_checks() {
        let f = frame(vec![f64::NAN], vec![2.0], vec![-1.0]);
        let validator = FeatureValidator::with_config(ValidationConfig {
            check_nan_inf: false,
            check_volume: false,
            ..Default::default()
        });
        let result = validator.validate_frame(&f);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_empty_frame_warns() {
        let result = FeatureValidator::new().validate_frame(&FeatureFrame::default());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_display() {
        let f = frame(vec![1.0], vec![2.0], vec![1.0]);
        let text = FeatureValidator::new().validate_frame(&f).to_string();
        assert!(text.contains("checks passed"));
        assert!(text.contains("price_range"));
    }
}
