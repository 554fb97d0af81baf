//! Per-section validation
//!
//! Sections report problems into a [`Checks`] collector scoped to their
//! name, so every error is addressed as `section.key`.

pub use crate::error::{Problem, ValidationError};
use std::fmt::Display;
use std::path::Path;

/// A named section of the config file
pub trait ConfigSection: Default {
    /// Table name in the TOML file
    const NAME: &'static str;

    /// Reports every invalid setting
    fn check(&self, checks: &mut Checks);

    /// Replaces this section's values with `other`'s
    fn merge(&mut self, other: Self);

    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut checks = Checks::for_section(Self::NAME);
        self.check(&mut checks);
        checks.finish()
    }
}

/// Collects validation errors of one section
#[derive(Debug)]
pub struct Checks {
    section: &'static str,
    errors: Vec<ValidationError>,
}

impl Checks {
    pub fn for_section(section: &'static str) -> Self {
        Self {
            section,
            errors: Vec::new(),
        }
    }

    fn reject(&mut self, key: &str, problem: Problem) -> &mut Self {
        self.errors.push(ValidationError {
            field: format!("{}.{}", self.section, key),
            problem,
        });
        self
    }

    /// `value` must lie in `min..=max`
    pub fn range<T>(&mut self, key: &str, value: T, min: T, max: T) -> &mut Self
    where
        T: PartialOrd + Display + Copy,
    {
        if value < min || value > max {
            return self.reject(
                key,
                Problem::OutOfRange {
                    min: min.to_string(),
                    max: max.to_string(),
                    got: value.to_string(),
                },
            );
        }
        self
    }

    pub fn min_chars(&mut self, key: &str, value: &str, min: usize) -> &mut Self {
        let got = value.chars().count();
        if got < min {
            return self.reject(key, Problem::TooShort { min, got });
        }
        self
    }

    /// `value` must be strictly below the setting `other`
    pub fn below<T>(&mut self, key: &str, value: T, other: &str, limit: T) -> &mut Self
    where
        T: PartialOrd + Display + Copy,
    {
        if value >= limit {
            let other = format!("{}.{}", self.section, other);
            return self.reject(
                key,
                Problem::NotBelow {
                    other,
                    limit: limit.to_string(),
                    got: value.to_string(),
                },
            );
        }
        self
    }

    pub fn path(&mut self, key: &str, value: &Path) -> &mut Self {
        if value.as_os_str().is_empty() {
            return self.reject(key, Problem::Empty);
        }
        self
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    pub fn finish(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds_are_inclusive() {
        let mut checks = Checks::for_section("client");
        checks.range("a", 1, 1, 20).range("b", 20, 1, 20);
        assert!(checks.finish().is_ok());

        let mut checks = Checks::for_section("client");
        checks.range("max_retries", 21, 1, 20);
        let errors = checks.finish().unwrap_err();
        assert_eq!(errors[0].field, "client.max_retries");
    }

    #[test]
    fn test_min_chars_counts_characters() {
        let mut checks = Checks::for_section("server");
        checks.min_chars("token_secret", "ééééé", 5);
        assert!(checks.finish().is_ok());

        let mut checks = Checks::for_section("server");
        checks.min_chars("token_secret", "short", 16);
        assert_eq!(
            checks.into_errors()[0].problem,
            Problem::TooShort { min: 16, got: 5 }
        );
    }

    #[test]
    fn test_below_names_the_other_setting() {
        let mut checks = Checks::for_section("server");
        checks.below("access_token_ttl_secs", 600, "refresh_token_ttl_secs", 600);
        let errors = checks.into_errors();
        assert_eq!(
            errors[0].to_string(),
            "server.access_token_ttl_secs must be below server.refresh_token_ttl_secs = 600 (got 600)"
        );
    }

    #[test]
    fn test_errors_accumulate() {
        let mut checks = Checks::for_section("server");
        checks
            .path("database_path", Path::new(""))
            .range("max_connections", 0u32, 1, 100);
        assert_eq!(checks.into_errors().len(), 2);
    }
}
