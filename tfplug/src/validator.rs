//! Built-in attribute validators

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};
use regex::Regex;

/// Checks the character count of a string value
pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_most(max: usize) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("string length must be between {} and {}", min, max),
            (Some(min), None) => format!("string length must be at least {}", min),
            (None, Some(max)) => format!("string length must be at most {}", max),
            (None, None) => "any string length".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        if let Some(s) = request.config_value.value.as_str() {
            let len = s.chars().count();
            let too_short = self.min.is_some_and(|min| len < min);
            let too_long = self.max.is_some_and(|max| len > max);
            if too_short || too_long {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value Length",
                        format!(
                            "Attribute {} {}, got: {}",
                            request.path,
                            self.description(),
                            len
                        ),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

/// Checks a string value against a regular expression
pub struct StringPatternValidator {
    pattern: Result<Regex, regex::Error>,
    message: String,
}

impl StringPatternValidator {
    pub fn new(pattern: &str, message: &str) -> Self {
        Self {
            pattern: Regex::new(pattern),
            message: message.to_string(),
        }
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        match &self.pattern {
            Ok(re) => format!("value must match regular expression '{}'", re.as_str()),
            Err(_) => "value must match an invalid regular expression".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        let Some(s) = request.config_value.value.as_str() else {
            return ValidatorResponse { diagnostics };
        };

        match &self.pattern {
            Ok(re) if re.is_match(s) => {}
            Ok(_) => diagnostics.push(
                Diagnostic::error(
                    "Invalid Attribute Value Match",
                    format!("Attribute {} {}, got: {}", request.path, self.message, s),
                )
                .with_attribute(request.path),
            ),
            Err(e) => diagnostics.push(
                Diagnostic::error("Invalid validator pattern", e.to_string())
                    .with_attribute(request.path),
            ),
        }
        ValidatorResponse { diagnostics }
    }
}

/// Restricts a string value to a fixed set
pub struct StringOneOfValidator {
    pub values: Vec<String>,
}

impl StringOneOfValidator {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for StringOneOfValidator {
    fn description(&self) -> String {
        format!("value must be one of: {:?}", self.values)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        if let Some(s) = request.config_value.value.as_str() {
            if !self.values.iter().any(|v| v == s) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value Match",
                        format!("Attribute {} {}, got: {:?}", request.path, self.description(), s),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("value must be between {} and {}", min, max),
            (Some(min), None) => format!("value must be at least {}", min),
            (None, Some(max)) => format!("value must be at most {}", max),
            (None, None) => "any number".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        if let Some(n) = request.config_value.value.as_number() {
            if self.min.is_some_and(|min| n < min) || self.max.is_some_and(|max| n > max) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value",
                        format!("Attribute {} {}, got: {}", request.path, self.description(), n),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("list must contain between {} and {} elements", min, max),
            (Some(min), None) => format!("list must contain at least {} elements", min),
            (None, Some(max)) => format!("list must contain at most {} elements", max),
            (None, None) => "any list length".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        if let Dynamic::List(items) = &request.config_value.value {
            let len = items.len();
            if self.min.is_some_and(|min| len < min) || self.max.is_some_and(|max| len > max) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value",
                        format!("Attribute {} {}, got: {}", request.path, self.description(), len),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}
