//! Case conventions
//!
//! A model carries two conventions: one for its own field names and one for
//! the database columns. Converting a field for SQL applies the database
//! convention; converting a fetched column key back applies the model
//! convention.

use crate::errors::EngineError;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

use heck::{ToLowerCamelCase, ToSnakeCase};

/// Mapping rule between model field names and database column names
#[derive(Clone)]
pub enum CaseConvention {
    /// `user_id` -> `userId`
    Camel,
    /// `userId` -> `user_id`
    Snake,
    /// Names pass through unchanged
    None,
    /// Regex find/replace over the whole name
    Pattern { regex: Regex, replacement: String },
    /// Arbitrary caller-supplied conversion
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl CaseConvention {
    /// Build a `Pattern` convention, validating the regex up front
    pub fn pattern(regex: &str, replacement: &str) -> Result<Self, EngineError> {
        let regex = Regex::new(regex)
            .map_err(|e| EngineError::Configuration(format!("Invalid case pattern: {e}")))?;
        Ok(Self::Pattern {
            regex,
            replacement: replacement.to_string(),
        })
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Convert a name into this convention
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Camel => name.to_lower_camel_case(),
            Self::Snake => name.to_snake_case(),
            Self::None => name.to_string(),
            Self::Pattern { regex, replacement } => {
                regex.replace_all(name, replacement.as_str()).into_owned()
            }
            Self::Custom(f) => f(name),
        }
    }
}

impl fmt::Debug for CaseConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camel => write!(f, "CaseConvention::Camel"),
            Self::Snake => write!(f, "CaseConvention::Snake"),
            Self::None => write!(f, "CaseConvention::None"),
            Self::Pattern { regex, .. } => write!(f, "CaseConvention::Pattern({})", regex.as_str()),
            Self::Custom(_) => write!(f, "CaseConvention::Custom"),
        }
    }
}
