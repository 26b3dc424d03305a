//! Default value providers for computed attributes
//!
//! A default is consulted while planning whenever a computed attribute is
//! null in configuration.
//!
//! ```no_run
//! use tfplug::schema::{AttributeBuilder, AttributeType};
//! use tfplug::defaults::{EnvDefault, StaticDefault};
//!
//! let time_zone = AttributeBuilder::new("time_zone", AttributeType::String)
//!     .optional()
//!     .computed()
//!     .default(StaticDefault::string("UTC"))
//!     .build();
//!
//! let partition = AttributeBuilder::new("partition", AttributeType::String)
//!     .optional()
//!     .computed()
//!     .default(EnvDefault::create("METAL_PARTITION", "eqx-mu4"))
//!     .build();
//! ```

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};
use std::env;

/// A fixed default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Box<dyn Default> {
        Box::new(Self { value })
    }

    pub fn string(value: &str) -> Box<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Box<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Box<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }

    pub fn list(values: Vec<Dynamic>) -> Box<dyn Default> {
        Self::create(Dynamic::List(values))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("defaults to {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

/// Reads the default from an environment variable at plan time
pub struct EnvDefault {
    env_var: String,
    fallback: Option<String>,
}

impl EnvDefault {
    pub fn create(env_var: &str, fallback: &str) -> Box<dyn Default> {
        Box::new(Self {
            env_var: env_var.to_string(),
            fallback: Some(fallback.to_string()),
        })
    }

    /// Without a fallback the value stays null when the variable is unset
    pub fn create_required(env_var: &str) -> Box<dyn Default> {
        Box::new(Self {
            env_var: env_var.to_string(),
            fallback: None,
        })
    }
}

impl Default for EnvDefault {
    fn description(&self) -> String {
        match &self.fallback {
            Some(fallback) => format!("defaults to ${} or {:?}", self.env_var, fallback),
            None => format!("defaults to ${}", self.env_var),
        }
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        let value = env::var(&self.env_var)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.fallback.clone())
            .map(Dynamic::String)
            .unwrap_or(Dynamic::Null);

        DefaultResponse {
            value: DynamicValue::new(value),
        }
    }
}
