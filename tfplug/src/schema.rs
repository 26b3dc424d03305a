//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining resource and data source
//! schemas. A schema also knows how to validate a configuration against itself
//! and how to compute the planned state for a resource change.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;

/// AttributeType defines the type system for Terraform attributes
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    /// Object type matching a list of nested attributes
    pub fn object_of(attributes: &[Attribute]) -> Self {
        AttributeType::Object(
            attributes
                .iter()
                .map(|a| (a.name.clone(), a.r#type.clone()))
                .collect(),
        )
    }
}

/// Schema is returned by providers/resources/data sources
/// Version is used for state migration
#[derive(Debug)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

/// Block represents the root configuration block
#[derive(Debug)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

/// Attribute represents a single configuration attribute
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Box<dyn Validator>>,
    pub plan_modifiers: Vec<Box<dyn PlanModifier>>,
    pub default: Option<Box<dyn Default>>,
    pub nested_type: Option<NestedType>,
    pub deprecated: bool,
}

// Manual Debug implementation since validators/modifiers don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field(
                "plan_modifiers",
                &format!("{} plan modifiers", self.plan_modifiers.len()),
            )
            .field("default", &self.default.is_some())
            .field("nested_type", &self.nested_type)
            .finish()
    }
}

/// NestedType for attributes with nested structures
#[derive(Debug)]
pub struct NestedType {
    pub attributes: Vec<Attribute>,
    pub nesting: ObjectNestingMode,
}

/// ObjectNestingMode for nested attribute objects
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectNestingMode {
    Single,
    List,
}

/// StringKind represents the format of description strings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// Validator performs validation on attribute values during planning
/// Only called for known, non-null values
pub trait Validator: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

pub struct ValidatorRequest {
    pub config_value: DynamicValue,
    pub path: AttributePath,
}

pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// PlanModifier modifies planned values during planning
/// Common uses: RequiresReplace, UseStateForUnknown
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

pub struct PlanModifierRequest {
    pub config_value: DynamicValue,
    pub state_value: DynamicValue,
    pub plan_value: DynamicValue,
    pub path: AttributePath,
}

pub struct PlanModifierResponse {
    pub plan_value: DynamicValue,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Default provides default values for computed attributes
/// Called when the attribute is null in configuration
pub trait Default: Send + Sync {
    fn description(&self) -> String;
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

pub struct DefaultRequest {
    pub path: AttributePath,
}

pub struct DefaultResponse {
    pub value: DynamicValue,
}

/// Result of planning a resource change against a schema
#[derive(Debug)]
pub struct PlanResult {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    /// Check required/computed constraints and run attribute validators
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if config.is_null() || config.is_unknown() {
            return diagnostics;
        }
        validate_attributes(
            &self.block.attributes,
            &config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );
        diagnostics
    }

    /// Compute the planned state for moving from `prior_state` to `config`
    ///
    /// A null config plans a destroy. A null prior state plans a create, in which
    /// case replacement requests from plan modifiers are not reported.
    pub fn plan(&self, prior_state: &DynamicValue, config: &DynamicValue) -> PlanResult {
        let mut result = PlanResult {
            planned_state: DynamicValue::null(),
            requires_replace: Vec::new(),
            diagnostics: Vec::new(),
        };
        if config.is_null() {
            return result;
        }

        let root = AttributePath::root();
        let attributes = &self.block.attributes;
        let creating = prior_state.is_null();

        let mut planned = propose(attributes, &prior_state.value, &config.value, &root);
        if creating || planned != prior_state.value {
            mark_computed_unknown(attributes, &mut planned, &config.value);
        }
        apply_plan_modifiers(
            attributes,
            &mut planned,
            &prior_state.value,
            &config.value,
            &root,
            creating,
            &mut result,
        );

        result.planned_state = DynamicValue::new(planned);
        result
    }
}

fn attribute_value(object: &Dynamic, name: &str) -> Dynamic {
    object.get(name).cloned().unwrap_or(Dynamic::Null)
}

fn list_item(list: &Dynamic, idx: usize) -> Dynamic {
    list.as_list()
        .and_then(|items| items.get(idx))
        .cloned()
        .unwrap_or(Dynamic::Null)
}

fn validate_attributes(
    attributes: &[Attribute],
    config: &Dynamic,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let value = attribute_value(config, &attr.name);

        if value.is_null() {
            if attr.required {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("The argument \"{}\" is required, but no definition was found.", attr.name),
                    )
                    .with_attribute(attr_path),
                );
            }
            continue;
        }

        if attr.computed && !attr.optional && !attr.required {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid configuration for computed attribute",
                    format!("\"{}\" is computed by the provider and cannot be set.", attr.name),
                )
                .with_attribute(attr_path),
            );
            continue;
        }

        if value.is_unknown() {
            continue;
        }

        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: DynamicValue::new(value.clone()),
                path: attr_path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }

        if let Some(nested) = &attr.nested_type {
            match (nested.nesting, &value) {
                (ObjectNestingMode::Single, Dynamic::Map(_)) => {
                    validate_attributes(&nested.attributes, &value, &attr_path, diagnostics)
                }
                (ObjectNestingMode::List, Dynamic::List(items)) => {
                    for (idx, item) in items.iter().enumerate() {
                        if item.is_unknown() {
                            continue;
                        }
                        let item_path = attr_path.clone().index(idx as i64);
                        validate_attributes(&nested.attributes, item, &item_path, diagnostics);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Configuration merged with prior values for null computed attributes,
/// with defaults applied
fn propose(
    attributes: &[Attribute],
    prior: &Dynamic,
    config: &Dynamic,
    path: &AttributePath,
) -> Dynamic {
    let mut object = HashMap::with_capacity(attributes.len());

    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = attribute_value(config, &attr.name);
        let prior_value = attribute_value(prior, &attr.name);

        let value = if config_value.is_null() {
            match &attr.default {
                Some(default) if attr.computed => {
                    default
                        .default_value(DefaultRequest { path: attr_path })
                        .value
                        .value
                }
                _ if attr.computed => prior_value,
                _ => Dynamic::Null,
            }
        } else {
            match (&attr.nested_type, &config_value) {
                (Some(nested), Dynamic::Map(_)) if nested.nesting == ObjectNestingMode::Single => {
                    propose(&nested.attributes, &prior_value, &config_value, &attr_path)
                }
                (Some(nested), Dynamic::List(items)) if nested.nesting == ObjectNestingMode::List => {
                    Dynamic::List(
                        items
                            .iter()
                            .enumerate()
                            .map(|(idx, item)| {
                                propose(
                                    &nested.attributes,
                                    &list_item(&prior_value, idx),
                                    item,
                                    &attr_path.clone().index(idx as i64),
                                )
                            })
                            .collect(),
                    )
                }
                _ => config_value.clone(),
            }
        };

        object.insert(attr.name.clone(), value);
    }

    Dynamic::Map(object)
}

fn mark_computed_unknown(attributes: &[Attribute], planned: &mut Dynamic, config: &Dynamic) {
    let Dynamic::Map(object) = planned else {
        return;
    };

    for attr in attributes {
        let config_value = attribute_value(config, &attr.name);

        if config_value.is_null() {
            if attr.computed && attr.default.is_none() {
                object.insert(attr.name.clone(), Dynamic::Unknown);
            }
            continue;
        }

        let (Some(nested), Some(value)) = (&attr.nested_type, object.get_mut(&attr.name)) else {
            continue;
        };
        match nested.nesting {
            ObjectNestingMode::Single => {
                mark_computed_unknown(&nested.attributes, value, &config_value)
            }
            ObjectNestingMode::List => {
                if let Dynamic::List(items) = value {
                    for (idx, item) in items.iter_mut().enumerate() {
                        mark_computed_unknown(
                            &nested.attributes,
                            item,
                            &list_item(&config_value, idx),
                        );
                    }
                }
            }
        }
    }
}

fn apply_plan_modifiers(
    attributes: &[Attribute],
    planned: &mut Dynamic,
    prior: &Dynamic,
    config: &Dynamic,
    path: &AttributePath,
    creating: bool,
    result: &mut PlanResult,
) {
    let Dynamic::Map(object) = planned else {
        return;
    };

    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = attribute_value(config, &attr.name);
        let prior_value = attribute_value(prior, &attr.name);

        if let (Some(nested), Some(value)) = (&attr.nested_type, object.get_mut(&attr.name)) {
            match nested.nesting {
                ObjectNestingMode::Single => apply_plan_modifiers(
                    &nested.attributes,
                    value,
                    &prior_value,
                    &config_value,
                    &attr_path,
                    creating,
                    result,
                ),
                ObjectNestingMode::List => {
                    if let Dynamic::List(items) = value {
                        for (idx, item) in items.iter_mut().enumerate() {
                            apply_plan_modifiers(
                                &nested.attributes,
                                item,
                                &list_item(&prior_value, idx),
                                &list_item(&config_value, idx),
                                &attr_path.clone().index(idx as i64),
                                creating,
                                result,
                            );
                        }
                    }
                }
            }
        }

        for modifier in &attr.plan_modifiers {
            let plan_value = object.get(&attr.name).cloned().unwrap_or(Dynamic::Null);
            let response = modifier.modify(PlanModifierRequest {
                config_value: DynamicValue::new(config_value.clone()),
                state_value: DynamicValue::new(prior_value.clone()),
                plan_value: DynamicValue::new(plan_value),
                path: attr_path.clone(),
            });

            object.insert(attr.name.clone(), response.plan_value.value);
            if response.requires_replace && !creating && !result.requires_replace.contains(&attr_path) {
                result.requires_replace.push(attr_path.clone());
            }
            result.diagnostics.extend(response.diagnostics);
        }
    }
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
                nested_type: None,
                deprecated: false,
            },
        }
    }

    /// Attribute holding a single nested object
    pub fn single_nested(name: &str, attributes: Vec<Attribute>) -> Self {
        let r#type = AttributeType::object_of(&attributes);
        Self::new(name, r#type).nested_type(NestedType {
            attributes,
            nesting: ObjectNestingMode::Single,
        })
    }

    /// Attribute holding a list of nested objects
    pub fn list_nested(name: &str, attributes: Vec<Attribute>) -> Self {
        let r#type = AttributeType::List(Box::new(AttributeType::object_of(&attributes)));
        Self::new(name, r#type).nested_type(NestedType {
            attributes,
            nesting: ObjectNestingMode::List,
        })
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(validator);
        self
    }

    pub fn plan_modifier(mut self, modifier: Box<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(modifier);
        self
    }

    pub fn default(mut self, default: Box<dyn Default>) -> Self {
        self.attribute.default = Some(default);
        self
    }

    pub fn nested_type(mut self, nested: NestedType) -> Self {
        self.attribute.nested_type = Some(nested);
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    version: 0,
                    attributes: Vec::new(),
                    description: String::new(),
                    description_kind: StringKind::Plain,
                    deprecated: false,
                },
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticDefault;
    use crate::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
    use crate::validator::StringLengthValidator;

    fn test_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(Box::new(StringLengthValidator::between(2, 11)))
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .computed()
                    .default(StaticDefault::string(""))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("updated_at", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::list_nested(
                    "workers",
                    vec![
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .build(),
                        AttributeBuilder::new("max_surge", AttributeType::Number)
                            .optional()
                            .computed()
                            .plan_modifier(Box::new(UseStateForUnknown))
                            .build(),
                    ],
                )
                .optional()
                .build(),
            )
            .build()
    }

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn nested_builders_derive_object_types() {
        let attr = AttributeBuilder::single_nested(
            "begin",
            vec![
                AttributeBuilder::new("hour", AttributeType::Number).required().build(),
                AttributeBuilder::new("time_zone", AttributeType::String).optional().build(),
            ],
        )
        .build();

        let AttributeType::Object(fields) = &attr.r#type else {
            panic!("Expected Object type");
        };
        assert_eq!(fields.len(), 2);
        assert!(matches!(fields.get("hour"), Some(AttributeType::Number)));
        assert_eq!(
            attr.nested_type.as_ref().map(|n| n.nesting),
            Some(ObjectNestingMode::Single)
        );
    }

    #[test]
    fn validate_reports_missing_and_computed_only_attributes() {
        let schema = test_schema();
        let config = DynamicValue::new(Dynamic::object([("id", "set-by-user".into())]));

        let diags = schema.validate(&config);
        assert_eq!(diags.len(), 2);
        assert!(diags
            .iter()
            .any(|d| d.summary == "Missing required argument"
                && d.attribute == Some(AttributePath::new("name"))));
        assert!(diags
            .iter()
            .any(|d| d.attribute == Some(AttributePath::new("id"))));
    }

    #[test]
    fn validate_runs_validators_on_nested_items() {
        let schema = test_schema();
        let config = DynamicValue::new(Dynamic::object([
            ("name", "x".into()),
            (
                "workers",
                Dynamic::List(vec![Dynamic::object([("max_surge", 1i64.into())])]),
            ),
        ]));

        let diags = schema.validate(&config);
        assert!(diags
            .iter()
            .any(|d| d.attribute == Some(AttributePath::new("name"))));
        assert!(diags.iter().any(|d| d.attribute
            == Some(AttributePath::new("workers").index(0).attribute("name"))));
    }

    #[test]
    fn validate_skips_unknown_values() {
        let schema = test_schema();
        let config = DynamicValue::new(Dynamic::object([("name", Dynamic::Unknown)]));
        assert!(schema.validate(&config).is_empty());
    }

    #[test]
    fn plan_create_marks_computed_unknown_and_applies_defaults() {
        let schema = test_schema();
        let config = DynamicValue::new(Dynamic::object([("name", "web".into())]));

        let plan = schema.plan(&DynamicValue::null(), &config);
        let state = &plan.planned_state;

        assert!(state.get(&AttributePath::new("id")).unwrap().is_unknown());
        assert!(state.get(&AttributePath::new("updated_at")).unwrap().is_unknown());
        assert_eq!(
            state.get_string(&AttributePath::new("description")).unwrap(),
            ""
        );
        assert!(plan.requires_replace.is_empty());
    }

    #[test]
    fn plan_without_changes_keeps_prior_state() {
        let schema = test_schema();
        let prior = DynamicValue::new(Dynamic::object([
            ("id", "1".into()),
            ("name", "web".into()),
            ("description", "".into()),
            ("updated_at", "yesterday".into()),
            ("workers", Dynamic::Null),
        ]));
        let config = DynamicValue::new(Dynamic::object([("name", "web".into())]));

        let plan = schema.plan(&prior, &config);
        assert_eq!(plan.planned_state, prior);
        assert!(plan.requires_replace.is_empty());
    }

    #[test]
    fn plan_with_changes_uses_state_for_unknown() {
        let schema = test_schema();
        let prior = DynamicValue::new(Dynamic::object([
            ("id", "1".into()),
            ("name", "web".into()),
            ("description", "".into()),
            ("updated_at", "yesterday".into()),
            (
                "workers",
                Dynamic::List(vec![Dynamic::object([
                    ("name", "default".into()),
                    ("max_surge", 1i64.into()),
                ])]),
            ),
        ]));
        let config = DynamicValue::new(Dynamic::object([
            ("name", "web".into()),
            ("description", "changed".into()),
            (
                "workers",
                Dynamic::List(vec![Dynamic::object([("name", "default".into())])]),
            ),
        ]));

        let plan = schema.plan(&prior, &config);
        let state = &plan.planned_state;

        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "1");
        assert!(state.get(&AttributePath::new("updated_at")).unwrap().is_unknown());
        let surge = AttributePath::new("workers").index(0).attribute("max_surge");
        assert_eq!(state.get_i64(&surge).unwrap(), 1);
    }

    #[test]
    fn plan_reports_replacement_on_name_change() {
        let schema = test_schema();
        let prior = DynamicValue::new(Dynamic::object([
            ("id", "1".into()),
            ("name", "web".into()),
        ]));
        let config = DynamicValue::new(Dynamic::object([("name", "api".into())]));

        let plan = schema.plan(&prior, &config);
        assert_eq!(plan.requires_replace, vec![AttributePath::new("name")]);
    }

    #[test]
    fn plan_destroy_yields_null() {
        let schema = test_schema();
        let prior = DynamicValue::new(Dynamic::object([("name", "web".into())]));
        let plan = schema.plan(&prior, &DynamicValue::null());
        assert!(plan.planned_state.is_null());
    }
}
