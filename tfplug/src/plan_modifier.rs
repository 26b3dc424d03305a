//! Built-in plan modifiers

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::{Diagnostic, Dynamic};

/// Forces replacement when the planned value differs from state
pub struct RequiresReplaceIfChanged;

impl PlanModifier for RequiresReplaceIfChanged {
    fn description(&self) -> String {
        "changing this value forces a new resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let state = &request.state_value.value;
        let plan = &request.plan_value.value;

        let requires_replace = !matches!(
            (state, plan),
            (Dynamic::Null, Dynamic::Null) | (Dynamic::Unknown, _) | (_, Dynamic::Unknown)
        ) && !values_equal(state, plan);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Keeps the prior state value for attributes that would otherwise be unknown
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "value does not change after creation".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = if request.plan_value.is_unknown() && !request.state_value.is_null() {
            request.state_value
        } else {
            request.plan_value
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

/// Forces replacement when the predicate holds
pub struct RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    pub fn new(predicate: F, description: impl Into<String>) -> Self {
        Self {
            predicate,
            description: description.into(),
        }
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let requires_replace = (self.predicate)(&request);

        let mut diagnostics = vec![];
        if requires_replace {
            diagnostics.push(
                Diagnostic::warning(
                    format!("Attribute {} requires resource replacement", request.path),
                    self.description.clone(),
                )
                .with_attribute(request.path.clone()),
            );
        }

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics,
        }
    }
}

/// Structural equality with a tolerance for float noise
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) | (Dynamic::Unknown, Dynamic::Unknown) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(plan.clone()),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("name"),
        }
    }

    #[test]
    fn requires_replace_if_changed_keeps_same_value() {
        let response = RequiresReplaceIfChanged.modify(request("a".into(), "a".into()));
        assert!(!response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_if_changed_triggers_on_change() {
        let response = RequiresReplaceIfChanged.modify(request("a".into(), "b".into()));
        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_ignores_null_and_unknown() {
        assert!(
            !RequiresReplaceIfChanged
                .modify(request(Dynamic::Null, Dynamic::Null))
                .requires_replace
        );
        assert!(
            !RequiresReplaceIfChanged
                .modify(request("a".into(), Dynamic::Unknown))
                .requires_replace
        );
        assert!(
            !RequiresReplaceIfChanged
                .modify(request(Dynamic::Unknown, "a".into()))
                .requires_replace
        );
    }

    #[test]
    fn requires_replace_if_changed_compares_nested_values() {
        let old = Dynamic::object([("hour", Dynamic::Number(1.0))]);
        let new = Dynamic::object([("hour", Dynamic::Number(2.0))]);
        assert!(
            RequiresReplaceIfChanged
                .modify(request(old.clone(), new))
                .requires_replace
        );
        assert!(
            !RequiresReplaceIfChanged
                .modify(request(old.clone(), old))
                .requires_replace
        );
    }

    #[test]
    fn use_state_for_unknown_copies_prior_value() {
        let response = UseStateForUnknown.modify(request("eqx-mu4".into(), Dynamic::Unknown));
        assert_eq!(response.plan_value.value, Dynamic::String("eqx-mu4".into()));
    }

    #[test]
    fn use_state_for_unknown_keeps_unknown_without_state() {
        let response = UseStateForUnknown.modify(request(Dynamic::Null, Dynamic::Unknown));
        assert!(response.plan_value.is_unknown());
    }

    #[test]
    fn use_state_for_unknown_keeps_known_plan() {
        let response = UseStateForUnknown.modify(request("old".into(), "new".into()));
        assert_eq!(response.plan_value.value, Dynamic::String("new".into()));
    }

    #[test]
    fn requires_replace_if_uses_predicate() {
        let modifier = RequiresReplaceIf::new(
            |req: &PlanModifierRequest| {
                matches!(
                    (req.state_value.value.as_number(), req.plan_value.value.as_number()),
                    (Some(old), Some(new)) if new < old
                )
            },
            "shrinking forces replacement",
        );

        let response = modifier.modify(request(Dynamic::Number(3.0), Dynamic::Number(1.0)));
        assert!(response.requires_replace);
        assert_eq!(response.diagnostics.len(), 1);

        let response = modifier.modify(request(Dynamic::Number(1.0), Dynamic::Number(3.0)));
        assert!(!response.requires_replace);
    }
}
