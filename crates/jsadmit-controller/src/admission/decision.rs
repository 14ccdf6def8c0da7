use std::sync::Arc;

use serde_json::Value;

use jsadmit_core::protocol::{AdmissionDecision, Operation};
use jsadmit_core::ObjectExt;

use crate::registry::PolicyUnit;

use super::verdict::HookVerdict;

/// Run `mutate` hooks in order, each on the previous one's output.
///
/// A hook error or an explicit `Allowed: false` denies. When any hook
/// proposed a `Result`, the final object is annotated with the mutating
/// policies and returned as a JSON patch against `obj`.
pub fn mutate(
    units: &[Arc<PolicyUnit>],
    op: Operation,
    obj: &Value,
    annotation: &str,
) -> AdmissionDecision {
    let mut current = obj.clone();
    let mut mutated_by: Vec<String> = Vec::new();

    for unit in units {
        let out = match unit.mutate(op, &current) {
            Ok(out) => out,
            Err(e) => {
                tracing::error!(policy = %unit.full_name(), code = e.code().as_str(), error = %e, "mutate hook failed");
                return AdmissionDecision::deny(e.to_string());
            }
        };
        let verdict = HookVerdict::from_result(out);
        if verdict.denies() {
            return AdmissionDecision::deny(denial_message(unit, verdict));
        }
        if let Some(next) = verdict.result {
            current = next;
            mutated_by.push(unit.full_name());
        }
    }

    if mutated_by.is_empty() {
        return AdmissionDecision::allow();
    }

    if !current.set_nested(
        &["metadata", "annotations", annotation],
        Value::String(mutated_by.join(",")),
    ) {
        tracing::warn!(policies = %mutated_by.join(","), "mutated object has no usable metadata, annotation skipped");
    }

    let patch = json_patch::diff(obj, &current);
    match serde_json::to_vec(&patch) {
        Ok(bytes) => AdmissionDecision::patched(bytes),
        Err(e) => AdmissionDecision::deny(format!("unable to encode patch: {e}")),
    }
}

/// Run `validate` hooks in order, stopping at the first denial.
pub fn validate(units: &[Arc<PolicyUnit>], op: Operation, obj: &Value) -> AdmissionDecision {
    for unit in units {
        let out = match unit.validate(op, obj) {
            Ok(out) => out,
            Err(e) => {
                tracing::error!(policy = %unit.full_name(), code = e.code().as_str(), error = %e, "validate hook failed");
                return AdmissionDecision::deny(e.to_string());
            }
        };
        let verdict = HookVerdict::from_result(out);
        if verdict.denies() {
            return AdmissionDecision::deny(denial_message(unit, verdict));
        }
    }
    AdmissionDecision::allow()
}

fn denial_message(unit: &PolicyUnit, verdict: HookVerdict) -> String {
    match verdict.message {
        Some(m) if !m.is_empty() => m,
        _ => format!("denied by policy {}", unit.full_name()),
    }
}
