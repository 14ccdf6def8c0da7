#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use jsadmit_controller::admission;
use jsadmit_controller::registry::{AdmissionRegistry, Policy, PolicyUnit, RegistrySettings};
use jsadmit_controller::script::{QuickJsEngine, ScriptLimits};
use jsadmit_core::protocol::Operation;
use serde_json::{json, Value};

const ANNOTATION: &str = "jsadmissions.momiji.com/mutate";

fn registry() -> AdmissionRegistry {
    common::init_test_logging();
    AdmissionRegistry::new(
        Arc::new(QuickJsEngine::new(ScriptLimits::default())),
        RegistrySettings::default(),
    )
}

fn install(reg: &AdmissionRegistry, ns: &str, name: &str, js: &str) -> Arc<PolicyUnit> {
    let unit = reg
        .upsert(Policy {
            namespace: ns.into(),
            name: name.into(),
            kinds: vec!["v1/Pod".into()],
            source: js.into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
    unit.activate();
    unit
}

fn appender(tag: &str) -> String {
    format!(
        r#"
        function mutate(obj) {{
          obj.metadata.annotations = obj.metadata.annotations || {{}};
          const prev = obj.metadata.annotations["chain"];
          obj.metadata.annotations["chain"] = prev ? prev + ",{tag}" : "{tag}";
          return {{ Result: obj }};
        }}
        "#
    )
}

fn counting_validator() -> &'static str {
    r#"
    function init(state) { state.calls = 0; }
    function validate(state, obj) { state.calls = (state.calls || 0) + 1; return { Allowed: true }; }
    "#
}

fn apply_patch(original: &Value, patch: &[u8]) -> Value {
    let patch: json_patch::Patch = serde_json::from_slice(patch).unwrap();
    let mut doc = original.clone();
    json_patch::patch(&mut doc, &patch).unwrap();
    doc
}

fn pod() -> Value {
    json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"namespace": "ns", "name": "web"}})
}

#[test]
fn mutations_compose_in_find_order() {
    let reg = registry();
    install(&reg, "ns", "p2", &appender("p2"));
    install(&reg, "ns", "p1", &appender("p1"));

    let units = reg.find("v1/Pod", "ns");
    let original = pod();
    let decision = admission::mutate(&units, Operation::Create, &original, ANNOTATION);
    assert!(decision.allowed);

    let patched = apply_patch(&original, decision.patch.as_deref().unwrap());
    assert_eq!(patched["metadata"]["annotations"]["chain"], "p1,p2");
    assert_eq!(patched["metadata"]["annotations"][ANNOTATION], "ns/p1,ns/p2");
    // the request object itself is untouched
    assert_eq!(original, pod());
}

#[test]
fn cluster_policies_mutate_after_namespace_policies() {
    let reg = registry();
    install(&reg, "", "audit", &appender("audit"));
    install(&reg, "ns", "local", &appender("local"));

    let units = reg.find("v1/Pod", "ns");
    let decision = admission::mutate(&units, Operation::Update, &pod(), ANNOTATION);
    let patched = apply_patch(&pod(), decision.patch.as_deref().unwrap());
    assert_eq!(patched["metadata"]["annotations"]["chain"], "local,audit");
    assert_eq!(patched["metadata"]["annotations"][ANNOTATION], "ns/local,audit");
}

#[test]
fn no_proposal_means_plain_allow() {
    let reg = registry();
    install(&reg, "ns", "quiet", "function mutate(obj) { return { Allowed: true }; }");
    let decision = admission::mutate(&reg.find("v1/Pod", "ns"), Operation::Create, &pod(), ANNOTATION);
    assert!(decision.allowed);
    assert!(decision.patch.is_none());
    assert!(decision.message.is_none());
}

#[test]
fn mutate_can_deny() {
    let reg = registry();
    install(
        &reg,
        "ns",
        "strict",
        "function mutate(obj) { return { Allowed: false, Message: 'no mutation for you' }; }",
    );
    let decision = admission::mutate(&reg.find("v1/Pod", "ns"), Operation::Create, &pod(), ANNOTATION);
    assert!(!decision.allowed);
    assert_eq!(decision.message.as_deref(), Some("no mutation for you"));
}

#[test]
fn script_errors_fail_closed() {
    let reg = registry();
    install(&reg, "ns", "broken", "function mutate(obj) { throw new Error('boom'); }");
    install(&reg, "ns", "broken-v", "function validate(obj) { null.x; }");

    let units = reg.find("v1/Pod", "ns");
    let decision = admission::mutate(&units, Operation::Create, &pod(), ANNOTATION);
    assert!(!decision.allowed);
    assert!(decision.message.unwrap().contains("boom"));

    let decision = admission::validate(&units, Operation::Create, &pod());
    assert!(!decision.allowed);
    assert!(decision.message.is_some());
}

#[test]
fn validation_short_circuits_on_first_denial() {
    let reg = registry();
    let p1 = install(
        &reg,
        "ns",
        "p1",
        r#"
        function init(state) { state.deny = true; }
        function validate(state, obj) { return { Allowed: !state.deny, Message: "p1 says no" }; }
        "#,
    );
    let p2 = install(&reg, "ns", "p2", counting_validator());
    p1.init().unwrap();
    p2.init().unwrap();

    let units = reg.find("v1/Pod", "ns");
    let decision = admission::validate(&units, Operation::Create, &pod());
    assert!(!decision.allowed);
    assert_eq!(decision.message.as_deref(), Some("p1 says no"));
    assert_eq!(p2.runtime().state(), json!({"calls": 0}));
}

#[test]
fn validation_visits_every_policy_when_allowed() {
    let reg = registry();
    install(&reg, "ns", "p1", "function validate(obj) { return { Allowed: true }; }");
    let p2 = install(&reg, "ns", "p2", counting_validator());

    let units = reg.find("v1/Pod", "ns");
    let decision = admission::validate(&units, Operation::Delete, &pod());
    assert!(decision.allowed);
    assert_eq!(p2.runtime().state(), json!({"calls": 1}));
}

#[test]
fn denial_without_message_names_the_policy() {
    let reg = registry();
    install(&reg, "", "terse", "function validate() { return { Allowed: false }; }");
    let decision = admission::validate(&reg.find("v1/Pod", "ns"), Operation::Create, &pod());
    assert!(!decision.allowed);
    assert_eq!(decision.message.as_deref(), Some("denied by policy terse"));
}
