//! End-to-end reconcile tests: YAML document → Reconciler → DryRunApplier

use blueprint::codec::load_str;
use blueprint::event::EventKind;
use blueprint::{
    BlueprintError, DesiredState, DryRunApplier, Externals, MapEnv, MemoryStore, OnError,
    Reconciler,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const GROUP_AND_USER: &str = r#"
version: 1
metadata:
  name: users
context:
  domain: example.com
entries:
  - model: authentik_core.group
    id: admins
    identifiers:
      name: admins
  - model: authentik_core.user
    identifiers:
      username: akadmin
    attrs:
      email: !Format ["root@%s", !Context domain]
      groups:
        - !KeyOf admins
  - model: authentik_core.user
    identifiers:
      username: !Env [SECOND_USER, guest]
    attrs:
      same_group_as: !Find [authentik_core.user, [username, akadmin]]
"#;

#[test]
fn entries_apply_in_order_and_reference_earlier_ones() {
    let doc = load_str(GROUP_AND_USER).unwrap();
    let store = MemoryStore::new();
    let env = MapEnv::new();
    let applier = DryRunApplier::new(store.clone());
    let reconciler = Reconciler::new(Externals::new(&store, &env), &applier);

    let report = reconciler.run(&doc).unwrap();
    assert!(report.is_success());
    assert_eq!(report.applied.len(), 3);

    let group_pk = doc.entries[0].instance().unwrap().pk.clone();
    let user = &report.applied[1];
    assert_eq!(user.attrs["email"], json!("root@example.com"));
    assert_eq!(user.attrs["groups"], json!([group_pk]));

    let akadmin_pk = doc.entries[1].instance().unwrap().pk.clone();
    let guest = &report.applied[2];
    assert_eq!(guest.identifiers["username"], json!("guest"));
    assert_eq!(guest.attrs["same_group_as"], akadmin_pk);

    assert_eq!(store.len("authentik_core.user"), 2);
}

#[test]
fn forward_key_of_reference_aborts_by_default() {
    let doc = load_str(
        r#"
entries:
  - model: authentik_core.user
    identifiers:
      username: a
    attrs:
      group: !KeyOf later
  - model: authentik_core.group
    id: later
    identifiers:
      name: later
"#,
    )
    .unwrap();
    let store = MemoryStore::new();
    let env = MapEnv::new();
    let applier = DryRunApplier::new(store.clone());
    let reconciler = Reconciler::new(Externals::new(&store, &env), &applier);

    let err = reconciler.run(&doc).unwrap_err();
    assert!(matches!(err, BlueprintError::EntryFailed { index: 0, .. }));
    assert!(!doc.entries[1].is_materialized());
}

#[test]
fn skip_policy_records_failures_and_continues() {
    let doc = load_str(
        r#"
entries:
  - model: authentik_core.user
    identifiers:
      username: a
    attrs:
      group: !KeyOf missing
  - model: authentik_core.group
    conditions:
      - false
    identifiers:
      name: never
  - model: authentik_core.group
    identifiers:
      name: ok
"#,
    )
    .unwrap();
    let store = MemoryStore::new();
    let env = MapEnv::new();
    let applier = DryRunApplier::new(store.clone());
    let reconciler =
        Reconciler::new(Externals::new(&store, &env), &applier).with_on_error(OnError::Skip);

    let report = reconciler.run(&doc).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].index, 0);
    assert!(report.failed[0].error.reason.contains("KeyOf"));
    assert_eq!(report.skipped, vec![1]);
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].index, 2);
}

const ALTERNATE_FLOWS: &str = r#"
context:
  passwordless: false
entries:
  - model: authentik_flows.flow
    id: flow
    conditions:
      - !Context passwordless
    identifiers:
      slug: webauthn
  - model: authentik_flows.flow
    id: flow
    conditions:
      - !Condition [NAND, !Context passwordless]
    identifiers:
      slug: password
  - model: authentik_core.group
    identifiers:
      name: users
    attrs:
      login_flow: !KeyOf flow
"#;

#[test]
fn repeated_ids_resolve_to_the_applied_alternate() {
    for (passwordless, applied, skipped) in [(false, 1, 0), (true, 0, 1)] {
        let mut doc = load_str(ALTERNATE_FLOWS).unwrap();
        doc.context.insert("passwordless".into(), json!(passwordless));
        assert!(doc.validate().is_ok());

        let store = MemoryStore::new();
        let env = MapEnv::new();
        let applier = DryRunApplier::new(store.clone());
        let reconciler = Reconciler::new(Externals::new(&store, &env), &applier);

        let report = reconciler.run(&doc).unwrap();
        assert_eq!(report.skipped, vec![skipped]);
        let flow_pk = doc.entries[applied].instance().unwrap().pk.clone();
        assert_eq!(report.applied[1].attrs["login_flow"], flow_pk);
        assert!(!doc.entries[skipped].is_materialized());
    }
}

#[test]
fn policy_binding_references_use_binding_key() {
    let doc = load_str(
        r#"
entries:
  - model: authentik_flows.flow
    id: flow
    identifiers:
      slug: default-auth
  - model: authentik_policies.policybinding
    identifiers:
      target: !KeyOf flow
      order: 0
  - model: authentik_core.group
    identifiers:
      name: flow-owners
    attrs:
      flow: !KeyOf flow
"#,
    )
    .unwrap();
    let store = MemoryStore::new();
    let env = MapEnv::new();
    let applier = DryRunApplier::new(store.clone()).with_binding_model("authentik_flows.flow");
    let reconciler = Reconciler::new(Externals::new(&store, &env), &applier);

    let report = reconciler.run(&doc).unwrap();
    let flow = doc.entries[0].instance().unwrap();
    let binding_key = flow.binding_key.clone().unwrap();
    assert_ne!(binding_key, flow.pk);

    assert_eq!(report.applied[1].identifiers["target"], binding_key);
    assert_eq!(report.applied[2].attrs["flow"], flow.pk);
}

#[test]
fn absent_state_removes_existing_object() {
    let doc = load_str(
        r#"
entries:
  - model: authentik_core.group
    identifiers:
      name: stale
  - model: authentik_core.group
    state: absent
    identifiers:
      name: stale
"#,
    )
    .unwrap();
    let store = MemoryStore::new();
    let env = MapEnv::new();
    let applier = DryRunApplier::new(store.clone());
    let reconciler = Reconciler::new(Externals::new(&store, &env), &applier);

    let report = reconciler.run(&doc).unwrap();
    assert_eq!(report.applied[1].state, DesiredState::Absent);
    assert!(report.applied[1].pk.is_none());
    assert!(!doc.entries[1].is_materialized());
    assert_eq!(store.len("authentik_core.group"), 0);
}

#[test]
fn event_log_traces_every_entry() {
    let doc = load_str(GROUP_AND_USER).unwrap();
    let store = MemoryStore::new();
    let env = MapEnv::new();
    let applier = DryRunApplier::new(store.clone());
    let reconciler = Reconciler::new(Externals::new(&store, &env), &applier);
    reconciler.run(&doc).unwrap();

    let log = reconciler.event_log();
    let blueprint_events = log.blueprint_events();
    assert_eq!(blueprint_events.len(), 2);
    assert!(matches!(
        &blueprint_events[0].kind,
        EventKind::BlueprintStarted { name: Some(name), entry_count: 3 } if name == "users"
    ));
    assert!(matches!(
        blueprint_events[1].kind,
        EventKind::BlueprintCompleted { applied: 3, skipped: 0, failed: 0, .. }
    ));

    let first = log.filter_entry(0);
    assert!(matches!(first[0].kind, EventKind::EntryResolved { .. }));
    assert!(matches!(first[1].kind, EventKind::EntryApplied { .. }));

    let json = log.to_json();
    assert_eq!(json[0]["kind"]["type"], json!("blueprint_started"));
}
