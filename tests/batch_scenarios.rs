//! End-to-end batch runs over small policy sets.

use authz_batch::{run_batch, BatchConfig, BatchError, BatchRequest, BatchResult, BatchRunner, Slot};
use authz_eval::{ignore, unknown_entity, variable, EvalError};
use authz_types::{
    Decision, Entities, Entity, EntityUid, Expr, Policy, PolicyId, PolicySet, Record, Value,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn uid(t: &str, id: &str) -> EntityUid {
    EntityUid::new(t, id)
}

fn ent(t: &str, id: &str) -> Value {
    Value::Entity(uid(t, id))
}

fn empty_context() -> Value {
    Value::Record(Record::new())
}

/// Principal, action and resource are each a variable of the same name
fn prar_template(principals: &[Value], actions: &[Value], resources: &[Value]) -> BatchRequest {
    BatchRequest::new(
        variable("principal"),
        variable("action"),
        variable("resource"),
        empty_context(),
    )
    .variable("principal", principals.to_vec())
    .variable("action", actions.to_vec())
    .variable("resource", resources.to_vec())
}

fn collect_with(
    runner: BatchRunner,
    policies: &PolicySet,
    entities: &Entities,
    request: BatchRequest,
) -> (Result<(), BatchError>, Vec<BatchResult>) {
    let mut results = Vec::new();
    let outcome = runner.run(
        &CancellationToken::new(),
        policies,
        entities,
        request,
        |r| results.push(r),
    );
    (outcome, results)
}

fn collect(
    policies: &PolicySet,
    entities: &Entities,
    request: BatchRequest,
) -> Vec<BatchResult> {
    let (outcome, results) = collect_with(BatchRunner::default(), policies, entities, request);
    outcome.unwrap();
    results
}

/// `(principal id, action id, resource id, allowed)` per result
fn rows(results: &[BatchResult]) -> Vec<(String, String, String, bool)> {
    results
        .iter()
        .map(|r| {
            (
                r.request.principal.id.clone(),
                r.request.action.id.clone(),
                r.request.resource.id.clone(),
                r.decision.is_allow(),
            )
        })
        .collect()
}

fn reasons(result: &BatchResult) -> Vec<&str> {
    result.diagnostic.policy_ids().map(PolicyId::as_str).collect()
}

fn row(p: &str, a: &str, r: &str, allowed: bool) -> (String, String, String, bool) {
    (p.to_string(), a.to_string(), r.to_string(), allowed)
}

#[test]
fn unconditional_permit_allows_every_combination() {
    let policies = PolicySet::from_policies([Policy::permit()]);
    let request = prar_template(
        &[ent("P", "1")],
        &[ent("A", "1"), ent("A", "2")],
        &[ent("R", "1"), ent("R", "2"), ent("R", "3")],
    );

    let results = collect(&policies, &Entities::new(), request);

    assert_eq!(
        rows(&results),
        vec![
            row("1", "1", "1", true),
            row("1", "1", "2", true),
            row("1", "1", "3", true),
            row("1", "2", "1", true),
            row("1", "2", "2", true),
            row("1", "2", "3", true),
        ]
    );
    assert!(results.iter().all(|r| reasons(r) == vec!["0"]));
}

#[test]
fn scoped_permit_allows_only_its_combination() {
    let policies = PolicySet::from_policies([Policy::permit()
        .principal_eq(uid("P", "1"))
        .action_eq(uid("A", "2"))
        .resource_eq(uid("R", "3"))]);
    let request = prar_template(
        &[ent("P", "1")],
        &[ent("A", "1"), ent("A", "2")],
        &[ent("R", "1"), ent("R", "2"), ent("R", "3")],
    );

    let results = collect(&policies, &Entities::new(), request);

    assert_eq!(
        rows(&results),
        vec![
            row("1", "1", "1", false),
            row("1", "1", "2", false),
            row("1", "1", "3", false),
            row("1", "2", "1", false),
            row("1", "2", "2", false),
            row("1", "2", "3", true),
        ]
    );
    assert!(reasons(&results[0]).is_empty());
    assert_eq!(reasons(&results[5]), vec!["0"]);
}

#[test]
fn attribute_condition_splits_by_principal() {
    let tags = Expr::principal().access("tags");
    let policies = PolicySet::from_policies([Policy::permit().when(
        tags.clone()
            .has("a")
            .and(tags.access("a").equal(Expr::string("a"))),
    )]);
    let entities: Entities = vec![
        Entity::new(uid("P", "1")).with_attrs(
            [(
                "tags",
                Value::Record([("a", Value::from("a"))].into_iter().collect()),
            )]
            .into_iter()
            .collect(),
        ),
        Entity::new(uid("P", "2")).with_attrs(
            [(
                "tags",
                Value::Record([("b", Value::from("b"))].into_iter().collect()),
            )]
            .into_iter()
            .collect(),
        ),
    ]
    .into();
    let request = prar_template(
        &[ent("P", "1"), ent("P", "2")],
        &[ent("A", "1")],
        &[ent("R", "1"), ent("R", "2")],
    );

    let results = collect(&policies, &entities, request);

    assert_eq!(
        rows(&results),
        vec![
            row("1", "1", "1", true),
            row("1", "1", "2", true),
            row("2", "1", "1", false),
            row("2", "1", "2", false),
        ]
    );
}

#[test]
fn empty_policy_set_denies_everything() {
    let request = prar_template(
        &[ent("P", "1"), ent("P", "2")],
        &[ent("A", "1"), ent("A", "2")],
        &[ent("R", "1"), ent("R", "2"), ent("R", "3")],
    );

    let results = collect(&PolicySet::new(), &Entities::new(), request);

    assert_eq!(results.len(), 12);
    for result in &results {
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.diagnostic.is_empty());
    }
}

#[test]
fn cancelled_run_delivers_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = prar_template(&[ent("P", "1")], &[ent("A", "1")], &[ent("R", "1")]);

    let mut calls = 0;
    let outcome = run_batch(
        &cancel,
        &PolicySet::from_policies([Policy::permit()]),
        &Entities::new(),
        request,
        |_| calls += 1,
    );

    assert_eq!(outcome, Err(BatchError::Cancelled));
    assert_eq!(calls, 0);
}

#[test]
fn cancellation_stops_between_leaves() {
    let cancel = CancellationToken::new();
    let request = prar_template(
        &[ent("P", "1")],
        &[ent("A", "1")],
        &[ent("R", "1"), ent("R", "2"), ent("R", "3")],
    );

    let mut calls = 0;
    let outcome = run_batch(
        &cancel,
        &PolicySet::from_policies([Policy::permit()]),
        &Entities::new(),
        request,
        |_| {
            calls += 1;
            cancel.cancel();
        },
    );

    assert_eq!(outcome, Err(BatchError::Cancelled));
    assert_eq!(calls, 1);
}

#[test]
fn missing_context_is_rejected_up_front() {
    let mut request = prar_template(&[ent("P", "1")], &[ent("A", "1")], &[ent("R", "1")]);
    request.context = None;

    let (outcome, results) = collect_with(
        BatchRunner::default(),
        &PolicySet::from_policies([Policy::permit()]),
        &Entities::new(),
        request,
    );

    assert_eq!(outcome, Err(BatchError::MissingSlot(Slot::Context)));
    assert!(results.is_empty());
}

#[test]
fn missing_principal_is_reported_first() {
    let request = BatchRequest::default();
    let (outcome, _) = collect_with(
        BatchRunner::default(),
        &PolicySet::new(),
        &Entities::new(),
        request,
    );
    assert_eq!(outcome, Err(BatchError::MissingSlot(Slot::Principal)));
}

#[test]
fn request_without_variables_runs_once() {
    let request = BatchRequest::new(ent("P", "1"), ent("A", "1"), ent("R", "1"), empty_context());
    let results = collect(
        &PolicySet::from_policies([Policy::permit()]),
        &Entities::new(),
        request,
    );

    assert_eq!(results.len(), 1);
    assert!(results[0].values.is_empty());
    assert_eq!(results[0].decision, Decision::Allow);
}

#[test]
fn empty_candidate_list_yields_no_results() {
    let request = prar_template(&[ent("P", "1")], &[], &[ent("R", "1"), ent("R", "2")]);
    let results = collect(
        &PolicySet::from_policies([Policy::permit()]),
        &Entities::new(),
        request,
    );
    assert!(results.is_empty());
}

#[test]
fn every_result_binds_every_variable() {
    let context: Record = [("level", variable("level"))].into_iter().collect();
    let request = BatchRequest::new(
        variable("who"),
        ent("A", "1"),
        ent("R", "1"),
        Value::Record(context),
    )
    .variable("who", vec![ent("P", "1"), ent("P", "2")])
    .variable("level", vec![Value::Long(1), Value::Long(2), Value::Long(3)]);

    let results = collect(&PolicySet::new(), &Entities::new(), request);

    assert_eq!(results.len(), 6);
    for result in &results {
        assert_eq!(result.values.len(), 2);
        assert_eq!(
            result.values.get("who"),
            Some(&Value::Entity(result.request.principal.clone()))
        );
        assert_eq!(
            result.values.get("level"),
            result.request.context.get("level")
        );
    }
}

#[test]
fn fewer_candidates_expand_first() {
    let context: Record = [("a", variable("a")), ("b", variable("b"))]
        .into_iter()
        .collect();
    let request = || {
        BatchRequest::new(ent("P", "1"), ent("A", "1"), ent("R", "1"), Value::Record(context.clone()))
            .variable("a", vec![Value::Long(1), Value::Long(2), Value::Long(3)])
            .variable("b", vec![Value::Long(10), Value::Long(20)])
    };
    let pairs = |results: Vec<BatchResult>| -> Vec<(Value, Value)> {
        results
            .into_iter()
            .map(|r| (r.values["a"].clone(), r.values["b"].clone()))
            .collect()
    };

    let sorted = pairs(collect(&PolicySet::new(), &Entities::new(), request()));
    assert_eq!(
        sorted,
        vec![
            (Value::Long(1), Value::Long(10)),
            (Value::Long(2), Value::Long(10)),
            (Value::Long(3), Value::Long(10)),
            (Value::Long(1), Value::Long(20)),
            (Value::Long(2), Value::Long(20)),
            (Value::Long(3), Value::Long(20)),
        ]
    );

    let unsorted_runner = BatchRunner::new(BatchConfig {
        sort_variables: false,
        ..BatchConfig::default()
    });
    let (outcome, results) =
        collect_with(unsorted_runner, &PolicySet::new(), &Entities::new(), request());
    outcome.unwrap();
    assert_eq!(
        pairs(results),
        vec![
            (Value::Long(1), Value::Long(10)),
            (Value::Long(1), Value::Long(20)),
            (Value::Long(2), Value::Long(10)),
            (Value::Long(2), Value::Long(20)),
            (Value::Long(3), Value::Long(10)),
            (Value::Long(3), Value::Long(20)),
        ]
    );
}

#[test]
fn repeated_runs_emit_identical_sequences() {
    let policies = PolicySet::from_policies([
        Policy::permit().action_eq(uid("A", "1")),
        Policy::forbid().resource_eq(uid("R", "2")),
    ]);
    let request = || {
        prar_template(
            &[ent("P", "1"), ent("P", "2")],
            &[ent("A", "1"), ent("A", "2")],
            &[ent("R", "1"), ent("R", "2")],
        )
    };
    let first = collect(&policies, &Entities::new(), request());
    let second = collect(&policies, &Entities::new(), request());
    assert_eq!(first, second);
}

#[test]
fn forbid_overrides_permit_and_lists_every_forbid() {
    let mut policies = PolicySet::new();
    policies.add("allow-all".into(), Policy::permit()).unwrap();
    policies
        .add("no-r2".into(), Policy::forbid().resource_eq(uid("R", "2")))
        .unwrap();
    policies
        .add("no-a1".into(), Policy::forbid().action_eq(uid("A", "1")))
        .unwrap();
    let request = prar_template(
        &[ent("P", "1")],
        &[ent("A", "1")],
        &[ent("R", "1"), ent("R", "2")],
    );

    let results = collect(&policies, &Entities::new(), request);

    assert_eq!(results[0].decision, Decision::Deny);
    assert_eq!(reasons(&results[0]), vec!["no-a1"]);
    assert_eq!(results[1].decision, Decision::Deny);
    assert_eq!(reasons(&results[1]), vec!["no-r2", "no-a1"]);
}

#[test]
fn erroring_policies_count_as_unsatisfied() {
    // principal.missing fails on entities that are not in the store
    let policies = PolicySet::from_policies([
        Policy::forbid().when(Expr::principal().access("missing").equal(Expr::long(1))),
        Policy::permit().when(Expr::principal().access("missing").equal(Expr::long(1))),
        Policy::permit().principal_eq(uid("P", "1")),
    ]);
    let request = prar_template(
        &[ent("P", "1"), ent("P", "2")],
        &[ent("A", "1")],
        &[ent("R", "1")],
    );

    let results = collect(&policies, &Entities::new(), request);

    assert_eq!(results[0].decision, Decision::Allow);
    assert_eq!(reasons(&results[0]), vec!["2"]);
    assert_eq!(results[1].decision, Decision::Deny);
    assert!(results[1].diagnostic.is_empty());
}

#[test]
fn conversion_error_halts_after_earlier_results() {
    let request = prar_template(
        &[ent("P", "1"), Value::Long(5), ent("P", "3")],
        &[ent("A", "1")],
        &[ent("R", "1")],
    );

    let (outcome, results) = collect_with(
        BatchRunner::default(),
        &PolicySet::from_policies([Policy::permit()]),
        &Entities::new(),
        request,
    );

    assert_eq!(
        outcome,
        Err(BatchError::Conversion {
            slot: Slot::Principal,
            source: EvalError::TypeMismatch {
                expected: "entity",
                found: "long",
            },
        })
    );
    assert_eq!(rows(&results), vec![row("1", "1", "1", true)]);
}

#[test]
fn non_record_context_is_a_conversion_error() {
    let request = BatchRequest::new(ent("P", "1"), ent("A", "1"), variable("c"), Value::from("ctx"))
        .variable("c", vec![ent("R", "1")]);
    let (outcome, results) = collect_with(
        BatchRunner::default(),
        &PolicySet::new(),
        &Entities::new(),
        request,
    );
    assert!(matches!(
        outcome,
        Err(BatchError::Conversion {
            slot: Slot::Context,
            ..
        })
    ));
    assert!(results.is_empty());
}

#[test]
fn ignored_slots_resolve_to_stand_ins() {
    let policies = PolicySet::from_policies([Policy::permit().resource_eq(uid("R", "1"))]);
    let request = BatchRequest::new(ignore(), ent("A", "1"), variable("r"), ignore())
        .variable("r", vec![ent("R", "1"), ent("R", "2")]);

    let results = collect(&policies, &Entities::new(), request);

    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.request.principal, unknown_entity());
        assert!(result.request.context.is_empty());
        assert_eq!(result.values.keys().collect::<Vec<_>>(), vec!["r"]);
    }
    assert_eq!(results[0].decision, Decision::Allow);
    assert_eq!(results[1].decision, Decision::Deny);
}

#[test]
fn clauses_on_ignored_slots_are_dropped_by_pruning() {
    // the principal condition would error on the stand-in if it were kept
    let policies = PolicySet::from_policies([Policy::permit()
        .when(Expr::principal().access("level").greater_than(Expr::long(1)))
        .when(Expr::resource().equal(Expr::entity(uid("R", "1"))))]);
    let request = BatchRequest::new(ignore(), ent("A", "1"), variable("r"), empty_context())
        .variable("r", vec![ent("R", "1"), ent("R", "2")]);

    let results = collect(&policies, &Entities::new(), request);

    assert_eq!(
        results.iter().map(|r| r.decision).collect::<Vec<_>>(),
        vec![Decision::Allow, Decision::Deny]
    );
}

#[test]
fn untouched_context_fields_are_shared_with_the_template() {
    let meta: Record = [("tenant", Value::from("acme"))].into_iter().collect();
    let context: Record = [
        ("who", variable("who")),
        ("meta", Value::Record(meta.clone())),
    ]
    .into_iter()
    .collect();
    let request = BatchRequest::new(ent("P", "1"), ent("A", "1"), ent("R", "1"), Value::Record(context))
        .variable("who", vec![Value::from("x"), Value::from("y")]);

    let results = collect(&PolicySet::new(), &Entities::new(), request);

    assert_eq!(results.len(), 2);
    for result in &results {
        match result.request.context.get("meta") {
            Some(Value::Record(shared)) => assert!(Record::ptr_eq(shared, &meta)),
            other => panic!("unexpected meta {:?}", other),
        }
    }
    assert_eq!(results[0].request.context.get("who"), Some(&Value::from("x")));
    assert_eq!(results[1].request.context.get("who"), Some(&Value::from("y")));
}

#[test]
fn placeholders_inside_sets_are_substituted() {
    let context: Record = [(
        "ids",
        Value::Set(vec![Value::Long(1), variable("n")].into()),
    )]
    .into_iter()
    .collect();
    let policies = PolicySet::from_policies([
        Policy::permit().when(Expr::context().access("ids").contains(Expr::long(5))),
    ]);
    let request = BatchRequest::new(ent("P", "1"), ent("A", "1"), ent("R", "1"), Value::Record(context))
        .variable("n", vec![Value::Long(4), Value::Long(5)]);

    let results = collect(&policies, &Entities::new(), request);

    assert_eq!(
        results.iter().map(|r| r.decision).collect::<Vec<_>>(),
        vec![Decision::Deny, Decision::Allow]
    );
}

#[test]
fn pruned_and_unpruned_runs_agree() {
    let entities: Entities = vec![
        Entity::new(uid("P", "1")).with_parent(uid("G", "admins")),
        Entity::new(uid("P", "2")),
    ]
    .into();
    let policies = PolicySet::from_policies([
        Policy::permit().principal_in(uid("G", "admins")),
        Policy::permit()
            .action_eq(uid("A", "2"))
            .when(Expr::context().access("ok").equal(Expr::boolean(true))),
        Policy::forbid().resource_eq(uid("R", "3")).unless(Expr::principal().is_type("P")),
    ]);
    let context: Record = [("ok", variable("ok"))].into_iter().collect();
    let request = || {
        BatchRequest::new(
            variable("principal"),
            variable("action"),
            variable("resource"),
            Value::Record(context.clone()),
        )
        .variable("principal", vec![ent("P", "1"), ent("P", "2")])
        .variable("action", vec![ent("A", "1"), ent("A", "2")])
        .variable("resource", vec![ent("R", "1"), ent("R", "3")])
        .variable("ok", vec![Value::Bool(true), Value::Bool(false)])
    };

    let pruned = collect(&policies, &entities, request());
    let (outcome, naive) = collect_with(
        BatchRunner::new(BatchConfig {
            prune: false,
            ..BatchConfig::default()
        }),
        &policies,
        &entities,
        request(),
    );
    outcome.unwrap();

    assert_eq!(pruned.len(), 16);
    assert_eq!(pruned, naive);
}
