use std::collections::HashMap;

use vbridge_receiver::Receiver;
use vbridge_registry::{Component, ComponentRegistry};
use vbridge_wire::{NodeId, Operation, OperationBatch, Value};

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new(false);
    registry.register("View", Component { name: "View".into() });
    registry.register("Text", Component { name: "Text".into() });
    registry
}

fn props(entries: &[(&str, Value)]) -> Value {
    Value::Object(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

fn batch(batch_id: u64, ops: Vec<Operation>) -> OperationBatch {
    OperationBatch::new(batch_id, ops)
}

/// spec.md §8 scenario 1: `View{testID:"t"}` containing `Text "Hello"`.
#[test]
fn simple_tree_renders_view_containing_text() {
    let mut receiver = Receiver::new(registry(), None);

    let outcome = receiver
        .apply_batch(batch(
            1,
            vec![
                Operation::Create {
                    id: NodeId(1),
                    node_type: "View".into(),
                    serialized_props: props(&[("testID", Value::Str("t".into()))]),
                },
                Operation::Create {
                    id: NodeId(2),
                    node_type: "__TEXT__".into(),
                    serialized_props: Value::Object(HashMap::new()),
                },
                Operation::Text { id: NodeId(2), text: "Hello".into() },
                Operation::Append { parent_id: NodeId(1), child_id: NodeId(2) },
                Operation::Append { parent_id: NodeId::ROOT, child_id: NodeId(1) },
            ],
        ))
        .unwrap();

    assert_eq!(outcome.applied, 5);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(receiver.node_count(), 3); // root + View + Text
    let view = receiver.get(NodeId(1)).unwrap();
    assert_eq!(view.children, vec![NodeId(2)]);
    let text = receiver.get(NodeId(2)).unwrap();
    assert_eq!(text.props, Value::Str("Hello".into()));
}

/// spec.md §8 round-trip law: `CREATE x; DELETE x` leaves the tree unchanged.
#[test]
fn create_then_delete_leaves_tree_unchanged() {
    let mut receiver = Receiver::new(registry(), None);
    let before = receiver.node_count();

    receiver
        .apply_batch(batch(
            1,
            vec![
                Operation::Create { id: NodeId(1), node_type: "View".into(), serialized_props: Value::Object(HashMap::new()) },
                Operation::Delete { id: NodeId(1) },
            ],
        ))
        .unwrap();

    assert_eq!(receiver.node_count(), before);
    assert!(receiver.get(NodeId(1)).is_none());
}

/// spec.md §8 round-trip law: `CREATE x; APPEND p,x; REMOVE p,x` yields x
/// orphaned, p with its prior children.
#[test]
fn append_then_remove_orphans_the_child() {
    let mut receiver = Receiver::new(registry(), None);
    receiver
        .apply_batch(batch(
            1,
            vec![
                Operation::Create { id: NodeId(1), node_type: "View".into(), serialized_props: Value::Object(HashMap::new()) },
                Operation::Create { id: NodeId(2), node_type: "View".into(), serialized_props: Value::Object(HashMap::new()) },
                Operation::Append { parent_id: NodeId(1), child_id: NodeId(2) },
                Operation::Remove { parent_id: NodeId(1), child_id: NodeId(2) },
            ],
        ))
        .unwrap();

    assert!(receiver.get(NodeId(1)).unwrap().children.is_empty());
    let orphan = receiver.get(NodeId(2)).unwrap();
    assert!(orphan.parent.is_none());
}

/// spec.md §8 scenario 4: deleting a parent cascades to its descendants and
/// empties the root's children.
#[test]
fn delete_cascades_to_descendants_and_clears_root() {
    let mut receiver = Receiver::new(registry(), None);
    receiver
        .apply_batch(batch(
            1,
            vec![
                Operation::Create { id: NodeId(1), node_type: "View".into(), serialized_props: Value::Object(HashMap::new()) },
                Operation::Create { id: NodeId(2), node_type: "__TEXT__".into(), serialized_props: Value::Object(HashMap::new()) },
                Operation::Append { parent_id: NodeId(1), child_id: NodeId(2) },
                Operation::Append { parent_id: NodeId::ROOT, child_id: NodeId(1) },
            ],
        ))
        .unwrap();

    let outcome = receiver.apply_batch(batch(2, vec![Operation::Delete { id: NodeId(1) }])).unwrap();

    assert_eq!(outcome.deleted.len(), 2);
    assert!(outcome.deleted.contains(&NodeId(1)));
    assert!(outcome.deleted.contains(&NodeId(2)));
    assert!(receiver.get(NodeId(1)).is_none());
    assert!(receiver.get(NodeId(2)).is_none());
    assert!(receiver.get(NodeId::ROOT).unwrap().children.is_empty());
}

/// spec.md §8 scenario 6: `maxBatchSize=3` applied to a batch of 5 CREATEs
/// applies exactly 3 and skips the remaining 2, leaving the tree in the
/// partially-applied state rather than rolling back.
#[test]
fn oversized_batch_applies_up_to_the_limit_and_skips_the_rest() {
    let mut receiver = Receiver::new(registry(), Some(3));
    let ops: Vec<Operation> = (1..=5)
        .map(|i| Operation::Create { id: NodeId(i), node_type: "View".into(), serialized_props: Value::Object(HashMap::new()) })
        .collect();

    let outcome = receiver.apply_batch(batch(1, ops)).unwrap();
    assert_eq!(outcome.applied, 3);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(receiver.node_count(), 4); // root + 3 applied CREATEs
    assert!(receiver.get(NodeId(4)).is_none());
    assert!(receiver.get(NodeId(5)).is_none());
}

/// spec.md §8 boundary behavior: REORDER with the current child sequence
/// is a no-op.
#[test]
fn reorder_with_identical_sequence_is_a_noop() {
    let mut receiver = Receiver::new(registry(), None);
    receiver
        .apply_batch(batch(
            1,
            vec![
                Operation::Create { id: NodeId(1), node_type: "View".into(), serialized_props: Value::Object(HashMap::new()) },
                Operation::Create { id: NodeId(2), node_type: "View".into(), serialized_props: Value::Object(HashMap::new()) },
                Operation::Append { parent_id: NodeId::ROOT, child_id: NodeId(1) },
                Operation::Append { parent_id: NodeId::ROOT, child_id: NodeId(2) },
            ],
        ))
        .unwrap();

    let before = receiver.get(NodeId::ROOT).unwrap().children.clone();
    let outcome = receiver
        .apply_batch(batch(2, vec![Operation::Reorder { parent_id: NodeId::ROOT, child_ids: before.clone() }]))
        .unwrap();

    assert_eq!(outcome.applied, 1);
    assert_eq!(receiver.get(NodeId::ROOT).unwrap().children, before);
}

/// spec.md §8 scenario 3 / §4.6: UPDATE carries a prop diff, not the full
/// prop set — a key absent from both the diff and `removedProps` survives
/// the update untouched.
#[test]
fn update_merges_the_diff_and_retains_untouched_props() {
    let mut receiver = Receiver::new(registry(), None);
    receiver
        .apply_batch(batch(
            1,
            vec![Operation::Create {
                id: NodeId(1),
                node_type: "Button".into(),
                serialized_props: props(&[
                    ("testID", Value::Str("t".into())),
                    ("onPress", Value::Fn(vbridge_wire::FnMarker::new("fn_1_0"))),
                ]),
            }],
        ))
        .unwrap();

    receiver
        .apply_batch(batch(
            2,
            vec![Operation::Update {
                id: NodeId(1),
                props: props(&[("onPress", Value::Fn(vbridge_wire::FnMarker::new("fn_1_1")))]),
                removed_props: None,
            }],
        ))
        .unwrap();

    let node = receiver.get(NodeId(1)).unwrap();
    match &node.props {
        Value::Object(map) => {
            assert_eq!(map.get("testID"), Some(&Value::Str("t".into())));
            assert_eq!(map.get("onPress"), Some(&Value::Fn(vbridge_wire::FnMarker::new("fn_1_1"))));
        }
        other => panic!("expected an object, got {other:?}"),
    }
}

/// spec.md §4.6: `removedProps` keys are dropped from the merged result.
#[test]
fn update_removes_keys_listed_in_removed_props() {
    let mut receiver = Receiver::new(registry(), None);
    receiver
        .apply_batch(batch(
            1,
            vec![Operation::Create {
                id: NodeId(1),
                node_type: "View".into(),
                serialized_props: props(&[("testID", Value::Str("t".into())), ("hidden", Value::Bool(true))]),
            }],
        ))
        .unwrap();

    receiver
        .apply_batch(batch(
            2,
            vec![Operation::Update {
                id: NodeId(1),
                props: Value::Object(HashMap::new()),
                removed_props: Some(vec!["hidden".into()]),
            }],
        ))
        .unwrap();

    let node = receiver.get(NodeId(1)).unwrap();
    match &node.props {
        Value::Object(map) => {
            assert_eq!(map.get("testID"), Some(&Value::Str("t".into())));
            assert!(!map.contains_key("hidden"));
        }
        other => panic!("expected an object, got {other:?}"),
    }
}

/// spec.md §8 boundary behavior: UPDATE on an unknown id warns and skips
/// rather than erroring the whole batch.
#[test]
fn update_on_unknown_id_is_skipped_not_fatal() {
    let mut receiver = Receiver::new(registry(), None);
    let outcome = receiver
        .apply_batch(batch(1, vec![Operation::Update { id: NodeId(99), props: Value::Null, removed_props: None }]))
        .unwrap();

    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.skipped, 1);
}
