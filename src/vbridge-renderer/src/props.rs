use std::collections::HashMap;

use vbridge_wire::{Value, RESERVED_PROP_PREFIX};

/// Strip the host-config-internal keys a React-style element carries
/// (`children`, and anything under the `__` escape prefix the wire
/// protocol reserves for markers) before a props object crosses onto the
/// wire. Recurses into nested objects/arrays since a prop value can itself
/// be a plain object the Host will deserialize structurally.
///
/// Function- and ref-valued props are expected to already have been
/// replaced with [`vbridge_wire::FnMarker`]/[`vbridge_wire::RefMarker`]
/// by the Guest-side runtime shim before this ever sees them — a raw JS
/// function cannot survive the JSON bridge a [`Value`] is built from, so
/// minting callback ids has to happen upstream of this crate, not here.
pub fn filter_props(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut filtered = HashMap::with_capacity(map.len());
            for (key, v) in map {
                if key == "children" || key.starts_with(RESERVED_PROP_PREFIX) {
                    continue;
                }
                filtered.insert(key, filter_props(v));
            }
            Value::Object(filtered)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(filter_props).collect()),
        other => other,
    }
}

/// Host-config `shouldSetTextContent` heuristic: true when the element's
/// only meaningful child is a single string/number, so the renderer can
/// skip creating a separate text-node instance and fold it into a `TEXT`
/// op on the parent (spec.md §9).
pub fn should_set_text_content(props: &Value) -> bool {
    let Value::Object(map) = props else {
        return false;
    };
    matches!(map.get("children"), Some(Value::Str(_)) | Some(Value::Num(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_children_and_dunder_keys_recursively() {
        let mut nested = HashMap::new();
        nested.insert("__internal".to_string(), Value::Bool(true));
        nested.insert("label".to_string(), Value::Str("ok".into()));

        let mut props = HashMap::new();
        props.insert("children".to_string(), Value::Str("text".into()));
        props.insert("style".to_string(), Value::Object(nested));

        let filtered = filter_props(Value::Object(props));
        let Value::Object(map) = filtered else { panic!("expected object") };
        assert!(!map.contains_key("children"));
        let Value::Object(style) = &map["style"] else { panic!("expected nested object") };
        assert!(!style.contains_key("__internal"));
        assert_eq!(style["label"], Value::Str("ok".into()));
    }

    #[test]
    fn function_and_ref_markers_pass_through_untouched() {
        let marker = Value::Fn(vbridge_wire::FnMarker::new("fn_1_0"));
        assert_eq!(filter_props(marker.clone()), marker);
    }

    #[test]
    fn single_string_child_should_set_text_content() {
        let mut props = HashMap::new();
        props.insert("children".to_string(), Value::Str("hi".into()));
        assert!(should_set_text_content(&Value::Object(props)));
    }

    #[test]
    fn element_children_should_not_set_text_content() {
        let mut props = HashMap::new();
        props.insert("children".to_string(), Value::Array(vec![]));
        assert!(!should_set_text_content(&Value::Object(props)));
    }
}
