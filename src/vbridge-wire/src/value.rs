use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A structured-clone-safe value that can cross the Guest/Host isolation
/// boundary: primitives, arrays, objects, and the function marker that
/// replaces a transported closure with an opaque token (spec.md §9: "Model
/// as sum type `Value = Null | Bool | Num | Str | Array | Object | FnRef{id}`").
///
/// `Value` never contains symbols, classes, or `undefined` entries — those
/// are excluded at serialization time by the renderer (spec.md §6).
///
/// `Fn`/`Ref` are serialized as plain objects carrying a `__type` discriminant,
/// so `Serialize`/`Deserialize` are implemented by hand rather than derived:
/// a derived `#[serde(untagged)]` enum would let the generic `Object` variant
/// swallow `{"__type": "function", ...}` before the `Fn` variant ever got a
/// chance, since a `HashMap<String, Value>` parses from that shape too.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
    /// `{__type: "function", __fnId: string}` — a registered callback id.
    Fn(FnMarker),
    /// `{__type: "ref", __refId: string}` — a registered ref id (§4.6).
    Ref(RefMarker),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Num(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Array(items) => items.serialize(serializer),
            Value::Object(map) => map.serialize(serializer),
            Value::Fn(marker) => marker.serialize(serializer),
            Value::Ref(marker) => marker.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Value::try_from_json(raw).map_err(D::Error::custom)
    }
}

impl Value {
    fn try_from_json(raw: serde_json::Value) -> Result<Value, String> {
        match raw {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                Ok(Value::Num(n.as_f64().ok_or("non-finite number")?))
            }
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Array(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(Value::try_from_json)
                    .collect::<Result<_, _>>()?,
            )),
            serde_json::Value::Object(map) => {
                if let Some(serde_json::Value::String(tag)) = map.get("__type") {
                    match tag.as_str() {
                        "function" => {
                            let fn_id = map
                                .get("__fnId")
                                .and_then(|v| v.as_str())
                                .ok_or("function marker missing __fnId")?;
                            return Ok(Value::Fn(FnMarker::new(fn_id)));
                        }
                        "ref" => {
                            let ref_id = map
                                .get("__refId")
                                .and_then(|v| v.as_str())
                                .ok_or("ref marker missing __refId")?;
                            return Ok(Value::Ref(RefMarker::new(ref_id)));
                        }
                        _ => {}
                    }
                }
                let mut out = HashMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, Value::try_from_json(v)?);
                }
                Ok(Value::Object(out))
            }
        }
    }
}

/// The function marker wire shape: `{"__type": "function", "__fnId": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnMarker {
    #[serde(rename = "__type")]
    pub marker_type: FnMarkerTag,
    #[serde(rename = "__fnId")]
    pub fn_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FnMarkerTag {
    #[serde(rename = "function")]
    Function,
}

impl FnMarker {
    pub fn new(fn_id: impl Into<String>) -> Self {
        Self {
            marker_type: FnMarkerTag::Function,
            fn_id: fn_id.into(),
        }
    }
}

/// The ref marker wire shape: `{"__type": "ref", "__refId": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefMarker {
    #[serde(rename = "__type")]
    pub marker_type: RefMarkerTag,
    #[serde(rename = "__refId")]
    pub ref_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefMarkerTag {
    #[serde(rename = "ref")]
    Ref,
}

impl RefMarker {
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self {
            marker_type: RefMarkerTag::Ref,
            ref_id: ref_id.into(),
        }
    }
}

impl Value {
    pub fn is_fn(&self) -> bool {
        matches!(self, Value::Fn(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Walk this value and every nested array/object element, invoking `f`
    /// on each [`FnMarker`] encountered. Used to collect/release function
    /// ids when diffing props.
    pub fn for_each_fn_id<'a>(&'a self, f: &mut dyn FnMut(&'a str)) {
        match self {
            Value::Fn(marker) => f(&marker.fn_id),
            Value::Array(items) => {
                for item in items {
                    item.for_each_fn_id(f);
                }
            }
            Value::Object(map) => {
                for v in map.values() {
                    v.for_each_fn_id(f);
                }
            }
            _ => {}
        }
    }

    /// Collect the set of function ids transitively reachable from this value.
    pub fn collect_fn_ids(&self) -> std::collections::HashSet<String> {
        let mut out = std::collections::HashSet::new();
        self.for_each_fn_id(&mut |id| {
            out.insert(id.to_string());
        });
        out
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = String;

    /// Converts raw JSON into a `Value`, recognizing `__type` markers along
    /// the way (unlike a plain structural mapping, which would leave them as
    /// [`Value::Object`]).
    fn try_from(v: serde_json::Value) -> Result<Self, Self::Error> {
        Value::try_from_json(v)
    }
}
