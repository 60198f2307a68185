use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A Host→Guest message (spec.md §4.2, §6). Tagged on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    #[serde(rename = "CALL_FUNCTION")]
    CallFunction {
        #[serde(rename = "fnId")]
        fn_id: String,
        args: Vec<Value>,
    },
    #[serde(rename = "HOST_EVENT")]
    HostEvent {
        #[serde(rename = "eventName")]
        event_name: String,
        payload: Value,
    },
    #[serde(rename = "CONFIG_UPDATE")]
    ConfigUpdate { config: Value },
    #[serde(rename = "DESTROY")]
    Destroy,
}

/// A Guest→Host event, delivered via `__sendEventToHost` (spec.md §4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestEvent {
    pub event: String,
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_function_serializes_with_spec_field_names() {
        let msg = HostMessage::CallFunction {
            fn_id: "fn_1_0".into(),
            args: vec![Value::Num(1.0)],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "CALL_FUNCTION");
        assert_eq!(json["fnId"], "fn_1_0");
    }

    #[test]
    fn destroy_has_no_extra_fields() {
        let json = serde_json::to_string(&HostMessage::Destroy).unwrap();
        assert_eq!(json, r#"{"type":"DESTROY"}"#);
    }
}
