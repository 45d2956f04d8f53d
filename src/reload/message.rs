//! Live Reload Message Protocol
//!
//! JSON frames exchanged with preview clients over the websocket.
//!
//! Server → client: `{event, version, data}` where `event` is `connected`
//! (exactly once, on accept), `update`, or the type of a re-broadcast
//! dispatch.
//!
//! Client → server: `{event: "update" | "dispatch" | "log", data}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version announced in every outgoing frame.
pub const MANIFEST_VERSION: &str = "3";

/// Server → client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outgoing {
    pub event: String,
    pub version: String,
    pub data: Value,
    /// Top-level fields carried over from a dispatched client message
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Outgoing {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            version: MANIFEST_VERSION.to_string(),
            data,
            extra: Map::new(),
        }
    }

    pub fn connected(data: Value) -> Self {
        Self::new("connected", data)
    }

    pub fn update(data: Value) -> Self {
        Self::new("update", data)
    }

    pub fn to_json(&self) -> String {
        // Value-only payload: serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Client → server frame, classified by `event`.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Update(UpdatePayload),
    /// The whole raw message; re-broadcast with server state attached
    Dispatch(Map<String, Value>),
    Log(LogPayload),
    /// Unknown event names are ignored
    Other(String),
}

/// `data` of an inbound `update`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdatePayload {
    #[serde(default)]
    pub app: Option<Map<String, Value>>,
    #[serde(default)]
    pub extensions: Option<Vec<Value>>,
}

/// `data` of an inbound `log` (console output forwarded by a client).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPayload {
    #[serde(rename = "type", default = "default_log_type")]
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub extension_name: String,
}

fn default_log_type() -> String {
    "log".to_string()
}

impl LogPayload {
    /// Console arguments arrive as a JSON array; join them like a console would.
    pub fn formatted(&self) -> String {
        let message = match serde_json::from_str::<Value>(&self.message) {
            Ok(Value::Array(args)) => args
                .iter()
                .map(|arg| match arg {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
            _ => self.message.clone(),
        };

        match self.level.as_str() {
            "log" | "info" => message,
            level => format!("{}: {message}", level.to_ascii_uppercase()),
        }
    }
}

/// Parse a client frame. Malformed JSON is an error; unknown events are not.
pub fn parse_inbound(text: &str) -> Result<Inbound, serde_json::Error> {
    let mut raw: Map<String, Value> = serde_json::from_str(text)?;
    let event = raw
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(match event.as_str() {
        "update" => {
            let data = raw.remove("data").unwrap_or(Value::Null);
            Inbound::Update(serde_json::from_value(data)?)
        }
        "dispatch" => Inbound::Dispatch(raw),
        "log" => {
            let data = raw.remove("data").unwrap_or(Value::Null);
            Inbound::Log(serde_json::from_value(data)?)
        }
        _ => Inbound::Other(event),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outgoing_shape() {
        let msg = Outgoing::connected(json!({"app": {}}));
        let parsed: Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(
            parsed,
            json!({"event": "connected", "version": "3", "data": {"app": {}}})
        );
    }

    #[test]
    fn test_parse_update() {
        let text = r#"{"event":"update","data":{"app":{"apiKey":"k"},"extensions":[{"uuid":"1"}]}}"#;
        match parse_inbound(text).unwrap() {
            Inbound::Update(update) => {
                assert_eq!(update.app.unwrap()["apiKey"], "k");
                assert_eq!(update.extensions.unwrap().len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_dispatch_keeps_whole_message() {
        let text = r#"{"event":"dispatch","data":{"type":"focus","extensions":[{"uuid":"1"}]}}"#;
        match parse_inbound(text).unwrap() {
            Inbound::Dispatch(raw) => {
                assert_eq!(raw["event"], "dispatch");
                assert_eq!(raw["data"]["type"], "focus");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_and_malformed() {
        assert_eq!(
            parse_inbound(r#"{"event":"ping"}"#).unwrap(),
            Inbound::Other("ping".into())
        );
        assert!(parse_inbound("not json").is_err());
    }

    #[test]
    fn test_log_formatting() {
        let log = LogPayload {
            level: "warn".into(),
            message: r#"["total", 3, {"a":1}]"#.into(),
            extension_name: "checkout-ui".into(),
        };
        assert_eq!(log.formatted(), r#"WARN: total 3 {"a":1}"#);

        let plain = LogPayload {
            level: "log".into(),
            message: "hello".into(),
            extension_name: String::new(),
        };
        assert_eq!(plain.formatted(), "hello");
    }
}
