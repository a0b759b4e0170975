//! Push channel wire protocol
//!
//! Every WebSocket text frame is a JSON object `{"event": <name>, "data": <json>}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use telesync_core::MetricId;

use crate::Result;

/// Client -> server: authentication handshake
pub const AUTHENTICATION: &str = "authentication";
/// Server -> client: handshake accepted
pub const AUTHENTICATED: &str = "authenticated";
/// Client -> server: start last-value notifications for a variable
pub const SUBSCRIBE_LAST_VALUE: &str = "rt/variables/id/last_value";
/// Client -> server: stop last-value notifications for a variable
pub const UNSUBSCRIBE_LAST_VALUE: &str = "unsub/rt/variables/id/last_value";

const LAST_VALUE_PREFIX: &str = "rt/variables/";
const LAST_VALUE_SUFFIX: &str = "/last_value";

/// Event name the server uses for last-value notifications of `metric`
pub fn last_value_event(metric: &MetricId) -> String {
    format!("{}{}{}", LAST_VALUE_PREFIX, metric, LAST_VALUE_SUFFIX)
}

/// Extract the metric id from a last-value event name
pub fn parse_last_value_event(event: &str) -> Option<MetricId> {
    let id = event
        .strip_prefix(LAST_VALUE_PREFIX)?
        .strip_suffix(LAST_VALUE_SUFFIX)?;
    if id.is_empty() || id == "id" || id.contains('/') {
        return None;
    }
    Some(MetricId::new(id))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Decoded server -> client frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Authenticated,
    LastValue { metric: MetricId, payload: String },
    Other(String),
}

impl Frame {
    pub fn authentication(token: &str) -> Self {
        Self {
            event: AUTHENTICATION.to_string(),
            data: json!({ "token": token }),
        }
    }

    pub fn subscribe(metric: &MetricId) -> Self {
        Self {
            event: SUBSCRIBE_LAST_VALUE.to_string(),
            data: json!({ "variable": metric }),
        }
    }

    pub fn unsubscribe(metric: &MetricId) -> Self {
        Self {
            event: UNSUBSCRIBE_LAST_VALUE.to_string(),
            data: json!({ "variable": metric }),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Classify a server frame. Last-value payloads are kept JSON-encoded;
    /// the server sends them either as a string or as an inline object.
    pub fn into_inbound(self) -> Inbound {
        if self.event == AUTHENTICATED {
            return Inbound::Authenticated;
        }
        match parse_last_value_event(&self.event) {
            Some(metric) => {
                let payload = match self.data {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Inbound::LastValue { metric, payload }
            }
            None => Inbound::Other(self.event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_value_event_names() {
        let id = MetricId::new("62c6864f1d847253a1354a2f");
        let event = last_value_event(&id);
        assert_eq!(event, "rt/variables/62c6864f1d847253a1354a2f/last_value");
        assert_eq!(parse_last_value_event(&event), Some(id));
        // The subscribe intent itself must not be mistaken for a notification
        assert_eq!(parse_last_value_event(SUBSCRIBE_LAST_VALUE), None);
        assert_eq!(parse_last_value_event("rt/variables//last_value"), None);
    }

    #[test]
    fn test_outbound_frames() {
        let frame = Frame::subscribe(&MetricId::new("abc"));
        assert_eq!(
            frame.encode().unwrap(),
            r#"{"event":"rt/variables/id/last_value","data":{"variable":"abc"}}"#
        );
        let auth = Frame::authentication("secret");
        assert_eq!(auth.data["token"], "secret");
    }

    #[test]
    fn test_inbound_string_and_object_payloads() {
        let as_string = Frame::decode(
            r#"{"event":"rt/variables/abc/last_value","data":"{\"value\":1.5,\"timestamp\":10}"}"#,
        )
        .unwrap();
        assert_eq!(
            as_string.into_inbound(),
            Inbound::LastValue {
                metric: MetricId::new("abc"),
                payload: r#"{"value":1.5,"timestamp":10}"#.to_string(),
            }
        );

        let inline = Frame::decode(
            r#"{"event":"rt/variables/abc/last_value","data":{"value":2,"timestamp":11}}"#,
        )
        .unwrap();
        match inline.into_inbound() {
            Inbound::LastValue { payload, .. } => {
                let v: Value = serde_json::from_str(&payload).unwrap();
                assert_eq!(v["timestamp"], 11);
            }
            other => panic!("unexpected {:?}", other),
        }

        let auth = Frame::decode(r#"{"event":"authenticated"}"#).unwrap();
        assert_eq!(auth.into_inbound(), Inbound::Authenticated);
    }
}
