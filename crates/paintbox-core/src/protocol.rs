//! Paintbox wire envelope.
//!
//! All bridge traffic is JSON-over-WebSocket, one object per text message,
//! tagged by `type`: `audio`, `command.invoke`, or `command.result`.
//! `args` and `output` travel as JSON text inside the envelope (double-encoded).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

pub const KIND_AUDIO: &str = "audio";
pub const KIND_COMMAND_INVOKE: &str = "command.invoke";
pub const KIND_COMMAND_RESULT: &str = "command.result";

/// Reasons an inbound text message could not be turned into an [`Envelope`].
///
/// Every variant is recoverable: callers log and drop the message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("envelope has no `type` field")]
    MissingKind,

    #[error("unknown envelope type: {0}")]
    UnknownKind(String),
}

/// One discrete message exchanged over the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Audio(AudioPayload),
    CommandInvoke(InvocationRequest),
    CommandResult(InvocationResult),
}

/// Base64 PCM16 mono audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPayload {
    #[serde(default)]
    pub audio: String,
}

/// A remote request to run one named local operation.
///
/// Fields default when absent so a partially-formed invoke still reaches the
/// dispatcher, which answers it with a failure result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Opaque caller token, echoed verbatim. `None` when the key was absent,
    /// in which case the answer leaves it out too.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub call_id: Option<Value>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

/// The answer to one [`InvocationRequest`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvocationResult {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub call_id: Option<Value>,
    #[serde(default)]
    pub name: String,
    /// JSON text of the output structure.
    #[serde(default)]
    pub output: String,
}

impl Envelope {
    pub fn audio(audio: impl Into<String>) -> Self {
        Self::Audio(AudioPayload {
            audio: audio.into(),
        })
    }

    /// Wire name of this envelope's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Audio(_) => KIND_AUDIO,
            Self::CommandInvoke(_) => KIND_COMMAND_INVOKE,
            Self::CommandResult(_) => KIND_COMMAND_RESULT,
        }
    }

    /// Parse one text message. The kind is read first, then the
    /// kind-specific payload.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        #[derive(Deserialize)]
        struct Kind {
            #[serde(rename = "type")]
            kind: Option<String>,
        }

        let value: Value = serde_json::from_str(raw)?;
        let kind = Kind::deserialize(&value)?
            .kind
            .ok_or(DecodeError::MissingKind)?;

        match kind.as_str() {
            KIND_AUDIO => Ok(Self::Audio(AudioPayload::deserialize(value)?)),
            KIND_COMMAND_INVOKE => Ok(Self::CommandInvoke(InvocationRequest::deserialize(value)?)),
            KIND_COMMAND_RESULT => Ok(Self::CommandResult(InvocationResult::deserialize(value)?)),
            _ => Err(DecodeError::UnknownKind(kind)),
        }
    }

    /// Serialize to transport text. Total: there is no failure path.
    pub fn encode(&self) -> String {
        let value = match self {
            Self::Audio(payload) => json!({
                "type": KIND_AUDIO,
                "audio": payload.audio,
            }),
            Self::CommandInvoke(request) => {
                let args = match &request.args {
                    None => Value::Null,
                    Some(Value::String(text)) => Value::String(text.clone()),
                    Some(other) => Value::String(other.to_string()),
                };
                let mut map = Map::new();
                map.insert("type".into(), KIND_COMMAND_INVOKE.into());
                map.insert("name".into(), request.name.clone().into());
                if let Some(call_id) = &request.call_id {
                    map.insert("call_id".into(), call_id.clone());
                }
                map.insert("args".into(), args);
                Value::Object(map)
            }
            Self::CommandResult(result) => {
                let mut map = Map::new();
                map.insert("type".into(), KIND_COMMAND_RESULT.into());
                if let Some(call_id) = &result.call_id {
                    map.insert("call_id".into(), call_id.clone());
                }
                map.insert("name".into(), result.name.clone().into());
                map.insert("output".into(), result.output.clone().into());
                Value::Object(map)
            }
        };
        value.to_string()
    }
}

/// A key that is present is kept, even when its value is `null`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl InvocationRequest {
    /// Build a request, double-encoding `args` as JSON text.
    pub fn new(call_id: impl Into<Value>, name: impl Into<String>, args: &Value) -> Self {
        Self {
            call_id: Some(call_id.into()),
            name: name.into(),
            args: Some(Value::String(args.to_string())),
        }
    }

    /// Decode the double-encoded `args`.
    ///
    /// Missing, null or blank args read as JSON `null`. A non-string value is
    /// taken as already-decoded arguments.
    pub fn arguments(&self) -> Result<Value, serde_json::Error> {
        match &self.args {
            None | Some(Value::Null) => Ok(Value::Null),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(Value::Null),
            Some(Value::String(text)) => serde_json::from_str(text),
            Some(other) => Ok(other.clone()),
        }
    }
}

impl InvocationResult {
    /// Answer `request`, copying its `call_id` and `name` verbatim.
    pub fn answer(request: &InvocationRequest, output: &Value) -> Self {
        Self {
            call_id: request.call_id.clone(),
            name: request.name.clone(),
            output: output.to_string(),
        }
    }

    /// Decode the double-encoded `output`.
    pub fn output_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_audio() {
        let env = Envelope::decode(r#"{"type":"audio","audio":"AAEC"}"#).unwrap();
        assert_eq!(env, Envelope::audio("AAEC"));
        assert_eq!(env.kind(), "audio");
    }

    #[test]
    fn test_decode_invoke_keeps_call_id_opaque() {
        let raw = r#"{"type":"command.invoke","name":"fillRect","call_id":{"seq":7},"args":"{\"x\":1}"}"#;
        let Envelope::CommandInvoke(req) = Envelope::decode(raw).unwrap() else {
            panic!("expected invoke");
        };
        assert_eq!(req.call_id, Some(json!({"seq": 7})));
        assert_eq!(req.name, "fillRect");
        assert_eq!(req.arguments().unwrap(), json!({"x": 1}));
    }

    #[test]
    fn test_decode_invoke_missing_fields_still_delivered() {
        let Envelope::CommandInvoke(req) = Envelope::decode(r#"{"type":"command.invoke"}"#).unwrap()
        else {
            panic!("expected invoke");
        };
        assert_eq!(req.name, "");
        assert_eq!(req.call_id, None);
        assert_eq!(req.arguments().unwrap(), Value::Null);
    }

    #[test]
    fn test_arguments_tolerates_raw_object() {
        let req = InvocationRequest {
            call_id: Some(json!("c1")),
            name: "moveTo".into(),
            args: Some(json!({"x": 3, "y": 4})),
        };
        assert_eq!(req.arguments().unwrap(), json!({"x": 3, "y": 4}));
    }

    #[test]
    fn test_arguments_invalid_json_text() {
        let req = InvocationRequest {
            args: Some(json!("{not json")),
            ..Default::default()
        };
        assert!(req.arguments().is_err());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Envelope::decode("not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            Envelope::decode(r#"{"audio":"AA=="}"#),
            Err(DecodeError::MissingKind)
        ));
        assert!(matches!(
            Envelope::decode(r#"{"type":"error","message":"x"}"#),
            Err(DecodeError::UnknownKind(kind)) if kind == "error"
        ));
        assert!(matches!(
            Envelope::decode(r#"{"type":"audio","audio":5}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_encode_result_wire_shape() {
        let req = InvocationRequest::new("c1", "fillRect", &json!({"x": 0}));
        let result = InvocationResult::answer(&req, &json!({"success": true, "x": 0}));
        assert_eq!(
            Envelope::CommandResult(result).encode(),
            r#"{"type":"command.result","call_id":"c1","name":"fillRect","output":"{\"success\":true,\"x\":0}"}"#
        );
    }

    #[test]
    fn test_missing_call_id_is_left_out_of_the_answer() {
        let Envelope::CommandInvoke(req) =
            Envelope::decode(r#"{"type":"command.invoke","name":"stroke","args":"{}"}"#).unwrap()
        else {
            panic!("expected invoke");
        };
        let result = InvocationResult::answer(&req, &json!({"success": true}));
        assert_eq!(
            Envelope::CommandResult(result).encode(),
            r#"{"type":"command.result","name":"stroke","output":"{\"success\":true}"}"#
        );
    }

    #[test]
    fn test_null_call_id_is_echoed() {
        let Envelope::CommandInvoke(req) =
            Envelope::decode(r#"{"type":"command.invoke","name":"stroke","call_id":null}"#)
                .unwrap()
        else {
            panic!("expected invoke");
        };
        assert_eq!(req.call_id, Some(Value::Null));
        let result = InvocationResult::answer(&req, &json!({"success": true}));
        assert!(Envelope::CommandResult(result).encode().contains(r#""call_id":null"#));
    }

    #[test]
    fn test_encode_invoke_double_encodes_args() {
        let req = InvocationRequest::new(42, "arc", &json!({"radius": 5}));
        let text = Envelope::CommandInvoke(req.clone()).encode();
        assert_eq!(
            text,
            r#"{"type":"command.invoke","name":"arc","call_id":42,"args":"{\"radius\":5}"}"#
        );
        assert_eq!(Envelope::decode(&text).unwrap(), Envelope::CommandInvoke(req));
    }

    #[test]
    fn test_output_value() {
        let result = InvocationResult {
            output: r#"{"success":false,"error":"not found"}"#.into(),
            ..Default::default()
        };
        assert_eq!(
            result.output_value().unwrap(),
            json!({"success": false, "error": "not found"})
        );
    }
}
