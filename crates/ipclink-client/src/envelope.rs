use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// `type` tag of a reply envelope.
pub const TYPE_REPLY: &str = "reply";
/// `type` tag of an error envelope.
pub const TYPE_ERROR: &str = "error";
/// `type` tag of a push envelope.
pub const TYPE_PUSH: &str = "push";

/// One message on the wire.
///
/// Requests carry no `type` tag; every other variant does.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Outbound call of a named operation.
    Request {
        id: String,
        name: String,
        args: Value,
    },
    /// Successful answer to the request with the same id.
    Reply { id: String, result: Value },
    /// Failure notification for the request with the same id.
    Error { id: String },
    /// Server-initiated event, not tied to any request.
    Push { name: String, args: Value },
}

#[derive(Serialize)]
struct RequestOut<'a> {
    id: &'a str,
    name: &'a str,
    args: &'a Value,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedOut<'a> {
    Reply { id: &'a str, result: &'a Value },
    Error { id: &'a str },
    Push { name: &'a str, args: &'a Value },
}

#[derive(Deserialize)]
struct RequestIn {
    id: String,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedIn {
    Reply {
        id: String,
        #[serde(default)]
        result: Value,
    },
    Error {
        id: String,
    },
    Push {
        name: String,
        #[serde(default)]
        args: Value,
    },
}

impl From<TaggedIn> for Envelope {
    fn from(tagged: TaggedIn) -> Self {
        match tagged {
            TaggedIn::Reply { id, result } => Envelope::Reply { id, result },
            TaggedIn::Error { id } => Envelope::Error { id },
            TaggedIn::Push { name, args } => Envelope::Push { name, args },
        }
    }
}

impl Envelope {
    /// Build a request envelope.
    pub fn request(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Envelope::Request {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Request { .. } => "request",
            Envelope::Reply { .. } => TYPE_REPLY,
            Envelope::Error { .. } => TYPE_ERROR,
            Envelope::Push { .. } => TYPE_PUSH,
        }
    }

    /// Correlation id, for the variants that carry one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Envelope::Request { id, .. } | Envelope::Reply { id, .. } | Envelope::Error { id } => {
                Some(id.as_str())
            }
            Envelope::Push { .. } => None,
        }
    }

    /// Serialize to the JSON wire form.
    ///
    /// Output is deterministic: fields in declaration order, object keys in
    /// `args`/`result` sorted.
    pub fn encode(&self) -> Result<String> {
        let encoded = match self {
            Envelope::Request { id, name, args } => {
                serde_json::to_string(&RequestOut { id, name, args })
            }
            Envelope::Reply { id, result } => {
                serde_json::to_string(&TaggedOut::Reply { id, result })
            }
            Envelope::Error { id } => serde_json::to_string(&TaggedOut::Error { id }),
            Envelope::Push { name, args } => serde_json::to_string(&TaggedOut::Push { name, args }),
        };
        Ok(encoded?)
    }

    /// Parse the JSON wire form.
    ///
    /// Anything that is not a JSON object, lacks the fields its shape needs, or
    /// has a non-string `type` is [`ClientError::MalformedEnvelope`]. A string
    /// `type` this protocol does not define is
    /// [`ClientError::UnknownEnvelopeType`].
    pub fn decode(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(malformed)?;
        if !value.is_object() {
            return Err(ClientError::MalformedEnvelope(
                "envelope must be a JSON object".to_string(),
            ));
        }

        let kind = match value.get("type") {
            None => None,
            Some(Value::String(kind)) => Some(kind.clone()),
            Some(_) => {
                return Err(ClientError::MalformedEnvelope(
                    "`type` must be a string".to_string(),
                ))
            }
        };

        match kind.as_deref() {
            None => {
                let request: RequestIn = serde_json::from_value(value).map_err(malformed)?;
                Ok(Envelope::Request {
                    id: request.id,
                    name: request.name,
                    args: request.args,
                })
            }
            Some(TYPE_REPLY | TYPE_ERROR | TYPE_PUSH) => {
                let tagged: TaggedIn = serde_json::from_value(value).map_err(malformed)?;
                Ok(tagged.into())
            }
            Some(other) => Err(ClientError::UnknownEnvelopeType(other.to_string())),
        }
    }
}

fn malformed(err: serde_json::Error) -> ClientError {
    ClientError::MalformedEnvelope(err.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_wire_form_has_no_type_tag() {
        let raw = Envelope::request("r1", "echo", json!({"x": 1}))
            .encode()
            .unwrap();
        assert_eq!(raw, r#"{"id":"r1","name":"echo","args":{"x":1}}"#);
    }

    #[test]
    fn tagged_wire_forms() {
        let reply = Envelope::Reply {
            id: "r1".into(),
            result: json!([1, 2]),
        };
        assert_eq!(
            reply.encode().unwrap(),
            r#"{"type":"reply","id":"r1","result":[1,2]}"#
        );
        assert_eq!(
            Envelope::Error { id: "r2".into() }.encode().unwrap(),
            r#"{"type":"error","id":"r2"}"#
        );
        let push = Envelope::Push {
            name: "tick".into(),
            args: json!(7),
        };
        assert_eq!(
            push.encode().unwrap(),
            r#"{"type":"push","name":"tick","args":7}"#
        );
    }

    #[test]
    fn encoding_is_deterministic_for_object_args() {
        let a = Envelope::request("r", "m", json!({"b": 2, "a": 1}));
        let b = Envelope::request("r", "m", json!({"a": 1, "b": 2}));
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn decodes_every_variant() {
        assert_eq!(
            Envelope::decode(r#"{"id":"1","name":"echo","args":{"x":1}}"#).unwrap(),
            Envelope::request("1", "echo", json!({"x": 1}))
        );
        assert_eq!(
            Envelope::decode(r#"{"type":"reply","id":"1","result":"boom"}"#).unwrap(),
            Envelope::Reply {
                id: "1".into(),
                result: json!("boom")
            }
        );
        assert_eq!(
            Envelope::decode(r#"{"type":"error","id":"1"}"#).unwrap(),
            Envelope::Error { id: "1".into() }
        );
        assert_eq!(
            Envelope::decode(r#"{"type":"push","name":"tick","args":[1]}"#).unwrap(),
            Envelope::Push {
                name: "tick".into(),
                args: json!([1])
            }
        );
    }

    #[test]
    fn missing_payload_fields_decode_as_null() {
        assert_eq!(
            Envelope::decode(r#"{"id":"1","name":"ping"}"#).unwrap(),
            Envelope::request("1", "ping", Value::Null)
        );
        assert_eq!(
            Envelope::decode(r#"{"type":"reply","id":"1"}"#).unwrap(),
            Envelope::Reply {
                id: "1".into(),
                result: Value::Null
            }
        );
    }

    #[test]
    fn unknown_type_is_its_own_error() {
        let err = Envelope::decode(r#"{"type":"bogus","id":"1"}"#).unwrap_err();
        assert!(matches!(err, ClientError::UnknownEnvelopeType(ref t) if t == "bogus"));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let cases = [
            "not json",
            "[1,2,3]",
            r#""just a string""#,
            r#"{"args":{}}"#,
            r#"{"id":"1"}"#,
            r#"{"name":"orphan"}"#,
            r#"{"type":"reply","result":1}"#,
            r#"{"type":"push","args":1}"#,
            r#"{"type":7,"id":"1"}"#,
            r#"{"id":5,"name":"ping"}"#,
        ];
        for raw in cases {
            let err = Envelope::decode(raw).unwrap_err();
            assert!(
                matches!(err, ClientError::MalformedEnvelope(_)),
                "{raw} should be malformed, got {err:?}"
            );
        }
    }

    #[test]
    fn id_and_kind_accessors() {
        let push = Envelope::Push {
            name: "n".into(),
            args: Value::Null,
        };
        assert_eq!(push.id(), None);
        assert_eq!(push.kind(), "push");
        assert_eq!(Envelope::Error { id: "e".into() }.id(), Some("e"));
        assert_eq!(Envelope::request("q", "n", Value::Null).kind(), "request");
    }
}
