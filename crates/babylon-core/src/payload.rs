//! Decoding of inbound extension request bodies.
//!
//! Each decoder checks fields in the order the protocol defines and stops at
//! the first problem, so the caller always gets exactly one reason back.

use serde_json::Value;
use thiserror::Error;

use crate::address::{AddressError, OrchestratorAddress};
use crate::parameters::Parameters;
use crate::session::SessionError;

/// Client protocol errors. The `Display` text is the `error` reason sent back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("missing payload")]
    MissingPayload,

    #[error("malformed payload")]
    MalformedPayload,

    #[error("missing action")]
    MissingAction,

    #[error("missing session id")]
    MissingSessionId,

    #[error("invalid parameters")]
    InvalidParameters,

    #[error("missing callback")]
    MissingCallback,

    #[error("malformed callback URL")]
    MalformedCallback(#[source] AddressError),

    #[error("missing message data")]
    MissingMessageData,

    #[error("missing message type")]
    MissingMessageType,

    #[error("missing message content")]
    MissingMessageContent,

    #[error("missing session id")]
    InvalidSession(#[source] SessionError),
}

impl PayloadError {
    /// Detailed reason for logs. Wider than the wire reason for nested causes.
    pub fn detail(&self) -> String {
        match self {
            Self::MalformedCallback(e) => e.to_string(),
            Self::InvalidSession(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

/// Decode a raw body. An empty body or JSON `null` is no payload at all.
pub fn decode(body: &[u8]) -> Result<Option<Value>, PayloadError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(PayloadError::MalformedPayload),
    }
}

fn require_object(payload: Option<&Value>) -> Result<&serde_json::Map<String, Value>, PayloadError> {
    payload
        .ok_or(PayloadError::MissingPayload)?
        .as_object()
        .ok_or(PayloadError::MalformedPayload)
}

fn non_empty_str<'a>(object: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// `{action, session, parameters?}` sent to an executable extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    pub action: String,
    pub session: String,
    pub parameters: Parameters,
}

impl ExecuteRequest {
    pub fn from_payload(payload: Option<&Value>) -> Result<Self, PayloadError> {
        let object = require_object(payload)?;
        let action = object
            .get("action")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingAction)?;
        let session = non_empty_str(object, "session").ok_or(PayloadError::MissingSessionId)?;
        let parameters = match object.get("parameters") {
            None | Some(Value::Null) => Parameters::new(),
            Some(Value::Object(map)) => Parameters::from(map.clone()),
            Some(_) => return Err(PayloadError::InvalidParameters),
        };

        Ok(Self {
            action: action.to_string(),
            session: session.to_string(),
            parameters,
        })
    }
}

/// `{callback}` sent by an orchestrator to start the connect handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub callback: String,
    pub orchestrator: OrchestratorAddress,
}

impl ConnectRequest {
    pub fn from_payload(payload: Option<&Value>) -> Result<Self, PayloadError> {
        let object = require_object(payload)?;
        let callback = object
            .get("callback")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingCallback)?;
        let orchestrator =
            OrchestratorAddress::from_callback(callback).map_err(PayloadError::MalformedCallback)?;

        Ok(Self {
            callback: callback.to_string(),
            orchestrator,
        })
    }
}

/// `{session, message: {type, message}}` sent to a live reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveLogEvent {
    pub session: String,
    pub category: String,
    pub message: String,
}

impl LiveLogEvent {
    pub fn from_payload(payload: Option<&Value>) -> Result<Self, PayloadError> {
        let object = require_object(payload)?;
        let session = non_empty_str(object, "session").ok_or(PayloadError::MissingSessionId)?;
        let message = object
            .get("message")
            .and_then(Value::as_object)
            .ok_or(PayloadError::MissingMessageData)?;
        let category = message
            .get("type")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingMessageType)?;
        let content = message
            .get("message")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingMessageContent)?;

        Ok(Self {
            session: session.to_string(),
            category: category.to_string(),
            message: content.to_string(),
        })
    }
}
