//! Scene envelope protocol: `{ "category", "kind", "name", "body" }` text frames.

use crate::conversation::{ConversationRequest, ConversationResponse};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SCENE_CATEGORY: &str = "scene";
pub const REQUEST_KIND: &str = "request";
pub const CONVERSATION_REQUEST: &str = "conversationRequest";
pub const CONVERSATION_RESPONSE: &str = "conversationResponse";

/// Inbound body before it is interpreted by name.
pub type RawBody = Map<String, Value>;

/// Wire envelope. `B` is the body: an untyped JSON object on decode, a typed payload on encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "B: DeserializeOwned + Default"))]
pub struct Envelope<B = RawBody> {
    pub category: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub body: B,
}

/// Text frame that is not a valid envelope.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("envelope field `{0}` must not be empty")]
    EmptyField(&'static str),
}

/// Envelope decoded but its body does not match the shape its name requires.
#[derive(Debug, thiserror::Error)]
#[error("invalid {name} body: {source}")]
pub struct PayloadValidationError {
    pub name: String,
    #[source]
    pub source: serde_json::Error,
}

impl Envelope<RawBody> {
    /// Parse and validate one text frame. A missing `body` becomes `{}`.
    /// A key repeated within one object keeps its last value.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(raw)?;
        let env: Envelope<RawBody> = serde_json::from_value(value)?;
        for (field, value) in [
            ("category", &env.category),
            ("kind", &env.kind),
            ("name", &env.name),
        ] {
            if value.is_empty() {
                return Err(DecodeError::EmptyField(field));
            }
        }
        Ok(env)
    }

    /// Interpret the body as the payload type `T`.
    pub fn into_body<T: DeserializeOwned>(self) -> Result<T, PayloadValidationError> {
        let Envelope { name, body, .. } = self;
        serde_json::from_value(Value::Object(body))
            .map_err(|source| PayloadValidationError { name, source })
    }
}

impl<B> Envelope<B> {
    fn scene_request(name: &str, body: B) -> Self {
        Self {
            category: SCENE_CATEGORY.to_string(),
            kind: REQUEST_KIND.to_string(),
            name: name.to_string(),
            body,
        }
    }
}

impl<B: Serialize> Envelope<B> {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Envelope<ConversationResponse> {
    /// Outbound reply envelope (`scene` / `request` / `conversationResponse`).
    pub fn conversation_response(resp: ConversationResponse) -> Self {
        Self::scene_request(CONVERSATION_RESPONSE, resp)
    }
}

impl Envelope<ConversationRequest> {
    /// Client-side request envelope (`scene` / `request` / `conversationRequest`).
    pub fn conversation_request(req: ConversationRequest) -> Self {
        Self::scene_request(CONVERSATION_REQUEST, req)
    }
}

/// Inbound envelope interpreted by name.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneMessage {
    ConversationRequest(ConversationRequest),
    /// Any name without a handler; carried so the caller can log it.
    Other { name: String },
}

impl SceneMessage {
    pub fn from_envelope(env: Envelope<RawBody>) -> Result<Self, PayloadValidationError> {
        if env.name == CONVERSATION_REQUEST {
            env.into_body().map(SceneMessage::ConversationRequest)
        } else {
            Ok(SceneMessage::Other { name: env.name })
        }
    }
}
