//! Conversation request/response payloads and the scripted response builder.
//!
//! A request carries the user's utterance (`input.text`) and optional flags
//! (`optionalArgs`). The builder applies a fixed chain of rules; each rule whose
//! predicate matches overwrites fields set by earlier rules, so order matters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const ECHO_PREFIX: &str = "Echo: ";
const INIT_KIND: &str = "init";
const GREETING_TEXT: &str = "Hi there!";
const FALLBACK_PREFIX: &str = "why";
const FALLBACK_TEXT: &str = "I do not know how to answer that";
const SHOW_CARD_TRIGGER: &str = "show card";
const SHOW_CARD_TEXT: &str = "Here is a cat";

/// Variables visible to the client must carry this prefix.
pub const PUBLIC_VARIABLE_PREFIX: &str = "public-";

const CAT_CARD_ID: &str = "cat";
const CAT_CARD_ALT: &str = "A cute kitten";
const CAT_CARD_URL: &str = "https://img.freepik.com/premium-photo/little-kitten-wrapped-beige-knitted-scarf-shop-goods-cats_132375-1602.jpg?semt=ais_hybrid&w=740";

/// User utterance: `{ "text": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInput {
    pub text: String,
}

/// Reply utterance: `{ "text": "..." }`. May contain a `@showcards(id)` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationOutput {
    pub text: String,
}

/// Auxiliary request flags. Kept open-ended; only `kind` is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionalArgs(pub Map<String, Value>);

impl OptionalArgs {
    /// String value of `kind`, if present and a string.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(|v| v.as_str())
    }

    pub fn with_kind(kind: impl Into<String>) -> Self {
        let mut args = Map::new();
        args.insert("kind".to_string(), Value::String(kind.into()));
        Self(args)
    }
}

/// Body of a `conversationRequest` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub input: ConversationInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_args: Option<OptionalArgs>,
}

impl ConversationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            input: ConversationInput { text: text.into() },
            optional_args: None,
        }
    }

    /// Session-start request: `optionalArgs.kind == "init"`.
    pub fn init(text: impl Into<String>) -> Self {
        Self {
            input: ConversationInput { text: text.into() },
            optional_args: Some(OptionalArgs::with_kind(INIT_KIND)),
        }
    }

    /// True when the client flagged this request as a session start. Case-sensitive.
    pub fn is_init(&self) -> bool {
        self.optional_args
            .as_ref()
            .and_then(OptionalArgs::kind)
            .is_some_and(|k| k == INIT_KIND)
    }
}

/// Rich content the client renders for a `@showcards(id)` directive.
/// Wire: `{ "component": "image", "data": { "alt": ..., "url": ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "component", content = "data", rename_all = "lowercase")]
pub enum Card {
    Image { alt: String, url: String },
}

impl Card {
    pub fn component(&self) -> &'static str {
        match self {
            Card::Image { .. } => "image",
        }
    }
}

/// Body of a `conversationResponse` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub input: ConversationInput,
    pub output: ConversationOutput,
    #[serde(default)]
    pub variables: BTreeMap<String, Card>,
    #[serde(default)]
    pub fallback: bool,
}

impl ConversationResponse {
    fn echo(text: &str) -> Self {
        Self {
            input: ConversationInput {
                text: text.to_string(),
            },
            output: ConversationOutput {
                text: format!("{}{}", ECHO_PREFIX, text),
            },
            variables: BTreeMap::new(),
            fallback: false,
        }
    }

    /// Register a card under its public variable name and return the directive token for it.
    fn add_card(&mut self, id: &str, card: Card) -> String {
        self.variables
            .insert(format!("{}{}", PUBLIC_VARIABLE_PREFIX, id), card);
        format!("@showcards({})", id)
    }
}

/// Build the scripted reply for one request. Pure: no state is read or kept.
///
/// Rules run in a fixed order and each one overwrites `output.text` when it matches:
/// echo, init greeting, "why" fallback, "show card" directive.
pub fn build_response(req: &ConversationRequest) -> ConversationResponse {
    let text = req.input.text.as_str();
    let lowered = text.to_lowercase();

    let mut resp = ConversationResponse::echo(text);

    if req.is_init() {
        resp.output.text = GREETING_TEXT.to_string();
    }

    if lowered.starts_with(FALLBACK_PREFIX) {
        resp.output.text = FALLBACK_TEXT.to_string();
        resp.fallback = true;
    }

    if lowered == SHOW_CARD_TRIGGER {
        let directive = resp.add_card(
            CAT_CARD_ID,
            Card::Image {
                alt: CAT_CARD_ALT.to_string(),
                url: CAT_CARD_URL.to_string(),
            },
        );
        resp.output.text = format!("{} {}", SHOW_CARD_TEXT, directive);
    }

    resp
}
