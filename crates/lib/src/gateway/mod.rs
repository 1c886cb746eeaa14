//! Gateway: HTTP + WebSocket relay.
//!
//! Single port serves a health probe and the WebSocket endpoint. Every text frame
//! is a scene envelope; only `conversationRequest` gets a reply.

mod dispatch;
mod protocol;
mod server;

pub use dispatch::handle_message;
pub use protocol::{
    DecodeError, Envelope, PayloadValidationError, RawBody, SceneMessage, CONVERSATION_REQUEST,
    CONVERSATION_RESPONSE, REQUEST_KIND, SCENE_CATEGORY,
};
pub use server::{run_gateway, run_gateway_with_shutdown};
