//! Per-frame handling: decode, dispatch by envelope name, build and encode the reply.
//!
//! Rejected input is logged and dropped; the client gets no error frame and the
//! connection stays open.

use crate::conversation::build_response;
use crate::gateway::protocol::{Envelope, SceneMessage};

/// Handle one inbound text frame. Returns the text to send back, if any.
pub fn handle_message(raw: &str) -> Option<String> {
    log::debug!("raw message received: {}", raw);
    let env = match Envelope::decode(raw) {
        Ok(env) => env,
        Err(e) => {
            log::warn!("unrecognized message: {}", e);
            return None;
        }
    };

    let name = env.name.clone();
    let req = match SceneMessage::from_envelope(env) {
        Ok(SceneMessage::ConversationRequest(req)) => req,
        Ok(SceneMessage::Other { name }) => {
            log::debug!("received {} message, skipping processing", name);
            return None;
        }
        Err(e) => {
            log::warn!("failed to process {}: {}", name, e);
            return None;
        }
    };

    log::debug!("conversation request: {:?}", req);
    let resp = build_response(&req);
    match Envelope::conversation_response(resp).encode() {
        Ok(text) => Some(text),
        Err(e) => {
            log::warn!("failed to encode conversation response: {}", e);
            None
        }
    }
}
