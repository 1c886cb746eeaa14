//! Scene relay core library: envelope protocol, scripted conversation replies,
//! and the WebSocket gateway used by the CLI.

pub mod config;
pub mod conversation;
pub mod gateway;
