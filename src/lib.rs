// Library root
// -----------
// This crate exposes the pieces of the `updatebot` CLI as a small library.
// The binary (`main.rs`) wires them together for a single run.
//
// Module responsibilities:
// - `cli`: Parses and validates the command-line flags into `Options`.
// - `config`: Reads the API endpoints from the environment.
// - `token`: Resolves the bot token from the environment or a prompt.
// - `avatar`: Turns a URL or file path into a base64 image payload.
// - `api`: Encapsulates the HTTP transport and the profile PATCH call.
// - `ui`: Runs the update flow and prints the confirmation.
// - `error`: Error types shared by the modules above.
pub mod api;
pub mod avatar;
pub mod cli;
pub mod config;
pub mod error;
pub mod token;
pub mod ui;

pub use crate::error::{ApiError, AvatarError, Error, Result};
