//! Discord integration for Dividy.
//!
//! Everything that speaks Discord lives here, split by concern:
//! - `components`: components V2 value objects and the separator showcase message
//! - `commands`: slash command descriptors, the command registry, and handlers
//! - `events`: gateway event envelopes and dispatching to registered handlers
//! - `gateway`: websocket connection, heartbeats, and the resilient runner loop
//! - `rest`: HTTP client for command registration and interaction callbacks
//!
//! The binary crate wires these together; nothing in here reads the process
//! environment or installs global state, so each piece stays testable with
//! scripted fakes.

pub mod commands;
pub mod components;
pub mod events;
pub mod gateway;
pub mod rest;
