//! Shared configuration for the dividy workspace.
//!
//! Everything runtime-facing (the gateway runner, the REST client, the
//! operator subcommands) loads its settings through [`config::AppConfig`],
//! so token handling and validation live in exactly one place.

pub mod config;
