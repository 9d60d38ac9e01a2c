//! Shared types for the JTrace backend.
//!
//! `config` holds the process configuration, `api` the request payloads and
//! JWT claims, `models` the JSON views returned inside the response envelope.

pub mod api;
pub mod config;
pub mod models;
