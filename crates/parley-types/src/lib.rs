//! Shared domain types for Parley.
//!
//! This crate contains the domain types used across the Parley workspace:
//! conversations and messages, LLM request/stream shapes, the caller-facing
//! generation events, configuration and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, secrecy.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
