//! Business logic and repository trait definitions for Parley.
//!
//! This crate defines the "ports" (repository and provider traits) that the
//! infrastructure layer implements, plus the generation orchestrator built on
//! them. It depends only on `parley-types` -- never on `parley-infra` or any
//! database/IO crate.

pub mod chat;
pub mod generation;
pub mod llm;
pub mod task;

#[cfg(test)]
pub(crate) mod test_support;
