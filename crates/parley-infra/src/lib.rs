//! Infrastructure layer for Parley.
//!
//! Contains implementations of the ports defined in `parley-core`: the SQLite
//! conversation store, the OpenAI-compatible provider and its factory, the
//! API key store, and the configuration loader.

pub mod config;
pub mod llm;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod test_support;
