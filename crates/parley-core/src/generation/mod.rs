//! Streaming generation: marker scanning, orchestration and fallback titles.
//!
//! - `scanner`: splits the provider stream into visible text and an embedded title
//! - `service`: `GenerationService` and the per-call `Generation` state machine
//! - `title`: title constants, normalization and the detached fallback job
//! - `classify`: provider failure to `ChatError` mapping
//! - `sink` / `diagnostics`: the caller's event stream and the failure side channel

pub mod classify;
pub mod diagnostics;
pub mod scanner;
pub mod service;
pub mod sink;
pub mod title;
