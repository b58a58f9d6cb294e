//! Conversation persistence and management.
//!
//! `ConversationRepository` is the port the infrastructure layer implements;
//! `ConversationService` exposes the caller-scoped management operations.

pub mod repository;
pub mod service;
