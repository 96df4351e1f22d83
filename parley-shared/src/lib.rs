//! Shared building blocks for the Parley messaging platform.
//!
//! This crate carries everything both the server and its clients agree on:
//! the wire models and push-event vocabulary, the layered configuration, and
//! the client-side reconciliation state machine that keeps a client's view
//! consistent with the durable store across disconnects.

pub mod config;
pub mod models;
pub mod sync;
