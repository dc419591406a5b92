//! Domain model for the feastline real-time sync client.
//!
//! This crate holds the types shared by every layer: the session and
//! connection model, the inbound event catalog and its normalized form,
//! the delivery policy table, configuration, and the in-memory store
//! collections the reconciler mutates.

pub mod cache;
pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod event;
pub mod notification;
pub mod policy;
pub mod session;
pub mod store;

// Re-export common error type
pub use error::FeastlineError;
