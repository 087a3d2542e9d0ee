//! Core types and the deterministic engine behind the fingraph interview.
//!
//! This crate has no async, HTTP or logging dependencies.
//! It owns the typed knowledge graph ([`graph::GraphStore`]), the conflict
//! classifier ([`classifier::classify`]), and the topic frontier
//! ([`frontier::Frontier`]). Everything that talks to the outside world lives
//! in `fingraph-session` and above.

pub mod classifier;
pub mod error;
pub mod frontier;
pub mod graph;
pub mod schema;
pub mod topic;
pub mod value;

pub use error::{Error, Result};
pub use topic::TopicName;
