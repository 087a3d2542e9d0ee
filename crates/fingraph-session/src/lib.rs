//! Session layer for the fingraph interview engine.
//!
//! Wraps the synchronous `fingraph-core` structures in an async state machine
//! that drives three external agents (interview, extraction, ranking) and
//! keeps one [`SessionOrchestrator`] per user in a [`SessionRegistry`].
//!
//! Agents are abstract traits; `fingraph-server` supplies HTTP-backed
//! implementations and the tests supply scripted stubs.

pub mod agent;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod state;
pub mod view;


pub use agent::{Agents, ExtractionAgent, InterviewAgent, RankingAgent};
pub use error::{AgentError, Error, Result};
pub use orchestrator::SessionOrchestrator;
pub use registry::SessionRegistry;
pub use state::{InterviewState, Phase};
pub use view::{ReplyMode, SessionStateView, TopicStatus, TurnReply};
