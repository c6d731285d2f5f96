//! # AgentFlow
//!
//! Local agent orchestration: configured agents answer prompts through a
//! bounded ReAct loop against an OpenAI-compatible model server, and workflow
//! graphs chain sources, tools, agents and outputs.
//!
//! This library provides:
//! - A reasoning loop that streams thought/action/observation events
//! - A tool registry (PDF reports, image analysis, web extraction, email)
//! - A workflow graph executor
//! - An HTTP API exposing both
//!
//! ## Example
//!
//! ```rust,ignore
//! use agentflow::{api, config::Config};
//!
//! let config = Config::from_env()?;
//! api::serve(config).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod store;
pub mod tools;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use config::Config;
