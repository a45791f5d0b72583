//! taskwise-core: LLM gateway and task agents for the taskwise todo API.
//!
//! - [`config`] — Typed configuration loading from JSON plus environment overrides
//! - [`provider`] — LLM provider trait with Groq-compatible and Ollama backends
//! - [`gateway`] — Primary/fallback routing and health probes
//! - [`agent`] — Prioritizer, decomposer and chat agents
//! - [`service`] — Request flow around the agents: ownership checks, timing, execution logs
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskwise_core::agent::{Agent, PrioritizeInput, PrioritizerAgent, TaskSnapshot};
//! use taskwise_core::config::Config;
//! use taskwise_core::gateway::LlmGateway;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let gateway = Arc::new(LlmGateway::from_config(&config.llm, reqwest::Client::new()));
//!
//! let agent = PrioritizerAgent::new(gateway);
//! let input = PrioritizeInput::new(vec![TaskSnapshot::new("t1", "File taxes")]);
//! let response = agent.execute(input).await;
//! for p in response.priorities() {
//!     println!("{} -> {}", p.task_id, p.priority);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod gateway;
pub mod provider;
pub mod service;
