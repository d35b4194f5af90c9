//! agentdelta: streaming delta protocol engine.
//!
//! Converts the event stream a model provider emits during one inference call
//! into framed, replayable conversation updates, runs the tools the model
//! calls, and loops over round trips until the run completes.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agentdelta::prelude::*;
//! use agentdelta::provider::ScriptedProvider;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> agentdelta::error::Result<()> {
//! let provider = Arc::new(ScriptedProvider::new());
//! let driver = RunDriver::new(provider).with_config(EngineConfig::from_env()?);
//! let mut conversation = Conversation::new().with_messages([ChatMessage::user("Hello!")]);
//!
//! let outcome = driver
//!     .run_to_completion(RunRequest::new(), &mut conversation, CancellationToken::new(), None)
//!     .await?;
//! println!("{}", outcome.streamed_text());
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod delta;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;
