//! An out-of-the-box travel planner that wires the planning roles to an
//! OpenAI-compatible model.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library, loading the same configuration from the environment
//! and driving the orchestrator from your own host app.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod config;

pub use config::{ClarificationPolicy, Config, ConfigError};

/// Re-exports of [`travel_planner_core`] crate.
pub mod core {
    pub use travel_planner_core::*;
}
