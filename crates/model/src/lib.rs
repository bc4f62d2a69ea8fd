//! An abstraction layer for hosted text-generation models.
//!
//! This crate establishes an unified protocol for the planner to talk to
//! the supported model providers, so that the roles built on top of it
//! never depend on a concrete vendor and can be driven by a scripted
//! model in tests.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
