//! An abstraction layer for the language models a chat session can talk to.
//!
//! This crate establishes a unified protocol between the chat core and the
//! model backends, so that sessions can be bound to a hosted model, a local
//! model or a scripted fake without changing the core.
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
