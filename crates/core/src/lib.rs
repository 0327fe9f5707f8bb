//! Core logic of the PDF chat: the model session bound to a document, the
//! displayable transcript, upload validation and the upload-to-chat flow.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod app;
pub mod extract;
mod model_client;
pub mod notification;
pub mod session;
pub mod transcript;
pub mod upload;

pub use app::{AppError, ChatApp, ChatAppBuilder, ChatView, Stage};
pub use model_client::{ModelClient, ModelClientResponse, ModelError};
