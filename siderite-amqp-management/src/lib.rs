//! An implementation of the AMQP 1.0 management extension (working draft).
//!
//! A [`ManagementClient`] attaches a sender and a receiver to one session;
//! requests carry `operation`/`type`/`locales` application-properties and a
//! fresh UUID message-id, and responses are correlated back to their
//! request by correlation-id, so operations may overlap freely.

#![deny(missing_docs, missing_debug_implementations)]

pub mod client;
pub mod constants;
pub mod error;
pub mod operations;
pub mod request;
pub mod response;
pub mod status;

pub use client::{Builder, ManagementClient, OutstandingRequest};
pub use error::{AttachError, Error};
pub use request::Request;
pub use response::Response;
pub use status::StatusCode;
