//! An implementation of the AMQP 1.0 claims-based-security extension.
//!
//! A [`CbsClient`] exchanges put-token requests and responses on the
//! reserved `$cbs` node to authorize audiences on an anonymous connection.
//! [`SasCredential`] signs shared-access-signature tokens from the
//! service-dialect connection string.

#![deny(missing_docs, missing_debug_implementations)]

pub mod client;
pub mod constants;
pub mod credential;
pub mod put_token;
pub mod token;

pub use client::{CbsClient, CbsClientBuilder};
pub use credential::{ConnectionString, CredentialError, SasCredential, TokenCredential};
pub use put_token::{PutTokenRequest, PutTokenResponse};
pub use token::{AccessToken, CbsToken};
