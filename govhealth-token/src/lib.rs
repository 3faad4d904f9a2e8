//! Token-side plumbing for the gov-health sandbox: the cached OAuth2 token
//! service backed by Secrets Manager, plus the demo clients that exercise
//! the deployed endpoint and the FHIR API.

pub mod authcode;
pub mod cache;
pub mod credentials;
mod error;
pub mod fhir;
pub mod oauth;
pub mod service;
pub mod signed;

pub use error::TokenError;
pub use service::{TokenConfig, TokenService};
