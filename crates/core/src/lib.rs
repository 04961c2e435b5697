//! `lexdesk-core`: identifiers and the domain error model shared by every
//! LexDesk crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult, validate_email};
pub use id::{TenantId, UserId};
