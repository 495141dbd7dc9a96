//! `drover-core`: domain building blocks for migration orchestration.
//!
//! This crate contains **pure domain** primitives (no execution or storage concerns).

pub mod error;
pub mod id;
pub mod status;

pub use error::{DomainError, DomainResult};
pub use id::{GroupId, MigrationId};
pub use status::{MigrationStatus, ResultCode};
