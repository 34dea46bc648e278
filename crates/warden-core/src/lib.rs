//! # Warden Core
//!
//! Core domain types and collaborator interfaces for Warden.
//!
//! This crate provides the foundational types used throughout the system:
//! - Auth events and the persisted audit record model
//! - Risk classification
//! - Role documents
//! - Store traits (`AuditStore`, `RoleStore`) with in-memory implementations

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod risk;
pub mod role;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use event::*;
pub use risk::RiskLevel;
pub use role::{MemoryRoleStore, Role, RoleStore};
pub use store::{AuditFilter, AuditStore, MemoryAuditStore, SortOrder};
