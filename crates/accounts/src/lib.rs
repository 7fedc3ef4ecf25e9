//! # Emporia Accounts Crate
//!
//! Account management for the Emporia storefront backend: login,
//! registration, password recovery, profile updates, and role checks.
//!
//! ## Architecture
//!
//! - **Services**: business logic (`AccountService`), generic over the
//!   repository seam so tests can run against an in-memory mock
//! - **Token store**: process-wide cache for recovery tokens
//! - **Types**: request payloads and the tagged `ServiceResponse` result
//!
//! Persistence lives in `emporia-database`; this crate re-exports the
//! entities it needs so most callers depend on it alone.

pub mod services;
pub mod token_store;
pub mod types;

// Re-export database types and repositories
pub use emporia_database::{
    DatabaseError, DatabaseResult, NewUser, User, UserRepository, UserRole, UserUpdate,
};

// Re-export main types for convenience
pub use services::{AccountService, MockUserRepository, UserRepo};
pub use token_store::TokenStore;
pub use types::{ProfileUpdate, RegisterRequest, ServiceResponse};
