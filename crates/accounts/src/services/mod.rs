//! Business logic services for account management.
//!
//! Services coordinate between the repository layer and the recovery-token
//! cache and hold all business rules.

pub mod account_service;
pub mod mock_repositories;

// Re-export all services
pub use account_service::{AccountService, UserRepo};
pub use mock_repositories::MockUserRepository;
