//! Entity definitions for the accounts database.

pub mod user;

pub use user::{NewUser, User, UserRole, UserUpdate};
