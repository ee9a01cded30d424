pub mod auth;
pub mod contact;
pub mod error;

pub use contact::{ContactIdentity, ContactParseError};
pub use error::AppError;
