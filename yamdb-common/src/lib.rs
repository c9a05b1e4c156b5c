//! # YaMDb Common Library
//!
//! Shared code for the YaMDb service:
//! - Database schema, records and queries
//! - Field validators
//! - Confirmation codes and token signing secret storage
//! - Configuration loading

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod validators;

pub use error::{Error, Result};
