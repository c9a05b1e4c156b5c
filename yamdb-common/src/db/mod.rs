//! Database schema, records and queries

pub mod init;
pub mod models;
pub mod reviews;
pub mod sections;
pub mod titles;
pub mod users;

pub use init::{create_schema, init_database, init_memory_database};
pub use models::*;
pub use sections::SectionKind;
