//! Gradebook database: schema, migrations and queries

pub mod gradebook;
pub mod init;
pub mod migrations;
pub mod models;
pub mod tokens;

pub use gradebook::*;
pub use init::*;
pub use migrations::run_migrations;
pub use models::*;
pub use tokens::*;
