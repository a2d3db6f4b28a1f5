//! SQLite store: schema, models and queries

pub mod batches;
pub mod init;
pub mod models;
pub mod overrides;
pub mod settings;
pub mod tags;

pub use batches::*;
pub use init::*;
pub use models::*;
pub use overrides::*;
pub use settings::*;
pub use tags::*;
