//! Remote batch source and response normalization

pub mod brewfather_client;
pub mod normalizer;

pub use brewfather_client::{BrewfatherClient, SourceError};
pub use normalizer::{normalize_batch, normalize_summaries, normalize_summary};
