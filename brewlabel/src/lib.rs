//! brewlabel library
//!
//! Fetches batches from Brewfather, keeps a local store of batches,
//! overrides and tags, and renders bottle label sheets from a Word template.

pub mod actions;
pub mod cli;
pub mod label;
pub mod source;

pub use actions::App;

/// Version, git hash, build time and profile recorded by `build.rs`
pub fn build_info() -> String {
    format!(
        "brewlabel v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_is_recorded() {
        let info = build_info();
        assert!(info.starts_with(&format!("brewlabel v{} [", env!("CARGO_PKG_VERSION"))));
        assert!(!env!("GIT_HASH").is_empty());
        assert!(!env!("BUILD_PROFILE").is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(env!("BUILD_TIMESTAMP")).is_ok());
    }
}
