//! Persistence collaborator for accepted environment samples.
//!
//! The pipeline only sees the [`EnvironmentRepository`] trait so it can be
//! exercised without a database. The PostgreSQL implementation lives in
//! [`environment_data`].

use async_trait::async_trait;

pub mod environment_data;

use crate::{error::Result, models::EnvironmentData};

/// Storage operations the webhook pipeline depends on.
///
/// Implementations must be safe to share across concurrent requests;
/// each `save` is an independent write.
#[async_trait]
pub trait EnvironmentRepository: Send + Sync + 'static {
    /// Persists one sample.
    ///
    /// A second save for the same device and instant replaces the first.
    async fn save(&self, data: &EnvironmentData) -> Result<()>;

    /// Verifies the backing store is reachable.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Returns true when `name` can be spliced into SQL as a bare identifier.
///
/// Accepts lowercase ASCII letters, digits and underscores, not starting
/// with a digit, at most 63 bytes (the PostgreSQL identifier limit).
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else { return false };

    name.len() <= 63
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_restricted_to_plain_identifiers() {
        assert!(is_valid_table_name("environment_data"));
        assert!(is_valid_table_name("_samples2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2samples"));
        assert!(!is_valid_table_name("sleep-smart-ac"));
        assert!(!is_valid_table_name("data; DROP TABLE users"));
        assert!(!is_valid_table_name(&"a".repeat(64)));
    }
}
