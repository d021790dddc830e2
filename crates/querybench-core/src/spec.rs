//! Query specifications: one statement bound to one backend.

use std::time::Duration;

use crate::error::Error;

/// One unit of benchmarking work.
///
/// Fields are fixed at construction; use the builder methods to derive a
/// modified copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    name: String,
    backend_id: String,
    statement: String,
    cache_ttl: Duration,
}

impl QuerySpec {
    /// Create a spec with a zero cache TTL (always hit the backend).
    pub fn new(
        name: impl Into<String>,
        backend_id: impl Into<String>,
        statement: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            backend_id: backend_id.into(),
            statement: statement.into(),
            cache_ttl: Duration::ZERO,
        }
    }

    /// Set how long the executor may serve this query from its cache.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Display name of the query.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target backend identifier.
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    /// Statement text.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Cache TTL handed to the executor.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Check that the spec can be submitted.
    ///
    /// `index` is the spec's position in its batch and is reported in the
    /// error.
    pub fn validate(&self, index: usize) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::config(index, "name is empty"));
        }
        if self.backend_id.trim().is_empty() {
            return Err(Error::config(
                index,
                format!("query '{}' has no backend id", self.name),
            ));
        }
        if self.statement.trim().is_empty() {
            return Err(Error::config(
                index,
                format!("query '{}' has an empty statement", self.name),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = QuerySpec::new("hyper", "A", "SELECT 1").with_cache_ttl(Duration::from_secs(60));
        assert_eq!(spec.name(), "hyper");
        assert_eq!(spec.backend_id(), "A");
        assert_eq!(spec.statement(), "SELECT 1");
        assert_eq!(spec.cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_default_ttl_is_zero() {
        let spec = QuerySpec::new("q", "A", "SELECT 1");
        assert_eq!(spec.cache_ttl(), Duration::ZERO);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(QuerySpec::new("q", "A", "SELECT 1").validate(0).is_ok());
        assert!(QuerySpec::new("", "A", "SELECT 1").validate(0).is_err());
        assert!(QuerySpec::new("q", "  ", "SELECT 1").validate(0).is_err());

        let err = QuerySpec::new("q", "A", " \n").validate(4).unwrap_err();
        let Error::Config { index, message } = err;
        assert_eq!(index, 4);
        assert!(message.contains("empty statement"));
    }
}
