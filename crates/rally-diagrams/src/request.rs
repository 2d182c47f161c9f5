//! Render request identifiers.

use std::fmt;

use uuid::Uuid;

use crate::consts::ID_PREFIX;

/// Identifier of a single render invocation.
///
/// Generated from a random UUID, so identifiers never collide between
/// successive renders of one view or between concurrently displayed views.
/// The textual form (`diagram-<32 hex digits>`) is a valid XML id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderRequestId(String);

impl RenderRequestId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{ID_PREFIX}-{}", Uuid::new_v4().simple()))
    }

    /// Identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RenderRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| RenderRequestId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..250)
                        .map(|_| RenderRequestId::generate())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.extend(handle.join().unwrap());
        }
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_id_format() {
        let id = RenderRequestId::generate();
        let suffix = id.as_str().strip_prefix("diagram-").unwrap();
        assert_eq!(suffix.len(), 32);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id.to_string(), id.as_str());
    }
}
