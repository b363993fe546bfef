//! Reconciliation settings.

/// Behavior switches for one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Report handlers, steps or images sharing a natural key as warnings.
    /// Matching stays first-match either way.
    pub warn_on_duplicate_keys: bool,
    /// Register new assemblies with isolation mode `None` regardless of the
    /// extracted value.
    pub force_isolation_none_on_create: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            warn_on_duplicate_keys: true,
            force_isolation_none_on_create: true,
        }
    }
}
