//! Component configuration.

/// Default cap on extra disposals caused by tasks registered during one
/// janitor cleanup pass.
pub const DEFAULT_CLEANUP_BUDGET: usize = 65_536;

/// Configuration for a component instance.
#[derive(Debug, Clone)]
pub struct ComponentConfig {
    /// Component tag, used in logs and stale-access errors (e.g. `"Door"`).
    pub tag: String,
    /// Maximum number of tasks registered during a cleanup pass that the same
    /// pass disposes. Tasks present when the pass starts are always disposed;
    /// the budget stops tasks that keep re-registering themselves.
    pub cleanup_budget: usize,
}

impl ComponentConfig {
    /// Create a config with the given tag and default limits.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            cleanup_budget: DEFAULT_CLEANUP_BUDGET,
        }
    }

    /// Override the cleanup budget.
    #[must_use]
    pub fn with_cleanup_budget(mut self, budget: usize) -> Self {
        self.cleanup_budget = budget;
        self
    }
}
