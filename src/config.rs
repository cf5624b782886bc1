//! Engine configuration.

/// Environment variable overriding the default search concurrency.
pub const JOBS_ENV: &str = "RUSTY_SEEK_JOBS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on sheets scanned at the same time. Never zero.
    pub max_concurrent_searches: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl EngineConfig {
    /// Defaults, with `RUSTY_SEEK_JOBS` taking precedence when it holds a number.
    pub fn from_env() -> Self {
        std::env::var(JOBS_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .map(|jobs| Self::default().with_max_concurrent_searches(jobs))
            .unwrap_or_default()
    }

    /// Zero is raised to one.
    pub fn with_max_concurrent_searches(mut self, jobs: usize) -> Self {
        self.max_concurrent_searches = jobs.max(1);
        self
    }
}
