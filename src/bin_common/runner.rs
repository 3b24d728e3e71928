//! Binary runner utilities
//!
//! Banner, progress reporting and shutdown summary shared by binaries.

use tracing::info;

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Log progress every this many processed items; 0 disables it
    pub progress_every: usize,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            progress_every: 1000,
        }
    }

    pub fn with_progress_every(mut self, items: usize) -> Self {
        self.progress_every = items;
        self
    }

    /// True when `count` items warrants a progress line
    pub fn is_progress_tick(&self, count: usize) -> bool {
        self.progress_every > 0 && count > 0 && count % self.progress_every == 0
    }
}

/// Trait for binary applications
#[allow(async_fn_in_trait)]
pub trait BinaryRunner {
    /// Run the application; the returned string is the shutdown summary
    async fn run(&mut self) -> anyhow::Result<String>;

    fn config(&self) -> &RunConfig;

    fn print_banner(&self) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("Starting {}", config.name);
        info!("========================================");
        info!("");
    }

    fn print_shutdown(&self, stats: Option<&str>) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("{} finished", config.name);
        if let Some(stats) = stats {
            info!("{}", stats);
        }
        info!("========================================");
    }

    /// Execute the binary with banner and summary around `run`
    async fn execute(&mut self) -> anyhow::Result<()> {
        self.print_banner();
        let summary = self.run().await?;
        self.print_shutdown(Some(&summary));
        Ok(())
    }
}
