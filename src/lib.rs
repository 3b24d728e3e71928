//! Odds Feed SDK - Main Library
//!
//! Re-exports the workspace libraries and the helpers shared by binaries.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **oddsfeed**: Feed ingestion and entity cache (re-exported from workspace)
//! - **feedbus**: Message broker boundary (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use oddsfeed_sdk::bin_common::{load_config_from_env, ConfigType};
//! use oddsfeed_sdk::oddsfeed::application::OddsFeed;
//! ```

pub use feedbus;
pub use oddsfeed;

pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
}
