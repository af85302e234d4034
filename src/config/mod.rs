//! Configuration system.
//!
//! Consolidates configuration from tiers with field-by-field YAML merging:
//! 1. **Defaults** - `Config::default()`
//! 2. **Project** - `$CWD/pm-agent/config.yaml`
//! 3. **User** - `~/.pm-agent/config.yaml`
//! 4. **Environment** - variables listed below
//!
//! CLI flags are applied on top by `main`.
//!
//! ## Environment Variables
//! - `PM_AGENT_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `PM_AGENT_DB_PATH` - Database path
//! - `PM_AGENT_DELETE_POLICY` - `restrict` or `cascade`
//! - `PM_AGENT_FORMAT` - `json` or `markdown`
//! - `PM_AGENT_USER_DIR` - User config dir (default: `~/.pm-agent`)
//! - `PM_AGENT_PROJECT_DIR` - Project config dir (default: `./pm-agent`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
