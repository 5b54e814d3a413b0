//! Injector configuration.
//!
//! Merged from three file tiers plus the environment:
//! 1. **Defaults** - built in
//! 2. **User** - `~/.props-injector/config.yaml`
//! 3. **Explicit** - `PROPS_INJECTOR_CONFIG` or `--config`
//!
//! ## Environment Variables
//! - `PROPS_INJECTOR_CONFIG` - Explicit config file
//! - `PROPS_INJECTOR_USER_DIR` - User config dir (default: `~/.props-injector`)
//! - `PROPS_INJECTOR_RESOURCE_PATH` - Resource roots, platform path-list syntax
//! - `PROPS_INJECTOR_CLASS_PATH` - Class path, platform path-list syntax

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier, apply_env_overrides};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
