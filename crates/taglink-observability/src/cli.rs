// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-crate debug flags
//!
//! Supports flags like `--debug-taglink-core` and `--debug-all`, plus the
//! `TAGLINK_DEBUG` environment variable.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Environment variable listing crates to debug (comma-separated, or `all`)
pub const DEBUG_ENV: &str = "TAGLINK_DEBUG";

/// Set of crates with debug logging enabled
///
/// # Example
/// ```rust
/// use taglink_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-taglink-core".to_string()]);
/// assert!(flags.is_enabled("taglink-core"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Parse `--debug-{crate}` and `--debug-all` from command-line style arguments
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = Self::default();
        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enable(crate_name);
            }
        }
        flags
    }

    /// Build from bare crate names (`all` enables every known crate)
    pub fn from_crate_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = Self::default();
        for name in names {
            let name = name.as_ref().trim();
            if name == "all" {
                flags.enable_all();
            } else if !name.is_empty() {
                flags.enable(name);
            }
        }
        flags
    }

    /// Merge in crates listed in `TAGLINK_DEBUG`
    pub fn with_environment(mut self) -> Self {
        if let Ok(value) = env::var(DEBUG_ENV) {
            let from_env = Self::from_crate_names(value.split(','));
            self.enabled_crates.extend(from_env.enabled_crates);
        }
        self
    }

    pub fn enable(&mut self, crate_name: &str) {
        self.enabled_crates.insert(crate_name.to_string());
    }

    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enable(crate_name);
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Build an `EnvFilter` directive string
    ///
    /// Crate names are converted to their module-path form (`taglink-core` ->
    /// `taglink_core`), since tracing targets use module paths.
    /// Format: `"taglink_core=debug,info"`, or just the default level if none enabled.
    pub fn to_filter_string(&self, default_level: &str) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates
            .iter()
            .map(|name| format!("{}=debug", name.replace('-', "_")))
            .collect();
        filters.push(default_level.to_string());
        filters.join(",")
    }
}

/// Help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug <crate-name>           Enable debug logging for one crate (repeatable)

Available crates:
  {}

Environment Variable:
  {env}={{crate-name}}[,{{crate-name}}]
  {env}=all
"#,
        KNOWN_CRATES.join(", "),
        env = DEBUG_ENV
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-taglink-server".to_string()]);
        assert!(flags.is_enabled("taglink-server"));
        assert!(!flags.is_enabled("taglink-core"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_crate_names_with_all() {
        let flags = CrateDebugFlags::from_crate_names(["all"]);
        assert!(flags.is_enabled("taglink-discovery"));
    }

    #[test]
    fn test_filter_string_uses_module_paths() {
        let flags = CrateDebugFlags::from_crate_names(["taglink-core"]);
        assert_eq!(flags.to_filter_string("warn"), "taglink_core=debug,warn");
    }

    #[test]
    fn test_empty_filter_is_default_level() {
        let flags = CrateDebugFlags::default();
        assert!(!flags.any_enabled());
        assert_eq!(flags.to_filter_string("info"), "info");
    }
}
