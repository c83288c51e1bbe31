//! The command whitelist (§4.4, §4.5): a mounted YAML file re-read on a
//! ticker and swapped into an `ArcSwap` snapshot so command validation never
//! blocks on I/O and never observes a half-updated configuration.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use kubently_common::types::SecurityMode;
use serde::Deserialize;

const READ_ONLY_VERBS: &[&str] = &[
    "get", "describe", "logs", "top", "events", "version", "api-resources", "api-versions", "explain",
];
const EXTENDED_READ_ONLY_VERBS: &[&str] = &["exec", "port-forward", "cp"];
const FULL_ACCESS_VERBS: &[&str] = &["rollout", "patch", "scale", "annotate", "label"];

pub fn mode_defaults(mode: SecurityMode) -> HashSet<String> {
    let mut verbs: HashSet<String> = READ_ONLY_VERBS.iter().map(|s| s.to_string()).collect();
    if matches!(mode, SecurityMode::ExtendedReadOnly | SecurityMode::FullAccess) {
        verbs.extend(EXTENDED_READ_ONLY_VERBS.iter().map(|s| s.to_string()));
    }
    if mode == SecurityMode::FullAccess {
        verbs.extend(FULL_ACCESS_VERBS.iter().map(|s| s.to_string()));
    }
    verbs
}

pub const MIN_MAX_ARGUMENTS: u32 = 1;
pub const MAX_MAX_ARGUMENTS: u32 = 100;
pub const MIN_TIMEOUT_SECONDS: u32 = 1;
pub const MAX_TIMEOUT_SECONDS: u32 = 30;
pub const DEFAULT_MAX_ARGUMENTS: u32 = 20;
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 30;
pub const DEFAULT_RELOAD_INTERVAL_SECONDS: u64 = 30;

fn default_max_arguments() -> u32 {
    DEFAULT_MAX_ARGUMENTS
}

fn default_timeout_seconds() -> u32 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_reload_interval() -> u64 {
    DEFAULT_RELOAD_INTERVAL_SECONDS
}

/// Raw shape of the mounted YAML config, as written by operators.
#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistFile {
    pub security_mode: SecurityMode,
    #[serde(default, rename = "fullAccessAcknowledged")]
    pub full_access_acknowledged: bool,
    #[serde(default, rename = "customVerbs")]
    pub custom_verbs: Vec<String>,
    #[serde(default, rename = "extraFlags")]
    pub extra_flags: Vec<String>,
    #[serde(default, rename = "extraForbiddenPatterns")]
    pub extra_forbidden_patterns: Vec<String>,
    #[serde(default = "default_max_arguments", rename = "maxArguments")]
    pub max_arguments: u32,
    #[serde(default = "default_timeout_seconds", rename = "timeoutSeconds")]
    pub timeout_seconds: u32,
    #[serde(default = "default_reload_interval", rename = "whitelistReloadIntervalSeconds")]
    pub whitelist_reload_interval_seconds: u64,
}

/// Validated, immutable configuration snapshot. One of these is live behind
/// the `WhitelistStore` at any moment; a command is validated against
/// exactly one snapshot, taken once at the start of validation.
#[derive(Debug, Clone)]
pub struct Whitelist {
    pub mode: SecurityMode,
    pub allowed_verbs: HashSet<String>,
    pub extra_flags: HashSet<String>,
    pub extra_forbidden_patterns: Vec<String>,
    pub max_arguments: u32,
    pub timeout_seconds: u32,
    pub reload_interval_seconds: u64,
}

impl Whitelist {
    /// Built-in fallback used at startup (and only at startup) when the
    /// mounted config cannot be read or validated at all.
    pub fn default_read_only() -> Self {
        Whitelist {
            mode: SecurityMode::ReadOnly,
            allowed_verbs: mode_defaults(SecurityMode::ReadOnly),
            extra_flags: HashSet::new(),
            extra_forbidden_patterns: Vec::new(),
            max_arguments: DEFAULT_MAX_ARGUMENTS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            reload_interval_seconds: DEFAULT_RELOAD_INTERVAL_SECONDS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WhitelistError {
    #[error("reading {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: String, source: serde_yaml::Error },
    #[error("fullAccess mode requires fullAccessAcknowledged=true")]
    FullAccessNotAcknowledged,
}

pub fn load_from_path(path: &Path) -> Result<Whitelist, WhitelistError> {
    let raw = std::fs::read_to_string(path).map_err(|source| WhitelistError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file: WhitelistFile = serde_yaml::from_str(&raw).map_err(|source| WhitelistError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    build(file)
}

fn build(file: WhitelistFile) -> Result<Whitelist, WhitelistError> {
    if file.security_mode == SecurityMode::FullAccess && !file.full_access_acknowledged {
        return Err(WhitelistError::FullAccessNotAcknowledged);
    }
    let mut allowed_verbs = mode_defaults(file.security_mode);
    allowed_verbs.extend(file.custom_verbs);
    Ok(Whitelist {
        mode: file.security_mode,
        allowed_verbs,
        extra_flags: file.extra_flags.into_iter().collect(),
        extra_forbidden_patterns: file.extra_forbidden_patterns,
        max_arguments: file.max_arguments.clamp(MIN_MAX_ARGUMENTS, MAX_MAX_ARGUMENTS),
        timeout_seconds: file.timeout_seconds.clamp(MIN_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS),
        reload_interval_seconds: file.whitelist_reload_interval_seconds,
    })
}

/// `ArcSwap`-backed hot-reload container (same RCU pattern used for the
/// transport layer's TLS config: readers take a snapshot, writers swap the
/// pointer, nobody blocks on the other).
pub struct WhitelistStore {
    inner: ArcSwap<Whitelist>,
}

impl WhitelistStore {
    pub fn new(initial: Whitelist) -> Self {
        Self {
            inner: ArcSwap::new(Arc::new(initial)),
        }
    }

    pub fn snapshot(&self) -> Arc<Whitelist> {
        self.inner.load_full()
    }

    pub fn replace(&self, next: Whitelist) -> Arc<Whitelist> {
        self.inner.swap(Arc::new(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(mode: SecurityMode, ack: bool) -> WhitelistFile {
        WhitelistFile {
            security_mode: mode,
            full_access_acknowledged: ack,
            custom_verbs: vec![],
            extra_flags: vec![],
            extra_forbidden_patterns: vec![],
            max_arguments: DEFAULT_MAX_ARGUMENTS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            whitelist_reload_interval_seconds: DEFAULT_RELOAD_INTERVAL_SECONDS,
        }
    }

    #[test]
    fn read_only_defaults_exclude_exec() {
        let verbs = mode_defaults(SecurityMode::ReadOnly);
        assert!(verbs.contains("get"));
        assert!(!verbs.contains("exec"));
    }

    #[test]
    fn extended_read_only_adds_exec_but_not_patch() {
        let verbs = mode_defaults(SecurityMode::ExtendedReadOnly);
        assert!(verbs.contains("exec"));
        assert!(!verbs.contains("patch"));
    }

    #[test]
    fn full_access_without_acknowledgment_is_rejected() {
        let err = build(file(SecurityMode::FullAccess, false)).unwrap_err();
        assert!(matches!(err, WhitelistError::FullAccessNotAcknowledged));
    }

    #[test]
    fn full_access_with_acknowledgment_adds_gated_verbs() {
        let whitelist = build(file(SecurityMode::FullAccess, true)).unwrap();
        assert!(whitelist.allowed_verbs.contains("patch"));
        assert!(whitelist.allowed_verbs.contains("rollout"));
    }

    #[test]
    fn out_of_range_limits_are_clamped_not_rejected() {
        let mut f = file(SecurityMode::ReadOnly, false);
        f.max_arguments = 1000;
        f.timeout_seconds = 0;
        let whitelist = build(f).unwrap();
        assert_eq!(whitelist.max_arguments, MAX_MAX_ARGUMENTS);
        assert_eq!(whitelist.timeout_seconds, MIN_TIMEOUT_SECONDS);
    }
}
