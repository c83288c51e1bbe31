//! Command validation (§4.4 "Command validation rules", Testable Property 6
//! "Validation closure"). Baseline-forbidden verbs and patterns are checked
//! before the mode/customVerbs whitelist is ever consulted, so a permissive
//! or misconfigured snapshot can never resurrect them.

use kubently_common::types::{Command, SecurityMode};

use crate::whitelist::Whitelist;

/// Mutating verbs forbidden in every mode; no `customVerbs` entry can add
/// these back.
const BASELINE_FORBIDDEN_VERBS: &[&str] = &["delete", "edit", "apply", "create"];

/// Mutating verbs forbidden unless the snapshot's mode is `fullAccess`.
const GATED_VERBS: &[&str] = &["patch", "replace", "scale", "rollout"];

const BASELINE_FORBIDDEN_PATTERNS: &[&str] = &[
    "--token",
    "--kubeconfig",
    "--server",
    "--insecure",
    "--as",
    "--as-group",
    "&&",
    "||",
    ";",
    "|",
    "`",
    "$(",
    "/etc/kubernetes",
    "/root",
];

pub fn validate(whitelist: &Whitelist, command: &Command) -> Result<(), String> {
    let verb = command.verb().ok_or_else(|| "empty command".to_string())?;

    if BASELINE_FORBIDDEN_VERBS.contains(&verb) {
        return Err(format!("verb '{verb}' is forbidden"));
    }
    if GATED_VERBS.contains(&verb) && whitelist.mode != SecurityMode::FullAccess {
        return Err(format!("verb '{verb}' requires fullAccess mode"));
    }
    if command.args.len() as u32 > whitelist.max_arguments {
        return Err(format!(
            "argument count {} exceeds max {}",
            command.args.len(),
            whitelist.max_arguments
        ));
    }
    for token in command.args.iter().chain(command.namespace.iter()) {
        if let Some(pattern) = forbidden_pattern(whitelist, token) {
            return Err(format!("argument '{token}' matches forbidden pattern '{pattern}'"));
        }
    }
    if !whitelist.allowed_verbs.contains(verb) {
        return Err(format!(
            "verb '{verb}' is not in the allowed set for mode {}",
            whitelist.mode
        ));
    }
    Ok(())
}

fn forbidden_pattern<'a>(whitelist: &'a Whitelist, token: &str) -> Option<&'a str> {
    BASELINE_FORBIDDEN_PATTERNS
        .iter()
        .copied()
        .find(|pattern| token.contains(pattern))
        .or_else(|| {
            whitelist
                .extra_forbidden_patterns
                .iter()
                .map(String::as_str)
                .find(|pattern| token.contains(pattern))
        })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::whitelist::Whitelist;

    fn command(args: Vec<&str>, namespace: Option<&str>) -> Command {
        Command {
            id: "cmd-1".to_string(),
            cluster_id: "cluster-a".to_string(),
            args: args.into_iter().map(String::from).collect(),
            namespace: namespace.map(String::from),
            timeout_seconds: 10,
            queued_at: Utc::now(),
            session_id: None,
            correlation_id: None,
            priority: None,
        }
    }

    #[test]
    fn allows_plain_get() {
        let whitelist = Whitelist::default_read_only();
        assert!(validate(&whitelist, &command(vec!["get", "pods"], Some("default"))).is_ok());
    }

    #[test]
    fn rejects_delete_even_with_permissive_custom_verbs() {
        let mut whitelist = Whitelist::default_read_only();
        whitelist.allowed_verbs.insert("delete".to_string());
        let err = validate(&whitelist, &command(vec!["delete", "pod", "x"], None)).unwrap_err();
        assert!(err.contains("forbidden"));
    }

    #[test]
    fn rejects_patch_outside_full_access() {
        let whitelist = Whitelist::default_read_only();
        let err = validate(&whitelist, &command(vec!["patch", "deploy", "x"], None)).unwrap_err();
        assert!(err.contains("fullAccess"));
    }

    #[test]
    fn rejects_shell_metacharacters() {
        let whitelist = Whitelist::default_read_only();
        let err = validate(&whitelist, &command(vec!["get", "pods;", "rm -rf /"], None)).unwrap_err();
        assert!(err.contains("forbidden pattern"));
    }

    #[test]
    fn rejects_verb_not_in_mode_defaults() {
        let whitelist = Whitelist::default_read_only();
        let err = validate(&whitelist, &command(vec!["exec", "pod", "-it", "sh"], None)).unwrap_err();
        assert!(err.contains("not in the allowed set"));
    }

    #[test]
    fn rejects_argument_count_over_cap() {
        let mut whitelist = Whitelist::default_read_only();
        whitelist.max_arguments = 2;
        let err = validate(&whitelist, &command(vec!["get", "pods", "extra"], None)).unwrap_err();
        assert!(err.contains("exceeds max"));
    }
}
