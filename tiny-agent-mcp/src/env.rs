//! Environment allowlist filtering for spawned subprocesses (MCP servers
//! and the `bash` tool share this gate — spec §4.6, §4.12, property P7).

/// Variables (or variable-name prefixes, for the `*`-suffixed entries)
/// that survive into a spawned child's environment. Everything else is
/// dropped.
const ALLOWED_EXACT: &[&str] = &[
    "PATH", "HOME", "USER", "LOGNAME", "SHELL", "TERM", "NODE_ENV", "TZ", "PWD", "EDITOR",
    "VISUAL", "PAGER", "BROWSER", "TMPDIR", "TEMP", "TMP",
];
const ALLOWED_PREFIXES: &[&str] = &["LANG", "LC_"];

/// Whether `key` survives the MCP/bash subprocess environment allowlist.
#[must_use]
pub fn is_allowed(key: &str) -> bool {
    ALLOWED_EXACT.contains(&key) || ALLOWED_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

/// The filtered allowlist environment for the current process, as
/// `(key, value)` pairs, suitable for handing to `Command::envs`.
#[must_use]
pub fn filtered_env() -> Vec<(String, String)> {
    std::env::vars().filter(|(k, _)| is_allowed(k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_documented_variables() {
        for key in ["PATH", "HOME", "LANG", "LC_ALL", "SHELL", "TZ"] {
            assert!(is_allowed(key), "{key} should be allowed");
        }
    }

    #[test]
    fn rejects_everything_else() {
        for key in ["ANTHROPIC_API_KEY", "AWS_SECRET_ACCESS_KEY", "OPENAI_API_KEY", "SSH_AUTH_SOCK"] {
            assert!(!is_allowed(key), "{key} should be rejected");
        }
    }
}
