//! Path and command security gates shared by the file and shell built-in
//! tools (spec §4.12, §6). Grounded in spirit on
//! `neuron-hook-security`'s regex-pattern gates, applied directly inside
//! the tool rather than as a separate hook crate — the spec treats these
//! checks as the tool's own contract, not an optional observability hook.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Directories no write/edit tool may resolve a path under.
const PROTECTED_DIRS: &[&str] = &[
    "/etc", "/usr", "/bin", "/sbin", "/sys", "/proc", "/dev", "/root",
];

/// `$HOME`-relative directories no write/edit tool may resolve a path under.
const PROTECTED_HOME_DIRS: &[&str] = &[".ssh", ".aws", ".gnupg", ".pki"];

/// Patterns matching filenames that must never be written regardless of
/// directory (spec §6 Sensitive-File patterns).
static SENSITIVE_FILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\.env$",
        r"\.env\.(?!example|sample|template|default)\w+$",
        r"\.aws/credentials$",
        r"\.aws/config$",
        r"\.ssh/",
        r"\.npmrc$",
        r"\.git-credentials$",
        r"/etc/(passwd|shadow)$",
        r"\.pki/",
        r"\.gnupg/",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static sensitive-file pattern is valid"))
    .collect()
});

/// Shell-command patterns that mark a `bash` invocation as dangerous
/// (spec §6 Destructive-Command patterns).
static DESTRUCTIVE_COMMAND_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\brm\s",
        r"\bmv\s",
        r"\brmdir\b",
        r"\bgit\s+(commit|push|force-delete|branch\s+-D|reset\s+--hard|clean\s+-fdx?|rebase)\b",
        r">{1,2}\s*(?!/dev/)\S",
        r"<\s*(?!/dev/)\S",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static destructive-command pattern is valid"))
    .collect()
});

/// Exact command prefixes that bypass confirmation even though they may
/// superficially resemble a destructive invocation (spec §6
/// Read-Only-Command set, listed in full for bit-compatibility).
const READ_ONLY_PREFIXES: &[&str] = &[
    "git status",
    "git log",
    "git show",
    "git diff",
    "git config",
    "git branch",
    "git remote",
    "git tag",
    "git stash",
    "git reflog",
    "git describe",
    "ls",
    "dir",
    "cat",
    "head",
    "tail",
    "grep",
    "find",
    "echo",
    "pwd",
    "which",
    "type",
    "file",
    "stat",
    "npm test",
    "npm run test",
    "bun test",
    "pytest",
];

/// Whether `path`, once resolved against `cwd`, falls under a protected
/// system directory, a protected `$HOME` subdirectory, or contains a `..`
/// component — any of which a write/edit tool must refuse. The `..` check
/// runs against the caller-supplied path itself (not a fully resolved
/// form): a request that names a traversal at all is refused, regardless
/// of whether the traversal would stay inside a safe tree.
#[must_use]
pub fn is_protected_path(path: &Path, cwd: &Path, home: Option<&Path>) -> bool {
    if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return true;
    }

    let resolved = normalize(&cwd.join(path));
    let resolved_str = resolved.to_string_lossy();
    for dir in PROTECTED_DIRS {
        if resolved_str == *dir || resolved_str.starts_with(&format!("{dir}/")) {
            return true;
        }
    }

    if let Some(home) = home {
        for sub in PROTECTED_HOME_DIRS {
            let protected = home.join(sub);
            if resolved.starts_with(&protected) {
                return true;
            }
        }
    }

    false
}

/// Whether `path` matches one of the Sensitive-File patterns, regardless
/// of which directory it lives in.
#[must_use]
pub fn is_sensitive_file(path: &Path) -> bool {
    let normalized = normalize(path);
    let as_str = normalized.to_string_lossy().replace('\\', "/");
    SENSITIVE_FILE_PATTERNS.iter().any(|re| re.is_match(&as_str))
}

/// Lexical normalization: resolves `.`/`..` components without touching
/// the filesystem (unlike `std::fs::canonicalize`, which requires the
/// path to exist). A leading `..` that would escape the root is retained
/// so [`is_protected_path`]'s literal-`..`-after-normalization check still
/// catches path-traversal attempts.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `command` matches a Destructive-Command pattern and should
/// therefore require confirmation before a `bash` tool runs it.
#[must_use]
pub fn is_destructive_command(command: &str) -> bool {
    if is_read_only_command(command) {
        return false;
    }
    DESTRUCTIVE_COMMAND_PATTERNS.iter().any(|re| re.is_match(command))
}

/// Whether `command` starts with one of the Read-Only-Command prefixes,
/// which bypass confirmation even if they'd otherwise look destructive.
#[must_use]
pub fn is_read_only_command(command: &str) -> bool {
    let trimmed = command.trim_start();
    READ_ONLY_PREFIXES.iter().any(|prefix| {
        trimmed == *prefix || trimmed.starts_with(&format!("{prefix} "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dotdot_traversal() {
        assert!(is_protected_path(Path::new("../../etc/passwd"), Path::new("/home/user/project"), None));
    }

    #[test]
    fn rejects_protected_system_dirs() {
        assert!(is_protected_path(Path::new("/etc/hosts"), Path::new("/"), None));
        assert!(is_protected_path(Path::new("/root/.bashrc"), Path::new("/"), None));
    }

    #[test]
    fn allows_ordinary_project_paths() {
        assert!(!is_protected_path(Path::new("src/main.rs"), Path::new("/home/user/project"), None));
    }

    #[test]
    fn rejects_home_ssh_dir() {
        let home = Path::new("/home/user");
        assert!(is_protected_path(Path::new("/home/user/.ssh/id_rsa"), Path::new("/"), Some(home)));
    }

    #[test]
    fn flags_env_file_as_sensitive() {
        assert!(is_sensitive_file(Path::new(".env")));
        assert!(!is_sensitive_file(Path::new(".env.example")));
        assert!(is_sensitive_file(Path::new(".env.production")));
    }

    #[test]
    fn flags_aws_credentials() {
        assert!(is_sensitive_file(Path::new("/home/user/.aws/credentials")));
    }

    #[test]
    fn destructive_patterns_match() {
        assert!(is_destructive_command("rm -rf /tmp/x"));
        assert!(is_destructive_command("git push origin main"));
        assert!(is_destructive_command("printf hi > /tmp/out.txt"));
    }

    #[test]
    fn read_only_prefixes_bypass_destructive_check() {
        assert!(!is_destructive_command("git status"));
        assert!(!is_destructive_command("cat file.txt"));
        assert!(is_read_only_command("npm run test"));
    }

    #[test]
    fn redirection_into_dev_null_is_not_destructive() {
        assert!(!is_destructive_command("printf hi > /dev/null"));
    }
}
