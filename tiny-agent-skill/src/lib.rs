//! Discoverable markdown-defined capability packs (spec §4.7). Scans
//! configured directories for `*/SKILL.md`, parses YAML frontmatter, and
//! renders a skill's body wrapped for injection into conversation
//! history. Grounded on `neuron-hooks`'s registry/dispatch idiom,
//! generalized here from a hook pipeline to a name-keyed lookup table.

mod frontmatter;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tiny_agent_types::{Skill, SkillError};

const NAME_PATTERN: &str = r"^[a-z0-9]+(-[a-z0-9]+)*$";

/// Bundled skills shipped with the binary, keyed by name. Each entry is
/// `(name, description, body, allowed_tools)`.
const BUILTIN_SKILLS: &[(&str, &str, &str, Option<&[&str]>)] = &[
    (
        "code-review",
        "Review a diff for correctness and simplification opportunities",
        "# Code Review\n\nRead the diff, flag correctness bugs and unnecessary complexity. \
         Do not rewrite unrelated code.",
        None,
    ),
    (
        "commit",
        "Stage and commit the current changes with a clear message",
        "# Commit\n\nInspect `git status` and `git diff`, stage relevant files, and write a \
         commit message describing what changed and why.",
        Some(&["bash", "read_file"]),
    ),
];

struct SkillEntry {
    skill: Skill,
    body: Option<String>,
}

/// Owns the set of discovered and builtin skills.
pub struct SkillRegistry {
    skills: HashMap<String, SkillEntry>,
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillRegistry {
    /// A registry preloaded with the bundled builtin skills.
    #[must_use]
    pub fn new() -> Self {
        let mut skills = HashMap::new();
        for (name, description, body, allowed_tools) in BUILTIN_SKILLS {
            skills.insert(
                (*name).to_string(),
                SkillEntry {
                    skill: Skill {
                        name: (*name).to_string(),
                        description: (*description).to_string(),
                        location: format!("builtin://{name}"),
                        is_builtin: true,
                        allowed_tools: allowed_tools
                            .map(|tools| tools.iter().map(|t| (*t).to_string()).collect()),
                    },
                    body: Some((*body).to_string()),
                },
            );
        }
        Self { skills }
    }

    /// Scan `dir` for `*/SKILL.md` files one level deep and register each
    /// as a discovered (non-builtin) skill. Malformed files are logged
    /// and skipped rather than aborting the scan.
    pub async fn scan_directory(&mut self, dir: impl AsRef<Path>) -> Result<usize, SkillError> {
        let dir = dir.as_ref();
        let mut found = 0;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(SkillError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(SkillError::Io)? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let skill_md = path.join("SKILL.md");
            if !skill_md.is_file() {
                continue;
            }
            match self.register_file(&skill_md).await {
                Ok(()) => found += 1,
                Err(e) => tracing::warn!(path = %skill_md.display(), error = %e, "skipping malformed skill"),
            }
        }
        Ok(found)
    }

    async fn register_file(&mut self, path: &Path) -> Result<(), SkillError> {
        let text = tokio::fs::read_to_string(path).await.map_err(SkillError::Io)?;
        let (fm, _body) = frontmatter::parse(&text)?;
        validate_name(&fm.name)?;

        self.skills.insert(
            fm.name.clone(),
            SkillEntry {
                skill: Skill {
                    name: fm.name,
                    description: fm.description,
                    location: path.to_string_lossy().into_owned(),
                    is_builtin: false,
                    allowed_tools: fm.allowed_tools,
                },
                body: None,
            },
        );
        Ok(())
    }

    /// Every registered skill.
    #[must_use]
    pub fn list(&self) -> Vec<Skill> {
        let mut out: Vec<Skill> = self.skills.values().map(|e| e.skill.clone()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Look up a skill by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Skill> {
        self.skills.get(name).map(|e| e.skill.clone())
    }

    /// Reads the skill's body (from disk, or the embedded builtin text),
    /// XML-escapes it, and wraps it as
    /// `<loaded_skill name="..." base_dir="...">...</loaded_skill>` for
    /// injection into conversation history as a system message.
    pub async fn load_content(&self, skill: &Skill) -> Result<String, SkillError> {
        let entry = self.skills.get(&skill.name).ok_or_else(|| SkillError::NotFound(skill.name.clone()))?;

        let body = match &entry.body {
            Some(body) => body.clone(),
            None => {
                let text = tokio::fs::read_to_string(&skill.location).await.map_err(SkillError::Io)?;
                frontmatter::parse(&text)?.1
            }
        };

        let base_dir = if skill.is_builtin {
            skill.location.clone()
        } else {
            PathBuf::from(&skill.location)
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        Ok(format!(
            "<loaded_skill name=\"{}\" base_dir=\"{}\">\n{}\n</loaded_skill>",
            xml_escape(&skill.name),
            xml_escape(&base_dir),
            xml_escape(&body),
        ))
    }
}

fn validate_name(name: &str) -> Result<(), SkillError> {
    let re = regex::Regex::new(NAME_PATTERN).expect("static pattern is valid");
    if re.is_match(name) {
        Ok(())
    } else {
        Err(SkillError::InvalidName(name.to_string()))
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_skills_are_preloaded() {
        let registry = SkillRegistry::new();
        assert!(registry.get("code-review").is_some());
        assert!(registry.get("code-review").unwrap().is_builtin);
    }

    #[tokio::test]
    async fn builtin_load_content_wraps_in_loaded_skill_tag() {
        let registry = SkillRegistry::new();
        let skill = registry.get("code-review").unwrap();
        let content = registry.load_content(&skill).await.unwrap();
        assert!(content.starts_with("<loaded_skill name=\"code-review\""));
        assert!(content.ends_with("</loaded_skill>"));
    }

    #[tokio::test]
    async fn scan_directory_discovers_skill_md() {
        let dir = tempfile::tempdir().unwrap();
        let skill_dir = dir.path().join("pdf-forms");
        tokio::fs::create_dir_all(&skill_dir).await.unwrap();
        tokio::fs::write(
            skill_dir.join("SKILL.md"),
            "---\nname: pdf-forms\ndescription: Fill PDF forms\n---\nFill the form.\n",
        )
        .await
        .unwrap();

        let mut registry = SkillRegistry::new();
        let found = registry.scan_directory(dir.path()).await.unwrap();
        assert_eq!(found, 1);
        assert!(registry.get("pdf-forms").is_some());
        assert!(!registry.get("pdf-forms").unwrap().is_builtin);
    }

    #[tokio::test]
    async fn scan_directory_skips_malformed_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let bad_dir = dir.path().join("bad-skill");
        tokio::fs::create_dir_all(&bad_dir).await.unwrap();
        tokio::fs::write(bad_dir.join("SKILL.md"), "not frontmatter").await.unwrap();
        let good_dir = dir.path().join("good-skill");
        tokio::fs::create_dir_all(&good_dir).await.unwrap();
        tokio::fs::write(
            good_dir.join("SKILL.md"),
            "---\nname: good-skill\ndescription: d\n---\nbody\n",
        )
        .await
        .unwrap();

        let mut registry = SkillRegistry::new();
        let found = registry.scan_directory(dir.path()).await.unwrap();
        assert_eq!(found, 1);
        assert!(registry.get("good-skill").is_some());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(validate_name("Invalid_Name").is_err());
        assert!(validate_name("valid-name-2").is_ok());
    }

    #[test]
    fn xml_escape_handles_special_chars() {
        assert_eq!(xml_escape("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
    }
}
