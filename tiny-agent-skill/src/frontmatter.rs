//! Parses a `SKILL.md` file into its YAML frontmatter and markdown body.

use serde::Deserialize;
use tiny_agent_types::{allowed_tools_de, SkillError};

/// Deserialized frontmatter block. At least `name` and `description` are
/// required; `allowedTools` accepts either encoding (spec §9).
#[derive(Debug, Deserialize)]
pub struct Frontmatter {
    pub name: String,
    pub description: String,
    #[serde(default, rename = "allowedTools", alias = "allowed_tools", deserialize_with = "allowed_tools_de")]
    pub allowed_tools: Option<Vec<String>>,
}

/// Splits `text` into its leading `---`-delimited YAML block and the
/// remaining body. Returns `(frontmatter, body)`.
pub fn parse(text: &str) -> Result<(Frontmatter, String), SkillError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
        .ok_or_else(|| SkillError::InvalidFrontmatter("missing leading --- delimiter".into()))?;

    let end = rest
        .find("\n---")
        .ok_or_else(|| SkillError::InvalidFrontmatter("missing closing --- delimiter".into()))?;
    let yaml = &rest[..end];
    let body = rest[end..]
        .trim_start_matches('\n')
        .trim_start_matches("---")
        .trim_start_matches('\n')
        .trim_start_matches('\r')
        .trim_start_matches('\n')
        .to_string();

    let frontmatter: Frontmatter = serde_yaml::from_str(yaml)
        .map_err(|e| SkillError::InvalidFrontmatter(e.to_string()))?;

    if frontmatter.name.trim().is_empty() {
        return Err(SkillError::MissingField("name".into()));
    }
    if frontmatter.description.trim().is_empty() {
        return Err(SkillError::MissingField("description".into()));
    }

    Ok((frontmatter, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_frontmatter() {
        let doc = "---\nname: pdf-forms\ndescription: Fill PDF forms\n---\n# Body\ntext here\n";
        let (fm, body) = parse(doc).unwrap();
        assert_eq!(fm.name, "pdf-forms");
        assert_eq!(fm.description, "Fill PDF forms");
        assert!(fm.allowed_tools.is_none());
        assert!(body.contains("# Body"));
    }

    #[test]
    fn parses_space_delimited_allowed_tools() {
        let doc = "---\nname: a\ndescription: b\nallowed_tools: read_file write_file\n---\nbody\n";
        let (fm, _) = parse(doc).unwrap();
        assert_eq!(fm.allowed_tools, Some(vec!["read_file".into(), "write_file".into()]));
    }

    #[test]
    fn parses_array_allowed_tools() {
        let doc = "---\nname: a\ndescription: b\nallowed_tools: [read_file, write_file]\n---\nbody\n";
        let (fm, _) = parse(doc).unwrap();
        assert_eq!(fm.allowed_tools, Some(vec!["read_file".into(), "write_file".into()]));
    }

    #[test]
    fn rejects_missing_delimiter() {
        assert!(parse("no frontmatter here").is_err());
    }
}
