//! Manifest format and validation.

use serde::Deserialize;
use yamato_core::error::YamatoError;

/// A command declared by a `*.toml` manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub usage: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Compiled-in handler this command runs.
    #[serde(default)]
    pub handler: String,
    /// Lines the `reply` handler picks from.
    #[serde(default)]
    pub replies: Vec<String>,
}

fn default_category() -> String {
    "general".to_string()
}

impl CommandManifest {
    /// Every name the command answers to, lower-cased, primary first.
    pub fn names(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
    }

    /// Usage line, derived from the name when the manifest omits it.
    pub fn usage_or_default(&self, prefix: &str) -> String {
        if self.usage.trim().is_empty() {
            format!("{prefix}{}", self.name)
        } else {
            self.usage.clone()
        }
    }
}

/// Parse and validate one manifest. `source` is only used in error messages.
pub fn parse_manifest(content: &str, source: &str) -> Result<CommandManifest, YamatoError> {
    let mut manifest: CommandManifest = toml::from_str(content)
        .map_err(|e| YamatoError::Plugin(format!("{source}: invalid manifest: {e}")))?;

    manifest.name = manifest.name.trim().to_string();
    manifest.handler = manifest.handler.trim().to_string();

    if manifest.name.is_empty() {
        return Err(YamatoError::Plugin(format!("{source}: missing command name")));
    }
    if manifest.name.chars().any(char::is_whitespace) {
        return Err(YamatoError::Plugin(format!(
            "{source}: command name '{}' contains whitespace",
            manifest.name
        )));
    }
    if manifest.handler.is_empty() {
        return Err(YamatoError::Plugin(format!(
            "{source}: command '{}' has no handler",
            manifest.name
        )));
    }
    if manifest.handler == "reply" && manifest.replies.iter().all(|r| r.trim().is_empty()) {
        return Err(YamatoError::Plugin(format!(
            "{source}: reply command '{}' has no replies",
            manifest.name
        )));
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_manifest() {
        let m = parse_manifest(
            r#"
name = "joke"
aliases = ["funny", "Humor"]
description = "Get random jokes"
usage = "/joke"
category = "fun"
handler = "reply"
replies = ["one", "two"]
"#,
            "joke.toml",
        )
        .unwrap();
        assert_eq!(m.name, "joke");
        assert_eq!(m.category, "fun");
        assert_eq!(
            m.names().collect::<Vec<_>>(),
            vec!["joke", "funny", "humor"]
        );
    }

    #[test]
    fn test_parse_defaults() {
        let m = parse_manifest("name = \"ping\"\nhandler = \"ping\"", "ping.toml").unwrap();
        assert!(m.aliases.is_empty());
        assert_eq!(m.category, "general");
        assert_eq!(m.usage_or_default("/"), "/ping");
    }

    #[test]
    fn test_missing_name_rejected() {
        let err = parse_manifest("handler = \"ping\"", "x.toml").unwrap_err();
        assert!(err.to_string().contains("missing command name"));
    }

    #[test]
    fn test_missing_handler_rejected() {
        let err = parse_manifest("name = \"ping\"", "x.toml").unwrap_err();
        assert!(err.to_string().contains("no handler"));
    }

    #[test]
    fn test_reply_without_lines_rejected() {
        assert!(parse_manifest("name = \"joke\"\nhandler = \"reply\"", "x.toml").is_err());
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = parse_manifest("name = ", "broken.toml").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
