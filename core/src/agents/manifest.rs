use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "AGENT.md";

#[derive(Debug, Deserialize)]
struct FrontMatter {
    name: String,
    description: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    output_key: Option<String>,
    #[serde(default)]
    marker: Option<String>,
}

/// A prompt-driven agent declared in `plugins/<dir>/AGENT.md`: YAML front
/// matter for identity and routing hints, Markdown body as system prompt.
#[derive(Debug, Clone)]
pub struct PluginManifest {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub output_key: Option<String>,
    pub marker: Option<String>,
    pub system_prompt: String,
    pub location: PathBuf,
}

impl PluginManifest {
    pub fn load(plugin_dir: &Path) -> Result<Self> {
        let path = plugin_dir.join(MANIFEST_FILE);
        if !path.exists() {
            anyhow::bail!("No {} found in {}", MANIFEST_FILE, plugin_dir.display());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content, &path)
    }

    pub fn parse(content: &str, location: &Path) -> Result<Self> {
        let lines: Vec<&str> = content.lines().collect();

        if lines.first().map(|l| l.trim()) != Some("---") {
            anyhow::bail!("{} has no front matter", location.display());
        }

        let closing = lines[1..]
            .iter()
            .position(|l| l.trim() == "---")
            .with_context(|| format!("{} has unterminated front matter", location.display()))?;

        let frontmatter_str = lines[1..=closing].join("\n");
        let frontmatter: FrontMatter = serde_yaml::from_str(&frontmatter_str)
            .with_context(|| format!("Invalid front matter in {}", location.display()))?;

        let system_prompt = lines[closing + 2..].join("\n").trim().to_string();

        Ok(Self {
            name: frontmatter.name.trim().to_string(),
            description: frontmatter.description.trim().to_string(),
            keywords: frontmatter
                .keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            output_key: frontmatter.output_key.filter(|k| !k.trim().is_empty()),
            marker: frontmatter.marker.filter(|m| !m.trim().is_empty()),
            system_prompt,
            location: location.to_path_buf(),
        })
    }
}
