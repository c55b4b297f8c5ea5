//! Translated UI strings
//!
//! Keys are the English source strings (gettext msgids). A catalog maps
//! them to translations loaded from `locales/<locale>.toml` in the config
//! directory; anything missing falls back to the key itself.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// String lookup used for every user-facing label
pub trait Localizer {
    fn translate(&self, key: &str) -> String;
}

/// Message catalog for one locale
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    locale: String,
    messages: HashMap<String, String>,
}

impl Catalog {
    /// Catalog with no translations: every key maps to itself
    pub fn source(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            messages: HashMap::new(),
        }
    }

    /// Load the catalog for `locale`, or fall back to source strings
    pub fn load(locale: &str) -> Self {
        let Some(path) = Self::catalog_path(locale) else {
            return Self::source(locale);
        };

        if !path.exists() {
            tracing::debug!("No catalog for locale {} at {}", locale, path.display());
            return Self::source(locale);
        }

        match Self::from_file(locale, &path) {
            Ok(catalog) => {
                tracing::info!(
                    "Loaded {} translations for {}",
                    catalog.messages.len(),
                    locale
                );
                catalog
            }
            Err(e) => {
                tracing::warn!("Failed to load catalog {}: {:#}", path.display(), e);
                Self::source(locale)
            }
        }
    }

    pub fn from_file(locale: &str, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(locale, &content)
    }

    /// Parse `"msgid" = "translation"` pairs
    pub fn from_toml(locale: &str, content: &str) -> Result<Self> {
        let messages: HashMap<String, String> =
            toml::from_str(content).context("parsing catalog")?;
        Ok(Self {
            locale: locale.to_string(),
            messages,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    fn catalog_path(locale: &str) -> Option<PathBuf> {
        let dir = dirs::config_dir()?.join("coursegrid").join("locales");
        Some(dir.join(format!("{}.toml", locale)))
    }
}

impl Localizer for Catalog {
    fn translate(&self, key: &str) -> String {
        match self.messages.get(key) {
            Some(msg) if !msg.is_empty() => msg.clone(),
            _ => key.to_string(),
        }
    }
}

/// Replace placeholder tokens such as `_START_` in a translated string.
/// Tokens are left in translations verbatim by translators.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (token, value)| acc.replace(token, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_falls_back_to_msgid() {
        let catalog = Catalog::source("en");
        assert_eq!(catalog.translate("Next"), "Next");
    }

    #[test]
    fn test_catalog_from_toml() {
        let catalog = Catalog::from_toml(
            "fr",
            r#"
"Next" = "Suivant"
"Display _MENU_ courses" = "Afficher _MENU_ cours"
"Previous" = ""
"#,
        )
        .unwrap();

        assert_eq!(catalog.locale(), "fr");
        assert_eq!(catalog.translate("Next"), "Suivant");
        assert_eq!(catalog.translate("Display _MENU_ courses"), "Afficher _MENU_ cours");
        // Empty translations are treated as untranslated
        assert_eq!(catalog.translate("Previous"), "Previous");
    }

    #[test]
    fn test_fill_placeholders() {
        let text = fill(
            "Displaying _START_ to _END_ of _TOTAL_ courses",
            &[("_START_", "11"), ("_END_", "20"), ("_TOTAL_", "57")],
        );
        assert_eq!(text, "Displaying 11 to 20 of 57 courses");
    }

    #[test]
    fn test_invalid_catalog_is_error() {
        assert!(Catalog::from_toml("de", "not = [valid").is_err());
    }
}
