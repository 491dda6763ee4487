//! Project configuration (spec §3/§6): `ProjectConfig` loads from TOML
//! and renders self-referential constants before any parsing begins.

use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl ConstantValue {
    fn as_render_str(&self) -> String {
        match self {
            ConstantValue::Str(s) => s.clone(),
            ConstantValue::Int(i) => i.to_string(),
            ConstantValue::Float(f) => f.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociatedProduct {
    pub name: String,
    #[serde(default)]
    pub versions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
    pub manpages: Option<String>,
}

/// Project-level configuration, deserialized directly from the
/// project's TOML config file. Field names match the declarative
/// keys spec §6 lists verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(skip)]
    pub root: PathBuf,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub default_domain: Option<String>,
    #[serde(default)]
    pub constants: BTreeMap<String, ConstantValue>,
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,
    #[serde(default)]
    pub intersphinx: Vec<String>,
    #[serde(default)]
    pub toc_landing_pages: Vec<String>,
    #[serde(default)]
    pub sharedinclude_root: Option<String>,
    #[serde(default)]
    pub page_groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub associated_products: Vec<AssociatedProduct>,
    #[serde(default)]
    pub deprecated_versions: Vec<String>,
    #[serde(default)]
    pub manpages: BTreeMap<String, String>,
    #[serde(default)]
    pub bundle: BundleConfig,
}

fn default_source() -> String {
    "source".to_string()
}

static CONSTANT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_.-]+)\}").expect("static regex"));

impl ProjectConfig {
    /// Reads and deserializes `path`, then renders constants. Mirrors
    /// the original implementation's `TomlConfigProvider`-style
    /// load-then-validate flow, adapted to this crate's config shape.
    pub fn load(path: &Path) -> Result<ProjectConfig, CoreError> {
        let content =
            read_to_string(path).map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        let mut config: ProjectConfig = toml::from_str(&content)?;
        config.root = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        config.render_constants()?;
        Ok(config)
    }

    /// Source-tree root, `root.join(source)`.
    pub fn source_root(&self) -> PathBuf {
        self.root.join(&self.source)
    }

    /// Fixed-point substitution of `${name}` references within
    /// `constants` values, so a constant may reference another
    /// constant declared anywhere in the map. Converges in at most
    /// `constants.len() + 1` passes for an acyclic map; any reference
    /// to a declared constant still unresolved after that many passes
    /// is a cycle (including a constant that (transitively) refers to
    /// itself). References to undeclared names are left untouched.
    fn render_constants(&mut self) -> Result<(), CoreError> {
        let max_passes = self.constants.len() + 1;
        for _ in 0..max_passes {
            let snapshot = self.constants.clone();
            let mut changed = false;
            for value in self.constants.values_mut() {
                if let ConstantValue::Str(text) = value {
                    let rendered = CONSTANT_REF
                        .replace_all(text, |caps: &regex::Captures| {
                            snapshot
                                .get(&caps[1])
                                .map(|v| v.as_render_str())
                                .unwrap_or_else(|| caps[0].to_string())
                        })
                        .into_owned();
                    if rendered != *text {
                        *text = rendered;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        for value in self.constants.values() {
            if let ConstantValue::Str(text) = value {
                for caps in CONSTANT_REF.captures_iter(text) {
                    if self.constants.contains_key(&caps[1]) {
                        return Err(CoreError::ConstantCycle(caps[1].to_string()));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(constants: BTreeMap<String, ConstantValue>) -> ProjectConfig {
        ProjectConfig {
            root: PathBuf::from("."),
            name: "proj".to_string(),
            title: String::new(),
            source: default_source(),
            default_domain: None,
            constants,
            substitutions: BTreeMap::new(),
            intersphinx: vec![],
            toc_landing_pages: vec![],
            sharedinclude_root: None,
            page_groups: BTreeMap::new(),
            associated_products: vec![],
            deprecated_versions: vec![],
            manpages: BTreeMap::new(),
            bundle: BundleConfig::default(),
        }
    }

    #[test]
    fn renders_self_referential_constant() {
        let mut constants = BTreeMap::new();
        constants.insert("base".to_string(), ConstantValue::Str("8.0".to_string()));
        constants.insert(
            "full".to_string(),
            ConstantValue::Str("v${base}-final".to_string()),
        );
        let mut config = config_with(constants);
        config.render_constants().unwrap();
        assert_eq!(
            config.constants["full"],
            ConstantValue::Str("v8.0-final".to_string())
        );
    }

    #[test]
    fn detects_constant_cycle() {
        let mut constants = BTreeMap::new();
        constants.insert("a".to_string(), ConstantValue::Str("${b}".to_string()));
        constants.insert("b".to_string(), ConstantValue::Str("${a}".to_string()));
        let mut config = config_with(constants);
        assert!(matches!(
            config.render_constants(),
            Err(CoreError::ConstantCycle(_))
        ));
    }

    #[test]
    fn source_root_joins_root_and_source() {
        let config = config_with(BTreeMap::new());
        assert_eq!(config.source_root(), PathBuf::from("./source"));
    }
}
