//! Shared giza entry machinery: `{{substitution}}` expansion and the
//! `source:`-declared inheritance link (spec §4.5).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, DiagnosticKind};

static SUBSTITUTION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Za-z0-9_.-]+)\}\}").expect("static regex"));

/// A `file#ref` pointer giving the entry this one inherits fields from.
/// `file` is `None` when the parent lives in the same YAML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inherit {
    pub file: Option<String>,
    pub ref_id: String,
}

/// The fields every giza entry carries regardless of category,
/// embedded via `#[serde(flatten)]` in each concrete entry type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GizaBase {
    #[serde(rename = "ref")]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub source: Option<Inherit>,
    #[serde(default)]
    pub replacement: HashMap<String, String>,
    #[serde(skip)]
    pub line: u32,
}

/// Replaces every `{{name}}` token in `text` against `replacements`,
/// recording `UnknownSubstitution` for unbound tokens. Returns the
/// input unchanged when no tokens are present, matching the original
/// implementation's fast path for plain strings.
pub fn substitute_text(
    text: &str,
    replacements: &HashMap<String, String>,
    diagnostics: &mut Vec<Diagnostic>,
    line: u32,
) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }
    SUBSTITUTION_TOKEN
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match replacements.get(name) {
                Some(value) => value.clone(),
                None => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnknownSubstitution {
                            name: name.to_string(),
                        },
                        line,
                    ));
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Implemented by every concrete giza entry type (`Step`, `Action`,
/// `Extract`, `ReleaseSpecification`) to participate in inheritance
/// resolution generically.
pub trait GizaNode: Clone {
    fn ref_id(&self) -> Option<&str>;
    fn line(&self) -> u32;
    fn source(&self) -> Option<&Inherit>;
    fn replacement(&self) -> &HashMap<String, String>;

    /// Fills every unset optional field from `parent` and merges
    /// `replacement` maps (parent first, child entries override).
    fn inherit_from(&mut self, parent: &Self);

    /// Runs `{{name}}` substitution over every textual field using this
    /// entry's already-merged replacement map.
    fn apply_substitutions(&mut self, diagnostics: &mut Vec<Diagnostic>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_tokens() {
        let mut repl = HashMap::new();
        repl.insert("verb".to_string(), "test".to_string());
        repl.insert("noun".to_string(), "substitution".to_string());
        let mut diags = Vec::new();
        let result = substitute_text("{{verb}}ing {{noun}}. {{verb}}.", &repl, &mut diags, 1);
        assert_eq!(result, "testing substitution. test.");
        assert!(diags.is_empty());
    }

    #[test]
    fn unbound_token_is_blanked_and_diagnosed() {
        let repl = HashMap::new();
        let mut diags = Vec::new();
        let result = substitute_text("hello {{missing}}", &repl, &mut diags, 3);
        assert_eq!(result, "hello ");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn plain_text_is_untouched() {
        let mut diags = Vec::new();
        assert_eq!(substitute_text("foo", &HashMap::new(), &mut diags, 1), "foo");
        assert!(diags.is_empty());
    }
}
