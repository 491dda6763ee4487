//! Declarative directive/role/object registry loaded from TOML.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::CoreError;
use crate::spec::validators::PrimitiveType;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DirectiveSpec {
    #[serde(default)]
    pub inherit: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub argument_type: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub required_context: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoleSpec {
    #[serde(default)]
    pub inherit: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RstObjectSpec {
    #[serde(default)]
    pub inherit: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SpecMeta {
    version: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSpec {
    meta: SpecMeta,
    #[serde(default, rename = "directive")]
    directives: HashMap<String, DirectiveSpec>,
    #[serde(default, rename = "role")]
    roles: HashMap<String, RoleSpec>,
    #[serde(default, rename = "rstobject")]
    rstobjects: HashMap<String, RstObjectSpec>,
}

/// The required `meta.version` of the embedded spec resource.
pub const SPEC_VERSION: u32 = 1;

#[derive(Debug, Clone, Default)]
pub struct Spec {
    pub directives: HashMap<String, DirectiveSpec>,
    pub roles: HashMap<String, RoleSpec>,
    pub rstobjects: HashMap<String, RstObjectSpec>,
}

impl Spec {
    pub fn load(toml_text: &str) -> Result<Spec, CoreError> {
        let raw: RawSpec = toml::from_str(toml_text)?;
        if raw.meta.version != SPEC_VERSION {
            return Err(CoreError::Spec(format!(
                "spec meta.version {} does not match embedded version {}",
                raw.meta.version, SPEC_VERSION
            )));
        }

        let mut directives = raw.directives;
        resolve_inheritance(&mut directives, |d| d.inherit.clone(), merge_directive)?;

        let mut roles = raw.roles;
        resolve_inheritance(&mut roles, |r| r.inherit.clone(), merge_role)?;

        let mut rstobjects = raw.rstobjects;
        resolve_inheritance(&mut rstobjects, |o| o.inherit.clone(), merge_rstobject)?;

        let mut spec = Spec {
            directives,
            roles,
            rstobjects,
        };
        spec.expand_rstobjects();
        Ok(spec)
    }

    /// Each `RstObject` synthesizes a paired directive (argument
    /// required, `content_type = block`) and role (ref-type bound to
    /// the object's prefix).
    fn expand_rstobjects(&mut self) {
        let objects = self.rstobjects.clone();
        for (name, obj) in objects {
            self.directives.entry(name.clone()).or_insert(DirectiveSpec {
                inherit: None,
                help: obj.help.clone(),
                example: obj.example.clone(),
                deprecated: obj.deprecated,
                content_type: Some("block".to_string()),
                argument_type: Some("string".to_string()),
                options: HashMap::new(),
                fields: Vec::new(),
                required_context: None,
                domain: obj.domain.clone(),
            });
            self.roles.entry(name.clone()).or_insert(RoleSpec {
                inherit: None,
                help: obj.help,
                example: obj.example,
                deprecated: obj.deprecated,
                r#type: Some(format!(
                    "ref:{{domain={},name={}}}",
                    obj.domain.clone().unwrap_or_default(),
                    name
                )),
                domain: obj.domain,
            });
        }
    }

    /// Resolves a bare name by trying, in order: `mongodb`, `std`, `""`.
    pub fn resolve_directive(&self, domain: Option<&str>, name: &str) -> Option<(&str, &DirectiveSpec)> {
        self.resolve(domain, name, &self.directives)
    }

    pub fn resolve_role(&self, domain: Option<&str>, name: &str) -> Option<(&str, &RoleSpec)> {
        self.resolve(domain, name, &self.roles)
    }

    fn resolve<'a, T>(
        &self,
        domain: Option<&str>,
        name: &str,
        table: &'a HashMap<String, T>,
    ) -> Option<(&'a str, &'a T)> {
        if let Some(d) = domain {
            let key = format!("{d}:{name}");
            if let Some(v) = table.get(&key) {
                return Some((d, v));
            }
        }
        for d in ["mongodb", "std", ""] {
            let key = if d.is_empty() {
                name.to_string()
            } else {
                format!("{d}:{name}")
            };
            if let Some(v) = table.get(&key) {
                return Some((d, v));
            }
        }
        None
    }

    pub fn get_validator(&self, type_name: &str) -> PrimitiveType {
        type_from_str(type_name)
    }
}

fn type_from_str(s: &str) -> PrimitiveType {
    if let Some(rest) = s.strip_prefix("union(").and_then(|r| r.strip_suffix(')')) {
        return PrimitiveType::Union(rest.split('|').map(|p| type_from_str(p.trim())).collect());
    }
    match s {
        "integer" => PrimitiveType::Integer,
        "nonnegative_integer" => PrimitiveType::NonnegativeInteger,
        "path" => PrimitiveType::Path,
        "uri" => PrimitiveType::Uri,
        "length" => PrimitiveType::Length,
        "boolean" => PrimitiveType::Boolean,
        "flag" => PrimitiveType::Flag,
        "linenos" => PrimitiveType::Linenos,
        _ => PrimitiveType::String,
    }
}

/// Resolves `inherit` references for one table, depth-first, detecting
/// cycles via a recursion-stack set. Unset fields (represented by each
/// type's `Default`) are filled from the base.
fn resolve_inheritance<T: Clone + Default>(
    table: &mut HashMap<String, T>,
    get_parent: impl Fn(&T) -> Option<String>,
    merge: impl Fn(&T, &T) -> T,
) -> Result<(), CoreError> {
    let names: Vec<String> = table.keys().cloned().collect();
    let mut resolved: HashSet<String> = HashSet::new();

    fn visit<T: Clone + Default>(
        name: &str,
        table: &mut HashMap<String, T>,
        get_parent: &impl Fn(&T) -> Option<String>,
        merge: &impl Fn(&T, &T) -> T,
        resolved: &mut HashSet<String>,
        stack: &mut HashSet<String>,
    ) -> Result<(), CoreError> {
        if resolved.contains(name) {
            return Ok(());
        }
        if stack.contains(name) {
            return Err(CoreError::InheritanceCycle(name.to_string()));
        }
        stack.insert(name.to_string());

        let parent_name = table.get(name).and_then(&get_parent);
        if let Some(parent_name) = parent_name {
            if !table.contains_key(&parent_name) {
                stack.remove(name);
                resolved.insert(name.to_string());
                return Ok(());
            }
            visit(&parent_name, table, get_parent, merge, resolved, stack)?;
            let parent = table.get(&parent_name).cloned().unwrap();
            let child = table.get(name).cloned().unwrap();
            table.insert(name.to_string(), merge(&child, &parent));
        }

        stack.remove(name);
        resolved.insert(name.to_string());
        Ok(())
    }

    let mut stack = HashSet::new();
    for name in names {
        visit(&name, table, &get_parent, &merge, &mut resolved, &mut stack)?;
    }
    Ok(())
}

fn merge_directive(child: &DirectiveSpec, parent: &DirectiveSpec) -> DirectiveSpec {
    DirectiveSpec {
        inherit: child.inherit.clone(),
        help: child.help.clone().or_else(|| parent.help.clone()),
        example: child.example.clone().or_else(|| parent.example.clone()),
        deprecated: child.deprecated,
        content_type: child.content_type.clone().or_else(|| parent.content_type.clone()),
        argument_type: child.argument_type.clone().or_else(|| parent.argument_type.clone()),
        options: {
            let mut opts = parent.options.clone();
            opts.extend(child.options.clone());
            opts
        },
        fields: if child.fields.is_empty() {
            parent.fields.clone()
        } else {
            child.fields.clone()
        },
        required_context: child
            .required_context
            .clone()
            .or_else(|| parent.required_context.clone()),
        domain: child.domain.clone().or_else(|| parent.domain.clone()),
    }
}

fn merge_role(child: &RoleSpec, parent: &RoleSpec) -> RoleSpec {
    RoleSpec {
        inherit: child.inherit.clone(),
        help: child.help.clone().or_else(|| parent.help.clone()),
        example: child.example.clone().or_else(|| parent.example.clone()),
        deprecated: child.deprecated,
        r#type: child.r#type.clone().or_else(|| parent.r#type.clone()),
        domain: child.domain.clone().or_else(|| parent.domain.clone()),
    }
}

fn merge_rstobject(child: &RstObjectSpec, parent: &RstObjectSpec) -> RstObjectSpec {
    RstObjectSpec {
        inherit: child.inherit.clone(),
        help: child.help.clone().or_else(|| parent.help.clone()),
        example: child.example.clone().or_else(|| parent.example.clone()),
        deprecated: child.deprecated,
        prefix: child.prefix.clone().or_else(|| parent.prefix.clone()),
        domain: child.domain.clone().or_else(|| parent.domain.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[meta]
version = 1

[directive.base]
help = "base help"
content_type = "block"

[directive.child]
inherit = "base"
argument_type = "string"
"#;

    #[test]
    fn loads_and_resolves_inheritance() {
        let spec = Spec::load(SAMPLE).unwrap();
        let child = &spec.directives["child"];
        assert_eq!(child.help.as_deref(), Some("base help"));
        assert_eq!(child.content_type.as_deref(), Some("block"));
        assert_eq!(child.argument_type.as_deref(), Some("string"));
    }

    #[test]
    fn detects_inheritance_cycle() {
        let cyclic = r#"
[meta]
version = 1
[directive.a]
inherit = "b"
[directive.b]
inherit = "a"
"#;
        let err = Spec::load(cyclic).unwrap_err();
        assert!(matches!(err, CoreError::InheritanceCycle(_)));
    }

    #[test]
    fn rejects_wrong_version() {
        let bad = "[meta]\nversion = 2\n";
        assert!(Spec::load(bad).is_err());
    }
}
