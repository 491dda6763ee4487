//! Decode external target inventories (spec §4.6/§6). Bit-exact version-2
//! format, ported from the original implementation's `intersphinx.py`.
//! Fetching inventories over the network is out of scope — an external
//! collaborator's job; only [`Inventory::parse`] is implemented here.

use std::collections::HashMap;
use std::io::Read;

use once_cell::sync::Lazy;
use regex::Regex;

static INVENTORY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?x)(.+?)\s+(\S*:\S*)\s+(-?\d+)\s+(\S+)\s+(.*)").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDefinition {
    pub name: String,
    pub role: (String, String),
    pub priority: i64,
    pub uri: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub base_url: String,
    pub targets: HashMap<String, TargetDefinition>,
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TargetDefinition> {
        self.targets.get(key)
    }

    /// Skips the four ASCII header lines, inflates the zlib-compressed
    /// remainder, and parses each `NAME DOMAIN:ROLE PRIORITY URI
    /// DISPLAYNAME` line.
    pub fn parse(base_url: &str, raw: &[u8]) -> Inventory {
        let mut start_index = 0usize;
        for _ in 0..4 {
            match raw[start_index..].iter().position(|b| *b == b'\n') {
                Some(pos) => start_index += pos + 1,
                None => return Inventory { base_url: base_url.to_string(), targets: HashMap::new() },
            }
        }

        let mut decompressed = String::new();
        let mut decoder = flate2::read::ZlibDecoder::new(&raw[start_index..]);
        if decoder.read_to_string(&mut decompressed).is_err() {
            return Inventory {
                base_url: base_url.to_string(),
                targets: HashMap::new(),
            };
        }

        let mut inventory = Inventory {
            base_url: base_url.to_string(),
            targets: HashMap::new(),
        };

        for line in decompressed.split('\n') {
            if line.trim().is_empty() {
                continue;
            }
            let captures = match INVENTORY_PATTERN.captures(line.trim_end()) {
                Some(c) => c,
                None => {
                    tracing::debug!(%line, "invalid intersphinx line");
                    continue;
                }
            };

            let name = captures[1].to_string();
            let domain_and_role = captures[2].to_string();
            let priority: i64 = match captures[3].parse() {
                Ok(p) => p,
                Err(_) => {
                    tracing::debug!(%line, "invalid priority in intersphinx inventory");
                    continue;
                }
            };
            let mut uri = captures[4].to_string();
            if let Some(stripped) = uri.strip_suffix('$') {
                uri = format!("{stripped}{name}");
            }
            let mut dispname = captures[5].to_string();
            if dispname == "-" {
                dispname = name.clone();
            }

            let (domain, role) = match domain_and_role.split_once(':') {
                Some((d, r)) => (d.to_string(), r.to_string()),
                None => (domain_and_role.clone(), String::new()),
            };

            let key = format!("{domain_and_role}:{name}").to_lowercase();
            inventory.targets.insert(
                key,
                TargetDefinition {
                    name,
                    role: (domain, role),
                    priority,
                    uri,
                    display_name: dispname,
                },
            );
        }

        inventory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_inventory_bytes(body: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"# Sphinx inventory version 2\n");
        out.extend_from_slice(b"# Project: test\n");
        out.extend_from_slice(b"# Version: 1.0\n");
        out.extend_from_slice(b"# The remainder of this file is compressed using zlib.\n");
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        out.extend(encoder.finish().unwrap());
        out
    }

    #[test]
    fn parses_dollar_uri_and_dash_dispname() {
        let bytes = build_inventory_bytes("foo.bar std:label 1 path/to/$ -\n");
        let inv = Inventory::parse("https://example.com/", &bytes);
        let def = inv.get("std:label:foo.bar").unwrap();
        assert_eq!(def.uri, "path/to/foo.bar");
        assert_eq!(def.display_name, "foo.bar");
    }

    #[test]
    fn skips_invalid_lines() {
        let bytes = build_inventory_bytes("this is not valid\nfoo std:label 1 x y\n");
        let inv = Inventory::parse("base/", &bytes);
        assert_eq!(inv.len(), 1);
    }

    #[test]
    fn keys_are_lowercased() {
        let bytes = build_inventory_bytes("Foo std:Label 1 x y\n");
        let inv = Inventory::parse("base/", &bytes);
        assert!(inv.get("std:label:foo").is_some());
    }
}
