//! `{{ name }}` placeholder substitution

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashSet};

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid marker regex"));

/// Canonical form of a marker name: lowercase, inner whitespace collapsed
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized names of every marker in `text`, in order of appearance
pub fn marker_names(text: &str) -> Vec<String> {
    MARKER_RE
        .captures_iter(text)
        .map(|caps| normalize_name(&caps[1]))
        .collect()
}

/// Variables available to one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    values: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable; the name is normalized like marker names
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(normalize_name(name), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&normalize_name(name)).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&normalize_name(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Result of substituting one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    /// A substituted value introduced a line break; the cell must wrap
    pub wrap: bool,
    /// Marker names that were neither variables nor reserved
    pub unknown: Vec<String>,
}

/// Turn literal `\n` sequences and CR/CRLF endings into real line breaks
fn normalize_newlines(value: &str) -> String {
    value
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace("\\n", "\n")
}

/// Replace every known marker in `text`
///
/// Markers naming a `reserved` image slot are left exactly as written, as are
/// markers with unknown names (reported in [`Substituted::unknown`]).
pub fn substitute(text: &str, context: &Context, reserved: &HashSet<String>) -> Substituted {
    let mut wrap = false;
    let mut unknown = Vec::new();

    let replaced = MARKER_RE.replace_all(text, |caps: &Captures<'_>| {
        let name = normalize_name(&caps[1]);
        if reserved.contains(&name) {
            return caps[0].to_string();
        }
        match context.get(&name) {
            Some(value) => {
                let value = normalize_newlines(value);
                wrap |= value.contains('\n');
                value
            }
            None => {
                if !unknown.contains(&name) {
                    unknown.push(name);
                }
                caps[0].to_string()
            }
        }
    });

    Substituted {
        text: replaced.into_owned(),
        wrap,
        unknown,
    }
}

/// Remove the markers of the given names, trimming what remains
pub fn strip_markers(text: &str, names: &HashSet<String>) -> String {
    MARKER_RE
        .replace_all(text, |caps: &Captures<'_>| {
            if names.contains(&normalize_name(&caps[1])) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .trim()
        .to_string()
}
