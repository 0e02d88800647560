//! Prim name sanitization and per-parent uniquification.
//!
//! Prim names follow the USD identifier grammar: ASCII letters, digits and
//! underscores, not starting with a digit.

use std::collections::{HashMap, HashSet};

/// Name used when a label has no usable character.
pub const FALLBACK_NAME: &str = "Node";

/// Map an arbitrary label onto the identifier grammar, without
/// uniquification.
pub fn sanitize_identifier(raw: &str) -> String {
    if !raw.chars().any(is_ident_char) {
        return FALLBACK_NAME.to_string();
    }
    let mut name: String = raw
        .chars()
        .map(|c| if is_ident_char(c) { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Sanitize `raw` and make it unique among `siblings`.
///
/// A taken name gets the first free `_1`, `_2`, … suffix. `siblings` is not
/// modified; the caller registers the result.
pub fn sanitize(raw: &str, siblings: &HashSet<String>) -> String {
    let base = sanitize_identifier(raw);
    if !siblings.contains(&base) {
        return base;
    }
    let mut n = 1u64;
    loop {
        let candidate = format!("{base}_{n}");
        if !siblings.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// True when `name` is already a valid identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(is_ident_char)
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Names already allocated under each parent path, for one export run.
///
/// Every parent's set starts out holding the parent's own name, so a child
/// never repeats the segment directly above it.
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: HashMap<String, HashSet<String>>,
}

impl NameRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a unique child name under `parent_path` (`""` for the stage
    /// root) and register it.
    pub fn allocate(&mut self, parent_path: &str, raw: &str) -> String {
        let siblings = self
            .taken
            .entry(parent_path.to_string())
            .or_insert_with(|| {
                let mut seed = HashSet::new();
                if let Some(own) = parent_path.rsplit('/').next().filter(|s| !s.is_empty()) {
                    seed.insert(own.to_string());
                }
                seed
            });
        let name = sanitize(raw, siblings);
        siblings.insert(name.clone());
        name
    }

    /// Forget every allocation.
    pub fn reset(&mut self) {
        self.taken.clear();
    }
}

/// Join a parent path and a child name.
pub fn child_path(parent_path: &str, name: &str) -> String {
    format!("{parent_path}/{name}")
}
