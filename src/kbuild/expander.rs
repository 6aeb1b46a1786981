//! Component F: the macro expander. A post-pass over one directory's
//! composite map that resolves targets the main parse couldn't guess a
//! source file for by re-scanning the same cached lines for a defining
//! assignment.

use std::path::{Path, PathBuf};

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::boolean::{build_precondition, Alternatives};
use crate::kbuild::parser::substitute_vars;
use crate::kbuild::state::{DirectoryState, GlobalState};
use crate::system;

/// Derives the base name used to build a composite target's defining-line
/// regex: strip a `.o` suffix, strip a `$(...)` macro wrapper, and, for a
/// name that arrived wrapped in `$()`, strip a single trailing `y` (the
/// source dialect's habit of referencing `foo-y` as `$(foo)y`).
fn base_name(target: &str) -> String {
    let trimmed = target.trim();
    let was_macro_ref = trimmed.starts_with("$(");
    let inner = trimmed
        .strip_prefix("$(")
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    let stripped = inner.strip_suffix(".o").unwrap_or(inner);
    if was_macro_ref {
        if let Some(without_y) = stripped.strip_suffix('y') {
            return without_y.to_string();
        }
    }
    stripped.to_string()
}

enum Resolved {
    Directory(PathBuf),
    Source(PathBuf),
    Composite(String),
}

fn resolve(root: &Path, dir: &Path, token: &str) -> Resolved {
    let candidate_dir = dir.join(token.trim_end_matches('/'));
    if root.join(&candidate_dir).is_dir() {
        return Resolved::Directory(candidate_dir);
    }
    let base = token.strip_suffix(".o").unwrap_or(token);
    for ext in [".c", ".S", ".h"] {
        let candidate = dir.join(format!("{base}{ext}"));
        if root.join(&candidate).exists() {
            return Resolved::Source(candidate);
        }
    }
    Resolved::Composite(token.to_string())
}

/// Expands every entry of `dir.composite` against `dir.cached_lines`,
/// folding resolved sources/directories into `global`. Entries are drained
/// so a directory's composite map is empty once expansion completes.
pub fn expand(root: &Path, global: &mut GlobalState, dir: &mut DirectoryState) {
    let entries: Vec<(String, Alternatives)> = dir.composite.drain().collect();
    for (target, pending) in entries {
        let mut visited = FxHashSet::default();
        expand_target(root, global, dir, &target, &pending, &mut visited);
    }
}

/// Recursively expands one target. `visited` guards against a composite
/// chain that cycles back on itself: the guard set only ever grows, so
/// expansion always terminates (testable property 5).
fn expand_target(
    root: &Path,
    global: &mut GlobalState,
    dir: &DirectoryState,
    target: &str,
    pending: &Alternatives,
    visited: &mut FxHashSet<String>,
) {
    if !visited.insert(target.to_string()) {
        return;
    }

    let base = base_name(target);
    let pattern = format!(
        r"^\s*{}(?:-y|-objs|-\$\(([A-Za-z0-9_]+)\))?\s*(?::=|\+=|=)\s*(.*)$",
        regex::escape(&base)
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            system::verboseln!("Skipped", "macro expansion for `{target}`: {e}");
            return;
        }
    };

    for (line, if_cond) in &dir.cached_lines {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let config_guard = caps.get(1).map(|m| format!("CONFIG_{}", m.as_str()));
        let rhs_raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let rhs = substitute_vars(rhs_raw, &dir.definitions);

        let mut extra = if_cond.clone();
        if let Some(guard) = &config_guard {
            extra.append_term(guard.clone());
        }
        let combined = build_precondition(pending, &extra);

        for token in rhs.split_whitespace() {
            match resolve(root, &dir.dir, token) {
                Resolved::Directory(d) => {
                    let key = d.to_string_lossy().into_owned();
                    global.dir_condition_entry(&key).add_alternative(combined.clone());
                }
                Resolved::Source(f) => {
                    let key = f.to_string_lossy().into_owned();
                    global.feature_entry(&key).add_alternative(combined.clone());
                }
                Resolved::Composite(name) => {
                    let mut next_pending = Alternatives::new();
                    next_pending.add_alternative(combined.clone());
                    expand_target(root, global, dir, &name, &next_pending, visited);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boolean::Precondition;

    #[test]
    fn base_name_strips_dot_o() {
        assert_eq!(base_name("mything.o"), "mything");
    }

    #[test]
    fn base_name_strips_macro_wrapper_and_trailing_y() {
        assert_eq!(base_name("$(foo)y"), "foo");
    }

    #[test]
    fn s4_macro_expansion_unconditional() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.c"), "").unwrap();
        std::fs::write(tmp.path().join("b.c"), "").unwrap();

        let mut global = GlobalState::new();
        let mut dir = DirectoryState::new(PathBuf::new(), Precondition::new());
        dir.composite.insert("mything".to_string(), Alternatives::unconditional());
        dir.cached_lines.push(("mything-objs := a.o b.o".to_string(), Precondition::new()));

        expand(tmp.path(), &mut global, &mut dir);

        assert_eq!(global.features["a.c"].items()[0], Precondition::new());
        assert_eq!(global.features["b.c"].items()[0], Precondition::new());
    }

    #[test]
    fn cycle_guard_terminates() {
        let tmp = tempfile::tempdir().unwrap();
        let mut global = GlobalState::new();
        let mut dir = DirectoryState::new(PathBuf::new(), Precondition::new());
        dir.composite.insert("a".to_string(), Alternatives::unconditional());
        // a references b, b references a: must not loop forever.
        dir.cached_lines.push(("a-objs := $(b)y".to_string(), Precondition::new()));
        dir.cached_lines.push(("b-objs := $(a)y".to_string(), Precondition::new()));

        expand(tmp.path(), &mut global, &mut dir);
        assert!(global.features.is_empty());
    }
}
