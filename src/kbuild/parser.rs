//! The makefile parser (component E): conditional blocks, variable
//! definitions, object-list assignments, subdirectory descent.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::boolean::Alternatives;
use crate::kbuild::flavours::{coreboot, Flavour};
use crate::kbuild::state::{DirectoryState, GlobalState};
use crate::kconfig::model::{Catalogue, SymbolType};
use crate::pipeline::{DuringPass, LineOutcome, Pipeline};
use crate::system::Error;

static IFDEF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*ifdef\s+(\S+)").unwrap());
static IFNDEF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*ifndef\s+(\S+)").unwrap());
static IFEQ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*ifeq\s*\(\s*\$\(([A-Za-z0-9_]+)\)\s*,\s*([ymn]?)\s*\)"#).unwrap());
static IFNEQ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*ifneq\s*\(\s*\$\(([A-Za-z0-9_]+)\)\s*,\s*([ymn]?)\s*\)"#).unwrap());
/// Busybox wraps `archival/libarchive`'s object lists in `ifneq
/// ($(lib-y),)`; the engine doesn't reason about make-variable contents,
/// so this is recognised only to push a no-op, always-valid frame that
/// keeps the matching `endif` balanced rather than falling through to the
/// generic "unparseable condition" path.
static IFNEQ_LIBY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*ifneq\s*\(\s*\$\(lib-y\)\s*,\s*\)").unwrap());
static ELSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*else\b").unwrap());
static ENDIF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*endif\b").unwrap());
static DEFINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z0-9_.]+)\s*(:=|\+=|=)\s*(.*)$").unwrap());

/// Running context for one directory's parse: the shared global
/// accumulation plus this directory's local state.
pub struct ParseState<'f> {
    pub global: GlobalState,
    pub dir: DirectoryState,
    pub flavour: &'f dyn Flavour,
    pub catalogue: Option<&'f Catalogue>,
    pub root: PathBuf,
}

/// Resolves the `$(CONFIG_X)` tristate shorthand used inside `ifeq`/`ifneq`
/// against the Kconfig catalogue, falling back to plain boolean treatment
/// when no catalogue is available or the symbol isn't tristate.
fn tristate_terms(catalogue: Option<&Catalogue>, symbol: &str, value: &str) -> (Vec<String>, Vec<String>) {
    let name = format!("CONFIG_{symbol}");
    let is_tristate = catalogue
        .and_then(|c| c.symbol_type(symbol))
        .map(|t| t == SymbolType::Tristate)
        .unwrap_or(false);

    if is_tristate {
        let module = format!("{name}_MODULE");
        let on = format!("({name} || {module})");
        let off = vec![format!("!{name}"), format!("!{module}")];
        match value {
            "y" => (vec![on], off),
            "m" => (vec![module.clone()], vec![format!("!{module}")]),
            "n" => (off.clone(), vec![on]),
            _ => (vec![name], vec![format!("!{name}")]),
        }
    } else {
        match value {
            "n" => (vec![format!("!{name}")], vec![name]),
            _ => (vec![name.clone()], vec![format!("!{name}")]),
        }
    }
}

struct ConditionalPass;

impl DuringPass<ParseState<'_>> for ConditionalPass {
    fn priority(&self) -> u8 {
        10
    }

    fn handle(&self, state: &mut ParseState<'_>, line: &str) -> Result<LineOutcome, Error> {
        if let Some(caps) = IFDEF_RE.captures(line) {
            let sym = caps[1].to_string();
            state.dir.if_stack.push(vec![sym.clone()], vec![format!("!{sym}")], true);
            return Ok(LineOutcome::Consumed);
        }
        if let Some(caps) = IFNDEF_RE.captures(line) {
            let sym = caps[1].to_string();
            state.dir.if_stack.push(vec![format!("!{sym}")], vec![sym], true);
            return Ok(LineOutcome::Consumed);
        }
        if let Some(caps) = IFEQ_RE.captures(line) {
            let (pos, neg) = tristate_terms(state.catalogue, &caps[1], &caps[2]);
            state.dir.if_stack.push(pos, neg, true);
            return Ok(LineOutcome::Consumed);
        }
        if IFNEQ_LIBY_RE.is_match(line) {
            state.dir.if_stack.push(Vec::new(), Vec::new(), true);
            return Ok(LineOutcome::Consumed);
        }
        if let Some(caps) = IFNEQ_RE.captures(line) {
            let (pos, neg) = tristate_terms(state.catalogue, &caps[1], &caps[2]);
            // ifneq swaps which branch is the "positive" entry condition
            state.dir.if_stack.push(neg, pos, true);
            return Ok(LineOutcome::Consumed);
        }
        if ELSE_RE.is_match(line) {
            state.dir.if_stack.invert_top();
            return Ok(LineOutcome::Consumed);
        }
        if ENDIF_RE.is_match(line) {
            state.dir.if_stack.pop();
            return Ok(LineOutcome::Consumed);
        }
        // A recognised conditional keyword whose condition none of the
        // above regexes could parse: push an invalid frame so the
        // `no_config_nesting` counter (is_invalid) covers everything up to
        // the matching `endif`, which still needs a frame to pop.
        let trimmed = line.trim_start();
        if trimmed.starts_with("ifdef")
            || trimmed.starts_with("ifndef")
            || trimmed.starts_with("ifeq")
            || trimmed.starts_with("ifneq")
        {
            state.dir.if_stack.push(Vec::new(), Vec::new(), false);
            return Ok(LineOutcome::Consumed);
        }
        Ok(LineOutcome::NotConsumed)
    }
}

struct ObjectAssignPass {
    regexes: Vec<(String, Regex)>,
}

impl ObjectAssignPass {
    /// `extra_prefixes` are class names discovered from this directory's
    /// own `classes-y` assignment (Coreboot only; see
    /// [`discover_classes_y`]), appended to the flavour's conventional
    /// default set.
    fn new(flavour: &dyn Flavour, extra_prefixes: &[String]) -> Self {
        let regexes = flavour
            .object_prefixes()
            .iter()
            .map(|p| p.prefix.to_string())
            .chain(extra_prefixes.iter().cloned())
            .map(|prefix| {
                let pattern = format!(
                    r"^\s*{}-(y|\$\(([A-Za-z0-9_]+)\))\s*(:=|\+=|=)\s*(.*)$",
                    regex::escape(&prefix)
                );
                (prefix, Regex::new(&pattern).expect("object-prefix regex"))
            })
            .collect();
        Self { regexes }
    }
}

impl DuringPass<ParseState<'_>> for ObjectAssignPass {
    fn priority(&self) -> u8 {
        20
    }

    fn handle(&self, state: &mut ParseState<'_>, line: &str) -> Result<LineOutcome, Error> {
        for (_prefix, re) in &self.regexes {
            let Some(caps) = re.captures(line) else {
                continue;
            };
            if state.dir.if_stack.is_invalid() {
                return Ok(LineOutcome::Consumed);
            }
            let config_guard = caps.get(2).map(|m| format!("CONFIG_{}", m.as_str()));
            let tokens_raw = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

            let mut conjunct = state.dir.if_stack.precondition();
            if let Some(guard) = &config_guard {
                conjunct.append_term(guard.clone());
            }

            for token in substitute_vars(tokens_raw, &state.dir.definitions).split_whitespace() {
                apply_object_token(state, token, &conjunct);
            }
            return Ok(LineOutcome::Consumed);
        }
        Ok(LineOutcome::NotConsumed)
    }
}

struct SubdirPass;

impl DuringPass<ParseState<'_>> for SubdirPass {
    fn priority(&self) -> u8 {
        25
    }

    fn handle(&self, state: &mut ParseState<'_>, line: &str) -> Result<LineOutcome, Error> {
        for token_name in state.flavour.subdir_tokens() {
            let pattern = format!(r"^\s*{}\s*(:=|\+=|=)\s*(.*)$", regex::escape(token_name));
            let re = Regex::new(&pattern).expect("subdir-token regex");
            let Some(caps) = re.captures(line) else {
                continue;
            };
            if state.dir.if_stack.is_invalid() {
                return Ok(LineOutcome::Consumed);
            }
            let conjunct = state.dir.if_stack.precondition();
            let rhs = substitute_vars(&caps[2], &state.dir.definitions);
            for token in rhs.split_whitespace() {
                if token.contains("$(MAINBOARDDIR)") {
                    for pair in coreboot::enumerate_mainboards(&state.root) {
                        let mut pair_conjunct = conjunct.clone();
                        for synthetic in pair.synthetic_conditions() {
                            pair_conjunct.append_term(synthetic);
                        }
                        let dir_path = state.dir.dir.join(pair.dir());
                        let key = dir_path.to_string_lossy().into_owned();
                        state.global.dir_condition_entry(&key).add_alternative(pair_conjunct);
                    }
                } else if token.contains("$(ARCHDIR-y)") {
                    // Hard-coded to "x86" rather than a real variable lookup.
                    let resolved = token.replace("$(ARCHDIR-y)", coreboot::ARCHDIR_Y);
                    let mut pair_conjunct = conjunct.clone();
                    pair_conjunct.append_term("CONFIG_ARCH_X86");
                    let dir_path = state.dir.dir.join(resolved);
                    let key = dir_path.to_string_lossy().into_owned();
                    state.global.dir_condition_entry(&key).add_alternative(pair_conjunct);
                } else {
                    let dir_path = state.dir.dir.join(token);
                    let key = dir_path.to_string_lossy().into_owned();
                    state.global.dir_condition_entry(&key).add_alternative(conjunct.clone());
                }
            }
            return Ok(LineOutcome::Consumed);
        }
        Ok(LineOutcome::NotConsumed)
    }
}

struct DefinitionPass;

impl DuringPass<ParseState<'_>> for DefinitionPass {
    fn priority(&self) -> u8 {
        90
    }

    fn handle(&self, state: &mut ParseState<'_>, line: &str) -> Result<LineOutcome, Error> {
        if let Some(caps) = DEFINE_RE.captures(line) {
            let name = caps[1].to_string();
            let op = &caps[2];
            let rhs = substitute_vars(&caps[3], &state.dir.definitions);
            if op == "+=" {
                let existing = state.dir.definitions.entry(name).or_default();
                if !existing.is_empty() {
                    existing.push(' ');
                }
                existing.push_str(&rhs);
            } else {
                state.dir.definitions.insert(name, rhs);
            }
            return Ok(LineOutcome::Consumed);
        }
        Ok(LineOutcome::NotConsumed)
    }
}

/// Greedy fixed-point replacement of every `$(NAME)` reference using the
/// file-local definition table.
pub fn substitute_vars(input: &str, definitions: &rustc_hash::FxHashMap<String, String>) -> String {
    let mut current = input.to_string();
    loop {
        let mut changed = false;
        for (name, value) in definitions {
            let needle = format!("$({name})");
            if current.contains(&needle) {
                current = current.replace(&needle, value);
                changed = true;
            }
        }
        if !changed {
            return current;
        }
    }
}

/// What a right-hand-side token in an object-list assignment resolves to.
enum TokenKind {
    Directory(PathBuf),
    Source(PathBuf),
    Composite(String),
}

fn guess_source(root: &Path, dir: &Path, token: &str) -> Option<PathBuf> {
    let base = token.strip_suffix(".o").unwrap_or(token);
    for ext in [".c", ".S", ".h"] {
        let candidate = dir.join(format!("{base}{ext}"));
        if root.join(&candidate).exists() {
            return Some(candidate);
        }
    }
    None
}

fn resolve_token(root: &Path, dir: &Path, token: &str) -> TokenKind {
    let candidate_dir = dir.join(token.trim_end_matches('/'));
    if root.join(&candidate_dir).is_dir() {
        return TokenKind::Directory(candidate_dir);
    }
    if let Some(source) = guess_source(root, dir, token) {
        return TokenKind::Source(source);
    }
    TokenKind::Composite(token.to_string())
}

fn apply_object_token(state: &mut ParseState<'_>, token: &str, conjunct: &crate::boolean::Precondition) {
    match resolve_token(&state.root, &state.dir.dir, token) {
        TokenKind::Directory(d) => {
            let key = d.to_string_lossy().into_owned();
            state.global.dir_condition_entry(&key).add_alternative(conjunct.clone());
        }
        TokenKind::Source(f) => {
            let key = f.to_string_lossy().into_owned();
            state.global.feature_entry(&key).add_alternative(conjunct.clone());
        }
        TokenKind::Composite(name) => {
            let base = name.strip_suffix(".o").unwrap_or(&name).to_string();
            state.dir.composite.entry(base).or_insert_with(Alternatives::new).add_alternative(conjunct.clone());
        }
    }
}

/// Scans a directory's whole makefile text for a `classes-y` assignment
/// (Coreboot: the object-class prefixes are data, not a fixed set) and
/// returns the class names it binds, honouring `:=`/`=` reset and `+=`
/// append in source order. Other flavours never define `classes-y`, so
/// this is harmless dead weight for them.
pub fn discover_classes_y(text: &str) -> Vec<String> {
    static CLASSES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*classes-y\s*(:=|\+=|=)\s*(.*)$").unwrap());
    let mut classes: Vec<String> = Vec::new();
    for raw_line in text.lines() {
        let line = strip_line_comment(raw_line);
        let Some(caps) = CLASSES_RE.captures(line) else {
            continue;
        };
        if &caps[1] != "+=" {
            classes.clear();
        }
        for token in caps[2].split_whitespace() {
            if !classes.iter().any(|c| c == token) {
                classes.push(token.to_string());
            }
        }
    }
    classes
}

fn strip_line_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Builds the directory-level pipeline for a flavour: conditional blocks
/// run first, then object/subdir assignment, then the generic definition
/// fallback. `extra_prefixes` are additional object-class names this
/// directory's `classes-y` binds beyond the flavour's conventional default.
pub fn build_pipeline<'f>(flavour: &'f dyn Flavour, extra_prefixes: &[String]) -> Pipeline<ParseState<'f>> {
    Pipeline::new()
        .during(Box::new(ConditionalPass))
        .during(Box::new(ObjectAssignPass::new(flavour, extra_prefixes)))
        .during(Box::new(SubdirPass))
        .during(Box::new(DefinitionPass))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boolean::Precondition;
    use crate::kbuild::flavours::Linux;
    use crate::kbuild::state::DirectoryState;
    use std::path::PathBuf;

    fn run(lines: &[&str], root: &Path, dir: &str) -> GlobalState {
        let flavour = Linux;
        let pipeline = build_pipeline(&flavour, &[]);
        let mut state = ParseState {
            global: GlobalState::new(),
            dir: DirectoryState::new(PathBuf::from(dir), Precondition::new()),
            flavour: &flavour,
            catalogue: None,
            root: root.to_path_buf(),
        };
        pipeline
            .run_directory(&mut state, lines.iter().map(|s| s.to_string()))
            .unwrap();
        state.global
    }

    #[test]
    fn s1_linux_object_line() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bar.c"), "").unwrap();
        std::fs::create_dir(tmp.path().join("baz")).unwrap();
        let global = run(&["obj-$(CONFIG_FOO) += bar.o baz/"], tmp.path(), "");
        assert!(global.features.contains_key("bar.c"));
        assert_eq!(global.features["bar.c"].items()[0].terms(), &["CONFIG_FOO".to_string()]);
        assert!(global.dir_conditions.contains_key("baz"));
    }

    #[test]
    fn s3_tristate_condition_resolves_via_catalogue() {
        let mut catalogue = Catalogue::default();
        catalogue.items.insert(
            "X".to_string(),
            crate::kconfig::model::Item {
                name: "X".to_string(),
                ty: Some(SymbolType::Tristate),
                ..Default::default()
            },
        );
        let flavour = Linux;
        let pipeline = build_pipeline(&flavour, &[]);
        let mut state = ParseState {
            global: GlobalState::new(),
            dir: DirectoryState::new(PathBuf::new(), Precondition::new()),
            flavour: &flavour,
            catalogue: Some(&catalogue),
            root: PathBuf::new(),
        };
        pipeline.run_directory(&mut state, vec!["ifeq ($(CONFIG_X),y)".to_string()]).unwrap();
        assert_eq!(
            state.dir.if_stack.precondition().terms(),
            &["(CONFIG_X || CONFIG_X_MODULE)".to_string()]
        );
    }

    #[test]
    fn s2_if_nesting() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("x.c"), "").unwrap();
        let global = run(&["ifdef CONFIG_A", "obj-$(CONFIG_B) += x.o", "endif"], tmp.path(), "");
        assert_eq!(
            global.features["x.c"].items()[0].terms(),
            &["CONFIG_A".to_string(), "CONFIG_B".to_string()]
        );
    }

    #[test]
    fn s4_macro_target_goes_to_composite() {
        let tmp = tempfile::tempdir().unwrap();
        let flavour = Linux;
        let pipeline = build_pipeline(&flavour, &[]);
        let mut state = ParseState {
            global: GlobalState::new(),
            dir: DirectoryState::new(PathBuf::new(), Precondition::new()),
            flavour: &flavour,
            catalogue: None,
            root: tmp.path().to_path_buf(),
        };
        pipeline
            .run_directory(&mut state, vec!["obj-y += mything.o".to_string()])
            .unwrap();
        assert!(state.dir.composite.contains_key("mything"));
    }

    #[test]
    fn discover_classes_y_collects_extra_prefixes() {
        let text = "classes-y := obj driver\nclasses-y += smmstub\n";
        assert_eq!(discover_classes_y(text), vec!["obj", "driver", "smmstub"]);
    }

    #[test]
    fn discover_classes_y_reset_on_plain_assign() {
        let text = "classes-y := obj driver\nclasses-y := smmstub\n";
        assert_eq!(discover_classes_y(text), vec!["smmstub"]);
    }

    #[test]
    fn coreboot_archdir_y_expands_to_hardcoded_x86() {
        let tmp = tempfile::tempdir().unwrap();
        let flavour = crate::kbuild::flavours::Coreboot;
        let pipeline = build_pipeline(&flavour, &[]);
        let mut state = ParseState {
            global: GlobalState::new(),
            dir: DirectoryState::new(PathBuf::new(), Precondition::new()),
            flavour: &flavour,
            catalogue: None,
            root: tmp.path().to_path_buf(),
        };
        pipeline
            .run_directory(&mut state, vec!["subdirs-y += src/arch/$(ARCHDIR-y)".to_string()])
            .unwrap();
        let key = Path::new("src/arch/x86").to_string_lossy().into_owned();
        assert!(state.global.dir_conditions.contains_key(&key));
        assert_eq!(
            state.global.dir_conditions[&key].items()[0].terms(),
            &["CONFIG_ARCH_X86".to_string()]
        );
    }

    #[test]
    fn coreboot_recognises_dynamic_class_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("ramstage.c"), "").unwrap();
        let flavour = crate::kbuild::flavours::Coreboot;
        let extra = vec!["ramstage-class".to_string()];
        let pipeline = build_pipeline(&flavour, &extra);
        let mut state = ParseState {
            global: GlobalState::new(),
            dir: DirectoryState::new(PathBuf::new(), Precondition::new()),
            flavour: &flavour,
            catalogue: None,
            root: tmp.path().to_path_buf(),
        };
        pipeline
            .run_directory(&mut state, vec!["ramstage-class-y += ramstage.o".to_string()])
            .unwrap();
        assert!(state.global.features.contains_key("ramstage.c"));
    }
}
