//! Per-parse and per-directory state threaded through the pass pipeline.

use std::collections::VecDeque;
use std::path::PathBuf;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::boolean::{Alternatives, Precondition};

/// One open `ifdef`/`ifeq`/… block. `positive`/`negative` are the terms
/// appended to the running if-stack depending on which branch is active;
/// `valid` is false when the condition could not be parsed, in which case
/// lines inside the block are skipped regardless of branch.
#[derive(Debug, Clone)]
pub struct IfFrame {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub in_else: bool,
    pub valid: bool,
}

/// The if-stack for a single makefile fragment currently being parsed.
#[derive(Debug, Clone, Default)]
pub struct IfStack {
    frames: Vec<IfFrame>,
}

impl IfStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a stack seeded with a permanent frame for an inherited
    /// directory precondition, so every conjunction computed for this
    /// directory automatically carries `p1 ∧ … ∧ pn` from its ancestors
    /// (invariant 3: a file's precondition is its ancestors' preconditions
    /// conjoined with its local one). The frame is never flipped by `else`
    /// since nothing in this file opened it.
    pub fn with_base(base: Precondition) -> Self {
        let mut stack = Self::default();
        if !base.is_empty() {
            stack.push(base.terms().to_vec(), base.terms().to_vec(), true);
        }
        stack
    }

    pub fn push(&mut self, positive: Vec<String>, negative: Vec<String>, valid: bool) {
        self.frames.push(IfFrame {
            positive,
            negative,
            in_else: false,
            valid,
        });
    }

    pub fn invert_top(&mut self) {
        if let Some(top) = self.frames.last_mut() {
            top.in_else = !top.in_else;
        }
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True while any enclosing block had an unparseable condition; object
    /// processing skips lines in this state per the `no_config_nesting`
    /// recovery policy.
    pub fn is_invalid(&self) -> bool {
        self.frames.iter().any(|f| !f.valid)
    }

    /// The conjunction induced by every open, valid block.
    pub fn precondition(&self) -> Precondition {
        let mut terms = Vec::new();
        for frame in &self.frames {
            if !frame.valid {
                continue;
            }
            let active = if frame.in_else { &frame.negative } else { &frame.positive };
            terms.extend(active.iter().cloned());
        }
        Precondition::from_terms(terms)
    }
}

/// State local to one directory's makefile parse.
pub struct DirectoryState {
    /// Directory path, relative to the tree root.
    pub dir: PathBuf,
    /// Precondition under which this directory was descended into.
    pub inherited: Precondition,
    pub if_stack: IfStack,
    /// Textual variable definitions (`NAME := RHS`), file-local.
    pub definitions: FxHashMap<String, String>,
    /// Composite targets awaiting macro expansion, local to this directory.
    pub composite: FxHashMap<String, Alternatives>,
    /// Logical lines of the directory's makefile, cached for re-scanning
    /// during macro expansion. Each entry also records the if-stack
    /// precondition active when that line was read.
    pub cached_lines: Vec<(String, Precondition)>,
}

impl DirectoryState {
    pub fn new(dir: PathBuf, inherited: Precondition) -> Self {
        Self {
            dir,
            if_stack: IfStack::with_base(inherited.clone()),
            inherited,
            definitions: FxHashMap::default(),
            composite: FxHashMap::default(),
            cached_lines: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_base_seeds_inherited_precondition() {
        let stack = IfStack::with_base(Precondition::from_terms(["CONFIG_PARENT"]));
        assert_eq!(stack.precondition().terms(), &["CONFIG_PARENT".to_string()]);
    }

    #[test]
    fn else_inverts_only_the_top_frame() {
        let mut stack = IfStack::new();
        stack.push(vec!["CONFIG_A".to_string()], vec!["!CONFIG_A".to_string()], true);
        stack.push(vec!["CONFIG_B".to_string()], vec!["!CONFIG_B".to_string()], true);
        stack.invert_top();
        assert_eq!(
            stack.precondition().terms(),
            &["CONFIG_A".to_string(), "!CONFIG_B".to_string()]
        );
    }

    #[test]
    fn invalid_frame_marks_stack_invalid_until_popped() {
        let mut stack = IfStack::new();
        stack.push(Vec::new(), Vec::new(), false);
        assert!(stack.is_invalid());
        stack.pop();
        assert!(!stack.is_invalid());
    }
}

/// State shared across the whole parse: accumulated results plus the
/// directory worklist.
#[derive(Default)]
pub struct GlobalState {
    /// Relative source-file path (string form) -> accumulated alternatives.
    pub features: FxHashMap<String, Alternatives>,
    /// Relative subdirectory path -> precondition under which descent is
    /// valid.
    pub dir_conditions: FxHashMap<String, Alternatives>,
    pub worklist: VecDeque<PathBuf>,
    pub visited: FxHashSet<PathBuf>,
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feature_entry(&mut self, path: &str) -> &mut Alternatives {
        self.features.entry(path.to_string()).or_default()
    }

    pub fn dir_condition_entry(&mut self, path: &str) -> &mut Alternatives {
        self.dir_conditions.entry(path.to_string()).or_default()
    }
}
