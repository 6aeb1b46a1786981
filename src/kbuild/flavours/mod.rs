//! Flavour adapters: per-build-system rules plugged into the shared parse
//! engine.

pub(crate) mod busybox;
pub(crate) mod coreboot;
mod linux;

pub use busybox::Busybox;
pub use coreboot::Coreboot;
pub use linux::Linux;

use std::path::Path;

/// The directory busybox's `COMMON_FILES` macro-aliasing special case
/// applies to; exposed at the `flavours` level so the directory walk
/// doesn't need to reach into the `busybox` submodule directly.
pub fn busybox_common_files_dir() -> &'static str {
    busybox::COMMON_FILES_DIR
}

/// See [`busybox::alias_common_files`].
pub fn busybox_alias_common_files(
    root: &Path,
    global: &mut crate::kbuild::state::GlobalState,
    dir: &crate::kbuild::state::DirectoryState,
) {
    busybox::alias_common_files(root, global, dir)
}

/// An object-list assignment recognised on one line, e.g. `obj-$(CONFIG_FOO)
/// += bar.o`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPrefix {
    /// The literal prefix before `-y` / `-$(CONFIG_X)`, e.g. `"obj"`.
    pub prefix: &'static str,
}

/// Per-flavour rules plugged into the shared Kbuild engine (component G).
pub trait Flavour {
    fn name(&self) -> &'static str;

    /// The makefile filename looked for in each directory, tried in order
    /// (e.g. `["Kbuild", "Makefile"]`).
    fn makefile_names(&self) -> &[&'static str];

    /// Recognised object-prefixes for `prefix-(y|$(CONFIG_X)) (+=|:=|=)`.
    fn object_prefixes(&self) -> &[ObjectPrefix];

    /// Tokens that introduce a subdirectory-descent list, beyond the
    /// default "value resolves to an existing directory" rule.
    fn subdir_tokens(&self) -> &[&'static str] {
        &[]
    }

    /// Flavour-specific token rewriting applied to a raw line before the
    /// shared handlers see it (Linux strips `$(srctree)/`; others are
    /// no-ops).
    fn rewrite_line<'a>(&self, line: &'a str) -> std::borrow::Cow<'a, str> {
        std::borrow::Cow::Borrowed(line)
    }

    /// Hook run once before parsing begins (Busybox runs `make
    /// gen_build_files`).
    fn prepare(&self, _root: &Path) -> Result<(), crate::system::Error> {
        Ok(())
    }
}
