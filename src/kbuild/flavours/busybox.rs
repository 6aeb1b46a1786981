use std::path::Path;

use regex::Regex;

use super::{Flavour, ObjectPrefix};
use crate::boolean::{Alternatives, Precondition};
use crate::kbuild::state::{DirectoryState, GlobalState};
use crate::system::{self, ChildBuilder, Error};

/// Busybox dialect: `core-y`/`lib-y` object lists, `Kbuild`/`Makefile`, and
/// a one-time `make gen_build_files` step that materialises generated
/// `.c` files before the tree can be walked.
pub struct Busybox;

const OBJECT_PREFIXES: &[ObjectPrefix] = &[ObjectPrefix { prefix: "core" }, ObjectPrefix { prefix: "lib" }];

impl Flavour for Busybox {
    fn name(&self) -> &'static str {
        "busybox"
    }

    fn makefile_names(&self) -> &[&'static str] {
        &["Kbuild", "Makefile"]
    }

    fn object_prefixes(&self) -> &[ObjectPrefix] {
        OBJECT_PREFIXES
    }

    fn prepare(&self, root: &Path) -> Result<(), Error> {
        system::infoln!("Running", "make gen_build_files");
        let child = ChildBuilder::new("make")
            .args(["gen_build_files"])
            .piped()
            .spawn()?;
        child.wait_success().map_err(|e| {
            system::errorln!("Warning", "gen_build_files failed in {}: {e}", root.display());
            e
        })
    }
}

/// Busybox's `archival/libarchive` directory aliases a disjunction of every
/// `obj-$(CONFIG_X)` condition seen in that directory under the macro name
/// `COMMON_FILES`, wrapped in an `ifneq ($(lib-y),)` guard that the engine
/// erases rather than evaluates.
pub const COMMON_FILES_DIR: &str = "archival/libarchive";
pub const COMMON_FILES_MACRO: &str = "COMMON_FILES";

/// Overrides the feature-map entries that `COMMON_FILES` expanded to with
/// the disjunction of every `lib-$(CONFIG_X)`/`core-$(CONFIG_X)` guard seen
/// in this directory. This is the one case the shared engine lets a
/// flavour adapter assign a fresh `Alternatives` outright instead of
/// accumulating onto whatever the plain object-assignment/macro-expansion
/// path already recorded (normally an unconditional entry, since
/// `lib-y += $(COMMON_FILES)` itself carries no guard).
pub fn alias_common_files(root: &Path, global: &mut GlobalState, dir: &DirectoryState) {
    let guard_re = Regex::new(r"(?:lib|core)-\$\(([A-Za-z0-9_]+)\)").expect("static regex");
    let mut seen = Alternatives::new();
    for (line, _) in &dir.cached_lines {
        for caps in guard_re.captures_iter(line) {
            seen.add_alternative(Precondition::from_terms([format!("CONFIG_{}", &caps[1])]));
        }
    }
    if seen.is_empty() {
        return;
    }

    let define_re = Regex::new(&format!(r"^\s*{COMMON_FILES_MACRO}\s*(?::=|\+=|=)\s*(.*)$")).expect("static regex");
    for (line, _) in &dir.cached_lines {
        let Some(caps) = define_re.captures(line) else {
            continue;
        };
        for token in caps[1].split_whitespace() {
            let base = token.strip_suffix(".o").unwrap_or(token);
            for ext in [".c", ".S", ".h"] {
                let candidate = dir.dir.join(format!("{base}{ext}"));
                if root.join(&candidate).exists() {
                    let key = candidate.to_string_lossy().into_owned();
                    global.features.insert(key, seen.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_common_files_aliases_disjunction() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(COMMON_FILES_DIR)).unwrap();
        std::fs::write(tmp.path().join(COMMON_FILES_DIR).join("header.c"), "").unwrap();

        let mut global = GlobalState::new();
        let mut dir = DirectoryState::new(Path::new(COMMON_FILES_DIR).to_path_buf(), Precondition::new());
        dir.cached_lines.push(("lib-$(CONFIG_TAR) += tar.o".to_string(), Precondition::new()));
        dir.cached_lines.push(("lib-$(CONFIG_CPIO) += cpio.o".to_string(), Precondition::new()));
        dir.cached_lines.push(("lib-y += $(COMMON_FILES)".to_string(), Precondition::new()));
        dir.cached_lines.push(("COMMON_FILES := header.o".to_string(), Precondition::new()));

        alias_common_files(tmp.path(), &mut global, &dir);

        let key = Path::new(COMMON_FILES_DIR).join("header.c").to_string_lossy().into_owned();
        assert_eq!(global.features[&key].len(), 2);
        assert!(global.features[&key]
            .items()
            .contains(&Precondition::from_terms(["CONFIG_TAR"])));
        assert!(global.features[&key]
            .items()
            .contains(&Precondition::from_terms(["CONFIG_CPIO"])));
    }
}
