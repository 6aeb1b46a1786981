//! The Kbuild side of the pipeline: ties the line reader (B), variable
//! scope (C), pass pipeline (D), makefile parser (E), macro expander (F)
//! and flavour adapters (G) together into a full source-tree walk that
//! produces the per-file feature map described in spec §3.

pub mod expander;
pub mod flavours;
pub mod parser;
pub mod state;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::boolean::{build_precondition, Alternatives, Precondition};
use crate::kbuild::flavours::Flavour;
use crate::kbuild::parser::ParseState;
use crate::kbuild::state::{DirectoryState, GlobalState};
use crate::kconfig::model::Catalogue;
use crate::lines::LineReader;
use crate::pipeline::LineOutcome;
use crate::system::{self, Error};

/// Locates the makefile fragment for `dir_path`, trying the flavour's
/// candidate filenames in order (`Kbuild` falling back to `Makefile` for
/// Linux/Busybox; `Makefile.inc` for Coreboot).
fn find_makefile(root: &Path, dir_path: &Path, flavour: &dyn Flavour) -> Option<PathBuf> {
    for name in flavour.makefile_names() {
        let candidate = dir_path.join(name);
        if root.join(&candidate).is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Walks `root`'s build tree starting from `directories` (the tree root
/// itself when empty), accumulating the feature map and dir-condition map
/// for `flavour`. `catalogue`, when given, resolves the `$(CONFIG_X)`
/// tristate shorthand inside `ifeq`/`ifneq`. `run_prepare` gates the
/// flavour's one-time preparation hook (Busybox's `make gen_build_files`)
/// since the core extractor never shells out unless asked.
pub fn extract(
    root: &Path,
    directories: &[PathBuf],
    flavour: &dyn Flavour,
    catalogue: Option<&Catalogue>,
    run_prepare: bool,
) -> Result<GlobalState, Error> {
    if run_prepare {
        flavour.prepare(root)?;
    }

    let mut global = GlobalState::new();
    if directories.is_empty() {
        global.worklist.push_back(PathBuf::new());
    } else {
        for d in directories {
            global.worklist.push_back(d.clone());
        }
    }

    while let Some(dir_path) = global.worklist.pop_front() {
        if !global.visited.insert(dir_path.clone()) {
            continue;
        }
        let key = dir_path.to_string_lossy().into_owned();

        let Some(makefile_rel) = find_makefile(root, &dir_path, flavour) else {
            if dir_path.as_os_str().is_empty() {
                return Err(Error::NotFound(format!(
                    "no top-level makefile ({:?}) under {}",
                    flavour.makefile_names(),
                    root.display()
                )));
            }
            system::verboseln!("Skipped", "no makefile in {}", dir_path.display());
            continue;
        };

        system::infoln!("Parsing", "{}", dir_path.display());
        let text = system::read_file(root.join(&makefile_rel))?;

        let inherited = global
            .dir_conditions
            .get(&key)
            .map(|alts| build_precondition(alts, &Precondition::new()))
            .unwrap_or_default();

        let dir_state = DirectoryState::new(dir_path.clone(), inherited);
        let extra_prefixes = parser::discover_classes_y(&text);
        let pipeline = parser::build_pipeline(flavour, &extra_prefixes);

        let mut parse_state = ParseState {
            global: std::mem::take(&mut global),
            dir: dir_state,
            flavour,
            catalogue,
            root: root.to_path_buf(),
        };

        for raw_line in LineReader::new(std::io::Cursor::new(text.as_bytes())) {
            let line = flavour.rewrite_line(&raw_line).into_owned();
            for pass in pipeline.during_passes() {
                if pass.handle(&mut parse_state, &line)? == LineOutcome::Consumed {
                    break;
                }
            }
            let snapshot = parse_state.dir.if_stack.precondition();
            parse_state.dir.cached_lines.push((line, snapshot));
        }

        system::verboseln!("Expanding", "{}", dir_path.display());
        expander::expand(root, &mut parse_state.global, &mut parse_state.dir);

        if flavour.name() == "busybox" && key == flavours::busybox_common_files_dir() {
            flavours::busybox_alias_common_files(root, &mut parse_state.global, &parse_state.dir);
        }

        global = parse_state.global;

        for sub in global.dir_conditions.keys() {
            let sub_path = PathBuf::from(sub);
            if !global.visited.contains(&sub_path) {
                global.worklist.push_back(sub_path);
            }
        }
    }

    Ok(global)
}

/// Formats the per-file feature map the way both the CLI and the Coreboot
/// output step print it (component G's output step, generalised across
/// flavours): `FILE_<id>` alone when unconditional, `FILE_<id>
/// "<formula>"` otherwise, one line per source file in sorted order so
/// repeated runs over an unchanged tree are byte-identical (testable
/// property 6).
pub fn format_output(global: &GlobalState) -> Vec<String> {
    let mut paths: Vec<&String> = global.features.keys().collect();
    paths.sort();
    paths
        .into_iter()
        .map(|path| {
            let alts = &global.features[path];
            let id = system::normalise_file_id(path);
            let unconditional = alts.items().len() == 1 && alts.items()[0].is_empty();
            if unconditional {
                format!("FILE_{id}")
            } else {
                format!("FILE_{id} \"{alts}\"")
            }
        })
        .collect()
}

/// The feature map in a JSON-friendly shape: path -> formula string, or
/// `None` when the file is unconditionally present. Used by `--dump-json`.
pub fn feature_map_json(global: &GlobalState) -> BTreeMap<String, Option<String>> {
    global
        .features
        .iter()
        .map(|(path, alts)| {
            let unconditional = alts.items().len() == 1 && alts.items()[0].is_empty();
            let formula = if unconditional { None } else { Some(alts.to_string()) };
            (path.clone(), formula)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kbuild::flavours::Linux;

    #[test]
    fn extract_walks_subdirectories_and_accumulates_inherited_precondition() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("Kbuild"),
            "obj-$(CONFIG_A) += sub/\n",
        )
        .unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub/Kbuild"), "obj-$(CONFIG_B) += x.o\n").unwrap();
        std::fs::write(tmp.path().join("sub/x.c"), "").unwrap();

        let flavour = Linux;
        let global = extract(tmp.path(), &[], &flavour, None, false).unwrap();

        let key = Path::new("sub").join("x.c").to_string_lossy().into_owned();
        let terms = global.features[&key].items()[0].terms();
        assert_eq!(terms, &["CONFIG_A".to_string(), "CONFIG_B".to_string()]);
    }

    #[test]
    fn format_output_is_sorted_and_quotes_conditional_files() {
        let mut global = GlobalState::new();
        global.feature_entry("z.c").add_alternative(Precondition::new());
        global.feature_entry("a.c").add_alternative(Precondition::from_terms(["CONFIG_X"]));
        let lines = format_output(&global);
        assert_eq!(lines, vec!["FILE_a_c \"CONFIG_X\"".to_string(), "FILE_z_c".to_string()]);
    }
}
