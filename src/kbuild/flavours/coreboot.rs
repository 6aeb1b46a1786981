use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{Flavour, ObjectPrefix};

/// Coreboot dialect: `Makefile.inc`, mainboard-directory enumeration, and
/// per-mainboard synthetic `CONFIG_VENDOR_*` / `CONFIG_BOARD_*` conditions.
///
/// Coreboot's actual object-class prefixes come from a `classes-y`
/// makefile variable rather than a fixed set; this adapter exposes the
/// conventional default (`obj`, `driver`, `smmstub`) and the engine also
/// honours any prefix it discovers bound via `classes-y` while parsing.
pub struct Coreboot;

const OBJECT_PREFIXES: &[ObjectPrefix] = &[
    ObjectPrefix { prefix: "obj" },
    ObjectPrefix { prefix: "driver" },
    ObjectPrefix { prefix: "smmstub" },
];

const SUBDIR_TOKENS: &[&str] = &["subdirs-y"];

/// `$(ARCHDIR-y)` expansion target. Kept as a hard-coded configuration
/// knob rather than resolving the real make variable.
pub const ARCHDIR_Y: &str = "x86";

impl Flavour for Coreboot {
    fn name(&self) -> &'static str {
        "coreboot"
    }

    fn makefile_names(&self) -> &[&'static str] {
        &["Makefile.inc"]
    }

    fn object_prefixes(&self) -> &[ObjectPrefix] {
        OBJECT_PREFIXES
    }

    fn subdir_tokens(&self) -> &[&'static str] {
        SUBDIR_TOKENS
    }
}

/// One `src/mainboard/<vendor>/<board>` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainboardPair {
    pub vendor: String,
    pub board: String,
}

impl MainboardPair {
    pub fn dir(&self) -> PathBuf {
        PathBuf::from("src/mainboard").join(&self.vendor).join(&self.board)
    }

    /// Synthetic conditions contributed by descending into this
    /// mainboard's directory, upper-cased with `-` mapped to `_`.
    pub fn synthetic_conditions(&self) -> Vec<String> {
        let vendor = self.vendor.to_uppercase().replace('-', "_");
        let board = self.board.to_uppercase().replace('-', "_");
        vec![
            format!("CONFIG_VENDOR_{vendor}"),
            format!("CONFIG_BOARD_{vendor}_{board}"),
        ]
    }
}

/// Enumerates every `src/mainboard/<vendor>/<board>` pair under `root`,
/// used to expand a `subdirs-y` token that references `$(MAINBOARDDIR)`.
pub fn enumerate_mainboards(root: &Path) -> Vec<MainboardPair> {
    let mainboard_root = root.join("src/mainboard");
    let mut pairs = Vec::new();
    for vendor_entry in WalkDir::new(&mainboard_root).min_depth(1).max_depth(1).into_iter().flatten() {
        if !vendor_entry.file_type().is_dir() {
            continue;
        }
        let vendor = vendor_entry.file_name().to_string_lossy().into_owned();
        for board_entry in WalkDir::new(vendor_entry.path()).min_depth(1).max_depth(1).into_iter().flatten() {
            if !board_entry.file_type().is_dir() {
                continue;
            }
            let board = board_entry.file_name().to_string_lossy().into_owned();
            pairs.push(MainboardPair {
                vendor: vendor.clone(),
                board,
            });
        }
    }
    pairs.sort_by(|a, b| (&a.vendor, &a.board).cmp(&(&b.vendor, &b.board)));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerate_mainboards_sorts_vendor_board_pairs() {
        let tmp = tempfile::tempdir().unwrap();
        for (vendor, board) in [("lenovo", "x230"), ("asus", "f2a85-m"), ("lenovo", "t430")] {
            std::fs::create_dir_all(tmp.path().join("src/mainboard").join(vendor).join(board)).unwrap();
        }
        let pairs = enumerate_mainboards(tmp.path());
        assert_eq!(
            pairs,
            vec![
                MainboardPair {
                    vendor: "asus".to_string(),
                    board: "f2a85-m".to_string()
                },
                MainboardPair {
                    vendor: "lenovo".to_string(),
                    board: "t430".to_string()
                },
                MainboardPair {
                    vendor: "lenovo".to_string(),
                    board: "x230".to_string()
                },
            ]
        );
    }

    #[test]
    fn synthetic_conditions_upper_case_and_dash_to_underscore() {
        let pair = MainboardPair {
            vendor: "asus".to_string(),
            board: "f2a85-m".to_string(),
        };
        assert_eq!(
            pair.synthetic_conditions(),
            vec!["CONFIG_VENDOR_ASUS".to_string(), "CONFIG_BOARD_ASUS_F2A85_M".to_string()]
        );
    }
}
