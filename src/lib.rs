use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

pub mod boolean;
pub mod kbuild;
pub mod kconfig;
pub mod lines;
pub mod pipeline;
pub mod system;

use crate::kbuild::flavours::{Busybox, Coreboot, Flavour, Linux};
use crate::system::{ChildBuilder, Error, PathExt};

/// Which Kbuild dialect to parse, selected with `--flavour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FlavourArg {
    Linux,
    Busybox,
    Coreboot,
}

impl FlavourArg {
    fn as_flavour(self) -> Box<dyn Flavour> {
        match self {
            Self::Linux => Box::new(Linux),
            Self::Busybox => Box::new(Busybox),
            Self::Coreboot => Box::new(Coreboot),
        }
    }
}

/// `kbuild-extract [--directory D]* [--flavour linux|busybox|coreboot] <model> <arch>`
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct KbuildExtractArgs {
    /// Print verbose (debug-level) progress output.
    #[clap(short, long)]
    pub verbose: bool,

    /// Restrict the walk to these directories instead of discovering it from
    /// the top-level makefile. May be given more than once.
    #[clap(long = "directory")]
    pub directories: Vec<PathBuf>,

    /// Kbuild dialect to parse.
    #[clap(long, value_enum, default_value_t = FlavourArg::Linux)]
    pub flavour: FlavourArg,

    /// Run the flavour's one-time preparation hook (Busybox's `make
    /// gen_build_files`) before walking the tree.
    #[clap(long)]
    pub run_gen_build_files: bool,

    /// Emit the feature map as JSON instead of the `FILE_<id>` line format.
    #[clap(long)]
    pub dump_json: bool,

    /// After extraction, run `undertaker -j blockrange <path>` and print the
    /// conditional source blocks it reports for that file, one per line as
    /// `<file>:B<n>:<start>:<end>`.
    #[clap(long)]
    pub blockrange: Option<PathBuf>,

    /// After extraction, run `undertaker -j interesting -m <model> <items>`
    /// and print every `CONFIG_*` token the transitive dependency set
    /// touches, one per line. May be given more than once.
    #[clap(long = "interesting")]
    pub interesting: Vec<String>,

    /// Source tree root to walk.
    pub model: PathBuf,

    /// Architecture name; selects `<model>/models/<arch>.model`.
    pub arch: String,
}

/// `kconfig-translate <rsf-dump>`
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct KconfigTranslateArgs {
    /// Print verbose (debug-level) progress output.
    #[clap(short, long)]
    pub verbose: bool,

    /// Also write a `.cnf` sibling header next to the dump (`c sym …` /
    /// `c meta_value …` lines).
    #[clap(long)]
    pub cnf: bool,

    /// Path to the line-oriented Kconfig dump (the `.rsf` file).
    pub rsf_dump: PathBuf,
}

/// Loads `<root>/models/<arch>.model` (the Kconfig catalogue used to resolve
/// tristate `$(CONFIG_X)` references during Kbuild extraction) if its `.rsf`
/// dump sibling exists, otherwise returns `None` so the extractor falls back
/// to treating every symbol reference as boolean.
fn load_catalogue(root: &Path, arch: &str) -> Result<Option<kconfig::Catalogue>, Error> {
    let rsf_path = root.join("models").join(format!("{arch}.rsf"));
    if !rsf_path.is_file() {
        return Ok(None);
    }
    let text = system::read_file(&rsf_path)?;
    Ok(Some(kconfig::reader::parse_dump(&text)))
}

pub fn run_kbuild_extract(args: &KbuildExtractArgs) -> Result<(), Error> {
    let root = args.model.canonicalize2()?;
    let catalogue = load_catalogue(&root, &args.arch)?;
    let flavour = args.flavour.as_flavour();

    let global = kbuild::extract(
        &root,
        &args.directories,
        flavour.as_ref(),
        catalogue.as_ref(),
        args.run_gen_build_files,
    )?;

    if args.dump_json {
        let map = kbuild::feature_map_json(&global);
        let json = serde_json::to_string_pretty(&map).map_err(|e| Error::ParseJson("feature map".to_string(), e))?;
        println!("{json}");
    } else {
        for line in kbuild::format_output(&global) {
            println!("{line}");
        }
    }

    if let Some(path) = &args.blockrange {
        for range in run_blockrange(path)? {
            println!("{}:B{}:{}:{}", range.file, range.block, range.start, range.end);
        }
    }

    if !args.interesting.is_empty() {
        let model_path = root.join("models").join(format!("{}.model", args.arch));
        for symbol in run_interesting(&model_path, &args.interesting)? {
            println!("{symbol}");
        }
    }

    Ok(())
}

pub fn run_kconfig_translate(args: &KconfigTranslateArgs) -> Result<(), Error> {
    let text = system::read_file(&args.rsf_dump)?;
    let catalogue = kconfig::reader::parse_dump(&text);
    let model = kconfig::translator::translate(&catalogue);

    for line in model.render_lines() {
        println!("{line}");
    }

    if args.cnf {
        let cnf_path = args.rsf_dump.with_extension("cnf");
        let header = model.render_cnf_header(&catalogue);
        system::write_file(&cnf_path, header.join("\n") + "\n")?;
        system::infoln!("Wrote", "{}", cnf_path.display());
    }
    Ok(())
}

/// One conditional source block, as reported by `undertaker -j blockrange`:
/// `<file>:B<n>:<start>:<end>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRange {
    pub file: String,
    pub block: u32,
    pub start: u32,
    pub end: u32,
}

fn parse_blockrange_line(line: &str) -> Option<BlockRange> {
    let mut parts = line.rsplitn(4, ':');
    let end = parts.next()?.parse().ok()?;
    let start = parts.next()?.parse().ok()?;
    let block = parts.next()?.strip_prefix('B')?.parse().ok()?;
    let file = parts.next()?.to_string();
    Some(BlockRange { file, block, start, end })
}

/// Invokes `undertaker -j blockrange <path>` and parses every reported
/// block. Opt-in: the core extractor never shells out on its own.
pub fn run_blockrange(path: &Path) -> Result<Vec<BlockRange>, Error> {
    system::check_tool!("undertaker")?;
    let mut child = ChildBuilder::new("undertaker")
        .args(["-j", "blockrange"])
        .args([path])
        .piped()
        .spawn()?;
    let stdout = child.take_stdout();
    child.dump_stderr("undertaker");
    let ranges = stdout
        .map(|r| {
            use std::io::BufRead;
            r.lines().flatten().filter_map(|l| parse_blockrange_line(&l)).collect()
        })
        .unwrap_or_default();
    child.wait_success()?;
    Ok(ranges)
}

/// Invokes `undertaker -j interesting -m <model> <items>` and collects every
/// `CONFIG_*` token referenced in its output: the transitive dependency set
/// for the given items under `model`.
pub fn run_interesting(model: &Path, items: &[String]) -> Result<Vec<String>, Error> {
    system::check_tool!("undertaker")?;
    static CONFIG_RE: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"CONFIG_\w*[A-Z0-9]\w*").expect("static regex"));

    let mut child = ChildBuilder::new("undertaker")
        .args(["-j", "interesting", "-m"])
        .args([model])
        .args(items)
        .piped()
        .spawn()?;
    let stdout = child.take_stdout();
    child.dump_stderr("undertaker");
    let mut found = Vec::new();
    if let Some(reader) = stdout {
        use std::io::BufRead;
        for line in reader.lines().flatten() {
            for m in CONFIG_RE.find_iter(&line) {
                found.push(m.as_str().to_string());
            }
        }
    }
    child.wait_success()?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_blockrange_line_splits_trailing_fields() {
        let parsed = parse_blockrange_line("drivers/foo.c:B1:10:20").unwrap();
        assert_eq!(
            parsed,
            BlockRange {
                file: "drivers/foo.c".to_string(),
                block: 1,
                start: 10,
                end: 20,
            }
        );
    }

    #[test]
    fn parse_blockrange_line_rejects_malformed_input() {
        assert!(parse_blockrange_line("not-a-blockrange-line").is_none());
    }
}
