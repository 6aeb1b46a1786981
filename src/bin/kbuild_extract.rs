use clap::Parser;
use tailor_config::KbuildExtractArgs;

fn main() {
    let args = KbuildExtractArgs::parse();
    if args.verbose {
        tailor_config::system::enable_verbose();
    }
    if let Err(e) = tailor_config::run_kbuild_extract(&args) {
        e.print();
        std::process::exit(1);
    }
}
