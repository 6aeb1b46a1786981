use clap::Parser;
use tailor_config::KconfigTranslateArgs;

fn main() {
    let args = KconfigTranslateArgs::parse();
    if args.verbose {
        tailor_config::system::enable_verbose();
    }
    if let Err(e) = tailor_config::run_kconfig_translate(&args) {
        e.print();
        std::process::exit(1);
    }
}
