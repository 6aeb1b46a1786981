//! Print Utilities

use std::cell::RefCell;
use std::io::{IsTerminal, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

static mut VERBOSE: bool = false;

pub fn is_verbose() -> bool {
    unsafe { VERBOSE }
}

pub fn enable_verbose() {
    unsafe { VERBOSE = true }
}

thread_local! {
    static STDERR: RefCell<StandardStream> = RefCell::new(make_stderr());
}

fn make_stderr() -> StandardStream {
    let color_choice = if std::io::stderr().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stderr(color_choice)
}

// Status tags go to stderr so they never interleave with the FILE_<id>
// lines `run_kbuild_extract`/`run_kconfig_translate` write to stdout.
pub(crate) fn print_status_tag(color_spec: &ColorSpec, tag: &str) {
    STDERR.with_borrow_mut(|stderr| {
        let _ = stderr.set_color(color_spec);
        let _ = write!(stderr, "{:>12}", tag);
        let _ = stderr.reset();
        eprint!(" ");
    });
}

pub fn info_color() -> ColorSpec {
    let mut x = ColorSpec::new();
    x.set_fg(Some(Color::Green)).set_bold(true);
    x
}

pub fn hint_color() -> ColorSpec {
    let mut x = ColorSpec::new();
    x.set_fg(Some(Color::Yellow)).set_bold(true);
    x
}

pub fn error_color() -> ColorSpec {
    let mut x = ColorSpec::new();
    x.set_fg(Some(Color::Red)).set_bold(true);
    x
}

macro_rules! infoln {
    ($status:expr, $($args:tt)*) => {
        {
            let status = { $status };
            $crate::system::print_status_tag(&$crate::system::info_color(), status);
            eprintln!($($args)*);
        }
    };
}
pub(crate) use infoln;

macro_rules! errorln {
    ($status:expr, $($args:tt)*) => {
        {
            let status = { $status };
            $crate::system::print_status_tag(&$crate::system::error_color(), status);
            eprintln!($($args)*);
        }
    };
}
pub(crate) use errorln;

macro_rules! hintln {
    ($status:expr, $($args:tt)*) => {
        {
            let status = { $status };
            $crate::system::print_status_tag(&$crate::system::hint_color(), status);
            eprintln!($($args)*);
        }
    };
}
pub(crate) use hintln;

macro_rules! verboseln {
    ($status:expr, $($args:tt)*) => {
        {
            if ($crate::system::is_verbose()) {
                let status = { $status };
                $crate::system::print_status_tag(&$crate::system::hint_color(), status);
                eprintln!($($args)*);
            }
        }
    };
}
pub(crate) use verboseln;
