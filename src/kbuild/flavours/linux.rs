use std::borrow::Cow;

use super::{Flavour, ObjectPrefix};

/// Linux kernel Kbuild dialect: `obj-y`/`lib-y` object lists, `Kbuild` with
/// `Makefile` fallback, `$(srctree)/` prefix stripping.
pub struct Linux;

const OBJECT_PREFIXES: &[ObjectPrefix] = &[ObjectPrefix { prefix: "obj" }, ObjectPrefix { prefix: "lib" }];

impl Flavour for Linux {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn makefile_names(&self) -> &[&'static str] {
        &["Kbuild", "Makefile"]
    }

    fn object_prefixes(&self) -> &[ObjectPrefix] {
        OBJECT_PREFIXES
    }

    fn rewrite_line<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if line.contains("$(srctree)/") {
            Cow::Owned(line.replace("$(srctree)/", ""))
        } else {
            Cow::Borrowed(line)
        }
    }
}
