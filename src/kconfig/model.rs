//! The in-memory Kconfig symbol catalogue (component H's output).

use rustc_hash::FxHashMap;

/// A Kconfig symbol's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolType {
    Boolean,
    Tristate,
    Integer,
    Hex,
    String,
    Other,
}

impl SymbolType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "boolean" | "bool" => Self::Boolean,
            "tristate" => Self::Tristate,
            "integer" | "int" => Self::Integer,
            "hex" => Self::Hex,
            "string" => Self::String,
            _ => Self::Other,
        }
    }

    /// The `c sym <NAME> <typecode>` code used in the `.cnf` on-disk format.
    pub fn code(self) -> u8 {
        match self {
            Self::Boolean => 1,
            Self::Tristate => 2,
            Self::Integer => 3,
            Self::Hex => 4,
            Self::String => 5,
            Self::Other => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Boolean),
            2 => Some(Self::Tristate),
            3 => Some(Self::Integer),
            4 => Some(Self::Hex),
            5 => Some(Self::String),
            6 => Some(Self::Other),
            _ => None,
        }
    }
}

/// One Kconfig item.
#[derive(Debug, Clone, Default)]
pub struct Item {
    pub name: String,
    pub ty: Option<SymbolType>,
    /// `(text, condition)` pairs.
    pub prompts: Vec<(String, String)>,
    pub depends: Vec<String>,
    /// `(target, condition)` pairs from `ItemSelects`.
    pub selects: Vec<(String, String)>,
    /// `(value, condition)` pairs from `Default`.
    pub defaults: Vec<(String, String)>,
    pub choice: Option<String>,
}

impl Item {
    pub fn symbol(&self) -> String {
        format!("CONFIG_{}", self.name)
    }

    pub fn symbol_module(&self) -> String {
        format!("CONFIG_{}_MODULE", self.name)
    }

    pub fn is_tristate(&self) -> bool {
        self.ty == Some(SymbolType::Tristate)
    }

    /// A symbol with no visible prompt is omnipresent: reachable without
    /// any user choice, so it belongs in the always-on set unless it also
    /// carries depends/defaults logic.
    pub fn is_omnipresent(&self) -> bool {
        self.prompts.is_empty() && self.depends.is_empty() && self.choice.is_none()
    }

    pub fn has_depends(&self) -> bool {
        !self.depends.is_empty()
    }

    /// The combined `&&`-joined depends expression, or `None` if there is
    /// none.
    pub fn dependency(&self) -> Option<String> {
        if self.depends.is_empty() {
            None
        } else {
            Some(self.depends.join(" && "))
        }
    }
}

/// One Kconfig choice group.
#[derive(Debug, Clone, Default)]
pub struct Choice {
    pub name: String,
    pub ty: Option<SymbolType>,
    pub required: bool,
    pub members: Vec<String>,
}

/// The full parsed catalogue.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    pub items: FxHashMap<String, Item>,
    pub choices: FxHashMap<String, Choice>,
    /// Set when the dump references an expression the rewriter could not
    /// resolve; the translator emits `CONFIG_CADOS_IGNORED` for it.
    pub has_ignored_symbol: bool,
}

impl Catalogue {
    pub fn symbol_type(&self, name: &str) -> Option<SymbolType> {
        self.items.get(name).and_then(|i| i.ty)
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    /// Items in declaration order, plus any choice groups' members kept in
    /// their catalogue order; used so output is deterministic regardless
    /// of hash-map iteration order.
    pub fn item_names_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.items.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_type_code_round_trips() {
        for ty in [
            SymbolType::Boolean,
            SymbolType::Tristate,
            SymbolType::Integer,
            SymbolType::Hex,
            SymbolType::String,
            SymbolType::Other,
        ] {
            assert_eq!(SymbolType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(SymbolType::from_code(0), None);
    }

    #[test]
    fn item_is_omnipresent_only_without_prompts_depends_or_choice() {
        let bare = Item {
            name: "X".to_string(),
            ..Default::default()
        };
        assert!(bare.is_omnipresent());

        let with_depends = Item {
            name: "Y".to_string(),
            depends: vec!["Z".to_string()],
            ..Default::default()
        };
        assert!(!with_depends.is_omnipresent());

        let in_choice = Item {
            name: "W".to_string(),
            choice: Some("GRP".to_string()),
            ..Default::default()
        };
        assert!(!in_choice.is_omnipresent());
    }
}
