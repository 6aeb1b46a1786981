//! Component J: the model translator. Turns a parsed catalogue into a
//! per-symbol propositional implication, honouring tristate mutual
//! exclusion, choice-group forward references, always-on/off propagation
//! and `ItemSelects` accumulation, per §4.J.

use std::collections::{BTreeMap, BTreeSet};

use crate::kconfig::model::{Catalogue, SymbolType};
use crate::kconfig::rewriter;
use crate::system;

/// The translated model: always-on/off sets plus one formula (or `None` for
/// a bare, unconstrained symbol) per `CONFIG_*` name.
pub struct TranslatedModel {
    pub always_on: BTreeSet<String>,
    pub always_off: BTreeSet<String>,
    pub symbols: BTreeMap<String, Option<String>>,
}

impl TranslatedModel {
    /// Renders the `.model` text: `UNDERTAKER_SET` lines first, then one
    /// `SYMBOL "formula"` (or bare `SYMBOL`) line per symbol in sorted
    /// order, so repeated runs are byte-identical.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.always_on.is_empty() {
            lines.push(format!(
                "UNDERTAKER_SET ALWAYS_ON {}",
                self.always_on.iter().map(|s| format!("\"{s}\"")).collect::<Vec<_>>().join(" ")
            ));
        }
        if !self.always_off.is_empty() {
            lines.push(format!(
                "UNDERTAKER_SET ALWAYS_OFF {}",
                self.always_off.iter().map(|s| format!("\"{s}\"")).collect::<Vec<_>>().join(" ")
            ));
        }
        for (symbol, formula) in &self.symbols {
            match formula {
                Some(f) => lines.push(format!("{symbol} \"{f}\"")),
                None => lines.push(symbol.clone()),
            }
        }
        lines
    }

    /// Renders the `.cnf` sibling header: one `c sym <NAME> <typecode>` line
    /// per catalogued item plus a `c meta_value` line per always-on/off set,
    /// emitted ahead of whatever DIMACS clauses the SAT back end adds.
    pub fn render_cnf_header(&self, catalogue: &Catalogue) -> Vec<String> {
        let mut lines = Vec::new();
        for name in catalogue.item_names_sorted() {
            let item = catalogue.item(name).expect("name came from catalogue");
            let ty = item.ty.unwrap_or(SymbolType::Other);
            lines.push(format!("c sym {} {}", item.symbol(), ty.code()));
        }
        if !self.always_on.is_empty() {
            lines.push(format!(
                "c meta_value ALWAYS_ON {}",
                self.always_on.iter().cloned().collect::<Vec<_>>().join(" ")
            ));
        }
        if !self.always_off.is_empty() {
            lines.push(format!(
                "c meta_value ALWAYS_OFF {}",
                self.always_off.iter().cloned().collect::<Vec<_>>().join(" ")
            ));
        }
        lines
    }
}

/// A unique free variable appended to an always-on item's own `selectedBy`
/// list, so that an omnipresent default doesn't collapse into `X ≡
/// selector` the moment some other item also selects it.
fn always_on_free_var(name: &str) -> String {
    format!("CONFIG_{name}_ALWAYS_ON_FREE")
}

pub fn translate(catalogue: &Catalogue) -> TranslatedModel {
    let mut deps: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut selected_by: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut always_on = BTreeSet::new();
    let always_off = BTreeSet::new();
    let mut used_ignored_sentinel = false;

    // Choice groups: forward-reference mutual exclusion. Every member's
    // deps gain `!other` for every other member in the group.
    for choice in catalogue.choices.values() {
        for member in &choice.members {
            let Some(item) = catalogue.item(member) else {
                continue;
            };
            let entry = deps.entry(item.symbol()).or_default();
            for other in &choice.members {
                if other != member {
                    if let Some(other_item) = catalogue.item(other) {
                        entry.push(format!("!{}", other_item.symbol()));
                    }
                }
            }
        }
    }

    for name in catalogue.item_names_sorted() {
        let item = catalogue.item(name).expect("name came from catalogue");
        let symbol = item.symbol();

        if let Some(dep_expr) = item.dependency() {
            // A tristate's own symbol (as opposed to its `_MODULE` companion)
            // can only be satisfied by a dependency that evaluates to `y`.
            match rewriter::rewrite(catalogue, &dep_expr, !item.is_tristate()) {
                Ok(rewritten) => {
                    used_ignored_sentinel |= rewritten.used_ignored_sentinel;
                    if !rewritten.text.is_empty() {
                        deps.entry(symbol.clone()).or_default().insert(0, rewritten.text);
                    }
                }
                Err(e) => {
                    system::verboseln!("Skipped", "depends for {name}: {e}");
                }
            }
        }

        // An omnipresent default-on item (no prompt, no depends, unconditional
        // `Default NAME "y" "y"`) joins the always-on set and gets a synthetic
        // free-variable disjunct so other items' selects don't collapse its
        // formula into a bare equivalence.
        let is_default_on = item
            .defaults
            .iter()
            .any(|(value, condition)| value == "y" && condition == "y");
        if is_default_on && item.is_omnipresent() {
            always_on.insert(symbol.clone());
            selected_by.entry(symbol.clone()).or_default().push(always_on_free_var(name));
        }

        for (target, condition) in &item.selects {
            let Some(target_item) = catalogue.item(target) else {
                system::verboseln!("Skipped", "ItemSelects {name} -> {target}: unknown target");
                continue;
            };
            if target_item.ty != Some(SymbolType::Boolean) {
                continue;
            }
            let fragment = if condition == "y" {
                target_item.symbol()
            } else {
                match rewriter::rewrite(catalogue, condition, true) {
                    Ok(rewritten) => {
                        used_ignored_sentinel |= rewritten.used_ignored_sentinel;
                        format!("({}) -> {}", rewritten.text, target_item.symbol())
                    }
                    Err(e) => {
                        system::verboseln!("Skipped", "ItemSelects {name} -> {target}: {e}");
                        continue;
                    }
                }
            };
            deps.entry(symbol.clone()).or_default().push(fragment.clone());

            if target_item.prompts.is_empty() {
                selected_by.entry(target_item.symbol()).or_default().push(symbol.clone());
            }

            // A tristate selector's `_MODULE` companion implies the same
            // target: `SEL=m` still satisfies whatever `SEL` selects.
            if item.is_tristate() {
                let module = item.symbol_module();
                deps.entry(module.clone()).or_default().push(fragment);
                if target_item.prompts.is_empty() {
                    selected_by.entry(target_item.symbol()).or_default().push(module);
                }
            }
        }

        if item.is_tristate() {
            let module = item.symbol_module();
            deps.entry(symbol.clone()).or_default().push(format!("!{module}"));

            let module_deps = deps.entry(module.clone()).or_default();
            if let Some(dep_expr) = item.dependency() {
                if let Ok(rewritten) = rewriter::rewrite(catalogue, &dep_expr, true) {
                    used_ignored_sentinel |= rewritten.used_ignored_sentinel;
                    if !rewritten.text.is_empty() {
                        module_deps.insert(0, rewritten.text);
                    }
                }
            }
            module_deps.push(format!("!{symbol}"));
            module_deps.push("CONFIG_MODULES".to_string());
        }
    }

    let mut symbols = BTreeMap::new();
    for name in catalogue.item_names_sorted() {
        let item = catalogue.item(name).expect("name came from catalogue");
        symbols.insert(item.symbol(), render_formula(&item.symbol(), &deps, &selected_by));
        if item.is_tristate() {
            symbols.insert(item.symbol_module(), render_formula(&item.symbol_module(), &deps, &selected_by));
        }
    }
    // A rewritten expression that couldn't be resolved stands in for
    // `CONFIG_CADOS_IGNORED`; the catalogue still needs to declare the
    // symbol so downstream SAT tooling can reference it.
    if used_ignored_sentinel || catalogue.has_ignored_symbol {
        symbols.entry("CONFIG_CADOS_IGNORED".to_string()).or_insert(None);
    }

    TranslatedModel {
        always_on,
        always_off,
        symbols,
    }
}

fn render_formula(
    symbol: &str,
    deps: &BTreeMap<String, Vec<String>>,
    selected_by: &BTreeMap<String, Vec<String>>,
) -> Option<String> {
    let mut pieces: Vec<String> = deps.get(symbol).cloned().unwrap_or_default();
    if let Some(selectors) = selected_by.get(symbol) {
        if !selectors.is_empty() {
            pieces.push(format!("({})", selectors.join(" || ")));
        }
    }
    if pieces.is_empty() {
        None
    } else {
        Some(pieces.join(" && "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kconfig::reader::parse_dump;

    #[test]
    fn s6_tristate_dependency_and_mutual_exclusion() {
        let cat = parse_dump("Item FOO boolean\nItem BAR tristate\nDepends FOO \"BAR\"\n");
        let model = translate(&cat);

        assert_eq!(
            model.symbols["CONFIG_FOO"].as_deref(),
            Some("(CONFIG_BAR || CONFIG_BAR_MODULE)")
        );
        assert_eq!(model.symbols["CONFIG_BAR"].as_deref(), Some("!CONFIG_BAR_MODULE"));
        assert_eq!(
            model.symbols["CONFIG_BAR_MODULE"].as_deref(),
            Some("!CONFIG_BAR && CONFIG_MODULES")
        );
    }

    #[test]
    fn choice_members_exclude_each_other() {
        let dump = "Item A boolean\nItem B boolean\nChoice GRP boolean y\nChoiceItem A GRP\nChoiceItem B GRP\n";
        let cat = parse_dump(dump);
        let model = translate(&cat);
        assert_eq!(model.symbols["CONFIG_A"].as_deref(), Some("!CONFIG_B"));
        assert_eq!(model.symbols["CONFIG_B"].as_deref(), Some("!CONFIG_A"));
    }

    #[test]
    fn omnipresent_default_on_item_is_always_on_with_free_var() {
        let dump = "Item X boolean\nDefault X \"y\" \"y\"\n";
        let cat = parse_dump(dump);
        let model = translate(&cat);
        assert!(model.always_on.contains("CONFIG_X"));
        assert_eq!(model.symbols["CONFIG_X"].as_deref(), Some("(CONFIG_X_ALWAYS_ON_FREE)"));
    }

    #[test]
    fn item_selects_boolean_target_appends_to_selector_deps() {
        let dump = "Item SEL boolean\nItem T boolean\nItemSelects SEL \"T\" \"y\"\n";
        let cat = parse_dump(dump);
        let model = translate(&cat);
        assert_eq!(model.symbols["CONFIG_SEL"].as_deref(), Some("CONFIG_T"));
        assert_eq!(model.symbols["CONFIG_T"].as_deref(), Some("(CONFIG_SEL)"));
    }

    #[test]
    fn tristate_depends_on_tristate_requires_base_symbol_not_module() {
        let dump = "Item A tristate\nItem B tristate\nDepends A \"B\"\n";
        let cat = parse_dump(dump);
        let model = translate(&cat);

        assert_eq!(
            model.symbols["CONFIG_A"].as_deref(),
            Some("CONFIG_B && !CONFIG_A_MODULE")
        );
        assert_eq!(
            model.symbols["CONFIG_A_MODULE"].as_deref(),
            Some("(CONFIG_B || CONFIG_B_MODULE) && !CONFIG_A && CONFIG_MODULES")
        );
    }

    #[test]
    fn tristate_selector_module_variant_implies_and_is_tracked_as_selector() {
        let dump = "Item SEL tristate\nItem T boolean\nItemSelects SEL \"T\" \"y\"\n";
        let cat = parse_dump(dump);
        let model = translate(&cat);

        assert_eq!(model.symbols["CONFIG_SEL_MODULE"].as_deref(), Some("CONFIG_T && !CONFIG_SEL && CONFIG_MODULES"));
        let selectors = model.symbols["CONFIG_T"].as_deref().unwrap();
        assert!(selectors.contains("CONFIG_SEL"));
        assert!(selectors.contains("CONFIG_SEL_MODULE"));
    }

    #[test]
    fn unresolvable_depends_fragment_surfaces_cados_ignored_symbol() {
        let dump = "Item FOO boolean\nDepends FOO \"BAR = bogus_literal\"\n";
        let cat = parse_dump(dump);
        let model = translate(&cat);
        assert!(model.symbols.contains_key("CONFIG_CADOS_IGNORED"));
        assert_eq!(model.symbols["CONFIG_CADOS_IGNORED"], None);
    }
}
