//! Component H: parses a line-oriented Kconfig dump into an in-memory
//! symbol catalogue.

use crate::kconfig::model::{Catalogue, Choice, Item, SymbolType};
use crate::system;

/// Splits one dump line into whitespace-separated tokens, honouring
/// double-quoted fields that may contain escaped quotes (`\"`).
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            '\\' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Parses a full Kconfig dump. Malformed lines are skipped with a warning
/// rather than aborting the whole parse, matching the recovery policy
/// applied elsewhere in this crate.
pub fn parse_dump(text: &str) -> Catalogue {
    let mut catalogue = Catalogue::default();

    for (lineno, raw) in text.lines().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let tokens = tokenize(raw);
        if tokens.is_empty() {
            continue;
        }
        if let Err(msg) = apply_verb(&mut catalogue, &tokens) {
            system::verboseln!("Skipped", "dump line {}: {}", lineno + 1, msg);
        }
    }

    // Link choice members back to their items.
    let memberships: Vec<(String, String)> = catalogue
        .choices
        .values()
        .flat_map(|c| c.members.iter().map(move |m| (m.clone(), c.name.clone())))
        .collect();
    for (member, choice_name) in memberships {
        if let Some(item) = catalogue.items.get_mut(&member) {
            item.choice = Some(choice_name);
        }
    }

    catalogue
}

fn apply_verb(catalogue: &mut Catalogue, tokens: &[String]) -> Result<(), String> {
    match tokens[0].as_str() {
        "Item" => {
            let name = tokens.get(1).ok_or("missing Item name")?.clone();
            let ty = tokens.get(2).map(|s| SymbolType::from_str(s));
            let item = catalogue.items.entry(name.clone()).or_insert_with(|| Item {
                name: name.clone(),
                ..Default::default()
            });
            item.ty = ty;
        }
        "HasPrompts" => {
            // Informational count; prompts themselves arrive via `Prompt`.
        }
        "Prompt" => {
            let name = tokens.get(1).ok_or("missing Prompt name")?.clone();
            let text = tokens.get(2).cloned().unwrap_or_default();
            let condition = tokens.get(3).cloned().unwrap_or_else(|| "y".to_string());
            item_mut(catalogue, &name).prompts.push((text, condition));
        }
        "Depends" => {
            let name = tokens.get(1).ok_or("missing Depends name")?.clone();
            let expr = tokens.get(2).cloned().unwrap_or_default();
            if !expr.is_empty() {
                item_mut(catalogue, &name).depends.push(expr);
            }
        }
        "ItemSelects" => {
            let name = tokens.get(1).ok_or("missing ItemSelects name")?.clone();
            let target = tokens.get(2).cloned().unwrap_or_default();
            let condition = tokens.get(3).cloned().unwrap_or_else(|| "y".to_string());
            item_mut(catalogue, &name).selects.push((target, condition));
        }
        "Default" => {
            let name = tokens.get(1).ok_or("missing Default name")?.clone();
            let value = tokens.get(2).cloned().unwrap_or_default();
            let condition = tokens.get(3).cloned().unwrap_or_else(|| "y".to_string());
            item_mut(catalogue, &name).defaults.push((value, condition));
        }
        "Choice" => {
            let name = tokens.get(1).ok_or("missing Choice name")?.clone();
            let ty = tokens.get(2).map(|s| SymbolType::from_str(s));
            let required = tokens.get(3).map(|s| s == "y").unwrap_or(false);
            catalogue.choices.insert(
                name.clone(),
                Choice {
                    name,
                    ty,
                    required,
                    members: Vec::new(),
                },
            );
        }
        "ChoiceItem" => {
            let member = tokens.get(1).ok_or("missing ChoiceItem member")?.clone();
            let choice = tokens.get(2).ok_or("missing ChoiceItem choice")?.clone();
            catalogue
                .choices
                .entry(choice.clone())
                .or_insert_with(|| Choice {
                    name: choice,
                    ty: None,
                    required: false,
                    members: Vec::new(),
                })
                .members
                .push(member);
        }
        "Definition" => {
            // Source-location metadata; not needed for model translation.
        }
        other => return Err(format!("unrecognised verb `{other}`")),
    }
    Ok(())
}

fn item_mut<'a>(catalogue: &'a mut Catalogue, name: &str) -> &'a mut Item {
    catalogue.items.entry(name.to_string()).or_insert_with(|| Item {
        name: name.to_string(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s6_basic_items() {
        let dump = "Item FOO boolean\nItem BAR tristate\nDepends FOO \"BAR\"\n";
        let cat = parse_dump(dump);
        assert_eq!(cat.item("FOO").unwrap().ty, Some(SymbolType::Boolean));
        assert_eq!(cat.item("BAR").unwrap().ty, Some(SymbolType::Tristate));
        assert_eq!(cat.item("FOO").unwrap().depends, vec!["BAR".to_string()]);
    }

    #[test]
    fn tokenize_handles_escaped_quotes() {
        let tokens = tokenize(r#"Prompt FOO "say \"hi\"" "y""#);
        assert_eq!(tokens, vec!["Prompt", "FOO", "say \"hi\"", "y"]);
    }

    #[test]
    fn unknown_verb_is_skipped_not_fatal() {
        let cat = parse_dump("Bogus FOO BAR\nItem X boolean\n");
        assert!(cat.item("X").is_some());
    }
}
