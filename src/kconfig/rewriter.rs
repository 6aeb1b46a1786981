//! Component I: rewrites a raw Kconfig boolean expression into a target
//! formula over `CONFIG_*` atoms.

use crate::kconfig::model::{Catalogue, SymbolType};
use crate::system::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    And,
    Or,
    Not,
    Eq,
    Neq,
    LParen,
    RParen,
    Ident(String),
    Literal(String),
}

fn tokenize(expr: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Neq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '"' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(Error::BoolParserException(expr.to_string()));
                }
                let lit: String = chars[start..j].iter().collect();
                tokens.push(Token::Literal(lit));
                i = j + 1;
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' => {
                let start = i;
                let mut j = i;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '-') {
                    j += 1;
                }
                let ident: String = chars[start..j].iter().collect();
                tokens.push(Token::Ident(ident));
                i = j;
            }
            _ => return Err(Error::BoolParserException(expr.to_string())),
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone)]
enum Ast {
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Not(Box<Ast>),
    /// A bare symbol reference, optionally compared against a literal
    /// (`None` comparison means "is on").
    Symbol(String, Option<(bool, String)>),
    Literal(String),
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn parse_expr(&mut self) -> Result<Ast, Error> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Ast, Error> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Ast::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Ast, Error> {
        let mut lhs = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.bump();
            let rhs = self.parse_not()?;
            lhs = Ast::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Ast, Error> {
        if self.peek() == Some(&Token::Not) {
            self.bump();
            let inner = self.parse_not()?;
            return Ok(Ast::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Ast, Error> {
        match self.bump() {
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                if self.bump() != Some(&Token::RParen) {
                    return Err(Error::BoolParserException("unbalanced parens".to_string()));
                }
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                let name = name.clone();
                match self.peek() {
                    Some(Token::Eq) => {
                        self.bump();
                        let value = self.expect_value()?;
                        Ok(Ast::Symbol(name, Some((true, value))))
                    }
                    Some(Token::Neq) => {
                        self.bump();
                        let value = self.expect_value()?;
                        Ok(Ast::Symbol(name, Some((false, value))))
                    }
                    _ => Ok(Ast::Symbol(name, None)),
                }
            }
            other => Err(Error::BoolParserException(format!("unexpected token: {other:?}"))),
        }
    }

    fn expect_value(&mut self) -> Result<String, Error> {
        match self.bump() {
            Some(Token::Ident(v)) => Ok(v.clone()),
            Some(Token::Literal(v)) => Ok(v.clone()),
            other => Err(Error::BoolParserException(format!("expected value, got {other:?}"))),
        }
    }
}

/// The result of rewriting one expression: the rewritten text, and whether
/// the `CONFIG_CADOS_IGNORED` sentinel had to stand in for a part of it.
pub struct Rewritten {
    pub text: String,
    pub used_ignored_sentinel: bool,
}

/// Rewrites `expr` into a target formula. `eval_to_module` controls whether
/// a bare tristate reference may be satisfied by `m` (used for the
/// `_MODULE` variant's dependency) or must be `y`.
pub fn rewrite(catalogue: &Catalogue, expr: &str, eval_to_module: bool) -> Result<Rewritten, Error> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Ok(Rewritten {
            text: String::new(),
            used_ignored_sentinel: false,
        });
    }
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let ast = parser.parse_expr()?;
    if parser.pos != tokens.len() {
        return Err(Error::BoolParserException(expr.to_string()));
    }
    let mut used_ignored = false;
    let text = render(&ast, catalogue, eval_to_module, &mut used_ignored);
    Ok(Rewritten {
        text,
        used_ignored_sentinel: used_ignored,
    })
}

fn render(ast: &Ast, catalogue: &Catalogue, eval_to_module: bool, used_ignored: &mut bool) -> String {
    match ast {
        Ast::And(l, r) => format!(
            "({} && {})",
            render(l, catalogue, eval_to_module, used_ignored),
            render(r, catalogue, eval_to_module, used_ignored)
        ),
        Ast::Or(l, r) => format!(
            "({} || {})",
            render(l, catalogue, eval_to_module, used_ignored),
            render(r, catalogue, eval_to_module, used_ignored)
        ),
        Ast::Not(inner) => format!("!{}", render(inner, catalogue, eval_to_module, used_ignored)),
        Ast::Literal(lit) => render_literal(lit, used_ignored),
        Ast::Symbol(name, cmp) => render_symbol(name, cmp.as_ref(), catalogue, eval_to_module, used_ignored),
    }
}

fn render_literal(lit: &str, used_ignored: &mut bool) -> String {
    match lit {
        "y" => "true".to_string(),
        "m" => "CONFIG_MODULES".to_string(),
        "n" => "false".to_string(),
        _ => {
            *used_ignored = true;
            "CONFIG_CADOS_IGNORED".to_string()
        }
    }
}

fn render_symbol(
    name: &str,
    cmp: Option<&(bool, String)>,
    catalogue: &Catalogue,
    eval_to_module: bool,
    used_ignored: &mut bool,
) -> String {
    // Bare `y`/`m`/`n` used as a comparison value rather than a symbol
    // reference.
    if cmp.is_none() && matches!(name, "y" | "m" | "n") {
        return render_literal(name, used_ignored);
    }

    let item = catalogue.item(name);
    let is_tristate = item.map(|i| i.is_tristate()).unwrap_or(false);
    let symbol = format!("CONFIG_{name}");
    let module = format!("CONFIG_{name}_MODULE");

    let base = if is_tristate {
        if eval_to_module {
            format!("({symbol} || {module})")
        } else {
            symbol.clone()
        }
    } else {
        symbol.clone()
    };

    match cmp {
        None => base,
        Some((equal, value)) => {
            let rhs = match value.as_str() {
                "y" => base,
                "m" if is_tristate => module,
                "n" => format!("!{base}"),
                _ => {
                    *used_ignored = true;
                    return "CONFIG_CADOS_IGNORED".to_string();
                }
            };
            if *equal {
                rhs
            } else {
                format!("!{rhs}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kconfig::model::Item;

    fn catalogue_with(name: &str, ty: SymbolType) -> Catalogue {
        let mut cat = Catalogue::default();
        cat.items.insert(
            name.to_string(),
            Item {
                name: name.to_string(),
                ty: Some(ty),
                ..Default::default()
            },
        );
        cat
    }

    #[test]
    fn tristate_reference_allows_module_when_requested() {
        let cat = catalogue_with("BAR", SymbolType::Tristate);
        let r = rewrite(&cat, "BAR", true).unwrap();
        assert_eq!(r.text, "(CONFIG_BAR || CONFIG_BAR_MODULE)");
    }

    #[test]
    fn tristate_reference_requires_y_without_module() {
        let cat = catalogue_with("BAR", SymbolType::Tristate);
        let r = rewrite(&cat, "BAR", false).unwrap();
        assert_eq!(r.text, "CONFIG_BAR");
    }

    #[test]
    fn negation_and_conjunction() {
        let cat = catalogue_with("BAR", SymbolType::Boolean);
        let r = rewrite(&cat, "!BAR && BAR", true).unwrap();
        assert_eq!(r.text, "(!CONFIG_BAR && CONFIG_BAR)");
    }

    #[test]
    fn unbalanced_parens_error() {
        let cat = Catalogue::default();
        assert!(rewrite(&cat, "(BAR", true).is_err());
    }
}
