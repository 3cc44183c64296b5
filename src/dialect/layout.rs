//! Canonical rendering of classified tokens.
//!
//! Layout depends only on the token sequence, never on the original
//! whitespace, so rendering the re-lexed output yields the same text.

use super::table::TableParts;
use super::token::Tok;

/// Keywords followed by a space before `(`.
const SPACED_BEFORE_PAREN: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "BY", "CHECK", "DEFAULT", "ELSE", "EXISTS", "FROM", "IN", "INTO",
    "IS", "JOIN", "KEY", "NOT", "ON", "OR", "OVER", "RETURN", "RETURNS", "SELECT", "SOME", "TABLE",
    "THEN", "UNION", "UNIQUE", "USING", "VALUES", "WHEN", "WHERE", "WITH",
];

/// Query clauses that start a new line at the top nesting level.
const CLAUSE_BREAKS: &[&str] = &["FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "UNION"];

/// Renders tokens using one dialect's identifier quote.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    quote: char,
}

impl Layout {
    /// Creates a layout quoting identifiers with `quote`.
    #[must_use]
    pub const fn new(quote: char) -> Self {
        Self { quote }
    }

    /// Renders a single token.
    #[must_use]
    pub fn token(&self, tok: &Tok) -> String {
        match tok {
            Tok::Keyword(k) => k.clone(),
            Tok::Ident(name) => {
                let doubled = format!("{0}{0}", self.quote);
                let escaped = name.replace(self.quote, &doubled);
                format!("{0}{escaped}{0}", self.quote)
            }
            Tok::Str(body) => format!("'{body}'"),
            Tok::Number(text) | Tok::Param(text) | Tok::Symbol(text) => text.clone(),
            Tok::Dollar(body) => dollar_quote(body),
        }
    }

    /// Renders tokens on a single line.
    #[must_use]
    pub fn inline(&self, toks: &[Tok]) -> String {
        let mut out = String::new();
        let mut prev: Option<&Tok> = None;
        for tok in toks {
            if prev.is_some_and(|p| needs_space(p, tok)) {
                out.push(' ');
            }
            out.push_str(&self.token(tok));
            prev = Some(tok);
        }
        out
    }

    /// Renders a statement, breaking lines after `;` and `BEGIN`, before
    /// `END`, and before top-level query clauses.
    #[must_use]
    pub fn statement(&self, toks: &[Tok]) -> String {
        let mut out = String::new();
        let mut depth = 0usize;
        let mut line_start = true;
        let mut prev: Option<&Tok> = None;

        for (i, tok) in toks.iter().enumerate() {
            let breaks_before = tok.is_kw("END") || (depth == 0 && tok.is_any_kw(CLAUSE_BREAKS));
            if !line_start && breaks_before {
                out.push('\n');
                line_start = true;
            }
            if !line_start && prev.is_some_and(|p| needs_space(p, tok)) {
                out.push(' ');
            }
            out.push_str(&self.token(tok));
            line_start = false;
            prev = Some(tok);

            if tok.is_sym("(") {
                depth += 1;
            } else if tok.is_sym(")") {
                depth = depth.saturating_sub(1);
            }

            let next = toks.get(i + 1);
            let breaks_after = tok.is_sym(";")
                || (tok.is_kw("BEGIN") && !next.is_some_and(|n| n.is_sym(";") || n.is_kw("ATOMIC")));
            if breaks_after && next.is_some() {
                out.push('\n');
                line_start = true;
            }
        }

        out
    }

    /// Renders a table with one element per line.
    #[must_use]
    pub fn table(&self, table: &TableParts) -> String {
        let mut out = self.inline(&table.head);
        out.push_str(" (");
        let elements: Vec<String> = table
            .elements
            .iter()
            .map(|element| format!("  {}", self.inline(element)))
            .collect();
        if !elements.is_empty() {
            out.push('\n');
            out.push_str(&elements.join(",\n"));
            out.push('\n');
        }
        out.push(')');
        if !table.tail.is_empty() {
            out.push(' ');
            out.push_str(&self.inline(&table.tail));
        }
        out
    }
}

fn dollar_quote(body: &str) -> String {
    let tag = if body.contains("$$") { "$body$" } else { "$$" };
    if body.is_empty() {
        format!("{tag}\n{tag}")
    } else {
        format!("{tag}\n{body}\n{tag}")
    }
}

fn needs_space(prev: &Tok, next: &Tok) -> bool {
    if next.is_sym(",") || next.is_sym(";") || next.is_sym(")") || next.is_sym("]") || next.is_sym("[") {
        return false;
    }
    if prev.is_sym("(") || prev.is_sym("[") {
        return false;
    }
    if prev.is_sym(".") || next.is_sym(".") || prev.is_sym("::") || next.is_sym("::") {
        return false;
    }
    if next.is_sym("(") {
        return match prev {
            Tok::Ident(_) => false,
            Tok::Keyword(k) => SPACED_BEFORE_PAREN.contains(&k.as_str()),
            _ => true,
        };
    }
    true
}
