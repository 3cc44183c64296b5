//! Canonical form of stored view queries.
//!
//! Servers print the query of a view their own way. Postgres wraps joins and
//! every predicate in parentheses. `MySQL` qualifies each column with its
//! table and aliases it with its own name. The rewrites here remove that
//! decoration from both sides without changing what the query means.

use super::token::{Tok, matching_paren};

const JOINS: &[&str] = &["JOIN", "STRAIGHT_JOIN"];

const QUERY_STARTS: &[&str] = &["SELECT", "WITH", "VALUES"];

/// Keywords after which a parenthesized predicate may lose its parentheses.
const PREDICATE_LEADERS: &[&str] = &["WHERE", "ON", "HAVING", "AND", "OR", "NOT", "WHEN"];

/// Keywords that end a predicate.
const PREDICATE_FOLLOWERS: &[&str] = &[
    "AND", "OR", "THEN", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET", "UNION", "EXCEPT",
    "INTERSECT", "WINDOW", "JOIN", "LEFT", "RIGHT", "INNER", "CROSS", "FULL", "NATURAL",
    "STRAIGHT_JOIN", "ELSE", "END", "WITH",
];

/// Keywords that end a select-list item.
const ITEM_FOLLOWERS: &[&str] = &["AS", "FROM"];

/// Keywords that may follow the single table of a query.
const TABLE_FOLLOWERS: &[&str] = &["WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET", "WINDOW", "WITH"];

/// Rewrites the query of a `CREATE VIEW` statement in place.
pub fn canonicalize_view(tokens: &mut Vec<Tok>) {
    let Some(start) = body_start(tokens) else {
        return;
    };
    let mut body = tokens.split_off(start);
    canonicalize_query(&mut body);
    tokens.append(&mut body);
}

/// Index of the first token after the depth-zero `AS` of the header.
fn body_start(tokens: &[Tok]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_sym("(") {
            depth += 1;
        } else if tok.is_sym(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_kw("AS") {
            return Some(i + 1);
        }
    }
    None
}

/// Rewrites a query into its canonical form.
pub fn canonicalize_query(tokens: &mut Vec<Tok>) {
    while unwrap_join_group(tokens) || unwrap_double_parens(tokens) || unwrap_redundant_group(tokens) {}

    strip_single_table_qualifier(tokens);
    drop_table_alias_keyword(tokens);
    drop_repeated_aliases(tokens);
    drop_default_check_option(tokens);
}

fn paren_groups(tokens: &[Tok]) -> Vec<(usize, usize)> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, tok)| tok.is_sym("("))
        .filter_map(|(open, _)| matching_paren(tokens, open).map(|close| (open, close)))
        .collect()
}

/// Tokens of `inner` outside any nested parentheses.
fn top_level(inner: &[Tok]) -> Vec<&Tok> {
    let mut depth = 0usize;
    let mut out = Vec::new();
    for tok in inner {
        if tok.is_sym("(") {
            depth += 1;
        } else if tok.is_sym(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 {
            out.push(tok);
        }
    }
    out
}

fn is_query(inner: &[Tok]) -> bool {
    inner.first().is_some_and(|t| t.is_any_kw(QUERY_STARTS))
}

fn remove_group(tokens: &mut Vec<Tok>, group: Option<(usize, usize)>) -> bool {
    let Some((open, close)) = group else {
        return false;
    };
    tokens.remove(close);
    tokens.remove(open);
    true
}

/// `FROM (a JOIN b ON x)` becomes `FROM a JOIN b ON x`.
fn unwrap_join_group(tokens: &mut Vec<Tok>) -> bool {
    let found = paren_groups(tokens).into_iter().find(|&(open, close)| {
        let inner = &tokens[open + 1..close];
        open > 0
            && tokens[open - 1].is_kw("FROM")
            && !is_query(inner)
            && top_level(inner).iter().any(|t| t.is_any_kw(JOINS))
            && !tokens
                .get(close + 1)
                .is_some_and(|t| t.ident().is_some() || t.is_kw("AS"))
    });
    remove_group(tokens, found)
}

/// `((x))` becomes `(x)`.
fn unwrap_double_parens(tokens: &mut Vec<Tok>) -> bool {
    let found = paren_groups(tokens).into_iter().find_map(|(open, close)| {
        let inner_open = open + 1;
        if !tokens[inner_open].is_sym("(") || matching_paren(tokens, inner_open) != Some(close - 1) {
            return None;
        }
        let row = top_level(&tokens[inner_open + 1..close - 1]).iter().any(|t| t.is_sym(","));
        (!row).then_some((inner_open, close - 1))
    });
    remove_group(tokens, found)
}

/// Drops parentheses whose removal cannot change how the query parses.
fn unwrap_redundant_group(tokens: &mut Vec<Tok>) -> bool {
    let found = paren_groups(tokens)
        .into_iter()
        .find(|&(open, close)| is_redundant_group(tokens, open, close));
    remove_group(tokens, found)
}

fn is_redundant_group(tokens: &[Tok], open: usize, close: usize) -> bool {
    let inner = &tokens[open + 1..close];
    let Some(prev) = open.checked_sub(1).map(|i| &tokens[i]) else {
        return false;
    };
    if inner.is_empty() || is_query(inner) {
        return false;
    }
    let top = top_level(inner);
    if top
        .iter()
        .any(|t| t.is_sym(",") || t.is_sym("||") || t.is_sym("&&") || t.is_kw("XOR"))
    {
        return false;
    }
    let next = tokens.get(close + 1);

    let list_item = (prev.is_any_kw(&["SELECT", "DISTINCT"]) || prev.is_sym(",") || prev.is_sym("("))
        && next.is_none_or(|t| t.is_sym(",") || t.is_sym(")") || t.is_any_kw(ITEM_FOLLOWERS));
    if list_item {
        return true;
    }

    let predicate = (prev.is_any_kw(PREDICATE_LEADERS) || prev.is_sym("("))
        && next.is_none_or(|t| t.is_sym(")") || t.is_sym(",") || t.is_any_kw(PREDICATE_FOLLOWERS));
    if !predicate || (prev.is_kw("AND") && closes_between(tokens, open - 1)) {
        return false;
    }
    if top.iter().any(|t| t.is_kw("OR")) {
        return !prev.is_any_kw(&["AND", "NOT"]) && !next.is_some_and(|t| t.is_kw("AND"));
    }
    if top.iter().any(|t| t.is_kw("AND")) {
        return !prev.is_kw("NOT");
    }
    true
}

/// Returns true if the `AND` at `and` is the second half of a `BETWEEN`.
fn closes_between(tokens: &[Tok], and: usize) -> bool {
    let mut depth = 0usize;
    for tok in tokens[..and].iter().rev() {
        if tok.is_sym(")") {
            depth += 1;
        } else if tok.is_sym("(") {
            if depth == 0 {
                return false;
            }
            depth -= 1;
        } else if depth == 0 {
            if tok.is_kw("BETWEEN") {
                return true;
            }
            if tok.is_sym(",") || tok.is_any_kw(&["AND", "OR", "WHERE", "ON", "HAVING", "WHEN", "THEN", "SELECT"]) {
                return false;
            }
        }
    }
    false
}

/// Index of the depth-zero `FROM`.
fn top_level_from(tokens: &[Tok]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_sym("(") {
            depth += 1;
        } else if tok.is_sym(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_kw("FROM") {
            return Some(i);
        }
    }
    None
}

/// In a query over one table, `t.col` becomes `col`.
fn strip_single_table_qualifier(tokens: &mut Vec<Tok>) {
    if tokens.iter().filter(|t| t.is_kw("SELECT")).count() != 1 {
        return;
    }
    let Some(from) = top_level_from(tokens) else {
        return;
    };

    let mut cursor = from + 1;
    let Some(mut table) = tokens.get(cursor).and_then(Tok::ident).map(str::to_string) else {
        return;
    };
    cursor += 1;
    if tokens.get(cursor).is_some_and(|t| t.is_sym(".")) {
        let Some(name) = tokens.get(cursor + 1).and_then(Tok::ident) else {
            return;
        };
        table = name.to_string();
        cursor += 2;
    }
    let mut qualifiers = vec![table];
    if tokens.get(cursor).is_some_and(|t| t.is_kw("AS")) {
        cursor += 1;
    }
    if let Some(alias) = tokens.get(cursor).and_then(Tok::ident) {
        qualifiers.push(alias.to_string());
        cursor += 1;
    }
    if !tokens.get(cursor).is_none_or(|t| t.is_any_kw(TABLE_FOLLOWERS)) {
        return;
    }

    let table_ref = from + 1..cursor;
    let qualified: Vec<usize> = (0..tokens.len().saturating_sub(2))
        .filter(|&i| {
            !table_ref.contains(&i)
                && tokens[i].ident().is_some_and(|q| qualifiers.iter().any(|name| name == q))
                && tokens[i + 1].is_sym(".")
                && (tokens[i + 2].ident().is_some() || tokens[i + 2].is_sym("*"))
                && !(i > 0 && tokens[i - 1].is_sym("."))
        })
        .collect();
    for i in qualified.into_iter().rev() {
        tokens.drain(i..i + 2);
    }
}

/// `FROM users AS u` becomes `FROM users u`.
fn drop_table_alias_keyword(tokens: &mut Vec<Tok>) {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is_kw("FROM") || tokens[i].is_any_kw(JOINS) {
            if let Some(end) = table_ref_end(tokens, i + 1) {
                if tokens.get(end).is_some_and(|t| t.is_kw("AS"))
                    && tokens.get(end + 1).and_then(Tok::ident).is_some()
                {
                    tokens.remove(end);
                }
            }
        }
        i += 1;
    }
}

/// Index after a table name or derived table starting at `start`.
fn table_ref_end(tokens: &[Tok], start: usize) -> Option<usize> {
    let first = tokens.get(start)?;
    if first.is_sym("(") {
        let close = matching_paren(tokens, start)?;
        return is_query(&tokens[start + 1..close]).then_some(close + 1);
    }
    first.ident()?;
    if tokens.get(start + 1).is_some_and(|t| t.is_sym(".")) && tokens.get(start + 2).and_then(Tok::ident).is_some() {
        return Some(start + 3);
    }
    Some(start + 1)
}

/// `col AS col` and `t.col AS col` lose the alias.
fn drop_repeated_aliases(tokens: &mut Vec<Tok>) {
    let mut i = 1;
    while i + 2 < tokens.len() {
        let repeated = tokens[i + 1].is_kw("AS")
            && tokens[i].ident().is_some()
            && tokens[i].ident() == tokens[i + 2].ident()
            && starts_item(tokens, i)
            && tokens
                .get(i + 3)
                .is_none_or(|t| t.is_sym(",") || t.is_sym(")") || t.is_kw("FROM"));
        if repeated {
            tokens.drain(i + 1..i + 3);
        }
        i += 1;
    }
}

/// Returns true if the column at `column` (possibly qualified) is a whole
/// select-list item.
fn starts_item(tokens: &[Tok], column: usize) -> bool {
    let mut start = column;
    if start >= 2 && tokens[start - 1].is_sym(".") && tokens[start - 2].ident().is_some() {
        start -= 2;
    }
    start
        .checked_sub(1)
        .is_some_and(|prev| tokens[prev].is_sym(",") || tokens[prev].is_any_kw(&["SELECT", "DISTINCT"]))
}

/// `WITH CASCADED CHECK OPTION` is what `WITH CHECK OPTION` means.
fn drop_default_check_option(tokens: &mut Vec<Tok>) {
    let found = tokens.windows(4).position(|w| {
        w[0].is_kw("WITH") && w[1].is_kw("CASCADED") && w[2].is_kw("CHECK") && w[3].is_kw("OPTION")
    });
    if let Some(i) = found {
        tokens.remove(i + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DatabaseLanguage;
    use crate::dialect::layout::Layout;
    use crate::dialect::lexer::lex;
    use crate::dialect::token::classify;

    fn canonical(sql: &str) -> String {
        let mut tokens = classify(&lex(sql, DatabaseLanguage::Postgres), true);
        canonicalize_query(&mut tokens);
        Layout::new('"').inline(&tokens)
    }

    #[test]
    fn test_join_group_and_predicate_parens() {
        assert_eq!(
            canonical("SELECT a.id, b.name FROM (a JOIN b ON ((a.id = b.aid))) WHERE (a.active = true)"),
            "SELECT \"a\".\"id\", \"b\".\"name\" FROM \"a\" JOIN \"b\" ON \"a\".\"id\" = \"b\".\"aid\" WHERE \"a\".\"active\" = TRUE"
        );
    }

    #[test]
    fn test_nested_join_groups() {
        assert_eq!(
            canonical("SELECT a.id FROM ((a JOIN b ON ((a.id = b.aid))) LEFT JOIN c ON ((c.bid = b.id)))"),
            canonical("SELECT a.id FROM a JOIN b ON a.id = b.aid LEFT JOIN c ON c.bid = b.id")
        );
    }

    #[test]
    fn test_boolean_grouping_is_preserved() {
        let authored = canonical("SELECT id FROM t WHERE (a = 1 OR b = 2) AND c = 3");
        assert_eq!(authored, canonical("SELECT t.id FROM t WHERE (((t.a = 1) OR (t.b = 2)) AND (t.c = 3))"));
        assert!(authored.contains("(\"a\" = 1 OR \"b\" = 2) AND"));

        assert_eq!(
            canonical("SELECT id FROM t WHERE NOT (a = 1 AND b = 2)"),
            "SELECT \"id\" FROM \"t\" WHERE NOT (\"a\" = 1 AND \"b\" = 2)"
        );
    }

    #[test]
    fn test_between_bound_keeps_parens() {
        assert_eq!(
            canonical("SELECT id FROM t WHERE x BETWEEN 1 AND (y = z)"),
            "SELECT \"id\" FROM \"t\" WHERE \"x\" BETWEEN 1 AND (\"y\" = \"z\")"
        );
    }

    #[test]
    fn test_select_list_expression_parens() {
        assert_eq!(
            canonical("SELECT (t.price * 2) AS doubled FROM t"),
            "SELECT \"price\" * 2 AS \"doubled\" FROM \"t\""
        );
        assert_eq!(canonical("SELECT (a).b FROM t"), "SELECT (\"a\").\"b\" FROM \"t\"");
    }

    #[test]
    fn test_single_table_qualifier_and_alias() {
        assert_eq!(
            canonical("SELECT u.id AS id, u.email AS contact FROM users AS u WHERE u.active"),
            "SELECT \"id\", \"email\" AS \"contact\" FROM \"users\" \"u\" WHERE \"active\""
        );
    }

    #[test]
    fn test_qualifiers_kept_across_tables() {
        assert_eq!(
            canonical("SELECT a.id FROM a, b WHERE a.id = b.id"),
            "SELECT \"a\".\"id\" FROM \"a\", \"b\" WHERE \"a\".\"id\" = \"b\".\"id\""
        );
    }

    #[test]
    fn test_subquery_parens_kept() {
        assert_eq!(
            canonical("SELECT id FROM t WHERE id IN (SELECT tid FROM s)"),
            "SELECT \"id\" FROM \"t\" WHERE \"id\" IN (SELECT \"tid\" FROM \"s\")"
        );
    }

    #[test]
    fn test_cascaded_check_option() {
        assert_eq!(
            canonical("SELECT id FROM t WITH CASCADED CHECK OPTION"),
            canonical("SELECT id FROM t WITH CHECK OPTION")
        );
    }

    #[test]
    fn test_view_body_only() {
        let mut tokens = classify(
            &lex("CREATE VIEW v (id) AS SELECT (t.id) FROM t", DatabaseLanguage::Postgres),
            true,
        );
        canonicalize_view(&mut tokens);
        assert_eq!(
            Layout::new('"').inline(&tokens),
            "CREATE VIEW \"v\"(\"id\") AS SELECT \"id\" FROM \"t\""
        );
    }
}
