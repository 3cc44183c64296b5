//! Table body model shared by both dialects.

use super::token::{matching_paren, split_top_level, Tok};

/// What a table element declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElementKind {
    /// A column definition.
    Column,
    /// A primary key constraint.
    PrimaryKey,
    /// A unique constraint or unique index.
    Unique,
    /// A plain index.
    Key,
    /// A fulltext or spatial index.
    Fulltext,
    /// A foreign key constraint.
    ForeignKey,
    /// A check constraint.
    Check,
    /// Anything else (`LIKE`, `EXCLUDE`, ...).
    Other,
}

/// A `CREATE TABLE` statement split into header, elements and trailing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableParts {
    /// Tokens before the element list.
    pub head: Vec<Tok>,
    /// Column and constraint definitions.
    pub elements: Vec<Vec<Tok>>,
    /// Table options after the element list.
    pub tail: Vec<Tok>,
}

impl TableParts {
    /// Splits a table statement. Returns the tokens unchanged when the
    /// statement has no element list (`CREATE TABLE ... AS SELECT`).
    ///
    /// # Errors
    ///
    /// Returns the original tokens if they do not form a table with an element list.
    pub fn split(tokens: Vec<Tok>) -> Result<Self, Vec<Tok>> {
        let Some(table_kw) = tokens.iter().position(|t| t.is_kw("TABLE")) else {
            return Err(tokens);
        };
        let Some(open) = tokens
            .iter()
            .skip(table_kw)
            .position(|t| t.is_sym("("))
            .map(|p| p + table_kw)
        else {
            return Err(tokens);
        };
        let name_only = tokens[table_kw + 1..open]
            .iter()
            .all(|t| matches!(t, Tok::Ident(_)) || t.is_sym("."));
        if !name_only || open == table_kw + 1 {
            return Err(tokens);
        }
        let Some(close) = matching_paren(&tokens, open) else {
            return Err(tokens);
        };

        let elements = split_top_level(&tokens[open + 1..close]);
        let tail = tokens[close + 1..].to_vec();
        let mut head = tokens;
        head.truncate(open);

        Ok(Self { head, elements, tail })
    }

    /// Returns the unqualified table name.
    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        self.head.iter().rev().find_map(Tok::ident)
    }

    /// Returns the columns named by the table-level primary key.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<String> {
        self.elements
            .iter()
            .filter(|element| element_kind(element) == ElementKind::PrimaryKey)
            .flat_map(|element| first_group_idents(element))
            .collect()
    }

    /// Canonicalizes column attributes: `NOT NULL` moves to the end of its
    /// column, the redundant bare `NULL` attribute is dropped, and primary
    /// key columns carry `NOT NULL`.
    pub fn canonicalize_columns(&mut self, case_insensitive: bool) {
        let primary_key = self.primary_key_columns();
        let in_primary_key = |name: &str| {
            primary_key.iter().any(|pk| {
                if case_insensitive {
                    pk.eq_ignore_ascii_case(name)
                } else {
                    pk == name
                }
            })
        };

        for element in &mut self.elements {
            if element_kind(element) != ElementKind::Column {
                continue;
            }
            let name = element.first().and_then(Tok::ident).map(str::to_string);

            let mut not_null = false;
            let mut out: Vec<Tok> = Vec::with_capacity(element.len() + 2);
            let mut depth = 0usize;
            let mut i = 0;
            while i < element.len() {
                let tok = &element[i];
                if depth == 0 && tok.is_kw("NOT") && element.get(i + 1).is_some_and(|t| t.is_kw("NULL")) {
                    not_null = true;
                    i += 2;
                    continue;
                }
                if depth == 0 && tok.is_kw("NULL") && is_null_attribute(out.last()) {
                    i += 1;
                    continue;
                }
                if tok.is_sym("(") {
                    depth += 1;
                } else if tok.is_sym(")") {
                    depth = depth.saturating_sub(1);
                }
                out.push(tok.clone());
                i += 1;
            }

            if not_null || name.as_deref().is_some_and(in_primary_key) {
                out.push(Tok::kw("NOT"));
                out.push(Tok::kw("NULL"));
            }
            *element = out;
        }
    }

    /// Orders elements: columns first in declaration order, then constraints
    /// grouped by kind, keeping declaration order within a kind.
    pub fn order_elements(&mut self) {
        self.elements.sort_by_key(|element| element_kind(element));
    }
}

/// A bare `NULL` is a column attribute unless it is the operand of
/// `DEFAULT`, `IS`, `SET` or an expression.
fn is_null_attribute(prev: Option<&Tok>) -> bool {
    match prev {
        Some(Tok::Keyword(k)) => !matches!(k.as_str(), "DEFAULT" | "IS" | "NOT" | "SET" | "THEN" | "ELSE"),
        Some(Tok::Symbol(s)) => s == ")",
        Some(_) => true,
        None => false,
    }
}

/// Classifies a table element by its leading tokens.
#[must_use]
pub fn element_kind(element: &[Tok]) -> ElementKind {
    let mut rest = element;
    if rest.first().is_some_and(|t| t.is_kw("CONSTRAINT")) {
        rest = &rest[1..];
        if rest.first().is_some_and(|t| matches!(t, Tok::Ident(_))) {
            rest = &rest[1..];
        }
    }

    match rest.first() {
        Some(Tok::Ident(_)) if !element.first().is_some_and(|t| t.is_kw("CONSTRAINT")) => ElementKind::Column,
        Some(Tok::Keyword(k)) => match k.as_str() {
            "PRIMARY" => ElementKind::PrimaryKey,
            "UNIQUE" => ElementKind::Unique,
            "KEY" | "INDEX" => ElementKind::Key,
            "FULLTEXT" | "SPATIAL" => ElementKind::Fulltext,
            "FOREIGN" => ElementKind::ForeignKey,
            "CHECK" => ElementKind::Check,
            _ => ElementKind::Other,
        },
        _ => ElementKind::Other,
    }
}

/// Identifiers at the top level of the first parenthesized group.
#[must_use]
pub fn first_group_idents(tokens: &[Tok]) -> Vec<String> {
    let Some(open) = tokens.iter().position(|t| t.is_sym("(")) else {
        return Vec::new();
    };
    let close = matching_paren(tokens, open).unwrap_or(tokens.len());

    let mut depth = 0usize;
    let mut names = Vec::new();
    for tok in &tokens[open + 1..close] {
        match tok {
            Tok::Symbol(s) if s == "(" => depth += 1,
            Tok::Symbol(s) if s == ")" => depth = depth.saturating_sub(1),
            Tok::Ident(name) if depth == 0 => names.push(name.clone()),
            _ => {}
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DatabaseLanguage;
    use crate::dialect::lexer::lex;
    use crate::dialect::token::classify;

    fn parts(sql: &str) -> TableParts {
        let toks = classify(&lex(sql, DatabaseLanguage::Mysql), false);
        TableParts::split(toks).expect("table should split")
    }

    #[test]
    fn test_split_table() {
        let table = parts("CREATE TABLE t (id INT, name VARCHAR(10), PRIMARY KEY (id)) ENGINE=InnoDB");
        assert_eq!(table.table_name(), Some("t"));
        assert_eq!(table.elements.len(), 3);
        assert_eq!(table.tail.len(), 3);
        assert_eq!(element_kind(&table.elements[2]), ElementKind::PrimaryKey);
        assert_eq!(table.primary_key_columns(), vec![String::from("id")]);
    }

    #[test]
    fn test_table_without_element_list() {
        let toks = classify(&lex("CREATE TABLE t AS SELECT 1", DatabaseLanguage::Mysql), false);
        assert!(TableParts::split(toks).is_err());
    }

    #[test]
    fn test_not_null_moves_to_end() {
        let mut table = parts("CREATE TABLE t (id INT NOT NULL AUTO_INCREMENT, note TEXT NULL, PRIMARY KEY (id))");
        table.canonicalize_columns(true);
        assert_eq!(
            table.elements[0],
            vec![
                Tok::Ident(String::from("id")),
                Tok::kw("INT"),
                Tok::kw("AUTO_INCREMENT"),
                Tok::kw("NOT"),
                Tok::kw("NULL"),
            ]
        );
        assert_eq!(table.elements[1].len(), 2);
    }

    #[test]
    fn test_primary_key_columns_get_not_null() {
        let mut table = parts("CREATE TABLE t (ID INT, PRIMARY KEY (`id`))");
        table.canonicalize_columns(true);
        assert!(table.elements[0].ends_with(&[Tok::kw("NOT"), Tok::kw("NULL")]));
    }

    #[test]
    fn test_order_elements() {
        let mut table = parts("CREATE TABLE t (a INT, KEY k (a), PRIMARY KEY (a), b INT)");
        table.order_elements();
        let kinds: Vec<ElementKind> = table.elements.iter().map(|e| element_kind(e)).collect();
        assert_eq!(
            kinds,
            vec![ElementKind::Column, ElementKind::Column, ElementKind::PrimaryKey, ElementKind::Key]
        );
    }
}
