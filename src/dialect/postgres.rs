//! `PostgreSQL` normalization rules.

use crate::definition::ResourceType;
use crate::error::Result;

use super::layout::Layout;
use super::lexer::lex;
use super::query::canonicalize_view;
use super::table::{ElementKind, TableParts, element_kind, first_group_idents};
use super::token::{Tok, classify, matching_paren, remove_sequence, split_top_level, strip_create_modifiers, strip_terminators};
use super::{DatabaseLanguage, DialectAdapter, DialectVersion, unsupported};

/// `PostgreSQL` dialect adapter.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    dialect: DialectVersion,
    schema: String,
    layout: Layout,
}

/// Routine clauses in canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ClauseKind {
    Returns,
    Language,
    Volatility,
    Leakproof,
    NullInput,
    Security,
    Parallel,
    Cost,
    Rows,
    Support,
    Set,
    Window,
    Transform,
    Other,
    Body,
}

#[derive(Debug, Clone)]
struct Clause {
    kind: ClauseKind,
    tokens: Vec<Tok>,
}

/// Clauses that restate what `PostgreSQL` assumes when they are omitted.
const DEFAULT_CLAUSES: &[&[&str]] = &[
    &["VOLATILE"],
    &["SECURITY", "INVOKER"],
    &["CALLED", "ON", "NULL", "INPUT"],
    &["PARALLEL", "UNSAFE"],
    &["NOT", "LEAKPROOF"],
    &["COST", "100"],
    &["ROWS", "1000"],
];

/// Foreign key options that restate the defaults.
const DEFAULT_FK_OPTIONS: &[&[&str]] = &[
    &["MATCH", "SIMPLE"],
    &["ON", "DELETE", "NO", "ACTION"],
    &["ON", "UPDATE", "NO", "ACTION"],
    &["NOT", "DEFERRABLE"],
    &["INITIALLY", "IMMEDIATE"],
];

impl PostgresAdapter {
    /// Creates an adapter for `dialect` that treats `schema` as the
    /// implicit qualification of unqualified names.
    #[must_use]
    pub const fn new(dialect: DialectVersion, schema: String) -> Self {
        Self {
            dialect,
            schema,
            layout: Layout::new('"'),
        }
    }

    /// Common token rewrites for statements and routine bodies.
    fn prepare(&self, text: &str) -> Vec<Tok> {
        let mut tokens = classify(&lex(text, DatabaseLanguage::Postgres), true);
        strip_terminators(&mut tokens);
        strip_create_modifiers(&mut tokens);
        self.strip_schema(&mut tokens);
        let mut tokens = map_types(tokens);
        strip_literal_casts(&mut tokens);
        tokens
    }

    /// Removes the implicit schema from qualified names and from sequence
    /// names passed to `nextval`.
    fn strip_schema(&self, tokens: &mut Vec<Tok>) {
        let prefix = format!("{}.", self.schema);
        let mut out: Vec<Tok> = Vec::with_capacity(tokens.len());
        let mut skip_dot = false;

        for (i, tok) in tokens.iter().enumerate() {
            if skip_dot {
                skip_dot = false;
                continue;
            }
            let qualifies = tok.ident() == Some(self.schema.as_str())
                && tokens.get(i + 1).is_some_and(|t| t.is_sym("."))
                && !out.last().is_some_and(|t| t.is_sym("."));
            if qualifies {
                skip_dot = true;
                continue;
            }

            if let Tok::Str(body) = tok {
                if let Some(rest) = body.strip_prefix(prefix.as_str()) {
                    let regclass = tokens.get(i + 1).is_some_and(|t| t.is_sym("::"))
                        && tokens.get(i + 2).is_some_and(|t| t.is_kw("REGCLASS"));
                    let nextval = matches!(out.as_slice(), [.., f, p] if f.is_kw("NEXTVAL") && p.is_sym("("));
                    if regclass || nextval {
                        out.push(Tok::Str(rest.to_string()));
                        continue;
                    }
                }
            }
            out.push(tok.clone());
        }

        *tokens = out;
    }

    fn normalize_table(&self, tokens: Vec<Tok>) -> String {
        let mut table = match TableParts::split(tokens) {
            Ok(table) => table,
            Err(tokens) => return self.layout.statement(&tokens),
        };

        expand_serial(&mut table);
        hoist_inline_constraints(&mut table);
        drop_default_constraint_names(&mut table);
        for element in &mut table.elements {
            match element_kind(element) {
                ElementKind::ForeignKey => {
                    for option in DEFAULT_FK_OPTIONS {
                        remove_sequence(element, option);
                    }
                }
                ElementKind::Check => unwrap_check_parens(element),
                _ => {}
            }
        }
        table.canonicalize_columns(false);
        table.order_elements();

        self.layout.table(&table)
    }

    fn normalize_routine(&self, tokens: Vec<Tok>) -> String {
        let Some(object) = tokens
            .iter()
            .position(|t| t.is_any_kw(&["FUNCTION", "PROCEDURE"]))
        else {
            return self.layout.statement(&tokens);
        };
        let Some(open) = tokens
            .iter()
            .skip(object)
            .position(|t| t.is_sym("("))
            .map(|p| p + object)
        else {
            return self.layout.statement(&tokens);
        };
        let Some(close) = matching_paren(&tokens, open) else {
            return self.layout.statement(&tokens);
        };

        let mut out: Vec<Tok> = tokens[..=open].to_vec();
        for (i, param) in split_top_level(&tokens[open + 1..close]).into_iter().enumerate() {
            if i > 0 {
                out.push(Tok::sym(","));
            }
            // IN is the default parameter mode.
            let mode = usize::from(param.len() > 1 && param[0].is_kw("IN"));
            out.extend(param.into_iter().skip(mode));
        }
        out.push(Tok::sym(")"));

        let mut clauses = split_clauses(&tokens[close + 1..]);
        for clause in &mut clauses {
            canonical_clause(clause);
        }
        clauses.retain(|clause| !is_default_clause(&clause.tokens));

        let language = clauses
            .iter()
            .find(|clause| clause.kind == ClauseKind::Language)
            .and_then(|clause| clause.tokens.get(1))
            .map(|tok| tok.text().to_string());
        for clause in &mut clauses {
            if clause.kind == ClauseKind::Body {
                self.normalize_body(clause, language.as_deref());
            }
        }

        clauses.sort_by_key(|clause| clause.kind);
        for clause in clauses {
            out.extend(clause.tokens);
        }
        self.layout.statement(&out)
    }

    /// Rewrites an `AS '...'` or `AS $$...$$` body as a dollar-quoted body.
    /// SQL and PL/pgSQL bodies are normalized as statements.
    fn normalize_body(&self, clause: &mut Clause, language: Option<&str>) {
        if clause.tokens.len() != 2 || !clause.tokens[0].is_kw("AS") {
            return;
        }
        let body = match &clause.tokens[1] {
            Tok::Dollar(body) => body.clone(),
            Tok::Str(body) => body.replace("''", "'"),
            _ => return,
        };

        let body = if matches!(language, Some("SQL" | "PLPGSQL")) {
            self.layout.statement(&self.prepare(&body))
        } else {
            body.trim().to_string()
        };
        clause.tokens[1] = Tok::Dollar(body);
    }
}

impl DialectAdapter for PostgresAdapter {
    fn language(&self) -> DatabaseLanguage {
        DatabaseLanguage::Postgres
    }

    fn dialect(&self) -> &DialectVersion {
        &self.dialect
    }

    fn supports(&self, resource_type: ResourceType) -> bool {
        match resource_type {
            ResourceType::Event => false,
            ResourceType::Procedure => self.dialect.at_least(11, 0),
            _ => true,
        }
    }

    fn normalize(&self, resource_type: ResourceType, raw: &str) -> Result<String> {
        if !self.supports(resource_type) {
            return Err(unsupported(self, resource_type));
        }

        let mut tokens = self.prepare(raw);
        let text = match resource_type {
            ResourceType::Table => self.normalize_table(tokens),
            ResourceType::Function | ResourceType::Procedure => self.normalize_routine(tokens),
            ResourceType::Trigger => {
                if self.dialect.at_least(11, 0) {
                    for i in 1..tokens.len() {
                        if tokens[i - 1].is_kw("EXECUTE") && tokens[i].is_kw("PROCEDURE") {
                            tokens[i] = Tok::kw("FUNCTION");
                        }
                    }
                }
                self.layout.statement(&tokens)
            }
            ResourceType::View => {
                canonicalize_view(&mut tokens);
                self.layout.statement(&tokens)
            }
            ResourceType::MaterializedView => {
                if matches!(tokens.as_slice(), [.., with, data] if with.is_kw("WITH") && data.is_kw("DATA")) {
                    tokens.truncate(tokens.len() - 2);
                }
                canonicalize_view(&mut tokens);
                self.layout.statement(&tokens)
            }
            _ => self.layout.statement(&tokens),
        };
        Ok(text)
    }
}

fn map_types(tokens: Vec<Tok>) -> Vec<Tok> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let Tok::Keyword(word) = &tokens[i] else {
            out.push(tokens[i].clone());
            i += 1;
            continue;
        };
        let next = tokens.get(i + 1);
        match word.as_str() {
            "INT" | "INT4" => out.push(Tok::kw("INTEGER")),
            "INT8" => out.push(Tok::kw("BIGINT")),
            "INT2" => out.push(Tok::kw("SMALLINT")),
            "BOOL" => out.push(Tok::kw("BOOLEAN")),
            "FLOAT4" => out.push(Tok::kw("REAL")),
            "DECIMAL" => out.push(Tok::kw("NUMERIC")),
            "FLOAT8" => out.extend([Tok::kw("DOUBLE"), Tok::kw("PRECISION")]),
            "CHARACTER" if next.is_some_and(|t| t.is_kw("VARYING")) => {
                out.push(Tok::kw("VARCHAR"));
                i += 1;
            }
            "CHARACTER" if !next.is_some_and(|t| t.is_kw("SET")) => out.push(Tok::kw("CHAR")),
            "TIMESTAMP" | "TIME" => {
                i = map_time_zone(&tokens, i, &mut out);
                continue;
            }
            _ => out.push(tokens[i].clone()),
        }
        i += 1;
    }

    out
}

/// Folds `TIMESTAMP [(p)] WITH TIME ZONE` into `TIMESTAMPTZ [(p)]` (and the
/// `TIME` equivalent). Returns the index after the consumed tokens.
fn map_time_zone(tokens: &[Tok], i: usize, out: &mut Vec<Tok>) -> usize {
    let base = tokens[i].text().to_string();
    let precision_end = if tokens.get(i + 1).is_some_and(|t| t.is_sym("(")) {
        matching_paren(tokens, i + 1).map_or(i + 1, |close| close + 1)
    } else {
        i + 1
    };

    let zone = tokens.get(precision_end..precision_end + 3);
    let with_zone = match zone {
        Some([w, t, z]) if t.is_kw("TIME") && z.is_kw("ZONE") => {
            if w.is_kw("WITH") {
                Some(true)
            } else if w.is_kw("WITHOUT") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    };

    match with_zone {
        Some(with_zone) => {
            out.push(Tok::Keyword(if with_zone { format!("{base}TZ") } else { base }));
            out.extend_from_slice(&tokens[i + 1..precision_end]);
            precision_end + 3
        }
        None => {
            out.push(tokens[i].clone());
            i + 1
        }
    }
}

/// Removes `::type` casts applied to string literals.
fn strip_literal_casts(tokens: &mut Vec<Tok>) {
    let mut i = 0;
    while i < tokens.len() {
        if matches!(tokens[i], Tok::Str(_)) {
            while tokens.get(i + 1).is_some_and(|t| t.is_sym("::")) {
                let end = cast_type_end(tokens, i + 2);
                tokens.drain(i + 1..end);
            }
        }
        i += 1;
    }
}

fn cast_type_end(tokens: &[Tok], start: usize) -> usize {
    let mut j = start;
    if !matches!(tokens.get(j), Some(Tok::Keyword(_) | Tok::Ident(_))) {
        return j;
    }
    j += 1;
    while tokens.get(j).is_some_and(|t| t.is_sym("."))
        && matches!(tokens.get(j + 1), Some(Tok::Keyword(_) | Tok::Ident(_)))
    {
        j += 2;
    }
    if tokens[j - 1].is_kw("DOUBLE") && tokens.get(j).is_some_and(|t| t.is_kw("PRECISION")) {
        j += 1;
    }
    if tokens.get(j).is_some_and(|t| t.is_sym("(")) {
        if let Some(close) = matching_paren(tokens, j) {
            j = close + 1;
        }
    }
    while tokens.get(j).is_some_and(|t| t.is_sym("[")) && tokens.get(j + 1).is_some_and(|t| t.is_sym("]")) {
        j += 2;
    }
    j
}

/// Expands `serial` pseudo-types into the column they stand for.
fn expand_serial(table: &mut TableParts) {
    let Some(table_name) = table.table_name().map(str::to_string) else {
        return;
    };

    for element in &mut table.elements {
        if element_kind(element) != ElementKind::Column {
            continue;
        }
        let Some(column) = element.first().and_then(Tok::ident).map(str::to_string) else {
            continue;
        };
        let base = match element.get(1) {
            Some(t) if t.is_any_kw(&["SERIAL", "SERIAL4"]) => "INTEGER",
            Some(t) if t.is_any_kw(&["BIGSERIAL", "SERIAL8"]) => "BIGINT",
            Some(t) if t.is_any_kw(&["SMALLSERIAL", "SERIAL2"]) => "SMALLINT",
            _ => continue,
        };
        element.splice(
            1..2,
            [
                Tok::kw(base),
                Tok::kw("DEFAULT"),
                Tok::kw("NEXTVAL"),
                Tok::sym("("),
                Tok::Str(format!("{table_name}_{column}_seq")),
                Tok::sym(")"),
                Tok::kw("NOT"),
                Tok::kw("NULL"),
            ],
        );
    }
}

/// Moves column constraints (`PRIMARY KEY`, `UNIQUE`, `CHECK`, `REFERENCES`)
/// to table-level elements.
fn hoist_inline_constraints(table: &mut TableParts) {
    let mut hoisted = Vec::new();

    for element in &mut table.elements {
        if element_kind(element) != ElementKind::Column {
            continue;
        }
        let Some(column) = element.first().cloned() else {
            continue;
        };

        let mut kept = Vec::with_capacity(element.len());
        let mut depth = 0usize;
        let mut i = 0;
        while i < element.len() {
            if depth == 0 {
                if let Some((end, constraint)) = inline_constraint(element, i, &column) {
                    hoisted.push(constraint);
                    i = end;
                    continue;
                }
            }
            let tok = &element[i];
            if tok.is_sym("(") {
                depth += 1;
            } else if tok.is_sym(")") {
                depth = depth.saturating_sub(1);
            }
            kept.push(tok.clone());
            i += 1;
        }
        *element = kept;
    }

    table.elements.extend(hoisted);
}

fn inline_constraint(element: &[Tok], start: usize, column: &Tok) -> Option<(usize, Vec<Tok>)> {
    let mut i = start;
    let mut constraint = Vec::new();
    if element[i].is_kw("CONSTRAINT") {
        let name = element.get(i + 1).filter(|t| matches!(t, Tok::Ident(_)))?;
        constraint.extend([Tok::kw("CONSTRAINT"), name.clone()]);
        i += 2;
    }

    let columns = [Tok::sym("("), column.clone(), Tok::sym(")")];
    let tok = element.get(i)?;
    let end = if tok.is_kw("PRIMARY") && element.get(i + 1).is_some_and(|t| t.is_kw("KEY")) {
        constraint.extend([Tok::kw("PRIMARY"), Tok::kw("KEY")]);
        constraint.extend(columns);
        i + 2
    } else if tok.is_kw("UNIQUE") {
        constraint.push(Tok::kw("UNIQUE"));
        constraint.extend(columns);
        i + 1
    } else if tok.is_kw("CHECK") && element.get(i + 1).is_some_and(|t| t.is_sym("(")) {
        let close = matching_paren(element, i + 1)?;
        constraint.extend_from_slice(&element[i..=close]);
        close + 1
    } else if tok.is_kw("REFERENCES") {
        let end = references_end(element, i);
        constraint.extend([Tok::kw("FOREIGN"), Tok::kw("KEY")]);
        constraint.extend(columns);
        constraint.extend_from_slice(&element[i..end]);
        end
    } else {
        return None;
    };

    Some((end, constraint))
}

/// Index after a `REFERENCES target [(cols)] [options...]` clause.
fn references_end(element: &[Tok], start: usize) -> usize {
    let mut j = start + 1;
    if matches!(element.get(j), Some(Tok::Ident(_))) {
        j += 1;
        while element.get(j).is_some_and(|t| t.is_sym(".")) && matches!(element.get(j + 1), Some(Tok::Ident(_))) {
            j += 2;
        }
    }
    if element.get(j).is_some_and(|t| t.is_sym("(")) {
        j = matching_paren(element, j).map_or(element.len(), |close| close + 1);
    }

    loop {
        let Some(tok) = element.get(j) else {
            break;
        };
        let next = element.get(j + 1);
        if tok.is_kw("MATCH") || tok.is_kw("INITIALLY") {
            j += 2;
        } else if tok.is_kw("ON") && next.is_some_and(|t| t.is_any_kw(&["DELETE", "UPDATE"])) {
            j += 2;
            j += if element.get(j).is_some_and(|t| t.is_any_kw(&["NO", "SET"])) {
                2
            } else {
                1
            };
        } else if tok.is_kw("NOT") && next.is_some_and(|t| t.is_kw("DEFERRABLE")) {
            j += 2;
        } else if tok.is_kw("DEFERRABLE") {
            j += 1;
        } else {
            break;
        }
    }

    j.min(element.len())
}

/// Drops constraint names that match the name `PostgreSQL` generates.
fn drop_default_constraint_names(table: &mut TableParts) {
    let Some(table_name) = table.table_name().map(str::to_string) else {
        return;
    };

    for element in &mut table.elements {
        if !element.first().is_some_and(|t| t.is_kw("CONSTRAINT")) {
            continue;
        }
        let Some(name) = element.get(1).and_then(Tok::ident) else {
            continue;
        };
        let columns = first_group_idents(element).join("_");
        let generated = match element_kind(element) {
            ElementKind::PrimaryKey => name == format!("{table_name}_pkey"),
            ElementKind::Unique => name == format!("{table_name}_{columns}_key"),
            ElementKind::ForeignKey => name == format!("{table_name}_{columns}_fkey"),
            ElementKind::Check => match check_columns(element).as_slice() {
                [column] => name == format!("{table_name}_{column}_check"),
                _ => name == format!("{table_name}_check"),
            },
            _ => false,
        };
        if generated {
            element.drain(0..2);
        }
    }
}

/// Distinct columns referenced by a CHECK expression, in order of appearance.
///
/// Qualifiers and function names are not columns.
fn check_columns(element: &[Tok]) -> Vec<String> {
    let Some(check) = element.iter().position(|t| t.is_kw("CHECK")) else {
        return Vec::new();
    };
    let open = check + 1;
    let Some(close) = element.get(open).filter(|t| t.is_sym("(")).and_then(|_| matching_paren(element, open)) else {
        return Vec::new();
    };

    let mut columns: Vec<String> = Vec::new();
    for (i, tok) in element.iter().enumerate().take(close).skip(open + 1) {
        let Some(name) = tok.ident() else {
            continue;
        };
        let next = element.get(i + 1);
        if next.is_some_and(|t| t.is_sym(".") || t.is_sym("(")) {
            continue;
        }
        if !columns.iter().any(|c| c == name) {
            columns.push(name.to_string());
        }
    }
    columns
}

/// `CHECK ((expr))` becomes `CHECK (expr)`.
fn unwrap_check_parens(element: &mut Vec<Tok>) {
    let Some(check) = element.iter().position(|t| t.is_kw("CHECK")) else {
        return;
    };
    let open = check + 1;
    while element.get(open).is_some_and(|t| t.is_sym("(")) && element.get(open + 1).is_some_and(|t| t.is_sym("(")) {
        let Some(close) = matching_paren(element, open) else {
            return;
        };
        if matching_paren(element, open + 1) != Some(close - 1) {
            return;
        }
        element.remove(close - 1);
        element.remove(open + 1);
    }
}

fn clause_kind(tokens: &[Tok], i: usize) -> Option<ClauseKind> {
    let Tok::Keyword(word) = &tokens[i] else {
        return None;
    };
    let next = tokens.get(i + 1);
    let kind = match word.as_str() {
        "RETURNS" if next.is_some_and(|t| t.is_kw("NULL")) => ClauseKind::NullInput,
        "RETURNS" => ClauseKind::Returns,
        "LANGUAGE" => ClauseKind::Language,
        "IMMUTABLE" | "STABLE" | "VOLATILE" => ClauseKind::Volatility,
        "LEAKPROOF" => ClauseKind::Leakproof,
        "NOT" if next.is_some_and(|t| t.is_kw("LEAKPROOF")) => ClauseKind::Leakproof,
        "CALLED" | "STRICT" => ClauseKind::NullInput,
        "SECURITY" => ClauseKind::Security,
        "EXTERNAL" if next.is_some_and(|t| t.is_kw("SECURITY")) => ClauseKind::Security,
        "PARALLEL" => ClauseKind::Parallel,
        "COST" => ClauseKind::Cost,
        "ROWS" => ClauseKind::Rows,
        "SUPPORT" => ClauseKind::Support,
        "SET" => ClauseKind::Set,
        "WINDOW" => ClauseKind::Window,
        "TRANSFORM" => ClauseKind::Transform,
        "AS" | "RETURN" | "BEGIN" => ClauseKind::Body,
        _ => return None,
    };
    Some(kind)
}

/// Splits the tokens after a routine's parameter list into clauses.
fn split_clauses(tokens: &[Tok]) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let start = i;
        let kind = clause_kind(tokens, i).unwrap_or(ClauseKind::Other);
        i += 1;

        if kind == ClauseKind::Body && tokens[start].is_kw("AS") {
            // AS 'definition' [, 'link symbol']
            i = (start + 2).min(tokens.len());
            if tokens.get(i).is_some_and(|t| t.is_sym(",")) {
                i = (i + 2).min(tokens.len());
            }
        } else if kind == ClauseKind::Body {
            i = tokens.len();
        } else {
            let mut depth = 0usize;
            while i < tokens.len() {
                let tok = &tokens[i];
                if depth == 0 && clause_kind(tokens, i).is_some() {
                    break;
                }
                if tok.is_sym("(") {
                    depth += 1;
                } else if tok.is_sym(")") {
                    depth = depth.saturating_sub(1);
                }
                i += 1;
            }
        }

        clauses.push(Clause {
            kind,
            tokens: tokens[start..i].to_vec(),
        });
    }

    clauses
}

fn canonical_clause(clause: &mut Clause) {
    match clause.kind {
        ClauseKind::Language => {
            if let Some(value) = clause.tokens.get_mut(1) {
                if matches!(value, Tok::Str(_) | Tok::Ident(_)) {
                    *value = Tok::Keyword(value.text().to_ascii_uppercase());
                }
            }
        }
        ClauseKind::NullInput if clause.tokens.first().is_some_and(|t| t.is_kw("RETURNS")) => {
            clause.tokens = vec![Tok::kw("STRICT")];
        }
        ClauseKind::Security if clause.tokens.first().is_some_and(|t| t.is_kw("EXTERNAL")) => {
            clause.tokens.remove(0);
        }
        _ => {}
    }
}

fn is_default_clause(tokens: &[Tok]) -> bool {
    DEFAULT_CLAUSES.iter().any(|default| {
        default.len() == tokens.len() && default.iter().zip(tokens).all(|(word, tok)| tok.text() == *word)
    })
}
