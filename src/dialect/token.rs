//! Classified tokens.
//!
//! Classification decides, per word, whether it is a keyword (rendered upper
//! case) or an identifier (rendered with the dialect's canonical quote).

use std::collections::HashSet;
use std::sync::OnceLock;

use super::lexer::RawToken;

/// A classified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    /// Upper-cased keyword, type name or built-in function name.
    Keyword(String),
    /// Identifier in its canonical case, unquoted.
    Ident(String),
    /// String literal body in single-quote form.
    Str(String),
    /// Numeric literal.
    Number(String),
    /// Dollar-quoted body.
    Dollar(String),
    /// Variable or positional parameter.
    Param(String),
    /// Punctuation or operator.
    Symbol(String),
}

impl Tok {
    /// Creates a keyword token.
    #[must_use]
    pub fn kw(keyword: &str) -> Self {
        Self::Keyword(keyword.to_string())
    }

    /// Creates a symbol token.
    #[must_use]
    pub fn sym(symbol: &str) -> Self {
        Self::Symbol(symbol.to_string())
    }

    /// Returns true if this is the keyword `keyword`.
    #[must_use]
    pub fn is_kw(&self, keyword: &str) -> bool {
        matches!(self, Self::Keyword(k) if k == keyword)
    }

    /// Returns true if this is one of `keywords`.
    #[must_use]
    pub fn is_any_kw(&self, keywords: &[&str]) -> bool {
        matches!(self, Self::Keyword(k) if keywords.contains(&k.as_str()))
    }

    /// Returns true if this is the symbol `symbol`.
    #[must_use]
    pub fn is_sym(&self, symbol: &str) -> bool {
        matches!(self, Self::Symbol(s) if s == symbol)
    }

    /// Returns the identifier name, if this is an identifier.
    #[must_use]
    pub fn ident(&self) -> Option<&str> {
        match self {
            Self::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the token text without quoting.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Keyword(s)
            | Self::Ident(s)
            | Self::Str(s)
            | Self::Number(s)
            | Self::Dollar(s)
            | Self::Param(s)
            | Self::Symbol(s) => s,
        }
    }
}

/// Words that name SQL syntax, types, or built-ins when unquoted.
const KEYWORDS: &[&str] = &[
    "ACCESSIBLE", "ACTION", "ADD", "AFTER", "AGAINST", "AGGREGATE", "ALGORITHM", "ALL", "ALTER",
    "ALWAYS", "ANALYZE", "AND", "ANY", "ARRAY", "AS", "ASC", "AT", "ATOMIC", "AUTO_INCREMENT",
    "AVG_ROW_LENGTH", "BEFORE", "BEGIN", "BETWEEN", "BIGINT", "BIGSERIAL", "BINARY", "BIT", "BLOB",
    "BOOL", "BOOLEAN", "BOTH", "BTREE", "BY", "BYTEA", "CALL", "CALLED", "CASCADE", "CASCADED",
    "CASE", "CAST", "CHAR", "CHARACTER", "CHARSET", "CHECK", "CHECKSUM", "CLOSE", "COLLATE",
    "COLUMN", "COLUMNS", "COMMENT", "COMMIT", "COMMITTED", "COMPACT", "COMPLETION", "COMPRESSED",
    "CONCURRENTLY", "CONDITION", "CONFLICT", "CONSTRAINT", "CONTAINS", "CONTINUE", "CONVERT",
    "COST", "CREATE", "CROSS", "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP",
    "CURRENT_USER", "CURSOR", "CYCLE", "DATA", "DATE", "DATETIME", "DAY", "DAY_HOUR", "DAY_MINUTE",
    "DAY_SECOND", "DEALLOCATE", "DEC", "DECIMAL", "DECLARE", "DEFAULT", "DEFERRABLE", "DEFERRED",
    "DEFINER", "DELAYED", "DELETE", "DESC", "DETERMINISTIC", "DISABLE", "DISTINCT", "DISTINCTROW",
    "DIV", "DO", "DOUBLE", "DROP", "DUAL", "DUPLICATE", "DYNAMIC", "EACH", "ELSE", "ELSEIF",
    "ELSIF", "ENABLE", "END", "ENDS", "ENGINE", "ENUM", "ESCAPE", "EVENT", "EVERY", "EXCEPT",
    "EXCEPTION", "EXCLUDE", "EXECUTE", "EXISTS", "EXIT", "EXTERNAL", "FALSE", "FETCH", "FILTER",
    "FIRST", "FIXED", "FLOAT", "FLOAT4", "FLOAT8", "FOLLOWING", "FOLLOWS", "FOR", "FORCE",
    "FOREIGN", "FOUND", "FROM", "FULL", "FULLTEXT", "FUNCTION", "GENERATED", "GLOBAL", "GRANT",
    "GROUP", "HANDLER", "HASH", "HAVING", "HOUR", "IDENTITY", "IF", "IGNORE", "ILIKE", "IMMEDIATE",
    "IMMUTABLE", "IN", "INCREMENT", "INDEX", "INHERITS", "INITIALLY", "INNER", "INOUT", "INPUT",
    "INSERT", "INSTEAD", "INT", "INT2", "INT4", "INT8", "INTEGER", "INTERSECT", "INTERVAL", "INTO",
    "INVOKER", "IS", "ISNULL", "ITERATE", "JOIN", "JSON", "JSONB", "KEY", "KEYS", "KEY_BLOCK_SIZE",
    "LANGUAGE", "LAST", "LATERAL", "LEADING", "LEAKPROOF", "LEAVE", "LEFT", "LIKE", "LIMIT",
    "LOCAL", "LOCALTIME", "LOCALTIMESTAMP", "LOCK", "LONGBLOB", "LONGTEXT", "LOOP", "MATCH",
    "MATERIALIZED", "MAXVALUE", "MEDIUMBLOB", "MEDIUMINT", "MEDIUMTEXT", "MERGE", "MICROSECOND",
    "MINUTE", "MINVALUE", "MOD", "MODIFIES", "MONEY", "MONTH", "NATURAL", "NEW", "NEXT", "NO",
    "NONE", "NOT", "NOTHING", "NOTNULL", "NOWAIT", "NULL", "NULLS", "NUMERIC", "OF", "OFFSET",
    "OLD", "ON", "ONLY", "OPEN", "OPTION", "OR", "ORDER", "OTHERS", "OUT", "OUTER", "OUTFILE",
    "OVER", "PARALLEL", "PARTIAL", "PARTITION", "PERFORM", "PLPGSQL", "PRECEDES", "PRECEDING",
    "PRECISION", "PRESERVE", "PRIMARY", "PROCEDURE", "QUARTER", "QUERY", "RAISE", "RANGE", "READ",
    "READS", "REAL", "RECURSIVE", "REDUNDANT", "REFERENCES", "REFERENCING", "REGCLASS", "REGEXP",
    "RELEASE", "RENAME", "REPEAT", "REPEATABLE", "REPLACE", "RESIGNAL", "RESTRICT", "RESTRICTED",
    "RETURN", "RETURNING", "RETURNS", "REVOKE", "RIGHT", "RLIKE", "ROLLBACK", "ROW", "ROWS",
    "ROW_FORMAT", "SAFE", "SCHEDULE", "SCHEMA", "SECOND", "SECURITY", "SELECT", "SEQUENCE",
    "SERIAL", "SERIAL2", "SERIAL4", "SERIAL8", "SESSION", "SET", "SETOF", "SIGNAL", "SIMILAR",
    "SIMPLE", "SMALLINT", "SMALLSERIAL", "SOME", "SPATIAL", "SQL", "SQLEXCEPTION", "SQLSTATE",
    "SQLWARNING", "STABLE", "START", "STARTS", "STATEMENT", "STORED", "STRAIGHT_JOIN", "STRICT",
    "SUPPORT", "TABLE", "TABLESPACE", "TEMP", "TEMPORARY", "TEXT", "THEN", "TIME", "TIMESTAMP",
    "TIMESTAMPTZ", "TIMETZ", "TINYBLOB", "TINYINT", "TINYTEXT", "TO", "TRAILING", "TRANSACTION",
    "TRANSFORM", "TRIGGER", "TRUE", "TRUNCATE", "UNBOUNDED", "UNDEFINED", "UNION", "UNIQUE",
    "UNLOGGED", "UNSAFE", "UNSIGNED", "UNTIL", "UPDATE", "USAGE", "USING", "UUID", "VALUES",
    "VARBINARY", "VARCHAR", "VARIADIC", "VARYING", "VIEW", "VIRTUAL", "VOLATILE", "WEEK", "WHEN",
    "WHERE", "WHILE", "WINDOW", "WITH", "WITHOUT", "XOR", "YEAR", "ZEROFILL", "ZONE",
];

/// Words that stay keywords even right after an identifier-introducing keyword.
const RESERVED: &[&str] = &[
    "AFTER", "ALGORITHM", "ALL", "AND", "AS", "ATOMIC", "BEFORE", "BEGIN", "CALL", "CASCADE",
    "CASE", "CHECK", "COMMIT", "COMPLETION", "CONFLICT", "CONSTRAINT", "COST", "CROSS", "CURRENT",
    "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DECLARE", "DEFAULT", "DEFINER", "DELETE",
    "DISABLE", "DISTINCT", "DO", "DUAL", "DUMPFILE", "DUPLICATE", "EACH", "ENABLE", "END",
    "EXECUTE", "EXISTS", "FOLLOWS", "FOR", "FOREIGN", "FROM", "FULL", "GROUP", "HAVING", "IF",
    "IGNORE", "IMMUTABLE", "IN", "INDEX", "INNER", "INOUT", "INSERT", "INSTEAD", "INTO", "INVOKER",
    "JOIN", "KEY", "LANGUAGE", "LATERAL", "LEFT", "LIMIT", "LOOP", "NATURAL", "NO", "NOT",
    "NOWAIT", "NULL", "OF", "ON", "ONLY", "OR", "ORDER", "OUT", "OUTER", "OUTFILE", "PARALLEL",
    "PRECEDES", "PRIMARY", "REFERENCES", "REPLACE", "RESTRICT", "RETURN", "RETURNS", "RIGHT", "ROW",
    "ROWS", "SCHEDULE", "SECURITY", "SELECT", "SET", "SKIP", "SQL", "STABLE", "STRICT", "TABLE",
    "TABLESPACE", "TEMPORARY", "THEN", "TRUNCATE", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES",
    "VOLATILE", "WHEN", "WHERE", "WITH",
];

/// Keywords after which the next word names an object.
const IDENT_INTRO: &[&str] = &[
    "TABLE", "VIEW", "PROCEDURE", "FUNCTION", "TRIGGER", "EVENT", "KEY", "INDEX", "REFERENCES",
    "CONSTRAINT", "INTO", "FROM", "JOIN", "ON", "EXISTS", "UPDATE", "CALL",
];

/// Options whose value is a keyword even when it looks like a name.
const VALUE_OPTIONS: &[&str] = &["ENGINE", "CHARSET", "COLLATE", "ROW_FORMAT", "ALGORITHM", "LANGUAGE"];

/// Leading words of table elements that are not column definitions.
pub const CONSTRAINT_WORDS: &[&str] = &[
    "PRIMARY", "UNIQUE", "KEY", "INDEX", "CONSTRAINT", "FOREIGN", "CHECK", "FULLTEXT", "SPATIAL",
    "EXCLUDE", "LIKE", "PERIOD",
];

/// Routine parameter modes.
const PARAM_MODES: &[&str] = &["IN", "OUT", "INOUT", "VARIADIC"];

/// Multi-word type names whose first word must not be taken for a parameter name.
const TYPE_LEADERS: &[&str] = &["DOUBLE", "CHARACTER", "TIMESTAMP", "TIME", "BIT", "CHAR", "NATIONAL", "INTERVAL"];

const OBJECT_WORDS: &[&str] = &["TABLE", "VIEW", "FUNCTION", "PROCEDURE", "TRIGGER", "EVENT"];

fn keyword_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| KEYWORDS.iter().chain(RESERVED).copied().collect())
}

/// Returns true if `upper` is a known keyword.
#[must_use]
pub fn is_keyword(upper: &str) -> bool {
    keyword_set().contains(upper)
}

fn is_reserved(upper: &str) -> bool {
    RESERVED.contains(&upper)
}

/// Classifies raw tokens. With `fold_unquoted`, unquoted identifiers are
/// lower-cased.
#[must_use]
pub fn classify(raw: &[RawToken], fold_unquoted: bool) -> Vec<Tok> {
    let forced = structural_identifiers(raw);
    let mut out: Vec<Tok> = Vec::with_capacity(raw.len());

    for (i, token) in raw.iter().enumerate() {
        let tok = match token {
            RawToken::Word(word) => classify_word(word, i, raw, &out, forced.contains(&i), fold_unquoted),
            RawToken::Quoted(name) => Tok::Ident(name.clone()),
            RawToken::Str(body) => Tok::Str(body.clone()),
            RawToken::Number(n) => Tok::Number(n.clone()),
            RawToken::Dollar(body) => Tok::Dollar(body.clone()),
            RawToken::Param(p) => Tok::Param(p.clone()),
            RawToken::Symbol(s) => Tok::Symbol(s.clone()),
        };
        out.push(tok);
    }

    out
}

fn classify_word(word: &str, i: usize, raw: &[RawToken], out: &[Tok], forced: bool, fold: bool) -> Tok {
    let upper = word.to_ascii_uppercase();
    let ident = || {
        Tok::Ident(if fold {
            word.to_ascii_lowercase()
        } else {
            word.to_string()
        })
    };
    let prev = out.last();
    let next = raw.get(i + 1);

    if forced || prev.is_some_and(|t| t.is_sym(".")) || next.is_some_and(|t| t.is_symbol(".")) {
        return ident();
    }
    if prev.is_some_and(|t| t.is_sym("::")) || follows_value_option(out) {
        return Tok::Keyword(upper);
    }
    if prev.is_some_and(|t| t.is_any_kw(IDENT_INTRO)) && !is_reserved(&upper) {
        return ident();
    }
    if next.is_some_and(|t| t.is_symbol("(")) || is_keyword(&upper) {
        return Tok::Keyword(upper);
    }
    ident()
}

fn follows_value_option(out: &[Tok]) -> bool {
    let before_eq = match out {
        [rest @ .., last] if last.is_sym("=") => rest,
        _ => out,
    };
    match before_eq {
        [.., Tok::Keyword(option)] if VALUE_OPTIONS.contains(&option.as_str()) => true,
        [.., Tok::Keyword(c), Tok::Keyword(s)] => c == "CHARACTER" && s == "SET",
        _ => false,
    }
}

/// Finds word positions that must be identifiers because of where they sit:
/// the first word of each table element and each routine parameter name.
fn structural_identifiers(raw: &[RawToken]) -> HashSet<usize> {
    let mut forced = HashSet::new();
    if !raw.first().is_some_and(|t| t.is_word("CREATE")) {
        return forced;
    }

    let object = raw.iter().enumerate().skip(1).find_map(|(i, t)| match t {
        RawToken::Word(w) if OBJECT_WORDS.iter().any(|o| w.eq_ignore_ascii_case(o)) => {
            Some((i, w.to_ascii_uppercase()))
        }
        _ => None,
    });
    let Some((object_index, object)) = object else {
        return forced;
    };
    let is_table = object == "TABLE";
    if !is_table && object != "FUNCTION" && object != "PROCEDURE" {
        return forced;
    }

    let Some(open) = raw
        .iter()
        .skip(object_index)
        .position(|t| t.is_symbol("("))
        .map(|p| p + object_index)
    else {
        return forced;
    };

    let mut depth = 0usize;
    let mut starts = vec![open + 1];
    for (i, token) in raw.iter().enumerate().skip(open + 1) {
        match token {
            RawToken::Symbol(s) if s == "(" => depth += 1,
            RawToken::Symbol(s) if s == ")" => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            RawToken::Symbol(s) if s == "," && depth == 0 => starts.push(i + 1),
            _ => {}
        }
    }

    for start in starts {
        if is_table {
            if let Some(RawToken::Word(w)) = raw.get(start) {
                let upper = w.to_ascii_uppercase();
                if !CONSTRAINT_WORDS.contains(&upper.as_str()) {
                    forced.insert(start);
                }
            }
            continue;
        }

        let mut cursor = start;
        while raw
            .get(cursor)
            .is_some_and(|t| PARAM_MODES.iter().any(|m| t.is_word(m)))
        {
            cursor += 1;
        }
        if let Some(RawToken::Word(w)) = raw.get(cursor) {
            let followed_by_type = matches!(raw.get(cursor + 1), Some(RawToken::Word(_) | RawToken::Quoted(_)));
            let upper = w.to_ascii_uppercase();
            if followed_by_type && !TYPE_LEADERS.contains(&upper.as_str()) {
                forced.insert(cursor);
            }
        }
    }

    forced
}

/// Returns the index of the `)` matching the `(` at `open`.
#[must_use]
pub fn matching_paren(tokens: &[Tok], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if tok.is_sym("(") {
            depth += 1;
        } else if tok.is_sym(")") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Splits `tokens` on `,` at nesting depth zero. Empty segments are dropped.
#[must_use]
pub fn split_top_level(tokens: &[Tok]) -> Vec<Vec<Tok>> {
    let mut parts = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;

    for tok in tokens {
        if tok.is_sym("(") {
            depth += 1;
        } else if tok.is_sym(")") {
            depth = depth.saturating_sub(1);
        } else if tok.is_sym(",") && depth == 0 {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(tok.clone());
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Removes trailing statement terminators.
pub fn strip_terminators(tokens: &mut Vec<Tok>) {
    while tokens
        .last()
        .is_some_and(|t| t.is_sym(";") || t.is_sym("//") || t.is_sym("$$"))
    {
        tokens.pop();
    }
}

/// Removes `OR REPLACE` and `IF NOT EXISTS` from a CREATE header.
pub fn strip_create_modifiers(tokens: &mut Vec<Tok>) {
    if !tokens.first().is_some_and(|t| t.is_kw("CREATE")) {
        return;
    }
    if tokens.get(1).is_some_and(|t| t.is_kw("OR")) && tokens.get(2).is_some_and(|t| t.is_kw("REPLACE")) {
        tokens.drain(1..3);
    }

    let limit = tokens.iter().position(|t| t.is_sym("(")).unwrap_or(tokens.len());
    let found = (1..limit.saturating_sub(2)).find(|&i| {
        tokens[i].is_kw("IF") && tokens[i + 1].is_kw("NOT") && tokens[i + 2].is_kw("EXISTS")
    });
    if let Some(i) = found {
        tokens.drain(i..i + 3);
    }
}

/// Removes every occurrence of the keyword sequence `pattern`.
pub fn remove_sequence(tokens: &mut Vec<Tok>, pattern: &[&str]) {
    let mut i = 0;
    while i + pattern.len() <= tokens.len() {
        if pattern.iter().enumerate().all(|(offset, kw)| tokens[i + offset].is_kw(kw)) {
            tokens.drain(i..i + pattern.len());
        } else {
            i += 1;
        }
    }
}
