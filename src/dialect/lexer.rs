//! Tokenizer for DDL text.
//!
//! The lexer only separates the input into tokens; it never decides whether a
//! word is a keyword or an identifier. Comments are dropped, `MySQL`
//! versioned comments are unwrapped and `DELIMITER` directives are consumed.
//! Unterminated literals run to the end of the input.

use super::DatabaseLanguage;

/// A lexical token before keyword/identifier classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawToken {
    /// Bare word (keyword or unquoted identifier).
    Word(String),
    /// Quoted identifier, unescaped.
    Quoted(String),
    /// String literal body in single-quote form (doubled quotes kept).
    Str(String),
    /// Numeric literal.
    Number(String),
    /// Postgres dollar-quoted body, without its tags.
    Dollar(String),
    /// Session variable or positional parameter (`@v`, `@@v`, `$1`).
    Param(String),
    /// Punctuation or operator.
    Symbol(String),
}

impl RawToken {
    /// Returns true if this is a word equal to `keyword`, ignoring case.
    #[must_use]
    pub fn is_word(&self, keyword: &str) -> bool {
        matches!(self, Self::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    /// Returns true if this is the symbol `symbol`.
    #[must_use]
    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self, Self::Symbol(s) if s == symbol)
    }
}

/// Multi-character operators, longest first.
const OPERATORS: [&str; 22] = [
    "->>", "<=>", "#>>", "!~*", "::", ":=", "<=", ">=", "<>", "!=", "||", "&&", "->", "//", "<<",
    ">>", "#>", "@>", "<@", "~*", "!~", "$$",
];

/// Splits `input` into raw tokens using the lexical rules of `language`.
#[must_use]
pub fn lex(input: &str, language: DatabaseLanguage) -> Vec<RawToken> {
    Lexer::new(input, language).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    language: DatabaseLanguage,
    tokens: Vec<RawToken>,
    delimiter: Option<Vec<char>>,
    versioned_depth: usize,
    line_start: bool,
}

impl Lexer {
    fn new(input: &str, language: DatabaseLanguage) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            language,
            tokens: Vec::new(),
            delimiter: None,
            versioned_depth: 0,
            line_start: true,
        }
    }

    const fn is_mysql(&self) -> bool {
        matches!(self.language, DatabaseLanguage::Mysql)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, pattern: &[char]) -> bool {
        self.chars
            .get(self.pos..self.pos + pattern.len())
            .is_some_and(|slice| slice == pattern)
    }

    fn starts_with_word_ci(&self, word: &str) -> bool {
        let len = word.chars().count();
        let matches = self
            .chars
            .get(self.pos..self.pos + len)
            .is_some_and(|slice| slice.iter().copied().zip(word.chars()).all(|(a, b)| a.eq_ignore_ascii_case(&b)));
        matches && self.peek(len).is_none_or(char::is_whitespace)
    }

    fn run(mut self) -> Vec<RawToken> {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                self.pos += 1;
                self.line_start = true;
                continue;
            }
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            if self.line_start && self.is_mysql() && self.starts_with_word_ci("DELIMITER") {
                self.read_delimiter_directive();
                continue;
            }
            self.line_start = false;

            if let Some(len) = self.delimiter_at_pos() {
                self.pos += len;
                self.tokens.push(RawToken::Symbol(String::from(";")));
                continue;
            }
            if self.skip_comment() {
                continue;
            }
            self.read_token(c);
        }
        self.tokens
    }

    fn delimiter_at_pos(&self) -> Option<usize> {
        self.delimiter
            .as_ref()
            .filter(|delimiter| self.starts_with(delimiter))
            .map(Vec::len)
    }

    fn read_delimiter_directive(&mut self) {
        self.pos += "DELIMITER".len();
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
        let value: String = self.chars[start..self.pos].iter().collect();
        let value = value.trim();
        self.delimiter = if value.is_empty() || value == ";" {
            None
        } else {
            Some(value.chars().collect())
        };
    }

    fn skip_line(&mut self) {
        while self.peek(0).is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn skip_comment(&mut self) -> bool {
        match (self.peek(0), self.peek(1)) {
            (Some('-'), Some('-')) if !self.is_mysql() || self.peek(2).is_none_or(char::is_whitespace) => {
                self.skip_line();
                true
            }
            (Some('#'), _) if self.is_mysql() => {
                self.skip_line();
                true
            }
            (Some('/'), Some('*')) => {
                if self.is_mysql() && self.peek(2) == Some('!') {
                    self.pos += 3;
                    while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    self.versioned_depth += 1;
                    return true;
                }
                self.skip_block_comment();
                true
            }
            (Some('*'), Some('/')) if self.versioned_depth > 0 => {
                self.versioned_depth -= 1;
                self.pos += 2;
                true
            }
            _ => false,
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        let mut depth = 1usize;
        while depth > 0 && self.pos < self.chars.len() {
            match (self.peek(0), self.peek(1)) {
                (Some('/'), Some('*')) if !self.is_mysql() => {
                    depth += 1;
                    self.pos += 2;
                }
                (Some('*'), Some('/')) => {
                    depth -= 1;
                    self.pos += 2;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn read_token(&mut self, c: char) {
        match c {
            '\'' => {
                let body = self.read_quoted('\'', self.is_mysql());
                self.tokens.push(RawToken::Str(body));
            }
            '"' if self.is_mysql() => {
                let body = self.read_quoted('"', true);
                let body = body.replace("\"\"", "\"").replace('\'', "''");
                self.tokens.push(RawToken::Str(body));
            }
            '"' => {
                let body = self.read_quoted('"', false);
                self.tokens.push(RawToken::Quoted(body.replace("\"\"", "\"")));
            }
            '`' => {
                let body = self.read_quoted('`', false);
                self.tokens.push(RawToken::Quoted(body.replace("``", "`")));
            }
            '$' if !self.is_mysql() => self.read_dollar(),
            '@' if self.is_mysql() => self.read_variable(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_word(),
            _ => self.read_symbol(),
        }
    }

    /// Reads a quoted run starting at the opening quote, returning the raw body.
    fn read_quoted(&mut self, quote: char, backslash_escapes: bool) -> String {
        self.pos += 1;
        let mut body = String::new();
        while let Some(c) = self.peek(0) {
            if backslash_escapes && c == '\\' {
                body.push(c);
                if let Some(next) = self.peek(1) {
                    body.push(next);
                }
                self.pos += 2;
                continue;
            }
            if c == quote {
                if self.peek(1) == Some(quote) {
                    body.push(quote);
                    body.push(quote);
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                return body;
            }
            body.push(c);
            self.pos += 1;
        }
        body
    }

    fn read_dollar(&mut self) {
        if self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            let start = self.pos;
            self.pos += 1;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            let text: String = self.chars[start..self.pos].iter().collect();
            self.tokens.push(RawToken::Param(text));
            return;
        }

        let mut end = self.pos + 1;
        while self
            .chars
            .get(end)
            .is_some_and(|c| c.is_alphanumeric() || *c == '_')
        {
            end += 1;
        }
        if self.chars.get(end) != Some(&'$') {
            self.pos += 1;
            self.tokens.push(RawToken::Symbol(String::from("$")));
            return;
        }

        let tag: Vec<char> = self.chars[self.pos..=end].to_vec();
        let body_start = end + 1;
        let mut cursor = body_start;
        let close = loop {
            if cursor + tag.len() > self.chars.len() {
                break None;
            }
            if self.chars[cursor..cursor + tag.len()] == tag[..] {
                break Some(cursor);
            }
            cursor += 1;
        };

        let body_end = close.unwrap_or(self.chars.len());
        let body: String = self.chars[body_start.min(body_end)..body_end].iter().collect();
        self.pos = close.map_or(self.chars.len(), |c| c + tag.len());
        self.tokens.push(RawToken::Dollar(body));
    }

    fn read_variable(&mut self) {
        let start = self.pos;
        let mut cursor = self.pos + 1;
        if self.chars.get(cursor) == Some(&'@') {
            cursor += 1;
        }
        let name_start = cursor;
        while self
            .chars
            .get(cursor)
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '$'))
        {
            cursor += 1;
        }
        if cursor == name_start {
            self.pos += 1;
            self.tokens.push(RawToken::Symbol(String::from("@")));
            return;
        }
        self.pos = cursor;
        let text: String = self.chars[start..cursor].iter().collect();
        self.tokens.push(RawToken::Param(text));
    }

    fn read_number(&mut self) {
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek(0) == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), Some('e' | 'E'))
            && (self.peek(1).is_some_and(|c| c.is_ascii_digit())
                || (matches!(self.peek(1), Some('+' | '-')) && self.peek(2).is_some_and(|c| c.is_ascii_digit())))
        {
            self.pos += 2;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        while self.peek(0).is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(RawToken::Number(text));
    }

    fn read_word(&mut self) {
        let start = self.pos;
        let dollar_in_words = !self.is_mysql();
        while self
            .peek(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || (dollar_in_words && c == '$'))
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        // Escape strings (`E'it\'s'`) are kept in standard quoting.
        if !self.is_mysql() && word.eq_ignore_ascii_case("e") && self.peek(0) == Some('\'') {
            let body = self.read_quoted('\'', true);
            self.tokens.push(RawToken::Str(unescape_escape_string(&body)));
            return;
        }

        // Character set introducers (`_utf8mb4'text'`) carry no meaning for comparison.
        if self.is_mysql() && word.len() > 1 && word.starts_with('_') && self.peek(0) == Some('\'') {
            return;
        }
        self.tokens.push(RawToken::Word(word));
    }

    fn read_symbol(&mut self) {
        for op in OPERATORS {
            let op_chars: Vec<char> = op.chars().collect();
            if self.starts_with(&op_chars) {
                if op.starts_with('#') && self.is_mysql() {
                    continue;
                }
                self.pos += op_chars.len();
                self.tokens.push(RawToken::Symbol(op.to_string()));
                return;
            }
        }
        let c = self.chars[self.pos];
        self.pos += 1;
        self.tokens.push(RawToken::Symbol(c.to_string()));
    }
}

/// Decodes the backslash escapes of a Postgres escape string body.
///
/// Quotes come out doubled, matching the body of a standard literal.
fn unescape_escape_string(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push(c);
            break;
        };
        match escaped {
            '\'' => out.push_str("''"),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'x' | 'u' | 'U' | '0'..='7' => {
                let (radix, limit, mut digits) = match escaped {
                    'x' => (16, 2, String::new()),
                    'u' => (16, 4, String::new()),
                    'U' => (16, 8, String::new()),
                    octal => (8, 3, octal.to_string()),
                };
                while digits.len() < limit {
                    match chars.peek() {
                        Some(d) if d.is_digit(radix) => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                let decoded = u32::from_str_radix(&digits, radix).ok().and_then(char::from_u32);
                match decoded {
                    Some('\'') => out.push_str("''"),
                    Some(ch) => out.push(ch),
                    None => {
                        out.push(escaped);
                        if radix == 16 {
                            out.push_str(&digits);
                        }
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokens: &[RawToken]) -> Vec<String> {
        tokens
            .iter()
            .filter_map(|t| match t {
                RawToken::Word(w) => Some(w.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_comments_are_dropped() {
        let tokens = lex(
            "-- header\nCREATE /* inline */ TABLE t # trailing\n(id INT)",
            DatabaseLanguage::Mysql,
        );
        assert_eq!(words(&tokens), vec!["CREATE", "TABLE", "t", "id", "INT"]);
    }

    #[test]
    fn test_versioned_comment_is_unwrapped() {
        let tokens = lex("CREATE TABLE t (id INT) /*!50100 ENGINE=InnoDB */", DatabaseLanguage::Mysql);
        assert_eq!(words(&tokens), vec!["CREATE", "TABLE", "t", "id", "INT", "ENGINE", "InnoDB"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let sql = "DELIMITER //\nCREATE PROCEDURE p() BEGIN SELECT 1; END//\nDELIMITER ;\n";
        let tokens = lex(sql, DatabaseLanguage::Mysql);
        assert_eq!(tokens.last(), Some(&RawToken::Symbol(String::from(";"))));
        assert!(!tokens.iter().any(|t| t.is_word("DELIMITER")));
    }

    #[test]
    fn test_quoted_identifiers_and_strings() {
        let tokens = lex("`a``b` 'it''s' \"say\"", DatabaseLanguage::Mysql);
        assert_eq!(
            tokens,
            vec![
                RawToken::Quoted(String::from("a`b")),
                RawToken::Str(String::from("it''s")),
                RawToken::Str(String::from("say")),
            ]
        );
    }

    #[test]
    fn test_postgres_dollar_quotes() {
        let tokens = lex("AS $fn$ SELECT $1 $fn$ LANGUAGE sql", DatabaseLanguage::Postgres);
        assert_eq!(tokens[1], RawToken::Dollar(String::from(" SELECT $1 ")));

        let tokens = lex("SELECT $1", DatabaseLanguage::Postgres);
        assert_eq!(tokens[1], RawToken::Param(String::from("$1")));
    }

    #[test]
    fn test_postgres_escape_string() {
        let tokens = lex(r"DEFAULT E'it\'s' , e'a\\b\nc' , E'\x41\101'", DatabaseLanguage::Postgres);
        assert_eq!(
            tokens,
            vec![
                RawToken::Word(String::from("DEFAULT")),
                RawToken::Str(String::from("it''s")),
                RawToken::Symbol(String::from(",")),
                RawToken::Str(String::from("a\\b\nc")),
                RawToken::Symbol(String::from(",")),
                RawToken::Str(String::from("AA")),
            ]
        );

        let tokens = lex("E'don''t'", DatabaseLanguage::Postgres);
        assert_eq!(tokens, vec![RawToken::Str(String::from("don''t"))]);

        let tokens = lex("SELECT e FROM t", DatabaseLanguage::Postgres);
        assert_eq!(tokens[1], RawToken::Word(String::from("e")));
    }

    #[test]
    fn test_unterminated_literal_runs_to_end() {
        let tokens = lex("SELECT 'abc", DatabaseLanguage::Postgres);
        assert_eq!(tokens[1], RawToken::Str(String::from("abc")));
    }

    #[test]
    fn test_mysql_definer_account() {
        let tokens = lex("DEFINER=`root`@`%`", DatabaseLanguage::Mysql);
        assert_eq!(tokens[3], RawToken::Symbol(String::from("@")));

        let tokens = lex("SET @@session.sql_mode = ''", DatabaseLanguage::Mysql);
        assert_eq!(tokens[1], RawToken::Param(String::from("@@session.sql_mode")));
    }

    #[test]
    fn test_charset_introducer_dropped() {
        let tokens = lex("select _utf8mb4'abc'", DatabaseLanguage::Mysql);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1], RawToken::Str(String::from("abc")));
    }

    #[test]
    fn test_operators_and_numbers() {
        let tokens = lex("x::text >= 1.5e3", DatabaseLanguage::Postgres);
        assert_eq!(
            tokens,
            vec![
                RawToken::Word(String::from("x")),
                RawToken::Symbol(String::from("::")),
                RawToken::Word(String::from("text")),
                RawToken::Symbol(String::from(">=")),
                RawToken::Number(String::from("1.5e3")),
            ]
        );
    }
}
