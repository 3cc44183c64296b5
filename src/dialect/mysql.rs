//! `MySQL` normalization rules.

use serde::{Deserialize, Serialize};

use crate::definition::ResourceType;
use crate::error::Result;

use super::layout::Layout;
use super::lexer::lex;
use super::query::canonicalize_view;
use super::table::{ElementKind, TableParts, element_kind};
use super::token::{Tok, classify, remove_sequence, strip_create_modifiers, strip_terminators};
use super::{DatabaseLanguage, DialectAdapter, DialectVersion, unsupported};

/// Table options a `MySQL` server applies when a definition omits them.
///
/// An option in a definition that equals the server default is removed, so
/// a declared table without `ENGINE=InnoDB` matches the live one that shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerDefaults {
    /// Default storage engine.
    pub engine: Option<String>,
    /// Default character set.
    pub charset: Option<String>,
    /// Default collation.
    pub collation: Option<String>,
}

impl Default for ServerDefaults {
    fn default() -> Self {
        Self {
            engine: Some(String::from("InnoDB")),
            charset: None,
            collation: None,
        }
    }
}

/// Integer types whose display width is dropped from 8.0 on.
const INTEGER_TYPES: &[&str] = &["TINYINT", "SMALLINT", "MEDIUMINT", "INT", "BIGINT", "YEAR"];

/// `MySQL` dialect adapter.
#[derive(Debug, Clone)]
pub struct MysqlAdapter {
    dialect: DialectVersion,
    defaults: ServerDefaults,
    layout: Layout,
}

impl MysqlAdapter {
    /// Creates an adapter for `dialect` with the given server defaults.
    #[must_use]
    pub const fn new(dialect: DialectVersion, defaults: ServerDefaults) -> Self {
        Self {
            dialect,
            defaults,
            layout: Layout::new('`'),
        }
    }

    fn normalize_table(&self, tokens: Vec<Tok>) -> String {
        let mut table = match TableParts::split(tokens) {
            Ok(table) => table,
            Err(tokens) => return self.layout.statement(&tokens),
        };

        let (tail, charset, collation) = self.strip_table_options(&table.tail);
        table.tail = tail;
        let charset = charset.or_else(|| self.defaults.charset.clone());
        let collation = collation.or_else(|| self.defaults.collation.clone());

        for element in &mut table.elements {
            if element_kind(element) == ElementKind::Column {
                strip_default_null(element);
                strip_column_charset(element, charset.as_deref(), collation.as_deref());
            }
        }
        hoist_inline_keys(&mut table);
        for element in &mut table.elements {
            canonical_index_words(element);
        }
        table.canonicalize_columns(true);
        table.order_elements();

        self.layout.table(&table)
    }

    /// Drops the row counter and options equal to the server defaults.
    /// Returns the kept options and the table's charset and collation.
    fn strip_table_options(&self, tail: &[Tok]) -> (Vec<Tok>, Option<String>, Option<String>) {
        let mut out = Vec::with_capacity(tail.len());
        let mut charset = None;
        let mut collation = None;
        let mut i = 0;

        while i < tail.len() {
            let tok = &tail[i];
            if tok.is_kw("DEFAULT")
                && tail
                    .get(i + 1)
                    .is_some_and(|t| t.is_any_kw(&["CHARSET", "CHARACTER", "COLLATE"]))
            {
                i += 1;
                continue;
            }

            let (option, width) = if tok.is_kw("CHARACTER") && tail.get(i + 1).is_some_and(|t| t.is_kw("SET")) {
                ("CHARSET", 2)
            } else if let Some(option) = ["CHARSET", "COLLATE", "ENGINE", "AUTO_INCREMENT"]
                .into_iter()
                .find(|option| tok.is_kw(option))
            {
                (option, 1)
            } else {
                out.push(tok.clone());
                i += 1;
                continue;
            };

            i += width;
            if tail.get(i).is_some_and(|t| t.is_sym("=")) {
                i += 1;
            }
            let Some(value) = tail.get(i) else {
                out.push(Tok::kw(option));
                break;
            };
            i += 1;

            let text = value.text().to_string();
            let default = match option {
                "ENGINE" => self.defaults.engine.as_deref(),
                "CHARSET" => {
                    charset = Some(text.clone());
                    self.defaults.charset.as_deref()
                }
                "COLLATE" => {
                    collation = Some(text.clone());
                    self.defaults.collation.as_deref()
                }
                _ => None,
            };
            let implied = option == "AUTO_INCREMENT" || default.is_some_and(|d| d.eq_ignore_ascii_case(&text));
            if !implied {
                out.extend([Tok::kw(option), Tok::sym("="), value.clone()]);
            }
        }

        (out, charset, collation)
    }

    fn map_types(tokens: Vec<Tok>) -> Vec<Tok> {
        let mut out = Vec::with_capacity(tokens.len());
        for tok in tokens {
            match &tok {
                Tok::Keyword(k) if k == "INTEGER" => out.push(Tok::kw("INT")),
                Tok::Keyword(k) if k == "NUMERIC" => out.push(Tok::kw("DECIMAL")),
                Tok::Keyword(k) if k == "BOOL" || k == "BOOLEAN" => {
                    out.extend([
                        Tok::kw("TINYINT"),
                        Tok::sym("("),
                        Tok::Number(String::from("1")),
                        Tok::sym(")"),
                    ]);
                }
                _ => out.push(tok),
            }
        }
        out
    }
}

impl DialectAdapter for MysqlAdapter {
    fn language(&self) -> DatabaseLanguage {
        DatabaseLanguage::Mysql
    }

    fn dialect(&self) -> &DialectVersion {
        &self.dialect
    }

    fn supports(&self, resource_type: ResourceType) -> bool {
        !matches!(resource_type, ResourceType::MaterializedView)
    }

    fn normalize(&self, resource_type: ResourceType, raw: &str) -> Result<String> {
        if !self.supports(resource_type) {
            return Err(unsupported(self, resource_type));
        }

        let mut tokens = classify(&lex(raw, DatabaseLanguage::Mysql), false);
        strip_terminators(&mut tokens);
        strip_definer(&mut tokens);
        strip_create_modifiers(&mut tokens);
        remove_sequence(&mut tokens, &["SQL", "SECURITY", "DEFINER"]);
        remove_sequence(&mut tokens, &["SQL", "SECURITY", "INVOKER"]);
        strip_default_algorithm(&mut tokens);

        let mut tokens = Self::map_types(tokens);
        if self.dialect.at_least(8, 0) {
            drop_display_widths(&mut tokens);
        }

        let text = match resource_type {
            ResourceType::Table => self.normalize_table(tokens),
            ResourceType::View => {
                canonicalize_view(&mut tokens);
                count_star_as_zero(&mut tokens);
                self.layout.statement(&tokens)
            }
            ResourceType::Event => {
                strip_event_defaults(&mut tokens);
                self.layout.statement(&tokens)
            }
            _ => self.layout.statement(&tokens),
        };
        Ok(text)
    }
}

/// Removes `DEFINER = user@host` (or `CURRENT_USER`).
fn strip_definer(tokens: &mut Vec<Tok>) {
    let Some(start) = (0..tokens.len().saturating_sub(2))
        .find(|&i| tokens[i].is_kw("DEFINER") && tokens[i + 1].is_sym("="))
    else {
        return;
    };

    let mut end = start + 3;
    if tokens[start + 2].is_kw("CURRENT_USER")
        && tokens.get(end).is_some_and(|t| t.is_sym("("))
        && tokens.get(end + 1).is_some_and(|t| t.is_sym(")"))
    {
        end += 2;
    }
    match tokens.get(end) {
        Some(Tok::Symbol(s)) if s == "@" => end = (end + 2).min(tokens.len()),
        Some(Tok::Param(p)) if p.starts_with('@') => end += 1,
        _ => {}
    }
    tokens.drain(start..end);
}

fn strip_default_algorithm(tokens: &mut Vec<Tok>) {
    let found = (0..tokens.len().saturating_sub(2)).find(|&i| {
        tokens[i].is_kw("ALGORITHM") && tokens[i + 1].is_sym("=") && tokens[i + 2].is_kw("UNDEFINED")
    });
    if let Some(i) = found {
        tokens.drain(i..i + 3);
    }
}

fn drop_display_widths(tokens: &mut Vec<Tok>) {
    let mut i = 0;
    while i + 3 < tokens.len() {
        let droppable = tokens[i].is_any_kw(INTEGER_TYPES)
            && tokens[i + 1].is_sym("(")
            && matches!(&tokens[i + 2], Tok::Number(_))
            && tokens[i + 3].is_sym(")")
            && !(tokens[i].is_kw("TINYINT") && tokens[i + 2].text() == "1");
        if droppable {
            tokens.drain(i + 1..i + 4);
        }
        i += 1;
    }
}

/// `MySQL` stores `COUNT(*)` in a view as `COUNT(0)`.
fn count_star_as_zero(tokens: &mut [Tok]) {
    for i in 0..tokens.len().saturating_sub(3) {
        if tokens[i].is_kw("COUNT") && tokens[i + 1].is_sym("(") && tokens[i + 2].is_sym("*") && tokens[i + 3].is_sym(")") {
            tokens[i + 2] = Tok::Number(String::from("0"));
        }
    }
}

fn strip_event_defaults(tokens: &mut Vec<Tok>) {
    remove_sequence(tokens, &["ON", "COMPLETION", "NOT", "PRESERVE"]);
    let body = tokens.iter().position(|t| t.is_kw("DO")).unwrap_or(tokens.len());
    if let Some(i) = tokens[..body].iter().position(|t| t.is_kw("ENABLE")) {
        tokens.remove(i);
    }
}

fn strip_default_null(element: &mut Vec<Tok>) {
    remove_sequence(element, &["DEFAULT", "NULL"]);
}

/// Unifies column charset spelling and drops charset and collation equal
/// to the table's effective values.
fn strip_column_charset(element: &mut Vec<Tok>, charset: Option<&str>, collation: Option<&str>) {
    let mut out = Vec::with_capacity(element.len());
    let mut depth = 0usize;
    let mut i = 0;

    while i < element.len() {
        let tok = &element[i];
        if depth == 0 {
            let charset_width = if tok.is_kw("CHARACTER") && element.get(i + 1).is_some_and(|t| t.is_kw("SET")) {
                Some(2)
            } else if tok.is_kw("CHARSET") {
                Some(1)
            } else {
                None
            };
            if let Some(width) = charset_width {
                if let Some(value) = element.get(i + width) {
                    if !charset.is_some_and(|c| c.eq_ignore_ascii_case(value.text())) {
                        out.extend([Tok::kw("CHARSET"), value.clone()]);
                    }
                    i += width + 1;
                    continue;
                }
            }
            if tok.is_kw("COLLATE") {
                if let Some(value) = element.get(i + 1) {
                    if !collation.is_some_and(|c| c.eq_ignore_ascii_case(value.text())) {
                        out.extend([tok.clone(), value.clone()]);
                    }
                    i += 2;
                    continue;
                }
            }
        }
        if tok.is_sym("(") {
            depth += 1;
        } else if tok.is_sym(")") {
            depth = depth.saturating_sub(1);
        }
        out.push(tok.clone());
        i += 1;
    }

    *element = out;
}

/// Moves inline `PRIMARY KEY` and `UNIQUE` column attributes to table-level keys.
fn hoist_inline_keys(table: &mut TableParts) {
    let mut hoisted = Vec::new();

    for element in &mut table.elements {
        if element_kind(element) != ElementKind::Column {
            continue;
        }
        let Some(name) = element.first().cloned() else {
            continue;
        };

        let mut out = Vec::with_capacity(element.len());
        let mut depth = 0usize;
        let mut i = 0;
        while i < element.len() {
            let tok = &element[i];
            if depth == 0 && tok.is_kw("PRIMARY") && element.get(i + 1).is_some_and(|t| t.is_kw("KEY")) {
                hoisted.push(vec![Tok::kw("PRIMARY"), Tok::kw("KEY"), Tok::sym("("), name.clone(), Tok::sym(")")]);
                i += 2;
                continue;
            }
            if depth == 0 && tok.is_kw("UNIQUE") {
                i += 1;
                if element.get(i).is_some_and(|t| t.is_kw("KEY")) {
                    i += 1;
                }
                hoisted.push(vec![
                    Tok::kw("UNIQUE"),
                    Tok::kw("KEY"),
                    name.clone(),
                    Tok::sym("("),
                    name.clone(),
                    Tok::sym(")"),
                ]);
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
        *element = out;
    }

    table.elements.extend(hoisted);
}

/// Spells index elements the way `SHOW CREATE TABLE` does: `KEY` rather
/// than `INDEX`, and `UNIQUE KEY name` rather than `CONSTRAINT name UNIQUE`.
fn canonical_index_words(element: &mut Vec<Tok>) {
    let mut constraint_name = None;
    if element.first().is_some_and(|t| t.is_kw("CONSTRAINT"))
        && matches!(element.get(1), Some(Tok::Ident(_)))
        && element.get(2).is_some_and(|t| t.is_kw("UNIQUE"))
    {
        constraint_name = element.get(1).cloned();
        element.drain(0..2);
    }

    if element.first().is_some_and(|t| t.is_kw("INDEX")) {
        element[0] = Tok::kw("KEY");
        return;
    }
    if !element
        .first()
        .is_some_and(|t| t.is_any_kw(&["UNIQUE", "FULLTEXT", "SPATIAL"]))
    {
        return;
    }

    let second = element.get(1).map(|t| (t.is_kw("INDEX"), t.is_kw("KEY")));
    match second {
        Some((true, _)) => element[1] = Tok::kw("KEY"),
        Some((_, true)) => {}
        _ => element.insert(1, Tok::kw("KEY")),
    }
    if let Some(name) = constraint_name {
        if !matches!(element.get(2), Some(Tok::Ident(_))) {
            element.insert(2, name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(version: &str) -> MysqlAdapter {
        MysqlAdapter::new(version.parse().expect("valid version"), ServerDefaults::default())
    }

    fn normalize(version: &str, resource_type: ResourceType, sql: &str) -> String {
        adapter(version)
            .normalize(resource_type, sql)
            .expect("normalization should succeed")
    }

    const DECLARED_USER: &str = "CREATE TABLE user (
    id int(11) NOT NULL AUTO_INCREMENT,
    name varchar(255) NOT NULL,
    PRIMARY KEY (id)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;";

    const LIVE_USER: &str = "CREATE TABLE `user` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `name` varchar(255) COLLATE utf8mb4_unicode_ci NOT NULL,
  PRIMARY KEY (`id`)
) ENGINE=InnoDB AUTO_INCREMENT=42 DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

    const DECLARED_PROCEDURE: &str = "DELIMITER //\nCREATE PROCEDURE upsert_user(IN in_id BIGINT)\nBEGIN\n    SELECT in_id;\nEND //\nDELIMITER ;\n";

    const LIVE_PROCEDURE: &str = "CREATE DEFINER=`root`@`%` PROCEDURE `upsert_user`(IN in_id BIGINT)\nBEGIN\n  SELECT in_id;\nEND";

    const DECLARED_VIEW: &str = "CREATE OR REPLACE VIEW active_users AS SELECT users.id AS id FROM users;";

    const LIVE_VIEW: &str = "CREATE ALGORITHM=UNDEFINED DEFINER=`app`@`localhost` SQL SECURITY DEFINER VIEW `active_users` AS select `users`.`id` AS `id` from `users`";

    const DECLARED_FILTERED_VIEW: &str = "CREATE VIEW active_emails AS SELECT id, email FROM users WHERE active = 1;";

    const LIVE_FILTERED_VIEW: &str = "CREATE ALGORITHM=UNDEFINED DEFINER=`root`@`%` SQL SECURITY DEFINER VIEW `active_emails` AS select `users`.`id` AS `id`,`users`.`email` AS `email` from `users` where (`users`.`active` = 1)";

    const DECLARED_JOIN_VIEW: &str = "CREATE VIEW order_totals AS
SELECT o.id, u.email, count(*) AS items
FROM orders o JOIN users u ON o.user_id = u.id
WHERE o.status = 'open' AND u.active = 1
GROUP BY o.id, u.email;";

    const LIVE_JOIN_VIEW: &str = "CREATE ALGORITHM=UNDEFINED DEFINER=`root`@`%` SQL SECURITY DEFINER VIEW `order_totals` AS select `o`.`id` AS `id`,`u`.`email` AS `email`,count(0) AS `items` from (`orders` `o` join `users` `u` on((`o`.`user_id` = `u`.`id`))) where ((`o`.`status` = 'open') and (`u`.`active` = 1)) group by `o`.`id`,`u`.`email`";

    const DECLARED_EVENT: &str = "CREATE EVENT purge_sessions\n  ON SCHEDULE EVERY 1 DAY STARTS '2024-01-01 00:00:00'\n  DO DELETE FROM sessions WHERE expired = 1;";

    const LIVE_EVENT: &str = "CREATE DEFINER=`root`@`%` EVENT `purge_sessions` ON SCHEDULE EVERY 1 DAY STARTS '2024-01-01 00:00:00' ON COMPLETION NOT PRESERVE ENABLE DO DELETE FROM sessions WHERE expired = 1";

    const DECLARED_KEYS: &str = "CREATE TABLE t (id INT PRIMARY KEY, email VARCHAR(100) UNIQUE, INDEX idx_email (email))";

    const LIVE_KEYS: &str = "CREATE TABLE `t` (\n  `id` int NOT NULL,\n  `email` varchar(100) DEFAULT NULL,\n  PRIMARY KEY (`id`),\n  UNIQUE KEY `email` (`email`),\n  KEY `idx_email` (`email`)\n) ENGINE=InnoDB";

    /// Every fixture of this module, with the version it targets.
    const FIXTURES: &[(&str, ResourceType, &str)] = &[
        ("5.7", ResourceType::Table, DECLARED_USER),
        ("5.7", ResourceType::Table, LIVE_USER),
        ("5.7", ResourceType::Procedure, DECLARED_PROCEDURE),
        ("5.7", ResourceType::Procedure, LIVE_PROCEDURE),
        ("5.7", ResourceType::View, DECLARED_VIEW),
        ("5.7", ResourceType::View, LIVE_VIEW),
        ("8.0", ResourceType::View, DECLARED_FILTERED_VIEW),
        ("8.0", ResourceType::View, LIVE_FILTERED_VIEW),
        ("5.7", ResourceType::View, DECLARED_JOIN_VIEW),
        ("5.7", ResourceType::View, LIVE_JOIN_VIEW),
        ("5.7", ResourceType::Event, DECLARED_EVENT),
        ("5.7", ResourceType::Event, LIVE_EVENT),
        ("8.0", ResourceType::Table, DECLARED_KEYS),
        ("8.0", ResourceType::Table, LIVE_KEYS),
    ];

    #[test]
    fn test_table_whitespace_quoting_case() {
        let declared = normalize("5.7", ResourceType::Table, DECLARED_USER);
        let live = normalize("5.7", ResourceType::Table, LIVE_USER);
        assert_eq!(declared, live);
        assert_eq!(
            declared,
            "CREATE TABLE `user` (\n  `id` INT(11) AUTO_INCREMENT NOT NULL,\n  `name` VARCHAR(255) NOT NULL,\n  PRIMARY KEY (`id`)\n) CHARSET = UTF8MB4 COLLATE = UTF8MB4_UNICODE_CI"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for (version, resource_type, sql) in FIXTURES {
            let once = normalize(version, *resource_type, sql);
            assert_eq!(normalize(version, *resource_type, &once), once, "fixture: {sql}");
        }
    }

    #[test]
    fn test_changed_column_type_differs() {
        let declared = DECLARED_USER.replace("id int(11)", "id bigint");
        assert_ne!(
            normalize("5.7", ResourceType::Table, &declared),
            normalize("5.7", ResourceType::Table, LIVE_USER)
        );
    }

    #[test]
    fn test_display_widths_dropped_on_8_0() {
        let sql = "CREATE TABLE t (a int(11), b tinyint(1), c boolean, d bigint(20) unsigned)";
        let normalized = normalize("8.0", ResourceType::Table, sql);
        assert!(normalized.contains("`a` INT,"));
        assert!(normalized.contains("`b` TINYINT(1),"));
        assert!(normalized.contains("`c` TINYINT(1),"));
        assert!(normalized.contains("`d` BIGINT UNSIGNED"));

        let old = normalize("5.7", ResourceType::Table, sql);
        assert!(old.contains("`a` INT(11),"));
    }

    #[test]
    fn test_procedure_definer_and_delimiter() {
        let normalized = normalize("5.7", ResourceType::Procedure, DECLARED_PROCEDURE);
        assert_eq!(normalized, normalize("5.7", ResourceType::Procedure, LIVE_PROCEDURE));
        assert_eq!(
            normalized,
            "CREATE PROCEDURE `upsert_user`(IN `in_id` BIGINT) BEGIN\nSELECT `in_id`;\nEND"
        );
    }

    #[test]
    fn test_view_header_defaults_removed() {
        assert_eq!(
            normalize("5.7", ResourceType::View, DECLARED_VIEW),
            normalize("5.7", ResourceType::View, LIVE_VIEW)
        );
    }

    #[test]
    fn test_view_matches_show_create_view() {
        let declared = normalize("8.0", ResourceType::View, DECLARED_FILTERED_VIEW);
        assert_eq!(declared, normalize("8.0", ResourceType::View, LIVE_FILTERED_VIEW));
        assert_eq!(
            declared,
            "CREATE VIEW `active_emails` AS SELECT `id`, `email`\nFROM `users`\nWHERE `active` = 1"
        );
    }

    #[test]
    fn test_join_view_matches_show_create_view() {
        let declared = normalize("5.7", ResourceType::View, DECLARED_JOIN_VIEW);
        assert_eq!(declared, normalize("5.7", ResourceType::View, LIVE_JOIN_VIEW));
        assert!(declared.contains("FROM `orders` `o` JOIN `users` `u` ON `o`.`user_id` = `u`.`id`"));
    }

    #[test]
    fn test_view_predicate_change_differs() {
        let changed = DECLARED_FILTERED_VIEW.replace("active = 1", "active = 0");
        assert_ne!(
            normalize("8.0", ResourceType::View, &changed),
            normalize("8.0", ResourceType::View, LIVE_FILTERED_VIEW)
        );
    }

    #[test]
    fn test_event_defaults_removed() {
        assert_eq!(
            normalize("5.7", ResourceType::Event, DECLARED_EVENT),
            normalize("5.7", ResourceType::Event, LIVE_EVENT)
        );
    }

    #[test]
    fn test_inline_keys_and_index_synonyms() {
        assert_eq!(
            normalize("8.0", ResourceType::Table, DECLARED_KEYS),
            normalize("8.0", ResourceType::Table, LIVE_KEYS)
        );
    }

    #[test]
    fn test_server_default_options_removed() {
        let defaults = ServerDefaults {
            engine: Some(String::from("InnoDB")),
            charset: Some(String::from("utf8mb4")),
            collation: Some(String::from("utf8mb4_0900_ai_ci")),
        };
        let adapter = MysqlAdapter::new("8.0".parse().expect("valid version"), defaults);
        let live = "CREATE TABLE `t` (\n  `id` int NOT NULL\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_0900_ai_ci";
        let normalized = adapter.normalize(ResourceType::Table, live).expect("normalization should succeed");
        assert_eq!(normalized, "CREATE TABLE `t` (\n  `id` INT NOT NULL\n)");
    }

    #[test]
    fn test_materialized_view_unsupported() {
        let err = adapter("8.0")
            .normalize(ResourceType::MaterializedView, "CREATE MATERIALIZED VIEW v AS SELECT 1")
            .expect_err("MySQL has no materialized views");
        assert!(err.is_unsupported_dialect());
        assert_eq!(
            err.to_string(),
            "Dialect error: materialized_view definitions are not supported for mysql 8.0"
        );
    }
}
