//! Extraction of `(type, name)` from a resource's CREATE header.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::dialect::DatabaseLanguage;
use crate::error::{ConfigError, Result};

use super::types::ResourceType;

/// Quoted or bare identifier.
const IDENT: &str = r#"(?:`[^`]+`|"[^"]+"|[A-Za-z0-9_$]+)"#;

/// Principal or host of a DEFINER clause.
const ACCOUNT: &str = r#"(?:`[^`]*`|'[^']*'|"[^"]*"|[A-Za-z0-9_.%-]+)"#;

#[allow(clippy::expect_used)] // the pattern is a compile-time constant
fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?is)^(?:\s+|--[^\n]*(?:\n|$)|\#[^\n]*(?:\n|$)|/\*.*?\*/|DELIMITER[ \t]+[^\n]*(?:\n|$))*CREATE\s+(?:OR\s+REPLACE\s+)?(?:ALGORITHM\s*=\s*\w+\s+)?(?:DEFINER\s*=\s*(?:CURRENT_USER(?:\s*\(\s*\))?|{ACCOUNT}(?:\s*@\s*{ACCOUNT})?)\s+)?(?:SQL\s+SECURITY\s+\w+\s+)?(MATERIALIZED\s+VIEW|TABLE|VIEW|PROCEDURE|FUNCTION|TRIGGER|EVENT)\s+(?:IF\s+NOT\s+EXISTS\s+)?((?:{IDENT}\s*\.\s*)?{IDENT})"
        );
        Regex::new(&pattern).expect("valid regex")
    })
}

/// Reads the resource type and unqualified object name from the first
/// CREATE statement in `sql`.
///
/// Quotes are removed from the name. Postgres folds unquoted names to
/// lowercase, so they are folded here as well.
///
/// # Errors
///
/// Returns [`ConfigError::UnrecognizedResource`] if no CREATE header is found.
pub fn extract_resource_header(
    path: &Path,
    sql: &str,
    language: DatabaseLanguage,
) -> Result<(ResourceType, String)> {
    let captures = header_regex().captures(sql).ok_or_else(|| ConfigError::UnrecognizedResource {
        path: path.to_path_buf(),
        message: String::from("expected the file to start with a CREATE statement"),
    })?;

    let keyword = captures.get(1).map_or("", |m| m.as_str());
    let keyword = keyword.split_whitespace().collect::<Vec<_>>().join(" ");
    let resource_type = ResourceType::parse(&keyword).ok_or_else(|| ConfigError::UnrecognizedResource {
        path: path.to_path_buf(),
        message: format!("unsupported object type '{keyword}'"),
    })?;

    let qualified = captures.get(2).map_or("", |m| m.as_str());
    let name = object_name(qualified, language == DatabaseLanguage::Postgres);

    if name.is_empty() {
        return Err(ConfigError::UnrecognizedResource {
            path: path.to_path_buf(),
            message: String::from("object name is empty"),
        }
        .into());
    }

    Ok((resource_type, name))
}

/// Last segment of a possibly schema-qualified name.
///
/// Dots inside quotes belong to the name.
fn object_name(qualified: &str, fold_unquoted: bool) -> String {
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in qualified.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '`' || c == '"' => quote = Some(c),
            None if c == '.' => start = i + 1,
            None => {}
        }
    }

    let segment = qualified[start..].trim();
    for q in ['`', '"'] {
        if let Some(inner) = segment.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner.replace(&format!("{q}{q}"), &q.to_string());
        }
    }
    if fold_unquoted {
        segment.to_lowercase()
    } else {
        segment.to_string()
    }
}
