//! SQL dump uploads.
//!
//! Dumps are usually produced by `mysqldump`, so the loader drops session
//! noise, rewrites `CREATE TABLE` into SQLite's dialect and replays the
//! `INSERT` statements. A statement that fails is counted and skipped.

use std::sync::LazyLock;

use regex::Regex;
use sqlparser::dialect::MySqlDialect;

use crate::connector::SqliteConnector;
use crate::error::{Result, SmartBiError};
use crate::query::tokens;
use crate::schema::types::{DataType, DatabaseKind};
use crate::upload::LoadReport;

static CREATE_TABLE_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^CREATE\s+(?:TEMPORARY\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(`[^`]+`|"[^"]+"|[\w.$]+)\s*\("#)
        .unwrap()
});

static COLUMN_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:UNSIGNED|ZEROFILL|AUTO_INCREMENT|CHARACTER\s+SET\s+\w+|CHARSET\s+\w+|COLLATE\s+\w+)\b|\bON\s+UPDATE\s+CURRENT_TIMESTAMP(?:\(\d*\))?|\bCOMMENT\s+'(?:[^'\\]|\\.|'')*'",
    )
    .unwrap()
});

static INSERT_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^INSERT\s+(?:IGNORE\s+)?INTO\s+").unwrap()
});

/// Drop lines that only carry session state or comments.
pub fn filter_dump_lines(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            let upper = trimmed.to_ascii_uppercase();
            !(trimmed.is_empty()
                || trimmed.starts_with("--")
                || trimmed.starts_with("/*")
                || upper.starts_with("SET ")
                || upper.starts_with("START TRANSACTION")
                || upper.starts_with("BEGIN;")
                || upper.starts_with("COMMIT")
                || upper.starts_with("LOCK TABLES")
                || upper.starts_with("UNLOCK TABLES"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite a MySQL `CREATE TABLE` into SQLite's dialect. Returns the table
/// name and the new statement, or `None` if the statement is not a
/// `CREATE TABLE` this loader understands.
pub fn rewrite_create_table(stmt: &str) -> Option<(String, String)> {
    let head = CREATE_TABLE_HEAD.captures(stmt)?;
    let table = unquote(head.get(1)?.as_str());
    let open = head.get(0)?.end() - 1;
    let close = matching_paren(stmt, open)?;

    let columns: Vec<String> = split_top_level(&stmt[open + 1..close])
        .into_iter()
        .filter_map(rewrite_definition)
        .collect();
    if columns.is_empty() {
        return None;
    }

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        DatabaseKind::SQLite.quote_ident(&table),
        columns.join(",\n  ")
    );
    Some((table, sql))
}

/// Turn MySQL backslash escapes in string literals into standard SQL and
/// swap backtick-quoted identifiers for double quotes.
pub fn rewrite_insert(stmt: &str) -> String {
    let mut out = String::with_capacity(stmt.len());
    let mut chars = stmt.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => match chars.next() {
                    Some('\'') => out.push_str("''"),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('0') => {}
                    Some('Z') => out.push('\u{1a}'),
                    Some(other) => out.push(other),
                    None => out.push('\\'),
                },
                '\'' if chars.peek() == Some(&'\'') => {
                    out.push_str("''");
                    chars.next();
                }
                '\'' => {
                    in_string = false;
                    out.push('\'');
                }
                _ => out.push(c),
            }
        } else {
            match c {
                '\'' => {
                    in_string = true;
                    out.push('\'');
                }
                '`' => out.push('"'),
                _ => out.push(c),
            }
        }
    }

    out
}

/// Replay a dump into `connector`.
pub async fn load_sql_dump(connector: &SqliteConnector, text: &str) -> Result<LoadReport> {
    let filtered = filter_dump_lines(text);
    let statements =
        tokens::split_statements(&filtered, &MySqlDialect {}).map_err(|e| SmartBiError::Upload {
            message: format!("could not split the SQL file into statements: {}", e),
        })?;
    let mut report = LoadReport::default();

    for stmt in statements {
        let upper = stmt
            .split_whitespace()
            .take(3)
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();

        let (created, sql) =
            if upper.starts_with("CREATE TABLE") || upper.starts_with("CREATE TEMPORARY") {
                match rewrite_create_table(stmt) {
                    Some((table, sql)) => (Some(table), sql),
                    None => {
                        report.statements_failed += 1;
                        continue;
                    }
                }
            } else if INSERT_HEAD.is_match(stmt) {
                (None, rewrite_insert(stmt))
            } else {
                report.statements_skipped += 1;
                continue;
            };

        match sqlx::query(&sql).execute(connector.pool()).await {
            Ok(done) => {
                report.statements_executed += 1;
                match created {
                    Some(table) if !report.tables_created.contains(&table) => {
                        report.tables_created.push(table)
                    }
                    Some(_) => {}
                    None => report.rows_loaded += done.rows_affected(),
                }
            }
            Err(e) => {
                tracing::debug!("Skipping failed dump statement: {}", e);
                report.statements_failed += 1;
            }
        }
    }

    if report.tables_created.is_empty() {
        return Err(SmartBiError::Upload {
            message: "the SQL file does not contain any CREATE TABLE statement that could be loaded"
                .to_string(),
        });
    }

    if report.statements_failed > 0 {
        tracing::warn!("{} dump statements failed and were skipped", report.statements_failed);
    }
    Ok(report)
}

/// One entry of a column list: keep columns and the primary key, drop
/// secondary indexes and constraints.
fn rewrite_definition(def: &str) -> Option<String> {
    let def = def.trim();
    let upper = def.to_ascii_uppercase();

    let dropped = ["KEY ", "INDEX ", "UNIQUE ", "FULLTEXT ", "SPATIAL ", "CONSTRAINT ", "FOREIGN KEY", "CHECK "];
    if def.is_empty() || dropped.iter().any(|p| upper.starts_with(p)) {
        return None;
    }
    if upper.starts_with("PRIMARY KEY") {
        return Some(def.replace('`', "\""));
    }

    let (name, rest) = split_column_name(def)?;
    let rest = rest.trim_start();
    let type_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let (mut type_str, mut rest) = rest.split_at(type_len);
    if rest.starts_with('(') {
        let close = matching_paren(rest, 0)?;
        type_str = &def[def.len() - rest.len() - type_str.len()..def.len() - rest.len() + close + 1];
        rest = &rest[close + 1..];
    }

    let affinity = match DataType::from_raw(type_str) {
        DataType::SmallInt | DataType::Integer | DataType::BigInt | DataType::Boolean => "INTEGER",
        DataType::Float | DataType::Double | DataType::Numeric | DataType::Money => "REAL",
        DataType::Binary => "BLOB",
        _ => "TEXT",
    };

    let modifiers = COLUMN_NOISE.replace_all(rest, "").replace('`', "\"");
    let modifiers = modifiers.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = format!("{} {}", DatabaseKind::SQLite.quote_ident(&name), affinity);
    if !modifiers.is_empty() {
        out.push(' ');
        out.push_str(&modifiers);
    }
    Some(out)
}

fn split_column_name(def: &str) -> Option<(String, &str)> {
    let first = def.chars().next()?;
    if first == '`' || first == '"' {
        let end = def[1..].find(first)? + 1;
        Some((def[1..end].to_string(), &def[end + 1..]))
    } else {
        let end = def.find(char::is_whitespace)?;
        Some((def[..end].to_string(), &def[end..]))
    }
}

fn unquote(name: &str) -> String {
    let name = name.trim_matches(|c| c == '`' || c == '"');
    // `db`.`table` keeps only the table part
    name.rsplit(['.', '`', '"'])
        .find(|part| !part.is_empty())
        .unwrap_or(name)
        .to_string()
}

/// Index of the `)` closing the `(` at `open`, skipping quoted text.
fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let bytes = s.as_bytes();
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Split on commas that are not nested in parentheses or quotes.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"-- MySQL dump 10.13
/*!40101 SET NAMES utf8mb4 */;
SET FOREIGN_KEY_CHECKS=0;
START TRANSACTION;

DROP TABLE IF EXISTS `clients`;
CREATE TABLE `clients` (
  `id` int(11) unsigned NOT NULL AUTO_INCREMENT,
  `name` varchar(120) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci NOT NULL COMMENT 'full name, legal',
  `balance` decimal(10,2) DEFAULT '0.00',
  `created_at` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
  PRIMARY KEY (`id`),
  KEY `idx_name` (`name`),
  CONSTRAINT `fk_x` FOREIGN KEY (`id`) REFERENCES `other` (`id`)
) ENGINE=InnoDB AUTO_INCREMENT=3 DEFAULT CHARSET=utf8mb4;

LOCK TABLES `clients` WRITE;
INSERT INTO `clients` VALUES (1,'O\'Reilly; Ltd',10.50,'2024-01-02 10:00:00'),(2,'Acme',0.00,'2024-01-03 11:00:00');
UNLOCK TABLES;
COMMIT;
"#;

    #[test]
    fn test_filter_drops_session_lines() {
        let filtered = filter_dump_lines(DUMP);
        assert!(!filtered.contains("SET FOREIGN_KEY_CHECKS"));
        assert!(!filtered.contains("START TRANSACTION"));
        assert!(!filtered.contains("LOCK TABLES"));
        assert!(!filtered.contains("/*!40101"));
        assert!(filtered.contains("CREATE TABLE `clients`"));
        assert!(filtered.contains("INSERT INTO `clients`"));
    }

    #[test]
    fn test_rewrite_create_table() {
        let filtered = filter_dump_lines(DUMP);
        let stmt = tokens::split_statements(&filtered, &MySqlDialect {})
            .unwrap()
            .into_iter()
            .find(|s| s.starts_with("CREATE"))
            .unwrap();
        let (table, sql) = rewrite_create_table(stmt).unwrap();
        assert_eq!(table, "clients");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"clients\" ("));
        assert!(sql.contains("\"id\" INTEGER NOT NULL"));
        assert!(sql.contains("\"name\" TEXT NOT NULL"));
        assert!(sql.contains("\"balance\" REAL DEFAULT '0.00'"));
        assert!(sql.contains("\"created_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
        assert!(!sql.contains("idx_name"));
        assert!(!sql.contains("FOREIGN KEY"));
        assert!(!sql.contains("ENGINE"));
        assert!(!sql.to_uppercase().contains("AUTO_INCREMENT"));
        assert!(!sql.contains("COMMENT"));
    }

    #[test]
    fn test_escaped_quote_keeps_insert_whole() {
        let filtered = filter_dump_lines(DUMP);
        let statements = tokens::split_statements(&filtered, &MySqlDialect {}).unwrap();
        let insert = statements
            .iter()
            .find(|s| s.starts_with("INSERT"))
            .unwrap();
        assert!(insert.ends_with("'2024-01-03 11:00:00')"));
        assert!(insert.contains(r"'O\'Reilly; Ltd'"));
    }

    #[test]
    fn test_rewrite_insert_unescapes_mysql_literals() {
        let sql = rewrite_insert(r"INSERT INTO `t` VALUES (1,'O\'Reilly','a\\b','line\nnext')");
        assert_eq!(sql, "INSERT INTO \"t\" VALUES (1,'O''Reilly','a\\b','line\nnext')");
    }

    #[test]
    fn test_unquote_qualified_name() {
        assert_eq!(unquote("`shop`.`orders`"), "orders");
        assert_eq!(unquote("orders"), "orders");
    }

    #[test]
    fn test_non_create_statement_is_not_rewritten() {
        assert!(rewrite_create_table("CREATE INDEX i ON t (x)").is_none());
    }
}
