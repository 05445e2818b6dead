use std::fmt;

use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::Token;

use crate::error::{Result, SmartBiError};
use crate::query::tokens::{self, Lexeme};

/// A caller-supplied query that has passed the read-only check.
///
/// The only constructor is [`ReadOnlyQuery::new`], and connectors accept
/// nothing else for ad-hoc queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyQuery {
    sql: String,
}

impl ReadOnlyQuery {
    /// Validate `input` as a single `SELECT` statement.
    ///
    /// The text is tokenized under the PostgreSQL, MySQL and SQLite rules.
    /// Every reading has to start with an unquoted `SELECT` keyword (any
    /// case, after whitespace and comments) and hold nothing but trivia
    /// after its first `;`, so a literal that one backend reads differently
    /// cannot smuggle a second statement past the check. A reading that
    /// fails to tokenize is left out; the backend it stands for could not
    /// run the text either. One trailing `;` is dropped.
    pub fn new(input: &str) -> Result<Self> {
        let dialects: [&dyn Dialect; 3] =
            [&PostgreSqlDialect {}, &MySqlDialect {}, &SQLiteDialect {}];

        let mut readings = Vec::new();
        let mut failure = None;
        for dialect in dialects {
            match tokens::lex(input, dialect) {
                Ok(lexemes) => readings.push(lexemes),
                Err(e) => failure = Some(e),
            }
        }

        let Some(primary) = readings.first() else {
            let detail = failure.map(|e| e.to_string()).unwrap_or_default();
            return Err(not_allowed(format!("query could not be read: {}", detail)));
        };
        for lexemes in &readings {
            check_reading(lexemes)?;
        }

        let start = primary
            .iter()
            .find(|l| !l.is_trivia())
            .map_or(0, |l| l.start);
        let end = primary
            .iter()
            .find(|l| l.is_terminator())
            .map_or(input.len(), |l| l.start);

        Ok(Self {
            sql: input[start..end].trim_end().to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for ReadOnlyQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

fn check_reading(lexemes: &[Lexeme]) -> Result<()> {
    let first = lexemes
        .iter()
        .find(|l| !l.is_trivia())
        .ok_or_else(|| not_allowed("query is empty"))?;

    let shown = match &first.token {
        Token::Word(w) if w.quote_style.is_none() => {
            if w.value.eq_ignore_ascii_case("select") {
                None
            } else {
                Some(w.value.to_uppercase())
            }
        }
        other => Some(other.to_string().chars().take(16).collect()),
    };
    if let Some(shown) = shown {
        return Err(not_allowed(format!(
            "only SELECT statements are allowed, got '{}'",
            shown
        )));
    }

    let after_end = lexemes.iter().skip_while(|l| !l.is_terminator()).skip(1);
    for lexeme in after_end {
        if !lexeme.is_trivia() {
            return Err(not_allowed("multiple statements are not allowed"));
        }
    }
    Ok(())
}

fn not_allowed(reason: impl Into<String>) -> SmartBiError {
    SmartBiError::QueryNotAllowed {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(sql: &str) -> bool {
        matches!(
            ReadOnlyQuery::new(sql),
            Err(SmartBiError::QueryNotAllowed { .. })
        )
    }

    #[test]
    fn test_accepts_plain_select() {
        let q = ReadOnlyQuery::new("SELECT name FROM users LIMIT 2").unwrap();
        assert_eq!(q.as_str(), "SELECT name FROM users LIMIT 2");
    }

    #[test]
    fn test_keyword_is_case_insensitive_after_trivia() {
        let q = ReadOnlyQuery::new("  -- top customers\n/* v2 */\n  sElEcT 1").unwrap();
        assert_eq!(q.as_str(), "sElEcT 1");
    }

    #[test]
    fn test_rejects_non_select() {
        assert!(rejected("DELETE FROM users"));
        assert!(rejected("update users set name = 'x'"));
        assert!(rejected("-- SELECT\nDROP TABLE users"));
        assert!(rejected("WITH x AS (SELECT 1) DELETE FROM users"));
    }

    #[test]
    fn test_keyword_must_be_word_bounded() {
        assert!(rejected("SELECTED_ROWS"));
        assert!(rejected("select_all()"));
        assert!(ReadOnlyQuery::new("SELECT(1)").is_ok());
        assert!(ReadOnlyQuery::new("SELECT*FROM t").is_ok());
    }

    #[test]
    fn test_rejects_empty_and_comment_only() {
        assert!(rejected(""));
        assert!(rejected("   \n\t"));
        assert!(rejected("-- just a note"));
        assert!(rejected("/* nothing */"));
    }

    #[test]
    fn test_rejects_statement_stacking() {
        assert!(rejected("SELECT 1; DROP TABLE x"));
        assert!(rejected("SELECT 1;DELETE FROM users;"));
        assert!(rejected(r"SELECT 'a\'; DROP TABLE x; --'"));
        assert!(rejected("SELECT 1;;"));
    }

    #[test]
    fn test_quoted_keyword_is_not_a_select() {
        let err = ReadOnlyQuery::new("\"select\" FROM t").unwrap_err();
        assert!(matches!(err, SmartBiError::QueryNotAllowed { .. }));
    }

    #[test]
    fn test_rejection_names_the_keyword() {
        let err = ReadOnlyQuery::new("  insert into t values (1)").unwrap_err();
        assert!(err.to_string().contains("'INSERT'"));
    }

    #[test]
    fn test_unreadable_query_is_rejected() {
        assert!(rejected("SELECT 'never closed"));
    }

    #[test]
    fn test_trailing_semicolon_stripped() {
        let q = ReadOnlyQuery::new("SELECT ';' AS s;").unwrap();
        assert_eq!(q.as_str(), "SELECT ';' AS s");

        let q = ReadOnlyQuery::new("SELECT 1 ;  -- done\n").unwrap();
        assert_eq!(q.as_str(), "SELECT 1");
    }
}
