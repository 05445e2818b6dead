//! Token scanning on top of the `sqlparser` tokenizer, with byte offsets
//! back into the source text so callers can slice statements out of it.

use sqlparser::dialect::Dialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer, TokenizerError};

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub start: usize,
}

impl Lexeme {
    /// Whitespace or a comment.
    pub fn is_trivia(&self) -> bool {
        matches!(self.token, Token::Whitespace(_) | Token::EOF)
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self.token, Token::SemiColon)
    }
}

/// Tokenize `sql` under `dialect`.
pub fn lex(sql: &str, dialect: &dyn Dialect) -> Result<Vec<Lexeme>, TokenizerError> {
    let tokens = Tokenizer::new(dialect, sql).tokenize_with_location()?;

    // Locations are 1-based (line, column) in chars and arrive in order,
    // so one forward walk over the text resolves all of them.
    let mut chars = sql.char_indices().peekable();
    let (mut line, mut column) = (1, 1);
    let mut offset_of = |at: Location| -> usize {
        while (line, column) < (at.line, at.column) {
            match chars.next() {
                Some((_, '\n')) => {
                    line += 1;
                    column = 1;
                }
                Some(_) => column += 1,
                None => break,
            }
        }
        chars.peek().map_or(sql.len(), |&(i, _)| i)
    };

    Ok(tokens
        .into_iter()
        .map(|t| Lexeme {
            start: offset_of(t.span.start),
            token: t.token,
        })
        .collect())
}

/// Split a script into its statements, without the terminating `;` or any
/// leading comments. Pieces holding nothing but trivia are dropped.
pub fn split_statements<'a>(
    sql: &'a str,
    dialect: &dyn Dialect,
) -> Result<Vec<&'a str>, TokenizerError> {
    let mut statements = Vec::new();
    let mut begin = None;

    for lexeme in lex(sql, dialect)? {
        if lexeme.is_terminator() {
            if let Some(b) = begin.take() {
                statements.push(sql[b..lexeme.start].trim_end());
            }
        } else if !lexeme.is_trivia() {
            begin.get_or_insert(lexeme.start);
        }
    }
    if let Some(b) = begin {
        statements.push(sql[b..].trim_end());
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use sqlparser::dialect::{MySqlDialect, PostgreSqlDialect};

    use super::*;

    fn terminators(sql: &str, dialect: &dyn Dialect) -> Vec<usize> {
        lex(sql, dialect)
            .unwrap()
            .into_iter()
            .filter(Lexeme::is_terminator)
            .map(|l| l.start)
            .collect()
    }

    #[test]
    fn test_offsets_point_into_source() {
        let sql = "SELECT 'é'\n  , naïve;";
        let lexemes = lex(sql, &PostgreSqlDialect {}).unwrap();
        let words: Vec<&str> = lexemes
            .iter()
            .filter(|l| matches!(l.token, Token::Word(_)))
            .map(|l| &sql[l.start..])
            .collect();
        assert!(words[0].starts_with("SELECT"));
        assert!(words[1].starts_with("naïve"));
        assert_eq!(terminators(sql, &PostgreSqlDialect {}), vec![sql.len() - 1]);
    }

    #[test]
    fn test_semicolons_inside_literals_are_ignored() {
        let sql = "SELECT ';' AS s, \"a;b\" FROM t";
        assert!(terminators(sql, &PostgreSqlDialect {}).is_empty());
        assert!(terminators(sql, &MySqlDialect {}).is_empty());
        assert!(terminators("SELECT `c;d` FROM t", &MySqlDialect {}).is_empty());
    }

    #[test]
    fn test_doubled_quotes_stay_inside_literal() {
        assert!(terminators("SELECT 'it''s; fine'", &PostgreSqlDialect {}).is_empty());
    }

    #[test]
    fn test_backslash_escape_only_in_mysql() {
        let sql = r"SELECT 'a\'; DROP TABLE x; --'";
        // PostgreSQL closes the literal at the second quote.
        assert_eq!(terminators(sql, &PostgreSqlDialect {}).len(), 2);
        assert!(terminators(sql, &MySqlDialect {}).is_empty());
    }

    #[test]
    fn test_comments_hide_semicolons() {
        let sql = "SELECT 1 -- ; nope\n/* ; */ FROM t";
        assert!(terminators(sql, &PostgreSqlDialect {}).is_empty());
        assert!(terminators("SELECT 1 # ; nope\nFROM t", &MySqlDialect {}).is_empty());
    }

    #[test]
    fn test_unterminated_literal_is_an_error() {
        assert!(lex("SELECT 'open", &PostgreSqlDialect {}).is_err());
    }

    #[test]
    fn test_split_statements() {
        let script = "CREATE TABLE a (x TEXT);\n-- comment only;\nINSERT INTO a VALUES ('x;y');\n\n";
        let parts = split_statements(script, &MySqlDialect {}).unwrap();
        assert_eq!(
            parts,
            vec!["CREATE TABLE a (x TEXT)", "INSERT INTO a VALUES ('x;y')"]
        );
    }

    #[test]
    fn test_split_keeps_last_statement_without_terminator() {
        let parts = split_statements("/* head */ SELECT 1;\nSELECT 2\n", &MySqlDialect {}).unwrap();
        assert_eq!(parts, vec!["SELECT 1", "SELECT 2"]);
    }
}
