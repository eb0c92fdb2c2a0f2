//! Free-text matching for the in-memory index.
//!
//! Implements the subset of the SQLite FTS5 query language that the
//! SQLite-backed index exposes, so both backends accept and reject the same
//! queries:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `lizard` | bareword term |
//! | `"big lizard"` | phrase (`""` escapes a quote) |
//! | `liz*` | prefix on the last token |
//! | `notes:lizard`, `notes:(a OR b)` | column filter (`id:` never matches) |
//! | `a b`, `a AND b` | conjunction |
//! | `a OR b` | disjunction |
//! | `a NOT b` | difference |
//!
//! Precedence is `NOT` > `AND` > `OR`. Matching is case-insensitive over
//! runs of alphanumeric characters. A document's score is the number of
//! matched token occurrences; zero means no match.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::Sighting;

use super::{searchable_text, SEARCH_COLUMNS};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    LParen,
    RParen,
    Colon,
    Star,
    And,
    Or,
    Not,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Quoted(q) => format!("\"{}\"", q),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Colon => ":".to_string(),
            Token::Star => "*".to_string(),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::Not => "NOT".to_string(),
        }
    }
}

fn is_bareword_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || !c.is_ascii()
}

fn syntax_error(near: &str) -> Error {
    Error::QuerySyntax(format!("syntax error near \"{}\"", near))
}

fn lex(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            text.push('"');
                        }
                        Some('"') => break,
                        Some(other) => text.push(other),
                        None => {
                            return Err(Error::QuerySyntax("unterminated string".to_string()))
                        }
                    }
                }
                tokens.push(Token::Quoted(text));
            }
            c if is_bareword_char(c) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_bareword_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Word(word),
                });
            }
            other => return Err(syntax_error(&other.to_string())),
        }
    }
    Ok(tokens)
}

/// Lower-cased alphanumeric runs, the unit both documents and phrases are
/// compared in.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Phrase {
        column: Option<usize>,
        tokens: Vec<String>,
        prefix: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn restrict_to(self, column: usize) -> Expr {
        match self {
            Expr::Phrase {
                column: None,
                tokens,
                prefix,
            } => Expr::Phrase {
                column: Some(column),
                tokens,
                prefix,
            },
            phrase @ Expr::Phrase { .. } => phrase,
            Expr::And(a, b) => {
                let (a, b) = Self::restrict_pair(a, b, column);
                Expr::And(a, b)
            }
            Expr::Or(a, b) => {
                let (a, b) = Self::restrict_pair(a, b, column);
                Expr::Or(a, b)
            }
            Expr::Not(a, b) => {
                let (a, b) = Self::restrict_pair(a, b, column);
                Expr::Not(a, b)
            }
        }
    }

    fn restrict_pair(a: Box<Expr>, b: Box<Expr>, column: usize) -> (Box<Expr>, Box<Expr>) {
        (
            Box::new((*a).restrict_to(column)),
            Box::new((*b).restrict_to(column)),
        )
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn error_here(&self) -> Error {
        match self.peek() {
            Some(tok) => syntax_error(&tok.describe()),
            None => Error::QuerySyntax("syntax error near end of query".to_string()),
        }
    }

    fn parse(mut self) -> Result<Expr> {
        let expr = self.or_expr()?;
        if self.peek().is_some() {
            return Err(self.error_here());
        }
        Ok(expr)
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.not_expr()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                }
                Some(Token::Word(_)) | Some(Token::Quoted(_)) | Some(Token::LParen) => {}
                _ => break,
            }
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        let mut left = self.primary()?;
        while self.peek() == Some(&Token::Not) {
            self.advance();
            let right = self.primary()?;
            left = Expr::Not(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr> {
        if let (Some(Token::Word(name)), Some(Token::Colon)) = (self.peek(), self.peek_at(1)) {
            let column = column_index(name)?;
            self.pos += 2;
            let inner = match self.peek() {
                Some(Token::LParen) => self.group()?,
                _ => self.phrase()?,
            };
            return Ok(inner.restrict_to(column));
        }
        match self.peek() {
            Some(Token::LParen) => self.group(),
            _ => self.phrase(),
        }
    }

    fn group(&mut self) -> Result<Expr> {
        self.advance();
        let inner = self.or_expr()?;
        match self.advance() {
            Some(Token::RParen) => Ok(inner),
            _ => {
                self.pos -= 1;
                Err(self.error_here())
            }
        }
    }

    fn phrase(&mut self) -> Result<Expr> {
        let text = match self.peek() {
            Some(Token::Word(w)) => w.clone(),
            Some(Token::Quoted(q)) => q.clone(),
            _ => return Err(self.error_here()),
        };
        self.advance();
        let prefix = if self.peek() == Some(&Token::Star) {
            self.advance();
            true
        } else {
            false
        };
        Ok(Expr::Phrase {
            column: None,
            tokens: tokenize(&text),
            prefix,
        })
    }
}

/// Present in the index table but not indexed: filters on it parse and
/// never match.
const UNINDEXED_COLUMN: &str = "id";

fn column_index(name: &str) -> Result<usize> {
    if name.eq_ignore_ascii_case(UNINDEXED_COLUMN) {
        return Ok(SEARCH_COLUMNS.len());
    }
    SEARCH_COLUMNS
        .iter()
        .position(|c| c.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::QuerySyntax(format!("no such column: {}", name)))
}

/// A parsed query, reusable across documents.
#[derive(Debug, Clone)]
pub struct Matcher {
    expr: Expr,
}

impl Matcher {
    pub fn parse(query: &str) -> Result<Self> {
        let tokens = lex(query)?;
        if tokens.is_empty() {
            return Err(Error::QuerySyntax("query must not be empty".to_string()));
        }
        let expr = Parser { tokens, pos: 0 }.parse()?;
        Ok(Self { expr })
    }

    /// Relevance of `doc`; zero when it does not match.
    pub fn score(&self, doc: &IndexedDoc) -> u32 {
        score(&self.expr, doc)
    }
}

/// A record's search columns, tokenized once at index time.
#[derive(Debug, Clone)]
pub struct IndexedDoc {
    columns: Vec<Vec<String>>,
}

impl IndexedDoc {
    pub fn new(sighting: &Sighting) -> Self {
        Self {
            columns: searchable_text(sighting).iter().map(|t| tokenize(t)).collect(),
        }
    }
}

fn phrase_hits(tokens: &[String], phrase: &[String], prefix: bool) -> u32 {
    if phrase.is_empty() || tokens.len() < phrase.len() {
        return 0;
    }
    let last = phrase.len() - 1;
    tokens
        .windows(phrase.len())
        .filter(|window| {
            window.iter().zip(phrase).enumerate().all(|(i, (have, want))| {
                if prefix && i == last {
                    have.starts_with(want.as_str())
                } else {
                    have == want
                }
            })
        })
        .count() as u32
}

fn score(expr: &Expr, doc: &IndexedDoc) -> u32 {
    match expr {
        Expr::Phrase {
            column,
            tokens,
            prefix,
        } => match column {
            Some(c) => doc
                .columns
                .get(*c)
                .map(|col| phrase_hits(col, tokens, *prefix))
                .unwrap_or(0),
            None => doc
                .columns
                .iter()
                .map(|col| phrase_hits(col, tokens, *prefix))
                .sum(),
        },
        Expr::And(a, b) => {
            let (sa, sb) = (score(a, doc), score(b, doc));
            if sa > 0 && sb > 0 {
                sa + sb
            } else {
                0
            }
        }
        Expr::Or(a, b) => score(a, doc) + score(b, doc),
        Expr::Not(a, b) => {
            if score(b, doc) > 0 {
                0
            } else {
                score(a, doc)
            }
        }
    }
}

/// Per-id documents for quick rescoring.
pub(crate) type DocMap = HashMap<String, (Sighting, IndexedDoc)>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Heading;
    use chrono::{DateTime, Utc};

    fn doc(notes: &str) -> IndexedDoc {
        IndexedDoc::new(
            &Sighting::new(42, 7, DateTime::<Utc>::UNIX_EPOCH, 1.5, -3.25)
                .with_heading(Heading::Northeast)
                .with_count(12)
                .with_notes(notes),
        )
    }

    fn matches(query: &str, notes: &str) -> bool {
        Matcher::parse(query).unwrap().score(&doc(notes)) > 0
    }

    #[test]
    fn bareword_matches_any_column_case_insensitively() {
        assert!(matches("Lizard", "a big lizard"));
        assert!(matches("northeast", "nothing"));
        assert!(matches("42", "nothing"));
        assert!(!matches("crocodile", "a big lizard"));
    }

    #[test]
    fn column_filter_restricts_matching() {
        assert!(matches("notes:lizard", "lizard"));
        assert!(!matches("heading:lizard", "lizard"));
        assert!(matches("subjectId:42", "x"));
        assert!(!matches("observerId:42", "x"));
        assert!(matches("HEADING:NORTHEAST", "x"));
    }

    #[test]
    fn column_filter_applies_to_groups() {
        assert!(matches("notes:(raptor OR lizard)", "lizard"));
        assert!(!matches("heading:(raptor OR lizard)", "lizard"));
    }

    #[test]
    fn phrases_require_adjacency() {
        assert!(matches("\"big lizard\"", "a big lizard"));
        assert!(!matches("\"lizard big\"", "a big lizard"));
        assert!(matches("latitude:\"1.5\"", "x"));
        assert!(matches("longitude:\"3.25\"", "x"));
    }

    #[test]
    fn prefix_matches_last_token() {
        assert!(matches("liz*", "a big lizard"));
        assert!(matches("\"big liz\"*", "a big lizard"));
        assert!(!matches("zard*", "a big lizard"));
    }

    #[test]
    fn boolean_operators_and_precedence() {
        assert!(matches("big lizard", "a big lizard"));
        assert!(!matches("big AND crocodile", "a big lizard"));
        assert!(matches("crocodile OR lizard", "a big lizard"));
        assert!(!matches("lizard NOT big", "a big lizard"));
        assert!(matches("lizard NOT small", "a big lizard"));
        // NOT binds tighter than AND, AND tighter than OR.
        assert!(matches("crocodile AND big OR lizard", "a big lizard"));
        assert!(!matches("lizard NOT big AND lizard", "a big lizard"));
    }

    #[test]
    fn lowercase_keywords_are_terms() {
        assert!(!matches("lizard and crocodile", "a big lizard"));
        assert!(matches("lizard and crocodile", "lizard and crocodile"));
    }

    #[test]
    fn score_counts_occurrences() {
        let m = Matcher::parse("lizard").unwrap();
        assert_eq!(m.score(&doc("lizard lizard lizard")), 3);
        assert_eq!(m.score(&doc("one lizard")), 1);
    }

    #[test]
    fn malformed_queries_are_rejected() {
        for bad in [
            "(lizard",
            "lizard)",
            "()",
            "\"unterminated",
            "AND lizard",
            "lizard OR",
            "NOT lizard",
            "lizard NOT",
            "1.5",
            "notes:",
            "*",
            "a - b",
            ":lizard",
        ] {
            let err = Matcher::parse(bad).unwrap_err();
            assert_eq!(err.code(), "query_syntax", "accepted: {}", bad);
        }
    }

    #[test]
    fn id_column_parses_but_never_matches() {
        assert!(!matches("id:lizard", "lizard"));
        assert!(!matches("ID:(lizard OR big)", "a big lizard"));
        assert!(matches("id:lizard OR notes:lizard", "lizard"));
    }

    #[test]
    fn unknown_column_is_reported() {
        let err = Matcher::parse("altitude:100").unwrap_err();
        assert!(err.to_string().contains("no such column: altitude"));
    }
}
