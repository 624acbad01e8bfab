//! Lexer for T-SQL DDL using logos.
//!
//! Keywords are not distinguished from identifiers here: T-SQL keywords are
//! case-insensitive and most of them are legal column names, so the parser
//! decides from context via [`Token::is_keyword`].

use crate::span::Span;
use logos::Logos;

/// Token types for T-SQL DDL.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"--[^\n]*")]
pub enum Token {
    /// Block comment. Consumed by its callback and never emitted.
    #[token("/*", block_comment)]
    BlockComment,

    /// Bare word: keyword, identifier, `@variable` or `#temp` name.
    #[regex(r"[A-Za-z_@#][A-Za-z0-9_@#$]*", |lex| lex.slice().to_string())]
    Word(String),

    /// Delimited identifier (`[name]` or `"name"`), unescaped.
    #[regex(r"\[([^\]]|\]\])*\]", |lex| unquote(lex.slice(), ']'))]
    #[regex(r#""([^"]|"")*""#, |lex| unquote(lex.slice(), '"'))]
    QuotedIdent(String),

    /// String literal (`'text'` or `N'text'`), unescaped.
    #[regex(r"[Nn]?'([^']|'')*'", |lex| unquote_string(lex.slice()))]
    Str(String),

    /// Numeric literal, kept as written.
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"0[xX][0-9A-Fa-f]*", |lex| lex.slice().to_string())]
    Number(String),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Eq,

    /// Any other operator character.
    #[regex(r"[<>!+\-*/%&|^~:{}?$\\]", |lex| lex.slice().to_string())]
    Symbol(String),
}

/// Consume a (possibly nested) block comment body after its opening `/*`.
///
/// An unterminated comment swallows the rest of the input, as the server does.
fn block_comment(lex: &mut logos::Lexer<Token>) -> logos::Skip {
    let rest = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut i = 0;
    while i < rest.len() {
        match (rest[i], rest.get(i + 1)) {
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            }
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    break;
                }
            }
            _ => i += 1,
        }
    }
    lex.bump(i.min(rest.len()));
    logos::Skip
}

/// Strip identifier delimiters and collapse doubled closing delimiters.
fn unquote(s: &str, close: char) -> String {
    let inner = &s[1..s.len() - 1];
    let doubled: String = [close, close].iter().collect();
    inner.replace(&doubled, &close.to_string())
}

/// Strip string quotes (and the `N` prefix) and collapse `''`.
fn unquote_string(s: &str) -> String {
    let body = s.strip_prefix(|c| c == 'N' || c == 'n').unwrap_or(s);
    body[1..body.len() - 1].replace("''", "'")
}

impl Token {
    /// Check whether this token is the given keyword (case-insensitive).
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    /// Check whether this token is one of the given keywords.
    pub fn is_any_keyword(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.is_keyword(k))
    }

    /// The identifier text if this token can name an object or column.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::QuotedIdent(w) => Some(w),
            _ => None,
        }
    }

    /// Check whether this token is the `GO` batch separator.
    pub fn is_batch_separator(&self) -> bool {
        self.is_keyword("GO")
    }
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Lexer that produces spanned tokens.
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    peeked: Option<Option<SpannedToken>>,
}

impl<'source> Lexer<'source> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            peeked: None,
        }
    }

    /// Peek at the next token without consuming it.
    pub fn peek(&mut self) -> Option<&SpannedToken> {
        if self.peeked.is_none() {
            self.peeked = Some(self.next_inner());
        }
        self.peeked.as_ref().and_then(|o| o.as_ref())
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Option<SpannedToken> {
        if let Some(peeked) = self.peeked.take() {
            peeked
        } else {
            self.next_inner()
        }
    }

    fn next_inner(&mut self) -> Option<SpannedToken> {
        loop {
            match self.inner.next() {
                Some(Ok(token)) => {
                    return Some(SpannedToken {
                        token,
                        span: self.inner.span().into(),
                    });
                }
                // Stray characters (unbalanced quotes, unicode punctuation) are
                // skipped; the parser reports the structural damage they cause.
                Some(Err(())) => continue,
                None => return None,
            }
        }
    }

    /// Get the source string.
    pub fn source(&self) -> &'source str {
        self.inner.source()
    }
}

impl Iterator for Lexer<'_> {
    type Item = SpannedToken;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Tokenize a source string into a vector of spanned tokens.
pub fn tokenize(source: &str) -> Vec<SpannedToken> {
    Lexer::new(source).collect()
}
