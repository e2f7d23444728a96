//! Tokenizer for Tally scripts, derived with logos.
//!
//! Comments (`// ...` lines and nestable `/* ... */` blocks) and both `\n`
//! and `\r\n` line endings are consumed here; the parser never sees them.

use crate::error::ParseError;
use logos::{FilterResult, Lexer, Logos};
use std::ops::Range;

/// Consume a `/* ... */` comment, honoring nesting.
fn block_comment(lex: &mut Lexer<Token>) -> FilterResult<(), ()> {
    let bytes = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                lex.bump(i);
                return FilterResult::Skip;
            }
        } else {
            i += 1;
        }
    }
    // Unterminated comment: consume to end of input and report.
    lex.bump(bytes.len());
    FilterResult::Error(())
}

/// A Tally script token.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[token("/*", block_comment)]
    BlockComment,

    // Keywords
    #[token("vars")]
    Vars,
    #[token("print")]
    Print,
    #[token("fail")]
    Fail,
    #[token("send")]
    Send,
    #[token("set_tx_meta")]
    SetTxMeta,
    #[token("source")]
    Source,
    #[token("destination")]
    Destination,
    #[token("max")]
    Max,
    #[token("remaining")]
    Remaining,
    #[token("to")]
    To,
    #[token("from")]
    From,
    #[token("meta")]
    Meta,

    // Type keywords for `vars` declarations
    #[token("account")]
    TyAccount,
    #[token("asset")]
    TyAsset,
    #[token("number")]
    TyNumber,
    #[token("string")]
    TyString,
    #[token("monetary")]
    TyMonetary,
    #[token("portion")]
    TyPortion,

    // Punctuation
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("=")]
    Equals,
    #[token(",")]
    Comma,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,

    // Literals
    #[regex(r"@[A-Za-z0-9:_-]+", |lex| lex.slice()[1..].to_owned())]
    Account(String),
    #[regex(r"\$[a-z_][a-z0-9_]*", |lex| lex.slice()[1..].to_owned())]
    Variable(String),
    #[regex(r"[A-Z][A-Z0-9]*(/[0-9]+)?", |lex| lex.slice().to_owned())]
    Asset(String),
    #[regex(r"[0-9]+/[0-9]+", |lex| lex.slice().to_owned(), priority = 3)]
    #[regex(r"[0-9]+(\.[0-9]+)?%", |lex| lex.slice().to_owned(), priority = 3)]
    Portion(String),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u64>().ok())]
    Number(u64),
    #[regex(r#""[^"\n]*""#, |lex| { let s = lex.slice(); s[1..s.len() - 1].to_owned() })]
    Str(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::BlockComment => f.write_str("/*"),
            Token::Vars => f.write_str("vars"),
            Token::Print => f.write_str("print"),
            Token::Fail => f.write_str("fail"),
            Token::Send => f.write_str("send"),
            Token::SetTxMeta => f.write_str("set_tx_meta"),
            Token::Source => f.write_str("source"),
            Token::Destination => f.write_str("destination"),
            Token::Max => f.write_str("max"),
            Token::Remaining => f.write_str("remaining"),
            Token::To => f.write_str("to"),
            Token::From => f.write_str("from"),
            Token::Meta => f.write_str("meta"),
            Token::TyAccount => f.write_str("account"),
            Token::TyAsset => f.write_str("asset"),
            Token::TyNumber => f.write_str("number"),
            Token::TyString => f.write_str("string"),
            Token::TyMonetary => f.write_str("monetary"),
            Token::TyPortion => f.write_str("portion"),
            Token::LBrace => f.write_str("{"),
            Token::RBrace => f.write_str("}"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Equals => f.write_str("="),
            Token::Comma => f.write_str(","),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Account(name) => write!(f, "@{name}"),
            Token::Variable(name) => write!(f, "${name}"),
            Token::Asset(code) => f.write_str(code),
            Token::Portion(text) => f.write_str(text),
            Token::Number(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

/// The 1-based line of a byte offset.
pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count()
        + 1
}

/// Tokenize a whole script, attaching source spans.
pub(crate) fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, ParseError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                let snippet = &source[span.start..span.end.min(source.len())];
                return Err(ParseError {
                    line: line_of(source, span.start),
                    message: format!("mismatched input '{snippet}'"),
                });
            }
        }
    }
    Ok(tokens)
}
