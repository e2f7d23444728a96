//! Recursive-descent parser: token stream → AST.

use crate::ast::{
    Destination, Expr, Literal, MetaOrigin, MonetaryAmount, PortionSlot, Script, Source, Stmt,
    VarDecl,
};
use crate::error::ParseError;
use crate::lexer::{line_of, tokenize, Token};
use std::ops::Range;
use tally_common::Type;

/// Parse a whole script.
pub fn parse(source: &str) -> Result<Script, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    parser.parse_script()
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.source.len());
        line_of(self.source, offset)
    }

    /// The standard rejection: what we found, and what would have fit.
    fn mismatched(&self, expected: &str) -> ParseError {
        let found = self
            .peek()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "<end of input>".to_string());
        ParseError {
            line: self.line(),
            message: format!("mismatched input '{found}', expected {expected}"),
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), ParseError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.mismatched(expected))
        }
    }

    /// Consume `token` if it is next; entry separators are optional.
    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_script(&mut self) -> Result<Script, ParseError> {
        let mut vars = Vec::new();
        if self.peek() == Some(&Token::Vars) {
            self.pos += 1;
            self.expect(Token::LBrace, "'{'")?;
            while self.peek() != Some(&Token::RBrace) {
                if self.peek().is_none() {
                    return Err(self.mismatched("'}'"));
                }
                vars.push(self.parse_var_decl()?);
            }
            self.pos += 1; // consume '}'
        }

        let mut statements = Vec::new();
        while self.peek().is_some() {
            statements.push(self.parse_statement()?);
        }

        Ok(Script { vars, statements })
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl, ParseError> {
        let typ = match self.peek() {
            Some(Token::TyAccount) => Type::Account,
            Some(Token::TyAsset) => Type::Asset,
            Some(Token::TyNumber) => Type::Number,
            Some(Token::TyString) => Type::String,
            Some(Token::TyMonetary) => Type::Monetary,
            Some(Token::TyPortion) => Type::Portion,
            _ => return Err(self.mismatched("a type")),
        };
        self.pos += 1;

        let name = match self.peek().cloned() {
            Some(Token::Variable(name)) => {
                self.pos += 1;
                name
            }
            _ => return Err(self.mismatched("a variable")),
        };

        let origin = if self.eat(&Token::Equals) {
            self.expect(Token::Meta, "'meta'")?;
            self.expect(Token::LParen, "'('")?;
            let account = self.parse_account_expr()?;
            self.expect(Token::Comma, "','")?;
            let key = match self.peek().cloned() {
                Some(Token::Str(key)) => {
                    self.pos += 1;
                    key
                }
                _ => return Err(self.mismatched("a string")),
            };
            self.expect(Token::RParen, "')'")?;
            Some(MetaOrigin { account, key })
        } else {
            None
        };

        Ok(VarDecl { typ, name, origin })
    }

    fn parse_account_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek().cloned() {
            Some(Token::Account(name)) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::Account(name)))
            }
            Some(Token::Variable(name)) => {
                self.pos += 1;
                Ok(Expr::Variable(name))
            }
            _ => Err(self.mismatched("an account")),
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Token::Print) => {
                self.pos += 1;
                Ok(Stmt::Print(self.parse_expr()?))
            }
            Some(Token::Fail) => {
                self.pos += 1;
                Ok(Stmt::Fail)
            }
            Some(Token::SetTxMeta) => {
                self.pos += 1;
                self.expect(Token::LParen, "'('")?;
                let key = match self.peek().cloned() {
                    Some(Token::Str(key)) => {
                        self.pos += 1;
                        key
                    }
                    _ => return Err(self.mismatched("a string")),
                };
                self.expect(Token::Comma, "','")?;
                let value = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(Stmt::SetTxMeta { key, value })
            }
            Some(Token::Send) => {
                self.pos += 1;
                let amount = self.parse_expr()?;
                self.expect(Token::LParen, "'('")?;
                self.expect(Token::Source, "'source'")?;
                self.expect(Token::Equals, "'='")?;
                let source = self.parse_source()?;
                self.eat(&Token::Comma);
                self.expect(Token::Destination, "'destination'")?;
                self.expect(Token::Equals, "'='")?;
                let destination = self.parse_destination()?;
                self.expect(Token::RParen, "')'")?;
                Ok(Stmt::Send {
                    amount,
                    source,
                    destination,
                })
            }
            _ => Err(self.mismatched("a statement")),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            if self.eat(&Token::Plus) {
                let rhs = self.parse_term()?;
                lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
            } else if self.eat(&Token::Minus) {
                let rhs = self.parse_term()?;
                lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::Number(n)))
            }
            Some(Token::Account(name)) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::Account(name)))
            }
            Some(Token::Asset(code)) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::Asset(code)))
            }
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::String(s)))
            }
            Some(Token::Portion(text)) => {
                let portion = text.parse().map_err(|e| ParseError {
                    line: self.line(),
                    message: format!("{e}"),
                })?;
                self.pos += 1;
                Ok(Expr::Literal(Literal::Portion(portion)))
            }
            Some(Token::Variable(name)) => {
                self.pos += 1;
                Ok(Expr::Variable(name))
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                let asset = match self.peek().cloned() {
                    Some(Token::Asset(code)) => {
                        self.pos += 1;
                        code
                    }
                    _ => return Err(self.mismatched("an asset")),
                };
                let amount = match self.peek() {
                    Some(Token::Number(n)) => {
                        let n = *n;
                        self.pos += 1;
                        MonetaryAmount::Amount(n)
                    }
                    Some(Token::Star) => {
                        self.pos += 1;
                        MonetaryAmount::All
                    }
                    _ => return Err(self.mismatched("an amount or '*'")),
                };
                self.expect(Token::RBracket, "']'")?;
                Ok(Expr::Literal(Literal::Monetary { asset, amount }))
            }
            _ => Err(self.mismatched("an expression")),
        }
    }

    fn parse_source(&mut self) -> Result<Source, ParseError> {
        if !self.eat(&Token::LBrace) {
            return Ok(Source::Account(self.parse_term()?));
        }

        // `{ p from S ... }` is an allotment; everything else is a
        // concatenation. A leading variable is a portion only if `from`
        // follows it.
        let allotment = matches!(
            self.peek(),
            Some(Token::Portion(_)) | Some(Token::Remaining)
        ) || (matches!(self.peek(), Some(Token::Variable(_)))
            && self.peek2() == Some(&Token::From));

        if allotment {
            let mut entries = Vec::new();
            loop {
                let slot = self.parse_portion_slot()?;
                self.expect(Token::From, "'from'")?;
                let source = self.parse_source()?;
                entries.push((slot, source));
                self.eat(&Token::Comma);
                if self.eat(&Token::RBrace) {
                    return Ok(Source::Allotment(entries));
                }
                if self.peek().is_none() {
                    return Err(self.mismatched("'}'"));
                }
            }
        }

        let mut sources = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                if sources.is_empty() {
                    return Err(self.mismatched("a source"));
                }
                return Ok(Source::Concat(sources));
            }
            if self.peek().is_none() {
                return Err(self.mismatched("'}'"));
            }
            sources.push(self.parse_source()?);
            self.eat(&Token::Comma);
        }
    }

    fn parse_portion_slot(&mut self) -> Result<PortionSlot, ParseError> {
        match self.peek().cloned() {
            Some(Token::Portion(text)) => {
                let portion = text.parse().map_err(|e| ParseError {
                    line: self.line(),
                    message: format!("{e}"),
                })?;
                self.pos += 1;
                Ok(PortionSlot::Literal(portion))
            }
            Some(Token::Remaining) => {
                self.pos += 1;
                Ok(PortionSlot::Remaining)
            }
            Some(Token::Variable(name)) => {
                self.pos += 1;
                Ok(PortionSlot::Variable(name))
            }
            _ => Err(self.mismatched("a portion")),
        }
    }

    fn parse_destination(&mut self) -> Result<Destination, ParseError> {
        if !self.eat(&Token::LBrace) {
            return Ok(Destination::Account(self.parse_term()?));
        }

        if self.peek() == Some(&Token::Max) {
            // Ordered form: capped slices, then a mandatory `remaining`.
            let mut steps = Vec::new();
            while self.eat(&Token::Max) {
                let cap = self.parse_term()?;
                self.expect(Token::To, "'to'")?;
                let destination = self.parse_destination()?;
                steps.push((cap, destination));
                self.eat(&Token::Comma);
            }
            self.expect(Token::Remaining, "'remaining'")?;
            self.expect(Token::To, "'to'")?;
            let remaining = self.parse_destination()?;
            self.eat(&Token::Comma);
            self.expect(Token::RBrace, "'}'")?;
            return Ok(Destination::Ordered {
                steps,
                remaining: Box::new(remaining),
            });
        }

        let mut entries = Vec::new();
        loop {
            let slot = self.parse_portion_slot()?;
            self.expect(Token::To, "'to'")?;
            let destination = self.parse_destination()?;
            entries.push((slot, destination));
            self.eat(&Token::Comma);
            if self.eat(&Token::RBrace) {
                return Ok(Destination::Allotment(entries));
            }
            if self.peek().is_none() {
                return Err(self.mismatched("'}'"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_arithmetic_is_left_associative() {
        let script = parse("print 29 + 15 - 2").unwrap();
        assert_eq!(
            script.statements,
            vec![Stmt::Print(Expr::Sub(
                Box::new(Expr::Add(
                    Box::new(Expr::Literal(Literal::Number(29))),
                    Box::new(Expr::Literal(Literal::Number(15))),
                )),
                Box::new(Expr::Literal(Literal::Number(2))),
            ))]
        );
    }

    #[test]
    fn vars_block_with_meta() {
        let script = parse(
            r#"vars {
                account $sale
                account $seller = meta($sale, "seller")
            }
            print $sale"#,
        )
        .unwrap();
        assert_eq!(script.vars.len(), 2);
        assert_eq!(script.vars[1].name, "seller");
        assert!(script.vars[1].origin.is_some());
    }

    #[test]
    fn send_with_simple_source_and_destination() {
        let script = parse(
            "send [EUR/2 99] (
                source = @alice
                destination = @bob
            )",
        )
        .unwrap();
        match &script.statements[0] {
            Stmt::Send {
                source,
                destination,
                ..
            } => {
                assert_eq!(
                    source,
                    &Source::Account(Expr::Literal(Literal::Account("alice".into())))
                );
                assert_eq!(
                    destination,
                    &Destination::Account(Expr::Literal(Literal::Account("bob".into())))
                );
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn source_concat_vs_allotment() {
        let concat = parse("send [GEM 1] (source = { $a $b } destination = @c)").unwrap();
        match &concat.statements[0] {
            Stmt::Send { source, .. } => assert!(matches!(source, Source::Concat(s) if s.len() == 2)),
            _ => unreachable!(),
        }

        let allotment =
            parse("send [GEM 1] (source = { 50% from @a, 50% from @b } destination = @c)").unwrap();
        match &allotment.statements[0] {
            Stmt::Send { source, .. } => {
                assert!(matches!(source, Source::Allotment(e) if e.len() == 2))
            }
            _ => unreachable!(),
        }

        let var_allotment =
            parse("send [GEM 1] (source = { $p from @a, remaining from @b } destination = @c)")
                .unwrap();
        match &var_allotment.statements[0] {
            Stmt::Send { source, .. } => {
                assert!(matches!(source, Source::Allotment(e) if e.len() == 2))
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn ordered_destination_requires_remaining() {
        let ok = parse(
            "send [COIN 50] (
                source = @a
                destination = {
                    max [COIN 10] to @b
                    remaining to @c
                }
            )",
        );
        assert!(ok.is_ok());

        let missing = parse(
            "send [COIN 50] (
                source = @a
                destination = { max [COIN 10] to @b }
            )",
        )
        .unwrap_err();
        assert!(missing.message.contains("remaining"));
    }

    #[test]
    fn monetary_star_form() {
        let script = parse("send [EUR/2 *] (source = @alice destination = @bob)").unwrap();
        match &script.statements[0] {
            Stmt::Send { amount, .. } => assert_eq!(
                amount,
                &Expr::Literal(Literal::Monetary {
                    asset: "EUR/2".into(),
                    amount: MonetaryAmount::All
                })
            ),
            _ => unreachable!(),
        }
    }

    #[test]
    fn print_fail_is_mismatched_input() {
        let err = parse("print fail").unwrap_err();
        assert!(err.message.contains("mismatched input"));
        assert!(err.message.contains("expected"));
    }

    #[test]
    fn nested_destination_allotment() {
        let script = parse(
            "send [GEM 10] (
                source = @world
                destination = {
                    1/2 to { 1/2 to @a, 1/2 to @b }
                    1/2 to @c
                }
            )",
        )
        .unwrap();
        match &script.statements[0] {
            Stmt::Send { destination, .. } => match destination {
                Destination::Allotment(entries) => {
                    assert!(matches!(entries[0].1, Destination::Allotment(_)))
                }
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn statement_keyword_errors() {
        assert!(parse("vars { account $a } vars { account $b }")
            .unwrap_err()
            .message
            .contains("mismatched input"));
        assert!(parse("frobnicate").is_err());
    }
}
