//! FILENAME: parser/src/parser.rs
//! PURPOSE: A recursive-descent parser that drives a `Builder` in
//! postfix order to assemble a formula's `Expr` tree.
//! CONTEXT: Grammar, loosest to tightest binding:
//!   comparison  := additive ( ('=' | '<>' | '<' | '<=' | '>' | '>=') additive )*
//!   additive    := multiplicative ( ('+' | '-') multiplicative )*
//!   multiplicative := power ( ('*' | '/') power )*
//!   power       := unary ( '^' unary )*          (right-associative)
//!   unary       := '-' unary | primary
//!   primary     := number | string | reference | '(' comparison ')'
//! A leading '=' on the whole formula is optional and consumed once, up
//! front, before entering `comparison`.

use std::fmt;

use crate::ast::Expr;
use crate::builder::Builder;
use crate::lexer::Lexer;
use crate::reference::Reference;
use crate::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a complete formula string (with or without a leading `=`)
/// into an `Expr`. The entire input must be consumed; trailing
/// garbage after a complete expression is an error.
pub fn parse_formula(input: &str) -> ParseResult<Expr> {
    let mut parser = Parser::new(input)?;
    parser.parse_comparison()?;
    if parser.current != Token::Eof {
        return Err(ParseError(format!("unexpected trailing token '{}'", parser.current)));
    }
    parser.builder.finish().map_err(|e| ParseError(e.0))
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    builder: Builder,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> ParseResult<Self> {
        let input = input.strip_prefix('=').unwrap_or(input);
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token().map_err(ParseError)?;
        Ok(Parser {
            lexer,
            current,
            builder: Builder::new(),
        })
    }

    fn advance(&mut self) -> ParseResult<()> {
        self.current = self.lexer.next_token().map_err(ParseError)?;
        Ok(())
    }

    fn expect(&mut self, tok: &Token) -> ParseResult<()> {
        if &self.current == tok {
            self.advance()
        } else {
            Err(ParseError(format!("expected '{}', found '{}'", tok, self.current)))
        }
    }

    fn parse_comparison(&mut self) -> ParseResult<()> {
        self.parse_additive()?;
        loop {
            let op = match &self.current {
                Token::Eq => Some(Builder::eq as fn(&mut Builder) -> Result<(), crate::builder::BuilderError>),
                Token::Ne => Some(Builder::ne),
                Token::Lt => Some(Builder::lt),
                Token::Le => Some(Builder::le),
                Token::Gt => Some(Builder::gt),
                Token::Ge => Some(Builder::ge),
                _ => None,
            };
            let Some(op) = op else { break };
            self.advance()?;
            self.parse_additive()?;
            op(&mut self.builder).map_err(|e| ParseError(e.0))?;
        }
        Ok(())
    }

    fn parse_additive(&mut self) -> ParseResult<()> {
        self.parse_multiplicative()?;
        loop {
            match self.current {
                Token::Plus => {
                    self.advance()?;
                    self.parse_multiplicative()?;
                    self.builder.add().map_err(|e| ParseError(e.0))?;
                }
                Token::Minus => {
                    self.advance()?;
                    self.parse_multiplicative()?;
                    self.builder.sub().map_err(|e| ParseError(e.0))?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_multiplicative(&mut self) -> ParseResult<()> {
        self.parse_unary()?;
        loop {
            match self.current {
                Token::Star => {
                    self.advance()?;
                    self.parse_unary()?;
                    self.builder.mul().map_err(|e| ParseError(e.0))?;
                }
                Token::Slash => {
                    self.advance()?;
                    self.parse_unary()?;
                    self.builder.div().map_err(|e| ParseError(e.0))?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Binds looser than `^` so that `-2^2` parses as `-(2^2)`.
    fn parse_unary(&mut self) -> ParseResult<()> {
        if self.current == Token::Minus {
            self.advance()?;
            self.parse_unary()?;
            self.builder.negate().map_err(|e| ParseError(e.0))?;
            Ok(())
        } else {
            self.parse_power()
        }
    }

    /// Right-associative: `2^3^2` parses as `2^(3^2)`.
    fn parse_power(&mut self) -> ParseResult<()> {
        self.parse_primary()?;
        if self.current == Token::Caret {
            self.advance()?;
            self.parse_unary()?;
            self.builder.pow().map_err(|e| ParseError(e.0))?;
        }
        Ok(())
    }

    fn parse_primary(&mut self) -> ParseResult<()> {
        match self.current.clone() {
            Token::Number(n) => {
                self.builder.push_num(n);
                self.advance()
            }
            Token::Text(s) => {
                self.builder.push_text(s);
                self.advance()
            }
            Token::Ident(s) => {
                let reference = Reference::parse(&s).map_err(|e| ParseError(e.0))?;
                self.builder.push_ref(reference);
                self.advance()
            }
            Token::LParen => {
                self.advance()?;
                self.parse_comparison()?;
                self.expect(&Token::RParen)
            }
            other => Err(ParseError(format!("unexpected token '{}'", other))),
        }
    }
}
