// Recursive-descent parser for the Zena language.
//
// Organized the way the lexer/AST pair expects: this module owns token
// bookkeeping and the top-level item dispatch loop; the submodules
// below own one parsing concern each.

use crate::ParseError;
use std::ops::Range;
use zena_ast::*;
use zena_diagnostics::{Span, SpanMap};
use zena_lexer::{Lexer, Token, TokenSpan};

mod expressions;
mod items;
mod patterns;
mod statements;
mod types;

pub struct Parser<'a> {
    pub(crate) tokens: Vec<TokenSpan>,
    pub(crate) current: usize,
    pub(crate) source: &'a str,
    pub(crate) file: String,
    pub(crate) node_gen: NodeIdGen,
    pub span_map: SpanMap,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        Self::with_file(source, "<input>")
    }

    pub fn with_file(source: &'a str, file: &str) -> Result<Self, ParseError> {
        let lexer = Lexer::new(source);
        let tokens: Result<Vec<_>, _> = lexer.collect();
        let tokens = tokens.map_err(|e| ParseError::LexerError(format!("{:?}", e)))?;

        Ok(Self {
            tokens,
            current: 0,
            source,
            file: file.to_string(),
            node_gen: NodeIdGen::new(),
            span_map: SpanMap::new(),
        })
    }

    pub fn parse_file(&mut self) -> Result<Program, ParseError> {
        self.parse()
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut imports = Vec::new();
        let mut items = Vec::new();

        while !self.is_at_end() {
            if self.check(&Token::Import) {
                imports.push(self.parse_import()?);
            } else if self.check(&Token::Export) {
                items.push(self.parse_export()?);
            } else if self.check(&Token::Const) {
                items.push(self.parse_const()?);
            } else if self.check(&Token::Fn) {
                items.push(Item::Function(self.parse_function()?));
            } else if self.check(&Token::Class) {
                items.push(Item::Class(self.parse_class()?));
            } else if self.check(&Token::Interface) {
                items.push(Item::Interface(self.parse_interface()?));
            } else if self.check(&Token::Mixin) {
                items.push(Item::Mixin(self.parse_mixin()?));
            } else if self.check(&Token::Type) {
                items.push(Item::TypeAlias(self.parse_type_alias()?));
            } else if self.check(&Token::Enum) {
                items.push(Item::Enum(self.parse_enum()?));
            } else {
                return Err(self.error(
                    "expected a top-level item (import, export, const, fn, class, interface, mixin, type, enum)",
                ));
            }
        }

        Ok(Program { imports, items })
    }

    // ==================== Token helpers ====================

    pub(crate) fn match_token(&mut self, kind: &Token) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn match_tokens(&mut self, kinds: &[Token]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    pub(crate) fn check(&self, kind: &Token) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
        }
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    pub(crate) fn peek_span(&self) -> &TokenSpan {
        &self.tokens[self.current]
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current].token
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current - 1].token
    }

    pub(crate) fn consume(&mut self, kind: &Token, message: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    pub(crate) fn consume_identifier(&mut self) -> Result<String, ParseError> {
        if let Token::Ident(name) = self.peek() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error("expected identifier"))
        }
    }

    pub(crate) fn error(&self, message: &str) -> ParseError {
        let location = if self.is_at_end() {
            "end of file".to_string()
        } else {
            let span = &self.peek_span().span;
            format!("{}..{}", span.start, span.end)
        };

        ParseError::SyntaxError {
            location,
            message: message.to_string(),
        }
    }

    /// Current token's start offset, to be passed to [`Parser::finish`]
    /// once the node being parsed is complete.
    pub(crate) fn start(&self) -> usize {
        if self.is_at_end() {
            self.source.len()
        } else {
            self.peek_span().span.start
        }
    }

    /// Allocates a fresh `NodeId` for the node that began at `start`,
    /// records its span (from `start` to the end of the token just
    /// consumed) in the span map, and returns the id.
    pub(crate) fn finish(&mut self, start: usize) -> NodeId {
        let end = if self.current == 0 {
            start
        } else {
            self.tokens[self.current - 1].span.end
        };
        let range: Range<usize> = start..end.max(start);
        let span = Span::from_file_and_range(&self.file, self.source, range);
        let id = self.node_gen.next();
        self.span_map.record(id, span);
        id
    }

    pub(crate) fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.consume(&Token::LBrace, "expected '{'")?;
        let mut statements = Vec::new();

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        self.consume(&Token::RBrace, "expected '}'")?;

        Ok(Block { statements })
    }

    /// Parses `<T, U: Bound = Default, ...>`, or an empty list if no
    /// `<` follows.
    pub(crate) fn parse_type_params(&mut self) -> Result<Vec<TypeParam>, ParseError> {
        if !self.match_token(&Token::Lt) {
            return Ok(Vec::new());
        }

        let mut params = Vec::new();
        loop {
            let name = self.consume_identifier()?;

            let constraint = if self.match_token(&Token::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };

            let default = if self.match_token(&Token::Eq) {
                Some(self.parse_type()?)
            } else {
                None
            };

            params.push(TypeParam {
                name,
                constraint,
                default,
            });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::Gt, "expected '>' after type parameters")?;
        Ok(params)
    }

    /// Parses `<Arg1, Arg2>` when present, else an empty list. Used at
    /// call/new/struct-literal sites where type arguments are optional.
    pub(crate) fn parse_type_args_if_present(&mut self) -> Result<Vec<TypeExpr>, ParseError> {
        if !self.match_token(&Token::Lt) {
            return Ok(Vec::new());
        }

        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::Gt, "expected '>' after type arguments")?;
        Ok(args)
    }
}
