// Statement parsing.

use super::Parser;
use crate::ParseError;
use zena_ast::*;
use zena_lexer::Token;

impl<'a> Parser<'a> {
    pub(crate) fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let start = self.start();

        if self.match_token(&Token::Let) {
            let is_mutable = self.match_token(&Token::Mut);
            let name = self.consume_identifier()?;

            let ty = if self.match_token(&Token::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };

            self.consume(&Token::Eq, "expected '=' in let statement")?;
            let value = self.parse_expression()?;
            self.consume(&Token::Semicolon, "expected ';' after let statement")?;
            let span = self.finish(start);

            return Ok(Statement::Let {
                is_mutable,
                name,
                ty,
                value,
                span,
            });
        }

        if self.match_token(&Token::Return) {
            let expr = if !self.check(&Token::Semicolon) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.consume(&Token::Semicolon, "expected ';' after return")?;
            let span = self.finish(start);
            return Ok(Statement::Return(expr, span));
        }

        if self.match_token(&Token::Break) {
            self.consume(&Token::Semicolon, "expected ';' after break")?;
            let span = self.finish(start);
            return Ok(Statement::Break(span));
        }

        if self.match_token(&Token::Continue) {
            self.consume(&Token::Semicolon, "expected ';' after continue")?;
            let span = self.finish(start);
            return Ok(Statement::Continue(span));
        }

        if self.match_token(&Token::If) {
            return self.parse_if_statement(start);
        }

        if self.match_token(&Token::While) {
            let condition = self.parse_expression()?;
            let body = self.parse_block()?;
            let span = self.finish(start);
            return Ok(Statement::While {
                condition,
                body,
                span,
            });
        }

        if self.match_token(&Token::For) {
            return self.parse_for_statement(start);
        }

        // Assignment: `target = value;`, disambiguated from an expression
        // statement by trying the assignment target first and backtracking
        // if no `=` follows.
        let checkpoint = self.current;
        if let Ok(target) = self.parse_expression() {
            if self.match_token(&Token::Eq) {
                let value = self.parse_expression()?;
                self.consume(&Token::Semicolon, "expected ';' after assignment")?;
                let span = self.finish(start);
                return Ok(Statement::Assign {
                    target,
                    value,
                    span,
                });
            }
            if !self.check(&Token::LBrace) {
                self.consume(&Token::Semicolon, "expected ';' after expression")?;
            }
            return Ok(Statement::Expression(target));
        }
        self.current = checkpoint;

        Err(self.error("expected a statement"))
    }

    fn parse_if_statement(&mut self, start: usize) -> Result<Statement, ParseError> {
        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;

        let mut elif_branches = Vec::new();
        let mut else_block = None;

        loop {
            if self.match_token(&Token::Elif) {
                let elif_condition = self.parse_expression()?;
                let elif_block = self.parse_block()?;
                elif_branches.push((elif_condition, elif_block));
                continue;
            }
            if self.match_token(&Token::Else) {
                if self.match_token(&Token::If) {
                    // `else if` behaves the same as `elif`.
                    let elif_condition = self.parse_expression()?;
                    let elif_block = self.parse_block()?;
                    elif_branches.push((elif_condition, elif_block));
                    continue;
                }
                else_block = Some(self.parse_block()?);
            }
            break;
        }

        let span = self.finish(start);
        Ok(Statement::If {
            condition,
            then_block,
            elif_branches,
            else_block,
            span,
        })
    }

    fn parse_for_statement(&mut self, start: usize) -> Result<Statement, ParseError> {
        // `for x in iterable { ... }`
        if matches!(self.peek(), Token::Ident(_)) {
            let checkpoint = self.current;
            let binding = self.consume_identifier()?;
            if self.match_token(&Token::In) {
                let iterable = self.parse_expression()?;
                let body = self.parse_block()?;
                let span = self.finish(start);
                return Ok(Statement::ForIn {
                    binding,
                    iterable,
                    body,
                    span,
                });
            }
            self.current = checkpoint;
        }

        // C-style: `for init; condition; post { ... }`
        let init = if self.check(&Token::Semicolon) {
            self.advance();
            None
        } else {
            let stmt = self.parse_statement()?;
            Some(Box::new(stmt))
        };

        let condition = if !self.check(&Token::Semicolon) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume(&Token::Semicolon, "expected ';' after for condition")?;

        let post = if !self.check(&Token::LBrace) {
            Some(Box::new(self.parse_post_statement()?))
        } else {
            None
        };

        let body = self.parse_block()?;
        let span = self.finish(start);

        Ok(Statement::For {
            init,
            condition,
            post,
            body,
            span,
        })
    }

    /// The `post` clause of a C-style `for` has no terminating `;`, unlike
    /// every other statement form, so it gets its own small entry point
    /// rather than reusing `parse_statement`.
    fn parse_post_statement(&mut self) -> Result<Statement, ParseError> {
        let start = self.start();
        let target = self.parse_expression()?;

        if self.match_token(&Token::Eq) {
            let value = self.parse_expression()?;
            let span = self.finish(start);
            return Ok(Statement::Assign {
                target,
                value,
                span,
            });
        }

        Ok(Statement::Expression(target))
    }
}
