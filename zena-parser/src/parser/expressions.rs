// Expression parsing: a precedence-climbing chain from `or` down to
// `primary`, with postfix call/index/field/method chains layered on
// top of primary expressions.

use super::Parser;
use crate::ParseError;
use zena_ast::*;
use zena_lexer::Token;

impl<'a> Parser<'a> {
    pub(crate) fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_and()?;

        while self.match_token(&Token::Or) {
            let right = self.parse_and()?;
            let span = self.finish(start);
            left = Expression::Binary {
                left: Box::new(left),
                op: BinaryOp::Or,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_equality()?;

        while self.match_token(&Token::And) {
            let right = self.parse_equality()?;
            let span = self.finish(start);
            left = Expression::Binary {
                left: Box::new(left),
                op: BinaryOp::And,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_comparison()?;

        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                Token::RefEq => BinaryOp::RefEq,
                Token::RefNotEq => BinaryOp::RefNotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            let span = self.finish(start);
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            let span = self.finish(start);
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let span = self.finish(start);
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let span = self.finish(start);
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();

        if self.match_token(&Token::Minus) {
            let expr = self.parse_unary()?;
            let span = self.finish(start);
            return Ok(Expression::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
                span,
            });
        }
        if self.match_token(&Token::Not) {
            let expr = self.parse_unary()?;
            let span = self.finish(start);
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
                span,
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_token(&Token::Dot) {
                let name = self.consume_identifier()?;

                if self.check(&Token::LParen) || self.check(&Token::Lt) {
                    let type_args = self.parse_type_args_if_present()?;
                    let args = self.parse_call_args()?;
                    let span = self.finish(start);
                    expr = Expression::MethodCall {
                        receiver: Box::new(expr),
                        method: name,
                        type_args,
                        args,
                        span,
                    };
                } else {
                    let span = self.finish(start);
                    expr = Expression::FieldAccess {
                        object: Box::new(expr),
                        field: name,
                        span,
                    };
                }
                continue;
            }

            if self.match_token(&Token::LBracket) {
                let index = self.parse_expression()?;
                self.consume(&Token::RBracket, "expected ']' after index expression")?;
                let span = self.finish(start);
                expr = Expression::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span,
                };
                continue;
            }

            if self.check(&Token::LParen) {
                let args = self.parse_call_args()?;
                let span = self.finish(start);
                expr = Expression::Call {
                    callee: Box::new(expr),
                    type_args: Vec::new(),
                    args,
                    span,
                };
                continue;
            }

            if self.match_token(&Token::As) {
                let target = self.parse_type()?;
                let span = self.finish(start);
                expr = Expression::Cast {
                    expr: Box::new(expr),
                    target,
                    span,
                };
                continue;
            }

            break;
        }

        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expression>, ParseError> {
        self.consume(&Token::LParen, "expected '(' to begin argument list")?;
        let mut args = Vec::new();

        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }

        self.consume(&Token::RParen, "expected ')' after argument list")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();

        if let Token::IntLiteral(raw) = self.peek().clone() {
            self.advance();
            let value = parse_int_literal_value(&raw)?;
            let id = self.finish(start);
            return Ok(Expression::IntLiteral(value, id));
        }

        if let Token::FloatLiteral(raw) = self.peek().clone() {
            self.advance();
            let digits = raw.trim_end_matches("f32").trim_end_matches("f64");
            let value: f64 = digits.parse().map_err(|_| ParseError::SyntaxError {
                location: "float literal".to_string(),
                message: format!("invalid float literal `{}`", raw),
            })?;
            let id = self.finish(start);
            return Ok(Expression::FloatLiteral(value, id));
        }

        if let Token::StringLiteral(s) = self.peek().clone() {
            self.advance();
            let id = self.finish(start);
            return Ok(Expression::StringLiteral(s, id));
        }

        if self.match_token(&Token::True) {
            let id = self.finish(start);
            return Ok(Expression::BoolLiteral(true, id));
        }
        if self.match_token(&Token::False) {
            let id = self.finish(start);
            return Ok(Expression::BoolLiteral(false, id));
        }
        if self.match_token(&Token::Null) {
            let id = self.finish(start);
            return Ok(Expression::NullLiteral(id));
        }
        if self.match_token(&Token::This) {
            let id = self.finish(start);
            return Ok(Expression::This(id));
        }
        if self.match_token(&Token::Super) {
            let id = self.finish(start);
            return Ok(Expression::Super(id));
        }

        if self.match_token(&Token::New) {
            let class_name = self.consume_identifier()?;
            let type_args = self.parse_type_args_if_present()?;
            let args = self.parse_call_args()?;
            let span = self.finish(start);
            return Ok(Expression::New {
                class_name,
                type_args,
                args,
                span,
            });
        }

        if self.match_token(&Token::Match) {
            return self.parse_match_expression(start);
        }

        if self.check(&Token::LBrace) {
            return self.parse_block_expression();
        }

        if self.check(&Token::LBracket) {
            self.advance();
            let mut elements = Vec::new();
            if !self.check(&Token::RBracket) {
                loop {
                    elements.push(self.parse_expression()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
            }
            self.consume(&Token::RBracket, "expected ']' after array literal")?;
            let id = self.finish(start);
            return Ok(Expression::ArrayLiteral(elements, id));
        }

        if self.check(&Token::LParen) {
            return self.parse_paren_or_closure(start);
        }

        if self.check(&Token::Pipe) {
            return self.parse_pipe_closure(start);
        }

        if let Token::Ident(name) = self.peek().clone() {
            self.advance();

            // Struct literal: Point { x: 1, y: 2 }
            if self.check(&Token::LBrace) {
                return self.parse_struct_literal(name, Vec::new(), start);
            }

            if self.check(&Token::Lt) {
                let checkpoint = self.current;
                if let Ok(type_args) = self.parse_type_args_if_present() {
                    if self.check(&Token::LBrace) {
                        return self.parse_struct_literal(name, type_args, start);
                    }
                }
                self.current = checkpoint;
            }

            let id = self.finish(start);
            return Ok(Expression::Ident(name, id));
        }

        Err(self.error("expected an expression"))
    }

    fn parse_struct_literal(
        &mut self,
        class_name: String,
        type_args: Vec<TypeExpr>,
        start: usize,
    ) -> Result<Expression, ParseError> {
        self.consume(&Token::LBrace, "expected '{' after struct literal name")?;
        let mut fields = Vec::new();

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let field_name = self.consume_identifier()?;
            self.consume(&Token::Colon, "expected ':' after field name")?;
            let value = self.parse_expression()?;
            fields.push((field_name, value));
            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::RBrace, "expected '}' after struct literal")?;
        let span = self.finish(start);
        Ok(Expression::StructLiteral {
            class_name,
            type_args,
            fields,
            span,
        })
    }

    fn parse_match_expression(&mut self, start: usize) -> Result<Expression, ParseError> {
        let scrutinee = self.parse_expression()?;
        self.consume(&Token::LBrace, "expected '{' to begin match arms")?;

        let mut arms = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            arms.push(self.parse_match_arm()?);
            self.match_token(&Token::Comma);
        }

        self.consume(&Token::RBrace, "expected '}' after match arms")?;
        let span = self.finish(start);
        Ok(Expression::Match {
            scrutinee: Box::new(scrutinee),
            arms,
            span,
        })
    }

    pub(crate) fn parse_block_expression(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        self.consume(&Token::LBrace, "expected '{'")?;

        let mut statements = Vec::new();
        let mut trailing = None;

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            // A trailing expression (no semicolon) right before `}` becomes
            // the block's value instead of a statement.
            if self.looks_like_trailing_expression() {
                let expr = self.parse_expression()?;
                if self.check(&Token::RBrace) {
                    trailing = Some(Box::new(expr));
                    break;
                }
                statements.push(Statement::Expression(expr));
                self.match_token(&Token::Semicolon);
            } else {
                statements.push(self.parse_statement()?);
            }
        }

        self.consume(&Token::RBrace, "expected '}' to close block")?;
        let span = self.finish(start);
        Ok(Expression::Block {
            statements,
            trailing,
            span,
        })
    }

    /// Heuristic used only inside block expressions to decide whether the
    /// next construct is a statement keyword or a value-producing tail
    /// expression. Declaration/control-flow keywords always start a
    /// statement; anything else is parsed as an expression and checked for
    /// a following `}`.
    fn looks_like_trailing_expression(&self) -> bool {
        !matches!(
            self.peek(),
            Token::Let
                | Token::Return
                | Token::Break
                | Token::Continue
                | Token::If
                | Token::While
                | Token::For
        )
    }

    /// Disambiguates `(expr)`, `(a, b)` tuple literals and `(a, b) => expr`
    /// closures, all of which start with `(`.
    fn parse_paren_or_closure(&mut self, start: usize) -> Result<Expression, ParseError> {
        let checkpoint = self.current;

        if let Ok(params) = self.try_parse_closure_params() {
            if self.match_token(&Token::FatArrow) {
                return self.finish_closure(params, start);
            }
        }
        self.current = checkpoint;

        self.advance(); // consume '('
        let mut elements = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                elements.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "expected ')' after expression")?;

        if elements.len() == 1 {
            return Ok(elements.into_iter().next().unwrap());
        }
        let id = self.finish(start);
        Ok(Expression::TupleLiteral(elements, id))
    }

    /// `|a, b| expr` closure shorthand, grounded in the same pipe token
    /// used for union types, disambiguated purely by position (a type can
    /// never begin an expression).
    fn parse_pipe_closure(&mut self, start: usize) -> Result<Expression, ParseError> {
        self.advance(); // consume '|'
        let mut params = Vec::new();

        if !self.check(&Token::Pipe) {
            loop {
                let param_start = self.start();
                let name = self.consume_identifier()?;
                let ty = if self.match_token(&Token::Colon) {
                    self.parse_type()?
                } else {
                    TypeExpr {
                        id: self.finish(param_start),
                        kind: TypeExprKind::named("any"),
                    }
                };
                let span = self.finish(param_start);
                params.push(Param {
                    name,
                    ty,
                    default: None,
                    span,
                });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }

        self.consume(&Token::Pipe, "expected '|' to close closure parameters")?;
        self.finish_closure(params, start)
    }

    fn try_parse_closure_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.consume(&Token::LParen, "expected '('")?;
        let mut params = Vec::new();

        if !self.check(&Token::RParen) {
            loop {
                let param_start = self.start();
                let name = self.consume_identifier()?;
                let ty = if self.match_token(&Token::Colon) {
                    self.parse_type()?
                } else {
                    TypeExpr {
                        id: self.finish(param_start),
                        kind: TypeExprKind::named("any"),
                    }
                };
                let span = self.finish(param_start);
                params.push(Param {
                    name,
                    ty,
                    default: None,
                    span,
                });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }

        self.consume(&Token::RParen, "expected ')'")?;
        Ok(params)
    }

    fn finish_closure(&mut self, params: Vec<Param>, start: usize) -> Result<Expression, ParseError> {
        let return_type = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.check(&Token::LBrace) {
            let block_expr = self.parse_block_expression()?;
            match block_expr {
                Expression::Block {
                    statements,
                    trailing,
                    ..
                } => ClosureBody::Block(Block {
                    statements: if let Some(tail) = trailing {
                        let mut stmts = statements;
                        stmts.push(Statement::Expression(*tail));
                        stmts
                    } else {
                        statements
                    },
                }),
                other => ClosureBody::Expr(other),
            }
        } else {
            ClosureBody::Expr(self.parse_expression()?)
        };

        let span = self.finish(start);
        Ok(Expression::Closure {
            params,
            return_type,
            body: Box::new(body),
            span,
        })
    }
}

/// Strips a trailing integer-width suffix such as `i32`/`u8`, if present.
fn parse_int_literal_value(raw: &str) -> Result<i64, ParseError> {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().map_err(|_| ParseError::SyntaxError {
        location: "integer literal".to_string(),
        message: format!("invalid integer literal `{}`", raw),
    })
}
