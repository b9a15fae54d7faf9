// Type annotation parsing.
//
// `parse_type` produces a `TypeExpr`; the checker's type resolver is
// what turns this into a semantic `zena_compiler::types::Type`.

use super::Parser;
use crate::ParseError;
use zena_ast::*;
use zena_lexer::Token;

impl<'a> Parser<'a> {
    pub(crate) fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.start();
        let kind = self.parse_type_kind()?;
        let id = self.finish(start);
        let mut ty = TypeExpr { id, kind };

        // Postfix array sigil: T[], T[][]
        while self.check(&Token::LBracket) {
            let checkpoint = self.current;
            self.advance();
            if self.match_token(&Token::RBracket) {
                let array_id = self.finish(start);
                ty = TypeExpr {
                    id: array_id,
                    kind: TypeExprKind::Array(Box::new(ty)),
                };
            } else {
                self.current = checkpoint;
                break;
            }
        }

        // Union: T | U | V
        if self.check(&Token::Pipe) {
            let mut members = vec![ty];
            while self.match_token(&Token::Pipe) {
                members.push(self.parse_type_no_union()?);
            }
            let union_id = self.finish(start);
            ty = TypeExpr {
                id: union_id,
                kind: TypeExprKind::Union(members),
            };
        }

        Ok(ty)
    }

    /// Like `parse_type` but does not itself consume a trailing `|`
    /// union tail, used when parsing union members.
    fn parse_type_no_union(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.start();
        let kind = self.parse_type_kind()?;
        let id = self.finish(start);
        let mut ty = TypeExpr { id, kind };

        while self.check(&Token::LBracket) {
            let checkpoint = self.current;
            self.advance();
            if self.match_token(&Token::RBracket) {
                let array_id = self.finish(start);
                ty = TypeExpr {
                    id: array_id,
                    kind: TypeExprKind::Array(Box::new(ty)),
                };
            } else {
                self.current = checkpoint;
                break;
            }
        }

        Ok(ty)
    }

    fn parse_type_kind(&mut self) -> Result<TypeExprKind, ParseError> {
        // Primitive numeric/boolean/string/any/void types
        let primitive = match self.peek() {
            Token::I8 => Some("i8"),
            Token::I16 => Some("i16"),
            Token::I32 => Some("i32"),
            Token::I64 => Some("i64"),
            Token::U8 => Some("u8"),
            Token::U16 => Some("u16"),
            Token::U32 => Some("u32"),
            Token::U64 => Some("u64"),
            Token::F32 => Some("f32"),
            Token::F64 => Some("f64"),
            Token::Bool => Some("bool"),
            Token::StringType => Some("string"),
            Token::Any => Some("any"),
            Token::Void => Some("void"),
            _ => None,
        };
        if let Some(name) = primitive {
            self.advance();
            return Ok(TypeExprKind::Named(name.to_string()));
        }

        if self.match_token(&Token::This) {
            return Ok(TypeExprKind::This);
        }

        // Literal types: 42, "foo", true, false
        if let Token::IntLiteral(raw) = self.peek() {
            let value = parse_int_literal(raw)?;
            self.advance();
            return Ok(TypeExprKind::Literal(LiteralValue::Int(value)));
        }
        if let Token::StringLiteral(s) = self.peek() {
            let s = s.clone();
            self.advance();
            return Ok(TypeExprKind::Literal(LiteralValue::Str(s)));
        }
        if self.match_token(&Token::True) {
            return Ok(TypeExprKind::Literal(LiteralValue::Bool(true)));
        }
        if self.match_token(&Token::False) {
            return Ok(TypeExprKind::Literal(LiteralValue::Bool(false)));
        }

        // Record type: { name: Type, ... }
        if self.check(&Token::LBrace) {
            self.advance();
            let mut fields = Vec::new();
            while !self.check(&Token::RBrace) && !self.is_at_end() {
                let field_name = self.consume_identifier()?;
                self.consume(&Token::Colon, "expected ':' after record field name")?;
                let field_type = self.parse_type()?;
                fields.push((field_name, field_type));
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.consume(&Token::RBrace, "expected '}' after record type")?;
            return Ok(TypeExprKind::Record(fields));
        }

        // Parenthesized: tuple `(T, U)` or function type `(T, U) -> R`
        if self.check(&Token::LParen) {
            self.advance();
            let mut elements = Vec::new();
            if !self.check(&Token::RParen) {
                loop {
                    elements.push(self.parse_type()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
            }
            self.consume(&Token::RParen, "expected ')' after type list")?;

            if self.match_token(&Token::Arrow) {
                let return_type = Box::new(self.parse_type()?);
                return Ok(TypeExprKind::Function {
                    params: elements,
                    return_type,
                });
            }

            if elements.len() == 1 {
                return Ok(elements.into_iter().next().unwrap().kind);
            }
            return Ok(TypeExprKind::Tuple(elements));
        }

        // Named or generic type: Foo, Foo<T, U>, and the contextual
        // `unboxed (T, U)` unboxed-tuple form.
        if let Token::Ident(name) = self.peek() {
            let name = name.clone();
            self.advance();

            if name == "unboxed" && self.check(&Token::LParen) {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&Token::RParen) {
                    loop {
                        elements.push(self.parse_type()?);
                        if !self.match_token(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.consume(&Token::RParen, "expected ')' after unboxed tuple type")?;
                return Ok(TypeExprKind::UnboxedTuple(elements));
            }

            if self.check(&Token::Lt) {
                let args = self.parse_type_args_if_present()?;
                return Ok(TypeExprKind::Generic { name, args });
            }

            return Ok(TypeExprKind::Named(name));
        }

        Err(self.error("expected a type"))
    }
}

/// Strips a trailing integer-width suffix such as `i32`/`u8`, if present.
fn parse_int_literal(raw: &str) -> Result<i64, ParseError> {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().map_err(|_| ParseError::SyntaxError {
        location: "type literal".to_string(),
        message: format!("invalid integer literal `{}`", raw),
    })
}
