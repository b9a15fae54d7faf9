// Pattern parsing for match expressions.

use super::Parser;
use crate::ParseError;
use zena_ast::*;
use zena_lexer::Token;

impl<'a> Parser<'a> {
    pub(crate) fn parse_match_arm(&mut self) -> Result<MatchArm, ParseError> {
        let pattern = self.parse_pattern()?;

        let guard = if self.match_token(&Token::If) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.consume(&Token::FatArrow, "expected '=>' after pattern")?;

        let body = if self.check(&Token::LBrace) {
            self.parse_block_expression()?
        } else {
            self.parse_expression()?
        };

        Ok(MatchArm {
            pattern,
            guard,
            body,
        })
    }

    /// Pattern with `|`-separated alternatives: `1 | 2 | 3 => ...`.
    fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        let first = self.parse_single_pattern()?;

        if self.check(&Token::Pipe) {
            let mut patterns = vec![first];
            while self.match_token(&Token::Pipe) {
                patterns.push(self.parse_single_pattern()?);
            }
            return Ok(Pattern::Or(patterns));
        }

        Ok(first)
    }

    fn parse_single_pattern(&mut self) -> Result<Pattern, ParseError> {
        if self.match_token(&Token::Underscore) {
            return Ok(Pattern::Wildcard);
        }

        if self.check(&Token::LParen) {
            self.advance();
            let mut elements = Vec::new();

            if !self.check(&Token::RParen) {
                loop {
                    elements.push(self.parse_single_pattern()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
            }

            self.consume(&Token::RParen, "expected ')' after tuple pattern")?;

            if elements.len() == 1 {
                return Ok(elements.into_iter().next().unwrap());
            }
            return Ok(Pattern::Tuple(elements));
        }

        if self.match_token(&Token::True) {
            return Ok(Pattern::Literal(LiteralValue::Bool(true)));
        }
        if self.match_token(&Token::False) {
            return Ok(Pattern::Literal(LiteralValue::Bool(false)));
        }
        if self.match_token(&Token::Minus) {
            if let Token::IntLiteral(raw) = self.peek().clone() {
                self.advance();
                let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
                let value: i64 = digits.parse().unwrap_or(0);
                return Ok(Pattern::Literal(LiteralValue::Int(-value)));
            }
            return Err(self.error("expected a numeric literal after '-' in pattern"));
        }
        if let Token::IntLiteral(raw) = self.peek().clone() {
            self.advance();
            let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
            let value: i64 = digits.parse().unwrap_or(0);
            return Ok(Pattern::Literal(LiteralValue::Int(value)));
        }
        if let Token::StringLiteral(s) = self.peek().clone() {
            self.advance();
            return Ok(Pattern::Literal(LiteralValue::Str(s)));
        }

        if let Token::Ident(name) = self.peek().clone() {
            self.advance();

            // Enum variant pattern, optionally qualified: Option.Some(x)
            if self.match_token(&Token::Dot) {
                let variant = self.consume_identifier()?;
                let fields = self.parse_enum_pattern_fields()?;
                return Ok(Pattern::EnumVariant {
                    enum_name: Some(name),
                    variant,
                    fields,
                });
            }

            // Struct pattern: Point { x, y }
            if self.check(&Token::LBrace) {
                self.advance();
                let mut fields = Vec::new();

                while !self.check(&Token::RBrace) && !self.is_at_end() {
                    let field_name = self.consume_identifier()?;
                    let field_pattern = if self.match_token(&Token::Colon) {
                        self.parse_single_pattern()?
                    } else {
                        Pattern::Ident(field_name.clone())
                    };
                    fields.push((field_name, field_pattern));
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }

                self.consume(&Token::RBrace, "expected '}' after struct pattern")?;
                return Ok(Pattern::Struct { name, fields });
            }

            // Unqualified enum variant pattern: Some(x), None
            if self.check(&Token::LParen) {
                let fields = self.parse_enum_pattern_fields()?;
                return Ok(Pattern::EnumVariant {
                    enum_name: None,
                    variant: name,
                    fields,
                });
            }

            return Ok(Pattern::Ident(name));
        }

        Err(self.error("expected a pattern"))
    }

    fn parse_enum_pattern_fields(&mut self) -> Result<Vec<Pattern>, ParseError> {
        if !self.match_token(&Token::LParen) {
            return Ok(Vec::new());
        }

        let mut fields = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                fields.push(self.parse_single_pattern()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "expected ')' after enum pattern fields")?;
        Ok(fields)
    }
}
