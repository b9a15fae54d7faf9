// Top-level item parsing: imports, exports, classes, interfaces,
// mixins, type aliases, enums, functions and consts.

use super::Parser;
use crate::ParseError;
use zena_ast::*;
use zena_lexer::Token;

impl<'a> Parser<'a> {
    /// Three import patterns:
    ///   import { io, net } from "std";   - named imports
    ///   import * as std from "std";      - namespace import
    ///   import "std/io";                 - whole-module import
    pub(crate) fn parse_import(&mut self) -> Result<Import, ParseError> {
        let start = self.start();
        self.consume(&Token::Import, "expected 'import'")?;

        if self.match_token(&Token::Star) {
            self.consume(&Token::As, "expected 'as' after '*'")?;
            let alias = self.consume_identifier()?;
            self.consume(&Token::From, "expected 'from' after alias")?;
            let module = self.consume_string("expected a module string after 'from'")?;
            self.consume(&Token::Semicolon, "expected ';' after import")?;
            let span = self.finish(start);

            return Ok(Import {
                items: Vec::new(),
                module,
                alias: Some(alias),
                span,
            });
        }

        if self.match_token(&Token::LBrace) {
            let mut items = Vec::new();
            loop {
                items.push(self.consume_identifier()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.consume(&Token::RBrace, "expected '}' after import list")?;
            self.consume(&Token::From, "expected 'from' after import list")?;
            let module = self.consume_string("expected a module string after 'from'")?;
            self.consume(&Token::Semicolon, "expected ';' after import")?;
            let span = self.finish(start);

            return Ok(Import {
                items,
                module,
                alias: None,
                span,
            });
        }

        let module = self.consume_string("expected '{', '*' or a module string after 'import'")?;
        self.consume(&Token::Semicolon, "expected ';' after import")?;
        let span = self.finish(start);

        Ok(Import {
            items: Vec::new(),
            module,
            alias: None,
            span,
        })
    }

    fn consume_string(&mut self, message: &str) -> Result<String, ParseError> {
        if let Token::StringLiteral(s) = self.peek().clone() {
            self.advance();
            Ok(s)
        } else {
            Err(self.error(message))
        }
    }

    pub(crate) fn parse_export(&mut self) -> Result<Item, ParseError> {
        self.consume(&Token::Export, "expected 'export'")?;

        if self.check(&Token::Const) {
            return self.parse_const_inner(true);
        }
        if self.check(&Token::Fn) {
            return Ok(Item::Function(self.parse_function_inner(true)?));
        }
        if self.check(&Token::Class) {
            return Ok(Item::Class(self.parse_class_inner(true)?));
        }
        if self.check(&Token::Interface) {
            return Ok(Item::Interface(self.parse_interface_inner(true)?));
        }
        if self.check(&Token::Type) {
            return Ok(Item::TypeAlias(self.parse_type_alias_inner(true)?));
        }
        if self.check(&Token::Enum) {
            return Ok(Item::Enum(self.parse_enum_inner(true)?));
        }

        Err(self.error(
            "expected a declaration (const, fn, class, interface, type, enum) after 'export'",
        ))
    }

    pub(crate) fn parse_const(&mut self) -> Result<Item, ParseError> {
        self.parse_const_inner(false)
    }

    fn parse_const_inner(&mut self, is_exported: bool) -> Result<Item, ParseError> {
        let start = self.start();
        self.consume(&Token::Const, "expected 'const'")?;
        let name = self.consume_identifier()?;

        let ty = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.consume(&Token::Eq, "expected '=' in const declaration")?;
        let value = self.parse_expression()?;
        self.consume(&Token::Semicolon, "expected ';' after const declaration")?;
        let span = self.finish(start);

        Ok(Item::Const(ConstDecl {
            name,
            ty,
            value,
            is_exported,
            span,
        }))
    }

    pub(crate) fn parse_function(&mut self) -> Result<Function, ParseError> {
        self.parse_function_inner(false)
    }

    fn parse_function_inner(&mut self, is_exported: bool) -> Result<Function, ParseError> {
        let start = self.start();
        self.consume(&Token::Fn, "expected 'fn'")?;
        let name = self.consume_identifier()?;
        let type_params = self.parse_type_params()?;

        self.consume(&Token::LParen, "expected '(' after function name")?;
        let params = self.parse_params()?;
        self.consume(&Token::RParen, "expected ')' after parameters")?;

        let return_type = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        let span = self.finish(start);

        Ok(Function {
            name,
            type_params,
            params,
            return_type,
            body,
            is_exported,
            span,
        })
    }

    pub(crate) fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if self.check(&Token::RParen) {
            return Ok(params);
        }

        loop {
            let start = self.start();
            let name = self.consume_identifier()?;
            self.consume(&Token::Colon, "expected ':' after parameter name")?;
            let ty = self.parse_type()?;

            let default = if self.match_token(&Token::Eq) {
                Some(self.parse_expression()?)
            } else {
                None
            };

            let span = self.finish(start);
            params.push(Param {
                name,
                ty,
                default,
                span,
            });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(params)
    }

    pub(crate) fn parse_class(&mut self) -> Result<Class, ParseError> {
        self.parse_class_inner(false)
    }

    fn parse_class_inner(&mut self, is_exported: bool) -> Result<Class, ParseError> {
        let start = self.start();

        let is_abstract = self.match_token(&Token::Abstract);
        let is_final = self.match_token(&Token::Final);

        self.consume(&Token::Class, "expected 'class'")?;
        let name = self.consume_identifier()?;
        let type_params = self.parse_type_params()?;

        let superclass = if self.match_token(&Token::Extends) {
            Some(self.parse_type()?)
        } else {
            None
        };

        // Extension class: `class Name on OnType { ... }`. No superclass
        // or mixins of its own — it layers methods over an existing type.
        let on_type = if self.match_token(&Token::On) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let mixins = if self.match_token(&Token::With) {
            self.parse_type_list()?
        } else {
            Vec::new()
        };

        let implements = if self.match_token(&Token::Implements) {
            self.parse_type_list()?
        } else {
            Vec::new()
        };

        self.consume(&Token::LBrace, "expected '{' to begin class body")?;

        let mut fields = Vec::new();
        let mut constructor = None;
        let mut methods = Vec::new();

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.check(&Token::New) {
                constructor = Some(self.parse_constructor()?);
            } else if self.is_method_start() {
                methods.push(self.parse_method()?);
            } else {
                fields.push(self.parse_field()?);
            }
        }

        self.consume(&Token::RBrace, "expected '}' to close class body")?;
        let span = self.finish(start);

        Ok(Class {
            name,
            type_params,
            superclass,
            mixins,
            implements,
            on_type,
            is_final,
            is_abstract,
            fields,
            constructor,
            methods,
            is_exported,
            span,
        })
    }

    pub(crate) fn parse_interface(&mut self) -> Result<Interface, ParseError> {
        self.parse_interface_inner(false)
    }

    fn parse_interface_inner(&mut self, is_exported: bool) -> Result<Interface, ParseError> {
        let start = self.start();
        self.consume(&Token::Interface, "expected 'interface'")?;
        let name = self.consume_identifier()?;
        let type_params = self.parse_type_params()?;

        let extends = if self.match_token(&Token::Extends) {
            self.parse_type_list()?
        } else {
            Vec::new()
        };

        self.consume(&Token::LBrace, "expected '{' to begin interface body")?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.is_method_start() {
                methods.push(self.parse_method()?);
            } else {
                fields.push(self.parse_field()?);
            }
        }

        self.consume(&Token::RBrace, "expected '}' to close interface body")?;
        let span = self.finish(start);

        Ok(Interface {
            name,
            type_params,
            extends,
            fields,
            methods,
            is_exported,
            span,
        })
    }

    /// `mixin Name<T> on OnType implements I1, I2 { ... }`. A constructor is
    /// grammatically accepted here and rejected later by the checker, so
    /// that a stray one produces a semantic diagnostic rather than a hard
    /// parse failure.
    pub(crate) fn parse_mixin(&mut self) -> Result<Mixin, ParseError> {
        let start = self.start();
        self.consume(&Token::Mixin, "expected 'mixin'")?;
        let name = self.consume_identifier()?;
        let type_params = self.parse_type_params()?;

        self.consume(&Token::On, "expected 'on' after mixin name")?;
        let on_type = self.parse_type()?;

        let implements = if self.match_token(&Token::Implements) {
            self.parse_type_list()?
        } else {
            Vec::new()
        };

        self.consume(&Token::LBrace, "expected '{' to begin mixin body")?;

        let mut fields = Vec::new();
        let mut constructor = None;
        let mut methods = Vec::new();

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.check(&Token::New) {
                constructor = Some(self.parse_constructor()?);
            } else if self.is_method_start() {
                methods.push(self.parse_method()?);
            } else {
                fields.push(self.parse_field()?);
            }
        }

        self.consume(&Token::RBrace, "expected '}' to close mixin body")?;
        let span = self.finish(start);

        Ok(Mixin {
            name,
            type_params,
            on_type,
            implements,
            fields,
            constructor,
            methods,
            span,
        })
    }

    pub(crate) fn parse_type_alias(&mut self) -> Result<TypeAliasDecl, ParseError> {
        self.parse_type_alias_inner(false)
    }

    fn parse_type_alias_inner(&mut self, is_exported: bool) -> Result<TypeAliasDecl, ParseError> {
        let start = self.start();
        self.consume(&Token::Type, "expected 'type'")?;
        let name = self.consume_identifier()?;
        let type_params = self.parse_type_params()?;
        self.consume(&Token::Eq, "expected '=' in type alias")?;

        let is_distinct = self.match_token(&Token::Distinct);
        let target = self.parse_type()?;
        self.consume(&Token::Semicolon, "expected ';' after type alias")?;
        let span = self.finish(start);

        Ok(TypeAliasDecl {
            name,
            type_params,
            is_distinct,
            target,
            is_exported,
            span,
        })
    }

    pub(crate) fn parse_enum(&mut self) -> Result<EnumDecl, ParseError> {
        self.parse_enum_inner(false)
    }

    fn parse_enum_inner(&mut self, is_exported: bool) -> Result<EnumDecl, ParseError> {
        let start = self.start();
        self.consume(&Token::Enum, "expected 'enum'")?;
        let name = self.consume_identifier()?;
        let type_params = self.parse_type_params()?;

        self.consume(&Token::LBrace, "expected '{' to begin enum body")?;
        let mut variants = Vec::new();

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let variant_name = self.consume_identifier()?;
            let fields = if self.match_token(&Token::LParen) {
                let mut types = Vec::new();
                if !self.check(&Token::RParen) {
                    loop {
                        types.push(self.parse_type()?);
                        if !self.match_token(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.consume(&Token::RParen, "expected ')' after enum variant fields")?;
                types
            } else {
                Vec::new()
            };

            variants.push(EnumVariant {
                name: variant_name,
                fields,
            });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::RBrace, "expected '}' to close enum body")?;
        let span = self.finish(start);

        Ok(EnumDecl {
            name,
            type_params,
            variants,
            is_exported,
            span,
        })
    }

    fn parse_type_list(&mut self) -> Result<Vec<TypeExpr>, ParseError> {
        let mut types = Vec::new();
        loop {
            types.push(self.parse_type()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        Ok(types)
    }

    fn parse_constructor(&mut self) -> Result<Constructor, ParseError> {
        let start = self.start();
        self.consume(&Token::New, "expected 'new'")?;
        self.consume(&Token::LParen, "expected '(' after 'new'")?;
        let params = self.parse_params()?;
        self.consume(&Token::RParen, "expected ')' after constructor parameters")?;
        let body = self.parse_block()?;
        let span = self.finish(start);

        Ok(Constructor { params, body, span })
    }

    /// A class/interface/mixin body line is a method when it starts with
    /// `abstract`/`final`/`static`/`override` or with `fn`; everything else
    /// is a field declaration.
    fn is_method_start(&self) -> bool {
        matches!(
            self.peek(),
            Token::Fn | Token::Abstract | Token::Final | Token::Static | Token::Override
        )
    }

    fn parse_method(&mut self) -> Result<Method, ParseError> {
        let start = self.start();

        let mut is_abstract = false;
        let mut is_final = false;
        let mut is_static = false;
        let mut is_override = false;

        loop {
            if self.match_token(&Token::Abstract) {
                is_abstract = true;
            } else if self.match_token(&Token::Final) {
                is_final = true;
            } else if self.match_token(&Token::Static) {
                is_static = true;
            } else if self.match_token(&Token::Override) {
                is_override = true;
            } else {
                break;
            }
        }

        self.consume(&Token::Fn, "expected 'fn'")?;
        let name = self.consume_identifier()?;
        let type_params = self.parse_type_params()?;

        self.consume(&Token::LParen, "expected '(' after method name")?;
        let params = self.parse_params()?;
        self.consume(&Token::RParen, "expected ')' after parameters")?;

        let return_type = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.check(&Token::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.consume(&Token::Semicolon, "expected ';' after method signature")?;
            None
        };

        let span = self.finish(start);

        Ok(Method {
            name,
            type_params,
            params,
            return_type,
            body,
            is_final,
            is_abstract,
            is_static,
            is_override,
            span,
        })
    }

    fn parse_field(&mut self) -> Result<FieldDecl, ParseError> {
        let start = self.start();
        let is_private = self.consume_identifier_if("private");
        let is_mutable = self.match_token(&Token::Mut);
        let name = self.consume_identifier()?;
        self.consume(&Token::Colon, "expected ':' after field name")?;
        let ty = self.parse_type()?;
        self.consume(&Token::Semicolon, "expected ';' after field declaration")?;
        let span = self.finish(start);

        Ok(FieldDecl {
            name,
            ty,
            is_mutable,
            is_private,
            span,
        })
    }

    /// Matches a contextual keyword spelled as a plain identifier, without
    /// reserving it as a lexer token. Used for `private`, which only has
    /// meaning at the start of a field declaration.
    fn consume_identifier_if(&mut self, word: &str) -> bool {
        if let Token::Ident(name) = self.peek() {
            if name == word {
                self.advance();
                return true;
            }
        }
        false
    }
}
