use logos::Logos;

/// Unescapes the body of a string literal (without the surrounding quotes).
fn unescape_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    if let Ok(code) = u32::from_str_radix(&hex, 16) {
                        if let Some(unicode_char) = char::from_u32(code) {
                            result.push(unicode_char);
                        }
                    }
                }
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Token types for the Zena language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
pub enum Token {
    // Keywords
    #[token("fn")]
    Fn,
    #[token("let")]
    Let,
    #[token("mut")]
    Mut,
    #[token("const")]
    Const,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("elif")]
    Elif,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("import")]
    Import,
    #[token("export")]
    Export,
    #[token("from")]
    From,
    #[token("as")]
    As,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("type")]
    Type,
    #[token("distinct")]
    Distinct,
    #[token("enum")]
    Enum,
    #[token("class")]
    Class,
    #[token("interface")]
    Interface,
    #[token("mixin")]
    Mixin,
    #[token("extends")]
    Extends,
    #[token("implements")]
    Implements,
    #[token("with")]
    With,
    #[token("on")]
    On,
    #[token("abstract")]
    Abstract,
    #[token("final")]
    Final,
    #[token("override")]
    Override,
    #[token("static")]
    Static,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("super")]
    Super,
    #[token("match")]
    Match,

    // Primitive types
    #[token("i8")]
    I8,
    #[token("i16")]
    I16,
    #[token("i32")]
    I32,
    #[token("i64")]
    I64,
    #[token("u8")]
    U8,
    #[token("u16")]
    U16,
    #[token("u32")]
    U32,
    #[token("u64")]
    U64,
    #[token("f32")]
    F32,
    #[token("f64")]
    F64,
    #[token("bool")]
    Bool,
    #[token("string")]
    StringType,
    #[token("any")]
    Any,
    #[token("void")]
    Void,

    // Operators
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,
    #[token("===")]
    RefEq,
    #[token("!==")]
    RefNotEq,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("::")]
    DoubleColon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("=>")]
    FatArrow,
    #[token("->")]
    Arrow,
    #[token("|")]
    Pipe,

    // Arithmetic operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Literals
    #[regex(r"[0-9]+(?:i8|i16|i32|i64|u8|u16|u32|u64)?", |lex| lex.slice().to_string())]
    IntLiteral(String),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?(?:f32|f64)?", |lex| lex.slice().to_string())]
    FloatLiteral(String),

    #[regex(r#""([^"\\]|\\["\\bnfrt]|u[a-fA-F0-9]{4})*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    StringLiteral(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("_", priority = 10)]
    Underscore,

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*([^*]|\*[^/])*\*/", logos::skip)]
    BlockComment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Result<TokenSpan, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        let span = self.inner.span();

        match token {
            Ok(tok) => Some(Ok(TokenSpan { token: tok, span })),
            Err(_) => Some(Err(LexError::InvalidToken { span })),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("invalid token at {span:?}")]
    InvalidToken { span: std::ops::Range<usize> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        let source = "class interface mixin extends implements with abstract final override";
        let mut lexer = Lexer::new(source);

        assert_eq!(lexer.next().unwrap().unwrap().token, Token::Class);
        assert_eq!(lexer.next().unwrap().unwrap().token, Token::Interface);
        assert_eq!(lexer.next().unwrap().unwrap().token, Token::Mixin);
        assert_eq!(lexer.next().unwrap().unwrap().token, Token::Extends);
        assert_eq!(lexer.next().unwrap().unwrap().token, Token::Implements);
        assert_eq!(lexer.next().unwrap().unwrap().token, Token::With);
        assert_eq!(lexer.next().unwrap().unwrap().token, Token::Abstract);
        assert_eq!(lexer.next().unwrap().unwrap().token, Token::Final);
        assert_eq!(lexer.next().unwrap().unwrap().token, Token::Override);
    }

    #[test]
    fn test_literals() {
        let source = r#"42 3.14 "hello""#;
        let mut lexer = Lexer::new(source);

        assert_eq!(
            lexer.next().unwrap().unwrap().token,
            Token::IntLiteral("42".to_string())
        );
        assert_eq!(
            lexer.next().unwrap().unwrap().token,
            Token::FloatLiteral("3.14".to_string())
        );
        assert_eq!(
            lexer.next().unwrap().unwrap().token,
            Token::StringLiteral("hello".to_string())
        );
    }

    #[test]
    fn test_identifiers() {
        let source = "my_var count_123 _private";
        let mut lexer = Lexer::new(source);

        assert_eq!(
            lexer.next().unwrap().unwrap().token,
            Token::Ident("my_var".to_string())
        );
        assert_eq!(
            lexer.next().unwrap().unwrap().token,
            Token::Ident("count_123".to_string())
        );
        assert_eq!(
            lexer.next().unwrap().unwrap().token,
            Token::Ident("_private".to_string())
        );
    }

    #[test]
    fn test_class_declaration() {
        let source = "class Foo extends Bar implements Baz { }";
        let tokens: Vec<_> = Lexer::new(source).map(|r| r.unwrap().token).collect();

        assert_eq!(tokens[0], Token::Class);
        assert_eq!(tokens[1], Token::Ident("Foo".to_string()));
        assert_eq!(tokens[2], Token::Extends);
        assert_eq!(tokens[3], Token::Ident("Bar".to_string()));
        assert_eq!(tokens[4], Token::Implements);
        assert_eq!(tokens[5], Token::Ident("Baz".to_string()));
    }

    #[test]
    fn test_distinct_alias() {
        let source = "type UserId = distinct i32;";
        let tokens: Vec<_> = Lexer::new(source).map(|r| r.unwrap().token).collect();

        assert_eq!(tokens[0], Token::Type);
        assert_eq!(tokens[1], Token::Ident("UserId".to_string()));
        assert_eq!(tokens[2], Token::Eq);
        assert_eq!(tokens[3], Token::Distinct);
        assert_eq!(tokens[4], Token::I32);
        assert_eq!(tokens[5], Token::Semicolon);
    }

    #[test]
    fn test_reference_equality_operators() {
        let source = "a === b !== c";
        let tokens: Vec<_> = Lexer::new(source).map(|r| r.unwrap().token).collect();

        assert_eq!(tokens[1], Token::RefEq);
        assert_eq!(tokens[3], Token::RefNotEq);
    }
}
