use thiserror::Error;

mod parser;
pub use parser::Parser;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("parse error at {location}: {message}")]
    SyntaxError { location: String, message: String },
    #[error("lexer error: {0}")]
    LexerError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_function() {
        let mut parser = Parser::new(
            r#"
            fn add(a: i32, b: i32): i32 {
                return a + b;
            }
        "#,
        )
        .unwrap();

        let result = parser.parse_file();
        assert!(result.is_ok());
        let program = result.unwrap();
        assert_eq!(program.items.len(), 1);
    }
}
