//! Path Lexer
//!
//! Tokenizes path expressions. Every token carries the byte offset where it
//! starts so syntax errors can point at the offending spot.

use crate::error::{MarkupError, Result};

/// Path token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Operators
    Slash,       // /
    DoubleSlash, // //
    Dot,         // .
    DoubleDot,   // ..
    At,          // @
    Pipe,        // |
    Star,        // *
    Eq,          // =
    NotEq,       // !=
    And,         // and
    Or,          // or

    // Brackets
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]

    // Literals
    String(String),

    // Names
    Name(String),     // NCName or prefix:local
    NodeType(String), // node(), text(), comment(), processing-instruction()
    Function(String), // name followed by '('

    // Axis
    Axis(String), // child::, descendant::, etc.
    DoubleColon,  // ::

    // End of input
    Eof,
}

impl Token {
    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Slash => "'/'".into(),
            Token::DoubleSlash => "'//'".into(),
            Token::Dot => "'.'".into(),
            Token::DoubleDot => "'..'".into(),
            Token::At => "'@'".into(),
            Token::Pipe => "'|'".into(),
            Token::Star => "'*'".into(),
            Token::Eq => "'='".into(),
            Token::NotEq => "'!='".into(),
            Token::And => "'and'".into(),
            Token::Or => "'or'".into(),
            Token::LeftParen => "'('".into(),
            Token::RightParen => "')'".into(),
            Token::LeftBracket => "'['".into(),
            Token::RightBracket => "']'".into(),
            Token::String(s) => format!("string '{}'", s),
            Token::Name(n) => format!("name '{}'", n),
            Token::NodeType(n) | Token::Function(n) => format!("'{}()'", n),
            Token::Axis(a) => format!("axis '{}'", a),
            Token::DoubleColon => "'::'".into(),
            Token::Eof => "end of expression".into(),
        }
    }
}

/// Path lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    /// Get the remaining input
    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Peek at current character
    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Peek at character at offset
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    /// Advance by n bytes
    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Skip whitespace
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    /// Get the next token and its starting offset
    pub fn next_token(&mut self) -> Result<(Token, usize)> {
        self.skip_whitespace();
        let start = self.pos;

        let Some(c) = self.peek() else {
            return Ok((Token::Eof, start));
        };

        let token = match c {
            '/' => {
                self.advance(1);
                if self.peek() == Some('/') {
                    self.advance(1);
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            '.' => {
                self.advance(1);
                if self.peek() == Some('.') {
                    self.advance(1);
                    Token::DoubleDot
                } else {
                    Token::Dot
                }
            }
            '@' => self.single(Token::At),
            '|' => self.single(Token::Pipe),
            '*' => self.single(Token::Star),
            '=' => self.single(Token::Eq),
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            '!' => {
                if self.peek_at(1) != Some('=') {
                    return Err(MarkupError::selector("expected '=' after '!'", start));
                }
                self.advance(2);
                Token::NotEq
            }
            ':' => {
                if self.peek_at(1) != Some(':') {
                    return Err(MarkupError::selector("unexpected ':'", start));
                }
                self.advance(2);
                Token::DoubleColon
            }
            '"' | '\'' => self.read_string(c)?,
            _ if is_name_start_char(c) => self.read_name_or_keyword(),
            _ => {
                return Err(MarkupError::selector(
                    format!("unexpected character '{}'", c),
                    start,
                ))
            }
        };
        Ok((token, start))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance(1);
        token
    }

    /// Read a string literal
    fn read_string(&mut self, quote: char) -> Result<Token> {
        let start = self.pos;
        self.advance(1); // Skip opening quote
        let body = self.pos;

        match self.remaining().find(quote) {
            Some(len) => {
                let value = self.input[body..body + len].to_string();
                self.advance(len + 1);
                Ok(Token::String(value))
            }
            None => Err(MarkupError::selector("unterminated string literal", start)),
        }
    }

    fn read_ncname(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    /// Read a name or keyword
    fn read_name_or_keyword(&mut self) -> Token {
        let name = self.read_ncname();

        // Check for namespace prefix
        if self.peek() == Some(':') && self.peek_at(1).map_or(false, is_name_start_char) {
            self.advance(1);
            let local = self.read_ncname();
            return Token::Name(format!("{}:{}", name, local));
        }

        // Look past whitespace without consuming it for plain names
        let after_name = self.pos;
        self.skip_whitespace();
        let next = self.peek();
        let token = match name {
            "and" => Token::And,
            "or" => Token::Or,
            _ if self.remaining().starts_with("::") => Token::Axis(name.to_string()),
            "node" | "text" | "comment" | "processing-instruction" if next == Some('(') => {
                Token::NodeType(name.to_string())
            }
            _ if next == Some('(') => Token::Function(name.to_string()),
            _ => Token::Name(name.to_string()),
        };
        if matches!(token, Token::Name(_)) {
            self.pos = after_name;
        }
        token
    }

    /// Tokenize entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let (token, _) = self.next_token()?;
            if matches!(token, Token::Eof) {
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(
            tokens("/root/child"),
            [
                Token::Slash,
                Token::Name("root".to_string()),
                Token::Slash,
                Token::Name("child".to_string()),
            ]
        );
    }

    #[test]
    fn test_descendant() {
        let mut lexer = Lexer::new("//item");
        assert_eq!(lexer.next_token().unwrap(), (Token::DoubleSlash, 0));
        assert_eq!(lexer.next_token().unwrap(), (Token::Name("item".to_string()), 2));
    }

    #[test]
    fn test_predicate() {
        assert_eq!(
            tokens("item[@id!='test']"),
            [
                Token::Name("item".to_string()),
                Token::LeftBracket,
                Token::At,
                Token::Name("id".to_string()),
                Token::NotEq,
                Token::String("test".to_string()),
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_axis_and_node_type() {
        assert_eq!(
            tokens("descendant-or-self::node()"),
            [
                Token::Axis("descendant-or-self".to_string()),
                Token::DoubleColon,
                Token::NodeType("node".to_string()),
                Token::LeftParen,
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_keywords_and_functions() {
        assert_eq!(
            tokens("not(@a) and @b or @c"),
            [
                Token::Function("not".to_string()),
                Token::LeftParen,
                Token::At,
                Token::Name("a".to_string()),
                Token::RightParen,
                Token::And,
                Token::At,
                Token::Name("b".to_string()),
                Token::Or,
                Token::At,
                Token::Name("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_prefixed_name() {
        assert_eq!(tokens("svg:rect"), [Token::Name("svg:rect".to_string())]);
    }

    #[test]
    fn test_errors_carry_offset() {
        let err = Lexer::new("a[@b='x]").tokenize().unwrap_err();
        assert_eq!(err, MarkupError::selector("unterminated string literal", 5));
        let err = Lexer::new("a ! b").tokenize().unwrap_err();
        assert_eq!(err, MarkupError::selector("expected '=' after '!'", 2));
        let err = Lexer::new("a#").tokenize().unwrap_err();
        assert!(matches!(err, MarkupError::SelectorSyntax { offset: 1, .. }));
    }
}
