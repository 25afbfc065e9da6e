//! Path Parser
//!
//! Recursive descent parser for the supported path subset:
//!
//! ```text
//! expr      := path ('|' path)*
//! path      := ('/' | '//')? step (('/' | '//') step)*  |  '/'
//! step      := '.' | '@' test | axis '::' test | test, each followed by predicate*
//! test      := name | '*' | 'node()' | 'text()'
//! predicate := '[' or ']'
//! or        := and ('or' and)*
//! and       := unary ('and' unary)*
//! unary     := 'not' '(' or ')' | '(' or ')' | '@' name (('=' | '!=') literal)?
//! ```

use super::lexer::{Lexer, Token};
use crate::error::{MarkupError, Result};

/// Parsed expression: the union of its location paths
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub paths: Vec<LocationPath>,
}

/// One branch of a union
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// Location step in a path
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Predicate>,
    /// Where the step starts in the expression
    pub offset: usize,
}

impl Step {
    fn new(axis: Axis, node_test: NodeTest, offset: usize) -> Self {
        Step {
            axis,
            node_test,
            predicates: Vec::new(),
            offset,
        }
    }
}

/// Supported axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Self_,
    Attribute,
}

impl Axis {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "self" => Some(Axis::Self_),
            "attribute" => Some(Axis::Attribute),
            _ => None,
        }
    }
}

/// Node test in a location step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Matches any element or attribute (*)
    Any,
    /// Matches by name
    Name(String),
    /// node() - matches any node
    Node,
    /// text() - matches text nodes
    Text,
}

/// Comparison in an attribute predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
}

/// Predicate over the attributes of the current element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `@name`, or `@name = 'v'` / `@name != 'v'`
    Attr {
        name: String,
        compare: Option<(CmpOp, String)>,
    },
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

/// Path parser
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    offset: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(input: &'a str) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let (current, offset) = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current,
            offset,
        })
    }

    /// Parse a complete expression
    pub fn parse(&mut self) -> Result<Expr> {
        if self.current == Token::Eof {
            return Err(self.error("empty expression"));
        }
        let mut paths = vec![self.parse_path()?];
        while self.current == Token::Pipe {
            self.advance()?;
            paths.push(self.parse_path()?);
        }
        if self.current != Token::Eof {
            return Err(self.unexpected());
        }
        Ok(Expr { paths })
    }

    /// Advance to next token
    fn advance(&mut self) -> Result<()> {
        let (token, offset) = self.lexer.next_token()?;
        self.current = token;
        self.offset = offset;
        Ok(())
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.current != token {
            return Err(self.error(format!(
                "expected {}, found {}",
                token.describe(),
                self.current.describe()
            )));
        }
        self.advance()
    }

    fn error(&self, message: impl Into<String>) -> MarkupError {
        MarkupError::selector(message, self.offset)
    }

    fn unexpected(&self) -> MarkupError {
        self.error(format!("unexpected {}", self.current.describe()))
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.current,
            Token::Name(_)
                | Token::Star
                | Token::At
                | Token::Dot
                | Token::DoubleDot
                | Token::Axis(_)
                | Token::NodeType(_)
        )
    }

    /// `//` is shorthand for `/descendant-or-self::node()/`
    fn descendant_or_self(offset: usize) -> Step {
        Step::new(Axis::DescendantOrSelf, NodeTest::Node, offset)
    }

    /// Parse one location path
    fn parse_path(&mut self) -> Result<LocationPath> {
        let mut steps = Vec::new();
        let absolute = match self.current {
            Token::Slash => {
                self.advance()?;
                if !self.starts_step() {
                    // Just "/"
                    return Ok(LocationPath {
                        absolute: true,
                        steps,
                    });
                }
                steps.push(self.parse_step()?);
                true
            }
            Token::DoubleSlash => {
                steps.push(Self::descendant_or_self(self.offset));
                self.advance()?;
                steps.push(self.parse_step()?);
                true
            }
            _ => {
                steps.push(self.parse_step()?);
                false
            }
        };

        // Handle path continuation (e.g., /root/child/grandchild)
        loop {
            match self.current {
                Token::Slash => {
                    self.advance()?;
                    steps.push(self.parse_step()?);
                }
                Token::DoubleSlash => {
                    steps.push(Self::descendant_or_self(self.offset));
                    self.advance()?;
                    steps.push(self.parse_step()?);
                }
                _ => break,
            }
        }

        Ok(LocationPath { absolute, steps })
    }

    /// Parse a location step with its predicates
    fn parse_step(&mut self) -> Result<Step> {
        let offset = self.offset;
        let mut step = match &self.current {
            Token::Dot => {
                self.advance()?;
                return Ok(Step::new(Axis::Self_, NodeTest::Node, offset));
            }
            Token::DoubleDot => {
                return Err(self.error("parent steps ('..') are not supported"));
            }
            Token::At => {
                self.advance()?;
                Step::new(Axis::Attribute, self.parse_node_test()?, offset)
            }
            Token::Axis(name) => {
                let axis = Axis::from_name(name)
                    .ok_or_else(|| self.error(format!("unsupported axis '{}'", name)))?;
                self.advance()?;
                self.expect(Token::DoubleColon)?;
                Step::new(axis, self.parse_node_test()?, offset)
            }
            _ => Step::new(Axis::Child, self.parse_node_test()?, offset),
        };

        while self.current == Token::LeftBracket {
            self.advance()?;
            step.predicates.push(self.parse_or()?);
            self.expect(Token::RightBracket)?;
        }
        Ok(step)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest> {
        let test = match &self.current {
            Token::Name(name) => NodeTest::Name(name.clone()),
            Token::Star => NodeTest::Any,
            Token::NodeType(kind) => {
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    other => return Err(self.error(format!("unsupported node test '{}()'", other))),
                };
                self.advance()?;
                self.expect(Token::LeftParen)?;
                if self.current != Token::RightParen {
                    return Err(self.error(format!(
                        "expected ')', found {}",
                        self.current.describe()
                    )));
                }
                test
            }
            _ => {
                return Err(self.error(format!(
                    "expected node test, found {}",
                    self.current.describe()
                )))
            }
        };
        self.advance()?;
        Ok(test)
    }

    /// Parse or expression
    fn parse_or(&mut self) -> Result<Predicate> {
        let mut left = self.parse_and()?;
        while self.current == Token::Or {
            self.advance()?;
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Parse and expression
    fn parse_and(&mut self) -> Result<Predicate> {
        let mut left = self.parse_unary()?;
        while self.current == Token::And {
            self.advance()?;
            let right = self.parse_unary()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Predicate> {
        match &self.current {
            Token::Function(name) if name == "not" => {
                self.advance()?;
                self.expect(Token::LeftParen)?;
                let inner = self.parse_or()?;
                self.expect(Token::RightParen)?;
                Ok(Predicate::Not(Box::new(inner)))
            }
            Token::Function(name) => Err(self.error(format!("unsupported function '{}()'", name))),
            Token::LeftParen => {
                self.advance()?;
                let inner = self.parse_or()?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::At => {
                self.advance()?;
                let Token::Name(name) = &self.current else {
                    return Err(self.error(format!(
                        "expected attribute name, found {}",
                        self.current.describe()
                    )));
                };
                let name = name.clone();
                self.advance()?;
                let op = match self.current {
                    Token::Eq => CmpOp::Eq,
                    Token::NotEq => CmpOp::NotEq,
                    _ => return Ok(Predicate::Attr { name, compare: None }),
                };
                self.advance()?;
                let Token::String(value) = &self.current else {
                    return Err(self.error(format!(
                        "expected string literal, found {}",
                        self.current.describe()
                    )));
                };
                let value = value.clone();
                self.advance()?;
                Ok(Predicate::Attr {
                    name,
                    compare: Some((op, value)),
                })
            }
            _ => Err(self.error(format!(
                "unsupported predicate starting with {}",
                self.current.describe()
            ))),
        }
    }
}
