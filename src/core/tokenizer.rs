//! Markup Tokenizer
//!
//! Pull-style tokenizer shared by the XML and HTML readers. Extracts:
//! - Element start/end/empty tags (attributes left as raw content)
//! - Text content (raw, entities not yet decoded)
//! - CDATA sections
//! - Comments
//! - Processing instructions
//! - DOCTYPE declarations
//!
//! Strict mode reports malformed markup as a [`ParseError`]; lenient mode
//! treats it as text or drops it, the way browsers recover.

use super::scanner::{is_name_start_char, Scanner};

/// Type of markup token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element start tag: <element>
    StartTag,
    /// Element end tag: </element>
    EndTag,
    /// Empty element: <element/>
    EmptyTag,
    /// Text content
    Text,
    /// CDATA section: <![CDATA[...]]>
    CData,
    /// Comment: <!--...-->
    Comment,
    /// Processing instruction: <?target ...?>
    ProcessingInstruction,
    /// DOCTYPE declaration
    DocType,
}

/// A markup token borrowing from the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw span in input (start, end)
    pub span: (usize, usize),
    /// For tags: the element name. For PIs: the target.
    pub name: Option<&'a str>,
    /// For tags: the raw attribute section. For everything else: the body.
    pub content: &'a str,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize), content: &'a str) -> Self {
        Token {
            kind,
            span,
            name: None,
            content,
        }
    }

    fn with_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }
}

/// Malformed markup found in strict mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

type TokenResult<'a> = Option<Result<Token<'a>, ParseError>>;

/// Markup tokenizer implementing a pull-parser pattern
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    strict: bool,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer for the given input (lenient mode)
    pub fn new(input: &'a str) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            strict: false,
        }
    }

    /// Create a new tokenizer in strict mode
    pub fn new_strict(input: &'a str) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            strict: true,
        }
    }

    pub fn input(&self) -> &'a str {
        self.scanner.input()
    }

    /// Get the current position
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Next token, `None` at end of input
    pub fn next_token(&mut self) -> TokenResult<'a> {
        if self.scanner.is_eof() {
            return None;
        }
        if self.scanner.starts_with("<") && self.starts_markup() {
            self.parse_markup()
        } else {
            Some(Ok(self.parse_text()))
        }
    }

    /// Read raw text up to the end tag of `name` (case-insensitive), for
    /// elements whose content is not markup (`<script>`, `<style>`).
    /// Returns `None` if the content is empty.
    pub fn raw_text(&mut self, name: &str) -> Option<Token<'a>> {
        let start = self.scanner.position();
        let end = self
            .scanner
            .find_end_tag_ci(name)
            .unwrap_or(self.scanner.input().len());
        self.scanner.set_position(end);
        (end > start).then(|| Token::new(TokenKind::Text, (start, end), self.scanner.slice(start, end)))
    }

    /// Whether the '<' at the current position opens markup. Lenient mode
    /// keeps stray '<' characters as text.
    fn starts_markup(&self) -> bool {
        if self.strict {
            return true;
        }
        match self.scanner.peek_at(1) {
            Some(b'/') => self.scanner.peek_at(2).map_or(false, is_name_start_char),
            Some(b'!') | Some(b'?') => true,
            Some(b) => is_name_start_char(b),
            None => false,
        }
    }

    fn parse_text(&mut self) -> Token<'a> {
        let start = self.scanner.position();
        // Skip the current character: it is either text or a stray '<'
        let first = self.scanner.remaining().chars().next().map_or(1, char::len_utf8);
        let mut search = start + first;
        let end = loop {
            self.scanner.set_position(search);
            match self.scanner.find_tag_start() {
                None => break self.scanner.input().len(),
                Some(lt) => {
                    self.scanner.set_position(lt);
                    if self.starts_markup() {
                        break lt;
                    }
                    search = lt + 1;
                }
            }
        };
        self.scanner.set_position(end);
        Token::new(TokenKind::Text, (start, end), self.scanner.slice(start, end))
    }

    /// Parse markup starting with '<'
    fn parse_markup(&mut self) -> TokenResult<'a> {
        let start = self.scanner.position();
        match self.scanner.peek_at(1) {
            Some(b'/') => self.parse_end_tag(start),
            Some(b'!') => self.parse_bang_markup(start),
            Some(b'?') => self.parse_pi(start),
            _ => self.parse_start_tag(start),
        }
    }

    fn error(&mut self, message: &str, position: usize) -> TokenResult<'a> {
        // Stop tokenizing after an error
        self.scanner.set_position(self.scanner.input().len());
        Some(Err(ParseError::new(message, position)))
    }

    /// Recover from an unterminated construct in lenient mode: the rest of
    /// the input becomes text.
    fn rest_as_text(&mut self, start: usize) -> TokenResult<'a> {
        let end = self.scanner.input().len();
        self.scanner.set_position(end);
        Some(Ok(Token::new(TokenKind::Text, (start, end), self.scanner.slice(start, end))))
    }

    /// Parse a start tag or empty element tag
    fn parse_start_tag(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.set_position(start + 1);
        let Some(name) = self.scanner.read_name() else {
            return self.error("invalid element name", start + 1);
        };

        // Find the end of the tag, handling quoted attributes
        let Some(end) = self.scanner.find_tag_end_quoted() else {
            if self.strict {
                return self.error("unclosed start tag", start);
            }
            return self.rest_as_text(start);
        };

        let attrs_start = self.scanner.position();
        // Byte test: `end - 1` may sit inside a multi-byte character
        let is_empty = end > attrs_start && self.scanner.input().as_bytes()[end - 1] == b'/';
        let attrs_end = if is_empty { end - 1 } else { end };

        self.scanner.set_position(end + 1);
        let kind = if is_empty { TokenKind::EmptyTag } else { TokenKind::StartTag };
        let content = self.scanner.slice(attrs_start, attrs_end);
        Some(Ok(Token::new(kind, (start, end + 1), content).with_name(name)))
    }

    /// Parse an end tag
    fn parse_end_tag(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.set_position(start + 2);
        let Some(name) = self.scanner.read_name() else {
            return self.error("invalid element name in end tag", start + 2);
        };

        let name_end = self.scanner.position();
        let Some(end) = self.scanner.find_byte(b'>') else {
            if self.strict {
                return self.error("unclosed end tag", start);
            }
            return self.rest_as_text(start);
        };

        // End tag can only have whitespace after name
        if self.strict && !self.scanner.slice(name_end, end).trim().is_empty() {
            return self.error("end tag cannot have attributes", name_end);
        }

        self.scanner.set_position(end + 1);
        Some(Ok(Token::new(TokenKind::EndTag, (start, end + 1), "").with_name(name)))
    }

    /// Parse `<!...>` constructs: comments, CDATA, DOCTYPE
    fn parse_bang_markup(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.set_position(start);
        if self.scanner.starts_with("<!--") {
            return self.parse_delimited(start, 4, "-->", TokenKind::Comment, "unclosed comment");
        }
        if self.scanner.starts_with("<![CDATA[") {
            return self.parse_delimited(start, 9, "]]>", TokenKind::CData, "unclosed CDATA section");
        }
        if self.scanner.starts_with_ci("<!DOCTYPE") {
            return self.parse_doctype(start);
        }
        if self.strict {
            return self.error("unsupported markup declaration", start);
        }
        self.bogus_comment(start)
    }

    /// Lenient recovery for `<!...>` and `<?...>` that are not well formed:
    /// everything up to the next '>' becomes a comment.
    fn bogus_comment(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.set_position(start + 2);
        let end = self.scanner.find_byte(b'>').unwrap_or(self.scanner.input().len());
        let content = self.scanner.slice(start + 2, end);
        self.scanner.set_position(end + 1);
        Some(Ok(Token::new(TokenKind::Comment, (start, self.scanner.position()), content)))
    }

    fn parse_delimited(
        &mut self,
        start: usize,
        open_len: usize,
        close: &str,
        kind: TokenKind,
        unclosed: &str,
    ) -> TokenResult<'a> {
        self.scanner.set_position(start + open_len);
        let body_start = self.scanner.position();
        let body_end = match self.scanner.find_str(close) {
            Some(pos) => pos,
            None if self.strict => return self.error(unclosed, start),
            None => self.scanner.input().len(),
        };
        let content = self.scanner.slice(body_start, body_end);
        self.scanner.set_position(body_end + close.len());
        Some(Ok(Token::new(kind, (start, self.scanner.position()), content)))
    }

    /// Parse `<!DOCTYPE ...>`, skipping over an internal subset `[...]`
    fn parse_doctype(&mut self, start: usize) -> TokenResult<'a> {
        let body_start = start + "<!DOCTYPE".len();
        self.scanner.set_position(body_start);
        let gt = self.scanner.find_tag_end_quoted();
        let end = match (self.scanner.find_byte(b'['), gt) {
            (Some(bracket), Some(gt)) if bracket < gt => {
                self.scanner.set_position(bracket);
                self.scanner.find_byte(b']').and_then(|close| {
                    self.scanner.set_position(close);
                    self.scanner.find_byte(b'>')
                })
            }
            (_, gt) => gt,
        };
        let Some(end) = end else {
            if self.strict {
                return self.error("unclosed DOCTYPE declaration", start);
            }
            return self.rest_as_text(start);
        };
        let content = self.scanner.slice(body_start, end);
        self.scanner.set_position(end + 1);
        Some(Ok(Token::new(TokenKind::DocType, (start, end + 1), content)))
    }

    /// Parse a processing instruction `<?target data?>`
    fn parse_pi(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.set_position(start + 2);
        let Some(target) = self.scanner.read_name() else {
            if self.strict {
                return self.error("invalid processing instruction target", start + 2);
            }
            return self.bogus_comment(start);
        };
        let data_start = self.scanner.position();
        let Some(end) = self.scanner.find_str("?>") else {
            if self.strict {
                return self.error("unclosed processing instruction", start);
            }
            return self.rest_as_text(start);
        };
        let content = self.scanner.slice(data_start, end).trim();
        self.scanner.set_position(end + 2);
        Some(Ok(Token::new(TokenKind::ProcessingInstruction, (start, end + 2), content).with_name(target)))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str, strict: bool) -> Vec<TokenKind> {
        let tokenizer = if strict { Tokenizer::new_strict(input) } else { Tokenizer::new(input) };
        tokenizer.map(|t| t.unwrap().kind).collect()
    }

    #[test]
    fn test_simple_element() {
        let tokens: Vec<_> = Tokenizer::new_strict("<root a=\"1\">hi</root>")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].kind, TokenKind::StartTag);
        assert_eq!(tokens[0].name, Some("root"));
        assert_eq!(tokens[0].content, " a=\"1\"");
        assert_eq!(tokens[1].content, "hi");
        assert_eq!(tokens[2].kind, TokenKind::EndTag);
    }

    #[test]
    fn test_empty_tag() {
        let mut tokenizer = Tokenizer::new_strict("<br class='x'/>");
        let token = tokenizer.next_token().unwrap().unwrap();
        assert_eq!(token.kind, TokenKind::EmptyTag);
        assert_eq!(token.content, " class='x'");
    }

    #[test]
    fn test_comment_cdata_pi_doctype() {
        assert_eq!(
            kinds("<!DOCTYPE html><?php echo 1 ?><!-- c --><![CDATA[<x>]]>", true),
            [TokenKind::DocType, TokenKind::ProcessingInstruction, TokenKind::Comment, TokenKind::CData]
        );
    }

    #[test]
    fn test_doctype_internal_subset() {
        let mut tokenizer = Tokenizer::new_strict("<!DOCTYPE doc [<!ENTITY e \"v\">]><doc/>");
        let token = tokenizer.next_token().unwrap().unwrap();
        assert_eq!(token.kind, TokenKind::DocType);
        assert_eq!(token.content, " doc [<!ENTITY e \"v\">]");
        assert_eq!(tokenizer.next_token().unwrap().unwrap().name, Some("doc"));
    }

    #[test]
    fn test_lenient_stray_lt_is_text() {
        let tokens: Vec<_> = Tokenizer::new("a < b <i>c</i>").map(|t| t.unwrap()).collect();
        assert_eq!(tokens[0].content, "a < b ");
        assert_eq!(tokens[1].name, Some("i"));
    }

    #[test]
    fn test_strict_errors() {
        let mut tokenizer = Tokenizer::new_strict("<root><!-- open");
        assert!(tokenizer.next_token().unwrap().is_ok());
        let err = tokenizer.next_token().unwrap().unwrap_err();
        assert_eq!(err.message, "unclosed comment");
        assert_eq!(err.position, 6);
        assert!(tokenizer.next_token().is_none());
    }

    #[test]
    fn test_non_ascii_before_tag_end() {
        let tokens: Vec<_> = Tokenizer::new_strict("<a x=\"é\"/><b title=café>x</b><c é>")
            .take(2)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::EmptyTag);
        assert_eq!(tokens[0].content, " x=\"é\"");

        let tokens: Vec<_> = Tokenizer::new("<b title=café>x</b><c é>").map(|t| t.unwrap()).collect();
        assert_eq!(tokens[0].kind, TokenKind::StartTag);
        assert_eq!(tokens[0].content, " title=café");
        assert_eq!(tokens[3].name, Some("c"));
        assert_eq!(tokens[3].content, " é");
    }

    #[test]
    fn test_raw_text() {
        let mut tokenizer = Tokenizer::new("<script>if (a<b) x();</script>");
        tokenizer.next_token();
        let raw = tokenizer.raw_text("script").unwrap();
        assert_eq!(raw.content, "if (a<b) x();");
        assert_eq!(tokenizer.next_token().unwrap().unwrap().kind, TokenKind::EndTag);
    }
}
