//! Recursive-descent reader producing a concrete-syntax-preserving AST (§4.2).
//!
//! Whitespace and comments are emitted as ordinary children alongside the
//! significant forms so the unparser can reconstruct the source exactly.
//! The one reader-level rewrite performed here is `'x` -> `(quote x)`
//! (§4.2); everything else is structural, not semantic — special forms are
//! recognised later, by the compiler, once names have been resolved against
//! [`crate::keywords::Keywords`].

use crate::ast::{Node, NodeKind};
use crate::error::{SeniError, SeniResult};
use crate::word_table::{Iname, WordTable};

const DELIMITERS: &[char] = &['(', ')', '[', ']', '{', '}', '"', ';', '\''];

pub struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    words: &'a mut WordTable,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, words: &'a mut WordTable) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            words,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn slice_from(&self, start: usize) -> &'a str {
        &self.src[start..self.pos]
    }

    /// Resolves `text` against the pre-registered keyword/native ranges
    /// before minting a fresh word iname, so that e.g. `if` or `vector/append`
    /// typed in a script resolve to the same iname the compiler looks up
    /// when recognising special forms and native calls (§3 "word table").
    fn resolve_or_intern(&mut self, text: &str) -> SeniResult<Iname> {
        if let Some(iname) = self.words.lookup(text) {
            return Ok(iname);
        }
        self.words.intern(text)
    }

    /// Parses every top-level form (and interleaved trivia) until EOF.
    pub fn parse_program(src: &'a str, words: &'a mut WordTable) -> SeniResult<Vec<Node>> {
        let mut parser = Self::new(src, words);
        let mut top = Vec::new();
        while !parser.at_eof() {
            top.push(parser.consume_item()?);
        }
        Ok(top)
    }

    fn consume_whitespace(&mut self) -> Node {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
        Node::leaf(NodeKind::Whitespace, self.slice_from(start))
    }

    fn consume_comment(&mut self) -> Node {
        let start = self.pos;
        self.advance(); // ';'
        while !matches!(self.peek(), None | Some('\n')) {
            self.advance();
        }
        Node::leaf(NodeKind::Comment, self.slice_from(start))
    }

    fn consume_string(&mut self) -> SeniResult<Node> {
        let start = self.pos;
        self.advance(); // opening quote
        let content_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(SeniError::UnterminatedString { pos: start }),
                Some('"') => {
                    break;
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let content = &self.src[content_start..self.pos];
        self.advance(); // closing quote
        // Strings are interned as words (§3): at runtime a STRING becomes a
        // Value::Name, so its content needs the same stable iname a bare
        // identifier would get.
        let content = content.to_owned();
        let iname = self.resolve_or_intern(&content)?;
        Ok(Node::string(iname, self.slice_from(start)))
    }

    fn consume_list(&mut self, open: char, close: char, kind: NodeKind) -> SeniResult<Node> {
        let start = self.pos;
        self.advance(); // opening bracket
        let mut children = Vec::new();
        loop {
            match self.peek() {
                None => return Err(SeniError::MismatchedBracket { pos: start, expected: close }),
                Some(c) if c == close => {
                    self.advance();
                    break;
                }
                _ => children.push(self.consume_item()?),
            }
        }
        let _ = open;
        Ok(Node::compound(kind, children, self.slice_from(start)))
    }

    fn consume_quote(&mut self) -> SeniResult<Node> {
        let start = self.pos;
        self.advance(); // '\''
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
        let quoted = self.consume_item()?;
        let quote_iname = self.resolve_or_intern("quote")?;
        let quote_name = Node::name(quote_iname, "quote");
        Ok(Node::compound(
            NodeKind::List,
            vec![quote_name, Node::leaf(NodeKind::Whitespace, " "), quoted],
            self.slice_from(start),
        ))
    }

    fn is_number_start(&self) -> bool {
        let mut chars = self.src[self.pos..].chars();
        match chars.next() {
            Some(c) if c.is_ascii_digit() => true,
            Some('-') => matches!(chars.next(), Some(c) if c.is_ascii_digit()),
            _ => false,
        }
    }

    fn consume_number(&mut self) -> SeniResult<Node> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some('.') {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = self.slice_from(start);
        if is_float {
            let value: f64 = text.parse().map_err(|_| SeniError::MismatchedBracket { pos: start, expected: '0' })?;
            Ok(Node::float(value, text))
        } else {
            let value: i64 = text.parse().map_err(|_| SeniError::MismatchedBracket { pos: start, expected: '0' })?;
            Ok(Node::int(value, text))
        }
    }

    fn consume_symbol(&mut self) -> SeniResult<Node> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || DELIMITERS.contains(&c) {
                break;
            }
            self.advance();
        }
        let mut text = self.slice_from(start);
        let is_label = text.ends_with(':') && text.len() > 1;
        if is_label {
            text = &text[..text.len() - 1];
        }

        let text = text.to_owned();
        let node = match text.as_str() {
            "true" => Node::boolean(true, self.slice_from(start)),
            "false" => Node::boolean(false, self.slice_from(start)),
            _ => {
                let iname = self.resolve_or_intern(&text)?;
                if is_label {
                    Node::label(iname, self.slice_from(start))
                } else {
                    Node::name(iname, self.slice_from(start))
                }
            }
        };
        Ok(node)
    }

    /// Parses an alterable wrapper `{value body…}` (§4.2, corrected against
    /// the original reader's `consume_alterable`): the brace's first
    /// significant child is the alterable value itself, not a trailing
    /// annotation on some already-parsed node, and everything after it up to
    /// the closing `}` is the `parameter_ast` that materialises its gene.
    /// Only INT/FLOAT/NAME/LIST/VECTOR may sit in the value position (§3,
    /// enforced here rather than deferred to the compiler since it is
    /// purely syntactic).
    fn consume_alterable(&mut self) -> SeniResult<Node> {
        let brace_start = self.pos;
        self.advance(); // '{'

        let prefix_start = self.pos;
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some(';') => {
                    self.consume_comment();
                }
                _ => break,
            }
        }
        let prefix = self.slice_from(prefix_start).to_owned();

        if matches!(self.peek(), None | Some('}')) {
            return Err(SeniError::MismatchedBracket { pos: brace_start, expected: '}' });
        }
        let value = self.consume_item_without_alterable()?;
        if !value.is_alterable_eligible() {
            return Err(SeniError::NonAlterableInBraces { pos: brace_start });
        }

        let body_start = self.pos;
        let mut body_children = Vec::new();
        loop {
            match self.peek() {
                None => return Err(SeniError::MismatchedBracket { pos: brace_start, expected: '}' }),
                Some('}') => break,
                _ => body_children.push(self.consume_item()?),
            }
        }
        let body_source = self.slice_from(body_start);
        let body = Node::compound(NodeKind::List, body_children, body_source);
        self.advance(); // '}'

        Ok(value.with_alterable(body, prefix))
    }

    /// Like [`Self::consume_item`] but never recurses into
    /// [`Self::consume_alterable`] — used for the value slot of an alterable
    /// wrapper, which may not itself be wrapped again.
    fn consume_item_without_alterable(&mut self) -> SeniResult<Node> {
        match self.peek() {
            None => unreachable!("caller checks for EOF before calling this"),
            Some(c) if c.is_whitespace() => Ok(self.consume_whitespace()),
            Some(';') => Ok(self.consume_comment()),
            Some('"') => self.consume_string(),
            Some('\'') => self.consume_quote(),
            Some('(') => self.consume_list('(', ')', NodeKind::List),
            Some('[') => self.consume_list('[', ']', NodeKind::Vector),
            Some(c) if DELIMITERS.contains(&c) => Err(SeniError::MismatchedBracket { pos: self.pos, expected: ' ' }),
            _ if self.is_number_start() => self.consume_number(),
            _ => self.consume_symbol(),
        }
    }

    fn consume_item(&mut self) -> SeniResult<Node> {
        match self.peek() {
            None => unreachable!("caller checks at_eof before calling consume_item"),
            Some(c) if c.is_whitespace() => Ok(self.consume_whitespace()),
            Some(';') => Ok(self.consume_comment()),
            Some('"') => self.consume_string(),
            Some('\'') => self.consume_quote(),
            Some('(') => self.consume_list('(', ')', NodeKind::List),
            Some('[') => self.consume_list('[', ']', NodeKind::Vector),
            Some('{') => self.consume_alterable(),
            Some(c) if DELIMITERS.contains(&c) => Err(SeniError::MismatchedBracket { pos: self.pos, expected: ' ' }),
            _ if self.is_number_start() => self.consume_number(),
            _ => self.consume_symbol(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (Vec<Node>, WordTable) {
        let mut words = WordTable::new();
        let nodes = Parser::parse_program(src, &mut words).unwrap();
        (nodes, words)
    }

    #[test]
    fn parses_a_simple_call() {
        let (nodes, _words) = parse("(+ 3 4)");
        assert_eq!(nodes.len(), 1);
        let list = &nodes[0];
        assert_eq!(list.kind, NodeKind::List);
        let sig: Vec<_> = list.significant_children().collect();
        assert_eq!(sig.len(), 3);
        assert_eq!(sig[1].kind, NodeKind::Int);
        assert_eq!(sig[1].int_value, 3);
    }

    #[test]
    fn quote_rewrites_to_quote_list() {
        let (nodes, mut words) = parse("'foo");
        let list = &nodes[0];
        assert_eq!(list.kind, NodeKind::List);
        let sig: Vec<_> = list.significant_children().collect();
        assert_eq!(sig.len(), 2);
        assert_eq!(sig[0].name, Some(words.intern("quote").unwrap()));
    }

    #[test]
    fn label_strips_trailing_colon() {
        let (nodes, mut words) = parse("a: 1");
        assert_eq!(nodes[0].kind, NodeKind::Label);
        assert_eq!(nodes[0].name, Some(words.intern("a").unwrap()));
    }

    #[test]
    fn alterable_wrapper_attaches_default_expression() {
        let (nodes, _words) = parse("{0.5 (gen/scalar)}");
        let node = &nodes[0];
        assert!(node.alterable);
        assert_eq!(node.float_value, 0.5);
        assert!(node.parameter_ast.is_some());
        assert_eq!(node.parameter_ast.as_ref().unwrap().source, " (gen/scalar)");
    }

    #[test]
    fn non_alterable_leaf_rejects_brace_wrapper() {
        let mut words = WordTable::new();
        let err = Parser::parse_program("{\"hi\" (gen/scalar)}", &mut words).unwrap_err();
        assert!(matches!(err, SeniError::NonAlterableInBraces { .. }));
    }

    #[test]
    fn alterable_wrapper_with_leading_trivia_preserves_prefix() {
        let (nodes, _words) = parse("{ 0.5 (gen/scalar)}");
        let node = &nodes[0];
        assert_eq!(node.parameter_prefix.as_deref(), Some(" "));
    }

    #[test]
    fn mismatched_bracket_is_reported() {
        let mut words = WordTable::new();
        let err = Parser::parse_program("(+ 1 2", &mut words).unwrap_err();
        assert!(matches!(err, SeniError::MismatchedBracket { .. }));
    }
}
