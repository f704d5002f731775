// SPDX-License-Identifier: Apache-2.0 OR MIT
use smallvec::SmallVec;

use crate::ast::{
    Argument, Ast, Block, EscapeNode, Fallback, HelperCall, HelperChain, InterpolationNode,
    KeyOrigin, KeyPath, Node, SectionNode, Span, TextNode,
};
use crate::error::Error;
use crate::lexer::{self, Keyword, Token, TokenKind};

/// Name of the reserved escape tag whose body is emitted verbatim.
pub const ESCAPE_TAG: &str = "~";
/// Helper name that switches a block from single-value to iterate mode.
pub const EACH_HELPER: &str = "each";
/// Helper name that disables HTML escaping for an interpolation.
pub const RAW_HELPER: &str = "raw";

/// Parses template source into an AST.
///
/// The scanner walks the input once, splitting it into literal text and
/// `{{ }}` tag windows. Open sections go onto an explicit frame stack and
/// are paired with their `{{ :name }}` / `{{ /name }}` markers structurally,
/// so same-named tags nested inside themselves or repeated as siblings pair
/// correctly without any rewriting pass.
///
/// Pairing faults never fail the parse: a close or else marker that does
/// not match the innermost open section is kept as literal text, and
/// sections still open at end of input are dissolved back into their
/// literal markers. Only broken tag-body syntax and a malformed escape
/// block are reported as errors.
pub fn parse_template(name: &str, source: &str) -> Result<Ast, Error> {
    let mut parser = TemplateParser::new(source);
    parser.run()?;
    Ok(Ast::new(name, parser.finish()))
}

struct TemplateParser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    root: Block,
    frames: Vec<SectionFrame>,
}

/// Open section awaiting its close marker.
struct SectionFrame {
    name: String,
    key: KeyPath,
    chain: HelperChain,
    open_span: Span,
    /// Literal marker text, kept so an unterminated frame can be dissolved
    /// back into the output instead of erroring.
    open_text: String,
    inner: Block,
    else_text: Option<String>,
    else_body: Option<Block>,
}

impl SectionFrame {
    fn body_mut(&mut self) -> &mut Block {
        self.else_body.as_mut().unwrap_or(&mut self.inner)
    }
}

impl<'a> TemplateParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            root: Block::default(),
            frames: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<(), Error> {
        // Copies of the borrowed source so slices of it can be passed into
        // `&mut self` methods below.
        let source = self.source;
        let bytes = self.bytes;
        let mut cursor = 0usize;

        while cursor < bytes.len() {
            let Some(open) = find_tag_start(bytes, cursor) else {
                self.push_text(Span::new(cursor, source.len()), &source[cursor..]);
                break;
            };
            if open > cursor {
                self.push_text(Span::new(cursor, open), &source[cursor..open]);
            }

            let Some(close) = find_tag_end(bytes, open + 2) else {
                // Unterminated window: the remainder is literal text.
                self.push_text(Span::new(open, source.len()), &source[open..]);
                break;
            };

            let span = Span::new(open, close + 2);
            let body = source[open + 2..close].trim();
            let body_offset = open
                + 2
                + (source[open + 2..close].len() - source[open + 2..close].trim_start().len());

            cursor = close + 2;

            if let Some(rest) = body.strip_prefix('#') {
                if rest.trim() == ESCAPE_TAG {
                    cursor = self.consume_escape_block(span, cursor)?;
                } else {
                    self.open_section(span, rest, body_offset + 1)?;
                }
            } else if let Some(rest) = body.strip_prefix(':') {
                self.handle_else(span, rest.trim());
            } else if let Some(rest) = body.strip_prefix('/') {
                self.handle_close(span, rest.trim());
            } else if body.starts_with('>') {
                // Inclusion markers are spliced before parsing; one that
                // survives names an unknown partial and renders as nothing.
            } else if body.is_empty() {
                self.push_text(span, &source[span.start..span.end]);
            } else {
                let node = self.parse_interpolation(span, body, body_offset)?;
                self.push(Node::Interpolation(node));
            }
        }

        self.dissolve_open_frames();
        Ok(())
    }

    fn finish(self) -> Block {
        self.root
    }

    /// Scans forward from `cursor` for the `{{ /~ }}` matching an escape
    /// open marker, honouring nested escape blocks, and records the raw
    /// text in between verbatim.
    fn consume_escape_block(&mut self, open_span: Span, cursor: usize) -> Result<usize, Error> {
        let source = self.source;
        let bytes = self.bytes;
        let mut depth = 1usize;
        let mut scan = cursor;

        while let Some(open) = find_tag_start(bytes, scan) {
            let Some(close) = find_tag_end(bytes, open + 2) else {
                break;
            };
            let body = source[open + 2..close].trim();
            if body == format!("#{ESCAPE_TAG}") {
                depth += 1;
            } else if body == format!("/{ESCAPE_TAG}") {
                depth -= 1;
                if depth == 0 {
                    self.push(Node::Escape(EscapeNode {
                        span: Span::new(open_span.start, close + 2),
                        text: source[cursor..open].to_string(),
                    }));
                    return Ok(close + 2);
                }
            }
            scan = close + 2;
        }

        Err(Error::parse_with_span("unterminated escape block", open_span))
    }

    fn open_section(&mut self, span: Span, body: &str, offset: usize) -> Result<(), Error> {
        let tokens = lexer::lex_tag(body, offset)?;
        let mut cursor = TokenCursor::new(&tokens);
        let key = cursor.parse_key()?;
        let chain = cursor.parse_chain()?;
        cursor.expect_eof()?;

        self.frames.push(SectionFrame {
            name: key.to_string(),
            key,
            chain,
            open_span: span,
            open_text: self.source[span.start..span.end].to_string(),
            inner: Block::default(),
            else_text: None,
            else_body: None,
        });
        Ok(())
    }

    fn handle_else(&mut self, span: Span, name: &str) {
        let source = self.source;
        let matches = self
            .frames
            .last()
            .map(|frame| frame.name == name && frame.else_body.is_none())
            .unwrap_or(false);
        if matches {
            let frame = self.frames.last_mut().unwrap();
            frame.else_text = Some(source[span.start..span.end].to_string());
            frame.else_body = Some(Block::default());
        } else {
            // Else marker with no matching open block stays literal.
            self.push_text(span, &source[span.start..span.end]);
        }
    }

    fn handle_close(&mut self, span: Span, name: &str) {
        let source = self.source;
        let matches = self
            .frames
            .last()
            .map(|frame| frame.name == name)
            .unwrap_or(false);
        if !matches {
            self.push_text(span, &source[span.start..span.end]);
            return;
        }

        let frame = self.frames.pop().unwrap();
        let node = Node::Section(SectionNode {
            span: Span::new(frame.open_span.start, span.end),
            name: frame.name,
            key: frame.key,
            chain: frame.chain,
            inner: frame.inner,
            else_body: frame.else_body,
        });
        self.push(node);
    }

    /// Turns every still-open frame back into its literal markers plus the
    /// nodes collected so far, innermost first.
    fn dissolve_open_frames(&mut self) {
        while let Some(frame) = self.frames.pop() {
            let mut nodes = Vec::new();
            nodes.push(Node::Text(TextNode::new(frame.open_span, frame.open_text)));
            nodes.extend(frame.inner.nodes);
            if let Some(else_body) = frame.else_body {
                let else_text = frame.else_text.unwrap_or_default();
                nodes.push(Node::Text(TextNode::new(frame.open_span, else_text)));
                nodes.extend(else_body.nodes);
            }
            for node in nodes {
                self.push(node);
            }
        }
    }

    fn parse_interpolation(
        &self,
        span: Span,
        body: &str,
        offset: usize,
    ) -> Result<InterpolationNode, Error> {
        let tokens = lexer::lex_tag(body, offset)?;
        let mut cursor = TokenCursor::new(&tokens);
        let key = cursor.parse_key()?;
        let fallback = cursor.parse_fallback()?;
        let chain = cursor.parse_chain()?;
        cursor.expect_eof()?;

        // Only sections iterate; accepting the switch here would shunt
        // the rest of the chain into a per-item list nothing ever runs.
        if chain.iterate {
            return Err(Error::parse_with_span(
                "'each' is only valid on a section tag",
                span,
            ));
        }

        Ok(InterpolationNode {
            span,
            key,
            fallback,
            chain,
        })
    }

    fn push_text(&mut self, span: Span, text: &str) {
        if text.is_empty() {
            return;
        }
        self.push(Node::Text(TextNode::new(span, text)));
    }

    fn push(&mut self, node: Node) {
        match self.frames.last_mut() {
            Some(frame) => frame.body_mut().push(node),
            None => self.root.push(node),
        }
    }
}

/// Token-stream cursor for tag bodies.
struct TokenCursor<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl<'a> TokenCursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, index: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.index)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.index)?;
        self.index += 1;
        Some(token)
    }

    fn expect_eof(&self) -> Result<(), Error> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(Error::parse(
                format!("unexpected token {:?}", token.kind),
                Some(token.span),
            )),
        }
    }

    fn parse_key(&mut self) -> Result<KeyPath, Error> {
        let origin = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::ParentPrefix) => {
                self.bump();
                KeyOrigin::Parent
            }
            Some(TokenKind::RootPrefix) => {
                self.bump();
                KeyOrigin::Root
            }
            Some(TokenKind::Dot) => {
                self.bump();
                return Ok(KeyPath::dot());
            }
            _ => KeyOrigin::Current,
        };

        let mut segments: SmallVec<[String; 4]> = SmallVec::new();
        loop {
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Identifier(name)) => {
                    segments.push(name.clone());
                    self.bump();
                }
                Some(TokenKind::NumberLiteral(index)) if !segments.is_empty() => {
                    segments.push(index.to_string());
                    self.bump();
                }
                _ => break,
            }
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Dot) => {
                    self.bump();
                }
                _ => break,
            }
        }

        if segments.is_empty() {
            let span = self.peek().map(|t| t.span);
            return match origin {
                // `../` or `$root.` alone addresses that scope value.
                KeyOrigin::Parent | KeyOrigin::Root => Ok(KeyPath {
                    origin,
                    segments,
                }),
                KeyOrigin::Current => Err(Error::parse("expected key", span)),
            };
        }

        Ok(KeyPath { origin, segments })
    }

    fn parse_fallback(&mut self) -> Result<Option<Fallback>, Error> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Or) => {
                self.bump();
            }
            _ => return Ok(None),
        }

        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::StringLiteral(text)) => {
                let text = text.clone();
                self.bump();
                Ok(Some(Fallback::Literal(text)))
            }
            _ => Ok(Some(Fallback::Key(self.parse_key()?))),
        }
    }

    fn parse_chain(&mut self) -> Result<HelperChain, Error> {
        let mut chain = HelperChain::default();

        while let Some(TokenKind::Pipe) = self.peek().map(|t| &t.kind) {
            self.bump();
            let call = self.parse_helper_call()?;
            if call.name == EACH_HELPER {
                // The mode switch is not itself a helper invocation.
                chain.iterate = true;
            } else if call.name == RAW_HELPER {
                chain.raw = true;
            } else if chain.iterate {
                chain.per_item.push(call);
            } else {
                chain.aggregate.push(call);
            }
        }

        Ok(chain)
    }

    fn parse_helper_call(&mut self) -> Result<HelperCall, Error> {
        let token = self
            .bump()
            .ok_or_else(|| Error::parse("expected helper name after '|'", None))?;
        let name = match &token.kind {
            TokenKind::Identifier(name) => name.clone(),
            other => {
                return Err(Error::parse(
                    format!("expected helper name, found {other:?}"),
                    Some(token.span),
                ));
            }
        };

        let mut args = Vec::new();
        if let Some(TokenKind::LeftParen) = self.peek().map(|t| &t.kind) {
            self.bump();
            loop {
                match self.peek().map(|t| &t.kind) {
                    Some(TokenKind::RightParen) => {
                        self.bump();
                        break;
                    }
                    Some(TokenKind::Comma) => {
                        self.bump();
                    }
                    Some(_) => args.push(self.parse_argument()?),
                    None => {
                        return Err(Error::parse("expected ')'", Some(token.span)));
                    }
                }
            }
        }

        Ok(HelperCall::new(name, args))
    }

    fn parse_argument(&mut self) -> Result<Argument, Error> {
        let token = self
            .peek()
            .ok_or_else(|| Error::parse("expected helper argument", None))?;
        let arg = match &token.kind {
            TokenKind::StringLiteral(text) => {
                let text = text.clone();
                self.bump();
                Argument::Str(text)
            }
            TokenKind::NumberLiteral(value) => {
                let value = *value;
                self.bump();
                Argument::Int(value)
            }
            TokenKind::Keyword(Keyword::True) => {
                self.bump();
                Argument::Bool(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.bump();
                Argument::Bool(false)
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.bump();
                Argument::Null
            }
            _ => Argument::Key(self.parse_key()?),
        };
        Ok(arg)
    }
}

pub(crate) fn find_tag_start(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            return Some(i);
        }
        i += 1;
    }
    None
}

pub(crate) fn find_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    let mut quote: Option<u8> = None;
    while i + 1 < bytes.len() {
        let current = bytes[i];

        if let Some(q) = quote {
            if current == b'\\' {
                i += 2;
                continue;
            }
            if current == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match current {
            b'"' | b'\'' => {
                quote = Some(current);
                i += 1;
                continue;
            }
            b'}' if bytes[i + 1] == b'}' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_interpolations() {
        let ast = parse_template("t", "hello {{ name }}!").unwrap();
        assert_eq!(ast.root.nodes.len(), 3);
        assert!(matches!(ast.root.nodes[1], Node::Interpolation(_)));
    }

    #[test]
    fn parses_section_with_else() {
        let ast = parse_template("t", "{{ #flag }}yes{{ :flag }}no{{ /flag }}").unwrap();
        let section = match &ast.root.nodes[0] {
            Node::Section(node) => node,
            other => panic!("expected section, got {other}"),
        };
        assert_eq!(section.name, "flag");
        assert_eq!(section.inner.nodes.len(), 1);
        assert!(section.else_body.is_some());
    }

    #[test]
    fn nested_same_named_sections_pair_innermost_first() {
        let ast =
            parse_template("t", "{{ #a }}x{{ #a }}y{{ /a }}z{{ /a }}").unwrap();
        let outer = match &ast.root.nodes[0] {
            Node::Section(node) => node,
            other => panic!("expected section, got {other}"),
        };
        assert_eq!(outer.inner.nodes.len(), 3);
        assert!(matches!(outer.inner.nodes[1], Node::Section(_)));
    }

    #[test]
    fn sibling_same_named_sections_parse_independently() {
        let ast = parse_template("t", "{{ #a }}1{{ /a }}{{ #a }}2{{ /a }}").unwrap();
        assert_eq!(ast.root.nodes.len(), 2);
        assert!(ast
            .root
            .nodes
            .iter()
            .all(|node| matches!(node, Node::Section(_))));
    }

    #[test]
    fn unmatched_close_stays_literal() {
        let ast = parse_template("t", "a{{ /nope }}b").unwrap();
        let texts: Vec<_> = ast
            .root
            .nodes
            .iter()
            .map(|node| match node {
                Node::Text(text) => text.text.as_str(),
                other => panic!("expected text nodes only, got {other}"),
            })
            .collect();
        assert_eq!(texts, vec!["a", "{{ /nope }}", "b"]);
    }

    #[test]
    fn unterminated_section_dissolves_to_text() {
        let ast = parse_template("t", "{{ #open }}body").unwrap();
        assert_eq!(ast.root.nodes.len(), 2);
        match &ast.root.nodes[0] {
            Node::Text(text) => assert_eq!(text.text, "{{ #open }}"),
            other => panic!("expected literal open marker, got {other}"),
        }
    }

    #[test]
    fn chain_splits_at_each() {
        let ast =
            parse_template("t", "{{ #items|sort|each|is(true) }}x{{ /items }}").unwrap();
        let section = match &ast.root.nodes[0] {
            Node::Section(node) => node,
            other => panic!("expected section, got {other}"),
        };
        assert!(section.chain.iterate);
        assert_eq!(section.chain.aggregate.len(), 1);
        assert_eq!(section.chain.aggregate[0].name, "sort");
        assert_eq!(section.chain.per_item.len(), 1);
        assert_eq!(section.chain.per_item[0].name, "is");
        assert_eq!(section.chain.per_item[0].args, vec![Argument::Bool(true)]);
    }

    #[test]
    fn escape_block_captures_raw_tag_syntax() {
        let ast = parse_template("t", "{{ #~ }}{{ literal }}{{ /~ }}").unwrap();
        match &ast.root.nodes[0] {
            Node::Escape(node) => assert_eq!(node.text, "{{ literal }}"),
            other => panic!("expected escape node, got {other}"),
        }
    }

    #[test]
    fn escape_blocks_nest() {
        let ast =
            parse_template("t", "{{ #~ }}a{{ #~ }}b{{ /~ }}c{{ /~ }}").unwrap();
        match &ast.root.nodes[0] {
            Node::Escape(node) => assert_eq!(node.text, "a{{ #~ }}b{{ /~ }}c"),
            other => panic!("expected escape node, got {other}"),
        }
    }

    #[test]
    fn unterminated_escape_block_errors() {
        let err = parse_template("t", "{{ #~ }}dangling").unwrap_err();
        assert!(err.to_string().contains("unterminated escape block"));
    }

    #[test]
    fn interpolation_rejects_the_iterate_switch() {
        let err = parse_template("t", "{{ items|each|upper }}").unwrap_err();
        assert!(err.to_string().contains("only valid on a section"));
        assert!(parse_template("t", "{{ items|each }}").is_err());
        // The same chain on a section is fine.
        assert!(parse_template("t", "{{ #items|each|upper }}x{{ /items }}").is_ok());
    }

    #[test]
    fn node_spans_index_their_source_windows() {
        let source = "a{{ name }}{{ #flag }}y{{ /flag }}";
        let ast = parse_template("t", source).unwrap();
        let interp = ast.root.nodes[1].span();
        assert_eq!(&source[interp.start..interp.end], "{{ name }}");
        let section = ast.root.nodes[2].span();
        assert_eq!(&source[section.start..section.end], "{{ #flag }}y{{ /flag }}");
    }

    #[test]
    fn interpolation_with_fallback_and_chain() {
        let ast = parse_template("t", "{{ name || \"guest\" | upper | raw }}").unwrap();
        let node = match &ast.root.nodes[0] {
            Node::Interpolation(node) => node,
            other => panic!("expected interpolation, got {other}"),
        };
        assert_eq!(node.fallback, Some(Fallback::Literal("guest".into())));
        assert_eq!(node.chain.aggregate.len(), 1);
        assert!(node.chain.raw);
    }

    #[test]
    fn find_tag_end_skips_quoted_braces() {
        let input = b"{{ key || \"}}\" }} tail";
        let start = find_tag_start(input, 0).unwrap();
        let end = find_tag_end(input, start + 2).unwrap();
        assert_eq!(&input[end..end + 2], b"}}");
        assert!(end > 14);
    }
}
