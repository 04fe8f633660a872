//! Loading server-rendered markup into a [`Document`].
//!
//! This is a small, strict tokenizer for the HTML that `render_to_string`
//! and similar renderers emit: elements, quoted or bare attributes, text,
//! comments, void elements and the common character references. It is not
//! an HTML5 tree builder; implicit end tags are rejected.

use tracing::trace;

use super::document::{Document, NodeId, BOOLEAN_PROPERTIES};
use crate::error::ParseError;
use crate::view::render::is_void_element;

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

impl Document {
    /// Parse `markup` and append the resulting nodes to `container`.
    ///
    /// Returns the top-level nodes that were appended. On error, nodes
    /// parsed before the failure remain attached.
    pub fn parse_into(&self, container: NodeId, markup: &str) -> Result<Vec<NodeId>, ParseError> {
        let mut parser = Parser {
            doc: self,
            input: markup,
            pos: 0,
            stack: vec![container],
            open_tags: Vec::new(),
            top_level: Vec::new(),
        };
        parser.run()?;
        trace!(nodes = parser.top_level.len(), "parsed markup");
        Ok(parser.top_level)
    }
}

struct Parser<'a> {
    doc: &'a Document,
    input: &'a str,
    pos: usize,
    stack: Vec<NodeId>,
    open_tags: Vec<String>,
    top_level: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn current(&self) -> NodeId {
        // The container is never popped.
        self.stack[self.stack.len() - 1]
    }

    fn attach(&mut self, node: NodeId) {
        self.doc.append_child(self.current(), node);
        if self.stack.len() == 1 {
            self.top_level.push(node);
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                let end = rest
                    .find("-->")
                    .ok_or(ParseError::UnexpectedEof(self.input.len()))?;
                self.pos += end + 3;
            } else if rest.starts_with("<!") {
                let end = rest
                    .find('>')
                    .ok_or(ParseError::UnexpectedEof(self.input.len()))?;
                self.pos += end + 1;
            } else if rest.starts_with("</") {
                self.close_tag()?;
            } else if rest.starts_with('<') {
                self.open_tag()?;
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let text = decode_entities(&rest[..end]);
                self.pos += end;
                let node = self.doc.create_text(&text);
                self.attach(node);
            }
        }
        match self.open_tags.pop() {
            Some(tag) => Err(ParseError::Unclosed(tag)),
            None => Ok(()),
        }
    }

    fn tag_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(ParseError::InvalidTag(start));
        }
        let name = self.rest()[..len].to_ascii_lowercase();
        self.pos += len;
        Ok(name)
    }

    fn skip_whitespace(&mut self) {
        let len = self.rest().len() - self.rest().trim_start().len();
        self.pos += len;
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else if self.rest().is_empty() {
            Err(ParseError::UnexpectedEof(self.pos))
        } else {
            Err(ParseError::InvalidTag(self.pos))
        }
    }

    fn close_tag(&mut self) -> Result<(), ParseError> {
        self.pos += 2;
        let found = self.tag_name()?;
        self.skip_whitespace();
        self.expect('>')?;
        match self.open_tags.pop() {
            Some(expected) if expected == found => {
                self.stack.pop();
                Ok(())
            }
            Some(expected) => Err(ParseError::MismatchedClose { expected, found }),
            None => Err(ParseError::StrayClose(found)),
        }
    }

    fn open_tag(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        let tag = self.tag_name()?;
        let node = self.doc.create_element(&tag);

        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(ParseError::UnexpectedEof(self.pos));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            self.attribute(node)?;
        };

        self.attach(node);
        if self_closing || is_void_element(&tag) {
            return Ok(());
        }
        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            let close = format!("</{tag}");
            let end = self
                .rest()
                .find(&close)
                .ok_or(ParseError::Unclosed(tag.clone()))?;
            if end > 0 {
                let text = self.doc.create_text(&self.rest()[..end]);
                self.doc.append_child(node, text);
            }
            self.pos += end + close.len();
            self.skip_whitespace();
            return self.expect('>');
        }
        self.stack.push(node);
        self.open_tags.push(tag);
        Ok(())
    }

    fn attribute(&mut self, node: NodeId) -> Result<(), ParseError> {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| c.is_whitespace() || matches!(c, '=' | '>' | '/' | '"' | '\''))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(ParseError::InvalidTag(start));
        }
        let name = self.rest()[..len].to_ascii_lowercase();
        self.pos += len;
        self.skip_whitespace();

        let value = if self.rest().starts_with('=') {
            self.pos += 1;
            self.skip_whitespace();
            self.attribute_value()?
        } else {
            String::new()
        };

        if BOOLEAN_PROPERTIES.contains(&name.as_str()) {
            self.doc.set_property(node, &name, true);
        }
        self.doc.set_attribute(node, &name, &value);
        Ok(())
    }

    fn attribute_value(&mut self) -> Result<String, ParseError> {
        let rest = self.rest();
        let quote = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => q,
            Some(_) => {
                let len = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                self.pos += len;
                return Ok(decode_entities(&rest[..len]));
            }
            None => return Err(ParseError::UnexpectedEof(self.pos)),
        };
        let body = &rest[1..];
        let len = body
            .find(quote)
            .ok_or(ParseError::UnexpectedEof(self.input.len()))?;
        self.pos += len + 2;
        Ok(decode_entities(&body[..len]))
    }
}

/// Replace character references with the characters they name.
///
/// Unknown references are kept verbatim.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let name = &rest[1..semi];
            let c = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            }?;
            Some((c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(markup: &str) -> (Document, NodeId) {
        let doc = Document::new();
        let root = doc.root();
        doc.parse_into(root, markup).unwrap();
        (doc, root)
    }

    #[test]
    fn test_parse_nested_elements() {
        let (doc, root) = parse("<div id=\"app\"><span class='n'>0</span> <br></div>");
        let div = doc.children(root)[0];
        assert_eq!(doc.tag(div).as_deref(), Some("div"));
        assert_eq!(doc.attribute(div, "id").as_deref(), Some("app"));

        let children = doc.children(div);
        assert_eq!(children.len(), 3);
        assert_eq!(doc.attribute(children[0], "class").as_deref(), Some("n"));
        assert_eq!(doc.text_content(children[0]), "0");
        assert_eq!(doc.text(children[1]).as_deref(), Some(" "));
        assert_eq!(doc.tag(children[2]).as_deref(), Some("br"));
    }

    #[test]
    fn test_parse_boolean_and_unquoted_attributes() {
        let (doc, root) = parse("<input type=checkbox checked data-key=7>");
        let input = doc.children(root)[0];
        assert!(doc.property(input, "checked"));
        assert_eq!(doc.attribute(input, "type").as_deref(), Some("checkbox"));
        assert_eq!(doc.recorded_key(input).as_deref(), Some("7"));
    }

    #[test]
    fn test_parse_skips_comments_and_doctype() {
        let (doc, root) = parse("<!DOCTYPE html><!-- note --><p>a &amp; b &#60;&#x3e;</p>");
        let nodes = doc.children(root);
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.text_content(nodes[0]), "a & b <>");
    }

    #[test]
    fn test_empty_comment_splits_text() {
        let (doc, root) = parse("<p>Count: <!---->0</p>");
        let texts = doc.children(doc.children(root)[0]);
        assert_eq!(texts.len(), 2);
        assert_eq!(doc.text(texts[0]).as_deref(), Some("Count: "));
        assert_eq!(doc.text(texts[1]).as_deref(), Some("0"));
    }

    #[test]
    fn test_parse_raw_text() {
        let (doc, root) = parse("<script>if (a < b) {}</script>");
        assert_eq!(doc.text_content(doc.children(root)[0]), "if (a < b) {}");
    }

    #[test]
    fn test_parse_errors() {
        let doc = Document::new();
        let root = doc.root();
        assert_eq!(
            doc.parse_into(root, "<div></span>"),
            Err(ParseError::MismatchedClose {
                expected: "div".into(),
                found: "span".into()
            })
        );
        assert_eq!(
            doc.parse_into(root, "</p>"),
            Err(ParseError::StrayClose("p".into()))
        );
        assert_eq!(
            doc.parse_into(root, "<ul><li>"),
            Err(ParseError::Unclosed("li".into()))
        );
        assert!(matches!(
            doc.parse_into(root, "<div class=\"x"),
            Err(ParseError::UnexpectedEof(_))
        ));
        assert!(matches!(
            doc.parse_into(root, "< div>"),
            Err(ParseError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_decode_keeps_unknown_references() {
        assert_eq!(decode_entities("&bogus; & &lt"), "&bogus; & &lt");
    }
}
