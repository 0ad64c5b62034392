//! Markup codec: a tolerant HTML-subset parser and serializer.
//!
//! The parser never fails. Unknown constructs degrade to text, unclosed
//! elements are closed at the end of input and stray closing tags are
//! ignored, which is what pasted content from arbitrary pages needs.
//!
//! ## Learning: Slicing on ASCII Delimiters
//!
//! `&str` can only be sliced on char boundaries. Every delimiter the parser
//! looks for (`<`, `>`, `=`, quotes, whitespace) is ASCII, so byte positions
//! found with `find` are always safe to slice at.

use crate::node::{Element, FragmentNode, NodeId, NodeKind};
use crate::Document;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Returns true for elements that never have children.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

// ==================== Parsing ====================

/// Parses markup into detached top-level nodes.
pub fn parse_fragment(input: &str) -> Vec<FragmentNode> {
    let mut parser = Parser {
        input,
        pos: 0,
        stack: vec![FragmentNode::element(Element::new("#fragment"), Vec::new())],
    };
    parser.run();
    parser.finish()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Open elements; index 0 is the synthetic fragment root
    stack: Vec<FragmentNode>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn run(&mut self) {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.skip_past("-->");
            } else if rest.starts_with("</") {
                self.close_tag();
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past(">");
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.open_tag();
            } else {
                self.text();
            }
        }
    }

    fn skip_past(&mut self, marker: &str) {
        match self.rest().find(marker) {
            Some(i) => self.pos += i + marker.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn text(&mut self) {
        let rest = self.rest();
        // A lone '<' that doesn't start a tag is literal text
        let skip = usize::from(rest.starts_with('<'));
        let end = rest[skip..].find('<').map(|i| i + skip).unwrap_or(rest.len());
        let raw = &rest[..end];
        self.pos += end;
        self.push_text(decode_entities(raw));
    }

    fn push_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        if let Some(FragmentNode {
            kind: NodeKind::Text(prev),
            ..
        }) = parent.children.last_mut()
        {
            prev.push_str(&text);
        } else {
            parent.children.push(FragmentNode::text(text));
        }
    }

    fn current(&mut self) -> &mut FragmentNode {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn open_tag(&mut self) {
        let rest = self.rest();
        let Some(end) = find_tag_end(rest) else {
            // Unterminated tag: keep it as text
            self.pos = self.input.len();
            self.push_text(rest.to_string());
            return;
        };
        let inner = &rest[1..end];
        self.pos += end + 1;

        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');
        let name_end = inner
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(inner.len());
        let mut element = Element::new(&inner[..name_end]);
        element.attrs = parse_attributes(&inner[name_end..]);

        if element.is_void() || self_closing {
            self.current()
                .children
                .push(FragmentNode::element(element, Vec::new()));
            return;
        }

        if RAW_TEXT_ELEMENTS.contains(&element.tag.as_str()) {
            let closing = format!("</{}", element.tag);
            let rest = self.rest();
            let body_end = find_ascii_case_insensitive(rest, &closing).unwrap_or(rest.len());
            let body = &rest[..body_end];
            let children = if body.is_empty() {
                Vec::new()
            } else {
                vec![FragmentNode::text(body)]
            };
            self.pos += body_end;
            self.skip_past(">");
            self.current()
                .children
                .push(FragmentNode::element(element, children));
            return;
        }

        self.stack.push(FragmentNode::element(element, Vec::new()));
    }

    fn close_tag(&mut self) {
        let rest = self.rest();
        let end = rest.find('>').unwrap_or(rest.len());
        let name = rest[2..end].trim().to_ascii_lowercase();
        self.pos = (self.pos + end + 1).min(self.input.len());

        let open = self.stack.iter().skip(1).rposition(|n| match &n.kind {
            NodeKind::Element(e) => e.tag == name,
            NodeKind::Text(_) => false,
        });
        if let Some(index) = open {
            // rposition ran over stack[1..]
            while self.stack.len() > index + 1 {
                self.pop();
            }
        }
    }

    fn pop(&mut self) {
        if self.stack.len() > 1 {
            if let Some(node) = self.stack.pop() {
                self.current().children.push(node);
            }
        }
    }

    fn finish(mut self) -> Vec<FragmentNode> {
        while self.stack.len() > 1 {
            self.pop();
        }
        self.stack
            .pop()
            .map(|root| root.children)
            .unwrap_or_default()
    }
}

/// Finds the `>` that ends a tag, skipping quoted attribute values.
fn find_tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in s.bytes().enumerate() {
        match (quote, b) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

fn parse_attributes(s: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut rest = s.trim_start();

    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let mut value = String::new();
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (raw, remaining) = match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    match body.find(q) {
                        Some(close) => (&body[..close], &body[close + 1..]),
                        None => (body, ""),
                    }
                }
                _ => {
                    let end = after_eq
                        .find(|c: char| c.is_ascii_whitespace())
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            value = decode_entities(raw);
            rest = remaining.trim_start();
        }

        if !name.is_empty() {
            attrs.push((name, value));
        } else if !rest.is_empty() {
            // Skip a stray character so we always make progress
            let mut chars = rest.chars();
            chars.next();
            rest = chars.as_str().trim_start();
        }
    }
    attrs
}

/// Decodes the common named entities and numeric character references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
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

// ==================== Serialization ====================

/// Serializes the children of `id`.
pub fn serialize_children(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    if let Some(node) = doc.node(id) {
        for child in node.children() {
            write_node(doc, *child, &mut out);
        }
    }
    out
}

/// Serializes detached fragment nodes.
pub fn serialize_fragment(nodes: &[FragmentNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_fragment(node, false, &mut out);
    }
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    // Round-trip through the fragment writer so both paths escape alike
    if let Some(fragment) = doc.fragment_of(id) {
        write_fragment(&fragment, false, out);
    }
}

fn write_fragment(node: &FragmentNode, raw_text: bool, out: &mut String) {
    match &node.kind {
        NodeKind::Text(t) if raw_text => out.push_str(t),
        NodeKind::Text(t) => out.push_str(&escape_text(t)),
        NodeKind::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if el.is_void() {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&el.tag.as_str());
            for child in &node.children {
                write_fragment(child, raw, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

/// Escapes text content.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\u{a0}', "&nbsp;")
}

/// Escapes a double-quoted attribute value.
pub fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) -> String {
        serialize_fragment(&parse_fragment(input))
    }

    #[test]
    fn test_nested_elements() {
        assert_eq!(
            roundtrip("<p>Hello <b>bold <i>both</i></b></p>"),
            "<p>Hello <b>bold <i>both</i></b></p>"
        );
    }

    #[test]
    fn test_attributes_and_quotes() {
        let nodes = parse_fragment(r#"<a href="x.html?a=1&amp;b=2" title='it"s' data-x=raw hidden>l</a>"#);
        let NodeKind::Element(el) = &nodes[0].kind else {
            panic!("expected element");
        };
        assert_eq!(el.attr("href"), Some("x.html?a=1&b=2"));
        assert_eq!(el.attr("title"), Some("it\"s"));
        assert_eq!(el.attr("data-x"), Some("raw"));
        assert_eq!(el.attr("hidden"), Some(""));
    }

    #[test]
    fn test_void_and_self_closing() {
        assert_eq!(roundtrip("a<br>b<hr/>c<span/>"), "a<br>b<hr>c<span></span>");
    }

    #[test]
    fn test_unclosed_and_stray_tags() {
        assert_eq!(roundtrip("<p>open <b>bold"), "<p>open <b>bold</b></p>");
        assert_eq!(roundtrip("text</div> more"), "text more");
        // Closing an outer element closes everything inside it
        assert_eq!(roundtrip("<div><p>x</div>y"), "<div><p>x</p></div>y");
    }

    #[test]
    fn test_comments_and_doctype_skipped() {
        assert_eq!(roundtrip("<!DOCTYPE html><!-- note --><p>x</p>"), "<p>x</p>");
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &amp; &#65;&#x42; &bogus; &"), "a <b> & AB &bogus; &");
        assert_eq!(roundtrip("1 &lt; 2"), "1 &lt; 2");
    }

    #[test]
    fn test_raw_text_elements() {
        let nodes = parse_fragment("<script>if (a < b) { x(); }</SCRIPT><p>after</p>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[0].children[0],
            FragmentNode::text("if (a < b) { x(); }")
        );
        assert_eq!(
            serialize_fragment(&nodes),
            "<script>if (a < b) { x(); }</script><p>after</p>"
        );
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        assert_eq!(roundtrip("a < b"), "a &lt; b");
    }
}
