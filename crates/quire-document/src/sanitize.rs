//! Markup sanitization for untrusted input (pasted content, `set_data`).
//!
//! Dangerous subtrees are dropped whole; every other element survives
//! with only allow-listed attributes. Inline styles never survive: content
//! copied from dark-themed pages otherwise arrives as invisible text.

use crate::markup::{parse_fragment, serialize_fragment};
use crate::node::{FragmentNode, NodeKind};

/// Which tags are dropped and which attributes are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizePolicy {
    /// Elements removed together with their content
    pub removed_tags: Vec<String>,
    /// Attributes kept on surviving elements
    pub allowed_attrs: Vec<String>,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        Self {
            removed_tags: ["script", "style", "iframe", "object", "embed"]
                .map(String::from)
                .to_vec(),
            allowed_attrs: ["href", "src", "alt", "title", "rowspan", "colspan", "target"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl SanitizePolicy {
    /// Sanitizes a markup string.
    pub fn sanitize_markup(&self, markup: &str) -> String {
        serialize_fragment(&self.sanitize(parse_fragment(markup)))
    }

    /// Sanitizes detached nodes.
    pub fn sanitize(&self, nodes: Vec<FragmentNode>) -> Vec<FragmentNode> {
        nodes
            .into_iter()
            .filter_map(|node| self.sanitize_node(node))
            .collect()
    }

    fn sanitize_node(&self, mut node: FragmentNode) -> Option<FragmentNode> {
        if let NodeKind::Element(el) = &mut node.kind {
            if self.removed_tags.iter().any(|t| *t == el.tag) {
                return None;
            }
            el.attrs
                .retain(|(name, _)| self.allowed_attrs.iter().any(|a| a == name));
            // javascript: links survive attribute filtering, so check the value too
            el.attrs.retain(|(name, value)| {
                !(matches!(name.as_str(), "href" | "src")
                    && value.trim_start().to_ascii_lowercase().starts_with("javascript:"))
            });
        }
        node.children = self.sanitize(std::mem::take(&mut node.children));
        Some(node)
    }
}

/// Sanitizes markup with the default policy.
pub fn sanitize_markup(markup: &str) -> String {
    SanitizePolicy::default().sanitize_markup(markup)
}
