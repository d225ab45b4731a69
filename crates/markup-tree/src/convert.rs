//! Depth-first normalization of a parsed markup document.

use roxmltree::{Document, Node, NodeType, ParsingOptions};

use crate::error::{ConvertError, Result};
use crate::tree::{Element, NormalizedDocument, NormalizedTree};

/// Parse markup text and normalize it.
///
/// Fails with [`ConvertError::Parse`] when the text is not well-formed.
pub fn normalize_str(markup: &str) -> Result<NormalizedDocument> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document =
        Document::parse_with_options(markup, options).map_err(|e| ConvertError::Parse {
            message: e.to_string(),
        })?;
    let root = document.root_element();

    Ok(NormalizedDocument {
        root_tag: root.tag_name().name().to_string(),
        root: normalize_element(root),
    })
}

/// Normalize one element and its subtree.
///
/// Attributes first, then trimmed direct text, then children in document
/// order; the collapse rule is applied last.
pub fn normalize_element(node: Node<'_, '_>) -> NormalizedTree {
    let mut element = Element::default();

    for attribute in node.attributes() {
        element
            .attributes
            .insert(attribute.name().to_string(), attribute.value().to_string());
    }

    let text = leading_text(node);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        element.text = Some(trimmed.to_string());
    }

    for child in node.children().filter(Node::is_element) {
        element.insert_child(child.tag_name().name(), normalize_element(child));
    }

    element.into_tree()
}

/// Text that precedes the first child element, ignoring comments and
/// processing instructions.
fn leading_text(node: Node<'_, '_>) -> String {
    let mut text = String::new();
    for child in node.children() {
        match child.node_type() {
            NodeType::Element => break,
            NodeType::Text => text.push_str(child.text().unwrap_or_default()),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Child;
    use serde_json::json;

    #[test]
    fn test_text_only_root_is_scalar() {
        let doc = normalize_str("<name>abc</name>").unwrap();
        assert_eq!(doc.root_tag, "name");
        assert_eq!(doc.root, NormalizedTree::Scalar("abc".into()));
        assert_eq!(doc.to_value(), json!({"name": "abc"}));
    }

    #[test]
    fn test_repeated_attribute_only_children_become_list() {
        let doc = normalize_str(
            r#"<file name="A.java"><error line="1" severity="warning"/><error line="7" severity="error"/></file>"#,
        )
        .unwrap();
        assert_eq!(
            doc.root.to_value(),
            json!({
                "@attributes": {"name": "A.java"},
                "error": [
                    {"@attributes": {"line": "1", "severity": "warning"}},
                    {"@attributes": {"line": "7", "severity": "error"}}
                ]
            })
        );
    }

    #[test]
    fn test_single_child_is_not_wrapped_in_list() {
        let doc = normalize_str(r#"<root><item id="1"/></root>"#).unwrap();
        assert!(matches!(doc.root.child("item"), Some(Child::Single(_))));
    }

    #[test]
    fn test_whitespace_only_text_is_absent() {
        let doc = normalize_str("<root>\n   \n  <a/>\n</root>").unwrap();
        let element = doc.root.as_element().unwrap();
        assert!(element.text.is_none());
        assert_eq!(doc.root.to_value(), json!({"a": {}}));
    }

    #[test]
    fn test_empty_element_is_empty_object() {
        let doc = normalize_str("<root/>").unwrap();
        assert_eq!(doc.to_value(), json!({"root": {}}));
    }

    #[test]
    fn test_attribute_only_element_keeps_attributes_key() {
        let doc = normalize_str(r#"<checkstyle version="10.12.0"/>"#).unwrap();
        assert_eq!(
            doc.to_value(),
            json!({"checkstyle": {"@attributes": {"version": "10.12.0"}}})
        );
    }

    #[test]
    fn test_text_is_trimmed_and_kept_next_to_children() {
        let doc = normalize_str("<p>  hello  <b>x</b> tail</p>").unwrap();
        assert_eq!(doc.root.to_value(), json!({"#text": "hello", "b": "x"}));
    }

    #[test]
    fn test_comment_before_text_is_ignored() {
        let doc = normalize_str("<p><!-- note -->value</p>").unwrap();
        assert_eq!(doc.root, NormalizedTree::Scalar("value".into()));
    }

    #[test]
    fn test_entities_are_decoded() {
        let doc = normalize_str(r#"<e message="&apos;x&apos; &lt; 3">a &amp; b</e>"#).unwrap();
        assert_eq!(doc.root.attribute("message"), Some("'x' < 3"));
        assert_eq!(doc.root.text(), Some("a & b"));
    }

    #[test]
    fn test_malformed_markup_is_parse_error() {
        let err = normalize_str("<root><open></root>").unwrap_err();
        assert!(matches!(err, ConvertError::Parse { .. }));
    }

    #[test]
    fn test_empty_input_is_parse_error() {
        assert!(matches!(
            normalize_str("").unwrap_err(),
            ConvertError::Parse { .. }
        ));
    }
}
