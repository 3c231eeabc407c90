//! Plain text from JATS full text and the HTML fragments in record fields

use crate::error::{MetaboError, Result};
use crate::llm::response::collapse_whitespace;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use roxmltree::{Document, Node, NodeType, ParsingOptions};

lazy_static! {
    static ref STRAY_LT_RE: Regex = Regex::new(r"<(?P<next>[^A-Za-z/!?]|$)").unwrap();
    static ref AMP_RE: Regex =
        Regex::new(r"&(?P<reference>#[0-9]+;|#x[0-9A-Fa-f]+;|[A-Za-z][A-Za-z0-9]*;)?").unwrap();
}

/// Elements that end a run of text; their content is kept apart from neighbours
fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "br"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "li"
            | "list-item"
            | "title"
            | "sec"
            | "caption"
            | "label"
            | "td"
            | "th"
            | "tr"
    )
}

/// Text of `node` and its descendants, block elements separated by spaces
fn render_text(node: Node<'_, '_>, out: &mut String) {
    for child in node.children() {
        match child.node_type() {
            NodeType::Text => out.push_str(child.text().unwrap_or("")),
            NodeType::Element => {
                let block = is_block(child.tag_name().name());
                if block {
                    out.push(' ');
                }
                render_text(child, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn node_text(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    render_text(node, &mut out);
    collapse_whitespace(&out)
}

/// Paragraphs and section titles under `node`, in document order
fn collect_blocks(node: Node<'_, '_>, blocks: &mut Vec<String>) {
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "p" | "title" => {
                let text = node_text(child);
                if !text.is_empty() {
                    blocks.push(text);
                }
            }
            _ => collect_blocks(child, blocks),
        }
    }
}

/// Plain text of the `<body>` of a JATS article, paragraphs separated by blank lines
///
/// `Ok(None)` when the article has no body or the body holds no text.
pub(crate) fn body_text_from_xml(xml: &str) -> Result<Option<String>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| MetaboError::Parse(format!("Invalid JATS XML: {}", e)))?;

    let Some(body) = doc.descendants().find(|node| node.has_tag_name("body")) else {
        return Ok(None);
    };

    let mut blocks = Vec::new();
    collect_blocks(body, &mut blocks);
    Ok((!blocks.is_empty()).then(|| blocks.join("\n\n")))
}

/// Plain text of a title or abstract that may carry inline HTML
///
/// Fragments that still do not parse are kept verbatim, whitespace collapsed.
pub(crate) fn inline_text(fragment: &str) -> String {
    if !fragment.contains(['<', '&']) {
        return collapse_whitespace(fragment);
    }

    let wrapped = format!("<fragment>{}</fragment>", escape_stray_markup(fragment));
    match Document::parse(&wrapped) {
        Ok(doc) => node_text(doc.root_element()),
        Err(e) => {
            tracing::debug!("Record field is not well-formed markup, keeping raw text: {}", e);
            collapse_whitespace(fragment)
        }
    }
}

/// Escape `<` that cannot open a tag and `&` that does not start a reference
fn escape_stray_markup(text: &str) -> String {
    let text = STRAY_LT_RE.replace_all(text, "&lt;$next");
    AMP_RE
        .replace_all(&text, |caps: &Captures| match caps.name("reference") {
            Some(reference) => format!("&{}", reference.as_str()),
            None => "&amp;".to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_text_sections_and_paragraphs() {
        let xml = r#"<article><front><article-title>Ignored</article-title></front>
            <body><sec><title>Results</title><p>Propionate lowered tumour
            burden &lt;20%.</p><p>Effects were <italic>modest</italic>.</p></sec></body>
            <back><ref-list>refs</ref-list></back></article>"#;

        let text = body_text_from_xml(xml).unwrap().unwrap();
        let paragraphs: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(
            paragraphs,
            vec![
                "Results",
                "Propionate lowered tumour burden <20%.",
                "Effects were modest."
            ]
        );
        assert!(!text.contains("Ignored"));
        assert!(!text.contains("refs"));
    }

    #[test]
    fn test_body_text_decodes_references_and_cdata() {
        let xml = "<article><body><p>IL&#x2010;6 rose 2&#8211;3 fold &#xa0;(p&#x2009;&lt;&#x2009;0.05)</p>\
                   <p><![CDATA[a < b]]></p></body></article>";

        let text = body_text_from_xml(xml).unwrap().unwrap();
        assert_eq!(
            text,
            "IL\u{2010}6 rose 2\u{2013}3 fold (p < 0.05)\n\na < b"
        );
    }

    #[test]
    fn test_body_text_accepts_doctype() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE article PUBLIC "-//NLM//DTD JATS (Z39.96) Journal Archiving and Interchange DTD v1.2 20190208//EN" "JATS-archivearticle1.dtd">
<article><body><p>Taurine &#946;-alanine transport.</p></body></article>"#;

        assert_eq!(
            body_text_from_xml(xml).unwrap().as_deref(),
            Some("Taurine \u{3b2}-alanine transport.")
        );
    }

    #[test]
    fn test_body_text_missing_body_or_broken_xml() {
        assert_eq!(body_text_from_xml("<article><front/></article>").unwrap(), None);
        assert_eq!(body_text_from_xml("<article><body/></article>").unwrap(), None);
        assert!(matches!(
            body_text_from_xml("<article><body><p>open"),
            Err(MetaboError::Parse(_))
        ));
    }

    #[test]
    fn test_inline_text_strips_html() {
        assert_eq!(
            inline_text("Propionate suppresses <i>colorectal</i> cancer growth."),
            "Propionate suppresses colorectal cancer growth."
        );
        assert_eq!(
            inline_text("<h4>Background</h4>Propionic acid &amp; colorectal cancer were studied."),
            "Background Propionic acid & colorectal cancer were studied."
        );
        assert_eq!(inline_text("CO<sub>2</sub> output"), "CO2 output");
    }

    #[test]
    fn test_inline_text_decodes_numeric_references() {
        assert_eq!(
            inline_text("Propionate &#946;-oxidation in   colon"),
            "Propionate \u{3b2}-oxidation in colon"
        );
    }

    #[test]
    fn test_inline_text_tolerates_stray_characters() {
        assert_eq!(
            inline_text("Risk fell (p < 0.05) in R&D cohorts <i>in vivo</i>"),
            "Risk fell (p < 0.05) in R&D cohorts in vivo"
        );
        assert_eq!(inline_text("unclosed <i>tag"), "unclosed <i>tag");
    }
}
