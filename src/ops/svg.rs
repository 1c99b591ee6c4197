// ============================================================================
// SVG DOCUMENT TRANSFORM — wrap an SVG's content in one transformed <g>
// ============================================================================
//
// The source markup is parsed with roxmltree and written back out by hand:
// the root element keeps its attributes and namespace declarations, and its
// children move under a single group carrying the overlay's transform (and
// opacity). No XML declaration or DTD is emitted.

use roxmltree::{Document, Node, NodeType, ParsingOptions};

use crate::error::{OverlayError, Result};
use crate::image_state::ImageTransform;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// SVG `transform` attribute value for `t`, in application order:
/// flip scale, uniform scale, rotate about pivot (or offset), translate.
pub fn transform_attribute(t: &ImageTransform) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(4);

    if t.flipped_horizontally || t.flipped_vertically {
        let sx = if t.flipped_horizontally { -1 } else { 1 };
        let sy = if t.flipped_vertically { -1 } else { 1 };
        parts.push(format!("scale({sx},{sy})"));
    }

    let scale = t.scale_factor();
    if scale != 1.0 {
        parts.push(format!("scale({scale})"));
    }

    let angle = t.angle_degrees();
    if angle != 0.0 {
        let (cx, cy) = t.rotation_pivot.unwrap_or(t.offset);
        parts.push(format!("rotate({angle},{cx},{cy})"));
    }

    let (ox, oy) = t.offset;
    parts.push(format!("translate({ox},{oy})"));

    parts.join(" ")
}

/// Parse SVG text leniently: a BOM and anything before the first `<` are
/// skipped, DTDs are allowed.
pub fn parse_document(markup: &str) -> Result<Document<'_>> {
    let trimmed = markup.trim_start_matches('\u{feff}');
    let start = trimmed
        .find('<')
        .ok_or_else(|| OverlayError::Document("no markup found".to_string()))?;
    let opts = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(&trimmed[start..], opts)
        .map_err(|e| OverlayError::Document(e.to_string()))
}

/// Rewrite `markup` so every top-level child of the root sits inside one
/// `<g transform="…">`, with `opacity` added when `opacity` is below 1.
pub fn wrap_in_group(markup: &str, transform: &str, opacity: f32) -> Result<String> {
    let doc = parse_document(markup)?;
    let root = doc.root_element();

    let mut out = String::with_capacity(markup.len() + 128);
    for node in doc.root().children() {
        if node == root {
            break;
        }
        write_node(&mut out, node);
    }

    let root_name = qualified_element_name(root);
    out.push('<');
    out.push_str(&root_name);
    write_namespace_decls(&mut out, root);
    write_attributes(&mut out, root);
    out.push('>');

    let group_name = match prefix_of(root) {
        Some(prefix) => format!("{prefix}:g"),
        None => "g".to_string(),
    };
    out.push_str(&format!("<{group_name} transform=\"{}\"", escape_attr(transform)));
    if opacity < 1.0 {
        out.push_str(&format!(" opacity=\"{opacity}\""));
    }
    out.push('>');
    for child in root.children() {
        write_node(&mut out, child);
    }
    out.push_str(&format!("</{group_name}></{root_name}>"));

    for node in root.next_siblings().skip(1) {
        write_node(&mut out, node);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
//  Serialization
// ---------------------------------------------------------------------------

fn write_node(out: &mut String, node: Node) {
    match node.node_type() {
        NodeType::Element => write_element(out, node),
        NodeType::Text => out.push_str(&escape_text(node.text().unwrap_or(""))),
        NodeType::Comment => {
            out.push_str(&format!("<!--{}-->", node.text().unwrap_or("")));
        }
        NodeType::PI => {
            if let Some(pi) = node.pi() {
                match pi.value {
                    Some(value) => out.push_str(&format!("<?{} {}?>", pi.target, value)),
                    None => out.push_str(&format!("<?{}?>", pi.target)),
                }
            }
        }
        NodeType::Root => {}
    }
}

fn write_element(out: &mut String, node: Node) {
    let name = qualified_element_name(node);
    out.push('<');
    out.push_str(&name);
    write_namespace_decls(out, node);
    write_attributes(out, node);
    if node.has_children() {
        out.push('>');
        for child in node.children() {
            write_node(out, child);
        }
        out.push_str(&format!("</{name}>"));
    } else {
        out.push_str("/>");
    }
}

/// Declare the namespaces that come into scope at `node`.
fn write_namespace_decls(out: &mut String, node: Node) {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    for ns in node.namespaces() {
        if ns.name() == Some("xml") || inherited.contains(&(ns.name(), ns.uri())) {
            continue;
        }
        match ns.name() {
            Some(prefix) => out.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape_attr(ns.uri()))),
            None => out.push_str(&format!(" xmlns=\"{}\"", escape_attr(ns.uri()))),
        }
    }
}

fn write_attributes(out: &mut String, node: Node) {
    for attr in node.attributes() {
        let prefix = match attr.namespace() {
            Some(XML_NAMESPACE) => Some("xml"),
            Some(uri) => node.lookup_prefix(uri),
            None => None,
        };
        match prefix {
            Some(p) => out.push_str(&format!(" {p}:{}", attr.name())),
            None => out.push_str(&format!(" {}", attr.name())),
        }
        out.push_str(&format!("=\"{}\"", escape_attr(attr.value())));
    }
}

fn prefix_of<'input>(node: Node<'_, 'input>) -> Option<&'input str> {
    node.tag_name()
        .namespace()
        .and_then(|uri| node.lookup_prefix(uri))
        .filter(|p| !p.is_empty())
}

fn qualified_element_name(node: Node) -> String {
    let local = node.tag_name().name();
    match prefix_of(node) {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10" fill="red"/></svg>"#;

    fn vector(markup: &str) -> ImageTransform {
        ImageTransform::new("v", RgbaImage::new(10, 10), Some(markup.to_string()))
    }

    #[test]
    fn untouched_transform_is_only_translate() {
        let t = vector(SQUARE);
        assert_eq!(transform_attribute(&t), "translate(512,512)");
    }

    #[test]
    fn transform_parts_in_fixed_order() {
        let mut t = vector(SQUARE);
        t.toggle_flip(crate::image_state::FlipAxis::Horizontal);
        t.adjust_scale(1.0);
        t.set_rotation(30.0);
        t.offset = (100.0, 50.5);
        assert_eq!(
            transform_attribute(&t),
            "scale(-1,1) scale(2) rotate(30,100,50.5) translate(100,50.5)"
        );
    }

    #[test]
    fn rotation_uses_pivot_when_set() {
        let mut t = vector(SQUARE);
        t.set_rotation(90.0);
        t.set_pivot(Some((7.0, 8.0)));
        assert!(transform_attribute(&t).contains("rotate(90,7,8)"));
    }

    #[test]
    fn children_are_wrapped_in_one_group() {
        let out = wrap_in_group(SQUARE, "translate(1,2)", 0.2).unwrap();
        assert_eq!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><g transform="translate(1,2)" opacity="0.2"><rect width="10" height="10" fill="red"/></g></svg>"#
        );
        let reparsed = parse_document(&out).unwrap();
        let group = reparsed.root_element().first_element_child().unwrap();
        assert_eq!(group.tag_name().name(), "g");
        assert_eq!(group.tag_name().namespace(), Some("http://www.w3.org/2000/svg"));
    }

    #[test]
    fn opaque_group_has_no_opacity_attribute() {
        let out = wrap_in_group(SQUARE, "translate(0,0)", 1.0).unwrap();
        assert!(!out.contains("opacity"));
    }

    #[test]
    fn bom_and_leading_garbage_are_skipped() {
        let messy = format!("\u{feff}garbage {SQUARE}");
        assert!(wrap_in_group(&messy, "translate(0,0)", 1.0).is_ok());
    }

    #[test]
    fn prefixed_namespaces_survive() {
        let src = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><use xlink:href="#a"/><text xml:space="preserve">a &amp; b</text></svg>"##;
        let out = wrap_in_group(src, "translate(0,0)", 1.0).unwrap();
        assert!(out.contains(r#"xmlns:xlink="http://www.w3.org/1999/xlink""#));
        assert!(out.contains(r##"<use xlink:href="#a"/>"##));
        assert!(out.contains(r#"xml:space="preserve""#));
        assert!(out.contains("a &amp; b"));
    }

    #[test]
    fn broken_markup_is_a_document_error() {
        assert!(matches!(
            wrap_in_group("<svg><g></svg>", "translate(0,0)", 1.0),
            Err(OverlayError::Document(_))
        ));
        assert!(matches!(
            wrap_in_group("no tags here", "translate(0,0)", 1.0),
            Err(OverlayError::Document(_))
        ));
    }
}
