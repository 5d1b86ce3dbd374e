//! Just enough XML to emit listings and round-trip the share settings
//! document. Both documents are produced by this codebase, so the scanner
//! only handles the shapes we write: elements with quoted attributes and
//! either text content or a self-closing tag.

use std::collections::HashMap;

pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let (entity, advance) = match rest {
            r if r.starts_with("&amp;") => ('&', 5),
            r if r.starts_with("&lt;") => ('<', 4),
            r if r.starts_with("&gt;") => ('>', 4),
            r if r.starts_with("&quot;") => ('"', 6),
            r if r.starts_with("&apos;") => ('\'', 6),
            _ => ('&', 1),
        };
        out.push(entity);
        rest = &rest[advance..];
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone)]
pub struct Element {
    pub attrs: HashMap<String, String>,
    pub text: String,
}

/// Scan every `<tag …>text</tag>` (or self-closing `<tag …/>`) element in
/// `doc`, in document order. Attribute values and text are unescaped.
pub fn elements(doc: &str, tag: &str) -> Vec<Element> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut rest = doc;
    while let Some(start) = rest.find(&open) {
        rest = &rest[start + open.len()..];
        // Next character must terminate the tag name.
        if !rest.starts_with([' ', '\t', '>', '/']) {
            continue;
        }
        let Some(tag_end) = rest.find('>') else { break };
        let head = &rest[..tag_end];
        let self_closing = head.trim_end().ends_with('/');
        let attrs = parse_attrs(head.trim_end().trim_end_matches('/'));
        rest = &rest[tag_end + 1..];

        let text = if self_closing {
            String::new()
        } else if let Some(end) = rest.find(&close) {
            let text = unescape(&rest[..end]);
            rest = &rest[end + close.len()..];
            text
        } else {
            break;
        };
        out.push(Element { attrs, text });
    }
    out
}

fn parse_attrs(head: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut rest = head;
    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].trim().rsplit(char::is_whitespace).next().unwrap_or("");
        let after = &rest[eq + 1..];
        let Some(quote_rel) = after.find('"') else { break };
        let after = &after[quote_rel + 1..];
        let Some(end) = after.find('"') else { break };
        if !key.is_empty() {
            attrs.insert(key.to_string(), unescape(&after[..end]));
        }
        rest = &after[end + 1..];
    }
    attrs
}
