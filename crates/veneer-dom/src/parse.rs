// SPDX-License-Identifier: Apache-2.0 OR MIT
use crate::tree::{Document, NodeId};

/// Elements that never have children or a close tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Parses a markup fragment into the document, standing in for the host
/// environment's markup parser. Returns a detached container element (tag
/// `template`) holding the parsed top-level nodes as its children.
///
/// The parser is deliberately lenient — render output is machine-written
/// but dynamic fragments are not guaranteed well-formed: unmatched close
/// tags are ignored, unclosed elements are closed at end of input, a stray
/// `<` becomes text. It never fails.
pub fn parse_fragment(doc: &mut Document, input: &str) -> NodeId {
    let container = doc.create_element("template");
    let bytes = input.as_bytes();
    let mut stack: Vec<NodeId> = vec![container];
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        let Some(open) = find_byte(bytes, b'<', cursor) else {
            flush_text(doc, &mut stack, &input[cursor..]);
            break;
        };
        if open > cursor {
            flush_text(doc, &mut stack, &input[cursor..open]);
        }

        if input[open..].starts_with("<!--") {
            cursor = match input[open..].find("-->") {
                Some(end) => open + end + 3,
                None => bytes.len(),
            };
            continue;
        }

        if input[open..].starts_with("</") {
            let end = find_byte(bytes, b'>', open + 2).unwrap_or(bytes.len());
            let name = input[open + 2..end].trim().to_ascii_lowercase();
            close_element(doc, &mut stack, &name);
            cursor = end + 1;
            continue;
        }

        let after = bytes.get(open + 1).copied();
        if !after.map(|b| b.is_ascii_alphabetic()).unwrap_or(false) {
            // Not a tag; the '<' is literal text.
            flush_text(doc, &mut stack, "<");
            cursor = open + 1;
            continue;
        }

        cursor = parse_element(doc, &mut stack, input, open + 1);
    }

    while stack.len() > 1 {
        let id = stack.pop().unwrap();
        finish_element(doc, id);
    }

    container
}

/// Convenience for single-rooted fragments: the first parsed top-level
/// node, if any.
pub fn parse_root(doc: &mut Document, input: &str) -> Option<NodeId> {
    let container = parse_fragment(doc, input);
    let root = doc.children(container).first().copied()?;
    doc.detach(root);
    Some(root)
}

fn parse_element(doc: &mut Document, stack: &mut Vec<NodeId>, input: &str, start: usize) -> usize {
    let bytes = input.as_bytes();
    let mut cursor = start;

    while cursor < bytes.len() && is_name_byte(bytes[cursor]) {
        cursor += 1;
    }
    let tag = input[start..cursor].to_ascii_lowercase();
    let element = doc.create_element(tag.clone());

    let mut self_closing = false;
    loop {
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        match bytes.get(cursor) {
            None => break,
            Some(b'>') => {
                cursor += 1;
                break;
            }
            Some(b'/') => {
                self_closing = true;
                cursor += 1;
            }
            Some(_) => {
                cursor = parse_attribute(doc, element, input, cursor);
            }
        }
    }

    init_widget_state(doc, element);
    let parent = *stack.last().expect("container always on stack");
    doc.append(parent, element);

    if !self_closing && !VOID_ELEMENTS.contains(&tag.as_str()) {
        stack.push(element);
    }
    cursor
}

fn parse_attribute(doc: &mut Document, element: NodeId, input: &str, start: usize) -> usize {
    let bytes = input.as_bytes();
    let mut cursor = start;

    while cursor < bytes.len()
        && !bytes[cursor].is_ascii_whitespace()
        && !matches!(bytes[cursor], b'=' | b'>' | b'/')
    {
        cursor += 1;
    }
    let name = input[start..cursor].to_ascii_lowercase();
    if name.is_empty() {
        // Unparseable byte; step over it rather than loop forever.
        return cursor + 1;
    }

    let mut value = String::new();
    if bytes.get(cursor) == Some(&b'=') {
        cursor += 1;
        match bytes.get(cursor) {
            Some(&quote @ (b'"' | b'\'')) => {
                cursor += 1;
                let end = find_byte(bytes, quote, cursor).unwrap_or(bytes.len());
                value = decode_entities(&input[cursor..end]);
                cursor = (end + 1).min(bytes.len());
            }
            _ => {
                let end = cursor
                    + input[cursor..]
                        .find(|c: char| c.is_ascii_whitespace() || c == '>')
                        .unwrap_or(input.len() - cursor);
                value = decode_entities(&input[cursor..end]);
                cursor = end;
            }
        }
    }

    doc.set_attr(element, name, value);
    cursor
}

fn close_element(doc: &mut Document, stack: &mut Vec<NodeId>, name: &str) {
    // Pop to the deepest open element with this tag; an unmatched close
    // tag is ignored.
    let Some(position) = stack
        .iter()
        .skip(1)
        .rposition(|id| doc.tag(*id) == Some(name))
    else {
        return;
    };
    while stack.len() > position + 1 {
        let id = stack.pop().unwrap();
        finish_element(doc, id);
    }
}

/// Post-close fixups. A textarea's live value is its text content.
fn finish_element(doc: &mut Document, id: NodeId) {
    if doc.tag(id) == Some("textarea") {
        let text: String = doc
            .children(id)
            .to_vec()
            .into_iter()
            .filter_map(|child| doc.text(child).map(str::to_string))
            .collect();
        if let Some(element) = doc.element_mut(id) {
            element.value = Some(text);
        }
    }
}

/// Live widget state starts out mirroring the markup attributes.
fn init_widget_state(doc: &mut Document, id: NodeId) {
    let checked = doc.attr(id, "checked").is_some();
    let selected = doc.attr(id, "selected").is_some();
    let value = doc.attr(id, "value").map(str::to_string);
    if let Some(element) = doc.element_mut(id) {
        element.checked = checked;
        element.selected = selected;
        element.value = value;
    }
}

fn flush_text(doc: &mut Document, stack: &mut [NodeId], raw: &str) {
    if raw.is_empty() {
        return;
    }
    let parent = *stack.last().expect("container always on stack");
    let text = doc.create_text(decode_entities(raw));
    doc.append(parent, text);
}

fn find_byte(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes[from..].iter().position(|b| *b == needle).map(|i| from + i)
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-'
}

/// Decodes the five named references plus `&#39;`; anything else stays
/// literal.
fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let mut replaced = false;
        for (entity, ch) in [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&#39;", '\''),
            ("&apos;", '\''),
        ] {
            if rest.starts_with(entity) {
                out.push(ch);
                rest = &rest[entity.len()..];
                replaced = true;
                break;
            }
        }
        if !replaced {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::KEY_ATTR;

    #[test]
    fn parses_nested_elements_and_text() {
        let mut doc = Document::new();
        let root = parse_root(&mut doc, "<ul><li>a</li><li>b</li></ul>").unwrap();
        assert_eq!(doc.tag(root), Some("ul"));
        let items = doc.children(root).to_vec();
        assert_eq!(items.len(), 2);
        let first_text = doc.children(items[0])[0];
        assert_eq!(doc.text(first_text), Some("a"));
    }

    #[test]
    fn parses_attributes_in_all_quoting_styles() {
        let mut doc = Document::new();
        let root =
            parse_root(&mut doc, "<div id=\"x\" class='a b' hidden data-n=3></div>").unwrap();
        assert_eq!(doc.attr(root, "id"), Some("x"));
        assert_eq!(doc.attr(root, "class"), Some("a b"));
        assert_eq!(doc.attr(root, "hidden"), Some(""));
        assert_eq!(doc.attr(root, "data-n"), Some("3"));
    }

    #[test]
    fn void_and_self_closing_elements_take_no_children() {
        let mut doc = Document::new();
        let container = parse_fragment(&mut doc, "<br>text<img src=x/>more");
        let children = doc.children(container).to_vec();
        assert_eq!(children.len(), 4);
        assert_eq!(doc.tag(children[0]), Some("br"));
        assert!(doc.children(children[0]).is_empty());
        assert_eq!(doc.text(children[1]), Some("text"));
        assert_eq!(doc.tag(children[2]), Some("img"));
        assert_eq!(doc.text(children[3]), Some("more"));
    }

    #[test]
    fn decodes_entities_in_text_and_attrs() {
        let mut doc = Document::new();
        let root = parse_root(&mut doc, "<p title=\"a &amp; b\">1 &lt; 2 &unknown;</p>").unwrap();
        assert_eq!(doc.attr(root, "title"), Some("a & b"));
        let text = doc.children(root)[0];
        assert_eq!(doc.text(text), Some("1 < 2 &unknown;"));
    }

    #[test]
    fn comments_are_skipped_and_unmatched_closes_ignored() {
        let mut doc = Document::new();
        let container = parse_fragment(&mut doc, "a<!-- note --></nope>b");
        let children = doc.children(container).to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(doc.text(children[0]), Some("a"));
        assert_eq!(doc.text(children[1]), Some("b"));
    }

    #[test]
    fn unclosed_elements_close_at_end_of_input() {
        let mut doc = Document::new();
        let root = parse_root(&mut doc, "<div><span>open").unwrap();
        assert_eq!(doc.tag(root), Some("div"));
        let span = doc.children(root)[0];
        assert_eq!(doc.tag(span), Some("span"));
    }

    #[test]
    fn widget_state_initialises_from_attributes() {
        let mut doc = Document::new();
        let container = parse_fragment(
            &mut doc,
            "<input type=checkbox checked><option selected>x</option><textarea>note</textarea>",
        );
        let children = doc.children(container).to_vec();
        assert!(doc.element(children[0]).unwrap().checked);
        assert!(doc.element(children[1]).unwrap().selected);
        assert_eq!(
            doc.element(children[2]).unwrap().value.as_deref(),
            Some("note")
        );
    }

    #[test]
    fn keys_are_ordinary_attributes() {
        let mut doc = Document::new();
        let root = parse_root(&mut doc, "<li data-key=\"row-1\">x</li>").unwrap();
        assert_eq!(doc.key(root), Some("row-1"));
        assert_eq!(doc.attr(root, KEY_ATTR), Some("row-1"));
    }
}
