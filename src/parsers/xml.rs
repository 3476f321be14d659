//! Lightweight element tree for transcript XML.
//!
//! Only what the extractors need is kept: resolved namespace, local name,
//! attributes, text, tails and the line each start tag begins on.
//! Unknown entities are kept verbatim instead of failing the document.

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use regex::{Captures, Regex};

use super::ParseError;

/// A parsed XML element.
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Resolved namespace URI, if the element is bound to one.
    pub namespace: Option<String>,
    /// Local name, without any prefix.
    pub name: String,
    /// Attributes keyed by local name, in document order.
    pub attributes: Vec<(String, String)>,
    /// Text before the first child.
    pub text: String,
    /// Text following this element's end tag, inside its parent.
    pub tail: String,
    pub children: Vec<Element>,
    /// 1-based line of the start tag.
    pub line: usize,
}

impl Element {
    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First attribute among `names` with a non-empty trimmed value.
    pub fn first_attr(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.attr(name))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// Whether the element has this local name and the given namespace.
    pub fn is(&self, namespace: Option<&str>, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == namespace
    }

    /// Pre-order traversal, starting with `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// First element strictly below `self` with the given local name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.descendants().skip(1).find(|e| e.name == name)
    }

    /// Like [`Element::find`] but only matches elements outside any namespace.
    pub fn find_unqualified(&self, name: &str) -> Option<&Element> {
        self.descendants()
            .skip(1)
            .find(|e| e.namespace.is_none() && e.name == name)
    }

    /// Every text fragment below this element, in document order. Each
    /// fragment is trimmed and empty ones are dropped; the element's own
    /// tail is not included.
    pub fn text_fragments(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fragments(&mut out);
        out
    }

    fn collect_fragments<'a>(&'a self, out: &mut Vec<&'a str>) {
        push_trimmed(out, &self.text);
        for child in &self.children {
            child.collect_fragments(out);
            push_trimmed(out, &child.tail);
        }
    }

    /// Text fragments joined by single spaces.
    pub fn joined_text(&self) -> String {
        self.text_fragments().join(" ")
    }
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, text: &'a str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}

/// Depth-first iterator over an element and everything below it.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

static NAMED_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());

/// Decode character data, keeping entities XML does not predefine as
/// written while the known ones still decode.
fn decode_text(raw: &str) -> String {
    let protected = NAMED_ENTITY.replace_all(raw, |caps: &Captures<'_>| match &caps[1] {
        "amp" | "lt" | "gt" | "quot" | "apos" => caps[0].to_string(),
        name => format!("&amp;{};", name),
    });
    match unescape(&protected) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => protected.into_owned(),
    }
}

/// Tracks line numbers incrementally as the reader advances.
struct LineCounter<'a> {
    src: &'a [u8],
    scanned: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            scanned: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, offset: usize) -> usize {
        let end = offset.min(self.src.len());
        if end > self.scanned {
            self.line += self.src[self.scanned..end]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.scanned = end;
        }
        self.line
    }
}

fn resolve_namespace(resolved: ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(Namespace(ns)) => Some(String::from_utf8_lossy(ns).into_owned()),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    }
}

fn open_element(
    start: &BytesStart<'_>,
    namespace: Option<String>,
    line: usize,
) -> Result<Element, ParseError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::Malformed(format!("line {}: {}", line, e)))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map(Cow::into_owned)
            .unwrap_or_else(|_| decode_text(&String::from_utf8_lossy(&attr.value)));
        let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        attributes.push((local, value));
    }

    Ok(Element {
        namespace,
        name,
        attributes,
        line,
        ..Element::default()
    })
}

/// Append character data to the innermost open element.
fn append_text(stack: &mut [Element], text: &str) {
    if let Some(current) = stack.last_mut() {
        match current.children.last_mut() {
            Some(child) => child.tail.push_str(text),
            None => current.text.push_str(text),
        }
    }
}

/// Parse a whole document into its root element.
pub fn parse_document(src: &str) -> Result<Element, ParseError> {
    let mut reader = NsReader::from_str(src);
    reader.config_mut().expand_empty_elements = true;

    let mut lines = LineCounter::new(src);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let offset = reader.buffer_position() as usize;
        let (resolved, event) = reader.read_resolved_event().map_err(|e| ParseError::Xml {
            line: lines.line_at(offset),
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(ParseError::Malformed(
                        "content after the root element".to_string(),
                    ));
                }
                let line = lines.line_at(offset);
                let element = open_element(&start, resolve_namespace(resolved), line)?;
                stack.push(element);
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    return Err(ParseError::Malformed("unbalanced end tag".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| decode_text(&String::from_utf8_lossy(&text)));
                append_text(&mut stack, &value);
            }
            Event::CData(data) => {
                append_text(&mut stack, &String::from_utf8_lossy(&data));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::Malformed(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }

    root.ok_or_else(|| ParseError::Malformed("document has no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<cri:compteRendu xmlns:cri="http://senat.fr/schemas/thb/cri" date="2005-01-27">
  <cri:intervenant nom="M. Jean DUPONT" qua="rapporteur">
    <p>Premier <b>paragraphe</b> important.</p>
    <p>Second &amp; dernier.</p>
  </cri:intervenant>
  <note>Texte &nbsp; &amp; libre</note>
</cri:compteRendu>"#;

    #[test]
    fn test_namespaces_and_local_names() {
        let root = parse_document(CRI).unwrap();
        assert_eq!(root.name, "compteRendu");
        assert_eq!(
            root.namespace.as_deref(),
            Some("http://senat.fr/schemas/thb/cri")
        );
        assert_eq!(root.attr("date"), Some("2005-01-27"));
        assert!(root.attr("cri").is_none());

        let intervenant = root.find("intervenant").unwrap();
        assert!(intervenant.is(Some("http://senat.fr/schemas/thb/cri"), "intervenant"));
        assert_eq!(intervenant.attr("qua"), Some("rapporteur"));
        assert!(root.find_unqualified("intervenant").is_none());
        assert!(root.find_unqualified("note").is_some());
    }

    #[test]
    fn test_line_numbers() {
        let root = parse_document(CRI).unwrap();
        assert_eq!(root.line, 2);
        assert_eq!(root.find("intervenant").unwrap().line, 3);
        let lines: Vec<usize> = root
            .descendants()
            .filter(|e| e.name == "p")
            .map(|e| e.line)
            .collect();
        assert_eq!(lines, vec![4, 5]);
    }

    #[test]
    fn test_text_and_tails() {
        let root = parse_document(CRI).unwrap();
        let first = root.descendants().find(|e| e.name == "p").unwrap();
        assert_eq!(first.text, "Premier ");
        assert_eq!(first.children[0].tail, " important.");
        assert_eq!(first.joined_text(), "Premier paragraphe important.");

        let second = root.descendants().filter(|e| e.name == "p").nth(1).unwrap();
        assert_eq!(second.joined_text(), "Second & dernier.");
    }

    #[test]
    fn test_unknown_entity_kept_while_known_ones_decode() {
        let root = parse_document(CRI).unwrap();
        let note = root.find("note").unwrap();
        assert_eq!(note.joined_text(), "Texte &nbsp; & libre");
    }

    #[test]
    fn test_unknown_entity_in_attribute() {
        let root = parse_document(r#"<a nom="Jean&nbsp;Dupont &amp; fils">t</a>"#).unwrap();
        assert_eq!(root.attr("nom"), Some("Jean&nbsp;Dupont & fils"));
    }

    #[test]
    fn test_empty_elements_are_expanded() {
        let root = parse_document(r#"<a><b id="x"/><c>t</c></a>"#).unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].attr("id"), Some("x"));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        assert!(parse_document("<a><b></a></b>").is_err());
    }

    #[test]
    fn test_unclosed_element_fails() {
        assert!(matches!(
            parse_document("<a><b>text</b>"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_document_fails() {
        assert!(parse_document("<?xml version=\"1.0\"?>").is_err());
    }
}
