// xml.rs — Wire codec between XML text and a neutral element tree.
//
// The reader resolves every element and attribute to a namespace-qualified
// name, so the binding layer never sees prefixes. The writer goes the other
// way: it asks the namespace registry for the prefix of each namespace,
// declares every registered namespace on the root element, and invents
// `nsN` prefixes (declared in place) for namespaces nobody registered.

use std::fmt;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};
use crate::namespace::{self, DocumentType, NamespaceEntry};

/// The namespace bound to the reserved `xml` prefix (used by `xml:lang`).
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A namespace-qualified element or attribute name.
///
/// An empty namespace means "no namespace" (the usual case for attributes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: String,
    local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// A name without a namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(String::new(), local)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }
}

/// Clark notation: `{namespace}local`, or just `local` without a namespace.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

impl FromStr for QName {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PolicyError::Xml {
            reason: format!("'{}' is not a qualified name in {{namespace}}local form", s),
        };
        match s.strip_prefix('{') {
            Some(rest) => {
                let (namespace, local) = rest.split_once('}').ok_or_else(invalid)?;
                if local.is_empty() {
                    return Err(invalid());
                }
                Ok(QName::new(namespace, local))
            }
            None if !s.is_empty() && !s.contains('}') => Ok(QName::local(s)),
            None => Err(invalid()),
        }
    }
}

/// An attribute of a parsed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: QName,
    pub value: String,
}

/// A parsed element: qualified name, attributes, direct text and child elements.
///
/// Comments and processing instructions are dropped by the reader, and
/// namespace declarations are consumed while resolving names. A leaf keeps
/// its text verbatim; the text of an element with children is trimmed, so
/// indentation between children never becomes content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    pub name: QName,
    pub attributes: Vec<XmlAttribute>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute by namespace (empty for none) and local name.
    pub fn attribute(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.is(namespace, local))
            .map(|attr| attr.value.as_str())
    }

    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.push(XmlAttribute {
            name,
            value: value.into(),
        });
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }
}

/// Output settings for serialization. Loaded from the `[output]` table of
/// the tool configuration, so every field has a serde default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializeOptions {
    /// Spaces per nesting level; 0 writes everything on one line.
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Emit the `<?xml version="1.0" encoding="UTF-8"?>` header.
    #[serde(default = "default_declaration")]
    pub declaration: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            declaration: default_declaration(),
        }
    }
}

fn default_indent() -> usize {
    2
}

fn default_declaration() -> bool {
    true
}

// ── Reader ──────────────────────────────────────────────────────

/// In-scope namespace declarations, one frame per open element.
#[derive(Default)]
struct Scopes {
    frames: Vec<Vec<(Option<String>, String)>>,
}

impl Scopes {
    fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(declared, _)| declared.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn element_name(&self, raw: &str) -> PolicyResult<QName> {
        let (prefix, local) = split_raw_name(raw);
        match self.resolve(prefix) {
            Some(uri) => Ok(QName::new(uri, local)),
            None if prefix.is_none() => Ok(QName::local(local)),
            None => Err(unbound_prefix(raw)),
        }
    }

    // Unprefixed attributes never pick up the default namespace.
    fn attribute_name(&self, raw: &str) -> PolicyResult<QName> {
        match split_raw_name(raw) {
            (None, local) => Ok(QName::local(local)),
            (Some(prefix), local) => self
                .resolve(Some(prefix))
                .map(|uri| QName::new(uri, local))
                .ok_or_else(|| unbound_prefix(raw)),
        }
    }
}

fn split_raw_name(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, raw),
    }
}

fn unbound_prefix(raw: &str) -> PolicyError {
    PolicyError::Xml {
        reason: format!("unbound namespace prefix in '{}'", raw),
    }
}

fn utf8(bytes: &[u8]) -> PolicyResult<&str> {
    std::str::from_utf8(bytes).map_err(PolicyError::xml)
}

/// Open an element: push its namespace declarations and resolve its names.
fn open_element(start: &BytesStart<'_>, scopes: &mut Scopes) -> PolicyResult<XmlNode> {
    let mut declarations = Vec::new();
    let mut raw_attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(PolicyError::xml)?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value().map_err(PolicyError::xml)?.into_owned();
        if key == "xmlns" {
            declarations.push((None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((Some(prefix.to_string()), value));
        } else {
            raw_attributes.push((key, value));
        }
    }
    scopes.frames.push(declarations);

    let mut node = XmlNode::new(scopes.element_name(utf8(start.name().as_ref())?)?);
    for (key, value) in raw_attributes {
        node.attributes.push(XmlAttribute {
            name: scopes.attribute_name(&key)?,
            value,
        });
    }
    Ok(node)
}

/// Hang a finished element under its parent, or make it the document root.
fn close_element(
    node: XmlNode,
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
) -> PolicyResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => {
            return Err(PolicyError::Xml {
                reason: "document has more than one root element".to_string(),
            })
        }
    }
    Ok(())
}

/// Parse XML text into an element tree with resolved namespaces.
pub fn parse_tree(input: &str) -> PolicyResult<XmlNode> {
    let mut reader = Reader::from_str(input);

    let mut scopes = Scopes::default();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event().map_err(PolicyError::xml)? {
            Event::Start(start) => {
                let node = open_element(&start, &mut scopes)?;
                stack.push(node);
            }
            Event::Empty(start) => {
                let node = open_element(&start, &mut scopes)?;
                scopes.frames.pop();
                close_element(node, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                scopes.frames.pop();
                let mut node = stack.pop().ok_or_else(|| PolicyError::Xml {
                    reason: "unexpected closing tag".to_string(),
                })?;
                if !node.children.is_empty() {
                    node.text = node.text.trim().to_string();
                }
                close_element(node, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&text.unescape().map_err(PolicyError::xml)?);
                }
            }
            Event::CData(data) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(PolicyError::Xml {
            reason: "unexpected end of document".to_string(),
        });
    }
    root.ok_or_else(|| PolicyError::Xml {
        reason: "document has no root element".to_string(),
    })
}

// ── Writer ──────────────────────────────────────────────────────

/// An element that is open in the writer, with the prefixes it declared.
struct OpenElement {
    tag: String,
    declared: Vec<(String, String)>,
}

/// Streaming XML writer that renders qualified names with registered prefixes.
pub struct XmlWriter {
    inner: Writer<Vec<u8>>,
    registered: Vec<NamespaceEntry>,
    open: Vec<OpenElement>,
    root_written: bool,
    generated: usize,
}

impl XmlWriter {
    /// Create a writer for a document type, snapshotting its namespace table.
    pub fn new(document: DocumentType, options: &SerializeOptions) -> PolicyResult<Self> {
        let inner = if options.indent > 0 {
            Writer::new_with_indent(Vec::new(), b' ', options.indent)
        } else {
            Writer::new(Vec::new())
        };
        let mut writer = Self {
            inner,
            registered: namespace::namespaces_for(document),
            open: Vec::new(),
            root_written: false,
            generated: 0,
        };
        if options.declaration {
            writer.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }
        Ok(writer)
    }

    /// Open an element with the given attributes.
    pub fn start(&mut self, name: &QName, attributes: &[(QName, String)]) -> PolicyResult<()> {
        let (start, tag, declared) = self.begin(name, attributes)?;
        self.emit(Event::Start(start))?;
        self.open.push(OpenElement { tag, declared });
        Ok(())
    }

    /// Write a self-closing element.
    pub fn empty(&mut self, name: &QName, attributes: &[(QName, String)]) -> PolicyResult<()> {
        let (start, _, _) = self.begin(name, attributes)?;
        self.emit(Event::Empty(start))
    }

    /// Write an element whose only content is text. Empty text self-closes.
    pub fn text_element(
        &mut self,
        name: &QName,
        attributes: &[(QName, String)],
        text: &str,
    ) -> PolicyResult<()> {
        if text.is_empty() {
            return self.empty(name, attributes);
        }
        self.start(name, attributes)?;
        self.emit(Event::Text(BytesText::new(text)))?;
        self.end()
    }

    /// Close the most recently opened element.
    pub fn end(&mut self) -> PolicyResult<()> {
        let open = self.open.pop().ok_or_else(|| PolicyError::Xml {
            reason: "end() called with no open element".to_string(),
        })?;
        self.emit(Event::End(BytesEnd::new(open.tag)))
    }

    /// Write a parsed element tree back out verbatim (modulo prefixes).
    pub fn write_node(&mut self, node: &XmlNode) -> PolicyResult<()> {
        let attributes: Vec<(QName, String)> = node
            .attributes
            .iter()
            .map(|attr| (attr.name.clone(), attr.value.clone()))
            .collect();
        if node.children.is_empty() {
            return self.text_element(&node.name, &attributes, &node.text);
        }
        self.start(&node.name, &attributes)?;
        if !node.text.is_empty() {
            self.emit(Event::Text(BytesText::new(&node.text)))?;
        }
        for child in &node.children {
            self.write_node(child)?;
        }
        self.end()
    }

    /// Finish writing and return the document text.
    pub fn finish(self) -> PolicyResult<String> {
        if let Some(open) = self.open.last() {
            return Err(PolicyError::Xml {
                reason: format!("element <{}> was never closed", open.tag),
            });
        }
        String::from_utf8(self.inner.into_inner()).map_err(PolicyError::xml)
    }

    fn emit(&mut self, event: Event<'_>) -> PolicyResult<()> {
        self.inner.write_event(event).map_err(PolicyError::xml)
    }

    /// Render the start tag of an element; the root gets every registered
    /// namespace declared on it.
    fn begin(
        &mut self,
        name: &QName,
        attributes: &[(QName, String)],
    ) -> PolicyResult<(BytesStart<'static>, String, Vec<(String, String)>)> {
        let mut declared = Vec::new();
        let mut declarations = Vec::new();
        if self.open.is_empty() {
            if self.root_written {
                return Err(PolicyError::Xml {
                    reason: "document already has a root element".to_string(),
                });
            }
            self.root_written = true;
            for entry in &self.registered {
                declarations.push((format!("xmlns:{}", entry.prefix), entry.namespace.clone()));
            }
        }

        let tag = self.render(name, &mut declared, &mut declarations);
        let mut rendered = Vec::with_capacity(attributes.len());
        for (attr_name, value) in attributes {
            let key = if attr_name.namespace().is_empty() {
                attr_name.local_name().to_string()
            } else {
                self.render(attr_name, &mut declared, &mut declarations)
            };
            rendered.push((key, value.as_str()));
        }

        let mut start = BytesStart::new(tag.clone());
        for (key, value) in &declarations {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        for (key, value) in &rendered {
            start.push_attribute((key.as_str(), *value));
        }
        Ok((start, tag, declared))
    }

    fn render(
        &mut self,
        name: &QName,
        declared: &mut Vec<(String, String)>,
        declarations: &mut Vec<(String, String)>,
    ) -> String {
        let ns = name.namespace();
        if ns.is_empty() {
            return name.local_name().to_string();
        }
        if ns == XML_NAMESPACE {
            return format!("xml:{}", name.local_name());
        }
        if let Some(prefix) = self.prefix_in_scope(ns, declared) {
            return format!("{}:{}", prefix, name.local_name());
        }

        let prefix = loop {
            let candidate = format!("ns{}", self.generated);
            self.generated += 1;
            if !self.registered.iter().any(|entry| entry.prefix == candidate) {
                break candidate;
            }
        };
        tracing::debug!(namespace = ns, prefix = %prefix, "declaring unregistered namespace");
        declarations.push((format!("xmlns:{}", prefix), ns.to_string()));
        declared.push((ns.to_string(), prefix.clone()));
        format!("{}:{}", prefix, name.local_name())
    }

    fn prefix_in_scope(&self, ns: &str, declared: &[(String, String)]) -> Option<String> {
        if let Some(entry) = self.registered.iter().find(|entry| entry.namespace == ns) {
            return Some(entry.prefix.clone());
        }
        declared
            .iter()
            .chain(self.open.iter().rev().flat_map(|open| open.declared.iter()))
            .find(|(uri, _)| uri == ns)
            .map(|(_, prefix)| prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{COMMON_POLICY, NAMESPACE};

    #[test]
    fn qname_clark_notation_round_trip() {
        let name: QName = "{urn:example}thing".parse().unwrap();
        assert!(name.is("urn:example", "thing"));
        assert_eq!(name.to_string(), "{urn:example}thing");

        let bare: QName = "plain".parse().unwrap();
        assert_eq!(bare.namespace(), "");
        assert!("{urn:example}".parse::<QName>().is_err());
        assert!("".parse::<QName>().is_err());
    }

    #[test]
    fn reader_resolves_prefixes_and_default_namespace() {
        let tree = parse_tree(
            r#"<?xml version="1.0"?>
            <!-- leading comment -->
            <ruleset xmlns="urn:a" xmlns:b="urn:b">
              <rule id="r1"><b:thing b:flag="yes" xml:lang="en">text &amp; more</b:thing></rule>
            </ruleset>"#,
        )
        .unwrap();

        assert!(tree.name.is("urn:a", "ruleset"));
        let rule = &tree.children[0];
        assert!(rule.name.is("urn:a", "rule"));
        assert_eq!(rule.attribute("", "id"), Some("r1"));

        let thing = &rule.children[0];
        assert!(thing.name.is("urn:b", "thing"));
        assert_eq!(thing.attribute("urn:b", "flag"), Some("yes"));
        assert_eq!(thing.attribute(XML_NAMESPACE, "lang"), Some("en"));
        assert_eq!(thing.text, "text & more");
    }

    #[test]
    fn reader_keeps_leaf_text_and_drops_indentation() {
        let tree = parse_tree(
            "<r xmlns=\"urn:a\">\n  <leaf>  padded  </leaf>\n  <blank>   </blank>\n  <empty/>\n</r>",
        )
        .unwrap();
        assert_eq!(tree.text, "");
        let texts: Vec<&str> = tree.children.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["  padded  ", "   ", ""]);
    }

    #[test]
    fn reader_rejects_unbound_prefix() {
        match parse_tree("<x:root/>") {
            Err(PolicyError::Xml { reason }) => assert!(reason.contains("unbound")),
            other => panic!("expected Xml error, got {:?}", other),
        }
    }

    #[test]
    fn reader_rejects_mismatched_tags() {
        assert!(parse_tree("<a><b></a>").is_err());
        assert!(parse_tree("").is_err());
    }

    #[test]
    fn writer_uses_registered_prefixes_on_root() {
        crate::document::init();
        let options = SerializeOptions {
            indent: 0,
            declaration: false,
        };
        let mut writer = XmlWriter::new(COMMON_POLICY, &options).unwrap();
        writer.start(&QName::new(NAMESPACE, "ruleset"), &[]).unwrap();
        writer
            .empty(
                &QName::new(NAMESPACE, "rule"),
                &[(QName::local("id"), "a<b".to_string())],
            )
            .unwrap();
        writer.end().unwrap();
        let text = writer.finish().unwrap();

        assert!(text.starts_with("<cp:ruleset "));
        assert!(text.contains(r#"xmlns:cp="urn:ietf:params:xml:ns:common-policy""#));
        assert!(text.contains(r#"<cp:rule id="a&lt;b"/>"#));
        assert!(text.ends_with("</cp:ruleset>"));
    }

    #[test]
    fn writer_declares_unregistered_namespaces_in_place() {
        crate::document::init();
        let options = SerializeOptions {
            indent: 0,
            declaration: false,
        };
        let mut writer = XmlWriter::new(COMMON_POLICY, &options).unwrap();
        writer.start(&QName::new(NAMESPACE, "actions"), &[]).unwrap();
        let node = XmlNode::new(QName::new("urn:vendor:unregistered", "outer"))
            .with_child(XmlNode::new(QName::new("urn:vendor:unregistered", "inner")).with_text("1"));
        writer.write_node(&node).unwrap();
        writer.end().unwrap();
        let text = writer.finish().unwrap();

        let reparsed = parse_tree(&text).unwrap();
        assert_eq!(reparsed.children[0], node);
        // The inner element reuses the prefix declared on its parent.
        assert_eq!(text.matches("xmlns:ns").count(), 1);
    }

    #[test]
    fn writer_refuses_unclosed_elements() {
        let options = SerializeOptions::default();
        let mut writer = XmlWriter::new(COMMON_POLICY, &options).unwrap();
        writer.start(&QName::new(NAMESPACE, "ruleset"), &[]).unwrap();
        assert!(writer.finish().is_err());
    }
}
