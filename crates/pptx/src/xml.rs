//! Lossless XML element tree used as the document object model of a part.
//!
//! Element and attribute names keep their namespace prefixes, text keeps its
//! whitespace, and declarations, comments, CDATA and processing instructions
//! are carried through as raw events, so a parsed part serializes back to
//! equivalent markup.

use ppt_core::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A node inside an element.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Comments, CDATA, processing instructions and declarations.
    Other(Event<'static>),
}

/// An XML element with its qualified name, attributes and children.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element with a qualified name such as `a:rPr`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child appender.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder-style text appender.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Name without namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Namespace prefix including the colon, or an empty string.
    pub fn prefix(&self) -> &str {
        match self.name.find(':') {
            Some(pos) => &self.name[..=pos],
            None => "",
        }
    }

    /// Qualified name for a new element in this element's namespace.
    pub fn qualified(&self, local: &str) -> String {
        format!("{}{}", self.prefix(), local)
    }

    /// Look up an attribute by its local name.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local_name(k) == local)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any existing one with the same local name.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let local = local_name(key);
        match self.attributes.iter_mut().find(|(k, _)| local_name(k) == local) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// Remove an attribute by local name, returning its value.
    pub fn remove_attr(&mut self, local: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| local_name(k) == local)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Child elements, skipping text and other nodes.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Mutable child elements, skipping text and other nodes.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Mutable child elements with a given local name.
    pub fn elements_named_mut<'a>(
        &'a mut self,
        local: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.elements_mut().filter(move |e| e.local_name() == local)
    }

    /// First child element with a given local name.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == local)
    }

    /// First mutable child element with a given local name.
    pub fn child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.local_name() == local)
    }

    /// Follow a path of local names down the tree.
    pub fn descend(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |el, local| el.child(local))
    }

    /// Follow a path of local names down the tree, mutably.
    pub fn descend_mut(&mut self, path: &[&str]) -> Option<&mut Element> {
        let mut current = self;
        for local in path {
            current = current.child_mut(local)?;
        }
        Some(current)
    }

    /// Whether a direct child element with this local name exists.
    pub fn has_child(&self, local: &str) -> bool {
        self.child(local).is_some()
    }

    /// Remove every child element whose local name is in `locals`.
    pub fn remove_children(&mut self, locals: &[&str]) -> usize {
        let before = self.children.len();
        self.children.retain(|n| match n {
            Node::Element(e) => !locals.contains(&e.local_name()),
            _ => true,
        });
        before - self.children.len()
    }

    /// Index of the first child element with this local name.
    fn position_of(&self, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.local_name() == local))
    }

    /// Return the child named `local`, inserting an empty one as first child.
    pub fn first_child_or_insert(&mut self, local: &str) -> &mut Element {
        let pos = match self.position_of(local) {
            Some(pos) => pos,
            None => {
                let child = Element::new(self.qualified(local));
                self.children.insert(0, Node::Element(child));
                0
            }
        };
        match &mut self.children[pos] {
            Node::Element(e) => e,
            _ => unreachable!("position_of only returns element positions"),
        }
    }

    /// Replace the child with `child`'s local name, or insert it right after
    /// the last child whose local name is in `after` (first when none is).
    pub fn upsert_child(&mut self, child: Element, after: &[&str]) {
        if let Some(pos) = self.position_of(child.local_name()) {
            self.children[pos] = Node::Element(child);
            return;
        }
        let pos = self
            .children
            .iter()
            .rposition(|n| matches!(n, Node::Element(e) if after.contains(&e.local_name())))
            .map_or(0, |p| p + 1);
        self.children.insert(pos, Node::Element(child));
    }

    /// Insert `child` before the first child named `before`, or append.
    pub fn insert_before(&mut self, child: Element, before: &str) {
        match self.position_of(before) {
            Some(pos) => self.children.insert(pos, Node::Element(child)),
            None => self.children.push(Node::Element(child)),
        }
    }

    /// Concatenated text of every descendant text node.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Visit this element and every descendant element in document order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Element)) {
        visit(self);
        for child in self.elements() {
            child.walk(visit);
        }
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
            Node::Other(_) => {}
        }
    }
}

/// A parsed XML part: prolog nodes, the root element, trailing nodes.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub prolog: Vec<Node>,
    pub root: Element,
    pub epilog: Vec<Node>,
}

impl XmlDocument {
    /// Parse a complete XML document.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::XmlError(format!("at byte {}: {}", reader.buffer_position(), e))
            })?;

            let node = match event {
                Event::Start(ref e) => {
                    stack.push(element_from_start(e)?);
                    continue;
                }
                Event::Empty(ref e) => Node::Element(element_from_start(e)?),
                Event::End(_) => match stack.pop() {
                    Some(element) => Node::Element(element),
                    None => return Err(Error::XmlError("unexpected closing tag".to_string())),
                },
                Event::Text(ref e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::XmlError(format!("bad text content: {}", e)))?;
                    Node::Text(text.into_owned())
                }
                Event::Eof => break,
                other => Node::Other(other.into_owned()),
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => match node {
                    Node::Element(element) if root.is_none() => root = Some(element),
                    Node::Element(element) => {
                        return Err(Error::XmlError(format!(
                            "second root element <{}>",
                            element.name
                        )))
                    }
                    other if root.is_none() => prolog.push(other),
                    other => epilog.push(other),
                },
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::XmlError(format!("unclosed element <{}>", open.name)));
        }

        let root = root.ok_or_else(|| Error::XmlError("document has no root element".to_string()))?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// Serialize the document back to markup.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }
        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::XmlError(format!("serialized markup is not UTF-8: {}", e)))
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::XmlError(format!("element name is not UTF-8: {}", e)))?
        .to_string();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::XmlError(format!("bad attribute in <{}>: {}", name, e)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::XmlError(format!("attribute name is not UTF-8: {}", e)))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::XmlError(format!("bad value for {}: {}", key, e)))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    match node {
        Node::Element(element) => write_element(writer, element),
        Node::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| Error::XmlError(e.to_string())),
        Node::Other(event) => writer
            .write_event(event.clone())
            .map_err(|e| Error::XmlError(e.to_string())),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| Error::XmlError(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::XmlError(e.to_string()))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| Error::XmlError(e.to_string()))
}

/// Extract the local name from a potentially namespaced XML name.
pub fn local_name(name: &str) -> &str {
    match name.find(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Check that markup is well-formed: balanced, properly nested tags.
pub fn ensure_well_formed(xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::XmlError("unexpected closing tag".to_string()))?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if depth != 0 {
        return Err(Error::XmlError(format!("{} unclosed element(s)", depth)));
    }
    Ok(())
}
