//! Minimal attribute-preserving XML tree.
//!
//! The structural analyzer needs the author's raw attributes (`data-wx-*`
//! annotations, gradient `href` chains), so the document is read into a
//! flat element arena with an explicit child→parent map. All "walk up"
//! queries are iterative loops over parent indices; there are no back
//! references to manage.

use std::collections::{BTreeMap, HashMap};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{WxError, WxResult};

#[derive(Debug)]
pub struct XmlElement {
    /// Local tag name with any namespace prefix stripped.
    pub tag: String,
    /// Attributes by qualified name (prefixes kept, e.g. `xlink:href`).
    pub attrs: BTreeMap<String, String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// An XML document as an arena of elements in document order.
///
/// Index 0 is the root element. Text, comments, and processing
/// instructions are discarded.
#[derive(Debug, Default)]
pub struct XmlTree {
    elements: Vec<XmlElement>,
}

impl XmlTree {
    pub fn parse(input: &str) -> WxResult<Self> {
        let mut reader = Reader::from_str(input);
        let mut tree = XmlTree::default();
        let mut stack: Vec<usize> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let idx = tree.push_element(&start, stack.last().copied())?;
                    stack.push(idx);
                }
                Ok(Event::Empty(start)) => {
                    tree.push_element(&start, stack.last().copied())?;
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(WxError::mapping(format!("malformed XML document: {err}")));
                }
            }
        }

        if tree.elements.is_empty() {
            return Err(WxError::mapping("XML document has no root element"));
        }
        Ok(tree)
    }

    fn push_element(&mut self, start: &BytesStart<'_>, parent: Option<usize>) -> WxResult<usize> {
        let tag = local_name(start.name().as_ref());
        let mut attrs = BTreeMap::new();
        for attr in start.attributes() {
            let attr =
                attr.map_err(|err| WxError::mapping(format!("malformed attribute: {err}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| WxError::mapping(format!("malformed attribute value: {err}")))?
                .into_owned();
            attrs.insert(key, value);
        }

        let idx = self.elements.len();
        self.elements.push(XmlElement {
            tag,
            attrs,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.elements[parent].children.push(idx);
        }
        Ok(idx)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn tag(&self, idx: usize) -> &str {
        &self.elements[idx].tag
    }

    pub fn attr(&self, idx: usize, name: &str) -> Option<&str> {
        self.elements[idx].attrs.get(name).map(String::as_str)
    }

    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.elements[idx].parent
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        &self.elements[idx].children
    }

    /// Indices in document order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        0..self.elements.len()
    }

    /// Map from `id` attribute to element index (first occurrence wins).
    pub fn id_map(&self) -> HashMap<&str, usize> {
        let mut map = HashMap::new();
        for idx in self.indices() {
            if let Some(id) = self.attr(idx, "id") {
                map.entry(id).or_insert(idx);
            }
        }
        map
    }

    /// Whether any transitive ancestor (or the element itself) has `tag`.
    pub fn has_ancestor_tag(&self, idx: usize, tag: &str) -> bool {
        let mut current = Some(idx);
        while let Some(i) = current {
            if self.tag(i) == tag {
                return true;
            }
            current = self.parent(i);
        }
        false
    }
}

fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}
