// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// A minimal in-memory element tree for values XML. Whitespace is kept as
// text nodes: it is significant inside <string> and friends, and the decoders
// rely on reproducing indentation exactly.
use std::io::{Read, Write};

use arsc_common::*;
use xml::{
    common::Position,
    name::OwnedName,
    reader::{EventReader, XmlEvent},
    writer::{EmitterConfig, EventWriter, XmlEvent as WriterEvent}
};

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    /// 1-based source line of the start tag, 0 for elements built in memory.
    pub line: u32
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        XmlElement {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(XmlNode::Text(text.to_string()));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, value)| &value[..])
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None
        })
    }

    pub fn has_child_elements(&self) -> bool {
        self.elements().next().is_some()
    }

    /// All descendant text concatenated, markup stripped.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, text: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.collect_text(text),
                XmlNode::Text(chunk) => text.push_str(chunk)
            }
        }
    }

    pub fn write_to<W: Write>(&self, target: W, xml_declaration: bool) -> Result<()> {
        let mut writer = EmitterConfig::new()
            .perform_indent(false)
            .write_document_declaration(xml_declaration)
            .create_writer(target);
        self.emit(&mut writer)
    }

    pub fn to_xml_string(&self, xml_declaration: bool) -> Result<String> {
        let mut bytes = vec![];
        self.write_to(&mut bytes, xml_declaration)?;
        String::from_utf8(bytes).map_err(|e| {
            ArscError::MalformedChunk(format!("serialised XML is not UTF-8: {e}"))
        })
    }

    fn emit<W: Write>(&self, writer: &mut EventWriter<W>) -> Result<()> {
        let mut start = WriterEvent::start_element(self.name.as_str());
        for (name, value) in &self.attributes {
            start = start.attr(name.as_str(), value);
        }
        writer.write(start)?;
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.emit(writer)?,
                XmlNode::Text(text) => writer.write(WriterEvent::characters(text))?
            }
        }
        writer.write(WriterEvent::end_element())?;
        Ok(())
    }
}

fn qualified_name(name: &OwnedName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{prefix}:{}", name.local_name),
        None => name.local_name.clone()
    }
}

/// Appends text, merging it into a preceding text node.
pub(crate) fn push_text(children: &mut Vec<XmlNode>, text: &str) {
    if let Some(XmlNode::Text(previous)) = children.last_mut() {
        previous.push_str(text);
    } else {
        children.push(XmlNode::Text(text.to_string()));
    }
}

/// Parses a document and returns its root element.
pub fn parse_xml<T: Read>(byte_source: T) -> Result<XmlElement> {
    let mut xml_source = EventReader::new(byte_source);
    let mut stack: Vec<XmlElement> = vec![];
    loop {
        let event = xml_source.next()?;
        match event {
            XmlEvent::StartElement {
                name,
                attributes,
                namespace: _namespace
            } => {
                let mut element = XmlElement::new(&qualified_name(&name));
                element.line = xml_source.position().row as u32 + 1;
                element.attributes = attributes
                    .iter()
                    .map(|attr| (qualified_name(&attr.name), attr.value.clone()))
                    .collect();
                stack.push(element);
            }
            XmlEvent::EndElement { name: _name } => {
                let Some(element) = stack.pop() else {
                    return Err(ArscError::ShapeMismatch("unbalanced end tag".into()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None => return Ok(element)
                }
            }
            XmlEvent::Characters(text) | XmlEvent::CData(text) | XmlEvent::Whitespace(text) => {
                if let Some(parent) = stack.last_mut() {
                    push_text(&mut parent.children, &text);
                }
            }
            XmlEvent::EndDocument => {
                return Err(ArscError::ShapeMismatch("document has no root element".into()))
            }
            // Declarations, comments and processing instructions carry no values
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keeps_whitespace_and_lines() {
        let root = parse_xml(
            "<?xml version=\"1.0\"?>\n<resources>\n  <string name=\"a\"> x </string>\n</resources>"
                .as_bytes()
        )
        .unwrap();
        assert_eq!(root.line, 2);
        assert_eq!(root.children.len(), 3);
        let string = root.elements().next().unwrap();
        assert_eq!(string.line, 3);
        assert_eq!(string.attribute("name"), Some("a"));
        assert_eq!(string.text_content(), " x ");
    }

    #[test]
    fn inline_markup_is_kept() {
        let root = parse_xml("<string>Hello <b>big</b> world</string>".as_bytes()).unwrap();
        assert!(root.has_child_elements());
        assert_eq!(root.text_content(), "Hello big world");
        assert_eq!(
            root.children[1],
            XmlNode::Element(XmlElement {
                line: 1,
                ..XmlElement::new("b").with_text("big")
            })
        );
    }

    #[test]
    fn serialises_without_reindenting() {
        let tree = XmlElement::new("resources")
            .with_text("\n  ")
            .with_child(
                XmlElement::new("color")
                    .with_attribute("name", "accent")
                    .with_text("#ff00ff00")
            )
            .with_text("\n");
        assert_eq!(
            tree.to_xml_string(false).unwrap(),
            "<resources>\n  <color name=\"accent\">#ff00ff00</color>\n</resources>"
        );
    }

    #[test]
    fn rejects_broken_documents() {
        assert!(matches!(
            parse_xml("<resources><string></resources>".as_bytes()),
            Err(ArscError::XmlParsingFailed(_))
        ));
    }
}
