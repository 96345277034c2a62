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

use arsc_common::*;

use crate::xml_tree::{push_text, XmlElement, XmlNode};

// Indentation written before a start tag, in spaces
pub const INDENT_ROOT: usize = 0;
pub const INDENT_ENTRY: usize = 2;
pub const INDENT_BAG: usize = 4;

/// The sink decoders render into. Implementations decide what a finished
/// element turns into; decoders never produce raw bytes themselves.
pub trait EntryWriter {
    type Output;

    fn start_tag(&mut self, name: &str) -> Result<()>;

    /// Adds an attribute to the innermost open tag.
    fn attribute(&mut self, name: &str, value: &str) -> Result<()>;

    fn text(&mut self, text: &str) -> Result<()>;

    fn end_tag(&mut self, name: &str) -> Result<Self::Output>;

    /// Whitespace preceding a tag. Output is diffed against existing files,
    /// so this has to stay byte-for-byte stable.
    fn write_tag_indent(&mut self, indent: usize) -> Result<()> {
        self.text(&format!("\n{}", " ".repeat(indent)))
    }
}

/// Builds [XmlElement]s. Closing an outermost tag yields the finished
/// element, closing a nested one yields `None`.
#[derive(Debug, Default)]
pub struct TreeEntryWriter {
    open: Vec<XmlElement>,
    nodes: Vec<XmlNode>
}

impl TreeEntryWriter {
    pub fn new() -> Self {
        TreeEntryWriter::default()
    }

    /// Everything written outside of any tag, including finished elements.
    pub fn into_nodes(self) -> Vec<XmlNode> {
        self.nodes
    }

    fn innermost(&mut self) -> Result<&mut XmlElement> {
        self.open
            .last_mut()
            .ok_or_else(|| ArscError::ShapeMismatch("no open tag".into()))
    }
}

impl EntryWriter for TreeEntryWriter {
    type Output = Option<XmlElement>;

    fn start_tag(&mut self, name: &str) -> Result<()> {
        self.open.push(XmlElement::new(name));
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.innermost()?
            .attributes
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        match self.open.last_mut() {
            Some(element) => push_text(&mut element.children, text),
            None => push_text(&mut self.nodes, text)
        }
        Ok(())
    }

    fn end_tag(&mut self, name: &str) -> Result<Option<XmlElement>> {
        let element = self.open.pop().filter(|element| element.name == name).ok_or_else(|| {
            ArscError::ShapeMismatch(format!("end tag {name} does not match an open tag"))
        })?;
        match self.open.last_mut() {
            Some(parent) => {
                parent.children.push(XmlNode::Element(element));
                Ok(None)
            }
            None => {
                self.nodes.push(XmlNode::Element(element.clone()));
                Ok(Some(element))
            }
        }
    }
}
