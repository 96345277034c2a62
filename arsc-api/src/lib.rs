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

//! # ARSC API
//!
//! This crate exposes the main public API through which other projects can
//! edit the complex resources of a resource table as values XML.
//!
//! ## Encoding and decoding a values document
//!
//! Every element of a `<resources>` document becomes one entry for the given
//! configuration. Decoding renders the entries of one type back out.
//!
//! ```
//! use arsc_api::*;
//!
//! let mut table = ResourceTable::new();
//! table.add_package(TablePackage::new(0x7F, "com.example"))?;
//!
//! let values = "<resources><string name=\"app_name\">Example</string></resources>";
//! let options = CodecOptions::default();
//! let encoded = encode_values(&mut table, 0x7F, values.as_bytes(), QualifierSet::default(), &options)?;
//! assert!(encoded.failures.is_empty());
//!
//! let decoded = decode_values(&table, 0x7F, "string", &QualifierSet::default(), &options)?;
//! let bare = CodecOptions { xml_declaration: false, ..options };
//! assert_eq!(
//!     document_to_string(&decoded.output, &bare)?,
//!     "<resources>\n  <string name=\"app_name\">Example</string>\n</resources>"
//! );
//! # Ok::<(), ArscError>(())
//! ```
//!
//! ## Failures
//!
//! Every entry is encoded and decoded on its own. By default a failing entry
//! is logged, reported in [BatchResult::failures] and skipped; set
//! [CodecOptions::stop_on_error] to abort on the first failure instead.

use std::io::{Read, Write};

use arsc_table::resource_internal_types::ResourceId;
use arsc_xml::{
    entry_coder::{declare_entry, decode_entry, encode_entry, write_public_xml},
    entry_writer::{EntryWriter, TreeEntryWriter, INDENT_ROOT},
    xml_tree::parse_xml
};
use log::{debug, warn};

pub use arsc_common::{ArscError, Result};
pub use arsc_table::{
    resource_internal_types::{QualifierSet, ResConfig},
    resource_table::{ResourceTable, TablePackage}
};
pub use arsc_xml::xml_tree::XmlElement;

const RESOURCES_TAG: &str = "resources";

/// Settings shared by the batch operations.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Abort on the first entry that fails instead of skipping it.
    pub stop_on_error: bool,
    /// Start serialised documents with `<?xml version="1.0" encoding="utf-8"?>`.
    pub xml_declaration: bool
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            stop_on_error: false,
            xml_declaration: true
        }
    }
}

/// An entry that was skipped by a batch operation.
#[derive(Debug, Clone)]
pub struct EntryFailure {
    /// The resource (`0x7f010000 @com.example:string/title`) or element
    /// (`<string name="title">`) that failed.
    pub entry: String,
    pub error: ArscError
}

/// What a batch operation produced, along with everything it skipped.
#[derive(Debug)]
pub struct BatchResult<T> {
    pub output: T,
    pub failures: Vec<EntryFailure>
}

impl<T> BatchResult<T> {
    fn new(output: T) -> Self {
        BatchResult {
            output,
            failures: vec![]
        }
    }

    fn record(&mut self, entry: String, error: ArscError, options: &CodecOptions) -> Result<()> {
        if options.stop_on_error {
            return Err(error);
        }
        warn!("Skipping {entry}: {error}");
        self.failures.push(EntryFailure { entry, error });
        Ok(())
    }
}

fn describe(element: &XmlElement) -> String {
    match element.attribute("name") {
        Some(name) => format!("<{} name=\"{name}\"> (line {})", element.name, element.line),
        None => format!("<{}> (line {})", element.name, element.line)
    }
}

fn close_document(root: &mut XmlElement) -> Result<()> {
    if root.children.is_empty() {
        return Ok(());
    }
    let mut writer = TreeEntryWriter::new();
    writer.write_tag_indent(INDENT_ROOT)?;
    root.children.extend(writer.into_nodes());
    Ok(())
}

/// Decodes every entry of `type_name` that exists for exactly `config` into
/// a `<resources>` document, in declaration order.
pub fn decode_values<C: ResConfig>(
    table: &ResourceTable<C>,
    package_id: u8,
    type_name: &str,
    config: &C,
    options: &CodecOptions
) -> Result<BatchResult<XmlElement>> {
    let package = table
        .package(package_id)
        .ok_or(ArscError::UnknownPackage(package_id))?;
    let type_id = package
        .type_strings()
        .id_of_name(type_name)
        .ok_or_else(|| ArscError::LookupFailure(format!("type {type_name}")))?;

    let mut result = BatchResult::new(XmlElement::new(RESOURCES_TAG));
    for resource_id in package.resource_ids() {
        if resource_id.type_id() != type_id {
            continue;
        }
        let Some(entry) = table.resource_entry(resource_id) else {
            continue;
        };
        let Some(record) = entry.get(config) else {
            continue;
        };
        // Each entry gets a fresh writer, so a failure can't leave half an
        // element in the document
        let mut writer = TreeEntryWriter::new();
        match decode_entry(&entry, record, &mut writer) {
            Ok(_) => result.output.children.extend(writer.into_nodes()),
            Err(e) => result.record(entry.to_string(), e, options)?
        }
    }
    close_document(&mut result.output)?;
    debug!(
        "Decoded {} {type_name} entries, skipped {}",
        result.output.elements().count(),
        result.failures.len()
    );
    Ok(result)
}

/// Encodes every element of a `<resources>` document into entries for
/// `config`. All resources the document declares are allocated up front, so
/// elements may reference ones further down.
pub fn encode_values<C: ResConfig, R: Read>(
    table: &mut ResourceTable<C>,
    package_id: u8,
    byte_source: R,
    config: C,
    options: &CodecOptions
) -> Result<BatchResult<Vec<ResourceId>>> {
    let root = parse_xml(byte_source)?;
    if root.name != RESOURCES_TAG {
        return Err(ArscError::ShapeMismatch(format!(
            "expected <{RESOURCES_TAG}>, found <{}>",
            root.name
        )));
    }

    let mut result = BatchResult::new(vec![]);
    let mut declared = vec![];
    for element in root.elements() {
        match declare_entry(table, package_id, element) {
            Ok(_) => declared.push(element),
            Err(e) => result.record(describe(element), e, options)?
        }
    }
    for element in declared {
        match encode_entry(table, package_id, element, config.clone()) {
            Ok(resource_id) => result.output.push(resource_id),
            Err(e) => result.record(describe(element), e, options)?
        }
    }
    debug!(
        "Encoded {} entries, skipped {}",
        result.output.len(),
        result.failures.len()
    );
    Ok(result)
}

/// Lists every resource of the package that has entries as `<public>`
/// elements.
pub fn decode_public_xml<C: ResConfig>(table: &ResourceTable<C>, package_id: u8) -> Result<XmlElement> {
    let package = table
        .package(package_id)
        .ok_or(ArscError::UnknownPackage(package_id))?;
    let mut writer = TreeEntryWriter::new();
    for resource_id in package.resource_ids() {
        if let Some(entry) = table.resource_entry(resource_id) {
            write_public_xml(&entry, &mut writer)?;
        }
    }
    let mut root = XmlElement::new(RESOURCES_TAG);
    root.children = writer.into_nodes();
    close_document(&mut root)?;
    Ok(root)
}

pub fn write_document<W: Write>(root: &XmlElement, target: W, options: &CodecOptions) -> Result<()> {
    root.write_to(target, options.xml_declaration)
}

pub fn document_to_string(root: &XmlElement, options: &CodecOptions) -> Result<String> {
    root.to_xml_string(options.xml_declaration)
}
