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

// Inverse of the decoder chain: turns <array>, <style>, <plurals> and <attr>
// elements back into bags, coercing literal text to binary values.
use arsc_common::*;
use arsc_table::{
    attribute_types::{AttributeDataFormat, AttributeType},
    resource_external_types::{ResValue, ValueType},
    resource_internal_types::{array_item_key, Bag, ResConfig, ResValueMap, ResourceId},
    resource_table::ResourceTable,
    value_coder
};
use log::debug;

use crate::{styled_string::parse_styled, xml_tree::XmlElement};

/// What an element's text has to be coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Guess from the literal, falling back to a string.
    Any,
    String,
    Integer
}

fn encode_string<C: ResConfig>(table: &mut ResourceTable<C>, element: &XmlElement) -> ResValue {
    let pool = table.string_pool_mut();
    let index = if element.has_child_elements() {
        let (content, style) = parse_styled(element);
        debug!("Styled string with {} spans: {content}", style.len());
        pool.get_or_create_styled(&content, style)
    } else {
        pool.get_or_create(&value_coder::unescape_unquote(&element.text_content()))
    };
    ResValue::new(ValueType::String, index)
}

/// Encodes the text of `element`. References always win, whatever the
/// format. Returns `None` if the text can't be coerced to `format`.
pub fn encode_item_value<C: ResConfig>(
    table: &mut ResourceTable<C>,
    package_id: u8,
    element: &XmlElement,
    format: ValueFormat
) -> Result<Option<ResValue>> {
    let text = element.text_content();
    if !element.has_child_elements() {
        if let Some(reference) = table.encode_reference(package_id, &text)? {
            return Ok(Some(reference));
        }
    }
    match format {
        ValueFormat::Integer => Ok(value_coder::encode_integer(text.trim())),
        ValueFormat::String => Ok(Some(encode_string(table, element))),
        ValueFormat::Any => {
            if !element.has_child_elements() {
                if let Some(value) = value_coder::encode(text.trim()) {
                    return Ok(Some(value));
                }
            }
            Ok(Some(encode_string(table, element)))
        }
    }
}

/// One strategy per bag-valued tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BagEncoder {
    Array,
    Style,
    Plural,
    Attr
}

impl BagEncoder {
    pub fn for_tag(tag: &str) -> Option<BagEncoder> {
        match tag {
            "array" | "string-array" | "integer-array" => Some(BagEncoder::Array),
            "style" => Some(BagEncoder::Style),
            "plurals" => Some(BagEncoder::Plural),
            "attr" | "attr-private" => Some(BagEncoder::Attr),
            _ => None
        }
    }

    /// Builds the bag for `element`. Nothing is written to the package until
    /// the whole element encoded successfully, except for `id` resources
    /// declared by `<enum>` and `<flag>` members.
    pub fn encode<C: ResConfig>(
        &self,
        table: &mut ResourceTable<C>,
        package_id: u8,
        element: &XmlElement
    ) -> Result<Bag> {
        let name = element.attribute("name").unwrap_or_default();
        debug!("Encoding <{}> {name} as {self:?}", element.name);
        match self {
            BagEncoder::Array => encode_array(table, package_id, element, name),
            BagEncoder::Style => encode_style(table, package_id, element),
            BagEncoder::Plural => encode_plural(table, package_id, element),
            BagEncoder::Attr => encode_attr(table, package_id, element, name)
        }
    }
}

// Named array items are keyed by `id` resources
fn resolve_item_key<C: ResConfig>(table: &ResourceTable<C>, package_id: u8, name: &str) -> Result<u32> {
    if let Some(id) = value_coder::encode_unknown_name_id(name) {
        return Ok(id);
    }
    table
        .package(package_id)
        .and_then(|package| package.resolve_local_resource_id("id", name))
        .map(|id| id.0)
        .ok_or_else(|| ArscError::LookupFailure(format!("@id/{name}")))
}

fn encode_array<C: ResConfig>(
    table: &mut ResourceTable<C>,
    package_id: u8,
    element: &XmlElement,
    name: &str
) -> Result<Bag> {
    let format = match element.name.as_str() {
        "string-array" => ValueFormat::String,
        "integer-array" => ValueFormat::Integer,
        _ => ValueFormat::Any
    };
    let items: Vec<&XmlElement> = element.elements().collect();
    let mut bag = Bag::with_slots(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let key = match item.attribute("name") {
            Some(item_name) => resolve_item_key(table, package_id, item_name)?,
            None => array_item_key(index)
        };
        let value = encode_item_value(table, package_id, item, format)?.ok_or_else(|| {
            ArscError::CoercionFailure {
                entry: name.to_string(),
                index: index + 1,
                line: item.line,
                reason: "Invalid integer value".into()
            }
        })?;
        let slot = bag.slot_mut(index)?;
        slot.key = key;
        slot.set_value(value);
    }
    Ok(bag)
}

fn encode_style<C: ResConfig>(
    table: &mut ResourceTable<C>,
    package_id: u8,
    element: &XmlElement
) -> Result<Bag> {
    let items: Vec<&XmlElement> = element.elements().collect();
    let mut bag = Bag::with_slots(items.len());
    bag.parent_id = match element.attribute("parent").map(str::trim) {
        None | Some("") => 0,
        Some(parent) => match table.encode_reference(package_id, parent)? {
            Some(reference) => reference.data,
            None => table.resolve_name(package_id, "style", parent)?
        }
    };
    for (index, item) in items.into_iter().enumerate() {
        let attribute = item
            .attribute("name")
            .ok_or_else(|| ArscError::LookupFailure(format!("unnamed style item on line {}", item.line)))?;
        let key = table.resolve_name(package_id, "attr", attribute)?;
        let symbolic = table
            .resource_entry(ResourceId(key))
            .and_then(|declaration| declaration.encode_attribute_data(&item.text_content()));
        let value = match symbolic {
            Some(value) => value,
            None => encode_item_value(table, package_id, item, ValueFormat::Any)?
                .unwrap_or_else(ResValue::null)
        };
        let slot = bag.slot_mut(index)?;
        slot.key = key;
        slot.set_value(value);
    }
    Ok(bag)
}

fn encode_plural<C: ResConfig>(
    table: &mut ResourceTable<C>,
    package_id: u8,
    element: &XmlElement
) -> Result<Bag> {
    let items: Vec<&XmlElement> = element.elements().collect();
    let mut bag = Bag::with_slots(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let quantity = item.attribute("quantity").unwrap_or_default();
        let attribute_type = AttributeType::from_name(quantity)
            .filter(|attribute_type| attribute_type.is_plural())
            .ok_or_else(|| ArscError::LookupFailure(format!("plural quantity \"{quantity}\"")))?;
        let value = encode_item_value(table, package_id, item, ValueFormat::Any)?
            .unwrap_or_else(ResValue::null);
        let slot = bag.slot_mut(index)?;
        slot.key = attribute_type.id();
        slot.set_value(value);
    }
    Ok(bag)
}

fn encode_attr<C: ResConfig>(
    table: &mut ResourceTable<C>,
    package_id: u8,
    element: &XmlElement,
    name: &str
) -> Result<Bag> {
    let mut formats = match element
        .attribute(AttributeType::Formats.name())
        .or_else(|| element.attribute("format"))
    {
        Some(text) => AttributeDataFormat::parse_mask(text)?,
        None => 0
    };

    let mut reserved = vec![];
    for attribute_type in [AttributeType::Min, AttributeType::Max, AttributeType::L10n] {
        if let Some(text) = element.attribute(attribute_type.name()) {
            let value: i32 = text.trim().parse()?;
            reserved.push(ResValueMap::new(
                attribute_type.id(),
                ValueType::DecimalInteger,
                value as u32
            ));
        }
    }

    let mut members = vec![];
    for (index, member) in element.elements().enumerate() {
        let kind = AttributeDataFormat::from_name(&member.name)
            .filter(|kind| matches!(kind, AttributeDataFormat::Enum | AttributeDataFormat::Flag))
            .ok_or_else(|| {
                ArscError::ShapeMismatch(format!("<{}> inside attr {name}", member.name))
            })?;
        formats |= kind.mask();
        let member_name = member.attribute("name").ok_or_else(|| {
            ArscError::LookupFailure(format!("unnamed {} on line {}", kind.name(), member.line))
        })?;
        let text = match member.attribute("value") {
            Some(value) => value.to_string(),
            None => member.text_content()
        };
        let value = value_coder::encode_integer(text.trim()).ok_or_else(|| {
            ArscError::CoercionFailure {
                entry: name.to_string(),
                index: index + 1,
                line: member.line,
                reason: format!("Invalid {} value", kind.name())
            }
        })?;
        let key = match value_coder::encode_unknown_name_id(member_name) {
            Some(id) => id,
            None => table
                .package_mut(package_id)
                .ok_or(ArscError::UnknownPackage(package_id))?
                .get_or_create_resource_id("id", member_name)?
                .0
        };
        members.push(ResValueMap::new(key, value.data_type, value.data));
    }

    let mut children = vec![ResValueMap::new(
        AttributeType::Formats.id(),
        ValueType::DecimalInteger,
        formats
    )];
    children.extend(reserved);
    children.extend(members);
    Ok(Bag {
        parent_id: 0,
        children
    })
}
