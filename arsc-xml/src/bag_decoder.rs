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
use arsc_table::{
    attribute_types::{AttributeDataFormat, AttributeType},
    resource_entry::ResourceEntry,
    resource_external_types::{ResValue, ValueType},
    resource_internal_types::{array_item_key, Bag, ResConfig, ResValueMap, ResourceId}
};
use log::trace;

use crate::{
    entry_writer::{EntryWriter, INDENT_BAG, INDENT_ENTRY},
    styled_string::write_styled
};

/// Attribute declarations may be stored under a hidden type such as
/// `^attr-private`.
pub fn is_attribute_type(type_name: &str) -> bool {
    type_name == "attr" || type_name.starts_with("^attr")
}

/// Renders bags as values XML. Decoders are probed in [BagDecoder::CHAIN]
/// order and the first one that claims a bag renders it; shapes overlap, so
/// the order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BagDecoder {
    /// `<attr name="..." formats="...">` with `<enum>`/`<flag>` members.
    Attr,
    /// `<plurals>` with one `<item quantity="...">` per child.
    Plural,
    /// Styles, arrays and everything else. Claims any bag.
    Common
}

impl BagDecoder {
    pub const CHAIN: [BagDecoder; 3] = [BagDecoder::Attr, BagDecoder::Plural, BagDecoder::Common];

    /// The first decoder of the chain that claims `bag`.
    pub fn select<C: ResConfig>(entry: &ResourceEntry<C>, bag: &Bag) -> Result<BagDecoder> {
        BagDecoder::CHAIN
            .into_iter()
            .find(|decoder| decoder.can_decode(entry, bag))
            .ok_or_else(|| ArscError::ShapeMismatch(format!("no decoder for {entry}")))
    }

    pub fn can_decode<C: ResConfig>(&self, entry: &ResourceEntry<C>, bag: &Bag) -> bool {
        match self {
            BagDecoder::Attr => entry.type_name().is_some_and(is_attribute_type),
            BagDecoder::Plural => {
                bag.parent_id == 0
                    && !bag.is_empty()
                    && bag
                        .iter()
                        .all(|child| child.attribute_type().is_some_and(|t| t.is_plural()))
            }
            BagDecoder::Common => true
        }
    }

    pub fn decode<C: ResConfig, W: EntryWriter>(
        &self,
        entry: &ResourceEntry<C>,
        bag: &Bag,
        writer: &mut W
    ) -> Result<W::Output> {
        trace!("Decoding {entry} with {self:?}");
        let name = entry
            .name()
            .ok_or_else(|| ArscError::LookupFailure(entry.hex_id()))?;
        let type_name = entry
            .type_name()
            .ok_or(ArscError::InvalidTypeId(entry.resource_id().type_id() as u32))?;
        match self {
            BagDecoder::Attr => decode_attr(entry, bag, writer, type_name, name),
            BagDecoder::Plural => decode_plural(entry, bag, writer, type_name, name),
            BagDecoder::Common => decode_common(entry, bag, writer, type_name, name)
        }
    }
}

/// Picks a decoder for `bag` and renders it.
pub fn decode_bag<C: ResConfig, W: EntryWriter>(
    entry: &ResourceEntry<C>,
    bag: &Bag,
    writer: &mut W
) -> Result<W::Output> {
    BagDecoder::select(entry, bag)?.decode(entry, bag, writer)
}

/// Writes a scalar as element text. Styled strings keep their markup.
pub(crate) fn write_value<C: ResConfig, W: EntryWriter>(
    entry: &ResourceEntry<C>,
    value: ResValue,
    writer: &mut W
) -> Result<()> {
    let table = entry.table();
    if value.data_type == ValueType::String {
        if let Some(string) = table.string_pool().get(value.data).filter(|s| s.has_style()) {
            return write_styled(writer, string);
        }
    }
    writer.text(&table.decode_value(entry.package().id(), value)?)
}

fn decode_attr<C: ResConfig, W: EntryWriter>(
    entry: &ResourceEntry<C>,
    bag: &Bag,
    writer: &mut W,
    type_name: &str,
    name: &str
) -> Result<W::Output> {
    let table = entry.table();
    let package_id = entry.package().id();
    let tag = type_name.strip_prefix('^').unwrap_or(type_name);

    writer.write_tag_indent(INDENT_ENTRY)?;
    writer.start_tag(tag)?;
    writer.attribute("name", name)?;

    let formats = bag.get_by_type(AttributeType::Formats).map_or(0, |child| child.data);
    for child in bag.iter() {
        let value = match child.attribute_type() {
            Some(AttributeType::Formats) => {
                AttributeDataFormat::to_string(&AttributeDataFormat::decode_value_types(child.data))
            }
            Some(_) => Some((child.data as i32).to_string()),
            None => None
        };
        if let (Some(attribute_type), Some(value)) = (child.attribute_type(), value) {
            writer.attribute(attribute_type.name(), &value)?;
        }
    }

    let member_tag = AttributeDataFormat::type_of_bag(formats)
        .unwrap_or(AttributeDataFormat::Enum)
        .name();
    let mut members = 0;
    for child in bag.iter().filter(|child| child.attribute_type().is_none()) {
        writer.write_tag_indent(INDENT_BAG)?;
        writer.start_tag(member_tag)?;
        writer.attribute("name", &table.decode_name(package_id, child.key))?;
        writer.text(&table.decode_value(package_id, child.value())?)?;
        writer.end_tag(member_tag)?;
        members += 1;
    }
    if members > 0 {
        writer.write_tag_indent(INDENT_ENTRY)?;
    }
    writer.end_tag(tag)
}

fn decode_plural<C: ResConfig, W: EntryWriter>(
    entry: &ResourceEntry<C>,
    bag: &Bag,
    writer: &mut W,
    type_name: &str,
    name: &str
) -> Result<W::Output> {
    writer.write_tag_indent(INDENT_ENTRY)?;
    writer.start_tag(type_name)?;
    writer.attribute("name", name)?;
    for child in bag.iter() {
        let quantity = child
            .attribute_type()
            .filter(|attribute_type| attribute_type.is_plural())
            .ok_or_else(|| {
                ArscError::ShapeMismatch(format!(
                    "key 0x{:08x} of {entry} is not a plural quantity",
                    child.key
                ))
            })?;
        writer.write_tag_indent(INDENT_BAG)?;
        writer.start_tag("item")?;
        writer.attribute("quantity", quantity.name())?;
        write_value(entry, child.value(), writer)?;
        writer.end_tag("item")?;
    }
    if !bag.is_empty() {
        writer.write_tag_indent(INDENT_ENTRY)?;
    }
    writer.end_tag(type_name)
}

// Values of attributes with enum or flag members are written by name, but only
// when the name encodes back to the same value type
fn symbolic_value<C: ResConfig>(entry: &ResourceEntry<C>, child: &ResValueMap) -> Option<String> {
    let attribute = entry.table().resource_entry(ResourceId(child.key))?;
    if attribute.attribute_value_type()? != child.value_type {
        return None;
    }
    attribute.decode_attribute_data(child.data)
}

fn decode_common<C: ResConfig, W: EntryWriter>(
    entry: &ResourceEntry<C>,
    bag: &Bag,
    writer: &mut W,
    type_name: &str,
    name: &str
) -> Result<W::Output> {
    let table = entry.table();
    let package_id = entry.package().id();

    writer.write_tag_indent(INDENT_ENTRY)?;
    writer.start_tag(type_name)?;
    writer.attribute("name", name)?;
    if bag.parent_id != 0 {
        let parent = table.decode_reference(package_id, ValueType::Reference, bag.parent_id)?;
        writer.attribute("parent", &parent)?;
    }
    for (index, child) in bag.iter().enumerate() {
        writer.write_tag_indent(INDENT_BAG)?;
        writer.start_tag("item")?;
        // Array items keyed by their position are written without a name
        if child.key != array_item_key(index) {
            writer.attribute("name", &table.decode_name(package_id, child.key))?;
            if let Some(symbolic) = symbolic_value(entry, child) {
                writer.text(&symbolic)?;
                writer.end_tag("item")?;
                continue;
            }
        }
        write_value(entry, child.value(), writer)?;
        writer.end_tag("item")?;
    }
    if !bag.is_empty() {
        writer.write_tag_indent(INDENT_ENTRY)?;
    }
    writer.end_tag(type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entry_writer::TreeEntryWriter, xml_tree::XmlElement};
    use arsc_table::{
        resource_internal_types::{EntryValue, QualifierSet},
        resource_table::{ResourceTable, TablePackage, USER_PACKAGE_ID}
    };
    use pretty_assertions::assert_eq;

    fn table_with(type_name: &str, name: &str, bag: Bag) -> (ResourceTable, ResourceId) {
        let mut package = TablePackage::new(USER_PACKAGE_ID, "com.example");
        package.get_or_create_resource_id("attr", "accent").unwrap();
        let id = package.get_or_create_resource_id(type_name, name).unwrap();
        let mut table = ResourceTable::new();
        table.add_package(package).unwrap();
        table
            .resource_entry_mut(id)
            .unwrap()
            .get_or_create(QualifierSet::default())
            .unwrap()
            .value = EntryValue::Bag(bag);
        (table, id)
    }

    fn decode(table: &ResourceTable, id: ResourceId) -> Result<XmlElement> {
        let entry = table.resource_entry(id).unwrap();
        let bag = entry.get_default().unwrap().bag().unwrap();
        let mut writer = TreeEntryWriter::new();
        Ok(decode_bag(&entry, bag, &mut writer)?.unwrap())
    }

    fn plural_bag() -> Bag {
        Bag {
            parent_id: 0,
            children: vec![
                ResValueMap::new(AttributeType::One.id(), ValueType::DecimalInteger, 1),
                ResValueMap::new(AttributeType::Other.id(), ValueType::DecimalInteger, 2),
            ]
        }
    }

    #[test]
    fn first_claiming_decoder_wins() {
        // Plural shaped, but declared as an attribute
        let (table, id) = table_with("attr", "odd", plural_bag());
        let entry = table.resource_entry(id).unwrap();
        let bag = entry.get_default().unwrap().bag().unwrap();
        assert!(BagDecoder::Attr.can_decode(&entry, bag));
        assert!(BagDecoder::Plural.can_decode(&entry, bag));
        assert_eq!(BagDecoder::select(&entry, bag).unwrap(), BagDecoder::Attr);

        let (table, id) = table_with("plurals", "count", plural_bag());
        let entry = table.resource_entry(id).unwrap();
        let bag = entry.get_default().unwrap().bag().unwrap();
        assert!(BagDecoder::Common.can_decode(&entry, bag));
        assert_eq!(BagDecoder::select(&entry, bag).unwrap(), BagDecoder::Plural);

        let (table, id) = table_with("plurals", "empty", Bag::new());
        let entry = table.resource_entry(id).unwrap();
        let bag = entry.get_default().unwrap().bag().unwrap();
        assert_eq!(BagDecoder::select(&entry, bag).unwrap(), BagDecoder::Common);
    }

    #[test]
    fn plurals_render_quantities() {
        let (table, id) = table_with("plurals", "count", plural_bag());
        assert_eq!(
            decode(&table, id).unwrap(),
            XmlElement::new("plurals")
                .with_attribute("name", "count")
                .with_text("\n    ")
                .with_child(
                    XmlElement::new("item")
                        .with_attribute("quantity", "one")
                        .with_text("1")
                )
                .with_text("\n    ")
                .with_child(
                    XmlElement::new("item")
                        .with_attribute("quantity", "other")
                        .with_text("2")
                )
                .with_text("\n  ")
        );
    }

    #[test]
    fn non_plural_child_is_a_shape_mismatch() {
        let mut bag = plural_bag();
        bag.children
            .push(ResValueMap::new(AttributeType::Min.id(), ValueType::DecimalInteger, 0));
        let (table, id) = table_with("plurals", "count", bag.clone());
        let entry = table.resource_entry(id).unwrap();
        let mut writer = TreeEntryWriter::new();
        let result = BagDecoder::Plural.decode(&entry, &bag, &mut writer);
        assert!(matches!(result, Err(ArscError::ShapeMismatch(_))));
    }

    #[test]
    fn attributes_render_formats_and_members() {
        let (mut table, _) = table_with("style", "unused", Bag::new());
        let package = table.package_mut(USER_PACKAGE_ID).unwrap();
        let horizontal = package.get_or_create_resource_id("id", "horizontal").unwrap();
        let bag = Bag {
            parent_id: 0,
            children: vec![
                ResValueMap::new(
                    AttributeType::Formats.id(),
                    ValueType::DecimalInteger,
                    AttributeDataFormat::Integer.mask() | AttributeDataFormat::Enum.mask()
                ),
                ResValueMap::new(AttributeType::Min.id(), ValueType::DecimalInteger, -1i32 as u32),
                ResValueMap::new(horizontal.0, ValueType::DecimalInteger, 0),
            ]
        };
        let id = package.get_or_create_resource_id("^attr-private", "orientation").unwrap();
        table
            .resource_entry_mut(id)
            .unwrap()
            .get_or_create(QualifierSet::default())
            .unwrap()
            .value = EntryValue::Bag(bag);

        assert_eq!(
            decode(&table, id).unwrap(),
            XmlElement::new("attr-private")
                .with_attribute("name", "orientation")
                .with_attribute("formats", "integer enum")
                .with_attribute("min", "-1")
                .with_text("\n    ")
                .with_child(
                    XmlElement::new("enum")
                        .with_attribute("name", "horizontal")
                        .with_text("0")
                )
                .with_text("\n  ")
        );
    }

    #[test]
    fn attributes_without_members_have_no_closing_indent() {
        let bag = Bag {
            parent_id: 0,
            children: vec![ResValueMap::new(
                AttributeType::Formats.id(),
                ValueType::DecimalInteger,
                AttributeDataFormat::Color.mask()
            )]
        };
        let (table, id) = table_with("attr", "tint", bag);
        assert_eq!(
            decode(&table, id).unwrap(),
            XmlElement::new("attr")
                .with_attribute("name", "tint")
                .with_attribute("formats", "color")
        );
    }

    #[test]
    fn styles_and_arrays_share_the_common_decoder() {
        let (mut table, array) = table_with(
            "array",
            "sizes",
            Bag {
                parent_id: 0,
                children: vec![
                    ResValueMap::new(array_item_key(0), ValueType::DecimalInteger, 3),
                    ResValueMap::new(array_item_key(1), ValueType::BooleanInteger, 0),
                ]
            }
        );
        assert_eq!(
            decode(&table, array).unwrap(),
            XmlElement::new("array")
                .with_attribute("name", "sizes")
                .with_text("\n    ")
                .with_child(XmlElement::new("item").with_text("3"))
                .with_text("\n    ")
                .with_child(XmlElement::new("item").with_text("false"))
                .with_text("\n  ")
        );

        let package = table.package_mut(USER_PACKAGE_ID).unwrap();
        let base = package.get_or_create_resource_id("style", "Base").unwrap();
        let theme = package.get_or_create_resource_id("style", "Theme").unwrap();
        let accent = ResourceId(0x7F01_0000);
        table
            .resource_entry_mut(base)
            .unwrap()
            .get_or_create(QualifierSet::default())
            .unwrap();
        table
            .resource_entry_mut(theme)
            .unwrap()
            .get_or_create(QualifierSet::default())
            .unwrap()
            .value = EntryValue::Bag(Bag {
            parent_id: base.0,
            children: vec![ResValueMap::new(accent.0, ValueType::ColorRgb8, 0xFF00_FF00)]
        });
        assert_eq!(
            decode(&table, theme).unwrap(),
            XmlElement::new("style")
                .with_attribute("name", "Theme")
                .with_attribute("parent", "@style/Base")
                .with_text("\n    ")
                .with_child(
                    XmlElement::new("item")
                        .with_attribute("name", "accent")
                        .with_text("#00ff00")
                )
                .with_text("\n  ")
        );
    }
}
