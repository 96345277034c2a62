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

// One values XML element <-> one Entry. Bags go through the decoder chain and
// the bag encoders, scalar resources are handled here.
use arsc_common::*;
use arsc_table::{
    resource_entry::ResourceEntry,
    resource_external_types::{ResValue, ValueType},
    resource_internal_types::{Entry, EntryValue, ResConfig, ResourceId},
    resource_table::ResourceTable
};

use crate::{
    bag_decoder::{decode_bag, write_value},
    bag_encoder::{encode_item_value, BagEncoder, ValueFormat},
    entry_writer::{EntryWriter, INDENT_ENTRY},
    xml_tree::XmlElement
};

// Types with a tag of their own, everything else is written as <item type="...">
const SCALAR_TAGS: [&str; 6] = ["string", "integer", "bool", "color", "dimen", "fraction"];

/// The resource type an element declares, eg. `array` for `<string-array>`.
pub fn type_name_of(element: &XmlElement) -> Result<String> {
    Ok(match element.name.as_str() {
        "string-array" | "integer-array" => "array".into(),
        "attr-private" => "^attr-private".into(),
        "item" => element
            .attribute("type")
            .ok_or_else(|| {
                ArscError::LookupFailure(format!("<item> without a type on line {}", element.line))
            })?
            .into(),
        tag if SCALAR_TAGS.contains(&tag) || BagEncoder::for_tag(tag).is_some() => tag.into(),
        tag => {
            return Err(ArscError::ShapeMismatch(format!(
                "unsupported element <{tag}> on line {}",
                element.line
            )))
        }
    })
}

fn name_of(element: &XmlElement) -> Result<&str> {
    element.attribute("name").ok_or_else(|| {
        ArscError::LookupFailure(format!("<{}> without a name on line {}", element.name, element.line))
    })
}

/// Allocates the resource id of `element` without encoding its value, so
/// that a document can reference resources it declares further down.
pub fn declare_entry<C: ResConfig>(
    table: &mut ResourceTable<C>,
    package_id: u8,
    element: &XmlElement
) -> Result<ResourceId> {
    let type_name = type_name_of(element)?;
    let name = name_of(element)?;
    table
        .package_mut(package_id)
        .ok_or(ArscError::UnknownPackage(package_id))?
        .get_or_create_resource_id(&type_name, name)
}

fn encode_scalar<C: ResConfig>(
    table: &mut ResourceTable<C>,
    package_id: u8,
    element: &XmlElement,
    type_name: &str
) -> Result<ResValue> {
    let format = match element.name.as_str() {
        "string" => ValueFormat::String,
        "integer" => ValueFormat::Integer,
        _ => ValueFormat::Any
    };
    if type_name == "id" && element.text_content().trim().is_empty() {
        return Ok(ResValue::null());
    }
    encode_item_value(table, package_id, element, format)?.ok_or_else(|| {
        ArscError::CoercionFailure {
            entry: element.attribute("name").unwrap_or_default().to_string(),
            index: 0,
            line: element.line,
            reason: "Invalid integer value".into()
        }
    })
}

/// Encodes one element of a `<resources>` document into the entry for
/// `config`, declaring the resource if needed. The package is left untouched
/// if the value can't be encoded.
pub fn encode_entry<C: ResConfig>(
    table: &mut ResourceTable<C>,
    package_id: u8,
    element: &XmlElement,
    config: C
) -> Result<ResourceId> {
    let type_name = type_name_of(element)?;
    name_of(element)?;
    let value = match BagEncoder::for_tag(&element.name) {
        Some(encoder) => EntryValue::Bag(encoder.encode(table, package_id, element)?),
        None => EntryValue::Scalar(encode_scalar(table, package_id, element, &type_name)?)
    };
    let resource_id = declare_entry(table, package_id, element)?;
    table
        .resource_entry_mut(resource_id)
        .ok_or(ArscError::UnknownPackage(package_id))?
        .get_or_create(config)?
        .value = value;
    Ok(resource_id)
}

/// Renders `record`, one of the entries of `entry`, as a values XML element.
pub fn decode_entry<C: ResConfig, W: EntryWriter>(
    entry: &ResourceEntry<C>,
    record: &Entry<C>,
    writer: &mut W
) -> Result<W::Output> {
    match &record.value {
        EntryValue::Bag(bag) => decode_bag(entry, bag, writer),
        EntryValue::Scalar(value) => decode_scalar(entry, *value, writer)
    }
}

fn decode_scalar<C: ResConfig, W: EntryWriter>(
    entry: &ResourceEntry<C>,
    value: ResValue,
    writer: &mut W
) -> Result<W::Output> {
    let name = entry
        .name()
        .ok_or_else(|| ArscError::LookupFailure(entry.hex_id()))?;
    let type_name = entry
        .type_name()
        .ok_or(ArscError::InvalidTypeId(entry.resource_id().type_id() as u32))?;
    let tag = if SCALAR_TAGS.contains(&type_name) { type_name } else { "item" };

    writer.write_tag_indent(INDENT_ENTRY)?;
    writer.start_tag(tag)?;
    if tag == "item" {
        writer.attribute("type", type_name)?;
    }
    writer.attribute("name", name)?;
    // Plain id declarations carry no value
    if !(type_name == "id" && value.data_type == ValueType::Null) {
        write_value(entry, value, writer)?;
    }
    writer.end_tag(tag)
}

/// Writes `<public type="..." name="..." id="0x7f010000"/>` for `entry`.
pub fn write_public_xml<C: ResConfig, W: EntryWriter>(
    entry: &ResourceEntry<C>,
    writer: &mut W
) -> Result<W::Output> {
    let missing = || ArscError::LookupFailure(entry.hex_id());
    writer.write_tag_indent(INDENT_ENTRY)?;
    writer.start_tag("public")?;
    writer.attribute("type", entry.type_name().ok_or_else(missing)?)?;
    writer.attribute("name", entry.name().ok_or_else(missing)?)?;
    writer.attribute("id", &entry.hex_id())?;
    writer.end_tag("public")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entry_writer::TreeEntryWriter, xml_tree::parse_xml};
    use arsc_table::{
        resource_internal_types::QualifierSet,
        resource_table::{TablePackage, USER_PACKAGE_ID}
    };
    use pretty_assertions::assert_eq;

    fn table() -> ResourceTable {
        let mut table = ResourceTable::new();
        table
            .add_package(TablePackage::new(USER_PACKAGE_ID, "com.example"))
            .unwrap();
        table
    }

    // Encodes `xml`, decodes the result again and compares the two elements
    fn assert_round_trip(table: &mut ResourceTable, xml: &str) -> ResourceId {
        let element = parse_xml(xml.as_bytes()).unwrap();
        let id = encode_entry(table, USER_PACKAGE_ID, &element, QualifierSet::default()).unwrap();
        let entry = table.resource_entry(id).unwrap();
        let mut writer = TreeEntryWriter::new();
        let decoded = decode_entry(&entry, entry.get_default().unwrap(), &mut writer)
            .unwrap()
            .unwrap();
        let reparsed = parse_xml(decoded.to_xml_string(false).unwrap().as_bytes()).unwrap();
        let mut expected = element.clone();
        strip_lines(&mut expected);
        let mut actual = reparsed;
        strip_lines(&mut actual);
        assert_eq!(actual, expected);
        id
    }

    fn strip_lines(element: &mut XmlElement) {
        element.line = 0;
        for child in element.children.iter_mut() {
            if let crate::xml_tree::XmlNode::Element(inner) = child {
                strip_lines(inner);
            }
        }
    }

    #[test]
    fn scalars_round_trip() {
        let mut table = table();
        assert_round_trip(&mut table, "<string name=\"title\">\"42\"</string>");
        assert_round_trip(&mut table, "<string name=\"at\">\\@home</string>");
        assert_round_trip(&mut table, "<color name=\"accent\">#80ff0000</color>");
        assert_round_trip(&mut table, "<dimen name=\"gap\">16.0dp</dimen>");
        assert_round_trip(&mut table, "<integer name=\"count\">-3</integer>");
        assert_round_trip(&mut table, "<bool name=\"enabled\">true</bool>");
        assert_round_trip(&mut table, "<item type=\"id\" name=\"anchor\"/>");
        assert_round_trip(&mut table, "<item type=\"drawable\" name=\"tint\">@color/accent</item>");
    }

    #[test]
    fn bags_round_trip() {
        let mut table = table();
        assert_round_trip(
            &mut table,
            "<attr name=\"orientation\" formats=\"integer enum\">\n    <enum name=\"horizontal\">0</enum>\n    <enum name=\"vertical\">1</enum>\n  </attr>"
        );
        assert_round_trip(
            &mut table,
            "<style name=\"Base\">\n    <item name=\"orientation\">vertical</item>\n  </style>"
        );
        assert_round_trip(
            &mut table,
            "<style name=\"Base.Dark\" parent=\"@style/Base\">\n    <item name=\"orientation\">horizontal</item>\n  </style>"
        );
        assert_round_trip(
            &mut table,
            "<plurals name=\"songs\">\n    <item quantity=\"one\">%d <b>song</b></item>\n    <item quantity=\"other\">%d songs</item>\n  </plurals>"
        );
        assert_round_trip(
            &mut table,
            "<array name=\"mixed\">\n    <item>12</item>\n    <item>@style/Base</item>\n    <item>hello</item>\n  </array>"
        );
    }

    fn default_value(table: &ResourceTable, id: ResourceId) -> EntryValue {
        table.resource_entry(id).unwrap().get_default().unwrap().value.clone()
    }

    // Decodes the entry, encodes the resulting element again and checks that
    // the stored value didn't change
    fn assert_value_survives(table: &mut ResourceTable, id: ResourceId) {
        let before = default_value(table, id);
        let entry = table.resource_entry(id).unwrap();
        let mut writer = TreeEntryWriter::new();
        let decoded = decode_entry(&entry, entry.get_default().unwrap(), &mut writer)
            .unwrap()
            .unwrap();
        encode_entry(table, USER_PACKAGE_ID, &decoded, QualifierSet::default()).unwrap();
        assert_eq!(default_value(table, id), before);
    }

    #[test]
    fn flag_values_keep_their_type() {
        let mut table = table();
        let attr = parse_xml(
            "<attr name=\"gravity\" formats=\"flag\"><flag name=\"top\">0x1</flag><flag name=\"left\">0x2</flag></attr>"
                .as_bytes()
        )
        .unwrap();
        encode_entry(&mut table, USER_PACKAGE_ID, &attr, QualifierSet::default()).unwrap();

        let numeric = parse_xml("<style name=\"S\"><item name=\"gravity\">3</item></style>".as_bytes()).unwrap();
        let id = encode_entry(&mut table, USER_PACKAGE_ID, &numeric, QualifierSet::default()).unwrap();
        let EntryValue::Bag(bag) = default_value(&table, id) else {
            panic!("style without a bag");
        };
        assert_eq!(bag.children[0].value_type, ValueType::DecimalInteger);
        assert_value_survives(&mut table, id);

        let named =
            parse_xml("<style name=\"T\"><item name=\"gravity\">top|left</item></style>".as_bytes()).unwrap();
        let id = encode_entry(&mut table, USER_PACKAGE_ID, &named, QualifierSet::default()).unwrap();
        assert_value_survives(&mut table, id);
    }

    #[test]
    fn array_variants_share_a_type() {
        let mut table = table();
        let element = parse_xml("<integer-array name=\"n\"><item>1</item></integer-array>".as_bytes()).unwrap();
        let id = encode_entry(&mut table, USER_PACKAGE_ID, &element, QualifierSet::default()).unwrap();
        assert_eq!(table.resource_entry(id).unwrap().type_name(), Some("array"));
    }

    #[test]
    fn unknown_elements_are_rejected() {
        let mut table = table();
        let element = parse_xml("<declare-styleable name=\"View\"/>".as_bytes()).unwrap();
        assert!(matches!(
            encode_entry(&mut table, USER_PACKAGE_ID, &element, QualifierSet::default()),
            Err(ArscError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn failed_encodes_declare_nothing() {
        let mut table = table();
        let element = parse_xml("<integer name=\"n\">many</integer>".as_bytes()).unwrap();
        let err = encode_entry(&mut table, USER_PACKAGE_ID, &element, QualifierSet::default());
        assert!(matches!(err, Err(ArscError::CoercionFailure { index: 0, .. })));
        let package = table.package(USER_PACKAGE_ID).unwrap();
        assert_eq!(package.resolve_local_resource_id("integer", "n"), None);
    }

    #[test]
    fn public_xml_lists_ids() {
        let mut table = table();
        let element = parse_xml("<bool name=\"enabled\">true</bool>".as_bytes()).unwrap();
        let id = encode_entry(&mut table, USER_PACKAGE_ID, &element, QualifierSet::default()).unwrap();
        let mut writer = TreeEntryWriter::new();
        let public = write_public_xml(&table.resource_entry(id).unwrap(), &mut writer)
            .unwrap()
            .unwrap();
        assert_eq!(
            public,
            XmlElement::new("public")
                .with_attribute("type", "bool")
                .with_attribute("name", "enabled")
                .with_attribute("id", "0x7f010000")
        );
    }
}
