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

// Types that are used internally to describe Resources
use std::{collections::BTreeSet, fmt};

use arsc_common::*;
use deku::prelude::*;

use crate::{
    attribute_types::AttributeType,
    resource_external_types::{
        ResStringPoolRef, ResValue, TableEntry, TableEntryHeader, TableMap, TableMapEntry,
        TableMapEntryHeader, ValueType, TABLE_ENTRY_FLAG_COMPLEX, TABLE_ENTRY_SIZE,
        TABLE_MAP_ENTRY_SIZE, TABLE_MAP_SIZE, UINT32_MINUS_ONE
    }
};

/// Keys of unnamed array items are `ARRAY_ITEM_BASE_ID + position`, the same
/// convention AAPT uses when an array's source doesn't name its items.
pub const ARRAY_ITEM_BASE_ID: u32 = 0x0100_0001;

pub fn array_item_key(position: usize) -> u32 {
    ARRAY_ITEM_BASE_ID + position as u32
}

/// `0xPPTTEEEE`: package id, type id (1-based) and entry id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub fn new(package_id: u8, type_id: u8, entry_id: u16) -> Self {
        ResourceId(((package_id as u32) << 24) | ((type_id as u32) << 16) | entry_id as u32)
    }

    pub fn package_id(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn type_id(&self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    pub fn entry_id(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// The device configuration an [Entry] is specialised for.
///
/// This codec never looks inside a configuration; it only needs equality and
/// the "equal or more specific than" partial order that resource selection is
/// built on.
pub trait ResConfig: Clone + PartialEq + fmt::Debug {
    /// A configuration without any qualifiers.
    fn is_default(&self) -> bool;

    fn is_equal_or_more_specific_than(&self, other: &Self) -> bool;
}

/// A configuration described by a set of qualifier tokens, eg.
/// `{land, v21}`. One set is equal to or more specific than another when it
/// contains all of the other's qualifiers. Platform versions (`v21`) are
/// minimums instead: `v21` satisfies a request for `v30`, and a set without a
/// version satisfies any version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QualifierSet {
    qualifiers: BTreeSet<String>
}

impl QualifierSet {
    pub fn new<I, S>(qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        QualifierSet {
            qualifiers: qualifiers.into_iter().map(Into::into).collect()
        }
    }

    /// Splits `land-v21` into its tokens. This does not validate or
    /// normalise anything.
    pub fn from_dashed(qualifiers: &str) -> Self {
        QualifierSet::new(qualifiers.split('-').filter(|q| !q.is_empty()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.qualifiers.iter().map(|q| &q[..])
    }

    pub fn version(&self) -> Option<u32> {
        self.qualifiers.iter().find_map(|q| parse_version(q))
    }
}

fn parse_version(qualifier: &str) -> Option<u32> {
    qualifier.strip_prefix('v')?.parse().ok()
}

impl ResConfig for QualifierSet {
    fn is_default(&self) -> bool {
        self.qualifiers.is_empty()
    }

    fn is_equal_or_more_specific_than(&self, other: &Self) -> bool {
        let version_satisfied = match (self.version(), other.version()) {
            (Some(ours), Some(requested)) => ours <= requested,
            _ => true
        };
        version_satisfied
            && other
                .qualifiers
                .iter()
                .filter(|q| parse_version(q).is_none())
                .all(|q| self.qualifiers.contains(q))
    }
}

/// One key/value slot of a [Bag].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResValueMap {
    /// An attribute or `id` resource id, a reserved [AttributeType] id, or an
    /// array position (see [array_item_key]).
    pub key: u32,
    pub value_type: ValueType,
    pub data: u32
}

impl ResValueMap {
    pub fn new(key: u32, value_type: ValueType, data: u32) -> Self {
        ResValueMap {
            key,
            value_type,
            data
        }
    }

    pub fn attribute_type(&self) -> Option<AttributeType> {
        AttributeType::from_id(self.key)
    }

    pub fn value(&self) -> ResValue {
        ResValue::new(self.value_type, self.data)
    }

    pub fn set_value(&mut self, value: ResValue) {
        self.value_type = value.data_type;
        self.data = value.data;
    }
}

impl Default for ResValueMap {
    fn default() -> Self {
        ResValueMap::new(0, ValueType::Null, 0)
    }
}

/// A complex value: an optional parent style and an ordered list of slots.
///
/// Order is meaningful for arrays and plurals and insignificant for styles
/// and attribute declarations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bag {
    /// Resource id of the parent style, 0 if none
    pub parent_id: u32,
    pub children: Vec<ResValueMap>
}

impl Bag {
    pub fn new() -> Self {
        Bag::default()
    }

    /// A bag with `count` empty slots, ready for an encoder to fill in.
    pub fn with_slots(count: usize) -> Self {
        Bag {
            parent_id: 0,
            children: vec![ResValueMap::default(); count]
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResValueMap> {
        self.children.iter()
    }

    pub fn slot_mut(&mut self, index: usize) -> Result<&mut ResValueMap> {
        let count = self.children.len();
        self.children
            .get_mut(index)
            .ok_or(ArscError::SlotOutOfRange { index, count })
    }

    pub fn get_by_type(&self, attribute_type: AttributeType) -> Option<&ResValueMap> {
        self.children
            .iter()
            .find(|child| child.attribute_type() == Some(attribute_type))
    }

    /// Attribute declarations always carry a [AttributeType::Formats] slot.
    pub fn is_attribute_shaped(&self) -> bool {
        self.get_by_type(AttributeType::Formats).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    Scalar(ResValue),
    Bag(Bag)
}

impl Default for EntryValue {
    fn default() -> Self {
        EntryValue::Scalar(ResValue::null())
    }
}

/// One configuration-specific record of a resource.
///
/// The name is an index into the owning package's key strings, so entries of
/// the same resource in different configurations can share one string.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<C: ResConfig = QualifierSet> {
    resource_id: ResourceId,
    config: C,
    name: Option<ResStringPoolRef>,
    pub value: EntryValue
}

impl<C: ResConfig> Entry<C> {
    pub fn new(resource_id: ResourceId, config: C) -> Self {
        Entry {
            resource_id,
            config,
            name: None,
            value: EntryValue::default()
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn is_default(&self) -> bool {
        self.config.is_default()
    }

    /// Index of the name in the package's key strings.
    pub fn name_ref(&self) -> Option<ResStringPoolRef> {
        self.name
    }

    pub fn set_name_ref(&mut self, name: ResStringPoolRef) {
        self.name = Some(name);
    }

    pub fn bag(&self) -> Option<&Bag> {
        match &self.value {
            EntryValue::Bag(bag) => Some(bag),
            EntryValue::Scalar(_) => None
        }
    }

    pub fn bag_mut(&mut self) -> Option<&mut Bag> {
        match &mut self.value {
            EntryValue::Bag(bag) => Some(bag),
            EntryValue::Scalar(_) => None
        }
    }

    /// Serialises this entry as a `ResTable_entry`, or a `ResTable_map_entry`
    /// when it holds a bag.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let key = self.name.unwrap_or(UINT32_MINUS_ONE);
        Ok(match &self.value {
            EntryValue::Scalar(value) => TableEntry {
                size: TABLE_ENTRY_SIZE,
                flags: 0,
                key,
                value: *value
            }
            .to_bytes()?,
            EntryValue::Bag(bag) => TableMapEntry {
                size: TABLE_MAP_ENTRY_SIZE,
                flags: TABLE_ENTRY_FLAG_COMPLEX,
                key,
                parent: bag.parent_id,
                count: bag.children.len() as u32,
                items: bag
                    .children
                    .iter()
                    .map(|child| TableMap {
                        name: child.key,
                        value: child.value()
                    })
                    .collect()
            }
            .to_bytes()?
        })
    }

    pub fn from_bytes(bytes: &[u8], resource_id: ResourceId, config: C) -> Result<Self> {
        let (_, header) = TableEntryHeader::from_bytes((bytes, 0))?;
        let name = if header.key == UINT32_MINUS_ONE {
            None
        } else {
            Some(header.key)
        };
        let value = if header.flags & TABLE_ENTRY_FLAG_COMPLEX != 0 {
            let (_, map_header) = TableMapEntryHeader::from_bytes((bytes, 0))?;
            let available = bytes.len().saturating_sub(TABLE_MAP_ENTRY_SIZE as usize) as u64;
            if map_header.count as u64 * TABLE_MAP_SIZE as u64 > available {
                return Err(ArscError::MalformedChunk(format!(
                    "map entry claims {} items, {available} bytes follow",
                    map_header.count
                )));
            }
            let (_, map_entry) = TableMapEntry::from_bytes((bytes, 0))?;
            EntryValue::Bag(Bag {
                parent_id: map_entry.parent,
                children: map_entry
                    .items
                    .iter()
                    .map(|item| ResValueMap::new(item.name, item.value.data_type, item.value.data))
                    .collect()
            })
        } else {
            let (_, entry) = TableEntry::from_bytes((bytes, 0))?;
            EntryValue::Scalar(entry.value)
        };
        Ok(Entry {
            resource_id,
            config,
            name,
            value
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_parts() {
        let id = ResourceId::new(0x7F, 0x03, 0x0012);
        assert_eq!(id.0, 0x7F03_0012);
        assert_eq!(id.package_id(), 0x7F);
        assert_eq!(id.type_id(), 0x03);
        assert_eq!(id.entry_id(), 0x0012);
        assert_eq!(id.to_string(), "0x7f030012");
    }

    #[test]
    fn qualifier_sets_order_by_inclusion() {
        let land = QualifierSet::from_dashed("land");
        let land_v21 = QualifierSet::from_dashed("land-v21");
        assert!(QualifierSet::default().is_default());
        assert!(land_v21.is_equal_or_more_specific_than(&land));
        assert!(land.is_equal_or_more_specific_than(&land));
        assert!(!QualifierSet::default().is_equal_or_more_specific_than(&land));
        assert!(!QualifierSet::from_dashed("port").is_equal_or_more_specific_than(&land));
    }

    #[test]
    fn versions_are_minimums() {
        let land_v21 = QualifierSet::from_dashed("land-v21");
        let land_v30 = QualifierSet::from_dashed("land-v30");
        assert_eq!(land_v21.version(), Some(21));
        assert!(land_v21.is_equal_or_more_specific_than(&land_v30));
        assert!(!land_v30.is_equal_or_more_specific_than(&land_v21));
        assert!(QualifierSet::from_dashed("land").is_equal_or_more_specific_than(&land_v30));
        // Not a version
        assert_eq!(QualifierSet::from_dashed("vrheadset").version(), None);
    }

    #[test]
    fn slots_are_bounds_checked() {
        let mut bag = Bag::with_slots(2);
        assert!(bag.slot_mut(1).is_ok());
        assert!(matches!(
            bag.slot_mut(2),
            Err(ArscError::SlotOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn array_keys_start_after_base() {
        assert_eq!(array_item_key(0), 0x0100_0001);
        assert_eq!(array_item_key(2), 0x0100_0003);
    }

    #[test]
    fn map_entry_layout() {
        let mut entry = Entry::new(ResourceId(0x7F02_0000), QualifierSet::default());
        entry.set_name_ref(3);
        entry.value = EntryValue::Bag(Bag {
            parent_id: 0x7F02_0001,
            children: vec![ResValueMap::new(0x7F01_0000, ValueType::DecimalInteger, 7)]
        });
        let bytes = entry.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16 + 12);
        assert_eq!(&bytes[0..4], &[0x10, 0x00, 0x01, 0x00]);
        assert_eq!(&bytes[20..24], &[0x08, 0x00, 0x00, 0x10]);

        let parsed = Entry::from_bytes(&bytes, entry.resource_id(), QualifierSet::default()).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn map_entry_count_must_fit() {
        let mut bytes = vec![0x10, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        assert!(matches!(
            Entry::from_bytes(&bytes, ResourceId(0x7F02_0000), QualifierSet::default()),
            Err(ArscError::MalformedChunk(_))
        ));
        // Two items claimed, one present
        let mut bytes = vec![0x10, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0x00, 0x00, 0x01, 0x7F, 0x08, 0x00, 0x00, 0x10, 0x05, 0x00, 0x00, 0x00]);
        assert!(matches!(
            Entry::from_bytes(&bytes, ResourceId(0x7F02_0000), QualifierSet::default()),
            Err(ArscError::MalformedChunk(_))
        ));
    }

    #[test]
    fn scalar_entry_without_name() {
        let mut entry = Entry::new(ResourceId(0x7F03_0000), QualifierSet::from_dashed("land"));
        entry.value = EntryValue::Scalar(ResValue::new(ValueType::BooleanInteger, 0xFFFF_FFFF));
        let bytes = entry.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[4..8], &[0xFF, 0xFF, 0xFF, 0xFF]);
        let parsed = Entry::from_bytes(&bytes, entry.resource_id(), entry.config().clone()).unwrap();
        assert_eq!(parsed.name_ref(), None);
        assert_eq!(parsed.value, entry.value);
    }
}
