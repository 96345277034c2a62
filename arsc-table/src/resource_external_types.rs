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

// Types that Android/APKs themselves use to describe resources
use std::fmt;

use deku::prelude::*;

#[derive(Debug, PartialEq, DekuWrite)]
pub struct ResChunk {
    pub header: ResChunkHeader,
    pub data: Vec<u8>
}

pub const RES_CHUNK_HEADER_SIZE: u32 = 8;
pub const UINT32_MINUS_ONE: u32 = 0xFFFFFFFF;
// Either a string index or UINT32_MINUS_ONE if empty
pub type ResStringPoolRef = u32;

#[derive(Debug, PartialEq, DekuRead, DekuWrite)]
pub struct ResChunkHeader {
    pub chunk_type: ChunkType,
    pub header_size: u16,
    // Includes both this header and the data that follows
    pub chunk_size: u32
}

/// `Res_value`: a single typed 32-bit value.
#[derive(Debug, PartialEq, Eq, Clone, Copy, DekuRead, DekuWrite)]
pub struct ResValue {
    pub size: u16,
    // Always 0
    pub res0: u8,
    pub data_type: ValueType,
    pub data: u32
}

impl ResValue {
    pub const SIZE: u16 = 8;

    pub fn new(data_type: ValueType, data: u32) -> Self {
        ResValue {
            size: Self::SIZE,
            res0: 0,
            data_type,
            data
        }
    }

    pub fn null() -> Self {
        ResValue::new(ValueType::Null, 0)
    }
}

impl Default for ResValue {
    fn default() -> Self {
        ResValue::null()
    }
}

#[derive(Debug, PartialEq, Eq, Hash, DekuRead, DekuWrite, Clone, Copy)]
#[deku(id_type = "u8")]
pub enum ValueType {
    #[deku(id = 0x00)]
    Null,
    #[deku(id = 0x01)]
    Reference,
    #[deku(id = 0x02)]
    Attribute,
    #[deku(id = 0x03)]
    String,
    #[deku(id = 0x04)]
    Float,
    #[deku(id = 0x05)]
    Dimension,
    #[deku(id = 0x06)]
    Fraction,
    #[deku(id = 0x07)]
    DynamicReference,
    #[deku(id = 0x08)]
    DynamicAttribute,
    #[deku(id = 0x10)]
    DecimalInteger,
    #[deku(id = 0x11)]
    HexInteger,
    #[deku(id = 0x12)]
    BooleanInteger,
    #[deku(id = 0x1C)]
    ColorArgb8,
    #[deku(id = 0x1D)]
    ColorRgb8,
    #[deku(id = 0x1E)]
    ColorArgb4,
    #[deku(id = 0x1F)]
    ColorRgb4
}

impl ValueType {
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ValueType::Reference
                | ValueType::Attribute
                | ValueType::DynamicReference
                | ValueType::DynamicAttribute
        )
    }

    // Theme attribute references are written with `?` instead of `@`
    pub fn is_attribute_reference(&self) -> bool {
        matches!(self, ValueType::Attribute | ValueType::DynamicAttribute)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// `ResTable_entry` followed by its single `Res_value`.
#[derive(Debug, PartialEq, DekuRead, DekuWrite)]
pub struct TableEntry {
    pub size: u16,
    pub flags: u16,
    pub key: ResStringPoolRef,
    pub value: ResValue
}

pub const TABLE_ENTRY_FLAG_COMPLEX: u16 = 0x0001;
pub const TABLE_ENTRY_SIZE: u16 = 8;
pub const TABLE_MAP_ENTRY_SIZE: u16 = 16;

/// Just the leading `ResTable_entry` fields, enough to tell a scalar entry
/// from a map entry before parsing the rest.
#[derive(Debug, PartialEq, DekuRead)]
pub struct TableEntryHeader {
    pub size: u16,
    pub flags: u16,
    pub key: ResStringPoolRef
}

/// `ResTable_map_entry`: a complex ("bag") entry.
#[derive(Debug, PartialEq, DekuRead, DekuWrite)]
pub struct TableMapEntry {
    pub size: u16,
    pub flags: u16,
    pub key: ResStringPoolRef,
    // Resource id of the parent style, 0 if none
    pub parent: u32,
    pub count: u32,
    #[deku(count = "count")]
    pub items: Vec<TableMap>
}

/// The fixed fields of a [TableMapEntry], read first so that `count` can be
/// checked against the bytes that follow.
#[derive(Debug, PartialEq, DekuRead)]
pub struct TableMapEntryHeader {
    pub size: u16,
    pub flags: u16,
    pub key: ResStringPoolRef,
    pub parent: u32,
    pub count: u32
}

pub const TABLE_MAP_SIZE: u16 = 12;

/// `ResTable_map`: one key/value slot of a bag.
#[derive(Debug, PartialEq, DekuRead, DekuWrite)]
pub struct TableMap {
    pub name: u32,
    pub value: ResValue
}

#[derive(Debug, PartialEq, DekuRead, DekuWrite)]
#[deku(id_type = "u16")]
pub enum ChunkType {
    #[deku(id = 0x0000)]
    Null,
    #[deku(id = 0x0001)]
    StringPool,
    #[deku(id = 0x0002)]
    Table,
    #[deku(id = 0x0003)]
    XmlFile,

    // Types within a Table
    #[deku(id = 0x0200)]
    TablePackage,
    #[deku(id = 0x0201)]
    TableType,
    #[deku(id = 0x0202)]
    TableTypeSpec
}

pub const STRING_POOL_UTF8_FLAG: u32 = 1 << 8;
pub const STRING_POOL_HEADER_SIZE: u32 = 0x1C;
#[derive(Debug, PartialEq, DekuRead, DekuWrite)]
pub struct StringPoolHeader {
    pub string_count: u32,
    pub style_count: u32,
    pub flags: u32,
    pub strings_start: u32,
    pub styles_start: u32
}

// The span list of each style, and the style section itself, end with this
pub const STRING_POOL_SPAN_END: u32 = 0xFFFFFFFF;

