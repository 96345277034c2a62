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

// Reserved bag keys and the format bitmask of attribute declarations.
use arsc_common::{ArscError, Result};
use phf::phf_map;

/// Bag keys in the `0x0100_00xx` range don't reference a resource, they give
/// the slot a fixed meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Formats,
    Min,
    Max,
    L10n,
    Other,
    Zero,
    One,
    Two,
    Few,
    Many
}

const ATTRIBUTE_TYPE_MAGIC: u32 = 0x0100_0000;

static ATTRIBUTE_TYPE_NAMES: phf::Map<&'static str, AttributeType> = phf_map! {
    "formats" => AttributeType::Formats,
    "min" => AttributeType::Min,
    "max" => AttributeType::Max,
    "localization" => AttributeType::L10n,
    "other" => AttributeType::Other,
    "zero" => AttributeType::Zero,
    "one" => AttributeType::One,
    "two" => AttributeType::Two,
    "few" => AttributeType::Few,
    "many" => AttributeType::Many,
};

impl AttributeType {
    pub const ALL: [AttributeType; 10] = [
        AttributeType::Formats,
        AttributeType::Min,
        AttributeType::Max,
        AttributeType::L10n,
        AttributeType::Other,
        AttributeType::Zero,
        AttributeType::One,
        AttributeType::Two,
        AttributeType::Few,
        AttributeType::Many
    ];

    pub fn id(&self) -> u32 {
        ATTRIBUTE_TYPE_MAGIC | *self as u32
    }

    pub fn from_id(id: u32) -> Option<AttributeType> {
        if id & 0xFFFF_0000 != ATTRIBUTE_TYPE_MAGIC {
            return None;
        }
        AttributeType::ALL.get((id & 0xFFFF) as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeType::Formats => "formats",
            AttributeType::Min => "min",
            AttributeType::Max => "max",
            AttributeType::L10n => "localization",
            AttributeType::Other => "other",
            AttributeType::Zero => "zero",
            AttributeType::One => "one",
            AttributeType::Two => "two",
            AttributeType::Few => "few",
            AttributeType::Many => "many"
        }
    }

    pub fn from_name(name: &str) -> Option<AttributeType> {
        ATTRIBUTE_TYPE_NAMES.get(name).copied()
    }

    /// Plural quantities, as opposed to the attribute declaration slots.
    pub fn is_plural(&self) -> bool {
        matches!(
            self,
            AttributeType::Other
                | AttributeType::Zero
                | AttributeType::One
                | AttributeType::Two
                | AttributeType::Few
                | AttributeType::Many
        )
    }
}

/// The value kinds an `<attr>` declaration accepts, stored as a bitmask in
/// the payload of its [AttributeType::Formats] slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeDataFormat {
    Reference,
    String,
    Integer,
    Boolean,
    Color,
    Float,
    Dimension,
    Fraction,
    Enum,
    Flag
}

static ATTRIBUTE_DATA_FORMAT_NAMES: phf::Map<&'static str, AttributeDataFormat> = phf_map! {
    "reference" => AttributeDataFormat::Reference,
    "string" => AttributeDataFormat::String,
    "integer" => AttributeDataFormat::Integer,
    "boolean" => AttributeDataFormat::Boolean,
    "color" => AttributeDataFormat::Color,
    "float" => AttributeDataFormat::Float,
    "dimension" => AttributeDataFormat::Dimension,
    "fraction" => AttributeDataFormat::Fraction,
    "enum" => AttributeDataFormat::Enum,
    "flag" => AttributeDataFormat::Flag,
    // Spelling used by hand-written values XML
    "flags" => AttributeDataFormat::Flag,
};

impl AttributeDataFormat {
    // Declaration order, which is also the order formats are written in
    pub const ALL: [AttributeDataFormat; 10] = [
        AttributeDataFormat::Reference,
        AttributeDataFormat::String,
        AttributeDataFormat::Integer,
        AttributeDataFormat::Boolean,
        AttributeDataFormat::Color,
        AttributeDataFormat::Float,
        AttributeDataFormat::Dimension,
        AttributeDataFormat::Fraction,
        AttributeDataFormat::Enum,
        AttributeDataFormat::Flag
    ];

    pub fn mask(&self) -> u32 {
        match self {
            AttributeDataFormat::Reference => 1 << 0,
            AttributeDataFormat::String => 1 << 1,
            AttributeDataFormat::Integer => 1 << 2,
            AttributeDataFormat::Boolean => 1 << 3,
            AttributeDataFormat::Color => 1 << 4,
            AttributeDataFormat::Float => 1 << 5,
            AttributeDataFormat::Dimension => 1 << 6,
            AttributeDataFormat::Fraction => 1 << 7,
            AttributeDataFormat::Enum => 1 << 16,
            AttributeDataFormat::Flag => 1 << 17
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeDataFormat::Reference => "reference",
            AttributeDataFormat::String => "string",
            AttributeDataFormat::Integer => "integer",
            AttributeDataFormat::Boolean => "boolean",
            AttributeDataFormat::Color => "color",
            AttributeDataFormat::Float => "float",
            AttributeDataFormat::Dimension => "dimension",
            AttributeDataFormat::Fraction => "fraction",
            AttributeDataFormat::Enum => "enum",
            AttributeDataFormat::Flag => "flag"
        }
    }

    pub fn from_name(name: &str) -> Option<AttributeDataFormat> {
        ATTRIBUTE_DATA_FORMAT_NAMES.get(name).copied()
    }

    /// Every format whose bit is set in `data`, in declaration order.
    pub fn decode_value_types(data: u32) -> Vec<AttributeDataFormat> {
        AttributeDataFormat::ALL
            .iter()
            .filter(|format| data & format.mask() != 0)
            .copied()
            .collect()
    }

    /// Space separated format names, `None` if there are none.
    pub fn to_string(formats: &[AttributeDataFormat]) -> Option<String> {
        if formats.is_empty() {
            return None;
        }
        let names: Vec<&str> = formats.iter().map(|format| format.name()).collect();
        Some(names.join(" "))
    }

    /// Inverse of [AttributeDataFormat::to_string]. `|` is accepted as a
    /// separator too, since that's what values XML uses.
    pub fn parse_mask(text: &str) -> Result<u32> {
        let mut mask = 0;
        for name in text
            .split(|c: char| c == '|' || c.is_whitespace())
            .filter(|name| !name.is_empty())
        {
            let format = AttributeDataFormat::from_name(name)
                .ok_or_else(|| ArscError::LookupFailure(format!("attribute format {name}")))?;
            mask |= format.mask();
        }
        Ok(mask)
    }

    /// Whether members of an attribute with these formats are `<enum>` or
    /// `<flag>`.
    pub fn type_of_bag(data: u32) -> Option<AttributeDataFormat> {
        if data & AttributeDataFormat::Enum.mask() != 0 {
            Some(AttributeDataFormat::Enum)
        } else if data & AttributeDataFormat::Flag.mask() != 0 {
            Some(AttributeDataFormat::Flag)
        } else {
            None
        }
    }
}
