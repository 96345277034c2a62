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

// Conversions between literal text and typed 32-bit values. Nothing in here
// needs a resource table, references and strings are resolved by the table.
use crate::resource_external_types::{ResValue, ValueType};

pub const NULL_DATA_UNDEFINED: u32 = 0;
pub const NULL_DATA_EMPTY: u32 = 1;

const COMPLEX_UNIT_MASK: u32 = 0xF;
const COMPLEX_RADIX_SHIFT: u32 = 4;
const COMPLEX_RADIX_MASK: u32 = 0x3;
const COMPLEX_MANTISSA_SHIFT: u32 = 8;
const COMPLEX_MANTISSA_MASK: u32 = 0xFF_FFFF;
// Indexed by radix: 23p0, 16p7, 8p15, 0p23
const COMPLEX_RADIX_MULTS: [f32; 4] = [
    1.0 / (1 << 8) as f32,
    1.0 / (1 << 15) as f32,
    1.0 / (1 << 23) as f32,
    1.0 / (1u64 << 31) as f32
];

// Longer suffixes first so that "dip" isn't mistaken for "p"-something
const DIMENSION_UNITS: &[(&str, u32)] = &[
    ("dip", 1),
    ("px", 0),
    ("dp", 1),
    ("sp", 2),
    ("pt", 3),
    ("in", 4),
    ("mm", 5)
];
const DIMENSION_UNIT_NAMES: [&str; 6] = ["px", "dp", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: &[(&str, u32)] = &[("%p", 1), ("%", 0)];
const FRACTION_UNIT_NAMES: [&str; 2] = ["%", "%p"];

/// Generic literal coercion, as used where the context doesn't force a type.
/// Tries null, color, boolean, integer, dimension, fraction and float in that
/// order. References are not handled here.
pub fn encode(text: &str) -> Option<ResValue> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    encode_null(text)
        .or_else(|| encode_color(text))
        .or_else(|| encode_boolean(text))
        .or_else(|| encode_integer(text))
        .or_else(|| encode_dimension(text))
        .or_else(|| encode_fraction(text))
        .or_else(|| encode_float(text))
}

pub fn encode_null(text: &str) -> Option<ResValue> {
    match text {
        "@null" => Some(ResValue::new(ValueType::Null, NULL_DATA_UNDEFINED)),
        "@empty" => Some(ResValue::new(ValueType::Null, NULL_DATA_EMPTY)),
        _ => None
    }
}

pub fn encode_boolean(text: &str) -> Option<ResValue> {
    match text {
        "true" => Some(ResValue::new(ValueType::BooleanInteger, 0xFFFF_FFFF)),
        "false" => Some(ResValue::new(ValueType::BooleanInteger, 0)),
        _ => None
    }
}

/// Decimal (`-12`) or hexadecimal (`0x1F`) integers. Anything between
/// `i32::MIN` and `u32::MAX` is accepted.
pub fn encode_integer(text: &str) -> Option<ResValue> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if hex.is_empty() || hex.len() > 8 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return u32::from_str_radix(hex, 16)
            .ok()
            .map(|data| ResValue::new(ValueType::HexInteger, data));
    }
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value = text.parse::<i64>().ok()?;
    if value < i32::MIN as i64 || value > u32::MAX as i64 {
        return None;
    }
    Some(ResValue::new(ValueType::DecimalInteger, value as u32))
}

/// `#rgb`, `#argb`, `#rrggbb` or `#aarrggbb`. The data always holds the full
/// ARGB8 value, the type remembers how it was written.
pub fn encode_color(text: &str) -> Option<ResValue> {
    let hex = text.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    let expand = |nibble: u32| (nibble << 4) | nibble;
    match hex.len() {
        3 => Some(ResValue::new(
            ValueType::ColorRgb4,
            0xFF00_0000
                | expand((value >> 8) & 0xF) << 16
                | expand((value >> 4) & 0xF) << 8
                | expand(value & 0xF)
        )),
        4 => Some(ResValue::new(
            ValueType::ColorArgb4,
            expand((value >> 12) & 0xF) << 24
                | expand((value >> 8) & 0xF) << 16
                | expand((value >> 4) & 0xF) << 8
                | expand(value & 0xF)
        )),
        6 => Some(ResValue::new(ValueType::ColorRgb8, 0xFF00_0000 | value)),
        8 => Some(ResValue::new(ValueType::ColorArgb8, value)),
        _ => None
    }
}

pub fn encode_dimension(text: &str) -> Option<ResValue> {
    encode_complex(text, DIMENSION_UNITS, 1.0).map(|data| ResValue::new(ValueType::Dimension, data))
}

pub fn encode_fraction(text: &str) -> Option<ResValue> {
    encode_complex(text, FRACTION_UNITS, 100.0).map(|data| ResValue::new(ValueType::Fraction, data))
}

fn encode_complex(text: &str, units: &[(&str, u32)], divisor: f32) -> Option<u32> {
    let (number, unit) = units
        .iter()
        .find_map(|(suffix, unit)| text.strip_suffix(suffix).map(|number| (number, *unit)))?;
    let value = parse_float(number)? / divisor;
    float_to_complex(value).map(|complex| complex | unit)
}

pub fn encode_float(text: &str) -> Option<ResValue> {
    parse_float(text).map(|value| ResValue::new(ValueType::Float, value.to_bits()))
}

// Rust happily parses "inf" and "NaN", resource values don't
fn parse_float(text: &str) -> Option<f32> {
    let text = text.trim();
    if !text.chars().any(|c| c.is_ascii_digit())
        || !text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    text.parse::<f32>().ok().filter(|value| value.is_finite())
}

/// Packs a float into the 24-bit mantissa and radix of a complex value, the
/// same way AAPT does. The unit bits are left at 0.
pub fn float_to_complex(value: f32) -> Option<u32> {
    if !value.is_finite() || value.abs() >= (1 << 23) as f32 {
        return None;
    }
    let negative = value < 0.0;
    let bits = (value.abs() as f64 * (1u64 << 23) as f64 + 0.5) as u64;
    let (radix, shift) = if bits & 0x7F_FFFF == 0 {
        (0, 23)
    } else if bits & 0xFFFF_FFFF_FF80_0000 == 0 {
        (3, 0)
    } else if bits & 0xFFFF_FFFF_8000_0000 == 0 {
        (2, 8)
    } else if bits & 0xFFFF_FF80_0000_0000 == 0 {
        (1, 16)
    } else {
        (0, 23)
    };
    let mut mantissa = ((bits >> shift) as u32) & COMPLEX_MANTISSA_MASK;
    if negative {
        mantissa = mantissa.wrapping_neg() & COMPLEX_MANTISSA_MASK;
    }
    Some((radix << COMPLEX_RADIX_SHIFT) | (mantissa << COMPLEX_MANTISSA_SHIFT))
}

pub fn complex_to_float(complex: u32) -> f32 {
    let mantissa = (complex & (COMPLEX_MANTISSA_MASK << COMPLEX_MANTISSA_SHIFT)) as i32;
    mantissa as f32
        * COMPLEX_RADIX_MULTS[((complex >> COMPLEX_RADIX_SHIFT) & COMPLEX_RADIX_MASK) as usize]
}

// Always keeps a fractional part, so that "16.0" doesn't read back as an integer
fn format_float(value: f32) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains(['.', 'e', 'E']) {
        format!("{text}.0")
    } else {
        text
    }
}

/// Renders types that don't need a resource table. Returns `None` for
/// references and strings.
pub fn decode(value_type: ValueType, data: u32) -> Option<String> {
    Some(match value_type {
        ValueType::Null => {
            if data == NULL_DATA_EMPTY {
                "@empty".into()
            } else {
                "@null".into()
            }
        }
        ValueType::DecimalInteger => (data as i32).to_string(),
        ValueType::HexInteger => format!("0x{data:08x}"),
        ValueType::BooleanInteger => (data != 0).to_string(),
        ValueType::Float => format_float(f32::from_bits(data)),
        ValueType::Dimension => {
            let unit = DIMENSION_UNIT_NAMES.get((data & COMPLEX_UNIT_MASK) as usize)?;
            format!("{}{unit}", format_float(complex_to_float(data)))
        }
        ValueType::Fraction => {
            let unit = FRACTION_UNIT_NAMES.get((data & COMPLEX_UNIT_MASK) as usize)?;
            format!("{}{unit}", format_float(complex_to_float(data) * 100.0))
        }
        ValueType::ColorArgb8 => format!("#{data:08x}"),
        ValueType::ColorRgb8 => format!("#{:06x}", data & 0xFF_FFFF),
        ValueType::ColorArgb4 => format!(
            "#{:x}{:x}{:x}{:x}",
            (data >> 28) & 0xF,
            (data >> 20) & 0xF,
            (data >> 12) & 0xF,
            (data >> 4) & 0xF
        ),
        ValueType::ColorRgb4 => format!(
            "#{:x}{:x}{:x}",
            (data >> 20) & 0xF,
            (data >> 12) & 0xF,
            (data >> 4) & 0xF
        ),
        ValueType::Reference
        | ValueType::Attribute
        | ValueType::DynamicReference
        | ValueType::DynamicAttribute
        | ValueType::String => return None
    })
}

fn parse_hex_id(text: &str) -> Option<u32> {
    let hex = text.strip_prefix("0x")?;
    if hex.len() != 8 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// `@0x7f010000` or `?0x7f010000`: a reference whose target isn't known to
/// the table.
pub fn encode_unknown_resource_id(text: &str) -> Option<ResValue> {
    if let Some(hex) = text.strip_prefix('@') {
        parse_hex_id(hex).map(|id| ResValue::new(ValueType::Reference, id))
    } else if let Some(hex) = text.strip_prefix('?') {
        parse_hex_id(hex).map(|id| ResValue::new(ValueType::Attribute, id))
    } else {
        None
    }
}

pub fn decode_unknown_resource_id(is_reference: bool, resource_id: u32) -> String {
    let prefix = if is_reference { '@' } else { '?' };
    format!("{prefix}0x{resource_id:08x}")
}

/// Bag keys that can't be named are written as `@0x01010098`.
pub fn encode_unknown_name_id(name: &str) -> Option<u32> {
    parse_hex_id(name.strip_prefix('@')?)
}

pub fn decode_unknown_name_id(id: u32) -> String {
    format!("@0x{id:08x}")
}

/// Makes a string survive being read back as a resource value: strings that
/// would be mistaken for references get a backslash, strings that would be
/// coerced to another type (or lose surrounding whitespace) get quoted.
pub fn escape_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c)
        }
    }
    if text.starts_with(['@', '?']) {
        format!("\\{escaped}")
    } else if encode(text).is_some() || text.trim() != text {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

/// Inverse of [escape_string]: strips one pair of surrounding double quotes
/// and resolves backslash escapes.
pub fn unescape_unquote(text: &str) -> String {
    let inner = if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        &text[1..text.len() - 1]
    } else {
        text
    };
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => result.push(decoded),
                    None => {
                        result.push_str("\\u");
                        result.push_str(&code);
                    }
                }
            }
            Some(other) => result.push(other),
            None => result.push('\\')
        }
    }
    result
}
