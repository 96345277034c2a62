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

use crate::{generate_res_chunk, resource_external_types::*};
use arsc_common::*;
use deku::prelude::*;

/// One span of markup over a styled string, eg. `<b>` around "World" in
/// "Hello World".
///
/// `tag` is the element name optionally followed by `;name=value` pairs, the
/// same way AAPT records `<font color="#ff0000">` as `font;color=#ff0000`.
/// Character positions count UTF-16 units and `last_char` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSpan {
    pub tag: String,
    pub first_char: u32,
    pub last_char: u32
}

/// A single entry of a [StringPool].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolString {
    pub content: String,
    // Empty unless this is a styled string
    pub style: Vec<StyleSpan>
}

impl PoolString {
    pub fn new(content: &str) -> Self {
        PoolString {
            content: content.to_string(),
            style: vec![]
        }
    }

    pub fn has_style(&self) -> bool {
        !self.style.is_empty()
    }
}

/// Index-addressed string storage. Indices are assigned contiguously and are
/// never reused; strings are only ever replaced in place, never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringPool {
    strings: Vec<PoolString>
}

impl StringPool {
    pub fn new() -> Self {
        StringPool::default()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn get(&self, index: ResStringPoolRef) -> Option<&PoolString> {
        self.strings.get(index as usize)
    }

    pub fn get_str(&self, index: ResStringPoolRef) -> Option<&str> {
        self.get(index).map(|s| &s.content[..])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoolString> {
        self.strings.iter()
    }

    /// Linear search for `content`.
    ///
    /// If the same content is stored at several indices, the first one wins.
    /// Nothing guarantees uniqueness, so callers must not assume the result is
    /// the only index holding `content`.
    pub fn index_of(&self, content: &str) -> Option<ResStringPoolRef> {
        self.strings
            .iter()
            .position(|s| s.content == content)
            .map(|i| i as ResStringPoolRef)
    }

    /// If an unstyled string with this content already exists in the pool,
    /// return its index. If not, add it to the pool and return the new index.
    pub fn get_or_create(&mut self, content: &str) -> ResStringPoolRef {
        if let Some(i) = self
            .strings
            .iter()
            .position(|s| !s.has_style() && s.content == content)
        {
            return i as ResStringPoolRef;
        }
        self.append(PoolString::new(content))
    }

    /// Same as [StringPool::get_or_create], but for a styled string. Span tag
    /// names are themselves stored in the pool, so they are added first.
    pub fn get_or_create_styled(&mut self, content: &str, style: Vec<StyleSpan>) -> ResStringPoolRef {
        if style.is_empty() {
            return self.get_or_create(content);
        }
        for span in &style {
            self.get_or_create(&span.tag);
        }
        let styled = PoolString {
            content: content.to_string(),
            style
        };
        if let Some(i) = self.strings.iter().position(|s| *s == styled) {
            return i as ResStringPoolRef;
        }
        self.append(styled)
    }

    pub fn append(&mut self, string: PoolString) -> ResStringPoolRef {
        let index = self.strings.len() as ResStringPoolRef;
        self.strings.push(string);
        index
    }

    /// Replaces the content at `index`. Everything referencing that index sees
    /// the new content.
    pub fn set(&mut self, index: ResStringPoolRef, content: &str) -> Result<()> {
        let string = self
            .strings
            .get_mut(index as usize)
            .ok_or_else(|| ArscError::LookupFailure(format!("string index {index}")))?;
        string.content = content.to_string();
        Ok(())
    }

    /// Grows the pool with empty placeholders until it holds `size` strings.
    /// Never shrinks.
    pub fn ensure_size(&mut self, size: usize) {
        if self.strings.len() < size {
            self.strings.resize(size, PoolString::default());
        }
    }

    /// Serialises the pool as a UTF-8 `ResStringPool` chunk.
    pub fn to_chunk(&self) -> Result<ResChunk> {
        let mut string_indicies: Vec<u32> = vec![];
        let mut string_data: Vec<u8> = vec![];
        for string in &self.strings {
            let index = string_data.len() as u32;
            string_indicies.push(index);

            // I think normal AAPT2 would fall back to UTF-16 encoding here, since
            // that format has variable length count encoding, but in this case we
            // want to keep the source simple so we will just bail.
            let char_count = string.content.encode_utf16().count();
            let byte_count = string.content.len();
            if byte_count > 0x7FFF {
                return Err(ArscError::StringPoolStringTooLong(string.content.clone()));
            }
            push_utf8_length(&mut string_data, char_count);
            push_utf8_length(&mut string_data, byte_count);

            string_data.extend(string.content.bytes());
            string_data.push(0);
        }

        // String data is a u8 array, but AAPT requires all chunks to fall on
        // 32-bit boundaries. So we need to pad out to an even 4-bytes.
        let padding = (4 - (string_data.len() % 4)) % 4;
        string_data.resize(string_data.len() + padding, 0);

        // Styles are matched to strings by index, so every string up to the
        // last styled one needs an entry, even if it's an empty span list.
        let style_count = self
            .strings
            .iter()
            .rposition(|s| s.has_style())
            .map_or(0, |i| i + 1);
        let mut style_indicies: Vec<u32> = vec![];
        let mut style_data: Vec<u32> = vec![];
        for string in &self.strings[..style_count] {
            style_indicies.push(4 * style_data.len() as u32);
            for span in &string.style {
                let name = self.index_of(&span.tag).ok_or_else(|| {
                    ArscError::MalformedChunk(format!("style tag {} is not pooled", span.tag))
                })?;
                style_data.push(name);
                style_data.push(span.first_char);
                style_data.push(span.last_char);
            }
            style_data.push(STRING_POOL_SPAN_END);
        }
        if style_count > 0 {
            style_data.push(STRING_POOL_SPAN_END);
            style_data.push(STRING_POOL_SPAN_END);
        }

        let strings_start =
            STRING_POOL_HEADER_SIZE + 4 * self.strings.len() as u32 + 4 * style_count as u32;
        let string_pool_header = StringPoolHeader {
            string_count: self.strings.len() as u32,
            style_count: style_count as u32,
            flags: STRING_POOL_UTF8_FLAG,
            strings_start,
            styles_start: if style_count > 0 {
                strings_start + string_data.len() as u32
            } else {
                0
            }
        };
        let string_pool_chunk = StringPoolChunk {
            string_pool_header,
            string_indicies,
            style_indicies,
            string_data,
            style_data
        };

        generate_res_chunk(
            ChunkType::StringPool,
            string_pool_chunk,
            (STRING_POOL_HEADER_SIZE - RES_CHUNK_HEADER_SIZE) as u16,
            0
        )
    }

    /// Parses a `ResStringPool` chunk. Both UTF-8 and UTF-16 pools are
    /// accepted.
    pub fn from_chunk(bytes: &[u8]) -> Result<StringPool> {
        let ((rest, _), chunk_header) = ResChunkHeader::from_bytes((bytes, 0))?;
        if chunk_header.chunk_type != ChunkType::StringPool {
            return Err(ArscError::MalformedChunk(format!(
                "expected a string pool, found {:?}",
                chunk_header.chunk_type
            )));
        }
        if chunk_header.chunk_size as usize > bytes.len() {
            return Err(ArscError::MalformedChunk("string pool is truncated".into()));
        }
        let bytes = &bytes[..chunk_header.chunk_size as usize];
        let (_, header) = StringPoolHeader::from_bytes((rest, 0))?;
        let utf8 = header.flags & STRING_POOL_UTF8_FLAG != 0;

        // Both offset tables have to fit before anything is sized from the counts
        let offsets_start = chunk_header.header_size as usize;
        let offset_count = header.string_count as u64 + header.style_count as u64;
        if offsets_start as u64 + 4 * offset_count > bytes.len() as u64 {
            return Err(ArscError::MalformedChunk(format!(
                "{} strings and {} styles don't fit in {} bytes",
                header.string_count,
                header.style_count,
                bytes.len()
            )));
        }
        let mut strings = Vec::with_capacity(header.string_count as usize);
        for i in 0..header.string_count as usize {
            let offset = read_u32(bytes, offsets_start + 4 * i)?;
            let position = header.strings_start as usize + offset as usize;
            let content = if utf8 {
                read_utf8_string(bytes, position)?
            } else {
                read_utf16_string(bytes, position)?
            };
            strings.push(PoolString {
                content,
                style: vec![]
            });
        }

        let style_offsets_start = offsets_start + 4 * header.string_count as usize;
        for i in 0..header.style_count as usize {
            let offset = read_u32(bytes, style_offsets_start + 4 * i)?;
            let mut position = header.styles_start as usize + offset as usize;
            let mut style = vec![];
            loop {
                let name = read_u32(bytes, position)?;
                if name == STRING_POOL_SPAN_END {
                    break;
                }
                let tag = strings
                    .get(name as usize)
                    .map(|s| s.content.clone())
                    .ok_or_else(|| {
                        ArscError::MalformedChunk(format!("style tag index {name} out of range"))
                    })?;
                style.push(StyleSpan {
                    tag,
                    first_char: read_u32(bytes, position + 4)?,
                    last_char: read_u32(bytes, position + 8)?
                });
                position += 12;
            }
            let string = strings.get_mut(i).ok_or_else(|| {
                ArscError::MalformedChunk(format!("style {i} has no string"))
            })?;
            string.style = style;
        }

        Ok(StringPool { strings })
    }
}

#[derive(Debug, PartialEq, DekuWrite)]
struct StringPoolChunk {
    // Not the same thing as a ResChunkHeader,
    // the format has headers within headers
    string_pool_header: StringPoolHeader,
    string_indicies: Vec<u32>,
    style_indicies: Vec<u32>,
    string_data: Vec<u8>,
    style_data: Vec<u32>
}

// Lengths below 0x80 take one byte, anything else two with the high bit set
fn push_utf8_length(data: &mut Vec<u8>, length: usize) {
    if length < 0x80 {
        data.push(length as u8);
    } else {
        data.push(0x80 | ((length >> 8) & 0x7F) as u8);
        data.push((length & 0xFF) as u8);
    }
}

fn read_u8(bytes: &[u8], position: usize) -> Result<u8> {
    bytes
        .get(position)
        .copied()
        .ok_or_else(|| ArscError::MalformedChunk(format!("read past end at {position}")))
}

fn read_u16(bytes: &[u8], position: usize) -> Result<u16> {
    Ok(u16::from_le_bytes([
        read_u8(bytes, position)?,
        read_u8(bytes, position + 1)?
    ]))
}

fn read_u32(bytes: &[u8], position: usize) -> Result<u32> {
    Ok(u32::from_le_bytes([
        read_u8(bytes, position)?,
        read_u8(bytes, position + 1)?,
        read_u8(bytes, position + 2)?,
        read_u8(bytes, position + 3)?
    ]))
}

// Returns the decoded length and how many bytes it took up
fn read_utf8_length(bytes: &[u8], position: usize) -> Result<(usize, usize)> {
    let first = read_u8(bytes, position)? as usize;
    if first & 0x80 == 0 {
        return Ok((first, 1));
    }
    let second = read_u8(bytes, position + 1)? as usize;
    Ok((((first & 0x7F) << 8) | second, 2))
}

fn read_utf8_string(bytes: &[u8], position: usize) -> Result<String> {
    // The UTF-16 length comes first, but only the byte length matters here
    let (_, skip) = read_utf8_length(bytes, position)?;
    let (byte_count, size) = read_utf8_length(bytes, position + skip)?;
    let start = position + skip + size;
    let raw = bytes
        .get(start..start + byte_count)
        .ok_or_else(|| ArscError::MalformedChunk(format!("string at {position} is truncated")))?;
    String::from_utf8(raw.to_vec())
        .map_err(|_e| ArscError::MalformedChunk(format!("string at {position} is not UTF-8")))
}

fn read_utf16_string(bytes: &[u8], position: usize) -> Result<String> {
    let first = read_u16(bytes, position)? as usize;
    let (unit_count, start) = if first & 0x8000 == 0 {
        (first, position + 2)
    } else {
        let second = read_u16(bytes, position + 2)? as usize;
        (((first & 0x7FFF) << 16) | second, position + 4)
    };
    if start + 2 * unit_count > bytes.len() {
        return Err(ArscError::MalformedChunk(format!("string at {position} is truncated")));
    }
    let units = (0..unit_count)
        .map(|i| read_u16(bytes, start + 2 * i))
        .collect::<Result<Vec<u16>>>()?;
    String::from_utf16(&units)
        .map_err(|_e| ArscError::MalformedChunk(format!("string at {position} is not UTF-16")))
}

/// The package's table of type names (`attr`, `string`, `style`...).
///
/// Type ids are derived from string indices: `type_id = index + offset + 1`.
/// The offset is fixed per package so that split packages don't clash with
/// the type ids of their base package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeStringPool {
    pool: StringPool,
    type_id_offset: u8
}

impl TypeStringPool {
    pub fn new(type_id_offset: u8) -> Self {
        TypeStringPool {
            pool: StringPool::new(),
            type_id_offset
        }
    }

    pub fn type_id_offset(&self) -> u8 {
        self.type_id_offset
    }

    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    /// Grows the table so that `type_id` has a slot, filling any gap with
    /// empty placeholders, then names that slot.
    pub fn get_or_create(&mut self, type_id: u32, type_name: &str) -> Result<ResStringPoolRef> {
        let offset = self.type_id_offset as u32;
        if type_id <= offset || type_id > 0xFF {
            return Err(ArscError::InvalidTypeId(type_id));
        }
        let size = type_id - offset;
        self.pool.ensure_size(size as usize);
        let index = size - 1;
        self.pool.set(index, type_name)?;
        Ok(index)
    }

    pub fn get_by_id(&self, type_id: u32) -> Option<&PoolString> {
        let index = type_id.checked_sub(self.type_id_offset as u32 + 1)?;
        self.pool.get(index)
    }

    /// Looks a type up by name. This might not find the intended entry if
    /// duplicate type names are present: the first one wins.
    pub fn get_by_name(&self, type_name: &str) -> Option<ResStringPoolRef> {
        self.pool.index_of(type_name)
    }

    /// Resolves the type id of the string at `index`. Only meaningful for
    /// indices from this table, other tables may use a different offset.
    /// `None` if the id would not fit in a byte.
    pub fn id_of(&self, index: ResStringPoolRef) -> Option<u8> {
        let type_id = index.checked_add(self.type_id_offset as u32 + 1)?;
        u8::try_from(type_id).ok()
    }

    pub fn id_of_name(&self, type_name: &str) -> Option<u8> {
        self.get_by_name(type_name).and_then(|index| self.id_of(index))
    }

    /// The type id the next appended type would receive. Anything above
    /// 0xFF is rejected by [TypeStringPool::get_or_create].
    pub fn next_type_id(&self) -> u32 {
        (self.pool.len() as u32).saturating_add(self.type_id_offset as u32 + 1)
    }

    pub fn to_chunk(&self) -> Result<ResChunk> {
        self.pool.to_chunk()
    }
}
