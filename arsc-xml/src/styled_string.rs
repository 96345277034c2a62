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

// Conversion between inline markup (`Hello <b>World</b>`) and the span list
// of a styled pool string.
use std::cmp::Reverse;

use arsc_common::*;
use arsc_table::{
    string_pool::{PoolString, StyleSpan},
    value_coder::unescape_unquote
};

use crate::{
    entry_writer::EntryWriter,
    xml_tree::{XmlElement, XmlNode}
};

// Escaping for a piece of a styled string. Quoting only makes sense for a
// whole value, so unlike escape_string this never adds quotes.
fn escape_fragment(text: &str) -> String {
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
    escaped
}

fn flush<W: EntryWriter>(writer: &mut W, buffer: &mut String) -> Result<()> {
    if !buffer.is_empty() {
        writer.text(&escape_fragment(buffer))?;
        buffer.clear();
    }
    Ok(())
}

fn open_span<W: EntryWriter>(writer: &mut W, span: &StyleSpan) -> Result<()> {
    let mut parts = span.tag.split(';');
    let name = parts.next().unwrap_or_default();
    writer.start_tag(name)?;
    for attribute in parts {
        let (key, value) = attribute.split_once('=').unwrap_or((attribute, ""));
        writer.attribute(key, value)?;
    }
    Ok(())
}

fn span_name(span: &StyleSpan) -> &str {
    span.tag.split(';').next().unwrap_or_default()
}

/// Writes a styled string as text with nested markup. Spans are expected to
/// nest properly, the way they do when they come from markup.
pub fn write_styled<W: EntryWriter>(writer: &mut W, string: &PoolString) -> Result<()> {
    let mut spans: Vec<&StyleSpan> = string.style.iter().collect();
    spans.sort_by_key(|span| (span.first_char, Reverse(span.last_char)));

    let mut open: Vec<&StyleSpan> = vec![];
    let mut pending = spans.into_iter().peekable();
    let mut buffer = String::new();
    let mut position = 0;
    for c in string.content.chars() {
        while let Some(span) = open.last().filter(|span| span.last_char < position) {
            flush(writer, &mut buffer)?;
            writer.end_tag(span_name(span))?;
            open.pop();
        }
        while let Some(span) = pending.next_if(|span| span.first_char <= position) {
            flush(writer, &mut buffer)?;
            open_span(writer, span)?;
            open.push(span);
        }
        buffer.push(c);
        position += c.len_utf16() as u32;
    }
    flush(writer, &mut buffer)?;
    while let Some(span) = open.pop() {
        writer.end_tag(span_name(span))?;
    }
    Ok(())
}

/// Flattens inline markup into plain content plus spans. Text pieces are
/// unescaped, empty elements such as `<br/>` cover no characters and are
/// dropped.
pub fn parse_styled(element: &XmlElement) -> (String, Vec<StyleSpan>) {
    let mut content = String::new();
    let mut spans = vec![];
    collect_styled(element, &mut content, &mut spans);
    (content, spans)
}

fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

fn collect_styled(element: &XmlElement, content: &mut String, spans: &mut Vec<StyleSpan>) {
    for child in &element.children {
        match child {
            XmlNode::Text(text) => content.push_str(&unescape_unquote(text)),
            XmlNode::Element(inner) => {
                let first_char = utf16_len(content);
                let index = spans.len();
                let mut tag = inner.name.clone();
                for (key, value) in &inner.attributes {
                    tag.push_str(&format!(";{key}={value}"));
                }
                // Outer spans come first, so reserve the slot before recursing
                spans.push(StyleSpan {
                    tag,
                    first_char,
                    last_char: first_char
                });
                collect_styled(inner, content, spans);
                let end = utf16_len(content);
                if end == first_char {
                    spans.remove(index);
                } else {
                    spans[index].last_char = end - 1;
                }
            }
        }
    }
}
