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

use std::{fmt, io, num::ParseIntError, rc::Rc};

use deku::prelude::*;

/// Common error type making it easier to share `Result`s between ARSC crates.
///
/// In general designed to avoid needing utilities like `map_err`.
#[derive(Debug, Clone)]
pub enum ArscError {
    /// A bag decoder claimed a bag, but while rendering it found a child that
    /// breaks the shape it claimed (eg. a non-plural key inside a plural bag).
    /// Decoding of the offending entry is aborted.
    ShapeMismatch(String),
    /// A literal value in a textual tree could not be coerced to the binary
    /// type its context requires (eg. `abc` inside an `<integer-array>`).
    CoercionFailure {
        /// Name of the enclosing resource, eg. `n` for `<integer-array name="n">`.
        entry: String,
        /// Position of the offending child element, 1-based. 0 for scalar
        /// entries, which have no children.
        index: usize,
        /// Source line of the offending child element, 1-based. 0 if unknown.
        line: u32,
        reason: String
    },
    /// A symbolic name (`@string/app_name`, an attribute name, a plural
    /// quantity...) could not be resolved to a numeric id. Writing anything
    /// would corrupt the binary payload, so this is fatal.
    LookupFailure(String),
    /// A bag encoder ran past the slots that were allocated for it.
    ///
    /// **If you experience this, it is considered an internal bug.**
    SlotOutOfRange { index: usize, count: usize },
    /// A type id does not fit the Type-Name Table it was used with, ie. it
    /// is not above the table's offset or above 0xFF.
    InvalidTypeId(u32),
    /// A package with the same id was already added to the resource table.
    DuplicatePackage(u8),
    /// No package with this id is part of the resource table.
    UnknownPackage(u8),
    /// A reference was requested with a value type that is not a reference.
    NotAReference(String),
    /// Only UTF-8 encoding is written for StringPools. In this format, string
    /// lengths are stored in 15 bits, meaning the maximum supported string
    /// length is `0x7FFF` bytes.
    StringPoolStringTooLong(String),
    /// A binary chunk was truncated or its header contradicts its contents.
    MalformedChunk(String),
    /// Serialising or parsing a struct to/from its AAPT byte layout failed.
    /// See [DekuError].
    ByteSerialisationFailed(DekuError),
    /// Parsing failed while reading a values XML document. See
    /// [xml::reader::Error].
    XmlParsingFailed(xml::reader::Error),
    /// Writing a decoded tree as XML text failed.
    XmlWritingFailed(Rc<xml::writer::Error>),
    /// An attribute was expected to be an integer (eg. `min` on an `<attr>`),
    /// but its value was not a valid integer.
    IntegerParsingFailed(ParseIntError),
    /// Reading or writing a document failed.
    FileIoError(Rc<io::Error>)
}

/// Result type where the error is always [ArscError].
pub type Result<T> = std::result::Result<T, ArscError>;

impl fmt::Display for ArscError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArscError::ShapeMismatch(msg) => write!(f, "Bag shape mismatch: {msg}"),
            ArscError::CoercionFailure {
                entry,
                index,
                line,
                reason
            } if *index == 0 => write!(f, "{reason} for name={entry}, near line: {line}"),
            ArscError::CoercionFailure {
                entry,
                index,
                line,
                reason
            } => write!(
                f,
                "{reason} for array name={entry}, entry no{index}, near line: {line}"
            ),
            ArscError::LookupFailure(name) => write!(f, "Unable to resolve: {name}"),
            ArscError::SlotOutOfRange { index, count } => {
                write!(f, "Bag slot {index} out of range ({count} allocated)")
            }
            ArscError::InvalidTypeId(id) => write!(f, "Invalid type id: {id:#04x}"),
            ArscError::DuplicatePackage(id) => write!(f, "Duplicate package id: {id:#04x}"),
            ArscError::UnknownPackage(id) => write!(f, "Unknown package id: {id:#04x}"),
            ArscError::NotAReference(value_type) => write!(f, "Not reference: {value_type}"),
            ArscError::StringPoolStringTooLong(s) => {
                write!(f, "String too long for pool ({} bytes)", s.len())
            }
            ArscError::MalformedChunk(msg) => write!(f, "Malformed chunk: {msg}"),
            ArscError::ByteSerialisationFailed(e) => write!(f, "{e}"),
            ArscError::XmlParsingFailed(e) => write!(f, "{e}"),
            ArscError::XmlWritingFailed(e) => write!(f, "{e}"),
            ArscError::IntegerParsingFailed(e) => write!(f, "{e}"),
            ArscError::FileIoError(e) => write!(f, "{e}")
        }
    }
}

impl std::error::Error for ArscError {}

/// This makes it easier for Result<Something, ArscError> to be reported as text
impl From<ArscError> for String {
    fn from(value: ArscError) -> Self {
        value.to_string()
    }
}

// Automatic conversion from other types of error to ArscError makes the rest of the code cleaner
impl From<io::Error> for ArscError {
    fn from(value: io::Error) -> Self {
        ArscError::FileIoError(value.into())
    }
}

impl From<DekuError> for ArscError {
    fn from(value: DekuError) -> Self {
        ArscError::ByteSerialisationFailed(value)
    }
}

impl From<ParseIntError> for ArscError {
    fn from(value: ParseIntError) -> Self {
        ArscError::IntegerParsingFailed(value)
    }
}

impl From<xml::reader::Error> for ArscError {
    fn from(value: xml::reader::Error) -> Self {
        ArscError::XmlParsingFailed(value)
    }
}

impl From<xml::writer::Error> for ArscError {
    fn from(value: xml::writer::Error) -> Self {
        ArscError::XmlWritingFailed(value.into())
    }
}
