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

use std::collections::{BTreeSet, HashMap};

use arsc_common::*;
use log::debug;

use crate::{
    attribute_types::AttributeType,
    resource_entry::{ResourceEntry, ResourceEntryMut},
    resource_external_types::{ResStringPoolRef, ResValue, ValueType},
    resource_internal_types::{Entry, QualifierSet, ResConfig, ResourceId},
    string_pool::{StringPool, TypeStringPool},
    value_coder
};

pub const USER_PACKAGE_ID: u8 = 0x7F;
pub const FRAMEWORK_PACKAGE_ID: u8 = 0x01;

/// Everything one package declares: its type names, entry names and the
/// configuration-specific entries themselves, in declaration order.
#[derive(Debug, Clone)]
pub struct TablePackage<C: ResConfig = QualifierSet> {
    id: u8,
    name: String,
    pub(crate) type_strings: TypeStringPool,
    pub(crate) key_strings: StringPool,
    pub(crate) entries: Vec<Entry<C>>,
    // Names given to resources that have no entry yet
    pub(crate) staged_names: HashMap<ResourceId, ResStringPoolRef>,
    // Only ever grows, so ids of deleted entries are not handed out again
    next_entry_ids: HashMap<u8, u32>
}

impl<C: ResConfig> TablePackage<C> {
    pub fn new(id: u8, name: &str) -> Self {
        TablePackage {
            id,
            name: name.to_string(),
            type_strings: TypeStringPool::new(0),
            key_strings: StringPool::new(),
            entries: vec![],
            staged_names: HashMap::new(),
            next_entry_ids: HashMap::new()
        }
    }

    /// Split packages number their types after those of the base package.
    pub fn with_type_id_offset(mut self, type_id_offset: u8) -> Self {
        self.type_strings = TypeStringPool::new(type_id_offset);
        self
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_strings(&self) -> &TypeStringPool {
        &self.type_strings
    }

    pub fn key_strings(&self) -> &StringPool {
        &self.key_strings
    }

    /// Editing a key string renames every entry that shares it.
    pub fn key_strings_mut(&mut self) -> &mut StringPool {
        &mut self.key_strings
    }

    pub fn type_name_of(&self, type_id: u8) -> Option<&str> {
        self.type_strings
            .get_by_id(type_id as u32)
            .map(|s| &s.content[..])
            .filter(|name| !name.is_empty())
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry<C>> {
        self.entries.iter()
    }

    pub fn entries_of(&self, resource_id: ResourceId) -> impl Iterator<Item = &Entry<C>> {
        self.entries
            .iter()
            .filter(move |entry| entry.resource_id() == resource_id)
    }

    pub fn entry_name(&self, entry: &Entry<C>) -> Option<&str> {
        entry
            .name_ref()
            .and_then(|name| self.key_strings.get_str(name))
    }

    /// Distinct resource ids, in the order their first entry was declared.
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .map(|entry| entry.resource_id())
            .filter(|resource_id| seen.insert(*resource_id))
            .collect()
    }

    pub fn get_or_create_type_id(&mut self, type_name: &str) -> Result<u8> {
        if let Some(type_id) = self.type_strings.id_of_name(type_name) {
            return Ok(type_id);
        }
        let next = self.type_strings.next_type_id();
        let index = self.type_strings.get_or_create(next, type_name)?;
        let type_id = self
            .type_strings
            .id_of(index)
            .ok_or(ArscError::InvalidTypeId(next))?;
        debug!("Package {} declared type {type_name} as {type_id:#04x}", self.name);
        Ok(type_id)
    }

    /// Looks a resource up by type and entry name within this package only.
    pub fn resolve_local_resource_id(&self, type_name: &str, name: &str) -> Option<ResourceId> {
        let type_id = self.type_strings.id_of_name(type_name)?;
        let declared = self.entries.iter().find(|entry| {
            entry.resource_id().type_id() == type_id && self.entry_name(entry) == Some(name)
        });
        if let Some(entry) = declared {
            return Some(entry.resource_id());
        }
        self.staged_names
            .iter()
            .filter(|(id, index)| {
                id.type_id() == type_id && self.key_strings.get_str(**index) == Some(name)
            })
            .map(|(id, _)| *id)
            .min()
    }

    /// Returns the id of `type_name/name`, declaring the resource if needed.
    /// The new resource has no entries until one is created for a config.
    pub fn get_or_create_resource_id(&mut self, type_name: &str, name: &str) -> Result<ResourceId> {
        if let Some(resource_id) = self.resolve_local_resource_id(type_name, name) {
            return Ok(resource_id);
        }
        let type_id = self.get_or_create_type_id(type_name)?;
        let next = self.next_entry_ids.entry(type_id).or_insert(0);
        if *next > 0xFFFF {
            return Err(ArscError::LookupFailure(format!(
                "no entry ids left for type {type_name}"
            )));
        }
        let resource_id = ResourceId::new(self.id, type_id, *next as u16);
        *next += 1;
        let name_ref = self.key_strings.get_or_create(name);
        self.staged_names.insert(resource_id, name_ref);
        debug!("Allocated {resource_id} for {type_name}/{name}");
        Ok(resource_id)
    }

    // Keeps the allocator ahead of explicitly chosen ids
    pub(crate) fn reserve_entry_id(&mut self, resource_id: ResourceId) {
        let next = self
            .next_entry_ids
            .entry(resource_id.type_id())
            .or_insert(0);
        *next = (*next).max(resource_id.entry_id() as u32 + 1);
    }

    /// Deletes the entry for exactly this config. The resource id stays
    /// allocated and keeps its name even if this was the last entry.
    pub fn remove_entry(&mut self, resource_id: ResourceId, config: &C) -> Option<Entry<C>> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.resource_id() == resource_id && entry.config() == config)?;
        let entry = self.entries.remove(position);
        if let Some(name) = entry.name_ref() {
            if self.entries_of(resource_id).next().is_none() {
                self.staged_names.insert(resource_id, name);
            }
        }
        Some(entry)
    }
}

/// A set of packages sharing one pool of value strings.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable<C: ResConfig = QualifierSet> {
    string_pool: StringPool,
    packages: Vec<TablePackage<C>>
}

impl<C: ResConfig> ResourceTable<C> {
    pub fn new() -> Self {
        ResourceTable {
            string_pool: StringPool::new(),
            packages: vec![]
        }
    }

    pub fn add_package(&mut self, package: TablePackage<C>) -> Result<()> {
        if self.package(package.id()).is_some() {
            return Err(ArscError::DuplicatePackage(package.id()));
        }
        self.packages.push(package);
        Ok(())
    }

    pub fn packages(&self) -> impl Iterator<Item = &TablePackage<C>> {
        self.packages.iter()
    }

    pub fn package(&self, id: u8) -> Option<&TablePackage<C>> {
        self.packages.iter().find(|package| package.id() == id)
    }

    pub fn package_mut(&mut self, id: u8) -> Option<&mut TablePackage<C>> {
        self.packages.iter_mut().find(|package| package.id() == id)
    }

    pub fn package_by_name(&self, name: &str) -> Option<&TablePackage<C>> {
        self.packages.iter().find(|package| package.name() == name)
    }

    pub fn string_pool(&self) -> &StringPool {
        &self.string_pool
    }

    pub fn string_pool_mut(&mut self) -> &mut StringPool {
        &mut self.string_pool
    }

    pub fn resource_entry(&self, resource_id: ResourceId) -> Option<ResourceEntry<'_, C>> {
        let package = self.package(resource_id.package_id())?;
        Some(ResourceEntry::new(self, package, resource_id))
    }

    pub fn resource_entry_mut(&mut self, resource_id: ResourceId) -> Option<ResourceEntryMut<'_, C>> {
        let package = self.package_mut(resource_id.package_id())?;
        Some(ResourceEntryMut::new(package, resource_id))
    }

    fn context(&self, package_id: u8) -> Result<&TablePackage<C>> {
        self.package(package_id)
            .ok_or(ArscError::UnknownPackage(package_id))
    }

    /// Renders a scalar value as it would appear in values XML. Strings are
    /// escaped so that they read back as strings, styles are dropped.
    pub fn decode_value(&self, context_package_id: u8, value: ResValue) -> Result<String> {
        if value.data_type.is_reference() {
            return self.decode_reference(context_package_id, value.data_type, value.data);
        }
        if value.data_type == ValueType::String {
            let string = self.string_pool.get_str(value.data).ok_or_else(|| {
                ArscError::LookupFailure(format!("string index {}", value.data))
            })?;
            return Ok(value_coder::escape_string(string));
        }
        value_coder::decode(value.data_type, value.data).ok_or_else(|| {
            ArscError::ShapeMismatch(format!(
                "can't decode {:?} value 0x{:08x}",
                value.data_type, value.data
            ))
        })
    }

    /// `@type/name`, `?type/name`, or `@0x7f010000` when the target is unknown.
    pub fn decode_reference(
        &self,
        context_package_id: u8,
        value_type: ValueType,
        resource_id: u32
    ) -> Result<String> {
        let context = self.context(context_package_id)?;
        match self.resource_entry(ResourceId(resource_id)) {
            Some(entry) if entry.is_declared() => entry.build_reference(context, value_type),
            _ => Ok(value_coder::decode_unknown_resource_id(
                !value_type.is_attribute_reference(),
                resource_id
            ))
        }
    }

    /// The name of a bag key: `textColor` for a local attribute,
    /// `android:textColor` for one from another package, the reserved name
    /// for [AttributeType] keys, or `@0x01010098` if nothing is known.
    pub fn decode_name(&self, context_package_id: u8, key: u32) -> String {
        if let Some(attribute_type) = AttributeType::from_id(key) {
            return attribute_type.name().to_string();
        }
        let resource_id = ResourceId(key);
        if let Some(package) = self.package(resource_id.package_id()) {
            let name = package
                .entries_of(resource_id)
                .find_map(|entry| package.entry_name(entry))
                .or_else(|| {
                    package
                        .staged_names
                        .get(&resource_id)
                        .and_then(|name| package.key_strings.get_str(*name))
                });
            if let Some(name) = name {
                return if package.id() == context_package_id {
                    name.to_string()
                } else {
                    format!("{}:{name}", package.name())
                };
            }
        }
        value_coder::decode_unknown_name_id(key)
    }

    /// Resolves `[package:][type/]name`. `default_type` applies when the
    /// name doesn't specify its type.
    pub fn resolve_name(&self, context_package_id: u8, default_type: &str, name: &str) -> Result<u32> {
        if let Some(id) = value_coder::encode_unknown_name_id(name) {
            return Ok(id);
        }
        let (package_name, qualified) = split_package(name);
        let (type_name, entry_name) = qualified.split_once('/').unwrap_or((default_type, qualified));
        self.resolve_qualified(context_package_id, package_name, type_name, entry_name)
            .map(|id| id.0)
            .ok_or_else(|| ArscError::LookupFailure(format!("{default_type} {name}")))
    }

    fn resolve_qualified(
        &self,
        context_package_id: u8,
        package_name: Option<&str>,
        type_name: &str,
        name: &str
    ) -> Option<ResourceId> {
        let package = match package_name {
            Some(package_name) => self.package_by_name(package_name)?,
            None => self.package(context_package_id)?
        };
        package.resolve_local_resource_id(type_name, name)
    }

    /// Parses `@[package:]type/name` and `?[package:][type/]name`.
    ///
    /// Returns `Ok(None)` if the text isn't shaped like a reference at all,
    /// and fails if it is one but its target doesn't exist.
    pub fn encode_reference(&self, context_package_id: u8, text: &str) -> Result<Option<ResValue>> {
        let text = text.trim();
        if let Some(value) = value_coder::encode_null(text)
            .or_else(|| value_coder::encode_unknown_resource_id(text))
        {
            return Ok(Some(value));
        }
        let (value_type, body) = if let Some(body) = text.strip_prefix('@') {
            (ValueType::Reference, body)
        } else if let Some(body) = text.strip_prefix('?') {
            (ValueType::Attribute, body)
        } else {
            return Ok(None);
        };
        // @+id/name declares the id in XML layouts, @*android:... is a private reference
        let body = body.trim_start_matches(['+', '*']);
        let (package_name, qualified) = split_package(body);
        let (type_name, name) = match qualified.split_once('/') {
            Some(split) => split,
            None if value_type == ValueType::Attribute => ("attr", qualified),
            None => return Ok(None)
        };
        if type_name.is_empty()
            || name.is_empty()
            || qualified.chars().any(|c| c.is_whitespace())
        {
            return Ok(None);
        }
        let resource_id = self
            .resolve_qualified(context_package_id, package_name, type_name, name)
            .ok_or_else(|| ArscError::LookupFailure(text.to_string()))?;
        Ok(Some(ResValue::new(value_type, resource_id.0)))
    }
}

fn split_package(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((package, rest)) => (Some(package), rest),
        None => (None, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_internal_types::EntryValue;

    fn table() -> ResourceTable {
        let mut android = TablePackage::new(FRAMEWORK_PACKAGE_ID, "android");
        let text_color = android.get_or_create_resource_id("attr", "textColor").unwrap();

        let mut app = TablePackage::new(USER_PACKAGE_ID, "com.example");
        app.get_or_create_resource_id("string", "app_name").unwrap();
        app.get_or_create_resource_id("attr", "accent").unwrap();

        let mut table = ResourceTable::new();
        table.add_package(android).unwrap();
        table.add_package(app).unwrap();
        table
            .resource_entry_mut(text_color)
            .unwrap()
            .get_or_create(QualifierSet::default())
            .unwrap()
            .value = EntryValue::Scalar(ResValue::null());
        table
    }

    #[test]
    fn allocates_ids_per_type() {
        let mut package: TablePackage = TablePackage::new(USER_PACKAGE_ID, "com.example");
        let a = package.get_or_create_resource_id("string", "a").unwrap();
        let b = package.get_or_create_resource_id("string", "b").unwrap();
        let style = package.get_or_create_resource_id("style", "Theme").unwrap();
        assert_eq!(a, ResourceId(0x7F01_0000));
        assert_eq!(b, ResourceId(0x7F01_0001));
        assert_eq!(style, ResourceId(0x7F02_0000));
        assert_eq!(package.get_or_create_resource_id("string", "a").unwrap(), a);
        assert_eq!(package.type_name_of(2), Some("style"));
    }

    #[test]
    fn type_id_offset_applies_to_new_types() {
        let mut package: TablePackage =
            TablePackage::new(0x80, "com.example.split").with_type_id_offset(4);
        let id = package.get_or_create_resource_id("layout", "main").unwrap();
        assert_eq!(id.type_id(), 5);
    }

    #[test]
    fn type_ids_past_a_byte_are_rejected() {
        let mut package: TablePackage =
            TablePackage::new(0x80, "com.example.split").with_type_id_offset(0xFF);
        assert!(matches!(
            package.get_or_create_resource_id("layout", "main"),
            Err(ArscError::InvalidTypeId(0x100))
        ));
        assert_eq!(package.type_name_of(0xFF), None);
    }

    #[test]
    fn resource_ids_are_listed_once_in_declaration_order() {
        let mut table = table();
        let package = table.package_mut(USER_PACKAGE_ID).unwrap();
        let title = package.get_or_create_resource_id("string", "title").unwrap();
        let app_name = package.resolve_local_resource_id("string", "app_name").unwrap();
        for (id, qualifiers) in [(title, ""), (app_name, ""), (title, "land"), (app_name, "fr")] {
            table
                .resource_entry_mut(id)
                .unwrap()
                .get_or_create(QualifierSet::from_dashed(qualifiers))
                .unwrap();
        }
        assert_eq!(table.package(USER_PACKAGE_ID).unwrap().resource_ids(), vec![title, app_name]);
    }

    #[test]
    fn rejects_duplicate_packages() {
        let mut table = table();
        assert!(matches!(
            table.add_package(TablePackage::new(USER_PACKAGE_ID, "other")),
            Err(ArscError::DuplicatePackage(0x7F))
        ));
    }

    #[test]
    fn references_resolve_across_packages() {
        let table = table();
        let local = table.encode_reference(USER_PACKAGE_ID, "@string/app_name").unwrap().unwrap();
        assert_eq!(local, ResValue::new(ValueType::Reference, 0x7F01_0000));
        let theme = table.encode_reference(USER_PACKAGE_ID, "?android:textColor").unwrap().unwrap();
        assert_eq!(theme, ResValue::new(ValueType::Attribute, 0x0101_0000));
        assert_eq!(table.encode_reference(USER_PACKAGE_ID, "plain text").unwrap(), None);
        assert_eq!(table.encode_reference(USER_PACKAGE_ID, "@ me").unwrap(), None);
        assert!(matches!(
            table.encode_reference(USER_PACKAGE_ID, "@string/missing"),
            Err(ArscError::LookupFailure(_))
        ));
    }

    #[test]
    fn names_are_prefixed_only_across_packages() {
        let table = table();
        assert_eq!(table.decode_name(USER_PACKAGE_ID, 0x7F02_0000), "accent");
        assert_eq!(table.decode_name(USER_PACKAGE_ID, 0x0101_0000), "android:textColor");
        assert_eq!(table.decode_name(FRAMEWORK_PACKAGE_ID, 0x0101_0000), "textColor");
        assert_eq!(table.decode_name(USER_PACKAGE_ID, 0x7F09_0000), "@0x7f090000");
        assert_eq!(
            table.resolve_name(USER_PACKAGE_ID, "attr", "android:textColor").unwrap(),
            0x0101_0000
        );
        assert_eq!(table.resolve_name(USER_PACKAGE_ID, "attr", "@0x7f090000").unwrap(), 0x7F09_0000);
        assert!(table.resolve_name(USER_PACKAGE_ID, "attr", "nope").is_err());
    }

    #[test]
    fn decodes_strings_and_unknown_references() {
        let mut table = table();
        let index = table.string_pool_mut().get_or_create("@not_a_ref");
        assert_eq!(
            table
                .decode_value(USER_PACKAGE_ID, ResValue::new(ValueType::String, index))
                .unwrap(),
            "\\@not_a_ref"
        );
        assert_eq!(
            table
                .decode_value(USER_PACKAGE_ID, ResValue::new(ValueType::Reference, 0x7F05_0000))
                .unwrap(),
            "@0x7f050000"
        );
        assert_eq!(
            table
                .decode_value(FRAMEWORK_PACKAGE_ID, ResValue::new(ValueType::Attribute, 0x0101_0000))
                .unwrap(),
            "?attr/textColor"
        );
    }
}
