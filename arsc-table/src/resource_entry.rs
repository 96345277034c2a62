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

use std::fmt;

use arsc_common::*;
use log::trace;

use crate::{
    attribute_types::{AttributeDataFormat, AttributeType},
    resource_external_types::{ResValue, ValueType},
    resource_internal_types::{Bag, Entry, QualifierSet, ResConfig, ResourceId},
    resource_table::{ResourceTable, TablePackage}
};

/// A logical resource: every configuration-specific [Entry] of one resource
/// id within its package. This is only a view and owns nothing.
#[derive(Debug)]
pub struct ResourceEntry<'a, C: ResConfig = QualifierSet> {
    table: &'a ResourceTable<C>,
    package: &'a TablePackage<C>,
    resource_id: ResourceId
}

impl<C: ResConfig> Clone for ResourceEntry<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ResConfig> Copy for ResourceEntry<'_, C> {}

impl<'a, C: ResConfig> ResourceEntry<'a, C> {
    pub(crate) fn new(
        table: &'a ResourceTable<C>,
        package: &'a TablePackage<C>,
        resource_id: ResourceId
    ) -> Self {
        ResourceEntry {
            table,
            package,
            resource_id
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn package(&self) -> &'a TablePackage<C> {
        self.package
    }

    pub fn table(&self) -> &'a ResourceTable<C> {
        self.table
    }

    pub fn hex_id(&self) -> String {
        self.resource_id.to_string()
    }

    pub fn package_name(&self) -> &'a str {
        self.package.name()
    }

    pub fn type_name(&self) -> Option<&'a str> {
        self.package.type_name_of(self.resource_id.type_id())
    }

    /// All entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Entry<C>> {
        self.package.entries_of(self.resource_id)
    }

    pub fn any(&self) -> bool {
        self.iter().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.any()
    }

    /// Whether the resource exists, with or without entries.
    pub fn is_declared(&self) -> bool {
        self.any() || self.package.staged_names.contains_key(&self.resource_id)
    }

    pub fn configs(&self) -> impl Iterator<Item = &'a C> {
        self.iter().map(|entry| entry.config())
    }

    /// The entry for exactly this configuration.
    pub fn get(&self, config: &C) -> Option<&'a Entry<C>> {
        self.iter().find(|entry| entry.config() == config)
    }

    /// An exact match if there is one, otherwise the first entry in
    /// declaration order whose config is equal to or more specific than
    /// `config`.
    ///
    /// This only approximates runtime resource selection: the result is not
    /// necessarily the closest match, only the first qualifying one.
    pub fn get_equals_or_more_specific(&self, config: &C) -> Option<&'a Entry<C>> {
        self.get(config).or_else(|| {
            self.iter()
                .find(|entry| entry.config().is_equal_or_more_specific_than(config))
        })
    }

    /// The entry without qualifiers, or the first one if there isn't one.
    pub fn get_default(&self) -> Option<&'a Entry<C>> {
        self.iter()
            .find(|entry| entry.is_default())
            .or_else(|| self.iter().next())
    }

    pub fn name(&self) -> Option<&'a str> {
        self.iter()
            .find_map(|entry| self.package.entry_name(entry))
            .or_else(|| {
                self.package
                    .staged_names
                    .get(&self.resource_id)
                    .and_then(|name| self.package.key_strings().get_str(*name))
            })
    }

    /// Formats a reference to this resource as seen from `context`, eg.
    /// `@string/app_name`, `?attr/colorAccent` or `@android:color/white`.
    pub fn build_reference(&self, context: &TablePackage<C>, value_type: ValueType) -> Result<String> {
        if !value_type.is_reference() {
            return Err(ArscError::NotAReference(value_type.to_string()));
        }
        let missing = || ArscError::LookupFailure(self.hex_id());
        let type_name = self.type_name().ok_or_else(missing)?;
        let name = self.name().ok_or_else(missing)?;
        let marker = if value_type.is_attribute_reference() { '?' } else { '@' };
        if context.id() == self.package.id() {
            Ok(format!("{marker}{type_name}/{name}"))
        } else {
            Ok(format!("{marker}{}:{type_name}/{name}", self.package.name()))
        }
    }

    /// The attribute declaration bag, if this resource is an attribute.
    pub fn attribute_bag(&self) -> Option<&'a Bag> {
        self.get_default()
            .and_then(|entry| entry.bag())
            .filter(|bag| bag.is_attribute_shaped())
    }

    /// Enum and flag members of the attribute declaration with their values.
    fn attribute_members(&self) -> Option<(AttributeDataFormat, Vec<(String, u32)>)> {
        let bag = self.attribute_bag()?;
        let formats = bag.get_by_type(AttributeType::Formats)?.data;
        let kind = AttributeDataFormat::type_of_bag(formats)?;
        let members = bag
            .iter()
            .filter(|child| child.attribute_type().is_none())
            .map(|child| (self.table.decode_name(self.package.id(), child.key), child.data))
            .collect();
        Some((kind, members))
    }

    /// The value type [ResourceEntry::encode_attribute_data] produces for this
    /// attribute: decimal for enums, hex for flags.
    pub fn attribute_value_type(&self) -> Option<ValueType> {
        let (kind, _) = self.attribute_members()?;
        Some(match kind {
            AttributeDataFormat::Enum => ValueType::DecimalInteger,
            _ => ValueType::HexInteger
        })
    }

    /// Renders `data` using the enum or flag names of this attribute, eg.
    /// `vertical` or `top|left`. Returns `None` if this isn't an attribute
    /// with symbolic values or nothing matches.
    pub fn decode_attribute_data(&self, data: u32) -> Option<String> {
        let (kind, members) = self.attribute_members()?;
        match kind {
            AttributeDataFormat::Enum => members
                .into_iter()
                .find(|(_, value)| *value == data)
                .map(|(name, _)| name),
            _ => {
                if data == 0 {
                    return members
                        .into_iter()
                        .find(|(_, value)| *value == 0)
                        .map(|(name, _)| name);
                }
                let mut covered = 0;
                let mut names = vec![];
                for (name, value) in members {
                    if value != 0 && data & value == value {
                        covered |= value;
                        names.push(name);
                    }
                }
                if covered != data {
                    trace!("Flags 0x{data:08x} of {} only partially named", self.hex_id());
                    return None;
                }
                Some(names.join("|"))
            }
        }
    }

    /// Inverse of [ResourceEntry::decode_attribute_data].
    pub fn encode_attribute_data(&self, text: &str) -> Option<ResValue> {
        let (kind, members) = self.attribute_members()?;
        let lookup = |name: &str| {
            members
                .iter()
                .find(|(member, _)| member == name.trim())
                .map(|(_, value)| *value)
        };
        match kind {
            AttributeDataFormat::Enum => {
                lookup(text).map(|value| ResValue::new(ValueType::DecimalInteger, value))
            }
            _ => {
                let mut data = 0;
                for name in text.split('|') {
                    data |= lookup(name)?;
                }
                Some(ResValue::new(ValueType::HexInteger, data))
            }
        }
    }
}

impl<C: ResConfig> fmt::Display for ResourceEntry<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.type_name(), self.name()) {
            (Some(type_name), Some(name)) => write!(
                f,
                "{} @{}:{type_name}/{name}",
                self.resource_id,
                self.package.name()
            ),
            _ => write!(f, "{}", self.resource_id)
        }
    }
}

/// Mutable counterpart of [ResourceEntry], for creating entries and naming
/// the resource.
#[derive(Debug)]
pub struct ResourceEntryMut<'a, C: ResConfig = QualifierSet> {
    package: &'a mut TablePackage<C>,
    resource_id: ResourceId
}

impl<'a, C: ResConfig> ResourceEntryMut<'a, C> {
    pub(crate) fn new(package: &'a mut TablePackage<C>, resource_id: ResourceId) -> Self {
        ResourceEntryMut {
            package,
            resource_id
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn package(&mut self) -> &mut TablePackage<C> {
        self.package
    }

    /// Returns the entry for `config`, creating an empty one if needed. New
    /// entries take the name of their siblings, or the staged name.
    pub fn get_or_create(&mut self, config: C) -> Result<&mut Entry<C>> {
        let resource_id = self.resource_id;
        let package = &mut *self.package;
        if resource_id.package_id() != package.id() {
            return Err(ArscError::UnknownPackage(resource_id.package_id()));
        }
        if package.type_name_of(resource_id.type_id()).is_none() {
            return Err(ArscError::InvalidTypeId(resource_id.type_id() as u32));
        }
        let existing = package
            .entries
            .iter()
            .position(|entry| entry.resource_id() == resource_id && *entry.config() == config);
        let position = match existing {
            Some(position) => position,
            None => {
                let name = package
                    .entries_of(resource_id)
                    .find_map(|entry| entry.name_ref());
                let name = name.or_else(|| package.staged_names.remove(&resource_id));
                let mut entry = Entry::new(resource_id, config);
                if let Some(name) = name {
                    entry.set_name_ref(name);
                }
                package.reserve_entry_id(resource_id);
                package.entries.push(entry);
                trace!("Created entry {} of {resource_id}", package.entries.len() - 1);
                package.entries.len() - 1
            }
        };
        Ok(&mut package.entries[position])
    }

    /// Names every entry of this resource. They all share one key string,
    /// so editing that string later renames all of them. Without entries
    /// the name is kept for the first entry created.
    pub fn set_name(&mut self, name: &str) {
        let resource_id = self.resource_id;
        let package = &mut *self.package;
        let name_ref = package.key_strings.get_or_create(name);
        let mut named = false;
        for entry in package
            .entries
            .iter_mut()
            .filter(|entry| entry.resource_id() == resource_id)
        {
            entry.set_name_ref(name_ref);
            named = true;
        }
        if named {
            package.staged_names.remove(&resource_id);
        } else {
            package.staged_names.insert(resource_id, name_ref);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resource_internal_types::{EntryValue, ResValueMap},
        resource_table::USER_PACKAGE_ID
    };

    #[derive(Debug, Clone, PartialEq)]
    struct TestConfig(Vec<&'static str>);

    impl ResConfig for TestConfig {
        fn is_default(&self) -> bool {
            self.0.is_empty()
        }

        // Same orientation, any API level at or below the requested one
        fn is_equal_or_more_specific_than(&self, other: &Self) -> bool {
            if self.0.is_empty() {
                return other.0.is_empty();
            }
            self.0.iter().zip(other.0.iter()).all(|(ours, theirs)| {
                match (ours.strip_prefix('v'), theirs.strip_prefix('v')) {
                    (Some(ours), Some(theirs)) => ours <= theirs,
                    _ => ours == theirs
                }
            })
        }
    }

    fn table_with<C: ResConfig>(
        configs: Vec<C>
    ) -> (ResourceTable<C>, ResourceId) {
        let mut package = TablePackage::new(USER_PACKAGE_ID, "com.example");
        let id = package.get_or_create_resource_id("layout", "main").unwrap();
        let mut table = ResourceTable::new();
        table.add_package(package).unwrap();
        {
            let mut entry = table.resource_entry_mut(id).unwrap();
            for config in configs {
                entry.get_or_create(config).unwrap();
            }
        }
        (table, id)
    }

    #[test]
    fn exact_match_wins() {
        let (table, id) = table_with(vec![
            QualifierSet::default(),
            QualifierSet::from_dashed("land"),
            QualifierSet::from_dashed("land-v21"),
        ]);
        let entry = table.resource_entry(id).unwrap();
        let land_v21 = QualifierSet::from_dashed("land-v21");
        assert_eq!(entry.get(&land_v21).unwrap().config(), &land_v21);
        assert_eq!(entry.get_equals_or_more_specific(&land_v21).unwrap().config(), &land_v21);
        assert!(entry.get(&QualifierSet::from_dashed("port")).is_none());
    }

    #[test]
    fn specificity_returns_first_encountered() {
        let (table, id) = table_with(vec![
            TestConfig(vec![]),
            TestConfig(vec!["land"]),
            TestConfig(vec!["land", "v21"]),
        ]);
        let entry = table.resource_entry(id).unwrap();
        let found = entry
            .get_equals_or_more_specific(&TestConfig(vec!["land", "v30"]))
            .unwrap();
        // {land-v21} would be closer, but {land} is declared first
        assert_eq!(found.config(), &TestConfig(vec!["land"]));
    }

    #[test]
    fn qualifier_sets_return_first_encountered() {
        let (table, id) = table_with(vec![
            QualifierSet::default(),
            QualifierSet::from_dashed("land"),
            QualifierSet::from_dashed("land-v21"),
        ]);
        let entry = table.resource_entry(id).unwrap();
        let found = entry
            .get_equals_or_more_specific(&QualifierSet::from_dashed("land-v30"))
            .unwrap();
        assert_eq!(found.config(), &QualifierSet::from_dashed("land"));
        assert!(entry
            .get_equals_or_more_specific(&QualifierSet::from_dashed("port"))
            .is_none());
    }

    #[test]
    fn default_falls_back_to_first() {
        let (table, id) = table_with(vec![
            QualifierSet::from_dashed("land"),
            QualifierSet::default(),
        ]);
        let entry = table.resource_entry(id).unwrap();
        assert!(entry.get_default().unwrap().is_default());

        let (table, id) = table_with(vec![
            QualifierSet::from_dashed("night"),
            QualifierSet::from_dashed("land"),
        ]);
        let entry = table.resource_entry(id).unwrap();
        assert_eq!(
            entry.get_default().unwrap().config(),
            &QualifierSet::from_dashed("night")
        );
    }

    #[test]
    fn names_are_shared_across_configs() {
        let (mut table, id) = table_with(vec![
            QualifierSet::default(),
            QualifierSet::from_dashed("land"),
            QualifierSet::from_dashed("night"),
        ]);
        table.resource_entry_mut(id).unwrap().set_name("foo");

        let entry = table.resource_entry(id).unwrap();
        let refs: Vec<_> = entry.iter().map(|e| e.name_ref()).collect();
        assert_eq!(refs.len(), 3);
        assert!(refs.iter().all(|r| r.is_some() && *r == refs[0]));
        assert!(entry
            .iter()
            .all(|e| entry.package().entry_name(e) == Some("foo")));

        let shared = refs[0].unwrap();
        table
            .package_mut(USER_PACKAGE_ID)
            .unwrap()
            .key_strings_mut()
            .set(shared, "bar")
            .unwrap();
        let entry = table.resource_entry(id).unwrap();
        assert!(entry
            .iter()
            .all(|e| entry.package().entry_name(e) == Some("bar")));
    }

    #[test]
    fn staged_name_backfills_new_entries() {
        let mut package: TablePackage = TablePackage::new(USER_PACKAGE_ID, "com.example");
        let id = package.get_or_create_resource_id("string", "title").unwrap();
        let mut table = ResourceTable::new();
        table.add_package(package).unwrap();

        assert!(table.resource_entry(id).unwrap().is_declared());
        assert!(table.resource_entry(id).unwrap().is_empty());
        let mut entry = table.resource_entry_mut(id).unwrap();
        entry.get_or_create(QualifierSet::default()).unwrap();
        entry.get_or_create(QualifierSet::from_dashed("fr")).unwrap();

        let entry = table.resource_entry(id).unwrap();
        assert_eq!(entry.name(), Some("title"));
        assert!(entry.iter().all(|e| e.name_ref() == entry.iter().next().unwrap().name_ref()));
        assert_eq!(entry.to_string(), "0x7f010000 @com.example:string/title");
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut package: TablePackage = TablePackage::new(USER_PACKAGE_ID, "com.example");
        let id = package.get_or_create_resource_id("string", "a").unwrap();
        let mut table = ResourceTable::new();
        table.add_package(package).unwrap();
        table
            .resource_entry_mut(id)
            .unwrap()
            .get_or_create(QualifierSet::default())
            .unwrap();

        let package = table.package_mut(USER_PACKAGE_ID).unwrap();
        assert!(package.remove_entry(id, &QualifierSet::default()).is_some());
        let next = package.get_or_create_resource_id("string", "b").unwrap();
        assert_eq!(next, ResourceId(0x7F01_0001));
        assert_eq!(table.resource_entry(id).unwrap().name(), Some("a"));
    }

    fn framework_table() -> (ResourceTable, ResourceId) {
        let mut android: TablePackage = TablePackage::new(0x01, "android");
        let attr = android.get_or_create_resource_id("attr", "gravity").unwrap();
        let top = android.get_or_create_resource_id("id", "top").unwrap();
        let left = android.get_or_create_resource_id("id", "left").unwrap();
        let mut table = ResourceTable::new();
        table.add_package(android).unwrap();
        table.add_package(TablePackage::new(USER_PACKAGE_ID, "com.example")).unwrap();

        let mut entry = table.resource_entry_mut(attr).unwrap();
        let entry = entry.get_or_create(QualifierSet::default()).unwrap();
        entry.value = EntryValue::Bag(Bag {
            parent_id: 0,
            children: vec![
                ResValueMap::new(
                    AttributeType::Formats.id(),
                    ValueType::DecimalInteger,
                    AttributeDataFormat::Flag.mask()
                ),
                ResValueMap::new(top.0, ValueType::HexInteger, 0x30),
                ResValueMap::new(left.0, ValueType::HexInteger, 0x03),
            ]
        });
        (table, attr)
    }

    #[test]
    fn references_cross_packages() {
        let (table, attr) = framework_table();
        let entry = table.resource_entry(attr).unwrap();
        let app = table.package(USER_PACKAGE_ID).unwrap();
        let android = table.package(0x01).unwrap();
        assert_eq!(
            entry.build_reference(app, ValueType::Attribute).unwrap(),
            "?android:attr/gravity"
        );
        assert_eq!(
            entry.build_reference(android, ValueType::Reference).unwrap(),
            "@attr/gravity"
        );
        assert!(matches!(
            entry.build_reference(app, ValueType::String),
            Err(ArscError::NotAReference(_))
        ));
    }

    #[test]
    fn flags_decode_symbolically() {
        let (table, attr) = framework_table();
        let entry = table.resource_entry(attr).unwrap();
        assert_eq!(entry.decode_attribute_data(0x33).as_deref(), Some("top|left"));
        assert_eq!(entry.decode_attribute_data(0x04), None);
        assert_eq!(
            entry.encode_attribute_data("top|left"),
            Some(ResValue::new(ValueType::HexInteger, 0x33))
        );
    }

    #[test]
    fn attribute_data_is_best_effort() {
        let (table, id) = table_with(vec![QualifierSet::default()]);
        let entry = table.resource_entry(id).unwrap();
        assert_eq!(entry.decode_attribute_data(1), None);
        assert_eq!(entry.encode_attribute_data("anything"), None);
    }
}
