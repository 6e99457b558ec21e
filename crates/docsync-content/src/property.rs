//! Typed document properties (remote database columns / local frontmatter)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::tree::LinkReference;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    /// Always sorted and free of duplicates; build with [`PropertyValue::tags`].
    Tags(Vec<String>),
    Reference(LinkReference),
    /// A native value with no typed equivalent, kept verbatim.
    Unmapped(serde_json::Value),
}

impl PropertyValue {
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        tags.sort();
        tags.dedup();
        Self::Tags(tags)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    fn normalize(self) -> Self {
        match self {
            Self::Tags(tags) => Self::tags(tags),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

/// Ordered, name-unique property mapping.
///
/// Names are case-preserving and compared exactly, so `Tags` and `tags`
/// are two properties. Insertion order is kept for rendering; equality
/// ignores it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertySet {
    entries: Vec<Property>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace in place; returns the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        let name = name.into();
        let value = value.normalize();
        match self.entries.iter_mut().find(|p| p.name == name) {
            Some(existing) => Some(std::mem::replace(&mut existing.value, value)),
            None => {
                self.entries.push(Property { name, value });
                None
            }
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let idx = self.entries.iter().position(|p| p.name == name)?;
        Some(self.entries.remove(idx).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|p| (p.name.as_str(), &p.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by name, for canonical comparisons.
    pub fn sorted(&self) -> Vec<&Property> {
        let mut sorted: Vec<&Property> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        sorted
    }

    /// Whether both sets hold the same names and values, ignoring order.
    pub fn same_values(&self, other: &PropertySet) -> bool {
        self.sorted() == other.sorted()
    }

    /// No name is present in both sets with different values.
    pub fn agrees_with(&self, other: &PropertySet) -> bool {
        self.iter()
            .all(|(name, value)| other.get(name).is_none_or(|theirs| theirs == value))
    }

    /// Union of both sets; `self` wins on name collisions.
    pub fn union(&self, other: &PropertySet) -> PropertySet {
        let mut merged = self.clone();
        for (name, value) in other.iter() {
            if merged.get(name).is_none() {
                merged.insert(name, value.clone());
            }
        }
        merged
    }

    pub fn for_each_link_mut(&mut self, mut f: impl FnMut(&mut LinkReference)) {
        for property in &mut self.entries {
            if let PropertyValue::Reference(link) = &mut property.value {
                f(link);
            }
        }
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkReference> {
        self.entries.iter().filter_map(|p| match &p.value {
            PropertyValue::Reference(link) => Some(link),
            _ => None,
        })
    }
}

impl PartialEq for PropertySet {
    fn eq(&self, other: &Self) -> bool {
        self.same_values(other)
    }
}

impl FromIterator<(String, PropertyValue)> for PropertySet {
    fn from_iter<T: IntoIterator<Item = (String, PropertyValue)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}
