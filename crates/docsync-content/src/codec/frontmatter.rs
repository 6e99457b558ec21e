//! YAML frontmatter <-> properties and identity claim

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_yaml::{Mapping, Value as Yaml};

use crate::codec::inline;
use crate::document::ConversionNote;
use crate::id::{CLAIM_KEY, StableId};
use crate::property::{PropertySet, PropertyValue};
use crate::tree::Span;

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Split `---` delimited frontmatter from the body.
///
/// Returns `(None, text)` when the text does not open with a delimiter
/// or the block is never closed.
pub fn split(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, text)
}

pub struct Parsed {
    pub properties: PropertySet,
    pub claim: Option<StableId>,
}

/// Read frontmatter as a property mapping.
///
/// `None` means the block is not a string-keyed mapping and must be kept
/// verbatim by the caller.
pub fn parse(raw: &str, notes: &mut Vec<ConversionNote>) -> Option<Parsed> {
    let value: Yaml = serde_yaml::from_str(raw).ok()?;
    let mapping = match value {
        Yaml::Null => Mapping::new(),
        Yaml::Mapping(mapping) => mapping,
        _ => return None,
    };

    let mut properties = PropertySet::new();
    let mut claim = None;
    for (key, value) in mapping {
        let Yaml::String(name) = key else {
            return None;
        };
        if name == CLAIM_KEY {
            match value.as_str().map(str::parse::<StableId>) {
                Some(Ok(id)) => claim = Some(id),
                _ => notes.push(ConversionNote::new(
                    format!("frontmatter.{CLAIM_KEY}"),
                    "ignored malformed identity claim",
                )),
            }
            continue;
        }
        let value = to_property(&name, value, notes);
        properties.insert(name, value);
    }
    Some(Parsed { properties, claim })
}

fn to_property(name: &str, value: Yaml, notes: &mut Vec<ConversionNote>) -> PropertyValue {
    match value {
        Yaml::String(s) => string_property(s),
        Yaml::Bool(b) => PropertyValue::Bool(b),
        Yaml::Number(n) => match n.as_f64() {
            Some(n) => PropertyValue::Number(n),
            None => PropertyValue::Unmapped(serde_json::Value::String(n.to_string())),
        },
        Yaml::Sequence(items) if items.iter().all(Yaml::is_string) => {
            PropertyValue::tags(items.iter().filter_map(Yaml::as_str))
        }
        other => match serde_json::to_value(&other) {
            Ok(json) => PropertyValue::Unmapped(json),
            Err(_) => {
                notes.push(ConversionNote::new(
                    format!("frontmatter.{name}"),
                    "value kept as YAML text",
                ));
                PropertyValue::Text(serde_yaml::to_string(&other).unwrap_or_default())
            }
        },
    }
}

fn string_property(s: String) -> PropertyValue {
    if ISO_DATE.is_match(&s)
        && let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d")
    {
        return PropertyValue::Date(date);
    }
    if let [Span::Link(link)] = inline::parse_spans(&s).as_slice()
        && link.marks.is_plain()
    {
        return PropertyValue::Reference(link.clone());
    }
    PropertyValue::Text(s)
}

fn to_yaml(value: &PropertyValue) -> Yaml {
    match value {
        PropertyValue::Text(s) => Yaml::String(s.clone()),
        PropertyValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                Yaml::Number((*n as i64).into())
            } else {
                Yaml::Number((*n).into())
            }
        }
        PropertyValue::Bool(b) => Yaml::Bool(*b),
        PropertyValue::Date(date) => Yaml::String(date.format("%Y-%m-%d").to_string()),
        PropertyValue::Tags(tags) => {
            Yaml::Sequence(tags.iter().cloned().map(Yaml::String).collect())
        }
        PropertyValue::Reference(link) => {
            let mut out = String::new();
            inline::render_link(link, &mut out);
            Yaml::String(out)
        }
        PropertyValue::Unmapped(json) => serde_yaml::to_value(json).unwrap_or(Yaml::Null),
    }
}

/// Render the frontmatter block, or an empty string when there is nothing to say.
pub fn render(properties: &PropertySet, claim: Option<StableId>) -> String {
    let mut mapping = Mapping::new();
    if let Some(id) = claim {
        mapping.insert(Yaml::String(CLAIM_KEY.to_string()), Yaml::String(id.to_string()));
    }
    for (name, value) in properties.iter() {
        mapping.insert(Yaml::String(name.to_string()), to_yaml(value));
    }
    if mapping.is_empty() {
        return String::new();
    }

    let yaml = serde_yaml::to_string(&mapping).unwrap_or_default();
    let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);
    format!("---\n{yaml}---\n")
}
