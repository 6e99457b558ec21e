//! `docsync://` URLs for link targets with no native form on a side

use crate::id::StableId;
use crate::tree::LinkTarget;

pub const SCHEME: &str = "docsync://";

const STABLE: &str = "stable/";
const LOCAL: &str = "local/";
const REMOTE: &str = "remote/";
const BROKEN: &str = "broken/";

/// URL for any target. `Url` targets are returned unchanged.
pub fn target_to_url(target: &LinkTarget) -> String {
    match target {
        LinkTarget::Resolved(id) => format!("{SCHEME}{STABLE}{id}"),
        LinkTarget::Local(name) => format!("{SCHEME}{LOCAL}{}", encode_component(name)),
        LinkTarget::Remote(id) => format!("{SCHEME}{REMOTE}{}", encode_component(id)),
        LinkTarget::Tombstone(name) => format!("{SCHEME}{BROKEN}{}", encode_component(name)),
        LinkTarget::Url(url) => url.clone(),
    }
}

/// Inverse of [`target_to_url`]; anything unrecognized is a plain URL.
pub fn url_to_target(url: &str) -> LinkTarget {
    let Some(rest) = url.strip_prefix(SCHEME) else {
        return LinkTarget::Url(url.to_string());
    };
    if let Some(id) = rest.strip_prefix(STABLE)
        && let Ok(id) = id.parse::<StableId>()
    {
        return LinkTarget::Resolved(id);
    }
    if let Some(name) = rest.strip_prefix(LOCAL) {
        return LinkTarget::Local(decode_component(name));
    }
    if let Some(id) = rest.strip_prefix(REMOTE) {
        return LinkTarget::Remote(decode_component(id));
    }
    if let Some(name) = rest.strip_prefix(BROKEN) {
        return LinkTarget::Tombstone(decode_component(name));
    }
    LinkTarget::Url(url.to_string())
}

fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '(' => out.push_str("%28"),
            ')' => out.push_str("%29"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '\n' => out.push_str("%0A"),
            other => out.push(other),
        }
    }
    out
}

fn decode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let escape = rest.get(idx + 1..idx + 3);
        let decoded = match escape {
            Some("25") => Some('%'),
            Some("20") => Some(' '),
            Some("28") => Some('('),
            Some("29") => Some(')'),
            Some("3C") => Some('<'),
            Some("3E") => Some('>'),
            Some("0A") => Some('\n'),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[idx + 3..];
            }
            None => {
                out.push('%');
                rest = &rest[idx + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}
