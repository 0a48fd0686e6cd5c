//! Hidden form field carry-over
//!
//! Every step of the portal's login chain and every search renders a form whose hidden
//! inputs (view-state, event validation, federation tokens) must be echoed back on the
//! next request. [`HiddenFields`] is the value threaded between those steps.
//!
//! Two extractors feed it:
//! - [`parse_inputs`] reads `<input>` elements from a regular HTML page
//! - [`parse_delta_hidden_fields`] reads `hiddenField` entries from an ASP.NET
//!   async-postback (delta) response

use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;

/// Name/value pairs to be posted back to the portal.
///
/// Fields are kept verbatim. Unknown fields are never filtered out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HiddenFields(BTreeMap<String, String>);

impl HiddenFields {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Look up a field value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return a new set where `overrides` replaces any field with the same name
    #[must_use]
    pub fn merged(mut self, overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        self.0.extend(overrides);
        self
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl IntoIterator for HiddenFields {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, String)> for HiddenFields {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for HiddenFields {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Extract `<input name=... value=...>` pairs from the first `<form>` of a page.
///
/// Pages without a form are scanned as a whole. Inputs without a name are skipped and
/// inputs without a value map to the empty string.
pub fn parse_inputs(html: &str) -> HiddenFields {
    let document = Html::parse_document(html);
    let (Ok(form_selector), Ok(input_selector)) =
        (Selector::parse("form"), Selector::parse("input"))
    else {
        return HiddenFields::new();
    };

    let inputs: Vec<_> = match document.select(&form_selector).next() {
        Some(form) => form.select(&input_selector).collect(),
        None => document.select(&input_selector).collect(),
    };

    inputs
        .into_iter()
        .filter_map(|input| {
            let element = input.value();
            let name = element.attr("name")?;
            let value = element.attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// One `length|type|id|content|` entry of an ASP.NET delta response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaEntry {
    /// Entry type (`updatePanel`, `hiddenField`, `pageRedirect`, ...)
    pub kind: String,
    /// Entry id
    pub id: String,
    /// Entry payload
    pub content: String,
}

/// Parse an ASP.NET async-postback response.
///
/// Returns every entry that could be read; parsing stops at the first malformed entry,
/// so a regular HTML body yields an empty list.
pub fn parse_delta(body: &str) -> Vec<DeltaEntry> {
    let mut entries = Vec::new();
    let mut rest = body;

    loop {
        let Some((len, after_len)) = rest.split_once('|') else {
            break;
        };
        let Ok(len) = len.trim().parse::<usize>() else {
            break;
        };
        let Some((kind, after_kind)) = after_len.split_once('|') else {
            break;
        };
        let Some((id, after_id)) = after_kind.split_once('|') else {
            break;
        };
        let Some(content_end) = utf16_prefix_end(after_id, len) else {
            break;
        };
        let content = &after_id[..content_end];
        let Some(tail) = after_id[content_end..].strip_prefix('|') else {
            break;
        };

        entries.push(DeltaEntry {
            kind: kind.to_string(),
            id: id.to_string(),
            content: content.to_string(),
        });
        rest = tail;
    }

    entries
}

/// Byte offset just past the first `units` UTF-16 code units of `s`.
///
/// The length prefix is a JavaScript string length. `None` when `s` is too short or the
/// count ends inside a surrogate pair.
fn utf16_prefix_end(s: &str, units: usize) -> Option<usize> {
    let mut counted = 0;
    for (offset, c) in s.char_indices() {
        if counted == units {
            return Some(offset);
        }
        counted += c.len_utf16();
    }
    (counted == units).then_some(s.len())
}

/// Extract the `hiddenField` entries of an ASP.NET delta response
pub fn parse_delta_hidden_fields(body: &str) -> HiddenFields {
    parse_delta(body)
        .into_iter()
        .filter(|entry| entry.kind == "hiddenField")
        .map(|entry| (entry.id, entry.content))
        .collect()
}
