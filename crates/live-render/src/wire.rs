//! Consumed message shapes and their decoding.
//!
//! The transport hands the engine raw JSON values: one initial payload,
//! then a sequence of diff messages. Decoding is deliberately lenient —
//! the engine has no fatal error class, so unrecognized shapes degrade to
//! the nearest meaningful node instead of failing the whole message. A
//! strict entry point is provided for embedders that want validation.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::node::{DynKey, Statics};

/// Reserved single-letter keys plus the comprehension markers. These are
/// never dynamic slots, at any nesting level.
const METADATA_KEYS: &[&str] = &["s", "p", "c", "t", "e", "r", "entries", "count"];

// ── Error ─────────────────────────────────────────────────────────────────

/// Errors surfaced by [`DiffMessage::decode_strict`] only. The lenient
/// decode path never fails.
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("NOT_AN_OBJECT")]
    NotAnObject,
    #[error("BAD_COMPONENT_TABLE")]
    BadComponentTable,
    #[error("BAD_EVENT_LIST")]
    BadEventList,
    #[error("BAD_TITLE")]
    BadTitle,
}

// ── Wire shapes ───────────────────────────────────────────────────────────

/// Per-message template table: index → fragment array.
pub type TemplateTable = BTreeMap<u64, Vec<String>>;

/// A decoded diff fragment, prior to merging.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffNode {
    Literal(String),
    Ref(i64),
    /// Composite-shaped fragment. `statics: None` means "merge dynamics
    /// into the target", `Some` means "replace the target wholesale".
    Fragment {
        statics: Option<Statics>,
        dynamics: BTreeMap<DynKey, DiffNode>,
        templates: Option<TemplateTable>,
    },
    /// Keyed-list diff, recognized by the presence of `entries`/`count`.
    Comprehension {
        statics: Option<Statics>,
        entries: BTreeMap<u64, EntryDiff>,
        count: Option<u64>,
        templates: Option<TemplateTable>,
    },
}

/// Per-position descriptor inside a comprehension diff.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryDiff {
    /// `{}` — the shared static template with no per-item data.
    Fill,
    /// Bare integer — entry moved verbatim from this pre-merge position.
    Move(u64),
    /// `[old, diff]` — entry moved from `old`, then the diff merged in.
    MoveMerge(u64, BTreeMap<DynKey, DiffNode>),
    /// Any other object — in-place diff on the current occupant.
    Patch(BTreeMap<DynKey, DiffNode>),
}

/// An out-of-band event carried on a diff message, timestamped on arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub action: String,
    pub payload: Value,
    /// Milliseconds since the Unix epoch at the time the carrying message
    /// was applied.
    pub timestamp: u64,
}

/// A fully decoded diff (or initial) message.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffMessage {
    /// Root fragment assembled from the message's non-metadata keys. An
    /// empty message decodes to an empty fragment, which merges as a no-op.
    pub root: DiffNode,
    /// Component upserts from the `c` table, in ascending id order.
    pub components: BTreeMap<i64, DiffNode>,
    /// Out-of-band title from `t`.
    pub title: Option<String>,
    /// `[action, payload]` pairs from `e`, in wire order.
    pub events: Vec<(String, Value)>,
    /// Opaque `r` payload, pass-through only.
    pub reply: Option<Value>,
}

// ── Decoding ──────────────────────────────────────────────────────────────

impl DiffMessage {
    /// Lenient decode. Never fails; unrecognized shapes degrade.
    pub fn decode(value: &Value) -> DiffMessage {
        let mut message = DiffMessage {
            root: DiffNode::Fragment {
                statics: None,
                dynamics: BTreeMap::new(),
                templates: None,
            },
            components: BTreeMap::new(),
            title: None,
            events: Vec::new(),
            reply: None,
        };
        let Some(object) = value.as_object() else {
            trace!("message is not an object; treating as empty diff");
            return message;
        };
        let mut root_map = serde_json::Map::new();
        for (key, child) in object {
            match key.as_str() {
                "c" => message.components = decode_components(child),
                "t" => match child.as_str() {
                    Some(t) => message.title = Some(t.to_owned()),
                    None => trace!("non-string title ignored"),
                },
                "e" => message.events = decode_events(child),
                "r" => message.reply = Some(child.clone()),
                _ => {
                    root_map.insert(key.clone(), child.clone());
                }
            }
        }
        message.root = decode_node(&Value::Object(root_map));
        message
    }

    /// Strict decode: validates the top-level envelope, then reuses the
    /// lenient path for the tree itself.
    pub fn decode_strict(value: &Value) -> Result<DiffMessage, WireError> {
        let object = value.as_object().ok_or(WireError::NotAnObject)?;
        if let Some(c) = object.get("c") {
            if !c.is_object() {
                return Err(WireError::BadComponentTable);
            }
        }
        if let Some(t) = object.get("t") {
            if !t.is_string() {
                return Err(WireError::BadTitle);
            }
        }
        if let Some(e) = object.get("e") {
            let list = e.as_array().ok_or(WireError::BadEventList)?;
            for pair in list {
                let ok = pair
                    .as_array()
                    .map(|p| p.len() >= 2 && p[0].is_string())
                    .unwrap_or(false);
                if !ok {
                    return Err(WireError::BadEventList);
                }
            }
        }
        Ok(DiffMessage::decode(value))
    }
}

/// Decodes one diff fragment from a raw JSON value.
pub fn decode_node(value: &Value) -> DiffNode {
    match value {
        Value::String(s) => DiffNode::Literal(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(id) => DiffNode::Ref(id),
            None => DiffNode::Literal(n.to_string()),
        },
        Value::Bool(b) => DiffNode::Literal(b.to_string()),
        Value::Null => DiffNode::Literal(String::new()),
        Value::Array(items) => {
            // Not a defined node shape; treat as a statics-less sequence.
            let dynamics = items
                .iter()
                .enumerate()
                .map(|(i, item)| (DynKey::Index(i as u64), decode_node(item)))
                .collect();
            DiffNode::Fragment {
                statics: None,
                dynamics,
                templates: None,
            }
        }
        Value::Object(object) => {
            if object.contains_key("entries") || object.contains_key("count") {
                decode_comprehension(object)
            } else {
                DiffNode::Fragment {
                    statics: object.get("s").and_then(decode_statics),
                    dynamics: decode_dynamics(object),
                    templates: object.get("p").and_then(decode_templates),
                }
            }
        }
    }
}

fn decode_comprehension(object: &serde_json::Map<String, Value>) -> DiffNode {
    let mut entries = BTreeMap::new();
    if let Some(raw) = object.get("entries").and_then(Value::as_object) {
        for (key, descriptor) in raw {
            let Ok(position) = key.parse::<u64>() else {
                trace!(%key, "non-numeric comprehension position skipped");
                continue;
            };
            match decode_entry(descriptor) {
                Some(entry) => {
                    entries.insert(position, entry);
                }
                None => trace!(position, "malformed entry descriptor skipped"),
            }
        }
    }
    DiffNode::Comprehension {
        statics: object.get("s").and_then(decode_statics),
        entries,
        count: object.get("count").and_then(Value::as_u64),
        templates: object.get("p").and_then(decode_templates),
    }
}

fn decode_entry(value: &Value) -> Option<EntryDiff> {
    match value {
        Value::Object(object) if object.is_empty() => Some(EntryDiff::Fill),
        Value::Object(object) => Some(EntryDiff::Patch(decode_dynamics(object))),
        Value::Number(n) => n.as_u64().map(EntryDiff::Move),
        Value::Array(items) => {
            let old = items.first().and_then(Value::as_u64)?;
            match items.get(1).and_then(Value::as_object) {
                Some(diff) => Some(EntryDiff::MoveMerge(old, decode_dynamics(diff))),
                None => Some(EntryDiff::Move(old)),
            }
        }
        _ => None,
    }
}

/// Dynamic slots of a composite-shaped object: every key that is not
/// reserved metadata.
fn decode_dynamics(object: &serde_json::Map<String, Value>) -> BTreeMap<DynKey, DiffNode> {
    object
        .iter()
        .filter(|(key, _)| !METADATA_KEYS.contains(&key.as_str()))
        .map(|(key, child)| (DynKey::parse(key), decode_node(child)))
        .collect()
}

fn decode_statics(value: &Value) -> Option<Statics> {
    match value {
        Value::Array(items) => Some(Statics::Inline(decode_fragments(items))),
        Value::String(s) => Some(Statics::Text(s.clone())),
        Value::Number(n) => n.as_i64().map(Statics::Ref),
        _ => {
            trace!("unrecognized statics shape ignored");
            None
        }
    }
}

fn decode_fragments(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
        .collect()
}

fn decode_templates(value: &Value) -> Option<TemplateTable> {
    let mut table = TemplateTable::new();
    match value {
        Value::Array(rows) => {
            for (index, row) in rows.iter().enumerate() {
                if let Some(items) = row.as_array() {
                    table.insert(index as u64, decode_fragments(items));
                }
            }
        }
        Value::Object(rows) => {
            for (key, row) in rows {
                if let (Ok(index), Some(items)) = (key.parse::<u64>(), row.as_array()) {
                    table.insert(index, decode_fragments(items));
                }
            }
        }
        _ => return None,
    }
    Some(table)
}

fn decode_components(value: &Value) -> BTreeMap<i64, DiffNode> {
    let mut components = BTreeMap::new();
    let Some(object) = value.as_object() else {
        trace!("component table is not an object; ignored");
        return components;
    };
    for (key, child) in object {
        match key.parse::<i64>() {
            Ok(id) => {
                components.insert(id, decode_node(child));
            }
            Err(_) => trace!(%key, "non-integer component id skipped"),
        }
    }
    components
}

fn decode_events(value: &Value) -> Vec<(String, Value)> {
    let Some(list) = value.as_array() else {
        trace!("event list is not an array; ignored");
        return Vec::new();
    };
    let mut events = Vec::with_capacity(list.len());
    for pair in list {
        let Some(items) = pair.as_array() else {
            trace!("event entry is not a pair; skipped");
            continue;
        };
        let Some(action) = items.first().and_then(Value::as_str) else {
            trace!("event entry has no action; skipped");
            continue;
        };
        let Some(payload) = items.get(1).cloned() else {
            trace!(action, "event entry has no payload; skipped");
            continue;
        };
        events.push((action.to_owned(), payload));
    }
    events
}

// ── Tests ─────────────────────────────────────────────────────────────────
