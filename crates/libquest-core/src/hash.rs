//! Deterministic synthetic timestamps for events that carry none.
//!
//! Snapshot-derived events have no native time. Instead of stamping them
//! with "now" (which would make every projection of an unchanged log
//! differ), their `startedAt` is a 32-bit polynomial hash of the event's
//! content. The value has no chronological meaning; it only has to be
//! stable.

use serde_json::Value;

use crate::types::event::QuestEvent;

/// Multiplier of the polynomial string hash
pub const HASH_BASE: u32 = 31;

/// Separator between preimage fields
pub const FIELD_SEPARATOR: char = '|';

/// 32-bit unsigned polynomial hash (base 31) over UTF-16 code units,
/// wrapping on overflow.
pub fn polynomial_hash(input: &str) -> u32 {
    input.encode_utf16().fold(0u32, |hash, unit| {
        hash.wrapping_mul(HASH_BASE).wrapping_add(u32::from(unit))
    })
}

/// Build the hash preimage for an event.
/// Format: `type|questId|step|from|to|context-json`, absent fields empty.
///
/// Context is serialized with sorted keys, so two contexts with the same
/// entries always produce the same preimage.
pub fn build_hash_preimage(event: &QuestEvent) -> String {
    let context = event
        .context
        .as_ref()
        .and_then(|ctx| serde_json::to_string(ctx).ok())
        .unwrap_or_default();

    let fields = [
        event.kind.as_str(),
        event.quest_id.as_str(),
        event.step.as_deref().unwrap_or(""),
        event.from.as_deref().unwrap_or(""),
        event.to.as_deref().unwrap_or(""),
        context.as_str(),
    ];

    let mut preimage = String::with_capacity(fields.iter().map(|f| f.len() + 1).sum());
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            preimage.push(FIELD_SEPARATOR);
        }
        preimage.push_str(field);
    }
    preimage
}

/// Content hash of an event, as used for synthetic timestamps
pub fn event_content_hash(event: &QuestEvent) -> u32 {
    polynomial_hash(&build_hash_preimage(event))
}

/// `context.createdAt` when it is a non-negative number
pub fn numeric_created_at(event: &QuestEvent) -> Option<u64> {
    match event.context_value("createdAt")? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    }
}

/// Resolve the time a started quest should report as `startedAt`:
/// the event timestamp, else a numeric `context.createdAt`, else the
/// event's content hash.
pub fn resolve_started_at(event: &QuestEvent) -> u64 {
    event
        .timestamp
        .or_else(|| numeric_created_at(event))
        .unwrap_or_else(|| u64::from(event_content_hash(event)))
}
