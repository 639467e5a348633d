//! Recommendation fingerprint.
//!
//! `fingerprint = xxhash64(required + per-line(quote_id, a, b, cost bits) + total_cost bits + shortfall)`
//!
//! Two recommendations computed from unchanged inputs hash identically; any
//! change in split, price or shortfall changes the hash. Costs are hashed by
//! their exact bit pattern, never by a rounded display value.

use xxhash_rust::xxh64::xxh64;

use crate::allocation::Recommendation;

pub fn recommendation_fingerprint(recommendation: &Recommendation) -> u64 {
    // 0xFF separates fields so that adjacent values cannot alias.
    let mut buf = Vec::with_capacity(32 + recommendation.lines.len() * 32);

    buf.extend_from_slice(&recommendation.required_containers.to_le_bytes());
    buf.push(0xFF);
    for line in &recommendation.lines {
        buf.extend_from_slice(&line.quote_id.0.to_le_bytes());
        buf.extend_from_slice(&line.split.a.to_le_bytes());
        buf.extend_from_slice(&line.split.b.to_le_bytes());
        buf.extend_from_slice(&line.cost.to_bits().to_le_bytes());
        buf.push(0xFF);
    }
    buf.extend_from_slice(&recommendation.total_cost.to_bits().to_le_bytes());
    buf.push(0xFF);
    buf.extend_from_slice(&recommendation.shortfall.to_le_bytes());

    xxh64(&buf, 0)
}

/// Hex form used in logs.
pub fn format_fingerprint(fingerprint: u64) -> String {
    format!("{fingerprint:016x}")
}
