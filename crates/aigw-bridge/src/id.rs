//! Tool call identifier canonicalization
//!
//! Workers AI validates `tool_call_id` against `[a-zA-Z0-9]{9}` but emits
//! ids such as `chatcmpl-tool-875d3ec6179676ae` itself, which it then
//! rejects when they are echoed back. Every id crossing the bridge is
//! forced into the accepted shape.

/// Length of a canonical tool call id
pub const TOOL_CALL_ID_LEN: usize = 9;

/// Canonicalize an arbitrary string into a 9-character alphanumeric id
///
/// Non-alphanumeric characters are dropped, the rest is truncated to nine
/// characters and right-padded with `'0'`. Canonical ids map to themselves.
pub fn canonicalize(id: &str) -> String {
    let mut canonical: String = id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(TOOL_CALL_ID_LEN)
        .collect();

    while canonical.len() < TOOL_CALL_ID_LEN {
        canonical.push('0');
    }

    canonical
}

/// Number of distinct canonical ids [`synthesize`] can produce (36^9)
const ID_SPACE: u64 = 101_559_956_668_416;

/// Generate the canonical id for tool call `index` of a stream seeded with `seed`
///
/// Ids are `seed + index` in zero-padded lowercase base 36, so every `u32`
/// index of one stream gets a distinct id.
pub fn synthesize(seed: u64, index: u32) -> String {
    let mut value = (seed % ID_SPACE + u64::from(index)) % ID_SPACE;
    let mut digits = [b'0'; TOOL_CALL_ID_LEN];

    for digit in digits.iter_mut().rev() {
        let remainder = u8::try_from(value % 36).unwrap_or_default();
        *digit = if remainder < 10 { b'0' + remainder } else { b'a' + remainder - 10 };
        value /= 36;
    }

    digits.iter().map(|&b| char::from(b)).collect()
}

/// Whether `id` is already in canonical form
pub fn is_canonical(id: &str) -> bool {
    id.len() == TOOL_CALL_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())
}
