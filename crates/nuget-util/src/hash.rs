/// Compute the BLAKE3 hash of a byte slice, returning the hex-encoded digest.
#[must_use]
pub fn blake3_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Combine digests into one without regard to their order.
///
/// The parts are sorted before hashing, so any permutation of the same
/// multiset of digests produces the same result. A `tag` is mixed in first
/// so that callers can keep different kinds of values apart.
#[must_use]
pub fn combine_unordered(tag: &[u8], mut parts: Vec<[u8; 32]>) -> [u8; 32] {
    parts.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    hasher.update(&(tag.len() as u64).to_le_bytes());
    hasher.update(tag);
    hasher.update(&(parts.len() as u64).to_le_bytes());
    for part in &parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
