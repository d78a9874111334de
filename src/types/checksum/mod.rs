#![forbid(unsafe_code)]

/// CRC32 over a store header prefix, seeded with the store name so that a file
/// renamed to another store's name fails validation.
pub fn header_crc32(store_name: &str, header: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&(store_name.len() as u32).to_le_bytes());
    hasher.update(store_name.as_bytes());
    hasher.update(header);
    hasher.finalize()
}
