//! Little-endian field access for the binary workbook formats.
//! Callers slice the exact field width before converting, so a short slice is a caller bug.

/// Reads a little-endian `u16` from the first two bytes.
#[inline]
pub(crate) fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Reads a little-endian `u32` from the first four bytes.
#[inline]
pub(crate) fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Reads a little-endian `u64` from the first eight bytes.
#[inline]
pub(crate) fn le_u64(bytes: &[u8]) -> u64 {
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buffer)
}

/// Reads a little-endian `u32` and widens it to `usize`.
#[inline]
pub(crate) fn le_usize(bytes: &[u8]) -> usize {
    le_u32(bytes) as usize
}

/// Splits a byte slice into little-endian `u32` sector identifiers.
/// A trailing partial chunk is ignored.
pub(crate) fn le_usize_chunks(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bytes.chunks_exact(4).map(le_usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let bytes = [0x34, 0x12, 0x78, 0x56, 0x00, 0x00, 0x00, 0x80];
        assert_eq!(le_u16(&bytes), 0x1234);
        assert_eq!(le_u32(&bytes), 0x5678_1234);
        assert_eq!(le_u64(&bytes), 0x8000_0000_5678_1234);
        assert_eq!(le_usize(&bytes[2..]), 0x5678);
    }

    #[test]
    fn chunks_skip_trailing_bytes() {
        let bytes = [1, 0, 0, 0, 2, 0, 0, 0, 9];
        assert_eq!(le_usize_chunks(&bytes).collect::<Vec<_>>(), vec![1, 2]);
    }
}
