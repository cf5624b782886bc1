//! A1-style cell references.

/// Rows in one worksheet.
pub(crate) const MAX_ROWS: usize = 1_048_576;
/// Columns in one worksheet.
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Parses a reference such as `B3` or `$AA$10` into zero-based `(row, col)`.
///
/// References past `XFD1048576` are rejected.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim();
    let split = reference
        .char_indices()
        .find(|(_, character)| character.is_ascii_digit())
        .map(|(index, _)| index)?;
    let (letters, digits) = reference.split_at(split);
    let letters = letters.trim_matches('$');
    if letters.is_empty() || !letters.chars().all(|character| character.is_ascii_alphabetic()) {
        return None;
    }

    let col = letters.chars().try_fold(0usize, |acc, character| {
        let digit = (character.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })?;
    let row = digits.parse::<usize>().ok().filter(|row| (1..=MAX_ROWS).contains(row))?;
    (col <= MAX_COLUMNS).then_some((row - 1, col - 1))
}

/// Formats zero-based `(row, col)` as an A1-style reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut col = col + 1;
    while col > 0 {
        let remainder = (col - 1) % 26;
        letters.push((b'A' + remainder as u8) as char);
        col = (col - 1) / 26;
    }
    let letters: String = letters.into_iter().rev().collect();
    format!("{letters}{}", row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_references() {
        assert_eq!(reference_to_index("A1"), Some((0, 0)));
        assert_eq!(reference_to_index("b3"), Some((2, 1)));
        assert_eq!(reference_to_index("$AA$10"), Some((9, 26)));
        assert_eq!(reference_to_index("XFD1048576"), Some((1_048_575, 16_383)));
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("A"), None);
    }

    #[test]
    fn rejects_references_outside_the_grid() {
        assert_eq!(reference_to_index("A1048577"), None);
        assert_eq!(reference_to_index("XFE1"), None);
        assert_eq!(reference_to_index("A999999999999999999"), None);
        assert_eq!(reference_to_index("A99999999999999999999999"), None);
        assert_eq!(reference_to_index("ZZZZZZZZZZZZZZZ1"), None);
    }

    #[test]
    fn formats_references() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(4, 25), "Z5");
        assert_eq!(index_to_reference(9, 26), "AA10");
        assert_eq!(index_to_reference(0, 16_383), "XFD1");
    }
}
