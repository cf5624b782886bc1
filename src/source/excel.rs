//! Pieces shared by the xlsx and xls readers.

use crate::error::RustySeekError;
use crate::helpers::cfb::Cfb;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::source::cell::CellType;
use crate::source::SpreadsheetError;
use crate::xml_events;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Maps relationship ids to the package paths of worksheet parts.
///
/// # Arguments
/// * `zip` - Open package
/// * `path` - Relationship part to read, such as `xl/_rels/workbook.xml.rels`
pub(super) fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>, path: &str) -> Result<HashMap<String, String>, RustySeekError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()))?;
    let mut relationships = HashMap::new();
    xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|kind| kind.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.into_owned(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves the cell type of every cell format (XF) from its number format id.
/// Custom formats take precedence over built-in ids; anything unknown is a plain number.
pub(super) fn number_format_types(format_indexes: &[String], custom_formats: &HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the package.
pub(super) fn to_zip_path(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_owned()
    } else if target.starts_with("xl/") {
        target.to_owned()
    } else {
        format!("xl/{target}")
    }
}

/// Encrypted Office Open XML packages are stored as compound files holding an
/// `EncryptedPackage` stream instead of a plain zip archive.
pub(super) fn is_password_protected<RS: Read + Seek>(reader: &mut RS) -> Result<bool, RustySeekError> {
    let mut signature = [0u8; 8];
    reader.seek(SeekFrom::Start(0))?;
    let is_compound_file = match reader.read_exact(&mut signature) {
        Ok(()) => signature == OLE_SIGNATURE,
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(error) => Err(error)?,
    };
    let is_protected = is_compound_file && Cfb::new(reader)?.exists("EncryptedPackage");
    reader.seek(SeekFrom::Start(0))?;
    Ok(is_protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::cfb::build_compound_file;
    use std::io::Cursor;

    #[test]
    fn normalizes_targets() {
        assert_eq!(to_zip_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn custom_formats_override_builtin_ids() {
        let indexes = vec!["0".to_owned(), "14".to_owned(), "164".to_owned(), "14".to_owned()];
        let mut custom = HashMap::new();
        custom.insert("164".to_owned(), CellType::NumberTime1900);
        let types = number_format_types(&indexes, &custom, false);
        assert_eq!(
            types,
            vec![CellType::Number, CellType::NumberDate1900, CellType::NumberTime1900, CellType::NumberDate1900]
        );
    }

    #[test]
    fn detects_encrypted_packages() {
        let mut encrypted = Cursor::new(build_compound_file("EncryptedPackage", b"secret"));
        assert!(is_password_protected(&mut encrypted).unwrap());
        assert_eq!(encrypted.position(), 0);

        let mut plain = Cursor::new(b"PK\x03\x04 not really a zip".to_vec());
        assert!(!is_password_protected(&mut plain).unwrap());
        let mut tiny = Cursor::new(b"PK".to_vec());
        assert!(!is_password_protected(&mut tiny).unwrap());
    }
}
