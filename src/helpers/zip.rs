//! Part lookup inside an Office Open XML package.

use crate::error::RustySeekError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Finds a part by name, ignoring ASCII case and accepting `\` as a separator.
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustySeekError>;

    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustySeekError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustySeekError> {
        let wanted = name.replace('\\', "/");
        let Some(found) = self
            .file_names()
            .find(|candidate| wanted.eq_ignore_ascii_case(candidate))
            .map(str::to_owned)
        else {
            return Ok(None);
        };
        match self.by_name(&found) {
            Ok(file) => Ok(Some(file)),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustySeekError> {
        Ok(self.file(name)?.map(|file| XmlReader::new(BufReader::new(file))))
    }
}
