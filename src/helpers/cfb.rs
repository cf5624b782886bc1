//! OLE Compound File Binary (CFB) reader.
//! Legacy `.xls` workbooks keep their record stream inside a CFB container, and encrypted
//! Office Open XML packages are wrapped in one as well.

use crate::error::RustySeekError;
use crate::helpers::bytes::le_u16;
use crate::helpers::bytes::le_u32;
use crate::helpers::bytes::le_u64;
use crate::helpers::bytes::le_usize;
use crate::helpers::bytes::le_usize_chunks;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;
const HEADER_SIZE: usize = 512;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const MINI_SECTOR_SIZE: usize = 64;
const MINI_STREAM_CUTOFF: usize = 4096;
// Sector ids at or above this value are markers (end of chain, free, FAT, DIFAT).
const FIRST_SPECIAL_SECTOR: usize = 0xFFFF_FFFB;

#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("File allocation table size mismatch: expect '{0}' sectors, actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Broken sector chain at sector '{0}'")]
    SectorChainError(usize),

    #[error("Empty root directory")]
    RootDirectoryError,
}

/// A parsed compound file held fully in memory.
pub(crate) struct Cfb {
    streams: HashMap<String, Stream>,
    file_allocation_table: Vec<usize>,
    sectors: Sectors,
    mini_file_allocation_table: Vec<usize>,
    mini_sectors: Sectors,
}

/// Directory entry of a stream: first sector and byte length.
#[derive(Debug)]
struct Stream {
    start: usize,
    size: usize,
}

impl Cfb {
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, RustySeekError> {
        let size = reader.seek(SeekFrom::End(0))? as usize;
        if size < HEADER_SIZE {
            Err(CfbError::FileFormatError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data = vec![0u8; size];
        reader.read_exact(&mut data)?;

        let header = Header::parse(&data[..HEADER_SIZE])?;
        let sector_size = header.sector_size()?;
        let sectors = Sectors {
            data,
            size: sector_size,
            // The header occupies the whole first sector
            offset: sector_size,
        };
        let file_allocation_table = load_file_allocation_table(&sectors, &header)?;
        let streams = load_streams(&file_allocation_table, &sectors, &header)?;
        let mini_file_allocation_table = if header.mini_file_allocation_table_count > 0 {
            let bytes = read_chain(&file_allocation_table, &sectors, header.mini_file_allocation_table_start)?;
            le_usize_chunks(&bytes).collect()
        } else {
            Vec::new()
        };
        let mini_data = match streams.get("Root Entry") {
            Some(root) => {
                let mut data = read_chain(&file_allocation_table, &sectors, root.start)?;
                data.truncate(root.size);
                data
            }
            None => Vec::new(),
        };

        Ok(Cfb {
            streams,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors: Sectors {
                data: mini_data,
                size: MINI_SECTOR_SIZE,
                offset: 0,
            },
        })
    }

    pub(crate) fn exists(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    /// Returns the content of a top-level stream, or `None` when no such stream exists.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, RustySeekError> {
        let Some(stream) = self.streams.get(name) else {
            return Ok(None);
        };
        let mut bytes = if stream.size < MINI_STREAM_CUTOFF {
            read_chain(&self.mini_file_allocation_table, &self.mini_sectors, stream.start)?
        } else {
            read_chain(&self.file_allocation_table, &self.sectors, stream.start)?
        };
        if bytes.len() < stream.size {
            Err(CfbError::FileFormatError)?;
        }
        bytes.truncate(stream.size);
        Ok(Some(bytes))
    }
}

/// Builds the file allocation table from the header DIFAT entries and any DIFAT sectors.
fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, RustySeekError> {
    let mut difat: Vec<usize> = le_usize_chunks(&sectors.data[76..HEADER_SIZE]).collect();
    let mut next = header.difat_start;
    let mut visited = 0usize;
    while next < FIRST_SPECIAL_SECTOR {
        visited += 1;
        if visited > header.difat_count {
            Err(CfbError::SectorChainError(next))?;
        }
        let mut entries: Vec<usize> = le_usize_chunks(sectors.get(next)?).collect();
        // The last entry of a DIFAT sector links to the next one
        next = entries.pop().ok_or(CfbError::SectorChainError(next))?;
        difat.extend(entries);
    }

    let mut table = Vec::new();
    let mut count = 0usize;
    for index in difat.into_iter().filter(|index| *index < FIRST_SPECIAL_SECTOR) {
        table.extend(le_usize_chunks(sectors.get(index)?));
        count += 1;
    }
    if count != header.file_allocation_table_count {
        Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?;
    }
    Ok(table)
}

/// Reads the directory and indexes stream entries by name. The first entry with a name wins.
fn load_streams(table: &[usize], sectors: &Sectors, header: &Header) -> Result<HashMap<String, Stream>, RustySeekError> {
    let bytes = read_chain(table, sectors, header.directory_start)?;
    let mut streams = HashMap::new();
    for entry in bytes.chunks_exact(DIRECTORY_ENTRY_SIZE) {
        // Object type 0 marks an unused slot
        if entry[66] == 0 {
            continue;
        }
        let length = (le_u16(&entry[64..66]) as usize).min(64);
        let (name, _) = UTF_16LE.decode_without_bom_handling(&entry[..length]);
        let name = name.trim_end_matches('\0').to_owned();
        let size = if header.major_version == 3 {
            le_u32(&entry[120..124]) as usize
        } else {
            le_u64(&entry[120..128]) as usize
        };
        streams.entry(name).or_insert(Stream {
            start: le_usize(&entry[116..120]),
            size,
        });
    }
    if streams.is_empty() {
        Err(CfbError::RootDirectoryError)?;
    }
    Ok(streams)
}

/// Concatenates the sectors of a chain. Cycles and out-of-range links are reported as errors.
fn read_chain(table: &[usize], sectors: &Sectors, start: usize) -> Result<Vec<u8>, RustySeekError> {
    let mut content = Vec::new();
    let mut index = start;
    let mut steps = 0usize;
    while index < FIRST_SPECIAL_SECTOR {
        steps += 1;
        if steps > table.len() {
            Err(CfbError::SectorChainError(index))?;
        }
        content.extend_from_slice(sectors.get(index)?);
        index = *table.get(index).ok_or(CfbError::SectorChainError(index))?;
    }
    Ok(content)
}

#[derive(Debug)]
struct Sectors {
    data: Vec<u8>,
    size: usize,
    offset: usize,
}

impl Sectors {
    fn get(&self, index: usize) -> Result<&[u8], CfbError> {
        let lower = index
            .checked_mul(self.size)
            .and_then(|position| position.checked_add(self.offset))
            .filter(|lower| *lower < self.data.len())
            .ok_or(CfbError::SectorChainError(index))?;
        let upper = self.data.len().min(lower + self.size);
        Ok(&self.data[lower..upper])
    }
}

#[derive(Debug)]
struct Header {
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_start: usize,
    mini_file_allocation_table_start: usize,
    mini_file_allocation_table_count: usize,
    difat_start: usize,
    difat_count: usize,
}

impl Header {
    fn parse(data: &[u8]) -> Result<Self, RustySeekError> {
        if le_u64(&data[0..8]) != SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }
        Ok(Header {
            major_version: le_u16(&data[26..28]),
            sector_shift: le_u16(&data[30..32]),
            file_allocation_table_count: le_usize(&data[44..48]),
            directory_start: le_usize(&data[48..52]),
            mini_file_allocation_table_start: le_usize(&data[60..64]),
            mini_file_allocation_table_count: le_usize(&data[64..68]),
            difat_start: le_usize(&data[68..72]),
            difat_count: le_usize(&data[72..76]),
        })
    }

    fn sector_size(&self) -> Result<usize, CfbError> {
        match (self.major_version, self.sector_shift) {
            (3, 9) => Ok(512),
            (4, 12) => Ok(4096),
            (version, shift) => Err(CfbError::SectorSizeError(version, shift)),
        }
    }
}

/// Builds a version 3 compound file holding a single stream, for tests of the binary readers.
/// The stream is padded with zeros so it always lives in regular sectors.
#[cfg(test)]
pub(crate) fn build_compound_file(stream_name: &str, stream: &[u8]) -> Vec<u8> {
    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE: u32 = 0xFFFF_FFFF;
    const FAT_SECTOR: u32 = 0xFFFF_FFFD;

    let mut payload = stream.to_vec();
    let padded = payload.len().max(MINI_STREAM_CUTOFF).div_ceil(512) * 512;
    payload.resize(padded, 0);
    let data_sectors = payload.len() / 512;
    assert!(data_sectors + 2 <= 128, "test stream too large");

    let mut header = vec![0u8; 512];
    header[0..8].copy_from_slice(&SIGNATURE.to_le_bytes());
    header[24..26].copy_from_slice(&0x3Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&(MINI_STREAM_CUTOFF as u32).to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    for slot in header[76..512].chunks_exact_mut(4) {
        slot.copy_from_slice(&FREE.to_le_bytes());
    }
    header[76..80].copy_from_slice(&0u32.to_le_bytes());

    let mut fat = vec![FREE; 128];
    fat[0] = FAT_SECTOR;
    fat[1] = END_OF_CHAIN;
    for sector in 0..data_sectors {
        let index = sector + 2;
        fat[index] = if sector + 1 == data_sectors { END_OF_CHAIN } else { index as u32 + 1 };
    }

    let mut directory = vec![0u8; 512];
    let mut write_entry = |slot: usize, name: &str, kind: u8, start: u32, size: u32| {
        let entry = &mut directory[slot * 128..(slot + 1) * 128];
        let units: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        for (index, unit) in units.iter().enumerate() {
            entry[index * 2..index * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        entry[64..66].copy_from_slice(&((units.len() * 2) as u16).to_le_bytes());
        entry[66] = kind;
        for sibling in entry[68..80].chunks_exact_mut(4) {
            sibling.copy_from_slice(&FREE.to_le_bytes());
        }
        entry[116..120].copy_from_slice(&start.to_le_bytes());
        entry[120..124].copy_from_slice(&size.to_le_bytes());
    };
    write_entry(0, "Root Entry", 5, END_OF_CHAIN, 0);
    write_entry(1, stream_name, 2, 2, payload.len() as u32);

    let mut file = header;
    file.extend(fat.iter().flat_map(|value| value.to_le_bytes()));
    file.extend(directory);
    file.extend(payload);
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_stream_from_regular_sectors() {
        let stream: Vec<u8> = (0..5000u32).map(|value| (value % 251) as u8).collect();
        let file = build_compound_file("Workbook", &stream);
        let cfb = Cfb::new(&mut Cursor::new(file)).unwrap();

        assert!(cfb.exists("Workbook"));
        assert!(!cfb.exists("Book"));
        let content = cfb.read("Workbook").unwrap().unwrap();
        assert_eq!(&content[..stream.len()], stream.as_slice());
        assert!(cfb.read("Missing").unwrap().is_none());
    }

    #[test]
    fn rejects_non_ole_content() {
        let mut bytes = b"Name,Age\nAlice,30\n".to_vec();
        bytes.resize(1024, b' ');
        let error = Cfb::new(&mut Cursor::new(bytes)).err().unwrap();
        assert!(matches!(error, RustySeekError::CfbHelperError(CfbError::OleSignatureError)));
    }

    #[test]
    fn rejects_truncated_file() {
        let error = Cfb::new(&mut Cursor::new(vec![0u8; 100])).err().unwrap();
        assert!(matches!(error, RustySeekError::CfbHelperError(CfbError::FileFormatError)));
    }
}
