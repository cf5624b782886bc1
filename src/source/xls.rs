use crate::error::ResultOptionChain;
use crate::error::RustySeekError;
use crate::for_each_biff8_record;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::source::cell::to_error_value;
use crate::source::cell::Cell;
use crate::source::cell::CellType;
use crate::source::excel;
use crate::source::reference::index_to_reference;
use crate::source::sheet::Sheet;
use crate::source::SpreadsheetError;
use crate::source::Workbook;
use crate::table::format_number;
use crate::table::Table;
use either::Either;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use thiserror::Error;

// BIFF8 record types
const FORMULA: u16 = 0x0006;
const EOF: u16 = 0x000A;
const DATE1904: u16 = 0x0022;
const FILE_PASS: u16 = 0x002F;
const BOUND_SHEET8: u16 = 0x0085;
const MUL_RK: u16 = 0x00BD;
const XF: u16 = 0x00E0;
const SST: u16 = 0x00FC;
const LABEL_SST: u16 = 0x00FD;
const NUMBER: u16 = 0x0203;
const LABEL: u16 = 0x0204;
const BOOL_ERR: u16 = 0x0205;
const STRING: u16 = 0x0207;
const ARRAY: u16 = 0x0221;
const RK: u16 = 0x027E;
const FORMAT: u16 = 0x041E;
const SHARED_FORMULA: u16 = 0x04BC;
const BOF: u16 = 0x0809;

/// Columns in a BIFF8 worksheet.
const MAX_COLUMNS: usize = 256;

#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid formula result '{0:#018x}'")]
    FormulaValueError(u64),

    #[error("Workbook stream not found")]
    WorkbookStreamError,
}

/// Either a fixed cell type or an XF index whose number format decides the type.
type CellKind = Either<CellType, usize>;

/// An Excel 97-2003 workbook (`.xls`).
pub(crate) struct XlsWorkbook {
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    number_formats: Vec<CellType>,
    /// Worksheet names with the stream offset of their BOF record
    sheets: Vec<(String, usize)>,
}

impl XlsWorkbook {
    pub(crate) fn open(path: &Path) -> Result<XlsWorkbook, RustySeekError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::from_reader(&mut reader, &path.display().to_string())
    }

    /// Reads the workbook globals substream: date system, formats, shared strings and sheets.
    pub(crate) fn from_reader<RS: Read + Seek>(source: &mut RS, name: &str) -> Result<XlsWorkbook, RustySeekError> {
        let cfb = Cfb::new(source)?;
        let mut reader = cfb
            .read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or(XlsError::WorkbookStreamError)?;

        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats = HashMap::<String, CellType>::new();
        let mut format_indexes = Vec::<String>::new();
        let mut sheets = Vec::<(String, usize)>::new();
        for_each_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::SpreadsheetPasswordProtectedError(name.to_owned()))?,
            DATE1904 => is_1904 = reader.read_u16()? == 1,
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                // Moved to the 1904 epoch once all globals are read
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, false));
            }
            XF => {
                reader.skip(2)?;
                format_indexes.push(reader.read_u16()?.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                let _visibility = reader.read_u8()?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                // Type 0 is a worksheet; macro, chart and VBA sheets hold no table
                if sheet_type == 0 {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?;
        }

        let custom_formats = custom_formats
            .into_iter()
            .map(|(id, kind)| (id, to_epoch(kind, is_1904)))
            .collect();
        let number_formats = excel::number_format_types(&format_indexes, &custom_formats, is_1904);

        Ok(XlsWorkbook {
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }

    fn resolve(&self, kind: CellKind) -> CellType {
        match kind {
            Either::Left(kind) => kind,
            Either::Right(index) => self.number_formats.get(index).copied().unwrap_or(CellType::Number),
        }
    }
}

impl Workbook for XlsWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_sheet(&mut self, index: usize) -> Result<Table, RustySeekError> {
        let pointer = self
            .sheets
            .get(index)
            .map(|(_, pointer)| *pointer)
            .ok_or_else(|| SpreadsheetError::FileError(format!("sheet #{index}")))?;
        let mut sheet = Sheet::new();

        self.reader.goto(pointer);
        // Consume the sheet's own BOF
        self.reader.next()?;
        while let Some(tag) = self.reader.next()? {
            match tag {
                BOF | EOF => break,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let first = self.reader.read_u16()? as usize;
                    // rw, colFirst and colLast surround 6-byte RkRec entries
                    let count = self.reader.record_len().saturating_sub(6) / 6;
                    if first + count > MAX_COLUMNS {
                        Err(SpreadsheetError::CellReferenceError(index_to_reference(row, first + count - 1)))?;
                    }
                    for col in first..first + count {
                        let xf = self.reader.read_u16()? as usize;
                        let number = self.reader.read_rk_number()?;
                        sheet.push(Cell {
                            row,
                            col,
                            kind: self.resolve(Either::Right(xf)),
                            value: format_number(number),
                        });
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    if col >= MAX_COLUMNS {
                        Err(SpreadsheetError::CellReferenceError(index_to_reference(row, col)))?;
                    }
                    let (kind, value) = match tag {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => read_number_cell(&mut self.reader)?,
                        RK => read_rk_cell(&mut self.reader)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        _ => read_formula_cell(&mut self.reader)?,
                    };
                    if !value.is_empty() {
                        sheet.push(Cell {
                            row,
                            col,
                            kind: self.resolve(kind),
                            value,
                        });
                    }
                }
                _ => (),
            }
        }
        sheet.into_table(&self.shared_strings)
    }
}

/// Moves a date or time type to the workbook's date system.
fn to_epoch(kind: CellType, is_1904: bool) -> CellType {
    match (kind, is_1904) {
        (CellType::NumberDateTime1900, true) => CellType::NumberDateTime1904,
        (CellType::NumberDate1900, true) => CellType::NumberDate1904,
        (CellType::NumberTime1900, true) => CellType::NumberTime1904,
        (kind, _) => kind,
    }
}

/// SST: total and unique counts followed by the unique strings, possibly spanning CONTINUE records.
fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, RustySeekError> {
    reader.skip(4)?;
    let count = reader.read_usize()?;
    let mut shared_strings = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), RustySeekError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let is_error = reader.read_u8()? != 0;
    Ok(if is_error {
        (Either::Left(CellType::Error), to_error_value(value).to_owned())
    } else {
        (Either::Left(CellType::Boolean), value.to_string())
    })
}

fn read_number_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), RustySeekError> {
    let xf = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((Either::Right(xf), format_number(value)))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), RustySeekError> {
    let xf = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((Either::Right(xf), format_number(value)))
}

fn read_label_sst_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), RustySeekError> {
    reader.skip(2)?;
    let index = reader.read_usize()?;
    Ok((Either::Left(CellType::SharedString), index.to_string()))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), RustySeekError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((Either::Left(CellType::InlineString), value))
}

/// Cached result of a formula.
///
/// A double is stored inline. Other results are tagged by the low byte when the top two bytes
/// are `0xFFFF`: 0 string (in the following STRING record), 1 boolean, 2 error, 3 empty string.
fn read_formula_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), RustySeekError> {
    let xf = reader.read_u16()? as usize;
    let result = reader.read_u64()?;
    if result & 0xFFFF_0000_0000_0000 != 0xFFFF_0000_0000_0000 {
        return Ok((Either::Right(xf), format_number(f64::from_bits(result))));
    }
    match result & 0xFF {
        0 => {
            // Shared and array formula definitions may sit between the cell and its string
            while let Some(kind) = reader.next()? {
                match kind {
                    STRING => return Ok((Either::Left(CellType::InlineString), reader.read_xl_unicode_string()?)),
                    SHARED_FORMULA | ARRAY => continue,
                    _ => break,
                }
            }
            Err(XlsError::FormulaValueError(result))?
        }
        1 => {
            let value = if (result >> 16) & 0xFF != 0 { "1" } else { "0" };
            Ok((Either::Left(CellType::Boolean), value.to_owned()))
        }
        2 => {
            let code = ((result >> 16) & 0xFF) as u8;
            Ok((Either::Left(CellType::Error), to_error_value(code).to_owned()))
        }
        3 => Ok((Either::Left(CellType::InlineString), String::new())),
        _ => Err(XlsError::FormulaValueError(result))?,
    }
}
