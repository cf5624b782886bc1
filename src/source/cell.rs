use crate::error::RustySeekError;
use crate::source::reference::index_to_reference;
use crate::source::SpreadsheetError;
use crate::table::Value;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

const MILLISECONDS_PER_DAY: i64 = 86_400_000;

/// How the raw text of a workbook cell is to be interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// `1` or `0`
    Boolean,
    Number,
    /// Serial day numbers counted from the 1900 epoch
    NumberDateTime1900,
    NumberDate1900,
    NumberTime1900,
    /// Serial day numbers counted from the 1904 epoch
    NumberDateTime1904,
    NumberDate1904,
    NumberTime1904,
    /// ISO 8601 text (`t="d"` cells)
    IsoDateTime,
    InlineString,
    /// Index into the shared string table
    SharedString,
    /// Error literal such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Date and time formats among the built-in number format ids.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Classifies a custom format code by the date and time tokens outside of quoted literals,
    /// escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }
}

/// Literal text of a BIFF error code.
pub(crate) fn to_error_value(code: u8) -> &'static str {
    match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// A non-empty workbook cell as read from the file. Positions are zero-based.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    pub(crate) row: usize,
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    pub(crate) value: String,
}

impl Cell {
    /// A1-style reference, for error messages.
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Converts the raw text into a typed value.
    /// Dates and times become ISO-style strings; error cells keep their literal.
    pub(crate) fn to_value(&self, shared_strings: &[String]) -> Result<Value, RustySeekError> {
        let value = match self.kind {
            CellType::Empty => Value::Null,
            CellType::Boolean => Value::Boolean(self.value == "1" || self.value.eq_ignore_ascii_case("true")),
            CellType::Number => Value::Number(self.to_double()?),
            CellType::NumberDateTime1900 => Value::String(self.to_datetime_string(false, "%Y-%m-%d %H:%M:%S")?),
            CellType::NumberDateTime1904 => Value::String(self.to_datetime_string(true, "%Y-%m-%d %H:%M:%S")?),
            CellType::NumberDate1900 => Value::String(self.to_datetime_string(false, "%Y-%m-%d")?),
            CellType::NumberDate1904 => Value::String(self.to_datetime_string(true, "%Y-%m-%d")?),
            CellType::NumberTime1900 | CellType::NumberTime1904 => Value::String(self.to_time_string()?),
            CellType::IsoDateTime => Value::String(self.value.replacen('T', " ", 1)),
            CellType::InlineString | CellType::Error => Value::String(self.value.to_owned()),
            CellType::SharedString => {
                let text = self
                    .value
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| shared_strings.get(index))
                    .ok_or_else(|| self.value_error())?;
                Value::String(text.to_owned())
            }
        };
        Ok(value)
    }

    fn value_error(&self) -> SpreadsheetError {
        SpreadsheetError::CellValueError(self.reference(), self.value.to_owned())
    }

    fn to_double(&self) -> Result<f64, SpreadsheetError> {
        self.value.trim().parse::<f64>().map_err(|_| self.value_error())
    }

    fn to_datetime_string(&self, is_1904: bool, format: &str) -> Result<String, SpreadsheetError> {
        let serial = self.to_double()?;
        serial_to_datetime(serial, is_1904)
            .map(|datetime| with_fraction(datetime, format))
            .ok_or_else(|| self.value_error())
    }

    fn to_time_string(&self) -> Result<String, SpreadsheetError> {
        let serial = self.to_double()?;
        let milliseconds = (serial.fract().abs() * MILLISECONDS_PER_DAY as f64).round() as i64;
        // A fraction that rounds up to a whole day wraps to midnight
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .zip(Duration::try_milliseconds(milliseconds))
            .and_then(|(midnight, offset)| midnight.checked_add_signed(offset))
            .map(|datetime| with_fraction(datetime, "%H:%M:%S"))
            .ok_or_else(|| self.value_error())
    }
}

/// Appends milliseconds to a time-bearing format only when they are not zero.
fn with_fraction(datetime: NaiveDateTime, format: &str) -> String {
    if format.contains("%S") && datetime.and_utc().timestamp_subsec_millis() > 0 {
        datetime.format(&format!("{format}%.3f")).to_string()
    } else {
        datetime.format(format).to_string()
    }
}

/// Converts a serial day number into a timestamp.
/// The 1900 system keeps Lotus 1-2-3's phantom 1900-02-29, so serials below 60 shift by one day.
fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let total = (serial * MILLISECONDS_PER_DAY as f64).round() as i64;
    let mut days = total.div_euclid(MILLISECONDS_PER_DAY);
    let milliseconds = total.rem_euclid(MILLISECONDS_PER_DAY);
    let epoch = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else {
        if days < 60 {
            days += 1;
        }
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    epoch
        .checked_add_signed(Duration::try_days(days)?)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::try_milliseconds(milliseconds)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell {
            row: 4,
            col: 1,
            kind,
            value: value.to_owned(),
        }
    }

    fn text(kind: CellType, value: &str) -> String {
        cell(kind, value).to_value(&[]).unwrap().to_string()
    }

    #[test]
    fn detects_date_formats() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd hh:mm", true), CellType::NumberDateTime1904);
        assert_eq!(CellType::parse_custom_number_format("[h]:mm:ss", false), CellType::NumberTime1900);
        assert_eq!(CellType::parse_custom_number_format("0.00\"days\"", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]#,##0", false), CellType::Number);
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(CellType::NumberDate1900));
        assert_eq!(CellType::parse_builtin_number_format_id("2", false), None);
    }

    #[test]
    fn renders_serial_dates() {
        assert_eq!(text(CellType::NumberDate1900, "1"), "1900-01-01");
        assert_eq!(text(CellType::NumberDate1900, "61"), "1900-03-01");
        assert_eq!(text(CellType::NumberDate1900, "45296"), "2024-01-05");
        assert_eq!(text(CellType::NumberDate1904, "0"), "1904-01-01");
        assert_eq!(text(CellType::NumberDateTime1900, "45296.5625"), "2024-01-05 13:30:00");
        assert_eq!(text(CellType::NumberTime1900, "0.5625"), "13:30:00");
        assert_eq!(text(CellType::IsoDateTime, "2024-01-05T13:30:00"), "2024-01-05 13:30:00");
    }

    #[test]
    fn converts_scalars() {
        assert_eq!(cell(CellType::Number, "30").to_value(&[]).unwrap(), Value::Number(30.0));
        assert_eq!(cell(CellType::Boolean, "1").to_value(&[]).unwrap(), Value::Boolean(true));
        assert_eq!(cell(CellType::Error, "#DIV/0!").to_value(&[]).unwrap(), Value::from("#DIV/0!"));
        let shared = vec!["Alice".to_owned(), "Bob".to_owned()];
        assert_eq!(cell(CellType::SharedString, "1").to_value(&shared).unwrap(), Value::from("Bob"));
    }

    #[test]
    fn bad_values_are_errors_not_panics() {
        let error = cell(CellType::NumberDate1900, "soon").to_value(&[]).unwrap_err();
        assert_eq!(error.to_string(), "Invalid value 'soon' in cell B5");
        assert!(cell(CellType::SharedString, "7").to_value(&[]).is_err());
    }
}
