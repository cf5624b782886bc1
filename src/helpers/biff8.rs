//! Record reader for the BIFF8 stream of Excel 97-2003 workbooks.
//! A logical record may be split over trailing CONTINUE records; reads walk across those
//! chunks transparently, and string reads honour the option byte that restarts each chunk.

use crate::error::RustySeekError;
use encoding_rs::UTF_16LE;
use thiserror::Error;

const CONTINUE: u16 = 0x003C;

#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining in record")]
    NoEnoughDataError(usize),
}

pub(crate) struct Biff8Reader {
    buffer: Vec<u8>,
    // Position of the next record header
    pointer: usize,
    // Byte ranges of the current record and its CONTINUE records
    chunks: Vec<(usize, usize)>,
    index: usize,
    offset: usize,
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Advances to the next record and returns its type, or `None` at the end of the stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, RustySeekError> {
        if self.pointer + 4 > self.buffer.len() {
            return Ok(None);
        }
        self.chunks.clear();
        self.index = 0;
        self.offset = 0;

        let kind = self.u16_at(self.pointer);
        self.push_chunk()?;
        while self.pointer + 4 <= self.buffer.len() && self.u16_at(self.pointer) == CONTINUE {
            self.push_chunk()?;
        }
        Ok(Some(kind))
    }

    fn push_chunk(&mut self) -> Result<(), Biff8Error> {
        let size = self.u16_at(self.pointer + 2) as usize;
        let lower = self.pointer + 4;
        let upper = lower + size;
        if upper > self.buffer.len() {
            return Err(Biff8Error::NoEnoughDataError(size));
        }
        self.chunks.push((lower, upper));
        self.pointer = upper;
        Ok(())
    }

    /// Moves to an absolute stream offset, as found in BOUNDSHEET8 records.
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
        self.chunks.clear();
    }

    /// Total payload size of the current record including its continuations.
    pub(crate) fn record_len(&self) -> usize {
        self.chunks.iter().map(|(lower, upper)| upper - lower).sum()
    }

    #[inline]
    fn u16_at(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.buffer[index], self.buffer[index + 1]])
    }

    /// Reads up to `length` bytes from one chunk.
    /// A read positioned at the end of a chunk moves on to the start of the next one.
    fn read_partial(&mut self, length: usize) -> &[u8] {
        while let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = lower + self.offset;
            if source < upper {
                let target = upper.min(source + length);
                self.offset = target - lower;
                return &self.buffer[source..target];
            }
            self.index += 1;
            self.offset = 0;
        }
        &[]
    }

    /// Bytes left in the current chunk.
    fn chunk_remaining(&self) -> usize {
        self.chunks
            .get(self.index)
            .map(|(lower, upper)| upper - (lower + self.offset))
            .unwrap_or(0)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], RustySeekError> {
        let mut array = [0u8; N];
        let mut filled = 0;
        while filled < N {
            let bytes = self.read_partial(N - filled);
            if bytes.is_empty() {
                Err(Biff8Error::NoEnoughDataError(N))?;
            }
            array[filled..filled + bytes.len()].copy_from_slice(bytes);
            filled += bytes.len();
        }
        Ok(array)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), RustySeekError> {
        let mut remaining = length;
        while remaining > 0 {
            let size = self.read_partial(remaining).len();
            if size == 0 {
                Err(Biff8Error::NoEnoughDataError(length))?;
            }
            remaining -= size;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, RustySeekError> {
        self.read_array::<1>().map(|bytes| bytes[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, RustySeekError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, RustySeekError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, RustySeekError> {
        self.read_u32().map(|value| value as usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, RustySeekError> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, RustySeekError> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Decodes an RK value: a 30-bit integer or the high bits of a double, optionally scaled by 1/100.
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, RustySeekError> {
        Ok(decode_rk(self.read_u32()?))
    }

    /// ShortXLUnicodeString: one-byte character count.
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, RustySeekError> {
        let chars = self.read_u8()? as usize;
        let flag = self.read_u8()?;
        let mut content = String::with_capacity(chars);
        self.read_characters(chars, flag & 0x01 != 0, &mut content)?;
        Ok(content)
    }

    /// XLUnicodeString: two-byte character count.
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, RustySeekError> {
        let chars = self.read_u16()? as usize;
        let flag = self.read_u8()?;
        let mut content = String::with_capacity(chars);
        self.read_characters(chars, flag & 0x01 != 0, &mut content)?;
        Ok(content)
    }

    /// XLUnicodeRichExtendedString, the shared string table entry.
    /// Formatting runs and phonetic data trail the characters and are skipped.
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, RustySeekError> {
        let chars = self.read_u16()? as usize;
        let flag = self.read_u8()?;
        let runs = if flag & 0x08 != 0 { self.read_u16()? as usize } else { 0 };
        let phonetic = if flag & 0x04 != 0 { self.read_usize()? } else { 0 };

        let mut content = String::with_capacity(chars);
        self.read_characters(chars, flag & 0x01 != 0, &mut content)?;
        self.skip(4 * runs)?;
        self.skip(phonetic)?;
        Ok(content)
    }

    fn read_characters(&mut self, chars: usize, mut is_high_byte: bool, content: &mut String) -> Result<(), RustySeekError> {
        let mut remaining = chars;
        while remaining > 0 {
            let wanted = if is_high_byte { remaining * 2 } else { remaining };
            let available = wanted.min(self.chunk_remaining());
            if available > 0 {
                let bytes = self.read_partial(available);
                if is_high_byte {
                    let (text, _) = UTF_16LE.decode_without_bom_handling(bytes);
                    content.push_str(&text);
                    remaining -= bytes.len() / 2;
                } else {
                    content.extend(bytes.iter().map(|byte| *byte as char));
                    remaining -= bytes.len();
                }
            } else {
                // Characters continued in the next chunk restart with their own option byte
                let flag = self.read_u8()?;
                is_high_byte = flag & 0x01 != 0;
            }
        }
        Ok(())
    }
}

fn decode_rk(raw: u32) -> f64 {
    let is_scaled = raw & 0x01 != 0;
    let is_integer = raw & 0x02 != 0;
    let value = if is_integer {
        ((raw as i32) >> 2) as f64
    } else {
        f64::from_bits(((raw & 0xFFFF_FFFC) as u64) << 32)
    };
    if is_scaled {
        value / 100.0
    } else {
        value
    }
}

/// Runs the given match arms for every remaining record of a BIFF8 reader.
/// Unlisted record types are ignored; `break` inside an arm stops the loop.
#[macro_export]
macro_rules! for_each_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = kind.to_le_bytes().to_vec();
        bytes.extend((payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn iterates_records_and_reads_fields() {
        let mut stream = record(0x0203, &[1, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0x24, 0x40]);
        stream.extend(record(0x000A, &[]));
        let mut reader = Biff8Reader::new(stream);

        assert_eq!(reader.next().unwrap(), Some(0x0203));
        assert_eq!(reader.read_u16().unwrap(), 1);
        assert_eq!(reader.read_u16().unwrap(), 2);
        assert_eq!(reader.read_f64().unwrap(), 10.0);
        assert!(reader.read_u8().is_err());
        assert_eq!(reader.next().unwrap(), Some(0x000A));
        assert_eq!(reader.next().unwrap(), None);
    }

    #[test]
    fn string_continues_across_chunks_with_new_option_byte() {
        // 6 characters: "abc" compressed in the first chunk, "déf" as UTF-16 in the continuation
        let mut first = vec![6, 0, 0x00];
        first.extend_from_slice(b"abc");
        let mut second = vec![0x01];
        for unit in "déf".encode_utf16() {
            second.extend(unit.to_le_bytes());
        }
        let mut stream = record(0x00FC, &first);
        stream.extend(record(CONTINUE, &second));
        let mut reader = Biff8Reader::new(stream);

        assert_eq!(reader.next().unwrap(), Some(0x00FC));
        assert_eq!(reader.record_len(), first.len() + second.len());
        assert_eq!(reader.read_xl_unicode_rich_extended_string().unwrap(), "abcdéf");
    }

    #[test]
    fn rich_runs_are_skipped_after_the_characters() {
        let mut payload = vec![2, 0, 0x08, 1, 0];
        payload.extend_from_slice(b"hi");
        payload.extend_from_slice(&[0, 0, 1, 0]);
        payload.extend_from_slice(&[1, 0, 0x00, b'x']);
        let mut reader = Biff8Reader::new(record(0x00FC, &payload));

        reader.next().unwrap();
        assert_eq!(reader.read_xl_unicode_rich_extended_string().unwrap(), "hi");
        assert_eq!(reader.read_xl_unicode_string().unwrap(), "x");
    }

    #[test]
    fn decodes_rk_values() {
        assert_eq!(decode_rk((42 << 2) | 0x02), 42.0);
        assert_eq!(decode_rk((1234 << 2) | 0x03), 12.34);
        assert_eq!(decode_rk(((-7i32 << 2) as u32) | 0x02), -7.0);
        let bits = (1.5f64.to_bits() >> 32) as u32;
        assert_eq!(decode_rk(bits), 1.5);
    }
}
