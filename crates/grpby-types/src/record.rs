//! Binary row codec used for spilled rows.
//!
//! Rows are written back to back and only ever read sequentially, so a row
//! carries no length prefix or header block. It is a column count followed
//! by one tagged value per column. Counts, tags and lengths are LEB128
//! varints:
//!
//! | Tag            | Payload                                   |
//! |----------------|-------------------------------------------|
//! | 0              | none, NULL                                |
//! | 1..=8          | integer, that many big-endian bytes       |
//! | 9              | 8 bytes, IEEE 754 bits (NaN kept as is)   |
//! | 10 + 2n        | `n` bytes of UTF-8 text                   |
//! | 11 + 2n        | `n` bytes of binary                       |

use std::io::{self, Read, Write};

use crate::Row;
use crate::value::Value;

const TAG_NULL: u64 = 0;
const TAG_FLOAT: u64 = 9;
const TAG_VARLEN: u64 = 10;

/// Append one row to `writer`.
pub fn write_row<W: Write>(writer: &mut W, row: &[Value]) -> io::Result<()> {
    write_varint(writer, row.len() as u64)?;
    for value in row {
        match value {
            Value::Null => write_varint(writer, TAG_NULL)?,
            Value::Integer(i) => {
                let width = integer_width(*i);
                write_varint(writer, width as u64)?;
                writer.write_all(&i.to_be_bytes()[8 - width..])?;
            }
            Value::Number(f) => {
                write_varint(writer, TAG_FLOAT)?;
                writer.write_all(&f.to_bits().to_be_bytes())?;
            }
            Value::Text(s) => {
                write_varint(writer, TAG_VARLEN + 2 * s.len() as u64)?;
                writer.write_all(s.as_bytes())?;
            }
            Value::Binary(b) => {
                write_varint(writer, TAG_VARLEN + 1 + 2 * b.len() as u64)?;
                writer.write_all(b)?;
            }
        }
    }
    Ok(())
}

/// Read the next row from `reader`.
///
/// Returns `Ok(None)` at a clean end of stream. A stream that ends inside a
/// row is `UnexpectedEof`; bytes that do not decode are `InvalidData`.
pub fn read_row<R: Read>(reader: &mut R) -> io::Result<Option<Row>> {
    let Some(first) = read_byte(reader)? else {
        return Ok(None);
    };
    let columns = read_varint_from(reader, first)?;
    let columns = usize::try_from(columns).map_err(|_| invalid("column count overflow"))?;
    // Corrupt counts must not drive a huge allocation.
    let mut row = Vec::with_capacity(columns.min(1024));
    for _ in 0..columns {
        row.push(read_value(reader)?);
    }
    Ok(Some(row))
}

fn read_value<R: Read>(reader: &mut R) -> io::Result<Value> {
    let tag = read_varint(reader)?;
    let value = match tag {
        TAG_NULL => Value::Null,
        1..=8 => {
            #[allow(clippy::cast_possible_truncation)]
            let width = tag as usize;
            let mut bytes = [0u8; 8];
            reader.read_exact(&mut bytes[8 - width..])?;
            // Sign-extend from the top payload byte.
            if bytes[8 - width] & 0x80 != 0 {
                bytes[..8 - width].fill(0xFF);
            }
            Value::Integer(i64::from_be_bytes(bytes))
        }
        TAG_FLOAT => {
            let mut bytes = [0u8; 8];
            reader.read_exact(&mut bytes)?;
            Value::Number(f64::from_bits(u64::from_be_bytes(bytes)))
        }
        _ => {
            let len = (tag - TAG_VARLEN) / 2;
            let bytes = read_exact_len(reader, len)?;
            if (tag - TAG_VARLEN) % 2 == 0 {
                let text = String::from_utf8(bytes).map_err(|_| invalid("text is not UTF-8"))?;
                Value::Text(text)
            } else {
                Value::Binary(bytes)
            }
        }
    };
    Ok(value)
}

/// Smallest number of bytes that sign-extends back to `value`.
fn integer_width(value: i64) -> usize {
    (1..8)
        .find(|&w| {
            let shift = 64 - 8 * w;
            (value << shift) >> shift == value
        })
        .unwrap_or(8)
}

fn read_exact_len<R: Read>(reader: &mut R, len: u64) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.take(len).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "value ends past the end of the spill stream",
        ));
    }
    Ok(bytes)
}

fn write_varint<W: Write>(writer: &mut W, mut value: u64) -> io::Result<()> {
    let mut buf = [0u8; 10];
    let mut n = 0;
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let low = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[n] = low;
            n += 1;
            break;
        }
        buf[n] = low | 0x80;
        n += 1;
    }
    writer.write_all(&buf[..n])
}

fn read_varint<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    read_varint_from(reader, byte[0])
}

/// Continue a varint whose first byte has already been read.
fn read_varint_from<R: Read>(reader: &mut R, first: u8) -> io::Result<u64> {
    let mut value = u64::from(first & 0x7F);
    let mut byte = first;
    let mut shift = 7;
    while byte & 0x80 != 0 {
        if shift >= 64 {
            return Err(invalid("varint longer than 64 bits"));
        }
        let mut next = [0u8; 1];
        reader.read_exact(&mut next)?;
        byte = next[0];
        value |= u64::from(byte & 0x7F) << shift;
        shift += 7;
    }
    Ok(value)
}

fn read_byte<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

fn invalid(detail: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, detail)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn mixed_row() -> Row {
        vec![
            Value::Null,
            Value::Integer(0),
            Value::Integer(-1),
            Value::Integer(-300),
            Value::Integer(i64::MIN),
            Value::Integer(i64::MAX),
            Value::Number(3.25),
            Value::Text("naïve".to_owned()),
            Value::Text(String::new()),
            Value::Binary(vec![0, 255, 7]),
        ]
    }

    fn read_back(buf: Vec<u8>) -> Vec<Row> {
        let mut cursor = Cursor::new(buf);
        let mut rows = Vec::new();
        while let Some(row) = read_row(&mut cursor).unwrap() {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn mixed_rows_survive_in_order() {
        let mut buf = Vec::new();
        write_row(&mut buf, &mixed_row()).unwrap();
        write_row(&mut buf, &[]).unwrap();
        write_row(&mut buf, &[Value::from("k")]).unwrap();
        assert_eq!(
            read_back(buf),
            vec![mixed_row(), Vec::new(), vec![Value::from("k")]]
        );
    }

    #[test]
    fn nan_survives_spill() {
        let mut buf = Vec::new();
        write_row(&mut buf, &[Value::Number(f64::NAN)]).unwrap();
        let rows = read_back(buf);
        assert!(matches!(rows[0][0], Value::Number(f) if f.is_nan()));
    }

    #[test]
    fn integers_use_minimal_width() {
        assert_eq!(integer_width(0), 1);
        assert_eq!(integer_width(127), 1);
        assert_eq!(integer_width(-128), 1);
        assert_eq!(integer_width(128), 2);
        assert_eq!(integer_width(-129), 2);
        assert_eq!(integer_width(i64::MIN), 8);
        // count, tag, one payload byte
        let mut buf = Vec::new();
        write_row(&mut buf, &[Value::Integer(-5)]).unwrap();
        assert_eq!(buf, vec![1, 1, 0xFB]);
    }

    #[test]
    fn long_text_uses_multibyte_tag() {
        let long = "x".repeat(20_000);
        let mut buf = Vec::new();
        write_row(&mut buf, &[Value::Text(long.clone())]).unwrap();
        assert_eq!(read_back(buf)[0][0].as_text(), Some(long.as_str()));
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let mut buf = Vec::new();
        write_row(&mut buf, &mixed_row()).unwrap();
        buf.truncate(buf.len() - 2);
        let err = read_row(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn bad_bytes_are_invalid_data() {
        // one column, text of length 1 holding a lone continuation byte
        let err = read_row(&mut Cursor::new(vec![1, 12, 0x80])).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let err = read_row(&mut Cursor::new(vec![0xFF; 11])).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
