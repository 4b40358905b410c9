//! FILENAME: persistence/src/lib.rs
//! PURPOSE: Textual save/load framing for a `Sheet`: `(<position>;<len>;<payload>)`
//! records separated by a single space.
//! CONTEXT: The loader is a small state machine over raw bytes (not
//! `char`s — a payload is read by exact byte length, so it can embed
//! any byte including framing characters). Load clears the target
//! sheet eagerly, so a load failure leaves it in a valid, empty state
//! rather than a partially-populated one.

mod error;

pub use error::PersistenceError;

use std::io::{Read, Write};

use engine::{Cell, Position, Sheet, Value};

/// Writes every occupied cell in `sheet`, in sorted position order, as
/// a sequence of space-separated `(<position>;<len>;<payload>)` records.
pub fn save(sheet: &Sheet, mut sink: impl Write) -> Result<(), PersistenceError> {
    let mut first = true;
    for (pos, cell) in sheet.iter_sorted() {
        if !first {
            sink.write_all(b" ")?;
        }
        first = false;

        let payload = render_payload(cell);
        write!(sink, "({};{};", pos, payload.len())?;
        sink.write_all(payload.as_bytes())?;
        sink.write_all(b")")?;
    }
    Ok(())
}

/// Renders a cell's save payload. An empty literal is the reserved
/// zero-length payload (see DESIGN.md); everything else is the raw
/// bytes `Cell::render` produces.
fn render_payload(cell: &Cell) -> String {
    match cell {
        Cell::Literal(Value::Empty) => String::new(),
        other => other.render(),
    }
}

/// Replaces `sheet`'s contents with the cells decoded from `source`.
/// On success every previously-set cell is gone, replaced by exactly
/// what `source` encodes. On failure `sheet` is left empty (cleared up
/// front, before any parsing is attempted).
pub fn load(sheet: &mut Sheet, mut source: impl Read) -> Result<(), PersistenceError> {
    sheet.clear();

    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;

    let mut i = 0usize;
    let len = bytes.len();

    loop {
        while i < len && bytes[i] == b' ' {
            i += 1;
        }
        if i == len {
            break;
        }

        if bytes[i] != b'(' {
            return Err(malformed("expected '(' to start a record"));
        }
        i += 1;

        let position_end = find(&bytes, i, b';').ok_or_else(|| malformed("unterminated position field"))?;
        let position_str = field_str(&bytes, i, position_end)?;
        i = position_end + 1;

        let length_end = find(&bytes, i, b';').ok_or_else(|| malformed("unterminated length field"))?;
        let length_str = field_str(&bytes, i, length_end)?;
        let payload_len: usize = length_str.parse().map_err(|_| malformed("non-numeric length field"))?;
        i = length_end + 1;

        if i + payload_len > len {
            return Err(malformed("payload shorter than declared length"));
        }
        let payload_str = field_str(&bytes, i, i + payload_len)?;
        i += payload_len;

        if i >= len || bytes[i] != b')' {
            return Err(malformed("expected ')' to close a record"));
        }
        i += 1;

        let position = Position::parse(&position_str).map_err(|e| malformed(&e.to_string()))?;
        let cell = if payload_len == 0 {
            Cell::Literal(Value::Empty)
        } else {
            Cell::from_raw(&payload_str).map_err(|e| malformed(&e.to_string()))?
        };
        sheet.insert_raw(position, cell);
    }

    Ok(())
}

fn find(bytes: &[u8], from: usize, target: u8) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == target).map(|p| p + from)
}

fn field_str(bytes: &[u8], start: usize, end: usize) -> Result<String, PersistenceError> {
    std::str::from_utf8(&bytes[start..end])
        .map(str::to_string)
        .map_err(|_| malformed("field is not valid utf-8"))
}

fn malformed(msg: &str) -> PersistenceError {
    PersistenceError::Malformed(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_mixed_sheet() {
        let mut sheet = Sheet::new();
        sheet.set_cell("A1", "10");
        sheet.set_cell("A2", "hello");
        sheet.set_cell("A3", "=A1*2");

        let mut buf = Vec::new();
        save(&sheet, &mut buf).unwrap();

        let mut loaded = Sheet::new();
        load(&mut loaded, buf.as_slice()).unwrap();

        for pos in ["A1", "A2", "A3"] {
            assert!(loaded.get_value(pos).test_eq(&sheet.get_value(pos)));
        }
    }

    #[test]
    fn empty_literal_round_trips_through_the_zero_length_special_case() {
        let mut sheet = Sheet::new();
        sheet.set_cell("B1", "1");
        sheet.clear_cell("B1");
        // force an Empty literal cell directly, bypassing set_cell's
        // empty-input rejection, to exercise the len==0 path.
        sheet.insert_raw(Position::parse("B1").unwrap(), Cell::Literal(Value::Empty));

        let mut buf = Vec::new();
        save(&sheet, &mut buf).unwrap();
        assert!(buf.starts_with(b"(B1;0;)"));

        let mut loaded = Sheet::new();
        load(&mut loaded, buf.as_slice()).unwrap();
        assert_eq!(loaded.get_value("B1"), Value::Empty);
    }

    #[test]
    fn load_rejects_truncated_payload_and_leaves_sheet_empty() {
        let mut sheet = Sheet::new();
        sheet.set_cell("A1", "999");
        let err = load(&mut sheet, &b"(A1;5;ab)"[..]);
        assert!(err.is_err());
        assert_eq!(sheet.get_value("A1"), Value::Empty);
    }

    #[test]
    fn load_rejects_missing_closing_paren() {
        let mut sheet = Sheet::new();
        let err = load(&mut sheet, &b"(A1;2;10"[..]);
        assert!(err.is_err());
    }

    #[test]
    fn corrupted_buffer_is_rejected_without_partial_mutation() {
        let mut sheet = Sheet::new();
        sheet.set_cell("A1", "10");
        sheet.set_cell("B1", "=A1+1");

        let mut buf = Vec::new();
        save(&sheet, &mut buf).unwrap();
        // flip a bit inside the length field of the first record.
        let flip_at = buf.iter().position(|&b| b == b';').unwrap() + 1;
        buf[flip_at] ^= 0xFF;

        let mut loaded = Sheet::new();
        loaded.set_cell("Z1", "should be cleared");
        let result = load(&mut loaded, buf.as_slice());
        assert!(result.is_err());
        assert_eq!(loaded.get_value("Z1"), Value::Empty);
        assert_eq!(loaded.get_value("A1"), Value::Empty);
    }

    #[test]
    fn save_then_load_roundtrip_via_tempfile() {
        let mut sheet = Sheet::new();
        sheet.set_cell("A1", "3.5");
        sheet.set_cell("B1", "=A1+A1");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        save(&sheet, &mut file).unwrap();

        let mut loaded = Sheet::new();
        let reopened = std::fs::File::open(file.path()).unwrap();
        load(&mut loaded, reopened).unwrap();

        assert!(loaded.get_value("B1").test_eq(&Value::Number(7.0)));
    }
}
