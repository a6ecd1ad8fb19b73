//! Word 97-2003 binary (.doc) text recovery
//!
//! Text lives in the `WordDocument` stream as a sequence of pieces described
//! by the piece table (CLX) in the `0Table`/`1Table` stream. Each piece is
//! either 8-bit cp1252 ("compressed") or UTF-16LE.

use super::text::WordText;
use super::{ContentKind, ExtractionError};
use std::io::{Cursor, Read};

const WORD_IDENT: u16 = 0xA5EC;
const FIB_FLAGS: usize = 0x000A;
const FIB_CCP_TEXT: usize = 0x004C;
const FIB_FC_CLX: usize = 0x01A2;
const FIB_LCB_CLX: usize = 0x01A6;

const FLAG_WHICH_TABLE: u16 = 0x0200;
const FLAG_ENCRYPTED: u16 = 0x0100;

const PIECE_COMPRESSED: u32 = 0x4000_0000;
const PCD_SIZE: usize = 8;

/// cp1252 code points for bytes 0x80..=0x9F (0 = unassigned)
const CP1252_HIGH: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

fn malformed(reason: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::malformed(ContentKind::Doc, reason)
}

fn read_u16(data: &[u8], at: usize) -> Result<u16, ExtractionError> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| malformed(format!("truncated at offset {:#x}", at)))
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, ExtractionError> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| malformed(format!("truncated at offset {:#x}", at)))
}

/// Opens an OLE2 compound file and returns its document text
pub(crate) fn read_legacy_doc(content: &[u8]) -> Result<WordText, ExtractionError> {
    let mut file = cfb::CompoundFile::open(Cursor::new(content)).map_err(malformed)?;

    let word = read_stream(&mut file, "/WordDocument")?;

    if read_u16(&word, 0)? != WORD_IDENT {
        return Err(malformed("WordDocument stream has no Word signature"));
    }

    let flags = read_u16(&word, FIB_FLAGS)?;
    if flags & FLAG_ENCRYPTED != 0 {
        return Err(malformed("document is encrypted"));
    }

    let table_name = if flags & FLAG_WHICH_TABLE != 0 {
        "/1Table"
    } else {
        "/0Table"
    };
    let table = read_stream(&mut file, table_name)?;

    let text = decode_pieces(&word, &table)?;
    Ok(split_word_text(&text))
}

fn read_stream<F: Read + std::io::Seek>(
    file: &mut cfb::CompoundFile<F>,
    name: &str,
) -> Result<Vec<u8>, ExtractionError> {
    let mut stream = file
        .open_stream(name)
        .map_err(|e| malformed(format!("{}: {}", name.trim_start_matches('/'), e)))?;
    let mut data = Vec::new();
    stream.read_to_end(&mut data)?;
    Ok(data)
}

/// Reassembles the main document text from the piece table
fn decode_pieces(word: &[u8], table: &[u8]) -> Result<String, ExtractionError> {
    let ccp_text = read_u32(word, FIB_CCP_TEXT)? as usize;
    let fc_clx = read_u32(word, FIB_FC_CLX)? as usize;
    let lcb_clx = read_u32(word, FIB_LCB_CLX)? as usize;

    let clx = table
        .get(fc_clx..fc_clx + lcb_clx)
        .ok_or_else(|| malformed("piece table outside table stream"))?;

    let plc = piece_table(clx)?;
    let pieces = (plc.len().saturating_sub(4)) / (4 + PCD_SIZE);
    if pieces == 0 {
        return Err(malformed("empty piece table"));
    }

    let pcd_base = 4 * (pieces + 1);
    let mut text = String::new();
    let mut remaining = ccp_text;

    for i in 0..pieces {
        if remaining == 0 {
            break;
        }

        let cp_start = read_u32(plc, 4 * i)? as usize;
        let cp_end = read_u32(plc, 4 * (i + 1))? as usize;
        let chars = cp_end.saturating_sub(cp_start).min(remaining);
        remaining -= chars;

        let fc = read_u32(plc, pcd_base + i * PCD_SIZE + 2)?;

        if fc & PIECE_COMPRESSED != 0 {
            let offset = ((fc & !PIECE_COMPRESSED) / 2) as usize;
            let bytes = word
                .get(offset..offset + chars)
                .ok_or_else(|| malformed("compressed piece outside document stream"))?;
            text.extend(bytes.iter().map(|&b| decode_cp1252(b)));
        } else {
            let offset = fc as usize;
            let bytes = word
                .get(offset..offset + chars * 2)
                .ok_or_else(|| malformed("piece outside document stream"))?;
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            text.push_str(&String::from_utf16_lossy(&units));
        }
    }

    Ok(text)
}

/// Skips property runs (Prc) and returns the PlcPcd of the Pcdt
fn piece_table(clx: &[u8]) -> Result<&[u8], ExtractionError> {
    let mut pos = 0;

    while clx.get(pos) == Some(&0x01) {
        let cb = read_u16(clx, pos + 1)? as usize;
        pos += 3 + cb;
    }

    if clx.get(pos) != Some(&0x02) {
        return Err(malformed("piece table descriptor not found"));
    }

    let lcb = read_u32(clx, pos + 1)? as usize;
    clx.get(pos + 5..pos + 5 + lcb)
        .ok_or_else(|| malformed("truncated piece table"))
}

fn decode_cp1252(byte: u8) -> char {
    match byte {
        0x80..=0x9F => {
            let code = CP1252_HIGH[(byte - 0x80) as usize];
            char::from_u32(u32::from(code))
                .filter(|_| code != 0)
                .unwrap_or('\u{fffd}')
        }
        _ => char::from(byte),
    }
}

/// Splits raw Word text into paragraphs and table rows
///
/// `\r` ends a paragraph, `\x07` ends a table cell (two in a row end the
/// row), `\x0b` is a manual line break. Field codes between `\x13` and `\x14`
/// are dropped; the field result up to `\x15` is kept.
fn split_word_text(raw: &str) -> WordText {
    let mut out = WordText::default();
    let mut current = String::new();
    let mut cells: Vec<String> = Vec::new();
    let mut in_table = false;
    let mut previous = '\0';

    // One entry per open field: true while still inside its code part
    let mut fields: Vec<bool> = Vec::new();

    for c in raw.chars() {
        match c {
            '\u{13}' => fields.push(true),
            '\u{14}' => {
                if let Some(in_code) = fields.last_mut() {
                    *in_code = false;
                }
            }
            '\u{15}' => {
                fields.pop();
            }
            _ if fields.iter().any(|in_code| *in_code) => {}
            '\r' | '\u{0c}' => {
                if !cells.is_empty() {
                    // A cell's paragraph mark inside a table
                    current.push('\n');
                } else {
                    out.push_paragraph(&current);
                    current.clear();
                    in_table = false;
                }
            }
            '\u{07}' => {
                if previous == '\u{07}' && current.is_empty() {
                    if !in_table {
                        out.tables += 1;
                        in_table = true;
                    }
                    out.push_row(&cells);
                    cells.clear();
                } else {
                    cells.push(std::mem::take(&mut current));
                }
            }
            '\u{0b}' => current.push('\n'),
            '\u{1e}' => current.push('-'),
            '\u{1f}' | '\u{01}' | '\u{08}' => {}
            '\u{a0}' => current.push(' '),
            c if c.is_control() && c != '\t' => {}
            c => current.push(c),
        }
        previous = c;
    }

    if !cells.is_empty() {
        out.push_row(&cells);
    }
    out.push_paragraph(&current);
    out
}
