//! BIFF8 (Excel 97-2003) record layer for single-sheet text workbooks.
//!
//! Only the records a string-only worksheet needs are emitted:
//! - globals : BOF, CODEPAGE, WINDOW1, FONT, XF, STYLE, BOUNDSHEET, SST, EOF
//! - sheet   : BOF, WSBOOL, COLINFO, DIMENSIONS, LABELSST/BLANK, WINDOW2, EOF
//!
//! The record stream is stored as the `Workbook` stream of an OLE compound
//! file built with `cfb`.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use crate::spec::ConvertError;

/// Maximum payload of one BIFF record.
const N_LEN_RECORD_DATA_MAX: usize = 8_224;
/// Excel refuses `Workbook` streams stored in the mini stream.
const N_LEN_WORKBOOK_STREAM_MIN: usize = 4_096;

const N_BOF_GLOBALS: u16 = 0x0005;
const N_BOF_WORKSHEET: u16 = 0x0010;
const N_CODEPAGE_UTF16: u16 = 0x04B0;

const N_FONT_HEIGHT_TWIPS: u16 = 200;
const N_FONT_WEIGHT_NORMAL: u16 = 400;
const N_FONT_WEIGHT_BOLD: u16 = 700;
const C_FONT_NAME: &str = "Arial";

const N_STYLE_XF_COUNT: u16 = 15;
/// Default cell XF.
pub const N_XF_CELL_DEFAULT: u16 = 15;
/// Cell XF pointing at the bold font.
pub const N_XF_CELL_BOLD: u16 = 16;
/// Font 1 is bold; index 4 does not exist in BIFF font tables.
const N_FONT_IDX_BOLD: u16 = 1;

mod record {
    pub const BOF: u16 = 0x0809;
    pub const EOF: u16 = 0x000A;
    pub const CODEPAGE: u16 = 0x0042;
    pub const WINDOW1: u16 = 0x003D;
    pub const FONT: u16 = 0x0031;
    pub const XF: u16 = 0x00E0;
    pub const STYLE: u16 = 0x0293;
    pub const BOUNDSHEET: u16 = 0x0085;
    pub const SST: u16 = 0x00FC;
    pub const CONTINUE: u16 = 0x003C;
    pub const WSBOOL: u16 = 0x0081;
    pub const COLINFO: u16 = 0x007D;
    pub const DIMENSIONS: u16 = 0x0200;
    pub const LABELSST: u16 = 0x00FD;
    pub const BLANK: u16 = 0x0201;
    pub const WINDOW2: u16 = 0x023E;
}

////////////////////////////////////////////////////////////////////////////////
// #region RecordPrimitives

fn write_record<W: Write>(writer: &mut W, record_type: u16, data: &[u8]) -> std::io::Result<()> {
    debug_assert!(data.len() <= N_LEN_RECORD_DATA_MAX);
    writer.write_all(&record_type.to_le_bytes())?;
    writer.write_all(&(data.len() as u16).to_le_bytes())?;
    writer.write_all(data)
}

/// Character payload of an XLUnicodeString: `(high_byte_flag, bytes, bytes_per_char)`.
///
/// Text whose code points all fit one byte is stored compressed.
fn encode_unicode_chars(text: &str) -> (u8, Vec<u8>, usize) {
    if text.chars().all(|chr| (chr as u32) <= 0xFF) {
        (0x00, text.chars().map(|chr| chr as u8).collect(), 1)
    } else {
        let v_bytes = text
            .encode_utf16()
            .flat_map(|code_unit| code_unit.to_le_bytes())
            .collect();
        (0x01, v_bytes, 2)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region GlobalsRecords

fn write_bof<W: Write>(writer: &mut W, substream_type: u16) -> std::io::Result<()> {
    let mut v_data = Vec::with_capacity(16);
    v_data.extend_from_slice(&0x0600u16.to_le_bytes()); // BIFF8
    v_data.extend_from_slice(&substream_type.to_le_bytes());
    v_data.extend_from_slice(&0x0DBBu16.to_le_bytes()); // build id
    v_data.extend_from_slice(&0x07CCu16.to_le_bytes()); // build year
    v_data.extend_from_slice(&0u32.to_le_bytes()); // file history
    v_data.extend_from_slice(&6u32.to_le_bytes()); // lowest BIFF version
    write_record(writer, record::BOF, &v_data)
}

fn write_eof<W: Write>(writer: &mut W) -> std::io::Result<()> {
    write_record(writer, record::EOF, &[])
}

fn write_codepage<W: Write>(writer: &mut W) -> std::io::Result<()> {
    write_record(writer, record::CODEPAGE, &N_CODEPAGE_UTF16.to_le_bytes())
}

fn write_window1<W: Write>(writer: &mut W) -> std::io::Result<()> {
    let mut v_data = Vec::with_capacity(18);
    for value in [
        0u16,    // xWn
        0,       // yWn
        0x3000,  // dxWn
        0x1E00,  // dyWn
        0x0038,  // grbit
        0,       // itabCur
        0,       // itabFirst
        1,       // ctabSel
        0x0258,  // wTabRatio
    ] {
        v_data.extend_from_slice(&value.to_le_bytes());
    }
    write_record(writer, record::WINDOW1, &v_data)
}

fn write_font<W: Write>(writer: &mut W, weight: u16, if_italic: bool) -> std::io::Result<()> {
    let mut v_data = Vec::with_capacity(16 + C_FONT_NAME.len());
    v_data.extend_from_slice(&N_FONT_HEIGHT_TWIPS.to_le_bytes());
    let grbit: u16 = if if_italic { 0x0002 } else { 0 };
    v_data.extend_from_slice(&grbit.to_le_bytes());
    v_data.extend_from_slice(&0x7FFFu16.to_le_bytes()); // automatic color
    v_data.extend_from_slice(&weight.to_le_bytes());
    v_data.extend_from_slice(&0u16.to_le_bytes()); // escapement
    v_data.extend_from_slice(&[0, 0, 0, 0]); // underline, family, charset, reserved
    v_data.push(C_FONT_NAME.len() as u8);
    v_data.push(0x00);
    v_data.extend_from_slice(C_FONT_NAME.as_bytes());
    write_record(writer, record::FONT, &v_data)
}

/// Fonts 0..=3: normal, bold, italic, bold italic.
fn write_fonts<W: Write>(writer: &mut W) -> std::io::Result<()> {
    write_font(writer, N_FONT_WEIGHT_NORMAL, false)?;
    write_font(writer, N_FONT_WEIGHT_BOLD, false)?;
    write_font(writer, N_FONT_WEIGHT_NORMAL, true)?;
    write_font(writer, N_FONT_WEIGHT_BOLD, true)
}

fn write_xf<W: Write>(writer: &mut W, font_idx: u16, if_style_xf: bool) -> std::io::Result<()> {
    let mut v_data = Vec::with_capacity(20);
    v_data.extend_from_slice(&font_idx.to_le_bytes());
    v_data.extend_from_slice(&0u16.to_le_bytes()); // General number format
    let type_prot: u16 = if if_style_xf { 0xFFF5 } else { 0x0001 };
    v_data.extend_from_slice(&type_prot.to_le_bytes());
    v_data.push(0x20); // align: general, bottom
    v_data.push(0x00); // rotation
    v_data.push(0x00); // indent
    v_data.push(if if_style_xf { 0x00 } else { 0xF8 }); // used attributes
    v_data.extend_from_slice(&0u16.to_le_bytes()); // borders
    v_data.extend_from_slice(&0u16.to_le_bytes()); // border colors
    v_data.extend_from_slice(&0u32.to_le_bytes()); // more border colors, pattern
    v_data.extend_from_slice(&0x20C0u16.to_le_bytes()); // pattern colors 0x40/0x41
    write_record(writer, record::XF, &v_data)
}

/// XF 0..=14 style XFs, 15 default cell XF, 16 bold cell XF.
fn write_xfs<W: Write>(writer: &mut W) -> std::io::Result<()> {
    for xf_idx in 0..N_STYLE_XF_COUNT {
        let font_idx = match xf_idx {
            1 | 2 => 1,
            3 | 4 => 2,
            _ => 0,
        };
        write_xf(writer, font_idx, true)?;
    }
    write_xf(writer, 0, false)?;
    write_xf(writer, N_FONT_IDX_BOLD, false)
}

/// Built-in `Normal` style bound to XF 0.
fn write_style_normal<W: Write>(writer: &mut W) -> std::io::Result<()> {
    let mut v_data = Vec::with_capacity(4);
    v_data.extend_from_slice(&0x8000u16.to_le_bytes());
    v_data.push(0x00);
    v_data.push(0xFF);
    write_record(writer, record::STYLE, &v_data)
}

/// BOUNDSHEET with a zero position, patched once the sheet offset is known.
///
/// Returns the stream offset of the position field.
fn write_boundsheet_placeholder(stream: &mut Vec<u8>, sheet_name: &str) -> std::io::Result<usize> {
    let (high_byte, v_chars, n_unit) = encode_unicode_chars(sheet_name);
    let mut v_data = Vec::with_capacity(8 + v_chars.len());
    v_data.extend_from_slice(&0u32.to_le_bytes());
    v_data.extend_from_slice(&0u16.to_le_bytes()); // visible worksheet
    v_data.push((v_chars.len() / n_unit) as u8);
    v_data.push(high_byte);
    v_data.extend_from_slice(&v_chars);

    let n_pos_field = stream.len() + 4;
    write_record(stream, record::BOUNDSHEET, &v_data)?;
    Ok(n_pos_field)
}

/// SST followed by CONTINUE records as needed.
///
/// A string header never straddles records; character data may, in which case
/// the continuation starts with the string's high-byte flag.
fn write_sst<W: Write>(writer: &mut W, sst: &SharedStringTable) -> std::io::Result<()> {
    let mut l_records: Vec<Vec<u8>> = Vec::new();
    let mut v_buf: Vec<u8> = Vec::with_capacity(N_LEN_RECORD_DATA_MAX);
    v_buf.extend_from_slice(&sst.n_total.to_le_bytes());
    v_buf.extend_from_slice(&(sst.l_strings.len() as u32).to_le_bytes());

    for text in &sst.l_strings {
        let (high_byte, v_chars, n_unit) = encode_unicode_chars(text);
        let n_header_min = 3 + usize::min(n_unit, v_chars.len());
        if N_LEN_RECORD_DATA_MAX - v_buf.len() < n_header_min {
            l_records.push(std::mem::take(&mut v_buf));
        }

        v_buf.extend_from_slice(&((v_chars.len() / n_unit) as u16).to_le_bytes());
        v_buf.push(high_byte);

        let mut n_written = 0;
        while n_written < v_chars.len() {
            let n_room = (N_LEN_RECORD_DATA_MAX - v_buf.len()) / n_unit * n_unit;
            if n_room == 0 {
                l_records.push(std::mem::take(&mut v_buf));
                v_buf.push(high_byte);
                continue;
            }
            let n_take = usize::min(n_room, v_chars.len() - n_written);
            v_buf.extend_from_slice(&v_chars[n_written..n_written + n_take]);
            n_written += n_take;
        }
    }
    l_records.push(v_buf);

    for (n_idx, v_record) in l_records.iter().enumerate() {
        let record_type = if n_idx == 0 {
            record::SST
        } else {
            record::CONTINUE
        };
        write_record(writer, record_type, v_record)?;
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorksheetRecords

fn write_wsbool<W: Write>(writer: &mut W) -> std::io::Result<()> {
    write_record(writer, record::WSBOOL, &0x04C1u16.to_le_bytes())
}

fn write_colinfo<W: Write>(writer: &mut W, col_idx: u16, width: u16) -> std::io::Result<()> {
    let mut v_data = Vec::with_capacity(12);
    for value in [col_idx, col_idx, width, N_XF_CELL_DEFAULT, 0u16, 0u16] {
        v_data.extend_from_slice(&value.to_le_bytes());
    }
    write_record(writer, record::COLINFO, &v_data)
}

fn write_dimensions<W: Write>(
    writer: &mut W,
    n_rows: u32,
    n_cols: u16,
) -> std::io::Result<()> {
    let mut v_data = Vec::with_capacity(14);
    v_data.extend_from_slice(&0u32.to_le_bytes());
    v_data.extend_from_slice(&n_rows.to_le_bytes());
    v_data.extend_from_slice(&0u16.to_le_bytes());
    v_data.extend_from_slice(&n_cols.to_le_bytes());
    v_data.extend_from_slice(&0u16.to_le_bytes());
    write_record(writer, record::DIMENSIONS, &v_data)
}

fn write_cell<W: Write>(writer: &mut W, cell: &BiffCell) -> std::io::Result<()> {
    let mut v_data = Vec::with_capacity(10);
    v_data.extend_from_slice(&cell.row_idx.to_le_bytes());
    v_data.extend_from_slice(&cell.col_idx.to_le_bytes());
    v_data.extend_from_slice(&cell.xf_idx.to_le_bytes());
    match cell.sst_idx {
        Some(sst_idx) => {
            v_data.extend_from_slice(&sst_idx.to_le_bytes());
            write_record(writer, record::LABELSST, &v_data)
        }
        None => write_record(writer, record::BLANK, &v_data),
    }
}

fn write_window2<W: Write>(writer: &mut W) -> std::io::Result<()> {
    let mut v_data = Vec::with_capacity(18);
    for value in [0x06B6u16, 0, 0, 0x0040, 0, 0, 0, 0, 0] {
        v_data.extend_from_slice(&value.to_le_bytes());
    }
    write_record(writer, record::WINDOW2, &v_data)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workbook

#[derive(Debug, Default)]
struct SharedStringTable {
    l_strings: Vec<String>,
    dict_idx: HashMap<String, u32>,
    n_total: u32,
}

impl SharedStringTable {
    fn intern(&mut self, text: &str) -> u32 {
        self.n_total = self.n_total.saturating_add(1);
        if let Some(sst_idx) = self.dict_idx.get(text) {
            return *sst_idx;
        }
        let sst_idx = self.l_strings.len() as u32;
        self.l_strings.push(text.to_string());
        self.dict_idx.insert(text.to_string(), sst_idx);
        sst_idx
    }
}

#[derive(Debug, Clone, Copy)]
struct BiffCell {
    row_idx: u16,
    col_idx: u16,
    xf_idx: u16,
    sst_idx: Option<u32>,
}

/// In-memory single-sheet BIFF8 workbook holding text cells.
///
/// Cells must be written in row-major order.
#[derive(Debug)]
pub struct BiffWorkbook {
    sheet_name: String,
    sst: SharedStringTable,
    l_cells: Vec<BiffCell>,
    dict_col_widths: Vec<(u16, u16)>,
    n_rows: u32,
    n_cols: u16,
}

impl BiffWorkbook {
    /// Empty workbook with one sheet called `sheet_name` (at most 31 chars).
    pub fn new(sheet_name: &str) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            sst: SharedStringTable::default(),
            l_cells: Vec::new(),
            dict_col_widths: Vec::new(),
            n_rows: 0,
            n_cols: 0,
        }
    }

    /// Store `text` at `(row_idx, col_idx)`; empty text becomes a styled blank.
    pub fn write_text(&mut self, row_idx: u16, col_idx: u16, text: &str, xf_idx: u16) {
        let sst_idx = if text.is_empty() {
            None
        } else {
            Some(self.sst.intern(text))
        };
        self.l_cells.push(BiffCell {
            row_idx,
            col_idx,
            xf_idx,
            sst_idx,
        });
        self.n_rows = u32::max(self.n_rows, u32::from(row_idx) + 1);
        self.n_cols = u16::max(self.n_cols, col_idx.saturating_add(1));
    }

    /// Set width of `col_idx` in 1/256 character units.
    pub fn set_column_width(&mut self, col_idx: u16, width: u16) {
        self.dict_col_widths.push((col_idx, width));
    }

    /// Serialize the record stream into an OLE compound file.
    pub fn save_to_buffer(&self) -> Result<Vec<u8>, ConvertError> {
        let mut v_stream = self.derive_workbook_stream()?;
        if v_stream.len() < N_LEN_WORKBOOK_STREAM_MIN {
            v_stream.resize(N_LEN_WORKBOOK_STREAM_MIN, 0);
        }

        // Version 3 containers (512-byte sectors) are what BIFF8 readers expect.
        let mut ole =
            cfb::CompoundFile::create_with_version(cfb::Version::V3, Cursor::new(Vec::new()))?;
        {
            let mut stream = ole.create_stream("/Workbook")?;
            stream.write_all(&v_stream)?;
            stream.flush()?;
        }
        ole.flush()?;
        Ok(ole.into_inner().into_inner())
    }

    fn derive_workbook_stream(&self) -> std::io::Result<Vec<u8>> {
        let mut v_stream = Vec::new();

        write_bof(&mut v_stream, N_BOF_GLOBALS)?;
        write_codepage(&mut v_stream)?;
        write_window1(&mut v_stream)?;
        write_fonts(&mut v_stream)?;
        write_xfs(&mut v_stream)?;
        write_style_normal(&mut v_stream)?;
        let n_pos_field = write_boundsheet_placeholder(&mut v_stream, &self.sheet_name)?;
        if !self.sst.l_strings.is_empty() {
            write_sst(&mut v_stream, &self.sst)?;
        }
        write_eof(&mut v_stream)?;

        let n_sheet_offset = v_stream.len() as u32;
        v_stream[n_pos_field..n_pos_field + 4].copy_from_slice(&n_sheet_offset.to_le_bytes());

        write_bof(&mut v_stream, N_BOF_WORKSHEET)?;
        write_wsbool(&mut v_stream)?;
        for (col_idx, width) in &self.dict_col_widths {
            write_colinfo(&mut v_stream, *col_idx, *width)?;
        }
        write_dimensions(&mut v_stream, self.n_rows, self.n_cols)?;
        for cell in &self.l_cells {
            write_cell(&mut v_stream, cell)?;
        }
        write_window2(&mut v_stream)?;
        write_eof(&mut v_stream)?;

        Ok(v_stream)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
