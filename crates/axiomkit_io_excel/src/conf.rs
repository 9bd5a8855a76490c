//! Excel constants and default option factories.

use crate::spec::{EnumExcelBackend, SpecConvertOptions};

/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];
/// Maximum text length of one cell, in UTF-16 code units.
pub const N_LEN_EXCEL_CELL_TEXT_MAX: usize = 32_767;

/// BIFF8 worksheet maximum row count.
pub const N_NROWS_BIFF8_MAX: usize = 65_536;
/// BIFF8 worksheet maximum column count.
pub const N_NCOLS_BIFF8_MAX: usize = 256;
/// BIFF column width unit: 1/256 of the `0` glyph width.
pub const N_WIDTH_BIFF_CHAR_UNITS: u32 = 256;
/// Widest OOXML column, in characters.
pub const N_WIDTH_XLSX_COLUMN_MAX: u32 = 255;

/// Default sheet name used by the BIFF backends.
pub const C_SHEET_NAME_BIFF_DEFAULT: &str = "Sheet 1";
/// Default sheet name used by the OOXML backend.
pub const C_SHEET_NAME_XLSX_DEFAULT: &str = "Sheet";

/// Default CSV field delimiter.
pub const N_CSV_DELIMITER_DEFAULT: u8 = b',';

/// MIME type of BIFF `.xls` output.
pub const C_CONTENT_TYPE_XLS: &str = "application/vnd.ms-excel";
/// MIME type of OOXML `.xlsx` output.
pub const C_CONTENT_TYPE_XLSX: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Auto-detection order when no backend override is configured.
pub const TUP_BACKEND_PRIORITY: [EnumExcelBackend; 3] = [
    EnumExcelBackend::Xls,
    EnumExcelBackend::XlsLegacy,
    EnumExcelBackend::Xlsx,
];

/// Build default conversion options (auto-detected backend, comma delimiter).
pub fn derive_default_convert_options() -> SpecConvertOptions {
    SpecConvertOptions::default()
}
