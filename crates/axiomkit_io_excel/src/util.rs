//! Stateless helper utilities used by the conversion pipeline.

use crate::conf::{
    N_LEN_EXCEL_CELL_TEXT_MAX, N_LEN_EXCEL_SHEET_NAME_MAX, N_WIDTH_BIFF_CHAR_UNITS,
    TUP_BACKEND_PRIORITY, TUP_EXCEL_ILLEGAL,
};
use crate::spec::{ConvertError, EnumExcelBackend, SpecBackendAvailability};

////////////////////////////////////////////////////////////////////////////////
// #region BackendSelection

/// Resolve the backend for one conversion.
///
/// A known override wins regardless of `availability`; an empty override
/// counts as unset. Identifiers are matched exactly. Otherwise the first
/// available backend in [`TUP_BACKEND_PRIORITY`] is chosen.
pub fn select_backend(
    backend_override: Option<&str>,
    availability: &SpecBackendAvailability,
) -> Result<EnumExcelBackend, ConvertError> {
    if let Some(c_backend) = backend_override
        && !c_backend.is_empty()
    {
        return c_backend.parse::<EnumExcelBackend>();
    }

    TUP_BACKEND_PRIORITY
        .into_iter()
        .find(|backend| availability.contains(*backend))
        .ok_or(ConvertError::NoBackendAvailable)
}

/// Backend override for one call: the explicit value, else the host setting.
///
/// `read_setting` is only called when `backend_override` is `None`.
pub fn derive_backend_override(
    backend_override: Option<String>,
    read_setting: impl FnOnce() -> Option<String>,
) -> Option<String> {
    backend_override.or_else(read_setting)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SourceText

/// Decode response bytes as UTF-8 and drop embedded NUL bytes.
pub fn decode_source_text(v_content: &[u8]) -> Result<String, ConvertError> {
    let mut c_text = String::from_utf8(v_content.to_vec())?;
    if c_text.contains('\0') {
        c_text.retain(|chr| chr != '\0');
    }
    Ok(c_text)
}

/// Build a forward-only CSV reader over `text`.
///
/// Every line is data (no header handling) and ragged rows are accepted.
pub fn create_csv_reader(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes())
}

/// Number of empty lines starting at byte `n_byte` of `text`.
///
/// `n_byte` is where the reader stopped after a record (or 0). The reader skips
/// empty lines silently, so callers use this to keep row indices aligned with
/// source lines. A record terminator still pending at `n_byte` is not counted.
pub fn count_blank_lines(text: &str, n_byte: usize) -> usize {
    let v_bytes = text.as_bytes();
    let mut n_pos = usize::min(n_byte, v_bytes.len());
    if n_pos > 0 {
        match (v_bytes[n_pos - 1], v_bytes.get(n_pos)) {
            (b'\r', Some(b'\n')) => n_pos += 1,
            (b'\r' | b'\n', _) => {}
            (_, Some(b'\r' | b'\n')) => n_pos = skip_line_terminator(v_bytes, n_pos),
            _ => {}
        }
    }

    let mut n_blank = 0;
    while n_pos < v_bytes.len() && matches!(v_bytes[n_pos], b'\r' | b'\n') {
        n_pos = skip_line_terminator(v_bytes, n_pos);
        n_blank += 1;
    }
    n_blank
}

fn skip_line_terminator(v_bytes: &[u8], n_pos: usize) -> usize {
    if v_bytes[n_pos] == b'\r' && v_bytes.get(n_pos + 1) == Some(&b'\n') {
        n_pos + 2
    } else {
        n_pos + 1
    }
}

/// Reject cell text longer than [`N_LEN_EXCEL_CELL_TEXT_MAX`] UTF-16 code units.
pub fn validate_cell_text(row_idx: usize, col_idx: usize, text: &str) -> Result<(), ConvertError> {
    let n_len = text.encode_utf16().count();
    if n_len > N_LEN_EXCEL_CELL_TEXT_MAX {
        return Err(ConvertError::CellTextTooLong {
            row_idx,
            col_idx,
            n_len,
        });
    }
    Ok(())
}

/// Convert a user-facing delimiter string to the single byte the reader needs.
pub fn parse_delimiter(value: &str) -> Result<u8, ConvertError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(chr), None) if chr.is_ascii() => Ok(chr as u8),
        _ => Err(ConvertError::InvalidDelimiter(value.to_string())),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthHeuristics

/// BIFF column width of `text` in 1/256 character units.
///
/// Approximates the `0` glyph of the default font; exact autofit needs font
/// metrics that are not available here.
pub fn estimate_biff_width(text: &str) -> u32 {
    let n_chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    n_chars
        .saturating_add(1)
        .saturating_mul(N_WIDTH_BIFF_CHAR_UNITS)
}

/// OOXML column width of `text` in characters.
pub fn estimate_xlsx_width(text: &str) -> u32 {
    u32::try_from(text.chars().count()).unwrap_or(u32::MAX)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Sheet name for `backend`: sanitized override or the backend default.
pub fn derive_sheet_name(sheet_name: Option<&str>, backend: EnumExcelBackend) -> String {
    match sheet_name {
        Some(c_name) => sanitize_sheet_name(c_name, "_"),
        None => backend.default_sheet_name().to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
