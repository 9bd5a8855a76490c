//! Shared conversion specification models and error types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::conf::{
    C_CONTENT_TYPE_XLS, C_CONTENT_TYPE_XLSX, C_SHEET_NAME_BIFF_DEFAULT, C_SHEET_NAME_XLSX_DEFAULT,
    N_CSV_DELIMITER_DEFAULT,
};

////////////////////////////////////////////////////////////////////////////////
// #region BackendSpecification

/// Spreadsheet-writing backend.
///
/// Identifiers keep the names of the Python libraries hosts already configure
/// (`EXCEL_SUPPORT = "xlwt"` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnumExcelBackend {
    /// BIFF8 `.xls` writer with a bold first row (`"xlwt"`).
    Xls,
    /// BIFF8 `.xls` writer without header styling (`"pyexcelerator"`).
    XlsLegacy,
    /// OOXML `.xlsx` writer with a bold first row (`"openpyxl"`).
    Xlsx,
}

impl EnumExcelBackend {
    /// Configuration identifier.
    pub fn identifier(self) -> &'static str {
        match self {
            Self::Xls => "xlwt",
            Self::XlsLegacy => "pyexcelerator",
            Self::Xlsx => "openpyxl",
        }
    }

    /// Resolve a configuration identifier, `None` when unknown.
    pub fn from_identifier(value: &str) -> Option<Self> {
        match value {
            "xlwt" => Some(Self::Xls),
            "pyexcelerator" => Some(Self::XlsLegacy),
            "openpyxl" => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// File extension of the produced document, without dot.
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Xls | Self::XlsLegacy => "xls",
            Self::Xlsx => "xlsx",
        }
    }

    /// MIME type of the produced document.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Xls | Self::XlsLegacy => C_CONTENT_TYPE_XLS,
            Self::Xlsx => C_CONTENT_TYPE_XLSX,
        }
    }

    /// Sheet name used when the caller does not provide one.
    pub fn default_sheet_name(self) -> &'static str {
        match self {
            Self::Xls | Self::XlsLegacy => C_SHEET_NAME_BIFF_DEFAULT,
            Self::Xlsx => C_SHEET_NAME_XLSX_DEFAULT,
        }
    }
}

impl fmt::Display for EnumExcelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for EnumExcelBackend {
    type Err = ConvertError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_identifier(value).ok_or_else(|| ConvertError::UnsupportedBackend(value.to_string()))
    }
}

/// Which backends are compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecBackendAvailability {
    /// `xls` feature.
    pub if_xls: bool,
    /// `xls_legacy` feature.
    pub if_xls_legacy: bool,
    /// `xlsx` feature.
    pub if_xlsx: bool,
}

impl SpecBackendAvailability {
    /// Availability of the current build.
    pub fn detect() -> Self {
        Self {
            if_xls: cfg!(feature = "xls"),
            if_xls_legacy: cfg!(feature = "xls_legacy"),
            if_xlsx: cfg!(feature = "xlsx"),
        }
    }

    /// Every backend available.
    pub fn all() -> Self {
        Self {
            if_xls: true,
            if_xls_legacy: true,
            if_xlsx: true,
        }
    }

    /// Whether `backend` can run in this build.
    pub fn contains(&self, backend: EnumExcelBackend) -> bool {
        match backend {
            EnumExcelBackend::Xls => self.if_xls,
            EnumExcelBackend::XlsLegacy => self.if_xls_legacy,
            EnumExcelBackend::Xlsx => self.if_xlsx,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConvertOptions

/// Per-call conversion options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecConvertOptions {
    /// Backend identifier override; `None` or empty triggers auto-detection.
    pub backend: Option<String>,
    /// CSV field delimiter.
    pub delimiter: u8,
    /// First row is a title row. Accepted for the legacy backend's option set;
    /// the title row is written like any other row.
    pub if_title_present: bool,
    /// Sheet name override, sanitized before use.
    pub sheet_name: Option<String>,
}

impl Default for SpecConvertOptions {
    fn default() -> Self {
        Self {
            backend: None,
            delimiter: N_CSV_DELIMITER_DEFAULT,
            if_title_present: false,
            sheet_name: None,
        }
    }
}

/// Style token passed to a row writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumRowStyle {
    /// Plain cells.
    #[default]
    Body,
    /// Bold header cells.
    Header,
}

impl EnumRowStyle {
    /// Style of `row_idx` for `backend`.
    ///
    /// `Xls` and `Xlsx` always bold row 0. `XlsLegacy` never styles cells, a
    /// declared title row included.
    pub fn for_row(backend: EnumExcelBackend, row_idx: usize) -> Self {
        let if_header = match backend {
            EnumExcelBackend::Xls | EnumExcelBackend::Xlsx => row_idx == 0,
            EnumExcelBackend::XlsLegacy => false,
        };
        if if_header { Self::Header } else { Self::Body }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnWidths

/// Maximum observed width per zero-based column index.
///
/// Units depend on the backend that fills the table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnWidths {
    dict_widths: BTreeMap<usize, u32>,
}

impl SpecColumnWidths {
    /// Keep the larger of the stored and the observed width.
    pub fn observe(&mut self, col_idx: usize, width: u32) {
        let width_max = self.dict_widths.entry(col_idx).or_insert(0);
        if width > *width_max {
            *width_max = width;
        }
    }

    /// Width recorded for `col_idx`.
    pub fn get(&self, col_idx: usize) -> Option<u32> {
        self.dict_widths.get(&col_idx).copied()
    }

    /// `(col_idx, width)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.dict_widths.iter().map(|(col_idx, width)| (*col_idx, *width))
    }

    pub fn len(&self) -> usize {
        self.dict_widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_widths.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ResponseSpecification

/// Response-like object whose body holds CSV text on input and the
/// spreadsheet document on output.
pub trait ResponseContent {
    /// Current body bytes.
    fn content(&self) -> &[u8];

    /// Replace the body entirely.
    fn set_content(&mut self, content: Vec<u8>);

    /// Update the declared content type. Hosts without headers ignore it.
    fn set_content_type(&mut self, _content_type: &str) {}
}

/// Minimal owned response body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponseBuffer {
    /// Body bytes.
    pub content: Vec<u8>,
    /// Declared MIME type.
    pub content_type: Option<String>,
}

impl HttpResponseBuffer {
    /// Response holding `content` with no content type.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            content_type: None,
        }
    }
}

impl ResponseContent for HttpResponseBuffer {
    fn content(&self) -> &[u8] {
        &self.content
    }

    fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
    }

    fn set_content_type(&mut self, content_type: &str) {
        self.content_type = Some(content_type.to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportAndErrors

/// Per-conversion report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConvert {
    /// Backend that produced the document.
    pub backend: EnumExcelBackend,
    /// Number of CSV rows written.
    pub n_rows: usize,
    /// Field count of the widest row.
    pub n_cols_max: usize,
}

impl ReportConvert {
    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} backend={} rows={} cols_max={}",
            self.backend, self.n_rows, self.n_cols_max
        )
    }
}

impl fmt::Display for ReportConvert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[EXCEL]"))
    }
}

/// "Conversion failed" errors. The response is never modified when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// No backend compiled in and no override configured.
    #[error("No support for xls generation available")]
    NoBackendAvailable,
    /// Override names an unknown backend.
    #[error("Unsupported excel backend: `{0}`. Expected one of: ['xlwt', 'pyexcelerator', 'openpyxl']")]
    UnsupportedBackend(String),
    /// Known backend whose feature is not compiled into this build.
    #[error("Excel backend `{0}` is not available in this build")]
    BackendUnavailable(EnumExcelBackend),
    /// Source bytes are not valid UTF-8.
    #[error("CSV content is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
    /// CSV reader failure.
    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),
    /// Delimiter is not a single ASCII character.
    #[error("CSV delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(String),
    /// Cell position outside the backend's worksheet limits.
    #[error("cell ({row_idx}, {col_idx}) exceeds `{backend}` worksheet limits")]
    SheetLimitExceeded {
        /// Zero-based row index.
        row_idx: usize,
        /// Zero-based column index.
        col_idx: usize,
        /// Backend whose limit was hit.
        backend: EnumExcelBackend,
    },
    /// Cell text longer than a worksheet cell can hold.
    #[error("cell ({row_idx}, {col_idx}) text has {n_len} UTF-16 units; limit is 32767")]
    CellTextTooLong {
        /// Zero-based row index.
        row_idx: usize,
        /// Zero-based column index.
        col_idx: usize,
        /// Text length in UTF-16 code units.
        n_len: usize,
    },
    /// OOXML writer failure.
    #[cfg(feature = "xlsx")]
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// Container write failure.
    #[error("xls write error: {0}")]
    Io(#[from] std::io::Error),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_identifiers_round_trip_through_from_str() {
        for backend in [
            EnumExcelBackend::Xls,
            EnumExcelBackend::XlsLegacy,
            EnumExcelBackend::Xlsx,
        ] {
            assert_eq!(backend.identifier().parse::<EnumExcelBackend>().unwrap(), backend);
        }
    }

    #[test]
    fn unknown_identifier_is_unsupported() {
        let err = "xlsxwriter".parse::<EnumExcelBackend>().unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedBackend(ref name) if name == "xlsxwriter"));
    }

    #[test]
    fn backend_output_metadata() {
        assert_eq!(EnumExcelBackend::Xls.file_extension(), "xls");
        assert_eq!(EnumExcelBackend::XlsLegacy.content_type(), C_CONTENT_TYPE_XLS);
        assert_eq!(EnumExcelBackend::Xlsx.file_extension(), "xlsx");
        assert_eq!(EnumExcelBackend::Xlsx.default_sheet_name(), "Sheet");
        assert_eq!(EnumExcelBackend::Xls.default_sheet_name(), "Sheet 1");
    }

    #[test]
    fn row_style_header_rules_differ_per_backend() {
        assert_eq!(EnumRowStyle::for_row(EnumExcelBackend::Xls, 0), EnumRowStyle::Header);
        assert_eq!(EnumRowStyle::for_row(EnumExcelBackend::Xlsx, 0), EnumRowStyle::Header);
        assert_eq!(EnumRowStyle::for_row(EnumExcelBackend::Xls, 1), EnumRowStyle::Body);
        assert_eq!(EnumRowStyle::for_row(EnumExcelBackend::XlsLegacy, 0), EnumRowStyle::Body);
    }

    #[test]
    fn column_widths_keep_maximum() {
        let mut widths = SpecColumnWidths::default();
        widths.observe(1, 5);
        widths.observe(1, 3);
        widths.observe(0, 2);
        widths.observe(1, 9);

        assert_eq!(widths.get(1), Some(9));
        assert_eq!(widths.get(2), None);
        assert_eq!(widths.iter().collect::<Vec<_>>(), vec![(0, 2), (1, 9)]);
    }

    #[test]
    fn report_format_matches_display() {
        let report = ReportConvert {
            backend: EnumExcelBackend::Xlsx,
            n_rows: 3,
            n_cols_max: 2,
        };
        assert_eq!(report.to_string(), "[EXCEL] backend=openpyxl rows=3 cols_max=2");
    }
}
