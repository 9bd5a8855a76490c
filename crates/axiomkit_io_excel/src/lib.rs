//! `axiomkit_io_excel` v1:
//! Rust-side CSV to spreadsheet conversion kernel.
//!
//! Architecture mirrors Python `io/excel` modules:
//! - `conf`    : constants and default presets
//! - `spec`    : specs/models/options/errors
//! - `util`    : backend selection, CSV input and width helpers
//! - `biff`    : BIFF8 `.xls` record writer (features `xls`, `xls_legacy`)
//! - `writer`  : per-backend row writers
//! - `convert` : top-level dispatcher
pub mod conf;
pub mod spec;
pub mod util;
#[cfg(any(feature = "xls", feature = "xls_legacy"))]
pub mod biff;
pub mod writer;
pub mod convert;

pub use conf::{
    C_CONTENT_TYPE_XLS, C_CONTENT_TYPE_XLSX, N_NCOLS_BIFF8_MAX, N_NROWS_BIFF8_MAX,
    TUP_BACKEND_PRIORITY, derive_default_convert_options,
};
pub use convert::{convert, convert_bytes, convert_with_availability};
pub use spec::{
    ConvertError, EnumExcelBackend, EnumRowStyle, HttpResponseBuffer, ReportConvert,
    ResponseContent, SpecBackendAvailability, SpecColumnWidths, SpecConvertOptions,
};
pub use util::{
    count_blank_lines, create_csv_reader, decode_source_text, derive_backend_override,
    parse_delimiter, sanitize_sheet_name, select_backend,
};
pub use writer::{SheetRowWriter, create_row_writer};
