//! Per-backend row writers and worksheet finalizers.

use csv::StringRecord;

#[cfg(any(feature = "xls", feature = "xls_legacy"))]
use crate::biff::{BiffWorkbook, N_XF_CELL_BOLD, N_XF_CELL_DEFAULT};
#[cfg(any(feature = "xls", feature = "xls_legacy"))]
use crate::conf::{N_NCOLS_BIFF8_MAX, N_NROWS_BIFF8_MAX};
#[cfg(feature = "xlsx")]
use crate::conf::N_WIDTH_XLSX_COLUMN_MAX;
use crate::spec::{ConvertError, EnumExcelBackend, EnumRowStyle, SpecColumnWidths};
#[cfg(any(feature = "xls", feature = "xls_legacy"))]
use crate::util::estimate_biff_width;
#[cfg(feature = "xlsx")]
use crate::util::estimate_xlsx_width;
use crate::util::validate_cell_text;

/// Row-at-a-time writer into one worksheet.
///
/// Implementations track the widest value per column and apply those widths
/// in [`SheetRowWriter::finish`] before serializing.
pub trait SheetRowWriter {
    /// Backend this writer produces output for.
    fn backend(&self) -> EnumExcelBackend;

    /// Write `fields` at `row_idx`, columns `0..fields.len()`.
    fn write_row(
        &mut self,
        row_idx: usize,
        fields: &StringRecord,
        style: EnumRowStyle,
    ) -> Result<(), ConvertError>;

    /// Widths observed so far.
    fn column_widths(&self) -> &SpecColumnWidths;

    /// Apply column widths and serialize the workbook.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, ConvertError>;
}

/// Build the writer for `backend`.
///
/// Fails with [`ConvertError::BackendUnavailable`] when the backend's feature
/// is not compiled in.
pub fn create_row_writer(
    backend: EnumExcelBackend,
    sheet_name: &str,
) -> Result<Box<dyn SheetRowWriter>, ConvertError> {
    match backend {
        #[cfg(feature = "xls")]
        EnumExcelBackend::Xls => Ok(Box::new(BiffRowWriter::new(backend, sheet_name))),
        #[cfg(feature = "xls_legacy")]
        EnumExcelBackend::XlsLegacy => Ok(Box::new(BiffRowWriter::new(backend, sheet_name))),
        #[cfg(feature = "xlsx")]
        EnumExcelBackend::Xlsx => Ok(Box::new(XlsxRowWriter::new(sheet_name)?)),
        #[allow(unreachable_patterns)]
        _ => {
            let _ = sheet_name;
            Err(ConvertError::BackendUnavailable(backend))
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region BiffWriter

/// BIFF8 writer shared by [`EnumExcelBackend::Xls`] and
/// [`EnumExcelBackend::XlsLegacy`]; they differ only in header policy.
#[cfg(any(feature = "xls", feature = "xls_legacy"))]
pub struct BiffRowWriter {
    backend: EnumExcelBackend,
    workbook: BiffWorkbook,
    col_widths: SpecColumnWidths,
}

#[cfg(any(feature = "xls", feature = "xls_legacy"))]
impl BiffRowWriter {
    pub fn new(backend: EnumExcelBackend, sheet_name: &str) -> Self {
        Self {
            backend,
            workbook: BiffWorkbook::new(sheet_name),
            col_widths: SpecColumnWidths::default(),
        }
    }
}

#[cfg(any(feature = "xls", feature = "xls_legacy"))]
impl SheetRowWriter for BiffRowWriter {
    fn backend(&self) -> EnumExcelBackend {
        self.backend
    }

    fn write_row(
        &mut self,
        row_idx: usize,
        fields: &StringRecord,
        style: EnumRowStyle,
    ) -> Result<(), ConvertError> {
        let xf_idx = match style {
            EnumRowStyle::Header => N_XF_CELL_BOLD,
            EnumRowStyle::Body => N_XF_CELL_DEFAULT,
        };

        for (col_idx, text) in fields.iter().enumerate() {
            if row_idx >= N_NROWS_BIFF8_MAX || col_idx >= N_NCOLS_BIFF8_MAX {
                return Err(ConvertError::SheetLimitExceeded {
                    row_idx,
                    col_idx,
                    backend: self.backend,
                });
            }
            validate_cell_text(row_idx, col_idx, text)?;

            self.workbook
                .write_text(row_idx as u16, col_idx as u16, text, xf_idx);
            self.col_widths.observe(col_idx, estimate_biff_width(text));
        }
        Ok(())
    }

    fn column_widths(&self) -> &SpecColumnWidths {
        &self.col_widths
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>, ConvertError> {
        let l_widths: Vec<(usize, u32)> = self.col_widths.iter().collect();
        for (col_idx, width) in l_widths {
            let width = u16::try_from(width).unwrap_or(u16::MAX);
            self.workbook.set_column_width(col_idx as u16, width);
        }
        self.workbook.save_to_buffer()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region XlsxWriter

/// OOXML writer backed by `rust_xlsxwriter`.
#[cfg(feature = "xlsx")]
pub struct XlsxRowWriter {
    worksheet: rust_xlsxwriter::Worksheet,
    fmt_header: rust_xlsxwriter::Format,
    col_widths: SpecColumnWidths,
}

#[cfg(feature = "xlsx")]
impl XlsxRowWriter {
    /// Writer for a sheet named `sheet_name` (must already be a valid sheet name).
    pub fn new(sheet_name: &str) -> Result<Self, ConvertError> {
        let mut worksheet = rust_xlsxwriter::Worksheet::new();
        worksheet.set_name(sheet_name)?;
        Ok(Self {
            worksheet,
            fmt_header: rust_xlsxwriter::Format::new().set_bold(),
            col_widths: SpecColumnWidths::default(),
        })
    }
}

#[cfg(feature = "xlsx")]
impl SheetRowWriter for XlsxRowWriter {
    fn backend(&self) -> EnumExcelBackend {
        EnumExcelBackend::Xlsx
    }

    fn write_row(
        &mut self,
        row_idx: usize,
        fields: &StringRecord,
        style: EnumRowStyle,
    ) -> Result<(), ConvertError> {
        let row_num = u32::try_from(row_idx).map_err(|_| ConvertError::SheetLimitExceeded {
            row_idx,
            col_idx: 0,
            backend: EnumExcelBackend::Xlsx,
        })?;

        for (col_idx, text) in fields.iter().enumerate() {
            let col_num = u16::try_from(col_idx).map_err(|_| ConvertError::SheetLimitExceeded {
                row_idx,
                col_idx,
                backend: EnumExcelBackend::Xlsx,
            })?;
            validate_cell_text(row_idx, col_idx, text)?;

            match (style, text.is_empty()) {
                (EnumRowStyle::Header, true) => {
                    self.worksheet
                        .write_blank(row_num, col_num, &self.fmt_header)?;
                }
                (EnumRowStyle::Header, false) => {
                    self.worksheet
                        .write_string_with_format(row_num, col_num, text, &self.fmt_header)?;
                }
                (EnumRowStyle::Body, true) => {}
                (EnumRowStyle::Body, false) => {
                    self.worksheet.write_string(row_num, col_num, text)?;
                }
            }
            self.col_widths.observe(col_idx, estimate_xlsx_width(text));
        }
        Ok(())
    }

    fn column_widths(&self) -> &SpecColumnWidths {
        &self.col_widths
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>, ConvertError> {
        let l_widths: Vec<(usize, u32)> = self.col_widths.iter().collect();
        for (col_idx, width) in l_widths {
            // Width 0 would hide the column.
            if width == 0 {
                continue;
            }
            let width = u32::min(width, N_WIDTH_XLSX_COLUMN_MAX);
            self.worksheet
                .set_column_width(col_idx as u16, f64::from(width))?;
        }

        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.push_worksheet(self.worksheet);
        Ok(workbook.save_to_buffer()?)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
