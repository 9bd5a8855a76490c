//! Top-level CSV to spreadsheet dispatcher.

use csv::StringRecord;
use log::{debug, trace};

use crate::spec::{
    ConvertError, EnumRowStyle, ReportConvert, ResponseContent, SpecBackendAvailability,
    SpecConvertOptions,
};
use crate::util::{
    count_blank_lines, create_csv_reader, decode_source_text, derive_sheet_name, select_backend,
};
use crate::writer::create_row_writer;

/// Replace the CSV body of `response` with a spreadsheet document.
///
/// The backend is resolved against the features compiled into this build.
/// `response` is only modified once the document serialized successfully.
pub fn convert<R: ResponseContent + ?Sized>(
    response: &mut R,
    options: &SpecConvertOptions,
) -> Result<ReportConvert, ConvertError> {
    convert_with_availability(response, options, &SpecBackendAvailability::detect())
}

/// [`convert`] with an explicit availability vector.
pub fn convert_with_availability<R: ResponseContent + ?Sized>(
    response: &mut R,
    options: &SpecConvertOptions,
    availability: &SpecBackendAvailability,
) -> Result<ReportConvert, ConvertError> {
    let (v_document, report) = derive_document(response.content(), options, availability)?;

    response.set_content_type(report.backend.content_type());
    response.set_content(v_document);
    Ok(report)
}

/// Convert raw CSV bytes for hosts without a response object.
pub fn convert_bytes(
    v_content: &[u8],
    options: &SpecConvertOptions,
) -> Result<(Vec<u8>, ReportConvert), ConvertError> {
    derive_document(v_content, options, &SpecBackendAvailability::detect())
}

fn derive_document(
    v_content: &[u8],
    options: &SpecConvertOptions,
    availability: &SpecBackendAvailability,
) -> Result<(Vec<u8>, ReportConvert), ConvertError> {
    let backend = select_backend(options.backend.as_deref(), availability)?;
    debug!(
        "excel backend resolved: {backend} (override={:?}, title_present={})",
        options.backend, options.if_title_present
    );

    let c_sheet_name = derive_sheet_name(options.sheet_name.as_deref(), backend);
    let mut writer = create_row_writer(backend, &c_sheet_name)?;

    let c_text = decode_source_text(v_content)?;
    let mut reader = create_csv_reader(&c_text, options.delimiter);

    // Empty source lines are rows without cells.
    let mut row_idx = count_blank_lines(&c_text, 0);
    let mut n_cols_max = 0usize;
    let mut record = StringRecord::new();
    while reader.read_record(&mut record)? {
        let style = EnumRowStyle::for_row(backend, row_idx);
        writer.write_row(row_idx, &record, style)?;
        n_cols_max = n_cols_max.max(record.len());

        let n_byte = usize::try_from(reader.position().byte()).unwrap_or(usize::MAX);
        row_idx += 1 + count_blank_lines(&c_text, n_byte);
    }
    let n_rows = row_idx;
    trace!(
        "sheet `{c_sheet_name}`: {n_rows} rows, {} sized columns",
        writer.column_widths().len()
    );

    let v_document = writer.finish()?;
    let report = ReportConvert {
        backend,
        n_rows,
        n_cols_max,
    };
    debug!("{report} bytes={}", v_document.len());
    Ok((v_document, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnumExcelBackend, HttpResponseBuffer};

    fn options_for(backend: &str) -> SpecConvertOptions {
        SpecConvertOptions {
            backend: Some(backend.to_string()),
            ..SpecConvertOptions::default()
        }
    }

    #[test]
    fn convert_reports_rows_and_widest_row() {
        let mut response = HttpResponseBuffer::new("a,b,c\n1\n2,3\n");
        let report = convert(&mut response, &options_for("openpyxl")).unwrap();

        assert_eq!(report.backend, EnumExcelBackend::Xlsx);
        assert_eq!(report.n_rows, 3);
        assert_eq!(report.n_cols_max, 3);
        assert_eq!(
            response.content_type.as_deref(),
            Some(EnumExcelBackend::Xlsx.content_type())
        );
        assert_eq!(&response.content[..2], b"PK");
    }

    #[test]
    fn convert_leaves_response_untouched_on_error() {
        let mut response = HttpResponseBuffer::new("a,b\n");
        let err = convert(&mut response, &options_for("xlsxwriter")).unwrap_err();

        assert!(matches!(err, ConvertError::UnsupportedBackend(_)));
        assert_eq!(response.content, b"a,b\n");
        assert_eq!(response.content_type, None);
    }

    #[test]
    fn convert_with_nothing_available_fails() {
        let mut response = HttpResponseBuffer::new("a\n");
        let err = convert_with_availability(
            &mut response,
            &SpecConvertOptions::default(),
            &SpecBackendAvailability::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::NoBackendAvailable));
    }

    #[test]
    fn convert_bytes_rejects_invalid_utf8() {
        let err = convert_bytes(&[b'a', 0xC3, b'\n'], &options_for("xlwt")).unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)));
    }

    #[test]
    fn convert_counts_blank_lines_as_rows() {
        let (_, report) = convert_bytes(b"a\n\nb\n", &options_for("openpyxl")).unwrap();
        assert_eq!(report.n_rows, 3);
        assert_eq!(report.n_cols_max, 1);

        let (_, report) = convert_bytes(b"\r\nh\r\n\r\nv\r\n\r\n", &options_for("xlwt")).unwrap();
        assert_eq!(report.n_rows, 5);
    }

    #[test]
    fn convert_empty_body_yields_empty_sheet() {
        let (v_document, report) = convert_bytes(b"", &options_for("xlwt")).unwrap();
        assert_eq!(report.n_rows, 0);
        assert_eq!(report.n_cols_max, 0);
        assert!(!v_document.is_empty());
    }
}
