use std::io::Cursor;

use axiomkit_io_excel::{
    ConvertError, EnumExcelBackend, HttpResponseBuffer, SpecBackendAvailability,
    SpecConvertOptions, convert, convert_bytes, convert_with_availability,
};
use calamine::{Data, Range, Reader, Xls, Xlsx};
use proptest::prelude::*;

const TUP_BACKENDS: [EnumExcelBackend; 3] = [
    EnumExcelBackend::Xls,
    EnumExcelBackend::XlsLegacy,
    EnumExcelBackend::Xlsx,
];

fn options_for(backend: EnumExcelBackend) -> SpecConvertOptions {
    SpecConvertOptions {
        backend: Some(backend.identifier().to_string()),
        ..SpecConvertOptions::default()
    }
}

/// First sheet name and its range.
fn read_first_sheet(backend: EnumExcelBackend, v_document: Vec<u8>) -> (String, Range<Data>) {
    match backend {
        EnumExcelBackend::Xls | EnumExcelBackend::XlsLegacy => {
            let mut workbook = Xls::new(Cursor::new(v_document)).unwrap();
            let c_name = workbook.sheet_names()[0].clone();
            (c_name, workbook.worksheet_range_at(0).unwrap().unwrap())
        }
        EnumExcelBackend::Xlsx => {
            let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(v_document)).unwrap();
            let c_name = workbook.sheet_names()[0].clone();
            (c_name, workbook.worksheet_range_at(0).unwrap().unwrap())
        }
    }
}

/// Cell text by absolute position with trailing empty cells dropped per row.
fn read_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    let Some((row_end, col_end)) = range.end() else {
        return Vec::new();
    };

    (0..=row_end)
        .map(|row_idx| {
            let mut l_row: Vec<String> = (0..=col_end)
                .map(|col_idx| match range.get_value((row_idx, col_idx)) {
                    Some(Data::String(text)) => text.clone(),
                    Some(Data::Empty) | None => String::new(),
                    Some(other) => panic!("unexpected cell type at ({row_idx}, {col_idx}): {other:?}"),
                })
                .collect();
            while l_row.last().is_some_and(String::is_empty) {
                l_row.pop();
            }
            l_row
        })
        .collect()
}

fn encode_csv(l_rows: &[Vec<String>]) -> Vec<u8> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for l_row in l_rows {
        writer.write_record(l_row).unwrap();
    }
    writer.into_inner().unwrap()
}

#[test]
fn two_by_two_csv_reads_back_on_every_backend() {
    for backend in TUP_BACKENDS {
        let mut response = HttpResponseBuffer::new("a,b\n1,2\n");
        let report = convert(&mut response, &options_for(backend)).unwrap();
        assert_eq!(report.backend, backend);
        assert_eq!(report.n_rows, 2);
        assert_eq!(
            response.content_type.as_deref(),
            Some(backend.content_type())
        );

        let (c_name, range) = read_first_sheet(backend, response.content);
        assert_eq!(c_name, backend.default_sheet_name());
        assert_eq!(read_rows(&range), vec![vec!["a", "b"], vec!["1", "2"]]);
    }
}

#[test]
fn ragged_rows_keep_their_field_counts() {
    let c_csv = "id,name,city\n1,\"Lovelace, Ada\"\n2\n3,Babbage,London,extra\n";
    for backend in TUP_BACKENDS {
        let (v_document, report) = convert_bytes(c_csv.as_bytes(), &options_for(backend)).unwrap();
        assert_eq!(report.n_rows, 4);
        assert_eq!(report.n_cols_max, 4);

        let (_, range) = read_first_sheet(backend, v_document);
        let l_rows = read_rows(&range);
        assert_eq!(l_rows.len(), 4);
        assert_eq!(l_rows[0], vec!["id", "name", "city"]);
        assert_eq!(l_rows[1], vec!["1", "Lovelace, Ada"]);
        assert_eq!(l_rows[2], vec!["2"]);
        assert_eq!(l_rows[3], vec!["3", "Babbage", "London", "extra"]);
    }
}

#[test]
fn blank_lines_keep_source_row_positions() {
    for backend in TUP_BACKENDS {
        let (v_document, report) = convert_bytes(b"a\n\nb\n", &options_for(backend)).unwrap();
        assert_eq!(report.n_rows, 3);

        let (_, range) = read_first_sheet(backend, v_document);
        assert_eq!(
            read_rows(&range),
            vec![vec!["a".to_string()], vec![], vec!["b".to_string()]]
        );
    }
}

#[test]
fn numeric_looking_values_stay_text() {
    let (v_document, _) =
        convert_bytes(b"007,1e3,-0.50\n", &options_for(EnumExcelBackend::Xlsx)).unwrap();
    let (_, range) = read_first_sheet(EnumExcelBackend::Xlsx, v_document);
    assert_eq!(read_rows(&range), vec![vec!["007", "1e3", "-0.50"]]);
}

#[test]
fn unicode_and_long_strings_survive_biff() {
    let c_long = "x".repeat(9_000);
    let c_csv = format!("héllo,日本語\n{c_long},ok\n");
    let (v_document, _) =
        convert_bytes(c_csv.as_bytes(), &options_for(EnumExcelBackend::Xls)).unwrap();

    let (_, range) = read_first_sheet(EnumExcelBackend::Xls, v_document);
    let l_rows = read_rows(&range);
    assert_eq!(l_rows[0], vec!["héllo", "日本語"]);
    assert_eq!(l_rows[1][0].len(), 9_000);
    assert_eq!(l_rows[1][1], "ok");
}

#[test]
fn custom_delimiter_and_sheet_name() {
    let options = SpecConvertOptions {
        backend: Some("openpyxl".to_string()),
        delimiter: b';',
        sheet_name: Some("Q1/Q2 report".to_string()),
        ..SpecConvertOptions::default()
    };
    let (v_document, _) = convert_bytes(b"a;b\n", &options).unwrap();

    let (c_name, range) = read_first_sheet(EnumExcelBackend::Xlsx, v_document);
    assert_eq!(c_name, "Q1_Q2 report");
    assert_eq!(read_rows(&range), vec![vec!["a", "b"]]);
}

#[test]
fn auto_detection_prefers_styled_xls() {
    let mut response = HttpResponseBuffer::new("a\n");
    let report = convert_with_availability(
        &mut response,
        &SpecConvertOptions::default(),
        &SpecBackendAvailability::all(),
    )
    .unwrap();
    assert_eq!(report.backend, EnumExcelBackend::Xls);
    assert_eq!(
        &response.content[..8],
        &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]
    );
}

#[test]
fn unsupported_override_keeps_response() {
    let mut response = HttpResponseBuffer::new("a,b\n");
    let options = SpecConvertOptions {
        backend: Some("xlsxwriter".to_string()),
        ..SpecConvertOptions::default()
    };
    let err = convert(&mut response, &options).unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedBackend(ref name) if name == "xlsxwriter"));
    assert_eq!(response.content, b"a,b\n");
}

#[test]
fn too_many_columns_for_biff_keeps_response() {
    let c_row = vec!["v"; 300].join(",");
    let mut response = HttpResponseBuffer::new(format!("{c_row}\n"));
    let err = convert(&mut response, &options_for(EnumExcelBackend::Xls)).unwrap_err();
    assert!(matches!(
        err,
        ConvertError::SheetLimitExceeded { col_idx: 256, .. }
    ));
    assert_eq!(response.content, format!("{c_row}\n").into_bytes());

    let report = convert(&mut response, &options_for(EnumExcelBackend::Xlsx)).unwrap();
    assert_eq!(report.n_cols_max, 300);
}

fn grid_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(
        prop::collection::vec("[a-zA-Z0-9,\"é]{1,8}", 1..5),
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn rows_read_back_unchanged(l_rows in grid_strategy()) {
        let v_csv = encode_csv(&l_rows);
        for backend in TUP_BACKENDS {
            let (v_document, report) = convert_bytes(&v_csv, &options_for(backend)).unwrap();
            prop_assert_eq!(report.n_rows, l_rows.len());

            let (_, range) = read_first_sheet(backend, v_document);
            prop_assert_eq!(&read_rows(&range), &l_rows);
        }
    }
}
