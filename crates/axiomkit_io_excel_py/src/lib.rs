use std::collections::BTreeMap;

use axiomkit_io_excel::{
    ConvertError, ReportConvert, SpecBackendAvailability, SpecConvertOptions, convert_bytes,
    derive_backend_override, parse_delimiter, select_backend,
};
use log::debug;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "axiomkit.io.excel.convert.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "ReportConvert")]
#[derive(Debug, Clone)]
struct PyReportConvert {
    #[pyo3(get)]
    backend: String,
    #[pyo3(get)]
    file_extension: String,
    #[pyo3(get)]
    content_type: String,
    #[pyo3(get)]
    n_rows: usize,
    #[pyo3(get)]
    n_cols_max: usize,
}

impl From<ReportConvert> for PyReportConvert {
    fn from(report_convert: ReportConvert) -> Self {
        Self {
            backend: report_convert.backend.identifier().to_string(),
            file_extension: report_convert.backend.file_extension().to_string(),
            content_type: report_convert.backend.content_type().to_string(),
            n_rows: report_convert.n_rows,
            n_cols_max: report_convert.n_cols_max,
        }
    }
}

#[pymethods]
impl PyReportConvert {
    fn to_dict(&self) -> BTreeMap<String, usize> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("n_rows".to_string(), self.n_rows);
        dict_counts.insert("n_cols_max".to_string(), self.n_cols_max);
        dict_counts
    }

    #[pyo3(signature = (prefix = "[EXCEL]"))]
    fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} backend={} rows={} cols_max={}",
            self.backend, self.n_rows, self.n_cols_max
        )
    }

    fn __str__(&self) -> String {
        self.format("[EXCEL]")
    }
}

fn map_convert_error(exception: ConvertError) -> PyErr {
    match exception {
        ConvertError::NoBackendAvailable | ConvertError::BackendUnavailable(_) => {
            PyRuntimeError::new_err(exception.to_string())
        }
        ConvertError::UnsupportedBackend(_)
        | ConvertError::InvalidDelimiter(_)
        | ConvertError::Decode(_)
        | ConvertError::Csv(_)
        | ConvertError::SheetLimitExceeded { .. }
        | ConvertError::CellTextTooLong { .. } => PyValueError::new_err(exception.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// `django.conf.settings.EXCEL_SUPPORT`, or `None` when Django or the setting is absent.
fn read_django_excel_support(py: Python<'_>) -> Option<String> {
    let value = py
        .import("django.conf")
        .and_then(|module| module.getattr("settings"))
        .and_then(|settings| settings.getattr("EXCEL_SUPPORT"));
    match value {
        Ok(value) if !value.is_none() => value.extract::<String>().ok(),
        Ok(_) => None,
        Err(exception) => {
            debug!("EXCEL_SUPPORT setting not readable: {exception}");
            None
        }
    }
}

fn create_convert_options(
    excel_support: Option<String>,
    delimiter: &str,
    if_title_present: bool,
    sheet_name: Option<String>,
) -> PyResult<SpecConvertOptions> {
    Ok(SpecConvertOptions {
        backend: excel_support,
        delimiter: parse_delimiter(delimiter).map_err(map_convert_error)?,
        if_title_present,
        sheet_name,
    })
}

/// Backend identifier a conversion would use.
///
/// Falls back to `django.conf.settings.EXCEL_SUPPORT` when `excel_support` is `None`.
#[pyfunction(name = "get_excel_support")]
#[pyo3(signature = (excel_support = None))]
fn get_excel_support_py(py: Python<'_>, excel_support: Option<String>) -> PyResult<String> {
    let excel_support = derive_backend_override(excel_support, || read_django_excel_support(py));
    let backend = select_backend(excel_support.as_deref(), &SpecBackendAvailability::detect())
        .map_err(map_convert_error)?;
    Ok(backend.identifier().to_string())
}

/// Convert CSV bytes and return `(document, backend identifier)`.
#[pyfunction(name = "convert_csv_to_excel")]
#[pyo3(signature = (
    content,
    excel_support = None,
    delimiter = ",",
    if_title_present = false,
    sheet_name = None
))]
fn convert_csv_to_excel_py<'py>(
    py: Python<'py>,
    content: Vec<u8>,
    excel_support: Option<String>,
    delimiter: &str,
    if_title_present: bool,
    sheet_name: Option<String>,
) -> PyResult<(Bound<'py, PyBytes>, String)> {
    let spec_options =
        create_convert_options(excel_support, delimiter, if_title_present, sheet_name)?;

    let result_convert = py.allow_threads(|| convert_bytes(&content, &spec_options));
    let (v_document, report_convert) = result_convert.map_err(map_convert_error)?;
    Ok((
        PyBytes::new(py, &v_document),
        report_convert.backend.identifier().to_string(),
    ))
}

/// Replace `response.content` with the spreadsheet document.
///
/// Falls back to `django.conf.settings.EXCEL_SUPPORT` when `excel_support` is `None`.
/// Objects supporting item assignment also get their `Content-Type` header updated.
#[pyfunction(name = "convert_to_excel")]
#[pyo3(signature = (
    response,
    excel_support = None,
    delimiter = ",",
    if_title_present = false,
    sheet_name = None
))]
fn convert_to_excel_py(
    py: Python<'_>,
    response: &Bound<'_, PyAny>,
    excel_support: Option<String>,
    delimiter: &str,
    if_title_present: bool,
    sheet_name: Option<String>,
) -> PyResult<PyReportConvert> {
    let excel_support = derive_backend_override(excel_support, || read_django_excel_support(py));
    let spec_options =
        create_convert_options(excel_support, delimiter, if_title_present, sheet_name)?;
    let v_content: Vec<u8> = response.getattr("content")?.extract()?;

    let result_convert = py.allow_threads(|| convert_bytes(&v_content, &spec_options));
    let (v_document, report_convert) = result_convert.map_err(map_convert_error)?;

    response.setattr("content", PyBytes::new(py, &v_document))?;
    if response.hasattr("__setitem__")? {
        response.set_item("Content-Type", report_convert.backend.content_type())?;
    }
    Ok(PyReportConvert::from(report_convert))
}

#[pymodule]
fn _axiomkit_io_excel_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyReportConvert>()?;
    module.add_function(wrap_pyfunction!(get_excel_support_py, module)?)?;
    module.add_function(wrap_pyfunction!(convert_csv_to_excel_py, module)?)?;
    module.add_function(wrap_pyfunction!(convert_to_excel_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
