#![warn(warnings)]
#![deny(clippy::all)]

use opendal::Operator;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use pyo3::IntoPyObjectExt;
use serde_json::Value;

pub mod auth;
pub mod config;
pub mod credential;
pub mod error;
pub mod filter;
pub mod image;
pub mod note;
pub mod search;
pub mod session;
pub mod storage;
pub mod store;

use auth::{AuthGateway, OpendalAuthGateway};
use config::StoreConfig;
use error::NoteError;
use filter::{FilterKey, FilterState};
use image::ImageUpload;
use session::{NoteSession, SaveOutcome, SaveRequest};
use store::{NoteStore, OpendalNoteStore};

pub const LOG_ENV: &str = "NOTEKEEP_LOG";

/// Installs a fmt subscriber filtered by `NOTEKEEP_LOG` (default `info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
}

// --- Helpers ---

fn store_config(config: &Bound<'_, PyDict>) -> PyResult<StoreConfig> {
    let uri = config
        .get_item("uri")?
        .ok_or_else(|| PyValueError::new_err("Missing 'uri' in storage config"))?
        .extract::<String>()?;
    let mut store_config = StoreConfig::new(uri);
    if let Some(public_url) = config.get_item("public_url")? {
        store_config.public_url = public_url.extract()?;
    }
    if let Some(notes_dir) = config.get_item("notes_dir")? {
        store_config.notes_dir = notes_dir.extract()?;
    }
    if let Some(images_dir) = config.get_item("images_dir")? {
        store_config.images_dir = images_dir.extract()?;
    }
    store_config
        .validated()
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

fn get_operator(_py: Python<'_>, config: &Bound<'_, PyDict>) -> PyResult<(Operator, StoreConfig)> {
    let store_config = store_config(config)?;
    let op = storage::operator_from_uri(&store_config.uri)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok((op, store_config))
}

fn to_py_err(err: NoteError) -> PyErr {
    match err {
        NoteError::InvalidInput(_) => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(format!("{}: {}", err.kind(), err)),
    }
}

fn parse_filters(keys: Option<Vec<String>>) -> PyResult<FilterState> {
    let keys = keys
        .unwrap_or_default()
        .iter()
        .map(|k| k.parse::<FilterKey>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_py_err)?;
    Ok(FilterState::from_active(keys))
}

fn to_uploads(images: Vec<(String, Vec<u8>)>) -> Vec<ImageUpload> {
    images
        .into_iter()
        .map(|(name, bytes)| ImageUpload::new(name, bytes))
        .collect()
}

fn json_to_py(py: Python<'_>, value: Value) -> PyResult<PyObject> {
    match value {
        Value::Null => Ok(py.None()),
        Value::Bool(b) => b.into_py_any(py),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into_py_any(py)
            } else if let Some(f) = n.as_f64() {
                f.into_py_any(py)
            } else {
                n.to_string().into_py_any(py)
            }
        }
        Value::String(s) => s.into_py_any(py),
        Value::Array(arr) => {
            let list = PyList::empty(py);
            for item in arr {
                list.append(json_to_py(py, item)?)?;
            }
            Ok(list.into())
        }
        Value::Object(map) => {
            let dict = PyDict::new(py);
            for (k, v) in map {
                dict.set_item(k, json_to_py(py, v)?)?;
            }
            Ok(dict.into())
        }
    }
}

fn serialize_to_py<T: serde::Serialize>(value: &T) -> PyResult<PyObject> {
    let val = serde_json::to_value(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    Python::with_gil(|py| json_to_py(py, val))
}

async fn open_session(
    op: Operator,
    config: StoreConfig,
) -> PyResult<NoteSession<OpendalNoteStore>> {
    let store = OpendalNoteStore::open(op, config)
        .await
        .map_err(to_py_err)?;
    Ok(NoteSession::new(store))
}

// --- Bindings ---

#[pyfunction]
#[pyo3(name = "test_storage_connection")]
fn test_storage_connection_py<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, _) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        Ok(op.check().await.is_ok())
    })
}

// Notes

#[pyfunction]
#[pyo3(signature = (storage_config, filters=None, query=None))]
fn list_notes<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    filters: Option<Vec<String>>,
    query: Option<String>,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, config) = get_operator(py, &storage_config)?;
    let filters = parse_filters(filters)?;
    let query = query.unwrap_or_default();
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let mut session = open_session(op, config)
            .await?
            .with_filters(filters)
            .with_query(query);
        let visible = session.refresh().await.map_err(to_py_err)?;
        serialize_to_py(&visible)
    })
}

#[pyfunction]
fn get_note<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    note_id: String,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, config) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let session = open_session(op, config).await?;
        let note = session.note(&note_id).await.map_err(to_py_err)?;
        serialize_to_py(&note)
    })
}

#[pyfunction]
#[pyo3(signature = (storage_config, note_id, title, content, image_urls=None, new_images=None))]
fn save_note<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    note_id: String,
    title: String,
    content: String,
    image_urls: Option<Vec<String>>,
    new_images: Option<Vec<(String, Vec<u8>)>>,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, config) = get_operator(py, &storage_config)?;
    let mut request = SaveRequest::new(title, content).for_note(note_id);
    request.image_urls = image_urls;
    let uploads = to_uploads(new_images.unwrap_or_default());
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let mut session = open_session(op, config).await?;
        let outcome = session
            .save_with_images(request, uploads)
            .await
            .map_err(to_py_err)?;
        match outcome {
            SaveOutcome::Saved(note) => serialize_to_py(&note),
            SaveOutcome::Skipped => Python::with_gil(|py| Ok(py.None())),
        }
    })
}

async fn toggle_flag(
    op: Operator,
    config: StoreConfig,
    note_id: String,
    favorite: bool,
) -> PyResult<PyObject> {
    let mut session = open_session(op, config).await?;
    let note = session
        .note(&note_id)
        .await
        .map_err(to_py_err)?
        .ok_or_else(|| to_py_err(NoteError::NotFound(format!("note {}", note_id))))?;
    let saved = if favorite {
        session.toggle_favorite(&note).await
    } else {
        session.toggle_complete(&note).await
    }
    .map_err(to_py_err)?;
    serialize_to_py(&saved)
}

#[pyfunction]
fn toggle_favorite<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    note_id: String,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, config) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, toggle_flag(op, config, note_id, true))
}

#[pyfunction]
fn toggle_complete<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    note_id: String,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, config) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, toggle_flag(op, config, note_id, false))
}

#[pyfunction]
fn delete_note<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    note_id: String,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, config) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let mut session = open_session(op, config).await?;
        session.delete_note(&note_id).await.map_err(to_py_err)?;
        Ok(())
    })
}

// Images

#[pyfunction]
fn upload_images<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    images: Vec<(String, Vec<u8>)>,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, config) = get_operator(py, &storage_config)?;
    let uploads = to_uploads(images);
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let session = open_session(op, config).await?;
        let urls = session
            .store()
            .upload_images(uploads)
            .await
            .map_err(to_py_err)?;
        Ok(urls)
    })
}

#[pyfunction]
fn delete_image<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    url: String,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, config) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let session = open_session(op, config).await?;
        Ok(session.delete_image(&url).await)
    })
}

// Filters

#[pyfunction]
fn toggle_filter(filters: Vec<String>, key: String) -> PyResult<Vec<String>> {
    let mut state = parse_filters(Some(filters))?;
    let key = key.parse::<FilterKey>().map_err(to_py_err)?;
    state.toggle(key);
    Ok(state
        .active_keys()
        .into_iter()
        .map(|k| k.as_str().to_string())
        .collect())
}

// Auth

#[pyfunction]
fn sign_in<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    email: String,
    password: String,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, _) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let gateway = OpendalAuthGateway::open(op).await.map_err(to_py_err)?;
        gateway
            .sign_in(&email, &password)
            .await
            .map_err(to_py_err)?;
        Ok(())
    })
}

#[pyfunction]
fn sign_up<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
    email: String,
    password: String,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, _) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let gateway = OpendalAuthGateway::open(op).await.map_err(to_py_err)?;
        gateway
            .sign_up(&email, &password)
            .await
            .map_err(to_py_err)?;
        Ok(())
    })
}

#[pyfunction]
fn sign_out<'a>(py: Python<'a>, storage_config: Bound<'a, PyDict>) -> PyResult<Bound<'a, PyAny>> {
    let (op, _) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let gateway = OpendalAuthGateway::open(op).await.map_err(to_py_err)?;
        gateway.sign_out().await.map_err(to_py_err)?;
        Ok(())
    })
}

#[pyfunction]
fn current_user_email<'a>(
    py: Python<'a>,
    storage_config: Bound<'a, PyDict>,
) -> PyResult<Bound<'a, PyAny>> {
    let (op, _) = get_operator(py, &storage_config)?;
    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let gateway = OpendalAuthGateway::open(op).await.map_err(to_py_err)?;
        let email = gateway.current_user_email().await.map_err(to_py_err)?;
        Ok(email)
    })
}

/// A Python module implemented in Rust.
#[pymodule]
fn _notekeep_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    init_logging();

    m.add_function(wrap_pyfunction!(test_storage_connection_py, m)?)?;

    m.add_function(wrap_pyfunction!(list_notes, m)?)?;
    m.add_function(wrap_pyfunction!(get_note, m)?)?;
    m.add_function(wrap_pyfunction!(save_note, m)?)?;
    m.add_function(wrap_pyfunction!(toggle_favorite, m)?)?;
    m.add_function(wrap_pyfunction!(toggle_complete, m)?)?;
    m.add_function(wrap_pyfunction!(delete_note, m)?)?;

    m.add_function(wrap_pyfunction!(upload_images, m)?)?;
    m.add_function(wrap_pyfunction!(delete_image, m)?)?;

    m.add_function(wrap_pyfunction!(toggle_filter, m)?)?;

    m.add_function(wrap_pyfunction!(sign_in, m)?)?;
    m.add_function(wrap_pyfunction!(sign_up, m)?)?;
    m.add_function(wrap_pyfunction!(sign_out, m)?)?;
    m.add_function(wrap_pyfunction!(current_user_email, m)?)?;

    Ok(())
}
