//! Python bindings

use crate::core::waveform_filter::KernelSet;
use crate::core::{preprocess_waveforms, CTfmra, Retracker, RetrackerConfig, Tfmra};
use crate::types::{AltrackError, Waveform};
use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(err: AltrackError) -> PyErr {
    match err {
        AltrackError::Processing(msg) => PyRuntimeError::new_err(msg),
        other => PyValueError::new_err(format!("{}", other)),
    }
}

fn to_waveform(
    range: PyReadonlyArray2<f64>,
    power: PyReadonlyArray2<f64>,
    radar_mode: PyReadonlyArray1<u8>,
) -> PyResult<Waveform> {
    let flags = radar_mode.as_array().to_vec();
    Waveform::from_flags(
        power.as_array().to_owned(),
        range.as_array().to_owned(),
        &flags,
    )
    .map_err(to_py_err)
}

fn parse_config(options: Option<&str>) -> PyResult<RetrackerConfig> {
    match options {
        Some(json) => RetrackerConfig::from_json_str(RetrackerConfig::default(), json),
        None => Ok(RetrackerConfig::default()),
    }
    .map_err(to_py_err)
}

/// Retrack waveforms with TFMRA (fixed threshold policies only)
///
/// Returns (range, power, invalid) arrays.
#[pyfunction]
#[pyo3(signature = (range, power, radar_mode, options=None, optimized=true))]
fn retrack<'py>(
    py: Python<'py>,
    range: PyReadonlyArray2<f64>,
    power: PyReadonlyArray2<f64>,
    radar_mode: PyReadonlyArray1<u8>,
    options: Option<&str>,
    optimized: bool,
) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<f64>, &'py PyArray1<bool>)> {
    let waveform = to_waveform(range, power, radar_mode)?;
    let config = parse_config(options)?;

    let mut retracker: Box<dyn Retracker> = if optimized {
        Box::new(CTfmra::with_config(config).map_err(to_py_err)?)
    } else {
        Box::new(Tfmra::with_config(config).map_err(to_py_err)?)
    };
    retracker.retrack(&waveform).map_err(to_py_err)?;

    let output = retracker
        .output()
        .ok_or_else(|| PyRuntimeError::new_err("retracker produced no output"))?;

    Ok((
        output.range.to_pyarray(py),
        output.power.to_pyarray(py),
        output.invalid.to_pyarray(py),
    ))
}

/// Range distance between two threshold crossings of every waveform
#[pyfunction]
#[pyo3(signature = (range, power, radar_mode, t0, t1, options=None))]
fn thresholds_distance<'py>(
    py: Python<'py>,
    range: PyReadonlyArray2<f64>,
    power: PyReadonlyArray2<f64>,
    radar_mode: PyReadonlyArray1<u8>,
    t0: f64,
    t1: f64,
    options: Option<&str>,
) -> PyResult<&'py PyArray1<f64>> {
    let waveform = to_waveform(range, power, radar_mode)?;
    let config = parse_config(options)?;

    let preprocessed = preprocess_waveforms(&waveform, &config, KernelSet::Fast);
    Ok(preprocessed.thresholds_distance(t0, t1).to_pyarray(py))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(retrack, m)?)?;
    m.add_function(wrap_pyfunction!(thresholds_distance, m)?)?;
    Ok(())
}
