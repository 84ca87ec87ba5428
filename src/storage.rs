//! Array files written during a session.
//!
//! Large answers (waveforms, sweeps, buffer dumps) do not belong in the text journal.
//! They are written next to it as NumPy `.npy` files (`storage_npy` feature, on by
//! default), readable by any analysis notebook, or as plain CSV (`storage_csv`).
//!
//! File names follow a numbering scheme so repeated captures never overwrite each
//! other: saving `curve` produces `curve0.npy`, then `curve1.npy`, and so on.

use crate::error::{AppResult, ScpiError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Writer used for saved arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayFormat {
    /// NumPy `.npy`, little-endian doubles
    #[default]
    Npy,
    /// Comma separated text, one row per line
    Csv,
}

impl ArrayFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ArrayFormat::Npy => "npy",
            ArrayFormat::Csv => "csv",
        }
    }
}

/// Rectangular array of doubles, stored row-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array2 {
    rows: Vec<Vec<f64>>,
}

impl Array2 {
    /// Array with a single row.
    pub fn from_row(row: Vec<f64>) -> Self {
        Self { rows: vec![row] }
    }

    /// Array from rows of equal length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> AppResult<Self> {
        if let Some(first) = rows.first() {
            let width = first.len();
            if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
                return Err(ScpiError::ArrayFile(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Rows of the array.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Consume into rows.
    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.rows.first().map_or(0, Vec::len))
    }

    /// True when the array holds no values.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }
}

struct NameParts {
    dir: PathBuf,
    stem: String,
    extension: String,
}

fn split_name(path: &Path) -> NameParts {
    NameParts {
        dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        stem: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        extension: path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn numbered(dir: &Path, stem: &str, n: usize, extension: &str) -> PathBuf {
    let name = if extension.is_empty() {
        format!("{}{}", stem, n)
    } else {
        format!("{}{}.{}", stem, n, extension)
    };
    dir.join(name)
}

fn merge_with_default(template: &Path, default: &Path) -> NameParts {
    let mut parts = split_name(template);
    let fallback = split_name(default);
    if parts.dir.as_os_str().is_empty() {
        parts.dir = fallback.dir;
    }
    if parts.stem.is_empty() {
        parts.stem = fallback.stem;
    }
    if parts.extension.is_empty() {
        parts.extension = fallback.extension;
    }
    parts
}

/// First free numbered path for `template`.
///
/// Missing directory, stem or extension are taken from `default`. The directory is
/// created. The result is `dir/stem0.ext`, or `dir/stemN.ext` for the first `N`
/// not taken yet.
pub fn unique_path(template: &Path, default: &Path) -> AppResult<PathBuf> {
    let parts = merge_with_default(template, default);
    if !parts.dir.as_os_str().is_empty() {
        fs::create_dir_all(&parts.dir)?;
    }
    let mut n = 0;
    loop {
        let candidate = numbered(&parts.dir, &parts.stem, n, &parts.extension);
        if !candidate.is_file() {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Most recent numbered file for `template`, `None` if nothing was saved yet.
pub fn last_path(template: &Path, default: &Path) -> Option<PathBuf> {
    let parts = merge_with_default(template, default);
    let mut last = None;
    let mut n = 0;
    loop {
        let candidate = numbered(&parts.dir, &parts.stem, n, &parts.extension);
        if !candidate.is_file() {
            return last;
        }
        last = Some(candidate);
        n += 1;
    }
}

/// Locate an existing file given a possibly abbreviated name.
///
/// Tries `name`, `name.ext`, `dir/name` and `dir/name.ext` in that order.
pub fn resolve_existing(name: &Path, default_dir: &Path, default_ext: &str) -> Option<PathBuf> {
    let with_ext = |p: &Path| {
        let mut s = p.as_os_str().to_owned();
        s.push(".");
        s.push(default_ext);
        PathBuf::from(s)
    };
    [
        name.to_path_buf(),
        with_ext(name),
        default_dir.join(name),
        with_ext(&default_dir.join(name)),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

/// Write `array` in the given format.
pub fn write_array(path: &Path, array: &Array2, format: ArrayFormat) -> AppResult<()> {
    match format {
        ArrayFormat::Npy => write_npy(path, array),
        ArrayFormat::Csv => write_csv(path, array),
    }
}

/// Read an array, picking the reader from the file extension.
pub fn read_array(path: &Path) -> AppResult<Array2> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => read_csv(path),
        _ => read_npy(path),
    }
}

fn array_file_error(path: &Path, e: impl std::fmt::Display) -> ScpiError {
    ScpiError::ArrayFile(format!("{}: {}", path.display(), e))
}

/// Write a NumPy `.npy` of little-endian doubles.
///
/// A single-row array is written as a 1-D array of shape `(n,)`.
#[cfg(feature = "storage_npy")]
pub fn write_npy(path: &Path, array: &Array2) -> AppResult<()> {
    let (rows, cols) = array.shape();
    let written = if rows == 1 {
        ndarray_npy::write_npy(path, &ndarray::Array1::from_vec(array.rows[0].clone()))
    } else {
        let flat: Vec<f64> = array.rows().iter().flatten().copied().collect();
        let data = ndarray::Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| array_file_error(path, e))?;
        ndarray_npy::write_npy(path, &data)
    };
    written.map_err(|e| array_file_error(path, e))
}

/// Write a NumPy `.npy` of little-endian doubles.
#[cfg(not(feature = "storage_npy"))]
pub fn write_npy(_path: &Path, _array: &Array2) -> AppResult<()> {
    Err(ScpiError::FeatureNotEnabled("storage_npy".to_string()))
}

/// Read a 0-, 1- or 2-D `.npy` file of doubles.
#[cfg(feature = "storage_npy")]
pub fn read_npy(path: &Path) -> AppResult<Array2> {
    let data: ndarray::ArrayD<f64> =
        ndarray_npy::read_npy(path).map_err(|e| array_file_error(path, e))?;
    match data.ndim() {
        0 | 1 => Ok(Array2::from_row(data.iter().copied().collect())),
        2 => Array2::from_rows(
            data.outer_iter()
                .map(|row| row.iter().copied().collect())
                .collect(),
        ),
        n => Err(array_file_error(
            path,
            format!("{}-D arrays are not supported", n),
        )),
    }
}

/// Read a 0-, 1- or 2-D `.npy` file of doubles.
#[cfg(not(feature = "storage_npy"))]
pub fn read_npy(_path: &Path) -> AppResult<Array2> {
    Err(ScpiError::FeatureNotEnabled("storage_npy".to_string()))
}

/// Write comma separated values, one row per line.
#[cfg(feature = "storage_csv")]
pub fn write_csv(path: &Path, array: &Array2) -> AppResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| array_file_error(path, e))?;
    for row in array.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| array_file_error(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write comma separated values, one row per line.
#[cfg(not(feature = "storage_csv"))]
pub fn write_csv(_path: &Path, _array: &Array2) -> AppResult<()> {
    Err(ScpiError::FeatureNotEnabled("storage_csv".to_string()))
}

/// Read a file written by [`write_csv`].
#[cfg(feature = "storage_csv")]
pub fn read_csv(path: &Path) -> AppResult<Array2> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| array_file_error(path, e))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| array_file_error(path, e))?;
        let row = record
            .iter()
            .map(|field| {
                field.trim().parse::<f64>().map_err(|_| {
                    ScpiError::ArrayFile(format!("{}: invalid value '{}'", path.display(), field))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        rows.push(row);
    }
    Array2::from_rows(rows)
}

/// Read a file written by [`write_csv`].
#[cfg(not(feature = "storage_csv"))]
pub fn read_csv(_path: &Path) -> AppResult<Array2> {
    Err(ScpiError::FeatureNotEnabled("storage_csv".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn numbering_starts_at_zero_and_skips_taken_names() {
        let dir = tempdir().unwrap();
        let default = dir.path().join("data/temp.npy");

        let first = unique_path(Path::new("curve"), &default).unwrap();
        assert_eq!(first, dir.path().join("data/curve0.npy"));
        assert!(dir.path().join("data").is_dir());
        assert_eq!(last_path(Path::new("curve"), &default), None);

        fs::write(&first, b"").unwrap();
        fs::write(dir.path().join("data/curve1.npy"), b"").unwrap();
        let next = unique_path(Path::new("curve"), &default).unwrap();
        assert_eq!(next, dir.path().join("data/curve2.npy"));
        assert_eq!(
            last_path(Path::new("curve"), &default),
            Some(dir.path().join("data/curve1.npy"))
        );
    }

    #[test]
    fn empty_template_uses_default_name() {
        let dir = tempdir().unwrap();
        let default = dir.path().join("temp.npy");
        let path = unique_path(Path::new(""), &default).unwrap();
        assert_eq!(path, dir.path().join("temp0.npy"));

        let explicit = unique_path(&dir.path().join("sweep.csv"), &default).unwrap();
        assert_eq!(explicit, dir.path().join("sweep0.csv"));
    }

    #[test]
    fn resolve_abbreviated_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("trace3.npy"), b"").unwrap();
        assert_eq!(
            resolve_existing(Path::new("trace3"), dir.path(), "npy"),
            Some(dir.path().join("trace3.npy"))
        );
        assert_eq!(resolve_existing(Path::new("trace4"), dir.path(), "npy"), None);
    }

    #[test]
    fn ragged_rows_rejected() {
        assert!(Array2::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
        assert_eq!(Array2::from_rows(vec![]).unwrap().shape(), (0, 0));
    }

    #[cfg(feature = "storage_npy")]
    #[test]
    fn npy_two_dimensional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.npy");
        let array = Array2::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        write_npy(&path, &array).unwrap();

        assert!(fs::read(&path).unwrap().starts_with(b"\x93NUMPY"));
        let raw: ndarray::Array2<f64> = ndarray_npy::read_npy(&path).unwrap();
        assert_eq!(raw, ndarray::arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]));
        assert_eq!(read_npy(&path).unwrap(), array);
    }

    #[cfg(feature = "storage_npy")]
    #[test]
    fn single_row_is_one_dimensional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.npy");
        write_npy(&path, &Array2::from_row(vec![0.5, -1.25])).unwrap();
        let raw: ndarray::Array1<f64> = ndarray_npy::read_npy(&path).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(read_npy(&path).unwrap().rows(), &[vec![0.5, -1.25]]);
    }

    #[cfg(feature = "storage_npy")]
    #[test]
    fn npy_rejects_other_dtypes_and_garbage() {
        let dir = tempdir().unwrap();
        let ints = dir.path().join("i.npy");
        ndarray_npy::write_npy(&ints, &ndarray::arr1(&[7i32])).unwrap();
        assert!(matches!(read_npy(&ints), Err(ScpiError::ArrayFile(_))));

        let text = dir.path().join("t.npy");
        fs::write(&text, b"not an array").unwrap();
        assert!(matches!(read_npy(&text), Err(ScpiError::ArrayFile(_))));
    }

    #[cfg(not(feature = "storage_npy"))]
    #[test]
    fn npy_without_feature() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.npy");
        assert!(matches!(
            write_npy(&path, &Array2::from_row(vec![1.0])),
            Err(ScpiError::FeatureNotEnabled(f)) if f == "storage_npy"
        ));
    }

    #[cfg(feature = "storage_csv")]
    #[test]
    fn csv_rows_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.csv");
        let array = Array2::from_rows(vec![vec![1.0, 2.5], vec![3.0, -4.0]]).unwrap();
        write_csv(&path, &array).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1,2.5\n3,-4\n");
        assert_eq!(read_array(&path).unwrap(), array);
    }
}
