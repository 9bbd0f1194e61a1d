//! Чтение и запись файлов: база данных в CSV и бинарная маска признаков

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{DataError, Result};
use crate::types::{Column, ColumnData, Table};

fn ensure_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        return Err(DataError::Precondition(format!(
            "please pass a path specifying {what} location: {} is not a file",
            path.display()
        )));
    }
    Ok(())
}

/// Загружает CSV с заголовком в таблицу.
///
/// Столбец считается числовым, если каждая непустая ячейка разбирается как `f64`.
/// Пустая ячейка - пропуск.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    ensure_file(path, "database")?;

    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| DataError::Format(format!("File is not a valid csv: {e}")))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::Format(format!("File is not a valid csv: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(DataError::Format(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| DataError::Format(format!("File is not a valid csv: row {row_no}: {e}")))?;
        for (col_idx, value) in record.iter().enumerate() {
            cells[col_idx].push(value.to_string());
        }
    }

    if cells[0].is_empty() {
        return Err(DataError::Format(format!(
            "{} has no data rows",
            path.display()
        )));
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| Column {
            name,
            data: guess_column_type(values),
        })
        .collect();

    let table = Table::new(columns)?;
    tracing::info!(
        "Loaded {}: {} rows, {} columns",
        path.display(),
        table.n_rows(),
        table.n_cols()
    );
    Ok(table)
}

fn guess_column_type(values: Vec<String>) -> ColumnData {
    let numeric: Option<Vec<Option<f64>>> = values
        .iter()
        .map(|s| {
            let s = s.trim();
            if s.is_empty() {
                Some(None)
            } else {
                s.parse::<f64>().ok().map(Some)
            }
        })
        .collect();

    match numeric {
        Some(parsed) => ColumnData::Numeric(parsed),
        None => ColumnData::Text(
            values
                .into_iter()
                .map(|s| if s.trim().is_empty() { None } else { Some(s) })
                .collect(),
        ),
    }
}

/// Читает первую строку файла маски как список токенов
pub fn read_feature_mask(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    ensure_file(path, "mask")?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| DataError::Format(e.to_string()))?;

    match reader.records().next() {
        Some(record) => {
            let record = record.map_err(|e| DataError::Format(e.to_string()))?;
            Ok(record.iter().map(str::to_string).collect())
        }
        None => Err(DataError::Format(format!(
            "mask file {} is empty",
            path.display()
        ))),
    }
}

/// Записывает маску в формате `True, False, ...` (с хвостовым разделителем)
pub fn write_feature_mask(path: impl AsRef<Path>, support: &[bool]) -> Result<()> {
    let mut file = File::create(path.as_ref())?;
    for item in support {
        write!(file, "{}, ", if *item { "True" } else { "False" })?;
    }
    Ok(())
}
