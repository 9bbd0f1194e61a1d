//! Применение бинарной маски признаков (результат RFECV)

use std::path::Path;

use crate::error::{DataError, Result};
use crate::loader::read_feature_mask;
use crate::types::Table;

fn is_boolean_token(token: &str) -> bool {
    matches!(token.trim(), "True" | "False")
}

/// Удаляет с конца маски токены, не являющиеся `True`/`False` (`""`, `"\n"`, ...),
/// пока длина маски больше `n_cols`
pub fn remove_extra_entries(mask: &mut Vec<String>, n_cols: usize) {
    while mask.len() > n_cols {
        match mask.last() {
            Some(last) if !is_boolean_token(last) => {
                mask.pop();
            }
            _ => break,
        }
    }
}

/// Применяет маску к таблице: удаляются столбцы, помеченные `False`.
///
/// Маска сверяется с числом столбцов; при расхождении один раз убираются
/// хвостовые лишние токены, после чего длины обязаны совпасть.
pub fn apply_mask(column_mask: &mut Vec<String>, data: &Table) -> Result<Table> {
    if column_mask.len() != data.n_cols() {
        remove_extra_entries(column_mask, data.n_cols());
        if column_mask.len() != data.n_cols() {
            return Err(DataError::LengthMismatch {
                mask: column_mask.len(),
                columns: data.n_cols(),
            });
        }
    }

    let column_indexes: Vec<usize> = column_mask
        .iter()
        .enumerate()
        .filter(|(_, token)| token.trim() == "False")
        .map(|(i, _)| i)
        .collect();

    Ok(data.drop_columns_at(&column_indexes))
}

/// Читает маску из файла и применяет её к каждой таблице независимо.
///
/// Индексы удаляемых столбцов вычисляются заново для каждой таблицы.
pub fn apply_rfecv_mask(mask: impl AsRef<Path>, tables: &[&Table]) -> Result<Vec<Table>> {
    let mut column_mask = read_feature_mask(mask.as_ref())?;
    let updated = tables
        .iter()
        .map(|table| apply_mask(&mut column_mask, table))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(
        "Applied feature mask {}: {} tables",
        mask.as_ref().display(),
        updated.len()
    );
    Ok(updated)
}
