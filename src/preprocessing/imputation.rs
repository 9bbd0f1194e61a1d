//! Заполнение пропусков

use crate::error::Result;
use crate::types::Table;

/// Среднее по непропущенным значениям; `None`, если значений нет
pub fn present_mean(values: &[Option<f64>]) -> Option<f64> {
    let mut count = 0usize;
    let mut total = 0.0;
    for value in values.iter().flatten() {
        if !value.is_nan() {
            count += 1;
            total += value;
        }
    }
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

/// Заполняет пропуски в числовом столбце средним значением столбца.
///
/// Если в столбце нет ни одного значения, пропуски заполняются нулями.
pub fn fill_nan(data: &mut Table, column: &str) -> Result<()> {
    let values = data.numeric_column_mut(column)?;
    let mean = match present_mean(values) {
        Some(mean) => mean,
        None => {
            tracing::warn!("Column '{}' has no values, filling with 0.0", column);
            0.0
        }
    };

    let mut filled = 0;
    for value in values.iter_mut() {
        if value.map_or(true, f64::is_nan) {
            *value = Some(mean);
            filled += 1;
        }
    }
    tracing::debug!("Filled {} missing values in '{}' with {:.4}", filled, column, mean);
    Ok(())
}
