//! Нормализация данных

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};

use crate::error::{DataError, Result};
use crate::types::{Column, Table};

/// Min-max масштабирование каждого признака в диапазон [0, 1].
///
/// Константный столбец (min == max) отображается в нули.
/// `NaN` не участвует в min/max и остается `NaN` после преобразования.
pub struct MinMaxScaler {
    min: Option<Array1<f64>>,
    range: Option<Array1<f64>>,
    is_fitted: bool,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self {
            min: None,
            range: None,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, X: &Array2<f64>) -> Result<()> {
        if X.nrows() == 0 {
            return Err(DataError::Format("Empty dataset".to_string()));
        }

        let mut min = X.fold_axis(Axis(0), f64::INFINITY, |&acc, &v| {
            if v.is_nan() { acc } else { acc.min(v) }
        });
        let max = X.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &v| {
            if v.is_nan() { acc } else { acc.max(v) }
        });
        let mut range = &max - &min;

        for (lo, val) in min.iter_mut().zip(range.iter_mut()) {
            // Столбец целиком из пропусков
            if !lo.is_finite() {
                *lo = 0.0;
                *val = 1.0;
            // Избегаем деления на ноль
            } else if *val < 1e-12 {
                *val = 1.0;
            }
        }

        self.min = Some(min);
        self.range = Some(range);
        self.is_fitted = true;
        Ok(())
    }

    pub fn transform(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        let (min, range) = match (&self.min, &self.range) {
            (Some(min), Some(range)) if self.is_fitted => (min, range),
            _ => return Err(DataError::Precondition("Scaler not fitted".to_string())),
        };
        if X.ncols() != min.len() {
            return Err(DataError::Format(format!(
                "expected {} columns, got {}",
                min.len(),
                X.ncols()
            )));
        }

        let mut normalized = X.clone();
        for mut row in normalized.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                *val = (*val - min[i]) / range[i];
            }
        }

        Ok(normalized)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(X)?;
        self.transform(X)
    }
}

impl Default for MinMaxScaler {
    fn default() -> Self {
        Self::new()
    }
}

/// Нормализует все столбцы таблицы и возвращает идентификаторы первым столбцом.
///
/// Имена столбцов сохраняются, индекс строк после операции непрерывный.
/// Пропуски масштабируются как пропуски: min/max считаются по имеющимся значениям.
pub fn normalize_and_reshape(data: &Table, labels: Column) -> Result<Table> {
    if labels.len() != data.n_rows() {
        return Err(DataError::Format(format!(
            "label column '{}' has {} rows, data has {}",
            labels.name,
            labels.len(),
            data.n_rows()
        )));
    }

    let mut columns = Vec::with_capacity(data.n_cols() + 1);
    columns.push(labels);

    if data.n_cols() > 0 && data.n_rows() > 0 {
        let scaled = MinMaxScaler::new().fit_transform(&data.to_array_with_nan()?)?;
        for (name, values) in data.column_names().into_iter().zip(scaled.columns()) {
            let values = values.iter().map(|&v| (!v.is_nan()).then_some(v)).collect();
            columns.push(Column::numeric(name, values));
        }
    } else {
        columns.extend(data.columns().iter().cloned());
    }

    Table::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn maps_min_to_zero_and_max_to_one() {
        let X = array![[2.0, -5.0], [4.0, 5.0], [3.0, 0.0]];
        let scaled = MinMaxScaler::new().fit_transform(&X).unwrap();
        for column in scaled.columns() {
            let min = column.iter().copied().fold(f64::INFINITY, f64::min);
            let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(min.abs() < 1e-12);
            assert!((max - 1.0).abs() < 1e-12);
        }
        assert!((scaled[[2, 0]] - 0.5).abs() < 1e-12);
        assert!((scaled[[2, 1]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn constant_column_becomes_zeros() {
        let X = array![[7.0, 1.0], [7.0, 2.0], [7.0, 3.0]];
        let scaled = MinMaxScaler::new().fit_transform(&X).unwrap();
        assert!(scaled.column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn nan_is_ignored_when_fitting() {
        let X = array![[0.0, f64::NAN], [f64::NAN, f64::NAN], [4.0, f64::NAN], [2.0, f64::NAN]];
        let scaled = MinMaxScaler::new().fit_transform(&X).unwrap();
        assert_eq!(scaled[[0, 0]], 0.0);
        assert!(scaled[[1, 0]].is_nan());
        assert_eq!(scaled[[2, 0]], 1.0);
        assert_eq!(scaled[[3, 0]], 0.5);
        assert!(scaled.column(1).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn reshape_keeps_missing_cells_missing() {
        let data = Table::new(vec![Column::numeric(
            "temperature",
            vec![Some(10.0), None, Some(30.0)],
        )])
        .unwrap();
        let labels = Column::text("id", vec![Some("P1".into()), Some("P2".into()), Some("P3".into())]);

        let table = normalize_and_reshape(&data, labels).unwrap();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(
            table.numeric_column("temperature").unwrap(),
            &[Some(0.0), None, Some(1.0)]
        );
    }

    #[test]
    fn transform_before_fit_fails() {
        let X = array![[1.0]];
        assert!(MinMaxScaler::new().transform(&X).is_err());
    }

    #[test]
    fn reshape_puts_labels_first() {
        let data = Table::new(vec![
            Column::numeric("a", vec![Some(10.0), Some(20.0)]),
            Column::numeric("b", vec![Some(1.0), Some(1.0)]),
        ])
        .unwrap();
        let labels = Column::text("id", vec![Some("P1".into()), Some("P2".into())]);

        let table = normalize_and_reshape(&data, labels).unwrap();
        assert_eq!(table.column_names(), vec!["id", "a", "b"]);
        assert_eq!(table.numeric_column("a").unwrap(), &[Some(0.0), Some(1.0)]);
        assert_eq!(table.numeric_column("b").unwrap(), &[Some(0.0), Some(0.0)]);
    }

    #[test]
    fn reshape_rejects_misaligned_labels() {
        let data = Table::new(vec![Column::numeric("a", vec![Some(1.0), Some(2.0)])]).unwrap();
        let labels = Column::text("id", vec![Some("P1".into())]);
        assert!(normalize_and_reshape(&data, labels).is_err());
    }
}
