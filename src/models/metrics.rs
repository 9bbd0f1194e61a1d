//! Метрики качества регрессии

use ndarray::Array1;

use crate::error::ModelError;
use crate::types::ErrorMetrics;

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<(), ModelError> {
    if y_true.is_empty() {
        return Err(ModelError::EmptyDataset);
    }
    if y_true.len() != y_pred.len() {
        return Err(ModelError::ShapeMismatch {
            expected: y_true.len(),
            actual: y_pred.len(),
        });
    }
    Ok(())
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64, ModelError> {
    check_lengths(y_true, y_pred)?;
    Ok((y_true - y_pred).mapv(|e| e * e).sum() / y_true.len() as f64)
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64, ModelError> {
    check_lengths(y_true, y_pred)?;
    Ok((y_true - y_pred).mapv(f64::abs).sum() / y_true.len() as f64)
}

/// Коэффициент детерминации. Для константной цели: 1.0 при точном совпадении, иначе 0.0
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64, ModelError> {
    check_lengths(y_true, y_pred)?;
    let mean = y_true.sum() / y_true.len() as f64;
    let ss_res = (y_true - y_pred).mapv(|e| e * e).sum();
    let ss_tot = y_true.mapv(|v| (v - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

pub fn evaluate(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<ErrorMetrics, ModelError> {
    let mse = mean_squared_error(y_true, y_pred)?;
    Ok(ErrorMetrics {
        mean_absolute_error: mean_absolute_error(y_true, y_pred)?,
        mean_squared_error: mse,
        root_mean_squared_error: mse.sqrt(),
        r2: r2_score(y_true, y_pred)?,
    })
}

impl ErrorMetrics {
    /// Среднее по нескольким запускам
    pub fn average(runs: &[ErrorMetrics]) -> Option<ErrorMetrics> {
        if runs.is_empty() {
            return None;
        }
        let n = runs.len() as f64;
        Some(ErrorMetrics {
            mean_absolute_error: runs.iter().map(|m| m.mean_absolute_error).sum::<f64>() / n,
            mean_squared_error: runs.iter().map(|m| m.mean_squared_error).sum::<f64>() / n,
            root_mean_squared_error: runs.iter().map(|m| m.root_mean_squared_error).sum::<f64>() / n,
            r2: runs.iter().map(|m| m.r2).sum::<f64>() / n,
        })
    }

    /// Пары (название, значение) в порядке вывода отчета
    pub fn entries(&self) -> [(&'static str, f64); 4] {
        [
            ("Mean Absolute Error", self.mean_absolute_error),
            ("Mean Squared Error", self.mean_squared_error),
            ("Root Mean Squared Error", self.root_mean_squared_error),
            ("R2 Score", self.r2),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn known_values() {
        let y_true = array![1.0, 2.0, 3.0, 4.0];
        let y_pred = array![1.0, 2.0, 3.0, 6.0];
        let metrics = evaluate(&y_true, &y_pred).unwrap();

        assert_eq!(metrics.mean_absolute_error, 0.5);
        assert_eq!(metrics.mean_squared_error, 1.0);
        assert_eq!(metrics.root_mean_squared_error, 1.0);
        assert!((metrics.r2 - (1.0 - 4.0 / 5.0)).abs() < 1e-12);
    }

    #[test]
    fn constant_target_r2() {
        let y = array![2.0, 2.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn mismatched_lengths_fail() {
        assert!(matches!(
            mean_squared_error(&array![1.0], &array![1.0, 2.0]),
            Err(ModelError::ShapeMismatch { expected: 1, actual: 2 })
        ));
        assert!(matches!(
            mean_squared_error(&Array1::zeros(0), &Array1::zeros(0)),
            Err(ModelError::EmptyDataset)
        ));
    }

    #[test]
    fn average_of_runs() {
        let a = ErrorMetrics { mean_absolute_error: 1.0, mean_squared_error: 2.0, root_mean_squared_error: 3.0, r2: 0.5 };
        let b = ErrorMetrics { mean_absolute_error: 3.0, mean_squared_error: 4.0, root_mean_squared_error: 5.0, r2: 0.7 };
        let avg = ErrorMetrics::average(&[a, b]).unwrap();
        assert_eq!(avg.mean_absolute_error, 2.0);
        assert_eq!(avg.mean_squared_error, 3.0);
        assert!((avg.r2 - 0.6).abs() < 1e-12);
        assert!(ErrorMetrics::average(&[]).is_none());
    }
}
