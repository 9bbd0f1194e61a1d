//! Отчет об оценке модели: метрики, важность признаков, статистика предсказаний

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use ndarray::Array1;

use crate::error::{DataError, ModelError};
use crate::models::evaluate;
use crate::types::{ErrorMetrics, PredictedValueStats};

pub const EVALUATION_FILE: &str = "model_evaluation_info.txt";
pub const STATISTICS_FILE: &str = "predicted_value_statistics.csv";

/// Предсказания для одного образца по всем запускам
#[derive(Debug)]
struct SamplePredictions {
    accession_number: String,
    true_value: f64,
    values: Vec<f64>,
}

/// Результаты нескольких запусков обучения/оценки.
///
/// Предсказания группируются по номеру строки: у одного белка
/// может быть несколько образцов с разными условиями.
#[derive(Debug, Default)]
pub struct RunSummary {
    metrics: Vec<ErrorMetrics>,
    importances: BTreeMap<String, Vec<f64>>,
    predictions: BTreeMap<usize, SamplePredictions>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Записывает один запуск и возвращает его метрики
    pub fn record_run(
        &mut self,
        rows: &[usize],
        identifiers: &[String],
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        feature_names: &[String],
        importances: Option<&Array1<f64>>,
    ) -> Result<ErrorMetrics, ModelError> {
        for len in [rows.len(), identifiers.len()] {
            if len != y_true.len() {
                return Err(ModelError::ShapeMismatch {
                    expected: y_true.len(),
                    actual: len,
                });
            }
        }
        let metrics = evaluate(y_true, y_pred)?;
        self.metrics.push(metrics);

        if let Some(importances) = importances {
            for (name, value) in feature_names.iter().zip(importances.iter()) {
                self.importances.entry(name.clone()).or_default().push(*value);
            }
        }

        for (((&row, id), &truth), &predicted) in rows
            .iter()
            .zip(identifiers)
            .zip(y_true.iter())
            .zip(y_pred.iter())
        {
            self.predictions
                .entry(row)
                .or_insert_with(|| SamplePredictions {
                    accession_number: id.clone(),
                    true_value: truth,
                    values: Vec::new(),
                })
                .values
                .push(predicted);
        }

        Ok(metrics)
    }

    pub fn n_runs(&self) -> usize {
        self.metrics.len()
    }

    pub fn average_metrics(&self) -> Option<ErrorMetrics> {
        ErrorMetrics::average(&self.metrics)
    }

    /// Средняя важность признаков по убыванию
    pub fn average_importances(&self) -> Vec<(String, f64)> {
        let mut averaged: Vec<(String, f64)> = self
            .importances
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().sum::<f64>() / values.len() as f64))
            .collect();
        averaged.sort_by(|a, b| b.1.total_cmp(&a.1));
        averaged
    }

    pub fn predicted_value_stats(&self) -> Vec<PredictedValueStats> {
        self.predictions
            .iter()
            .map(|(&sample, record)| {
                let values = &record.values;
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                PredictedValueStats {
                    sample,
                    accession_number: record.accession_number.clone(),
                    true_value: record.true_value,
                    mean_predicted: mean,
                    std_predicted: variance.sqrt(),
                    n_predictions: values.len(),
                }
            })
            .collect()
    }

    pub fn save(&self, output_dir: impl AsRef<Path>) -> Result<(), DataError> {
        let metrics = self.average_metrics().ok_or_else(|| {
            DataError::Precondition("no runs recorded, nothing to report".to_string())
        })?;
        save_metrics(
            output_dir,
            &metrics,
            &self.average_importances(),
            &self.predicted_value_stats(),
        )
    }
}

/// Записывает метрики и важности признаков в текстовый файл, статистику предсказаний - в CSV
pub fn save_metrics(
    output_dir: impl AsRef<Path>,
    error_metrics: &ErrorMetrics,
    feature_importances: &[(String, f64)],
    predicted_value_stats: &[PredictedValueStats],
) -> Result<(), DataError> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let mut importances = feature_importances.to_vec();
    importances.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut file = File::create(output_dir.join(EVALUATION_FILE))?;

    writeln!(file, "\n############ Average Error Metric Scores ############\n")?;
    for (name, value) in error_metrics.entries() {
        tracing::info!("{}: {}", name, value);
        writeln!(file, "{}: {}", name, value)?;
    }

    writeln!(file, "\n############ Average Feature Importance Scores ############\n")?;
    for (feature, value) in &importances {
        tracing::info!("Average Gini importance for {}: {}", feature, value);
        writeln!(file, "Average Gini importance for {}: {}", feature, value)?;
    }

    let mut writer = csv::Writer::from_path(output_dir.join(STATISTICS_FILE))?;
    for row in predicted_value_stats {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::info!("Saved model evaluation to {}", output_dir.display());
    Ok(())
}
