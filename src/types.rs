/// Типы данных для ML модуля

use std::collections::HashSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// Значения одного столбца. `None` - пропущенная ячейка
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn missing_count(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnData::Text(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Текстовое представление ячеек (для категорий и идентификаторов)
    pub fn category_labels(&self) -> Vec<Option<String>> {
        match self {
            ColumnData::Numeric(values) => values.iter().map(|v| v.map(|x| x.to_string())).collect(),
            ColumnData::Text(values) => values.clone(),
        }
    }

    fn take(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(values) => {
                ColumnData::Numeric(indices.iter().map(|&i| values[i]).collect())
            }
            ColumnData::Text(values) => {
                ColumnData::Text(indices.iter().map(|&i| values[i].clone()).collect())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Таблица с именованными столбцами одинаковой длины.
///
/// Количество строк хранится отдельно, поэтому таблица без столбцов
/// (например, после удаления всех признаков) не теряет число строк.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut table = Self {
            n_rows: columns.first().map(Column::len).unwrap_or(0),
            columns: Vec::with_capacity(columns.len()),
        };
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn push_column(&mut self, column: Column) -> Result<()> {
        let index = self.columns.len();
        self.insert_column(index, column)
    }

    pub fn insert_column(&mut self, index: usize, column: Column) -> Result<()> {
        if self.columns.is_empty() && self.n_rows == 0 {
            self.n_rows = column.len();
        }
        if column.len() != self.n_rows {
            return Err(DataError::Format(format!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.len(),
                self.n_rows
            )));
        }
        if self.column_index(&column.name).is_some() {
            return Err(DataError::Format(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        self.columns.insert(index.min(self.columns.len()), column);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Result<Column> {
        let index = self
            .column_index(name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))?;
        Ok(self.columns.remove(index))
    }

    /// Копия таблицы без столбцов с указанными позициями
    pub fn drop_columns_at(&self, indices: &[usize]) -> Table {
        let dropped: HashSet<usize> = indices.iter().copied().collect();
        Table {
            columns: self
                .columns
                .iter()
                .enumerate()
                .filter(|(i, _)| !dropped.contains(i))
                .map(|(_, c)| c.clone())
                .collect(),
            n_rows: self.n_rows,
        }
    }

    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(indices),
                })
                .collect(),
            n_rows: indices.len(),
        }
    }

    pub fn select_columns(&self, names: &[String]) -> Result<Table> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name)
                    .cloned()
                    .ok_or_else(|| DataError::MissingColumn(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Table {
            columns,
            n_rows: self.n_rows,
        })
    }

    pub fn numeric_column(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Numeric(values)) => Ok(values),
            Some(ColumnData::Text(_)) => Err(DataError::Format(format!(
                "column '{name}' is not numeric"
            ))),
            None => Err(DataError::MissingColumn(name.to_string())),
        }
    }

    pub fn numeric_column_mut(&mut self, name: &str) -> Result<&mut Vec<Option<f64>>> {
        match self.columns.iter_mut().find(|c| c.name == name).map(|c| &mut c.data) {
            Some(ColumnData::Numeric(values)) => Ok(values),
            Some(ColumnData::Text(_)) => Err(DataError::Format(format!(
                "column '{name}' is not numeric"
            ))),
            None => Err(DataError::MissingColumn(name.to_string())),
        }
    }

    /// Значения столбца в виде строк; пропуски превращаются в пустую строку
    pub fn labels(&self, name: &str) -> Result<Vec<String>> {
        let column = self
            .column(name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))?;
        Ok(column
            .data
            .category_labels()
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect())
    }

    /// Матрица признаков для моделей. Все столбцы должны быть числовыми и без пропусков
    pub fn to_array(&self) -> Result<Array2<f64>> {
        self.numeric_array(None)
    }

    /// Как `to_array`, но пропуски становятся `NaN`
    pub fn to_array_with_nan(&self) -> Result<Array2<f64>> {
        self.numeric_array(Some(f64::NAN))
    }

    fn numeric_array(&self, missing: Option<f64>) -> Result<Array2<f64>> {
        let mut array = Array2::zeros((self.n_rows, self.columns.len()));
        for (j, column) in self.columns.iter().enumerate() {
            let values = match &column.data {
                ColumnData::Numeric(values) => values,
                ColumnData::Text(_) => {
                    return Err(DataError::Format(format!(
                        "column '{}' is not numeric",
                        column.name
                    )))
                }
            };
            for (i, value) in values.iter().enumerate() {
                array[[i, j]] = value.or(missing).ok_or_else(|| {
                    DataError::Format(format!(
                        "column '{}' has a missing value at row {i}",
                        column.name
                    ))
                })?;
            }
        }
        Ok(array)
    }
}

/// Усредненные метрики ошибки модели
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub mean_absolute_error: f64,
    pub mean_squared_error: f64,
    pub root_mean_squared_error: f64,
    pub r2: f64,
}

/// Статистика предсказаний по одному образцу за несколько запусков
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedValueStats {
    /// Номер строки образца в очищенной базе (или во внешних данных)
    #[serde(rename = "Sample")]
    pub sample: usize,
    #[serde(rename = "Accession Number")]
    pub accession_number: String,
    #[serde(rename = "True Value")]
    pub true_value: f64,
    #[serde(rename = "Mean Predicted Value")]
    pub mean_predicted: f64,
    #[serde(rename = "Std Predicted Value")]
    pub std_predicted: f64,
    #[serde(rename = "Predictions")]
    pub n_predictions: usize,
}
