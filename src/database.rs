//! База данных эксперимента: загрузка, очистка и разбиение на train/test
//!
//! Типичный сценарий: `load_raw_data(<path.csv>)`, затем `clean()` и `split()`.
//! Для предсказания на собственных данных вместо `split()` вызывается
//! `load_prediction_input(<path.csv>)`: тестовой выборкой становятся эти данные.

use std::path::Path;

use ndarray::{Array1, Axis};
use rand::Rng;

use crate::config::DatasetSchema;
use crate::error::{DataError, Result};
use crate::loader::read_csv;
use crate::preprocessing::{fill_nan, normalize_and_reshape, one_hot_encode, KFold};
use crate::types::{Column, ColumnData, Table};

/// Число фолдов при случайном разбиении
pub const SPLIT_FOLDS: usize = 5;

/// Значение, которое вычисляется одним из шагов конвейера.
///
/// Чтение до этого шага возвращает `DataError::Uninitialized` с именем нужного вызова.
#[derive(Debug, Clone)]
pub struct Stage<T> {
    value: Option<T>,
    field: &'static str,
    hint: &'static str,
}

impl<T> Stage<T> {
    pub const fn new(field: &'static str, hint: &'static str) -> Self {
        Self {
            value: None,
            field,
            hint,
        }
    }

    pub fn get(&self) -> Result<&T> {
        self.value.as_ref().ok_or(DataError::Uninitialized {
            field: self.field,
            hint: self.hint,
        })
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// Результат очистки одного набора записей
struct CleanedRecords {
    original: Table,
    features: Table,
    target: Array1<f64>,
}

pub struct Database {
    schema: DatasetSchema,
    raw_data: Stage<Table>,
    clean_features: Stage<Table>,
    original: Stage<Table>,
    target: Stage<Array1<f64>>,
    train_features: Stage<Table>,
    test_features: Stage<Table>,
    train_target: Stage<Array1<f64>>,
    test_target: Stage<Array1<f64>>,
    test_identifiers: Stage<Vec<String>>,
    test_rows: Stage<Vec<usize>>,
    prediction_input: Stage<Table>,
}

impl Database {
    pub fn new() -> Self {
        Self::with_schema(DatasetSchema::default())
    }

    pub fn with_schema(schema: DatasetSchema) -> Self {
        Self {
            schema,
            raw_data: Stage::new("raw_data", "load_raw_data() or set_raw_data()"),
            clean_features: Stage::new("clean_features", "clean()"),
            original: Stage::new("original", "clean()"),
            target: Stage::new("target", "clean()"),
            train_features: Stage::new("train_features", "clean() and split()"),
            test_features: Stage::new("test_features", "split() or set_prediction_input()"),
            train_target: Stage::new("train_target", "clean() and split()"),
            test_target: Stage::new("test_target", "split() or set_prediction_input()"),
            test_identifiers: Stage::new(
                "test_identifiers",
                "split() or set_prediction_input()",
            ),
            test_rows: Stage::new("test_rows", "split() or set_prediction_input()"),
            prediction_input: Stage::new("prediction_input", "set_prediction_input()"),
        }
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    // ----- исходные данные -----

    pub fn load_raw_data(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.raw_data.set(read_csv(path)?);
        Ok(())
    }

    pub fn set_raw_data(&mut self, data: Table) {
        self.raw_data.set(data);
    }

    pub fn raw_data(&self) -> Result<&Table> {
        self.raw_data.get()
    }

    // ----- очистка -----

    /// Кодирует категории, заполняет пропуски, удаляет лишние столбцы и нормализует признаки.
    ///
    /// Результат становится обучающей выборкой до вызова `split()`.
    pub fn clean(&mut self) -> Result<()> {
        let raw = self.raw_data.get()?.clone();
        let n_rows = raw.n_rows();
        let cleaned = self.clean_records(raw)?;

        tracing::info!(
            "Cleaned {} rows into {} feature columns",
            n_rows,
            cleaned.features.n_cols().saturating_sub(1)
        );

        self.original.set(cleaned.original);
        self.train_target.set(cleaned.target.clone());
        self.target.set(cleaned.target);
        self.train_features.set(cleaned.features.clone());
        self.clean_features.set(cleaned.features);
        Ok(())
    }

    /// Очищает внешние данные тем же конвейером и делает их тестовой выборкой
    pub fn clean_external(&mut self, data: Table) -> Result<()> {
        let identifier = self.schema.identifier.clone();
        let mut train = self.train_features.get()?.clone();

        let cleaned = self.clean_records(data)?;
        let mut test = cleaned.features;
        let identifiers = test.labels(&identifier)?;
        test.remove_column(&identifier)?;
        if train.column_index(&identifier).is_some() {
            train.remove_column(&identifier)?;
        }
        let test = align_columns(&test, &train.column_names())?;

        tracing::info!("Prepared {} external rows for prediction", test.n_rows());

        self.test_target.set(cleaned.target);
        self.test_rows.set((0..test.n_rows()).collect());
        self.test_identifiers.set(identifiers);
        self.test_features.set(test);
        self.train_features.set(train);
        Ok(())
    }

    fn clean_records(&self, mut data: Table) -> Result<CleanedRecords> {
        let schema = &self.schema;

        for category in &schema.categorical {
            one_hot_encode(&mut data, category)?;
        }

        // Цель и идентификаторы забираем до удаления столбцов
        fill_nan(&mut data, &schema.target)?;
        let target: Array1<f64> = data
            .numeric_column(&schema.target)?
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        let identifiers = data
            .column(&schema.identifier)
            .cloned()
            .ok_or_else(|| DataError::MissingColumn(schema.identifier.clone()))?;

        for column in &schema.columns_to_drop {
            data.remove_column(column)?;
        }

        fill_nan(&mut data, &schema.abundance)?;

        let mut features = normalize_and_reshape(&data, identifiers)?;

        // Пропуски в прочих признаках переживают нормализацию; модели нужна полная матрица
        let gaps: Vec<String> = features
            .columns()
            .iter()
            .filter(|c| c.name != schema.identifier)
            .filter(|c| matches!(c.data, ColumnData::Numeric(_)) && c.data.missing_count() > 0)
            .map(|c| c.name.clone())
            .collect();
        for name in &gaps {
            tracing::warn!("Feature '{}' has missing values, filling with the column mean", name);
            fill_nan(&mut features, name)?;
        }

        Ok(CleanedRecords {
            original: data,
            features,
            target,
        })
    }

    // ----- разбиение -----

    /// Случайное разбиение 5-fold со случайным seed
    pub fn split(&mut self) -> Result<()> {
        let seed = rand::thread_rng().gen::<u64>();
        self.split_with_seed(seed)
    }

    /// Разбиение 5-fold с перемешиванием.
    ///
    /// Используется последний фолд генератора: это одно случайное разбиение
    /// примерно 80/20, а не усреднение по всем фолдам.
    pub fn split_with_seed(&mut self, seed: u64) -> Result<()> {
        if self.prediction_input.is_set() {
            return Err(DataError::ModeConflict(
                "remove split() if using your own data".to_string(),
            ));
        }

        let features = self.clean_features.get()?;
        let target = self.target.get()?;
        let identifier = &self.schema.identifier;

        let fold = KFold::shuffled(SPLIT_FOLDS, seed)
            .split(features.n_rows())?
            .pop()
            .ok_or_else(|| DataError::Precondition("no folds generated".to_string()))?;

        let mut train = features.take_rows(&fold.train);
        let mut test = features.take_rows(&fold.test);
        let train_target = target.select(Axis(0), &fold.train);
        let test_target = target.select(Axis(0), &fold.test);

        let identifiers = test.labels(identifier)?;
        train.remove_column(identifier)?;
        test.remove_column(identifier)?;

        tracing::debug!(
            "Split {} rows: {} train, {} test (seed {})",
            features.n_rows(),
            train.n_rows(),
            test.n_rows(),
            seed
        );

        self.train_features.set(train);
        self.test_features.set(test);
        self.train_target.set(train_target);
        self.test_target.set(test_target);
        self.test_identifiers.set(identifiers);
        self.test_rows.set(fold.test);
        Ok(())
    }

    // ----- режим предсказания -----

    pub fn load_prediction_input(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let data = read_csv(path)?;
        self.set_prediction_input(data)
    }

    /// Переключает базу в режим предсказания: данные очищаются и заменяют тестовую выборку
    pub fn set_prediction_input(&mut self, data: Table) -> Result<()> {
        self.clean_external(data.clone())?;
        self.prediction_input.set(data);
        Ok(())
    }

    pub fn prediction_input(&self) -> Result<&Table> {
        self.prediction_input.get()
    }

    pub fn is_predict_mode(&self) -> bool {
        self.prediction_input.is_set()
    }

    // ----- производные данные -----

    pub fn clean_features(&self) -> Result<&Table> {
        self.clean_features.get()
    }

    /// Очищенные данные до нормализации (для визуализации)
    pub fn original(&self) -> Result<&Table> {
        self.original.get()
    }

    pub fn target(&self) -> Result<&Array1<f64>> {
        self.target.get()
    }

    pub fn train_features(&self) -> Result<&Table> {
        self.train_features.get()
    }

    pub fn test_features(&self) -> Result<&Table> {
        self.test_features.get()
    }

    pub fn train_target(&self) -> Result<&Array1<f64>> {
        self.train_target.get()
    }

    pub fn test_target(&self) -> Result<&Array1<f64>> {
        self.test_target.get()
    }

    pub fn test_identifiers(&self) -> Result<&[String]> {
        self.test_identifiers.get().map(Vec::as_slice)
    }

    /// Номера тестовых строк: в очищенной базе после `split()`,
    /// во внешних данных в режиме предсказания
    pub fn test_rows(&self) -> Result<&[usize]> {
        self.test_rows.get().map(Vec::as_slice)
    }

    pub fn load_train_features(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.train_features.set(read_csv(path)?);
        Ok(())
    }

    pub fn set_train_features(&mut self, data: Table) {
        self.train_features.set(data);
    }

    pub fn load_test_features(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.test_features.set(read_csv(path)?);
        Ok(())
    }

    pub fn set_test_features(&mut self, data: Table) {
        self.test_features.set(data);
    }

    pub fn set_train_target(&mut self, target: Array1<f64>) {
        self.train_target.set(target);
    }

    pub fn set_test_target(&mut self, target: Array1<f64>) {
        self.test_target.set(target);
    }

    pub fn set_test_identifiers(&mut self, identifiers: Vec<String>) {
        self.test_identifiers.set(identifiers);
    }

    pub fn set_test_rows(&mut self, rows: Vec<usize>) {
        self.test_rows.set(rows);
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

/// Приводит столбцы внешних данных к порядку обучающих признаков.
///
/// Отсутствующие индикаторы заполняются нулями, незнакомые столбцы отбрасываются.
fn align_columns(test: &Table, train_columns: &[String]) -> Result<Table> {
    let unseen: Vec<String> = test
        .column_names()
        .into_iter()
        .filter(|name| !train_columns.contains(name))
        .collect();
    if !unseen.is_empty() {
        tracing::warn!("Dropping columns unseen in training data: {:?}", unseen);
    }

    let columns = train_columns
        .iter()
        .map(|name| match test.column(name) {
            Some(column) => column.clone(),
            None => Column::numeric(name.clone(), vec![Some(0.0); test.n_rows()]),
        })
        .collect();
    Table::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn schema() -> DatasetSchema {
        DatasetSchema {
            categorical: vec!["Particle Charge".to_string()],
            ..DatasetSchema::default()
        }
    }

    fn records(n: usize) -> Table {
        let charges = ["negative", "neutral", "positive"];
        Table::new(vec![
            Column::text("Accession Number", (0..n).map(|i| Some(format!("P{i:03}"))).collect()),
            Column::text("Sequence", (0..n).map(|_| Some("MKV".to_string())).collect()),
            Column::numeric("Protein Length", (0..n).map(|i| Some(100.0 + i as f64)).collect()),
            Column::numeric(
                "Protein Abundance",
                (0..n).map(|i| if i == 1 { None } else { Some(i as f64) }).collect(),
            ),
            Column::text(
                "Particle Charge",
                (0..n).map(|i| Some(charges[i % 3].to_string())).collect(),
            ),
            Column::numeric(
                "Bound Fraction",
                (0..n).map(|i| if i == 0 { None } else { Some(i as f64 / 10.0) }).collect(),
            ),
            Column::numeric("Temperature", (0..n).map(|i| Some(20.0 + (i % 4) as f64)).collect()),
        ])
        .unwrap()
    }

    fn cleaned(n: usize) -> Database {
        let mut db = Database::with_schema(schema());
        db.set_raw_data(records(n));
        db.clean().unwrap();
        db
    }

    #[test]
    fn accessors_fail_before_their_step() {
        let db = Database::new();
        for err in [
            db.raw_data().unwrap_err(),
            db.train_features().unwrap_err(),
            db.test_features().unwrap_err(),
            db.target().map(|_| ()).unwrap_err(),
            db.test_identifiers().map(|_| ()).unwrap_err(),
            db.prediction_input().unwrap_err(),
        ] {
            assert!(matches!(err, DataError::Uninitialized { .. }), "{err}");
        }

        let mut db = Database::new();
        assert!(matches!(db.clean(), Err(DataError::Uninitialized { field: "raw_data", .. })));
    }

    #[test]
    fn clean_encodes_drops_and_normalizes() {
        let db = cleaned(10);
        let features = db.clean_features().unwrap();

        assert_eq!(features.n_rows(), 10);
        assert_eq!(
            features.column_names(),
            vec![
                "Accession Number",
                "Protein Abundance",
                "Temperature",
                "Particle Charge_negative",
                "Particle Charge_neutral",
                "Particle Charge_positive",
            ]
        );
        for name in &features.column_names()[1..] {
            let values: Vec<f64> = features.numeric_column(name).unwrap().iter().flatten().copied().collect();
            assert_eq!(values.len(), 10);
            assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        }
        assert_eq!(db.train_features().unwrap(), features);
    }

    #[test]
    fn target_is_captured_with_imputed_mean() {
        let db = cleaned(10);
        let target = db.target().unwrap();
        assert_eq!(target.len(), 10);

        let expected = (1..10).map(|i| i as f64 / 10.0).sum::<f64>() / 9.0;
        assert!((target[0] - expected).abs() < 1e-12);
        assert_eq!(target[5], 0.5);
        assert_eq!(db.train_target().unwrap(), target);
    }

    #[test]
    fn clean_tolerates_gaps_in_extra_features() {
        let mut raw = records(6);
        raw.numeric_column_mut("Temperature").unwrap()[1] = None;

        let mut db = Database::with_schema(schema());
        db.set_raw_data(raw);
        db.clean().unwrap();

        let features = db.clean_features().unwrap();
        assert_eq!(features.n_rows(), 6);
        // 20, _, 22, 23, 20, 21 -> среднее масштабированных значений
        let temperature = features.numeric_column("Temperature").unwrap();
        let expected = [0.0, 2.0 / 3.0, 1.0, 0.0, 1.0 / 3.0].iter().sum::<f64>() / 5.0;
        assert!((temperature[1].unwrap() - expected).abs() < 1e-12);
        assert!(features.to_array().is_ok());

        assert_eq!(db.original().unwrap().numeric_column("Temperature").unwrap()[1], None);
    }

    #[test]
    fn original_snapshot_is_not_normalized() {
        let db = cleaned(10);
        let original = db.original().unwrap();

        assert!(original.column("Accession Number").is_none());
        let abundance = original.numeric_column("Protein Abundance").unwrap();
        let expected = (0..10).filter(|&i| i != 1).sum::<usize>() as f64 / 9.0;
        assert_eq!(abundance[9], Some(9.0));
        assert!((abundance[1].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_schema_column_fails_clean() {
        let mut raw = records(5);
        raw.remove_column("Sequence").unwrap();
        let mut db = Database::with_schema(schema());
        db.set_raw_data(raw);
        assert!(matches!(db.clean(), Err(DataError::MissingColumn(_))));
    }

    #[test]
    fn split_partitions_rows_without_overlap() {
        let mut db = cleaned(23);
        db.split_with_seed(11).unwrap();

        let train = db.train_features().unwrap();
        let test = db.test_features().unwrap();
        assert_eq!(train.n_rows() + test.n_rows(), 23);
        assert_eq!(db.train_target().unwrap().len(), train.n_rows());
        assert_eq!(db.test_target().unwrap().len(), test.n_rows());
        assert!(train.column("Accession Number").is_none());
        assert!(test.column("Accession Number").is_none());

        let ids: HashSet<&String> = db.test_identifiers().unwrap().iter().collect();
        assert_eq!(ids.len(), test.n_rows());
    }

    #[test]
    fn split_uses_last_fold_of_the_generator() {
        let mut db = cleaned(23);
        db.split_with_seed(3).unwrap();

        let fold = KFold::shuffled(SPLIT_FOLDS, 3).split(23).unwrap().pop().unwrap();
        let expected: Vec<String> = fold.test.iter().map(|i| format!("P{i:03}")).collect();
        assert_eq!(db.test_identifiers().unwrap(), expected.as_slice());
        assert_eq!(db.test_rows().unwrap(), fold.test.as_slice());

        let target = db.target().unwrap();
        let expected_target: Vec<f64> = fold.test.iter().map(|&i| target[i]).collect();
        assert_eq!(db.test_target().unwrap().to_vec(), expected_target);
    }

    #[test]
    fn different_seeds_give_different_partitions() {
        let mut db = cleaned(100);
        db.split_with_seed(1).unwrap();
        let first = db.test_identifiers().unwrap().to_vec();
        db.split_with_seed(2).unwrap();
        let second = db.test_identifiers().unwrap().to_vec();
        assert_ne!(first, second);

        db.split().unwrap();
        assert_eq!(db.test_identifiers().unwrap().len(), 20);
    }

    #[test]
    fn external_data_replaces_test_partition() {
        let mut db = cleaned(12);

        // во внешних данных нет категории "positive"
        let mut external = records(4);
        external.remove_column("Particle Charge").unwrap();
        external
            .push_column(Column::text(
                "Particle Charge",
                vec![
                    Some("negative".into()),
                    Some("neutral".into()),
                    Some("weird".into()),
                    Some("negative".into()),
                ],
            ))
            .unwrap();

        db.set_prediction_input(external).unwrap();
        assert!(db.is_predict_mode());

        let train = db.train_features().unwrap();
        let test = db.test_features().unwrap();
        assert_eq!(test.n_rows(), 4);
        assert_eq!(train.column_names(), test.column_names());
        assert!(train.column("Accession Number").is_none());
        assert_eq!(
            test.numeric_column("Particle Charge_positive").unwrap(),
            &[Some(0.0); 4]
        );
        assert!(test.column("Particle Charge_weird").is_none());
        assert_eq!(db.test_identifiers().unwrap(), &["P000", "P001", "P002", "P003"]);
        assert_eq!(db.test_rows().unwrap(), &[0, 1, 2, 3]);
        assert_eq!(db.test_target().unwrap().len(), 4);

        assert!(matches!(db.split(), Err(DataError::ModeConflict(_))));
    }

    #[test]
    fn external_data_requires_clean() {
        let mut db = Database::with_schema(schema());
        let err = db.set_prediction_input(records(3)).unwrap_err();
        assert!(matches!(err, DataError::Uninitialized { field: "train_features", .. }));
        assert!(!db.is_predict_mode());
    }

    #[test]
    fn loading_from_missing_path_fails() {
        let mut db = Database::new();
        assert!(matches!(
            db.load_raw_data("/no/such/database.csv"),
            Err(DataError::Precondition(_))
        ));
        assert!(matches!(
            db.load_prediction_input("/no/such/input.csv"),
            Err(DataError::Precondition(_))
        ));
    }
}
