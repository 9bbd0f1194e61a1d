/// Запуск конвейера: очистка базы, обучение случайного леса и отчет

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing_subscriber::EnvFilter;

use enm_protein_ml::{
    apply_rfecv_mask, optimize, recursive_feature_elimination, Database, PipelineConfig,
    RandomForestRegressor, Regressor, RunSummary, Table,
};

const USAGE: &str = "usage: enm-protein-ml <database.csv> [--config <file.json>] \
[--predict <input.csv>] [--mask <mask.txt>] [--rfecv <mask_out.txt>] [--optimize]";

#[derive(Debug, Default)]
struct Args {
    database: PathBuf,
    config: Option<PathBuf>,
    predict: Option<PathBuf>,
    mask: Option<PathBuf>,
    rfecv: Option<PathBuf>,
    optimize: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut database = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("{flag} expects a path\n{USAGE}"))
        };
        match arg.as_str() {
            "--config" => parsed.config = Some(value("--config")?),
            "--predict" => parsed.predict = Some(value("--predict")?),
            "--mask" => parsed.mask = Some(value("--mask")?),
            "--rfecv" => parsed.rfecv = Some(value("--rfecv")?),
            "--optimize" => parsed.optimize = true,
            "-h" | "--help" => bail!(USAGE),
            other if other.starts_with("--") => bail!("unknown option {other}\n{USAGE}"),
            other => {
                if database.replace(PathBuf::from(other)).is_some() {
                    bail!("only one database path is accepted\n{USAGE}");
                }
            }
        }
    }

    parsed.database = database.ok_or_else(|| anyhow!(USAGE))?;
    Ok(parsed)
}

/// Признаки для обучения и теста, при необходимости с примененной маской
fn model_inputs(db: &Database, mask: Option<&Path>) -> Result<(Table, Table)> {
    let train = db.train_features()?;
    let test = db.test_features()?;
    match mask {
        Some(mask) => {
            let masked = apply_rfecv_mask(mask, &[train, test])
                .with_context(|| format!("applying mask {}", mask.display()))?;
            let [train, test]: [Table; 2] = masked
                .try_into()
                .map_err(|_| anyhow!("mask returned an unexpected number of tables"))?;
            Ok((train, test))
        }
        None => Ok((train.clone(), test.clone())),
    }
}

fn main() -> Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let mut db = Database::with_schema(config.schema.clone());
    db.load_raw_data(&args.database)
        .with_context(|| format!("loading database {}", args.database.display()))?;
    db.clean().context("cleaning database")?;

    if let Some(path) = &args.predict {
        db.load_prediction_input(path)
            .with_context(|| format!("loading prediction input {}", path.display()))?;
    }

    let forest = RandomForestRegressor::new(config.forest.clone());

    // Подбор гиперпараметров и признаков вместо обычного запуска
    if args.optimize || args.rfecv.is_some() {
        if !db.is_predict_mode() {
            db.split()?;
        }
        let x_train = db.train_features()?;
        let y_train = db.train_target()?;

        if args.optimize {
            let result = optimize(
                &forest,
                &x_train.to_array()?,
                y_train,
                &config.param_grid,
                config.search_folds,
            )?;
            println!("Best parameters: \n {}", serde_json::to_string_pretty(&result.best_params)?);
        }
        if let Some(mask_file) = &args.rfecv {
            let result =
                recursive_feature_elimination(&forest, x_train, y_train, mask_file, config.rfecv_folds)?;
            println!(
                "Optimal number of features: {}\nFeature names: {:?}",
                result.n_features, result.feature_names
            );
        }
        return Ok(());
    }

    let mut summary = RunSummary::new();
    for run in 0..config.n_runs {
        if !db.is_predict_mode() {
            db.split()?;
        }
        let (train, test) = model_inputs(&db, args.mask.as_deref())?;

        let mut model = forest.clone();
        model.fit(&train.to_array()?, db.train_target()?)?;
        let predictions = model.predict(&test.to_array()?)?;

        let metrics = summary.record_run(
            db.test_rows()?,
            db.test_identifiers()?,
            db.test_target()?,
            &predictions,
            &train.column_names(),
            model.feature_importances().as_ref(),
        )?;
        tracing::info!(
            "Run {}/{}: MAE {:.4}, R2 {:.4}",
            run + 1,
            config.n_runs,
            metrics.mean_absolute_error,
            metrics.r2
        );
    }

    summary
        .save(&config.output_dir)
        .with_context(|| format!("writing report to {}", config.output_dir))?;
    Ok(())
}
