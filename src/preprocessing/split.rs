//! Разбиение строк на фолды для train/test и кросс-валидации

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{DataError, Result};

/// Один фолд: индексы обучающих и тестовых строк (по возрастанию)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K-fold разбиение. Первые `n % k` фолдов на одну строку больше
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            seed: 0,
        }
    }

    pub fn shuffled(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle: true,
            seed,
        }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(DataError::Precondition(format!(
                "k-fold needs at least 2 splits, got {}",
                self.n_splits
            )));
        }
        if n_samples < self.n_splits {
            return Err(DataError::Precondition(format!(
                "cannot split {} rows into {} folds",
                n_samples, self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;

        for k in 0..self.n_splits {
            let size = base + usize::from(k < extra);
            let mut in_test = vec![false; n_samples];
            for &i in &indices[start..start + size] {
                in_test[i] = true;
            }
            let (test, train): (Vec<usize>, Vec<usize>) = (0..n_samples).partition(|&i| in_test[i]);
            folds.push(Fold { train, test });
            start += size;
        }

        Ok(folds)
    }
}
