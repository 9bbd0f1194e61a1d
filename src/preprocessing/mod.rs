/// Модуль предобработки данных

pub mod encoding;
pub mod imputation;
pub mod mask;
pub mod normalization;
pub mod split;

pub use encoding::one_hot_encode;
pub use imputation::fill_nan;
pub use mask::{apply_mask, apply_rfecv_mask, remove_extra_entries};
pub use normalization::{normalize_and_reshape, MinMaxScaler};
pub use split::{Fold, KFold};
