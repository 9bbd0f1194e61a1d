//! One-hot кодирование категориальных признаков

use std::collections::BTreeSet;

use crate::error::Result;
use crate::types::{Column, Table};

/// Заменяет категориальный столбец индикаторными столбцами `<столбец>_<категория>`.
///
/// Категории упорядочены лексикографически, новые столбцы добавляются в конец
/// таблицы. Строка с пропущенной категорией получает нули во всех индикаторах.
pub fn one_hot_encode(data: &mut Table, category: &str) -> Result<()> {
    let column = data.remove_column(category)?;
    let labels = column.data.category_labels();
    let categories: BTreeSet<&String> = labels.iter().flatten().collect();

    for value in &categories {
        let indicator = labels
            .iter()
            .map(|label| Some(if label.as_ref() == Some(*value) { 1.0 } else { 0.0 }))
            .collect();
        data.push_column(Column::numeric(format!("{category}_{value}"), indicator))?;
    }

    tracing::debug!("One-hot encoded '{}' into {} columns", category, categories.len());
    Ok(())
}
