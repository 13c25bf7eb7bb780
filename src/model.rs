/// Train the logistic regression win classifier.
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::ModelConfig;
use crate::error::{BattleError, Result};
use crate::preprocess::FeatureTable;

pub struct WinClassifier {
    model: FittedLogisticRegression<f64, bool>,
    columns: Vec<String>,
}

fn labels(table: &FeatureTable) -> Result<&[bool]> {
    table
        .labels
        .as_deref()
        .ok_or_else(|| BattleError::Classifier("training table has no player_won labels".into()))
}

fn fit(x: Array2<f64>, y: Array1<bool>, cfg: &ModelConfig) -> Result<FittedLogisticRegression<f64, bool>> {
    let ds = Dataset::new(x, y);
    LogisticRegression::default()
        .alpha(cfg.alpha)
        .gradient_tolerance(cfg.gradient_tolerance)
        .max_iterations(cfg.max_iterations)
        .fit(&ds)
        .map_err(|e| BattleError::Classifier(e.to_string()))
}

/// Fit on every row of a labelled table.
pub fn train_classifier(table: &FeatureTable, cfg: &ModelConfig) -> Result<WinClassifier> {
    let y = Array1::from(labels(table)?.to_vec());
    log::info!(
        "Training logistic regression on {} battles x {} features",
        table.len(),
        table.columns.len()
    );
    let model = fit(table.values.clone(), y, cfg)?;
    Ok(WinClassifier {
        model,
        columns: table.columns.clone(),
    })
}

impl WinClassifier {
    /// Predict on a table, aligning it to the training columns first.
    pub fn predict(&self, table: &FeatureTable) -> Vec<bool> {
        let aligned = table.align_to(&self.columns);
        self.model.predict(&aligned.values).to_vec()
    }

    /// Coefficients by feature, largest magnitude first.
    pub fn coefficients(&self) -> Vec<(String, f64)> {
        let mut vec: Vec<(String, f64)> = self
            .columns
            .iter()
            .cloned()
            .zip(self.model.params().iter().copied())
            .collect();
        vec.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        vec
    }

    pub fn intercept(&self) -> f64 {
        self.model.intercept()
    }
}

pub fn accuracy(predicted: &[bool], actual: &[bool]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let correct = predicted.iter().zip(actual).filter(|(p, a)| p == a).count();
    correct as f64 / actual.len() as f64
}

/// Seeded shuffle, fit on the larger part and score on the held-out rows.
/// `None` when the fraction leaves either side empty.
pub fn holdout_accuracy(table: &FeatureTable, cfg: &ModelConfig) -> Result<Option<f64>> {
    let y = labels(table)?;
    let n_valid = (table.len() as f64 * cfg.validation_fraction).round() as usize;
    if n_valid == 0 || n_valid >= table.len() {
        return Ok(None);
    }

    let mut indices: Vec<usize> = (0..table.len()).collect();
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    indices.shuffle(&mut rng);
    let (valid_idx, train_idx) = indices.split_at(n_valid);

    let pick = |idx: &[usize]| -> Array1<bool> { idx.iter().map(|&i| y[i]).collect() };
    let model = fit(
        table.values.select(Axis(0), train_idx),
        pick(train_idx),
        cfg,
    )?;
    let predicted = model.predict(&table.values.select(Axis(0), valid_idx));

    let acc = accuracy(&predicted.to_vec(), &pick(valid_idx).to_vec());
    log::info!(
        "Hold-out accuracy: {:.4} ({} train / {} validation)",
        acc,
        train_idx.len(),
        valid_idx.len()
    );
    Ok(Some(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BattleId;
    use ndarray::array;

    /// Winner is decided by the first feature; the second is noise.
    fn separable() -> FeatureTable {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let won = i % 2 == 0;
            let signal = if won { 0.8 } else { 0.2 } + (i % 5) as f64 * 0.02;
            rows.push([signal, (i % 3) as f64 / 3.0]);
            labels.push(won);
        }
        let values = Array2::from_shape_fn((rows.len(), 2), |(i, j)| rows[i][j]);
        FeatureTable {
            battle_ids: (0..40).map(BattleId::Number).collect(),
            labels: Some(labels),
            columns: vec!["signal".to_string(), "noise".to_string()],
            values,
        }
    }

    fn cfg() -> ModelConfig {
        ModelConfig {
            alpha: 0.01,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn learns_a_separable_signal() -> Result<()> {
        let table = separable();
        let clf = train_classifier(&table, &cfg())?;
        let predicted = clf.predict(&table);
        assert_eq!(accuracy(&predicted, table.labels.as_deref().unwrap()), 1.0);

        let coefs = clf.coefficients();
        assert_eq!(coefs.len(), 2);
        assert_eq!(coefs[0].0, "signal");
        Ok(())
    }

    #[test]
    fn predict_aligns_columns() -> Result<()> {
        let table = separable();
        let clf = train_classifier(&table, &cfg())?;

        // same data, columns swapped plus an extra one the model never saw
        let shuffled = FeatureTable {
            battle_ids: vec![BattleId::Number(0), BattleId::Number(1)],
            labels: None,
            columns: vec!["extra".into(), "noise".into(), "signal".into()],
            values: array![[5.0, 0.0, 0.9], [5.0, 0.0, 0.1]],
        };
        assert_eq!(clf.predict(&shuffled), vec![true, false]);
        Ok(())
    }

    #[test]
    fn holdout_is_reproducible() -> Result<()> {
        let table = separable();
        let first = holdout_accuracy(&table, &cfg())?;
        let second = holdout_accuracy(&table, &cfg())?;
        assert_eq!(first, second);
        assert_eq!(first, Some(1.0));
        Ok(())
    }

    #[test]
    fn holdout_disabled_with_zero_fraction() -> Result<()> {
        let config = ModelConfig {
            validation_fraction: 0.0,
            ..cfg()
        };
        assert_eq!(holdout_accuracy(&separable(), &config)?, None);
        Ok(())
    }

    #[test]
    fn unlabelled_table_cannot_train() {
        let mut table = separable();
        table.labels = None;
        assert!(matches!(
            train_classifier(&table, &cfg()),
            Err(BattleError::Classifier(_))
        ));
    }

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[true, false, true, true], &[true, true, true, false]), 0.5);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }
}
