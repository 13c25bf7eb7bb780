// Turns a whole dataset into a feature table, then scales and zero-fills it.
use std::path::Path;

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};
use crate::features::{BattleFeatures, FeatureOptions};
use crate::io::{BattleId, BattleRecord};
use crate::vocabulary::Vocabulary;

/// Numeric columns that get min-max scaled. Flags and one-hots are left alone.
pub const SCALED_COLUMNS: [&str; 22] = [
    "p1_mean_hp",
    "p1_mean_spe",
    "p1_mean_atk",
    "p1_mean_def",
    "p1_mean_spa",
    "p1_mean_spd",
    "p1_mean_level",
    "p2_lead_hp",
    "p2_lead_spe",
    "p2_lead_atk",
    "p2_lead_def",
    "p2_lead_spa",
    "p2_lead_spd",
    "p2_lead_level",
    "p1_mean_hp_pct",
    "p2_mean_hp_pct",
    "p2_mean_move_base_power",
    "p1_mean_move_base_power",
    "p1_mean_boosts",
    "p2_mean_boosts",
    "p1_no_of_moves",
    "p2_no_of_moves",
];

pub const DAMAGE_COLUMN: &str = "p1_total_dmg_taken";

pub fn scaled_columns(include_damage: bool) -> Vec<&'static str> {
    let mut cols = SCALED_COLUMNS.to_vec();
    if include_damage {
        cols.push(DAMAGE_COLUMN);
    }
    cols
}

/// Where the scaler's min/max come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerFit {
    /// Every table is scaled with its own min/max.
    #[default]
    PerTable,
    /// Fit on the training table and reuse those ranges on the test table.
    Train,
}

/// One row per battle, one column per feature. Undefined cells hold NaN until filled.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub battle_ids: Vec<BattleId>,
    pub labels: Option<Vec<bool>>,
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureTable {
    /// Stack per-battle features, keeping input order. Every battle must yield the same columns.
    pub fn from_features(rows: &[BattleFeatures]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Ok(FeatureTable {
                battle_ids: Vec::new(),
                labels: None,
                columns: Vec::new(),
                values: Array2::zeros((0, 0)),
            });
        };

        let columns: Vec<String> = first.columns().into_iter().map(|(n, _)| n).collect();
        let labelled = first.player_won.is_some();

        let mut values = Array2::<f64>::zeros((rows.len(), columns.len()));
        let mut labels = Vec::with_capacity(rows.len());
        let mut battle_ids = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            let cols = row.columns();
            let mismatch = || BattleError::ColumnMismatch {
                battle_id: row.battle_id.to_string(),
                expected: columns.len(),
                found: cols.len(),
            };
            if cols.len() != columns.len() {
                return Err(mismatch());
            }
            for (j, ((name, value), expected)) in cols.iter().zip(&columns).enumerate() {
                if name != expected {
                    return Err(mismatch());
                }
                values[(i, j)] = value.as_f64();
            }

            match (labelled, row.player_won) {
                (true, Some(won)) => labels.push(won),
                (false, None) => {}
                _ => return Err(BattleError::InconsistentLabels(row.battle_id.to_string())),
            }
            battle_ids.push(row.battle_id.clone());
        }

        Ok(FeatureTable {
            battle_ids,
            labels: labelled.then_some(labels),
            columns,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.battle_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.battle_ids.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name)
            .map(|j| self.values.index_axis(Axis(1), j))
    }

    /// Replace every undefined (NaN) cell.
    pub fn fill_missing(&mut self, value: f64) {
        self.values.mapv_inplace(|v| if v.is_nan() { value } else { v });
    }

    /// Restrict to `columns`, in that order. Columns this table lacks come out as 0.
    pub fn align_to(&self, columns: &[String]) -> FeatureTable {
        let mut values = Array2::<f64>::zeros((self.len(), columns.len()));
        for (j, name) in columns.iter().enumerate() {
            if let Some(src) = self.column(name) {
                values.index_axis_mut(Axis(1), j).assign(&src);
            } else {
                log::debug!("Column {} absent, filling with 0", name);
            }
        }
        FeatureTable {
            battle_ids: self.battle_ids.clone(),
            labels: self.labels.clone(),
            columns: columns.to_vec(),
            values,
        }
    }

    /// Write `battle_id`, `player_won` (when labelled) and every feature column.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path.as_ref())?;

        let mut header = vec!["battle_id".to_string()];
        if self.labels.is_some() {
            header.push("player_won".to_string());
        }
        header.extend(self.columns.iter().cloned());
        wtr.write_record(&header)?;

        for (i, row) in self.values.outer_iter().enumerate() {
            let mut record = vec![self.battle_ids[i].to_string()];
            if let Some(labels) = &self.labels {
                record.push(u8::from(labels[i]).to_string());
            }
            record.extend(row.iter().map(|v| v.to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;

        log::info!("Wrote {} rows to {}", self.len(), path.as_ref().display());
        Ok(())
    }
}

/// Extract features for every battle with a shared vocabulary.
pub fn transform_dataset(
    battles: &[BattleRecord],
    vocab: &Vocabulary,
    options: &FeatureOptions,
) -> Result<FeatureTable> {
    let rows: Vec<BattleFeatures> = battles
        .iter()
        .map(|b| BattleFeatures::extract(b, vocab, options))
        .collect();
    let table = FeatureTable::from_features(&rows)?;
    log::info!(
        "Feature table: {} rows x {} columns",
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

/// Per-column min/max learnt from one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinMaxScaler {
    ranges: Vec<(String, f64, f64)>,
}

impl MinMaxScaler {
    /// NaN cells are ignored when looking for min and max.
    pub fn fit(table: &FeatureTable, columns: &[&str]) -> Result<Self> {
        let mut ranges = Vec::with_capacity(columns.len());
        for &name in columns {
            let col = table
                .column(name)
                .ok_or_else(|| BattleError::MissingColumn(name.to_string()))?;
            let (min, max) = col.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(mi, ma), &v| {
                (mi.min(v), ma.max(v))
            });
            log::debug!("Scaling {}: [{}, {}]", name, min, max);
            ranges.push((name.to_string(), min, max));
        }
        Ok(MinMaxScaler { ranges })
    }

    /// Map each fitted column onto [0, 1]. A zero-range column becomes 0.0, NaN stays NaN.
    pub fn transform(&self, table: &mut FeatureTable) -> Result<()> {
        for (name, min, max) in &self.ranges {
            let j = table
                .column_index(name)
                .ok_or_else(|| BattleError::MissingColumn(name.clone()))?;
            let range = max - min;
            table.values.index_axis_mut(Axis(1), j).mapv_inplace(|v| {
                if v.is_nan() {
                    v
                } else if range > 0.0 {
                    (v - min) / range
                } else {
                    0.0
                }
            });
        }
        Ok(())
    }
}

/// Fit on `table` and scale it in place.
pub fn scale(table: &mut FeatureTable, columns: &[&str]) -> Result<MinMaxScaler> {
    let scaler = MinMaxScaler::fit(table, columns)?;
    scaler.transform(table)?;
    Ok(scaler)
}

/// Transform, scale, then zero-fill. With `fitted` the given ranges are reused instead of refitting.
pub fn prepare(
    battles: &[BattleRecord],
    vocab: &Vocabulary,
    options: &FeatureOptions,
    columns: &[&str],
    fitted: Option<&MinMaxScaler>,
) -> Result<(FeatureTable, MinMaxScaler)> {
    let mut table = transform_dataset(battles, vocab, options)?;
    if table.is_empty() {
        log::warn!("No battles to prepare");
        return Ok((table, fitted.cloned().unwrap_or_default()));
    }
    let scaler = match fitted {
        Some(scaler) => {
            scaler.transform(&mut table)?;
            scaler.clone()
        }
        None => scale(&mut table, columns)?,
    };
    table.fill_missing(0.0);
    Ok((table, scaler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fixtures::*;
    use serde_json::Value;
    use std::error::Error;

    fn corpus() -> Vec<BattleRecord> {
        let mut records = Vec::new();
        for (id, hp, power) in [(1, 50, 40), (2, 100, 80), (3, 75, 120)] {
            records.push(parse(battle(
                id,
                vec![pokemon("a", hp)],
                pokemon("x", hp),
                vec![turn(
                    state("a", 0.5),
                    state("x", 1.0),
                    attack("NORMAL", 1.0, power),
                    Value::Null,
                )],
            )));
        }
        records
    }

    fn table(records: &[BattleRecord]) -> FeatureTable {
        let vocab = Vocabulary::from_battles(records);
        transform_dataset(records, &vocab, &FeatureOptions::default()).unwrap()
    }

    #[test]
    fn rows_keep_input_order() {
        let t = table(&corpus());
        let ids: Vec<String> = t.battle_ids.iter().map(|b| b.to_string()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(t.labels.is_none());
        assert_eq!(t.values.nrows(), 3);
        assert_eq!(t.values.ncols(), t.columns.len());
    }

    #[test]
    fn min_max_scaling_hits_both_ends() -> std::result::Result<(), Box<dyn Error>> {
        let mut t = table(&corpus());
        scale(&mut t, &scaled_columns(true))?;

        let power = t.column("p1_mean_move_base_power").unwrap();
        assert_eq!(power.to_vec(), vec![0.0, 0.5, 1.0]);
        let hp = t.column("p1_mean_hp").unwrap();
        assert_eq!(hp.to_vec(), vec![0.0, 1.0, 0.5]);
        Ok(())
    }

    #[test]
    fn constant_column_scales_to_zero() -> std::result::Result<(), Box<dyn Error>> {
        let mut t = table(&corpus());
        scale(&mut t, &scaled_columns(true))?;
        // every battle has one p1 move
        assert_eq!(t.column("p1_no_of_moves").unwrap().to_vec(), vec![0.0; 3]);
        Ok(())
    }

    #[test]
    fn unscaled_columns_are_untouched() -> std::result::Result<(), Box<dyn Error>> {
        let mut t = table(&corpus());
        let before = t.column(DAMAGE_COLUMN).unwrap().to_vec();
        scale(&mut t, &scaled_columns(false))?;
        assert_eq!(t.column(DAMAGE_COLUMN).unwrap().to_vec(), before);
        assert_eq!(before, vec![25.0, 50.0, 37.5]);
        Ok(())
    }

    #[test]
    fn undefined_cells_survive_scaling_then_fill_with_zero() -> std::result::Result<(), Box<dyn Error>> {
        let mut t = table(&corpus());
        // p2 never acts
        assert!(t.column("p2_mean_move_base_power").unwrap().iter().all(|v| v.is_nan()));
        scale(&mut t, &scaled_columns(true))?;
        assert!(t.column("p2_mean_move_base_power").unwrap().iter().all(|v| v.is_nan()));
        t.fill_missing(0.0);
        assert_eq!(t.column("p2_mean_move_base_power").unwrap().to_vec(), vec![0.0; 3]);
        assert_eq!(t.column("p2_mean_accuracy_OHE").unwrap().to_vec(), vec![0.0; 3]);
        Ok(())
    }

    #[test]
    fn reused_scaler_applies_training_ranges() -> std::result::Result<(), Box<dyn Error>> {
        let train = corpus();
        let vocab = Vocabulary::from_battles(&train);
        let options = FeatureOptions::default();
        let cols = scaled_columns(true);
        let (_, scaler) = prepare(&train, &vocab, &options, &cols, None)?;

        let test = vec![train[1].clone()];
        let (t, _) = prepare(&test, &vocab, &options, &cols, Some(&scaler))?;
        // power 80 within the training range [40, 120]
        assert_eq!(t.column("p1_mean_move_base_power").unwrap()[0], 0.5);
        Ok(())
    }

    #[test]
    fn missing_scale_column_is_an_error() {
        let mut t = table(&corpus());
        let err = scale(&mut t, &["no_such_column"]).unwrap_err();
        assert!(matches!(err, BattleError::MissingColumn(_)));
    }

    #[test]
    fn mixed_labels_are_rejected() {
        let mut records = corpus();
        records[0].player_won = Some(true);
        let vocab = Vocabulary::from_battles(&records);
        let err = transform_dataset(&records, &vocab, &FeatureOptions::default()).unwrap_err();
        assert!(matches!(err, BattleError::InconsistentLabels(_)));
    }

    #[test]
    fn labels_follow_rows() {
        let mut records = corpus();
        for (r, won) in records.iter_mut().zip([true, false, true]) {
            r.player_won = Some(won);
        }
        let t = table(&records);
        assert_eq!(t.labels, Some(vec![true, false, true]));
    }

    #[test]
    fn align_pads_absent_columns() {
        let t = table(&corpus());
        let wanted = vec!["p1_mean_hp".to_string(), "p1_type_FIRE".to_string()];
        let aligned = t.align_to(&wanted);
        assert_eq!(aligned.columns, wanted);
        assert_eq!(aligned.values.column(0).to_vec(), vec![50.0, 100.0, 75.0]);
        assert_eq!(aligned.values.column(1).to_vec(), vec![0.0; 3]);
    }

    #[test]
    fn writes_csv_with_header() -> std::result::Result<(), Box<dyn Error>> {
        let mut records = corpus();
        records[0].player_won = Some(true);
        records[1].player_won = Some(false);
        records[2].player_won = Some(true);
        let t = table(&records);

        let path = std::env::temp_dir().join("battle_predictor_features.csv");
        t.write_csv(&path)?;

        let mut rdr = csv::Reader::from_path(&path)?;
        let headers = rdr.headers()?.clone();
        assert_eq!(&headers[0], "battle_id");
        assert_eq!(&headers[1], "player_won");
        assert_eq!(headers.len(), t.columns.len() + 2);
        let rows: Vec<csv::StringRecord> = rdr.records().collect::<std::result::Result<_, _>>()?;
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][1], "0");
        Ok(())
    }

    #[test]
    fn empty_dataset_gives_empty_table() {
        let t = table(&[]);
        assert!(t.is_empty());
        assert!(t.columns.is_empty());
    }
}
