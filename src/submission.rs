// Pairs battle ids with predicted winners and writes the submission csv.
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::error::{BattleError, Result};
use crate::io::BattleId;
use crate::preprocess::FeatureTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRow {
    pub battle_id: BattleId,
    #[serde(serialize_with = "as_digit")]
    pub player_won: bool,
}

fn as_digit<S: Serializer>(value: &bool, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u8(u8::from(*value))
}

/// One row per table row, same order. Predictions must line up with the rows.
pub fn build_submission(table: &FeatureTable, predictions: &[bool]) -> Result<Vec<SubmissionRow>> {
    if predictions.len() != table.len() {
        return Err(BattleError::PredictionCount {
            predictions: predictions.len(),
            rows: table.len(),
        });
    }
    Ok(table
        .battle_ids
        .iter()
        .zip(predictions)
        .map(|(id, &won)| SubmissionRow {
            battle_id: id.clone(),
            player_won: won,
        })
        .collect())
}

pub fn write_submission<P: AsRef<Path>>(path: P, rows: &[SubmissionRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    log::info!("Wrote {} predictions to {}", rows.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::error::Error;

    fn table(ids: Vec<BattleId>) -> FeatureTable {
        FeatureTable {
            values: Array2::zeros((ids.len(), 1)),
            battle_ids: ids,
            labels: None,
            columns: vec!["f".to_string()],
        }
    }

    #[test]
    fn keeps_row_order_and_count() -> std::result::Result<(), Box<dyn Error>> {
        let ids = vec![BattleId::Number(9), BattleId::Number(3), BattleId::Number(5)];
        let rows = build_submission(&table(ids.clone()), &[true, false, true])?;
        assert_eq!(rows.len(), 3);
        let got: Vec<BattleId> = rows.iter().map(|r| r.battle_id.clone()).collect();
        assert_eq!(got, ids);
        assert!(!rows[1].player_won);
        Ok(())
    }

    #[test]
    fn mismatched_predictions_are_rejected() {
        let err = build_submission(&table(vec![BattleId::Number(1)]), &[]).unwrap_err();
        assert!(matches!(
            err,
            BattleError::PredictionCount { predictions: 0, rows: 1 }
        ));
    }

    #[test]
    fn csv_layout() -> std::result::Result<(), Box<dyn Error>> {
        let rows = build_submission(
            &table(vec![BattleId::Number(0), BattleId::Text("b-1".into())]),
            &[true, false],
        )?;
        let path = std::env::temp_dir().join("battle_predictor_submission.csv");
        write_submission(&path, &rows)?;
        let text = std::fs::read_to_string(&path)?;
        assert_eq!(text, "battle_id,player_won\n0,1\nb-1,0\n");
        Ok(())
    }
}
