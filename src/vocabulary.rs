// Collects the categorical values seen in a corpus so one-hot columns can be built from them.
use std::collections::BTreeSet;

use crate::io::{BattleRecord, Side};

/// Every distinct categorical value seen anywhere in a corpus' timelines.
///
/// Sets are ordered, so the one-hot columns built from them come out in the
/// same order on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    pub effects: BTreeSet<String>,
    pub move_types: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub pokemon_names: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
}

impl Vocabulary {
    pub fn from_battles(battles: &[BattleRecord]) -> Self {
        let mut vocab = Vocabulary::default();
        for battle in battles {
            vocab.observe(battle);
        }
        log::info!(
            "Vocabulary: {} effects, {} move types, {} categories, {} pokemon, {} statuses",
            vocab.effects.len(),
            vocab.move_types.len(),
            vocab.categories.len(),
            vocab.pokemon_names.len(),
            vocab.statuses.len()
        );
        vocab
    }

    fn observe(&mut self, battle: &BattleRecord) {
        for side in Side::BOTH {
            for state in battle.states(side) {
                if let Some(effect) = state.primary_effect() {
                    self.effects.insert(effect.to_string());
                }
                self.pokemon_names.insert(state.name.clone());
                self.statuses.insert(state.status_label().to_string());
            }
            for mv in battle.moves(side) {
                self.move_types.insert(mv.move_type.clone());
                self.categories.insert(mv.category.clone());
            }
        }
    }

    /// Named vocabularies, in the order they are printed.
    pub fn sections(&self) -> [(&'static str, &BTreeSet<String>); 5] {
        [
            ("effects", &self.effects),
            ("move types", &self.move_types),
            ("categories", &self.categories),
            ("pokemon", &self.pokemon_names),
            ("statuses", &self.statuses),
        ]
    }
}
