// Per-battle feature extraction: reduces a battle timeline to a flat, fixed-width feature record.
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::io::{BattleId, BattleRecord, BoostStat, PokemonDetails, PokemonState, Side, TEAM_SIZE};
use crate::vocabulary::Vocabulary;

/// How the P2 knock-out flags are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KoEncoding {
    /// One `p2_pokemon_last_KOd` flag, true if any P2 creature seen hit 0 hp.
    #[default]
    Any,
    /// `p2_pokemon_{i}_KOd` for each of the six slots, in order of first appearance.
    PerSlot,
}

/// Switches that change which columns a battle produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureOptions {
    pub ko_encoding: KoEncoding,
    pub include_effects: bool,
}

/// P2 knock-out flags, shaped by the `KoEncoding` that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P2Knockouts {
    Any(bool),
    PerSlot([bool; TEAM_SIZE]),
}

/// Value of a single feature column. Undefined numbers become NaN in a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Number(Option<f64>),
    Flag(bool),
}

impl FeatureValue {
    pub fn as_f64(self) -> f64 {
        match self {
            FeatureValue::Number(v) => v.unwrap_or(f64::NAN),
            FeatureValue::Flag(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Level and the six base stats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseStats {
    pub hp: f64,
    pub spe: f64,
    pub atk: f64,
    pub def: f64,
    pub spa: f64,
    pub spd: f64,
    pub level: f64,
}

impl BaseStats {
    pub fn of(p: &PokemonDetails) -> Self {
        BaseStats {
            hp: f64::from(p.base_hp),
            spe: f64::from(p.base_spe),
            atk: f64::from(p.base_atk),
            def: f64::from(p.base_def),
            spa: f64::from(p.base_spa),
            spd: f64::from(p.base_spd),
            level: f64::from(p.level),
        }
    }

    /// Mean over a team; `None` for an empty team.
    pub fn mean(team: &[PokemonDetails]) -> Option<Self> {
        let n = team.len() as f64;
        let sum = team.iter().map(Self::of).reduce(|a, b| BaseStats {
            hp: a.hp + b.hp,
            spe: a.spe + b.spe,
            atk: a.atk + b.atk,
            def: a.def + b.def,
            spa: a.spa + b.spa,
            spd: a.spd + b.spd,
            level: a.level + b.level,
        })?;
        Some(BaseStats {
            hp: sum.hp / n,
            spe: sum.spe / n,
            atk: sum.atk / n,
            def: sum.def / n,
            spa: sum.spa / n,
            spd: sum.spd / n,
            level: sum.level / n,
        })
    }

    fn named(&self) -> [(&'static str, f64); 7] {
        [
            ("hp", self.hp),
            ("spe", self.spe),
            ("atk", self.atk),
            ("def", self.def),
            ("spa", self.spa),
            ("spd", self.spd),
            ("level", self.level),
        ]
    }
}

/// Timeline aggregates computed the same way for both players.
#[derive(Debug, Clone, PartialEq)]
pub struct SideFeatures {
    pub mean_boosts: Option<f64>,
    /// Mean stage per stat is strictly positive, in `BoostStat::ALL` order.
    pub boost_flags: [bool; 5],
    pub accurate: bool,
    pub mean_move_base_power: Option<f64>,
    pub no_of_moves: usize,
}

impl SideFeatures {
    fn extract(battle: &BattleRecord, side: Side) -> Self {
        let mean_boosts = mean(battle.states(side).map(|s| f64::from(s.boosts.total())));

        let mut boost_flags = [false; 5];
        for (flag, stat) in boost_flags.iter_mut().zip(BoostStat::ALL) {
            *flag = mean(battle.states(side).map(|s| f64::from(s.boosts.get(stat))))
                .is_some_and(|m| m > 0.0);
        }

        // an undefined mean compares false
        let accurate = mean(battle.moves(side).map(|m| m.accuracy)).is_some_and(|m| m > 0.5);

        SideFeatures {
            mean_boosts,
            boost_flags,
            accurate,
            mean_move_base_power: mean(battle.moves(side).map(|m| f64::from(m.base_power))),
            no_of_moves: battle.moves(side).count(),
        }
    }
}

/// Everything extracted from one battle.
///
/// The static part has named fields; the vocabulary-dependent one-hot part
/// lives in `one_hot`, keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleFeatures {
    pub battle_id: BattleId,
    pub player_won: Option<bool>,
    pub p1_mean_stats: Option<BaseStats>,
    pub p2_lead_stats: BaseStats,
    pub p1_ko: [bool; TEAM_SIZE],
    pub p2_ko: P2Knockouts,
    pub p1_mean_hp_pct: Option<f64>,
    pub p2_mean_hp_pct: Option<f64>,
    pub p1_total_dmg_taken: Option<f64>,
    pub p1: SideFeatures,
    pub p2: SideFeatures,
    pub one_hot: Vec<(String, bool)>,
}

/// Mean of the values, `None` when there are none.
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Lowest hp fraction observed per creature name for one side.
fn min_hp_pct(battle: &BattleRecord, side: Side) -> HashMap<&str, f64> {
    let mut mins: HashMap<&str, f64> = HashMap::new();
    for state in battle.states(side) {
        mins.entry(state.name.as_str())
            .and_modify(|m| *m = m.min(state.hp_pct))
            .or_insert(state.hp_pct);
    }
    mins
}

/// Creatures that never show up in the timeline count as untouched.
fn lowest_hp(mins: &HashMap<&str, f64>, name: &str) -> f64 {
    mins.get(name).copied().unwrap_or(1.0)
}

/// P2 creatures in order of first appearance.
fn p2_roster(battle: &BattleRecord) -> Vec<&str> {
    let mut roster: Vec<&str> = Vec::new();
    for state in battle.states(Side::P2) {
        if !roster.contains(&state.name.as_str()) {
            roster.push(&state.name);
        }
    }
    roster
}

fn knocked_out(hp_pct: f64) -> bool {
    hp_pct == 0.0
}

/// Append a `p1_<kind>_<value>` / `p2_<kind>_<value>` pair per vocabulary member.
fn push_one_hot<'a, F>(
    out: &mut Vec<(String, bool)>,
    kind: &str,
    vocab: &BTreeSet<String>,
    battle: &'a BattleRecord,
    observed: F,
) where
    F: Fn(&'a BattleRecord, Side) -> BTreeSet<&'a str>,
{
    let p1 = observed(battle, Side::P1);
    let p2 = observed(battle, Side::P2);
    for value in vocab {
        out.push((format!("p1_{kind}_{value}"), p1.contains(value.as_str())));
        out.push((format!("p2_{kind}_{value}"), p2.contains(value.as_str())));
    }
}

fn observed_types(battle: &BattleRecord, side: Side) -> BTreeSet<&str> {
    battle.moves(side).map(|m| m.move_type.as_str()).collect()
}

fn observed_categories(battle: &BattleRecord, side: Side) -> BTreeSet<&str> {
    battle.moves(side).map(|m| m.category.as_str()).collect()
}

fn observed_names(battle: &BattleRecord, side: Side) -> BTreeSet<&str> {
    battle.states(side).map(|s| s.name.as_str()).collect()
}

fn observed_statuses(battle: &BattleRecord, side: Side) -> BTreeSet<&str> {
    battle.states(side).map(PokemonState::status_label).collect()
}

fn observed_effects(battle: &BattleRecord, side: Side) -> BTreeSet<&str> {
    battle.states(side).filter_map(PokemonState::primary_effect).collect()
}

impl BattleFeatures {
    pub fn extract(battle: &BattleRecord, vocab: &Vocabulary, options: &FeatureOptions) -> Self {
        let team = &battle.p1_team_details;
        let p1_mins = min_hp_pct(battle, Side::P1);
        let p2_mins = min_hp_pct(battle, Side::P2);
        let p2_seen = p2_roster(battle);

        let mut p1_ko = [false; TEAM_SIZE];
        for (slot, p) in p1_ko.iter_mut().zip(team) {
            *slot = knocked_out(lowest_hp(&p1_mins, &p.name));
        }

        let p2_ko = match options.ko_encoding {
            KoEncoding::Any => P2Knockouts::Any(
                p2_seen
                    .iter()
                    .any(|name| knocked_out(lowest_hp(&p2_mins, name))),
            ),
            KoEncoding::PerSlot => {
                let mut slots = [false; TEAM_SIZE];
                for (slot, name) in slots.iter_mut().zip(&p2_seen) {
                    *slot = knocked_out(lowest_hp(&p2_mins, name));
                }
                P2Knockouts::PerSlot(slots)
            }
        };

        let p1_mean_hp_pct = mean(team.iter().map(|p| lowest_hp(&p1_mins, &p.name)));
        let p2_mean_hp_pct = mean(p2_seen.iter().map(|name| lowest_hp(&p2_mins, name)));
        let p1_total_dmg_taken = mean(team.iter().map(|p| {
            let hp = f64::from(p.base_hp);
            hp - hp * lowest_hp(&p1_mins, &p.name)
        }));

        let mut one_hot = Vec::new();
        push_one_hot(&mut one_hot, "type", &vocab.move_types, battle, observed_types);
        push_one_hot(&mut one_hot, "pokemon", &vocab.pokemon_names, battle, observed_names);
        push_one_hot(&mut one_hot, "category", &vocab.categories, battle, observed_categories);
        push_one_hot(&mut one_hot, "status", &vocab.statuses, battle, observed_statuses);
        if options.include_effects {
            push_one_hot(&mut one_hot, "effect", &vocab.effects, battle, observed_effects);
        }

        BattleFeatures {
            battle_id: battle.battle_id.clone(),
            player_won: battle.player_won,
            p1_mean_stats: BaseStats::mean(team),
            p2_lead_stats: BaseStats::of(&battle.p2_lead_details),
            p1_ko,
            p2_ko,
            p1_mean_hp_pct,
            p2_mean_hp_pct,
            p1_total_dmg_taken,
            p1: SideFeatures::extract(battle, Side::P1),
            p2: SideFeatures::extract(battle, Side::P2),
            one_hot,
        }
    }

    /// Flatten into named columns. Id and label are not part of the output.
    pub fn columns(&self) -> Vec<(String, FeatureValue)> {
        use FeatureValue::{Flag, Number};

        let mut cols: Vec<(String, FeatureValue)> = Vec::new();

        let p1_stats = self.p1_mean_stats.map(|s| s.named());
        for (idx, (stat, lead)) in self.p2_lead_stats.named().into_iter().enumerate() {
            let p1 = p1_stats.map(|s| s[idx].1);
            cols.push((format!("p1_mean_{stat}"), Number(p1)));
            cols.push((format!("p2_lead_{stat}"), Number(Some(lead))));
        }

        for (idx, ko) in self.p1_ko.iter().enumerate() {
            cols.push((format!("p1_pokemon_{idx}_KOd"), Flag(*ko)));
        }
        match self.p2_ko {
            P2Knockouts::Any(any) => cols.push(("p2_pokemon_last_KOd".to_string(), Flag(any))),
            P2Knockouts::PerSlot(slots) => {
                for (idx, ko) in slots.iter().enumerate() {
                    cols.push((format!("p2_pokemon_{idx}_KOd"), Flag(*ko)));
                }
            }
        }

        cols.push(("p1_mean_hp_pct".to_string(), Number(self.p1_mean_hp_pct)));
        cols.push(("p2_mean_hp_pct".to_string(), Number(self.p2_mean_hp_pct)));
        cols.push(("p1_total_dmg_taken".to_string(), Number(self.p1_total_dmg_taken)));

        let sides = [(Side::P1, &self.p1), (Side::P2, &self.p2)];
        for (side, f) in sides {
            cols.push((format!("{}_mean_boosts", side.prefix()), Number(f.mean_boosts)));
        }
        for (side, f) in sides {
            for (stat, flag) in BoostStat::ALL.iter().zip(f.boost_flags) {
                cols.push((
                    format!("{}_mean_boost_{}_OHE", side.prefix(), stat.name()),
                    Flag(flag),
                ));
            }
        }
        for (side, f) in sides {
            cols.push((format!("{}_mean_accuracy_OHE", side.prefix()), Flag(f.accurate)));
        }

        cols.extend(self.one_hot.iter().map(|(name, v)| (name.clone(), Flag(*v))));

        for (side, f) in sides {
            cols.push((
                format!("{}_mean_move_base_power", side.prefix()),
                Number(f.mean_move_base_power),
            ));
        }
        for (side, f) in sides {
            cols.push((
                format!("{}_no_of_moves", side.prefix()),
                Number(Some(f.no_of_moves as f64)),
            ));
        }

        cols
    }
}
