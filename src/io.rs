// Module for loading the battle logs. It reads the jsonl files, validates every record, and fails on the first bad one.
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BattleError, Result};

/// Largest team a player can bring.
pub const TEAM_SIZE: usize = 6;

/// Label used for a `null` status.
pub const NO_STATUS: &str = "null";

/// Battle identifiers are integers in the competition files; strings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BattleId {
    Number(i64),
    Text(String),
}

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattleId::Number(n) => write!(f, "{}", n),
            BattleId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Which player a piece of the timeline belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    P1,
    P2,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::P1, Side::P2];

    /// Column prefix for this side.
    pub fn prefix(self) -> &'static str {
        match self {
            Side::P1 => "p1",
            Side::P2 => "p2",
        }
    }
}

/// The key must be present, but its value may be `null`.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// Static description of a creature: name, level and base stats.
#[derive(Debug, Clone, Deserialize)]
pub struct PokemonDetails {
    pub name: String,
    pub level: u32,
    pub base_hp: u32,
    pub base_atk: u32,
    pub base_def: u32,
    pub base_spa: u32,
    pub base_spd: u32,
    pub base_spe: u32,
}

/// Stats that can carry a boost stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostStat {
    Atk,
    Def,
    Spa,
    Spd,
    Spe,
}

impl BoostStat {
    pub const ALL: [BoostStat; 5] = [
        BoostStat::Atk,
        BoostStat::Def,
        BoostStat::Spa,
        BoostStat::Spd,
        BoostStat::Spe,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BoostStat::Atk => "atk",
            BoostStat::Def => "def",
            BoostStat::Spa => "spa",
            BoostStat::Spd => "spd",
            BoostStat::Spe => "spe",
        }
    }
}

/// Boost stages of the active creature; stages may be negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Boosts {
    pub atk: i32,
    pub def: i32,
    pub spa: i32,
    pub spd: i32,
    pub spe: i32,
}

impl Boosts {
    pub fn get(&self, stat: BoostStat) -> i32 {
        match stat {
            BoostStat::Atk => self.atk,
            BoostStat::Def => self.def,
            BoostStat::Spa => self.spa,
            BoostStat::Spd => self.spd,
            BoostStat::Spe => self.spe,
        }
    }

    pub fn total(&self) -> i32 {
        BoostStat::ALL.iter().map(|&s| self.get(s)).sum()
    }
}

/// Snapshot of one side's active creature at the end of a turn.
#[derive(Debug, Clone, Deserialize)]
pub struct PokemonState {
    pub name: String,
    pub hp_pct: f64,
    #[serde(deserialize_with = "nullable")]
    pub status: Option<String>,
    pub effects: Vec<String>,
    pub boosts: Boosts,
}

impl PokemonState {
    /// Only the first listed effect is ever looked at.
    pub fn primary_effect(&self) -> Option<&str> {
        self.effects.first().map(String::as_str)
    }

    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or(NO_STATUS)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveDetails {
    #[serde(rename = "type")]
    pub move_type: String,
    pub category: String,
    pub accuracy: f64,
    pub base_power: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Turn {
    pub p1_pokemon_state: PokemonState,
    pub p2_pokemon_state: PokemonState,
    #[serde(deserialize_with = "nullable")]
    pub p1_move_details: Option<MoveDetails>,
    #[serde(deserialize_with = "nullable")]
    pub p2_move_details: Option<MoveDetails>,
}

impl Turn {
    pub fn state(&self, side: Side) -> &PokemonState {
        match side {
            Side::P1 => &self.p1_pokemon_state,
            Side::P2 => &self.p2_pokemon_state,
        }
    }

    /// `None` when that side did not act this turn.
    pub fn move_details(&self, side: Side) -> Option<&MoveDetails> {
        match side {
            Side::P1 => self.p1_move_details.as_ref(),
            Side::P2 => self.p2_move_details.as_ref(),
        }
    }
}

/// One logged battle. `player_won` is only present in training data.
#[derive(Debug, Clone, Deserialize)]
pub struct BattleRecord {
    pub battle_id: BattleId,
    pub p1_team_details: Vec<PokemonDetails>,
    pub p2_lead_details: PokemonDetails,
    pub battle_timeline: Vec<Turn>,
    #[serde(default)]
    pub player_won: Option<bool>,
}

impl BattleRecord {
    /// Parse a single json line. Missing fields are reported by name.
    pub fn from_json(line: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| BattleError::InvalidRecord {
            battle_id: self.battle_id.to_string(),
            message,
        };

        if self.p1_team_details.len() > TEAM_SIZE {
            return Err(invalid(format!(
                "p1_team_details holds {} creatures, at most {} allowed",
                self.p1_team_details.len(),
                TEAM_SIZE
            )));
        }
        for (idx, turn) in self.battle_timeline.iter().enumerate() {
            for side in Side::BOTH {
                if turn.state(side).effects.is_empty() {
                    return Err(invalid(format!(
                        "turn {} has an empty effects list for {}",
                        idx + 1,
                        side.prefix()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Iterate the moves one side made, skipping turns where it did not act.
    pub fn moves(&self, side: Side) -> impl Iterator<Item = &MoveDetails> {
        self.battle_timeline
            .iter()
            .filter_map(move |turn| turn.move_details(side))
    }

    pub fn states(&self, side: Side) -> impl Iterator<Item = &PokemonState> {
        self.battle_timeline.iter().map(move |turn| turn.state(side))
    }
}

/// Read a jsonl file of battle records. Blank lines are skipped, anything else must parse.
pub fn load_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<BattleRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record = BattleRecord::from_json(&line).map_err(|source| {
            BattleError::MalformedRecord {
                path: path.display().to_string(),
                line: idx + 1,
                source,
            }
        })?;
        record.validate()?;
        out.push(record);
    }

    log::info!("Loaded {} battles from {}", out.len(), path.display());
    Ok(out)
}

/// `<prefix>/input/<competition>` holds `train.jsonl` and `test.jsonl`.
pub fn competition_dir(prefix: &str, competition: &str) -> PathBuf {
    Path::new(prefix).join("input").join(competition)
}

pub fn get_train_test(
    prefix: &str,
    competition: &str,
) -> Result<(Vec<BattleRecord>, Vec<BattleRecord>)> {
    let dir = competition_dir(prefix, competition);
    let train = load_jsonl(dir.join("train.jsonl"))?;
    let test = load_jsonl(dir.join("test.jsonl"))?;
    Ok((train, test))
}
