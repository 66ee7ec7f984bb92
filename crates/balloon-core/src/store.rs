//! Balloon store
//!
//! The authoritative list of balloons for the loaded document. Positions
//! are kept in document space only; pixel positions are always derived.
//! Every placement or move stamps the balloon with a fresh generation so
//! resolution results can be matched to the request that produced them.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::coords::DocPoint;
use crate::registry::TypeRegistry;

pub type BalloonId = u32;
pub type Generation = u64;

lazy_static! {
    /// Integer or decimal token such as "14" or "7.72"
    static ref NUMBER: Regex = Regex::new(r"\d+(?:\.\d+)?").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Pending,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balloon {
    pub id: BalloonId,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: DocPoint,
    /// Nearby text candidates, most relevant first
    pub resolution: Vec<String>,
    /// User override used instead of the candidates on export
    pub label: Option<String>,
    pub status: ResolutionStatus,
    generation: Generation,
}

impl Balloon {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Candidates as shown in the balloon list
    pub fn display_text(&self) -> String {
        self.resolution.join(", ")
    }

    /// Text written into reports: the user label, else the joined
    /// candidates, else a placeholder naming the balloon
    pub fn export_text(&self, separator: &str) -> String {
        if let Some(label) = self.label.as_deref().filter(|l| !l.trim().is_empty()) {
            return label.to_string();
        }
        if self.resolution.is_empty() {
            return format!("Balloon {}", self.id);
        }
        self.resolution.join(separator)
    }

    /// First numeric token among the candidates
    pub fn suggested_value(&self) -> Option<String> {
        self.resolution
            .iter()
            .find_map(|text| NUMBER.find(text))
            .map(|m| m.as_str().to_string())
    }

    pub fn record(&self) -> BalloonRecord {
        BalloonRecord {
            id: self.id,
            kind: self.kind.clone(),
            nx: self.position.nx,
            ny: self.position.ny,
            resolution: self.resolution.clone(),
            label: self.label.clone(),
            suggested: self.suggested_value(),
            status: self.status,
        }
    }
}

/// Flat per-balloon record handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalloonRecord {
    pub id: BalloonId,
    #[serde(rename = "type")]
    pub kind: String,
    pub nx: f64,
    pub ny: f64,
    pub resolution: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Default value for the mapping row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested: Option<String>,
    pub status: ResolutionStatus,
}

/// Result of merging a resolution into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// The balloon moved after the request was issued
    Stale { current: Generation },
    /// The balloon no longer exists
    Missing,
}

#[derive(Debug, Clone)]
pub struct BalloonStore {
    next_id: BalloonId,
    next_generation: Generation,
    balloons: Vec<Balloon>,
    types: TypeRegistry,
}

impl Default for BalloonStore {
    fn default() -> Self {
        Self::new(TypeRegistry::default())
    }
}

impl BalloonStore {
    pub fn new(types: TypeRegistry) -> Self {
        Self {
            next_id: 1,
            next_generation: 1,
            balloons: Vec::new(),
            types,
        }
    }

    fn stamp(&mut self) -> Generation {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// Appends a new pending balloon. The position is clamped into the page.
    pub fn place(&mut self, kind: impl Into<String>, position: DocPoint) -> &Balloon {
        let id = self.next_id;
        self.next_id += 1;
        let generation = self.stamp();

        self.balloons.push(Balloon {
            id,
            kind: kind.into(),
            position: position.clamped(),
            resolution: Vec::new(),
            label: None,
            status: ResolutionStatus::Pending,
            generation,
        });
        &self.balloons[self.balloons.len() - 1]
    }

    /// Moves a balloon in place and supersedes any outstanding resolution.
    /// Returns the new generation, or `None` if `id` is unknown.
    pub fn move_to(&mut self, id: BalloonId, position: DocPoint) -> Option<Generation> {
        let generation = self.stamp();
        let balloon = self.balloons.iter_mut().find(|b| b.id == id)?;
        balloon.position = position.clamped();
        balloon.resolution.clear();
        balloon.status = ResolutionStatus::Pending;
        balloon.generation = generation;
        Some(generation)
    }

    pub fn relabel(&mut self, id: BalloonId, kind: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(balloon) => {
                balloon.kind = kind.into();
                true
            }
            None => false,
        }
    }

    /// Sets or clears the user's export label
    pub fn set_label(&mut self, id: BalloonId, label: Option<String>) -> bool {
        match self.get_mut(id) {
            Some(balloon) => {
                balloon.label = label;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: BalloonId) -> bool {
        if let Some(pos) = self.balloons.iter().position(|b| b.id == id) {
            self.balloons.remove(pos);
            true
        } else {
            false
        }
    }

    /// Drops every balloon and restarts numbering at 1. Generations keep
    /// counting so results issued before the reset can never match.
    pub fn reset_all(&mut self) {
        self.balloons.clear();
        self.next_id = 1;
    }

    pub fn add_custom_type(&mut self, label: impl Into<String>) -> bool {
        self.types.add(label)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn get(&self, id: BalloonId) -> Option<&Balloon> {
        self.balloons.iter().find(|b| b.id == id)
    }

    fn get_mut(&mut self, id: BalloonId) -> Option<&mut Balloon> {
        self.balloons.iter_mut().find(|b| b.id == id)
    }

    /// Balloons in insertion order
    pub fn balloons(&self) -> &[Balloon] {
        &self.balloons
    }

    pub fn len(&self) -> usize {
        self.balloons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balloons.is_empty()
    }

    pub fn snapshot(&self) -> Vec<BalloonRecord> {
        self.balloons.iter().map(Balloon::record).collect()
    }

    fn current_mut(
        &mut self,
        id: BalloonId,
        generation: Generation,
    ) -> Result<&mut Balloon, MergeOutcome> {
        let balloon = self.get_mut(id).ok_or(MergeOutcome::Missing)?;
        if balloon.generation != generation {
            return Err(MergeOutcome::Stale {
                current: balloon.generation,
            });
        }
        Ok(balloon)
    }

    /// Stores candidates if `generation` is still the balloon's latest
    pub fn merge_resolution(
        &mut self,
        id: BalloonId,
        generation: Generation,
        candidates: Vec<String>,
    ) -> MergeOutcome {
        match self.current_mut(id, generation) {
            Ok(balloon) => {
                balloon.resolution = candidates;
                balloon.status = ResolutionStatus::Resolved;
                MergeOutcome::Applied
            }
            Err(outcome) => outcome,
        }
    }

    /// Records a failed resolution; the candidates stay empty
    pub fn merge_failure(&mut self, id: BalloonId, generation: Generation) -> MergeOutcome {
        match self.current_mut(id, generation) {
            Ok(balloon) => {
                balloon.resolution.clear();
                balloon.status = ResolutionStatus::Failed;
                MergeOutcome::Applied
            }
            Err(outcome) => outcome,
        }
    }
}
