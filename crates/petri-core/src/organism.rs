//! The organism: genome, grown net, and per-step vital state.

use std::fmt;

use petri_brain::{Genome, NeuralNet};
use petri_index::{Direction, GridPos};
use serde::{Deserialize, Serialize};

/// Identity of an organism within its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganismId(pub u32);

impl fmt::Display for OrganismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One simulated creature. Owns its genome and the net grown from it.
#[derive(Debug, Clone)]
pub struct Organism {
    pub id: OrganismId,
    pub pos: GridPos,
    pub facing: Direction,
    /// Energy in [0, 1]. Reaching 0 is death.
    pub energy: f32,
    pub alive: bool,
    /// Set when collision resolution deflected this organism during the
    /// current step; feeds the collision sensor on the next step.
    pub collided: bool,
    /// Generation-local ids of the parents, `None` for the seeded
    /// first generation.
    pub parents: Option<(OrganismId, OrganismId)>,
    /// Whether this organism's genome received a mutation at birth.
    pub mutated: bool,
    pub genome: Genome,
    pub net: NeuralNet,
}

impl Organism {
    #[must_use]
    pub fn new(id: OrganismId, genome: Genome, net: NeuralNet, pos: GridPos, facing: Direction) -> Self {
        Self {
            id,
            pos,
            facing,
            energy: 1.0,
            alive: true,
            collided: false,
            parents: None,
            mutated: false,
            genome,
            net,
        }
    }

    #[must_use]
    pub fn with_parents(mut self, a: OrganismId, b: OrganismId, mutated: bool) -> Self {
        self.parents = Some((a, b));
        self.mutated = mutated;
        self
    }

    /// Deep copy of the observable state, detached from genome and net.
    #[must_use]
    pub fn snapshot(&self) -> OrganismSnapshot {
        OrganismSnapshot {
            id: self.id,
            pos: self.pos,
            facing: self.facing,
            energy: self.energy,
            alive: self.alive,
            collided: self.collided,
            parents: self.parents,
            mutated: self.mutated,
        }
    }
}

/// Published view of one organism, safe to ship across threads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrganismSnapshot {
    pub id: OrganismId,
    pub pos: GridPos,
    pub facing: Direction,
    pub energy: f32,
    pub alive: bool,
    pub collided: bool,
    pub parents: Option<(OrganismId, OrganismId)>,
    pub mutated: bool,
}
