//! Simulation configuration and the fixed sensor/action vocabulary.

use petri_brain::NetParams;
use petri_index::{GridPos, GridSize, Rect};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::organism::Organism;

/// Number of sensor channels wired into every net.
pub const SENSOR_COUNT: usize = 7;
/// Number of action channels read out of every net.
pub const ACTION_COUNT: usize = 6;

/// Sensor channels, in input-neuron index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sensor {
    /// X position normalized by world width.
    WorldX = 0,
    /// Y position normalized by world height.
    WorldY = 1,
    /// Fraction of the generation elapsed.
    Age = 2,
    /// 1.0 when the organism collided during the previous step.
    CollidedLastStep = 3,
    /// Current energy level.
    Energy = 4,
    /// 1.0 when a living organism occupied the cell one step ahead
    /// (along the current facing) at the end of the previous step.
    OrganismAhead = 5,
    /// Proximity to the nearest world edge, 1.0 at an edge.
    EdgeProximity = 6,
}

/// Action channels, in output-neuron index order. Every channel is
/// gated at |state| >= 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Move +x when positive, -x when negative.
    MoveX = 0,
    /// Move +y when positive, -y when negative.
    MoveY = 1,
    /// Jitter one cell diagonally in a random direction.
    MoveRandom = 2,
    /// Move along the facing when positive, opposite it when negative.
    MoveForward = 3,
    /// Turn left when negative, right when positive.
    Turn = 4,
    /// Turn left or right at random.
    TurnRandom = 5,
}

/// Survival predicate applied to each living organism at generation end.
pub type SelectionPredicate = fn(&Organism, &SimulationConfig) -> bool;

fn everyone_survives(_org: &Organism, _config: &SimulationConfig) -> bool {
    true
}

fn default_selector() -> SelectionPredicate {
    everyone_survives
}

/// Errors from configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("world dimensions must be non-zero (got {width}x{height})")]
    ZeroWorld { width: u16, height: u16 },
    #[error("population must be at least 2 (got {0})")]
    PopulationTooSmall(u32),
    #[error("organisms need at least one gene")]
    NoGenes,
    #[error("steps_per_generation must be at least 1")]
    NoSteps,
    #[error("max_generations must be at least 1")]
    NoGenerations,
    #[error("mutation_rate must lie in [0, 1] (got {0})")]
    MutationRateOutOfRange(f32),
    #[error("energy rates must be finite and non-negative (got {0})")]
    BadEnergyRate(f32),
    #[error("population {population} does not fit the {free_cells} unobstructed cells")]
    Overcrowded { population: u32, free_cells: usize },
    #[error(transparent)]
    Net(#[from] petri_brain::BuildError),
    #[error(transparent)]
    Index(#[from] petri_index::IndexError),
}

/// Everything that shapes a run. Seeded runs are bit-reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// World extent in cells.
    pub world: GridSize,
    /// RNG seed; `None` draws one from OS entropy.
    pub seed: Option<u64>,
    /// Organisms per generation. Fixed across the whole run.
    pub population: u32,
    /// Genes in each first-generation genome.
    pub genes_per_organism: u8,
    /// Steps simulated before selection fires.
    pub steps_per_generation: u32,
    /// Hard stop after this many generations.
    pub max_generations: u32,
    /// Probability that an offspring receives a one-bit mutation.
    pub mutation_rate: f32,
    /// Energy debited on any step with movement.
    pub energy_to_move: f32,
    /// Energy credited on any step without movement.
    pub energy_to_rest: f32,
    /// Internal neuron slots available to every net.
    pub max_internal_neurons: u8,
    /// Impassable rectangles. Organisms never occupy these cells.
    pub obstacles: Vec<Rect>,
    /// Survival predicate. Not serialized; defaults to everyone-survives.
    #[serde(skip, default = "default_selector")]
    pub selector: SelectionPredicate,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world: GridSize::new(128, 128),
            seed: None,
            population: 1000,
            genes_per_organism: 12,
            steps_per_generation: 150,
            max_generations: 100,
            mutation_rate: 0.01,
            energy_to_move: 0.01,
            energy_to_rest: 0.01,
            max_internal_neurons: 2,
            obstacles: Vec::new(),
            selector: everyone_survives,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.width == 0 || self.world.height == 0 {
            return Err(ConfigError::ZeroWorld {
                width: self.world.width,
                height: self.world.height,
            });
        }
        if self.population < 2 {
            return Err(ConfigError::PopulationTooSmall(self.population));
        }
        if self.genes_per_organism == 0 {
            return Err(ConfigError::NoGenes);
        }
        if self.steps_per_generation == 0 {
            return Err(ConfigError::NoSteps);
        }
        if self.max_generations == 0 {
            return Err(ConfigError::NoGenerations);
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::MutationRateOutOfRange(self.mutation_rate));
        }
        for &rate in [self.energy_to_move, self.energy_to_rest].iter() {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ConfigError::BadEnergyRate(rate));
            }
        }
        self.net_params()?;
        let free = self.free_cell_count();
        if self.population as usize > free {
            return Err(ConfigError::Overcrowded {
                population: self.population,
                free_cells: free,
            });
        }
        Ok(())
    }

    /// Net shape implied by the fixed sensor/action channels and the
    /// configured internal budget.
    pub fn net_params(&self) -> Result<NetParams, ConfigError> {
        Ok(NetParams::new(
            SENSOR_COUNT as u8,
            ACTION_COUNT as u8,
            self.max_internal_neurons,
        )?)
    }

    /// Whether `pos` lies inside any obstacle rectangle.
    #[must_use]
    pub fn is_obstructed(&self, pos: GridPos) -> bool {
        self.obstacles.iter().any(|rect| rect.contains(pos))
    }

    /// Cells that organisms may occupy.
    #[must_use]
    pub fn free_cell_count(&self) -> usize {
        let mut free = 0;
        for y in 0..self.world.height as i16 {
            for x in 0..self.world.width as i16 {
                if !self.is_obstructed(GridPos::new(x, y)) {
                    free += 1;
                }
            }
        }
        free
    }

    /// RNG for a run: seeded when `seed` is set, entropy otherwise.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        }
    }
}
