//! The generation loop: sensing, acting, collision resolution,
//! selection, and reproduction.
//!
//! Each step runs every organism once against two occupancy tables: the
//! previous step's fully resolved table (read-only, feeds sensing) and
//! the current step's table, filled as organisms resolve in slot order.
//! Collisions are therefore only ever against already-resolved
//! positions, and the tables swap once the whole population has
//! resolved.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

use petri_brain::{Genome, NetParams, NeuralNet};
use petri_index::{Direction, GridPos, GridSize, OccupancyGrid};
use rand::rngs::SmallRng;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::arena::GenerationArena;
use crate::config::{Action, ConfigError, Sensor, SimulationConfig, ACTION_COUNT, SENSOR_COUNT};
use crate::organism::{Organism, OrganismId, OrganismSnapshot};
use crate::sync::{FramePhase, SimHandle};

const HISTORY_LIMIT: usize = 128;
const AO10_WINDOW: usize = 10;

/// Outcome of one generation, logged and retained in the history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationStats {
    pub generation: u32,
    pub population: u32,
    pub survivors: u32,
    pub dead_before_selection: u32,
    pub dead_after_selection: u32,
    /// Percentage of the population that passed selection.
    pub survival_rate: f32,
    /// Moving average of `survival_rate` over the last ten generations.
    pub survival_rate_ao10: f32,
}

/// One full simulation run. Owns all world state; runs on one thread
/// and publishes snapshots through its [`SimHandle`].
pub struct Simulation {
    config: SimulationConfig,
    params: NetParams,
    rng: SmallRng,
    current: GenerationArena,
    next: GenerationArena,
    prev_table: OccupancyGrid<u16>,
    curr_table: OccupancyGrid<u16>,
    generation: u32,
    recent_rates: VecDeque<f32>,
    history: VecDeque<GenerationStats>,
    handle: Arc<SimHandle>,
}

impl Simulation {
    pub fn new(config: SimulationConfig, handle: Arc<SimHandle>) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = config.net_params()?;
        let rng = config.seeded_rng();
        let budget = config.population as usize;
        let prev_table = OccupancyGrid::new(config.world)?;
        let curr_table = OccupancyGrid::new(config.world)?;
        Ok(Self {
            config,
            params,
            rng,
            current: GenerationArena::with_budget(budget),
            next: GenerationArena::with_budget(budget),
            prev_table,
            curr_table,
            generation: 0,
            recent_rates: VecDeque::with_capacity(AO10_WINDOW),
            history: VecDeque::with_capacity(HISTORY_LIMIT),
            handle,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn organisms(&self) -> &[Organism] {
        self.current.organisms()
    }

    #[must_use]
    pub fn history(&self) -> &VecDeque<GenerationStats> {
        &self.history
    }

    /// Deep-copied observable state of the whole population.
    #[must_use]
    pub fn snapshot(&self) -> Vec<OrganismSnapshot> {
        self.current.organisms().iter().map(Organism::snapshot).collect()
    }

    /// Populate generation 0 with random organisms on distinct free
    /// cells.
    pub fn seed_population(&mut self) {
        self.current.reset();
        self.curr_table.clear();
        self.generation = 0;
        for i in 0..self.config.population {
            let genome = Genome::random(&mut self.rng, self.config.genes_per_organism as usize);
            let net = NeuralNet::build(&genome, self.params);
            let pos = place_randomly(&mut self.rng, &self.config, &self.curr_table);
            let facing = Direction::random(&mut self.rng);
            let slot = self.current.len() as u16;
            self.current
                .alloc(Organism::new(OrganismId(i), genome, net, pos, facing));
            self.curr_table.insert(pos, slot);
        }
        mem::swap(&mut self.prev_table, &mut self.curr_table);
    }

    /// Run every organism for one step and swap the occupancy tables.
    pub fn run_step(&mut self, step: u32) {
        self.curr_table.clear();
        let organisms = self.current.organisms_mut();
        for slot in 0..organisms.len() {
            step_organism(
                &mut organisms[slot],
                slot as u16,
                step,
                &self.config,
                &self.prev_table,
                &mut self.curr_table,
                &mut self.rng,
            );
        }
        mem::swap(&mut self.prev_table, &mut self.curr_table);
    }

    /// Kill every living organism the selector rejects and record the
    /// generation's stats.
    pub fn apply_selection(&mut self) -> GenerationStats {
        let mut survivors = 0u32;
        let mut dead_before = 0u32;
        let mut dead_after = 0u32;
        let selector = self.config.selector;
        for org in self.current.organisms_mut() {
            if !org.alive {
                dead_before += 1;
                continue;
            }
            if selector(org, &self.config) {
                survivors += 1;
            } else {
                org.alive = false;
                dead_after += 1;
            }
        }

        let survival_rate = survivors as f32 * 100.0 / self.config.population as f32;
        if self.recent_rates.len() == AO10_WINDOW {
            self.recent_rates.pop_front();
        }
        self.recent_rates.push_back(survival_rate);
        let ao10 = self.recent_rates.iter().sum::<f32>() / self.recent_rates.len() as f32;

        let stats = GenerationStats {
            generation: self.generation,
            population: self.config.population,
            survivors,
            dead_before_selection: dead_before,
            dead_after_selection: dead_after,
            survival_rate,
            survival_rate_ao10: ao10,
        };
        info!(
            generation = stats.generation,
            survivors = stats.survivors,
            population = stats.population,
            survival_rate = stats.survival_rate,
            ao10 = stats.survival_rate_ao10,
            dead_before = stats.dead_before_selection,
            dead_after = stats.dead_after_selection,
            "generation complete"
        );
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(stats);
        stats
    }

    /// Breed the next generation from the survivors and swap it in.
    /// Requires at least two living organisms.
    pub fn reproduce(&mut self) {
        self.next.reset();
        self.curr_table.clear();
        for i in 0..self.config.population {
            let (a, b) = find_mates(&mut self.rng, self.current.organisms());
            let parent_a = &self.current.organisms()[a];
            let parent_b = &self.current.organisms()[b];
            let mut genome = Genome::crossover(&mut self.rng, &parent_a.genome, &parent_b.genome);
            let parent_ids = (parent_a.id, parent_b.id);
            let mutated = genome.mutate(&mut self.rng, self.config.mutation_rate);
            let net = NeuralNet::build(&genome, self.params);
            let pos = place_randomly(&mut self.rng, &self.config, &self.curr_table);
            let facing = Direction::random(&mut self.rng);
            let slot = self.next.len() as u16;
            self.next.alloc(
                Organism::new(OrganismId(i), genome, net, pos, facing)
                    .with_parents(parent_ids.0, parent_ids.1, mutated),
            );
            self.curr_table.insert(pos, slot);
        }
        mem::swap(&mut self.current, &mut self.next);
        mem::swap(&mut self.prev_table, &mut self.curr_table);
        self.generation += 1;
    }

    /// Run to completion: either `max_generations` elapse, the
    /// population collapses to one or zero survivors, or the handle is
    /// cancelled.
    pub fn run(&mut self) {
        let handle = Arc::clone(&self.handle);
        handle.wait_observer_ready();
        if handle.is_interrupted() {
            handle.mark_finished();
            return;
        }

        self.seed_population();
        loop {
            handle.publish(
                FramePhase::GenerationStart,
                self.generation,
                0,
                self.snapshot(),
            );
            let mut aborted = false;
            for step in 0..self.config.steps_per_generation {
                handle.publish(FramePhase::Step, self.generation, step, self.snapshot());
                if handle.is_interrupted() {
                    aborted = true;
                    break;
                }
                self.run_step(step);
            }
            if aborted || handle.is_interrupted() {
                break;
            }

            let stats = self.apply_selection();
            handle.publish(
                FramePhase::GenerationEnd,
                self.generation,
                self.config.steps_per_generation,
                self.snapshot(),
            );
            if handle.is_interrupted() {
                break;
            }
            if stats.survivors <= 1 {
                info!(
                    generation = self.generation,
                    survivors = stats.survivors,
                    "population collapsed, stopping"
                );
                break;
            }
            if self.generation + 1 >= self.config.max_generations {
                break;
            }
            self.reproduce();
        }
        handle.mark_finished();
    }
}

/// Proximity to the nearest world edge: 1.0 on an edge cell, falling
/// towards 0 at the world center along the closer axis.
fn edge_proximity(pos: GridPos, world: GridSize) -> f32 {
    let half_w = i32::from(world.width) / 2;
    let half_h = i32::from(world.height) / 2;
    let near_x = half_w - (half_w - i32::from(pos.x)).abs();
    let near_y = half_h - (half_h - i32::from(pos.y)).abs();
    if near_x < near_y {
        1.0 - 2.0 * near_x as f32 / f32::from(world.width)
    } else {
        1.0 - 2.0 * near_y as f32 / f32::from(world.height)
    }
}

/// Uniformly random cell that the placement table has not claimed and
/// no obstacle covers. Config validation guarantees one exists.
fn place_randomly(
    rng: &mut SmallRng,
    config: &SimulationConfig,
    placed: &OccupancyGrid<u16>,
) -> GridPos {
    loop {
        let pos = GridPos::new(
            rng.gen_range(0..config.world.width as i16),
            rng.gen_range(0..config.world.height as i16),
        );
        if !placed.is_occupied(pos) && !config.is_obstructed(pos) {
            return pos;
        }
    }
}

/// Two distinct living mates, by rejection sampling.
fn find_mates(rng: &mut SmallRng, organisms: &[Organism]) -> (usize, usize) {
    let living = organisms.iter().filter(|o| o.alive).count();
    assert!(
        living >= 2,
        "mate selection requires at least two living organisms (have {living})"
    );
    let a = loop {
        let i = rng.gen_range(0..organisms.len());
        if organisms[i].alive {
            break i;
        }
    };
    let b = loop {
        let i = rng.gen_range(0..organisms.len());
        if organisms[i].alive && i != a {
            break i;
        }
    };
    (a, b)
}

/// Sense, think, act, and resolve one organism. Dead organisms do
/// nothing and are never indexed.
fn step_organism(
    org: &mut Organism,
    slot: u16,
    step: u32,
    config: &SimulationConfig,
    prev: &OccupancyGrid<u16>,
    current: &mut OccupancyGrid<u16>,
    rng: &mut SmallRng,
) {
    if !org.alive {
        return;
    }
    let start_pos = org.pos;
    let collided_last_step = org.collided;
    org.collided = false;

    let mut sensors = [0.0f32; SENSOR_COUNT];
    sensors[Sensor::WorldX as usize] = org.pos.x as f32 / f32::from(config.world.width);
    sensors[Sensor::WorldY as usize] = org.pos.y as f32 / f32::from(config.world.height);
    sensors[Sensor::Age as usize] = step as f32 / config.steps_per_generation as f32;
    sensors[Sensor::CollidedLastStep as usize] = if collided_last_step { 1.0 } else { 0.0 };
    sensors[Sensor::Energy as usize] = org.energy;
    sensors[Sensor::OrganismAhead as usize] = if prev.is_occupied(org.pos.step(org.facing)) {
        1.0
    } else {
        0.0
    };
    sensors[Sensor::EdgeProximity as usize] = edge_proximity(org.pos, config.world);

    let mut actions = [0.0f32; ACTION_COUNT];
    org.net.step(&sensors, &mut actions);

    let mut moved = false;
    let level = actions[Action::MoveX as usize];
    if level >= 0.5 {
        org.pos.x += 1;
        moved = true;
    } else if level <= -0.5 {
        org.pos.x -= 1;
        moved = true;
    }
    let level = actions[Action::MoveY as usize];
    if level >= 0.5 {
        org.pos.y += 1;
        moved = true;
    } else if level <= -0.5 {
        org.pos.y -= 1;
        moved = true;
    }
    let level = actions[Action::MoveRandom as usize];
    if level.abs() >= 0.5 {
        org.pos.x += if rng.gen_bool(0.5) { -1 } else { 1 };
        org.pos.y += if rng.gen_bool(0.5) { -1 } else { 1 };
        moved = true;
    }
    let level = actions[Action::MoveForward as usize];
    if level >= 0.5 {
        org.pos = org.pos.step(org.facing);
        moved = true;
    } else if level <= -0.5 {
        org.pos = org.pos.step(org.facing.reversed());
        moved = true;
    }
    let level = actions[Action::Turn as usize];
    if level <= -0.5 {
        org.facing = org.facing.turned_left();
    } else if level >= 0.5 {
        org.facing = org.facing.turned_right();
    }
    let level = actions[Action::TurnRandom as usize];
    if level.abs() >= 0.5 {
        org.facing = if rng.gen_bool(0.5) {
            org.facing.turned_left()
        } else {
            org.facing.turned_right()
        };
    }

    if moved {
        org.energy -= config.energy_to_move;
    } else {
        org.energy += config.energy_to_rest;
    }
    if org.energy <= 0.0 {
        org.alive = false;
        org.energy = 0.0;
        org.pos = start_pos;
        return;
    }
    if org.energy > 1.0 {
        org.energy = 1.0;
    }

    org.pos = org.pos.clamped(config.world);
    while current.is_occupied(org.pos) || config.is_obstructed(org.pos) {
        org.collided = true;
        org.pos.x += rng.gen_range(-1..=1);
        org.pos.y += rng.gen_range(-1..=1);
        org.pos = org.pos.clamped(config.world);
    }
    current.insert(org.pos, slot);
}
