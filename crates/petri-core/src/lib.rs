//! Simulation engine: organisms, generations, selection, reproduction,
//! and the observer synchronization protocol.
//!
//! A [`Simulation`] owns all world state and runs on one thread; an
//! observer on another thread consumes published population snapshots
//! through the shared [`SimHandle`], which also carries pause,
//! single-step, play-mode, and cancellation control.

pub mod arena;
pub mod config;
pub mod organism;
pub mod sync;
pub mod world;

pub use config::{Action, ConfigError, Sensor, SelectionPredicate, SimulationConfig};
pub use organism::{Organism, OrganismId, OrganismSnapshot};
pub use sync::{Frame, FramePhase, PlayMode, SimHandle};
pub use world::{GenerationStats, Simulation};
