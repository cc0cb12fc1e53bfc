//! Genetic encoding and the recurrent neural nets grown from it.
//!
//! A genome is a list of 32-bit genes; each gene describes one weighted
//! connection between neurons. [`NeuralNet::build`] grows a net from a
//! genome and [`NeuralNet::step`] evaluates it for one simulation step.

pub mod gene;
pub mod net;

pub use gene::{Gene, Genome};
pub use net::{BuildError, NetParams, NeuralNet, NeuronId, NeuronKind};
