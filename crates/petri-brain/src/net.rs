//! Neural net construction and fixpoint evaluation.
//!
//! Every gene contributes exactly one connection; neurons are created on
//! first mention and deduplicated by (kind, index), so the number of
//! connections always equals the genome length while the neuron count
//! only grows with distinct mentions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gene::Genome;

/// Errors from net-shape validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("net must have at least one {0} neuron slot")]
    ZeroSlots(&'static str),
}

/// Which namespace a neuron id lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronKind {
    Input,
    Internal,
    Output,
}

/// A neuron's identity: namespace plus local index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeuronId {
    pub kind: NeuronKind,
    pub index: u8,
}

/// Net shape shared by every organism in a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetParams {
    inputs: u8,
    outputs: u8,
    max_internal: u8,
}

impl NetParams {
    pub fn new(inputs: u8, outputs: u8, max_internal: u8) -> Result<Self, BuildError> {
        if inputs == 0 {
            return Err(BuildError::ZeroSlots("input"));
        }
        if outputs == 0 {
            return Err(BuildError::ZeroSlots("output"));
        }
        if max_internal == 0 {
            return Err(BuildError::ZeroSlots("internal"));
        }
        Ok(Self {
            inputs,
            outputs,
            max_internal,
        })
    }

    #[must_use]
    pub fn inputs(self) -> u8 {
        self.inputs
    }

    #[must_use]
    pub fn outputs(self) -> u8 {
        self.outputs
    }

    #[must_use]
    pub fn max_internal(self) -> u8 {
        self.max_internal
    }
}

#[derive(Debug, Clone)]
pub struct Neuron {
    pub id: NeuronId,
    pub fan_in: u16,
    pub fan_out: u16,
    state: f32,
    prev_state: f32,
    in_visited: u16,
    out_visited: u16,
}

impl Neuron {
    fn new(id: NeuronId) -> Self {
        Self {
            id,
            fan_in: 0,
            fan_out: 0,
            state: 0.0,
            prev_state: 0.0,
            in_visited: 0,
            out_visited: 0,
        }
    }

    /// Connections into this neuron that fired during the last step.
    #[must_use]
    pub fn fired_inputs(&self) -> u16 {
        self.in_visited
    }

    /// Connections out of this neuron that fired during the last step.
    #[must_use]
    pub fn fired_outputs(&self) -> u16 {
        self.out_visited
    }
}

#[derive(Debug, Clone, Copy)]
struct Connection {
    source: usize,
    sink: usize,
    weight: f32,
    visited: bool,
}

/// A recurrent net grown from a genome.
#[derive(Debug, Clone)]
pub struct NeuralNet {
    neurons: Vec<Neuron>,
    connections: Vec<Connection>,
    input_count: u8,
    output_count: u8,
}

fn intern(neurons: &mut Vec<Neuron>, slots: &mut [Option<usize>], id: NeuronId) -> usize {
    match slots[id.index as usize] {
        Some(slot) => slot,
        None => {
            let slot = neurons.len();
            neurons.push(Neuron::new(id));
            slots[id.index as usize] = Some(slot);
            slot
        }
    }
}

impl NeuralNet {
    /// Grow a net from `genome`. Gene ids are folded into the available
    /// slot ranges by modulo, so every gene maps to a real neuron pair.
    ///
    /// The genome must be non-empty.
    #[must_use]
    pub fn build(genome: &Genome, params: NetParams) -> Self {
        assert!(!genome.is_empty(), "cannot build a net from an empty genome");

        let mut neurons = Vec::new();
        let mut connections = Vec::with_capacity(genome.len());
        let mut input_slots = vec![None; params.inputs as usize];
        let mut internal_slots = vec![None; params.max_internal as usize];
        let mut output_slots = vec![None; params.outputs as usize];

        for gene in genome.genes() {
            let source = if gene.source_is_input {
                let id = NeuronId {
                    kind: NeuronKind::Input,
                    index: gene.source_id % params.inputs,
                };
                intern(&mut neurons, &mut input_slots, id)
            } else {
                let id = NeuronId {
                    kind: NeuronKind::Internal,
                    index: gene.source_id % params.max_internal,
                };
                intern(&mut neurons, &mut internal_slots, id)
            };
            neurons[source].fan_out += 1;

            let sink = if gene.sink_is_output {
                let id = NeuronId {
                    kind: NeuronKind::Output,
                    index: gene.sink_id % params.outputs,
                };
                intern(&mut neurons, &mut output_slots, id)
            } else {
                let id = NeuronId {
                    kind: NeuronKind::Internal,
                    index: gene.sink_id % params.max_internal,
                };
                intern(&mut neurons, &mut internal_slots, id)
            };
            neurons[sink].fan_in += 1;

            connections.push(Connection {
                source,
                sink,
                weight: gene.signal_weight(),
                visited: false,
            });
        }

        Self {
            neurons,
            connections,
            input_count: params.inputs,
            output_count: params.outputs,
        }
    }

    #[must_use]
    pub fn neuron_count(&self) -> usize {
        self.neurons.len()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    /// Evaluate one step: load `sensors` into the input neurons, run
    /// connection firing to a fixpoint, and write the output neuron
    /// states into `actions` (unmentioned outputs read 0.0).
    ///
    /// A connection fires once its source has all fan-in satisfied (a
    /// self-loop only waits for its *other* inputs and reads the
    /// source's previous-step state). The scan repeats until a full
    /// pass fires nothing, so connections inside a cycle that no input
    /// path reaches simply stay unfired and contribute nothing.
    pub fn step(&mut self, sensors: &[f32], actions: &mut [f32]) {
        debug_assert_eq!(sensors.len(), self.input_count as usize);
        debug_assert_eq!(actions.len(), self.output_count as usize);

        for conn in &mut self.connections {
            conn.visited = false;
        }
        for neuron in &mut self.neurons {
            neuron.prev_state = neuron.state;
            neuron.state = 0.0;
            neuron.in_visited = 0;
            neuron.out_visited = 0;
        }
        for neuron in &mut self.neurons {
            if neuron.id.kind == NeuronKind::Input {
                neuron.state = sensors[neuron.id.index as usize];
            }
        }

        loop {
            let mut fired = 0;
            for ci in 0..self.connections.len() {
                let conn = self.connections[ci];
                if conn.visited {
                    continue;
                }
                let src = &self.neurons[conn.source];
                let pending = if conn.source == conn.sink {
                    src.fan_in.saturating_sub(1)
                } else {
                    src.fan_in
                };
                if src.in_visited < pending {
                    continue;
                }
                let value = if conn.source == conn.sink {
                    src.prev_state
                } else {
                    src.state
                };

                self.connections[ci].visited = true;
                self.neurons[conn.source].out_visited += 1;
                let sink = &mut self.neurons[conn.sink];
                sink.state += conn.weight * value;
                sink.in_visited += 1;
                if sink.in_visited == sink.fan_in {
                    sink.state = (sink.state / f32::from(sink.fan_in)).tanh();
                }
                fired += 1;
            }
            if fired == 0 {
                break;
            }
        }

        for slot in actions.iter_mut() {
            *slot = 0.0;
        }
        for neuron in &self.neurons {
            if neuron.id.kind == NeuronKind::Output {
                actions[neuron.id.index as usize] = neuron.state;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::Gene;
    use proptest::prelude::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn params() -> NetParams {
        NetParams::new(7, 6, 2).unwrap()
    }

    fn gene(source_is_input: bool, source_id: u8, sink_is_output: bool, sink_id: u8, weight: u16) -> Gene {
        Gene {
            source_is_input,
            source_id,
            sink_is_output,
            sink_id,
            weight,
        }
    }

    // Raw weight 0xC000 remaps to exactly 2.0.
    const W2: u16 = 0xC000;

    #[test]
    fn zero_slot_params_rejected() {
        assert!(NetParams::new(0, 6, 2).is_err());
        assert!(NetParams::new(7, 0, 2).is_err());
        assert!(NetParams::new(7, 6, 0).is_err());
    }

    #[test]
    fn repeated_mentions_dedup_neurons() {
        let genome = Genome::from_genes(vec![
            gene(true, 0, true, 0, W2),
            gene(true, 0, true, 0, W2),
            gene(true, 0, false, 1, W2),
        ]);
        let net = NeuralNet::build(&genome, params());
        assert_eq!(net.connection_count(), 3);
        assert_eq!(net.neuron_count(), 3);
        let input = net
            .neurons()
            .iter()
            .find(|n| n.id.kind == NeuronKind::Input)
            .unwrap();
        assert_eq!(input.fan_out, 3);
        assert_eq!(input.fan_in, 0);
    }

    #[test]
    fn ids_fold_into_slot_ranges() {
        // Internal ids 0 and 2 collide under max_internal = 2.
        let genome = Genome::from_genes(vec![
            gene(true, 9, false, 2, W2),
            gene(true, 2, false, 0, W2),
        ]);
        let net = NeuralNet::build(&genome, params());
        assert_eq!(net.neuron_count(), 2);
        let internal = net
            .neurons()
            .iter()
            .find(|n| n.id.kind == NeuronKind::Internal)
            .unwrap();
        assert_eq!(internal.id.index, 0);
        assert_eq!(internal.fan_in, 2);
    }

    #[test]
    fn single_connection_propagates() {
        let genome = Genome::from_genes(vec![gene(true, 0, true, 0, W2)]);
        let mut net = NeuralNet::build(&genome, params());
        let mut sensors = [0.0f32; 7];
        let mut actions = [0.0f32; 6];
        sensors[0] = 0.5;
        net.step(&sensors, &mut actions);
        assert!((actions[0] - 1.0f32.tanh()).abs() < 1e-6);
        for &a in &actions[1..] {
            assert_eq!(a, 0.0);
        }
    }

    #[test]
    fn sink_squashes_averaged_fan_in() {
        let genome = Genome::from_genes(vec![
            gene(true, 0, true, 0, W2),
            gene(true, 1, true, 0, W2),
        ]);
        let mut net = NeuralNet::build(&genome, params());
        let mut sensors = [0.0f32; 7];
        sensors[0] = 1.0;
        sensors[1] = 0.5;
        let mut actions = [0.0f32; 6];
        net.step(&sensors, &mut actions);
        let expected = ((2.0 + 1.0) / 2.0f32).tanh();
        assert!((actions[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn self_loop_reads_previous_step_state() {
        let genome = Genome::from_genes(vec![
            gene(true, 0, false, 0, W2),
            gene(false, 0, false, 0, W2),
            gene(false, 0, true, 0, W2),
        ]);
        let mut net = NeuralNet::build(&genome, params());
        let sensors = {
            let mut s = [0.0f32; 7];
            s[0] = 1.0;
            s
        };
        let mut actions = [0.0f32; 6];

        // First step: the self-loop sees prev_state 0.
        net.step(&sensors, &mut actions);
        let n1 = 1.0f32.tanh(); // tanh((2*1 + 2*0) / 2)
        assert!((actions[0] - (2.0 * n1).tanh()).abs() < 1e-5);

        // Second step: the self-loop feeds back the first step's state.
        net.step(&sensors, &mut actions);
        let n2 = ((2.0 + 2.0 * n1) / 2.0f32).tanh();
        assert!((actions[0] - (2.0 * n2).tanh()).abs() < 1e-5);
        assert!((n2 - n1).abs() > 1e-3);
    }

    #[test]
    fn acyclic_wiring_fires_every_connection_once() {
        let genome = Genome::from_genes(vec![
            gene(true, 0, false, 0, W2),
            gene(true, 1, false, 0, W2),
            gene(false, 0, true, 0, W2),
            gene(false, 0, true, 1, W2),
        ]);
        let mut net = NeuralNet::build(&genome, params());
        let sensors = [0.25f32; 7];
        let mut actions = [0.0f32; 6];
        net.step(&sensors, &mut actions);
        for neuron in net.neurons() {
            assert_eq!(neuron.fired_inputs(), neuron.fan_in);
            assert_eq!(neuron.fired_outputs(), neuron.fan_out);
        }
    }

    #[test]
    fn unreachable_cycle_terminates_and_stays_silent() {
        // Two internal neurons feeding each other, with an output tap,
        // but no input path: nothing may ever fire.
        let genome = Genome::from_genes(vec![
            gene(false, 0, false, 1, W2),
            gene(false, 1, false, 0, W2),
            gene(false, 0, true, 0, W2),
        ]);
        let mut net = NeuralNet::build(&genome, params());
        let sensors = [1.0f32; 7];
        let mut actions = [0.5f32; 6];
        net.step(&sensors, &mut actions);
        assert!(actions.iter().all(|&a| a == 0.0));
    }

    proptest! {
        #[test]
        fn connection_count_equals_genome_length(raws in prop::collection::vec(any::<u32>(), 1..64)) {
            let genome = Genome::from_genes(raws.into_iter().map(Gene::decode).collect());
            let net = NeuralNet::build(&genome, params());
            prop_assert_eq!(net.connection_count(), genome.len());
            prop_assert!(net.neuron_count() <= 2 * genome.len());
            let fan_in_total: u16 = net.neurons().iter().map(|n| n.fan_in).sum();
            prop_assert_eq!(fan_in_total as usize, genome.len());
        }

        #[test]
        fn step_terminates_on_arbitrary_genomes(raws in prop::collection::vec(any::<u32>(), 1..32)) {
            let genome = Genome::from_genes(raws.into_iter().map(Gene::decode).collect());
            let mut net = NeuralNet::build(&genome, params());
            let mut actions = [0.0f32; 6];
            let mut rng = SmallRng::seed_from_u64(5);
            let mut sensors = [0.0f32; 7];
            for s in &mut sensors {
                *s = rand::Rng::gen_range(&mut rng, -1.0..1.0);
            }
            for _ in 0..3 {
                net.step(&sensors, &mut actions);
            }
            prop_assert!(actions.iter().all(|a| a.is_finite()));
        }
    }
}
