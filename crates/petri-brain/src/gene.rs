//! The 32-bit gene codec and genome-level genetic operators.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One heritable connection description, unpacked from a `u32`.
///
/// Packed layout, most significant bit first:
///
/// ```text
/// bit 31      source neuron is a sensor input
/// bits 30..24 source neuron id (7 bits)
/// bit 23      sink neuron is an action output
/// bits 22..16 sink neuron id (7 bits)
/// bits 15..0  raw connection weight
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub source_is_input: bool,
    pub source_id: u8,
    pub sink_is_output: bool,
    pub sink_id: u8,
    pub weight: u16,
}

impl Gene {
    /// Unpack a raw 32-bit gene. Every `u32` is a valid gene.
    #[must_use]
    pub const fn decode(raw: u32) -> Self {
        Self {
            source_is_input: raw & 0x8000_0000 != 0,
            source_id: ((raw >> 24) & 0x7f) as u8,
            sink_is_output: raw & 0x0080_0000 != 0,
            sink_id: ((raw >> 16) & 0x7f) as u8,
            weight: (raw & 0xffff) as u16,
        }
    }

    /// Pack back into the 32-bit form. Exact inverse of [`Gene::decode`].
    #[must_use]
    pub const fn encode(self) -> u32 {
        let mut raw = self.weight as u32;
        raw |= (self.sink_id as u32 & 0x7f) << 16;
        if self.sink_is_output {
            raw |= 0x0080_0000;
        }
        raw |= (self.source_id as u32 & 0x7f) << 24;
        if self.source_is_input {
            raw |= 0x8000_0000;
        }
        raw
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::decode(rng.gen::<u32>())
    }

    /// Connection weight mapped into `[-4.0, 4.0)`.
    #[must_use]
    pub fn signal_weight(self) -> f32 {
        self.weight as f32 * 8.0 / 65536.0 - 4.0
    }
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.encode())
    }
}

/// An organism's heritable material: a non-empty list of genes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genome {
    genes: Vec<Gene>,
}

impl Genome {
    /// Wrap an explicit gene list. Used by tests and genetic operators.
    #[must_use]
    pub fn from_genes(genes: Vec<Gene>) -> Self {
        debug_assert!(!genes.is_empty(), "genomes must contain at least one gene");
        Self { genes }
    }

    /// Uniformly random genome of `count` genes.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Self {
        debug_assert!(count > 0, "genomes must contain at least one gene");
        Self {
            genes: (0..count).map(|_| Gene::random(rng)).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    #[must_use]
    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    /// Uniform crossover: each index up to the shorter parent's length
    /// takes the gene from a coin-flipped parent; the tail beyond that
    /// is copied from the longer parent. The child's length is the
    /// longer parent's length.
    pub fn crossover<R: Rng + ?Sized>(rng: &mut R, a: &Genome, b: &Genome) -> Genome {
        let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
        let mut genes = Vec::with_capacity(long.len());
        for i in 0..short.len() {
            let gene = if rng.gen_bool(0.5) {
                a.genes[i]
            } else {
                b.genes[i]
            };
            genes.push(gene);
        }
        genes.extend_from_slice(&long.genes[short.len()..]);
        Genome { genes }
    }

    /// With probability `rate`, flip one uniformly random bit of one
    /// uniformly random gene. Returns whether a mutation occurred.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, rate: f32) -> bool {
        if rate <= 0.0 || !rng.gen_bool(f64::from(rate.min(1.0))) {
            return false;
        }
        let idx = rng.gen_range(0..self.genes.len());
        let bit = rng.gen_range(0..32u32);
        self.genes[idx] = Gene::decode(self.genes[idx].encode() ^ (1 << bit));
        true
    }
}

impl fmt::Display for Genome {
    /// Space-separated uppercase hex, one word per gene.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, gene) in self.genes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{gene}")?;
        }
        Ok(())
    }
}
