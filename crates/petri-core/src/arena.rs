//! Pre-sized per-generation organism storage.
//!
//! Two arenas are swapped at each generation boundary: organisms for
//! the next generation are allocated into one while the other still
//! holds the parents. A reset keeps the allocation for reuse.

use crate::organism::Organism;

#[derive(Debug)]
pub struct GenerationArena {
    organisms: Vec<Organism>,
    budget: usize,
}

impl GenerationArena {
    /// An empty arena that will hold at most `budget` organisms.
    #[must_use]
    pub fn with_budget(budget: usize) -> Self {
        Self {
            organisms: Vec::with_capacity(budget),
            budget,
        }
    }

    /// Drop all organisms, retaining capacity.
    pub fn reset(&mut self) {
        self.organisms.clear();
    }

    /// Store an organism. Exceeding the budget is a programming error
    /// in the generation loop and aborts.
    pub fn alloc(&mut self, organism: Organism) -> &mut Organism {
        assert!(
            self.organisms.len() < self.budget,
            "generation arena exhausted: budget of {} organisms",
            self.budget
        );
        self.organisms.push(organism);
        self.organisms
            .last_mut()
            .unwrap_or_else(|| unreachable!("just pushed"))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.organisms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.organisms.is_empty()
    }

    #[must_use]
    pub fn organisms(&self) -> &[Organism] {
        &self.organisms
    }

    pub fn organisms_mut(&mut self) -> &mut [Organism] {
        &mut self.organisms
    }

    #[must_use]
    pub fn living_count(&self) -> usize {
        self.organisms.iter().filter(|o| o.alive).count()
    }
}
