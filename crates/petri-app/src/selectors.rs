//! Stock selection predicates.
//!
//! Each one is a plain function matching the engine's selection
//! predicate signature, so a run is configured by assigning one to
//! `config.selector`.

use petri_core::{Organism, SimulationConfig};

/// Survive in the middle third of the world along x.
pub fn center_x(org: &Organism, config: &SimulationConfig) -> bool {
    let w = config.world.width as i16;
    org.pos.x > w / 3 && org.pos.x < 2 * w / 3
}

/// Survive in the middle third of the world along y.
pub fn center_y(org: &Organism, config: &SimulationConfig) -> bool {
    let h = config.world.height as i16;
    org.pos.y > h / 3 && org.pos.y < 2 * h / 3
}

/// Survive in the middle third along both axes.
pub fn center(org: &Organism, config: &SimulationConfig) -> bool {
    center_x(org, config) && center_y(org, config)
}

/// Survive within a 16-cell radius of the world center.
pub fn circle_center(org: &Organism, config: &SimulationConfig) -> bool {
    let dx = i32::from(config.world.width as i16 / 2 - org.pos.x);
    let dy = i32::from(config.world.height as i16 / 2 - org.pos.y);
    dx * dx + dy * dy < 16 * 16
}

/// Survive on or below the x = y diagonal.
pub fn triangle(org: &Organism, _config: &SimulationConfig) -> bool {
    org.pos.x >= org.pos.y
}

/// Survive in the leftmost fifth of the world.
pub fn left_edge(org: &Organism, config: &SimulationConfig) -> bool {
    f32::from(org.pos.x) < f32::from(config.world.width) * 0.2
}

/// Survive in the rightmost fifth of the world.
pub fn right_edge(org: &Organism, config: &SimulationConfig) -> bool {
    f32::from(org.pos.x) > f32::from(config.world.width) * 0.8
}

/// Survive near either vertical edge.
pub fn left_or_right_edge(org: &Organism, config: &SimulationConfig) -> bool {
    left_edge(org, config) || right_edge(org, config)
}

/// Survive only after colliding on the final step.
pub fn collided(org: &Organism, _config: &SimulationConfig) -> bool {
    org.collided
}

/// Survive with more than 70% energy left.
pub fn has_enough_energy(org: &Organism, _config: &SimulationConfig) -> bool {
    org.energy > 0.7
}

#[cfg(test)]
mod tests {
    use super::*;
    use petri_brain::{Genome, NetParams, NeuralNet};
    use petri_core::OrganismId;
    use petri_index::{Direction, GridPos, GridSize};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn org_at(x: i16, y: i16) -> Organism {
        let mut rng = SmallRng::seed_from_u64(1);
        let genome = Genome::random(&mut rng, 1);
        let net = NeuralNet::build(&genome, NetParams::new(7, 6, 2).unwrap());
        Organism::new(
            OrganismId(0),
            genome,
            net,
            GridPos::new(x, y),
            Direction::North,
        )
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            world: GridSize::new(128, 128),
            ..Default::default()
        }
    }

    #[test]
    fn center_band_bounds() {
        let config = config();
        assert!(!center_x(&org_at(42, 0), &config));
        assert!(center_x(&org_at(43, 0), &config));
        assert!(center_x(&org_at(84, 0), &config));
        assert!(!center_x(&org_at(85, 0), &config));
    }

    #[test]
    fn circle_is_strict() {
        let config = config();
        assert!(circle_center(&org_at(64, 64), &config));
        assert!(circle_center(&org_at(64 + 15, 64), &config));
        assert!(!circle_center(&org_at(64 + 16, 64), &config));
    }

    #[test]
    fn triangle_includes_diagonal() {
        let config = config();
        assert!(triangle(&org_at(5, 5), &config));
        assert!(triangle(&org_at(6, 5), &config));
        assert!(!triangle(&org_at(5, 6), &config));
    }

    #[test]
    fn edges_are_exclusive_fifths() {
        let config = config();
        assert!(left_edge(&org_at(25, 0), &config));
        assert!(!left_edge(&org_at(26, 0), &config));
        assert!(right_edge(&org_at(103, 0), &config));
        assert!(!right_edge(&org_at(102, 0), &config));
        assert!(left_or_right_edge(&org_at(0, 0), &config));
        assert!(left_or_right_edge(&org_at(127, 0), &config));
        assert!(!left_or_right_edge(&org_at(64, 0), &config));
    }

    #[test]
    fn vitals_predicates() {
        let config = config();
        let mut org = org_at(0, 0);
        assert!(!collided(&org, &config));
        org.collided = true;
        assert!(collided(&org, &config));

        assert!(has_enough_energy(&org, &config));
        org.energy = 0.7;
        assert!(!has_enough_energy(&org, &config));
    }
}
