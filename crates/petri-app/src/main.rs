//! Headless simulation runner: wires tracing, Ctrl-C, and a logging
//! observer around the engine.

#[allow(dead_code)]
mod selectors;

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use petri_core::{FramePhase, PlayMode, SimHandle, Simulation, SimulationConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_tracing();

    let config = SimulationConfig {
        seed: Some(0xDEC0DE),
        selector: selectors::circle_center,
        ..Default::default()
    };
    config.validate().context("invalid simulation config")?;
    info!(
        width = config.world.width,
        height = config.world.height,
        population = config.population,
        generations = config.max_generations,
        seed = ?config.seed,
        "starting simulation"
    );

    let handle = SimHandle::new();
    {
        let handle = Arc::clone(&handle);
        ctrlc::set_handler(move || {
            warn!("interrupt received, shutting down");
            handle.cancel();
        })
        .context("failed to install interrupt handler")?;
    }

    let worker = {
        let handle = Arc::clone(&handle);
        let config = config.clone();
        thread::spawn(move || {
            let result = Simulation::new(config, Arc::clone(&handle)).map(|mut sim| sim.run());
            if result.is_err() {
                // Unblock the observer; it would otherwise wait forever
                // for frames that will never come.
                handle.cancel();
            }
            result
        })
    };

    // Headless observer: run at full speed and log what drifts past.
    handle.set_play_mode(PlayMode::Skip);
    handle.observer_ready();

    let mut last_seq = 0;
    while let Some(frame) = handle.wait_for_frame(last_seq) {
        last_seq = frame.seq;
        if frame.phase == FramePhase::GenerationEnd {
            let alive = frame.organisms.iter().filter(|o| o.alive).count();
            info!(
                generation = frame.generation,
                alive,
                population = frame.organisms.len(),
                "observed generation end"
            );
        }
    }

    match worker.join() {
        Ok(result) => result.context("simulation failed")?,
        Err(_) => anyhow::bail!("simulation thread panicked"),
    }
    info!("simulation finished");
    Ok(())
}
