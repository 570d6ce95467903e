use anyhow::Result;
use diffusion_common::SimulationConfig;
use genetics_diffusion::Simulation;
use log::{debug, error, info, trace};
use std::time::Instant;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Genetics Diffusion Engine...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SimulationConfig::load(&config_path)?;
    info!("Loaded configuration from {}", config_path);
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    let mut sim = Simulation::new(config)?;
    debug!("Simulation Parameters: {:#?}", sim.params());

    let total_generations = sim.params().generations;
    info!(
        "Running {} generations ({:?} update, {:?} visit order), writing to '{}'",
        total_generations,
        sim.params().update_mode,
        sim.params().visit_order,
        sim.output().directory
    );
    let start_time = Instant::now();

    // --- Initial Snapshot (generation 0) ---
    if let Err(e) = sim.record_snapshot() {
        error!("Error recording initial snapshot: {:#}", e);
        anyhow::bail!("Failed to record initial snapshot.");
    }

    for generation in 1..=total_generations {
        let step_start_time = Instant::now();
        let reports = match sim.step() {
            Ok(reports) => reports,
            Err(e) => {
                error!("Error during generation {}: {:#}", generation, e);
                anyhow::bail!("Simulation step failed.");
            }
        };
        trace!(
            "Generation [{}/{}] stepped in {:.2} ms: {:?}",
            generation,
            total_generations,
            step_start_time.elapsed().as_secs_f64() * 1000.0,
            reports
        );

        if let Err(e) = sim.record_snapshot() {
            error!("Error recording snapshot at generation {}: {:#}", generation, e);
            anyhow::bail!("Failed to record snapshot.");
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({:.3} minutes).",
        total_duration.as_secs_f64(),
        total_duration.as_secs_f64() / 60.0
    );

    // --- Save Recorded Data ---
    info!("Saving recorded data...");
    sim.finish()?;

    info!("Simulation Complete.");
    Ok(())
}
