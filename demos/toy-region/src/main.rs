//! toy-region — end-to-end run of the travel-demand choice kernel.
//!
//! Simulates usual work location, work period and commute mode for a small
//! synthetic region.  A few shadow-pricing passes pull the simulated
//! workplaces toward the employment totals; the final pass writes CSV
//! output.
//!
//! ```text
//! cargo run -p toy-region --release [-- config.json]
//! RUST_LOG=info cargo run -p toy-region
//! ```

mod model;
mod region;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use tdm_choice::{DomainChoice, DomainChoiceConstants, EstimationSummary};
use tdm_core::{KernelConfig, ShadowPriceConfig};
use tdm_output::{CsvWriter, OutputWriter, SimOutputObserver};
use tdm_sim::{
    HouseholdOutcome, ParallelCalculatorPool, PassStats, PredictionCounter, RunObserver, ShadowPriceInput,
    ShadowPrices, SimBuilder, SimulationContext,
};

use model::{Coefficients, CommuteModel, Models, TRANSIT_CALIBRATION};
use region::Region;

// ── Constants ─────────────────────────────────────────────────────────────────

const HOUSEHOLDS:    u32   = 600;
const SAMPLE_SIZE:   usize = 10;
const SHADOW_PASSES: u32   = 4;
const OUTPUT_DIR:    &str  = "output/toy-region";

fn default_config() -> KernelConfig {
    KernelConfig {
        seed:                 42,
        households_per_batch: 64,
        min_parcel_size:      1.0,
        shadow_pricing:       ShadowPriceConfig {
            enabled:            true,
            parcel_threshold:   20.0,
            percent_tolerance:  10.0,
            absolute_tolerance: 25.0,
        },
        ..KernelConfig::default()
    }
}

// ── Observers ─────────────────────────────────────────────────────────────────

/// Forwards to the output writer and tallies commute modes.
struct FinalPass<W: OutputWriter> {
    output: SimOutputObserver<W>,
    modes:  BTreeMap<&'static str, usize>,
}

impl<W: OutputWriter> RunObserver for FinalPass<W> {
    fn on_household(&mut self, outcome: &HouseholdOutcome) {
        let chosen = outcome
            .person_days
            .iter()
            .flat_map(|day| &day.choices)
            .filter(|choice| choice.model == "commute_mode");
        for choice in chosen {
            if let Some(DomainChoice::Mode { mode }) = choice.domain_choice {
                *self.modes.entry(mode.as_str()).or_default() += 1;
            }
        }
        self.output.on_household(outcome);
    }

    fn on_estimation_summary(&mut self, summary: &EstimationSummary) {
        self.output.on_estimation_summary(summary);
    }

    fn on_pass_end(&mut self, pass: u32, stats: &PassStats) {
        self.output.on_pass_end(pass, stats);
    }
}

fn shadow_inputs(region: &Region, counter: &PredictionCounter) -> Vec<ShadowPriceInput> {
    region
        .parcels
        .iter()
        .filter(|p| p.employment > 0.0)
        .map(|p| ShadowPriceInput {
            parcel:     p.id,
            zone:       p.zone,
            target:     p.employment,
            prediction: counter.count(p.id) as f64,
        })
        .collect()
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => KernelConfig::from_json_path(Path::new(&path))
            .with_context(|| format!("loading kernel config from {path}"))?,
        None => default_config(),
    };
    config.validate()?;

    println!("=== toy-region — travel-demand choice kernel ===");
    println!("Households: {HOUSEHOLDS}  |  Sample size: {SAMPLE_SIZE}  |  Seed: {}", config.seed);
    println!();

    // 1. Land use, skims and the sampling universe.
    let region = Region::synthetic();
    let skims = Arc::new(region.skims());
    let universe = Arc::new(region.universe(&config, skims.as_ref()).context("building sampling universe")?);
    println!(
        "Region: {} zones, {} parcels, {:.0} jobs",
        universe.zone_count(),
        universe.parcel_count(),
        region.total_employment()
    );

    // 2. Shared context with a transit calibration constant.
    let adjustments = DomainChoiceConstants::new("commute_mode")
        .with_constant(DomainChoice::Mode { mode: tdm_core::Mode::Transit }, TRANSIT_CALIBRATION);
    let context = SimulationContext::new(config.clone(), skims.clone())
        .with_universe(universe)
        .with_adjustments(Arc::new(adjustments));

    // 3. Models and their per-worker calculators.
    let coefficients = Coefficients::load()?;
    let mut pool = ParallelCalculatorPool::new(&config);
    let models = Models {
        work_location: pool.register("work_location", coefficients.work_location),
        mode:          pool.register("commute_mode", coefficients.mode),
        departure:     pool.register("work_departure", coefficients.departure),
    };
    println!("Worker slots: {}", pool.slot_count());

    let households = region.households(HOUSEHOLDS, config.seed);
    let mut sim = SimBuilder::new(context, pool, CommuteModel { models, sample_size: SAMPLE_SIZE })
        .households(households)
        .build()?;

    // 4. Shadow-pricing passes.
    let t0 = Instant::now();
    if config.shadow_pricing.enabled {
        let mut prices = ShadowPrices::new();
        for _ in 0..SHADOW_PASSES {
            let mut counter = PredictionCounter::new("work_location");
            let stats = sim.run(&mut counter)?;
            let changes = prices.update(&shadow_inputs(&region, &counter), &config.shadow_pricing);
            let worst = changes.iter().map(|c| c.absolute_difference.abs()).fold(0.0, f64::max);
            println!(
                "Shadow pass {}: {} workers placed, largest miss {worst:.1}",
                sim.pass(),
                counter.counts().values().sum::<u64>(),
            );
            log::debug!("shadow pass stats: {stats:?}");
            sim.set_shadow_prices(prices.clone());
        }
    }

    // 5. Final pass with output.
    std::fs::create_dir_all(OUTPUT_DIR)?;
    let writer = CsvWriter::new(Path::new(OUTPUT_DIR))?;
    let mut obs = FinalPass { output: SimOutputObserver::new(writer), modes: BTreeMap::new() };
    let stats = sim.run(&mut obs)?;
    if let Some(e) = obs.output.take_error() {
        eprintln!("output error: {e}");
    }
    let elapsed = t0.elapsed();

    // 6. Summary.
    println!();
    println!("Simulation complete in {:.3} s ({} passes)", elapsed.as_secs_f64(), sim.pass());
    println!(
        "  households: {}  person-days: {}  invalid: {}  failed households: {}",
        stats.households, stats.person_days, stats.invalid_days, stats.failed_households
    );
    println!("  output written to {OUTPUT_DIR}/");
    println!();

    let total: usize = obs.modes.values().sum();
    println!("{:<10} {:>8} {:>8}", "Mode", "Trips", "Share");
    println!("{}", "-".repeat(28));
    for (mode, count) in &obs.modes {
        let share = if total > 0 { *count as f64 / total as f64 } else { 0.0 };
        println!("{:<10} {:>8} {:>7.1}%", mode, count, share * 100.0);
    }

    Ok(())
}
