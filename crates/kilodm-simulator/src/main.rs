mod arena;
mod logger;
mod report;
mod sim;
mod swarm;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::{
    logger::TraceLogger,
    report::aggregate,
    sim::{run_trial, SimParams, TrialResult},
};

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name  = "kilodm-simulator",
    about = "Swarm simulator for collective decision-making over dynamic resources",
)]
struct Cli {
    /// JSON file with simulation parameters. CLI flags override it.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Number of agents.
    #[arg(long)]
    agents: Option<usize>,

    /// Ticks per trial (31 ticks per second).
    #[arg(long)]
    ticks: Option<u64>,

    /// Number of independent trials.
    #[arg(long, default_value_t = 1)]
    trials: usize,

    /// Weight of spontaneous commitment and abandonment.
    #[arg(long)]
    h: Option<f64>,

    /// Weight of recruitment and cross-inhibition.
    #[arg(long)]
    k: Option<f64>,

    /// Minimum viable utility, applied to every resource.
    #[arg(long)]
    umin: Option<f64>,

    /// Quorum threshold (0 disables quorum sensing).
    #[arg(long)]
    quorum: Option<f64>,

    /// Per-receiver frame loss probability.
    #[arg(long)]
    loss: Option<f64>,

    /// Per-frame bit error probability.
    #[arg(long)]
    bit_error: Option<f64>,

    /// Communication range, in arena radii.
    #[arg(long)]
    comm_radius: Option<f64>,

    /// RNG seed for reproducibility. 0 = random seed.
    #[arg(long, env = "KILODM_SEED", default_value_t = 42)]
    seed: u64,

    /// Directory for CBOR trace logs. No trace is written when unset.
    #[arg(long, env = "KILODM_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Output results as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Sweep quorum thresholds (0, 0.25, 0.5, 0.75) and print a summary
    /// table instead of a single scenario.
    #[arg(long)]
    sweep: bool,
}

impl Cli {
    fn sim_params(&self) -> Result<SimParams> {
        let mut p = match &self.params {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
            }
            None => SimParams::default(),
        };
        if let Some(n) = self.agents { p.n_agents = n; }
        if let Some(t) = self.ticks { p.ticks = t; }
        if let Some(h) = self.h { p.agent.h = h; }
        if let Some(k) = self.k { p.agent.k = k; }
        if let Some(u) = self.umin { p.agent.umin = [u; kilodm_protocol::RESOURCE_COUNT]; }
        if let Some(q) = self.quorum { p.agent.quorum_threshold = q; }
        if let Some(l) = self.loss { p.medium.loss = l; }
        if let Some(b) = self.bit_error { p.medium.bit_error = b; }
        if let Some(r) = self.comm_radius { p.medium.comm_radius = r; }
        p.validate()?;
        Ok(p)
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kilodm_simulator=info,kilodm_agent=warn")),
        )
        .init();

    let cli = Cli::parse();
    let params = cli.sim_params()?;

    if cli.sweep {
        return run_sweep(&params, cli.trials, cli.seed);
    }

    let trials = run_scenario(&params, cli.trials, cli.seed, cli.log_dir.as_deref())?;
    let stats = aggregate(&trials);

    if cli.json {
        report::print_json(&params, &stats);
    } else {
        report::print_report(&params, &stats);
    }
    Ok(())
}

// ============================================================================
// Scenario runner
// ============================================================================

fn run_scenario(
    params:   &SimParams,
    n_trials: usize,
    seed:     u64,
    log_dir:  Option<&std::path::Path>,
) -> Result<Vec<TrialResult>> {
    let seed = if seed == 0 { rand::random() } else { seed };
    let mut rng = StdRng::seed_from_u64(seed);

    tracing::info!(
        trials = n_trials,
        agents = params.n_agents,
        ticks = params.ticks,
        seed,
        "running scenario"
    );

    let mut logger = log_dir.map(|dir| TraceLogger::new(dir.to_path_buf(), seed));
    let mut trials = Vec::with_capacity(n_trials);
    for i in 0..n_trials {
        let result = run_trial(params, &mut rng, logger.as_mut())?;
        tracing::info!(trial = i, consensus = ?result.consensus_tick, "trial finished");
        trials.push(result);
    }

    if let Some(logger) = logger.as_mut() {
        let path = logger.flush()?;
        tracing::info!(entries = logger.entry_count(), path = %path.display(), "trace written");
    }
    Ok(trials)
}

// ============================================================================
// Sweep mode
// ============================================================================

fn run_sweep(base: &SimParams, n_trials: usize, seed: u64) -> Result<()> {
    let thresholds = [0.0, 0.25, 0.5, 0.75];

    println!();
    println!("kilodm swarm simulator: quorum sweep");
    println!();
    println!("{:<8} {:>8} {:>8} {:>8} {:>10} {:>12}",
        "Quorum", "R0%", "R1%", "R2%", "Consensus", "Median tick");
    println!("{}", "─".repeat(60));

    for &q in &thresholds {
        let mut params = base.clone();
        params.agent.quorum_threshold = q;
        let trials = run_scenario(&params, n_trials, seed ^ (q * 1000.0) as u64, None)?;
        let stats = aggregate(&trials);
        let median = stats.median_consensus_tick.map_or("never".to_string(), |t| t.to_string());

        println!("{:<8.2} {:>7.1}% {:>7.1}% {:>7.1}% {:>9.0}% {:>12}",
            q,
            stats.mean_committed_share[0] * 100.0,
            stats.mean_committed_share[1] * 100.0,
            stats.mean_committed_share[2] * 100.0,
            stats.consensus_rate * 100.0,
            median,
        );
    }
    println!();
    Ok(())
}
