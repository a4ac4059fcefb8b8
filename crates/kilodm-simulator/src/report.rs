//! Human-readable report + JSON output.

use kilodm_protocol::RESOURCE_COUNT;
use serde::Serialize;

use crate::sim::{SimParams, TrialResult};

/// Cross-trial summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub trials:                usize,
    /// Mean final share of agents committed to each resource.
    pub mean_committed_share:  [f64; RESOURCE_COUNT],
    pub mean_uncommitted_share: f64,
    /// Mean final population of each resource.
    pub mean_population:       [f64; RESOURCE_COUNT],
    /// Fraction of trials that reached consensus.
    pub consensus_rate:        f64,
    pub median_consensus_tick: Option<u64>,
    pub overflows:             u64,
    pub checksum_drops:        u64,
    pub relays:                u64,
}

pub fn aggregate(trials: &[TrialResult]) -> AggregateStats {
    if trials.is_empty() {
        return AggregateStats::default();
    }
    let n = trials.len() as f64;
    let mut stats = AggregateStats { trials: trials.len(), ..Default::default() };

    for t in trials {
        if let Some(s) = t.final_sample() {
            let total = (s.uncommitted + s.committed.iter().sum::<usize>()).max(1) as f64;
            for i in 0..RESOURCE_COUNT {
                stats.mean_committed_share[i] += s.committed[i] as f64 / total / n;
                stats.mean_population[i] += s.populations[i] / n;
            }
            stats.mean_uncommitted_share += s.uncommitted as f64 / total / n;
        }
        stats.overflows += t.agent_stats.overflows;
        stats.checksum_drops += t.checksum_drops;
        stats.relays += t.agent_stats.relays;
    }

    let mut ticks: Vec<u64> = trials.iter().filter_map(|t| t.consensus_tick).collect();
    ticks.sort_unstable();
    stats.consensus_rate = ticks.len() as f64 / n;
    stats.median_consensus_tick = ticks.get(ticks.len() / 2).copied();
    stats
}

pub fn print_report(params: &SimParams, stats: &AggregateStats) {
    let a = &params.agent;
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           kilodm swarm simulator: Results                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Swarm       : {} agents   Ticks: {}   Trials: {}", params.n_agents, params.ticks, stats.trials);
    println!("  Weights     : h = {:.3}   k = {:.3}", a.h, a.k);
    println!("  umin        : {:?}   Quorum: {:.2}", a.umin, a.quorum_threshold);
    println!("  Medium      : range {:.2}   loss {:.0}%   bit errors {:.1}%",
        params.medium.comm_radius, params.medium.loss * 100.0, params.medium.bit_error * 100.0);
    println!();
    println!("── Final allocation ──────────────────────────────────────────");
    for i in 0..RESOURCE_COUNT {
        println!("  R{i}  committed {:>5.1}%   population {:.3}",
            stats.mean_committed_share[i] * 100.0, stats.mean_population[i]);
    }
    println!("  Uncommitted   {:>5.1}%", stats.mean_uncommitted_share * 100.0);
    println!();
    println!("── Consensus ({:.0}% on one resource) ─────────────────────────", params.consensus * 100.0);
    println!("  Reached in    : {:.0}% of trials", stats.consensus_rate * 100.0);
    match stats.median_consensus_tick {
        Some(t) => println!("  Median tick   : {t}"),
        None    => println!("  Median tick   : never"),
    }
    println!();
    println!("── Communication ─────────────────────────────────────────────");
    println!("  Relays        : {}", stats.relays);
    println!("  Checksum drops: {}", stats.checksum_drops);
    println!();

    if stats.overflows > 0 {
        println!("  ⚠  {} decision ticks skipped on pressure overflow; lower h + k.", stats.overflows);
        println!();
    }
}

pub fn print_json(params: &SimParams, stats: &AggregateStats) {
    let out = serde_json::json!({
        "params": params,
        "results": stats,
    });
    println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
}
