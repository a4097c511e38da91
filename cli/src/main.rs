// meshroute: routing protocol simulator
//
// Plays scenario files against the distance-vector or link-state engine and
// checks the resulting forwarding tables against true shortest paths.

mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use meshroute_core::routing::Protocol;
use scenario::Scenario;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "meshroute")]
#[command(about = "meshroute: per-node mesh routing simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Log protocol events (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and verify convergence
    Simulate {
        scenario: PathBuf,
        /// Override the scenario's protocol (dv or ls)
        #[arg(short, long)]
        protocol: Option<Protocol>,
        #[arg(short, long, default_value = "100000")]
        max_deliveries: usize,
    },
    /// Validate a scenario file without running it
    Check { scenario: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Simulate {
            scenario,
            protocol,
            max_deliveries,
        } => cmd_simulate(scenario, protocol, max_deliveries),
        Commands::Check { scenario } => cmd_check(scenario),
    }
}

fn cmd_simulate(path: PathBuf, protocol: Option<Protocol>, max_deliveries: usize) -> Result<()> {
    let mut scenario = Scenario::load(&path)?;
    if let Some(protocol) = protocol {
        scenario.protocol = protocol;
    }

    println!(
        "{} {} ({})",
        "Simulating".bold(),
        scenario.display_name(),
        scenario.protocol
    );
    println!();

    let report = scenario::run(&scenario, max_deliveries)
        .with_context(|| format!("Scenario {} failed to run", path.display()))?;
    let network = &report.network;

    for id in network.node_ids() {
        let Some(node) = network.node(id) else {
            continue;
        };
        println!("{}", format!("Node {}", id).bold());
        let table = node.routing_table();
        if table.is_empty() {
            println!("  {}", "(no routes)".dimmed());
        }
        for route in table.values() {
            println!(
                "  → {:<6} via {:<6} cost {}",
                route.destination, route.next_hop, route.cost
            );
        }
    }
    println!();

    let stats = network.stats();
    println!("{}", "Statistics".bold());
    println!("  Deliveries:     {}", report.deliveries);
    println!("  Messages sent:  {}", stats.sent);
    println!("  Applied:        {}", stats.applied);
    println!("  Duplicates:     {}", stats.duplicates);
    println!("  Stale:          {}", stats.stale);
    println!("  Rejected:       {}", stats.rejected);
    println!("  Lost in flight: {}", stats.dropped_in_flight);
    println!();

    for failure in &report.failed_expectations {
        println!("{} {}", "✗".red(), failure);
    }
    for mismatch in &report.mismatches {
        println!(
            "{} {} -> {}: forwarding costs {}, shortest path is {}",
            "✗".red(),
            mismatch.source,
            mismatch.destination,
            mismatch.actual,
            mismatch.expected
        );
    }

    if !report.passed() {
        anyhow::bail!(
            "{} expectation(s) failed, {} pair(s) not converged",
            report.failed_expectations.len(),
            report.mismatches.len()
        );
    }

    println!("{}", "All checks passed!".green().bold());
    Ok(())
}

fn cmd_check(path: PathBuf) -> Result<()> {
    let scenario = Scenario::load(&path)?;
    println!(
        "{} {}: {} node(s) declared, {} step(s), protocol {}",
        "✓".green(),
        scenario.display_name(),
        scenario.nodes.len(),
        scenario.steps.len(),
        scenario.protocol
    );
    Ok(())
}
