//                                                      ,--.,--.
//  ,---.,--.--. ,---.  ,---.  ,---. ,--.   ,--. ,--,--.|  ||  |,-.
// | .--'|  .--'| .-. |(  .-' (  .-' |  |.'.|  |' ,-.  ||  ||     /
// \ `--.|  |   ' '-' '.-'  `).-'  `)|   .'.   |\ '-'  ||  ||  \  \
//  `---'`--'    `---' `----' `----' '--'   '--' `--`--'`--'`--'`--'

// This one grew out of a pile of throwaway evaluation scripts. I believe the
// driver is now complete for benchmarking navigation policies against a
// reactive crowd, though I don't believe there's no room for improvement.

// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crosswalk::prelude::*;
use crosswalk::metrics::Summary;
use crosswalk::metrics::logger::EpisodeLogger;
use crosswalk::runner::{self, CompareOptions, DEFAULT_MAX_STEPS};

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use anyhow::Result;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};

use tracing_subscriber;

const RESULTS_DIR: &str = "results";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[arg(short, long, default_value = "weaver")]
        policy: String,
        #[arg(long, default_value = "configs/env.json")]
        env_config: PathBuf,
        #[arg(long, default_value = "configs/policy.json")]
        policy_config: PathBuf,
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
        #[arg(long)]
        il: bool,
        #[arg(long)]
        gpu: bool,
        #[arg(long)]
        visualize: bool,
        #[arg(long, default_value = "test")]
        phase: String,
        #[arg(short = 'c', long)]
        test_case: Option<u64>,
        #[arg(long)]
        square: bool,
        #[arg(long)]
        circle: bool,
        #[arg(long)]
        video_file: Option<PathBuf>,
        #[arg(long)]
        plot_file: Option<PathBuf>,
        #[arg(long)]
        teleop: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u64,
    },

    Compare {
        #[arg(short = 'P', long, default_value = "linear,social_force")]
        policies: String,
        #[arg(short, long, default_value_t = 100)]
        episodes: u64,
        #[arg(long, default_value = "configs/env.json")]
        env_config: PathBuf,
        #[arg(long, default_value = "configs/policy.json")]
        policy_config: PathBuf,
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
        #[arg(long)]
        il: bool,
        #[arg(long)]
        gpu: bool,
        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u64,
    },

    List,
}

fn main() -> Result<()> {
    let program_start = Instant::now(); // Global timer for end time.

    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run {
            policy,
            env_config,
            policy_config,
            model_dir,
            il,
            gpu,
            visualize,
            phase,
            test_case,
            square,
            circle,
            video_file,
            plot_file,
            teleop,
            max_steps,
        } => run_episode(RunArgs {
            policy,
            env_config,
            policy_config,
            model_dir,
            il,
            gpu,
            visualize,
            phase,
            test_case,
            square,
            circle,
            video_file,
            plot_file,
            teleop,
            max_steps,
        }),

        Commands::Compare {
            policies,
            episodes,
            env_config,
            policy_config,
            model_dir,
            il,
            gpu,
            max_steps,
        } => compare_policies(
            policies,
            episodes,
            env_config,
            policy_config,
            model_dir,
            il,
            gpu,
            max_steps,
        ),

        Commands::List => {
            println!("\nAvailable Navigation Policies");

            for policy in PolicyRegistry::global().list() {
                println!("  - {}", policy);
            }

            println!("\nUsage: cargo run -- run --policy <name>");
            println!("Example: cargo run -- run --policy social_force\n");

            Ok(())
        }
    };

    if let Err(err) = result {
        // Asking for a trained policy without a model directory is a usage
        // mistake, so it gets the usage treatment.
        if matches!(err.downcast_ref::<Error>(), Some(Error::MissingModelDir(_))) {
            Cli::command()
                .error(ErrorKind::MissingRequiredArgument, err.to_string())
                .exit();
        }
        return Err(err);
    }

    let total_time = program_start.elapsed();
    info!("Total runtime: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

struct RunArgs {
    policy: String,
    env_config: PathBuf,
    policy_config: PathBuf,
    model_dir: Option<PathBuf>,
    il: bool,
    gpu: bool,
    visualize: bool,
    phase: String,
    test_case: Option<u64>,
    square: bool,
    circle: bool,
    video_file: Option<PathBuf>,
    plot_file: Option<PathBuf>,
    teleop: Option<PathBuf>,
    max_steps: u64,
}

fn run_episode(args: RunArgs) -> Result<()> {
    let phase: Phase = args.phase.parse()?;

    let options = RunOptions {
        env_config: args.env_config,
        policy_config: args.policy_config,
        policy: args.policy,
        model_dir: args.model_dir,
        il: args.il,
        gpu: args.gpu,
        visualize: args.visualize,
        phase,
        test_case: args.test_case,
        square: args.square,
        circle: args.circle,
        video_file: args.video_file,
        plot_file: args.plot_file,
        teleop: args.teleop,
        max_steps: args.max_steps,
    };

    info!("Crosswalk: Single Episode");

    let runner = ExperimentRunner::new(options);
    runner.run()?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn compare_policies(
    policies_str: String,
    episodes: u64,
    env_config: PathBuf,
    policy_config: PathBuf,
    model_dir: Option<PathBuf>,
    il: bool,
    gpu: bool,
    max_steps: u64,
) -> Result<()> {
    let policy_names: Vec<String> = policies_str
        .split(',')
        .map(|s| s.trim().to_string())
        .collect();

    info!("Crosswalk: Comparison");
    info!("");
    info!("Policies: {}", policy_names.join(", "));
    info!("Episodes per policy: {}", episodes);
    info!("");

    let options = CompareOptions {
        env_config,
        policy_config,
        model_dir,
        il,
        gpu,
        policies: policy_names,
        episodes,
        max_steps,
    };

    let outcome = runner::compare(&options)?;
    comparison_table(&outcome.summaries);

    std::fs::create_dir_all(RESULTS_DIR)?;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    let episodes_path = format!("{}/compare_{}.csv", RESULTS_DIR, timestamp);
    let mut logger = EpisodeLogger::new(&episodes_path)?;
    logger.log_batch(&outcome.records)?;
    info!("Episode log saved to: {}", episodes_path);

    let summary_path = format!("{}/compare_{}_summary.json", RESULTS_DIR, timestamp);
    std::fs::write(&summary_path, serde_json::to_string_pretty(&outcome.summaries)?)?;
    info!("Summary saved to: {}", summary_path);

    Ok(())
}

// TODO: Make this less prone to break
fn comparison_table(summaries: &[Summary]) {
    println!("\n╔═══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                               POLICY COMPARISON                               ║");
    println!("╠═══════════════╦═══════════╦═══════════╦═══════════╦════════════╦══════════════╣");
    println!("║ Policy        ║ Success   ║ Collision ║ Timeout   ║ Nav Time   ║ Min Separ.   ║");
    println!("║               ║ (%)       ║ (%)       ║ (%)       ║ (s)        ║ (m)          ║");
    println!("╠═══════════════╬═══════════╬═══════════╬═══════════╬════════════╬══════════════╣");

    for summary in summaries {
        println!(
            "║ {:<13} ║ {:>8.1}% ║ {:>8.1}% ║ {:>8.1}% ║ {:>10.2} ║ {:>12.3} ║",
            summary.policy,
            summary.success_rate * 100.0,
            summary.collision_rate * 100.0,
            summary.timeout_rate * 100.0,
            summary.avg_nav_time,
            summary.avg_min_separation,
        );
    }

    println!("╚═══════════════╩═══════════╩═══════════╩═══════════╩════════════╩══════════════╝\n");

    if let Some(best) = summaries
        .iter()
        .max_by(|a, b| a.success_rate.total_cmp(&b.success_rate))
    {
        println!(
            "Top Success: {} ({:.1}%)",
            best.policy,
            best.success_rate * 100.0
        ); // TODO: Make precision a flag
    }

    if let Some(fastest) = summaries
        .iter()
        .min_by(|a, b| a.avg_nav_time.total_cmp(&b.avg_nav_time))
    {
        println!("Fastest: {} ({:.2}s)", fastest.policy, fastest.avg_nav_time);
    }

    if let Some(safest) = summaries
        .iter()
        .max_by(|a, b| a.avg_min_separation.total_cmp(&b.avg_min_separation))
    {
        println!(
            "Widest Berth: {} ({:.3}m)",
            safest.policy, safest.avg_min_separation
        );
    }

    println!();
}
