mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arcane", about = "Arcane physics engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene to completion and print each body's final pose
    Run {
        /// Path to a scene JSON file; falls back to a built-in demo scene
        #[arg(long)]
        scene: Option<String>,
        /// Number of fixed steps to simulate
        #[arg(long, default_value_t = 180)]
        steps: u32,
        /// Seconds per step
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f32,
        /// Print every body's pose after every step instead of just the last
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scene, steps, dt, trace } => commands::run::run(scene, steps, dt, trace),
    }
}
