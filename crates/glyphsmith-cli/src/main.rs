//! Glyphsmith CLI - Command-line interface for the glyphsmith asset pipeline

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{generate, icon, round, sizes};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glyphsmith")]
#[command(about = "Generate app icon and asset bundles from a text prompt", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an asset bundle and write it as a zip archive
    Generate {
        /// Description of the app or icon to generate
        prompt: String,

        /// Comma-separated asset kinds (raster-icon, vector-icon, launch-screen, audio, animation, documentation)
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<String>,

        /// Backend to use (openai, mock)
        #[arg(long)]
        backend: Option<String>,

        /// Output file or directory (defaults to the current directory)
        #[arg(short, long)]
        output: Option<String>,

        /// Also render a tab-bar icon matrix
        #[arg(long)]
        tab_bar: bool,
    },

    /// Print the icon size requirements
    Sizes {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print a templated vector icon
    Icon {
        /// Prompt used to pick the icon color
        prompt: String,

        /// Icon role (e.g. navigation-back, ui-plus)
        #[arg(long)]
        role: String,
    },

    /// Round the corners of a PNG the way the app icon preview does
    Round {
        /// Input PNG
        input: String,

        /// Edge length of the output in pixels
        #[arg(long, default_value = "1024")]
        size: u32,

        /// Output PNG path
        #[arg(short, long, default_value = "rounded.png")]
        output: String,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            prompt,
            kinds,
            backend,
            output,
            tab_bar,
        } => generate::run(generate::GenerateArgs {
            prompt,
            kinds,
            backend,
            output,
            tab_bar,
        }),
        Commands::Sizes { format } => sizes::run(&format),
        Commands::Icon { prompt, role } => icon::run(&prompt, &role),
        Commands::Round {
            input,
            size,
            output,
        } => round::run(&input, size, &output),
    }
}
