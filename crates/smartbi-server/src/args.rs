use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "smartbi",
    about = "Turn a database or a CSV/SQL file into a business-insights narrative",
    version,
    after_help = "Examples:\n  smartbi                                  # serve on 0.0.0.0:8000\n  smartbi --port 9000 --model gemini-2.5-flash\n  smartbi --config deploy/smartbi.toml\n\nSet GEMINI_API_KEY, ANTHROPIC_API_KEY or OPENAI_API_KEY to enable analysis."
)]
pub struct Cli {
    /// Path to smartbi.toml (default: ./smartbi.toml if present)
    #[arg(short, long, env = "SMARTBI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Model name override for the configured provider
    #[arg(long)]
    pub model: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
