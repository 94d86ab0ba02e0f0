use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lethe")]
#[command(about = "A post-link optimizer that inlines short-lived temporaries in generated JavaScript")]
#[command(version)]
pub struct Cli {
    /// JavaScript file to optimize
    pub input: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
