mod ast;
mod cli;
mod deps;
mod emit;
mod errors;
mod fold;
mod live;
mod parse;
mod process;
mod rewrite;
mod vars;
mod walk;

use crate::errors::LetheResult;
use clap::Parser;
use cli::Cli;
use console::style;
use std::fs;
use std::time::Instant;
use tracing_subscriber::fmt::time;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

fn init_tracing() {
    // stdout carries the optimized program; diagnostics go to stderr
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(time::UtcTime::rfc_3339());

    Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt_layer)
        .init();
}

fn main() -> LetheResult<()> {
    let now = Instant::now();
    init_tracing();

    tracing::debug!("CLI starting up");
    let cli = Cli::parse();

    let src = fs::read_to_string(&cli.input)?;
    let (out, stats) = process::process_source(&src)?;

    match &cli.output {
        Some(path) => fs::write(path, &out)?,
        None => print!("{out}"),
    }

    eprintln!(
        "{} {} function(s), {} binding(s) inlined, in {:.3}s.",
        style("Optimized").green().bold(),
        stats.functions,
        stats.eliminated,
        now.elapsed().as_secs_f32()
    );
    Ok(())
}

#[test]
fn end_to_end_over_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("module.js");
    std::fs::write(
        &input,
        "// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"run\"]\nfunction run(x) { var t = x + 1; return t; }\n",
    )
    .unwrap();

    let src = std::fs::read_to_string(&input).unwrap();
    let (out, stats) = process::process_source(&src).unwrap();
    assert_eq!(stats.eliminated, 1);

    let output = dir.path().join("module.opt.js");
    std::fs::write(&output, &out).unwrap();
    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("function run(x) {\n  return x + 1;\n}\n"));
    assert!(written.ends_with("// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"run\"]\n"));
}

#[test]
fn missing_input_surfaces_an_io_error() {
    let err = fs::read_to_string("definitely/not/here.js").unwrap_err();
    let lethe: errors::LetheError = err.into();
    assert!(matches!(lethe, errors::LetheError::Io(_)));
}
