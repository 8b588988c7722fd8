//! Command-line driver for the gofem engine (§6, "CLI surface" /
//! SPEC_FULL §A.2-A.3): reads a TOML simulation document and a JSON mesh
//! dump, builds a `gofem_core::Fem`, and drives it through its stages.
//! The engine itself exposes no CLI (`NewFEM`/`Run`/`SetStage` are a
//! programmatic contract); this binary is the thin wrapper a real
//! deployment would put in front of them.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use gofem_core::{Fem, FemOptions};
use gofem_model::{Mesh, Simulation};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse simulation document {path}: {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse mesh document {path}: {source}")]
    ParseMesh {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Fem(#[from] gofem_core::FemError),
}

#[derive(Parser)]
#[command(name = "gofem", version, about = "Transient coupled-physics FE solver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every non-skipped stage of a simulation to completion.
    Run(RunArgs),
    /// Activate a single stage's equations/BCs without solving.
    Check(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the TOML simulation document (§6, `Simulation`).
    sim: PathBuf,
    /// Path to a JSON mesh dump (`{"verts": {...}, "cells": {...}}`).
    mesh: PathBuf,
    /// Overrides `data.key` as the checkpoint/summary file prefix.
    #[arg(long)]
    alias: Option<String>,
    /// Deletes any pre-existing checkpoint/summary files in `dirout`.
    #[arg(long)]
    erase_prev: bool,
    /// Loads a prior run's summary file instead of starting fresh.
    #[arg(long)]
    read_summary: bool,
    /// Stage index to act on for `check`; ignored by `run`.
    #[arg(long, default_value_t = 0)]
    stage: usize,
}

fn load_simulation(path: &PathBuf) -> Result<Simulation, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| CliError::ParseToml {
        path: path.clone(),
        source,
    })
}

fn load_mesh(path: &PathBuf) -> Result<Mesh, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::ParseMesh {
        path: path.clone(),
        source,
    })
}

fn run(args: &RunArgs) -> Result<(), CliError> {
    let sim = load_simulation(&args.sim)?;
    let mesh = load_mesh(&args.mesh)?;
    let opts = FemOptions {
        alias: args.alias.clone(),
        erase_prev: args.erase_prev,
        read_summary: args.read_summary,
        allow_parallel: false,
        verbose: true,
    };
    let mut fem = Fem::new(sim, mesh, opts)?;
    let reports = fem.run()?;
    for (i, report) in reports.iter().enumerate() {
        println!(
            "stage {i}: {} steps, {} outputs",
            report.steps.len(),
            report.output_times.len()
        );
    }
    Ok(())
}

fn check(args: &RunArgs) -> Result<(), CliError> {
    let sim = load_simulation(&args.sim)?;
    let mesh = load_mesh(&args.mesh)?;
    let opts = FemOptions {
        alias: args.alias.clone(),
        erase_prev: args.erase_prev,
        read_summary: args.read_summary,
        allow_parallel: false,
        verbose: true,
    };
    let mut fem = Fem::new(sim, mesh, opts)?;
    fem.solve_one_stage(args.stage, true)?;
    println!("stage {} ok, Ny = {}", args.stage, fem.domain().ny());
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Run(args) => run(args),
        Command::Check(args) => check(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "gofem run failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
