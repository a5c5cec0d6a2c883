use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

mod cli;
mod config_file;
mod quantize;
mod utils;

use cli::Args;
use quantize::{CommandSpec, QuantizeConfig, QuantizeEngine};
use utils::{format_duration, verbose_println};

fn main() -> Result<()> {
    let mut args = Args::parse();

    // Print banner
    println!(
        "{}",
        style("pngquant-batch - Batch PNG color quantization")
            .bold()
            .blue()
    );
    println!();

    args.load_and_merge_config()?;

    // Resolve the configuration; violations are fatal before any file is
    // touched.
    let policy = args.parse_policy().map_err(|msg| anyhow::anyhow!(msg))?;
    let colors = args.parse_colors().map_err(|msg| anyhow::anyhow!(msg))?;

    let config = QuantizeConfig {
        source_dir: args.source_dir.clone(),
        dest_dir: args.dest_dir(),
        overwrite: args.overwrite,
        command: CommandSpec {
            program: args.command.clone(),
            colors,
            timeout: args.timeout(),
        },
        policy,
        include: args.include.clone(),
        exclude: args.exclude.clone(),
        verbose: args.verbose,
    };

    if config.verbose {
        println!("{}", style("Configuration:").bold());
        println!("  Source directory: {}", config.source_dir.display());
        println!("  Destination directory: {}", config.dest_dir.display());
        println!("  Command: {}", config.command.program);
        println!("  Colors: {}", config.command.colors);
        match config.command.timeout {
            Some(timeout) => println!("  Timeout: {}", format_duration(timeout)),
            None => println!("  Timeout: disabled"),
        }
        println!("  Policy: {:?}", config.policy);
        println!("  Overwrite: {}", config.overwrite);
        if !config.include.is_empty() {
            println!("  Include patterns: {:?}", config.include);
        }
        if !config.exclude.is_empty() {
            println!("  Exclude patterns: {:?}", config.exclude);
        }
        println!();
    }

    let engine = QuantizeEngine::new(config)?;
    let files = engine.discover_files()?;

    if files.is_empty() {
        println!(
            "{}",
            style("No candidate files found in the source directory").yellow()
        );
        return Ok(());
    }

    let progress = if args.verbose {
        // Per-file verbose lines and a redrawing bar do not mix well.
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
            )?
            .progress_chars("#>-"),
        );
        pb.set_message("Processing files");
        pb
    };

    let outcome = engine.run(&files, &progress)?;
    progress.finish_and_clear();

    verbose_println(args.verbose, "Batch complete");
    println!();

    // Print results summary
    println!("{}", style("Results Summary:").bold().green());
    println!(
        "  Processed: {}",
        style(outcome.processed).bold().green()
    );
    println!("  Copied: {}", style(outcome.copied).bold().cyan());
    if outcome.skipped > 0 {
        println!("  Skipped: {}", style(outcome.skipped).bold().yellow());
    }
    if outcome.failed > 0 {
        println!("  Failed: {}", style(outcome.failed).bold().red());
    }
    println!(
        "  Total duration: {}",
        style(format_duration(outcome.duration)).bold()
    );
    println!();

    if outcome.failed > 0 {
        return Err(anyhow::anyhow!(outcome.failure_message()));
    }

    println!("{}", outcome.success_message());
    Ok(())
}
