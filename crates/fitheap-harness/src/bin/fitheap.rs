//! CLI entrypoint for the fitheap trace harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fitheap_core::{FreePolicy, HEADER_SIZE};
use fitheap_harness::fixtures::{TraceFixture, demo_fixture};
use fitheap_harness::oplog::LogEmitter;
use fitheap_harness::report::render_report;
use fitheap_harness::runner::TraceRunner;

#[derive(Debug, Parser)]
#[command(name = "fitheap")]
#[command(about = "Trace runner and verifier for the fitheap arena allocator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the built-in walkthrough trace and print its transcript
    Demo {
        /// Free policy (lenient or strict)
        #[arg(long, default_value = "lenient")]
        policy: String,
    },
    /// Execute a trace fixture and print its transcript
    Run {
        /// Trace fixture JSON path
        #[arg(long)]
        script: PathBuf,
        /// Free policy override; the fixture's own policy applies when omitted
        #[arg(long)]
        policy: Option<String>,
        /// Mirror lifecycle events to a JSONL file
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Verify a trace fixture against its pinned transcript
    Verify {
        /// Trace fixture JSON path
        #[arg(long)]
        fixture: PathBuf,
        /// Free policy override
        #[arg(long)]
        policy: Option<String>,
        /// Write a markdown report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the header geometry constants
    Info,
}

fn runner_for(policy: Option<&str>) -> TraceRunner {
    match policy {
        Some(name) => TraceRunner::with_policy(FreePolicy::from_str_loose(name)),
        None => TraceRunner::new(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Demo { policy } => {
            let fixture = demo_fixture();
            let outcome = runner_for(Some(&policy)).run(&fixture)?;
            print!("{}", outcome.transcript);
            eprintln!(
                "Ran {} ops over a {}-byte arena, digest {}",
                outcome.ops.len(),
                fixture.arena_bytes,
                outcome.digest
            );
        }
        Command::Run {
            script,
            policy,
            log,
        } => {
            let fixture = TraceFixture::from_file(&script)?;
            let outcome = runner_for(policy.as_deref()).run(&fixture)?;
            if let Some(path) = log {
                let mut emitter = LogEmitter::to_file(&path, &outcome.name)?;
                for event in &outcome.events {
                    emitter.emit_heap_event(event)?;
                }
                emitter.flush()?;
                eprintln!(
                    "Wrote {} log lines to {}",
                    outcome.events.len(),
                    path.display()
                );
            }
            print!("{}", outcome.transcript);
            eprintln!(
                "Trace '{}' complete: policy={}, ops={}, failed={}",
                outcome.name,
                outcome.policy,
                outcome.ops.len(),
                outcome.failures
            );
            if outcome.failures > 0 {
                for record in outcome.ops.iter().filter(|record| !record.ok) {
                    eprintln!(
                        "  op {}: {} -> {}",
                        record.index, record.action, record.outcome
                    );
                }
            }
        }
        Command::Verify {
            fixture,
            policy,
            report,
        } => {
            let fixture = TraceFixture::from_file(&fixture)?;
            let (outcome, result) = runner_for(policy.as_deref()).verify(&fixture)?;
            eprintln!(
                "Verification complete: case={}, passed={}, digest={}",
                result.case_name, result.passed, outcome.digest
            );
            if let Some(path) = report {
                eprintln!("Writing report to {}", path.display());
                std::fs::write(
                    &path,
                    render_report("fitheap verification", std::slice::from_ref(&result)),
                )?;
            }
            if !result.passed {
                if let Some(diff) = &result.diff {
                    eprint!("{diff}");
                }
                return Err(
                    format!("trace '{}' diverged from its expectation", result.case_name).into(),
                );
            }
        }
        Command::Info => {
            println!("header_size\t{HEADER_SIZE}");
            println!("minimum_arena\t{HEADER_SIZE}");
            println!("next_sentinel\tu64::MAX");
            println!("record_layout\tcapacity:u64 le, next:u64 le, status:u8, reserved x7");
        }
    }

    Ok(())
}
