// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
//   1. `train`  : trains the masked-LM model
//   2. `preview`: prints masked examples from the pipeline
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PreviewArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "mlm-recycle",
    version,
    about = "Masked-LM pretraining on mixed wiki + book text, with feed-forward weight recycling."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. Routes only, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Preview(args) => run_preview(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}' + '{}'", args.corpus.wiki_dir, args.corpus.book_file);
    let report = TrainUseCase::new(args.into()).execute()?;

    match report.eval_losses.last() {
        Some((step, loss)) => println!("Training complete. Last eval loss {loss:.4} at step {step}."),
        None => println!("Training complete."),
    }
    if report.prunes > 0 {
        println!("Recycled feed-forward weights {} times.", report.prunes);
    }
    if report.retrain_steps > 0 {
        println!("Ran {} retrain steps on recycled weights.", report.retrain_steps);
    }
    Ok(())
}

fn run_preview(args: PreviewArgs) -> Result<()> {
    use crate::application::preview_use_case::PreviewUseCase;

    let count    = args.count;
    let previews = PreviewUseCase::new(args.corpus.into(), count).execute()?;

    for (i, p) in previews.iter().enumerate() {
        println!("── example {} ── {} masked positions {:?}", i, p.positions.len(), p.positions);
        println!("original: {}", p.original);
        println!("masked:   {}\n", p.masked);
    }
    Ok(())
}
