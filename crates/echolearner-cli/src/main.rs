mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use echolearner_core::{
    export_artifact, BlockId, DocumentStore, EchoConfig, Orchestrator, PlaybackSequencer,
    ProviderKind, SinkKind,
};
use tracing_subscriber::EnvFilter;

use crate::script::Script;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let script = match &cli.script {
        Some(path) => Script::load(path)?,
        None => {
            tracing::info!("no script given, using the built-in demo dialogue");
            Script::demo()
        }
    };
    let store = Arc::new(DocumentStore::new(
        script.into_document(&config.default_voice),
    ));
    let orchestrator = Arc::new(config.build_orchestrator(store)?);

    match cli.command {
        Commands::Synthesize { output } => run_synthesize(&orchestrator, &output).await,
        Commands::Generate { block } => run_generate(&orchestrator, block).await,
        Commands::Play { block } => {
            let sequencer = PlaybackSequencer::new(orchestrator.clone(), config.build_sink()?);
            run_play(&orchestrator, &sequencer, block).await
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EchoConfig> {
    let mut config =
        EchoConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if cli.command.plays_through_speakers() && cli.speakers {
        config.playback.sink = SinkKind::Command;
    }
    config.validate()?;
    tracing::debug!(?config.provider, ?config.merge, "configuration ready");
    Ok(config)
}

async fn run_synthesize(orchestrator: &Orchestrator, output: &Path) -> anyhow::Result<()> {
    tracing::info!(?output, "synthesizing document");
    let audio = orchestrator
        .synthesize_document()
        .await
        .context("synthesizing document")?;
    export_artifact(&audio, output).await?;
    println!("wrote {} bytes to {}", audio.len(), output.display());
    Ok(())
}

async fn run_generate(orchestrator: &Orchestrator, position: usize) -> anyhow::Result<()> {
    let block_id = block_at(orchestrator, position)?;
    let result = orchestrator.generate_block(block_id).await;
    print_block(orchestrator, block_id);
    result.with_context(|| format!("generating block {position}"))
}

async fn run_play(
    orchestrator: &Orchestrator,
    sequencer: &PlaybackSequencer,
    position: Option<usize>,
) -> anyhow::Result<()> {
    match position {
        Some(position) => {
            let block_id = block_at(orchestrator, position)?;
            sequencer
                .play_block(block_id)
                .await
                .with_context(|| format!("playing block {position}"))
        }
        None => sequencer.play_all().await.context("playing document"),
    }
}

/// Blocks are numbered from 1 on the command line
fn block_at(orchestrator: &Orchestrator, position: usize) -> anyhow::Result<BlockId> {
    let snapshot = orchestrator.snapshot();
    position
        .checked_sub(1)
        .and_then(|index| snapshot.blocks().nth(index))
        .map(|block| block.id)
        .with_context(|| format!("no block {position}; the script has {}", snapshot.len()))
}

fn print_block(orchestrator: &Orchestrator, block_id: BlockId) {
    let snapshot = orchestrator.snapshot();
    let Some(block) = snapshot.block(block_id) else {
        return;
    };
    println!("voice {}", block.voice);
    for (i, sentence) in block.sentences.iter().enumerate() {
        println!("  {}. [{}] {}", i + 1, sentence.status.label(), sentence.text.trim());
        if let Some(err) = sentence.status.error() {
            println!("     {err}");
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn dialogue scripts into listening material", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "ECHOLEARNER_CONFIG")]
    config: Option<PathBuf>,

    /// Script file; the built-in demo dialogue is used when omitted
    #[arg(short, long, global = true)]
    script: Option<PathBuf>,

    /// Override the synthesis provider (gateway, volcengine, mock)
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    /// Play through the configured player command instead of the simulated device
    #[arg(long, global = true)]
    speakers: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize every sentence and write the merged audio to a file.
    Synthesize {
        /// Output path for the merged MP3.
        #[arg(short, long, default_value = "echolearner.mp3")]
        output: PathBuf,
    },
    /// Generate one block and print the status of each sentence.
    Generate {
        /// Block number, starting at 1.
        block: usize,
    },
    /// Play one block, or the whole script, generating stale sentences first.
    Play {
        /// Block number, starting at 1; plays every block when omitted.
        #[arg(short, long)]
        block: Option<usize>,
    },
}

impl Commands {
    const fn plays_through_speakers(&self) -> bool {
        matches!(self, Self::Play { .. })
    }
}
