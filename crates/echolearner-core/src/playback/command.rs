//! Playback through an external player process.

use super::AudioSink;
use crate::artifact::AudioArtifact;
use crate::error::{EchoError, EchoResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Default player invocation; reads MP3 from stdin
pub const DEFAULT_PLAYER: &[&str] = &["mpg123", "-q", "-"];

/// Sink that pipes each artifact into a player's stdin and waits for it to exit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    /// Create a sink running `program` with `args`
    #[must_use]
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build a sink from a full command line (program first)
    ///
    /// # Errors
    ///
    /// Returns an error if `command` is empty
    pub fn from_command_line<S: AsRef<str>>(command: &[S]) -> EchoResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| EchoError::configuration("player command is empty"))?;
        Ok(Self::new(
            program.as_ref(),
            args.iter().map(|a| a.as_ref().to_string()).collect(),
        ))
    }

    /// Program name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for CommandSink {
    fn default() -> Self {
        Self::new(
            DEFAULT_PLAYER[0],
            DEFAULT_PLAYER[1..].iter().map(ToString::to_string).collect(),
        )
    }
}

#[async_trait]
impl AudioSink for CommandSink {
    async fn play(&self, artifact: &AudioArtifact) -> EchoResult<()> {
        if artifact.is_empty() {
            return Err(EchoError::playback("artifact has no audio"));
        }

        debug!(program = %self.program, bytes = artifact.len(), "Spawning player");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EchoError::playback(format!("cannot start {}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(artifact.bytes())
                .await
                .map_err(|e| EchoError::playback(format!("player closed its input: {e}")))?;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EchoError::playback(e.to_string()))?;
        if !status.success() {
            return Err(EchoError::playback(format!("{} exited with {status}", self.program)));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
