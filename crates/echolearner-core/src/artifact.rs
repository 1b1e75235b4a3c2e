//! Audio artifacts and their data-URI wire form.

use crate::error::{EchoError, EchoResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Audio format carried by every artifact in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioFormat {
    /// MP3 format (lossy compression), as returned by the provider
    #[default]
    Mp3,
}

impl AudioFormat {
    /// Get file extension for the format
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
        }
    }

    /// Get the MIME type used in the data-URI wire form
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mp3",
        }
    }

    /// Detect format from a MIME type
    ///
    /// # Errors
    ///
    /// Returns an error if the MIME type is not supported
    pub fn from_mime_type(mime: &str) -> EchoResult<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "audio/mp3" | "audio/mpeg" => Ok(Self::Mp3),
            other => Err(EchoError::invalid_artifact(format!(
                "Unsupported audio format: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// Opaque audio payload returned by a synthesis provider.
///
/// Cloning is cheap; the payload is shared. Two artifacts synthesized from the
/// same text are independent values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    format: AudioFormat,
    payload: Arc<[u8]>,
}

impl AudioArtifact {
    /// Wrap raw (decoded) bytes in the system format
    #[must_use]
    pub fn from_bytes(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            format: AudioFormat::default(),
            payload: Arc::from(payload.into()),
        }
    }

    /// Decode a base64 payload without the data-URI wrapper
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is empty or not valid base64
    pub fn from_base64(encoded: &str) -> EchoResult<Self> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(EchoError::invalid_artifact("payload is empty"));
        }
        Ok(Self::from_bytes(STANDARD.decode(encoded)?))
    }

    /// Parse the `data:<mime>;base64,<payload>` wire form
    ///
    /// # Errors
    ///
    /// Returns an error if the wrapper is malformed, the format is not
    /// supported, or the payload is not valid base64
    pub fn from_data_uri(uri: &str) -> EchoResult<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| EchoError::invalid_artifact("missing 'data:' prefix"))?;
        let (header, encoded) = rest
            .split_once(',')
            .ok_or_else(|| EchoError::invalid_artifact("missing ',' separator"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| EchoError::invalid_artifact("payload is not base64 encoded"))?;

        let format = AudioFormat::from_mime_type(mime)?;
        let mut artifact = Self::from_base64(encoded)?;
        artifact.format = format;
        Ok(artifact)
    }

    /// Format tag of the payload
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Decoded payload bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Payload size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Base64 payload without the wrapper
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.payload)
    }

    /// Render the data-URI wire form
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), self.to_base64())
    }
}

/// Write an artifact's decoded payload to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the artifact is empty or the file cannot be written
pub async fn export_artifact<P: AsRef<Path>>(artifact: &AudioArtifact, path: P) -> EchoResult<()> {
    let path = path.as_ref();
    if artifact.is_empty() {
        return Err(EchoError::invalid_artifact("refusing to export an empty artifact"));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            EchoError::file(format!("Failed to create directory {}: {e}", parent.display()))
        })?;
    }

    debug!("Writing {} bytes of {} audio", artifact.len(), artifact.format());
    tokio::fs::write(path, artifact.bytes())
        .await
        .map_err(|e| EchoError::file(format!("Failed to write {}: {e}", path.display())))?;

    info!("Exported audio to {}", path.display());
    Ok(())
}
