//! Dialogue scripts: the TOML file format and the built-in demo.

use anyhow::Context;
use echolearner_core::document::DEFAULT_PROSODY;
use echolearner_core::{Block, Document, Sentence, VoiceId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A whole script: blocks in playback order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub blocks: Vec<ScriptBlock>,
}

/// One speaker turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptBlock {
    /// Falls back to the configured default voice
    #[serde(default)]
    pub voice: Option<VoiceId>,
    #[serde(default)]
    pub sentences: Vec<ScriptSentence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSentence {
    pub text: String,
    #[serde(default = "default_prosody")]
    pub pitch: String,
    #[serde(default = "default_prosody")]
    pub speed: String,
}

fn default_prosody() -> String {
    DEFAULT_PROSODY.to_string()
}

impl ScriptSentence {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            pitch: default_prosody(),
            speed: default_prosody(),
        }
    }
}

impl Script {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing script {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let script: Self = toml::from_str(text)?;
        anyhow::ensure!(!script.blocks.is_empty(), "script has no blocks");
        Ok(script)
    }

    /// Four-turn dialogue shown on first launch
    pub fn demo() -> Self {
        let turn = |voice: &str, sentences: Vec<ScriptSentence>| ScriptBlock {
            voice: Some(VoiceId::from(voice)),
            sentences,
        };
        let mut normal = ScriptSentence::plain(
            "EchoLearner is built for language learners like you. You can pick a voice, \
             type in any text, and instantly turn it into speech.",
        );
        normal.pitch = "normal".to_string();
        normal.speed = "normal".to_string();

        Self {
            blocks: vec![
                turn(
                    "BV138_streaming",
                    vec![ScriptSentence::plain(
                        "What's the purpose of this project? What does it do?",
                    )],
                ),
                turn(
                    "BV027_streaming",
                    vec![
                        normal,
                        ScriptSentence::plain(
                            "It's a great way to create your own listening materials.",
                        ),
                    ],
                ),
                turn(
                    "BV138_streaming",
                    vec![ScriptSentence::plain(
                        "uh...  So, you mean, I can use it to practice English listening?",
                    )],
                ),
                turn(
                    "BV027_streaming",
                    vec![ScriptSentence::plain(
                        "Absolutely. You can adjust the speed, pitch, and voice style, perfect \
                         for training your ears, preparing dialogues, or even building your own \
                         study content.",
                    )],
                ),
            ],
        }
    }

    /// Build a fresh document; every sentence starts idle
    pub fn into_document(self, default_voice: &VoiceId) -> Document {
        let blocks = self
            .blocks
            .into_iter()
            .map(|block| {
                let voice = block.voice.unwrap_or_else(|| default_voice.clone());
                if block.sentences.is_empty() {
                    return Block::new(voice);
                }
                let sentences = block
                    .sentences
                    .into_iter()
                    .map(|s| {
                        Sentence::new()
                            .with_text(s.text)
                            .with_pitch(s.pitch)
                            .with_speed(s.speed)
                    })
                    .collect();
                Block::with_sentences(voice, sentences)
            })
            .collect();
        Document::with_blocks(blocks)
    }
}
