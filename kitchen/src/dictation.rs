use std::path::PathBuf;

use anyhow::{ensure, Result};
use async_trait::async_trait;
use tokio::process::Command;

use crate::form::RecipeForm;

/// Speech-to-text, when the device offers it.
#[async_trait]
pub trait Dictation: Send + Sync {
    /// Record until the speaker stops and return what was said.
    async fn transcribe(&self) -> Result<String>;
}

/// Dictation through command-line tools: `rec` (sox) to capture audio and a whisper
/// binary to transcribe it.
#[derive(Debug, Clone)]
pub struct CommandDictation {
    pub recorder: String,
    pub whisper: String,
    pub model: PathBuf,
}

impl Default for CommandDictation {
    fn default() -> Self {
        Self {
            recorder: "rec".into(),
            whisper: "whisper".into(),
            model: "models/ggml-small.bin".into(),
        }
    }
}

#[async_trait]
impl Dictation for CommandDictation {
    async fn transcribe(&self) -> Result<String> {
        let temp_dir = tempfile::tempdir()?;
        let temp_wav = temp_dir.path().join("speech.wav");
        // Stop after three seconds of silence.
        let status = Command::new(&self.recorder)
            .arg(&temp_wav)
            .args("rate 16k silence 1 0.1 3% 1 3.0 3%".split_whitespace())
            .status()
            .await?;
        ensure!(status.success(), "Dictation recording failed.");

        let output = Command::new(&self.whisper)
            .arg("-nt")
            .arg("-m")
            .arg(&self.model)
            .arg(&temp_wav)
            .output()
            .await?;
        ensure!(output.status.success(), "Transcription failed.");
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Which form field dictated text goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictationTarget {
    Notes,
    StepDescription(usize),
}

/// Dictate into a form field. Without a dictation capability this does nothing and
/// returns `false`, leaving the form untouched.
pub async fn dictate_into(
    form: &mut RecipeForm,
    dictation: Option<&dyn Dictation>,
    target: DictationTarget,
) -> Result<bool> {
    let Some(dictation) = dictation else {
        return Ok(false);
    };
    let text = dictation.transcribe().await?;
    if text.is_empty() {
        return Ok(false);
    }
    Ok(match target {
        DictationTarget::Notes => {
            form.append_notes(&text);
            true
        }
        DictationTarget::StepDescription(index) => form.append_step_description(index, &text),
    })
}
