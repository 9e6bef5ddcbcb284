use navigator_lib::speech::{SpeechEngine, SpeechError, SpeechSignal, Utterance, Voice};
use tokio::sync::mpsc;

/// Speaks into the log. Stands in for a platform synthesizer on headless hosts.
///
/// A logged line is said in full, so every utterance reports [`SpeechSignal::Finished`] right away.
pub struct LogSpeechEngine {
    voices: Vec<Voice>,
    signals: mpsc::UnboundedSender<SpeechSignal>,
}

impl LogSpeechEngine {
    pub fn new(lang: &str, signals: mpsc::UnboundedSender<SpeechSignal>) -> Self {
        Self {
            voices: vec![Voice::new("Log Narrator Female", lang)],
            signals,
        }
    }
}

impl SpeechEngine for LogSpeechEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
        let voice = utterance.voice.as_ref().map(|voice| voice.name.as_str()).unwrap_or("default");
        tracing::info!(target: "speech", voice, "{}", utterance.text);

        if self.signals.send(SpeechSignal::Finished).is_err() {
            tracing::trace!(target: "speech", "Nobody listening for speech signals");
        }
        Ok(())
    }

    fn cancel(&mut self) {
        tracing::trace!(target: "speech", "Cancelled");
    }
}
