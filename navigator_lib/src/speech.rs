use std::fmt;

use serde::{Deserialize, Serialize};

/// Voice names that read as a female or regional English voice on common platforms.
const PREFERRED_VOICE_NAMES: &[&str] = &[
    "Female",
    "Samantha",
    "Karen",
    "Victoria",
    "Fiona",
    "Moira",
    "Google UK English Female",
    "Microsoft Zira",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP 47 tag, e.g. "en-GB".
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>, voice: Option<Voice>) -> Self {
        Self {
            text: text.into(),
            voice,
            rate: 0.95,
            pitch: 1.2,
            volume: 1.,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechError {
    Synthesis(String),
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechError::Synthesis(reason) => write!(f, "Speech synthesis failed: {reason}"),
        }
    }
}

impl std::error::Error for SpeechError {}

/// Platform speech capability.
pub trait SpeechEngine {
    /// May be empty until the platform has loaded its voices.
    fn voices(&self) -> Vec<Voice>;

    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError>;

    fn cancel(&mut self);
}

/// Reported by the platform after an utterance was handed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechSignal {
    Finished,
    Failed,
    VoicesChanged,
}

/// Picks a voice: a preferred female/regional voice, then any voice in `lang`, then none.
pub fn select_voice(voices: &[Voice], lang: &str) -> Option<Voice> {
    let lang_prefix = format!("{lang}-");
    let in_lang = |voice: &Voice| voice.lang == lang || voice.lang.starts_with(&lang_prefix);

    let preferred = voices.iter().find(|voice| {
        let lower = voice.name.to_lowercase();
        PREFERRED_VOICE_NAMES.iter().any(|name| voice.name.contains(name))
            || (in_lang(*voice) && (lower.contains("female") || lower.contains("woman")))
    });

    preferred
        .or_else(|| voices.iter().find(|voice| in_lang(*voice)))
        .cloned()
}

/// Owns the single active utterance. Speaking always cancels whatever is in progress.
pub struct Narrator<E: SpeechEngine> {
    engine: E,
    lang: String,
    enabled: bool,
    speaking: bool,
    deferred: Option<String>,
}

impl<E: SpeechEngine> Narrator<E> {
    pub fn new(engine: E, lang: impl Into<String>, enabled: bool) -> Self {
        Self {
            engine,
            lang: lang.into(),
            enabled,
            speaking: false,
            deferred: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.stop();
        }
    }

    pub fn speak(&mut self, text: impl Into<String>) {
        if !self.enabled {
            return;
        }

        self.stop();

        let text = text.into();
        if self.engine.voices().is_empty() {
            // Spoken once the platform reports its voices.
            self.deferred = Some(text);
            return;
        }

        self.speak_now(text);
    }

    /// The platform finished loading its voice list.
    pub fn voices_changed(&mut self) {
        if self.engine.voices().is_empty() {
            return;
        }
        if let Some(text) = self.deferred.take() {
            if self.enabled {
                self.speak_now(text);
            }
        }
    }

    pub fn signal(&mut self, signal: SpeechSignal) {
        match signal {
            SpeechSignal::Finished => self.finished(),
            SpeechSignal::Failed => self.failed(),
            SpeechSignal::VoicesChanged => self.voices_changed(),
        }
    }

    pub fn stop(&mut self) {
        self.deferred = None;
        if self.speaking {
            self.engine.cancel();
            self.speaking = false;
        }
    }

    pub fn finished(&mut self) {
        self.speaking = false;
    }

    /// Synthesis failed after it started; nothing is being said anymore.
    pub fn failed(&mut self) {
        self.speaking = false;
    }

    fn speak_now(&mut self, text: String) {
        let voice = select_voice(&self.engine.voices(), &self.lang);
        match self.engine.speak(Utterance::new(text, voice)) {
            Ok(()) => self.speaking = true,
            Err(_) => self.speaking = false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeEngine {
        voices: Vec<Voice>,
        spoken: Vec<Utterance>,
        cancels: usize,
        fail: bool,
    }

    impl SpeechEngine for FakeEngine {
        fn voices(&self) -> Vec<Voice> {
            self.voices.clone()
        }

        fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
            if self.fail {
                return Err(SpeechError::Synthesis("no audio device".into()));
            }
            self.spoken.push(utterance);
            Ok(())
        }

        fn cancel(&mut self) {
            self.cancels += 1;
        }
    }

    fn english_voices() -> Vec<Voice> {
        vec![
            Voice::new("Daniel", "en-GB"),
            Voice::new("Google UK English Female", "en-GB"),
            Voice::new("Thomas", "fr-FR"),
        ]
    }

    #[test]
    fn prefers_female_voice() {
        let voice = select_voice(&english_voices(), "en").unwrap();
        assert_eq!(voice.name, "Google UK English Female");
    }

    #[test]
    fn falls_back_to_language_then_default() {
        let voices = vec![Voice::new("Thomas", "fr-FR"), Voice::new("Daniel", "en-GB")];
        assert_eq!(select_voice(&voices, "en").unwrap().name, "Daniel");
        assert_eq!(select_voice(&voices[..1], "en"), None);
        assert_eq!(select_voice(&[], "en"), None);
    }

    #[test]
    fn new_utterance_cancels_the_previous_one() {
        let engine = FakeEngine { voices: english_voices(), ..Default::default() };
        let mut narrator = Narrator::new(engine, "en", true);

        narrator.speak("first");
        narrator.speak("second");

        assert_eq!(narrator.engine().cancels, 1);
        assert_eq!(narrator.engine().spoken.len(), 2);
        assert!(narrator.is_speaking());
    }

    #[test]
    fn defers_until_voices_load_then_speaks_once() {
        let mut narrator = Narrator::new(FakeEngine::default(), "en", true);

        narrator.speak("stale");
        narrator.speak("hello");
        assert!(narrator.has_deferred());
        assert!(narrator.engine().spoken.is_empty());

        narrator.engine.voices = english_voices();
        narrator.voices_changed();
        narrator.voices_changed();

        let spoken: Vec<&str> = narrator.engine().spoken.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(spoken, vec!["hello"]);
        assert!(!narrator.has_deferred());
    }

    #[test]
    fn finished_utterances_are_not_cancelled() {
        let engine = FakeEngine { voices: english_voices(), ..Default::default() };
        let mut narrator = Narrator::new(engine, "en", true);

        narrator.speak("first");
        narrator.signal(SpeechSignal::Finished);
        assert!(!narrator.is_speaking());
        narrator.speak("second");
        assert_eq!(narrator.engine().cancels, 0);

        narrator.signal(SpeechSignal::Failed);
        narrator.stop();
        assert_eq!(narrator.engine().cancels, 0);

        narrator.speak("third");
        narrator.stop();
        assert_eq!(narrator.engine().cancels, 1);
    }

    #[test]
    fn synthesis_error_resets_speaking() {
        let engine = FakeEngine { voices: english_voices(), fail: true, ..Default::default() };
        let mut narrator = Narrator::new(engine, "en", true);

        narrator.speak("hello");
        assert!(!narrator.is_speaking());
    }

    #[test]
    fn disabled_narrator_is_silent() {
        let engine = FakeEngine { voices: english_voices(), ..Default::default() };
        let mut narrator = Narrator::new(engine, "en", false);

        narrator.speak("hello");
        assert!(narrator.engine().spoken.is_empty());
    }
}
