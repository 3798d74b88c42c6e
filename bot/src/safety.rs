//! Crisis-phrase handling. Messages containing alarming phrases get a
//! crisis-resources reply, except that senders with negative karma may draw
//! an insult instead, gated by a probability that escalates with time since
//! the last insult.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

pub const ALARMING_WORDS: &[&str] = &[
    "kill myself",
    "kms",
    "am going to commit suicide",
    "am gonna commit suicide",
    "i will commit suicide",
    "i want to commit suicide",
    "i wanna commit suicide",
    "shoot myself",
    "hang myself",
    "drown myself",
    "i should die",
    "end my life",
    "i want to die",
    "i crave death",
    "sewer slide",
    "i hope i die",
    "decapitate myself",
    "stab myself",
    "im gonna jump",
    "blow myself up",
    "i wish for the sweet release of death",
];

pub const CRISIS_MESSAGE: &str = "Please check out crisis resources. If you're in danger, call \
    emergency services immediately or text HOME to 741741 for free crisis counseling.";

const ESCALATION_WINDOW: Duration = Duration::from_secs(48 * 3600);
const MIN_CHANCE: f64 = 0.001;
const MAX_CHANCE: f64 = 0.1;

pub fn contains_alarming_words(content: &str) -> bool {
    let lowered = content.to_lowercase();
    ALARMING_WORDS.iter().any(|word| lowered.contains(word))
}

/// Chance scales linearly from `MIN_CHANCE` right after an insult to
/// `MAX_CHANCE` once the full window has elapsed.
pub(crate) fn escalation_chance(elapsed: Duration) -> f64 {
    let scaled = MIN_CHANCE
        + (MAX_CHANCE - MIN_CHANCE) * (elapsed.as_secs_f64() / ESCALATION_WINDOW.as_secs_f64());
    scaled.min(MAX_CHANCE)
}

/// Escalating-probability trigger. The timestamp of the last fired insult is
/// explicit state here; with no prior insult the trigger starts at the full
/// window (maximum chance), matching a cold start.
pub struct InsultTrigger {
    last_insult: Mutex<Option<Instant>>,
}

impl InsultTrigger {
    pub fn new() -> Self {
        InsultTrigger {
            last_insult: Mutex::new(None),
        }
    }

    /// Roll the dice; on success the timer resets.
    pub async fn roll(&self) -> bool {
        let mut last_insult = self.last_insult.lock().await;
        let elapsed = last_insult
            .map(|t| t.elapsed())
            .unwrap_or(ESCALATION_WINDOW);
        let chance = escalation_chance(elapsed);
        let sample = rand::random::<f64>();
        tracing::info!("Insult chance check: {sample:.3} vs {chance:.3}");
        if sample < chance {
            *last_insult = Some(Instant::now());
            true
        } else {
            false
        }
    }
}

impl Default for InsultTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chance_starts_at_floor() {
        assert!((escalation_chance(Duration::ZERO) - MIN_CHANCE).abs() < 1e-9);
    }

    #[test]
    fn chance_caps_at_ceiling() {
        assert_eq!(escalation_chance(ESCALATION_WINDOW), MAX_CHANCE);
        assert_eq!(escalation_chance(ESCALATION_WINDOW * 4), MAX_CHANCE);
    }

    #[test]
    fn chance_grows_linearly() {
        let midpoint = escalation_chance(ESCALATION_WINDOW / 2);
        let expected = MIN_CHANCE + (MAX_CHANCE - MIN_CHANCE) / 2.0;
        assert!((midpoint - expected).abs() < 1e-6);
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert!(contains_alarming_words("I want to DIE"));
        assert!(!contains_alarming_words("what a great day"));
    }
}
