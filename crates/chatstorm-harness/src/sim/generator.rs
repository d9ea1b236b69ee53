//! Randomized behavior: chat text, action choice, think time.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Duration;

/// Characters generated text is drawn from.
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 ";

/// Probability that a tick switches channel instead of sending.
pub const SWITCH_PROBABILITY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Switch,
    Send,
}

/// Generated text plus the length drawn before trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub drawn_len: usize,
    pub text: String,
}

pub struct MessageGenerator<R = StdRng> {
    rng: R,
}

impl MessageGenerator<StdRng> {
    /// Deterministic when `seed` is set, OS-seeded otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl<R: Rng> MessageGenerator<R> {
    pub fn from_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Random text; the result is at most `max` characters after trimming.
    pub fn random_text(&mut self, min: usize, max: usize) -> String {
        self.draw_text(min, max).text
    }

    pub fn draw_text(&mut self, min: usize, max: usize) -> GeneratedText {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let drawn_len = self.rng.random_range(lo..=hi);

        let raw: String = (0..drawn_len)
            .map(|_| {
                let i = self.rng.random_range(0..ALPHABET.len());
                char::from(ALPHABET[i])
            })
            .collect();

        GeneratedText {
            drawn_len,
            text: raw.trim().to_string(),
        }
    }

    pub fn choose_action(&mut self) -> Action {
        if self.rng.random_bool(SWITCH_PROBABILITY) {
            Action::Switch
        } else {
            Action::Send
        }
    }

    pub fn think_time(&mut self, min_ms: u64, max_ms: u64) -> Duration {
        let (lo, hi) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        Duration::from_millis(self.rng.random_range(lo..=hi))
    }
}
