//! Extra emoji flair appended to canned replies.

use rand::seq::IndexedRandom;
use rand::Rng;

pub const RISKY_PALETTE: &[&str] = &[
    "🔥", "💥", "⚠️", "🚨", "☠️", "🫠", "🤯", "😱", "🧨", "💣", "🤦‍♂️", "🙈",
];

pub const SAFE_PALETTE: &[&str] = &[
    "✅", "🚀", "🎯", "🔔", "🌈", "💪", "👏", "🙌", "🥳", "🏆", "🌟", "✨",
];

/// Coder on fire.
pub const RISKY_COMBO: &str = "🔥👨‍💻🔥";
/// Smooth sailing.
pub const SAFE_COMBO: &str = "🏄‍♂️🌊";

const COMBO_PROBABILITY: f64 = 0.3;

/// Appends 1-2 palette emoji (and sometimes a combo) to a message.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmojiEmbellisher;

impl EmojiEmbellisher {
    pub fn palette(risky: bool) -> &'static [&'static str] {
        if risky {
            RISKY_PALETTE
        } else {
            SAFE_PALETTE
        }
    }

    pub fn combo(risky: bool) -> &'static str {
        if risky {
            RISKY_COMBO
        } else {
            SAFE_COMBO
        }
    }

    /// Returns `text` followed by space-separated decoration tokens.
    pub fn embellish<R: Rng + ?Sized>(&self, text: &str, risky: bool, rng: &mut R) -> String {
        let palette = Self::palette(risky);
        let count = rng.random_range(1..=2);
        let mut out = String::from(text);
        for _ in 0..count {
            if let Some(emoji) = palette.choose(rng) {
                out.push(' ');
                out.push_str(emoji);
            }
        }
        if rng.random_bool(COMBO_PROBABILITY) {
            out.push(' ');
            out.push_str(Self::combo(risky));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn suffix_tokens<'a>(text: &str, decorated: &'a str) -> Vec<&'a str> {
        assert!(decorated.starts_with(text));
        decorated[text.len()..].split_whitespace().collect()
    }

    #[test]
    fn risky_decoration_uses_only_risky_tokens() {
        let e = EmojiEmbellisher;
        let mut rng = StdRng::seed_from_u64(3);
        let text = "Friday + Deployment = Regret.";
        for _ in 0..200 {
            let out = e.embellish(text, true, &mut rng);
            assert!(out.len() > text.len());
            let tokens = suffix_tokens(text, &out);
            assert!(tokens.iter().any(|t| RISKY_PALETTE.contains(t)));
            for t in &tokens {
                assert!(RISKY_PALETTE.contains(t) || *t == RISKY_COMBO, "unexpected {}", t);
                assert!(!SAFE_PALETTE.contains(t));
            }
        }
    }

    #[test]
    fn safe_decoration_uses_only_safe_tokens() {
        let e = EmojiEmbellisher;
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..200 {
            let out = e.embellish("Ship it!", false, &mut rng);
            let tokens = suffix_tokens("Ship it!", &out);
            let palette_hits = tokens.iter().filter(|t| SAFE_PALETTE.contains(t)).count();
            assert!((1..=2).contains(&palette_hits));
            for t in &tokens {
                assert!(SAFE_PALETTE.contains(t) || *t == SAFE_COMBO, "unexpected {}", t);
            }
        }
    }

    #[test]
    fn combo_shows_up_sometimes_but_not_always() {
        let e = EmojiEmbellisher;
        let mut rng = StdRng::seed_from_u64(5);
        let with_combo = (0..1_000)
            .filter(|_| e.embellish("x", true, &mut rng).ends_with(RISKY_COMBO))
            .count();
        assert!(with_combo > 150 && with_combo < 450, "combo count {}", with_combo);
    }

    #[test]
    fn empty_text_still_gets_decorated() {
        let out = EmojiEmbellisher.embellish("", false, &mut StdRng::seed_from_u64(0));
        assert!(!out.trim().is_empty());
    }
}
