//! Canned reply templates, grouped by category.
//!
//! Pools are fixed at construction and never mutated. Selection is uniform over the
//! category's entries using a caller-supplied RNG so tests can seed it.

use rand::seq::IndexedRandom;
use rand::Rng;

/// Bumped whenever the built-in template text changes.
pub const POOL_VERSION: u32 = 1;

/// Key into the response pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCategory {
    /// Someone explicitly asked about deploying on Friday.
    ExplicitFriday,
    /// Deploy question and it is Friday.
    Friday,
    /// Deploy question on any other day.
    OtherDay,
    /// Generic apologies when handling a message fails.
    Fallback,
}

const EXPLICIT_FRIDAY: &[&str] = &[
    "*EMERGENCY ALERT*: Friday deployment attempt detected! This is not a drill! 🚨🚨🚨",
    "Friday deployment? *Everyone exits the chat simultaneously* 👋💨",
    "Let me check my calendar... *sees it's Friday*... *dramatic gasp* 😱🗓️",
    "I've alerted the incident team about your Friday deployment plans 📱🚑",
    "Computer says *ABSOLUTELY NOT* 🖥️🔴",
    "According to the ancient scrolls of DevOps, Friday deployments are forbidden 📜⛔",
    "*Plays funeral march* 🎵⚰️",
];

const FRIDAY: &[&str] = &[
    "Deploying on Friday? That's a bold strategy, Cotton. Let's see if it pays off! 🔥🫠",
    "Friday deploy? Your weekend must not have any plans yet! 📅❌",
    "ERROR 42: FRIDAY DEPLOYMENT ATTEMPT DETECTED. SYSTEM OVERRIDDEN BY COMMON SENSE. 🚫🤖",
    "Weekend plans: canceled. Server monitoring: scheduled. 💻🚨",
    "Friday deployments are like horror movies - most end badly! 🧟‍♂️🔪",
    "Deploy on Friday and find out what true fear feels like! 😱💔",
    "Why ruin one day when you can ruin your entire weekend? 🔥🏠🚶‍♂️",
    "Friday deployment detected. Would you like to auto-schedule your weekend support shift? ⏰😭",
    "Deploy on Friday? *grabs popcorn* 🍿👀",
    "Your Friday deployment has been automatically converted to a Monday task. You're welcome. ✅📆",
    "Friday + Deployment = Regret. It's just math. 🧮😢",
    "Ah, I see you chose chaos today! 🌪️🔥",
    "Deploy on Friday: Because what's life without a little weekend adrenaline? 💉💪",
    "That sound you hear is your future self crying. 👻😭",
    "Press F to pay respects to your weekend. ⌨️🪦",
];

const OTHER_DAY: &[&str] = &[
    "The skies look clear for deployment today! ☀️✅",
    "Systems are go for deployment! 🚀👍",
    "Deploy away, today seems fine! 🌈💯",
    "All signals point to yes for deployment today. 📊👌",
    "No Friday detected, deployment permitted. 📅✅",
    "Launch sequence initiated! You're good to go. 🚀🔥",
    "Deploy with confidence today! 💪🌟",
    "Release the kraken! Today's a good day for it. 🐙✨",
    "Deployment forecast: Smooth sailing ahead ⛵🌤️",
    "Green light for deployment! 🟢🚦",
    "Ship it! The deployment gods are smiling today. 🙏📦",
];

const FALLBACK: &[&str] = &[
    "Oops! Something went wrong. Please try again later. 🤖",
    "Well, that didn't go as planned. Try me again in a bit. 🤖",
    "My circuits got tangled. Give it another shot later. 🔧",
];

/// Sent when the explicit Friday replies cannot be delivered.
pub const FRIDAY_APOLOGY: &str = "I can't even process the thought of a Friday deployment! 🤯";

/// Sent when the deploy-today verdict cannot be delivered.
pub const DEPLOY_APOLOGY: &str =
    "I'm having trouble deciding if you should deploy today. Maybe that's a sign? 🤔";

/// Versioned set of template pools.
#[derive(Debug, Clone)]
pub struct ResponsePool {
    version: u32,
    explicit_friday: Vec<String>,
    friday: Vec<String>,
    other_day: Vec<String>,
    fallback: Vec<String>,
}

impl Default for ResponsePool {
    fn default() -> Self {
        Self::builtin()
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ResponsePool {
    /// The templates shipped with the bot.
    pub fn builtin() -> Self {
        Self {
            version: POOL_VERSION,
            explicit_friday: owned(EXPLICIT_FRIDAY),
            friday: owned(FRIDAY),
            other_day: owned(OTHER_DAY),
            fallback: owned(FALLBACK),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// All templates in a category.
    pub fn templates(&self, category: ResponseCategory) -> &[String] {
        match category {
            ResponseCategory::ExplicitFriday => &self.explicit_friday,
            ResponseCategory::Friday => &self.friday,
            ResponseCategory::OtherDay => &self.other_day,
            ResponseCategory::Fallback => &self.fallback,
        }
    }

    /// Uniform-random template from the category.
    pub fn pick<R: Rng + ?Sized>(&self, category: ResponseCategory, rng: &mut R) -> &str {
        self.templates(category)
            .choose(rng)
            .map(String::as_str)
            // Built-in pools are never empty.
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ALL: [ResponseCategory; 4] = [
        ResponseCategory::ExplicitFriday,
        ResponseCategory::Friday,
        ResponseCategory::OtherDay,
        ResponseCategory::Fallback,
    ];

    #[test]
    fn builtin_pools_are_non_empty() {
        let pool = ResponsePool::builtin();
        assert_eq!(pool.version(), POOL_VERSION);
        for category in ALL {
            assert!(!pool.templates(category).is_empty(), "{:?} is empty", category);
        }
    }

    #[test]
    fn pick_returns_member_of_category() {
        let pool = ResponsePool::builtin();
        let mut rng = StdRng::seed_from_u64(42);
        for category in ALL {
            for _ in 0..50 {
                let picked = pool.pick(category, &mut rng);
                assert!(pool.templates(category).iter().any(|t| t == picked));
            }
        }
    }

    #[test]
    fn pick_eventually_covers_whole_pool() {
        let pool = ResponsePool::builtin();
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2_000 {
            seen.insert(pool.pick(ResponseCategory::OtherDay, &mut rng).to_string());
        }
        assert_eq!(seen.len(), pool.templates(ResponseCategory::OtherDay).len());
    }

    #[test]
    fn same_seed_same_choice() {
        let pool = ResponsePool::builtin();
        let a = pool.pick(ResponseCategory::Friday, &mut StdRng::seed_from_u64(9)).to_string();
        let b = pool.pick(ResponseCategory::Friday, &mut StdRng::seed_from_u64(9)).to_string();
        assert_eq!(a, b);
    }
}
