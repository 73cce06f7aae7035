//! Canned self-care suggestions.
//!
//! These are shown on the assistant's behalf without asking the model.

use std::fmt::{self, Display};
use std::str::FromStr;

use rand::RngExt as _;

/// A guided box-breathing style exercise.
pub const BREATHING_EXERCISE: &str = "Let's try a simple breathing exercise together:

1. **Inhale** slowly through your nose for 4 counts
2. **Hold** your breath for 4 counts
3. **Exhale** slowly through your mouth for 6 counts
4. **Repeat** this cycle 4-5 times

Focus on the sensation of your breath. You're doing great! 🌸";

/// The 5-4-3-2-1 grounding technique.
pub const GROUNDING_TECHNIQUE: &str = "Here's a quick mindfulness exercise:

**5-4-3-2-1 Grounding Technique:**
- **5** things you can see
- **4** things you can touch
- **3** things you can hear
- **2** things you can smell
- **1** thing you can taste

This helps bring you back to the present moment. Take your time with each step. 🍃";

/// The set affirmations are drawn from.
pub const AFFIRMATIONS: [&str; 5] = [
    "You are stronger than you know and braver than you feel. 💪",
    "Your feelings are valid, and you deserve compassion and understanding. 🤗",
    "Every day is a new opportunity for growth and healing. 🌱",
    "You have overcome challenges before, and you can do it again. ⭐",
    "It's okay to not be okay. Healing takes time, and that's perfectly normal. 💙",
];

/// A suggestion the user can ask for with one click.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Suggestion {
    /// [`BREATHING_EXERCISE`].
    BreathingExercise,
    /// [`GROUNDING_TECHNIQUE`].
    GroundingTechnique,
    /// One of [`AFFIRMATIONS`], picked uniformly at random.
    Affirmation,
}

impl Suggestion {
    /// All suggestions, in display order.
    pub const ALL: [Suggestion; 3] = [
        Suggestion::BreathingExercise,
        Suggestion::GroundingTechnique,
        Suggestion::Affirmation,
    ];

    /// Returns the short name used in URLs.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Suggestion::BreathingExercise => "breathing",
            Suggestion::GroundingTechnique => "grounding",
            Suggestion::Affirmation => "affirmation",
        }
    }

    /// Produces the message text.
    pub fn text(self) -> &'static str {
        match self {
            Suggestion::BreathingExercise => BREATHING_EXERCISE,
            Suggestion::GroundingTechnique => GROUNDING_TECHNIQUE,
            Suggestion::Affirmation => {
                AFFIRMATIONS[rand::rng().random_range(0..AFFIRMATIONS.len())]
            }
        }
    }
}

impl Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing a name that matches no [`Suggestion`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownSuggestion(String);

impl Display for UnknownSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown suggestion: {}", self.0)
    }
}

impl std::error::Error for UnknownSuggestion {}

impl FromStr for Suggestion {
    type Err = UnknownSuggestion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Suggestion::ALL
            .into_iter()
            .find(|suggestion| suggestion.name() == s)
            .ok_or_else(|| UnknownSuggestion(s.to_owned()))
    }
}
