/// Opaque quest identifier assigned by the quest service
pub type QuestId = String;

/// Step name within a quest line.
///
/// Steps are open-ended: callers may pass any string. The constants in
/// [`steps`] are the canonical subset the game ships with.
pub type QuestStep = String;

/// Canonical step names
pub mod steps {
    pub const NOT_STARTED: &str = "not_started";
    pub const STARTED: &str = "started";
    pub const EXPLORATION: &str = "exploration";
    pub const RESEARCH: &str = "research";
    pub const COMPLETED: &str = "completed";
    pub const UNAVAILABLE: &str = "unavailable";

    /// All canonical steps, in their usual progression order
    pub const CANONICAL: [&str; 6] = [
        NOT_STARTED,
        STARTED,
        EXPLORATION,
        RESEARCH,
        COMPLETED,
        UNAVAILABLE,
    ];
}

/// Whether a step is one of the canonical step names.
///
/// Informational only; nothing in the ledger rejects non-canonical steps.
pub fn is_canonical_step(step: &str) -> bool {
    steps::CANONICAL.contains(&step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_steps() {
        assert!(is_canonical_step("research"));
        assert!(is_canonical_step(steps::NOT_STARTED));
        assert!(!is_canonical_step("boss_fight"));
        assert!(!is_canonical_step("Research"));
    }
}
