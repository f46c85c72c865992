//! Prompt screening
//!
//! A prompt is accepted when it is non-empty and mentions at least one
//! heavy machinery topic.

/// Case-insensitive topic keywords
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "bulldozer",
    "dozer",
    "excavator",
    "digger",
    "dump truck",
    "truck",
    "forklift",
    "crane",
    "boom",
    "machinery",
    "machine",
    "equipment",
    "construction",
    "earthmoving",
    "bd850",
    "dt1000",
    "x950",
    "fl250",
    "mc750",
    "hydraulic",
    "engine",
    "horsepower",
    "spec",
    "capacity",
    "payload",
    "load",
    "lift",
    "maintenance",
    "safety",
    "operator",
    "fuel",
    "blade",
    "bucket",
    "track",
    "tonnage",
    "weight",
];

/// True when the prompt is a heavy machinery question
pub fn validate_prompt(prompt: &str) -> bool {
    let lowered = prompt.trim().to_lowercase();
    if lowered.is_empty() {
        return false;
    }
    DOMAIN_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_domain_questions() {
        assert!(validate_prompt("Tell me about the BD850 bulldozer specifications"));
        assert!(validate_prompt("What's the capacity of the DT1000 dump truck?"));
        assert!(validate_prompt("MOBILE CRANE outrigger setup"));
    }

    #[test]
    fn test_rejects_unrelated_or_empty() {
        assert!(!validate_prompt(""));
        assert!(!validate_prompt("   "));
        assert!(!validate_prompt("Write me a poem about the sea"));
    }
}
