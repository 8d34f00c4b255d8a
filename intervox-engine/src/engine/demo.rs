//! Pre-canned demo question sets
//!
//! Served without touching the generator, so the demo flow works even when
//! the remote services are down.

/// Topic used when the client does not name one.
pub const DEFAULT_TOPIC: &str = "basic-dsa";

const BASIC_DSA: &[&str] = &[
    "What is the difference between an array and a linked list, and when would you prefer each?",
    "Explain how a hash map handles collisions.",
    "Walk me through binary search and its time complexity.",
    "What does it mean for a sorting algorithm to be stable?",
    "How would you detect a cycle in a linked list?",
];

const SYSTEM_DESIGN: &[&str] = &[
    "Design a URL shortener. Which components would you need and how would they scale?",
    "How would you add caching to a read-heavy service, and what invalidation strategy would you use?",
    "Explain the trade-offs between vertical and horizontal scaling.",
    "How do you keep two replicas of a datastore consistent?",
    "When would you choose a message queue over a direct RPC call?",
];

const BEHAVIORAL: &[&str] = &[
    "Tell me about a time you disagreed with a teammate. How did you resolve it?",
    "Describe a project that did not go as planned. What did you learn?",
    "How do you prioritize when everything feels urgent?",
    "Tell me about a piece of feedback that changed how you work.",
    "Describe a situation where you had to learn something quickly to deliver.",
];

/// Question contents for a demo topic, or `None` for an unknown topic.
pub fn demo_questions(topic: &str) -> Option<&'static [&'static str]> {
    match topic {
        "basic-dsa" => Some(BASIC_DSA),
        "system-design" => Some(SYSTEM_DESIGN),
        "behavioral" => Some(BEHAVIORAL),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_topics() {
        for topic in ["basic-dsa", "system-design", "behavioral"] {
            let questions = demo_questions(topic).unwrap();
            assert!(!questions.is_empty());
        }
    }

    #[test]
    fn test_unknown_topic() {
        assert!(demo_questions("quantum-basket-weaving").is_none());
    }

    #[test]
    fn test_default_topic_exists() {
        assert!(demo_questions(DEFAULT_TOPIC).is_some());
    }
}
