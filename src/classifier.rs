//! Keyword heuristic deciding whether a chat message is on topic.
//! Used by: gate.

/// Business, automation and product-support vocabulary. Matched as plain substrings.
const KEYWORDS: &[&str] = &[
    "automation", "digital", "staff", "workflow", "process", "ai", "bot", "integration",
    "business", "service", "offer", "provide", "help", "support", "solution", "product",
    "company", "about", "what", "how", "do", "can", "who", "contact", "price", "cost", "demo",
    "trial", "feature", "benefit", "value", "team", "expert", "consult", "call", "schedule",
    "meeting", "appointment", "information", "info", "details", "work", "client", "customer",
    "industry", "sector", "partner", "portfolio", "case", "study", "testimonial", "review",
    "faq", "question", "answer", "assist", "consultation", "project", "implementation",
    "custom", "tailor", "fit", "transform", "improve", "optimize", "save", "time", "money",
    "efficiency", "growth", "scale", "expand", "future", "innovate", "technology", "platform",
    "tool", "software", "app", "application", "system", "api", "connect", "automate", "robot",
    "virtual", "assistant", "intelligent", "smart", "digitalstaff", "oscar", "calendly",
];

#[derive(Debug, Clone, Copy)]
pub struct RelevanceClassifier {
    fail_open: bool,
}

impl Default for RelevanceClassifier {
    fn default() -> Self {
        Self { fail_open: true }
    }
}

impl RelevanceClassifier {
    pub fn new(fail_open: bool) -> Self {
        Self { fail_open }
    }

    /// Returns true when `message` is on topic.
    ///
    /// An empty `reference` means the document has not been fetched yet. A
    /// fail-open classifier admits everything in that state; a fail-closed one
    /// still applies the keyword and question rules.
    ///
    /// A keyword shared between message and reference is already a keyword in
    /// the message, so the document body itself is never scanned.
    pub fn classify(&self, message: &str, reference: &str) -> bool {
        if reference.is_empty() && self.fail_open {
            return true;
        }

        let msg = message.to_lowercase();
        KEYWORDS.iter().any(|k| msg.contains(k)) || msg.trim_end().ends_with('?')
    }
}
