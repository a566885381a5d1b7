//! Rule-based gate deciding whether a chat message is worth sending to the model.
//!
//! Order matters: greetings first, then trivial input, then fenced code
//! blocks, then the topic denylist, and only then the coding allowlist. A
//! message that mentions both a denied topic and a coding term is rejected;
//! a message carrying a fenced code block never is.

use chrono::Timelike;
use regex::Regex;
use std::sync::OnceLock;

pub const NOT_CODING_REASON: &str = "I only respond to coding-related questions. Please ask about programming problems, algorithms, or software development.";
pub const OFF_TOPIC_REASON: &str = "I'm a coding assistant focused on helping with programming problems. For questions about other topics, please consult appropriate resources or experts in those fields.";

const CODING_KEYWORDS: &[&str] = &[
    // Programming terms
    "code", "program", "function", "error", "bug", "debug", "algorithm", "variable", "class",
    "method", "api", "compile", "runtime", "syntax", "framework", "library", "database", "query",
    "array", "object", "string", "loop", "condition", "exception", "async", "await", "interface",
    "implement",
    // Languages and technologies
    "javascript", "python", "java", "c++", "php", "ruby", "sql", "html", "css", "react",
    "angular", "vue", "node", "express", "django", "flask", "spring", "typescript",
    // Development concepts
    "frontend", "backend", "fullstack", "rest", "graphql", "server", "client", "deploy", "test",
    "optimize", "refactor", "architecture",
    // Problem solving
    "leetcode", "complexity", "solution", "fix", "solve", "problem", "test case", "edge case",
    "input", "output",
];

const NON_CODING_TOPICS: &[&str] = &[
    // Health and fitness
    "gym", "workout", "exercise", "fitness", "diet", "nutrition", "routine", "training", "muscle",
    "weight", "cardio",
    // Entertainment
    "movie", "music", "song", "game", "play", "watch", "show", "series", "entertainment", "sport",
    // General
    "food", "recipe", "cook", "travel", "weather", "news", "politics", "fashion", "shopping",
    // Personal
    "advice", "relationship", "personal", "life", "hobby", "social", "friend", "family",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Greeting,
    OutOfScope,
    InScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GreetingKind {
    Salutation,
    Thanks,
    Farewell,
    Acknowledgement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    /// Canned answer for greetings.
    pub reply: Option<String>,
    /// Explanation shown when the message is rejected.
    pub reason: Option<String>,
}

impl Classification {
    fn greeting(reply: String) -> Self {
        Self {
            category: Category::Greeting,
            reply: Some(reply),
            reason: None,
        }
    }

    fn rejected(reason: &str) -> Self {
        Self {
            category: Category::OutOfScope,
            reply: None,
            reason: Some(reason.to_string()),
        }
    }

    fn accepted() -> Self {
        Self {
            category: Category::InScope,
            reply: None,
            reason: None,
        }
    }

    /// The text to show the user instead of asking the model, if any.
    pub fn canned_response(&self) -> Option<&str> {
        self.reply.as_deref().or(self.reason.as_deref())
    }
}

struct Patterns {
    greetings: Vec<(GreetingKind, Regex)>,
    fenced: Regex,
    inline: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let greeting = |kind, re: &str| (kind, Regex::new(re).expect("greeting pattern"));
        Patterns {
            greetings: vec![
                greeting(
                    GreetingKind::Salutation,
                    r"^(hi|hello|hey|greetings|good\s+(morning|afternoon|evening|day))\b",
                ),
                greeting(GreetingKind::Thanks, r"^(thanks|thank\s+you|thx|ty)\b"),
                greeting(GreetingKind::Farewell, r"^(bye|goodbye|see\s+you|cya)\b"),
                greeting(
                    GreetingKind::Acknowledgement,
                    r"^(ok|okay|alright|cool|nice|great|awesome)\b",
                ),
            ],
            fenced: Regex::new(r"```[\s\S]*```").expect("fenced code pattern"),
            inline: Regex::new(r"`[^`]+`").expect("inline code pattern"),
        }
    })
}

fn greeting_reply(kind: GreetingKind, hour: u32) -> String {
    match kind {
        GreetingKind::Salutation => {
            let greeting = if hour < 12 {
                "Good morning"
            } else if hour < 17 {
                "Good afternoon"
            } else {
                "Good evening"
            };
            format!(
                "{}! I'm here to help you with any coding questions you have. What would you like to work on?",
                greeting
            )
        }
        GreetingKind::Thanks => {
            "You're welcome! Let me know if you need help with anything else!".to_string()
        }
        GreetingKind::Farewell => {
            "Goodbye! Feel free to come back if you need help with coding!".to_string()
        }
        GreetingKind::Acknowledgement => {
            "I'm here to help with your coding questions. What would you like to work on?"
                .to_string()
        }
    }
}

pub fn has_fenced_block(text: &str) -> bool {
    patterns().fenced.is_match(text)
}

/// Whether `text` contains a fenced or inline code span.
pub fn has_code_span(text: &str) -> bool {
    has_fenced_block(text) || patterns().inline.is_match(text)
}

/// Classify using the local clock for time-of-day greetings.
pub fn classify(text: &str) -> Classification {
    classify_at(text, chrono::Local::now().hour())
}

/// Classify as if the local time were `hour` (0-23).
pub fn classify_at(text: &str, hour: u32) -> Classification {
    let normalized = text.trim().to_lowercase();

    if let Some((kind, _)) = patterns()
        .greetings
        .iter()
        .find(|(_, re)| re.is_match(&normalized))
    {
        return Classification::greeting(greeting_reply(*kind, hour));
    }

    if normalized.chars().count() < 2 || !normalized.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Classification::rejected(NOT_CODING_REASON);
    }

    if has_fenced_block(text) {
        return Classification::accepted();
    }

    if NON_CODING_TOPICS.iter().any(|t| normalized.contains(t)) {
        return Classification::rejected(OFF_TOPIC_REASON);
    }

    if CODING_KEYWORDS.iter().any(|k| normalized.contains(k)) || has_code_span(text) {
        return Classification::accepted();
    }

    Classification::rejected(NOT_CODING_REASON)
}
