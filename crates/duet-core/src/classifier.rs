//! Prompt classification for the code-snippet fallback
//!
//! The classifier is a plain predicate over the prompt text so the ladder can
//! swap it out (or tests can force either branch) without touching providers.

/// Keywords that mark a prompt as a request for code
pub const DEFAULT_CODE_KEYWORDS: &[&str] = &["java", "python", "javascript", "function", "method"];

/// A yes/no classifier over prompt text
pub trait PromptPredicate: Send + Sync {
    fn matches(&self, prompt: &str) -> bool;
}

impl<F> PromptPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Case-insensitive substring match against a keyword set
#[derive(Debug, Clone)]
pub struct KeywordPredicate {
    keywords: Vec<String>,
}

impl KeywordPredicate {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// The default code-request keywords
    pub fn code_request() -> Self {
        Self::new(DEFAULT_CODE_KEYWORDS)
    }

    /// Add keywords on top of the current set, skipping duplicates
    pub fn extend<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for k in extra {
            let k = k.as_ref().trim().to_lowercase();
            if !k.is_empty() && !self.keywords.contains(&k) {
                self.keywords.push(k);
            }
        }
        self
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl Default for KeywordPredicate {
    fn default() -> Self {
        Self::code_request()
    }
}

impl PromptPredicate for KeywordPredicate {
    fn matches(&self, prompt: &str) -> bool {
        let lower = prompt.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_request_keywords() {
        let p = KeywordPredicate::code_request();
        assert!(p.matches("python function to reverse a list"));
        assert!(p.matches("Write a JAVA class"));
        assert!(p.matches("what does this Method do"));
        assert!(p.matches("JavaScript closures"));
        assert!(!p.matches("Eiffel Tower"));
        assert!(!p.matches(""));
    }

    #[test]
    fn test_substring_semantics() {
        // Substring match, not word match
        let p = KeywordPredicate::code_request();
        assert!(p.matches("malfunction report"));
        assert!(p.matches("javanese cuisine"));
    }

    #[test]
    fn test_extend_dedups_and_lowercases() {
        let p = KeywordPredicate::code_request().extend(["Rust", "python", "  ", "SQL"]);
        assert_eq!(p.keywords().len(), DEFAULT_CODE_KEYWORDS.len() + 2);
        assert!(p.matches("a rust macro"));
        assert!(p.matches("an sql query"));
    }

    #[test]
    fn test_closure_predicate() {
        let always = |_: &str| true;
        assert!(always.matches("anything"));
        let never = |_: &str| false;
        assert!(!never.matches("python"));
    }
}
