/// Lower-cased question text with its word tokens, for keyword rules.
#[derive(Debug, Clone)]
pub struct Words {
    text: String,
    tokens: Vec<String>,
}

impl Words {
    pub fn new(question: &str) -> Self {
        let text = question.to_lowercase();
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { text, tokens }
    }

    /// Substring match against the lower-cased question.
    pub fn contains(&self, phrase: &str) -> bool {
        self.text.contains(phrase)
    }

    /// Whole-word match that also accepts the `s`/`es` plural.
    pub fn has_word(&self, word: &str) -> bool {
        self.tokens.iter().any(|t| {
            t == word
                || t.strip_suffix('s').is_some_and(|stem| stem == word)
                || t.strip_suffix("es").is_some_and(|stem| stem == word)
        })
    }

    pub fn has_any_word(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.has_word(w))
    }

    pub fn contains_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.contains(p))
    }
}
