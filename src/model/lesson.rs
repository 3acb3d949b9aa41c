use serde::{Deserialize, Serialize};

const DEFAULT_DELIMITER: char = ' ';

const BIGRAMS: &[&str] = &[
    "th", "he", "in", "er", "an", "re", "on", "at", "en", "nd", "ti", "es", "or", "te", "of",
    "ed", "is", "it", "al", "ar", "st", "to", "nt", "ng", "se", "ha", "as", "ou", "io", "le",
];

const TRIGRAMS: &[&str] = &[
    "the", "and", "ing", "ion", "tio", "ent", "ati", "for", "her", "ter", "hat", "tha", "ere",
    "ate", "his", "con", "res", "ver", "all", "ons", "nce", "men", "ith", "ted", "ers", "pro",
    "thi", "wit", "are", "ess",
];

const TETRAGRAMS: &[&str] = &[
    "tion", "atio", "that", "ther", "with", "ment", "ions", "this", "here", "from", "ould",
    "ting", "hich", "whic", "ctio", "ence", "have", "othe", "ight", "sion", "ever", "ical",
    "they", "inte", "ough", "ance", "were", "tive", "over", "ding",
];

/// An optional setting that can be toggled without losing its value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleSetting<T> {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<SingleSetting<String>>,
    #[serde(default)]
    pub keep_spaces: bool,
    #[serde(default)]
    pub chorded: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub custom: bool,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    pub words: Vec<String>,
    #[serde(default)]
    pub settings: LessonSettings,
}

impl Default for Lesson {
    fn default() -> Self {
        default_lessons().swap_remove(0)
    }
}

impl Lesson {
    /// Blank custom lesson, as handed to the lesson editor.
    pub fn new_custom(title: &str, words: Vec<String>) -> Self {
        Self {
            id: None,
            custom: true,
            title: title.to_string(),
            short_description: None,
            words,
            settings: LessonSettings::default(),
        }
    }

    pub fn is_chorded(&self) -> bool {
        self.settings.chorded
    }

    /// Character separating words in exercise text.
    pub fn delimiter(&self) -> char {
        self.settings
            .delimiter
            .as_ref()
            .filter(|d| d.enabled)
            .and_then(|d| d.value.as_deref())
            .and_then(|v| v.chars().next())
            .unwrap_or(DEFAULT_DELIMITER)
    }

    /// Build the text the learner types for a batch of words.
    ///
    /// Words are joined with the lesson delimiter, so the tracker absorbs
    /// exactly the separators placed here. With `keep_spaces`, words may
    /// carry their own leading/trailing delimiter and a separator is only
    /// added where neither neighbour provides one.
    pub fn exercise_text(&self, words: &[String]) -> String {
        let delim = self.delimiter();
        let mut text = String::new();
        for (i, word) in words.iter().enumerate() {
            if i != 0 {
                let provided = self.settings.keep_spaces
                    && (words[i - 1].ends_with(delim) || word.starts_with(delim));
                if !provided {
                    text.push(delim);
                }
            }
            text.push_str(word);
        }
        text
    }
}

fn builtin(id: &str, title: &str, description: &str, words: &[&str]) -> Lesson {
    Lesson {
        id: Some(id.to_string()),
        custom: false,
        title: title.to_string(),
        short_description: Some(description.to_string()),
        words: words.iter().map(|w| w.to_string()).collect(),
        settings: LessonSettings::default(),
    }
}

/// Lessons available to every user, including signed-out ones.
pub fn default_lessons() -> Vec<Lesson> {
    vec![
        builtin("bigrams-default", "Bigrams", "Practice typing bigrams", BIGRAMS),
        builtin("trigrams-default", "Trigrams", "Practice typing trigrams", TRIGRAMS),
        builtin(
            "tetragrams-default",
            "Tetragrams",
            "Practice typing tetragrams",
            TETRAGRAMS,
        ),
    ]
}
