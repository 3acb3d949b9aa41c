use crate::model::exercise::{Target, TargetKind};

/// Target for words that have no recorded speed yet, so any attempt passes.
pub const MIN_TARGET_WPM: f64 = 1.0;

pub fn calculate_target_wpm(target: &Target, reference_wpm: f64) -> f64 {
    if reference_wpm <= 0.0 || !reference_wpm.is_finite() {
        return MIN_TARGET_WPM;
    }
    match target.selected {
        TargetKind::Percentage => reference_wpm * target.percentage.unwrap_or(100.0) / 100.0,
        TargetKind::Relative => reference_wpm + target.relative.unwrap_or(0.0),
    }
}

/// Round to the one decimal shown to the learner. Comparisons against the
/// target happen on these values so a displayed "57.0 / 57.0" counts as met.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Clone, Debug, PartialEq)]
pub struct WordAttempt {
    pub word: String,
    pub wpm: f64,
    pub target_wpm: f64,
}

impl WordAttempt {
    /// How far below target this word landed; zero when met.
    pub fn shortfall(&self) -> f64 {
        (round1(self.target_wpm) - round1(self.wpm)).max(0.0)
    }

    pub fn met(&self) -> bool {
        self.shortfall() <= 0.0
    }
}

/// Result of one full pass over a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct AttemptEvaluation {
    pub words: Vec<WordAttempt>,
}

impl AttemptEvaluation {
    pub fn new(words: Vec<WordAttempt>) -> Self {
        Self { words }
    }

    pub fn met_target(&self) -> bool {
        self.words.iter().all(WordAttempt::met)
    }

    pub fn total_shortfall(&self) -> f64 {
        self.words.iter().map(WordAttempt::shortfall).sum()
    }
}

/// Closest miss seen on the current batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BestAttempt {
    pub total_shortfall: f64,
    pub words: Vec<WordAttempt>,
}

impl Default for BestAttempt {
    fn default() -> Self {
        Self {
            total_shortfall: f64::MAX,
            words: Vec::new(),
        }
    }
}

impl BestAttempt {
    /// Keep `attempt` if it missed by less than the current best. Returns
    /// true when it replaced the stored attempt.
    pub fn consider(&mut self, attempt: &AttemptEvaluation) -> bool {
        let shortfall = attempt.total_shortfall();
        if shortfall < self.total_shortfall {
            self.total_shortfall = shortfall;
            self.words = attempt.words.clone();
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn wpm_for(&self, word: &str) -> f64 {
        self.words
            .iter()
            .find(|w| w.word == word)
            .map(|w| w.wpm)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percentage(p: f64) -> Target {
        Target {
            selected: TargetKind::Percentage,
            percentage: Some(p),
            relative: None,
        }
    }

    fn attempt(word: &str, wpm: f64, target_wpm: f64) -> WordAttempt {
        WordAttempt {
            word: word.to_string(),
            wpm,
            target_wpm,
        }
    }

    #[test]
    fn unpracticed_words_get_nominal_target() {
        assert_eq!(calculate_target_wpm(&percentage(95.0), 0.0), MIN_TARGET_WPM);
        assert_eq!(calculate_target_wpm(&percentage(95.0), f64::NAN), MIN_TARGET_WPM);
    }

    #[test]
    fn percentage_target() {
        let t = calculate_target_wpm(&percentage(95.0), 60.0);
        assert!((t - 57.0).abs() < 1e-9);
    }

    #[test]
    fn relative_target_can_be_easier() {
        let target = Target {
            selected: TargetKind::Relative,
            percentage: None,
            relative: Some(-10.0),
        };
        assert_eq!(calculate_target_wpm(&target, 60.0), 50.0);
    }

    #[test]
    fn met_compares_displayed_values() {
        assert!(attempt("a", 56.96, 57.0).met());
        assert!(!attempt("a", 56.9, 57.0).met());
    }

    #[test]
    fn best_attempt_keeps_smallest_shortfall() {
        let mut best = BestAttempt::default();
        let first = AttemptEvaluation::new(vec![attempt("a", 50.0, 57.0), attempt("b", 70.0, 60.0)]);
        assert!(!first.met_target());
        assert!((first.total_shortfall() - 7.0).abs() < 1e-9);
        assert!(best.consider(&first));

        let worse = AttemptEvaluation::new(vec![attempt("a", 45.0, 57.0), attempt("b", 70.0, 60.0)]);
        assert!(!best.consider(&worse));
        assert_eq!(best.wpm_for("a"), 50.0);

        let closer = AttemptEvaluation::new(vec![attempt("a", 56.0, 57.0), attempt("b", 59.0, 60.0)]);
        assert!(best.consider(&closer));
        assert!((best.total_shortfall - 2.0).abs() < 1e-9);
    }
}
