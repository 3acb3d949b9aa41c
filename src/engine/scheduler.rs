use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::model::exercise::{ExerciseGeneration, OrderType, Scope};
use crate::model::word::WordStat;
use crate::store::words::WordStatSource;

const MS_PER_DAY: f64 = 86_400_000.0;

pub type ExerciseBatch = Vec<String>;

/// Turns a lesson's words into the ordered list of practice batches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scheduler {
    pub generation: ExerciseGeneration,
    pub scope: Scope,
    /// WPM subtracted from a word's best speed per day since it was last
    /// practiced.
    pub decay_per_day: f64,
    pub chorded: bool,
}

impl Scheduler {
    pub fn new(generation: ExerciseGeneration, scope: Scope, decay_per_day: f64) -> Self {
        Self {
            generation: generation.normalized(),
            scope,
            decay_per_day,
            chorded: false,
        }
    }

    pub fn chorded(mut self, chorded: bool) -> Self {
        self.chorded = chorded;
        self
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        words: &[String],
        stats: &dyn WordStatSource,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Vec<ExerciseBatch> {
        let generation = self.generation.normalized();

        let mut ordered = self.order_words(words, stats, rng, now);
        ordered.truncate(self.scope.limit(ordered.len()));

        if generation.max_exercises_enabled {
            let cap = generation.max_exercises.saturating_mul(generation.combinations);
            if ordered.len() > cap {
                ordered.truncate(cap);
                // keep the selection but avoid always opening with the
                // single weakest word
                if generation.order != OrderType::Random {
                    ordered.shuffle(rng);
                }
            }
        }

        let batches = tile(&ordered, generation.combinations, generation.repetitions);
        debug!(
            words = words.len(),
            scheduled = ordered.len(),
            batches = batches.len(),
            "generated exercises"
        );
        batches
    }

    /// Order words weakest first, or randomly.
    pub fn order_words<R: Rng + ?Sized>(
        &self,
        words: &[String],
        stats: &dyn WordStatSource,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut ordered = words.to_vec();
        if self.generation.order == OrderType::Random {
            ordered.shuffle(rng);
            return ordered;
        }

        let fetched = match stats.fetch(words) {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "word stats unavailable, shuffling instead");
                ordered.shuffle(rng);
                return ordered;
            }
        };
        if fetched.len() != words.len() {
            warn!(
                requested = words.len(),
                received = fetched.len(),
                "partial word stats, shuffling instead"
            );
            ordered.shuffle(rng);
            return ordered;
        }

        let mut scored: Vec<(f64, String)> = words
            .iter()
            .zip(&fetched)
            .map(|(word, stat)| {
                (
                    weakness_score(stat, self.chorded, self.decay_per_day, now),
                    word.clone(),
                )
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.into_iter().map(|(_, word)| word).collect()
    }
}

/// Lower is weaker: best-ever speed, reduced for every day the word was
/// left unpracticed.
pub fn weakness_score(stat: &WordStat, chorded: bool, decay_per_day: f64, now: DateTime<Utc>) -> f64 {
    let reference = stat.highest_wpm(chorded);
    let idle_ms = (now - stat.last_practiced(chorded)).num_milliseconds().max(0) as f64;
    reference - decay_per_day * (idle_ms / MS_PER_DAY)
}

/// Split `words` into strides of `combinations` and repeat each stride
/// `repetitions` times. The last stride may be shorter.
pub fn tile(words: &[String], combinations: usize, repetitions: usize) -> Vec<ExerciseBatch> {
    words
        .chunks(combinations.max(1))
        .map(|chunk| {
            (0..repetitions)
                .flat_map(|_| chunk.iter().cloned())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::{Result, bail};
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::model::word::WpmInfo;

    struct FixedStats {
        stats: HashMap<String, WordStat>,
        now: DateTime<Utc>,
        fail: bool,
        drop_last: bool,
    }

    impl FixedStats {
        fn new(now: DateTime<Utc>) -> Self {
            Self {
                stats: HashMap::new(),
                now,
                fail: false,
                drop_last: false,
            }
        }

        fn with(mut self, word: &str, highest: f64, days_ago: i64) -> Self {
            let mut stat = WordStat::new(word, self.now);
            let when = self.now - Duration::days(days_ago);
            stat.highest = WpmInfo::new(highest, when);
            stat.last_practice = WpmInfo::new(highest, when);
            self.stats.insert(word.to_string(), stat);
            self
        }
    }

    impl WordStatSource for FixedStats {
        fn fetch(&self, words: &[String]) -> Result<Vec<WordStat>> {
            if self.fail {
                bail!("offline");
            }
            let mut out: Vec<WordStat> = words
                .iter()
                .map(|w| {
                    self.stats
                        .get(w)
                        .cloned()
                        .unwrap_or_else(|| WordStat::new(w, self.now))
                })
                .collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }

        fn save(&self, _stat: &WordStat) -> Result<()> {
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    fn generation(order: OrderType) -> ExerciseGeneration {
        ExerciseGeneration {
            combinations: 2,
            repetitions: 3,
            order,
            max_exercises: 10,
            max_exercises_enabled: false,
        }
    }

    #[test]
    fn tile_repeats_repetition_major() {
        let batches = tile(&words(&["a", "b", "c"]), 2, 3);
        assert_eq!(
            batches,
            vec![words(&["a", "b", "a", "b", "a", "b"]), words(&["c", "c", "c"])]
        );
    }

    #[test]
    fn decay_matches_worked_example() {
        let stats = FixedStats::new(now()).with("the", 60.0, 3);
        let stat = stats.fetch(&words(&["the"])).unwrap().remove(0);
        let score = weakness_score(&stat, false, 3.0, now());
        assert!((score - 51.0).abs() < 1e-9);
    }

    #[test]
    fn slowest_orders_weakest_first() {
        let stats = FixedStats::new(now())
            .with("fast", 90.0, 0)
            .with("slow", 30.0, 0)
            .with("stale", 80.0, 20)
            .with("mid", 50.0, 0);
        let scheduler = Scheduler::new(generation(OrderType::Slowest), Scope::All, 2.5);
        let mut rng = SmallRng::seed_from_u64(7);
        let ordered = scheduler.order_words(
            &words(&["fast", "slow", "stale", "mid"]),
            &stats,
            &mut rng,
            now(),
        );
        // stale: 80 - 2.5 * 20 = 30, ties keep input order
        assert_eq!(ordered, words(&["slow", "stale", "mid", "fast"]));
    }

    #[test]
    fn unpracticed_words_come_first() {
        let stats = FixedStats::new(now()).with("known", 40.0, 1);
        let scheduler = Scheduler::new(generation(OrderType::Slowest), Scope::All, 2.5);
        let mut rng = SmallRng::seed_from_u64(1);
        let ordered = scheduler.order_words(&words(&["known", "new"]), &stats, &mut rng, now());
        assert_eq!(ordered, words(&["new", "known"]));
    }

    #[test]
    fn slowest_is_deterministic_without_truncation() {
        let stats = FixedStats::new(now())
            .with("a", 10.0, 0)
            .with("b", 20.0, 0)
            .with("c", 30.0, 0);
        let scheduler = Scheduler::new(generation(OrderType::Slowest), Scope::All, 2.5);
        let list = words(&["c", "a", "b"]);
        let first = scheduler.generate(&list, &stats, &mut SmallRng::seed_from_u64(1), now());
        let second = scheduler.generate(&list, &stats, &mut SmallRng::seed_from_u64(99), now());
        assert_eq!(first, second);
        assert_eq!(first[0], words(&["a", "b", "a", "b", "a", "b"]));
    }

    #[test]
    fn random_order_is_reproducible_with_seed() {
        let stats = FixedStats::new(now());
        let scheduler = Scheduler::new(generation(OrderType::Random), Scope::All, 2.5);
        let list: Vec<String> = (0..20).map(|i| format!("w{i}")).collect();
        let a = scheduler.generate(&list, &stats, &mut SmallRng::seed_from_u64(42), now());
        let b = scheduler.generate(&list, &stats, &mut SmallRng::seed_from_u64(42), now());
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
    }

    #[test]
    fn failed_or_partial_stats_fall_back_to_shuffle() {
        let list = words(&["a", "b", "c", "d"]);
        let scheduler = Scheduler::new(generation(OrderType::Slowest), Scope::All, 2.5);

        let mut failing = FixedStats::new(now());
        failing.fail = true;
        let shuffled = scheduler.order_words(&list, &failing, &mut SmallRng::seed_from_u64(3), now());
        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(sorted, list);

        let mut partial = FixedStats::new(now());
        partial.drop_last = true;
        let shuffled = scheduler.order_words(&list, &partial, &mut SmallRng::seed_from_u64(3), now());
        assert_eq!(shuffled.len(), list.len());
    }

    #[test]
    fn max_exercises_caps_source_words() {
        let stats = FixedStats::new(now());
        let list: Vec<String> = (0..25).map(|i| format!("w{i}")).collect();
        for order in [OrderType::Slowest, OrderType::Random] {
            let mut gen_cfg = generation(order);
            gen_cfg.max_exercises = 4;
            gen_cfg.max_exercises_enabled = true;
            let scheduler = Scheduler::new(gen_cfg, Scope::All, 2.5);
            let batches = scheduler.generate(&list, &stats, &mut SmallRng::seed_from_u64(5), now());
            assert_eq!(batches.len(), 4);
            let sources: usize = batches.iter().map(|b| b.len() / gen_cfg.repetitions).sum();
            assert_eq!(sources, 8);

            gen_cfg.max_exercises_enabled = false;
            let scheduler = Scheduler::new(gen_cfg, Scope::All, 2.5);
            let batches = scheduler.generate(&list, &stats, &mut SmallRng::seed_from_u64(5), now());
            let sources: usize = batches.iter().map(|b| b.len() / gen_cfg.repetitions).sum();
            assert_eq!(sources, 25);
        }
    }

    #[test]
    fn truncated_slowest_keeps_weakest_words() {
        let mut stats = FixedStats::new(now());
        for i in 0..10 {
            stats = stats.with(&format!("w{i}"), 10.0 * (i + 1) as f64, 0);
        }
        let list: Vec<String> = (0..10).rev().map(|i| format!("w{i}")).collect();
        let mut gen_cfg = generation(OrderType::Slowest);
        gen_cfg.max_exercises = 2;
        gen_cfg.max_exercises_enabled = true;
        let scheduler = Scheduler::new(gen_cfg, Scope::All, 2.5);
        let batches = scheduler.generate(&list, &stats, &mut SmallRng::seed_from_u64(11), now());

        let mut chosen: Vec<String> = batches.iter().flat_map(|b| b[..2].to_vec()).collect();
        chosen.sort();
        assert_eq!(chosen, words(&["w0", "w1", "w2", "w3"]));
    }

    #[test]
    fn scope_limits_to_weakest() {
        let stats = FixedStats::new(now())
            .with("a", 10.0, 0)
            .with("b", 20.0, 0)
            .with("c", 30.0, 0)
            .with("d", 40.0, 0);
        let scheduler = Scheduler::new(generation(OrderType::Slowest), Scope::Worst(2), 2.5);
        let batches = scheduler.generate(
            &words(&["d", "c", "b", "a"]),
            &stats,
            &mut SmallRng::seed_from_u64(2),
            now(),
        );
        assert_eq!(batches, vec![words(&["a", "b", "a", "b", "a", "b"])]);
    }

    #[test]
    fn chorded_uses_chord_speeds() {
        let mut stats = FixedStats::new(now()).with("a", 10.0, 0).with("b", 90.0, 0);
        if let Some(b) = stats.stats.get_mut("b") {
            b.chord_highest = Some(WpmInfo::new(5.0, now()));
            b.chord_last_practice = Some(WpmInfo::new(5.0, now()));
        }
        if let Some(a) = stats.stats.get_mut("a") {
            a.chord_highest = Some(WpmInfo::new(50.0, now()));
            a.chord_last_practice = Some(WpmInfo::new(50.0, now()));
        }
        let scheduler =
            Scheduler::new(generation(OrderType::Slowest), Scope::All, 2.5).chorded(true);
        let ordered =
            scheduler.order_words(&words(&["a", "b"]), &stats, &mut SmallRng::seed_from_u64(0), now());
        assert_eq!(ordered, words(&["b", "a"]));
    }

    #[test]
    fn empty_lesson_yields_no_batches() {
        let stats = FixedStats::new(now());
        let scheduler = Scheduler::new(generation(OrderType::Slowest), Scope::All, 2.5);
        assert!(scheduler
            .generate(&[], &stats, &mut SmallRng::seed_from_u64(0), now())
            .is_empty());
    }
}
