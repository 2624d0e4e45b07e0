use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use clinsim_core::CaseEngine;
use clinsim_core::numbers::usize_to_f64;

use super::assets::{ScoreLedger, TesterAssets};
use super::policy::LearnerStrategy;
use super::runner::{PlayThrough, TesterEngine, run_play_through};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyResult {
    pub case_id: String,
    pub strategy: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    pub reveal_rate: f64,
    pub mean_composite: f64,
    pub min_composite: u8,
    pub max_composite: u8,
    pub mean_cp_spent: f64,
    pub grades: BTreeMap<String, usize>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

impl StrategyResult {
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} / {} (seed {})", self.case_id, self.strategy, self.seed)
    }
}

#[derive(Debug, Default)]
struct IterationStats {
    reveals: usize,
    composites: Vec<u8>,
    cp_spent: Vec<u32>,
    grades: BTreeMap<String, usize>,
}

impl IterationStats {
    fn record(&mut self, run: &PlayThrough) {
        if run.reached_reveal {
            self.reveals += 1;
        }
        if let Some(score) = &run.score {
            self.composites.push(score.composite);
            *self.grades.entry(score.grade().to_string()).or_default() += 1;
        }
        self.cp_spent.push(run.final_state.cp_spent);
    }
}

fn mean<T: Copy + Into<f64>>(values: &[T]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&value| value.into()).sum::<f64>() / usize_to_f64(values.len())
}

/// Plays one case repeatedly with each requested strategy.
pub struct CaseTester {
    engine: TesterEngine,
    ledger: ScoreLedger,
    case_id: String,
    max_steps: usize,
    verbose: bool,
}

impl CaseTester {
    #[must_use]
    pub fn new(assets: TesterAssets, max_steps: usize, verbose: bool) -> Self {
        let case_id = assets.case_id().to_string();
        let ledger = ScoreLedger::default();
        Self {
            engine: CaseEngine::new(assets, ledger.clone()),
            ledger,
            case_id,
            max_steps,
            verbose,
        }
    }

    #[must_use]
    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn run_strategy(
        &self,
        strategy: LearnerStrategy,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<StrategyResult> {
        seeds
            .iter()
            .map(|&seed| {
                if self.verbose {
                    println!(
                        "🧪 Testing case: {} (strategy: {} seed: {})",
                        self.case_id.bright_white(),
                        strategy,
                        seed
                    );
                }
                self.run_single(strategy, seed, iterations)
            })
            .collect()
    }

    fn run_single(&self, strategy: LearnerStrategy, seed: u64, iterations: usize) -> StrategyResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();
        let mut stats = IterationStats::default();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            match self.run_iteration(strategy, iteration_seed) {
                Ok(run) => {
                    stats.record(&run);
                    if let Some(err) = evaluate_run(&run) {
                        if self.verbose {
                            println!(
                                "  ❌ Iteration {}/{} failed: {}",
                                i + 1,
                                iterations,
                                err.clone().red()
                            );
                        }
                        failures.push(format!(
                            "Iteration {} (strategy {}, seed {}, steps {}, scene {}): {} | {}",
                            i + 1,
                            strategy,
                            run.seed,
                            run.steps,
                            run.final_state.current_scene_id,
                            err,
                            summarize_actions(&run)
                        ));
                    } else {
                        successes += 1;
                        let duration = start_time.elapsed();
                        performance_data.push(duration);
                        if self.verbose {
                            println!(
                                "  ✅ Iteration {}/{} passed ({duration:?}) steps:{} composite:{}",
                                i + 1,
                                iterations,
                                run.steps,
                                run.score.as_ref().map_or(0, |score| score.composite)
                            );
                        }
                    }
                }
                Err(err) => failures.push(format!("Iteration {}: {err:#}", i + 1)),
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        StrategyResult {
            case_id: self.case_id.clone(),
            strategy: strategy.key().to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            reveal_rate: clinsim_core::numbers::percent_of(stats.reveals, iterations)
                .unwrap_or(0.0),
            mean_composite: mean(&stats.composites),
            min_composite: stats.composites.iter().copied().min().unwrap_or(0),
            max_composite: stats.composites.iter().copied().max().unwrap_or(0),
            mean_cp_spent: mean(&stats.cp_spent),
            grades: stats.grades,
            average_duration,
            performance_data,
        }
    }

    /// Play the same seed twice; the second run must land on the same state.
    fn run_iteration(&self, strategy: LearnerStrategy, seed: u64) -> anyhow::Result<PlayThrough> {
        let mut run = self.play(strategy, seed)?;
        let replay = self.play(strategy, seed)?;
        if replay.fingerprint() != run.fingerprint() {
            run.violations.push(format!(
                "replay diverged: fingerprint {:016x} != {:016x}",
                replay.fingerprint(),
                run.fingerprint()
            ));
        }
        Ok(run)
    }

    fn play(&self, strategy: LearnerStrategy, seed: u64) -> anyhow::Result<PlayThrough> {
        run_play_through(
            &self.engine,
            &self.ledger,
            &self.case_id,
            strategy,
            seed,
            self.max_steps,
        )
    }
}

fn evaluate_run(run: &PlayThrough) -> Option<String> {
    if let Some(first) = run.violations.first() {
        let extra = run.violations.len() - 1;
        return Some(if extra == 0 {
            first.clone()
        } else {
            format!("{first} (+{extra} more)")
        });
    }
    if run.strategy == LearnerStrategy::Optimal && run.halted() {
        return Some("optimal play never reached the diagnosis reveal".to_string());
    }
    None
}

fn summarize_actions(run: &PlayThrough) -> String {
    if run.actions.is_empty() {
        return "no actions taken".to_string();
    }
    let tail: Vec<&str> = run
        .actions
        .iter()
        .rev()
        .take(3)
        .rev()
        .map(String::as_str)
        .collect();
    format!("last actions: {}", tail.join(" -> "))
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}
