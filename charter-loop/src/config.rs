//! Machine-loop configuration (spec §4.7, §9 "Coroutines"): the step
//! budget `runMachine` runs under, mirroring `neuron-loop::LoopConfig`.

/// Configuration for one `run_machine` call.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Step-count cap per turn (spec §4.7: "bounded by maxSteps
    /// (default 50)").
    pub max_steps: usize,
    /// Steps remaining at which the executor appends a warning to the
    /// system prompt (spec §4.6 step 1).
    pub step_warning_threshold: usize,
    /// Whether worker leaves run concurrently (spec §5: "structured
    /// parallel execution"). Disabled for deterministic test fixtures.
    pub parallel_workers: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_steps: 50,
            step_warning_threshold: 5,
            parallel_workers: true,
        }
    }
}
