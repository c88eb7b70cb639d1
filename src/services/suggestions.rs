//! Suggestion rotator — a fixed prompt pool and a striding visible window.
//!
//! DESIGN
//! ======
//! The pool is generated once from `crop × symptom × action` templates in
//! iteration order, skipping exact duplicates, until it holds
//! `POOL_TARGET_SIZE` prompts. The visible window is
//! `pool[(i + k * STRIDE) % len]` for `k in 0..VISIBLE_COUNT`; each
//! recomputation advances `i` by `ADVANCE`. No shuffling.
//!
//! A background task ticks the rotator on a fixed interval. Readers only
//! take a short lock to copy the current window and are never blocked by
//! anything slower.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

pub const POOL_TARGET_SIZE: usize = 1000;
pub const VISIBLE_COUNT: usize = 5;
pub const STRIDE: usize = 7;
pub const ADVANCE: usize = 13;
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(5);

const CROPS: [&str; 10] =
    ["maize", "tomato", "potato", "banana", "coffee", "cassava", "beans", "wheat", "sorghum", "rice"];

const SYMPTOMS: [&str; 10] = [
    "yellowing leaves",
    "brown spots",
    "wilting",
    "stunted growth",
    "moldy stem",
    "holes in leaves",
    "curling leaves",
    "white powder on leaves",
    "rotting roots",
    "black streaks",
];

const ACTIONS: [&str; 10] = [
    "treatment options",
    "organic remedies",
    "chemical options",
    "preventive steps",
    "timing to spray",
    "how to prune",
    "fertilizer advice",
    "irrigation tips",
    "soil testing steps",
    "when to harvest",
];

// =============================================================================
// POOL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionPool {
    prompts: Vec<String>,
}

impl SuggestionPool {
    /// Generate the standard pool of `POOL_TARGET_SIZE` prompts.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_from(&CROPS, &SYMPTOMS, &ACTIONS, POOL_TARGET_SIZE)
    }

    /// Iterate the template product in order, keep the first occurrence of
    /// each prompt and stop once `target` prompts are collected.
    #[must_use]
    pub fn generate_from(crops: &[&str], symptoms: &[&str], actions: &[&str], target: usize) -> Self {
        let mut seen = HashSet::with_capacity(target);
        let mut prompts = Vec::with_capacity(target);

        'outer: for crop in crops {
            for symptom in symptoms {
                for action in actions {
                    if prompts.len() == target {
                        break 'outer;
                    }
                    let prompt = format!("My {crop} has {symptom}: show diagnosis and {action}.");
                    if seen.insert(prompt.clone()) {
                        prompts.push(prompt);
                    }
                }
            }
        }

        Self { prompts }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.prompts.get(index).map(String::as_str)
    }

    /// The visible window starting at rotation index `start`.
    #[must_use]
    pub fn window(&self, start: usize) -> Vec<String> {
        if self.prompts.is_empty() {
            return Vec::new();
        }
        let len = self.prompts.len();
        (0..VISIBLE_COUNT)
            .map(|k| self.prompts[(start + k * STRIDE) % len].clone())
            .collect()
    }
}

// =============================================================================
// ROTATOR
// =============================================================================

struct Rotation {
    /// Index used by the next recomputation.
    next_index: usize,
    visible: Vec<String>,
}

/// Shared, cheaply cloneable view of the rotating suggestions.
#[derive(Clone)]
pub struct SuggestionRotator {
    pool: Arc<SuggestionPool>,
    rotation: Arc<Mutex<Rotation>>,
}

impl SuggestionRotator {
    /// Start at rotation index 0; the first window is computed immediately.
    #[must_use]
    pub fn new(pool: Arc<SuggestionPool>) -> Self {
        let visible = pool.window(0);
        let next_index = advance(0, pool.len());
        Self { pool, rotation: Arc::new(Mutex::new(Rotation { next_index, visible })) }
    }

    fn lock(&self) -> MutexGuard<'_, Rotation> {
        self.rotation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn pool(&self) -> &SuggestionPool {
        &self.pool
    }

    #[must_use]
    pub fn current_suggestions(&self) -> Vec<String> {
        self.lock().visible.clone()
    }

    /// Visible suggestion at `position`, as shown right now.
    #[must_use]
    pub fn visible_at(&self, position: usize) -> Option<String> {
        self.lock().visible.get(position).cloned()
    }

    /// Recompute the visible window and advance the rotation index.
    pub fn tick(&self) {
        let len = self.pool.len();
        let mut rotation = self.lock();
        rotation.visible = self.pool.window(rotation.next_index);
        rotation.next_index = advance(rotation.next_index, len);
        debug!(next_index = rotation.next_index, "suggestions rotated");
    }
}

fn advance(index: usize, len: usize) -> usize {
    if len == 0 { 0 } else { (index + ADVANCE) % len }
}

/// Spawn the background rotation task. Returns a handle for shutdown.
///
/// The first tick happens one full `period` after start, so the initial
/// window stays visible for a whole interval.
pub fn spawn_rotation_task(rotator: SuggestionRotator, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            rotator.tick();
        }
    })
}

#[cfg(test)]
#[path = "suggestions_test.rs"]
mod tests;
