//! Closed-form arithmetic behind the lessons: Fibonacci numbers, golden-ratio
//! convergents, the `x → 1 + 1/x` fold-back and the bus-problem recurrence.
//!
//! Fibonacci values are `u128`. `fibonacci(186)` is the largest value that
//! fits; anything past [`MAX_FIBONACCI_INDEX`] is `u128::MAX`.

use serde::Serialize;

use crate::error::{DtmError, DtmResult};

/// Largest `n` for which `F(n)` fits in a `u128`.
pub const MAX_FIBONACCI_INDEX: i64 = 186;

/// `F(n)` with `F(0) = 0`, `F(1) = F(2) = 1`. Negative `n` yields 0.
pub fn fibonacci(n: i64) -> u128 {
    if n <= 0 {
        return 0;
    }
    if n > MAX_FIBONACCI_INDEX {
        return u128::MAX;
    }
    let (mut a, mut b) = (0u128, 1u128);
    for _ in 1..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    b
}

/// Memoized Fibonacci table for repeated lookups within a session.
#[derive(Debug, Clone)]
pub struct FibonacciTable {
    values: Vec<u128>,
}

impl Default for FibonacciTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FibonacciTable {
    pub fn new() -> Self {
        Self { values: vec![0, 1] }
    }

    pub fn get(&mut self, n: i64) -> u128 {
        if n <= 0 {
            return 0;
        }
        if n > MAX_FIBONACCI_INDEX {
            return u128::MAX;
        }
        let n = n as usize;
        while self.values.len() <= n {
            let len = self.values.len();
            let next = self.values[len - 1].saturating_add(self.values[len - 2]);
            self.values.push(next);
        }
        self.values[n]
    }
}

/// The golden ratio `(1 + √5) / 2`.
pub fn phi() -> f64 {
    (1.0 + 5f64.sqrt()) / 2.0
}

/// The `n`th convergent of `1 + 1/(1 + 1/(1 + ...))`: `F(n+1) / F(n)`.
pub fn convergent_phi(n: i64) -> f64 {
    if n <= 1 {
        return 1.0;
    }
    fibonacci(n.saturating_add(1)) as f64 / fibonacci(n) as f64
}

/// Value of the continued fraction truncated to `depth` layers, computed by
/// folding back from 1.0. `x` never drops below 1, so the division is safe.
pub fn continued_fraction_value(depth: i64) -> f64 {
    let mut x = 1.0;
    for _ in 1..depth.max(1) {
        x = 1.0 + 1.0 / x;
    }
    x
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConvergenceRow {
    pub step: usize,
    pub value: f64,
    pub distance: f64,
}

/// Upper bound on [`convergence_table`] steps; by then the distance is below `1e-18`.
pub const MAX_CONVERGENCE_STEPS: usize = 100;

/// Iterates `x → 1 + 1/x` from 1.0, returning `steps + 1` rows (step 0 is the seed).
/// `steps` is clamped to [`MAX_CONVERGENCE_STEPS`].
pub fn convergence_table(steps: usize) -> Vec<ConvergenceRow> {
    let target = phi();
    let steps = steps.min(MAX_CONVERGENCE_STEPS);
    let mut rows = Vec::with_capacity(steps + 1);
    let mut x = 1.0;
    for step in 0..=steps {
        rows.push(ConvergenceRow {
            step,
            value: x,
            distance: (x - target).abs(),
        });
        x = 1.0 + 1.0 / x;
    }
    rows
}

// ---------------------------------------------------------------------------
// Bus problem
// ---------------------------------------------------------------------------

/// Seventeen teachers build a Fibonacci-style sequence from two seeds; one of
/// them says a number that is off by `error_delta`, and everybody after builds
/// on the wrong value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusProblem {
    pub seeds: (i64, i64),
    pub length: usize,
    pub error_index: usize,
    pub error_delta: i64,
}

impl Default for BusProblem {
    fn default() -> Self {
        Self {
            seeds: (2, 8),
            length: 17,
            error_index: 6,
            error_delta: -1,
        }
    }
}

impl BusProblem {
    pub fn sequence(&self) -> Vec<i64> {
        self.build(None)
    }

    pub fn perturbed_sequence(&self) -> Vec<i64> {
        self.build(Some((self.error_index, self.error_delta)))
    }

    /// `|correct[last] - perturbed[last]|`.
    pub fn final_difference(&self) -> i64 {
        let correct = self.sequence();
        let wrong = self.perturbed_sequence();
        match (correct.last(), wrong.last()) {
            (Some(c), Some(w)) => (c - w).abs(),
            _ => 0,
        }
    }

    fn build(&self, perturbation: Option<(usize, i64)>) -> Vec<i64> {
        let mut seq = Vec::with_capacity(self.length);
        for i in 0..self.length {
            let mut value = match i {
                0 => self.seeds.0,
                1 => self.seeds.1,
                _ => seq[i - 1] + seq[i - 2],
            };
            if let Some((at, delta)) = perturbation {
                if i == at {
                    value += delta;
                }
            }
            seq.push(value);
        }
        seq
    }
}

// ---------------------------------------------------------------------------
// Fibonacci listing challenge
// ---------------------------------------------------------------------------

/// Parses `"1, 1, 2, 3"`; empty items are skipped.
pub fn parse_number_list(text: &str) -> DtmResult<Vec<i64>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| DtmError::InvalidInput(format!("not a whole number: {s}")))
        })
        .collect()
}

/// Length of the prefix of `numbers` that matches `F(1), F(2), F(3), ...`.
pub fn fibonacci_prefix_len(numbers: &[i64], table: &mut FibonacciTable) -> usize {
    numbers
        .iter()
        .enumerate()
        .take_while(|(i, n)| **n >= 0 && **n as u128 == table.get(*i as i64 + 1))
        .count()
}
