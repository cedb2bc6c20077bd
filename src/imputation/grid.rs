//! Expected sampling grid for a (participant, metric) range

/// Slots `origin + i * step` for `i in 0..len`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub origin: i64,
    pub step: i64,
    pub len: usize,
}

impl Grid {
    /// Grid covering `[start, end]`, origin aligned down to `step`
    pub fn covering(start: i64, end: i64, step: i64) -> Self {
        let step = step.max(1);
        let origin = start.div_euclid(step) * step;
        let len = if end < origin {
            0
        } else {
            ((end - origin) / step + 1) as usize
        };
        Self { origin, step, len }
    }

    pub fn timestamp(&self, slot: usize) -> i64 {
        self.origin + slot as i64 * self.step
    }

    /// Last second covered by the final slot
    pub fn span_end(&self) -> i64 {
        self.origin + self.len as i64 * self.step - 1
    }

    fn slot_of(&self, ts: i64) -> Option<usize> {
        if ts < self.origin {
            return None;
        }
        let slot = ((ts - self.origin) / self.step) as usize;
        (slot < self.len).then_some(slot)
    }

    /// Average the observations falling into each slot
    pub fn bucket(&self, observations: &[(i64, f64)]) -> Vec<Option<f64>> {
        let mut sums = vec![0.0; self.len];
        let mut counts = vec![0usize; self.len];

        for &(ts, value) in observations {
            if !value.is_finite() {
                continue;
            }
            if let Some(slot) = self.slot_of(ts) {
                sums[slot] += value;
                counts[slot] += 1;
            }
        }

        sums.into_iter()
            .zip(counts)
            .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
            .collect()
    }
}

/// Slot width for a run
///
/// `base` is the metric's configured sampling interval. Once there are at least
/// `min_observations` points, the step widens to their median spacing rounded to
/// the nearest multiple of `base`, so coarser stored data is not read as gaps.
pub fn observed_step(base: i64, observations: &[(i64, f64)], min_observations: usize) -> i64 {
    let base = base.max(1);
    if observations.len() < min_observations.max(2) {
        return base;
    }

    let mut spacing: Vec<i64> = observations
        .windows(2)
        .map(|pair| pair[1].0 - pair[0].0)
        .filter(|gap| *gap > 0)
        .collect();
    if spacing.is_empty() {
        return base;
    }
    spacing.sort_unstable();

    let median = spacing[spacing.len() / 2];
    ((median + base / 2) / base * base).max(base)
}
