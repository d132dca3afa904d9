/// Largest feature id in the field, or 0 when there are no features.
pub fn max_label(labels: &[i32]) -> i32 {
    labels.iter().copied().max().unwrap_or(0).max(0)
}

pub fn count_where(labels: &[i32], predicate: impl Fn(i32) -> bool) -> usize {
    labels.iter().filter(|&&label| predicate(label)).count()
}

/// Per-label vote counters for one algorithm call.
#[derive(Debug, Clone)]
pub struct VoteTable {
    counts: Vec<i32>,
    touched: Vec<usize>,
}

impl VoteTable {
    pub fn new(max_label: i32) -> Self {
        let len = usize::try_from(max_label).unwrap_or(0) + 1;
        Self {
            counts: vec![0; len],
            touched: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Adds one vote for `label` and returns its new count.
    pub fn vote(&mut self, label: i32) -> i32 {
        let slot = label as usize;
        self.counts[slot] += 1;
        self.counts[slot]
    }

    /// Like [`VoteTable::vote`], but remembers the counter for [`VoteTable::clear_touched`].
    pub fn vote_tracked(&mut self, label: i32) -> i32 {
        let slot = label as usize;
        if self.counts[slot] == 0 {
            self.touched.push(slot);
        }
        self.counts[slot] += 1;
        self.counts[slot]
    }

    pub fn count(&self, label: i32) -> i32 {
        self.counts[label as usize]
    }

    pub fn reset(&mut self, label: i32) {
        self.counts[label as usize] = 0;
    }

    /// Zeroes every counter raised since the last clear, leaving the rest of the table alone.
    pub fn clear_touched(&mut self) {
        for slot in self.touched.drain(..) {
            self.counts[slot] = 0;
        }
    }

    pub fn is_clear(&self) -> bool {
        self.counts.iter().all(|&count| count == 0)
    }
}
