const NO_SOURCE: usize = usize::MAX;

/// Per-voxel copy instructions for one pass: destination voxel `i` takes the tuple of `source(i)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapPlan {
    sources: Vec<usize>,
    planned: usize,
}

impl RemapPlan {
    pub fn new(voxel_count: usize) -> Self {
        Self {
            sources: vec![NO_SOURCE; voxel_count],
            planned: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of voxels with a copy instruction.
    pub fn planned(&self) -> usize {
        self.planned
    }

    pub fn source(&self, destination: usize) -> Option<usize> {
        match self.sources[destination] {
            NO_SOURCE => None,
            source => Some(source),
        }
    }

    pub fn set(&mut self, destination: usize, source: usize) {
        if self.sources[destination] == NO_SOURCE {
            self.planned += 1;
        }
        self.sources[destination] = source;
    }

    pub fn clear(&mut self) {
        if self.planned > 0 {
            self.sources.fill(NO_SOURCE);
            self.planned = 0;
        }
    }

    /// `(destination, source)` pairs in ascending destination order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.sources
            .iter()
            .enumerate()
            .filter(|(_, &source)| source != NO_SOURCE)
            .map(|(destination, &source)| (destination, source))
    }
}

#[cfg(test)]
mod tests {
    use super::RemapPlan;

    #[test]
    fn plan_tracks_entries() {
        let mut plan = RemapPlan::new(5);
        assert_eq!(plan.planned(), 0);
        plan.set(3, 2);
        plan.set(1, 0);
        plan.set(3, 4);
        assert_eq!(plan.planned(), 2);
        assert_eq!(plan.source(3), Some(4));
        assert_eq!(plan.source(0), None);
        assert_eq!(plan.entries().collect::<Vec<_>>(), vec![(1, 0), (3, 4)]);
        plan.clear();
        assert_eq!(plan.planned(), 0);
        assert_eq!(plan.entries().count(), 0);
    }
}
