use fxhash::FxHashMap;

/// Occurrence counts of every position reached in a game, keyed by Zobrist hash.
#[derive(Clone, Debug, Default)]
pub struct PositionHistory {
    positions: FxHashMap<u64, u32>,
    // In the order they were reached
    history: Vec<u64>,
}

impl PositionHistory {
    pub fn new() -> Self {
        Self {
            positions: FxHashMap::default(),
            history: Vec::with_capacity(256),
        }
    }

    pub fn push(&mut self, zobrist_key: u64) {
        self.history.push(zobrist_key);
        *self.positions.entry(zobrist_key).or_insert(0) += 1;
    }

    pub fn count(&self, zobrist_key: u64) -> u32 {
        self.positions.get(&zobrist_key).copied().unwrap_or(0)
    }

    // Counts include the current position, which must already be pushed
    pub fn is_threefold_repetition(&self, zobrist_key: u64) -> bool {
        self.count(zobrist_key) >= 3
    }

    pub fn is_fivefold_repetition(&self, zobrist_key: u64) -> bool {
        self.count(zobrist_key) >= 5
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
