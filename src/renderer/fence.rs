/// CPU side of a monotonically increasing completion counter.
///
/// `signaled` is the last value handed to the queue; `completed` is the last
/// value observed as finished. `completed <= signaled` at all times.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FenceValue {
    signaled: u64,
    completed: u64,
}

impl FenceValue {
    pub fn new(initial: u64) -> Self {
        Self {
            signaled: initial,
            completed: initial,
        }
    }

    /// Bumps the counter and returns the value the next submission signals
    pub fn next_signal(&mut self) -> u64 {
        self.signaled += 1;
        self.signaled
    }

    /// Adopts a value chosen elsewhere as the next signal
    pub fn signal(&mut self, value: u64) {
        debug_assert!(value > self.signaled);
        self.signaled = value;
    }

    pub fn signaled(&self) -> u64 {
        self.signaled
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn observe(&mut self, completed: u64) {
        debug_assert!(completed <= self.signaled);
        self.completed = self.completed.max(completed);
    }

    pub fn is_complete(&self, value: u64) -> bool {
        self.completed >= value
    }

    pub fn is_idle(&self) -> bool {
        self.completed == self.signaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_increase_by_one() {
        let mut fence = FenceValue::new(0);
        assert_eq!(fence.next_signal(), 1);
        assert_eq!(fence.next_signal(), 2);
        assert_eq!(fence.signaled(), 2);
        assert!(!fence.is_idle());
    }

    #[test]
    fn completion_never_moves_backwards() {
        let mut fence = FenceValue::new(0);
        let first = fence.next_signal();
        let second = fence.next_signal();

        fence.observe(second);
        fence.observe(first);

        assert_eq!(fence.completed(), second);
        assert!(fence.is_complete(first));
        assert!(fence.is_idle());
    }

    #[test]
    fn adopted_signal_must_be_completed_to_idle() {
        let mut fence = FenceValue::new(0);
        fence.signal(7);

        assert!(!fence.is_complete(7));
        fence.observe(7);
        assert!(fence.is_idle());
    }
}
