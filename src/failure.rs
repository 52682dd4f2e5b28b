/// Remembers the one node most recently seen failing a probe.
///
/// Only a single slot: a failure on one node replaces whatever was recorded
/// before, and only a successful probe to the recorded node clears it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailureMemory {
    failed: Option<u8>,
}

impl FailureMemory {
    pub fn record_success(&mut self, node_id: u8) {
        if self.failed == Some(node_id) {
            self.failed = None;
        }
    }

    pub fn record_failure(&mut self, node_id: u8) {
        self.failed = Some(node_id);
    }

    pub fn failed(&self) -> Option<u8> {
        self.failed
    }

    pub fn is_failed(&self, node_id: u8) -> bool {
        self.failed == Some(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_clears_matching_failure() {
        let mut mem = FailureMemory::default();
        mem.record_failure(2);
        assert!(mem.is_failed(2));
        mem.record_success(2);
        assert_eq!(mem.failed(), None);
    }

    #[test]
    fn test_success_on_other_node_keeps_failure() {
        let mut mem = FailureMemory::default();
        mem.record_failure(2);
        mem.record_success(3);
        assert_eq!(mem.failed(), Some(2));
    }

    #[test]
    fn test_new_failure_replaces_old() {
        let mut mem = FailureMemory::default();
        mem.record_failure(2);
        mem.record_failure(5);
        assert_eq!(mem.failed(), Some(5));
        assert!(!mem.is_failed(2));
    }
}
