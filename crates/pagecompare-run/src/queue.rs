//! Work queue of test cases.
//!
//! Filled once before the workers start and drained with a single
//! atomic pop, so two workers can never claim the same test case and
//! none can see "empty" while a case is still unclaimed.

use crossbeam::queue::SegQueue;

use crate::layout::TestCase;

/// Lock-free FIFO of test cases.
#[derive(Debug, Default)]
pub struct TestCaseQueue {
    inner: SegQueue<TestCase>,
}

impl TestCaseQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a test case at the back.
    pub fn push(&self, test_case: TestCase) {
        self.inner.push(test_case);
    }

    /// Claim the next test case, or `None` once the queue is drained.
    #[must_use]
    pub fn try_dequeue(&self) -> Option<TestCase> {
        self.inner.pop()
    }

    /// Number of unclaimed test cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if every test case has been claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<TestCase> for TestCaseQueue {
    fn from_iter<I: IntoIterator<Item = TestCase>>(iter: I) -> Self {
        let queue = Self::new();
        for test_case in iter {
            queue.push(test_case);
        }
        queue
    }
}
