use std::collections::VecDeque;
use std::sync::Mutex;

/// A batch of filenames discovered under one parent directory.
#[derive(Debug, Clone)]
pub struct FileBatch {
    pub parent: String,
    pub names: Vec<String>,
}

/// The directory queue: a FIFO with tail-removal support for
/// `get_dir_queue_items`. Guarded by a single mutex; every operation is
/// O(1) except tail removal, which is O(k) for k items removed.
#[derive(Default)]
pub struct DirQueue {
    inner: Mutex<VecDeque<String>>,
}

impl DirQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: String) {
        self.inner.lock().unwrap().push_back(path);
    }

    pub fn push_many(&self, paths: impl IntoIterator<Item = String>) {
        let mut q = self.inner.lock().unwrap();
        q.extend(paths);
    }

    /// Pops from the *head* — used by scanner threads draining work, not by
    /// the rebalancing path.
    pub fn pop_front(&self) -> Option<String> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes up to `max(count, ceil(percentage * size))` items from the
    /// *tail* of the queue. Tail removal keeps this call from contending
    /// with scanner threads popping from the head.
    pub fn take_tail(&self, count: usize, percentage: Option<f64>) -> Vec<String> {
        let mut q = self.inner.lock().unwrap();
        let size = q.len();
        let by_pct = percentage
            .map(|p| (p * size as f64).ceil() as usize)
            .unwrap_or(0);
        let take = count.max(by_pct).min(size);

        let mut items = Vec::with_capacity(take);
        for _ in 0..take {
            match q.pop_back() {
                Some(item) => items.push(item),
                None => break,
            }
        }
        items
    }
}

/// The file queue: a plain FIFO of batches.
#[derive(Default)]
pub struct FileQueue {
    inner: Mutex<VecDeque<FileBatch>>,
}

impl FileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, batch: FileBatch) {
        self.inner.lock().unwrap().push_back(batch);
    }

    pub fn pop_front(&self) -> Option<FileBatch> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_tail_respects_count_and_percentage() {
        let q = DirQueue::new();
        q.push_many((0..10).map(|i| format!("/d{i}")));

        let items = q.take_tail(2, Some(0.5));
        // ceil(0.5 * 10) = 5, max(2, 5) = 5
        assert_eq!(items.len(), 5);
        assert_eq!(q.len(), 5);
    }

    #[test]
    fn take_tail_never_exceeds_size() {
        let q = DirQueue::new();
        q.push_many(["/a".to_string(), "/b".to_string()]);
        let items = q.take_tail(10, None);
        assert_eq!(items.len(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn file_queue_is_fifo() {
        let q = FileQueue::new();
        q.push(FileBatch {
            parent: "/a".into(),
            names: vec!["x".into()],
        });
        q.push(FileBatch {
            parent: "/b".into(),
            names: vec!["y".into()],
        });
        assert_eq!(q.pop_front().unwrap().parent, "/a");
        assert_eq!(q.pop_front().unwrap().parent, "/b");
        assert!(q.pop_front().is_none());
    }
}
