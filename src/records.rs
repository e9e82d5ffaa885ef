//! Per-block digests shared between the streamer and the block server.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, SyncError};

#[derive(Debug, Default)]
struct Inner {
    digests: Vec<Vec<u8>>,
    closed: bool,
}

/// Append-only list of block digests, indexed by absolute block index.
///
/// Only the streamer pushes. Readers asking for a block that is not there
/// yet wait until it is published, or fail once the list is closed.
#[derive(Debug)]
pub struct BlockRecords {
    start: u64,
    inner: Mutex<Inner>,
    published: Condvar,
}

impl BlockRecords {
    pub fn new(start_block_offset: u64) -> Self {
        Self {
            start: start_block_offset,
            inner: Mutex::new(Inner::default()),
            published: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the digest of the next block.
    pub fn push(&self, digest: Vec<u8>) {
        self.lock().digests.push(digest);
        self.published.notify_all();
    }

    /// No more digests will be pushed.
    pub fn close(&self) {
        self.lock().closed = true;
        self.published.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Digest for absolute block `index`, waiting for the streamer if needed.
    pub fn wait_for(&self, index: u64) -> Result<Vec<u8>> {
        let slot = index
            .checked_sub(self.start)
            .and_then(|slot| usize::try_from(slot).ok())
            .ok_or(SyncError::BlockNotHashed { index })?;

        let mut inner = self.lock();
        loop {
            if let Some(digest) = inner.digests.get(slot) {
                return Ok(digest.clone());
            }
            if inner.closed {
                return Err(SyncError::BlockNotHashed { index });
            }
            inner = self
                .published
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn indexes_relative_to_start() {
        let records = BlockRecords::new(5);
        records.push(vec![5]);
        records.push(vec![6]);
        assert_eq!(records.wait_for(5).unwrap(), vec![5]);
        assert_eq!(records.wait_for(6).unwrap(), vec![6]);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn rejects_index_before_start() {
        let records = BlockRecords::new(5);
        records.push(vec![5]);
        assert!(matches!(
            records.wait_for(4),
            Err(SyncError::BlockNotHashed { index: 4 })
        ));
    }

    #[test]
    fn closed_list_rejects_missing_index() {
        let records = BlockRecords::new(0);
        records.push(vec![0]);
        records.close();
        assert!(matches!(
            records.wait_for(1),
            Err(SyncError::BlockNotHashed { index: 1 })
        ));
        assert_eq!(records.wait_for(0).unwrap(), vec![0]);
    }

    #[test]
    fn waiter_wakes_when_block_is_published() {
        let records = Arc::new(BlockRecords::new(0));
        let reader = {
            let records = Arc::clone(&records);
            thread::spawn(move || records.wait_for(2))
        };
        for i in 0..3u8 {
            thread::sleep(Duration::from_millis(5));
            records.push(vec![i]);
        }
        assert_eq!(reader.join().unwrap().unwrap(), vec![2]);
    }

    #[test]
    fn waiter_wakes_when_closed() {
        let records = Arc::new(BlockRecords::new(0));
        let reader = {
            let records = Arc::clone(&records);
            thread::spawn(move || records.wait_for(0))
        };
        thread::sleep(Duration::from_millis(10));
        records.close();
        assert!(matches!(
            reader.join().unwrap(),
            Err(SyncError::BlockNotHashed { index: 0 })
        ));
    }
}
