//! Reader-to-issuer PDU hand-off
//!
//! A bounded single-producer/single-consumer queue. The reader task puts
//! every PDU that is not a notification or indication; the issuer blocks on
//! `get_blocking` for the response to its outstanding request. `close`
//! cancels both sides so `disconnect` never leaves a waiter stuck.

use crate::att::pdu::AttPdu;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct Inner {
    items: VecDeque<AttPdu>,
    closed: bool,
}

/// Bounded blocking FIFO of decoded ATT PDUs.
pub struct PduQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl PduQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Append one PDU, blocking while the queue is full.
    pub fn put_blocking(&self, pdu: AttPdu) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        while inner.items.len() >= self.capacity {
            if inner.closed {
                return Err(Error::Cancelled);
            }
            inner = self.not_full.wait(inner).unwrap();
        }
        if inner.closed {
            return Err(Error::Cancelled);
        }
        inner.items.push_back(pdu);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest PDU, blocking while the queue is empty.
    pub fn get_blocking(&self) -> Result<AttPdu> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.closed {
                return Err(Error::Cancelled);
            }
            if let Some(pdu) = inner.items.pop_front() {
                self.not_full.notify_one();
                return Ok(pdu);
            }
            inner = self.not_empty.wait(inner).unwrap();
        }
    }

    /// Drain all entries and cancel every current and future waiter.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.items.clear();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let q = PduQueue::new(4);
        q.put_blocking(AttPdu::ReadRequest { handle: 1 }).unwrap();
        q.put_blocking(AttPdu::ReadRequest { handle: 2 }).unwrap();
        q.put_blocking(AttPdu::WriteResponse).unwrap();
        assert_eq!(q.len(), 3);
        assert_eq!(q.get_blocking().unwrap(), AttPdu::ReadRequest { handle: 1 });
        assert_eq!(q.get_blocking().unwrap(), AttPdu::ReadRequest { handle: 2 });
        assert_eq!(q.get_blocking().unwrap(), AttPdu::WriteResponse);
        assert!(q.is_empty());
    }

    #[test]
    fn test_put_blocks_until_space() {
        let q = Arc::new(PduQueue::new(1));
        q.put_blocking(AttPdu::WriteResponse).unwrap();

        let q2 = q.clone();
        let producer = thread::spawn(move || {
            q2.put_blocking(AttPdu::HandleValueConfirmation).unwrap();
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(q.len(), 1);
        assert_eq!(q.get_blocking().unwrap(), AttPdu::WriteResponse);
        producer.join().unwrap();
        assert_eq!(q.get_blocking().unwrap(), AttPdu::HandleValueConfirmation);
    }

    #[test]
    fn test_close_cancels_waiter() {
        let q = Arc::new(PduQueue::new(4));
        let q2 = q.clone();
        let consumer = thread::spawn(move || q2.get_blocking());

        thread::sleep(Duration::from_millis(50));
        q.close();
        assert!(matches!(consumer.join().unwrap(), Err(Error::Cancelled)));

        // closed queue rejects everything from now on
        assert!(matches!(
            q.put_blocking(AttPdu::WriteResponse),
            Err(Error::Cancelled)
        ));
        assert!(matches!(q.get_blocking(), Err(Error::Cancelled)));
    }
}
