//! Single-slot, last-value-wins mailbox shared between a receiver task and its reader

use parking_lot::Mutex;

/// Holds at most one unread value. A newer `put` replaces an unread one;
/// `take` never blocks and returns `None` when nothing new has arrived.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store `value`, returning true if an unread value was overwritten
    pub fn put(&self, value: T) -> bool {
        self.slot.lock().replace(value).is_some()
    }

    /// Remove and return the unread value, if any
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn has_unread(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn clear(&self) {
        self.slot.lock().take();
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn second_put_wins() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.put(1));
        assert!(mailbox.put(2));

        assert_eq!(mailbox.take(), Some(2));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn empty_take_does_not_block() {
        let mailbox: Mailbox<u8> = Mailbox::default();
        assert!(!mailbox.has_unread());
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn writer_thread_overwrites_unread_values() {
        let mailbox = Arc::new(Mailbox::new());
        let writer = {
            let mailbox = mailbox.clone();
            std::thread::spawn(move || {
                for value in 0..1000u32 {
                    mailbox.put(value);
                }
            })
        };
        writer.join().unwrap();

        assert_eq!(mailbox.take(), Some(999));
        mailbox.put(5);
        mailbox.clear();
        assert!(!mailbox.has_unread());
    }
}
