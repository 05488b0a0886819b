//! Observable values with change de-duplication.

use tokio::sync::watch;

/// A value observers can subscribe to.
///
/// Publishing a value equal to the current one does not wake subscribers.
#[derive(Debug)]
pub struct Store<T> {
    sender: watch::Sender<T>,
}

impl<T: PartialEq> Store<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Store { sender }
    }

    /// Replaces the value if it differs. Returns whether subscribers were
    /// notified.
    pub fn publish(&self, value: T) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Borrows the current value. Do not hold across an `.await`.
    pub fn current(&self) -> watch::Ref<'_, T> {
        self.sender.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_do_not_notify() {
        let store = Store::new(vec![1, 2]);
        let mut rx = store.subscribe();

        assert!(!store.publish(vec![1, 2]));
        assert!(!rx.has_changed().unwrap());

        assert!(store.publish(vec![1, 2, 3]));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![1, 2, 3]);
    }

    #[test]
    fn publishes_without_subscribers() {
        let store = Store::new(0u8);
        assert!(store.publish(7));
        assert_eq!(*store.current(), 7);
    }
}
