//! One-shot reply handle: the mechanism that makes "every request
//! replies exactly once" a type-level property rather than a
//! convention (design notes §9).

use tokio::sync::oneshot;

/// Moves into a request handler; calling [`ReplyHandle::reply`]
/// consumes it. Dropping it without replying panics in debug builds,
/// per the error-handling design's discipline.
pub struct ReplyHandle<T> {
    sender: Option<oneshot::Sender<T>>,
    replied: bool,
}

impl<T> ReplyHandle<T> {
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender: Some(sender), replied: false }, receiver)
    }

    pub fn reply(mut self, value: T) {
        self.replied = true;
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(value);
        }
    }
}

impl<T> Drop for ReplyHandle<T> {
    fn drop(&mut self) {
        if !self.replied {
            debug_assert!(false, "reply handle dropped without a reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reply_delivers_value_to_receiver() {
        let (handle, receiver) = ReplyHandle::new();
        handle.reply(42);
        assert_eq!(receiver.await.unwrap(), 42);
    }

    #[tokio::test]
    #[should_panic(expected = "dropped without a reply")]
    async fn dropping_without_reply_panics_in_debug() {
        let (handle, _receiver): (ReplyHandle<i32>, _) = ReplyHandle::new();
        drop(handle);
    }
}
