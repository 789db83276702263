use std::collections::VecDeque;

/// Encoded requests waiting for a connection, oldest first.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    messages: VecDeque<String>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an encoded envelope.
    pub fn push(&mut self, raw: String) {
        self.messages.push_back(raw);
    }

    /// Put messages back at the front, keeping their relative order.
    pub fn requeue_front(&mut self, raws: impl IntoIterator<Item = String>) {
        let raws: Vec<String> = raws.into_iter().collect();
        for raw in raws.into_iter().rev() {
            self.messages.push_front(raw);
        }
    }

    /// Take every buffered message in enqueue order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages).into()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Buffered messages in enqueue order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_fifo_order_and_clears() {
        let mut queue = OutboundQueue::new();
        queue.push("one".into());
        queue.push("two".into());
        queue.push("three".into());
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec!["one", "two", "three"]);

        assert_eq!(queue.drain(), vec!["one", "two", "three"]);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn requeue_front_preserves_original_order() {
        let mut queue = OutboundQueue::new();
        queue.push("later".into());
        queue.requeue_front(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(queue.drain(), vec!["first", "second", "later"]);
    }
}
