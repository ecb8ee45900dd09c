//! One-shot result cells.
//!
//! Each `put` creates a slot pair: the writer travels with the item into the
//! batch, the reader stays with the producer. Both halves are consumed on use,
//! so a slot delivers at most once and is read at most once.

use tokio::sync::oneshot;

/// Creates a connected writer/reader pair.
pub(crate) fn wait_slot<V>() -> (SlotWriter<V>, SlotReader<V>) {
    let (tx, rx) = oneshot::channel();
    (SlotWriter(tx), SlotReader(rx))
}

#[derive(Debug)]
pub(crate) struct SlotWriter<V>(oneshot::Sender<V>);

impl<V> SlotWriter<V> {
    /// Delivers the value. Returns false if the reader is gone.
    pub(crate) fn deliver(self, value: V) -> bool {
        self.0.send(value).is_ok()
    }
}

#[derive(Debug)]
pub(crate) struct SlotReader<V>(oneshot::Receiver<V>);

impl<V> SlotReader<V> {
    /// Waits for the value. Returns `None` if the writer was dropped first.
    pub(crate) async fn wait(self) -> Option<V> {
        self.0.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_once() {
        let (writer, reader) = wait_slot();
        assert!(writer.deliver(7u32));
        assert_eq!(reader.wait().await, Some(7));
    }

    #[tokio::test]
    async fn test_reader_waits_for_delivery() {
        let (writer, reader) = wait_slot();
        let waiter = tokio::spawn(reader.wait());
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        writer.deliver("done");
        assert_eq!(waiter.await.unwrap(), Some("done"));
    }

    #[tokio::test]
    async fn test_dropped_writer_yields_none() {
        let (writer, reader) = wait_slot::<u32>();
        drop(writer);
        assert_eq!(reader.wait().await, None);
    }

    #[test]
    fn test_deliver_to_dropped_reader() {
        let (writer, reader) = wait_slot();
        drop(reader);
        assert!(!writer.deliver(1u8));
    }
}
