//! Destinations for scraped items.

use crate::item::Item;
use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{info, warn};

/// Receives every item the crawl produces, one at a time.
#[async_trait]
pub trait ItemSink: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn accept(&self, item: Item);

    /// Called once when the crawl closes.
    async fn close(&self) {}
}

#[async_trait]
impl<T: ItemSink + ?Sized> ItemSink for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn accept(&self, item: Item) {
        (**self).accept(item).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Logs each item at `info` level. Used when no other sink is configured.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl ItemSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn accept(&self, item: Item) {
        info!("Scraped {}", item);
    }
}

/// Forwards items to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<Item>,
}

impl ChannelSink {
    /// Returns the sink together with the receiving end of its channel.
    pub fn new() -> (Self, UnboundedReceiver<Item>) {
        let (tx, rx) = unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

#[async_trait]
impl ItemSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    async fn accept(&self, item: Item) {
        if let Err(e) = self.tx.send(item) {
            warn!("Item receiver dropped, discarding {}", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemSchema;

    static ROW: ItemSchema = ItemSchema::new("Row", &["n"]);

    #[tokio::test]
    async fn test_channel_sink_forwards_items() {
        let (sink, mut rx) = ChannelSink::new();
        sink.accept(Item::from_pairs(&ROW, [("n", 1)]).unwrap()).await;
        let item = rx.recv().await.unwrap();
        assert_eq!(item.get("n").unwrap(), Some(&serde_json::Value::from(1)));

        drop(rx);
        // A closed receiver must not panic the sink.
        sink.accept(Item::new(&ROW)).await;
    }
}
