use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ChangeFeed, LocalEvent};

/// [`ChangeFeed`] fed by a watcher through a bounded channel.
#[derive(Debug)]
pub struct ChannelFeed {
    rx: mpsc::Receiver<Vec<LocalEvent>>,
}

impl ChannelFeed {
    pub fn new(capacity: usize) -> (mpsc::Sender<Vec<LocalEvent>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl ChangeFeed for ChannelFeed {
    async fn next_batch(&mut self) -> Option<Vec<LocalEvent>> {
        self.rx.recv().await
    }

    fn try_next_batch(&mut self) -> Option<Vec<LocalEvent>> {
        self.rx.try_recv().ok()
    }
}
