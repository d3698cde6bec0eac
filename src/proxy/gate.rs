//! Cooperative pause gate
//!
//! A broadcast gate every worker awaits before admission. Closing the gate
//! blocks new entrants; work already past the gate runs to completion.
//! Built on a watch channel, so a `close` racing an `open` resolves to
//! whichever write lands last without losing waiters.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Gate {
    state: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn new(open: bool) -> Self {
        let (tx, _) = watch::channel(open);
        Self { state: Arc::new(tx) }
    }

    /// Admit waiters and all future entrants
    pub fn open(&self) {
        self.state.send_replace(true);
    }

    /// Block new entrants until the next `open`
    pub fn close(&self) {
        self.state.send_replace(false);
    }

    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait until the gate is open. Returns immediately when already open.
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // sender lives in self, so changed() cannot fail while we hold it
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(true)
    }
}
