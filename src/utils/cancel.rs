use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation shared between the Ctrl+C listener and the
/// per-record loops. Checked once before each record.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Trips the flag. Returns whether it was already tripped.
    pub fn interrupt(&self) -> bool {
        self.cancelled.swap(true, Ordering::SeqCst)
    }

    /// Spawns a task that trips the flag on the first Ctrl+C and exits the
    /// process on the second.
    pub fn listen_for_ctrl_c(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("❌ Failed to install Ctrl+C handler: {}", e);
                    return;
                }
                if flag.interrupt() {
                    tracing::warn!("⚠️  Second interrupt, exiting now");
                    std::process::exit(130);
                }
                tracing::warn!("⚠️  Interrupt received, stopping after the current record");
                tracing::warn!("⚠️  Press Ctrl+C again to exit immediately");
            }
        });
    }
}
