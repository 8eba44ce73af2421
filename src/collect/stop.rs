use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cooperative cancellation for collection runs, polled between items.
///
/// Stops when its [`StopHandle`] fires or its deadline passes, whichever
/// comes first.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
  rx: Option<watch::Receiver<bool>>,
  deadline: Option<Instant>,
}

/// Sender half of [`StopSignal::channel`].
#[derive(Debug)]
pub struct StopHandle {
  tx: watch::Sender<bool>,
}

impl StopHandle {
  pub fn stop(&self) {
    self.tx.send_replace(true);
  }
}

impl StopSignal {
  /// A signal that never fires.
  pub fn never() -> Self {
    Self::default()
  }

  pub fn channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (
      StopHandle { tx },
      StopSignal {
        rx: Some(rx),
        deadline: None,
      },
    )
  }

  pub fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(deadline);
    self
  }

  pub fn with_timeout(self, timeout: Duration) -> Self {
    self.with_deadline(Instant::now() + timeout)
  }

  pub fn is_stopped(&self) -> bool {
    let signalled = self.rx.as_ref().is_some_and(|rx| *rx.borrow());
    let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
    signalled || expired
  }
}
