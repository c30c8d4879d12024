use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Sender side of the progress channel; one `tick` per merged commit.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ProgressHandle {
    /// Never blocks; a closed reporter is ignored.
    pub fn tick(&self) {
        let _ = self.tx.send(());
    }
}

/// Background task turning progress ticks into a progress bar.
///
/// The bar is finalized once, when every [`ProgressHandle`] has been dropped.
pub struct ProgressReporter {
    bar: ProgressBar,
    task: JoinHandle<u64>,
}

impl ProgressReporter {
    /// Reporter drawing to stderr.
    pub fn stderr(total: u64) -> (ProgressHandle, Self) {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} commit {pos}/{len} [{bar:30.cyan/blue}] {eta}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self::spawn(total, bar)
    }

    /// Reporter that counts but draws nothing.
    pub fn hidden(total: u64) -> (ProgressHandle, Self) {
        let bar = ProgressBar::hidden();
        bar.set_length(total);
        Self::spawn(total, bar)
    }

    pub fn spawn(total: u64, bar: ProgressBar) -> (ProgressHandle, Self) {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let task_bar = bar.clone();

        let task = tokio::spawn(async move {
            let mut seen = 0u64;
            while rx.recv().await.is_some() {
                seen += 1;
                task_bar.inc(1);
            }

            if seen == total {
                task_bar.finish_with_message(format!("{seen} commits"));
            } else {
                task_bar.abandon_with_message(format!("stopped at {seen}/{total} commits"));
            }
            seen
        });

        (ProgressHandle { tx }, Self { bar, task })
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    /// Wait for the final report and return the number of ticks observed.
    pub async fn finish(self) -> u64 {
        self.task.await.unwrap_or_else(|_| self.bar.position())
    }
}
