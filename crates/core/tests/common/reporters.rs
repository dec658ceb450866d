//! Test doubles for the completion reporter.

use async_trait::async_trait;
use rn_core::reporter::{CompletionReport, CompletionReporter};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Records every report it receives.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<CompletionReport>>,
    notify: Notify,
}

#[allow(dead_code)]
impl RecordingReporter {
    pub fn reports(&self) -> Vec<CompletionReport> {
        self.reports.lock().unwrap().clone()
    }

    /// Wait until at least `count` reports arrived.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<CompletionReport> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                let reports = self.reports();
                if reports.len() >= count {
                    return reports;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for completion reports")
    }
}

#[async_trait]
impl CompletionReporter for RecordingReporter {
    async fn report(&self, report: &CompletionReport) {
        self.reports.lock().unwrap().push(report.clone());
        self.notify.notify_waiters();
    }
}
