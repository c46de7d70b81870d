use crate::domain::model::RunSummary;
use crate::domain::ports::Job;
use crate::utils::cancel::CancelFlag;
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;

/// Drives one job through its phases.
pub struct SyncEngine<J: Job> {
    job: J,
    monitor: RunMonitor,
}

impl<J: Job> SyncEngine<J> {
    pub fn new(job: J) -> Self {
        Self {
            job,
            monitor: RunMonitor::default(),
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = RunMonitor::new(enabled);
        self
    }

    pub fn job(&self) -> &J {
        &self.job
    }

    pub async fn run(&self, cancel: &CancelFlag) -> Result<RunSummary> {
        let name = self.job.name();
        tracing::info!("🚀 Starting {}", name);

        // 準備: 欄位檢查與建立
        tracing::info!("🔧 Preparing columns...");
        self.job.prepare().await?;
        self.monitor.end_phase("prepare");

        // 執行: 逐筆處理
        tracing::info!("⚙️  Processing records...");
        let summary = self.job.execute(cancel).await?;
        self.monitor.end_phase("execute");

        if summary.interrupted {
            tracing::warn!(
                "⚠️  {} interrupted: {}/{} records handled",
                name,
                summary.processed(),
                summary.total
            );
        } else {
            tracing::info!(
                "✅ {} finished: {} ok, {} failed, {} skipped",
                name,
                summary.succeeded,
                summary.failed,
                summary.skipped
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::SyncError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedJob {
        calls: Mutex<Vec<&'static str>>,
        fail_prepare: bool,
    }

    #[async_trait]
    impl Job for ScriptedJob {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn prepare(&self) -> Result<()> {
            self.calls.lock().unwrap().push("prepare");
            if self.fail_prepare {
                return Err(SyncError::processing("cannot create column"));
            }
            Ok(())
        }

        async fn execute(&self, cancel: &CancelFlag) -> Result<RunSummary> {
            self.calls.lock().unwrap().push("execute");
            Ok(RunSummary {
                total: 3,
                succeeded: 3,
                interrupted: cancel.is_cancelled(),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_runs_prepare_then_execute() {
        let engine = SyncEngine::new(ScriptedJob::default());
        let summary = engine.run(&CancelFlag::new()).await.unwrap();

        assert_eq!(summary.succeeded, 3);
        assert_eq!(*engine.job().calls.lock().unwrap(), vec!["prepare", "execute"]);
    }

    #[tokio::test]
    async fn test_prepare_failure_stops_run() {
        let engine = SyncEngine::new(ScriptedJob {
            fail_prepare: true,
            ..Default::default()
        });

        assert!(engine.run(&CancelFlag::new()).await.is_err());
        assert_eq!(*engine.job().calls.lock().unwrap(), vec!["prepare"]);
    }

    #[tokio::test]
    async fn test_monitoring_does_not_change_result() {
        let engine = SyncEngine::new(ScriptedJob::default()).with_monitoring(true);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let summary = engine.run(&cancel).await.unwrap();
        assert!(summary.interrupted);
    }
}
