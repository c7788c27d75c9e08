use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    pipeline::RunStatus,
    scheduler::{RunContext, Scheduler, Trigger},
};

/// 固定トピックを一定間隔で実行するデーモンを起動する。
///
/// 初回は起動直後に実行する。実行が間隔より長引いた場合、次回は終了から数えて 1 間隔後になり、
/// 取りこぼした分をまとめて実行することはない。
#[must_use]
pub fn spawn_interval_daemon(
    scheduler: Scheduler,
    topic: String,
    period: Duration,
) -> JoinHandle<()> {
    IntervalDaemon {
        scheduler,
        topic,
        period,
    }
    .spawn()
}

struct IntervalDaemon {
    scheduler: Scheduler,
    topic: String,
    period: Duration,
}

impl IntervalDaemon {
    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let run_id = Uuid::new_v4();
            let context = RunContext::new(run_id, self.topic.clone(), Trigger::Scheduled);
            match self.scheduler.run_now(context).await {
                Some(result) => match result.status {
                    RunStatus::Completed => info!(
                        %run_id,
                        topic = %self.topic,
                        delivered = result.documents_delivered,
                        failed = result.delivery_failures.len(),
                        "scheduled ingestion run completed"
                    ),
                    RunStatus::FetchFailed { error } => error!(
                        %run_id,
                        topic = %self.topic,
                        %error,
                        "scheduled ingestion run failed"
                    ),
                },
                None => warn!(
                    topic = %self.topic,
                    "previous run still in progress, skipped scheduled tick"
                ),
            }

            info!(
                topic = %self.topic,
                interval_seconds = self.period.as_secs(),
                "scheduled next ingestion run"
            );
        }
    }
}
