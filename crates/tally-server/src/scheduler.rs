//! Periodic promotion of scheduled surveys.
//!
//! | Setting  | Source | Description |
//! |----------|--------|-------------|
//! | `period` | `publish_interval_secs` | Time between publish ticks |
//!
//! The first tick fires immediately, so surveys that fell due while the
//! server was down are published at startup. A slow tick delays the next one
//! rather than triggering a burst of catch-up ticks.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tally_core::{lifecycle::run_publish_tick, store::SurveyStore};
use tokio::{
  sync::watch,
  time::{self, MissedTickBehavior},
};

pub struct PublishScheduler<S> {
  store:  Arc<S>,
  period: Duration,
}

impl<S: SurveyStore + 'static> PublishScheduler<S> {
  /// `period` must be non-zero.
  pub fn new(store: Arc<S>, period: Duration) -> Self { Self { store, period } }

  /// Tick until `shutdown` carries `true` or its sender is dropped.
  pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
    let mut interval = time::interval(self.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(period_secs = self.period.as_secs_f64(), "publish scheduler started");

    loop {
      tokio::select! {
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            tracing::info!("publish scheduler stopping");
            break;
          }
        }
        _ = interval.tick() => {
          run_publish_tick(self.store.as_ref(), Utc::now()).await;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration as ChronoDuration;
  use tally_core::survey::{NewSurvey, SurveyStatus};
  use tally_store_sqlite::SqliteStore;

  use super::*;

  #[tokio::test]
  async fn due_survey_is_published_by_the_loop() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let at = Utc::now() + ChronoDuration::milliseconds(300);
    let survey = store
      .create_survey(NewSurvey::scheduled("Launch", at))
      .await
      .unwrap();

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(
      PublishScheduler::new(store.clone(), Duration::from_millis(25)).run(rx),
    );

    let mut published = None;
    for _ in 0..120 {
      time::sleep(Duration::from_millis(25)).await;
      let current = store.get_survey(&survey.survey_id).await.unwrap().unwrap();
      if current.status == SurveyStatus::Published {
        published = Some(current);
        break;
      }
    }

    tx.send(true).unwrap();
    task.await.unwrap();

    let published = published.expect("survey was never published");
    assert_eq!(published.publish_at, survey.publish_at);
  }

  #[tokio::test]
  async fn run_stops_on_shutdown_signal() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(
      PublishScheduler::new(store, Duration::from_millis(10)).run(rx),
    );

    time::sleep(Duration::from_millis(30)).await;
    tx.send(true).unwrap();

    time::timeout(Duration::from_secs(1), task)
      .await
      .expect("scheduler did not stop")
      .unwrap();
  }

  #[tokio::test]
  async fn dropped_sender_stops_the_loop() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(
      PublishScheduler::new(store, Duration::from_millis(10)).run(rx),
    );

    drop(tx);
    time::timeout(Duration::from_secs(1), task)
      .await
      .expect("scheduler did not stop")
      .unwrap();
  }
}
