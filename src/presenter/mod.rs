//! Elapsed-time presentation.
//!
//! An [`ElapsedTicker`] refreshes its notion of "now" once per second and
//! whenever its `since` input changes, so "time since last state change"
//! stays current without the caller polling.

use crate::api::DeviceId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Refresh period of a ticker.
pub const TICK: Duration = Duration::from_secs(1);

/// Wall clock anchored to the tokio monotonic clock at start.
#[derive(Debug, Clone, Copy)]
struct Clock {
    wall: DateTime<Utc>,
    instant: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            instant: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.instant.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + offset
    }
}

/// Periodic "now" source bound to one `since` input.
///
/// Dropping the ticker stops its timer.
#[derive(Debug)]
pub struct ElapsedTicker {
    since: watch::Receiver<DateTime<Utc>>,
    now: watch::Receiver<DateTime<Utc>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ElapsedTicker {
    /// Spawn a fresh timer. Must be called inside a tokio runtime.
    pub fn start(since: watch::Receiver<DateTime<Utc>>) -> Self {
        let clock = Clock::start();
        let (now_tx, now) = watch::channel(clock.now());
        let cancel = CancellationToken::new();

        let task = {
            let mut since = since.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(TICK);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                let mut input_open = true;

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            now_tx.send_replace(clock.now());
                        }
                        changed = since.changed(), if input_open => {
                            if changed.is_err() {
                                // Input dropped: keep ticking on the last value
                                input_open = false;
                            } else {
                                now_tx.send_replace(clock.now());
                            }
                        }
                    }
                }
            })
        };

        Self {
            since,
            now,
            cancel,
            task,
        }
    }

    /// Latest tick value.
    pub fn now(&self) -> DateTime<Utc> {
        *self.now.borrow()
    }

    pub fn since(&self) -> DateTime<Utc> {
        *self.since.borrow()
    }

    /// `now - since`, never negative.
    pub fn elapsed(&self) -> chrono::Duration {
        (self.now() - self.since()).max(chrono::Duration::zero())
    }

    /// Notified on every tick.
    pub fn subscribe(&self) -> watch::Receiver<DateTime<Utc>> {
        self.now.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// One ticker per displayed device.
#[derive(Debug, Default)]
pub struct TickerBoard {
    rows: HashMap<DeviceId, (watch::Sender<DateTime<Utc>>, ElapsedTicker)>,
}

impl TickerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the board to the displayed rows.
    ///
    /// New ids get a ticker, existing ones have their `since` updated, and
    /// tickers for ids no longer shown are stopped.
    pub fn sync(&mut self, rows: impl IntoIterator<Item = (DeviceId, DateTime<Utc>)>) {
        let mut next = HashMap::new();
        for (id, since) in rows {
            let row = match self.rows.remove(&id) {
                Some((tx, ticker)) => {
                    tx.send_if_modified(|current| {
                        if *current == since {
                            false
                        } else {
                            *current = since;
                            true
                        }
                    });
                    (tx, ticker)
                }
                None => {
                    let (tx, rx) = watch::channel(since);
                    (tx, ElapsedTicker::start(rx))
                }
            };
            next.insert(id, row);
        }
        // Whatever is left is dropped, which stops those tickers
        self.rows = next;
    }

    pub fn elapsed(&self, id: DeviceId) -> Option<chrono::Duration> {
        self.rows.get(&id).map(|(_, ticker)| ticker.elapsed())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Render an elapsed duration for display.
///
/// ```
/// use oracle::presenter::format_elapsed;
///
/// assert_eq!(format_elapsed(chrono::Duration::seconds(45)), "45s");
/// assert_eq!(format_elapsed(chrono::Duration::seconds(192)), "3m 12s");
/// assert_eq!(format_elapsed(chrono::Duration::seconds(7501)), "2h 5m 1s");
/// ```
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let seconds = elapsed.num_seconds().max(0);
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn past() -> DateTime<Utc> {
        Utc.timestamp_opt(1_000, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_refreshes_every_second() {
        let (_since_tx, since_rx) = watch::channel(past());
        let ticker = ElapsedTicker::start(since_rx);
        let start = ticker.now();

        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(ticker.now() - start, chrono::Duration::seconds(3));
        assert!(ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_since_change_recomputes_immediately() {
        let (since_tx, since_rx) = watch::channel(past());
        let ticker = ElapsedTicker::start(since_rx);
        let start = ticker.now();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let mut now_rx = ticker.subscribe();
        now_rx.borrow_and_update();
        since_tx.send_replace(start);
        now_rx.changed().await.unwrap();

        assert_eq!(ticker.now() - start, chrono::Duration::milliseconds(1500));
        assert_eq!(ticker.elapsed(), chrono::Duration::milliseconds(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_future_since_clamps_to_zero() {
        let future = Utc::now() + chrono::Duration::days(1);
        let (_since_tx, since_rx) = watch::channel(future);
        let ticker = ElapsedTicker::start(since_rx);
        assert_eq!(ticker.elapsed(), chrono::Duration::zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_freezes_now() {
        let (_since_tx, since_rx) = watch::channel(past());
        let ticker = ElapsedTicker::start(since_rx);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        ticker.stop();
        assert!(!ticker.is_running());
        let frozen = ticker.now();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticker.now(), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_timer() {
        let (_since_tx, since_rx) = watch::channel(past());
        let ticker = ElapsedTicker::start(since_rx);
        let mut now_rx = ticker.subscribe();
        now_rx.borrow_and_update();

        drop(ticker);

        // The task ends and drops its sender
        while now_rx.changed().await.is_ok() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_board_tracks_rows() {
        let mut board = TickerBoard::new();
        board.sync(vec![(1, past()), (2, past())]);
        assert_eq!(board.len(), 2);
        assert!(board.elapsed(1).unwrap() > chrono::Duration::zero());

        let recent = Utc::now() + chrono::Duration::days(1);
        board.sync(vec![(2, recent)]);
        assert_eq!(board.len(), 1);
        assert!(board.elapsed(1).is_none());
        assert_eq!(board.elapsed(2), Some(chrono::Duration::zero()));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(chrono::Duration::seconds(0)), "0s");
        assert_eq!(format_elapsed(chrono::Duration::seconds(59)), "59s");
        assert_eq!(format_elapsed(chrono::Duration::seconds(60)), "1m 0s");
        assert_eq!(format_elapsed(chrono::Duration::seconds(3600)), "1h 0m 0s");
        assert_eq!(format_elapsed(chrono::Duration::seconds(3 * 86_400 + 4 * 3600 + 59)), "3d 4h");
        assert_eq!(format_elapsed(chrono::Duration::seconds(-5)), "0s");
    }
}
