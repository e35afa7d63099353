//! Async snapshot streams.
//!
//! [`SnapshotStream`] turns a [`Connection`] into a `Stream` of owned
//! [`Snapshot`]s for tokio applications. Each poll is a non-blocking
//! [`Connection::try_snapshot`]; between empty polls the stream sleeps on the
//! tokio timer instead of blocking on the producer's event.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use irsdk_poll::stream::SnapshotStream;
//! use irsdk_poll::{Connection, UpdateRate};
//!
//! # async fn run() -> irsdk_poll::Result<()> {
//! let connection = Connection::attach()?;
//! let mut snapshots = SnapshotStream::new(connection, UpdateRate::Max(10))?;
//! while let Some(snapshot) = snapshots.next().await {
//!     println!("tick {}", snapshot.tick);
//! }
//! # Ok(())
//! # }
//! ```

mod throttle;

pub use throttle::{Throttle, ThrottleExt};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, warn};

use crate::Result;
use crate::connection::Connection;
use crate::region::{DataEvent, SharedRegion};
use crate::types::{Snapshot, UpdateRate};

/// Sleep between polls that find no new row.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Stream of snapshots from one connection.
///
/// Ends when a read fails; reattaching is left to the caller.
pub struct SnapshotStream {
    inner: BoxStream<'static, Snapshot>,
}

impl SnapshotStream {
    /// Stream at `rate`, polling every [`DEFAULT_POLL_INTERVAL`] while idle.
    pub fn new<R, E>(connection: Connection<R, E>, rate: UpdateRate) -> Result<Self>
    where
        R: SharedRegion + Send + 'static,
        E: DataEvent + Send + 'static,
    {
        Self::with_poll_interval(connection, rate, DEFAULT_POLL_INTERVAL)
    }

    /// Stream at `rate`, sleeping `poll_interval` between empty polls.
    pub fn with_poll_interval<R, E>(
        connection: Connection<R, E>,
        rate: UpdateRate,
        poll_interval: Duration,
    ) -> Result<Self>
    where
        R: SharedRegion + Send + 'static,
        E: DataEvent + Send + 'static,
    {
        let tick_rate = f64::from(connection.header()?.tick_rate);
        let rows = stream::unfold(connection, move |mut connection| async move {
            loop {
                match connection.try_snapshot() {
                    Ok(Some(snapshot)) => return Some((snapshot, connection)),
                    Ok(None) => tokio::time::sleep(poll_interval).await,
                    Err(error) => {
                        warn!(%error, "Snapshot stream ended on read error");
                        return None;
                    }
                }
            }
        });

        let inner = match rate.throttle_interval(tick_rate) {
            Some(interval) => {
                debug!(?interval, tick_rate, "Throttling snapshot stream");
                rows.throttle(interval).boxed()
            }
            None => rows.boxed(),
        };

        Ok(Self { inner })
    }
}

impl Stream for SnapshotStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Snapshot>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReaderConfig;
    use crate::simulator::{Producer, RegionLayout};
    use crate::types::VariableType;

    fn producer() -> Producer {
        RegionLayout::new(3)
            .variable("Speed", VariableType::Float, 1, "m/s", "GPS vehicle speed")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn yields_published_rows_in_order() {
        let mut producer = producer();
        let connection =
            Connection::from_parts(producer.region(), producer.event(), ReaderConfig::default())
                .unwrap();
        let speed = producer.variables()[0].clone();
        let mut snapshots = SnapshotStream::new(connection, UpdateRate::Native).unwrap();

        for value in [10.0f32, 20.0, 30.0] {
            let row = producer.row().set("Speed", value).unwrap().build();
            let tick = producer.publish(&row).unwrap();

            let snapshot = snapshots.next().await.unwrap();
            assert_eq!(snapshot.tick, tick);
            assert_eq!(snapshot.get::<f32>(&speed).unwrap(), value);
        }
    }

    #[tokio::test]
    async fn idle_stream_waits_for_the_producer() {
        let mut producer = producer();
        let connection =
            Connection::from_parts(producer.region(), producer.event(), ReaderConfig::default())
                .unwrap();
        let mut snapshots = SnapshotStream::with_poll_interval(
            connection,
            UpdateRate::Native,
            Duration::from_millis(1),
        )
        .unwrap();

        let pending =
            tokio::time::timeout(Duration::from_millis(20), snapshots.next()).await;
        assert!(pending.is_err(), "no row published yet");

        let row = producer.row().build();
        producer.publish(&row).unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(2), snapshots.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.tick, 1);
    }

    #[tokio::test]
    async fn throttled_stream_keeps_latest() {
        let mut producer = producer();
        let connection =
            Connection::from_parts(producer.region(), producer.event(), ReaderConfig::default())
                .unwrap();
        let row = producer.row().build();
        producer.publish(&row).unwrap();

        let mut snapshots = SnapshotStream::new(connection, UpdateRate::Max(5)).unwrap();
        let first = snapshots.next().await.unwrap();
        assert_eq!(first.tick, 1);
    }
}
