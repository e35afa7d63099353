//! Polling facade over an attached region.
//!
//! A [`Connection`] owns the region and event handles together with the
//! reader state, so there is no way to poll before attaching or to share
//! reader state between two feeds. [`TelemetryClient`] adds the attach and
//! reattach loop a long-running consumer needs.

use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, trace, warn};

use crate::config::ReaderConfig;
use crate::header::TelemetryHeader;
use crate::reader::{PollOutcome, SnapshotReader};
use crate::region::{DataEvent, LiveSource, RegionSource, SharedRegion};
use crate::session::SessionMetadata;
use crate::types::Snapshot;
use crate::variables::{VariableDescriptor, VariableTable};
use crate::{Result, TelemetryError};

/// Connection type returned by [`Connection::attach`].
pub type LiveConnection =
    Connection<<LiveSource as RegionSource>::Region, <LiveSource as RegionSource>::Event>;

/// An attached telemetry feed.
pub struct Connection<R: SharedRegion, E: DataEvent> {
    region: R,
    event: E,
    reader: SnapshotReader,
    config: ReaderConfig,
    session: Option<SessionMetadata>,
}

impl<R: SharedRegion, E: DataEvent> std::fmt::Debug for Connection<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("region_len", &self.region.len())
            .field("reader", &self.reader)
            .field("session_update", &self.session.as_ref().map(SessionMetadata::update))
            .finish()
    }
}

impl LiveConnection {
    /// Attach to the simulator with the default configuration.
    ///
    /// Fails with [`TelemetryError::ResourceNotFound`] while the simulator
    /// is not running, and with [`TelemetryError::UnsupportedPlatform`] off
    /// Windows.
    pub fn attach() -> Result<Self> {
        Self::attach_with(ReaderConfig::default())
    }

    /// Attach using the names and limits in `config`.
    pub fn attach_with(config: ReaderConfig) -> Result<Self> {
        Self::open(&LiveSource::default(), config)
    }
}

impl<R: SharedRegion, E: DataEvent> Connection<R, E> {
    /// Open both objects through `source` and validate the header.
    pub fn open<S>(source: &S, config: ReaderConfig) -> Result<Self>
    where
        S: RegionSource<Region = R, Event = E>,
    {
        config.validate()?;
        let (region, event) = source.open(&config)?;
        Self::from_parts(region, event, config)
    }

    /// Wrap already-open handles.
    ///
    /// The header must be readable and, when the configuration names one,
    /// carry the expected version.
    pub fn from_parts(region: R, event: E, config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        let header = TelemetryHeader::read_from(&region)?;

        if let Some(expected) = config.expected_version {
            if header.version != expected {
                return Err(TelemetryError::Version { expected, found: header.version });
            }
        }

        info!(
            version = header.version,
            tick_rate = header.tick_rate,
            num_vars = header.num_vars,
            buffer_len = header.buffer_len,
            "Attached to telemetry region"
        );

        Ok(Self {
            region,
            event,
            reader: SnapshotReader::new(config.max_copy_attempts),
            config,
            session: None,
        })
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    /// Current header, read fresh from the region.
    pub fn header(&self) -> Result<TelemetryHeader> {
        TelemetryHeader::read_from(&self.region)
    }

    /// Whether the producer's status flag is set.
    pub fn is_connected(&self) -> Result<bool> {
        Ok(self.header()?.is_connected())
    }

    /// Row length in bytes; size destination buffers with this.
    pub fn row_len(&self) -> Result<usize> {
        let header = self.header()?;
        header.validate_buffers()?;
        Ok(header.buffer_len as usize)
    }

    /// Check for a row newer than the last one reported, without waiting.
    ///
    /// With `dst` the row is copied into it; without, only the tick is noted.
    pub fn poll(&mut self, dst: Option<&mut [u8]>) -> Result<bool> {
        self.reader.poll(&self.region, dst)
    }

    /// [`poll`](Self::poll) with the reason for the result.
    pub fn poll_outcome(&mut self, dst: Option<&mut [u8]>) -> Result<PollOutcome> {
        self.reader.poll_outcome(&self.region, dst)
    }

    /// Poll, waiting up to `timeout` for the producer's signal if nothing is
    /// ready yet.
    ///
    /// When no row arrives, the call sleeps out whatever is left of `timeout`
    /// before returning false, so a retry loop never spins.
    pub fn wait_for_data(&mut self, timeout: Duration, mut dst: Option<&mut [u8]>) -> Result<bool> {
        let start = Instant::now();

        if self.poll(dst.as_deref_mut())? {
            return Ok(true);
        }

        let waited = self.event.wait(timeout)?;

        if self.poll(dst.as_deref_mut())? {
            return Ok(true);
        }

        let remaining = timeout.saturating_sub(start.elapsed());
        if !remaining.is_zero() {
            trace!(?waited, remaining_ms = remaining.as_millis() as u64, "No new row, sleeping");
            thread::sleep(remaining);
        }
        Ok(false)
    }

    /// [`wait_for_data`](Self::wait_for_data) with the configured timeout.
    pub fn wait_for_data_default(&mut self, dst: Option<&mut [u8]>) -> Result<bool> {
        let timeout = self.config.wait_timeout();
        self.wait_for_data(timeout, dst)
    }

    /// Copy the next row into a fresh [`Snapshot`] if one is ready.
    pub fn try_snapshot(&mut self) -> Result<Option<Snapshot>> {
        let Some(mut row) = self.row_buffer()? else {
            // Lets the reader observe the disconnect. A producer that came back
            // between the two header reads has its row reported next call.
            if self.poll(None)? {
                self.reader.reset();
            }
            return Ok(None);
        };
        if self.poll(Some(&mut row))? {
            return self.finish_snapshot(row).map(Some);
        }
        Ok(None)
    }

    /// Wait up to `timeout` for the next row as a [`Snapshot`].
    pub fn read_snapshot(&mut self, timeout: Duration) -> Result<Option<Snapshot>> {
        let Some(mut row) = self.row_buffer()? else {
            if self.wait_for_data(timeout, None)? {
                // The producer came back mid-wait; report that row next time.
                self.reader.reset();
            }
            return Ok(None);
        };
        if self.wait_for_data(timeout, Some(&mut row))? {
            return self.finish_snapshot(row).map(Some);
        }
        Ok(None)
    }

    /// Zeroed row buffer, or `None` while the producer is disconnected.
    fn row_buffer(&self) -> Result<Option<Vec<u8>>> {
        let header = self.header()?;
        if !header.is_connected() {
            return Ok(None);
        }
        header.validate_buffers()?;
        Ok(Some(vec![0u8; header.buffer_len as usize]))
    }

    fn finish_snapshot(&self, row: Vec<u8>) -> Result<Snapshot> {
        let tick = self.reader.last_tick_count().unwrap_or_default();
        let session_update = self.header()?.session_info_update;
        Ok(Snapshot::new(row, tick, session_update))
    }

    /// Row offset of the first variable named `name`.
    pub fn variable_offset(&self, name: &str) -> Result<Option<usize>> {
        self.table(|table| table.offset_of(name))
    }

    /// Descriptor at `index` in table order.
    pub fn variable(&self, index: usize) -> Result<Option<VariableDescriptor>> {
        self.table(|table| table.get(index))
    }

    /// Descriptor of the first variable named `name`.
    pub fn variable_by_name(&self, name: &str) -> Result<Option<VariableDescriptor>> {
        self.table(|table| match table.find(name)? {
            Some((index, _)) => table.get(index),
            None => Ok(None),
        })
    }

    /// Every descriptor in table order.
    pub fn variables(&self) -> Result<Vec<VariableDescriptor>> {
        self.table(|table| table.to_vec())
    }

    fn table<T>(&self, f: impl FnOnce(&VariableTable<'_, R>) -> Result<T>) -> Result<T> {
        let header = self.header()?;
        f(&VariableTable::new(&self.region, &header)?)
    }

    /// Session metadata, or `None` while the producer is disconnected.
    ///
    /// The document is copied again only when the header's update counter
    /// moves.
    pub fn session_info(&mut self) -> Result<Option<SessionMetadata>> {
        let header = self.header()?;
        if !header.is_connected() {
            return Ok(None);
        }

        if let Some(cached) = &self.session {
            if !header.session_info_changed(cached.update()) {
                return Ok(Some(cached.clone()));
            }
        }

        let metadata = SessionMetadata::read_from(&self.region, self.config.max_copy_attempts)?;
        debug!(
            update = metadata.update(),
            bytes = metadata.as_bytes().len(),
            "Session info updated"
        );
        self.session = Some(metadata.clone());
        Ok(Some(metadata))
    }

    /// Producer's session info update counter.
    pub fn session_info_update(&self) -> Result<i32> {
        Ok(self.header()?.session_info_update)
    }

    /// Tick of the last row reported by a poll.
    pub fn last_tick_count(&self) -> Option<i32> {
        self.reader.last_tick_count()
    }

    /// Wall-clock time of the last poll that reported new data.
    pub fn last_valid_time(&self) -> Option<SystemTime> {
        self.reader.last_valid_time()
    }

    /// Release the handles.
    pub fn detach(self) {
        debug!(last_tick = ?self.reader.last_tick_count(), "Detaching from telemetry region");
    }
}

/// Keeps a connection alive across simulator restarts.
///
/// Every call attaches first if needed. A failure from an attached
/// connection drops it, so the next call opens fresh handles.
pub struct TelemetryClient<S: RegionSource> {
    source: S,
    config: ReaderConfig,
    connection: Option<Connection<S::Region, S::Event>>,
}

impl TelemetryClient<LiveSource> {
    /// Client for the live simulator with the default configuration.
    pub fn live() -> Self {
        Self::new(LiveSource::default(), ReaderConfig::default())
    }
}

impl<S: RegionSource> TelemetryClient<S> {
    pub fn new(source: S, config: ReaderConfig) -> Self {
        Self { source, config, connection: None }
    }

    pub fn is_attached(&self) -> bool {
        self.connection.is_some()
    }

    /// Attach unless already attached. Repeat calls are no-ops.
    pub fn ensure_attached(&mut self) -> Result<&mut Connection<S::Region, S::Event>> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => Connection::open(&self.source, self.config.clone())?,
        };
        Ok(self.connection.insert(connection))
    }

    /// The current connection, if attached.
    pub fn connection(&mut self) -> Option<&mut Connection<S::Region, S::Event>> {
        self.connection.as_mut()
    }

    /// Drop the current connection, if any.
    pub fn detach(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.detach();
        }
    }

    /// Attach if needed, then [`Connection::wait_for_data`].
    pub fn wait_for_data(&mut self, timeout: Duration, dst: Option<&mut [u8]>) -> Result<bool> {
        self.with_connection(|connection| connection.wait_for_data(timeout, dst))
    }

    /// Attach if needed, then [`Connection::session_info`].
    pub fn session_info(&mut self) -> Result<Option<SessionMetadata>> {
        self.with_connection(Connection::session_info)
    }

    /// Attach if needed, then [`Connection::read_snapshot`].
    pub fn read_snapshot(&mut self, timeout: Duration) -> Result<Option<Snapshot>> {
        self.with_connection(|connection| connection.read_snapshot(timeout))
    }

    fn with_connection<T>(
        &mut self,
        f: impl FnOnce(&mut Connection<S::Region, S::Event>) -> Result<T>,
    ) -> Result<T> {
        let connection = self.ensure_attached()?;
        let result = f(connection);
        if let Err(error) = &result {
            warn!(%error, "Dropping telemetry connection");
            self.detach();
        }
        result
    }
}
