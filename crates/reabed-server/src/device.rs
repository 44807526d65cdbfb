//! The shared device context.
//!
//! A [`Device`] owns the state store, the subscriber registry and the path of
//! the backing file. One instance is created per server and handed to every
//! connection handler and to the ingestor behind an `Arc`.
//!
//! There are two ways to change the bed:
//!
//! - **Set** ([`Device::set_angles`] and friends), used by the command server
//!   and the REST façade: validate, then rewrite the backing file. The store
//!   is not touched and nobody is notified directly; the ingestor picks the
//!   new record up on its next pass.
//! - **Apply** ([`Device::apply_angles`] and friends), used by the ingestor:
//!   validate, update the store and broadcast to the topic's subscribers.
//!
//! Both paths run with the store lock held from validation to the end of the
//! write, so a reader never sees a half applied update and two concurrent
//! sets never produce a mixed record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reabed_core::record::{format_state, parse_state};
use reabed_core::{
    Angles, DeviceState, MemoryStore, StateStore, StateUpdate, Topic, ValidationError,
};
use reabed_protocol::Notification;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DeviceError;
use crate::subscription::SubscriberRegistry;

/// Shared state of one simulated bed.
#[derive(Debug)]
pub struct Device {
    store: Mutex<MemoryStore>,
    registry: Arc<SubscriberRegistry>,
    backing_file: PathBuf,
}

impl Device {
    /// Create a device with every field at zero.
    pub fn new(backing_file: impl Into<PathBuf>) -> Self {
        Self {
            store: Mutex::new(MemoryStore::new()),
            registry: Arc::new(SubscriberRegistry::new()),
            backing_file: backing_file.into(),
        }
    }

    pub fn backing_file(&self) -> &Path {
        &self.backing_file
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Snapshot of the current state.
    pub async fn get(&self) -> DeviceState {
        self.store.lock().await.get()
    }

    /// Create the backing file from the current state if it does not exist.
    pub async fn ensure_backing_file(&self) -> Result<(), DeviceError> {
        let store = self.store.lock().await;
        if tokio::fs::try_exists(&self.backing_file)
            .await
            .unwrap_or(false)
        {
            return Ok(());
        }
        info!(
            "Creating device file {} from current state",
            self.backing_file.display()
        );
        self.write_record(&store.get()).await
    }

    // ------------------------------------------------------------------------
    // Set path (command server, REST façade)
    // ------------------------------------------------------------------------

    pub async fn set_angles(&self, angles: Angles) -> Result<DeviceState, DeviceError> {
        self.set(StateUpdate::angles(angles)).await
    }

    pub async fn set_height(&self, height: i32) -> Result<DeviceState, DeviceError> {
        self.set(StateUpdate::height(height)).await
    }

    pub async fn set_weight(&self, weight: i32) -> Result<DeviceState, DeviceError> {
        self.set(StateUpdate::weight(weight)).await
    }

    /// Validate `update` and write the resulting full record to the backing file.
    ///
    /// Fields not in `update` come from the record currently in the file, or
    /// from the store when the file holds no valid record. Returns the record
    /// that was written.
    async fn set(&self, update: StateUpdate) -> Result<DeviceState, DeviceError> {
        let store = self.store.lock().await;
        if let Err(e) = update.validate() {
            warn!("Rejected set {:?}: {}", update, e);
            return Err(e.into());
        }

        let base = match self.read_record().await {
            Some(record) if record.validate().is_ok() => record,
            _ => store.get(),
        };
        let record = base.merged(&update);
        self.write_record(&record).await?;
        debug!("Wrote {} to {}", format_state(&record), self.backing_file.display());
        Ok(record)
    }

    async fn read_record(&self) -> Option<DeviceState> {
        let text = tokio::fs::read_to_string(&self.backing_file).await.ok()?;
        let line = text.lines().rev().find(|l| !l.trim().is_empty())?;
        parse_state(line).ok()
    }

    /// Overwrite the backing file with `record`.
    ///
    /// The record goes to a sibling temporary file first and is then renamed
    /// into place, so the ingestor never reads a partial line.
    async fn write_record(&self, record: &DeviceState) -> Result<(), DeviceError> {
        let persist_err = |source| DeviceError::Persist {
            path: self.backing_file.clone(),
            source,
        };

        let mut tmp = self.backing_file.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, format_state(record))
            .await
            .map_err(persist_err)?;
        tokio::fs::rename(&tmp, &self.backing_file)
            .await
            .map_err(persist_err)
    }

    // ------------------------------------------------------------------------
    // Apply path (ingestor)
    // ------------------------------------------------------------------------

    pub async fn apply_angles(&self, angles: Angles) -> Result<DeviceState, ValidationError> {
        self.apply(Topic::Angles, StateUpdate::angles(angles)).await
    }

    pub async fn apply_height(&self, height: i32) -> Result<DeviceState, ValidationError> {
        self.apply(Topic::Height, StateUpdate::height(height)).await
    }

    pub async fn apply_weight(&self, weight: i32) -> Result<DeviceState, ValidationError> {
        self.apply(Topic::Weight, StateUpdate::weight(weight)).await
    }

    /// Update the store and notify subscribers of `topic`.
    async fn apply(
        &self,
        topic: Topic,
        update: StateUpdate,
    ) -> Result<DeviceState, ValidationError> {
        let mut store = self.store.lock().await;
        let state = store.try_set(&update)?;
        let notification = Notification::from_state(topic, &state);
        let delivered = self.registry.broadcast(&notification).await;
        info!("{} ({} subscribers)", notification, delivered);
        Ok(state)
    }

    /// Apply every group of `record` that differs from the store.
    ///
    /// Angles are applied as one group, height and weight on their own. A
    /// group that fails validation is logged and skipped; the others still
    /// apply. Returns the topics that changed.
    pub async fn ingest(&self, record: &DeviceState) -> Vec<Topic> {
        let current = self.get().await;
        let mut changed = Vec::new();

        if record.angles() != current.angles() {
            match self.apply_angles(record.angles()).await {
                Ok(_) => changed.push(Topic::Angles),
                Err(e) => warn!("Angles are not set: {}", e),
            }
        }
        if record.height != current.height {
            match self.apply_height(record.height).await {
                Ok(_) => changed.push(Topic::Height),
                Err(e) => warn!("Height is not set: {}", e),
            }
        }
        if record.weight != current.weight {
            match self.apply_weight(record.weight).await {
                Ok(_) => changed.push(Topic::Weight),
                Err(e) => warn!("Weight is not set: {}", e),
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reabed_core::Field;
    use tempfile::TempDir;

    fn device_in(dir: &TempDir) -> Device {
        Device::new(dir.path().join("device.csv"))
    }

    async fn file_contents(device: &Device) -> String {
        tokio::fs::read_to_string(device.backing_file()).await.unwrap()
    }

    #[tokio::test]
    async fn test_ensure_backing_file_creates_zero_record() {
        let dir = TempDir::new().unwrap();
        let device = device_in(&dir);

        device.ensure_backing_file().await.unwrap();
        assert_eq!(file_contents(&device).await, "0,0,0,0,0");
    }

    #[tokio::test]
    async fn test_ensure_backing_file_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let device = device_in(&dir);
        tokio::fs::write(device.backing_file(), "1,2,3,4,5")
            .await
            .unwrap();

        device.ensure_backing_file().await.unwrap();
        assert_eq!(file_contents(&device).await, "1,2,3,4,5");
    }

    #[tokio::test]
    async fn test_set_writes_file_but_not_store() {
        let dir = TempDir::new().unwrap();
        let device = device_in(&dir);
        device.ensure_backing_file().await.unwrap();

        let record = device.set_weight(80).await.unwrap();

        assert_eq!(record.weight, 80);
        assert_eq!(file_contents(&device).await, "0,0,0,0,80");
        assert_eq!(device.get().await.weight, 0);
    }

    #[tokio::test]
    async fn test_consecutive_sets_keep_earlier_fields() {
        let dir = TempDir::new().unwrap();
        let device = device_in(&dir);
        device.ensure_backing_file().await.unwrap();

        device.set_angles(Angles::new(10, -5, 20)).await.unwrap();
        device.set_height(60).await.unwrap();

        assert_eq!(file_contents(&device).await, "10,-5,20,60,0");
    }

    #[tokio::test]
    async fn test_rejected_set_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let device = device_in(&dir);
        device.ensure_backing_file().await.unwrap();

        let err = device.set_height(150).await.unwrap_err();
        match err {
            DeviceError::Validation(e) => assert_eq!(e.field, Field::Height),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err_text(device.set_height(150).await).contains("height angle is out of range"));
        assert_eq!(file_contents(&device).await, "0,0,0,0,0");
    }

    fn err_text(result: Result<DeviceState, DeviceError>) -> String {
        result.unwrap_err().to_string()
    }

    #[tokio::test]
    async fn test_set_reports_unwritable_file() {
        let dir = TempDir::new().unwrap();
        let device = Device::new(dir.path().join("missing-dir").join("device.csv"));

        let err = device.set_weight(10).await.unwrap_err();
        assert!(matches!(err, DeviceError::Persist { .. }));
    }

    #[tokio::test]
    async fn test_apply_updates_store_and_notifies() {
        let dir = TempDir::new().unwrap();
        let device = device_in(&dir);
        let (sub, mut rx) = device.registry().attach("127.0.0.1:1".parse().unwrap());
        device.registry().subscribe(Topic::Angles, &sub).await;

        let state = device.apply_angles(Angles::new(30, 5, 10)).await.unwrap();

        assert_eq!(state.angles(), Angles::new(30, 5, 10));
        assert_eq!(device.get().await.angles(), Angles::new(30, 5, 10));
        assert_eq!(
            rx.recv().await.unwrap(),
            "!Notify! New angles: back=30, hip=5, ankle=10\n"
        );
    }

    #[tokio::test]
    async fn test_apply_rejects_out_of_range() {
        let dir = TempDir::new().unwrap();
        let device = device_in(&dir);
        let (sub, mut rx) = device.registry().attach("127.0.0.1:1".parse().unwrap());
        device.registry().subscribe(Topic::Weight, &sub).await;

        assert!(device.apply_weight(400).await.is_err());
        assert_eq!(device.get().await, DeviceState::default());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ingest_applies_only_differences() {
        let dir = TempDir::new().unwrap();
        let device = device_in(&dir);
        let (sub, mut rx) = device.registry().attach("127.0.0.1:1".parse().unwrap());
        for topic in Topic::ALL {
            device.registry().subscribe(topic, &sub).await;
        }

        let record = DeviceState {
            height: 40,
            ..Default::default()
        };
        assert_eq!(device.ingest(&record).await, vec![Topic::Height]);
        assert_eq!(rx.recv().await.unwrap(), "!Notify! New height: 40\n");

        // Same record again: nothing changes, nothing is sent.
        assert!(device.ingest(&record).await.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ingest_skips_invalid_group_only() {
        let dir = TempDir::new().unwrap();
        let device = device_in(&dir);

        let record = DeviceState {
            back: 99,
            hip: 0,
            ankle: 0,
            height: 20,
            weight: 70,
        };
        let changed = device.ingest(&record).await;

        assert_eq!(changed, vec![Topic::Height, Topic::Weight]);
        let state = device.get().await;
        assert_eq!(state.angles(), Angles::default());
        assert_eq!(state.height, 20);
        assert_eq!(state.weight, 70);
    }

    #[tokio::test]
    async fn test_concurrent_sets_never_mix() {
        let dir = TempDir::new().unwrap();
        let device = Arc::new(device_in(&dir));
        device.ensure_backing_file().await.unwrap();

        let a = tokio::spawn({
            let device = device.clone();
            async move { device.set_weight(100).await }
        });
        let b = tokio::spawn({
            let device = device.clone();
            async move { device.set_weight(200).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let record = parse_state(&file_contents(&device).await).unwrap();
        assert!(record.weight == 100 || record.weight == 200);
        assert_eq!(
            record,
            DeviceState {
                weight: record.weight,
                ..Default::default()
            }
        );
    }
}
