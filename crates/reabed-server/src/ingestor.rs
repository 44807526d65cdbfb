//! Backing file ingestor.
//!
//! The device file is the upstream feed for the bed state. The ingestor polls
//! it at a fixed interval and applies every new record through
//! [`Device::ingest`], which updates the store and notifies subscribers.
//!
//! A line cursor is kept between passes so that appended records are read
//! once. The file is normally rewritten in place (one record, fully
//! overwritten), which leaves no lines past the cursor. Whenever the content
//! read last time is no longer a prefix of the current content, the file was
//! rewritten and the cursor goes back to the first line. Re-reading a line is
//! harmless because only differences are applied.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reabed_core::record::parse_state;
use tracing::{debug, error, warn};

use crate::device::Device;
use crate::error::IngestError;

/// Polls the backing file and feeds it into a [`Device`].
pub struct Ingestor {
    device: Arc<Device>,
    path: PathBuf,
    interval: Duration,
    cursor: usize,
    last_content: Vec<u8>,
}

impl Ingestor {
    pub fn new(device: Arc<Device>, interval: Duration) -> Self {
        let path = device.backing_file().to_path_buf();
        Self {
            device,
            path,
            interval,
            cursor: 0,
            last_content: Vec::new(),
        }
    }

    /// Index of the next line to read.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Poll forever. Errors are logged and retried on the next pass.
    pub async fn run(mut self) {
        debug!(
            "Ingesting {} every {:?}",
            self.path.display(),
            self.interval
        );
        loop {
            match self.poll_once().await {
                Ok(0) => {}
                Ok(n) => debug!("Ingested {} record(s) from {}", n, self.path.display()),
                Err(e) => error!("{}", e),
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Run one pass over the file.
    ///
    /// Returns the number of well-formed records read. Malformed lines,
    /// including lines that are not valid UTF-8, are logged and skipped
    /// without touching the store.
    pub async fn poll_once(&mut self) -> Result<usize, IngestError> {
        let content = tokio::fs::read(&self.path)
            .await
            .map_err(|source| IngestError::SourceUnavailable {
                path: self.path.clone(),
                source,
            })?;

        if !self.is_append(&content) {
            self.cursor = 0;
        }
        let lines = split_lines(&content);
        let start = self.cursor.min(lines.len());

        let mut records = 0;
        for raw in &lines[start..] {
            let line = match std::str::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Wrong data in {}: {:?} ({})", self.path.display(), raw, e);
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_state(line) {
                Ok(record) => {
                    self.device.ingest(&record).await;
                    records += 1;
                }
                Err(e) => warn!("Wrong data in {}: {:?} ({})", self.path.display(), line, e),
            }
        }

        self.cursor = lines.len();
        self.last_content = content;
        Ok(records)
    }

    /// Whether `content` only adds whole lines to what was read last pass.
    ///
    /// A last line without terminator may have been rewritten in place, so
    /// any change after it counts as a rewrite.
    fn is_append(&self, content: &[u8]) -> bool {
        let last = &self.last_content;
        content.starts_with(last)
            && (last.is_empty() || last.ends_with(b"\n") || content == &last[..])
    }
}

/// Split on `\n`, dropping a trailing `\r` and the empty piece after a final newline.
fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    let mut lines: Vec<&[u8]> = content
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect();
    if lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use reabed_core::{Angles, DeviceState, Topic};
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Arc<Device>, Ingestor) {
        let device = Arc::new(Device::new(dir.path().join("device.csv")));
        let ingestor = Ingestor::new(device.clone(), Duration::from_millis(10));
        (device, ingestor)
    }

    async fn write(device: &Device, text: &str) {
        tokio::fs::write(device.backing_file(), text).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_and_state_kept() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);

        let err = ingestor.poll_once().await.unwrap_err();
        assert!(matches!(err, IngestError::SourceUnavailable { .. }));
        assert_eq!(device.get().await, DeviceState::default());

        // The file showing up later is picked up on the next pass.
        write(&device, "10,0,5,50,80").await;
        assert_eq!(ingestor.poll_once().await.unwrap(), 1);
        assert_eq!(device.get().await.weight, 80);
    }

    #[tokio::test]
    async fn test_applies_record() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);
        write(&device, "10,-5,20,50,80").await;

        ingestor.poll_once().await.unwrap();

        assert_eq!(
            device.get().await,
            DeviceState {
                back: 10,
                hip: -5,
                ankle: 20,
                height: 50,
                weight: 80,
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_line_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);
        write(&device, "1,2,3,4,5").await;
        ingestor.poll_once().await.unwrap();
        let before = device.get().await;

        write(&device, "x,1,2,3,4").await;
        assert_eq!(ingestor.poll_once().await.unwrap(), 0);

        assert_eq!(device.get().await, before);
    }

    #[tokio::test]
    async fn test_appended_lines_are_read_once() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);
        write(&device, "1,0,0,0,0\n").await;
        ingestor.poll_once().await.unwrap();
        assert_eq!(ingestor.cursor(), 1);

        write(&device, "1,0,0,0,0\n2,0,0,0,0\nbad\n3,0,0,0,0\n").await;
        assert_eq!(ingestor.poll_once().await.unwrap(), 2);
        assert_eq!(ingestor.cursor(), 4);
        assert_eq!(device.get().await.back, 3);
    }

    #[tokio::test]
    async fn test_rewritten_file_is_reread() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);
        write(&device, "0,0,0,0,80").await;
        ingestor.poll_once().await.unwrap();
        assert_eq!(device.get().await.weight, 80);

        // Same length, different content.
        write(&device, "0,0,0,0,90").await;
        ingestor.poll_once().await.unwrap();
        assert_eq!(device.get().await.weight, 90);

        // Longer content sharing the old record as a prefix.
        write(&device, "0,0,0,0,900").await;
        ingestor.poll_once().await.unwrap();
        assert_eq!(device.get().await.weight, 900);

        // Shorter content.
        write(&device, "5,0,0,0,9").await;
        ingestor.poll_once().await.unwrap();
        assert_eq!(device.get().await.back, 5);
        assert_eq!(device.get().await.weight, 9);
    }

    #[tokio::test]
    async fn test_back_to_back_sets_of_same_length_are_applied() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);
        device.ensure_backing_file().await.unwrap();

        for round in 0..50 {
            device.set_weight(10).await.unwrap();
            ingestor.poll_once().await.unwrap();
            assert_eq!(device.get().await.weight, 10, "round {round}");

            device.set_weight(20).await.unwrap();
            ingestor.poll_once().await.unwrap();
            assert_eq!(device.get().await.weight, 20, "round {round}");
        }
    }

    #[tokio::test]
    async fn test_unchanged_file_is_not_reapplied() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);
        write(&device, "1,0,0,0,0\n").await;
        assert_eq!(ingestor.poll_once().await.unwrap(), 1);
        assert_eq!(ingestor.poll_once().await.unwrap(), 0);
        assert_eq!(ingestor.cursor(), 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);
        tokio::fs::write(device.backing_file(), b"1,\xff,0,0,0\n10,0,5,50,80\n")
            .await
            .unwrap();

        assert_eq!(ingestor.poll_once().await.unwrap(), 1);
        assert_eq!(
            device.get().await,
            DeviceState {
                back: 10,
                hip: 0,
                ankle: 5,
                height: 50,
                weight: 80,
            }
        );
    }

    #[test]
    fn test_split_lines() {
        assert!(split_lines(b"").is_empty());
        assert_eq!(split_lines(b"a\r\nb"), vec![&b"a"[..], &b"b"[..]]);
        assert_eq!(split_lines(b"a\n\nb\n"), vec![&b"a"[..], &b""[..], &b"b"[..]]);
    }

    #[tokio::test]
    async fn test_set_then_ingest_notifies_subscribers() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);
        device.ensure_backing_file().await.unwrap();
        ingestor.poll_once().await.unwrap();

        let (sub, mut rx) = device.registry().attach("127.0.0.1:1".parse().unwrap());
        device.registry().subscribe(Topic::Weight, &sub).await;

        device.set_weight(80).await.unwrap();
        assert_eq!(device.get().await.weight, 0);

        ingestor.poll_once().await.unwrap();
        assert_eq!(device.get().await.weight, 80);
        let line = rx.recv().await.unwrap();
        assert!(line.contains("80"), "{line}");
    }

    #[tokio::test]
    async fn test_set_angles_roundtrip_through_ingestor() {
        let dir = TempDir::new().unwrap();
        let (device, mut ingestor) = setup(&dir);
        device.ensure_backing_file().await.unwrap();

        for (back, hip, ankle) in [(0, -15, 0), (50, 15, 30), (25, 0, 12)] {
            let angles = Angles::new(back, hip, ankle);
            device.set_angles(angles).await.unwrap();
            ingestor.poll_once().await.unwrap();
            assert_eq!(device.get().await.angles(), angles);
        }
    }
}
