//! Per-camera blob storage for frames of unknown visitors.
//!
//! Each camera id is an isolated namespace. Frame names are the capture time
//! at one-second resolution (`2026-10-19_12-00-05.jpg`), with a zero-padded
//! counter appended when a second already holds a frame, so names sort by
//! time.

use crate::common::{Result, WatcherError};
use crate::storage::signing::UrlSigner;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, TimeZone};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

pub const FRAME_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
pub const FRAME_EXTENSION: &str = "jpg";
/// Frames accepted per camera within one second before giving up.
pub const MAX_FRAMES_PER_SECOND: u32 = 100;

const TIMESTAMP_LEN: usize = 19;

/// `seq == 0` yields the bare timestamp name.
pub fn frame_name<Tz: TimeZone>(at: &DateTime<Tz>, seq: u32) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let stamp = at.format(FRAME_NAME_FORMAT);
    if seq == 0 {
        format!("{}.{}", stamp, FRAME_EXTENSION)
    } else {
        format!("{}_{:02}.{}", stamp, seq, FRAME_EXTENSION)
    }
}

/// Capture date and time recovered from a frame name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameStamp {
    pub date: String,
    pub time: String,
}

pub fn parse_frame_name(name: &str) -> Option<FrameStamp> {
    let stamp = name.get(..TIMESTAMP_LEN)?;
    let parsed = NaiveDateTime::parse_from_str(stamp, FRAME_NAME_FORMAT).ok()?;
    Some(FrameStamp {
        date: parsed.format("%Y-%m-%d").to_string(),
        time: parsed.format("%H:%M:%S").to_string(),
    })
}

/// A stored frame together with a link that is valid for a bounded time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLink {
    pub name: String,
    pub url: String,
    pub expires: i64,
}

/// Camera ids and frame names become path components and URL segments.
pub fn validate_key(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= 128
        && !value.starts_with('.')
        && value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(WatcherError::Validation(format!("Invalid {}: {:?}", kind, value)))
    }
}

#[async_trait]
pub trait FrameStore: Send + Sync {
    /// Create the namespace if it does not exist yet.
    async fn ensure_namespace(&self, camera_id: &str) -> Result<()>;

    async fn namespace_exists(&self, camera_id: &str) -> Result<bool>;

    /// Write a frame, replacing any frame of the same name.
    async fn put(&self, camera_id: &str, name: &str, data: Bytes) -> Result<()>;

    /// Write a frame only if the name is free. Returns `false` when taken.
    async fn create(&self, camera_id: &str, name: &str, data: Bytes) -> Result<bool>;

    async fn get(&self, camera_id: &str, name: &str) -> Result<Bytes>;

    async fn remove(&self, camera_id: &str, name: &str) -> Result<()>;

    /// Frame names in ascending (time) order. Missing namespaces are empty.
    async fn names(&self, camera_id: &str) -> Result<Vec<String>>;

    async fn list(&self, camera_id: &str, signer: &UrlSigner, now: i64) -> Result<Vec<FrameLink>> {
        let names = self.names(camera_id).await?;
        names
            .into_iter()
            .map(|name| {
                let signed = signer.sign(camera_id, &name, now)?;
                Ok(FrameLink { name, url: signed.url, expires: signed.expires })
            })
            .collect()
    }
}

/// One directory per camera under `root`.
pub struct LocalFrameStore {
    root: PathBuf,
}

impl LocalFrameStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .map_err(|e| WatcherError::Storage(format!("Failed to create {:?}: {}", root, e)))?;
        Ok(Self { root })
    }

    fn namespace(&self, camera_id: &str) -> Result<PathBuf> {
        validate_key("camera id", camera_id)?;
        Ok(self.root.join(camera_id))
    }

    async fn frame_path(&self, camera_id: &str, name: &str) -> Result<PathBuf> {
        validate_key("frame name", name)?;
        let dir = self.namespace(camera_id)?;
        if !tokio::fs::try_exists(&dir).await? {
            return Err(WatcherError::Storage(format!("Namespace {} does not exist", camera_id)));
        }
        Ok(dir.join(name))
    }
}

fn not_found(camera_id: &str, name: &str) -> WatcherError {
    WatcherError::NotFound(format!("Frame {}/{}", camera_id, name))
}

#[async_trait]
impl FrameStore for LocalFrameStore {
    async fn ensure_namespace(&self, camera_id: &str) -> Result<()> {
        let dir = self.namespace(camera_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn namespace_exists(&self, camera_id: &str) -> Result<bool> {
        let dir = self.namespace(camera_id)?;
        Ok(tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false))
    }

    async fn put(&self, camera_id: &str, name: &str, data: Bytes) -> Result<()> {
        let path = self.frame_path(camera_id, name).await?;
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn create(&self, camera_id: &str, name: &str, data: Bytes) -> Result<bool> {
        let path = self.frame_path(camera_id, name).await?;
        let mut file = match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(true)
    }

    async fn get(&self, camera_id: &str, name: &str) -> Result<Bytes> {
        let path = self.frame_path(camera_id, name).await?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(camera_id, name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, camera_id: &str, name: &str) -> Result<()> {
        let path = self.frame_path(camera_id, name).await?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(camera_id, name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn names(&self, camera_id: &str) -> Result<Vec<String>> {
        let dir = self.namespace(camera_id)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Process-local store, used by tests and throwaway dev runs.
#[derive(Default)]
pub struct MemoryFrameStore {
    namespaces: Mutex<HashMap<String, BTreeMap<String, Bytes>>>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self, camera_id: &str) -> usize {
        self.namespaces.lock().get(camera_id).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl FrameStore for MemoryFrameStore {
    async fn ensure_namespace(&self, camera_id: &str) -> Result<()> {
        validate_key("camera id", camera_id)?;
        self.namespaces.lock().entry(camera_id.to_string()).or_default();
        Ok(())
    }

    async fn namespace_exists(&self, camera_id: &str) -> Result<bool> {
        Ok(self.namespaces.lock().contains_key(camera_id))
    }

    async fn put(&self, camera_id: &str, name: &str, data: Bytes) -> Result<()> {
        validate_key("frame name", name)?;
        let mut namespaces = self.namespaces.lock();
        let frames = namespaces
            .get_mut(camera_id)
            .ok_or_else(|| WatcherError::Storage(format!("Namespace {} does not exist", camera_id)))?;
        frames.insert(name.to_string(), data);
        Ok(())
    }

    async fn create(&self, camera_id: &str, name: &str, data: Bytes) -> Result<bool> {
        validate_key("frame name", name)?;
        let mut namespaces = self.namespaces.lock();
        let frames = namespaces
            .get_mut(camera_id)
            .ok_or_else(|| WatcherError::Storage(format!("Namespace {} does not exist", camera_id)))?;
        if frames.contains_key(name) {
            return Ok(false);
        }
        frames.insert(name.to_string(), data);
        Ok(true)
    }

    async fn get(&self, camera_id: &str, name: &str) -> Result<Bytes> {
        self.namespaces
            .lock()
            .get(camera_id)
            .and_then(|frames| frames.get(name).cloned())
            .ok_or_else(|| not_found(camera_id, name))
    }

    async fn remove(&self, camera_id: &str, name: &str) -> Result<()> {
        self.namespaces
            .lock()
            .get_mut(camera_id)
            .and_then(|frames| frames.remove(name))
            .map(|_| ())
            .ok_or_else(|| not_found(camera_id, name))
    }

    async fn names(&self, camera_id: &str) -> Result<Vec<String>> {
        Ok(self
            .namespaces
            .lock()
            .get(camera_id)
            .map(|frames| frames.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
    }

    #[test]
    fn names_sort_by_time() {
        let mut names = vec![
            frame_name(&at(12, 0, 6), 0),
            frame_name(&at(12, 0, 5), 1),
            frame_name(&at(9, 59, 59), 0),
            frame_name(&at(12, 0, 5), 0),
            frame_name(&at(12, 0, 5), 10),
        ];
        names.sort();
        assert_eq!(names, vec![
            "2026-10-19_09-59-59.jpg",
            "2026-10-19_12-00-05.jpg",
            "2026-10-19_12-00-05_01.jpg",
            "2026-10-19_12-00-05_10.jpg",
            "2026-10-19_12-00-06.jpg",
        ]);
    }

    #[test]
    fn stamp_is_split_into_date_and_time() {
        assert_eq!(
            parse_frame_name("2026-10-19_12-00-05_03.jpg"),
            Some(FrameStamp { date: "2026-10-19".into(), time: "12:00:05".into() })
        );
        assert!(parse_frame_name(&frame_name(&Utc::now(), 0)).is_some());
        assert_eq!(parse_frame_name("snapshot.jpg"), None);
    }

    #[test]
    fn keys_reject_path_tricks() {
        assert!(validate_key("camera id", "cam-7").is_ok());
        for bad in ["", "..", ".hidden", "a/b", "a b", "cam\\7"] {
            assert!(validate_key("camera id", bad).is_err(), "{:?} accepted", bad);
        }
    }

    #[tokio::test]
    async fn memory_store_requires_namespace() {
        let store = MemoryFrameStore::new();
        assert!(!store.namespace_exists("cam-7").await.unwrap());
        assert!(store.put("cam-7", "a.jpg", Bytes::from_static(b"x")).await.is_err());

        store.ensure_namespace("cam-7").await.unwrap();
        store.ensure_namespace("cam-7").await.unwrap();
        assert!(store.create("cam-7", "a.jpg", Bytes::from_static(b"x")).await.unwrap());
        assert!(!store.create("cam-7", "a.jpg", Bytes::from_static(b"y")).await.unwrap());
        assert_eq!(store.get("cam-7", "a.jpg").await.unwrap(), Bytes::from_static(b"x"));
        assert_eq!(store.frame_count("cam-7"), 1);
    }

    #[tokio::test]
    async fn local_store_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalFrameStore::new(tmp.path().to_path_buf()).unwrap();

        assert!(store.put("cam-7", "a.jpg", Bytes::from_static(b"x")).await.is_err());
        store.ensure_namespace("cam-7").await.unwrap();
        assert!(store.namespace_exists("cam-7").await.unwrap());

        assert!(store.create("cam-7", "b.jpg", Bytes::from_static(b"second")).await.unwrap());
        assert!(store.create("cam-7", "a.jpg", Bytes::from_static(b"first")).await.unwrap());
        assert!(!store.create("cam-7", "a.jpg", Bytes::from_static(b"again")).await.unwrap());
        store.put("cam-7", "b.jpg", Bytes::from_static(b"replaced")).await.unwrap();

        assert_eq!(store.names("cam-7").await.unwrap(), vec!["a.jpg", "b.jpg"]);
        assert_eq!(store.get("cam-7", "b.jpg").await.unwrap(), Bytes::from_static(b"replaced"));

        store.remove("cam-7", "a.jpg").await.unwrap();
        assert!(matches!(store.remove("cam-7", "a.jpg").await, Err(WatcherError::NotFound(_))));
        assert!(matches!(store.get("cam-7", "a.jpg").await, Err(WatcherError::NotFound(_))));
        assert!(store.names("cam-9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_signs_every_frame() {
        let store = MemoryFrameStore::new();
        store.ensure_namespace("cam-7").await.unwrap();
        store.put("cam-7", "2026-10-19_12-00-05.jpg", Bytes::from_static(b"x")).await.unwrap();

        let signer = UrlSigner::new(b"k".to_vec(), "http://h", Duration::from_secs(3600));
        let links = store.list("cam-7", &signer, 1_000).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].expires, 4_600);
        assert!(links[0].url.starts_with("http://h/blob/cam-7/2026-10-19_12-00-05.jpg?"));
    }
}
