use crate::types::{Feed, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// feedId -> GUIDs seen during the last completed cycle, newest first.
pub type GuidSnapshot = BTreeMap<String, Vec<String>>;

/// Per-feed watermark of delivered entries, persisted as a JSON document.
///
/// Each completed cycle replaces a feed's sequence wholesale rather than
/// appending to it, so the file never grows beyond one cycle's worth of GUIDs
/// per feed. Replacements are staged in memory while a cycle runs and only
/// become visible (and durable) through [`GuidStore::commit_all`].
#[derive(Debug)]
pub struct GuidStore {
    path: PathBuf,
    snapshot: GuidSnapshot,
    staged: HashMap<String, Vec<String>>,
}

impl GuidStore {
    /// Load the snapshot at `path`. An unreadable or malformed file is not
    /// fatal: every feed simply starts with an empty watermark.
    ///
    /// Blocking; call it at startup, before the loop runs.
    pub fn load(path: impl Into<PathBuf>, feeds: &[Feed]) -> Self {
        let path = path.into();
        let mut snapshot = match read_snapshot(&path) {
            Ok(snapshot) => {
                info!(
                    "Loaded watermarks for {} feed(s) from {}",
                    snapshot.len(),
                    path.display()
                );
                snapshot
            }
            Err(e) => {
                warn!(
                    "Could not read watermark file {} ({}); starting with empty watermarks",
                    path.display(),
                    e
                );
                GuidSnapshot::new()
            }
        };

        for feed in feeds {
            snapshot.entry(feed.id.clone()).or_default();
        }

        Self {
            path,
            snapshot,
            staged: HashMap::new(),
        }
    }

    /// Dedup boundary for the next fetch of `feed_id`.
    pub fn watermark(&self, feed_id: &str) -> &[String] {
        self.snapshot
            .get(feed_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Record a replacement sequence for `feed_id`. Not durable until committed.
    pub fn stage(&mut self, feed_id: &str, guids: Vec<String>) {
        debug!("Staged {} guid(s) for feed {}", guids.len(), feed_id);
        self.staged.insert(feed_id.to_string(), guids);
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Drop every staged replacement, leaving the committed snapshot untouched.
    pub fn discard_staged(&mut self) {
        if !self.staged.is_empty() {
            debug!("Discarding {} staged watermark(s)", self.staged.len());
        }
        self.staged.clear();
    }

    /// Apply all staged replacements and write the whole snapshot to disk.
    ///
    /// The in-memory snapshot is updated even when the write fails; the next
    /// successful commit persists it.
    pub async fn commit_all(&mut self) -> Result<()> {
        for (feed_id, guids) in self.staged.drain() {
            self.snapshot.insert(feed_id, guids);
        }
        write_snapshot(&self.path, &self.snapshot).await?;
        debug!("Persisted watermarks to {}", self.path.display());
        Ok(())
    }

    pub fn snapshot(&self) -> &GuidSnapshot {
        &self.snapshot
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_snapshot(path: &Path) -> Result<GuidSnapshot> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

// Write to a sibling file first so an interrupted write never truncates the
// previous snapshot.
async fn write_snapshot(path: &Path, snapshot: &GuidSnapshot) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn feeds(ids: &[&str]) -> Vec<Feed> {
        ids.iter()
            .map(|id| Feed {
                id: id.to_string(),
                url: format!("http://example.com/{}", id),
            })
            .collect()
    }

    fn guids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_file_seeds_every_feed() {
        let dir = TempDir::new().unwrap();
        let store = GuidStore::load(dir.path().join("guids.json"), &feeds(&["a", "b"]));

        assert_eq!(store.snapshot().len(), 2);
        assert!(store.watermark("a").is_empty());
        assert!(store.watermark("b").is_empty());
        assert!(store.watermark("unknown").is_empty());
    }

    #[test]
    fn malformed_file_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guids.json");
        fs::write(&path, "{ definitely not json").unwrap();

        let store = GuidStore::load(&path, &feeds(&["a"]));
        assert!(store.watermark("a").is_empty());
    }

    #[test]
    fn feeds_absent_from_file_start_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guids.json");
        fs::write(&path, r#"{"a": ["g2", "g1"]}"#).unwrap();

        let store = GuidStore::load(&path, &feeds(&["a", "b"]));
        assert_eq!(store.watermark("a"), guids(&["g2", "g1"]).as_slice());
        assert!(store.watermark("b").is_empty());
    }

    #[tokio::test]
    async fn staged_sequences_are_invisible_until_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guids.json");
        let mut store = GuidStore::load(&path, &feeds(&["a"]));

        store.stage("a", guids(&["g1"]));
        assert!(store.watermark("a").is_empty());
        assert!(!path.exists());

        store.commit_all().await.unwrap();
        assert_eq!(store.watermark("a"), guids(&["g1"]).as_slice());
        assert_eq!(store.staged_count(), 0);

        let reloaded = GuidStore::load(&path, &feeds(&["a"]));
        assert_eq!(reloaded.watermark("a"), guids(&["g1"]).as_slice());
    }

    #[tokio::test]
    async fn commit_replaces_rather_than_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guids.json");
        let mut store = GuidStore::load(&path, &feeds(&["a"]));

        store.stage("a", guids(&["g2", "g1"]));
        store.commit_all().await.unwrap();
        store.stage("a", guids(&["g3", "g2"]));
        store.commit_all().await.unwrap();

        assert_eq!(store.watermark("a"), guids(&["g3", "g2"]).as_slice());
        assert!(!dir.path().join("guids.json.tmp").exists());
    }

    #[tokio::test]
    async fn discarded_stages_never_reach_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guids.json");
        let mut store = GuidStore::load(&path, &feeds(&["a", "b"]));
        store.stage("a", guids(&["g1"]));
        store.commit_all().await.unwrap();

        store.stage("a", guids(&["g9"]));
        store.stage("b", guids(&["h1"]));
        store.discard_staged();
        store.commit_all().await.unwrap();

        let reloaded = GuidStore::load(&path, &feeds(&["a", "b"]));
        assert_eq!(reloaded.watermark("a"), guids(&["g1"]).as_slice());
        assert!(reloaded.watermark("b").is_empty());
    }

    #[tokio::test]
    async fn failed_write_keeps_memory_and_recovers_on_next_commit() {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join("state");
        let path = state_dir.join("guids.json");
        let mut store = GuidStore::load(&path, &feeds(&["a"]));

        store.stage("a", guids(&["g1"]));
        assert!(store.commit_all().await.is_err());
        assert_eq!(store.watermark("a"), guids(&["g1"]).as_slice());
        assert_eq!(store.staged_count(), 0);
        assert!(!path.exists());

        fs::create_dir(&state_dir).unwrap();
        store.commit_all().await.unwrap();

        let on_disk: GuidSnapshot =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["a"], guids(&["g1"]));
    }
}
