//! Durable run store backed by JSON documents on the local filesystem.
//!
//! Layout under the tracking root:
//!
//! ```text
//! <root>/experiments.json            [ExperimentRecord, ...]
//! <root>/runs/<run_id>.json          RunRecord (tags, metrics, artifact ref)
//! <root>/artifacts/<run_id>/<key>    artifact bytes
//! ```
//!
//! Every mutation writes a temporary file, syncs it and renames it over the
//! target before returning, so readers in other processes never observe a
//! half-written document. A cancelled write removes its temporary file;
//! leftovers of crashed processes are swept on open once they are an hour old.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::artifact_missing;
use super::{
    ArtifactRecord, ExperimentRecord, RunOrder, RunQuery, RunRecord, RunStatus, RunStore,
    TagPredicate,
};
use crate::{Error, Result};

const EXPERIMENTS_FILE: &str = "experiments.json";
const RUNS_DIR: &str = "runs";
const ARTIFACTS_DIR: &str = "artifacts";
const TEMP_MARKER: &str = ".tmp-";
const STALE_TEMP_AGE: Duration = Duration::from_secs(3600);

/// Filesystem-backed run store.
///
/// Read-modify-write cycles are serialized within the process by a single
/// async mutex. Separate processes sharing a root are expected to write
/// disjoint runs (producers) or to follow the single-promoter rule.
#[derive(Debug)]
pub struct FileRunStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRunStore {
    /// Open (creating if needed) a tracking root.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory layout cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(RUNS_DIR)).await?;
        tokio::fs::create_dir_all(root.join(ARTIFACTS_DIR)).await?;
        let swept = sweep_stale_temp_files(&root, STALE_TEMP_AGE).await?;
        debug!(root = %root.display(), swept, "opened file run store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Tracking root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_path(&self, run_id: &str) -> Result<PathBuf> {
        validate_segment(run_id)?;
        Ok(self.root.join(RUNS_DIR).join(format!("{run_id}.json")))
    }

    fn artifact_path(&self, run_id: &str, key: &str) -> Result<PathBuf> {
        validate_segment(run_id)?;
        validate_segment(key)?;
        Ok(self.root.join(ARTIFACTS_DIR).join(run_id).join(key))
    }

    async fn load_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        match tokio::fs::read(self.root.join(EXPERIMENTS_FILE)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_run(&self, run_id: &str) -> Result<RunRecord> {
        match tokio::fs::read(self.run_path(run_id)?).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::RunNotFound(run_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_run(&self, run: &RunRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(run)?;
        write_durably(&self.run_path(run.run_id())?, &bytes).await
    }

    async fn update_run<T>(
        &self,
        run_id: &str,
        f: impl FnOnce(&mut RunRecord) -> Result<T> + Send,
    ) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut run = self.load_run(run_id).await?;
        let out = f(&mut run)?;
        self.save_run(&run).await?;
        Ok(out)
    }
}

/// Ids and keys become path segments; reject anything that could escape the root.
fn validate_segment(segment: &str) -> Result<()> {
    let ok = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0']);
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid path segment '{segment}'")))
    }
}

/// Temporary file removed on drop unless it was renamed into place.
struct TempFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "could not remove temporary file");
                }
            }
        }
    }
}

async fn write_durably(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = TempFile {
        path: path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple())),
        committed: false,
    };
    let mut file = tokio::fs::File::create(&tmp.path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp.path, path).await?;
    tmp.committed = true;
    Ok(())
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains(TEMP_MARKER))
}

/// Remove temporary files older than `min_age` from every directory the
/// store writes into. Returns the number removed.
async fn sweep_stale_temp_files(root: &Path, min_age: Duration) -> Result<usize> {
    let mut dirs = vec![root.to_path_buf(), root.join(RUNS_DIR)];
    let mut artifact_dirs = tokio::fs::read_dir(root.join(ARTIFACTS_DIR)).await?;
    while let Some(entry) = artifact_dirs.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }

    let now = SystemTime::now();
    let mut removed = 0;
    for dir in dirs {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_temp_file(&path) {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if now.duration_since(modified).unwrap_or_default() < min_age {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(removed)
}

impl RunStore for FileRunStore {
    async fn find_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        self.load_experiments()
            .await?
            .into_iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| Error::NotFound(format!("experiment '{name}'")))
    }

    async fn get_or_create_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        let _guard = self.write_lock.lock().await;
        let mut experiments = self.load_experiments().await?;
        if let Some(existing) = experiments.iter().find(|e| e.name() == name) {
            return Ok(existing.clone());
        }
        let created = ExperimentRecord::with_generated_id(name);
        experiments.push(created.clone());
        let bytes = serde_json::to_vec_pretty(&experiments)?;
        write_durably(&self.root.join(EXPERIMENTS_FILE), &bytes).await?;
        debug!(experiment = name, id = created.experiment_id(), "creating experiment");
        Ok(created)
    }

    async fn create_run(&self, experiment_id: &str, run_name: Option<&str>) -> Result<RunRecord> {
        let known = self
            .load_experiments()
            .await?
            .iter()
            .any(|e| e.experiment_id() == experiment_id);
        if !known {
            return Err(Error::NotFound(format!("experiment id {experiment_id}")));
        }
        let mut builder =
            RunRecord::builder(uuid::Uuid::new_v4().simple().to_string(), experiment_id);
        if let Some(name) = run_name {
            builder = builder.run_name(name);
        }
        let run = builder.build();
        self.save_run(&run).await?;
        Ok(run)
    }

    async fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.load_run(run_id).await
    }

    async fn query_runs(
        &self,
        experiment_id: &str,
        predicate: &TagPredicate,
        order: &RunOrder,
    ) -> Result<RunQuery> {
        let mut entries = tokio::fs::read_dir(self.root.join(RUNS_DIR)).await?;
        let mut matching = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let run: RunRecord = serde_json::from_slice(&bytes).map_err(|e| {
                Error::StorageError(format!("corrupt run document {}: {e}", path.display()))
            })?;
            if run.experiment_id() == experiment_id && predicate.matches(&run) {
                matching.push(run);
            }
        }
        Ok(RunQuery::sorted(matching, order))
    }

    async fn set_tag(&self, run_id: &str, name: &str, value: &str) -> Result<()> {
        self.update_run(run_id, |run| {
            run.set_tag(name, value);
            Ok(())
        })
        .await
    }

    async fn log_param(&self, run_id: &str, name: &str, value: &str) -> Result<()> {
        self.update_run(run_id, |run| run.log_param(name, value)).await
    }

    async fn log_metric(&self, run_id: &str, name: &str, value: f64) -> Result<()> {
        self.update_run(run_id, |run| run.log_metric(name, value)).await
    }

    async fn put_artifact(&self, run_id: &str, key: &str, bytes: Vec<u8>) -> Result<ArtifactRecord> {
        let path = self.artifact_path(run_id, key)?;
        // The run must exist before bytes are written next to it.
        self.load_run(run_id).await?;
        write_durably(&path, &bytes).await?;
        let artifact = ArtifactRecord::for_bytes(run_id, key, &bytes);
        let attached = artifact.clone();
        self.update_run(run_id, move |run| {
            run.attach_artifact(attached);
            Ok(())
        })
        .await?;
        Ok(artifact)
    }

    async fn read_artifact(&self, artifact: &ArtifactRecord) -> Result<Vec<u8>> {
        let path = self.artifact_path(artifact.run_id(), artifact.key())?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| artifact_missing(artifact, e))?;
        if artifact.verify(&bytes) {
            Ok(bytes)
        } else {
            Err(artifact_missing(artifact, "content hash mismatch"))
        }
    }

    async fn close_run(&self, run_id: &str, status: RunStatus) -> Result<RunRecord> {
        self.update_run(run_id, |run| {
            run.close(status);
            Ok(run.clone())
        })
        .await
    }
}
