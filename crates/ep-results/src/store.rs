//! Checkpoint storage: whole-model snapshots keyed by scenario and tag.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::hash::content_digest;
use crate::types::{CheckpointManifest, CheckpointTag};
use crate::{ResultsError, ResultsResult};

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root_dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn for_working_dir(working_dir: &Path) -> ResultsResult<Self> {
        Self::new(working_dir.join("checkpoints"))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn stem(&self, scenario_id: &str, tag: CheckpointTag) -> ResultsResult<String> {
        let bad = scenario_id.is_empty()
            || scenario_id.contains(['/', '\\'])
            || scenario_id == "."
            || scenario_id == "..";
        if bad {
            return Err(ResultsError::InvalidName {
                name: scenario_id.to_string(),
            });
        }
        Ok(format!("{scenario_id}_{tag}"))
    }

    pub fn payload_path(&self, scenario_id: &str, tag: CheckpointTag) -> ResultsResult<PathBuf> {
        Ok(self
            .root_dir
            .join(format!("{}.json", self.stem(scenario_id, tag)?)))
    }

    fn manifest_path(&self, scenario_id: &str, tag: CheckpointTag) -> ResultsResult<PathBuf> {
        Ok(self
            .root_dir
            .join(format!("{}.manifest.json", self.stem(scenario_id, tag)?)))
    }

    pub fn exists(&self, scenario_id: &str, tag: CheckpointTag) -> bool {
        match (
            self.payload_path(scenario_id, tag),
            self.manifest_path(scenario_id, tag),
        ) {
            (Ok(payload), Ok(manifest)) => payload.exists() && manifest.exists(),
            _ => false,
        }
    }

    /// Serialize `payload` and its manifest. Each file is written beside its
    /// destination and renamed into place, so readers never see a partial file.
    pub fn save<T: Serialize>(
        &self,
        scenario_id: &str,
        tag: CheckpointTag,
        phase: &str,
        payload: &T,
    ) -> ResultsResult<CheckpointManifest> {
        let bytes = serde_json::to_vec(payload)?;
        let manifest = CheckpointManifest {
            scenario_id: scenario_id.to_string(),
            tag,
            phase: phase.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            digest: content_digest(&bytes),
            size_bytes: bytes.len() as u64,
        };

        fs::create_dir_all(&self.root_dir)?;
        write_atomic(&self.payload_path(scenario_id, tag)?, &bytes)?;
        write_atomic(
            &self.manifest_path(scenario_id, tag)?,
            serde_json::to_string_pretty(&manifest)?.as_bytes(),
        )?;

        debug!(scenario = scenario_id, %tag, phase, bytes = bytes.len(), "saved checkpoint");
        Ok(manifest)
    }

    pub fn load_manifest(
        &self,
        scenario_id: &str,
        tag: CheckpointTag,
    ) -> ResultsResult<CheckpointManifest> {
        let path = self.manifest_path(scenario_id, tag)?;
        if !path.exists() {
            return Err(ResultsError::CheckpointNotFound {
                scenario_id: scenario_id.to_string(),
                tag,
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load a payload after checking it against its manifest digest.
    pub fn load<T: DeserializeOwned>(
        &self,
        scenario_id: &str,
        tag: CheckpointTag,
    ) -> ResultsResult<(CheckpointManifest, T)> {
        let manifest = self.load_manifest(scenario_id, tag)?;
        let path = self.payload_path(scenario_id, tag)?;
        if !path.exists() {
            return Err(ResultsError::CheckpointNotFound {
                scenario_id: scenario_id.to_string(),
                tag,
            });
        }
        let bytes = fs::read(path)?;
        let actual = content_digest(&bytes);
        if actual != manifest.digest {
            return Err(ResultsError::DigestMismatch {
                expected: manifest.digest,
                actual,
            });
        }
        let payload = serde_json::from_slice(&bytes)?;
        Ok((manifest, payload))
    }

    pub fn remove(&self, scenario_id: &str, tag: CheckpointTag) -> ResultsResult<()> {
        for path in [
            self.payload_path(scenario_id, tag)?,
            self.manifest_path(scenario_id, tag)?,
        ] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Every readable manifest, ordered by scenario then tag.
    pub fn list(&self) -> ResultsResult<Vec<CheckpointManifest>> {
        let mut out = Vec::new();
        if !self.root_dir.exists() {
            return Ok(out);
        }
        for entry in fs::read_dir(&self.root_dir)? {
            let path = entry?.path();
            let is_manifest = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".manifest.json"));
            if !is_manifest {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&path)
                && let Ok(manifest) = serde_json::from_str::<CheckpointManifest>(&content)
            {
                out.push(manifest);
            }
        }
        out.sort_by(|a, b| (&a.scenario_id, a.tag).cmp(&(&b.scenario_id, b.tag)));
        Ok(out)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> ResultsResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
