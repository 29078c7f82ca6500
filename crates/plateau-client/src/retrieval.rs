//! Archive download and CityGML extraction.
//!
//! A download is streamed into a uniquely named `<name>.<pid>-<seq>.part` next
//! to its final location and renamed into place only once every byte has
//! arrived. The `.part` file is owned by a guard that deletes it on any early
//! return, so a failed transfer leaves nothing behind in the target directory.
//!
//! Transfers have no total deadline. Waiting for the response head and for
//! each body chunk is bounded by the idle timeout instead, so a slow but live
//! transfer completes and a stalled one fails.
//!
//! Zip archives (detected by their `PK\x03\x04` magic, not by extension) can be
//! expanded on the blocking pool: every `*.gml` member is written flat into a
//! single extraction directory, colliding names getting `_1`, `_2`, ...
//! suffixes.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use plateau_core::{FeatureType, MeshCode};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

use crate::error::PlateauApiError;
use crate::gateway::HttpGateway;

/// File name used when the URL yields no usable one.
pub const FALLBACK_FILE_NAME: &str = "plateau_data.zip";

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

static PART_SEQ: AtomicU64 = AtomicU64::new(0);

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievedArchive {
    pub path: PathBuf,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh_code: Option<MeshCode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feature_types: Vec<FeatureType>,
    /// Directory the archive was expanded into, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_dir: Option<PathBuf>,
    /// Extracted CityGML files, in archive order.
    pub extracted: Vec<PathBuf>,
}

/// Downloads archives into a caller-chosen directory.
#[derive(Debug, Clone)]
pub struct RetrievalPipeline {
    gateway: HttpGateway,
    http: reqwest::Client,
    idle_timeout: Duration,
}

impl RetrievalPipeline {
    /// `http` must not carry a total request timeout; `idle_timeout` bounds
    /// each wait for the response head or the next chunk.
    pub(crate) fn new(gateway: HttpGateway, http: reqwest::Client, idle_timeout: Duration) -> Self {
        Self {
            gateway,
            http,
            idle_timeout,
        }
    }

    /// Download `url` into `target_dir`, optionally expanding it.
    ///
    /// `mesh_code` and `feature_types` only label the result and name the
    /// extraction directory (`extract_<mesh>_<types>`).
    pub async fn download(
        &self,
        url: &str,
        target_dir: &Path,
        mesh_code: Option<&MeshCode>,
        feature_types: &[FeatureType],
        auto_extract: bool,
    ) -> Result<RetrievedArchive, PlateauApiError> {
        let transfer_err = |reason: String| PlateauApiError::Transfer {
            url: url.to_string(),
            reason,
        };

        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|e| transfer_err(format!("creating {}: {e}", target_dir.display())))?;

        let parsed = Url::parse(url).map_err(|e| transfer_err(format!("invalid URL: {e}")))?;
        let file_name = file_name_from_url(url);
        let final_path = target_dir.join(&file_name);
        let part_path = target_dir.join(part_file_name(&file_name));

        tracing::info!(%url, path = %final_path.display(), "downloading archive");
        let request = self
            .gateway
            .authorize(self.http.get(parsed.clone()), &parsed);
        let mut resp = tokio::time::timeout(self.idle_timeout, request.send())
            .await
            .map_err(|_| transfer_err(format!("no response within {:?}", self.idle_timeout)))?
            .map_err(|e| transfer_err(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(transfer_err(format!("HTTP {}", resp.status().as_u16())));
        }
        let expected = resp.content_length();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut guard = PartialFile::new(part_path.clone());
        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|e| transfer_err(format!("creating {}: {e}", part_path.display())))?;

        let mut bytes: u64 = 0;
        loop {
            let next = tokio::time::timeout(self.idle_timeout, resp.chunk())
                .await
                .map_err(|_| {
                    transfer_err(format!(
                        "stalled after {bytes} bytes: nothing received for {:?}",
                        self.idle_timeout
                    ))
                })?
                .map_err(|e| transfer_err(format!("after {bytes} bytes: {e}")))?;
            let Some(chunk) = next else {
                break;
            };
            file.write_all(&chunk)
                .await
                .map_err(|e| transfer_err(format!("writing {}: {e}", part_path.display())))?;
            bytes += chunk.len() as u64;
        }
        if let Some(expected) = expected {
            if bytes != expected {
                return Err(transfer_err(format!(
                    "truncated: received {bytes} of {expected} bytes"
                )));
            }
        }
        file.sync_all()
            .await
            .map_err(|e| transfer_err(format!("syncing {}: {e}", part_path.display())))?;
        drop(file);

        tokio::fs::rename(&part_path, &final_path)
            .await
            .map_err(|e| transfer_err(format!("renaming into {}: {e}", final_path.display())))?;
        guard.commit();
        tracing::info!(path = %final_path.display(), bytes, "download complete");

        let mut archive = RetrievedArchive {
            path: final_path,
            bytes,
            content_type,
            mesh_code: mesh_code.cloned(),
            feature_types: feature_types.to_vec(),
            extract_dir: None,
            extracted: Vec::new(),
        };

        if auto_extract && is_zip(&archive.path).await {
            let dir = target_dir.join(extract_dir_name(mesh_code, feature_types, &file_name));
            archive.extracted = extract_citygml(archive.path.clone(), dir.clone()).await?;
            archive.extract_dir = Some(dir);
        }
        Ok(archive)
    }
}

/// `<file_name>.<pid>-<seq>.part`, distinct for every download in flight.
fn part_file_name(file_name: &str) -> String {
    let seq = PART_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{file_name}.{}-{seq}.part", std::process::id())
}

/// Removes the wrapped path on drop unless committed.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), "failed to remove partial download: {e}");
            }
        }
    }
}

/// Reduce a name to `[A-Za-z0-9._-]` with no leading dots.
///
/// Other characters become `_`. Returns `None` when nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|c| matches!(c, '_' | '.')) {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Local file name for a download URL: its sanitized last path segment.
pub fn file_name_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|segment| sanitize_filename(&segment))
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

fn extract_dir_name(
    mesh_code: Option<&MeshCode>,
    feature_types: &[FeatureType],
    file_name: &str,
) -> String {
    let label = FeatureType::join_label(feature_types);
    match mesh_code {
        Some(mesh) if !label.is_empty() => format!("extract_{mesh}_{label}"),
        Some(mesh) => format!("extract_{mesh}"),
        None => {
            let stem = Path::new(file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("archive");
            format!("extract_{stem}")
        }
    }
}

async fn is_zip(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    match tokio::fs::File::open(path).await {
        Ok(mut f) => f.read_exact(&mut magic).await.is_ok() && magic == ZIP_MAGIC,
        Err(_) => false,
    }
}

async fn extract_citygml(archive: PathBuf, dir: PathBuf) -> Result<Vec<PathBuf>, PlateauApiError> {
    let path = archive.clone();
    let result = tokio::task::spawn_blocking(move || {
        let extracted = extract_gml_flat(&archive, &dir);
        if extracted.is_err() {
            let _ = fs::remove_dir_all(&dir);
        }
        extracted
    })
    .await
    .map_err(|e| PlateauApiError::Extraction {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let extracted = result.map_err(|reason| PlateauApiError::Extraction {
        path: path.clone(),
        reason,
    })?;
    tracing::info!(archive = %path.display(), files = extracted.len(), "extracted CityGML");
    Ok(extracted)
}

fn extract_gml_flat(archive: &Path, dir: &Path) -> Result<Vec<PathBuf>, String> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| format!("clearing {}: {e}", dir.display()))?;
    }
    fs::create_dir_all(dir).map_err(|e| format!("creating {}: {e}", dir.display()))?;

    let file = fs::File::open(archive).map_err(|e| e.to_string())?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;

    let mut taken = HashSet::new();
    let mut extracted = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| e.to_string())?;
        if entry.is_dir() {
            continue;
        }
        let Some(base) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .and_then(|n| sanitize_filename(&n))
        else {
            continue;
        };
        let is_gml = Path::new(&base)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gml"));
        if !is_gml {
            continue;
        }

        let name = unique_name(&base, &mut taken);
        let out_path = dir.join(&name);
        let mut out =
            fs::File::create(&out_path).map_err(|e| format!("creating {}: {e}", out_path.display()))?;
        io::copy(&mut entry, &mut out).map_err(|e| format!("writing {name}: {e}"))?;
        extracted.push(out_path);
    }
    Ok(extracted)
}

/// `base` if unused, otherwise `stem_1.ext`, `stem_2.ext`, ...
fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }
    let path = Path::new(base);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(base);
    let ext = path.extension().and_then(|s| s.to_str());
    let mut n = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("a b/c.zip").as_deref(), Some("a_b_c.zip"));
        assert_eq!(sanitize_filename("..secret").as_deref(), Some("secret"));
        assert_eq!(sanitize_filename("データ.zip").as_deref(), Some("___.zip"));
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("/"), None);
    }

    #[test]
    fn file_name_comes_from_last_segment() {
        assert_eq!(
            file_name_from_url("https://api.example.com/citygml/pack/abc-123.zip"),
            "abc-123.zip"
        );
        assert_eq!(
            file_name_from_url("https://api.example.com/a/b.zip?token=x"),
            "b.zip"
        );
    }

    #[test]
    fn file_name_falls_back_when_unusable() {
        assert_eq!(file_name_from_url("https://api.example.com/"), FALLBACK_FILE_NAME);
        assert_eq!(file_name_from_url("https://api.example.com/dir/.."), FALLBACK_FILE_NAME);
        assert_eq!(file_name_from_url("not a url"), FALLBACK_FILE_NAME);
    }

    #[test]
    fn extract_dir_names() {
        let mesh = MeshCode::parse("53394611").unwrap();
        assert_eq!(
            extract_dir_name(Some(&mesh), &[FeatureType::Tran, FeatureType::Bldg], "x.zip"),
            "extract_53394611_bldg-tran"
        );
        assert_eq!(extract_dir_name(Some(&mesh), &[], "x.zip"), "extract_53394611");
        assert_eq!(extract_dir_name(None, &[FeatureType::Bldg], "job.zip"), "extract_job");
    }

    #[test]
    fn part_names_differ_per_download() {
        let a = part_file_name("job.zip");
        let b = part_file_name("job.zip");
        assert_ne!(a, b);
        assert!(a.starts_with("job.zip.") && a.ends_with(".part"));
    }

    #[test]
    fn unique_names_get_numeric_suffixes() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("a.gml", &mut taken), "a.gml");
        assert_eq!(unique_name("a.gml", &mut taken), "a_1.gml");
        assert_eq!(unique_name("a.gml", &mut taken), "a_2.gml");
        assert_eq!(unique_name("b", &mut taken), "b");
        assert_eq!(unique_name("b", &mut taken), "b_1");
    }

    #[test]
    fn partial_file_is_removed_unless_committed() {
        let dir = tempfile::tempdir().unwrap();
        let dropped = dir.path().join("x.part");
        fs::write(&dropped, b"partial").unwrap();
        drop(PartialFile::new(dropped.clone()));
        assert!(!dropped.exists());

        let kept = dir.path().join("y.part");
        fs::write(&kept, b"done").unwrap();
        let mut guard = PartialFile::new(kept.clone());
        guard.commit();
        drop(guard);
        assert!(kept.exists());
    }
}
