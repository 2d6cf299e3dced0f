//! Background texture decoding behind an all-or-nothing barrier.
//!
//! Requests are decoded to RGBA8 on a small worker pool fed through
//! crossbeam channels. The main thread polls a [`TextureLoadBarrier`], which
//! only hands out a [`TextureSet`] once every request has reported, success
//! or failure. Failures are kept next to the decoded images so the caller can
//! substitute placeholders and surface the degraded state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use orrery_config::TextureConfig;
use orrery_render::{RgbaPixels, TextureError, TextureManager};
use orrery_scene::texture_manifest;
use tracing::{debug, info, warn};

use crate::frame_loop::CancellationToken;

/// Edge length of the checkerboard substituted for failed textures.
pub const PLACEHOLDER_SIZE: u32 = 64;
const PLACEHOLDER_CELL: u32 = 8;

/// One named image to decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureRequest {
    pub name: String,
    pub path: PathBuf,
}

/// Requests for every texture the scene references, resolved against the
/// configured asset directory and resolution set.
pub fn texture_requests(config: &TextureConfig) -> Vec<TextureRequest> {
    texture_manifest(config.resolution)
        .into_iter()
        .map(|(key, file)| TextureRequest {
            name: key.name().to_string(),
            path: config.asset_dir.join(file),
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum TextureLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// The decode workers exited before reporting this texture.
    #[error("decode worker exited before finishing")]
    Interrupted,
}

/// Read and decode one image into RGBA8.
pub fn decode_image(path: &Path) -> Result<RgbaPixels, TextureLoadError> {
    let bytes = std::fs::read(path).map_err(|source| TextureLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|source| TextureLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = image.to_rgba8();
    Ok(RgbaPixels {
        width: rgba.width(),
        height: rgba.height(),
        data: rgba.into_raw(),
    })
}

/// Everything the barrier resolved to.
#[derive(Debug, Default)]
pub struct TextureSet {
    pub images: BTreeMap<String, RgbaPixels>,
    pub failures: Vec<(String, TextureLoadError)>,
}

impl TextureSet {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Upload every image into `textures`, substituting the placeholder for
    /// failed loads and for images the GPU rejects.
    ///
    /// Returns the number of placeholders used.
    pub fn upload_into(
        &self,
        textures: &mut TextureManager,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mipmaps: bool,
    ) -> Result<usize, TextureError> {
        let placeholder = RgbaPixels::placeholder(PLACEHOLDER_SIZE, PLACEHOLDER_CELL);
        let mut degraded = 0;

        for (name, pixels) in &self.images {
            if let Err(err) = textures.upload(device, queue, name, pixels, mipmaps) {
                warn!(texture = %name, "Upload failed ({err}), using placeholder");
                textures.upload(device, queue, name, &placeholder, false)?;
                degraded += 1;
            }
        }
        for (name, err) in &self.failures {
            warn!(texture = %name, "{err}, using placeholder");
            textures.upload(device, queue, name, &placeholder, false)?;
            degraded += 1;
        }
        Ok(degraded)
    }
}

/// Result of polling the barrier.
#[derive(Debug)]
pub enum LoadStatus {
    Pending { loaded: usize, total: usize },
    /// Returned exactly once.
    Ready(TextureSet),
    /// Already delivered, or cancelled.
    Finished,
}

type DecodeOutcome = (String, Result<RgbaPixels, TextureLoadError>);

/// Decode workers: `num_cpus - 1`, at least one, never more than requests.
pub fn worker_count(requests: usize) -> usize {
    num_cpus::get().saturating_sub(1).max(1).min(requests)
}

/// Join over a batch of texture decodes.
pub struct TextureLoadBarrier {
    results: Receiver<DecodeOutcome>,
    token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    outstanding: BTreeSet<String>,
    total: usize,
    set: TextureSet,
    finished: bool,
}

impl TextureLoadBarrier {
    /// Start decoding `requests` in the background.
    pub fn spawn(requests: Vec<TextureRequest>) -> Self {
        let outstanding: BTreeSet<String> = requests.iter().map(|r| r.name.clone()).collect();
        let total = outstanding.len();
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        for request in requests {
            // The receiver is alive in this scope, so this cannot fail.
            let _ = job_tx.send(request);
        }
        drop(job_tx);

        let token = CancellationToken::new();
        let count = worker_count(total);
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let token = token.clone();
            match std::thread::Builder::new()
                .name(format!("texture-decode-{index}"))
                .spawn(move || decode_worker(&jobs, &results, &token))
            {
                Ok(handle) => workers.push(handle),
                Err(err) => warn!("Failed to spawn texture decode worker: {err}"),
            }
        }
        if workers.is_empty() && total > 0 {
            warn!("No decode workers available, decoding {total} textures inline");
            decode_worker(&job_rx, &result_tx, &token);
        }

        info!("Loading {total} textures on {} workers", workers.len());
        Self {
            results: result_rx,
            token,
            workers,
            outstanding,
            total,
            set: TextureSet::default(),
            finished: false,
        }
    }

    /// Collect finished decodes without blocking.
    pub fn poll(&mut self) -> LoadStatus {
        if self.finished || self.token.is_cancelled() {
            return LoadStatus::Finished;
        }

        loop {
            match self.results.try_recv() {
                Ok((name, outcome)) => self.record(name, outcome),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    for name in std::mem::take(&mut self.outstanding) {
                        self.set.failures.push((name, TextureLoadError::Interrupted));
                    }
                    break;
                }
            }
        }

        if !self.outstanding.is_empty() {
            return LoadStatus::Pending {
                loaded: self.loaded(),
                total: self.total,
            };
        }

        self.finished = true;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Texture decode worker panicked");
            }
        }
        info!(
            "Textures resolved: {} decoded, {} failed",
            self.set.images.len(),
            self.set.failures.len()
        );
        LoadStatus::Ready(std::mem::take(&mut self.set))
    }

    fn record(&mut self, name: String, outcome: Result<RgbaPixels, TextureLoadError>) {
        if !self.outstanding.remove(&name) {
            return;
        }
        match outcome {
            Ok(pixels) => {
                debug!(texture = %name, "Decoded {}x{}", pixels.width, pixels.height);
                self.set.images.insert(name, pixels);
            }
            Err(err) => self.set.failures.push((name, err)),
        }
    }

    /// Textures that have reported so far.
    pub fn loaded(&self) -> usize {
        self.total - self.outstanding.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Stop starting new decodes and discard anything still in flight.
    ///
    /// Workers are detached rather than joined so a large decode cannot
    /// stall the caller.
    pub fn cancel(&mut self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.set = TextureSet::default();
        self.workers.clear();
        if !self.finished {
            debug!("Texture loading cancelled with {} outstanding", self.outstanding.len());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TextureLoadBarrier {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn decode_worker(
    jobs: &Receiver<TextureRequest>,
    results: &Sender<DecodeOutcome>,
    token: &CancellationToken,
) {
    for request in jobs.iter() {
        if token.is_cancelled() {
            break;
        }
        let outcome = decode_image(&request.path);
        if results.send((request.name, outcome)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use orrery_config::TextureResolution;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        image.save(&path).unwrap();
        path
    }

    fn wait(barrier: &mut TextureLoadBarrier) -> TextureSet {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            match barrier.poll() {
                LoadStatus::Ready(set) => return set,
                LoadStatus::Pending { loaded, total } => {
                    assert!(loaded <= total);
                    assert!(Instant::now() < deadline, "barrier never resolved");
                    std::thread::sleep(Duration::from_millis(2));
                }
                LoadStatus::Finished => panic!("barrier finished without a result"),
            }
        }
    }

    #[test]
    fn test_requests_cover_manifest() {
        let config = TextureConfig {
            asset_dir: PathBuf::from("assets"),
            resolution: TextureResolution::K2,
            ..TextureConfig::default()
        };
        let requests = texture_requests(&config);
        assert_eq!(requests.len(), texture_manifest(TextureResolution::K2).len());
        assert!(requests.iter().all(|r| r.path.starts_with("assets")));
        assert!(requests.iter().any(|r| r.name == "stars"));
    }

    #[test]
    fn test_worker_count_bounds() {
        assert_eq!(worker_count(0), 0);
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(64) >= 1);
    }

    #[test]
    fn test_decodes_png() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_png(tmp.path(), "a.png", 4, 2);
        let pixels = decode_image(&path).unwrap();
        assert_eq!((pixels.width, pixels.height), (4, 2));
        assert_eq!(pixels.data.len(), 4 * 2 * 4);
        assert_eq!(&pixels.data[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_errors_are_distinguished() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = decode_image(&tmp.path().join("missing.png"));
        assert!(matches!(missing, Err(TextureLoadError::Io { .. })));

        let garbage = tmp.path().join("garbage.png");
        std::fs::write(&garbage, b"definitely not an image").unwrap();
        assert!(matches!(
            decode_image(&garbage),
            Err(TextureLoadError::Decode { .. })
        ));
    }

    #[test]
    fn test_barrier_joins_successes_and_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let mut requests: Vec<TextureRequest> = (0..5)
            .map(|i| TextureRequest {
                name: format!("ok{i}"),
                path: write_png(tmp.path(), &format!("ok{i}.png"), 8, 8),
            })
            .collect();
        requests.push(TextureRequest {
            name: "broken".into(),
            path: tmp.path().join("nope.jpg"),
        });

        let mut barrier = TextureLoadBarrier::spawn(requests);
        assert_eq!(barrier.total(), 6);
        let set = wait(&mut barrier);

        assert_eq!(set.images.len(), 5);
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].0, "broken");
        assert!(!set.is_complete());
        assert!(matches!(barrier.poll(), LoadStatus::Finished));
    }

    #[test]
    fn test_empty_request_list_is_ready() {
        let mut barrier = TextureLoadBarrier::spawn(Vec::new());
        let set = wait(&mut barrier);
        assert!(set.images.is_empty());
        assert!(set.is_complete());
    }

    #[test]
    fn test_cancel_discards_results() {
        let tmp = tempfile::tempdir().unwrap();
        let requests = vec![TextureRequest {
            name: "a".into(),
            path: write_png(tmp.path(), "a.png", 2, 2),
        }];
        let mut barrier = TextureLoadBarrier::spawn(requests);
        barrier.cancel();
        assert!(barrier.is_cancelled());
        std::thread::sleep(Duration::from_millis(20));
        assert!(matches!(barrier.poll(), LoadStatus::Finished));
        // Second cancel is a no-op.
        barrier.cancel();
    }

    #[test]
    fn test_upload_substitutes_placeholders() {
        let Some((device, queue)) = orrery_render::request_headless_device() else {
            return;
        };
        let mut set = TextureSet::default();
        set.images.insert("good".into(), RgbaPixels::solid([1, 2, 3, 255]));
        set.failures.push(("bad".into(), TextureLoadError::Interrupted));

        let mut textures = TextureManager::new(&device);
        let degraded = set.upload_into(&mut textures, &device, &queue, false).unwrap();
        assert_eq!(degraded, 1);
        assert_eq!(textures.len(), 2);
        let bad = textures.get("bad").unwrap();
        assert_eq!(bad.dimensions, (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE));
    }
}
