//! BundleWatcher: filesystem monitor that triggers a catalog rescan when a
//! bundle directory appears, its manifest changes, or it disappears.
//!
//! Does not parse LV2 metadata itself — only detects change, per the
//! "the watcher does not itself parse LV2 metadata" boundary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

pub struct BundleWatcher {
    paths: Vec<PathBuf>,
    interval: Duration,
    stop: Arc<AtomicBool>,
}

impl BundleWatcher {
    pub fn new(paths: Vec<PathBuf>, interval: Duration, stop: Arc<AtomicBool>) -> Self {
        Self { paths, interval, stop }
    }

    /// Blocking poll loop. Calls `on_change` whenever this pass's bundle set
    /// differs from the last — new path, changed manifest mtime, or a path
    /// that vanished. Exits when the stop flag is set.
    pub fn run(&self, mut on_change: impl FnMut()) {
        let mut state: HashMap<PathBuf, SystemTime> = HashMap::new();

        while !self.stop.load(Ordering::Relaxed) {
            let current = self.scan_bundles();
            if bundles_changed(&state, &current) {
                on_change();
            }
            state = current;
            self.sleep_with_stop_check(self.interval);
        }
    }

    fn scan_bundles(&self) -> HashMap<PathBuf, SystemTime> {
        let mut out = HashMap::new();
        for root in &self.paths {
            if !root.exists() {
                continue;
            }
            for entry in WalkDir::new(root).min_depth(1).max_depth(3).into_iter().flatten() {
                if !entry.file_type().is_dir() {
                    continue;
                }
                let manifest = entry.path().join("manifest.ttl");
                if let Ok(metadata) = manifest.metadata() {
                    if let Ok(mtime) = metadata.modified() {
                        out.insert(entry.path().to_path_buf(), mtime);
                    }
                }
            }
        }
        out
    }

    fn sleep_with_stop_check(&self, duration: Duration) {
        let step = Duration::from_millis(50).min(duration);
        let mut slept = Duration::ZERO;
        while slept < duration && !self.stop.load(Ordering::Relaxed) {
            std::thread::sleep(step);
            slept += step;
        }
    }
}

fn bundles_changed(prev: &HashMap<PathBuf, SystemTime>, current: &HashMap<PathBuf, SystemTime>) -> bool {
    for (path, mtime) in current {
        match prev.get(path) {
            None => return true,
            Some(prev_mtime) if prev_mtime != mtime => return true,
            _ => {}
        }
    }
    prev.keys().any(|path| !current.contains_key(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use std::thread;

    #[test]
    fn detects_new_bundle_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let watcher = BundleWatcher::new(vec![tmp.path().to_path_buf()], Duration::from_millis(20), stop.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let stop_clone = stop.clone();
        let tmp_path = tmp.path().to_path_buf();
        let handle = thread::spawn(move || {
            watcher.run(move || {
                calls_clone.fetch_add(1, Ordering::Relaxed);
            });
            let _ = stop_clone;
        });

        thread::sleep(Duration::from_millis(60));
        let bundle = tmp_path.join("synth.lv2");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("manifest.ttl"), "# stub").unwrap();

        thread::sleep(Duration::from_millis(120));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(calls.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn no_change_means_no_callback_after_first_pass() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = tmp.path().join("synth.lv2");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("manifest.ttl"), "# stub").unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let watcher = BundleWatcher::new(vec![tmp.path().to_path_buf()], Duration::from_millis(20), stop.clone());

        let calls = Arc::new(StdMutex::new(0usize));
        let calls_clone = calls.clone();
        let handle = thread::spawn(move || {
            watcher.run(move || {
                *calls_clone.lock().unwrap() += 1;
            });
        });

        thread::sleep(Duration::from_millis(150));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        // First pass discovers the bundle (one change); subsequent passes
        // with no mutation must not call back again.
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
