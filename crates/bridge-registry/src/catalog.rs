//! PluginCatalog: the validating wrapper around the (out of scope) LV2
//! discovery library.
//!
//! `DiscoveryProvider` is the trait boundary the real discovery library
//! would implement. `FsDiscoveryProvider` is a conservative, self-contained
//! stand-in: it treats any directory containing `manifest.ttl` as a bundle
//! and reads plugin metadata from an optional `bridge.json` sidecar, since a
//! full Turtle/RDF parser is out of scope per the specification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use bridge_proto::{PluginInfo, PluginPreset};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("unknown plugin uri: {0}")]
    UnknownUri(String),

    #[error("bundle not found: {0}")]
    BundleNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// GUI asset bundle returned by `gui`/`gui_mini`/`essentials`. The real
/// discovery library returns richer records (icon paths, screenshots,
/// control widget layouts); this is the subset the bridge forwards as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuiAssets {
    pub resources_dir: String,
    pub files: Vec<String>,
}

/// The interface PluginCatalog consumes. Implement this against whatever
/// concrete LV2 discovery library is wired in; `FsDiscoveryProvider` is the
/// default, self-contained implementation.
pub trait DiscoveryProvider: Send + Sync {
    fn scan(&self) -> HashMap<String, PluginInfo>;
    fn detail(&self, uri: &str) -> Option<PluginInfo>;
    fn gui(&self, uri: &str) -> Option<GuiAssets>;
    fn gui_mini(&self, uri: &str) -> Option<GuiAssets>;
    fn essentials(&self, uri: &str) -> Option<GuiAssets>;
    fn presets(&self, uri: &str) -> Vec<PluginPreset>;
    fn validate_preset(&self, uri: &str, preset_uri: &str) -> bool;
    fn rescan_presets(&self, uri: &str) -> Vec<PluginPreset>;
    fn bundle_loaded(&self, path: &str) -> bool;
    fn add_bundle(&self, path: &str) -> Result<Vec<String>, CatalogError>;
    fn remove_bundle(&self, path: &str, resource_path: &str) -> Result<Vec<String>, CatalogError>;
    fn list_plugins_in_bundle(&self, path: &str) -> Vec<String>;
}

/// Sidecar describing the plugin(s) a bundle directory provides, since this
/// stand-in provider does not parse Turtle.
#[derive(Debug, Clone, Deserialize)]
struct BundleSidecar {
    plugins: Vec<PluginInfo>,
}

pub struct FsDiscoveryProvider {
    scan_paths: Vec<PathBuf>,
    loaded_bundles: parking_lot::Mutex<HashMap<String, Vec<String>>>,
}

impl FsDiscoveryProvider {
    pub fn new(scan_paths: Vec<PathBuf>) -> Self {
        Self { scan_paths, loaded_bundles: parking_lot::Mutex::new(HashMap::new()) }
    }

    fn bundle_dirs(&self) -> Vec<PathBuf> {
        let mut bundles = Vec::new();
        for root in &self.scan_paths {
            if !root.exists() {
                continue;
            }
            for entry in WalkDir::new(root).min_depth(1).max_depth(3).into_iter().flatten() {
                if entry.file_type().is_dir() && entry.path().join("manifest.ttl").is_file() {
                    bundles.push(entry.path().to_path_buf());
                }
            }
        }
        bundles
    }

    fn read_sidecar(bundle_dir: &Path) -> Vec<PluginInfo> {
        let sidecar_path = bundle_dir.join("bridge.json");
        let Ok(contents) = std::fs::read_to_string(&sidecar_path) else {
            return Vec::new();
        };
        match serde_json::from_str::<BundleSidecar>(&contents) {
            Ok(sidecar) => sidecar.plugins,
            Err(e) => {
                log::warn!("catalog: malformed sidecar {}: {e}", sidecar_path.display());
                Vec::new()
            }
        }
    }
}

impl DiscoveryProvider for FsDiscoveryProvider {
    fn scan(&self) -> HashMap<String, PluginInfo> {
        let mut out = HashMap::new();
        let mut loaded = self.loaded_bundles.lock();
        loaded.clear();
        for bundle_dir in self.bundle_dirs() {
            let plugins = Self::read_sidecar(&bundle_dir);
            let uris: Vec<String> = plugins.iter().map(|p| p.uri.clone()).collect();
            loaded.insert(bundle_dir.display().to_string(), uris);
            for plugin in plugins {
                out.insert(plugin.uri.clone(), plugin);
            }
        }
        out
    }

    fn detail(&self, uri: &str) -> Option<PluginInfo> {
        self.scan().remove(uri)
    }

    fn gui(&self, _uri: &str) -> Option<GuiAssets> {
        None
    }

    fn gui_mini(&self, _uri: &str) -> Option<GuiAssets> {
        None
    }

    fn essentials(&self, _uri: &str) -> Option<GuiAssets> {
        None
    }

    fn presets(&self, _uri: &str) -> Vec<PluginPreset> {
        Vec::new()
    }

    fn validate_preset(&self, _uri: &str, _preset_uri: &str) -> bool {
        false
    }

    fn rescan_presets(&self, _uri: &str) -> Vec<PluginPreset> {
        Vec::new()
    }

    fn bundle_loaded(&self, path: &str) -> bool {
        self.loaded_bundles.lock().contains_key(path)
    }

    fn add_bundle(&self, path: &str) -> Result<Vec<String>, CatalogError> {
        let dir = PathBuf::from(path);
        if !dir.join("manifest.ttl").is_file() {
            return Err(CatalogError::BundleNotFound(path.to_string()));
        }
        let plugins = Self::read_sidecar(&dir);
        let uris: Vec<String> = plugins.iter().map(|p| p.uri.clone()).collect();
        self.loaded_bundles.lock().insert(path.to_string(), uris.clone());
        Ok(uris)
    }

    fn remove_bundle(&self, path: &str, _resource_path: &str) -> Result<Vec<String>, CatalogError> {
        self.loaded_bundles
            .lock()
            .remove(path)
            .ok_or_else(|| CatalogError::BundleNotFound(path.to_string()))
    }

    fn list_plugins_in_bundle(&self, path: &str) -> Vec<String> {
        self.loaded_bundles.lock().get(path).cloned().unwrap_or_default()
    }
}

/// Plugin URIs known not to work with this bridge. A real deployment would
/// grow this from field reports; it starts empty.
const KNOWN_INCOMPATIBLE: &[&str] = &[];

/// Validates a scan result before it is admitted to the catalog:
/// - `uri`/`name` non-empty
/// - at most 8 audio inputs and 8 audio outputs
/// - at least one audio port (input or output)
/// - every control port has `min <= max`
/// - uri not in the known-incompatible list
///
/// Extreme control ranges (`|min|, |max| > 1e6`) are warning-only.
pub fn validate_plugin(info: &PluginInfo) -> Result<(), String> {
    if info.uri.is_empty() {
        return Err("empty uri".into());
    }
    if info.name.is_empty() {
        return Err("empty name".into());
    }
    if info.ports.audio_in.len() > 8 {
        return Err(format!("too many audio inputs: {}", info.ports.audio_in.len()));
    }
    if info.ports.audio_out.len() > 8 {
        return Err(format!("too many audio outputs: {}", info.ports.audio_out.len()));
    }
    if info.ports.audio_in.is_empty() && info.ports.audio_out.is_empty() {
        return Err("no audio ports".into());
    }
    for port in info.ports.control_in.iter().chain(info.ports.control_out.iter()) {
        if port.min > port.max {
            return Err(format!("control port {} has min > max", port.symbol));
        }
        if port.has_extreme_range() {
            log::warn!(
                "catalog: {} port {} has an extreme range [{}, {}]",
                info.uri,
                port.symbol,
                port.min,
                port.max
            );
        }
    }
    if KNOWN_INCOMPATIBLE.contains(&info.uri.as_str()) {
        return Err("known-incompatible plugin".into());
    }
    Ok(())
}

pub struct PluginCatalog {
    provider: Box<dyn DiscoveryProvider>,
}

impl PluginCatalog {
    pub fn new(provider: Box<dyn DiscoveryProvider>) -> Self {
        Self { provider }
    }

    /// Full rescan, filtering out anything that fails `validate_plugin`.
    pub fn scan(&self) -> HashMap<String, PluginInfo> {
        let mut out = HashMap::new();
        for (uri, info) in self.provider.scan() {
            match validate_plugin(&info) {
                Ok(()) => {
                    out.insert(uri, info);
                }
                Err(reason) => {
                    log::warn!("catalog: rejecting {uri}: {reason}");
                }
            }
        }
        out
    }

    pub fn detail(&self, uri: &str) -> Option<PluginInfo> {
        self.provider.detail(uri)
    }

    pub fn gui(&self, uri: &str) -> Option<GuiAssets> {
        self.provider.gui(uri)
    }

    pub fn gui_mini(&self, uri: &str) -> Option<GuiAssets> {
        self.provider.gui_mini(uri)
    }

    pub fn essentials(&self, uri: &str) -> Option<GuiAssets> {
        self.provider.essentials(uri)
    }

    pub fn presets(&self, uri: &str) -> Vec<PluginPreset> {
        self.provider.presets(uri)
    }

    pub fn validate_preset(&self, uri: &str, preset_uri: &str) -> bool {
        self.provider.validate_preset(uri, preset_uri)
    }

    pub fn rescan_presets(&self, uri: &str) -> Vec<PluginPreset> {
        self.provider.rescan_presets(uri)
    }

    pub fn bundle_loaded(&self, path: &str) -> bool {
        self.provider.bundle_loaded(path)
    }

    pub fn add_bundle(&self, path: &str) -> Result<Vec<String>, CatalogError> {
        self.provider.add_bundle(path)
    }

    pub fn remove_bundle(&self, path: &str, resource_path: &str) -> Result<Vec<String>, CatalogError> {
        self.provider.remove_bundle(path, resource_path)
    }

    pub fn list_plugins_in_bundle(&self, path: &str) -> Vec<String> {
        self.provider.list_plugins_in_bundle(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_proto::{PluginAuthor, PluginPort, PluginPorts, PortUnits};
    use std::fs;

    fn port(index: u32, audio: bool) -> PluginPort {
        PluginPort {
            index,
            name: "p".into(),
            symbol: format!("p{index}"),
            short_name: "p".into(),
            comment: String::new(),
            designation: String::new(),
            min: 0.0,
            max: if audio { 0.0 } else { 1.0 },
            default: 0.0,
            units: PortUnits::default(),
            properties: vec![],
            scale_points: vec![],
        }
    }

    fn info_with_audio_inputs(n: usize) -> PluginInfo {
        PluginInfo {
            uri: "http://p".into(),
            name: "P".into(),
            brand: String::new(),
            label: String::new(),
            comment: String::new(),
            version: "1".into(),
            license: String::new(),
            categories: vec![],
            author: PluginAuthor::default(),
            ports: PluginPorts {
                audio_in: (0..n).map(|i| port(i as u32, true)).collect(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn validator_rejects_nine_audio_inputs() {
        let info = info_with_audio_inputs(9);
        assert!(validate_plugin(&info).is_err());
    }

    #[test]
    fn validator_accepts_eight_audio_inputs() {
        let info = info_with_audio_inputs(8);
        assert!(validate_plugin(&info).is_ok());
    }

    #[test]
    fn validator_rejects_zero_audio_ports() {
        let mut info = info_with_audio_inputs(0);
        info.ports.audio_in.clear();
        assert!(validate_plugin(&info).is_err());
    }

    #[test]
    fn validator_accepts_output_only_plugin() {
        let mut info = info_with_audio_inputs(0);
        info.ports.audio_out.push(port(0, true));
        assert!(validate_plugin(&info).is_ok());
    }

    #[test]
    fn validator_rejects_inverted_control_range() {
        let mut info = info_with_audio_inputs(1);
        let mut bad_port = port(1, false);
        bad_port.min = 10.0;
        bad_port.max = 1.0;
        info.ports.control_in.push(bad_port);
        assert!(validate_plugin(&info).is_err());
    }

    #[test]
    fn validator_warns_but_accepts_extreme_range() {
        let mut info = info_with_audio_inputs(1);
        let mut extreme = port(1, false);
        extreme.min = -2_000_000.0;
        extreme.max = 2_000_000.0;
        extreme.default = 0.0;
        info.ports.control_in.push(extreme);
        assert!(validate_plugin(&info).is_ok());
    }

    #[test]
    fn fs_provider_discovers_bundle_with_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = tmp.path().join("reverb.lv2");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("manifest.ttl"), "# stub").unwrap();
        fs::write(
            bundle.join("bridge.json"),
            serde_json::json!({
                "plugins": [ {
                    "uri": "http://example.org/reverb",
                    "name": "Reverb",
                    "brand": "Acme",
                    "label": "reverb",
                    "comment": "",
                    "version": "1.0",
                    "license": "MIT",
                    "categories": ["Reverb"],
                    "author": {"name": "Jane", "homepage": "", "email": ""},
                    "ports": {
                        "audio_in": [], "audio_out": [], "control_in": [],
                        "control_out": [], "cv_in": [], "cv_out": [],
                        "midi_in": [], "midi_out": []
                    }
                } ]
            })
            .to_string(),
        )
        .unwrap();

        let provider = FsDiscoveryProvider::new(vec![tmp.path().to_path_buf()]);
        let scanned = provider.scan();
        assert!(scanned.contains_key("http://example.org/reverb"));
    }

    #[test]
    fn catalog_filters_invalid_scan_results() {
        struct StubProvider;
        impl DiscoveryProvider for StubProvider {
            fn scan(&self) -> HashMap<String, PluginInfo> {
                let mut out = HashMap::new();
                out.insert("http://valid".into(), {
                    let mut i = info_with_audio_inputs(1);
                    i.uri = "http://valid".into();
                    i
                });
                out.insert("http://invalid".into(), {
                    let mut i = info_with_audio_inputs(0);
                    i.uri = "http://invalid".into();
                    i.ports.audio_in.clear();
                    i
                });
                out
            }
            fn detail(&self, _: &str) -> Option<PluginInfo> { None }
            fn gui(&self, _: &str) -> Option<GuiAssets> { None }
            fn gui_mini(&self, _: &str) -> Option<GuiAssets> { None }
            fn essentials(&self, _: &str) -> Option<GuiAssets> { None }
            fn presets(&self, _: &str) -> Vec<PluginPreset> { vec![] }
            fn validate_preset(&self, _: &str, _: &str) -> bool { false }
            fn rescan_presets(&self, _: &str) -> Vec<PluginPreset> { vec![] }
            fn bundle_loaded(&self, _: &str) -> bool { false }
            fn add_bundle(&self, _: &str) -> Result<Vec<String>, CatalogError> { Ok(vec![]) }
            fn remove_bundle(&self, _: &str, _: &str) -> Result<Vec<String>, CatalogError> { Ok(vec![]) }
            fn list_plugins_in_bundle(&self, _: &str) -> Vec<String> { vec![] }
        }

        let catalog = PluginCatalog::new(Box::new(StubProvider));
        let scanned = catalog.scan();
        assert!(scanned.contains_key("http://valid"));
        assert!(!scanned.contains_key("http://invalid"));
    }
}
