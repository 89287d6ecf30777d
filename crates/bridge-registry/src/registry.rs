//! PluginRegistry: the authoritative owner of loaded-instance state.
//!
//! Owns `available` (the catalog snapshot) and `instances` (live,
//! mod-host-confirmed loads) under a single mutex, per the concurrency
//! model: every mutation holds the lock for the duration of one RPC.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use bridge_proto::{
    BridgeError, BridgeResult, DomainError, HealthState, LifecycleEvent, PluginInfo,
    PluginInstance, PluginPreset, SearchCriteria, TransportError,
};
use bridge_transport::ModHostClient;

use crate::catalog::{CatalogError, GuiAssets, PluginCatalog};
use crate::watcher::BundleWatcher;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Receives the four lifecycle events a registry mutation can produce.
/// Implemented by bridge-ipc's EventPublisher; kept as a trait so this
/// crate never depends on the IPC transport.
pub trait LifecycleSink: Send + Sync {
    fn publish(&self, event: LifecycleEvent);
}

#[derive(Debug, Clone, Default)]
pub struct RegistryMetrics {
    pub available_count: usize,
    pub instance_count: usize,
}

struct State {
    available: std::collections::HashMap<String, PluginInfo>,
    instances: BTreeMap<String, PluginInstance>,
    next_ordinal: u64,
    next_host_instance: i32,
}

pub struct PluginRegistry<L: LifecycleSink> {
    catalog: PluginCatalog,
    client: Arc<ModHostClient>,
    health: Arc<HealthState>,
    sink: Arc<L>,
    lv2_paths: Vec<std::path::PathBuf>,
    watch_interval: Duration,
    state: Mutex<State>,
    watcher_stop: Mutex<Option<Arc<AtomicBool>>>,
    watcher_handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl<L: LifecycleSink + 'static> PluginRegistry<L> {
    pub fn new(
        catalog: PluginCatalog,
        client: Arc<ModHostClient>,
        health: Arc<HealthState>,
        sink: Arc<L>,
        lv2_paths: Vec<std::path::PathBuf>,
        watch_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            client,
            health,
            sink,
            lv2_paths,
            watch_interval,
            state: Mutex::new(State {
                available: std::collections::HashMap::new(),
                instances: BTreeMap::new(),
                next_ordinal: 0,
                next_host_instance: 0,
            }),
            watcher_stop: Mutex::new(None),
            watcher_handle: Mutex::new(None),
        })
    }

    fn publish(&self, event: LifecycleEvent) {
        self.sink.publish(event);
    }

    /// Full catalog scan, then starts BundleWatcher on the configured LV2
    /// paths. Returns the number of plugins admitted to `available`.
    pub fn initialize(self: &Arc<Self>) -> usize {
        let scanned = self.catalog.scan();
        let count = scanned.len();
        self.state.lock().available = scanned;

        let stop = Arc::new(AtomicBool::new(false));
        let watcher = BundleWatcher::new(self.lv2_paths.clone(), self.watch_interval, stop.clone());
        let weak = Arc::downgrade(self);
        let handle = std::thread::spawn(move || {
            watcher.run(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.rescan_plugins();
                }
            });
        });
        *self.watcher_stop.lock() = Some(stop);
        *self.watcher_handle.lock() = Some(handle);
        count
    }

    pub fn load_plugin(
        &self,
        uri: &str,
        x: f64,
        y: f64,
        initial_params: BTreeMap<String, f64>,
    ) -> BridgeResult<PluginInstance> {
        let (info, ordinal, host_instance) = {
            let mut state = self.state.lock();
            let info = state
                .available
                .get(uri)
                .cloned()
                .ok_or_else(|| DomainError::UnknownUri(uri.to_string()))?;
            let ordinal = state.next_ordinal;
            let host_instance = state.next_host_instance;
            state.next_ordinal += 1;
            state.next_host_instance += 1;
            (info, ordinal, host_instance)
        };

        let instance_id = format!("plugin_{ordinal}_{:08x}", uuid::Uuid::new_v4().as_u128() as u32);

        let reply = self
            .client
            .send(&format!("add {uri} {host_instance}"), COMMAND_TIMEOUT, &self.health)?;
        let code = bridge_transport::parse_resp_int(&reply)
            .ok_or_else(|| BridgeError::from(bridge_proto::ProtocolError::UnexpectedReply(reply.clone())))?;
        if code < 0 {
            return Err(DomainError::RejectedCode(code).into());
        }
        let host_instance = code;

        for (symbol, value) in &initial_params {
            let cmd = format!("param_set {instance_id} {symbol} {value}");
            if let Err(e) = self.client.send(&cmd, COMMAND_TIMEOUT, &self.health) {
                log::warn!("registry: initial param_set {symbol}={value} on {instance_id} failed: {e}");
            }
        }

        let instance = PluginInstance {
            uri: uri.to_string(),
            instance_id: instance_id.clone(),
            host_instance,
            name: info.name.clone(),
            brand: info.brand.clone(),
            version: info.version.clone(),
            parameters: initial_params,
            ports: info.ports.clone(),
            x,
            y,
            enabled: true,
            preset: None,
            created_at: chrono::Utc::now(),
        };

        self.state.lock().instances.insert(instance_id.clone(), instance.clone());
        self.publish(LifecycleEvent::PluginLoaded { instance_id, uri: uri.to_string(), host_instance });
        Ok(instance)
    }

    pub fn unload_plugin(&self, instance_id: &str) -> BridgeResult<()> {
        {
            let state = self.state.lock();
            if !state.instances.contains_key(instance_id) {
                return Err(DomainError::UnknownInstance(instance_id.to_string()).into());
            }
        }
        if let Err(e) = self.client.send(&format!("remove {instance_id}"), COMMAND_TIMEOUT, &self.health) {
            log::warn!("registry: remove {instance_id} failed, deleting locally anyway: {e}");
        }
        self.state.lock().instances.remove(instance_id);
        self.publish(LifecycleEvent::PluginUnloaded { instance_id: instance_id.to_string() });
        Ok(())
    }

    pub fn set_parameter(&self, instance_id: &str, symbol: &str, value: f64) -> BridgeResult<()> {
        {
            let state = self.state.lock();
            if !state.instances.contains_key(instance_id) {
                return Err(DomainError::UnknownInstance(instance_id.to_string()).into());
            }
        }
        let cmd = format!("param_set {instance_id} {symbol} {value}");
        let reply = self.client.send(&cmd, COMMAND_TIMEOUT, &self.health)?;
        let code = bridge_transport::parse_resp_int(&reply).unwrap_or(0);
        if code < 0 {
            return Err(DomainError::RejectedCode(code).into());
        }

        let mut state = self.state.lock();
        if let Some(instance) = state.instances.get_mut(instance_id) {
            instance.parameters.insert(symbol.to_string(), value);
        }
        drop(state);
        self.publish(LifecycleEvent::ParameterChanged {
            instance_id: instance_id.to_string(),
            symbol: symbol.to_string(),
            value,
        });
        Ok(())
    }

    /// Attempts `param_get` against mod-host; on any transport or parse
    /// failure, falls back to the registry's own parameter mirror.
    pub fn get_parameter(&self, instance_id: &str, symbol: &str) -> BridgeResult<f64> {
        let mirror = {
            let state = self.state.lock();
            let instance = state
                .instances
                .get(instance_id)
                .ok_or_else(|| DomainError::UnknownInstance(instance_id.to_string()))?;
            instance.parameters.get(symbol).copied()
        };

        let cmd = format!("param_get {instance_id} {symbol}");
        match self.client.send(&cmd, COMMAND_TIMEOUT, &self.health) {
            Ok(reply) => match parse_last_f64(&reply) {
                Some(value) => Ok(value),
                None => mirror.ok_or_else(|| TransportError::Closed.into()),
            },
            Err(_) => mirror.ok_or_else(|| DomainError::UnknownInstance(instance_id.to_string()).into()),
        }
    }

    pub fn list_instances(&self) -> Vec<PluginInstance> {
        self.state.lock().instances.values().cloned().collect()
    }

    pub fn get_plugin_info(&self, instance_id: &str) -> Option<PluginInstance> {
        self.state.lock().instances.get(instance_id).cloned()
    }

    /// Unloads every live instance, best-effort. Returns how many were
    /// present before the sweep.
    pub fn clear_all(&self) -> usize {
        let ids: Vec<String> = self.state.lock().instances.keys().cloned().collect();
        let count = ids.len();
        for id in ids {
            let _ = self.unload_plugin(&id);
        }
        count
    }

    pub fn get_available_plugins(&self) -> Vec<PluginInfo> {
        self.state.lock().available.values().cloned().collect()
    }

    pub fn search(&self, criteria: &SearchCriteria) -> Vec<PluginInfo> {
        self.state.lock().available.values().filter(|info| criteria.matches(info)).cloned().collect()
    }

    /// Full rescan of the underlying catalog. Emits `plugins_rescanned`.
    pub fn rescan_plugins(&self) -> usize {
        let scanned = self.catalog.scan();
        let count = scanned.len();
        self.state.lock().available = scanned;
        self.publish(LifecycleEvent::PluginsRescanned { count });
        count
    }

    pub fn metrics(&self) -> RegistryMetrics {
        let state = self.state.lock();
        RegistryMetrics { available_count: state.available.len(), instance_count: state.instances.len() }
    }

    // -- PluginCatalog passthroughs (presets, GUI, bundles) --

    pub fn gui(&self, uri: &str) -> Option<GuiAssets> {
        self.catalog.gui(uri)
    }

    pub fn gui_mini(&self, uri: &str) -> Option<GuiAssets> {
        self.catalog.gui_mini(uri)
    }

    pub fn essentials(&self, uri: &str) -> Option<GuiAssets> {
        self.catalog.essentials(uri)
    }

    pub fn presets(&self, uri: &str) -> Vec<PluginPreset> {
        self.catalog.presets(uri)
    }

    pub fn validate_preset(&self, uri: &str, preset_uri: &str) -> bool {
        self.catalog.validate_preset(uri, preset_uri)
    }

    pub fn rescan_presets(&self, uri: &str) -> Vec<PluginPreset> {
        self.catalog.rescan_presets(uri)
    }

    pub fn bundle_loaded(&self, path: &str) -> bool {
        self.catalog.bundle_loaded(path)
    }

    pub fn add_bundle(&self, path: &str) -> Result<Vec<String>, CatalogError> {
        self.catalog.add_bundle(path)
    }

    pub fn remove_bundle(&self, path: &str, resource_path: &str) -> Result<Vec<String>, CatalogError> {
        self.catalog.remove_bundle(path, resource_path)
    }

    pub fn list_bundle_plugins(&self, path: &str) -> Vec<String> {
        self.catalog.list_plugins_in_bundle(path)
    }

    /// Loads a preset onto a live instance by forwarding to mod-host and
    /// recording the preset uri on the instance on success.
    pub fn load_preset(&self, instance_id: &str, preset_uri: &str) -> BridgeResult<()> {
        {
            let state = self.state.lock();
            if !state.instances.contains_key(instance_id) {
                return Err(DomainError::UnknownInstance(instance_id.to_string()).into());
            }
        }
        let cmd = format!("preset_load {instance_id} {preset_uri}");
        let reply = self.client.send(&cmd, COMMAND_TIMEOUT, &self.health)?;
        let code = bridge_transport::parse_resp_int(&reply).unwrap_or(0);
        if code < 0 {
            return Err(DomainError::RejectedCode(code).into());
        }
        if let Some(instance) = self.state.lock().instances.get_mut(instance_id) {
            instance.preset = Some(preset_uri.to_string());
        }
        Ok(())
    }

    /// Asks mod-host to persist the live instance's current parameters as
    /// a preset under `dir`. Returns the path mod-host reports on success,
    /// taken verbatim from its reply.
    pub fn save_preset(&self, instance_id: &str, label: &str, dir: &str) -> BridgeResult<String> {
        {
            let state = self.state.lock();
            if !state.instances.contains_key(instance_id) {
                return Err(DomainError::UnknownInstance(instance_id.to_string()).into());
            }
        }
        let cmd = format!("preset_save {instance_id} {label} {dir}");
        self.client.send(&cmd, COMMAND_TIMEOUT, &self.health).map_err(BridgeError::from)
    }

    /// Shutdown: best-effort `remove` for every live instance, stop the
    /// bundle watcher. Does not drop the catalog reference explicitly
    /// (that happens when the registry itself is dropped).
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.state.lock().instances.keys().cloned().collect();
        for id in &ids {
            if let Err(e) = self.client.send(&format!("remove {id}"), COMMAND_TIMEOUT, &self.health) {
                log::warn!("registry: shutdown remove {id} failed: {e}");
            }
        }
        self.state.lock().instances.clear();

        if let Some(stop) = self.watcher_stop.lock().take() {
            stop.store(true, Ordering::Relaxed);
        }
        if let Some(handle) = self.watcher_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

fn parse_last_f64(reply: &str) -> Option<f64> {
    reply.split_whitespace().last()?.parse().ok()
}
