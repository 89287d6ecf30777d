//! bridge-registry: the plugin catalog, instance registry, audio-system
//! adapter and bundle watcher.

mod audio;
mod catalog;
mod registry;
mod watcher;

pub use audio::{AudioSystemAdapter, AudioSystemProvider, JackData, NullAudioSystemProvider};
pub use catalog::{validate_plugin, CatalogError, DiscoveryProvider, FsDiscoveryProvider, GuiAssets, PluginCatalog};
pub use registry::{LifecycleSink, PluginRegistry, RegistryMetrics};
pub use watcher::BundleWatcher;
