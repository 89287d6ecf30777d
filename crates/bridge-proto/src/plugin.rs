//! Plugin catalog and instance entities.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discoverable but not-yet-loaded LV2 plugin, as produced by a catalog scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub uri: String,
    pub name: String,
    pub brand: String,
    pub label: String,
    pub comment: String,
    pub version: String,
    pub license: String,
    pub categories: Vec<String>,
    pub author: PluginAuthor,
    pub ports: PluginPorts,
}

impl PluginInfo {
    /// `uri` non-empty and every port index unique within the plugin.
    pub fn validate_shape(&self) -> Result<(), String> {
        if self.uri.is_empty() {
            return Err("uri must not be empty".into());
        }
        let mut seen = std::collections::HashSet::new();
        for port in self.ports.all() {
            if !seen.insert(port.index) {
                return Err(format!("duplicate port index {}", port.index));
            }
        }
        Ok(())
    }

    /// Case-insensitive concatenation used by free-text search.
    pub fn search_blob(&self) -> String {
        format!(
            "{} {} {} {}",
            self.name, self.author.name, self.comment, self.uri
        )
        .to_lowercase()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginAuthor {
    pub name: String,
    pub homepage: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginPorts {
    pub audio_in: Vec<PluginPort>,
    pub audio_out: Vec<PluginPort>,
    pub control_in: Vec<PluginPort>,
    pub control_out: Vec<PluginPort>,
    pub cv_in: Vec<PluginPort>,
    pub cv_out: Vec<PluginPort>,
    pub midi_in: Vec<PluginPort>,
    pub midi_out: Vec<PluginPort>,
}

impl PluginPorts {
    pub fn all(&self) -> impl Iterator<Item = &PluginPort> {
        self.audio_in
            .iter()
            .chain(self.audio_out.iter())
            .chain(self.control_in.iter())
            .chain(self.control_out.iter())
            .chain(self.cv_in.iter())
            .chain(self.cv_out.iter())
            .chain(self.midi_in.iter())
            .chain(self.midi_out.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginPort {
    pub index: u32,
    pub name: String,
    pub symbol: String,
    pub short_name: String,
    pub comment: String,
    pub designation: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub units: PortUnits,
    pub properties: Vec<String>,
    pub scale_points: Vec<ScalePoint>,
}

impl PluginPort {
    /// `min <= default <= max` is a hard invariant; `|min|, |max| < 1e6` is
    /// only a soft warning, enforced by the caller (PluginCatalog validation),
    /// not here.
    pub fn range_ok(&self) -> bool {
        self.min <= self.default && self.default <= self.max
    }

    pub const EXTREME_RANGE: f64 = 1_000_000.0;

    pub fn has_extreme_range(&self) -> bool {
        self.min.abs() > Self::EXTREME_RANGE || self.max.abs() > Self::EXTREME_RANGE
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortUnits {
    pub label: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalePoint {
    pub value: f64,
    pub label: String,
}

/// A loaded plugin instance, mutated in place by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInstance {
    pub uri: String,
    pub instance_id: String,
    pub host_instance: i32,
    pub name: String,
    pub brand: String,
    pub version: String,
    pub parameters: BTreeMap<String, f64>,
    pub ports: PluginPorts,
    pub x: f64,
    pub y: f64,
    pub enabled: bool,
    pub preset: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Immutable per-URI preset descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginPreset {
    pub uri: String,
    pub label: String,
    pub path: String,
}

/// Conjunctive search criteria over the available-plugin catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub query: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub min_audio_inputs: Option<usize>,
    pub min_audio_outputs: Option<usize>,
    pub max_audio_inputs: Option<usize>,
    pub max_audio_outputs: Option<usize>,
}

impl SearchCriteria {
    pub fn matches(&self, info: &PluginInfo) -> bool {
        if let Some(q) = &self.query {
            if !q.is_empty() && !info.search_blob().contains(&q.to_lowercase()) {
                return false;
            }
        }
        if let Some(cat) = &self.category {
            let cat = cat.to_lowercase();
            if !info
                .categories
                .iter()
                .any(|c| c.to_lowercase().contains(&cat))
            {
                return false;
            }
        }
        if let Some(author) = &self.author {
            if !info
                .author
                .name
                .to_lowercase()
                .contains(&author.to_lowercase())
            {
                return false;
            }
        }
        let n_in = info.ports.audio_in.len();
        let n_out = info.ports.audio_out.len();
        if let Some(min) = self.min_audio_inputs {
            if n_in < min {
                return false;
            }
        }
        if let Some(min) = self.min_audio_outputs {
            if n_out < min {
                return false;
            }
        }
        if let Some(max) = self.max_audio_inputs {
            if n_in > max {
                return false;
            }
        }
        if let Some(max) = self.max_audio_outputs {
            if n_out > max {
                return false;
            }
        }
        true
    }
}
