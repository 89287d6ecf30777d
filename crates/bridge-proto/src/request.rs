//! Command-service request taxonomy.
//!
//! ```text
//! request ::= raw_cmd | structured_cmd | { "action": <"plugin"|"audio"|"health">, ... }
//! raw_cmd ::= { "command": string }
//! structured_cmd ::= { "name": string, "args": [string*] }
//! ```
//!
//! Requests don't share a single serde tag (raw/structured requests carry no
//! `action` field) so dispatch is done by hand against the parsed
//! `serde_json::Value`, exactly as the command service is specified to do.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ProtocolError;
use crate::plugin::SearchCriteria;

#[derive(Debug, Clone)]
pub enum CommandRequest {
    Raw { command: String },
    Structured { name: String, args: Vec<String> },
    Plugin(PluginMethod),
    Audio(AudioMethod),
    Health,
}

impl CommandRequest {
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let obj = value.as_object().ok_or(ProtocolError::InvalidJson)?;

        if let Some(action) = obj.get("action").and_then(Value::as_str) {
            return match action {
                "plugin" => Ok(CommandRequest::Plugin(PluginMethod::from_value(obj)?)),
                "audio" => Ok(CommandRequest::Audio(AudioMethod::from_value(obj)?)),
                "health" => Ok(CommandRequest::Health),
                other => Err(ProtocolError::UnknownAction(other.to_string())),
            };
        }

        if let Some(command) = obj.get("command").and_then(Value::as_str) {
            return Ok(CommandRequest::Raw { command: command.to_string() });
        }

        if let Some(name) = obj.get("name").and_then(Value::as_str) {
            let args = obj
                .get("args")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            return Ok(CommandRequest::Structured { name: name.to_string(), args });
        }

        Err(ProtocolError::InvalidJson)
    }
}

fn req_str(obj: &serde_json::Map<String, Value>, key: &'static str) -> Result<String, ProtocolError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProtocolError::MissingParam(key))
}

fn req_f64(obj: &serde_json::Map<String, Value>, key: &'static str) -> Result<f64, ProtocolError> {
    obj.get(key).and_then(Value::as_f64).ok_or(ProtocolError::MissingParam(key))
}

fn opt_f64(obj: &serde_json::Map<String, Value>, key: &'static str, default: f64) -> f64 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn opt_bool(obj: &serde_json::Map<String, Value>, key: &'static str, default: bool) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn opt_str(obj: &serde_json::Map<String, Value>, key: &'static str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// The 22 plugin-management RPCs.
#[derive(Debug, Clone)]
pub enum PluginMethod {
    LoadPlugin {
        uri: String,
        x: f64,
        y: f64,
        initial_params: BTreeMap<String, f64>,
    },
    UnloadPlugin {
        instance_id: String,
    },
    SetParameter {
        instance_id: String,
        symbol: String,
        value: f64,
    },
    GetParameter {
        instance_id: String,
        symbol: String,
    },
    GetPluginInfo {
        instance_id: String,
    },
    ListInstances,
    ClearAll,
    GetAvailablePlugins,
    SearchPlugins {
        criteria: SearchCriteria,
    },
    GetPluginPresets {
        uri: String,
    },
    LoadPreset {
        instance_id: String,
        preset_uri: String,
    },
    SavePreset {
        instance_id: String,
        label: String,
        dir: String,
    },
    RescanPlugins,
    ValidatePreset {
        uri: String,
        preset_uri: String,
    },
    RescanPresets {
        uri: String,
    },
    GetPluginGui {
        uri: String,
    },
    GetPluginGuiMini {
        uri: String,
    },
    GetPluginEssentials {
        uri: String,
    },
    IsBundleLoaded {
        path: String,
    },
    AddBundle {
        path: String,
    },
    RemoveBundle {
        path: String,
        resource_path: String,
    },
    ListBundlePlugins {
        path: String,
    },
}

impl PluginMethod {
    fn from_value(obj: &serde_json::Map<String, Value>) -> Result<Self, ProtocolError> {
        let method = req_str(obj, "method")?;
        Ok(match method.as_str() {
            "load_plugin" => PluginMethod::LoadPlugin {
                uri: req_str(obj, "uri")?,
                x: opt_f64(obj, "x", 0.0),
                y: opt_f64(obj, "y", 0.0),
                initial_params: obj
                    .get("initial_params")
                    .and_then(Value::as_object)
                    .map(|m| {
                        m.iter()
                            .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            "unload_plugin" => PluginMethod::UnloadPlugin { instance_id: req_str(obj, "instance_id")? },
            "set_parameter" => PluginMethod::SetParameter {
                instance_id: req_str(obj, "instance_id")?,
                symbol: req_str(obj, "symbol")?,
                value: req_f64(obj, "value")?,
            },
            "get_parameter" => PluginMethod::GetParameter {
                instance_id: req_str(obj, "instance_id")?,
                symbol: req_str(obj, "symbol")?,
            },
            "get_plugin_info" => PluginMethod::GetPluginInfo { instance_id: req_str(obj, "instance_id")? },
            "list_instances" => PluginMethod::ListInstances,
            "clear_all" => PluginMethod::ClearAll,
            "get_available_plugins" => PluginMethod::GetAvailablePlugins,
            "search_plugins" => PluginMethod::SearchPlugins {
                criteria: obj
                    .get("criteria")
                    .map(|v| serde_json::from_value(v.clone()).unwrap_or_default())
                    .unwrap_or_default(),
            },
            "get_plugin_presets" => PluginMethod::GetPluginPresets { uri: req_str(obj, "uri")? },
            "load_preset" => PluginMethod::LoadPreset {
                instance_id: req_str(obj, "instance_id")?,
                preset_uri: req_str(obj, "preset_uri")?,
            },
            "save_preset" => PluginMethod::SavePreset {
                instance_id: req_str(obj, "instance_id")?,
                label: req_str(obj, "label")?,
                dir: opt_str(obj, "dir").unwrap_or_default(),
            },
            "rescan_plugins" => PluginMethod::RescanPlugins,
            "validate_preset" => PluginMethod::ValidatePreset {
                uri: req_str(obj, "uri")?,
                preset_uri: req_str(obj, "preset_uri")?,
            },
            "rescan_presets" => PluginMethod::RescanPresets { uri: req_str(obj, "uri")? },
            "get_plugin_gui" => PluginMethod::GetPluginGui { uri: req_str(obj, "uri")? },
            "get_plugin_gui_mini" => PluginMethod::GetPluginGuiMini { uri: req_str(obj, "uri")? },
            "get_plugin_essentials" => PluginMethod::GetPluginEssentials { uri: req_str(obj, "uri")? },
            "is_bundle_loaded" => PluginMethod::IsBundleLoaded { path: req_str(obj, "path")? },
            "add_bundle" => PluginMethod::AddBundle { path: req_str(obj, "path")? },
            "remove_bundle" => PluginMethod::RemoveBundle {
                path: req_str(obj, "path")?,
                resource_path: opt_str(obj, "resource_path").unwrap_or_default(),
            },
            "list_bundle_plugins" => PluginMethod::ListBundlePlugins { path: req_str(obj, "path")? },
            other => return Err(ProtocolError::UnknownMethod(other.to_string())),
        })
    }
}

/// The 19 named audio-system RPCs (the spec's summary count of "20" does
/// not match its own enumeration; see DESIGN.md Open Question).
#[derive(Debug, Clone)]
pub enum AudioMethod {
    InitJack,
    CloseJack,
    GetJackData { with_transport: bool },
    GetJackBufferSize,
    SetJackBufferSize { size: u32 },
    GetJackSampleRate,
    GetJackPortAlias { port: String },
    GetJackHardwarePorts { is_audio: bool, is_output: bool },
    HasMidiBeatClockSenderPort,
    HasSerialMidiInputPort,
    HasSerialMidiOutputPort,
    HasMidiMergerOutputPort,
    HasMidiBroadcasterInputPort,
    HasDuoxSplitSpdif,
    ConnectJackPorts { port1: String, port2: String },
    ConnectJackMidiOutputPorts { port: String },
    DisconnectJackPorts { port1: String, port2: String },
    DisconnectAllJackPorts { port: String },
    ResetXruns,
}

impl AudioMethod {
    fn from_value(obj: &serde_json::Map<String, Value>) -> Result<Self, ProtocolError> {
        let method = req_str(obj, "method")?;
        Ok(match method.as_str() {
            "init_jack" => AudioMethod::InitJack,
            "close_jack" => AudioMethod::CloseJack,
            "get_jack_data" => AudioMethod::GetJackData { with_transport: opt_bool(obj, "with_transport", false) },
            "get_jack_buffer_size" => AudioMethod::GetJackBufferSize,
            "set_jack_buffer_size" => AudioMethod::SetJackBufferSize {
                size: obj.get("size").and_then(Value::as_u64).ok_or(ProtocolError::MissingParam("size"))? as u32,
            },
            "get_jack_sample_rate" => AudioMethod::GetJackSampleRate,
            "get_jack_port_alias" => AudioMethod::GetJackPortAlias { port: req_str(obj, "port")? },
            "get_jack_hardware_ports" => AudioMethod::GetJackHardwarePorts {
                is_audio: opt_bool(obj, "is_audio", true),
                is_output: opt_bool(obj, "is_output", true),
            },
            "has_midi_beat_clock_sender_port" => AudioMethod::HasMidiBeatClockSenderPort,
            "has_serial_midi_input_port" => AudioMethod::HasSerialMidiInputPort,
            "has_serial_midi_output_port" => AudioMethod::HasSerialMidiOutputPort,
            "has_midi_merger_output_port" => AudioMethod::HasMidiMergerOutputPort,
            "has_midi_broadcaster_input_port" => AudioMethod::HasMidiBroadcasterInputPort,
            "has_duox_split_spdif" => AudioMethod::HasDuoxSplitSpdif,
            "connect_jack_ports" => AudioMethod::ConnectJackPorts {
                port1: req_str(obj, "port1")?,
                port2: req_str(obj, "port2")?,
            },
            "connect_jack_midi_output_ports" => {
                AudioMethod::ConnectJackMidiOutputPorts { port: req_str(obj, "port")? }
            }
            "disconnect_jack_ports" => AudioMethod::DisconnectJackPorts {
                port1: req_str(obj, "port1")?,
                port2: req_str(obj, "port2")?,
            },
            "disconnect_all_jack_ports" => {
                AudioMethod::DisconnectAllJackPorts { port: req_str(obj, "port")? }
            }
            "reset_xruns" => AudioMethod::ResetXruns,
            other => return Err(ProtocolError::UnknownMethod(other.to_string())),
        })
    }
}
