//! CommandService: binds a REP socket and dispatches requests across the
//! raw/structured/plugin/audio/health handler families.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use bridge_proto::{error_reply, raw_reply, AudioMethod, CommandRequest, HealthState, PluginMethod};
use bridge_registry::{AudioSystemAdapter, LifecycleSink, PluginRegistry};
use bridge_transport::ModHostClient;

const RECV_TIMEOUT_MS: i32 = 100;
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

pub struct CommandService<L: LifecycleSink + 'static> {
    socket: zmq::Socket,
    client: Arc<ModHostClient>,
    health: Arc<HealthState>,
    registry: Arc<PluginRegistry<L>>,
    audio: Arc<AudioSystemAdapter>,
    stop: Arc<AtomicBool>,
}

impl<L: LifecycleSink + 'static> CommandService<L> {
    pub fn bind(
        ctx: &zmq::Context,
        bind_addr: &str,
        client: Arc<ModHostClient>,
        health: Arc<HealthState>,
        registry: Arc<PluginRegistry<L>>,
        audio: Arc<AudioSystemAdapter>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, zmq::Error> {
        let socket = ctx.socket(zmq::REP)?;
        socket.bind(bind_addr)?;
        socket.set_rcvtimeo(RECV_TIMEOUT_MS)?;
        Ok(Self { socket, client, health, registry, audio, stop })
    }

    pub fn run(&self) {
        while !self.stop.load(Ordering::Relaxed) {
            match self.socket.recv_string(0) {
                Ok(Ok(msg)) => {
                    let reply = self.handle(&msg);
                    if let Err(e) = self.socket.send(&reply.to_string(), 0) {
                        log::warn!("command service: send failed: {e}");
                    }
                }
                Ok(Err(_)) => {
                    let _ = self.socket.send(&error_reply("Invalid JSON").to_string(), 0);
                }
                Err(zmq::Error::EAGAIN) => {}
                Err(e) => log::warn!("command service: recv error: {e}"),
            }
        }
    }

    fn handle(&self, msg: &str) -> Value {
        let value: Value = match serde_json::from_str(msg) {
            Ok(v) => v,
            Err(_) => return error_reply("Invalid JSON"),
        };

        let request = match CommandRequest::from_value(&value) {
            Ok(r) => r,
            Err(e) => return error_reply(e),
        };

        match request {
            CommandRequest::Raw { command } => self.forward(&command),
            CommandRequest::Structured { name, args } => {
                let mut command = name;
                for arg in args {
                    command.push(' ');
                    command.push_str(&arg);
                }
                self.forward(&command)
            }
            CommandRequest::Health => {
                let snap = self.health.snapshot();
                json!({
                    "status": snap.status,
                    "message": snap.message,
                    "command_connected": snap.command_connected,
                    "feedback_connected": snap.feedback_connected,
                })
            }
            CommandRequest::Plugin(method) => self.dispatch_plugin(method),
            CommandRequest::Audio(method) => self.dispatch_audio(method),
        }
    }

    fn forward(&self, command: &str) -> Value {
        match self.client.send(command, COMMAND_TIMEOUT, &self.health) {
            Ok(raw) => raw_reply("ok", &raw),
            Err(e) => error_reply(e),
        }
    }

    fn dispatch_plugin(&self, method: PluginMethod) -> Value {
        match method {
            PluginMethod::LoadPlugin { uri, x, y, initial_params } => {
                match self.registry.load_plugin(&uri, x, y, initial_params) {
                    Ok(instance) => json!({
                        "instance_id": instance.instance_id,
                        "plugin": instance,
                    }),
                    Err(e) => error_reply(e),
                }
            }
            PluginMethod::UnloadPlugin { instance_id } => match self.registry.unload_plugin(&instance_id) {
                Ok(()) => json!({"status": "ok", "instance_id": instance_id}),
                Err(e) => error_reply(e),
            },
            PluginMethod::SetParameter { instance_id, symbol, value } => {
                match self.registry.set_parameter(&instance_id, &symbol, value) {
                    Ok(()) => json!({"status": "ok", "value": value}),
                    Err(e) => error_reply(e),
                }
            }
            PluginMethod::GetParameter { instance_id, symbol } => {
                match self.registry.get_parameter(&instance_id, &symbol) {
                    Ok(value) => json!({"status": "ok", "value": value}),
                    Err(e) => error_reply(e),
                }
            }
            PluginMethod::GetPluginInfo { instance_id } => match self.registry.get_plugin_info(&instance_id) {
                Some(instance) => json!(instance),
                None => error_reply(format!("unknown instance id: {instance_id}")),
            },
            PluginMethod::ListInstances => json!({"instances": self.registry.list_instances()}),
            PluginMethod::ClearAll => json!({"status": "ok", "cleared": self.registry.clear_all()}),
            PluginMethod::GetAvailablePlugins => json!({"plugins": self.registry.get_available_plugins()}),
            PluginMethod::SearchPlugins { criteria } => json!({"plugins": self.registry.search(&criteria)}),
            PluginMethod::GetPluginPresets { uri } => json!({"presets": self.registry.presets(&uri)}),
            PluginMethod::LoadPreset { instance_id, preset_uri } => {
                match self.registry.load_preset(&instance_id, &preset_uri) {
                    Ok(()) => json!({"status": "ok"}),
                    Err(e) => error_reply(e),
                }
            }
            PluginMethod::SavePreset { instance_id, label, dir } => {
                match self.registry.save_preset(&instance_id, &label, &dir) {
                    Ok(path) => json!({"status": "ok", "path": path}),
                    Err(e) => error_reply(e),
                }
            }
            PluginMethod::RescanPlugins => json!({"status": "ok", "count": self.registry.rescan_plugins()}),
            PluginMethod::ValidatePreset { uri, preset_uri } => {
                json!({"valid": self.registry.validate_preset(&uri, &preset_uri)})
            }
            PluginMethod::RescanPresets { uri } => json!({"presets": self.registry.rescan_presets(&uri)}),
            PluginMethod::GetPluginGui { uri } => match self.registry.gui(&uri) {
                Some(assets) => json!(assets),
                None => error_reply("no gui assets"),
            },
            PluginMethod::GetPluginGuiMini { uri } => match self.registry.gui_mini(&uri) {
                Some(assets) => json!(assets),
                None => error_reply("no gui assets"),
            },
            PluginMethod::GetPluginEssentials { uri } => match self.registry.essentials(&uri) {
                Some(assets) => json!(assets),
                None => error_reply("no gui assets"),
            },
            PluginMethod::IsBundleLoaded { path } => json!({"loaded": self.registry.bundle_loaded(&path)}),
            PluginMethod::AddBundle { path } => match self.registry.add_bundle(&path) {
                Ok(plugins) => json!({"status": "ok", "plugins": plugins}),
                Err(e) => error_reply(e),
            },
            PluginMethod::RemoveBundle { path, resource_path } => {
                match self.registry.remove_bundle(&path, &resource_path) {
                    Ok(plugins) => json!({"status": "ok", "plugins": plugins}),
                    Err(e) => error_reply(e),
                }
            }
            PluginMethod::ListBundlePlugins { path } => {
                json!({"plugins": self.registry.list_bundle_plugins(&path)})
            }
        }
    }

    fn dispatch_audio(&self, method: AudioMethod) -> Value {
        match method {
            AudioMethod::InitJack => match self.audio.init() {
                Ok(()) => json!({"status": "ok"}),
                Err(e) => error_reply(e),
            },
            AudioMethod::CloseJack => match self.audio.close() {
                Ok(()) => json!({"status": "ok"}),
                Err(e) => error_reply(e),
            },
            AudioMethod::GetJackData { with_transport } => match self.audio.get_data(with_transport) {
                Ok(Some(data)) => json!(data),
                Ok(None) => json!({"status": "unavailable"}),
                Err(e) => error_reply(e),
            },
            AudioMethod::GetJackBufferSize => match self.audio.get_buffer_size() {
                Ok(size) => json!({"size": size}),
                Err(e) => error_reply(e),
            },
            AudioMethod::SetJackBufferSize { size } => match self.audio.set_buffer_size(size) {
                Ok(applied) => json!({"status": "ok", "applied": applied}),
                Err(e) => error_reply(e),
            },
            AudioMethod::GetJackSampleRate => match self.audio.get_sample_rate() {
                Ok(rate) => json!({"rate": rate}),
                Err(e) => error_reply(e),
            },
            AudioMethod::GetJackPortAlias { port } => match self.audio.get_port_alias(&port) {
                Ok(alias) => json!({"alias": alias}),
                Err(e) => error_reply(e),
            },
            AudioMethod::GetJackHardwarePorts { is_audio, is_output } => {
                match self.audio.get_hardware_ports(is_audio, is_output) {
                    Ok(ports) => json!({"ports": ports}),
                    Err(e) => error_reply(e),
                }
            }
            AudioMethod::HasMidiBeatClockSenderPort => bool_result(self.audio.has_midi_beat_clock_sender_port()),
            AudioMethod::HasSerialMidiInputPort => bool_result(self.audio.has_serial_midi_input_port()),
            AudioMethod::HasSerialMidiOutputPort => bool_result(self.audio.has_serial_midi_output_port()),
            AudioMethod::HasMidiMergerOutputPort => bool_result(self.audio.has_midi_merger_output_port()),
            AudioMethod::HasMidiBroadcasterInputPort => bool_result(self.audio.has_midi_broadcaster_input_port()),
            AudioMethod::HasDuoxSplitSpdif => bool_result(self.audio.has_duox_split_spdif()),
            AudioMethod::ConnectJackPorts { port1, port2 } => match self.audio.connect_ports(&port1, &port2) {
                Ok(connected) => json!({"status": "ok", "connected": connected}),
                Err(e) => error_reply(e),
            },
            AudioMethod::ConnectJackMidiOutputPorts { port } => match self.audio.connect_midi_output_ports(&port) {
                Ok(connected) => json!({"status": "ok", "connected": connected}),
                Err(e) => error_reply(e),
            },
            AudioMethod::DisconnectJackPorts { port1, port2 } => {
                match self.audio.disconnect_ports(&port1, &port2) {
                    Ok(disconnected) => json!({"status": "ok", "disconnected": disconnected}),
                    Err(e) => error_reply(e),
                }
            }
            AudioMethod::DisconnectAllJackPorts { port } => match self.audio.disconnect_all_ports(&port) {
                Ok(disconnected) => json!({"status": "ok", "disconnected": disconnected}),
                Err(e) => error_reply(e),
            },
            AudioMethod::ResetXruns => match self.audio.reset_xruns() {
                Ok(()) => json!({"status": "ok"}),
                Err(e) => error_reply(e),
            },
        }
    }
}

fn bool_result(result: Result<bool, bridge_proto::StateError>) -> Value {
    match result {
        Ok(value) => json!({"value": value}),
        Err(e) => error_reply(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_registry::{FsDiscoveryProvider, NullAudioSystemProvider, PluginCatalog};
    use std::thread;

    struct NoopSink;
    impl LifecycleSink for NoopSink {
        fn publish(&self, _event: bridge_proto::LifecycleEvent) {}
    }

    fn make_service() -> (Arc<AtomicBool>, String, thread::JoinHandle<()>) {
        let ctx = zmq::Context::new();
        let catalog = PluginCatalog::new(Box::new(FsDiscoveryProvider::new(vec![])));
        let client = Arc::new(ModHostClient::new("127.0.0.1", 1));
        let health = Arc::new(HealthState::new());
        let sink = Arc::new(NoopSink);
        let registry = PluginRegistry::new(catalog, client.clone(), health.clone(), sink, vec![], Duration::from_secs(60));
        registry.initialize();
        let audio = Arc::new(AudioSystemAdapter::new(Box::new(NullAudioSystemProvider::new())));
        let stop = Arc::new(AtomicBool::new(false));

        let service =
            CommandService::bind(&ctx, "tcp://127.0.0.1:*", client, health, registry, audio, stop.clone()).unwrap();
        let endpoint = service.socket.get_last_endpoint().unwrap().unwrap();
        let handle = thread::spawn(move || service.run());
        (stop, endpoint, handle)
    }

    #[test]
    fn health_action_replies_with_snapshot() {
        let (stop, endpoint, handle) = make_service();
        let client_ctx = zmq::Context::new();
        let client = client_ctx.socket(zmq::REQ).unwrap();
        client.connect(&endpoint).unwrap();
        client.send(r#"{"action":"health"}"#, 0).unwrap();
        let reply = client.recv_string(0).unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["status"], "starting");

        stop.store(true, Ordering::Relaxed);
        thread::sleep(Duration::from_millis(150));
        handle.join().unwrap();
    }

    #[test]
    fn unknown_method_replies_with_error() {
        let (stop, endpoint, handle) = make_service();
        let client_ctx = zmq::Context::new();
        let client = client_ctx.socket(zmq::REQ).unwrap();
        client.connect(&endpoint).unwrap();
        client.send(r#"{"action":"plugin","method":"bogus"}"#, 0).unwrap();
        let reply = client.recv_string(0).unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&reply).unwrap();
        assert!(parsed.get("error").is_some());

        stop.store(true, Ordering::Relaxed);
        thread::sleep(Duration::from_millis(150));
        handle.join().unwrap();
    }
}
