//! AudioSystemAdapter: thin wrapper over the external JACK-like audio
//! system with an initialized-guard. Every operation other than `init`
//! fails with `StateError::NotInitialized` until `init()` has succeeded.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use bridge_proto::StateError;

/// Snapshot returned by `get_data`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JackData {
    pub cpu_load: f64,
    pub xruns: u32,
    pub rolling: bool,
    pub bpb: f64,
    pub bpm: f64,
}

/// The interface AudioSystemAdapter consumes. Implement this against
/// whatever concrete JACK/pipewire binding is wired in; `NullAudioSystemProvider`
/// is the default, self-contained stand-in.
pub trait AudioSystemProvider: Send + Sync {
    fn init(&self) -> Result<(), String>;
    fn close(&self);
    fn get_data(&self, with_transport: bool) -> Option<JackData>;
    fn get_buffer_size(&self) -> u32;
    fn set_buffer_size(&self, size: u32) -> bool;
    fn get_sample_rate(&self) -> u32;
    fn get_port_alias(&self, port: &str) -> Option<String>;
    fn get_hardware_ports(&self, is_audio: bool, is_output: bool) -> Vec<String>;
    fn has_midi_beat_clock_sender_port(&self) -> bool;
    fn has_serial_midi_input_port(&self) -> bool;
    fn has_serial_midi_output_port(&self) -> bool;
    fn has_midi_merger_output_port(&self) -> bool;
    fn has_midi_broadcaster_input_port(&self) -> bool;
    fn has_duox_split_spdif(&self) -> bool;
    fn connect_ports(&self, port1: &str, port2: &str) -> bool;
    fn connect_midi_output_ports(&self, port: &str) -> bool;
    fn disconnect_ports(&self, port1: &str, port2: &str) -> bool;
    fn disconnect_all_ports(&self, port: &str) -> bool;
    fn reset_xruns(&self);
}

/// Deterministic stand-in: tracks a synthetic `{buffer_size, sample_rate}`
/// pair and an xrun counter, reports no hardware ports. Sufficient to
/// exercise the guard semantics and all nineteen RPCs without a real
/// JACK/pipewire binding.
pub struct NullAudioSystemProvider {
    buffer_size: AtomicU32,
    xruns: AtomicU32,
}

impl Default for NullAudioSystemProvider {
    fn default() -> Self {
        Self { buffer_size: AtomicU32::new(128), xruns: AtomicU32::new(0) }
    }
}

impl NullAudioSystemProvider {
    pub fn new() -> Self {
        Self::default()
    }

    const SAMPLE_RATE: u32 = 48_000;
}

impl AudioSystemProvider for NullAudioSystemProvider {
    fn init(&self) -> Result<(), String> {
        Ok(())
    }

    fn close(&self) {}

    fn get_data(&self, with_transport: bool) -> Option<JackData> {
        Some(JackData {
            cpu_load: 0.0,
            xruns: self.xruns.load(Ordering::Relaxed),
            rolling: with_transport,
            bpb: 4.0,
            bpm: 120.0,
        })
    }

    fn get_buffer_size(&self) -> u32 {
        self.buffer_size.load(Ordering::Relaxed)
    }

    fn set_buffer_size(&self, size: u32) -> bool {
        self.buffer_size.store(size, Ordering::Relaxed);
        true
    }

    fn get_sample_rate(&self) -> u32 {
        Self::SAMPLE_RATE
    }

    fn get_port_alias(&self, _port: &str) -> Option<String> {
        None
    }

    fn get_hardware_ports(&self, _is_audio: bool, _is_output: bool) -> Vec<String> {
        Vec::new()
    }

    fn has_midi_beat_clock_sender_port(&self) -> bool {
        false
    }

    fn has_serial_midi_input_port(&self) -> bool {
        false
    }

    fn has_serial_midi_output_port(&self) -> bool {
        false
    }

    fn has_midi_merger_output_port(&self) -> bool {
        false
    }

    fn has_midi_broadcaster_input_port(&self) -> bool {
        false
    }

    fn has_duox_split_spdif(&self) -> bool {
        false
    }

    fn connect_ports(&self, _port1: &str, _port2: &str) -> bool {
        true
    }

    fn connect_midi_output_ports(&self, _port: &str) -> bool {
        true
    }

    fn disconnect_ports(&self, _port1: &str, _port2: &str) -> bool {
        true
    }

    fn disconnect_all_ports(&self, _port: &str) -> bool {
        true
    }

    fn reset_xruns(&self) {
        self.xruns.store(0, Ordering::Relaxed);
    }
}

pub struct AudioSystemAdapter {
    provider: Box<dyn AudioSystemProvider>,
    initialized: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl AudioSystemAdapter {
    pub fn new(provider: Box<dyn AudioSystemProvider>) -> Self {
        Self { provider, initialized: AtomicBool::new(false), last_error: Mutex::new(None) }
    }

    pub fn init(&self) -> Result<(), StateError> {
        match self.provider.init() {
            Ok(()) => {
                self.initialized.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                *self.last_error.lock().unwrap() = Some(e);
                Err(StateError::NotInitialized)
            }
        }
    }

    pub fn close(&self) -> Result<(), StateError> {
        self.guard()?;
        self.provider.close();
        self.initialized.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn guard(&self) -> Result<(), StateError> {
        if self.initialized.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StateError::NotInitialized)
        }
    }

    pub fn get_data(&self, with_transport: bool) -> Result<Option<JackData>, StateError> {
        self.guard()?;
        Ok(self.provider.get_data(with_transport))
    }

    pub fn get_buffer_size(&self) -> Result<u32, StateError> {
        self.guard()?;
        Ok(self.provider.get_buffer_size())
    }

    pub fn set_buffer_size(&self, size: u32) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.set_buffer_size(size))
    }

    pub fn get_sample_rate(&self) -> Result<u32, StateError> {
        self.guard()?;
        Ok(self.provider.get_sample_rate())
    }

    pub fn get_port_alias(&self, port: &str) -> Result<Option<String>, StateError> {
        self.guard()?;
        Ok(self.provider.get_port_alias(port))
    }

    pub fn get_hardware_ports(&self, is_audio: bool, is_output: bool) -> Result<Vec<String>, StateError> {
        self.guard()?;
        Ok(self.provider.get_hardware_ports(is_audio, is_output))
    }

    pub fn has_midi_beat_clock_sender_port(&self) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.has_midi_beat_clock_sender_port())
    }

    pub fn has_serial_midi_input_port(&self) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.has_serial_midi_input_port())
    }

    pub fn has_serial_midi_output_port(&self) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.has_serial_midi_output_port())
    }

    pub fn has_midi_merger_output_port(&self) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.has_midi_merger_output_port())
    }

    pub fn has_midi_broadcaster_input_port(&self) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.has_midi_broadcaster_input_port())
    }

    pub fn has_duox_split_spdif(&self) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.has_duox_split_spdif())
    }

    pub fn connect_ports(&self, port1: &str, port2: &str) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.connect_ports(port1, port2))
    }

    pub fn connect_midi_output_ports(&self, port: &str) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.connect_midi_output_ports(port))
    }

    pub fn disconnect_ports(&self, port1: &str, port2: &str) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.disconnect_ports(port1, port2))
    }

    pub fn disconnect_all_ports(&self, port: &str) -> Result<bool, StateError> {
        self.guard()?;
        Ok(self.provider.disconnect_all_ports(port))
    }

    pub fn reset_xruns(&self) -> Result<(), StateError> {
        self.guard()?;
        self.provider.reset_xruns();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_fail_before_init() {
        let adapter = AudioSystemAdapter::new(Box::new(NullAudioSystemProvider::new()));
        assert!(matches!(adapter.get_buffer_size(), Err(StateError::NotInitialized)));
        assert!(matches!(adapter.reset_xruns(), Err(StateError::NotInitialized)));
    }

    #[test]
    fn operations_succeed_after_init() {
        let adapter = AudioSystemAdapter::new(Box::new(NullAudioSystemProvider::new()));
        adapter.init().unwrap();
        assert_eq!(adapter.get_sample_rate().unwrap(), 48_000);
        assert!(adapter.set_buffer_size(256).unwrap());
        assert_eq!(adapter.get_buffer_size().unwrap(), 256);
    }

    #[test]
    fn get_data_reflects_with_transport_flag() {
        let adapter = AudioSystemAdapter::new(Box::new(NullAudioSystemProvider::new()));
        adapter.init().unwrap();
        let data = adapter.get_data(true).unwrap().unwrap();
        assert!(data.rolling);
        let data = adapter.get_data(false).unwrap().unwrap();
        assert!(!data.rolling);
    }

    #[test]
    fn close_requires_prior_init_and_resets_guard() {
        let adapter = AudioSystemAdapter::new(Box::new(NullAudioSystemProvider::new()));
        assert!(matches!(adapter.close(), Err(StateError::NotInitialized)));
        adapter.init().unwrap();
        adapter.close().unwrap();
        assert!(matches!(adapter.get_buffer_size(), Err(StateError::NotInitialized)));
    }
}
