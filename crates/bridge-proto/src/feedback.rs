//! FeedbackEvent taxonomy and the line parser that produces it.
//!
//! `FeedbackParser::parse` is a pure function: one NUL-stripped record in,
//! one tagged event out. It never panics — anything it cannot make sense
//! of becomes `FeedbackEvent::Unknown` with the original line preserved.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FeedbackEvent {
    ParamSet {
        effect_id: u32,
        symbol: String,
        value: f64,
    },
    AudioMonitor {
        index: u32,
        value: f64,
    },
    OutputSet {
        effect_id: u32,
        symbol: String,
        value: f64,
    },
    MidiMapped {
        effect_id: u32,
        symbol: String,
        channel: u32,
        controller: u32,
    },
    MidiControlChange {
        channel: u32,
        control: u32,
        value: u32,
    },
    MidiProgramChange {
        program: u32,
        channel: u32,
    },
    Transport {
        rolling: bool,
        bpb: f64,
        bpm: f64,
    },
    PatchSet {
        instance: u32,
        symbol: String,
        value: Value,
    },
    Log {
        level: u32,
        message: String,
    },
    CpuLoad {
        load: f64,
        max_load: f64,
        xruns: u32,
    },
    DataFinish,
    CcMap {
        raw: String,
    },
    Unknown {
        raw: String,
    },
}

impl FeedbackEvent {
    /// The `type` string used in the PUB envelope (see bridge-proto::event).
    pub fn type_tag(&self) -> &'static str {
        match self {
            FeedbackEvent::ParamSet { .. } => "param_set",
            FeedbackEvent::AudioMonitor { .. } => "audio_monitor",
            FeedbackEvent::OutputSet { .. } => "output_set",
            FeedbackEvent::MidiMapped { .. } => "midi_mapped",
            FeedbackEvent::MidiControlChange { .. } => "midi_control_change",
            FeedbackEvent::MidiProgramChange { .. } => "midi_program_change",
            FeedbackEvent::Transport { .. } => "transport",
            FeedbackEvent::PatchSet { .. } => "patch_set",
            FeedbackEvent::Log { .. } => "log",
            FeedbackEvent::CpuLoad { .. } => "cpu_load",
            FeedbackEvent::DataFinish => "data_finish",
            FeedbackEvent::CcMap { .. } => "cc_map",
            FeedbackEvent::Unknown { .. } => "unknown",
        }
    }
}

/// Pure line -> event parser. No allocation-free guarantees are made; this
/// is not on mod-host's real-time path.
pub struct FeedbackParser;

impl FeedbackParser {
    pub fn parse(line: &str) -> FeedbackEvent {
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            return FeedbackEvent::Unknown { raw: line.to_string() };
        };

        match first {
            "param_set" => Self::parse_param_like(line, tokens, Variant::Param),
            "output_set" => Self::parse_param_like(line, tokens, Variant::Output),
            "audio_monitor" => Self::parse_audio_monitor(line, tokens),
            "midi_mapped" => Self::parse_midi_mapped(line, tokens),
            "midi_control_change" => Self::parse_midi_cc(line, tokens),
            "midi_program_change" => Self::parse_midi_pc(line, tokens),
            "transport" => Self::parse_transport(line, tokens),
            "patch_set" => Self::parse_patch_set(line),
            "log" => Self::parse_log(line),
            "cpu_load" => Self::parse_cpu_load(line, tokens),
            "data_finish" => FeedbackEvent::DataFinish,
            "cc_map" => FeedbackEvent::CcMap {
                raw: rest_of_line(line, "cc_map"),
            },
            _ => FeedbackEvent::Unknown { raw: line.to_string() },
        }
    }

    /// Inverse of `parse`, used only by tests to exercise the parser
    /// idempotence law. Never called on the runtime feedback path.
    pub fn to_wire(event: &FeedbackEvent) -> String {
        match event {
            FeedbackEvent::ParamSet { effect_id, symbol, value } => {
                format!("param_set {effect_id} {symbol} {value}")
            }
            FeedbackEvent::OutputSet { effect_id, symbol, value } => {
                format!("output_set {effect_id} {symbol} {value}")
            }
            FeedbackEvent::AudioMonitor { index, value } => {
                format!("audio_monitor {index} {value}")
            }
            FeedbackEvent::MidiMapped { effect_id, symbol, channel, controller } => {
                format!("midi_mapped {effect_id} {symbol} {channel} {controller}")
            }
            FeedbackEvent::MidiControlChange { channel, control, value } => {
                format!("midi_control_change {channel} {control} {value}")
            }
            FeedbackEvent::MidiProgramChange { program, channel } => {
                format!("midi_program_change {program} {channel}")
            }
            FeedbackEvent::Transport { rolling, bpb, bpm } => {
                format!("transport {rolling} {bpb} {bpm}")
            }
            FeedbackEvent::PatchSet { instance, symbol, value } => {
                format!("patch_set {instance} {symbol} {value}")
            }
            FeedbackEvent::Log { level, message } => format!("log {level} {message}"),
            FeedbackEvent::CpuLoad { load, max_load, xruns } => {
                format!("cpu_load {load} {max_load} {xruns}")
            }
            FeedbackEvent::DataFinish => "data_finish".to_string(),
            FeedbackEvent::CcMap { raw } => format!("cc_map {raw}"),
            FeedbackEvent::Unknown { raw } => raw.clone(),
        }
    }

    fn parse_param_like<'a>(
        line: &str,
        mut tokens: impl Iterator<Item = &'a str>,
        variant: Variant,
    ) -> FeedbackEvent {
        let fallback = || FeedbackEvent::Unknown { raw: line.to_string() };
        let Some(effect_id) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(symbol) = tokens.next() else {
            return fallback();
        };
        let Some(value) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        if tokens.next().is_some() {
            return fallback();
        }
        match variant {
            Variant::Param => FeedbackEvent::ParamSet {
                effect_id,
                symbol: symbol.to_string(),
                value,
            },
            Variant::Output => FeedbackEvent::OutputSet {
                effect_id,
                symbol: symbol.to_string(),
                value,
            },
        }
    }

    fn parse_audio_monitor<'a>(
        line: &str,
        mut tokens: impl Iterator<Item = &'a str>,
    ) -> FeedbackEvent {
        let fallback = || FeedbackEvent::Unknown { raw: line.to_string() };
        let Some(index) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(value) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        if tokens.next().is_some() {
            return fallback();
        }
        FeedbackEvent::AudioMonitor { index, value }
    }

    fn parse_midi_mapped<'a>(
        line: &str,
        mut tokens: impl Iterator<Item = &'a str>,
    ) -> FeedbackEvent {
        let fallback = || FeedbackEvent::Unknown { raw: line.to_string() };
        let Some(effect_id) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(symbol) = tokens.next() else {
            return fallback();
        };
        let Some(channel) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(controller) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        if tokens.next().is_some() {
            return fallback();
        }
        FeedbackEvent::MidiMapped {
            effect_id,
            symbol: symbol.to_string(),
            channel,
            controller,
        }
    }

    fn parse_midi_cc<'a>(line: &str, mut tokens: impl Iterator<Item = &'a str>) -> FeedbackEvent {
        let fallback = || FeedbackEvent::Unknown { raw: line.to_string() };
        let Some(channel) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(control) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(value) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        if tokens.next().is_some() {
            return fallback();
        }
        FeedbackEvent::MidiControlChange { channel, control, value }
    }

    fn parse_midi_pc<'a>(line: &str, mut tokens: impl Iterator<Item = &'a str>) -> FeedbackEvent {
        let fallback = || FeedbackEvent::Unknown { raw: line.to_string() };
        let Some(program) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(channel) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        if tokens.next().is_some() {
            return fallback();
        }
        FeedbackEvent::MidiProgramChange { program, channel }
    }

    fn parse_transport<'a>(line: &str, mut tokens: impl Iterator<Item = &'a str>) -> FeedbackEvent {
        let fallback = || FeedbackEvent::Unknown { raw: line.to_string() };
        let Some(rolling) = tokens.next().and_then(parse_bool) else {
            return fallback();
        };
        let Some(bpb) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(bpm) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        if tokens.next().is_some() {
            return fallback();
        }
        FeedbackEvent::Transport { rolling, bpb, bpm }
    }

    fn parse_patch_set(line: &str) -> FeedbackEvent {
        let fallback = || FeedbackEvent::Unknown { raw: line.to_string() };
        let mut parts = line.splitn(4, char::is_whitespace);
        let _tag = parts.next();
        let Some(instance) = parts.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(symbol) = parts.next() else {
            return fallback();
        };
        let Some(rest) = parts.next() else {
            return fallback();
        };
        let Ok(value) = serde_json::from_str::<Value>(rest.trim()) else {
            return fallback();
        };
        FeedbackEvent::PatchSet {
            instance,
            symbol: symbol.to_string(),
            value,
        }
    }

    fn parse_log(line: &str) -> FeedbackEvent {
        let fallback = || FeedbackEvent::Unknown { raw: line.to_string() };
        let mut parts = line.splitn(3, char::is_whitespace);
        let _tag = parts.next();
        let Some(level) = parts.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let message = parts.next().unwrap_or("").to_string();
        FeedbackEvent::Log { level, message }
    }

    fn parse_cpu_load<'a>(line: &str, mut tokens: impl Iterator<Item = &'a str>) -> FeedbackEvent {
        let fallback = || FeedbackEvent::Unknown { raw: line.to_string() };
        let Some(load) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(max_load) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        let Some(xruns) = tokens.next().and_then(|t| t.parse().ok()) else {
            return fallback();
        };
        if tokens.next().is_some() {
            return fallback();
        }
        FeedbackEvent::CpuLoad { load, max_load, xruns }
    }
}

enum Variant {
    Param,
    Output,
}

fn parse_bool(token: &str) -> Option<bool> {
    match token {
        "1" | "true" | "True" => Some(true),
        "0" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn rest_of_line(line: &str, tag: &str) -> String {
    line.strip_prefix(tag)
        .map(|s| s.trim_start().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_param_set() {
        let event = FeedbackParser::parse("param_set 3 gain 0.75");
        assert_eq!(
            event,
            FeedbackEvent::ParamSet {
                effect_id: 3,
                symbol: "gain".into(),
                value: 0.75
            }
        );
    }

    #[test]
    fn parses_audio_monitor() {
        let event = FeedbackParser::parse("audio_monitor 1 -12.5");
        assert_eq!(event, FeedbackEvent::AudioMonitor { index: 1, value: -12.5 });
    }

    #[test]
    fn parses_transport() {
        let event = FeedbackParser::parse("transport 1 4.0 120.5");
        assert_eq!(
            event,
            FeedbackEvent::Transport { rolling: true, bpb: 4.0, bpm: 120.5 }
        );
    }

    #[test]
    fn parses_patch_set_with_json_tail() {
        let event = FeedbackParser::parse(r#"patch_set 2 preset {"a":1}"#);
        assert_eq!(
            event,
            FeedbackEvent::PatchSet {
                instance: 2,
                symbol: "preset".into(),
                value: serde_json::json!({"a": 1}),
            }
        );
    }

    #[test]
    fn parses_log_with_spaces_in_message() {
        let event = FeedbackParser::parse("log 2 something went wrong here");
        assert_eq!(
            event,
            FeedbackEvent::Log {
                level: 2,
                message: "something went wrong here".into()
            }
        );
    }

    #[test]
    fn parses_cpu_load() {
        let event = FeedbackParser::parse("cpu_load 12.5 100.0 3");
        assert_eq!(
            event,
            FeedbackEvent::CpuLoad { load: 12.5, max_load: 100.0, xruns: 3 }
        );
    }

    #[test]
    fn parses_data_finish() {
        assert_eq!(FeedbackParser::parse("data_finish"), FeedbackEvent::DataFinish);
    }

    #[test]
    fn malformed_line_falls_through_to_unknown() {
        let event = FeedbackParser::parse("foo bar baz");
        assert_eq!(event, FeedbackEvent::Unknown { raw: "foo bar baz".into() });
    }

    #[test]
    fn wrong_arity_falls_through_to_unknown() {
        // param_set is missing its value field
        let event = FeedbackParser::parse("param_set 3 gain");
        assert_eq!(
            event,
            FeedbackEvent::Unknown { raw: "param_set 3 gain".into() }
        );
    }

    #[test]
    fn non_numeric_where_numeric_expected_falls_through() {
        let event = FeedbackParser::parse("param_set abc gain 1.0");
        assert!(matches!(event, FeedbackEvent::Unknown { .. }));
    }

    #[test]
    fn parser_never_panics_on_empty_line() {
        let event = FeedbackParser::parse("");
        assert_eq!(event, FeedbackEvent::Unknown { raw: String::new() });
    }

    #[test]
    fn parser_idempotence_round_trip() {
        let cases = [
            "param_set 3 gain 0.75",
            "output_set 3 gain 0.75",
            "audio_monitor 1 -12.5",
            "midi_mapped 3 gain 0 7",
            "midi_control_change 0 7 100",
            "midi_program_change 5 0",
            "transport 0 4.0 120.0",
            "cpu_load 1.0 2.0 0",
            "data_finish",
        ];
        for line in cases {
            let event = FeedbackParser::parse(line);
            let wire = FeedbackParser::to_wire(&event);
            let reparsed = FeedbackParser::parse(&wire);
            assert_eq!(event, reparsed, "line {line:?} did not round-trip");
        }
    }
}
