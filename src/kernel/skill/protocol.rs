//! Line protocol spoken by skill processes on stdout.
//!
//! Every line is a JSON object `{ "output": { "type": ..., ... } }`. Frames of
//! type `inter` are intermediate and spoken as they arrive; anything else is
//! the final frame, which may span several lines and is only parsed once the
//! stream ends.

use serde::{Deserialize, Serialize};
use serde_json::{Deserializer, Map, Value};

use crate::kernel::types::{value_text, CoreFlags};

const INTERMEDIATE: &str = "inter";
const END: &str = "end";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkillOutputFrame {
    pub output: SkillOutput,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkillOutput {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub speech: Option<Value>,
    #[serde(default)]
    pub core: Option<CoreFlags>,
    #[serde(default)]
    pub options: Option<SkillOptions>,
}

impl SkillOutput {
    pub fn is_intermediate(&self) -> bool {
        self.kind == INTERMEDIATE
    }

    /// Speech as text, `None` when absent or empty.
    pub fn speech_text(&self) -> Option<String> {
        match &self.speech {
            None | Some(Value::Null) => None,
            Some(value) => Some(value_text(value)).filter(|s| !s.is_empty()),
        }
    }

    /// Synchronization options of an `end` frame that asks for it.
    pub fn synchronization(&self) -> Option<&SyncOptions> {
        if self.kind != END {
            return None;
        }
        self.options
            .as_ref()?
            .synchronization
            .as_ref()
            .filter(|sync| sync.enabled)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillOptions {
    #[serde(default)]
    pub synchronization: Option<SyncOptions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    Intermediate(SkillOutput),
    /// Part of the final frame.
    Buffered,
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    NonJson,
    Malformed,
}

/// Classifies stdout lines and buffers the final frame.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    final_buffer: String,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) -> Result<LineEvent, ProtocolViolation> {
        let trimmed = line.trim();
        if self.is_open() {
            self.append(line);
            return Ok(LineEvent::Buffered);
        }
        if trimmed.is_empty() {
            return Ok(LineEvent::Blank);
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(_)) => match serde_json::from_str::<SkillOutputFrame>(trimmed) {
                Ok(frame) if frame.output.is_intermediate() => {
                    Ok(LineEvent::Intermediate(frame.output))
                }
                Ok(_) => {
                    self.append(line);
                    Ok(LineEvent::Buffered)
                }
                // An object without a readable `output` is not protocol output at all.
                Err(_) => Err(ProtocolViolation::NonJson),
            },
            Ok(_) => Err(ProtocolViolation::Malformed),
            // First line of a multi-line document.
            Err(e) if e.is_eof() && trimmed.starts_with('{') => {
                self.append(line);
                Ok(LineEvent::Buffered)
            }
            Err(_) => Err(ProtocolViolation::NonJson),
        }
    }

    /// Parses the buffered final frame. Several buffered documents settle on the last one.
    pub fn finish(self) -> Result<Option<SkillOutput>, ProtocolViolation> {
        if self.final_buffer.trim().is_empty() {
            return Ok(None);
        }

        let mut last = None;
        for document in Deserializer::from_str(&self.final_buffer).into_iter::<Value>() {
            last = Some(document.map_err(|_| ProtocolViolation::NonJson)?);
        }

        match last {
            Some(Value::Object(map)) => serde_json::from_value::<SkillOutputFrame>(Value::Object(map))
                .map(|frame| Some(frame.output))
                .map_err(|_| ProtocolViolation::NonJson),
            Some(_) => Err(ProtocolViolation::Malformed),
            None => Ok(None),
        }
    }

    fn append(&mut self, line: &str) {
        self.final_buffer.push_str(line);
        self.final_buffer.push('\n');
    }

    /// True while the buffer holds an unterminated document.
    fn is_open(&self) -> bool {
        if self.final_buffer.is_empty() {
            return false;
        }
        for document in Deserializer::from_str(&self.final_buffer).into_iter::<Value>() {
            if let Err(e) = document {
                return e.is_eof();
            }
        }
        false
    }
}
