//! Progress events posted at each pipeline stage boundary. The core never
//! touches a UI; it calls a caller-supplied sink synchronously from the
//! computing thread. Hosts that need a UI thread must trampoline the event
//! themselves.

use std::fmt;

/// The eight stages the orchestrator walks through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    DetectVm,
    FindEncryption,
    Decrypt,
    StripAntiDecompile,
    Optimize,
    Emit,
}

impl Stage {
    /// The name used on the wire, e.g. for `--json` progress output.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::DetectVm => "detect_vm",
            Stage::FindEncryption => "find_encryption",
            Stage::Decrypt => "decrypt",
            Stage::StripAntiDecompile => "strip_antidecompile",
            Stage::Optimize => "optimize",
            Stage::Emit => "emit",
        }
    }

    /// Fixed stage ordering, used to compute the monotonic `fraction`.
    const ORDER: [Stage; 8] = [
        Stage::Lex,
        Stage::Parse,
        Stage::DetectVm,
        Stage::FindEncryption,
        Stage::Decrypt,
        Stage::StripAntiDecompile,
        Stage::Optimize,
        Stage::Emit,
    ];

    fn index(self) -> usize {
        Self::ORDER.iter().position(|s| *s == self).unwrap()
    }

    /// Progress fraction in `[0, 1]` for having just completed this stage.
    pub fn fraction(self) -> f64 {
        (self.index() + 1) as f64 / Self::ORDER.len() as f64
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Emitted once per completed stage.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ProgressEvent {
    #[serde(serialize_with = "serialize_stage")]
    pub step: Stage,
    pub fraction: f64,
}

fn serialize_stage<S: serde::Serializer>(stage: &Stage, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(stage.name())
}

impl ProgressEvent {
    pub fn new(step: Stage) -> Self {
        ProgressEvent {
            step,
            fraction: step.fraction(),
        }
    }
}

/// A caller-supplied progress sink, invoked synchronously from the
/// computing thread at each stage boundary.
pub type ProgressSink<'a> = dyn FnMut(ProgressEvent) + 'a;
