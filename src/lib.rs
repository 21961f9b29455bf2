//! Recovers equivalent, human-readable Lua (or a loadable Lua 5.3 `.luac`
//! image) from sources protected by the Luraph obfuscator (v11.5-v11.8.1).
//!
//! The pipeline is a small reverse-compiler: [`lexer`] tokenizes, [`parser`]
//! builds an annotated AST, [`vm`] recovers the VM handler table and decrypts
//! constants, [`reconstruct`] lifts handlers to Lua 5.3 instructions, and
//! [`emit`] writes a `.luac` image. [`orchestrator`] sequences all of it
//! behind the single [`deobfuscate`] entry point.

pub mod ast;
pub mod decrypt;
pub mod emit;
mod error;
pub mod lexer;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod reconstruct;
mod stats;
pub mod vm;

pub use error::{Error, Result};
pub use orchestrator::{deobfuscate, Options};
pub use progress::{ProgressEvent, Stage};
pub use stats::Stats;

/// What the pipeline managed to recover.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DeobfuscateOutput {
    /// Best-effort recovered Lua source, if the caller asked for it and
    /// reconstruction got far enough to render one.
    pub source_code: Option<String>,
    /// The emitted Lua 5.3 `.luac` image, if emission succeeded.
    pub bytecode: Option<Vec<u8>>,
    pub stats: Stats,
}
