use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure mode the pipeline can produce is one of these five,
/// nothing else. See the crate docs on [`crate::orchestrator`] for the
/// propagation rule (lex/parse errors are fatal; per-handler analyzer and
/// reconstructor failures downgrade to a warning instead of reaching here).
#[derive(Debug, Error)]
pub enum Error {
    /// The input parses as Lua but doesn't look like Luraph output.
    #[error("input does not look like Luraph-obfuscated Lua")]
    NotLuraph,

    /// The lexer/parser could not recover from a syntax error.
    #[error("invalid Lua at {line}:{col}: {msg}")]
    InvalidLua { line: u32, col: u32, msg: String },

    /// Every decryption algorithm scored at or below zero for a majority of
    /// the encrypted constants.
    #[error("decryption failed for {failed}/{total} constants")]
    DecryptionFailed { failed: usize, total: usize },

    /// The caller set the cancellation flag; not a correctness failure.
    #[error("cancelled")]
    Cancelled,

    /// The emitted bytes failed the header round-trip check.
    #[error("bytecode emission failed: {msg}")]
    EmitFailed { msg: String },
}
