//! VM analysis: turns a parsed `Ast` plus the raw source text into handler
//! opcodes, a flattened constant pool, and the resolved encryption key —
//! everything the reconstructor needs, bundled per invocation.

mod constants;
mod encryption;
mod handlers;
mod inference;
mod opcode;
mod render;
mod stats;
mod symbolic;
mod types;

pub use constants::{extract_constants, DecryptReport};
pub use encryption::{discover as discover_encryption, has_encrypted_strings};
pub use handlers::extract_handlers;
pub use inference::{infer_opcode, CascadeRule};
pub use opcode::{OpCode, OpMode};
pub use render::{render_block, render_expr};
pub use stats::AnalyzerStats;
pub use types::{ConstantValue, LuaNumber, VMConstant, VMHandler, VMInstruction};

use crate::ast::Ast;
use crate::decrypt::{EncryptionInfo, Method};

/// What the caller already knows going in: a forced method/key (from CLI
/// flags) short-circuits the auto-detection scan.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub method: Method,
    pub key: Option<Vec<u8>>,
}

/// Everything recovered from one source file: handlers with inferred
/// opcodes, the flattened constant pool, and the session's decryption
/// parameters (`None` when nothing looked encrypted).
#[derive(Debug, Clone)]
pub struct VmContext {
    pub handlers: Vec<VMHandler>,
    pub constants: Vec<VMConstant>,
    pub encryption: Option<EncryptionInfo>,
    pub stats: AnalyzerStats,
    pub decrypt_report: DecryptReport,
}

pub fn analyze(source: &str, ast: &Ast, options: AnalyzeOptions) -> VmContext {
    let encryption = match options.key {
        Some(key) => Some(EncryptionInfo {
            method: options.method,
            key,
            iv: None,
            version: None,
        }),
        None if has_encrypted_strings(ast) => discover_encryption(source, options.method),
        None => None,
    };

    let (handlers, stats) = extract_handlers(ast);
    let (constants, decrypt_report) = extract_constants(ast, encryption.as_ref());

    VmContext {
        handlers,
        constants,
        encryption,
        stats,
        decrypt_report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    #[test]
    fn analyze_finds_handlers_and_constants() {
        let src = r#"
            local K = {1, 2, 3, 4, 5, 6}
            function handler_1(a, b) R[0] = R[1] end
        "#;
        let (tokens, _) = tokenize(src.as_bytes());
        let (ast, _, _) = parse(&tokens);
        let ctx = analyze(src, &ast, AnalyzeOptions::default());
        assert_eq!(ctx.handlers.len(), 1);
        assert_eq!(ctx.handlers[0].index, 1);
        assert_eq!(ctx.constants.len(), 6);
        assert!(ctx.encryption.is_none());
    }

    #[test]
    fn analyze_discovers_key_only_when_something_is_encrypted() {
        let src = r#"local key = "this_is_a_long_enough_key""#;
        let (tokens, _) = tokenize(src.as_bytes());
        let (ast, _, _) = parse(&tokens);
        let ctx = analyze(src, &ast, AnalyzeOptions::default());
        assert!(ctx.encryption.is_none());
    }
}
