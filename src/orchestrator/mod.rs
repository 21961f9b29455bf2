//! Sequences the whole recovery pipeline behind one entry point:
//! lex -> parse -> admission gate -> VM analysis -> reconstruction -> emit
//! -> validate. Every stage boundary fires a [`ProgressEvent`]; the caller
//! decides what, if anything, to do with it.

mod gate;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info_span;

use crate::decrypt::{LuraphVersion, Method};
use crate::emit;
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::progress::{ProgressEvent, Stage};
use crate::reconstruct::reconstruct;
use crate::vm::{self, AnalyzeOptions};
use crate::{DeobfuscateOutput, Error, Result, Stats};

/// Caller-supplied knobs. Everything defaults to "figure it out
/// automatically" except `emit_source`, which defaults to off since
/// rendering readable Lua back out is more expensive than just emitting
/// bytecode.
#[derive(Clone, Default)]
pub struct Options {
    pub method: Method,
    pub key: Option<Vec<u8>>,
    pub iv: Option<Vec<u8>>,
    pub version: Option<LuraphVersion>,
    pub cancel: Option<Arc<AtomicBool>>,
    pub emit_source: bool,
}

/// Recovers Lua 5.3 bytecode (and, if asked, a best-effort readable source
/// rendering) from one Luraph-obfuscated source file.
///
/// `progress` is called synchronously, once per completed stage, from this
/// thread. `options.cancel` is polled between stages; when set, the call
/// returns `Error::Cancelled` without reaching emission.
pub fn deobfuscate(
    source: &[u8],
    options: Options,
    mut progress: impl FnMut(ProgressEvent),
) -> Result<DeobfuscateOutput> {
    let mut stats = Stats::default();

    check_cancelled(&options)?;
    let (tokens, lexer_stats) = info_span!("lex").in_scope(|| tokenize(source));
    tracing::debug!(unknown_fraction = lexer_stats.unknown_fraction(), "lexed");
    progress(ProgressEvent::new(Stage::Lex));

    let source_text = String::from_utf8_lossy(source).into_owned();

    check_cancelled(&options)?;
    let (ast, parse_errors, _parser_stats) = info_span!("parse").in_scope(|| parse(&tokens));
    if let Some(err) = parse_errors.iter().find(|e| e.fatal) {
        return Err(Error::InvalidLua {
            line: err.at.line,
            col: err.at.start,
            msg: err.expected.clone(),
        });
    }
    for err in &parse_errors {
        stats.warn(format!("{err}"));
    }
    progress(ProgressEvent::new(Stage::Parse));

    check_cancelled(&options)?;
    if !info_span!("detect_vm").in_scope(|| gate::looks_like_luraph(&source_text, &tokens, &ast)) {
        return Err(Error::NotLuraph);
    }
    progress(ProgressEvent::new(Stage::DetectVm));

    check_cancelled(&options)?;
    let method = options
        .version
        .map(LuraphVersion::default_method)
        .unwrap_or(options.method);
    let analyze_options = AnalyzeOptions {
        method,
        key: options.key.clone(),
    };
    let ctx = info_span!("analyze")
        .in_scope(|| vm::analyze(&source_text, &ast, analyze_options));
    progress(ProgressEvent::new(Stage::FindEncryption));

    check_cancelled(&options)?;
    apply_decrypt_report(&ctx, &mut stats)?;
    progress(ProgressEvent::new(Stage::Decrypt));

    // No dedicated anti-decompile-stripping pass exists yet; the peephole
    // dead-code pass in `reconstruct` already removes the unreachable junk
    // blocks Luraph inserts, so this stage is a pass-through marker kept
    // for wire/progress-event compatibility.
    check_cancelled(&options)?;
    progress(ProgressEvent::new(Stage::StripAntiDecompile));

    check_cancelled(&options)?;
    let proto =
        info_span!("reconstruct").in_scope(|| reconstruct(&ctx, "chunk", &mut stats));
    progress(ProgressEvent::new(Stage::Optimize));

    check_cancelled(&options)?;
    let bytecode = info_span!("emit").in_scope(|| emit::emit(&proto));
    emit::validate(&bytecode)?;
    progress(ProgressEvent::new(Stage::Emit));

    stats.constants_decrypted = ctx.decrypt_report.encrypted_total - ctx.decrypt_report.failed.len();

    let source_code = if options.emit_source {
        Some(render_source(&proto))
    } else {
        None
    };

    Ok(DeobfuscateOutput {
        source_code,
        bytecode: Some(bytecode),
        stats,
    })
}

fn check_cancelled(options: &Options) -> Result<()> {
    if options
        .cancel
        .as_ref()
        .map(|c| c.load(Ordering::Relaxed))
        .unwrap_or(false)
    {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Applies the "fatal at >=50% failure, else a per-constant warning" rule
/// recorded during analysis. A badly-keyed XOR-family decryption never sets
/// `DecryptOutcome.ok = false` (those methods are self-inverse and always
/// "succeed"), so it only ever shows up as a low-scoring `auto` guess in
/// `low_confidence`, not `failed` — both count toward the fatal threshold,
/// since a session where every string plausibly decrypted to noise is as
/// unusable as one where decryption outright errored.
fn apply_decrypt_report(ctx: &vm::VmContext, stats: &mut Stats) -> Result<()> {
    let report = &ctx.decrypt_report;
    if report.encrypted_total == 0 {
        return Ok(());
    }
    let bad = report.failed.len() + report.low_confidence.len();
    let failure_rate = bad as f64 / report.encrypted_total as f64;
    if failure_rate >= 0.5 {
        return Err(Error::DecryptionFailed {
            failed: bad,
            total: report.encrypted_total,
        });
    }
    for idx in &report.failed {
        stats.warn(format!("constant #{idx}: decryption failed, kept ciphertext"));
    }
    for idx in &report.low_confidence {
        stats.warn(format!(
            "constant #{idx}: auto-detected decryption method scored low, plaintext may be wrong"
        ));
    }
    Ok(())
}

/// A minimal, best-effort `R[a], K[b]`-style rendering of the recovered
/// instruction stream. Not a full Lua 5.3 decompiler; good enough for a
/// human to eyeball what each handler turned into.
fn render_source(proto: &crate::reconstruct::VMProto) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    let _ = writeln!(out, "-- recovered from {}", proto.source);
    for (pc, instr) in proto.code.iter().enumerate() {
        let _ = writeln!(out, "[{pc}] {:?} a={} b={} c={}", instr.opcode, instr.a, instr.b, instr.c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Result<DeobfuscateOutput> {
        deobfuscate(src.as_bytes(), Options::default(), |_| {})
    }

    #[test]
    fn rejects_plain_lua() {
        let err = run("print(\"hello\")\n").unwrap_err();
        assert!(matches!(err, Error::NotLuraph));
    }

    #[test]
    fn recovers_a_trivial_move_handler() {
        let src = "function handler_0(a, b) R[0] = R[1] end\n";
        let out = run(src).unwrap();
        assert_eq!(out.stats.handlers_processed, 1);
        assert!(out.bytecode.is_some());
    }

    #[test]
    fn cancellation_short_circuits_before_emit() {
        let flag = Arc::new(AtomicBool::new(true));
        let options = Options {
            cancel: Some(flag),
            ..Options::default()
        };
        let err = deobfuscate(b"function handler_0() R[0] = R[1] end\n", options, |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn emits_readable_source_when_asked() {
        let src = "function handler_0(a, b) R[0] = R[1] end\n";
        let options = Options {
            emit_source: true,
            ..Options::default()
        };
        let out = deobfuscate(src.as_bytes(), options, |_| {}).unwrap();
        assert!(out.source_code.unwrap().contains("Move"));
    }

    fn ctx_with_report(report: vm::DecryptReport) -> vm::VmContext {
        vm::VmContext {
            handlers: vec![],
            constants: vec![],
            encryption: None,
            stats: vm::AnalyzerStats::default(),
            decrypt_report: report,
        }
    }

    #[test]
    fn low_confidence_constants_count_toward_the_fatal_threshold() {
        let mut stats = Stats::default();
        let ctx = ctx_with_report(vm::DecryptReport {
            encrypted_total: 2,
            failed: vec![],
            low_confidence: vec![0, 1],
        });
        let err = apply_decrypt_report(&ctx, &mut stats).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed { failed: 2, total: 2 }));
    }

    #[test]
    fn a_minority_of_low_confidence_constants_just_warns() {
        let mut stats = Stats::default();
        let ctx = ctx_with_report(vm::DecryptReport {
            encrypted_total: 5,
            failed: vec![],
            low_confidence: vec![2],
        });
        apply_decrypt_report(&ctx, &mut stats).unwrap();
        assert_eq!(stats.warnings.len(), 1);
        assert!(stats.warnings[0].contains("scored low"));
    }
}
