//! Lifts one handler to its instruction(s). The primary path re-runs the
//! same bounded symbolic executor the Analyzer's opcode-inference cascade
//! uses (`vm::symbolic::run`) over the handler's rendered body; a regex
//! pass over that same string (the `R[_]`/`K[_]` vocabulary the analyzer's
//! body-pattern rule matches) is the explicit, documented fallback for
//! bodies the interpreter can't walk; a plain `MOVE 0 0 0` nop covers
//! whatever neither path resolves. See `vm::render` for how the body
//! arrives as a string at this stage.

use crate::lexer::tokenize;
use crate::parser::parse;
use crate::vm::symbolic::{run as symbolic_run, Effect, SymbolicOptions};
use crate::vm::{OpCode, VMHandler, VMInstruction};
use regex::Regex;
use smallvec::{smallvec, SmallVec};

fn move_re() -> Regex {
    Regex::new(r"R\[(\d+)\]\s*=\s*R\[(\d+)\]\s*(?:;|$)").unwrap()
}
fn loadk_re() -> Regex {
    Regex::new(r"R\[(\d+)\]\s*=\s*K\[(\d+)\]").unwrap()
}
fn arith_re() -> Regex {
    Regex::new(r"R\[(\d+)\]\s*=\s*R\[(\d+)\]\s*(\+|-|\*|/|%|\^|\.\.)\s*R\[(\d+)\]").unwrap()
}
fn call_re() -> Regex {
    Regex::new(r"\w+\(((?:[^()]*))\)").unwrap()
}
fn return_re() -> Regex {
    Regex::new(r"^return\b|;\s*return\b").unwrap()
}

fn arith_opcode(sym: &str) -> Option<OpCode> {
    Some(match sym {
        "+" => OpCode::Add,
        "-" => OpCode::Sub,
        "*" => OpCode::Mul,
        "/" => OpCode::Div,
        "%" => OpCode::Mod,
        "^" => OpCode::Pow,
        ".." => OpCode::Concat,
        _ => return None,
    })
}

/// Recovers `{opcode, a, b, c}` from a handler's serialized body by regex,
/// the vocabulary matching the analyzer's body-pattern rule exactly.
fn pattern_match(code: &str) -> Option<(OpCode, i32, i32, i32)> {
    if let Some(caps) = arith_re().captures(code) {
        let a: i32 = caps[1].parse().ok()?;
        let b: i32 = caps[2].parse().ok()?;
        let op = arith_opcode(&caps[3])?;
        let c: i32 = caps[4].parse().ok()?;
        return Some((op, a, b, c));
    }
    if let Some(caps) = move_re().captures(code) {
        let a: i32 = caps[1].parse().ok()?;
        let b: i32 = caps[2].parse().ok()?;
        return Some((OpCode::Move, a, b, 0));
    }
    if let Some(caps) = loadk_re().captures(code) {
        let a: i32 = caps[1].parse().ok()?;
        let b: i32 = caps[2].parse().ok()?;
        return Some((OpCode::LoadK, a, b, 0));
    }
    if let Some(caps) = call_re().captures(code) {
        let args = caps[1].trim();
        let arg_count = if args.is_empty() {
            0
        } else {
            args.split(',').count()
        };
        return Some((OpCode::Call, 0, (arg_count + 1) as i32, 2));
    }
    if return_re().is_match(code) {
        return Some((OpCode::Return, 0, 1, 0));
    }
    None
}

/// Maps a symbolically-recognized effect to the same `(opcode, a, b, c)`
/// shape `pattern_match` returns, so both paths feed the same assembly step.
/// `Call`/`Return`/`Jmp` carry no operand detail from the interpreter (it
/// only tracks `R[_]`/`K[_]` indices), so those defer to the regex pass,
/// which recovers a call's argument count from the source text itself.
fn effect_operands(effect: Effect) -> Option<(OpCode, i32, i32, i32)> {
    match effect {
        Effect::Move { dst, src } => Some((OpCode::Move, dst as i32, src as i32, 0)),
        Effect::LoadK { dst, k } => Some((OpCode::LoadK, dst as i32, k as i32, 0)),
        Effect::Arith { op, dst, lhs, rhs } => Some((op, dst as i32, lhs as i32, rhs as i32)),
        Effect::Call | Effect::Return | Effect::Jmp => None,
    }
}

/// Re-parses a handler body's rendered string back into statements and runs
/// the bounded symbolic executor over it, keeping its last completed effect.
/// Bodies that don't even re-parse (already-corrupted or partial text) fall
/// through to the regex pass instead.
fn symbolic_resolve(code: &str) -> Option<(OpCode, i32, i32, i32)> {
    let (tokens, _) = tokenize(code.as_bytes());
    let (ast, errors, _) = parse(&tokens);
    if errors.iter().any(|e| e.fatal) {
        return None;
    }
    let result = symbolic_run(&ast.body, SymbolicOptions::default());
    result.effects.last().copied().and_then(effect_operands)
}

/// Lifts one handler to its instruction sequence. Kept as a `SmallVec`
/// rather than a single `VMInstruction` since some Luraph VMs emit more
/// than one bytecode per handler (macro ops); every rule below still
/// produces exactly one.
pub fn lift_handler(handler: &VMHandler) -> SmallVec<[VMInstruction; 1]> {
    let code = handler
        .decrypted_code
        .as_deref()
        .unwrap_or(&handler.body_code);

    let resolved = symbolic_resolve(code).or_else(|| pattern_match(code));

    match resolved {
        Some((OpCode::LoadK, a, b, _)) => {
            smallvec![VMInstruction::abx(OpCode::LoadK, a, b as u32, handler.index)]
        }
        Some((op, a, b, c)) => smallvec![VMInstruction::abc(op, a, b, c, handler.index)],
        None => smallvec![VMInstruction::nop(handler.index)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(body_code: &str, index: u32) -> VMHandler {
        VMHandler {
            index,
            opcode: None,
            body_code: body_code.to_string(),
            encrypted: false,
            decrypted_code: None,
        }
    }

    #[test]
    fn lifts_move() {
        let h = handler("R[0] = R[1]", 0);
        let lifted = lift_handler(&h);
        assert_eq!(lifted.len(), 1);
        assert_eq!(lifted[0].opcode, OpCode::Move);
        assert_eq!((lifted[0].a, lifted[0].b, lifted[0].c), (0, 1, 0));
    }

    #[test]
    fn lifts_loadk() {
        let h = handler("R[0] = K[2]", 1);
        let lifted = lift_handler(&h);
        assert_eq!(lifted[0].opcode, OpCode::LoadK);
        assert_eq!(lifted[0].a, 0);
        assert_eq!(lifted[0].bx, Some(2));
    }

    #[test]
    fn lifts_arithmetic() {
        let h = handler("R[0] = R[1] + R[2]", 2);
        let lifted = lift_handler(&h);
        assert_eq!(lifted[0].opcode, OpCode::Add);
        assert_eq!((lifted[0].a, lifted[0].b, lifted[0].c), (0, 1, 2));
    }

    #[test]
    fn falls_back_to_nop_when_unrecognized() {
        let h = handler("local unrelated = 1", 3);
        let lifted = lift_handler(&h);
        assert_eq!(lifted[0].opcode, OpCode::Move);
        assert_eq!((lifted[0].a, lifted[0].b, lifted[0].c), (0, 0, 0));
    }

    #[test]
    fn lifts_call() {
        let h = handler("vm_dispatch(R[0], R[1])", 4);
        let lifted = lift_handler(&h);
        assert_eq!(lifted[0].opcode, OpCode::Call);
        assert_eq!(lifted[0].b, 3);
    }

    #[test]
    fn lifts_return() {
        let h = handler("return R[0]", 5);
        let lifted = lift_handler(&h);
        assert_eq!(lifted[0].opcode, OpCode::Return);
    }

    #[test]
    fn unresolvable_body_never_fabricates_zero_operands_from_handler_opcode() {
        let mut h = handler("this is not lua (((", 6);
        h.opcode = Some(OpCode::Add);
        let lifted = lift_handler(&h);
        assert_eq!(lifted[0], VMInstruction::nop(6));
    }

    #[test]
    fn symbolic_execution_resolves_bodies_the_regex_pass_would_miss() {
        let h = handler("R[0] = R[1] -- trailing commentary the regex anchor rejects", 7);
        let lifted = lift_handler(&h);
        assert_eq!(lifted[0].opcode, OpCode::Move);
        assert_eq!((lifted[0].a, lifted[0].b, lifted[0].c), (0, 1, 0));
    }
}
