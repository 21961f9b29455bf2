//! Opcode inference cascade: name heuristics, then a body-pattern match,
//! then a symbolic-execution fallback. Each rule that fires is tallied in
//! `AnalyzerStats` so a caller can see how much was guessed versus derived.

use crate::ast::{BinOp, Block, ExprKind, StmtKind};
use crate::vm::opcode::OpCode;
use crate::vm::symbolic::{self, SymbolicOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeRule {
    Name,
    Body,
    Symbolic,
}

/// Substring match against a lowercased handler name, in priority order.
const NAME_RULES: &[(&[&str], OpCode)] = &[
    (&["move", "copy"], OpCode::Move),
    (&["loadk", "load_const", "loadconst"], OpCode::LoadK),
    (&["loadbool", "load_bool"], OpCode::LoadBool),
    (&["loadnil", "load_nil"], OpCode::LoadNil),
    (&["newtable", "new_table"], OpCode::NewTable),
    (&["gettable", "get_table"], OpCode::GetTable),
    (&["settable", "set_table"], OpCode::SetTable),
    (&["concat"], OpCode::Concat),
    (&["return"], OpCode::Return),
    (&["jump", "jmp"], OpCode::Jmp),
    (&["call"], OpCode::Call),
    (&["add"], OpCode::Add),
    (&["sub"], OpCode::Sub),
    (&["mul"], OpCode::Mul),
    (&["div"], OpCode::Div),
    (&["mod"], OpCode::Mod),
    (&["pow"], OpCode::Pow),
];

/// Rule (a): name heuristics, tried against `name`.
pub fn infer_from_name(name: &str) -> Option<OpCode> {
    let lower = name.to_ascii_lowercase();
    NAME_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, op)| *op)
}

/// Rule (b): the handler's first statement is an `Assign` shaped like
/// `R[_] = R[_]` (a `MOVE`) or `R[_] = K[_]` (a `LOADK`).
pub fn infer_from_body_pattern(body: &Block) -> Option<OpCode> {
    let first = body.iter().find_map(|stmt| match &stmt.node {
        StmtKind::Assign {
            targets, values, ..
        } if targets.len() == 1 && values.len() == 1 => Some((&targets[0], &values[0])),
        _ => None,
    })?;
    let (target, value) = first;
    let target_base = index_base(target)?;
    if target_base != "R" {
        return None;
    }
    let value_base = index_base(value)?;
    match value_base.as_str() {
        "R" => Some(OpCode::Move),
        "K" => Some(OpCode::LoadK),
        _ => None,
    }
}

fn index_base(expr: &crate::ast::Expr) -> Option<String> {
    match &expr.node {
        ExprKind::Binary {
            op: BinOp::Index,
            lhs,
            ..
        } => match &lhs.node {
            ExprKind::Identifier { name, .. } => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Rule (c): run the bounded symbolic interpreter and read back the
/// single effect it produced, if any.
pub fn infer_from_symbolic(body: &Block) -> Option<OpCode> {
    symbolic::run(body, SymbolicOptions::default()).inferred_opcode
}

/// Runs the full cascade, returning the opcode (or `None` if nothing
/// matched) and which rule produced it.
pub fn infer_opcode(name: &str, body: &Block) -> (Option<OpCode>, Option<CascadeRule>) {
    if let Some(op) = infer_from_name(name) {
        return (Some(op), Some(CascadeRule::Name));
    }
    if let Some(op) = infer_from_body_pattern(body) {
        return (Some(op), Some(CascadeRule::Body));
    }
    if let Some(op) = infer_from_symbolic(body) {
        return (Some(op), Some(CascadeRule::Symbolic));
    }
    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rule_matches_move() {
        assert_eq!(infer_from_name("handler_move_7"), Some(OpCode::Move));
    }

    #[test]
    fn name_rule_is_case_insensitive() {
        assert_eq!(infer_from_name("HANDLER_ADD_2"), Some(OpCode::Add));
    }

    #[test]
    fn name_rule_none_for_unrelated_name() {
        assert_eq!(infer_from_name("handler_7"), None);
    }
}
