//! Bounded symbolic execution: the last resort of the opcode-inference
//! cascade when neither the handler's name nor its first statement's shape
//! gives a direct answer. Walks the handler body step by step, tracking
//! `R[i]`/`K[i]` references, and reports the last fully-completed effect —
//! handler bodies often set up locals before their real effect, so the
//! final recognized statement is the trustworthy one, not the first.

use crate::ast::{BinOp, Block, Expr, ExprKind, Literal, StmtKind};
use crate::vm::opcode::OpCode;

#[derive(Debug, Clone, Copy)]
pub struct SymbolicOptions {
    pub max_steps: usize,
}

impl Default for SymbolicOptions {
    fn default() -> Self {
        SymbolicOptions { max_steps: 1000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Move { dst: i64, src: i64 },
    LoadK { dst: i64, k: i64 },
    Arith { op: OpCode, dst: i64, lhs: i64, rhs: i64 },
    Call,
    Return,
    Jmp,
}

impl Effect {
    pub fn opcode(self) -> OpCode {
        match self {
            Effect::Move { .. } => OpCode::Move,
            Effect::LoadK { .. } => OpCode::LoadK,
            Effect::Arith { op, .. } => op,
            Effect::Call => OpCode::Call,
            Effect::Return => OpCode::Return,
            Effect::Jmp => OpCode::Jmp,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolicResult {
    pub effects: Vec<Effect>,
    pub inferred_opcode: Option<OpCode>,
    pub steps_used: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ref {
    /// `R[i]` or `K[i]` with a literal integer index.
    Indexed(&'static str, i64),
    /// A register/constant ref whose index wasn't a literal; carried as -1
    /// per the "non-literal index" rule and never turned into an effect.
    Unresolved,
    Other,
}

fn classify_ref(expr: &Expr) -> Ref {
    match &expr.node {
        ExprKind::Binary {
            op: BinOp::Index,
            lhs,
            rhs,
        } => {
            let base = match &lhs.node {
                ExprKind::Identifier { name, .. } if name == "R" => "R",
                ExprKind::Identifier { name, .. } if name == "K" => "K",
                _ => return Ref::Other,
            };
            match &rhs.node {
                ExprKind::Literal(Literal::Int(i)) => Ref::Indexed(base, *i),
                _ => Ref::Unresolved,
            }
        }
        _ => Ref::Other,
    }
}

fn arith_opcode(op: BinOp) -> Option<OpCode> {
    Some(match op {
        BinOp::Add => OpCode::Add,
        BinOp::Sub => OpCode::Sub,
        BinOp::Mul => OpCode::Mul,
        BinOp::Div => OpCode::Div,
        BinOp::Mod => OpCode::Mod,
        BinOp::Pow => OpCode::Pow,
        BinOp::Concat => OpCode::Concat,
        _ => return None,
    })
}

/// Runs the interpreter over `body` up to `options.max_steps` statements,
/// keeping the last recognized effect rather than stopping at the first.
pub fn run(body: &Block, options: SymbolicOptions) -> SymbolicResult {
    let mut result = SymbolicResult::default();
    for stmt in body {
        if result.steps_used >= options.max_steps {
            result.truncated = true;
            break;
        }
        result.steps_used += 1;

        let effect = match &stmt.node {
            StmtKind::Assign {
                targets,
                values,
                is_local: false,
            } if targets.len() == 1 && values.len() == 1 => {
                effect_for_assign(&targets[0], &values[0])
            }
            StmtKind::ExprStmt(Expr {
                node: ExprKind::Call { .. },
                ..
            }) => Some(Effect::Call),
            StmtKind::Return(_) => Some(Effect::Return),
            StmtKind::Goto(_) => Some(Effect::Jmp),
            _ => None,
        };

        if let Some(effect) = effect {
            result.inferred_opcode = Some(effect.opcode());
            result.effects.push(effect);
        }
    }
    result
}

fn effect_for_assign(target: &Expr, value: &Expr) -> Option<Effect> {
    let Ref::Indexed("R", dst) = classify_ref(target) else {
        return None;
    };
    match classify_ref(value) {
        Ref::Indexed("R", src) => Some(Effect::Move { dst, src }),
        Ref::Indexed("K", k) => Some(Effect::LoadK { dst, k }),
        _ => {
            if let ExprKind::Binary { op, lhs, rhs } = &value.node {
                let opcode = arith_opcode(*op)?;
                let lhs_idx = match classify_ref(lhs) {
                    Ref::Indexed(_, i) => i,
                    _ => return None,
                };
                let rhs_idx = match classify_ref(rhs) {
                    Ref::Indexed(_, i) => i,
                    _ => return None,
                };
                Some(Effect::Arith {
                    op: opcode,
                    dst,
                    lhs: lhs_idx,
                    rhs: rhs_idx,
                })
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn body_of(src: &str) -> Block {
        let (tokens, _) = tokenize(src.as_bytes());
        let (ast, _, _) = parse(&tokens);
        match &ast.body[0].node {
            StmtKind::FunctionDecl { body, .. } => body.body.clone(),
            _ => panic!("expected a function declaration"),
        }
    }

    #[test]
    fn recognizes_move() {
        let body = body_of("function h(a) R[0] = R[1] end");
        let result = run(&body, SymbolicOptions::default());
        assert_eq!(result.inferred_opcode, Some(OpCode::Move));
    }

    #[test]
    fn recognizes_loadk() {
        let body = body_of("function h(a) R[0] = K[2] end");
        let result = run(&body, SymbolicOptions::default());
        assert_eq!(result.inferred_opcode, Some(OpCode::LoadK));
    }

    #[test]
    fn recognizes_arithmetic() {
        let body = body_of("function h(a) R[0] = R[1] + R[2] end");
        let result = run(&body, SymbolicOptions::default());
        assert_eq!(result.inferred_opcode, Some(OpCode::Add));
    }

    #[test]
    fn non_literal_index_is_unresolved_not_crash() {
        let body = body_of("function h(a) R[a] = R[1] end");
        let result = run(&body, SymbolicOptions::default());
        assert_eq!(result.inferred_opcode, None);
    }

    #[test]
    fn recognizes_return() {
        let body = body_of("function h(a) return a end");
        let result = run(&body, SymbolicOptions::default());
        assert_eq!(result.inferred_opcode, Some(OpCode::Return));
    }

    #[test]
    fn keeps_the_last_completed_effect_not_the_first() {
        let body = body_of("function h(a) R[0] = R[1]; R[2] = K[3] end");
        let result = run(&body, SymbolicOptions::default());
        assert_eq!(result.inferred_opcode, Some(OpCode::LoadK));
        assert_eq!(result.effects.last(), Some(&Effect::LoadK { dst: 2, k: 3 }));
    }
}
