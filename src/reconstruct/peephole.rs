//! The six fixed-point peephole passes that run over a `VMProto` after all
//! handlers have been lifted, each a direct generalization of a
//! one-pass-per-concern builder step.

use crate::reconstruct::proto::VMProto;
use crate::vm::{ConstantValue, OpCode};

/// One optimization pass. `run` reports whether it changed anything so the
/// driver can keep iterating to a fixed point.
pub trait PeepholePass {
    fn run(&self, proto: &mut VMProto) -> bool;
    fn name(&self) -> &'static str;
}

/// Pass 1: `MOVE a a` is a no-op.
pub struct RemoveSelfMove;
impl PeepholePass for RemoveSelfMove {
    fn name(&self) -> &'static str {
        "remove_self_move"
    }
    fn run(&self, proto: &mut VMProto) -> bool {
        let before = proto.code.len();
        proto
            .code
            .retain(|i| !(i.opcode == OpCode::Move && i.a == i.b));
        proto.code.len() != before
    }
}

/// Pass 2: a `LOADK a,k1` immediately followed by another `LOADK a,k2` —
/// the first store is dead, drop it.
pub struct RemoveDeadLoadK;
impl PeepholePass for RemoveDeadLoadK {
    fn name(&self) -> &'static str {
        "remove_dead_loadk"
    }
    fn run(&self, proto: &mut VMProto) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i + 1 < proto.code.len() {
            let (cur, next) = (proto.code[i], proto.code[i + 1]);
            if cur.opcode == OpCode::LoadK && next.opcode == OpCode::LoadK && cur.a == next.a {
                proto.code.remove(i);
                changed = true;
                continue;
            }
            i += 1;
        }
        changed
    }
}

/// Pass 3: two consecutive, identical arithmetic instructions — the first
/// is redundant.
pub struct RemoveDuplicateArithmetic;
impl PeepholePass for RemoveDuplicateArithmetic {
    fn name(&self) -> &'static str {
        "remove_duplicate_arithmetic"
    }
    fn run(&self, proto: &mut VMProto) -> bool {
        const ARITH: &[OpCode] = &[
            OpCode::Add,
            OpCode::Sub,
            OpCode::Mul,
            OpCode::Div,
            OpCode::Mod,
            OpCode::Pow,
            OpCode::Concat,
        ];
        let mut changed = false;
        let mut i = 0;
        while i + 1 < proto.code.len() {
            let (cur, next) = (proto.code[i], proto.code[i + 1]);
            if ARITH.contains(&cur.opcode)
                && cur.opcode == next.opcode
                && cur.a == next.a
                && cur.b == next.b
                && cur.c == next.c
            {
                proto.code.remove(i);
                changed = true;
                continue;
            }
            i += 1;
        }
        changed
    }
}

/// Pass 4: collapse `(type, value)`-equal constants, remapping every
/// `LOADK.bx`/`b` reference to the surviving index.
pub struct DeduplicateConstants;
impl PeepholePass for DeduplicateConstants {
    fn name(&self) -> &'static str {
        "deduplicate_constants"
    }
    fn run(&self, proto: &mut VMProto) -> bool {
        let mut kept: Vec<(u32, ConstantValue)> = Vec::new();
        let mut remap = std::collections::HashMap::new();
        for c in &proto.constants {
            let existing = kept.iter().find(|(_, v)| *v == c.value);
            match existing {
                Some((kept_idx, _)) => {
                    remap.insert(c.pool_index, *kept_idx);
                }
                None => {
                    let new_idx = kept.len() as u32;
                    kept.push((new_idx, c.value.clone()));
                    remap.insert(c.pool_index, new_idx);
                }
            }
        }
        if kept.len() == proto.constants.len() {
            return false;
        }
        proto.constants = kept
            .into_iter()
            .map(|(idx, value)| crate::vm::VMConstant {
                value,
                pool_index: idx,
            })
            .collect();
        for instr in &mut proto.code {
            if instr.opcode == OpCode::LoadK {
                if let Some(old_bx) = instr.bx {
                    if let Some(new_idx) = remap.get(&old_bx) {
                        instr.bx = Some(*new_idx);
                    }
                }
            }
        }
        true
    }
}

/// Pass 5: dead-code elimination by forward reachability from `pc = 0`.
pub struct RemoveUnreachable;
impl PeepholePass for RemoveUnreachable {
    fn name(&self) -> &'static str {
        "remove_unreachable"
    }
    fn run(&self, proto: &mut VMProto) -> bool {
        if proto.code.is_empty() {
            return false;
        }
        let len = proto.code.len();
        let mut reachable = vec![false; len];
        let mut stack = vec![0usize];
        while let Some(pc) = stack.pop() {
            if pc >= len || reachable[pc] {
                continue;
            }
            reachable[pc] = true;
            let instr = &proto.code[pc];
            match instr.opcode {
                OpCode::Return => {}
                OpCode::Jmp => {
                    let sbx = instr.sbx.unwrap_or(0);
                    let target = pc as i64 + 1 + sbx as i64;
                    if target >= 0 {
                        stack.push(target as usize);
                    }
                }
                _ => stack.push(pc + 1),
            }
        }
        if reachable.iter().all(|r| *r) {
            return false;
        }
        let mut changed = false;
        let mut kept_code = Vec::with_capacity(len);
        for (pc, instr) in proto.code.iter().enumerate() {
            if reachable[pc] {
                kept_code.push(*instr);
            } else {
                changed = true;
            }
        }
        proto.code = kept_code;
        changed
    }
}

/// Pass 6: `max_stack` from the highest register touched, clamped at >= 2.
pub struct ComputeMaxStack;
impl PeepholePass for ComputeMaxStack {
    fn name(&self) -> &'static str {
        "compute_max_stack"
    }
    fn run(&self, proto: &mut VMProto) -> bool {
        let mut high = 1i32;
        for instr in &proto.code {
            match instr.opcode {
                OpCode::Call | OpCode::TailCall => {
                    if instr.b > 0 {
                        high = high.max(instr.a + instr.b - 1);
                    }
                    if instr.c > 0 {
                        high = high.max(instr.a + instr.c - 1);
                    }
                }
                _ => {
                    if writes_stack(instr.opcode) {
                        high = high.max(instr.a);
                    }
                }
            }
        }
        let new_max = (high + 1).max(2) as u8;
        if proto.max_stack == new_max {
            false
        } else {
            proto.max_stack = new_max;
            true
        }
    }
}

fn writes_stack(op: OpCode) -> bool {
    matches!(
        op,
        OpCode::Move
            | OpCode::LoadK
            | OpCode::LoadKx
            | OpCode::LoadBool
            | OpCode::LoadNil
            | OpCode::GetUpval
            | OpCode::GetTabUp
            | OpCode::GetTable
            | OpCode::NewTable
            | OpCode::Self_
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Mod
            | OpCode::Pow
            | OpCode::Div
            | OpCode::IDiv
            | OpCode::BAnd
            | OpCode::BOr
            | OpCode::BXor
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::Unm
            | OpCode::BNot
            | OpCode::Not
            | OpCode::Len
            | OpCode::Concat
            | OpCode::Closure
            | OpCode::Vararg
    )
}

/// Runs all six passes in order to a fixed point (no pass reports a change).
pub fn optimize(proto: &mut VMProto) {
    let passes: Vec<Box<dyn PeepholePass>> = vec![
        Box::new(RemoveSelfMove),
        Box::new(RemoveDeadLoadK),
        Box::new(RemoveDuplicateArithmetic),
        Box::new(DeduplicateConstants),
        Box::new(RemoveUnreachable),
        Box::new(ComputeMaxStack),
    ];
    loop {
        let mut changed = false;
        for pass in &passes {
            if pass.run(proto) {
                tracing::debug!(pass = pass.name(), "peephole pass changed proto");
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VMInstruction;

    #[test]
    fn removes_self_move() {
        let mut proto = VMProto::new("t");
        proto.code = vec![VMInstruction::abc(OpCode::Move, 0, 0, 0, 0)];
        assert!(RemoveSelfMove.run(&mut proto));
        assert!(proto.code.is_empty());
    }

    #[test]
    fn removes_dead_loadk() {
        let mut proto = VMProto::new("t");
        proto.code = vec![
            VMInstruction::abx(OpCode::LoadK, 0, 1, 0),
            VMInstruction::abx(OpCode::LoadK, 0, 2, 1),
        ];
        assert!(RemoveDeadLoadK.run(&mut proto));
        assert_eq!(proto.code.len(), 1);
        assert_eq!(proto.code[0].bx, Some(2));
    }

    #[test]
    fn dedups_constants_and_remaps_loadk() {
        use crate::vm::{ConstantValue, LuaNumber, VMConstant};
        let mut proto = VMProto::new("t");
        proto.constants = vec![
            VMConstant {
                value: ConstantValue::Number(LuaNumber::Int(7)),
                pool_index: 0,
            },
            VMConstant {
                value: ConstantValue::Number(LuaNumber::Int(7)),
                pool_index: 1,
            },
        ];
        proto.code = vec![VMInstruction::abx(OpCode::LoadK, 0, 1, 0)];
        assert!(DeduplicateConstants.run(&mut proto));
        assert_eq!(proto.constants.len(), 1);
        assert_eq!(proto.code[0].bx, Some(0));
    }

    #[test]
    fn computes_max_stack_from_call() {
        let mut proto = VMProto::new("t");
        proto.code = vec![VMInstruction::abc(OpCode::Call, 2, 3, 1, 0)];
        assert!(ComputeMaxStack.run(&mut proto));
        assert_eq!(proto.max_stack, 5);
    }

    #[test]
    fn max_stack_never_drops_below_two() {
        let mut proto = VMProto::new("t");
        proto.code = vec![];
        ComputeMaxStack.run(&mut proto);
        assert_eq!(proto.max_stack, 2);
    }
}
