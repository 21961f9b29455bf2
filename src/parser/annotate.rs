//! Obfuscation-shape heuristics applied while the AST is built: is this
//! function a VM handler, is this table a constant pool, does this call
//! look like a VM primitive.

use crate::ast::{Block, Expr, ExprKind, StmtKind, VmOpHint};

const HANDLER_NAME_PREFIXES: [&str; 3] = ["vm_", "op_", "exec_"];
const VM_OP_NAMES: [(&str, VmOpHint); 4] = [
    ("MOVE", VmOpHint::Move),
    ("LOADK", VmOpHint::LoadK),
    ("CALL", VmOpHint::Call),
    ("JMP", VmOpHint::Jmp),
];

/// `handler_\d+` → the trailing decimal run, if the whole suffix is digits.
pub fn matches_handler_index(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("handler_")?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

fn has_handler_prefix(name: &str) -> bool {
    HANDLER_NAME_PREFIXES.iter().any(|p| {
        name.strip_prefix(p)
            .map(|rest| !rest.is_empty())
            .unwrap_or(false)
    })
}

/// `handler_\d+`, `vm_\w+`, `op_\w+`, `exec_\w+`, or length >= 16.
pub fn looks_like_handler_name(name: &str) -> bool {
    matches_handler_index(name).is_some() || has_handler_prefix(name) || name.len() >= 16
}

/// A callee name counts toward "this call looks VM-ish" if it has one of
/// the handler-name shapes, or is long with several arguments.
fn callee_looks_vm_ish(name: &str, arg_count: usize) -> bool {
    looks_like_handler_name(name) || (arg_count >= 3 && name.len() > 15)
}

fn identifier_name(expr: &Expr) -> Option<&str> {
    match &expr.node {
        ExprKind::Identifier { name, .. } => Some(name.as_str()),
        _ => None,
    }
}

/// Recursively collects every reachable `Call` expression under `expr`.
fn collect_calls<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    if let ExprKind::Call { callee, args, .. } = &expr.node {
        out.push(expr);
        collect_calls(callee, out);
        for a in args {
            collect_calls(a, out);
        }
        return;
    }
    match &expr.node {
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_calls(lhs, out);
            collect_calls(rhs, out);
        }
        ExprKind::Unary { operand, .. } => collect_calls(operand, out),
        ExprKind::TableCtor { fields, .. } => {
            for f in fields {
                if let Some(k) = &f.key {
                    collect_calls(k, out);
                }
                collect_calls(&f.value, out);
            }
        }
        _ => {}
    }
}

fn block_exprs<'a>(block: &'a Block, out: &mut Vec<&'a Expr>) {
    for stmt in block {
        match &stmt.node {
            StmtKind::Assign { targets, values, .. } => {
                out.extend(targets.iter());
                out.extend(values.iter());
            }
            StmtKind::ExprStmt(e) => out.push(e),
            StmtKind::Block(b) => block_exprs(b, out),
            StmtKind::FunctionDecl { name, .. } => out.push(name),
            StmtKind::If { branches, else_block } => {
                for (cond, body) in branches {
                    out.push(cond);
                    block_exprs(body, out);
                }
                if let Some(b) = else_block {
                    block_exprs(b, out);
                }
            }
            StmtKind::For { init, body, .. } => {
                out.extend(init.iter());
                block_exprs(body, out);
            }
            StmtKind::While { cond, body } => {
                out.push(cond);
                block_exprs(body, out);
            }
            StmtKind::Repeat { body, cond } => {
                block_exprs(body, out);
                out.push(cond);
            }
            StmtKind::Return(exprs) => out.extend(exprs.iter()),
            StmtKind::Break | StmtKind::Goto(_) | StmtKind::Label(_) => {}
        }
    }
}

/// Whether `body` contains a `Call` whose callee looks VM-ish, scanning
/// every statement in the function (nested blocks included, nested
/// function literals excluded — those get their own classification when
/// they're visited as their own `FunctionDecl`/`Function` node).
pub fn body_has_vm_call(body: &Block) -> bool {
    let mut exprs = Vec::new();
    block_exprs(body, &mut exprs);
    let mut calls = Vec::new();
    for e in exprs {
        collect_calls(e, &mut calls);
    }
    calls.into_iter().any(|call| {
        if let ExprKind::Call { callee, args, .. } = &call.node {
            identifier_name(callee)
                .map(|n| callee_looks_vm_ish(n, args.len()))
                .unwrap_or(false)
        } else {
            false
        }
    })
}

/// `(vm_handler, handler_index)` for a named function declaration.
pub fn classify_function_decl(name: &str, body: &Block) -> (bool, Option<u32>) {
    if let Some(idx) = matches_handler_index(name) {
        return (true, Some(idx));
    }
    if has_handler_prefix(name) || name.len() >= 16 {
        return (true, None);
    }
    if body_has_vm_call(body) {
        return (true, None);
    }
    (false, None)
}

/// `(vm_call, vm_op)` for a call expression, from its callee name.
pub fn classify_call(callee: &Expr) -> (bool, Option<VmOpHint>) {
    let Some(name) = identifier_name(callee) else {
        return (false, None);
    };
    let upper = name.to_ascii_uppercase();
    for (needle, hint) in VM_OP_NAMES {
        if upper.contains(needle) {
            return (true, Some(hint));
        }
    }
    (false, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_index_from_name() {
        assert_eq!(matches_handler_index("handler_42"), Some(42));
        assert_eq!(matches_handler_index("handler_"), None);
        assert_eq!(matches_handler_index("handler_4x"), None);
    }

    #[test]
    fn handler_name_shapes() {
        assert!(looks_like_handler_name("vm_dispatch"));
        assert!(looks_like_handler_name("op_add"));
        assert!(looks_like_handler_name("exec_step"));
        assert!(looks_like_handler_name("a_very_long_identifier_name"));
        assert!(!looks_like_handler_name("short"));
    }

    #[test]
    fn call_classification_matches_opcode_vocabulary() {
        use crate::ast::Span;
        let callee = Expr::new(
            Span::default(),
            ExprKind::Identifier {
                name: "do_MOVE_thing".into(),
                obfuscated: false,
            },
        );
        let (vm_call, hint) = classify_call(&callee);
        assert!(vm_call);
        assert_eq!(hint, Some(VmOpHint::Move));
    }
}
