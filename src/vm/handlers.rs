//! Collects every VM-handler function out of a parsed `Ast` and assigns
//! each a stable `handler_index`.

use crate::ast::{Ast, Block, Expr, ExprKind, FunctionBody, Stmt, StmtKind};
use crate::vm::inference::infer_opcode;
use crate::vm::render::render_block;
use crate::vm::stats::AnalyzerStats;
use crate::vm::types::VMHandler;
use ahash::AHasher;
use std::hash::{Hash, Hasher};

struct Found<'a> {
    name_hint: String,
    body: &'a FunctionBody,
}

pub fn extract_handlers(ast: &Ast) -> (Vec<VMHandler>, AnalyzerStats) {
    let mut found = Vec::new();
    walk_block(&ast.body, &mut found);

    let mut stats = AnalyzerStats {
        handlers_found: found.len(),
        ..AnalyzerStats::default()
    };
    let mut next_fallback_index = 0u32;
    let handlers = found
        .into_iter()
        .map(|f| {
            let index = f
                .body
                .handler_index
                .or_else(|| first_decimal_run(&f.name_hint))
                .unwrap_or_else(|| {
                    let idx = hash_index(&f.name_hint, next_fallback_index);
                    next_fallback_index += 1;
                    idx
                });
            let (opcode, rule) = infer_opcode(&f.name_hint, &f.body.body);
            stats.record(rule);
            VMHandler {
                index,
                opcode,
                body_code: render_block(&f.body.body),
                encrypted: false,
                decrypted_code: None,
            }
        })
        .collect();
    (handlers, stats)
}

fn walk_block<'a>(block: &'a Block, out: &mut Vec<Found<'a>>) {
    for stmt in block {
        walk_stmt(stmt, out);
    }
}

fn walk_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<Found<'a>>) {
    match &stmt.node {
        StmtKind::FunctionDecl { name, body, .. } => {
            if body.vm_handler {
                out.push(Found {
                    name_hint: name_hint(name),
                    body,
                });
            }
            walk_block(&body.body, out);
        }
        StmtKind::Assign { targets, values, .. } => {
            for (i, v) in values.iter().enumerate() {
                let hint = targets.get(i).map(name_hint).unwrap_or_default();
                walk_expr(v, &hint, out);
            }
        }
        StmtKind::ExprStmt(e) => walk_expr(e, "", out),
        StmtKind::Block(b) => walk_block(b, out),
        StmtKind::If { branches, else_block } => {
            for (cond, body) in branches {
                walk_expr(cond, "", out);
                walk_block(body, out);
            }
            if let Some(b) = else_block {
                walk_block(b, out);
            }
        }
        StmtKind::For { init, body, .. } => {
            for e in init {
                walk_expr(e, "", out);
            }
            walk_block(body, out);
        }
        StmtKind::While { cond, body } => {
            walk_expr(cond, "", out);
            walk_block(body, out);
        }
        StmtKind::Repeat { body, cond } => {
            walk_block(body, out);
            walk_expr(cond, "", out);
        }
        StmtKind::Return(exprs) => {
            for e in exprs {
                walk_expr(e, "", out);
            }
        }
        StmtKind::Break | StmtKind::Goto(_) | StmtKind::Label(_) => {}
    }
}

fn walk_expr<'a>(expr: &'a Expr, hint: &str, out: &mut Vec<Found<'a>>) {
    match &expr.node {
        ExprKind::Function(body) => {
            if body.vm_handler {
                out.push(Found {
                    name_hint: hint.to_string(),
                    body,
                });
            }
            walk_block(&body.body, out);
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, "", out);
            walk_expr(rhs, "", out);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, "", out),
        ExprKind::Call { callee, args, .. } => {
            walk_expr(callee, "", out);
            for a in args {
                walk_expr(a, "", out);
            }
        }
        ExprKind::TableCtor { fields, .. } => {
            for f in fields {
                if let Some(k) = &f.key {
                    walk_expr(k, "", out);
                }
                walk_expr(&f.value, "", out);
            }
        }
        _ => {}
    }
}

fn name_hint(expr: &Expr) -> String {
    match &expr.node {
        ExprKind::Identifier { name, .. } => name.clone(),
        ExprKind::Binary {
            op: crate::ast::BinOp::Index,
            rhs,
            ..
        } => {
            if let ExprKind::Literal(crate::ast::Literal::Str(s)) = &rhs.node {
                s.clone()
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

/// The first maximal decimal run in `name`, e.g. `"op_42b"` -> `42`.
fn first_decimal_run(name: &str) -> Option<u32> {
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if let Ok(n) = name[start..i].parse() {
                return Some(n);
            }
        } else {
            i += 1;
        }
    }
    None
}

fn hash_index(name: &str, salt: u32) -> u32 {
    let mut hasher = AHasher::default();
    name.hash(&mut hasher);
    salt.hash(&mut hasher);
    (hasher.finish() % 1000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn handlers_of(src: &str) -> Vec<VMHandler> {
        let (tokens, _) = tokenize(src.as_bytes());
        let (ast, _, _) = parse(&tokens);
        extract_handlers(&ast).0
    }

    #[test]
    fn finds_named_handler_with_explicit_index() {
        let handlers = handlers_of("function handler_7(a, b) return a end");
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].index, 7);
    }

    #[test]
    fn derives_index_from_embedded_digits_when_unmarked() {
        let handlers = handlers_of("function vm_step_13(a) MOVE(a, a) end");
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].index, 13);
    }

    #[test]
    fn finds_anonymous_handler_assigned_into_table() {
        let handlers = handlers_of(
            "handlers[1] = function(a, b, c) return execute_bytecode_op(a, b, c) end",
        );
        assert_eq!(handlers.len(), 1);
    }

    #[test]
    fn non_handler_functions_are_not_collected() {
        let handlers = handlers_of("function add(a, b) return a + b end");
        assert!(handlers.is_empty());
    }
}
