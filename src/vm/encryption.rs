//! Encryption-info discovery: finds the session key and decides which
//! algorithm applies before any string gets decrypted.

use crate::ast::{Ast, Expr, ExprKind, Stmt, StmtKind};
use crate::decrypt::{extract_candidate_keys, EncryptionInfo, Method};

/// Finds a session key by source-text heuristics and wires up `EncryptionInfo`.
/// An explicit per-string `method` override (set on an `EncryptedString` node
/// by the lexer/parser pass) always wins over the session default passed in
/// `default_method`.
pub fn discover(source: &str, default_method: Method) -> Option<EncryptionInfo> {
    let candidates = extract_candidate_keys(source);
    let key = candidates.into_iter().next()?;
    Some(EncryptionInfo::auto_with_key(key).with_method(default_method))
}

/// The method an individual encrypted string should use: its own override,
/// if the parser recorded one, else the session default.
pub fn method_for(expr: &Expr, session_default: Method) -> Method {
    if let ExprKind::EncryptedString { method: Some(m), .. } = &expr.node {
        if let Some(parsed) = Method::parse(m) {
            return parsed;
        }
    }
    session_default
}

/// True if any `EncryptedString` literal is reachable anywhere in the AST;
/// used to short-circuit decryption work when there's nothing to decrypt.
pub fn has_encrypted_strings(ast: &Ast) -> bool {
    ast.body.iter().any(stmt_has_encrypted)
}

fn stmt_has_encrypted(stmt: &Stmt) -> bool {
    match &stmt.node {
        StmtKind::Assign { targets, values, .. } => {
            targets.iter().any(expr_has_encrypted) || values.iter().any(expr_has_encrypted)
        }
        StmtKind::ExprStmt(e) => expr_has_encrypted(e),
        StmtKind::Block(b) => b.iter().any(stmt_has_encrypted),
        StmtKind::FunctionDecl { body, .. } => body.body.iter().any(stmt_has_encrypted),
        StmtKind::If { branches, else_block } => {
            branches
                .iter()
                .any(|(c, b)| expr_has_encrypted(c) || b.iter().any(stmt_has_encrypted))
                || else_block
                    .as_ref()
                    .map(|b| b.iter().any(stmt_has_encrypted))
                    .unwrap_or(false)
        }
        StmtKind::For { init, body, .. } => {
            init.iter().any(expr_has_encrypted) || body.iter().any(stmt_has_encrypted)
        }
        StmtKind::While { cond, body } => {
            expr_has_encrypted(cond) || body.iter().any(stmt_has_encrypted)
        }
        StmtKind::Repeat { body, cond } => {
            body.iter().any(stmt_has_encrypted) || expr_has_encrypted(cond)
        }
        StmtKind::Return(exprs) => exprs.iter().any(expr_has_encrypted),
        StmtKind::Break | StmtKind::Goto(_) | StmtKind::Label(_) => false,
    }
}

fn expr_has_encrypted(expr: &Expr) -> bool {
    match &expr.node {
        ExprKind::EncryptedString { .. } => true,
        ExprKind::Binary { lhs, rhs, .. } => expr_has_encrypted(lhs) || expr_has_encrypted(rhs),
        ExprKind::Unary { operand, .. } => expr_has_encrypted(operand),
        ExprKind::Call { callee, args, .. } => {
            expr_has_encrypted(callee) || args.iter().any(expr_has_encrypted)
        }
        ExprKind::TableCtor { fields, .. } => fields.iter().any(|f| {
            f.key.as_ref().map(expr_has_encrypted).unwrap_or(false) || expr_has_encrypted(&f.value)
        }),
        ExprKind::Function(body) => body.body.iter().any(stmt_has_encrypted),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_key_from_local_string() {
        let src = r#"local key = "this_is_a_long_enough_key""#;
        let info = discover(src, Method::Auto).expect("key found");
        assert_eq!(info.key, b"this_is_a_long_enough_key");
    }

    #[test]
    fn no_key_means_no_info() {
        assert!(discover("local x = 1", Method::Auto).is_none());
    }

    #[test]
    fn detects_encrypted_strings_anywhere() {
        use crate::ast::Span;
        let ast = Ast {
            body: vec![Stmt::new(
                Span::default(),
                StmtKind::Return(vec![Expr::new(
                    Span::default(),
                    ExprKind::EncryptedString {
                        bytes: vec![1, 2, 3],
                        method: None,
                    },
                )]),
            )],
        };
        assert!(has_encrypted_strings(&ast));
    }
}
