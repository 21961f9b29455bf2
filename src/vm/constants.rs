//! Collects every table literal the parser flagged as a constant pool and
//! flattens it into a dense `VMConstant` list, decrypting any encrypted
//! string fields along the way.

use crate::ast::{Ast, Block, Expr, ExprKind, Literal, Stmt, StmtKind, TableField};
use crate::decrypt::{auto_decrypt, decrypt_with, EncryptionInfo, Method};
use crate::vm::types::{ConstantValue, LuaNumber, VMConstant};

/// Below this score an `auto`-resolved plaintext is kept but flagged, since
/// it's more likely noise than real Lua.
const LOW_CONFIDENCE_THRESHOLD: i64 = 0;

/// Per-constant decryption outcome, so the orchestrator can apply the
/// "fatal at >=50% failure, else a warning per constant" rule.
#[derive(Debug, Clone, Default)]
pub struct DecryptReport {
    pub encrypted_total: usize,
    pub failed: Vec<u32>,
    /// Constants `auto`-resolved to a low-scoring plaintext: not a failure
    /// (some method produced output), just a weak guess worth flagging.
    pub low_confidence: Vec<u32>,
}

pub fn extract_constants(
    ast: &Ast,
    encryption: Option<&EncryptionInfo>,
) -> (Vec<VMConstant>, DecryptReport) {
    let mut tables = Vec::new();
    walk_block(&ast.body, &mut tables);

    let mut out = Vec::new();
    let mut report = DecryptReport::default();
    let mut next_index = 0u32;
    for fields in tables {
        for field in fields {
            let value = constant_value(&field.value, encryption, next_index, &mut report);
            out.push(VMConstant {
                value,
                pool_index: next_index,
            });
            next_index += 1;
        }
    }
    (out, report)
}

fn constant_value(
    expr: &Expr,
    encryption: Option<&EncryptionInfo>,
    pool_index: u32,
    report: &mut DecryptReport,
) -> ConstantValue {
    match &expr.node {
        ExprKind::Literal(Literal::Nil) => ConstantValue::Nil,
        ExprKind::Literal(Literal::Bool(b)) => ConstantValue::Bool(*b),
        ExprKind::Literal(Literal::Int(i)) => ConstantValue::Number(LuaNumber::Int(*i)),
        ExprKind::Literal(Literal::Float(f)) => ConstantValue::Number(LuaNumber::Float(*f)),
        ExprKind::Literal(Literal::Str(s)) => ConstantValue::String(s.clone()),
        ExprKind::EncryptedString { bytes, method } => {
            report.encrypted_total += 1;
            let resolved = method
                .as_ref()
                .and_then(|m| crate::decrypt::Method::parse(m))
                .or_else(|| encryption.map(|e| e.method));
            match (resolved, encryption) {
                (Some(Method::Auto), Some(info)) => {
                    let (outcome, attempts) = auto_decrypt(bytes, &info.key);
                    if !outcome.ok {
                        report.failed.push(pool_index);
                        return ConstantValue::String(String::from_utf8_lossy(bytes).into_owned());
                    }
                    let best_score = attempts
                        .iter()
                        .find(|a| a.method == outcome.method)
                        .map(|a| a.score)
                        .unwrap_or(i64::MIN);
                    if best_score < LOW_CONFIDENCE_THRESHOLD {
                        report.low_confidence.push(pool_index);
                    }
                    ConstantValue::String(String::from_utf8_lossy(&outcome.plaintext).into_owned())
                }
                (Some(m), Some(info)) => {
                    let outcome = decrypt_with(bytes, &info.key, m);
                    if outcome.ok {
                        ConstantValue::String(String::from_utf8_lossy(&outcome.plaintext).into_owned())
                    } else {
                        report.failed.push(pool_index);
                        ConstantValue::String(String::from_utf8_lossy(bytes).into_owned())
                    }
                }
                _ => {
                    report.failed.push(pool_index);
                    ConstantValue::String(String::from_utf8_lossy(bytes).into_owned())
                }
            }
        }
        _ => ConstantValue::Nil,
    }
}

fn walk_block<'a>(block: &'a Block, out: &mut Vec<&'a Vec<TableField>>) {
    for stmt in block {
        walk_stmt(stmt, out);
    }
}

fn walk_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<&'a Vec<TableField>>) {
    match &stmt.node {
        StmtKind::Assign { targets, values, .. } => {
            for e in targets.iter().chain(values.iter()) {
                walk_expr(e, out);
            }
        }
        StmtKind::ExprStmt(e) => walk_expr(e, out),
        StmtKind::Block(b) => walk_block(b, out),
        StmtKind::FunctionDecl { body, .. } => walk_block(&body.body, out),
        StmtKind::If { branches, else_block } => {
            for (cond, body) in branches {
                walk_expr(cond, out);
                walk_block(body, out);
            }
            if let Some(b) = else_block {
                walk_block(b, out);
            }
        }
        StmtKind::For { init, body, .. } => {
            for e in init {
                walk_expr(e, out);
            }
            walk_block(body, out);
        }
        StmtKind::While { cond, body } => {
            walk_expr(cond, out);
            walk_block(body, out);
        }
        StmtKind::Repeat { body, cond } => {
            walk_block(body, out);
            walk_expr(cond, out);
        }
        StmtKind::Return(exprs) => {
            for e in exprs {
                walk_expr(e, out);
            }
        }
        StmtKind::Break | StmtKind::Goto(_) | StmtKind::Label(_) => {}
    }
}

fn walk_expr<'a>(expr: &'a Expr, out: &mut Vec<&'a Vec<TableField>>) {
    match &expr.node {
        ExprKind::TableCtor { fields, constant_table } => {
            if *constant_table {
                out.push(fields);
            }
            for f in fields {
                if let Some(k) = &f.key {
                    walk_expr(k, out);
                }
                walk_expr(&f.value, out);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, out);
            walk_expr(rhs, out);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, out),
        ExprKind::Call { callee, args, .. } => {
            walk_expr(callee, out);
            for a in args {
                walk_expr(a, out);
            }
        }
        ExprKind::Function(body) => walk_block(&body.body, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn constants_of(src: &str) -> Vec<VMConstant> {
        let (tokens, _) = tokenize(src.as_bytes());
        let (ast, _, _) = parse(&tokens);
        extract_constants(&ast, None).0
    }

    #[test]
    fn flattens_a_constant_table() {
        let consts = constants_of(
            "local K = {1, 2, \"three\", true, nil, 4.5}",
        );
        assert_eq!(consts.len(), 6);
        assert_eq!(consts[0].value, ConstantValue::Number(LuaNumber::Int(1)));
        assert_eq!(consts[2].value, ConstantValue::String("three".into()));
        assert_eq!(consts[3].value, ConstantValue::Bool(true));
        assert_eq!(consts[4].value, ConstantValue::Nil);
    }

    #[test]
    fn ignores_non_constant_tables() {
        let consts = constants_of("local t = {x, y, z}");
        assert!(consts.is_empty());
    }

    fn encrypted_constant_table(bytes: Vec<u8>) -> Ast {
        use crate::ast::{Span, TableFieldKind};
        Ast {
            body: vec![Stmt::new(
                Span::default(),
                StmtKind::ExprStmt(Expr::new(
                    Span::default(),
                    ExprKind::TableCtor {
                        constant_table: true,
                        fields: vec![TableField {
                            kind: TableFieldKind::List,
                            key: None,
                            value: Expr::new(
                                Span::default(),
                                ExprKind::EncryptedString { bytes, method: None },
                            ),
                        }],
                    },
                )),
            )],
        }
    }

    #[test]
    fn auto_resolution_decrypts_a_plausible_plaintext_without_flagging_it() {
        use crate::decrypt::{encrypt_with, EncryptionInfo, Method};
        let key = b"0123456789ABCDEF";
        let cipher = encrypt_with(b"local x = 1", key, Method::XorV1).unwrap();
        let ast = encrypted_constant_table(cipher);
        let info = EncryptionInfo::auto_with_key(key.to_vec()).with_method(Method::Auto);
        let (consts, report) = extract_constants(&ast, Some(&info));
        assert_eq!(consts[0].value, ConstantValue::String("local x = 1".into()));
        assert!(report.low_confidence.is_empty());
        assert!(report.failed.is_empty());
    }

    #[test]
    fn auto_resolution_flags_a_low_scoring_guess() {
        use crate::decrypt::{EncryptionInfo, Method};
        let key = b"0123456789ABCDEF";
        let noise = vec![0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        let ast = encrypted_constant_table(noise);
        let info = EncryptionInfo::auto_with_key(key.to_vec()).with_method(Method::Auto);
        let (_, report) = extract_constants(&ast, Some(&info));
        assert_eq!(report.low_confidence, vec![0]);
        assert!(report.failed.is_empty());
    }
}
