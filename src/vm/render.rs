//! Renders a handler body back to a short string form. The Reconstructor's
//! regex fallback pass and `VMHandler.body_code` both consume this instead
//! of holding onto AST references past the analysis stage.

use crate::ast::{Block, Expr, ExprKind, Literal, Stmt, StmtKind};

pub fn render_block(block: &Block) -> String {
    block
        .iter()
        .map(render_stmt)
        .collect::<Vec<_>>()
        .join("; ")
}

fn render_stmt(stmt: &Stmt) -> String {
    match &stmt.node {
        StmtKind::Assign {
            targets,
            values,
            is_local,
        } => {
            let lhs = join_exprs(targets);
            let rhs = join_exprs(values);
            if rhs.is_empty() {
                format!("{}{lhs}", if *is_local { "local " } else { "" })
            } else {
                format!("{}{lhs} = {rhs}", if *is_local { "local " } else { "" })
            }
        }
        StmtKind::ExprStmt(e) => render_expr(e),
        StmtKind::Block(b) => format!("do {} end", render_block(b)),
        StmtKind::FunctionDecl { name, body, .. } => {
            format!("function {}(...) {} end", render_expr(name), render_block(&body.body))
        }
        StmtKind::If { branches, else_block } => {
            let mut parts = Vec::new();
            for (i, (cond, body)) in branches.iter().enumerate() {
                let kw = if i == 0 { "if" } else { "elseif" };
                parts.push(format!("{kw} {} then {}", render_expr(cond), render_block(body)));
            }
            if let Some(b) = else_block {
                parts.push(format!("else {}", render_block(b)));
            }
            parts.push("end".to_string());
            parts.join(" ")
        }
        StmtKind::For { names, init, body, .. } => {
            format!(
                "for {} in {} do {} end",
                names.join(", "),
                join_exprs(init),
                render_block(body)
            )
        }
        StmtKind::While { cond, body } => {
            format!("while {} do {} end", render_expr(cond), render_block(body))
        }
        StmtKind::Repeat { body, cond } => {
            format!("repeat {} until {}", render_block(body), render_expr(cond))
        }
        StmtKind::Return(exprs) => format!("return {}", join_exprs(exprs)),
        StmtKind::Break => "break".to_string(),
        StmtKind::Goto(name) => format!("goto {name}"),
        StmtKind::Label(name) => format!("::{name}::"),
    }
}

fn join_exprs(exprs: &[Expr]) -> String {
    exprs.iter().map(render_expr).collect::<Vec<_>>().join(", ")
}

pub fn render_expr(expr: &Expr) -> String {
    match &expr.node {
        ExprKind::Literal(Literal::Nil) => "nil".to_string(),
        ExprKind::Literal(Literal::Bool(b)) => b.to_string(),
        ExprKind::Literal(Literal::Int(i)) => i.to_string(),
        ExprKind::Literal(Literal::Float(f)) => f.to_string(),
        ExprKind::Literal(Literal::Str(s)) => format!("\"{s}\""),
        ExprKind::EncryptedString { .. } => "<encrypted>".to_string(),
        ExprKind::Identifier { name, .. } => name.clone(),
        ExprKind::Vararg => "...".to_string(),
        ExprKind::Binary { op, lhs, rhs } => {
            use crate::ast::BinOp;
            if *op == BinOp::Index {
                format!("{}[{}]", render_expr(lhs), render_expr(rhs))
            } else {
                format!("{} {} {}", render_expr(lhs), binop_str(*op), render_expr(rhs))
            }
        }
        ExprKind::Unary { op, operand } => format!("{}{}", unop_str(*op), render_expr(operand)),
        ExprKind::Call { callee, args, .. } => {
            format!("{}({})", render_expr(callee), join_exprs(args))
        }
        ExprKind::TableCtor { .. } => "{...}".to_string(),
        ExprKind::Function(_) => "function(...) ... end".to_string(),
    }
}

fn binop_str(op: crate::ast::BinOp) -> &'static str {
    use crate::ast::BinOp::*;
    match op {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        FloorDiv => "//",
        Mod => "%",
        Pow => "^",
        Concat => "..",
        Eq => "==",
        Ne => "~=",
        Lt => "<",
        Le => "<=",
        Gt => ">",
        Ge => ">=",
        And => "and",
        Or => "or",
        BAnd => "&",
        BOr => "|",
        BXor => "~",
        Shl => "<<",
        Shr => ">>",
        Index => "[]",
    }
}

fn unop_str(op: crate::ast::UnOp) -> &'static str {
    use crate::ast::UnOp::*;
    match op {
        Neg => "-",
        Not => "not ",
        Len => "#",
        BNot => "~",
    }
}
