//! Abstract syntax tree. A single owning-children representation per node:
//! every variant holds its own fields directly (no shared `children` array
//! walked alongside variant-specific fields), so a visitor is one exhaustive
//! match, never two traversals of the same subtree.

mod span;

pub use span::Span;

use smallvec::SmallVec;

/// A node wrapped with its source position. Kept as a wrapper rather than a
/// `span` field duplicated on every enum variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Spanned { span, node }
    }
}

pub type Expr = Spanned<ExprKind>;
pub type Stmt = Spanned<StmtKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuaType {
    Nil,
    Bool,
    Int,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    pub fn lua_type(&self) -> LuaType {
        match self {
            Literal::Nil => LuaType::Nil,
            Literal::Bool(_) => LuaType::Bool,
            Literal::Int(_) => LuaType::Int,
            Literal::Float(_) => LuaType::Float,
            Literal::Str(_) => LuaType::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    /// Synthetic `a[b]` indexing, used for both real table indexing and for
    /// recognizing `R[i]`/`K[i]` register/constant references during VM
    /// analysis.
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
    BNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForKind {
    Numeric,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFieldKind {
    List,
    Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableField {
    pub kind: TableFieldKind,
    pub key: Option<Expr>,
    pub value: Expr,
}

/// Set once a `Call`'s callee name has been matched against the VM-opcode
/// vocabulary; `None` until the parser's annotation pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmOpHint {
    Move,
    LoadK,
    Call,
    Jmp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Identifier { name: String, obfuscated: bool },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        vm_call: bool,
        vm_op: Option<VmOpHint>,
    },
    TableCtor {
        fields: Vec<TableField>,
        constant_table: bool,
    },
    /// A string literal flagged by the lexer as encrypted. `method` is
    /// filled in once the VM analyzer's key-shape scan determines it;
    /// `None` means "use the session default" (typically `auto`).
    EncryptedString {
        bytes: Vec<u8>,
        method: Option<String>,
    },
    /// An inline `function(...) ... end` expression. Statement-position
    /// function declarations use `StmtKind::FunctionDecl` instead; both
    /// share `FunctionBody`.
    Function(Box<FunctionBody>),
    Vararg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub params: Vec<String>,
    pub is_vararg: bool,
    pub body: Block,
    /// Set when this function's name or body matches the VM-handler
    /// heuristics.
    pub vm_handler: bool,
    pub handler_index: Option<u32>,
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Covers both assignment (`targets = values`) and `local` declaration
    /// (`is_local = true`); a bare `local x, y` with no initializer stores
    /// an empty `values`.
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
        is_local: bool,
    },
    ExprStmt(Expr),
    Block(Block),
    FunctionDecl {
        name: Expr,
        is_local: bool,
        body: FunctionBody,
    },
    If {
        branches: Vec<(Expr, Block)>,
        else_block: Option<Block>,
    },
    For {
        kind: ForKind,
        /// Numeric: `[var, start, stop, step?]`. Generic: the loop
        /// variables (`names`) live in `names`, and `init`/`values` stores
        /// the explist after `in`.
        names: Vec<String>,
        init: Vec<Expr>,
        body: Block,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Repeat {
        body: Block,
        cond: Expr,
    },
    Return(Vec<Expr>),
    Break,
    Goto(String),
    Label(String),
}

/// A parsed chunk is just its top-level block, by convention an implicit
/// vararg function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ast {
    pub body: Block,
}

/// Recursively collects every `Call` expression reachable from `expr`,
/// depth-first. Used by the handler-body `vm_handler` heuristic ("contains
/// at least one `Call` whose callee ...").
pub fn walk_calls<'a>(expr: &'a Expr, out: &mut SmallVec<[&'a Expr; 4]>) {
    if let ExprKind::Call { callee, args, .. } = &expr.node {
        out.push(expr);
        walk_calls(callee, out);
        for a in args {
            walk_calls(a, out);
        }
        return;
    }
    match &expr.node {
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_calls(lhs, out);
            walk_calls(rhs, out);
        }
        ExprKind::Unary { operand, .. } => walk_calls(operand, out),
        ExprKind::TableCtor { fields, .. } => {
            for f in fields {
                if let Some(k) = &f.key {
                    walk_calls(k, out);
                }
                walk_calls(&f.value, out);
            }
        }
        _ => {}
    }
}
