//! Recursive-descent parser with Pratt-style operator precedence, building
//! the AST and applying obfuscation annotations in the same pass.

mod annotate;
mod error;
mod stats;

pub use error::ParseError;
pub use stats::ParserStats;

use crate::ast::{
    Ast, BinOp, Block, Expr, ExprKind, ForKind, FunctionBody, Literal, Span, Stmt, StmtKind,
    TableField, TableFieldKind, UnOp,
};
use crate::lexer::{Token, TokenKind};

/// Parses a full token stream (trivia included, as the lexer returns it)
/// into an `Ast`, a list of recoverable parse errors, and pass statistics.
/// A fatal error short-circuits and is returned as the last element of the
/// error list with `fatal = true`.
pub fn parse(tokens: &[Token]) -> (Ast, Vec<ParseError>, ParserStats) {
    let mut parser = Parser::new(tokens);
    let body = parser.parse_chunk();
    (Ast { body }, parser.errors, parser.stats)
}

const STMT_START: &[TokenKind] = &[
    TokenKind::Function,
    TokenKind::Local,
    TokenKind::For,
    TokenKind::If,
    TokenKind::While,
    TokenKind::Return,
    TokenKind::Do,
    TokenKind::Repeat,
    TokenKind::Break,
    TokenKind::Goto,
    TokenKind::DColon,
    TokenKind::Semicolon,
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    stats: ParserStats,
}

impl Parser {
    fn new(tokens: &[Token]) -> Self {
        let mut filtered: Vec<Token> = tokens
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .cloned()
            .collect();
        let eof_offset = tokens.last().map(|t| t.byte_offset + t.lexeme.len() as u32).unwrap_or(0);
        let eof_line = tokens.last().map(|t| t.line).unwrap_or(1);
        filtered.push(Token::new(TokenKind::Eof, String::new(), eof_line, 1, eof_offset));
        Parser {
            tokens: filtered,
            pos: 0,
            errors: Vec::new(),
            stats: ParserStats::default(),
        }
    }

    // ---- token stream primitives ----

    fn current(&self) -> &Token {
        // The synthetic `Eof` token pushed in `new` guarantees this never
        // indexes past the end, even on empty input.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn is_eof(&self) -> bool {
        self.kind() == TokenKind::Eof
    }

    fn span(&self) -> Span {
        let t = self.current();
        Span::new(t.byte_offset, t.byte_offset + t.lexeme.len() as u32, t.line)
    }

    fn bump(&mut self) -> Token {
        let t = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.check(kind) {
            Some(self.bump())
        } else {
            let at = self.span();
            let got = format!("{:?} ({:?})", self.kind(), self.current().lexeme);
            self.errors.push(ParseError::new(at, what, got));
            None
        }
    }

    /// Skips tokens until the next statement-starting keyword, `;`, or EOF.
    fn synchronize(&mut self) {
        while !self.is_eof() && !STMT_START.contains(&self.kind()) {
            self.bump();
        }
    }

    // ---- chunk / block ----

    fn parse_chunk(&mut self) -> Block {
        self.parse_block(&[])
    }

    fn parse_block(&mut self, terminators: &[TokenKind]) -> Block {
        let mut block = Vec::new();
        loop {
            if self.is_eof() || terminators.contains(&self.kind()) {
                break;
            }
            if self.check(TokenKind::Return) {
                block.push(self.parse_return());
                break;
            }
            match self.parse_stmt() {
                Some(stmt) => block.push(stmt),
                None => {
                    if self.is_eof() || terminators.contains(&self.kind()) {
                        break;
                    }
                }
            }
        }
        block
    }

    fn parse_return(&mut self) -> Stmt {
        let start = self.span();
        self.bump(); // return
        let mut exprs = Vec::new();
        if !self.is_eof()
            && !matches!(
                self.kind(),
                TokenKind::End
                    | TokenKind::Else
                    | TokenKind::ElseIf
                    | TokenKind::Until
                    | TokenKind::Semicolon
                    | TokenKind::Eof
            )
        {
            exprs.push(self.parse_expr(0));
            while self.eat(TokenKind::Comma) {
                exprs.push(self.parse_expr(0));
            }
        }
        self.eat(TokenKind::Semicolon);
        Stmt::new(start, StmtKind::Return(exprs))
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        let start = self.span();
        match self.kind() {
            TokenKind::Semicolon => {
                self.bump();
                None
            }
            TokenKind::DColon => Some(self.parse_label(start)),
            TokenKind::Break => {
                self.bump();
                Some(Stmt::new(start, StmtKind::Break))
            }
            TokenKind::Goto => {
                self.bump();
                let name = self.parse_name().unwrap_or_default();
                Some(Stmt::new(start, StmtKind::Goto(name)))
            }
            TokenKind::Do => {
                self.bump();
                let body = self.parse_block(&[TokenKind::End]);
                self.expect(TokenKind::End, "'end' to close 'do'");
                Some(Stmt::new(start, StmtKind::Block(body)))
            }
            TokenKind::While => Some(self.parse_while(start)),
            TokenKind::Repeat => Some(self.parse_repeat(start)),
            TokenKind::If => Some(self.parse_if(start)),
            TokenKind::For => Some(self.parse_for(start)),
            TokenKind::Function => Some(self.parse_function_stmt(start)),
            TokenKind::Local => Some(self.parse_local(start)),
            _ => Some(self.parse_expr_stmt(start)),
        }
    }

    fn parse_label(&mut self, start: Span) -> Stmt {
        self.bump(); // ::
        let name = self.parse_name().unwrap_or_default();
        self.expect(TokenKind::DColon, "'::' to close label");
        Stmt::new(start, StmtKind::Label(name))
    }

    fn parse_while(&mut self, start: Span) -> Stmt {
        self.bump(); // while
        let cond = self.parse_expr(0);
        self.expect(TokenKind::Do, "'do' after while condition");
        let body = self.parse_block(&[TokenKind::End]);
        self.expect(TokenKind::End, "'end' to close 'while'");
        Stmt::new(start, StmtKind::While { cond, body })
    }

    fn parse_repeat(&mut self, start: Span) -> Stmt {
        self.bump(); // repeat
        let body = self.parse_block(&[TokenKind::Until]);
        self.expect(TokenKind::Until, "'until' to close 'repeat'");
        let cond = self.parse_expr(0);
        Stmt::new(start, StmtKind::Repeat { body, cond })
    }

    fn parse_if(&mut self, start: Span) -> Stmt {
        self.bump(); // if
        let mut branches = Vec::new();
        let cond = self.parse_expr(0);
        self.expect(TokenKind::Then, "'then' after if condition");
        let body = self.parse_block(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::End]);
        branches.push((cond, body));
        while self.check(TokenKind::ElseIf) {
            self.bump();
            let cond = self.parse_expr(0);
            self.expect(TokenKind::Then, "'then' after elseif condition");
            let body = self.parse_block(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::End]);
            branches.push((cond, body));
        }
        let else_block = if self.eat(TokenKind::Else) {
            Some(self.parse_block(&[TokenKind::End]))
        } else {
            None
        };
        self.expect(TokenKind::End, "'end' to close 'if'");
        Stmt::new(
            start,
            StmtKind::If {
                branches,
                else_block,
            },
        )
    }

    fn parse_for(&mut self, start: Span) -> Stmt {
        self.bump(); // for
        let first = self.parse_name().unwrap_or_default();
        if self.eat(TokenKind::Assign) {
            let init_expr = self.parse_expr(0);
            self.expect(TokenKind::Comma, "',' after numeric for start value");
            let stop = self.parse_expr(0);
            let mut init = vec![init_expr, stop];
            if self.eat(TokenKind::Comma) {
                init.push(self.parse_expr(0));
            }
            self.expect(TokenKind::Do, "'do' after numeric for header");
            let body = self.parse_block(&[TokenKind::End]);
            self.expect(TokenKind::End, "'end' to close 'for'");
            Stmt::new(
                start,
                StmtKind::For {
                    kind: ForKind::Numeric,
                    names: vec![first],
                    init,
                    body,
                },
            )
        } else {
            let mut names = vec![first];
            while self.eat(TokenKind::Comma) {
                names.push(self.parse_name().unwrap_or_default());
            }
            self.expect(TokenKind::In, "'in' in generic for");
            let mut init = vec![self.parse_expr(0)];
            while self.eat(TokenKind::Comma) {
                init.push(self.parse_expr(0));
            }
            self.expect(TokenKind::Do, "'do' after generic for header");
            let body = self.parse_block(&[TokenKind::End]);
            self.expect(TokenKind::End, "'end' to close 'for'");
            Stmt::new(
                start,
                StmtKind::For {
                    kind: ForKind::Generic,
                    names,
                    init,
                    body,
                },
            )
        }
    }

    fn parse_function_stmt(&mut self, start: Span) -> Stmt {
        self.bump(); // function
        let mut name = self.parse_name().unwrap_or_default();
        let mut name_expr = Expr::new(
            start,
            ExprKind::Identifier {
                name: name.clone(),
                obfuscated: false,
            },
        );
        let mut is_method = false;
        loop {
            if self.eat(TokenKind::Dot) {
                let field = self.parse_name().unwrap_or_default();
                name = format!("{name}.{field}");
                name_expr = Expr::new(
                    start,
                    ExprKind::Binary {
                        op: BinOp::Index,
                        lhs: Box::new(name_expr),
                        rhs: Box::new(Expr::new(start, ExprKind::Literal(Literal::Str(field)))),
                    },
                );
            } else if self.eat(TokenKind::Colon) {
                let field = self.parse_name().unwrap_or_default();
                name = format!("{name}:{field}");
                name_expr = Expr::new(
                    start,
                    ExprKind::Binary {
                        op: BinOp::Index,
                        lhs: Box::new(name_expr),
                        rhs: Box::new(Expr::new(start, ExprKind::Literal(Literal::Str(field)))),
                    },
                );
                is_method = true;
                break;
            } else {
                break;
            }
        }
        let body = self.parse_function_body(&name, is_method);
        if body.vm_handler {
            self.stats.handlers_seen += 1;
        }
        Stmt::new(
            start,
            StmtKind::FunctionDecl {
                name: name_expr,
                is_local: false,
                body,
            },
        )
    }

    fn parse_local(&mut self, start: Span) -> Stmt {
        self.bump(); // local
        if self.eat(TokenKind::Function) {
            let name = self.parse_name().unwrap_or_default();
            let name_expr = Expr::new(
                start,
                ExprKind::Identifier {
                    name: name.clone(),
                    obfuscated: false,
                },
            );
            let body = self.parse_function_body(&name, false);
            if body.vm_handler {
                self.stats.handlers_seen += 1;
            }
            return Stmt::new(
                start,
                StmtKind::FunctionDecl {
                    name: name_expr,
                    is_local: true,
                    body,
                },
            );
        }

        let mut targets = Vec::new();
        loop {
            let name = self.parse_name().unwrap_or_default();
            // `<const>`/`<close>` attributes (Lua 5.4) are tolerated and
            // discarded; harmless on 5.3 sources that never produce them.
            if self.eat(TokenKind::Lt) {
                self.parse_name();
                self.expect(TokenKind::Gt, "'>' to close local attribute");
            }
            targets.push(Expr::new(
                start,
                ExprKind::Identifier {
                    name,
                    obfuscated: false,
                },
            ));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let mut values = Vec::new();
        if self.eat(TokenKind::Assign) {
            values.push(self.parse_expr(0));
            while self.eat(TokenKind::Comma) {
                values.push(self.parse_expr(0));
            }
        }
        Stmt::new(
            start,
            StmtKind::Assign {
                targets,
                values,
                is_local: true,
            },
        )
    }

    fn parse_function_body(&mut self, name: &str, is_method: bool) -> FunctionBody {
        self.expect(TokenKind::LParen, "'(' to start parameter list");
        let mut params = Vec::new();
        if is_method {
            params.push("self".to_string());
        }
        let mut is_vararg = false;
        if !self.check(TokenKind::RParen) {
            loop {
                if self.eat(TokenKind::Dots) {
                    is_vararg = true;
                    break;
                }
                params.push(self.parse_name().unwrap_or_default());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' to close parameter list");
        let body = self.parse_block(&[TokenKind::End]);
        self.expect(TokenKind::End, "'end' to close function body");

        let (vm_handler, handler_index) = annotate::classify_function_decl(name, &body);
        FunctionBody {
            params,
            is_vararg,
            body,
            vm_handler,
            handler_index,
        }
    }

    fn parse_expr_stmt(&mut self, start: Span) -> Stmt {
        let first = self.parse_suffixed_expr();
        if matches!(self.kind(), TokenKind::Assign | TokenKind::Comma) {
            let mut targets = vec![first];
            while self.eat(TokenKind::Comma) {
                targets.push(self.parse_suffixed_expr());
            }
            self.expect(TokenKind::Assign, "'=' in assignment");
            let mut values = vec![self.parse_expr(0)];
            while self.eat(TokenKind::Comma) {
                values.push(self.parse_expr(0));
            }
            return Stmt::new(
                start,
                StmtKind::Assign {
                    targets,
                    values,
                    is_local: false,
                },
            );
        }
        if !matches!(first.node, ExprKind::Call { .. }) {
            let at = self.span();
            self.errors
                .push(ParseError::new(at, "statement", format!("{:?}", self.kind())));
            self.synchronize();
        }
        Stmt::new(start, StmtKind::ExprStmt(first))
    }

    fn parse_name(&mut self) -> Option<String> {
        if self.check(TokenKind::Name) || self.check(TokenKind::ObfuscatedName) {
            Some(self.bump().lexeme.clone())
        } else {
            let at = self.span();
            let got = format!("{:?}", self.kind());
            self.errors.push(ParseError::new(at, "identifier", got));
            None
        }
    }

    // ---- expressions ----

    fn binop_of(kind: TokenKind) -> Option<(BinOp, u8, bool)> {
        // (op, precedence, right_associative)
        Some(match kind {
            TokenKind::Or => (BinOp::Or, 1, false),
            TokenKind::And => (BinOp::And, 2, false),
            TokenKind::Lt => (BinOp::Lt, 3, false),
            TokenKind::Gt => (BinOp::Gt, 3, false),
            TokenKind::Le => (BinOp::Le, 3, false),
            TokenKind::Ge => (BinOp::Ge, 3, false),
            TokenKind::Ne => (BinOp::Ne, 3, false),
            TokenKind::Eq => (BinOp::Eq, 3, false),
            TokenKind::Pipe => (BinOp::BOr, 4, false),
            TokenKind::Tilde => (BinOp::BXor, 5, false),
            TokenKind::Amp => (BinOp::BAnd, 6, false),
            TokenKind::Shl => (BinOp::Shl, 7, false),
            TokenKind::Shr => (BinOp::Shr, 7, false),
            TokenKind::Concat => (BinOp::Concat, 8, true),
            TokenKind::Plus => (BinOp::Add, 9, false),
            TokenKind::Minus => (BinOp::Sub, 9, false),
            TokenKind::Star => (BinOp::Mul, 10, false),
            TokenKind::Slash => (BinOp::Div, 10, false),
            TokenKind::DSlash => (BinOp::FloorDiv, 10, false),
            TokenKind::Percent => (BinOp::Mod, 10, false),
            TokenKind::Caret => (BinOp::Pow, 12, true),
            _ => return None,
        })
    }

    const UNARY_PREC: u8 = 11;

    fn parse_expr(&mut self, min_prec: u8) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let Some((op, prec, right_assoc)) = Self::binop_of(self.kind()) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let start = lhs.span;
            self.bump();
            let next_min = if right_assoc { prec } else { prec + 1 };
            let rhs = self.parse_expr(next_min);
            let span = start.to(rhs.span);
            lhs = Expr::new(
                span,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.span();
        let op = match self.kind() {
            TokenKind::Not => Some(UnOp::Not),
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Hash => Some(UnOp::Len),
            TokenKind::Tilde => Some(UnOp::BNot),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_expr(Self::UNARY_PREC);
            let span = start.to(operand.span);
            return Expr::new(
                span,
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            );
        }
        self.parse_suffixed_expr()
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.span();
        match self.kind() {
            TokenKind::Nil => {
                self.bump();
                Expr::new(start, ExprKind::Literal(Literal::Nil))
            }
            TokenKind::True => {
                self.bump();
                Expr::new(start, ExprKind::Literal(Literal::Bool(true)))
            }
            TokenKind::False => {
                self.bump();
                Expr::new(start, ExprKind::Literal(Literal::Bool(false)))
            }
            TokenKind::Dots => {
                self.bump();
                Expr::new(start, ExprKind::Vararg)
            }
            TokenKind::Int => {
                let lexeme = self.bump().lexeme.clone();
                let value = parse_lua_int(&lexeme).unwrap_or(0);
                Expr::new(start, ExprKind::Literal(Literal::Int(value)))
            }
            TokenKind::Float => {
                let lexeme = self.bump().lexeme.clone();
                let value = lexeme.parse().unwrap_or(0.0);
                Expr::new(start, ExprKind::Literal(Literal::Float(value)))
            }
            TokenKind::String | TokenKind::LongString => {
                let lexeme = self.bump().lexeme.clone();
                Expr::new(start, ExprKind::Literal(Literal::Str(unquote(&lexeme))))
            }
            TokenKind::EncryptedString => {
                let lexeme = self.bump().lexeme.clone();
                self.stats.encrypted_strings_seen += 1;
                Expr::new(
                    start,
                    ExprKind::EncryptedString {
                        bytes: unquote(&lexeme).into_bytes(),
                        method: None,
                    },
                )
            }
            TokenKind::Name | TokenKind::ObfuscatedName => {
                let obfuscated = self.kind() == TokenKind::ObfuscatedName;
                let name = self.bump().lexeme.clone();
                Expr::new(start, ExprKind::Identifier { name, obfuscated })
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr(0);
                self.expect(TokenKind::RParen, "')' to close parenthesized expression");
                inner
            }
            TokenKind::Function => {
                self.bump();
                let body = self.parse_function_body("<anonymous>", false);
                Expr::new(start, ExprKind::Function(Box::new(body)))
            }
            TokenKind::LBrace => self.parse_table_ctor(start),
            _ => {
                let at = self.span();
                let got = format!("{:?}", self.kind());
                self.errors.push(ParseError::new(at, "expression", got));
                self.bump();
                Expr::new(start, ExprKind::Literal(Literal::Nil))
            }
        }
    }

    fn parse_suffixed_expr(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            let start = expr.span;
            match self.kind() {
                TokenKind::Dot => {
                    self.bump();
                    let field = self.parse_name().unwrap_or_default();
                    let span = start;
                    expr = Expr::new(
                        span,
                        ExprKind::Binary {
                            op: BinOp::Index,
                            lhs: Box::new(expr),
                            rhs: Box::new(Expr::new(span, ExprKind::Literal(Literal::Str(field)))),
                        },
                    );
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.parse_expr(0);
                    self.expect(TokenKind::RBracket, "']' to close index expression");
                    expr = Expr::new(
                        start,
                        ExprKind::Binary {
                            op: BinOp::Index,
                            lhs: Box::new(expr),
                            rhs: Box::new(index),
                        },
                    );
                }
                TokenKind::Colon => {
                    self.bump();
                    let method = self.parse_name().unwrap_or_default();
                    let callee = Expr::new(
                        start,
                        ExprKind::Binary {
                            op: BinOp::Index,
                            lhs: Box::new(expr.clone()),
                            rhs: Box::new(Expr::new(start, ExprKind::Literal(Literal::Str(method)))),
                        },
                    );
                    let mut args = vec![expr];
                    args.extend(self.parse_call_args());
                    let (vm_call, vm_op) = annotate::classify_call(&callee);
                    expr = Expr::new(
                        start,
                        ExprKind::Call {
                            callee: Box::new(callee),
                            args,
                            vm_call,
                            vm_op,
                        },
                    );
                }
                TokenKind::LParen | TokenKind::String | TokenKind::LongString | TokenKind::LBrace => {
                    let (vm_call, vm_op) = annotate::classify_call(&expr);
                    let args = self.parse_call_args();
                    expr = Expr::new(
                        start,
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                            vm_call,
                            vm_op,
                        },
                    );
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_call_args(&mut self) -> Vec<Expr> {
        match self.kind() {
            TokenKind::LParen => {
                self.bump();
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    args.push(self.parse_expr(0));
                    while self.eat(TokenKind::Comma) {
                        args.push(self.parse_expr(0));
                    }
                }
                self.expect(TokenKind::RParen, "')' to close call arguments");
                args
            }
            TokenKind::String | TokenKind::LongString => {
                vec![self.parse_primary()]
            }
            TokenKind::LBrace => {
                let start = self.span();
                vec![self.parse_table_ctor(start)]
            }
            _ => Vec::new(),
        }
    }

    fn parse_table_ctor(&mut self, start: Span) -> Expr {
        self.bump(); // {
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let field = if self.check(TokenKind::LBracket) {
                self.bump();
                let key = self.parse_expr(0);
                self.expect(TokenKind::RBracket, "']' to close table key");
                self.expect(TokenKind::Assign, "'=' after table key");
                let value = self.parse_expr(0);
                TableField {
                    kind: TableFieldKind::Record,
                    key: Some(key),
                    value,
                }
            } else if self.check(TokenKind::Name) && self.peek_is_assign_after_name() {
                let name_span = self.span();
                let name = self.bump().lexeme.clone();
                self.bump(); // =
                let value = self.parse_expr(0);
                TableField {
                    kind: TableFieldKind::Record,
                    key: Some(Expr::new(name_span, ExprKind::Literal(Literal::Str(name)))),
                    value,
                }
            } else {
                TableField {
                    kind: TableFieldKind::List,
                    key: None,
                    value: self.parse_expr(0),
                }
            };
            fields.push(field);
            if !self.eat(TokenKind::Comma) && !self.eat(TokenKind::Semicolon) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close table constructor");
        let constant_table = fields.len() >= 6
            && fields.iter().all(|f| {
                matches!(
                    f.value.node,
                    ExprKind::Literal(_) | ExprKind::EncryptedString { .. }
                )
            });
        if constant_table {
            self.stats.constant_tables_seen += 1;
        }
        Expr::new(
            start,
            ExprKind::TableCtor {
                fields,
                constant_table,
            },
        )
    }

    fn peek_is_assign_after_name(&self) -> bool {
        self.tokens
            .get(self.pos + 1)
            .map(|t| t.kind == TokenKind::Assign)
            .unwrap_or(false)
    }
}

fn unquote(lexeme: &str) -> String {
    let bytes = lexeme.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') {
        return unescape(&lexeme[1..lexeme.len() - 1]);
    }
    // Long-bracket string: `[==[...]==]` or `[[...]]`.
    let mut i = 1;
    while lexeme.as_bytes().get(i) == Some(&b'=') {
        i += 1;
    }
    let inner_start = i + 1;
    let level = i - 1;
    let close = format!("]{}]", "=".repeat(level));
    let inner_end = lexeme.rfind(&close).unwrap_or(lexeme.len());
    lexeme[inner_start..inner_end].to_string()
}

fn unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i] as char);
            i += 1;
            continue;
        }
        i += 1;
        match bytes[i] {
            b'n' => {
                out.push('\n');
                i += 1;
            }
            b't' => {
                out.push('\t');
                i += 1;
            }
            b'r' => {
                out.push('\r');
                i += 1;
            }
            b'a' => {
                out.push('\u{7}');
                i += 1;
            }
            b'b' => {
                out.push('\u{8}');
                i += 1;
            }
            b'\\' | b'"' | b'\'' => {
                out.push(bytes[i] as char);
                i += 1;
            }
            b'x' => {
                i += 1;
                let start = i;
                while i < bytes.len() && i < start + 2 && bytes[i].is_ascii_hexdigit() {
                    i += 1;
                }
                if let Ok(v) = u8::from_str_radix(&s[start..i], 16) {
                    out.push(v as char);
                }
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && i < start + 3 && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if let Ok(v) = s[start..i].parse::<u32>() {
                    out.push((v as u8) as char);
                }
            }
            other => {
                out.push(other as char);
                i += 1;
            }
        }
    }
    out
}

fn parse_lua_int(lexeme: &str) -> Option<i64> {
    if let Some(hex) = lexeme.strip_prefix("0x").or_else(|| lexeme.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    lexeme.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize as lex;

    fn parse_src(src: &str) -> (Ast, Vec<ParseError>, ParserStats) {
        let (tokens, _) = lex(src.as_bytes());
        parse(&tokens)
    }

    #[test]
    fn parses_local_assignment() {
        let (ast, errors, _) = parse_src("local x = 1\n");
        assert!(errors.is_empty());
        assert_eq!(ast.body.len(), 1);
        match &ast.body[0].node {
            StmtKind::Assign { targets, values, is_local } => {
                assert!(*is_local);
                assert_eq!(targets.len(), 1);
                assert_eq!(values.len(), 1);
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn parses_handler_function() {
        let (ast, errors, stats) =
            parse_src("local function handler_1(...) R[0] = R[1] end\n");
        assert!(errors.is_empty());
        assert_eq!(stats.handlers_seen, 1);
        match &ast.body[0].node {
            StmtKind::FunctionDecl { body, .. } => {
                assert!(body.vm_handler);
                assert_eq!(body.handler_index, Some(1));
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn detects_constant_table() {
        let src = r#"local K = {"print", "format", 1, 2, 3, true}"#;
        let (ast, errors, stats) = parse_src(src);
        assert!(errors.is_empty());
        assert_eq!(stats.constant_tables_seen, 1);
        match &ast.body[0].node {
            StmtKind::Assign { values, .. } => match &values[0].node {
                ExprKind::TableCtor { constant_table, .. } => assert!(*constant_table),
                other => panic!("unexpected expr: {other:?}"),
            },
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn parses_if_elseif_else() {
        let (ast, errors, _) =
            parse_src("if a then b() elseif c then d() else e() end\n");
        assert!(errors.is_empty());
        match &ast.body[0].node {
            StmtKind::If { branches, else_block } => {
                assert_eq!(branches.len(), 2);
                assert!(else_block.is_some());
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn precedence_binds_pow_tighter_than_unary_minus() {
        let (ast, errors, _) = parse_src("local x = -2^2\n");
        assert!(errors.is_empty());
        match &ast.body[0].node {
            StmtKind::Assign { values, .. } => match &values[0].node {
                ExprKind::Unary { op, operand } => {
                    assert_eq!(*op, UnOp::Neg);
                    assert!(matches!(operand.node, ExprKind::Binary { op: BinOp::Pow, .. }));
                }
                other => panic!("unexpected expr: {other:?}"),
            },
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn recovers_after_syntax_error() {
        let (ast, errors, _) = parse_src("local = = =\nlocal y = 2\n");
        assert!(!errors.is_empty());
        assert!(ast.body.iter().any(|s| matches!(
            s.node,
            StmtKind::Assign { is_local: true, .. }
        )));
    }

    #[test]
    fn top_level_statement_spans_are_monotonic() {
        let src = "local a = 1\nlocal b = 2\nif a then b() end\nreturn a, b\n";
        let (ast, errors, _) = parse_src(src);
        assert!(errors.is_empty());
        let mut last_start = 0u32;
        for stmt in &ast.body {
            assert!(stmt.span.start >= last_start);
            last_start = stmt.span.start;
        }
    }
}
