//! The `looks_like_luraph` admission gate: cheap textual/shape checks plus
//! one AST-level check, any one of which is enough to proceed.

use crate::ast::Ast;
use crate::lexer::{Token, TokenKind};
use crate::vm;

const KEYWORDS: [&str; 4] = ["luraph", "lura.ph", "protected using luraph", "obfuscator"];

pub fn looks_like_luraph(source: &str, tokens: &[Token], ast: &Ast) -> bool {
    has_keyword(source) || count_shape_patterns(source, tokens) >= 2 || ast_shape_matches(ast)
}

fn has_keyword(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    KEYWORDS.iter().any(|k| lower.contains(k))
}

fn count_shape_patterns(source: &str, tokens: &[Token]) -> usize {
    let mut count = 0;
    if source.contains("R[") {
        count += 1;
    }
    if source.contains("K[") {
        count += 1;
    }
    if contains_handler_digit(source) {
        count += 1;
    }
    if contains_vm_prefix(source) {
        count += 1;
    }
    if contains_hex_literal(source) {
        count += 1;
    }
    if tokens.iter().any(|t| {
        matches!(t.kind, TokenKind::Name | TokenKind::ObfuscatedName) && t.lexeme.len() > 15
    }) {
        count += 1;
    }
    count
}

fn contains_handler_digit(source: &str) -> bool {
    let bytes = source.as_bytes();
    source.match_indices("handler_").any(|(start, m)| {
        bytes
            .get(start + m.len())
            .map(|b| b.is_ascii_digit())
            .unwrap_or(false)
    })
}

fn contains_vm_prefix(source: &str) -> bool {
    let bytes = source.as_bytes();
    source.match_indices("vm_").any(|(start, _)| {
        let after = start + 3;
        bytes
            .get(after)
            .map(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .unwrap_or(false)
    })
}

fn contains_hex_literal(source: &str) -> bool {
    let bytes = source.as_bytes();
    source.match_indices("0x").any(|(start, _)| {
        bytes
            .get(start + 2)
            .map(|b| b.is_ascii_hexdigit())
            .unwrap_or(false)
    })
}

fn ast_shape_matches(ast: &Ast) -> bool {
    let (handlers, _) = vm::extract_handlers(ast);
    !handlers.is_empty() && vm::has_encrypted_strings(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn check(src: &str) -> bool {
        let (tokens, _) = tokenize(src.as_bytes());
        let (ast, _, _) = parse(&tokens);
        looks_like_luraph(src, &tokens, &ast)
    }

    #[test]
    fn plain_lua_is_rejected() {
        assert!(!check("print(\"hello\")\n"));
    }

    #[test]
    fn keyword_mention_is_accepted() {
        assert!(check("-- protected using luraph\nprint(1)"));
    }

    #[test]
    fn enough_shape_patterns_are_accepted() {
        assert!(check("local x = R[0] local y = K[1] local z = 0xFF"));
    }

    #[test]
    fn ast_shape_is_accepted() {
        let src = "local key = \"0123456789abcdef0123456789abcdef\"\n\
             function handler_1(a) R[0] = \"\\x41\\x42\\x43\\x44\" end\n";
        assert!(check(src));
    }
}
