use crate::lexer::{tokenize, TokenKind};

/// Scans source text for strings shaped like an embedded Luraph key: a long
/// hex run, a long Base64-alphabet run, or the right-hand side of a `local
/// x = "..."` declaration with a literal at least 16 bytes long. Every
/// candidate is tried by the analyzer's auto-detect flow.
pub fn extract_candidate_keys(source: &str) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    scan_hex_runs(source, &mut out);
    scan_base64_runs(source, &mut out);
    scan_local_string_rhs(source, &mut out);
    out
}

fn scan_hex_runs(source: &str, out: &mut Vec<Vec<u8>>) {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_hexdigit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                i += 1;
            }
            if i - start >= 32 {
                if let Ok(key) = hex::decode(&source[start..start + 32]) {
                    out.push(key);
                }
            }
        } else {
            i += 1;
        }
    }
}

fn is_base64_alphabet(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='
}

fn scan_base64_runs(source: &str, out: &mut Vec<Vec<u8>>) {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if is_base64_alphabet(bytes[i]) {
            let start = i;
            while i < bytes.len() && is_base64_alphabet(bytes[i]) {
                i += 1;
            }
            if i - start >= 16 {
                out.push(source[start..i].as_bytes().to_vec());
            }
        } else {
            i += 1;
        }
    }
}

fn strip_quotes(lexeme: &str) -> String {
    let bytes = lexeme.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') {
        lexeme[1..lexeme.len() - 1].to_string()
    } else {
        lexeme.to_string()
    }
}

fn scan_local_string_rhs(source: &str, out: &mut Vec<Vec<u8>>) {
    let (tokens, _) = tokenize(source.as_bytes());
    let toks: Vec<_> = tokens.into_iter().filter(|t| !t.kind.is_trivia()).collect();
    for w in toks.windows(4) {
        let is_local_name = w[0].kind == TokenKind::Local
            && matches!(w[1].kind, TokenKind::Name | TokenKind::ObfuscatedName)
            && w[2].kind == TokenKind::Assign;
        if !is_local_name {
            continue;
        }
        if !matches!(
            w[3].kind,
            TokenKind::String | TokenKind::EncryptedString
        ) {
            continue;
        }
        let content = strip_quotes(&w[3].lexeme);
        if content.len() >= 16 {
            out.push(content.into_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_hex_run() {
        let src = "local k = \"0123456789abcdef0123456789abcdef\"";
        let keys = extract_candidate_keys(src);
        assert!(keys.iter().any(|k| k.len() == 16));
    }

    #[test]
    fn finds_local_string_rhs() {
        let src = r#"local key = "this_is_a_long_enough_key""#;
        let keys = extract_candidate_keys(src);
        assert!(keys
            .iter()
            .any(|k| k == b"this_is_a_long_enough_key"));
    }

    #[test]
    fn ignores_short_strings() {
        let src = r#"local k = "short""#;
        let keys = extract_candidate_keys(src);
        assert!(!keys.iter().any(|k| k == b"short"));
    }
}
