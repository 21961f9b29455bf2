const KEYWORDS: [&str; 21] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

const OPERATORS: [&str; 16] = [
    "==", "~=", "<=", ">=", "..", "::", "+", "-", "*", "/", "%", "^", "#", "<", ">", "=",
];

/// Deterministic plausibility score for a candidate plaintext: higher means
/// "looks more like Lua source". Used to rank `auto`-mode decryption
/// attempts against each other.
pub fn score_plaintext(bytes: &[u8]) -> i64 {
    let text = String::from_utf8_lossy(bytes);
    let mut score: i64 = 0;

    for kw in KEYWORDS {
        score += 10 * text.matches(kw).count() as i64;
    }
    for op in OPERATORS {
        score += 2 * text.matches(op).count() as i64;
    }
    if text.contains("function") && text.contains("end") {
        score += 20;
    }
    if text.contains("local") {
        score += 15;
    }
    if text.contains("print") {
        score += 10;
    }

    let non_printable = bytes
        .iter()
        .filter(|&&b| !((0x20..0x7f).contains(&b) || matches!(b, b'\t' | b'\n' | b'\r')))
        .count();
    score -= 5 * non_printable as i64;

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lua_like_text_scores_higher_than_noise() {
        let lua = score_plaintext(b"local function f() return 1 end");
        let noise = score_plaintext(&[0u8, 1, 2, 3, 255, 254, 253]);
        assert!(lua > noise);
    }

    #[test]
    fn print_and_local_add_fixed_bonuses() {
        let base = score_plaintext(b"x");
        let with_print = score_plaintext(b"xprint");
        assert_eq!(with_print - base, 10);
    }
}
