use super::classify::{looks_encrypted, looks_obfuscated};
use super::reader::Reader;
use super::token::Token;
use super::token_kind::TokenKind;
use super::LexerStats;

/// Single-pass scanner over the byte stream: a `reset_buff`/`current_bytes`
/// window per lexeme, explicit line/column bookkeeping, and a lexer that
/// never aborts — unrecognized bytes become `Unknown` tokens.
pub struct Lexer<'a> {
    reader: Reader<'a>,
    line: u32,
    line_start_offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Lexer {
            reader: Reader::new(source),
            line: 1,
            line_start_offset: 0,
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, LexerStats) {
        let mut tokens = Vec::new();
        let mut stats = LexerStats::default();

        while !self.reader.is_eof() {
            self.reader.reset_buff();
            let line = self.line;
            let column = (self.reader.pos() - self.line_start_offset) as u32 + 1;
            let byte_offset = self.reader.pos() as u32;

            let kind = self.lex_one();
            let raw = self.reader.current_bytes();
            let lexeme = String::from_utf8_lossy(raw).into_owned();

            stats.record(kind);
            let kind = self.reclassify(kind, &lexeme);
            stats.record_variant(kind);

            tokens.push(Token::new(kind, lexeme, line, column, byte_offset));
        }

        (tokens, stats)
    }

    /// Promotes a plain `String`/`LongString`/`Name` token to its
    /// obfuscation-variant kind when the classifier heuristics fire.
    fn reclassify(&self, kind: TokenKind, lexeme: &str) -> TokenKind {
        match kind {
            TokenKind::String | TokenKind::LongString if looks_encrypted(lexeme) => {
                TokenKind::EncryptedString
            }
            TokenKind::Name if looks_obfuscated(lexeme) => TokenKind::ObfuscatedName,
            other => other,
        }
    }

    fn lex_one(&mut self) -> TokenKind {
        if self.reader.is_eof() {
            return TokenKind::Eof;
        }

        match self.reader.current_byte() {
            b'\n' | b'\r' => self.lex_newline(),
            b' ' | b'\t' | 0x0b | 0x0c => {
                self.reader.eat_while(|b| matches!(b, b' ' | b'\t' | 0x0b | 0x0c));
                TokenKind::Whitespace
            }
            b'-' => {
                self.reader.bump();
                if self.reader.current_byte() != b'-' {
                    return TokenKind::Minus;
                }
                self.reader.bump();
                if self.reader.current_byte() == b'[' {
                    self.reader.bump();
                    let sep = self.reader.eat_when(b'=');
                    if self.reader.current_byte() == b'[' {
                        self.reader.bump();
                        self.lex_long_bracket(sep);
                        return TokenKind::LongComment;
                    }
                }
                self.reader.eat_while(|b| b != b'\n' && b != b'\r');
                TokenKind::ShortComment
            }
            b'[' => {
                self.reader.bump();
                let sep = self.reader.eat_when(b'=');
                if sep == 0 && self.reader.current_byte() != b'[' {
                    return TokenKind::LBracket;
                }
                if self.reader.current_byte() != b'[' {
                    return TokenKind::Unknown;
                }
                self.reader.bump();
                self.lex_long_bracket(sep);
                TokenKind::LongString
            }
            b'=' => {
                self.reader.bump();
                if self.reader.current_byte() == b'=' {
                    self.reader.bump();
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            b'<' => {
                self.reader.bump();
                match self.reader.current_byte() {
                    b'=' => {
                        self.reader.bump();
                        TokenKind::Le
                    }
                    b'<' => {
                        self.reader.bump();
                        TokenKind::Shl
                    }
                    _ => TokenKind::Lt,
                }
            }
            b'>' => {
                self.reader.bump();
                match self.reader.current_byte() {
                    b'=' => {
                        self.reader.bump();
                        TokenKind::Ge
                    }
                    b'>' => {
                        self.reader.bump();
                        TokenKind::Shr
                    }
                    _ => TokenKind::Gt,
                }
            }
            b'~' => {
                self.reader.bump();
                if self.reader.current_byte() == b'=' {
                    self.reader.bump();
                    TokenKind::Ne
                } else {
                    TokenKind::Tilde
                }
            }
            b':' => {
                self.reader.bump();
                if self.reader.current_byte() == b':' {
                    self.reader.bump();
                    TokenKind::DColon
                } else {
                    TokenKind::Colon
                }
            }
            quote @ (b'"' | b'\'') => {
                self.reader.bump();
                self.lex_short_string(quote)
            }
            b'.' => {
                if self.reader.next_byte().is_ascii_digit() {
                    return self.lex_number();
                }
                self.reader.bump();
                if self.reader.current_byte() != b'.' {
                    return TokenKind::Dot;
                }
                self.reader.bump();
                if self.reader.current_byte() != b'.' {
                    return TokenKind::Concat;
                }
                self.reader.bump();
                TokenKind::Dots
            }
            b'0'..=b'9' => self.lex_number(),
            b'/' => {
                self.reader.bump();
                if self.reader.current_byte() == b'/' {
                    self.reader.bump();
                    TokenKind::DSlash
                } else {
                    TokenKind::Slash
                }
            }
            b'*' => {
                self.reader.bump();
                TokenKind::Star
            }
            b'+' => {
                self.reader.bump();
                TokenKind::Plus
            }
            b'%' => {
                self.reader.bump();
                TokenKind::Percent
            }
            b'^' => {
                self.reader.bump();
                TokenKind::Caret
            }
            b'#' => {
                self.reader.bump();
                TokenKind::Hash
            }
            b'&' => {
                self.reader.bump();
                TokenKind::Amp
            }
            b'|' => {
                self.reader.bump();
                TokenKind::Pipe
            }
            b'(' => {
                self.reader.bump();
                TokenKind::LParen
            }
            b')' => {
                self.reader.bump();
                TokenKind::RParen
            }
            b'{' => {
                self.reader.bump();
                TokenKind::LBrace
            }
            b'}' => {
                self.reader.bump();
                TokenKind::RBrace
            }
            b']' => {
                self.reader.bump();
                TokenKind::RBracket
            }
            b';' => {
                self.reader.bump();
                TokenKind::Semicolon
            }
            b',' => {
                self.reader.bump();
                TokenKind::Comma
            }
            b if is_name_start(b) => {
                self.reader.bump();
                self.reader.eat_while(is_name_continue);
                name_to_kind(self.reader.current_bytes())
            }
            _ => {
                self.reader.bump();
                TokenKind::Unknown
            }
        }
    }

    fn lex_newline(&mut self) -> TokenKind {
        let first = self.reader.current_byte();
        self.reader.bump();
        let second = self.reader.current_byte();
        if (first == b'\n' && second == b'\r') || (first == b'\r' && second == b'\n') {
            self.reader.bump();
        }
        self.line += 1;
        self.line_start_offset = self.reader.pos();
        TokenKind::EndOfLine
    }

    fn lex_long_bracket(&mut self, sep: usize) {
        while !self.reader.is_eof() {
            match self.reader.current_byte() {
                b']' => {
                    self.reader.bump();
                    let count = self.reader.eat_when(b'=');
                    if count == sep && self.reader.current_byte() == b']' {
                        self.reader.bump();
                        return;
                    }
                }
                b'\n' | b'\r' => {
                    self.lex_newline();
                }
                _ => self.reader.bump(),
            }
        }
    }

    fn lex_short_string(&mut self, quote: u8) -> TokenKind {
        while !self.reader.is_eof() {
            let b = self.reader.current_byte();
            if b == quote || b == b'\n' || b == b'\r' {
                break;
            }
            if b != b'\\' {
                self.reader.bump();
                continue;
            }
            self.reader.bump();
            if self.reader.is_eof() {
                break;
            }
            match self.reader.current_byte() {
                b'x' => {
                    self.reader.bump();
                    self.reader.eat_while(|b| b.is_ascii_hexdigit());
                }
                b'z' => {
                    self.reader.bump();
                    self.reader.eat_while(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c));
                }
                b'0'..=b'9' => {
                    let mut count = 0;
                    while count < 3 && self.reader.current_byte().is_ascii_digit() {
                        self.reader.bump();
                        count += 1;
                    }
                }
                _ => self.reader.bump(),
            }
        }
        if self.reader.current_byte() == quote {
            self.reader.bump();
        }
        TokenKind::String
    }

    fn lex_number(&mut self) -> TokenKind {
        enum State {
            Int,
            Float,
            Hex,
        }
        let mut state = State::Int;
        let first = self.reader.current_byte();
        self.reader.bump();
        if first == b'0' && matches!(self.reader.current_byte(), b'x' | b'X') {
            self.reader.bump();
            state = State::Hex;
        } else if first == b'.' {
            state = State::Float;
        }

        loop {
            let b = self.reader.current_byte();
            match state {
                State::Int => match b {
                    b'0'..=b'9' => self.reader.bump(),
                    b'.' => {
                        state = State::Float;
                        self.reader.bump();
                    }
                    b'e' | b'E' => {
                        self.reader.bump();
                        if matches!(self.reader.current_byte(), b'+' | b'-') {
                            self.reader.bump();
                        }
                        state = State::Float;
                    }
                    _ => break,
                },
                State::Float => match b {
                    b'0'..=b'9' => self.reader.bump(),
                    b'e' | b'E' => {
                        self.reader.bump();
                        if matches!(self.reader.current_byte(), b'+' | b'-') {
                            self.reader.bump();
                        }
                    }
                    _ => break,
                },
                State::Hex => match b {
                    b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' => self.reader.bump(),
                    b'.' => {
                        state = State::Float;
                        self.reader.bump();
                    }
                    b'p' | b'P' => {
                        self.reader.bump();
                        if matches!(self.reader.current_byte(), b'+' | b'-') {
                            self.reader.bump();
                        }
                        state = State::Float;
                    }
                    _ => break,
                },
            }
        }

        match state {
            State::Int | State::Hex => TokenKind::Int,
            State::Float => TokenKind::Float,
        }
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn name_to_kind(raw: &[u8]) -> TokenKind {
    match raw {
        b"and" => TokenKind::And,
        b"break" => TokenKind::Break,
        b"do" => TokenKind::Do,
        b"else" => TokenKind::Else,
        b"elseif" => TokenKind::ElseIf,
        b"end" => TokenKind::End,
        b"false" => TokenKind::False,
        b"for" => TokenKind::For,
        b"function" => TokenKind::Function,
        b"goto" => TokenKind::Goto,
        b"if" => TokenKind::If,
        b"in" => TokenKind::In,
        b"local" => TokenKind::Local,
        b"nil" => TokenKind::Nil,
        b"not" => TokenKind::Not,
        b"or" => TokenKind::Or,
        b"repeat" => TokenKind::Repeat,
        b"return" => TokenKind::Return,
        b"then" => TokenKind::Then,
        b"true" => TokenKind::True,
        b"until" => TokenKind::Until,
        b"while" => TokenKind::While,
        _ => TokenKind::Name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src.as_bytes())
            .tokenize()
            .0
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect()
    }

    #[test]
    fn lexes_local_assignment() {
        assert_eq!(
            kinds("local x = 1"),
            vec![TokenKind::Local, TokenKind::Name, TokenKind::Assign, TokenKind::Int]
        );
    }

    #[test]
    fn lexes_two_char_operators() {
        assert_eq!(
            kinds("a == b ~= c <= d >= e"),
            vec![
                TokenKind::Name,
                TokenKind::Eq,
                TokenKind::Name,
                TokenKind::Ne,
                TokenKind::Name,
                TokenKind::Le,
                TokenKind::Name,
                TokenKind::Ge,
                TokenKind::Name,
            ]
        );
    }

    #[test]
    fn lexes_long_string() {
        let (tokens, _) = Lexer::new(b"[[hello\nworld]]").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::LongString);
        assert_eq!(tokens[0].lexeme, "[[hello\nworld]]");
    }

    #[test]
    fn lexes_long_string_with_level() {
        let (tokens, _) = Lexer::new(b"[==[a]]==]").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::LongString);
    }

    #[test]
    fn unknown_byte_does_not_abort() {
        let (tokens, stats) = Lexer::new(b"local x = 1 \x01 return x").tokenize();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Unknown));
        assert_eq!(stats.unknown_count, 1);
    }

    #[test]
    fn round_trip_reconstructs_source() {
        let src = "local x = 1\nif x then\n  return x\nend\n";
        let (tokens, _) = Lexer::new(src.as_bytes()).tokenize();
        let rebuilt: String = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(rebuilt, src);
    }

    #[test]
    fn obfuscated_name_is_flagged() {
        let (tokens, _) = Lexer::new(b"local lIl1oO0 = 1").tokenize();
        let name = tokens.iter().find(|t| t.kind == TokenKind::ObfuscatedName);
        assert!(name.is_some());
    }

    #[test]
    fn encrypted_string_is_flagged() {
        let (tokens, _) = Lexer::new(br#"local x = "\x41\x42\x43""#).tokenize();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::EncryptedString));
    }
}
