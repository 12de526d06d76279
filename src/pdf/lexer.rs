//! Tokenizer for PDF syntax, shared by the file reader and the
//! content-stream interpreter.
//!
//! The lexer never fails: unrecognizable bytes come back as (possibly
//! empty) keywords and the caller decides what to skip.

/// Scratch space reused across [`Lexer::next`] calls.
#[derive(Debug, Default)]
pub struct LexBuf {
    pub bytes: Vec<u8>,
    pub int: i64,
    pub real: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Eof,
    /// `[`
    OpenArray,
    /// `]`
    CloseArray,
    /// `<<`
    OpenDict,
    /// `>>`
    CloseDict,
    /// `/Name`, bytes in the buffer.
    Name,
    /// Integer, value in `buf.int`.
    Int,
    /// Real, value in `buf.real`.
    Real,
    /// Literal or hex string, bytes in the buffer.
    String,
    /// Bare keyword (operators, `obj`, `endstream`, ...), bytes in the
    /// buffer.
    Keyword,
    True,
    False,
    Null,
}

pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Lexer<'a> {
        Lexer { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(b) = self.bump() {
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Next token; string/name/keyword bytes land in `buf.bytes`.
    pub fn next(&mut self, buf: &mut LexBuf) -> Token {
        self.skip_whitespace_and_comments();
        buf.bytes.clear();
        let Some(b) = self.bump() else { return Token::Eof };
        match b {
            b'[' => Token::OpenArray,
            b']' => Token::CloseArray,
            b'<' => {
                if self.peek() == Some(b'<') {
                    self.pos += 1;
                    Token::OpenDict
                } else {
                    self.lex_hex_string(buf)
                }
            }
            b'>' => {
                if self.peek() == Some(b'>') {
                    self.pos += 1;
                }
                Token::CloseDict
            }
            b'/' => self.lex_name(buf),
            b'(' => self.lex_string(buf),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.lex_number(b, buf),
            b')' | b'{' | b'}' => Token::Keyword,
            _ => self.lex_keyword(b, buf),
        }
    }

    fn lex_name(&mut self, buf: &mut LexBuf) -> Token {
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
            if b == b'#' {
                // Two-digit hex escape; a malformed escape keeps the '#'.
                let hi = self.peek().and_then(hex_value);
                if let Some(hi) = hi {
                    self.pos += 1;
                    let lo = self.peek().and_then(hex_value);
                    if let Some(lo) = lo {
                        self.pos += 1;
                        buf.bytes.push(hi << 4 | lo);
                        continue;
                    }
                    buf.bytes.push(b'#');
                    buf.bytes.push(b"0123456789abcdef"[hi as usize]);
                    continue;
                }
                buf.bytes.push(b'#');
            } else {
                buf.bytes.push(b);
            }
        }
        Token::Name
    }

    fn lex_string(&mut self, buf: &mut LexBuf) -> Token {
        let mut depth = 1usize;
        while let Some(b) = self.bump() {
            match b {
                b'(' => {
                    depth += 1;
                    buf.bytes.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    buf.bytes.push(b);
                }
                b'\\' => {
                    let Some(esc) = self.bump() else { break };
                    match esc {
                        b'n' => buf.bytes.push(b'\n'),
                        b'r' => buf.bytes.push(b'\r'),
                        b't' => buf.bytes.push(b'\t'),
                        b'b' => buf.bytes.push(8),
                        b'f' => buf.bytes.push(12),
                        b'\n' => {}
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'0'..=b'7' => {
                            let mut v = (esc - b'0') as u32;
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        self.pos += 1;
                                        v = v * 8 + (d - b'0') as u32;
                                    }
                                    _ => break,
                                }
                            }
                            buf.bytes.push(v as u8);
                        }
                        other => buf.bytes.push(other),
                    }
                }
                _ => buf.bytes.push(b),
            }
        }
        Token::String
    }

    fn lex_hex_string(&mut self, buf: &mut LexBuf) -> Token {
        let mut hi: Option<u8> = None;
        while let Some(b) = self.bump() {
            if b == b'>' {
                break;
            }
            let Some(v) = hex_value(b) else { continue };
            match hi.take() {
                None => hi = Some(v),
                Some(h) => buf.bytes.push(h << 4 | v),
            }
        }
        // An odd final digit acts as if followed by zero.
        if let Some(h) = hi {
            buf.bytes.push(h << 4);
        }
        Token::String
    }

    fn lex_number(&mut self, first: u8, buf: &mut LexBuf) -> Token {
        buf.bytes.push(first);
        let mut is_real = first == b'.';
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {
                    self.pos += 1;
                    buf.bytes.push(b);
                }
                b'.' => {
                    self.pos += 1;
                    buf.bytes.push(b);
                    is_real = true;
                }
                // Sign or exponent characters inside a number are producer
                // bugs; terminate the token there.
                _ => break,
            }
        }
        let text = std::str::from_utf8(&buf.bytes).unwrap_or("0");
        if is_real {
            buf.real = parse_permissive_real(text);
            Token::Real
        } else {
            match text.parse::<i64>() {
                Ok(v) => {
                    buf.int = v;
                    Token::Int
                }
                Err(_) => {
                    buf.real = parse_permissive_real(text);
                    Token::Real
                }
            }
        }
    }

    fn lex_keyword(&mut self, first: u8, buf: &mut LexBuf) -> Token {
        buf.bytes.push(first);
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
            buf.bytes.push(b);
        }
        match buf.bytes.as_slice() {
            b"true" => Token::True,
            b"false" => Token::False,
            b"null" => Token::Null,
            _ => Token::Keyword,
        }
    }
}

/// Tolerates trailing dots and multiple dots the way real producers emit
/// them; unparseable text is zero.
fn parse_permissive_real(text: &str) -> f64 {
    if let Ok(v) = text.parse::<f64>() {
        return v;
    }
    // "1.2.3" or "5." - take the longest valid prefix.
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in text.char_indices() {
        match c {
            '0'..='9' => end = i + 1,
            '+' | '-' if i == 0 => end = i + 1,
            '.' if !seen_dot => {
                seen_dot = true;
                end = i + 1;
            }
            _ => break,
        }
    }
    text[..end].trim_end_matches('.').parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tokens(data: &[u8]) -> Vec<(Token, Vec<u8>)> {
        let mut lx = Lexer::new(data);
        let mut buf = LexBuf::default();
        let mut out = Vec::new();
        loop {
            let t = lx.next(&mut buf);
            if t == Token::Eof {
                break;
            }
            out.push((t, buf.bytes.clone()));
        }
        out
    }

    #[test]
    fn basic_stream_tokens() {
        let toks = all_tokens(b"0.5 0 0 rg /F1 12 Tf [1 2] << /K true >>");
        let kinds: Vec<Token> = toks.iter().map(|t| t.0).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Real,
                Token::Int,
                Token::Int,
                Token::Keyword,
                Token::Name,
                Token::Int,
                Token::Keyword,
                Token::OpenArray,
                Token::Int,
                Token::Int,
                Token::CloseArray,
                Token::OpenDict,
                Token::Name,
                Token::True,
                Token::CloseDict,
            ]
        );
        assert_eq!(toks[4].1, b"F1");
    }

    #[test]
    fn numbers() {
        let mut lx = Lexer::new(b"42 -7 3.25 .5 -.25 5. 1.2.3");
        let mut buf = LexBuf::default();
        assert_eq!(lx.next(&mut buf), Token::Int);
        assert_eq!(buf.int, 42);
        assert_eq!(lx.next(&mut buf), Token::Int);
        assert_eq!(buf.int, -7);
        assert_eq!(lx.next(&mut buf), Token::Real);
        assert_eq!(buf.real, 3.25);
        assert_eq!(lx.next(&mut buf), Token::Real);
        assert_eq!(buf.real, 0.5);
        assert_eq!(lx.next(&mut buf), Token::Real);
        assert_eq!(buf.real, -0.25);
        assert_eq!(lx.next(&mut buf), Token::Real);
        assert_eq!(buf.real, 5.0);
        assert_eq!(lx.next(&mut buf), Token::Real);
        assert_eq!(buf.real, 1.2);
    }

    #[test]
    fn strings_with_escapes() {
        let toks = all_tokens(b"(simple) (with (nested) parens) (esc\\n\\051\\\\)");
        assert_eq!(toks[0].1, b"simple");
        assert_eq!(toks[1].1, b"with (nested) parens");
        assert_eq!(toks[2].1, b"esc\n)\\");
    }

    #[test]
    fn hex_strings() {
        let toks = all_tokens(b"<48656C6C6F> <48656C6C6F7>");
        assert_eq!(toks[0].1, b"Hello");
        // Odd digit count: final nibble padded with zero.
        assert_eq!(toks[1].1, b"Hellop");
    }

    #[test]
    fn names_with_hex_escapes() {
        let toks = all_tokens(b"/A#20B /Plain");
        assert_eq!(toks[0].1, b"A B");
        assert_eq!(toks[1].1, b"Plain");
    }

    #[test]
    fn comments_skipped() {
        let toks = all_tokens(b"1 % a comment\n2");
        assert_eq!(toks.len(), 2);
    }

    #[test]
    fn garbage_survives() {
        let toks = all_tokens(b") } { weird");
        assert_eq!(toks.len(), 4);
        assert_eq!(toks[3].0, Token::Keyword);
        assert_eq!(toks[3].1, b"weird");
    }
}
