//! Script lexer.
//!
//! A pull-based scanner with one byte of look-ahead, run to completion over
//! a script to produce the token stream. String literals are captured raw
//! (escapes and `#{…}` interpolations intact, nesting honored); the parser
//! decodes them. `#` begins a comment outside strings; newlines and `;`
//! are statement separators and survive as tokens.

use core_status::{Outcome, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
    And,
    Break,
    Constrain,
    Defn,
    Else,
    Elsif,
    Endif,
    Endloop,
    Endmacro,
    False,
    For,
    Force,
    If,
    In,
    Loop,
    Macro,
    Next,
    Nil,
    Not,
    Or,
    Return,
    True,
    Until,
    While,
}

const KEYWORDS: [(&str, Kw); 24] = [
    ("and", Kw::And),
    ("break", Kw::Break),
    ("constrain", Kw::Constrain),
    ("defn", Kw::Defn),
    ("else", Kw::Else),
    ("elsif", Kw::Elsif),
    ("endif", Kw::Endif),
    ("endloop", Kw::Endloop),
    ("endmacro", Kw::Endmacro),
    ("false", Kw::False),
    ("for", Kw::For),
    ("force", Kw::Force),
    ("if", Kw::If),
    ("in", Kw::In),
    ("loop", Kw::Loop),
    ("macro", Kw::Macro),
    ("next", Kw::Next),
    ("nil", Kw::Nil),
    ("not", Kw::Not),
    ("or", Kw::Or),
    ("return", Kw::Return),
    ("true", Kw::True),
    ("until", Kw::Until),
    ("while", Kw::While),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    /// Identifier with a trailing `?` (predicate form).
    IdentQ(String),
    /// `$name`: global user or system variable (name excludes the sigil).
    GVar(String),
    /// `$N`: positional macro argument.
    NVar(u16),
    Int(i64),
    /// Raw string literal body; `interp` when double-quoted (escapes and
    /// `#{…}` active).
    Str { raw: String, interp: bool },
    Kw(Kw),

    // Operators, mirroring the two-character trie.
    Not,      // !
    Ne,       // !=
    RNe,      // !~
    Mod,      // %
    AsMod,    // %=
    BAnd,     // &
    AndAnd,   // &&
    AsBAnd,   // &=
    LParen,
    RParen,
    Mul,      // *
    Pow,      // **
    AsMul,    // *=
    Plus,     // +
    Incr,     // ++
    AsAdd,    // +=
    Comma,
    Minus,    // -
    Decr,     // --
    AsSub,    // -=
    Div,      // /
    AsDiv,    // /=
    Colon,
    Lt,       // <
    Lsh,      // <<
    AsLsh,    // <<=
    Le,       // <=
    Assign,   // =
    EqEq,     // ==
    NArg,     // =>
    REq,      // =~
    Gt,       // >
    Ge,       // >=
    Rsh,      // >>
    AsRsh,    // >>=
    Hook,     // ?
    LBrkt,
    RBrkt,
    BXor,     // ^
    AsBXor,   // ^=
    LBrace,
    RBrace,
    BOr,      // |
    OrOr,     // ||
    AsBOr,    // |=
    BNot,     // ~

    /// Statement separator: newline or `;`.
    Sep,
}

fn is_ident1(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { src: src.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, msg: impl Into<String>) -> Status {
        Status::failure(msg.into())
    }

    /// Tokenize the whole source.
    pub fn tokenize(mut self) -> Outcome<Vec<Tok>> {
        let mut out = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' => {
                    self.pos += 1;
                }
                b'\n' | b';' => {
                    self.pos += 1;
                    if out.last() != Some(&Tok::Sep) {
                        out.push(Tok::Sep);
                    }
                }
                b'#' => {
                    // Comment to end of line.
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.pos += 1;
                    }
                }
                b'"' | b'\'' => {
                    let raw = self.string_body(c)?;
                    out.push(Tok::Str { raw, interp: c == b'"' });
                }
                b'?' => {
                    // `? ` is the ternary hook; `?c` is a character literal.
                    match self.peek2() {
                        None | Some(b' ') | Some(b'\t') | Some(b'\n') => {
                            self.pos += 1;
                            out.push(Tok::Hook);
                        }
                        Some(_) => {
                            self.pos += 1;
                            out.push(Tok::Int(i64::from(self.char_literal()?)));
                        }
                    }
                }
                b'0'..=b'9' => out.push(self.number()?),
                b'$' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(d) if d.is_ascii_digit() => {
                            let mut value: u32 = 0;
                            while let Some(d) = self.peek().filter(u8::is_ascii_digit) {
                                value = value * 10 + u32::from(d - b'0');
                                self.pos += 1;
                            }
                            if value > u32::from(u16::MAX) {
                                return Err(self.error("Macro argument number out of range"));
                            }
                            out.push(Tok::NVar(value as u16));
                        }
                        Some(c) if is_ident1(c) => {
                            let name = self.ident_text();
                            out.push(Tok::GVar(name));
                        }
                        _ => return Err(self.error("Unexpected token '$'")),
                    }
                }
                c if is_ident1(c) => {
                    let name = self.ident_text();
                    if self.peek() == Some(b'?') {
                        // A trailing '?' marks a predicate identifier.
                        self.pos += 1;
                        out.push(Tok::IdentQ(name));
                    } else {
                        match KEYWORDS.iter().find(|(kw, _)| *kw == name) {
                            Some((_, kw)) => out.push(Tok::Kw(*kw)),
                            None => out.push(Tok::Ident(name)),
                        }
                    }
                }
                _ => out.push(self.operator()?),
            }
        }
        if out.last() != Some(&Tok::Sep) {
            out.push(Tok::Sep);
        }
        Ok(out)
    }

    fn ident_text(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn number(&mut self) -> Outcome<Tok> {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek2(), Some(b'x' | b'X')) {
            self.pos += 2;
            let digits = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            if self.pos == digits {
                return Err(self.error("Invalid number '0x'"));
            }
            let text = std::str::from_utf8(&self.src[digits..self.pos]).expect("hex digits");
            let value = i64::from_str_radix(text, 16)
                .map_err(|_| self.error(format!("Invalid number '{text}'")))?;
            return Ok(Tok::Int(value));
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).expect("digits");
        let value: i64 =
            text.parse().map_err(|_| self.error(format!("Invalid number '{text}'")))?;
        Ok(Tok::Int(value))
    }

    /// Decode a `?c` character literal (after the `?`).
    fn char_literal(&mut self) -> Outcome<u8> {
        match self.bump() {
            Some(b'\\') => decode_escape(self.src, &mut self.pos)
                .ok_or_else(|| self.error("Invalid character literal")),
            Some(c) => Ok(c),
            None => Err(self.error("Invalid character literal")),
        }
    }

    /// Capture a string body up to the matching close quote, honoring
    /// escape characters and nested `#{…}` interpolations.
    fn string_body(&mut self, quote: u8) -> Outcome<String> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        self.skip_string(quote)?;
        let body = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        if self.bump() != Some(quote) {
            let shown = String::from_utf8_lossy(&self.src[open..self.pos.min(open + 24)]);
            return Err(self.error(format!("Unterminated string {shown}")));
        }
        Ok(body)
    }

    // Advance to the terminator, recursing for embedded strings and
    // interpolations.
    fn skip_string(&mut self, term: u8) -> Outcome<()> {
        while let Some(c) = self.peek() {
            if c == term {
                return Ok(());
            }
            match c {
                b'\\' => {
                    if self.peek2().is_none() {
                        break;
                    }
                    self.pos += 2;
                }
                b'#' if term == b'"' && self.peek2() == Some(b'{') => {
                    self.pos += 2;
                    self.skip_interp()?;
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error("Unterminated string"))
    }

    // Inside `#{…}`: strings may nest, braces balance.
    fn skip_interp(&mut self) -> Outcome<()> {
        let mut depth = 1;
        while let Some(c) = self.bump() {
            match c {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                b'"' | b'\'' => {
                    self.skip_string(c)?;
                    self.bump();
                }
                _ => {}
            }
        }
        Err(self.error("Unterminated string"))
    }

    fn operator(&mut self) -> Outcome<Tok> {
        let c = self.bump().expect("caller checked");
        let next = self.peek();
        match c {
            b'!' => match next {
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::Ne)
                },
                Some(b'~') => {
                    self.pos += 1;
                    Ok(Tok::RNe)
                },
                _ => Ok(Tok::Not),
            },
            b'%' => match next {
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::AsMod)
                },
                _ => Ok(Tok::Mod),
            },
            b'&' => match next {
                Some(b'&') => {
                    self.pos += 1;
                    Ok(Tok::AndAnd)
                },
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::AsBAnd)
                },
                _ => Ok(Tok::BAnd),
            },
            b'(' => Ok(Tok::LParen),
            b')' => Ok(Tok::RParen),
            b'*' => match next {
                Some(b'*') => {
                    self.pos += 1;
                    Ok(Tok::Pow)
                },
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::AsMul)
                },
                _ => Ok(Tok::Mul),
            },
            b'+' => match next {
                Some(b'+') => {
                    self.pos += 1;
                    Ok(Tok::Incr)
                },
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::AsAdd)
                },
                _ => Ok(Tok::Plus),
            },
            b',' => Ok(Tok::Comma),
            b'-' => match next {
                Some(b'-') => {
                    self.pos += 1;
                    Ok(Tok::Decr)
                },
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::AsSub)
                },
                _ => Ok(Tok::Minus),
            },
            b'/' => match next {
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::AsDiv)
                },
                _ => Ok(Tok::Div),
            },
            b':' => Ok(Tok::Colon),
            b'<' => match next {
                Some(b'<') => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        Ok(Tok::AsLsh)
                    } else {
                        Ok(Tok::Lsh)
                    }
                }
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::Le)
                },
                _ => Ok(Tok::Lt),
            },
            b'=' => match next {
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::EqEq)
                },
                Some(b'>') => {
                    self.pos += 1;
                    Ok(Tok::NArg)
                },
                Some(b'~') => {
                    self.pos += 1;
                    Ok(Tok::REq)
                },
                _ => Ok(Tok::Assign),
            },
            b'>' => match next {
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::Ge)
                },
                Some(b'>') => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        Ok(Tok::AsRsh)
                    } else {
                        Ok(Tok::Rsh)
                    }
                }
                _ => Ok(Tok::Gt),
            },
            b'[' => Ok(Tok::LBrkt),
            b']' => Ok(Tok::RBrkt),
            b'^' => match next {
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::AsBXor)
                },
                _ => Ok(Tok::BXor),
            },
            b'{' => Ok(Tok::LBrace),
            b'}' => Ok(Tok::RBrace),
            b'|' => match next {
                Some(b'|') => {
                    self.pos += 1;
                    Ok(Tok::OrOr)
                },
                Some(b'=') => {
                    self.pos += 1;
                    Ok(Tok::AsBOr)
                },
                _ => Ok(Tok::BOr),
            },
            b'~' => Ok(Tok::BNot),
            other => Err(self.error(format!("Unexpected token '{}'", other as char))),
        }
    }
}

/// Decode a backslash escape at `pos` (pointing after the backslash).
/// Handles `\n \t \r \e \s \f`, octal `\NNN`, hex `\xNN`, and identity for
/// anything else. Returns the byte and advances `pos`.
pub fn decode_escape(src: &[u8], pos: &mut usize) -> Option<u8> {
    let c = *src.get(*pos)?;
    *pos += 1;
    Some(match c {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        b'e' => 0x1B,
        b's' => b' ',
        b'f' => 0x0C,
        b'x' => {
            let mut value: u32 = 0;
            let mut digits = 0;
            while digits < 2 && src.get(*pos).is_some_and(u8::is_ascii_hexdigit) {
                let d = src[*pos];
                value = value * 16
                    + u32::from(match d {
                        b'0'..=b'9' => d - b'0',
                        b'a'..=b'f' => d - b'a' + 10,
                        _ => d - b'A' + 10,
                    });
                *pos += 1;
                digits += 1;
            }
            if digits == 0 {
                return None;
            }
            value as u8
        }
        b'0'..=b'7' => {
            let mut value: u32 = u32::from(c - b'0');
            let mut digits = 1;
            while digits < 3 && src.get(*pos).is_some_and(|&d| (b'0'..=b'7').contains(&d)) {
                value = value * 8 + u32::from(src[*pos] - b'0');
                *pos += 1;
                digits += 1;
            }
            value as u8
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Tok> {
        Lexer::new(src).tokenize().unwrap()
    }

    #[test]
    fn identifiers_and_keywords() {
        assert_eq!(
            lex("if foo endif"),
            vec![Tok::Kw(Kw::If), Tok::Ident("foo".into()), Tok::Kw(Kw::Endif), Tok::Sep]
        );
        assert_eq!(lex("empty?"), vec![Tok::IdentQ("empty".into()), Tok::Sep]);
    }

    #[test]
    fn numbers() {
        assert_eq!(lex("42 0x2A"), vec![Tok::Int(42), Tok::Int(42), Tok::Sep]);
    }

    #[test]
    fn dollar_variables() {
        assert_eq!(
            lex("$searchPat $1 $0"),
            vec![Tok::GVar("searchPat".into()), Tok::NVar(1), Tok::NVar(0), Tok::Sep]
        );
    }

    #[test]
    fn operator_trie_longest_match() {
        assert_eq!(
            lex("a <<= b >> c != d =~ e ** f"),
            vec![
                Tok::Ident("a".into()),
                Tok::AsLsh,
                Tok::Ident("b".into()),
                Tok::Rsh,
                Tok::Ident("c".into()),
                Tok::Ne,
                Tok::Ident("d".into()),
                Tok::REq,
                Tok::Ident("e".into()),
                Tok::Pow,
                Tok::Ident("f".into()),
                Tok::Sep,
            ]
        );
    }

    #[test]
    fn char_literal_and_hook() {
        assert_eq!(lex("?a"), vec![Tok::Int(97), Tok::Sep]);
        assert_eq!(lex("?\\n"), vec![Tok::Int(10), Tok::Sep]);
        assert_eq!(
            lex("a ? b : c"),
            vec![
                Tok::Ident("a".into()),
                Tok::Hook,
                Tok::Ident("b".into()),
                Tok::Colon,
                Tok::Ident("c".into()),
                Tok::Sep,
            ]
        );
    }

    #[test]
    fn strings_stay_raw() {
        assert_eq!(
            lex(r#""a\nb#{1 + 2}c""#),
            vec![Tok::Str { raw: "a\\nb#{1 + 2}c".into(), interp: true }, Tok::Sep]
        );
        assert_eq!(lex("'x\\n'"), vec![Tok::Str { raw: "x\\n".into(), interp: false }, Tok::Sep]);
    }

    #[test]
    fn interpolation_nests_strings() {
        let toks = lex(r#""a#{f("}")}b""#);
        assert_eq!(toks, vec![Tok::Str { raw: "a#{f(\"}\")}b".into(), interp: true }, Tok::Sep]);
    }

    #[test]
    fn comments_and_separators() {
        assert_eq!(
            lex("a # comment\nb; c"),
            vec![
                Tok::Ident("a".into()),
                Tok::Sep,
                Tok::Ident("b".into()),
                Tok::Sep,
                Tok::Ident("c".into()),
                Tok::Sep,
            ]
        );
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(Lexer::new("\"abc").tokenize().is_err());
    }

    #[test]
    fn escapes_decode() {
        let src = b"n t x41 101 q";
        let mut pos = 0;
        assert_eq!(decode_escape(src, &mut pos), Some(b'\n'));
        pos = 2;
        assert_eq!(decode_escape(src, &mut pos), Some(b'\t'));
        pos = 4;
        assert_eq!(decode_escape(src, &mut pos), Some(0x41));
        pos = 8;
        assert_eq!(decode_escape(src, &mut pos), Some(0o101));
        pos = 12;
        assert_eq!(decode_escape(src, &mut pos), Some(b'q'));
    }
}
