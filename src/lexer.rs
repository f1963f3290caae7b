//! Lexer for the supported JavaScript subset
//!
//! TypeScript annotation tokens are produced too; the parser skips them.

use std::iter::Peekable;
use std::str::CharIndices;

/// Byte range of a token or node, with the line and column it starts at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    True,
    False,
    Null,

    Identifier(String),
    Let,
    Const,
    Var,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Throw,
    New,
    This,
    Super,
    Class,
    Extends,
    Static,
    Typeof,
    Instanceof,
    In,
    Of,
    Void,
    Delete,
    Yield,
    Await,
    Async,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
    PlusPlus,
    MinusMinus,
    Eq,
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LtLt,
    GtGt,
    GtGtGt,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Tilde,
    Bang,
    Question,
    QuestionQuestion,
    QuestionDot,

    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    StarStarEq,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Dot,
    DotDotDot,
    Comma,
    Colon,
    Semicolon,
    Arrow,

    TemplateHead(String),
    TemplateMiddle(String),
    TemplateTail(String),
    TemplateNoSub(String),

    Eof,
    Invalid(char),
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(pos: usize, line: u32, column: u32) -> Self {
        Self {
            kind: TokenKind::Eof,
            span: Span::new(pos, pos, line, column),
        }
    }
}

/// Saved position the parser rewinds to after a failed arrow-function guess
#[derive(Clone)]
pub struct LexerCheckpoint {
    current_pos: usize,
    line: u32,
    column: u32,
    saw_newline: bool,
}

/// Lexer for tokenizing source code
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// Offset of `chars` into `source` after a restore
    chars_base_offset: usize,
    current_pos: usize,
    line: u32,
    column: u32,
    start_pos: usize,
    start_line: u32,
    start_column: u32,
    /// A line break preceded the current token
    saw_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            chars_base_offset: 0,
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            saw_newline: false,
        }
    }

    pub fn checkpoint(&self) -> LexerCheckpoint {
        LexerCheckpoint {
            current_pos: self.current_pos,
            line: self.line,
            column: self.column,
            saw_newline: self.saw_newline,
        }
    }

    pub fn restore(&mut self, checkpoint: LexerCheckpoint) {
        self.reset_to(checkpoint.current_pos, checkpoint.line, checkpoint.column);
        self.saw_newline = checkpoint.saw_newline;
    }

    fn reset_to(&mut self, pos: usize, line: u32, column: u32) {
        self.current_pos = pos;
        self.line = line;
        self.column = column;
        self.chars_base_offset = pos;
        self.chars = self
            .source
            .get(pos..)
            .unwrap_or("")
            .char_indices()
            .peekable();
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some((_pos, ch)) = self.advance() else {
            return Token::eof(self.current_pos, self.line, self.column);
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '~' => TokenKind::Tilde,
            ':' => TokenKind::Colon,

            '.' => self.scan_dot(),
            '+' => self.scan_plus(),
            '-' => self.scan_minus(),
            '*' => self.scan_star(),
            '/' => self.scan_compound('=', TokenKind::SlashEq, TokenKind::Slash),
            '%' => self.scan_compound('=', TokenKind::PercentEq, TokenKind::Percent),
            '=' => self.scan_equals(),
            '!' => self.scan_bang(),
            '<' => self.scan_less_than(),
            '>' => self.scan_greater_than(),
            '&' => self.scan_compound('&', TokenKind::AmpAmp, TokenKind::Amp),
            '|' => self.scan_compound('|', TokenKind::PipePipe, TokenKind::Pipe),
            '^' => TokenKind::Caret,
            '?' => self.scan_question(),

            '"' | '\'' => self.scan_string(ch),
            '`' => self.scan_template(true),
            '0'..='9' => self.scan_number(ch),

            c if is_id_start(c) => self.scan_identifier(c),

            c => TokenKind::Invalid(c),
        };

        Token::new(kind, self.make_span())
    }

    /// Check if there was a newline before the current token
    pub fn had_newline_before(&self) -> bool {
        self.saw_newline
    }

    /// Rescan template continuation after the `}` closing a substitution
    pub fn rescan_template_continuation(&mut self, rbrace_span: Span) -> Token {
        self.reset_to(rbrace_span.end, rbrace_span.line, rbrace_span.column + 1);
        self.start_pos = rbrace_span.start;
        self.start_line = rbrace_span.line;
        self.start_column = rbrace_span.column;
        let kind = self.scan_template(false);
        Token::new(kind, self.make_span())
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = self.chars_base_offset + pos + ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let slice = self.source.get(self.current_pos..)?;
        let mut iter = slice.chars();
        iter.next();
        iter.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn skip_whitespace_and_comments(&mut self) {
        self.saw_newline = false;

        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{FEFF}') => {
                    self.advance();
                }
                Some('\n') => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance(); // /
                        self.advance(); // *
                        loop {
                            match self.advance() {
                                Some((_, '*')) if self.peek() == Some('/') => {
                                    self.advance();
                                    break;
                                }
                                Some((_, '\n')) => self.saw_newline = true,
                                Some(_) => {}
                                None => break,
                            }
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
    }

    /// `c` followed by `next` yields `double`, otherwise `single`
    fn scan_compound(&mut self, next: char, double: TokenKind, single: TokenKind) -> TokenKind {
        if self.match_char(next) { double } else { single }
    }

    fn scan_dot(&mut self) -> TokenKind {
        if self.peek() == Some('.') && self.peek_next() == Some('.') {
            self.advance();
            self.advance();
            TokenKind::DotDotDot
        } else if matches!(self.peek(), Some('0'..='9')) {
            self.scan_number('.')
        } else {
            TokenKind::Dot
        }
    }

    fn scan_plus(&mut self) -> TokenKind {
        if self.match_char('+') {
            TokenKind::PlusPlus
        } else if self.match_char('=') {
            TokenKind::PlusEq
        } else {
            TokenKind::Plus
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        if self.match_char('-') {
            TokenKind::MinusMinus
        } else if self.match_char('=') {
            TokenKind::MinusEq
        } else {
            TokenKind::Minus
        }
    }

    fn scan_star(&mut self) -> TokenKind {
        if self.match_char('*') {
            self.scan_compound('=', TokenKind::StarStarEq, TokenKind::StarStar)
        } else if self.match_char('=') {
            TokenKind::StarEq
        } else {
            TokenKind::Star
        }
    }

    fn scan_equals(&mut self) -> TokenKind {
        if self.match_char('=') {
            self.scan_compound('=', TokenKind::EqEqEq, TokenKind::EqEq)
        } else if self.match_char('>') {
            TokenKind::Arrow
        } else {
            TokenKind::Eq
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.match_char('=') {
            self.scan_compound('=', TokenKind::BangEqEq, TokenKind::BangEq)
        } else {
            TokenKind::Bang
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        if self.match_char('<') {
            TokenKind::LtLt
        } else if self.match_char('=') {
            TokenKind::LtEq
        } else {
            TokenKind::Lt
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        if self.match_char('>') {
            self.scan_compound('>', TokenKind::GtGtGt, TokenKind::GtGt)
        } else if self.match_char('=') {
            TokenKind::GtEq
        } else {
            TokenKind::Gt
        }
    }

    fn scan_question(&mut self) -> TokenKind {
        if self.match_char('?') {
            TokenKind::QuestionQuestion
        } else if self.peek() == Some('.') && !matches!(self.peek_next(), Some('0'..='9')) {
            self.advance();
            TokenKind::QuestionDot
        } else {
            TokenKind::Question
        }
    }

    /// Shared escape handling for strings and templates. Returns false on a malformed escape.
    fn scan_escape(&mut self, value: &mut String) -> bool {
        match self.advance() {
            Some((_, 'n')) => value.push('\n'),
            Some((_, 'r')) => value.push('\r'),
            Some((_, 't')) => value.push('\t'),
            Some((_, 'b')) => value.push('\x08'),
            Some((_, 'f')) => value.push('\x0C'),
            Some((_, 'v')) => value.push('\x0B'),
            Some((_, '0')) if !matches!(self.peek(), Some('0'..='9')) => value.push('\0'),
            Some((_, '1'..='9')) => return false,
            Some((_, 'x')) => match self.scan_hex_escape(2).and_then(char::from_u32) {
                Some(ch) => value.push(ch),
                None => return false,
            },
            Some((_, 'u')) => {
                let code = if self.match_char('{') {
                    let mut hex = String::new();
                    while let Some(ch) = self.peek() {
                        if !ch.is_ascii_hexdigit() {
                            break;
                        }
                        hex.push(ch);
                        self.advance();
                    }
                    if !self.match_char('}') {
                        return false;
                    }
                    u32::from_str_radix(&hex, 16).ok()
                } else {
                    self.scan_hex_escape(4)
                };
                match code.and_then(char::from_u32) {
                    Some(ch) => value.push(ch),
                    None => return false,
                }
            }
            Some((_, '\n')) => {}
            Some((_, c)) => value.push(c),
            None => return false,
        }
        true
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => {
                    if !self.scan_escape(&mut value) {
                        return TokenKind::Invalid('\\');
                    }
                }
                Some((_, '\n')) | None => return TokenKind::Invalid(quote),
                Some((_, c)) => value.push(c),
            }
        }

        TokenKind::String(value)
    }

    fn scan_hex_escape(&mut self, count: usize) -> Option<u32> {
        let mut hex = String::new();
        for _ in 0..count {
            let ch = self.peek().filter(char::is_ascii_hexdigit)?;
            hex.push(ch);
            self.advance();
        }
        u32::from_str_radix(&hex, 16).ok()
    }

    /// Scan template text up to the closing backtick or the next `${`.
    /// `head` is true when starting at the opening backtick.
    fn scan_template(&mut self, head: bool) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, '`')) => {
                    return if head {
                        TokenKind::TemplateNoSub(value)
                    } else {
                        TokenKind::TemplateTail(value)
                    };
                }
                Some((_, '$')) if self.peek() == Some('{') => {
                    self.advance();
                    return if head {
                        TokenKind::TemplateHead(value)
                    } else {
                        TokenKind::TemplateMiddle(value)
                    };
                }
                Some((_, '\\')) => {
                    if !self.scan_escape(&mut value) {
                        return TokenKind::Invalid('\\');
                    }
                }
                Some((_, c)) => value.push(c),
                None => return TokenKind::Invalid('`'),
            }
        }
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        if first == '0' {
            let radix = match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                let mut digits = String::new();
                while let Some(ch) = self.peek() {
                    if ch.is_digit(radix) {
                        digits.push(ch);
                    } else if ch != '_' {
                        break;
                    }
                    self.advance();
                }
                return match i64::from_str_radix(&digits, radix) {
                    Ok(value) => TokenKind::Number(value as f64),
                    Err(_) => TokenKind::Invalid(first),
                };
            }
        }

        let mut num_str = String::new();
        num_str.push(first);

        self.scan_digits(&mut num_str);
        if first != '.' && self.peek() == Some('.') {
            num_str.push('.');
            self.advance();
            self.scan_digits(&mut num_str);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            num_str.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                num_str.push(sign);
                self.advance();
            }
            self.scan_digits(&mut num_str);
        }

        TokenKind::Number(num_str.parse().unwrap_or(f64::NAN))
    }

    fn scan_digits(&mut self, out: &mut String) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                out.push(ch);
            } else if ch != '_' {
                break;
            }
            self.advance();
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::new();
        name.push(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match name.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,

            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "throw" => TokenKind::Throw,
            "new" => TokenKind::New,
            "this" => TokenKind::This,
            "super" => TokenKind::Super,
            "class" => TokenKind::Class,
            "extends" => TokenKind::Extends,
            "static" => TokenKind::Static,
            "typeof" => TokenKind::Typeof,
            "instanceof" => TokenKind::Instanceof,
            "in" => TokenKind::In,
            "of" => TokenKind::Of,
            "void" => TokenKind::Void,
            "delete" => TokenKind::Delete,
            "yield" => TokenKind::Yield,
            "await" => TokenKind::Await,
            "async" => TokenKind::Async,

            _ => TokenKind::Identifier(name),
        }
    }
}

impl TokenKind {
    /// The source text of keyword tokens, for use where keywords are valid property names
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Let => "let",
            TokenKind::Const => "const",
            TokenKind::Var => "var",
            TokenKind::Function => "function",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Throw => "throw",
            TokenKind::New => "new",
            TokenKind::This => "this",
            TokenKind::Super => "super",
            TokenKind::Class => "class",
            TokenKind::Extends => "extends",
            TokenKind::Static => "static",
            TokenKind::Typeof => "typeof",
            TokenKind::Instanceof => "instanceof",
            TokenKind::In => "in",
            TokenKind::Of => "of",
            TokenKind::Void => "void",
            TokenKind::Delete => "delete",
            TokenKind::Yield => "yield",
            TokenKind::Await => "await",
            TokenKind::Async => "async",
            _ => return None,
        })
    }
}

fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

fn is_id_continue(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut tokens = vec![];
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            tokens.push(token.kind);
        }
        tokens
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("42"), vec![TokenKind::Number(42.0)]);
        assert_eq!(lex("2.5"), vec![TokenKind::Number(2.5)]);
        assert_eq!(lex(".5"), vec![TokenKind::Number(0.5)]);
        assert_eq!(lex("1e3"), vec![TokenKind::Number(1000.0)]);
        assert_eq!(lex("0xff"), vec![TokenKind::Number(255.0)]);
        assert_eq!(lex("1_000"), vec![TokenKind::Number(1000.0)]);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            lex(r#""a\nb" 'c\'d' "A\x42""#),
            vec![
                TokenKind::String("a\nb".into()),
                TokenKind::String("c'd".into()),
                TokenKind::String("AB".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(lex("\"abc"), vec![TokenKind::Invalid('"')]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("=== !== => ** **= ?. ??"),
            vec![
                TokenKind::EqEqEq,
                TokenKind::BangEqEq,
                TokenKind::Arrow,
                TokenKind::StarStar,
                TokenKind::StarStarEq,
                TokenKind::QuestionDot,
                TokenKind::QuestionQuestion,
            ]
        );
    }

    #[test]
    fn test_comments_and_newlines() {
        let mut lexer = Lexer::new("a // comment\n/* block */ b");
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier("a".into()));
        assert!(!lexer.had_newline_before());
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier("b".into()));
        assert!(lexer.had_newline_before());
    }

    #[test]
    fn test_span_positions() {
        let mut lexer = Lexer::new("let\n  x");
        let first = lexer.next_token();
        assert_eq!((first.span.line, first.span.column), (1, 1));
        let second = lexer.next_token();
        assert_eq!((second.span.line, second.span.column), (2, 3));
    }

    #[test]
    fn test_default_span_is_first_position() {
        let span = Span::default();
        assert_eq!((span.start, span.end), (0, 0));
        assert_eq!((span.line, span.column), (1, 1));
    }

    #[test]
    fn test_template_pieces() {
        let mut lexer = Lexer::new("`a${x}b`");
        assert_eq!(lexer.next_token().kind, TokenKind::TemplateHead("a".into()));
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier("x".into()));
        let rbrace = lexer.next_token();
        assert_eq!(rbrace.kind, TokenKind::RBrace);
        let tail = lexer.rescan_template_continuation(rbrace.span);
        assert_eq!(tail.kind, TokenKind::TemplateTail("b".into()));
    }
}
