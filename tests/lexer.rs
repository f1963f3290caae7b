//! Tests for the lexer
//!
//! These tests verify that the lexer correctly tokenizes the accepted source subset.

use datajs::lexer::{Lexer, TokenKind};

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

fn ident(name: &str) -> TokenKind {
    TokenKind::Identifier(name.to_string())
}

#[test]
fn test_numbers() {
    assert_eq!(lex("42"), vec![TokenKind::Number(42.0)]);
    assert_eq!(lex("3.25"), vec![TokenKind::Number(3.25)]);
    assert_eq!(lex("1e10"), vec![TokenKind::Number(1e10)]);
    assert_eq!(lex("2.5e-1"), vec![TokenKind::Number(0.25)]);
    assert_eq!(lex("0xff"), vec![TokenKind::Number(255.0)]);
    assert_eq!(lex("0b1010"), vec![TokenKind::Number(10.0)]);
    assert_eq!(lex("0o17"), vec![TokenKind::Number(15.0)]);
    assert_eq!(lex("1_000_000"), vec![TokenKind::Number(1_000_000.0)]);
}

#[test]
fn test_radix_prefix_without_digits_is_invalid() {
    assert_eq!(lex("0x"), vec![TokenKind::Invalid('0')]);
}

#[test]
fn test_strings() {
    assert_eq!(
        lex(r#""hello" 'world'"#),
        vec![
            TokenKind::String("hello".to_string()),
            TokenKind::String("world".to_string()),
        ]
    );
    assert_eq!(
        lex(r#""tab\there""#),
        vec![TokenKind::String("tab\there".to_string())]
    );
    assert_eq!(
        lex(r#"'say "hi"'"#),
        vec![TokenKind::String("say \"hi\"".to_string())]
    );
}

#[test]
fn test_keywords() {
    assert_eq!(
        lex("let const var function return if else"),
        vec![
            TokenKind::Let,
            TokenKind::Const,
            TokenKind::Var,
            TokenKind::Function,
            TokenKind::Return,
            TokenKind::If,
            TokenKind::Else,
        ]
    );
    assert_eq!(
        lex("class extends super this new async await"),
        vec![
            TokenKind::Class,
            TokenKind::Extends,
            TokenKind::Super,
            TokenKind::This,
            TokenKind::New,
            TokenKind::Async,
            TokenKind::Await,
        ]
    );
    assert_eq!(
        lex("true false null typeof"),
        vec![
            TokenKind::True,
            TokenKind::False,
            TokenKind::Null,
            TokenKind::Typeof,
        ]
    );
}

#[test]
fn test_identifiers() {
    assert_eq!(
        lex("foo _bar $baz camelCase x1"),
        vec![
            ident("foo"),
            ident("_bar"),
            ident("$baz"),
            ident("camelCase"),
            ident("x1"),
        ]
    );
    // keywords only match whole words
    assert_eq!(lex("letter classy"), vec![ident("letter"), ident("classy")]);
}

#[test]
fn test_arithmetic_and_assignment_operators() {
    assert_eq!(
        lex("+ - * / % ** ++ --"),
        vec![
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
            TokenKind::StarStar,
            TokenKind::PlusPlus,
            TokenKind::MinusMinus,
        ]
    );
    assert_eq!(
        lex("= += -= *= /= %="),
        vec![
            TokenKind::Eq,
            TokenKind::PlusEq,
            TokenKind::MinusEq,
            TokenKind::StarEq,
            TokenKind::SlashEq,
            TokenKind::PercentEq,
        ]
    );
}

#[test]
fn test_comparison_and_logical_operators() {
    assert_eq!(
        lex("== === != !== < <= > >= && || ! ??"),
        vec![
            TokenKind::EqEq,
            TokenKind::EqEqEq,
            TokenKind::BangEq,
            TokenKind::BangEqEq,
            TokenKind::Lt,
            TokenKind::LtEq,
            TokenKind::Gt,
            TokenKind::GtEq,
            TokenKind::AmpAmp,
            TokenKind::PipePipe,
            TokenKind::Bang,
            TokenKind::QuestionQuestion,
        ]
    );
}

#[test]
fn test_punctuation() {
    assert_eq!(
        lex("( ) { } [ ] . ... , : ; =>"),
        vec![
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::RBrace,
            TokenKind::LBracket,
            TokenKind::RBracket,
            TokenKind::Dot,
            TokenKind::DotDotDot,
            TokenKind::Comma,
            TokenKind::Colon,
            TokenKind::Semicolon,
            TokenKind::Arrow,
        ]
    );
}

#[test]
fn test_member_chain() {
    assert_eq!(
        lex("console.log(a?.b)"),
        vec![
            ident("console"),
            TokenKind::Dot,
            ident("log"),
            TokenKind::LParen,
            ident("a"),
            TokenKind::QuestionDot,
            ident("b"),
            TokenKind::RParen,
        ]
    );
}

#[test]
fn test_template_without_substitution() {
    assert_eq!(
        lex("`plain text`"),
        vec![TokenKind::TemplateNoSub("plain text".to_string())]
    );
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        lex("a /* inner */ + // trailing\n b"),
        vec![ident("a"), TokenKind::Plus, ident("b")]
    );
}

#[test]
fn test_invalid_character() {
    assert_eq!(lex("a # b"), vec![ident("a"), TokenKind::Invalid('#'), ident("b")]);
}

#[test]
fn test_spans_track_lines() {
    let mut lexer = Lexer::new("let a = 1;\nlet b = 2;");
    let mut lines = vec![];
    loop {
        let token = lexer.next_token();
        if token.kind == TokenKind::Eof {
            break;
        }
        if token.kind == TokenKind::Let {
            lines.push(token.span.line);
        }
    }
    assert_eq!(lines, vec![1, 2]);
}
