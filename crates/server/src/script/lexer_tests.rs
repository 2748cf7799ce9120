// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{lex, Token};

fn tokens(source: &str) -> Vec<Token> {
    match lex(source) {
        Ok(spanned) => spanned.into_iter().map(|s| s.token).collect(),
        Err(e) => unreachable!("lex failed: {e}"),
    }
}

#[test]
fn numbers() {
    assert_eq!(tokens("42"), vec![Token::Int(42), Token::Eof]);
    assert_eq!(tokens("3.5"), vec![Token::Num(3.5), Token::Eof]);
    assert_eq!(tokens("0x1F"), vec![Token::Int(31), Token::Eof]);
    assert_eq!(tokens("1e2"), vec![Token::Num(100.0), Token::Eof]);
}

#[test]
fn strings_with_escapes() {
    assert_eq!(
        tokens(r#""a\nb" 'c'"#),
        vec![Token::Str("a\nb".into()), Token::Str("c".into()), Token::Eof]
    );
}

#[test]
fn unterminated_string_errors() {
    assert!(lex("\"oops").is_err());
    assert!(lex("\"multi\nline\"").is_err());
}

#[test]
fn keywords_and_names() {
    assert_eq!(
        tokens("if x then end"),
        vec![Token::If, Token::Name("x".into()), Token::Then, Token::End, Token::Eof]
    );
}

#[test]
fn comments_are_skipped() {
    assert_eq!(tokens("1 -- comment\n2"), vec![Token::Int(1), Token::Int(2), Token::Eof]);
}

#[test]
fn multi_char_operators() {
    assert_eq!(
        tokens("== ~= <= >= .. ..."),
        vec![
            Token::Eq,
            Token::NotEq,
            Token::LessEq,
            Token::GreaterEq,
            Token::Concat,
            Token::Ellipsis,
            Token::Eof
        ]
    );
}

#[test]
fn concat_after_number() {
    assert_eq!(
        tokens("1 ..2"),
        vec![Token::Int(1), Token::Concat, Token::Int(2), Token::Eof]
    );
}

#[test]
fn lines_are_tracked() {
    let Ok(spanned) = lex("a\nb") else {
        unreachable!("lex failed")
    };
    assert_eq!(spanned[0].line, 1);
    assert_eq!(spanned[1].line, 2);
}

#[test]
fn unexpected_character_errors() {
    assert!(lex("@").is_err());
}
