use p2_asm::{Condition, Mnemonic};
use strum::IntoEnumIterator;

use crate::token::{Token, TokenKind, TokenMask};

const SUFFIXES: &[&str] =
    &["WC", "WZ", "WCZ", "ANDC", "ANDZ", "ORC", "ORZ", "XORC", "XORZ"];
const SECTIONS: &[&str] = &["DAT", "CON", "PUB", "PRI", "VAR"];
const PSEUDO_OPS: &[&str] =
    &["ORG", "ORGH", "FIT", "ALIGNW", "ALIGNL", "BYTE", "WORD", "LONG", "RES", "FILE"];

/// Reclassify a raw `Symbol`/`LocalSymbol` token from the lexer against
/// the reserved-word tables: mnemonics, conditions,
/// suffixes, sections, pseudo-ops, and `MODCZ` parameters. Anything that
/// doesn't match stays a plain symbol.
pub fn classify(tok: &mut Token) {
    if tok.kind != TokenKind::Symbol {
        return;
    }
    let text = tok.text.as_str();

    if condition_from_text(text).is_some() {
        tok.kind = TokenKind::Condition;
        return;
    }
    if SUFFIXES.iter().any(|s| text.eq_ignore_ascii_case(s)) {
        tok.kind = TokenKind::Suffix;
        return;
    }
    if SECTIONS.iter().any(|s| text.eq_ignore_ascii_case(s)) {
        tok.kind = TokenKind::Section;
        return;
    }
    if PSEUDO_OPS.iter().any(|s| text.eq_ignore_ascii_case(s)) {
        tok.kind = TokenKind::PseudoOp;
        return;
    }
    if modcz_param(text).is_some() {
        tok.kind = TokenKind::ModczParam;
        return;
    }
    if mnemonic_from_text(text).is_some() {
        tok.kind = TokenKind::Mnemonic;
    }
}

/// Case-insensitive lookup of a condition keyword (`IF_*` or `_RET_`).
pub fn condition_from_text(text: &str) -> Option<Condition> {
    if text.eq_ignore_ascii_case("IF_ALWAYS") {
        return Some(Condition::Always);
    }
    Condition::iter().find(|c| c.mnemonic().map(|m| text.eq_ignore_ascii_case(m)).unwrap_or(false))
}

/// Case-insensitive lookup of a primary mnemonic keyword.
pub fn mnemonic_from_text(text: &str) -> Option<Mnemonic> {
    Mnemonic::iter().find(|m| m.to_string().eq_ignore_ascii_case(text))
}

/// Case-insensitive lookup of a `MODCZ` parameter keyword: the same 16
/// `(C,Z)`-predicate names as [`Condition`], written with a leading
/// underscore and no `IF_` prefix, plus `_SET`/`_CLR` for the
/// always-true/always-false ends.
pub fn modcz_param(text: &str) -> Option<Condition> {
    if text.eq_ignore_ascii_case("_CLR") {
        return Some(Condition::Ret);
    }
    if text.eq_ignore_ascii_case("_SET") {
        return Some(Condition::Always);
    }
    Condition::iter().find(|c| {
        c.mnemonic()
            .and_then(|m| m.strip_prefix("IF_"))
            .map(|suffix| {
                let mut candidate = alloc::string::String::from("_");
                candidate.push_str(suffix);
                text.eq_ignore_ascii_case(&candidate)
            })
            .unwrap_or(false)
    })
}

/// Resolve the type-mask for an operator/delimiter token by its exact
/// text, since [`TokenKind::Operator`] by itself is too coarse.
pub fn operator_mask(text: &str) -> TokenMask {
    match text {
        "!" | "~" | ">|" | "|<" => TokenMask::UNARY,
        "+" | "-" => TokenMask::UNARY | TokenMask::ADDOP,
        "*" | "/" | "\\" => TokenMask::MULOP,
        "<<" | ">>" => TokenMask::SHIFTOP,
        "<" | "<=" | ">" | ">=" | "><" => TokenMask::RELATION,
        "==" | "!=" => TokenMask::EQUALITY,
        "&" => TokenMask::BINOP_AND,
        "|" => TokenMask::BINOP_OR,
        "^" => TokenMask::BINOP_XOR,
        "&&" => TokenMask::LOGOP_AND,
        "||" | "!!" => TokenMask::LOGOP_OR,
        "=" => TokenMask::ASSIGNMENT,
        "(" | ")" | "[" | "]" => TokenMask::PARENS,
        "#" | "##" => TokenMask::IMMEDIATE,
        "@" | "@@" | "@@@" => TokenMask::RELATIVE,
        _ => TokenMask::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_add_case_insensitively() {
        assert_eq!(mnemonic_from_text("add"), Some(Mnemonic::ADD));
        assert_eq!(mnemonic_from_text("ADD"), Some(Mnemonic::ADD));
    }

    #[test]
    fn recognizes_condition_keyword() {
        assert_eq!(condition_from_text("IF_NC"), Some(Condition::Nc));
        assert_eq!(condition_from_text("_ret_"), Some(Condition::Ret));
    }

    #[test]
    fn recognizes_pseudo_ops_and_sections() {
        let mut t = Token::new(TokenKind::Symbol, 1, 0, "org");
        classify(&mut t);
        assert_eq!(t.kind, TokenKind::PseudoOp);

        let mut t = Token::new(TokenKind::Symbol, 1, 0, "DAT");
        classify(&mut t);
        assert_eq!(t.kind, TokenKind::Section);
    }
}
