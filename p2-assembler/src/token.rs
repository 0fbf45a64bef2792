use alloc::string::String;

bitflags::bitflags! {
    /// Type-mask bits queried by the classifier and the parser/evaluator:
    /// each token kind carries a mask, and callers ask "is this token in
    /// any of the following categories?" rather than matching the kind
    /// directly.
    #[derive(Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TokenMask: u32 {
        /// A primary instruction mnemonic.
        const MNEMONIC    = 1 << 0;
        /// An `IF_*` / `_RET_` condition code.
        const CONDITIONAL = 1 << 1;
        /// `WC`/`WZ`/`WCZ` and the test-bit/pin `ANDC`-family suffixes.
        const WCZ_SUFFIX  = 1 << 2;
        /// A `MODCZ` parameter word (e.g. `_CLR`, `_SET`, `_NZ_AND_C`...).
        const MODCZ_PARAM = 1 << 3;
        /// `DAT`/`CON`/`PUB`/`PRI`/`VAR` section keyword.
        const SECTION     = 1 << 4;
        /// `ORG`/`ORGH` origin-setting pseudo-op.
        const ORIGIN      = 1 << 5;
        /// `BYTE`/`WORD`/`LONG`/`RES`/`FILE` data pseudo-op.
        const DATA        = 1 << 6;
        /// `(` or `)`.
        const PARENS      = 1 << 7;
        /// A unary operator: `!`, `~`, unary `+`/`-`, `>|`, `|<`.
        const UNARY       = 1 << 8;
        /// `*`, `/`, `\`.
        const MULOP       = 1 << 9;
        /// Binary `+`, `-`.
        const ADDOP       = 1 << 10;
        /// `<<`, `>>`.
        const SHIFTOP     = 1 << 11;
        /// `<`, `<=`, `>`, `>=`.
        const RELATION    = 1 << 12;
        /// `==`, `!=`.
        const EQUALITY    = 1 << 13;
        /// Bitwise `&`.
        const BINOP_AND   = 1 << 14;
        /// Bitwise `|`.
        const BINOP_OR    = 1 << 15;
        /// Bitwise `^`.
        const BINOP_XOR   = 1 << 16;
        /// Logical `&&`.
        const LOGOP_AND   = 1 << 17;
        /// Logical `||`.
        const LOGOP_OR    = 1 << 18;
        /// `=`.
        const ASSIGNMENT  = 1 << 19;
        /// `,`.
        const DELIMITER   = 1 << 20;
        /// A numeric or string literal.
        const CONSTANT    = 1 << 21;
        /// `FLOAT`/`ROUND`/`TRUNC`.
        const FUNCTION    = 1 << 22;
        /// `#` (one level of immediate) or `##` (augmented immediate).
        const IMMEDIATE   = 1 << 23;
        /// `@` (relative address-of).
        const RELATIVE    = 1 << 24;
        /// Can head a primary expression (literal, symbol, `$`, `(`).
        const PRIMARY     = 1 << 25;
        /// A plain or local symbol name.
        const SYMBOL      = 1 << 26;
    }
}

/// The classified kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Inside a `{ ... }` block comment, the opening brace.
    CommentLCurly,
    /// Inside a `{ ... }` block comment, the closing brace.
    CommentRCurly,
    /// Text consumed by a `{ ... }` block comment that isn't a brace.
    CommentBody,
    /// `'...` end-of-line comment.
    CommentEol,
    /// `"..."` string literal.
    String,
    /// `%%[0-3_]+` base-4 literal.
    NumberByt,
    /// `%[01_]+` binary literal.
    NumberBin,
    /// `$[0-9A-F_]+` hex literal.
    NumberHex,
    /// `[0-9_]*\.[0-9_]*` real literal.
    NumberReal,
    /// `[0-9_]+` decimal literal.
    NumberDec,
    /// `.name` local symbol.
    LocalSymbol,
    /// A plain symbol or reserved word not otherwise classified.
    Symbol,
    /// A primary instruction mnemonic.
    Mnemonic,
    /// An `IF_*`/`_RET_` condition code.
    Condition,
    /// `WC`/`WZ`/`WCZ`/`ANDC`/`ANDZ`/`ORC`/`ORZ`/`XORC`/`XORZ` suffix.
    Suffix,
    /// A `MODCZ` parameter word.
    ModczParam,
    /// `DAT`/`CON`/`PUB`/`PRI`/`VAR`.
    Section,
    /// `ORG`/`ORGH`/`FIT`/`ALIGNW`/`ALIGNL`/`BYTE`/`WORD`/`LONG`/`RES`/`FILE`.
    PseudoOp,
    /// An operator or delimiter matched from the fixed table.
    Operator,
    /// `,`.
    Delimiter,
    /// Anything the tokenizer couldn't classify.
    Unknown,
}

impl TokenKind {
    /// The type-mask bits this kind carries, queried by the classifier and
    /// expression evaluator.
    pub fn mask(self) -> TokenMask {
        match self {
            TokenKind::Mnemonic => TokenMask::MNEMONIC | TokenMask::PRIMARY,
            TokenKind::Condition => TokenMask::CONDITIONAL,
            TokenKind::Suffix => TokenMask::WCZ_SUFFIX,
            TokenKind::ModczParam => TokenMask::MODCZ_PARAM,
            TokenKind::Section => TokenMask::SECTION,
            TokenKind::PseudoOp => TokenMask::ORIGIN | TokenMask::DATA,
            TokenKind::String
            | TokenKind::NumberByt
            | TokenKind::NumberBin
            | TokenKind::NumberHex
            | TokenKind::NumberReal
            | TokenKind::NumberDec => TokenMask::CONSTANT | TokenMask::PRIMARY,
            TokenKind::LocalSymbol | TokenKind::Symbol => TokenMask::SYMBOL | TokenMask::PRIMARY,
            TokenKind::Delimiter => TokenMask::DELIMITER,
            _ => TokenMask::empty(),
        }
    }
}

/// A slice of the source line: `(kind, lineno, pos, len, text)`.
/// Invariant: `pos + len <= line.len()` and `text == line[pos..pos+len]`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    /// The classified kind.
    pub kind: TokenKind,
    /// 1-based source line number.
    pub lineno: u32,
    /// Byte offset of this token within its line.
    pub pos: usize,
    /// Byte length of this token.
    pub len: usize,
    /// The exact source slice.
    pub text: String,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, lineno: u32, pos: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.len();
        Token { kind, lineno, pos, len, text }
    }

    /// The type-mask bits this token's kind carries.
    pub fn mask(&self) -> TokenMask {
        self.kind.mask()
    }

    /// Case-insensitive comparison against a fixed keyword spelling.
    pub fn text_eq_ci(&self, other: &str) -> bool {
        self.text.eq_ignore_ascii_case(other)
    }
}
