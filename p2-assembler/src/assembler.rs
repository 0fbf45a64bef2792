use alloc::format;
use alloc::vec::Vec;

use p2_asm::{encode_augment, Condition, Instruction, Mnemonic, OperandShape};
use p2_value::{ElemKind, Value};

use crate::classify::{self, classify};
use crate::error::{AsmError, AsmErrorKind};
use crate::eval::Evaluator;
use crate::lexer::tokenize_line;
use crate::symbol::SymbolTable;
use crate::token::{Token, TokenKind};

/// `DAT`/`CON`/`PUB`/`PRI`/`VAR` section keyword.
/// Only `Dat` contributes to the emitted image; the others are recognized
/// and tracked (so `name = expr` constants keep working throughout a
/// file) but contribute no bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Dat,
    Con,
    Pub,
    Pri,
    Var,
}

/// Whether the origin counter is being tracked in cog/lut longs (`ORG`) or
/// hub bytes (`ORGH`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Cog,
    Hub,
}

/// The running position the assembler advances line by line, shared in
/// shape (not state) between pass 1 and pass 2.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    mode: Mode,
    section: Section,
    cur_cog: u32,
    cur_hub: u32,
}

impl Cursor {
    fn new() -> Self {
        Cursor { mode: Mode::Cog, section: Section::Dat, cur_cog: 0, cur_hub: 0 }
    }

    /// `$`'s value: cog/lut longs in `ORG` mode, hub bytes in `ORGH` mode.
    fn pc_value(&self) -> u32 {
        match self.mode {
            Mode::Cog => self.cur_cog,
            Mode::Hub => self.cur_hub,
        }
    }

    fn addr_value(&self) -> Value {
        Value::addr(self.cur_cog, self.cur_hub, self.mode == Mode::Hub)
    }

    fn advance(&mut self, bytes: usize) {
        self.cur_hub = self.cur_hub.wrapping_add(bytes as u32);
        if self.mode == Mode::Cog {
            self.cur_cog = self.cur_cog.wrapping_add((bytes / 4) as u32);
        }
    }
}

/// The result of assembling a complete source file:
/// the emitted hub-memory image, the final symbol table, and every error
/// recovered from along the way.
#[derive(Debug, Default)]
pub struct AssembledProgram {
    /// Bytes written to hub memory, starting at address 0. Gaps left by
    /// `ORGH`/`RES` are zero-filled.
    pub image: Vec<u8>,
    /// The final symbol table.
    pub symbols: SymbolTable,
    /// Errors recovered at line boundaries, in source order.
    pub errors: Vec<AsmError>,
}

/// The cog's named special-purpose registers, not ordinary symbols:
/// always resolve to a fixed address rather than going through the
/// symbol table.
const SPECIAL_REGS: &[(&str, u16)] = &[
    ("IJMP3", 0x1F0),
    ("IRET3", 0x1F1),
    ("IJMP2", 0x1F2),
    ("IRET2", 0x1F3),
    ("IJMP1", 0x1F4),
    ("IRET1", 0x1F5),
    ("PA", 0x1F6),
    ("PB", 0x1F7),
    ("PTRA", 0x1F8),
    ("PTRB", 0x1F9),
    ("DIRA", 0x1FA),
    ("DIRB", 0x1FB),
    ("OUTA", 0x1FC),
    ("OUTB", 0x1FD),
    ("INA", 0x1FE),
    ("INB", 0x1FF),
];

fn special_reg(name: &str) -> Option<u16> {
    let base = name
        .trim_end_matches("_postinc")
        .trim_end_matches("_postdec")
        .trim_end_matches("_preinc")
        .trim_end_matches("_predec");
    SPECIAL_REGS.iter().find(|(n, _)| base.eq_ignore_ascii_case(n)).map(|(_, a)| *a)
}

fn is_relative_branch(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::JMP | Mnemonic::CALL | Mnemonic::CALLA | Mnemonic::CALLB | Mnemonic::DJNZ | Mnemonic::TJZ)
}

/// `JMP`/`CALL`/`CALLA`/`CALLB` take a single operand that fills the `S`
/// field only — there is no destination register, unlike the `D,S`
/// majority (and unlike `DJNZ`/`TJZ`, which decrement/test `D` and so need
/// both fields).
fn is_source_only(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::JMP | Mnemonic::CALL | Mnemonic::CALLA | Mnemonic::CALLB)
}

/// `WC`/`WZ`/`WCZ` and the `ANDC`-family suffixes all ultimately just set
/// one or both write-flag bits on the instruction word; this
/// implementation doesn't distinguish "write" from "and/or/xor-accumulate"
/// at the encoding level (no field exists for it), only at the cog's
/// execution semantics, which is out of C6's scope.
fn suffix_flags(text: &str) -> (bool, bool) {
    match text.to_ascii_uppercase().as_str() {
        "WC" | "ANDC" | "ORC" | "XORC" => (true, false),
        "WZ" | "ANDZ" | "ORZ" | "XORZ" => (false, true),
        "WCZ" => (true, true),
        _ => (false, false),
    }
}

/// A parsed source line's structure, syntax-only — no symbol lookups or
/// arithmetic — so pass 1 and pass 2 can reuse exactly the same shape.
struct ParsedLine {
    label: Option<Token>,
    op: LineOp,
}

enum LineOp {
    Empty,
    Assignment { name: Token, expr: Vec<Token> },
    Section(Section),
    Pseudo { name: Token, groups: Vec<Vec<Token>> },
    Instruction { cond: Condition, mnemonic: Mnemonic, groups: Vec<Vec<Token>>, wc: bool, wz: bool },
}

fn strip_comments(tokens: &[Token]) -> Vec<Token> {
    tokens
        .iter()
        .filter(|t| {
            !matches!(
                t.kind,
                TokenKind::CommentLCurly | TokenKind::CommentRCurly | TokenKind::CommentBody | TokenKind::CommentEol
            )
        })
        .cloned()
        .collect()
}

/// Split a token slice on top-level commas, respecting `(...)`/`[...]`
/// nesting.
fn split_operands(tokens: &[Token]) -> Vec<Vec<Token>> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0i32;
    for t in tokens {
        match &t.kind {
            TokenKind::Operator if t.text == "(" || t.text == "[" => {
                depth += 1;
                current.push(t.clone());
            }
            TokenKind::Operator if t.text == ")" || t.text == "]" => {
                depth -= 1;
                current.push(t.clone());
            }
            TokenKind::Delimiter if depth == 0 => {
                groups.push(current);
                current = Vec::new();
            }
            _ => current.push(t.clone()),
        }
    }
    groups.push(current);
    groups
}

/// Peel a trailing `WC`/`WZ`/... suffix token off the end of an operand
/// list. More than one in a row is a syntax error.
fn split_suffix(tokens: &[Token]) -> Result<(&[Token], Option<Token>), AsmError> {
    if let Some(last) = tokens.last() {
        if last.kind == TokenKind::Suffix {
            let rest = &tokens[..tokens.len() - 1];
            if let Some(prev) = rest.last() {
                if prev.kind == TokenKind::Suffix {
                    return Err(AsmError::new(AsmErrorKind::SyntaxError, last.lineno, "duplicate suffix"));
                }
            }
            return Ok((rest, Some(last.clone())));
        }
    }
    Ok((tokens, None))
}

/// Parse one logical line's structure (label, condition, operation,
/// operand groups) with no evaluation. Used identically by pass 1 and
/// pass 2.
fn parse_line(tokens: &[Token]) -> Result<ParsedLine, AsmError> {
    let lineno = tokens[0].lineno;
    let mut i = 0usize;
    let mut label = None;

    if matches!(tokens[0].kind, TokenKind::Symbol | TokenKind::LocalSymbol) {
        if tokens.len() > 1 && tokens[1].kind == TokenKind::Operator && tokens[1].text == "=" {
            let name = tokens[0].clone();
            let expr: Vec<Token> = tokens[2..].to_vec();
            if expr.is_empty() {
                return Err(AsmError::new(AsmErrorKind::SyntaxError, lineno, "assignment has no expression"));
            }
            return Ok(ParsedLine { label: None, op: LineOp::Assignment { name, expr } });
        }
        label = Some(tokens[0].clone());
        i = 1;
    }

    if i >= tokens.len() {
        return Ok(ParsedLine { label, op: LineOp::Empty });
    }

    let mut cond = Condition::Always;
    if tokens[i].kind == TokenKind::Condition {
        cond = classify::condition_from_text(&tokens[i].text).unwrap_or(Condition::Always);
        i += 1;
    }

    if i >= tokens.len() {
        return Ok(ParsedLine { label, op: LineOp::Empty });
    }

    if cond != Condition::Always && matches!(tokens[i].kind, TokenKind::PseudoOp | TokenKind::Section) {
        return Err(AsmError::new(AsmErrorKind::SyntaxError, lineno, "condition applied to a pseudo-op"));
    }

    match tokens[i].kind {
        TokenKind::Section => {
            let section = match tokens[i].text.to_ascii_uppercase().as_str() {
                "DAT" => Section::Dat,
                "CON" => Section::Con,
                "PUB" => Section::Pub,
                "PRI" => Section::Pri,
                _ => Section::Var,
            };
            Ok(ParsedLine { label, op: LineOp::Section(section) })
        }
        TokenKind::PseudoOp => {
            let name = tokens[i].clone();
            let (operand_tokens, _suffix) = split_suffix(&tokens[i + 1..])?;
            let groups = split_operands(operand_tokens);
            Ok(ParsedLine { label, op: LineOp::Pseudo { name, groups } })
        }
        TokenKind::Mnemonic => {
            let mnemonic = classify::mnemonic_from_text(&tokens[i].text)
                .ok_or_else(|| AsmError::new(AsmErrorKind::SyntaxError, lineno, "unrecognized mnemonic"))?;
            let (operand_tokens, suffix) = split_suffix(&tokens[i + 1..])?;
            let (wc, wz) = suffix.map(|t| suffix_flags(&t.text)).unwrap_or((false, false));
            let groups = split_operands(operand_tokens);
            Ok(ParsedLine { label, op: LineOp::Instruction { cond, mnemonic, groups, wc, wz } })
        }
        _ => Err(AsmError::new(
            AsmErrorKind::SyntaxError,
            lineno,
            "expected a mnemonic, pseudo-op, or section keyword",
        )),
    }
}

fn eval_best_effort(tokens: &[Token], symbols: &mut SymbolTable, pc: u32) -> Value {
    Evaluator::new(tokens, symbols, pc).eval().unwrap_or_else(|_| Value::long(0))
}

fn bind_label(tok: &Token, cur: &Cursor, symbols: &mut SymbolTable, errors: &mut Vec<AsmError>) {
    let addr = cur.addr_value();
    symbols.enter_scope(&tok.text);
    if symbols.define(&tok.text, addr, tok.clone()).is_err() {
        errors.push(AsmError::new(
            AsmErrorKind::RedefinedSymbol,
            tok.lineno,
            format!("'{}' is already defined", tok.text),
        ));
    }
}

fn pass1_line(pl: &ParsedLine, cur: &mut Cursor, symbols: &mut SymbolTable, errors: &mut Vec<AsmError>) {
    if let Some(label) = &pl.label {
        bind_label(label, cur, symbols, errors);
    }
    match &pl.op {
        LineOp::Empty => {}
        LineOp::Assignment { name, expr } => {
            let value = eval_best_effort(expr, symbols, cur.pc_value());
            if symbols.contains(&name.text) {
                errors.push(AsmError::new(
                    AsmErrorKind::RedefinedSymbol,
                    name.lineno,
                    format!("'{}' is already defined", name.text),
                ));
            } else if symbols.define(&name.text, value, name.clone()).is_err() {
                errors.push(AsmError::new(
                    AsmErrorKind::RedefinedSymbol,
                    name.lineno,
                    format!("'{}' is already defined", name.text),
                ));
            }
        }
        LineOp::Section(s) => cur.section = *s,
        LineOp::Pseudo { name, groups } => pass1_pseudo(name, groups, cur, symbols),
        LineOp::Instruction { groups, .. } => {
            if cur.section == Section::Dat {
                let augmented =
                    groups.iter().any(|g| g.iter().any(|t| t.kind == TokenKind::Operator && t.text == "##"));
                cur.advance(if augmented { 8 } else { 4 });
            }
        }
    }
}

fn pass1_pseudo(name: &Token, groups: &[Vec<Token>], cur: &mut Cursor, symbols: &mut SymbolTable) {
    let kw = name.text.to_ascii_uppercase();
    match kw.as_str() {
        "ORG" => {
            cur.mode = Mode::Cog;
            cur.cur_cog = groups
                .first()
                .map(|g| eval_best_effort(g, symbols, cur.pc_value()).as_u32().unwrap_or(0))
                .unwrap_or(0);
        }
        "ORGH" => {
            cur.mode = Mode::Hub;
            cur.cur_hub = groups
                .first()
                .map(|g| eval_best_effort(g, symbols, cur.pc_value()).as_u32().unwrap_or(0))
                .unwrap_or(0);
        }
        "ALIGNW" => cur.cur_hub = (cur.cur_hub + 1) & !1,
        "ALIGNL" => cur.cur_hub = (cur.cur_hub + 3) & !3,
        "BYTE" | "WORD" | "LONG" => {
            let width = pseudo_width(&kw);
            let mut total = 0usize;
            for g in groups {
                if let [t] = g.as_slice() {
                    if t.kind == TokenKind::String {
                        total += t.text.len().saturating_sub(2) * width;
                        continue;
                    }
                }
                total += width;
            }
            if cur.section == Section::Dat {
                cur.advance(total);
            }
        }
        "RES" => {
            let n = groups
                .first()
                .map(|g| eval_best_effort(g, symbols, cur.pc_value()).as_u32().unwrap_or(1))
                .unwrap_or(1);
            if cur.section == Section::Dat {
                cur.advance(n as usize * 4);
            }
        }
        // FIT validates but doesn't move the cursor; FILE's size depends on
        // a blob this assembler has no filesystem access to, so pass 1
        // can't lay it out and pass 2 reports it as an I/O error.
        _ => {}
    }
}

fn pseudo_width(kw: &str) -> usize {
    match kw {
        "BYTE" => 1,
        "WORD" => 2,
        _ => 4,
    }
}

fn write_bytes(image: &mut Vec<u8>, addr: u32, bytes: &[u8]) {
    let end = addr as usize + bytes.len();
    if image.len() < end {
        image.resize(end, 0);
    }
    image[addr as usize..end].copy_from_slice(bytes);
}

/// A symbol reference left unresolved once the final pass runs against the
/// complete table is a genuine `UnknownSymbol`, not a forward reference —
/// [`Evaluator`] itself stays silent about this (it defaults to 0 so pass 1
/// can make progress), so pass 2 checks for it up front.
fn check_undefined(tokens: &[Token], symbols: &SymbolTable, line: u32) -> Option<AsmError> {
    tokens.iter().find_map(|t| {
        if matches!(t.kind, TokenKind::Symbol | TokenKind::LocalSymbol)
            && !t.text_eq_ci("$")
            && !symbols.contains(&t.text)
        {
            Some(AsmError::new(AsmErrorKind::UnknownSymbol, line, format!("'{}' is not defined", t.text)))
        } else {
            None
        }
    })
}

fn eval_checked(tokens: &[Token], symbols: &mut SymbolTable, pc: u32, line: u32) -> Result<Value, AsmError> {
    if let Some(e) = check_undefined(tokens, symbols, line) {
        return Err(e);
    }
    Evaluator::new(tokens, symbols, pc).eval()
}

fn eval_operand(
    group: Option<&Vec<Token>>,
    symbols: &mut SymbolTable,
    pc: u32,
    line: u32,
    errors: &mut Vec<AsmError>,
) -> Option<u32> {
    let g = group?;
    match eval_checked(g, symbols, pc, line).and_then(|v| v.as_u32().map_err(|_| {
        AsmError::new(AsmErrorKind::InvalidOperand, line, "expected a numeric value")
    })) {
        Ok(n) => Some(n),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn pass2_pseudo(
    name: &Token,
    groups: &[Vec<Token>],
    image: &mut Vec<u8>,
    cur: &mut Cursor,
    symbols: &mut SymbolTable,
    errors: &mut Vec<AsmError>,
) {
    let kw = name.text.to_ascii_uppercase();
    let line = name.lineno;
    match kw.as_str() {
        "ORG" => {
            cur.mode = Mode::Cog;
            let v = eval_operand(groups.first(), symbols, cur.pc_value(), line, errors).unwrap_or(0);
            if v as usize > p2_types::COG_RAM_LONGS {
                errors.push(AsmError::new(AsmErrorKind::AddressOutOfRange, line, "ORG target exceeds cog RAM"));
            }
            cur.cur_cog = v;
        }
        "ORGH" => {
            cur.mode = Mode::Hub;
            let v = eval_operand(groups.first(), symbols, cur.pc_value(), line, errors).unwrap_or(0);
            if v as usize >= p2_types::HUB_MEM_BYTES {
                errors.push(AsmError::new(AsmErrorKind::AddressOutOfRange, line, "ORGH target exceeds hub memory"));
            }
            cur.cur_hub = v;
        }
        "FIT" => {
            let limit =
                eval_operand(groups.first(), symbols, cur.pc_value(), line, errors).unwrap_or(p2_types::COG_RAM_LONGS as u32);
            if cur.mode == Mode::Cog && cur.cur_cog > limit {
                errors.push(AsmError::new(
                    AsmErrorKind::AddressOutOfRange,
                    line,
                    "code does not fit within the declared limit",
                ));
            }
        }
        "ALIGNW" => cur.cur_hub = (cur.cur_hub + 1) & !1,
        "ALIGNL" => cur.cur_hub = (cur.cur_hub + 3) & !3,
        "BYTE" | "WORD" | "LONG" => {
            let target = match kw.as_str() {
                "BYTE" => ElemKind::Byte,
                "WORD" => ElemKind::Word,
                _ => ElemKind::Long,
            };
            let mut bytes = Vec::new();
            for g in groups {
                if g.is_empty() {
                    continue;
                }
                match eval_checked(g, symbols, cur.pc_value(), line) {
                    Ok(v) => bytes.extend(v.pack(target, false).unwrap_or_default()),
                    Err(e) => errors.push(e),
                }
            }
            if cur.section == Section::Dat {
                let addr = cur.cur_hub;
                write_bytes(image, addr, &bytes);
                cur.advance(bytes.len());
            }
        }
        "RES" => {
            let n = eval_operand(groups.first(), symbols, cur.pc_value(), line, errors).unwrap_or(1);
            if cur.section == Section::Dat {
                cur.advance(n as usize * 4);
            }
        }
        "FILE" => {
            errors.push(AsmError::new(AsmErrorKind::IoError, line, "FILE data is not available to this assembler"));
        }
        _ => errors.push(AsmError::new(AsmErrorKind::SyntaxError, line, "unrecognized pseudo-op")),
    }
}

fn eval_register(tokens: &[Token], symbols: &mut SymbolTable, pc: u32, line: u32) -> Result<u16, AsmError> {
    if let [t] = tokens {
        if let Some(reg) = special_reg(&t.text) {
            return Ok(reg);
        }
    }
    let v = eval_checked(tokens, symbols, pc, line)?;
    let addr = v.get_addr().unwrap_or_else(|_| v.as_u32().unwrap_or(0));
    if addr > 0x1FF {
        return Err(AsmError::new(AsmErrorKind::ImmediateOutOfRange, line, "register address exceeds the 9-bit field"));
    }
    Ok(addr as u16)
}

/// Split a 32-bit value into a 9-bit low field and, if required, a 23-bit
/// augmentation payload. A bare `#` never auto-augments — only an
/// explicit `##` does, which keeps layout (pass 1's size-in-longs) decidable from
/// source syntax alone rather than from a forward-referenced value.
fn split_immediate(value: u32, force_augment: bool, signed: bool, line: u32) -> Result<(u16, Option<u32>), AsmError> {
    if force_augment {
        return Ok(((value & 0x1FF) as u16, Some((value >> 9) & 0x7F_FFFF)));
    }
    let fits = if signed { (-256..=255).contains(&(value as i32)) } else { value <= 0x1FF };
    if fits {
        Ok(((value & 0x1FF) as u16, None))
    } else {
        Err(AsmError::new(AsmErrorKind::ImmediateOutOfRange, line, "use '##' to augment an immediate this large"))
    }
}

fn eval_source(
    tokens: &[Token],
    symbols: &mut SymbolTable,
    pc: u32,
    next_pc: u32,
    relative: bool,
    line: u32,
) -> Result<(u16, bool, Option<u32>), AsmError> {
    if tokens.is_empty() {
        return Ok((0, false, None));
    }
    let head = &tokens[0];
    if head.kind == TokenKind::Operator && (head.text == "#" || head.text == "##") {
        let force_augment = head.text == "##";
        let v = eval_checked(&tokens[1..], symbols, pc, line)?;
        let mut raw = v
            .as_u32()
            .map_err(|_| AsmError::new(AsmErrorKind::InvalidOperand, line, "invalid operand"))?;
        if relative {
            raw = raw.wrapping_sub(next_pc);
        }
        let (src, aug) = split_immediate(raw, force_augment, relative, line)?;
        return Ok((src, true, aug));
    }
    if head.kind == TokenKind::Operator && matches!(head.text.as_str(), "@" | "@@" | "@@@") {
        let v = eval_checked(&tokens[1..], symbols, pc, line)?;
        let addr = v.get_addr().map_err(|_| AsmError::new(AsmErrorKind::InvalidOperand, line, "invalid operand"))?;
        let (src, aug) = split_immediate(addr, head.text == "@@@", false, line)?;
        return Ok((src, true, aug));
    }
    let r = eval_register(tokens, symbols, pc, line)?;
    Ok((r, false, None))
}

fn strip_leading_prefix(tokens: &[Token]) -> &[Token] {
    match tokens.first() {
        Some(t) if t.kind == TokenKind::Operator && matches!(t.text.as_str(), "#" | "##" | "@" | "@@" | "@@@") => {
            &tokens[1..]
        }
        _ => tokens,
    }
}

fn encode_plain(cond: Condition, mnemonic: Mnemonic, wc: bool, wz: bool, im: bool, dst: u16, src: u16) -> Vec<u8> {
    Instruction { cond, inst: mnemonic, wc, wz, im, dst, src }.encode().to_le_bytes().into()
}

fn single_operand<'a>(groups: &'a [Vec<Token>], line: u32) -> Result<&'a [Token], AsmError> {
    match groups {
        [g] if !g.is_empty() => Ok(g.as_slice()),
        _ => Err(AsmError::new(AsmErrorKind::SyntaxError, line, "expected exactly one operand")),
    }
}

fn encode_dst_src(
    cond: Condition,
    mnemonic: Mnemonic,
    groups: &[Vec<Token>],
    wc: bool,
    wz: bool,
    cur: &Cursor,
    symbols: &mut SymbolTable,
    line: u32,
) -> Result<Vec<u8>, AsmError> {
    let (d_tokens, s_tokens): (&[Token], &[Token]) = match groups {
        [s] if !s.is_empty() && is_source_only(mnemonic) => (&[][..], s.as_slice()),
        [d] if !d.is_empty() => (d.as_slice(), d.as_slice()),
        [d, s] if !d.is_empty() && !s.is_empty() => (d.as_slice(), s.as_slice()),
        _ => return Err(AsmError::new(AsmErrorKind::SyntaxError, line, "expected one or two operands")),
    };
    if matches!(d_tokens.first(), Some(t) if t.kind == TokenKind::Operator && (t.text == "#" || t.text == "##")) {
        return Err(AsmError::new(AsmErrorKind::SyntaxError, line, "the destination operand cannot be an immediate"));
    }

    let dst = if d_tokens.is_empty() { 0 } else { eval_register(d_tokens, symbols, cur.pc_value(), line)? };
    let next_pc = match cur.mode {
        Mode::Cog => cur.cur_cog.wrapping_add(1),
        Mode::Hub => cur.cur_hub.wrapping_add(4),
    };
    let (src, im, aug) = eval_source(s_tokens, symbols, cur.pc_value(), next_pc, is_relative_branch(mnemonic), line)?;

    let mut bytes = Vec::new();
    if let Some(payload) = aug {
        bytes.extend_from_slice(&encode_augment(cond, false, payload).to_le_bytes());
    }
    bytes.extend_from_slice(&encode_plain(cond, mnemonic, wc, wz, im, dst, src));
    Ok(bytes)
}

fn encode_instruction(
    cond: Condition,
    mnemonic: Mnemonic,
    groups: &[Vec<Token>],
    wc: bool,
    wz: bool,
    cur: &Cursor,
    symbols: &mut SymbolTable,
) -> Result<Vec<u8>, AsmError> {
    let line = groups.iter().flatten().next().map(|t| t.lineno).unwrap_or(0);
    let pc = cur.pc_value();

    match mnemonic.shape() {
        OperandShape::None => {
            if groups.iter().any(|g| !g.is_empty()) {
                return Err(AsmError::new(AsmErrorKind::SyntaxError, line, "this instruction takes no operands"));
            }
            Ok(encode_plain(cond, mnemonic, wc, wz, false, 0, 0))
        }
        OperandShape::Addr20 => {
            let g = single_operand(groups, line)?;
            let tokens = strip_leading_prefix(g);
            let v = eval_checked(tokens, symbols, pc, line)?;
            let value = v.get_addr().map_err(|_| AsmError::new(AsmErrorKind::InvalidOperand, line, "invalid operand"))?;
            if value > 0x3_FFFF {
                return Err(AsmError::new(
                    AsmErrorKind::AddressOutOfRange,
                    line,
                    "address exceeds the 18-bit absolute field",
                ));
            }
            let dst = ((value >> 9) & 0x1FF) as u16;
            let src = (value & 0x1FF) as u16;
            Ok(encode_plain(cond, mnemonic, wc, wz, true, dst, src))
        }
        OperandShape::Imm23 => Err(AsmError::new(
            AsmErrorKind::SyntaxError,
            line,
            "AUGS/AUGD are emitted automatically and cannot be written directly",
        )),
        OperandShape::DstSrc => encode_dst_src(cond, mnemonic, groups, wc, wz, cur, symbols, line),
    }
}

fn pass2_line(
    pl: &ParsedLine,
    image: &mut Vec<u8>,
    cur: &mut Cursor,
    symbols: &mut SymbolTable,
    errors: &mut Vec<AsmError>,
) {
    if let Some(label) = &pl.label {
        symbols.enter_scope(&label.text);
        symbols.set_value(&label.text, cur.addr_value());
    }
    match &pl.op {
        LineOp::Empty => {}
        LineOp::Assignment { name, expr } => match eval_checked(expr, symbols, cur.pc_value(), name.lineno) {
            Ok(v) => symbols.set_value(&name.text, v),
            Err(e) => errors.push(e),
        },
        LineOp::Section(s) => cur.section = *s,
        LineOp::Pseudo { name, groups } => pass2_pseudo(name, groups, image, cur, symbols, errors),
        LineOp::Instruction { cond, mnemonic, groups, wc, wz } => {
            if cur.section != Section::Dat {
                return;
            }
            match encode_instruction(*cond, *mnemonic, groups, *wc, *wz, cur, symbols) {
                Ok(bytes) => {
                    let addr = cur.cur_hub;
                    write_bytes(image, addr, &bytes);
                    cur.advance(bytes.len());
                }
                Err(e) => {
                    errors.push(e);
                    cur.advance(4);
                }
            }
        }
    }
}

/// Assemble a complete source file (C2 through C6). Errors are recovered
/// at line boundaries — a bad line doesn't stop the rest of the file from
/// assembling — and accumulate in the returned
/// [`AssembledProgram::errors`].
pub fn assemble(source: &str) -> AssembledProgram {
    let mut curly = 0i32;
    let mut logical_lines: Vec<Vec<Token>> = Vec::new();
    let mut errors: Vec<AsmError> = Vec::new();

    for (i, line) in source.lines().enumerate() {
        match tokenize_line(line, (i + 1) as u32, &mut curly) {
            Ok(mut toks) => {
                for t in toks.iter_mut() {
                    classify(t);
                }
                logical_lines.push(strip_comments(&toks));
            }
            Err(e) => {
                errors.push(e);
                logical_lines.push(Vec::new());
            }
        }
    }

    let mut symbols = SymbolTable::new();
    let mut parsed: Vec<Option<ParsedLine>> = Vec::with_capacity(logical_lines.len());
    let mut cur = Cursor::new();
    for toks in &logical_lines {
        if toks.is_empty() {
            parsed.push(None);
            continue;
        }
        match parse_line(toks) {
            Ok(pl) => {
                pass1_line(&pl, &mut cur, &mut symbols, &mut errors);
                parsed.push(Some(pl));
            }
            Err(e) => {
                errors.push(e);
                parsed.push(None);
            }
        }
    }

    let mut image = Vec::new();
    let mut cur = Cursor::new();
    for pl in parsed.iter().flatten() {
        pass2_line(pl, &mut image, &mut cur, &mut symbols, &mut errors);
    }

    AssembledProgram { image, symbols, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble_ok(src: &str) -> AssembledProgram {
        let prog = assemble(src);
        assert!(prog.errors.is_empty(), "unexpected errors: {:?}", prog.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        prog
    }

    #[test]
    fn assembles_a_single_instruction() {
        let prog = assemble_ok("DAT\n  ADD x,#1\nx LONG 0\n");
        assert_eq!(prog.image.len(), 8);
        let word = u32::from_le_bytes(prog.image[0..4].try_into().unwrap());
        let ins = Instruction::decode(word);
        assert_eq!(ins.inst, Mnemonic::ADD);
        assert!(ins.im);
        assert_eq!(ins.src, 1);
    }

    #[test]
    fn label_binds_to_its_own_address() {
        let prog = assemble_ok("DAT\nstart\n  RET\nhere\n  JMP #start\n");
        let here = prog.symbols.get("here").unwrap().value.clone();
        assert_eq!(here.get_addr().unwrap(), 1);
    }

    #[test]
    fn undefined_symbol_is_reported() {
        let prog = assemble("DAT\n  ADD x,#1\n");
        assert!(prog.errors.iter().any(|e| e.kind == AsmErrorKind::UnknownSymbol));
    }

    #[test]
    fn redefined_symbol_is_reported() {
        let prog = assemble("DAT\nfoo LONG 1\nfoo LONG 2\n");
        assert!(prog.errors.iter().any(|e| e.kind == AsmErrorKind::RedefinedSymbol));
    }

    #[test]
    fn augmented_immediate_emits_augs_prefix() {
        let prog = assemble_ok("DAT\n  MOV x,##$DEAD_BEEF\nx LONG 0\n");
        assert_eq!(prog.image.len(), 12);
        let aug_word = u32::from_le_bytes(prog.image[0..4].try_into().unwrap());
        match p2_asm::decode_any(aug_word) {
            p2_asm::DecodedWord::Augment { dest: false, payload, .. } => {
                assert_eq!(payload, 0xDEAD_BEEFu32 >> 9);
            }
            _ => panic!("expected an AUGS word"),
        }
    }

    #[test]
    fn relative_jump_is_encoded_as_a_signed_offset() {
        // `loop` sits at address 0; the `JMP` at address 1 computes its
        // offset against address 2 (the instruction after it), so the
        // encoded displacement is -2.
        let prog = assemble_ok("DAT\nloop\n  RET\n  JMP #loop\n");
        let word = u32::from_le_bytes(prog.image[4..8].try_into().unwrap());
        let ins = Instruction::decode(word);
        assert_eq!(ins.src, 0x1FE);
    }

    #[test]
    fn res_pseudo_op_advances_without_writing() {
        let prog = assemble_ok("DAT\n  RES 4\nafter LONG 0\n");
        let after = prog.symbols.get("after").unwrap().value.get_addr().unwrap();
        assert_eq!(after, 4); // cog address, in longs: 4 reserved longs later
    }
}
