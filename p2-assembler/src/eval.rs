use p2_value::{self as pv, BinOp, ElemKind, UnOp, Value};

use crate::error::{AsmError, AsmErrorKind};
use crate::lexer::{number_value, NumberValue};
use crate::symbol::SymbolTable;
use crate::token::{Token, TokenKind};

/// The expression evaluator: precedence-climbing over
/// a slice of tokens, lowest to highest precedence as specified.
pub struct Evaluator<'a> {
    tokens: &'a [Token],
    pos: usize,
    symbols: &'a mut SymbolTable,
    /// Current program counter, bound to `$`.
    pub pc: u32,
    /// Set when an unresolved forward reference was hit — pass 1 uses this
    /// to know the line needs re-evaluating once pass 2's symbol table is
    /// final.
    pub forward_ref: bool,
}

impl<'a> Evaluator<'a> {
    /// Build an evaluator over `tokens`, resolving symbols against `symbols`
    /// and `$` against `pc`.
    pub fn new(tokens: &'a [Token], symbols: &'a mut SymbolTable, pc: u32) -> Self {
        Evaluator { tokens, pos: 0, symbols, pc, forward_ref: false }
    }

    /// Evaluate the whole token slice as one expression. Errors if tokens
    /// remain unconsumed (an operand shape mismatch upstream).
    pub fn eval(mut self) -> Result<Value, AsmError> {
        let v = self.or_expr()?;
        if self.pos != self.tokens.len() {
            return Err(self.err(AsmErrorKind::SyntaxError, "unexpected trailing tokens"));
        }
        Ok(v)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn line(&self) -> u32 {
        self.tokens.first().map(|t| t.lineno).unwrap_or(0)
    }

    fn err(&self, kind: AsmErrorKind, msg: &str) -> AsmError {
        AsmError::new(kind, self.line(), msg)
    }

    fn at_op(&self, text: &str) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Operator && t.text == text)
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        self.pos += 1;
        t
    }

    // ternary-or-assignment: assignment is handled one level up by the
    // assembler (a bare `name = expr` pseudo-op), so this level is a pass
    // through to logical-or.
    fn or_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.and_expr()?;
        while self.at_op("||") || self.at_op("!!") {
            self.bump();
            let rhs = self.and_expr()?;
            lhs = self.binary(BinOp::LogOr, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.bitor_expr()?;
        while self.at_op("&&") {
            self.bump();
            let rhs = self.bitor_expr()?;
            lhs = self.binary(BinOp::LogAnd, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn bitor_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.bitxor_expr()?;
        while self.at_op("|") {
            self.bump();
            let rhs = self.bitxor_expr()?;
            lhs = self.binary(BinOp::Or, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn bitxor_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.bitand_expr()?;
        while self.at_op("^") {
            self.bump();
            let rhs = self.bitand_expr()?;
            lhs = self.binary(BinOp::Xor, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn bitand_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.eq_expr()?;
        while self.at_op("&") {
            self.bump();
            let rhs = self.eq_expr()?;
            lhs = self.binary(BinOp::And, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn eq_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.rel_expr()?;
        loop {
            let op = if self.at_op("==") {
                BinOp::Eq
            } else if self.at_op("!=") {
                BinOp::Ne
            } else {
                break;
            };
            self.bump();
            let rhs = self.rel_expr()?;
            lhs = self.binary(op, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn rel_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.shift_expr()?;
        loop {
            let op = if self.at_op("<") {
                BinOp::Lt
            } else if self.at_op("<=") {
                BinOp::Le
            } else if self.at_op(">") {
                BinOp::Gt
            } else if self.at_op("><") {
                BinOp::Ge
            } else {
                break;
            };
            self.bump();
            let rhs = self.shift_expr()?;
            lhs = self.binary(op, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn shift_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.add_expr()?;
        loop {
            let op = if self.at_op("<<") {
                BinOp::Shl
            } else if self.at_op(">>") {
                BinOp::Shr
            } else {
                break;
            };
            self.bump();
            let rhs = self.add_expr()?;
            lhs = self.binary(op, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = if self.at_op("+") {
                BinOp::Add
            } else if self.at_op("-") {
                BinOp::Sub
            } else {
                break;
            };
            self.bump();
            let rhs = self.mul_expr()?;
            lhs = self.binary(op, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Value, AsmError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = if self.at_op("*") {
                BinOp::Mul
            } else if self.at_op("/") {
                BinOp::Div
            } else if self.at_op("\\") {
                BinOp::Mod
            } else {
                break;
            };
            self.bump();
            let rhs = self.unary_expr()?;
            lhs = self.binary(op, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Value, AsmError> {
        if self.at_op("+") {
            self.bump();
            return self.unary_expr();
        }
        let op = if self.at_op("!") {
            // `!` is logical-not: a zero/nonzero predicate, distinct from
            // `~`'s bitwise complement.
            Some(None)
        } else if self.at_op("~") {
            Some(Some(UnOp::Not))
        } else if self.at_op("-") {
            Some(Some(UnOp::Neg))
        } else if self.at_op(">|") {
            Some(Some(UnOp::Encode))
        } else if self.at_op("|<") {
            Some(Some(UnOp::Decode))
        } else {
            None
        };
        if let Some(op) = op {
            self.bump();
            let v = self.unary_expr()?;
            return match op {
                Some(op) => pv::unary(op, &v).map_err(|_| {
                    self.err(AsmErrorKind::InvalidOperand, "operation undefined for this value type")
                }),
                None => {
                    let zero = Value::long(0);
                    self.binary(BinOp::Eq, &v, &zero)
                }
            };
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<Value, AsmError> {
        let line = self.line();
        let tok = self.peek().cloned().ok_or_else(|| {
            AsmError::new(AsmErrorKind::SyntaxError, line, "expected an expression")
        })?;

        match tok.kind {
            TokenKind::NumberByt
            | TokenKind::NumberBin
            | TokenKind::NumberHex
            | TokenKind::NumberDec => {
                self.bump();
                match number_value(&tok)? {
                    NumberValue::Int(v) => Ok(Value::long(v as u32)),
                    NumberValue::Real(_) => unreachable!(),
                }
            }
            TokenKind::NumberReal => {
                self.bump();
                match number_value(&tok)? {
                    NumberValue::Real(r) => Ok(Value::scalar(p2_value::Elem::Real(r))),
                    NumberValue::Int(_) => unreachable!(),
                }
            }
            TokenKind::String => {
                self.bump();
                let inner = &tok.text[1..tok.text.len() - 1];
                let unescaped = inner.replace("\\\"", "\"");
                Ok(Value::string(unescaped.into_bytes()))
            }
            TokenKind::Symbol | TokenKind::LocalSymbol if is_function(&tok.text) => {
                self.bump();
                self.expect_op("(")?;
                let arg = self.or_expr()?;
                self.expect_op(")")?;
                apply_function(&tok.text, arg)
                    .map_err(|_| AsmError::new(AsmErrorKind::InvalidOperand, line, "bad function argument"))
            }
            TokenKind::Symbol | TokenKind::LocalSymbol => {
                self.bump();
                if tok.text_eq_ci("$") {
                    return Ok(Value::long(self.pc));
                }
                self.symbols.add_reference(&tok.text, tok.clone());
                match self.symbols.get(&tok.text) {
                    Some(sym) => Ok(sym.value.clone()),
                    None => {
                        self.forward_ref = true;
                        Ok(Value::long(0))
                    }
                }
            }
            TokenKind::Operator if tok.text == "$" => {
                self.bump();
                Ok(Value::long(self.pc))
            }
            TokenKind::Operator if tok.text == "(" => {
                self.bump();
                let v = self.or_expr()?;
                self.expect_op(")")?;
                Ok(v)
            }
            TokenKind::Operator if tok.text == "[" => {
                self.bump();
                let v = self.or_expr()?;
                self.expect_op("]")?;
                Ok(v)
            }
            TokenKind::Mnemonic | TokenKind::Unknown if is_function(&tok.text) => {
                self.bump();
                self.expect_op("(")?;
                let arg = self.or_expr()?;
                self.expect_op(")")?;
                apply_function(&tok.text, arg)
                    .map_err(|_| AsmError::new(AsmErrorKind::InvalidOperand, line, "bad function argument"))
            }
            _ => Err(AsmError::new(AsmErrorKind::SyntaxError, line, "unexpected token in expression")),
        }
    }

    fn expect_op(&mut self, text: &str) -> Result<(), AsmError> {
        if self.at_op(text) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(AsmErrorKind::SyntaxError, "expected a closing delimiter"))
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, AsmError> {
        if matches!(op, BinOp::Div | BinOp::Mod)
            && rhs.as_u32().unwrap_or(1) == 0
            && lhs.kind() != Some(ElemKind::Real)
        {
            // Division returns the left operand unchanged for non-Real
            // types; explicit `//`/`\` in an *assignment* raises
            // DivideByZero instead, handled by the assembler layer which
            // knows it's in assignment context.
            return Ok(lhs.clone());
        }
        pv::binary(op, lhs, rhs)
            .map_err(|_| self.err(AsmErrorKind::InvalidOperand, "operation undefined for this value type"))
    }
}

fn is_function(text: &str) -> bool {
    ["FLOAT", "ROUND", "TRUNC"].iter().any(|f| text.eq_ignore_ascii_case(f))
}

fn apply_function(name: &str, arg: Value) -> Result<Value, p2_value::ValueError> {
    let as_real = match &arg {
        Value::Scalar(p2_value::Elem::Real(r)) => *r,
        other => other.as_u32()? as i32 as f64,
    };
    if name.eq_ignore_ascii_case("FLOAT") {
        Ok(Value::scalar(p2_value::Elem::Real(arg.as_u32().unwrap_or(0) as i32 as f64)))
    } else if name.eq_ignore_ascii_case("ROUND") {
        Ok(Value::long(as_real.round() as i64 as u32))
    } else {
        Ok(Value::long(as_real.trunc() as i64 as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::lexer::tokenize_line;

    fn tokenize(src: &str) -> Vec<Token> {
        let mut curly = 0i32;
        let mut tokens = tokenize_line(src, 1, &mut curly).expect("tokenize failed");
        for t in &mut tokens {
            classify(t);
        }
        tokens
    }

    fn eval_str(src: &str) -> Value {
        let tokens = tokenize(src);
        let mut symbols = SymbolTable::new();
        Evaluator::new(&tokens, &mut symbols, 0).eval().expect("eval failed")
    }

    #[test]
    fn precedence_follows_the_spec_ladder() {
        // multiplicative binds tighter than additive.
        assert_eq!(eval_str("2 + 3 * 4").as_u32().unwrap(), 14);
        // shift binds tighter than relational.
        assert_eq!(eval_str("1 << 4 > 8").as_u32().unwrap(), 1);
        // bitwise-and binds tighter than bitwise-xor/or.
        assert_eq!(eval_str("1 | 2 & 3").as_u32().unwrap(), 3);
    }

    #[test]
    fn parens_and_brackets_both_group() {
        assert_eq!(eval_str("(1 + 2) * 3").as_u32().unwrap(), 9);
        assert_eq!(eval_str("[1 + 2] * 3").as_u32().unwrap(), 9);
    }

    #[test]
    fn dollar_binds_to_the_current_pc() {
        let tokens = tokenize("$ + 1");
        let mut symbols = SymbolTable::new();
        let v = Evaluator::new(&tokens, &mut symbols, 0x100).eval().unwrap();
        assert_eq!(v.as_u32().unwrap(), 0x101);
    }

    #[test]
    fn division_by_zero_returns_the_left_operand() {
        assert_eq!(eval_str("7 / 0").as_u32().unwrap(), 7);
        assert_eq!(eval_str("7 \\ 0").as_u32().unwrap(), 7);
    }

    #[test]
    fn unary_encode_and_decode_match_bit_functions() {
        assert_eq!(eval_str(">| $8000_0000").as_u32().unwrap(), 32);
        assert_eq!(eval_str("|< 5").as_u32().unwrap(), 1 << 5);
    }

    #[test]
    fn unresolved_symbol_sets_forward_ref_and_evaluates_to_zero() {
        let tokens = tokenize("missing");
        let mut symbols = SymbolTable::new();
        let mut ev = Evaluator::new(&tokens, &mut symbols, 0);
        let v = ev.or_expr().unwrap();
        assert_eq!(v.as_u32().unwrap(), 0);
        assert!(ev.forward_ref);
    }

    #[test]
    fn functions_float_round_trunc() {
        assert_eq!(eval_str("ROUND(3.7)").as_u32().unwrap(), 4);
        assert_eq!(eval_str("TRUNC(3.7)").as_u32().unwrap(), 3);
    }

    #[test]
    fn logical_not_is_a_zero_predicate() {
        assert_eq!(eval_str("!0").as_u32().unwrap(), 1);
        assert_eq!(eval_str("!5").as_u32().unwrap(), 0);
    }
}
