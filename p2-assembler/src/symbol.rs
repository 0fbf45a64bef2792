use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use p2_value::Value;

use crate::token::Token;

/// A named binding: `(name, value, definition site, reference list)`
///. Names are case-insensitive and stored
/// lower-cased; a local symbol's stored name already carries its
/// enclosing-scope prefix (see [`SymbolTable::make_local`]).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Symbol {
    /// The symbol's spelling as first defined (not scope-qualified).
    pub name: String,
    /// The bound value. `Value::Invalid` until pass 1 resolves it.
    pub value: Value,
    /// The token that defined this symbol.
    pub definition: Token,
    /// Every token that referenced this symbol, in order of appearance.
    pub references: Vec<Token>,
}

/// The assembler's symbol table. Local symbols (`.foo`) are scoped to
/// the most recently defined non-local symbol: internally, `.foo` under
/// global `bar` is stored as `bar.foo`, so identically-spelled locals
/// under different globals don't collide.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<String, Symbol>,
    /// Insertion order, for deterministic iteration (symbol list views).
    order: Vec<String>,
    current_scope: Option<String>,
}

impl SymbolTable {
    /// A fresh, empty table.
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Rewrite a symbol's source spelling into its fully-scoped storage
    /// key: a local symbol (leading `.`) is prefixed with the enclosing
    /// non-local symbol's name; any other symbol also resets the current
    /// scope to itself.
    pub fn scoped_key(&self, raw_name: &str) -> String {
        let lower = raw_name.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix('.') {
            match &self.current_scope {
                Some(scope) => {
                    let mut key = scope.clone();
                    key.push('.');
                    key.push_str(rest);
                    key
                }
                None => lower,
            }
        } else {
            lower
        }
    }

    /// Update the enclosing scope. Called whenever a non-local symbol is
    /// defined, even if defining it fails for another reason.
    pub fn enter_scope(&mut self, raw_name: &str) {
        if !raw_name.starts_with('.') {
            self.current_scope = Some(raw_name.to_ascii_lowercase());
        }
    }

    /// Define `raw_name` with `value`, bound at `definition`. Returns the
    /// scoped key on success, or `Err(())` if the (scoped) name is already
    /// bound — the caller turns that into a `RedefinedSymbol` error
    /// carrying its own line/token context.
    pub fn define(
        &mut self,
        raw_name: &str,
        value: Value,
        definition: Token,
    ) -> Result<String, String> {
        let key = self.scoped_key(raw_name);
        if self.symbols.contains_key(&key) {
            return Err(key);
        }
        self.symbols.insert(
            key.clone(),
            Symbol { name: raw_name.to_string(), value, definition, references: Vec::new() },
        );
        self.order.push(key.clone());
        Ok(key)
    }

    /// Update an already-defined symbol's value (pass 1's forward-reference
    /// resolution, or pass 2's final binding).
    pub fn set_value(&mut self, raw_name: &str, value: Value) {
        let key = self.scoped_key(raw_name);
        if let Some(sym) = self.symbols.get_mut(&key) {
            sym.value = value;
        }
    }

    /// Look up a symbol's current value by its (possibly local) spelling.
    pub fn get(&self, raw_name: &str) -> Option<&Symbol> {
        let key = self.scoped_key(raw_name);
        self.symbols.get(&key)
    }

    /// Record that `reference` spelled `raw_name`, for cross-linking.
    pub fn add_reference(&mut self, raw_name: &str, reference: Token) {
        let key = self.scoped_key(raw_name);
        if let Some(sym) = self.symbols.get_mut(&key) {
            sym.references.push(reference);
        }
    }

    /// Whether `raw_name` is already bound.
    pub fn contains(&self, raw_name: &str) -> bool {
        self.symbols.contains_key(&self.scoped_key(raw_name))
    }

    /// All symbols, in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().filter_map(move |k| self.symbols.get(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn tok(text: &str) -> Token {
        Token::new(TokenKind::Symbol, 1, 0, text)
    }

    #[test]
    fn locals_scope_to_enclosing_global() {
        let mut t = SymbolTable::new();
        t.enter_scope("foo");
        t.define(".loop", Value::long(4), tok(".loop")).unwrap();
        t.enter_scope("bar");
        t.define(".loop", Value::long(8), tok(".loop")).unwrap();

        t.enter_scope("foo");
        assert_eq!(t.get(".loop").unwrap().value, Value::long(4));
        t.enter_scope("bar");
        assert_eq!(t.get(".loop").unwrap().value, Value::long(8));
    }

    #[test]
    fn redefinition_is_rejected() {
        let mut t = SymbolTable::new();
        t.define("x", Value::long(1), tok("x")).unwrap();
        assert!(t.define("x", Value::long(2), tok("x")).is_err());
    }
}
