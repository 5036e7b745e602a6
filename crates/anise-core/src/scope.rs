use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::error::AniseError;
use crate::macros::Macro;
use crate::specials::{builtin_specials, SpecialFn};

pub type ScopeRef = Arc<RwLock<Scope>>;

/// Keywords of the emitted target language. A mangled identifier never
/// collides with these.
static RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "if", "in",
        "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
    ]
    .into_iter()
    .collect()
});

pub fn is_reserved_word(name: &str) -> bool {
    RESERVED.contains(name)
}

/// One level of the lexical environment. All four tables fall back to the
/// parent chain on lookup; writes always land in the current scope.
pub struct Scope {
    manglings: HashMap<String, String>,
    unmanglings: HashMap<String, String>,
    macros: HashMap<String, Macro>,
    specials: HashMap<String, SpecialFn>,
    parent: Option<ScopeRef>,
    pub vararg: bool,
    pub depth: usize,
}

impl Scope {
    /// The root scope owns the built-in special forms and permits `...`
    /// (a target main chunk is variadic).
    pub fn root() -> ScopeRef {
        Arc::new(RwLock::new(Scope {
            manglings: HashMap::new(),
            unmanglings: HashMap::new(),
            macros: HashMap::new(),
            specials: builtin_specials(),
            parent: None,
            vararg: true,
            depth: 0,
        }))
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        let (vararg, depth) = {
            let p = parent.read().unwrap();
            (p.vararg, p.depth + 1)
        };
        Arc::new(RwLock::new(Scope {
            manglings: HashMap::new(),
            unmanglings: HashMap::new(),
            macros: HashMap::new(),
            specials: HashMap::new(),
            parent: Some(parent.clone()),
            vararg,
            depth,
        }))
    }

    pub fn lookup_mangling(&self, name: &str) -> Option<String> {
        if let Some(found) = self.manglings.get(name) {
            return Some(found.clone());
        }
        self.parent
            .as_ref()
            .and_then(|p| p.read().unwrap().lookup_mangling(name))
    }

    pub fn has_unmangling(&self, candidate: &str) -> bool {
        if self.unmanglings.contains_key(candidate) {
            return true;
        }
        self.parent
            .as_ref()
            .map(|p| p.read().unwrap().has_unmangling(candidate))
            .unwrap_or(false)
    }

    pub fn lookup_macro(&self, name: &str) -> Option<Macro> {
        if let Some(found) = self.macros.get(name) {
            return Some(found.clone());
        }
        self.parent
            .as_ref()
            .and_then(|p| p.read().unwrap().lookup_macro(name))
    }

    pub fn lookup_special(&self, name: &str) -> Option<SpecialFn> {
        if let Some(found) = self.specials.get(name) {
            return Some(found.clone());
        }
        self.parent
            .as_ref()
            .and_then(|p| p.read().unwrap().lookup_special(name))
    }

    pub fn define_macro(&mut self, name: impl Into<String>, transformer: Macro) {
        self.macros.insert(name.into(), transformer);
    }

    pub fn macro_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.macros.keys().cloned().collect();
        if let Some(parent) = &self.parent {
            names.extend(parent.read().unwrap().macro_names());
        }
        names
    }

    fn record(&mut self, name: &str, mangled: &str) {
        self.manglings.insert(name.to_string(), mangled.to_string());
        self.unmanglings
            .insert(mangled.to_string(), name.to_string());
    }
}

/// Rename a source identifier to a legal, unique target identifier,
/// reusing any mangling already visible in the chain. New manglings are
/// recorded in `scope` itself.
pub fn mangle(scope: &ScopeRef, name: &str) -> Result<String, AniseError> {
    if name == "..." {
        if scope.read().unwrap().vararg {
            return Ok(name.to_string());
        }
        return Err(AniseError::vararg_not_allowed());
    }
    if let Some(existing) = scope.read().unwrap().lookup_mangling(name) {
        return Ok(existing);
    }

    let mut candidate = String::with_capacity(name.len() + 1);
    let first = name.as_bytes().first().copied();
    let starts_ident = matches!(first, Some(b) if b.is_ascii_alphabetic() || b == b'_');
    if is_reserved_word(name) || !starts_ident {
        candidate.push('_');
    }
    for &byte in name.as_bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            candidate.push(byte as char);
        } else {
            push_base36(&mut candidate, byte);
        }
    }

    let unique = {
        let guard = scope.read().unwrap();
        if guard.has_unmangling(&candidate) {
            let mut suffix = 0usize;
            loop {
                let attempt = format!("{}{}", candidate, suffix);
                if !guard.has_unmangling(&attempt) {
                    break attempt;
                }
                suffix += 1;
            }
        } else {
            candidate
        }
    };
    scope.write().unwrap().record(name, &unique);
    Ok(unique)
}

/// Fresh target identifier: the first of `_0`, `_1`, … unused anywhere in
/// the chain, recorded so later manglings cannot collide with it.
pub fn gensym(scope: &ScopeRef) -> String {
    let name = {
        let guard = scope.read().unwrap();
        let mut i = 0usize;
        loop {
            let candidate = format!("_{}", i);
            if !guard.has_unmangling(&candidate) {
                break candidate;
            }
            i += 1;
        }
    };
    scope.write().unwrap().record(&name, &name);
    name
}

fn push_base36(out: &mut String, byte: u8) {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let hi = byte / 36;
    if hi > 0 {
        out.push(DIGITS[hi as usize] as char);
    }
    out.push(DIGITS[(byte % 36) as usize] as char);
}
