//! Value dictionaries (C1): interns strings (country, city, interest) to small
//! integer ids. Append-only — once assigned, an id never changes or is recycled.

use std::collections::HashMap;

use parking_lot::RwLock;

struct Inner {
    forward: HashMap<String, i32>,
    reverse: Vec<String>,
}

/// A string-interning table. `get_or_create` must only be called from the
/// writer critical section; `lookup`/`value` are safe to call from any reader.
pub struct Dictionary {
    inner: RwLock<Inner>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary {
            inner: RwLock::new(Inner {
                forward: HashMap::new(),
                reverse: Vec::new(),
            }),
        }
    }

    pub fn lookup(&self, s: &str) -> Option<i32> {
        self.inner.read().forward.get(s).copied()
    }

    pub fn value(&self, id: i32) -> Option<String> {
        if id < 0 {
            return None;
        }
        self.inner.read().reverse.get(id as usize).cloned()
    }

    pub fn get_or_create(&self, s: &str) -> i32 {
        {
            let inner = self.inner.read();
            if let Some(&id) = inner.forward.get(s) {
                return id;
            }
        }
        let mut inner = self.inner.write();
        if let Some(&id) = inner.forward.get(s) {
            return id;
        }
        let id = inner.reverse.len() as i32;
        inner.reverse.push(s.to_string());
        inner.forward.insert(s.to_string(), id);
        id
    }

    pub fn len(&self) -> usize {
        self.inner.read().reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

/// The three value dictionaries the account schema interns strings through.
pub struct Dictionaries {
    pub country: Dictionary,
    pub city: Dictionary,
    pub interest: Dictionary,
}

impl Dictionaries {
    pub fn new() -> Self {
        Dictionaries {
            country: Dictionary::new(),
            city: Dictionary::new(),
            interest: Dictionary::new(),
        }
    }
}

impl Default for Dictionaries {
    fn default() -> Self {
        Self::new()
    }
}
