//! Interning of identifiers, keywords and native names into a single dense
//! `Iname` space split into three disjoint ranges (§4.1).
//!
//! Grounded on the teacher's `intern.rs`: a dedup map (`AHashMap<String, _>`)
//! backed by an append-only `Vec<String>` for reverse lookup, and a small
//! module of pre-registered constants (there `attr::APPEND` etc, here the
//! keyword/native name constants every special form and built-in operator
//! needs a stable id for before any user script is parsed).

use ahash::AHashMap;

use crate::error::{SeniError, SeniResult};

/// Interned name. 32 bits, dense within each of the three ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Iname(u32);

impl Iname {
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// Capacity of each range. Sized generously — a user script close to these
/// limits is already pathological (§7 TooManyLocals/TooManyGlobals cover the
/// compiler-side analogues; these are the parse-time word-table limits).
pub const WORD_CAPACITY: u32 = 65536;
pub const KEYWORD_CAPACITY: u32 = 4096;
pub const NATIVE_CAPACITY: u32 = 4096;

pub const WORD_START: u32 = 0;
pub const KEYWORD_START: u32 = WORD_START + WORD_CAPACITY;
pub const NATIVE_START: u32 = KEYWORD_START + KEYWORD_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Range {
    Word,
    Keyword,
    Native,
}

impl Range {
    fn base(self) -> u32 {
        match self {
            Range::Word => WORD_START,
            Range::Keyword => KEYWORD_START,
            Range::Native => NATIVE_START,
        }
    }

    fn capacity(self) -> u32 {
        match self {
            Range::Word => WORD_CAPACITY,
            Range::Keyword => KEYWORD_CAPACITY,
            Range::Native => NATIVE_CAPACITY,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Range::Word => "WORD",
            Range::Keyword => "KEYWORD",
            Range::Native => "NATIVE",
        }
    }
}

/// One of the three append-only string arrays, plus its dedup map.
#[derive(Debug, Default)]
struct RangeTable {
    strings: Vec<String>,
    lookup: AHashMap<String, u32>,
}

impl RangeTable {
    fn intern(&mut self, range: Range, s: &str) -> SeniResult<Iname> {
        if let Some(&idx) = self.lookup.get(s) {
            return Ok(Iname(range.base() + idx));
        }
        let idx = u32::try_from(self.strings.len()).expect("range index overflow");
        if idx >= range.capacity() {
            return Err(SeniError::WordTableOverflow { range: range.name() });
        }
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), idx);
        Ok(Iname(range.base() + idx))
    }

    fn get(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    fn reset(&mut self) {
        self.strings.clear();
        self.lookup.clear();
    }
}

/// The word table: three disjoint ranges of interned strings (§4.1).
///
/// Keywords and natives are registered once at startup by [`WordTable::with_reserved`]
/// and are immutable afterwards; words are interned per-script and cleared with
/// [`WordTable::reset_words`].
#[derive(Debug, Default)]
pub struct WordTable {
    words: RangeTable,
    keywords: RangeTable,
    natives: RangeTable,
}

impl WordTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a user identifier (the WORD range).
    pub fn intern(&mut self, s: &str) -> SeniResult<Iname> {
        self.words.intern(Range::Word, s)
    }

    /// Registers a reserved keyword/special-form/argument-label name.
    /// Called only during subsystem startup, before any script is parsed.
    pub fn register_keyword(&mut self, s: &str) -> Iname {
        self.keywords
            .intern(Range::Keyword, s)
            .expect("keyword table overflow during startup registration")
    }

    /// Registers a native function name. Called only during subsystem startup.
    pub fn register_native(&mut self, s: &str) -> Iname {
        self.natives
            .intern(Range::Native, s)
            .expect("native table overflow during startup registration")
    }

    /// Looks up an iname across all three ranges without inserting.
    #[must_use]
    pub fn lookup(&self, s: &str) -> Option<Iname> {
        if let Some(&idx) = self.keywords.lookup.get(s) {
            return Some(Iname(KEYWORD_START + idx));
        }
        if let Some(&idx) = self.natives.lookup.get(s) {
            return Some(Iname(NATIVE_START + idx));
        }
        self.words.lookup.get(s).map(|&idx| Iname(WORD_START + idx))
    }

    /// Reverse lookup: iname to string slice.
    #[must_use]
    pub fn reverse(&self, iname: Iname) -> Option<&str> {
        let raw = iname.raw();
        if raw >= NATIVE_START {
            self.natives.get(raw - NATIVE_START)
        } else if raw >= KEYWORD_START {
            self.keywords.get(raw - KEYWORD_START)
        } else {
            self.words.get(raw - WORD_START)
        }
    }

    #[must_use]
    pub fn is_keyword(iname: Iname) -> bool {
        iname.raw() >= KEYWORD_START && iname.raw() < NATIVE_START
    }

    #[must_use]
    pub fn is_native(iname: Iname) -> bool {
        iname.raw() >= NATIVE_START
    }

    #[must_use]
    pub fn is_word(iname: Iname) -> bool {
        iname.raw() < KEYWORD_START
    }

    /// Clears only the user-word range, called between scripts (§4.1).
    pub fn reset_words(&mut self) {
        self.words.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable_and_dense() {
        let mut t = WordTable::new();
        let a = t.intern("foo").unwrap();
        let b = t.intern("bar").unwrap();
        let a2 = t.intern("foo").unwrap();
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(t.reverse(a), Some("foo"));
    }

    #[test]
    fn ranges_never_overlap() {
        let mut t = WordTable::new();
        let kw = t.register_keyword("if");
        let nat = t.register_native("line");
        let w = t.intern("if").unwrap();
        assert!(WordTable::is_keyword(kw));
        assert!(WordTable::is_native(nat));
        assert!(WordTable::is_word(w));
        // "if" interned as a word is a distinct iname from the keyword "if" —
        // the parser always tries keywords first at resolution time.
        assert_ne!(kw.raw(), w.raw());
    }

    #[test]
    fn reset_words_only_clears_user_range() {
        let mut t = WordTable::new();
        let kw = t.register_keyword("define");
        t.intern("my-var").unwrap();
        t.reset_words();
        assert!(t.lookup("my-var").is_none());
        assert_eq!(t.lookup("define"), Some(kw));
    }
}
