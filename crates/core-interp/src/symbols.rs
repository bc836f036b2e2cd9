//! Widget symbol tables.
//!
//! Maps symbolic widget message names to their numeric ids for the `ES`
//! command, with prefix completion. Also carries the style-name table:
//! looking up a style resolves the *id by name* (not name by id); a
//! long-standing user-visible overload that is kept as-is.

use core_string::{Completion, NameIndex};

use crate::Int;

pub struct SymbolTable {
    messages: NameIndex<Int>,
    styles: NameIndex<Int>,
}

impl SymbolTable {
    /// The built-in message and style vocabulary.
    pub fn builtin() -> Self {
        let mut messages = NameIndex::new(false);
        for (name, id) in MESSAGES {
            messages.insert_unique(name.as_bytes(), *id);
        }
        let mut styles = NameIndex::new(false);
        for (name, id) in STYLES {
            styles.insert_unique(name.as_bytes(), *id);
        }
        Self { messages, styles }
    }

    /// Resolve a message symbol, tolerating the `SCI_` prefix and any
    /// letter case.
    pub fn lookup(&self, name: &str) -> Option<Int> {
        let name = name.strip_prefix("SCI_").unwrap_or(name);
        let name = name.strip_prefix("sci_").unwrap_or(name);
        if let Some(id) = self.messages.find(name.as_bytes()) {
            return Some(*id);
        }
        // the style overload: a style *name* resolves to its id
        self.styles.find(name.as_bytes()).copied()
    }

    pub fn auto_complete(&self, prefix: &[u8]) -> Completion {
        self.messages.auto_complete(prefix, 0)
    }
}

const MESSAGES: &[(&str, Int)] = &[
    ("ADDTEXT", 2001),
    ("INSERTTEXT", 2003),
    ("CLEARALL", 2004),
    ("GETLENGTH", 2006),
    ("GETCHARAT", 2007),
    ("GETCURRENTPOS", 2008),
    ("GETANCHOR", 2009),
    ("GOTOPOS", 2025),
    ("GETEOLMODE", 2030),
    ("SETEOLMODE", 2031),
    ("BEGINUNDOACTION", 2078),
    ("ENDUNDOACTION", 2079),
    ("GETLINECOUNT", 2154),
    ("SETSEL", 2160),
    ("LINEFROMPOSITION", 2166),
    ("POSITIONFROMLINE", 2167),
    ("UNDO", 2176),
    ("GETTEXTLENGTH", 2183),
    ("APPENDTEXT", 2282),
    ("DELETERANGE", 2645),
    ("NAMEOFSTYLE", 4030),
];

const STYLES: &[(&str, Int)] = &[
    ("DEFAULT", 0),
    ("COMMENT", 1),
    ("NUMBER", 2),
    ("STRING", 3),
    ("OPERATOR", 4),
    ("IDENTIFIER", 5),
    ("LABEL", 6),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_prefix_tolerant() {
        let t = SymbolTable::builtin();
        assert_eq!(t.lookup("GETLENGTH"), Some(2006));
        assert_eq!(t.lookup("getlength"), Some(2006));
        assert_eq!(t.lookup("SCI_GETLENGTH"), Some(2006));
        assert_eq!(t.lookup("NOSUCH"), None);
    }

    #[test]
    fn style_names_resolve_to_ids() {
        let t = SymbolTable::builtin();
        assert_eq!(t.lookup("COMMENT"), Some(1));
    }

    #[test]
    fn completion_over_messages() {
        let t = SymbolTable::builtin();
        match t.auto_complete(b"GETC") {
            Completion::Ambiguous { candidates, .. } => {
                assert!(candidates.len() >= 2);
            }
            Completion::Unique { .. } => {}
            other => panic!("expected candidates, got {other:?}"),
        }
    }
}
