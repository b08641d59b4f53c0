use std::cell::RefCell;
use std::collections::HashMap;

use log::debug;

use crate::error::{Error, ReferenceKind, Result};

#[derive(Debug, Clone)]
enum Resolution<V> {
    Resolving,
    Resolved(V),
}

/// Memoized resolution of named definitions, with cycle detection.
///
/// A name is marked as being resolved for the duration of its computation. Asking for the
/// same name again before the computation finishes is a circular reference.
#[derive(Debug)]
pub struct NamedMemo<V> {
    kind: ReferenceKind,
    entries: RefCell<HashMap<String, Resolution<V>>>,
}

impl<V: Clone> NamedMemo<V> {
    pub fn new(kind: ReferenceKind) -> Self {
        Self {
            kind,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn get(&self, name: &str) -> Option<V> {
        match self.entries.borrow().get(name) {
            Some(Resolution::Resolved(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// Return the memoized value for `name`, running `compute` on first use.
    ///
    /// Failed computations are not memoized.
    pub fn resolve(&self, name: &str, compute: impl FnOnce() -> Result<V>) -> Result<V> {
        match self.entries.borrow().get(name) {
            Some(Resolution::Resolved(v)) => return Ok(v.clone()),
            Some(Resolution::Resolving) => {
                debug!("Circular {} reference: {}", self.kind, name);
                return Err(Error::CircularReference {
                    kind: self.kind,
                    name: name.to_string(),
                });
            }
            None => {}
        }

        self.entries
            .borrow_mut()
            .insert(name.to_string(), Resolution::Resolving);

        match compute() {
            Ok(v) => {
                self.entries
                    .borrow_mut()
                    .insert(name.to_string(), Resolution::Resolved(v.clone()));
                Ok(v)
            }
            Err(e) => {
                self.entries.borrow_mut().remove(name);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use test_log::test;

    use super::*;

    #[test]
    fn test_resolve_once() {
        let memo = NamedMemo::new(ReferenceKind::Filter);
        let calls = Cell::new(0);

        for _ in 0..3 {
            let v = memo.resolve("a", || {
                calls.set(calls.get() + 1);
                Ok(42)
            });
            assert_eq!(v, Ok(42));
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(memo.get("a"), Some(42));
    }

    #[test]
    fn test_cycle_is_reported() {
        let memo = NamedMemo::<u32>::new(ReferenceKind::IpSpace);
        let res = memo.resolve("a", || memo.resolve("b", || memo.resolve("a", || Ok(1))));
        assert_eq!(
            res,
            Err(Error::CircularReference {
                kind: ReferenceKind::IpSpace,
                name: "a".to_string()
            })
        );

        // Nothing was memoized, and both names can be retried.
        assert_eq!(memo.get("a"), None);
        assert_eq!(memo.resolve("b", || Ok(2)), Ok(2));
    }
}
