//! Deferred values produced by resource declaration.
//!
//! A [`Value<T>`] is a read-only handle to a value that the declaration engine
//! resolves once the underlying platform resource is realized (a generated
//! name, an assigned port). Components reference these eagerly at composition
//! time and compose them with [`Value::map`] / [`Value::zip`]; reading before
//! and after resolution has identical semantics — [`Value::get`] is a
//! projection, never a blocking wait.

use std::fmt;
use std::sync::{Arc, OnceLock};

type Thunk<T> = Box<dyn Fn() -> Option<T> + Send + Sync>;

struct Inner<T> {
    cell: OnceLock<T>,
    thunk: Option<Thunk<T>>,
}

/// A deferred, read-only value. Cheap to clone; clones share resolution.
pub struct Value<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

/// Write side of a deferred [`Value`]. Consumed on resolve; the producing
/// engine resolves each value at most once.
pub struct Resolver<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Value<T> {
    /// A value known up front.
    pub fn ready(value: T) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(value);
        Self { inner: Arc::new(Inner { cell, thunk: None }) }
    }

    /// A pending value plus its single-use write side.
    pub fn deferred() -> (Self, Resolver<T>) {
        let inner = Arc::new(Inner { cell: OnceLock::new(), thunk: None });
        (Self { inner: Arc::clone(&inner) }, Resolver { inner })
    }

    /// Project the value if it has been resolved. Derived values (via `map`,
    /// `zip`) resolve transparently once all of their sources have.
    pub fn get(&self) -> Option<T> {
        if let Some(v) = self.inner.cell.get() {
            return Some(v.clone());
        }
        let v = self.inner.thunk.as_ref().and_then(|t| t())?;
        let _ = self.inner.cell.set(v.clone());
        Some(v)
    }

    /// Derive a new deferred value by applying `f` once this one resolves.
    pub fn map<U, F>(&self, f: F) -> Value<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let src = self.clone();
        Value {
            inner: Arc::new(Inner {
                cell: OnceLock::new(),
                thunk: Some(Box::new(move || src.get().map(&f))),
            }),
        }
    }

    /// Combine two deferred values; resolves once both sources have.
    pub fn zip<U>(&self, other: &Value<U>) -> Value<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let a = self.clone();
        let b = other.clone();
        Value {
            inner: Arc::new(Inner {
                cell: OnceLock::new(),
                thunk: Some(Box::new(move || Some((a.get()?, b.get()?)))),
            }),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Resolver<T> {
    /// Resolve the paired value. A second resolve of an already-set cell is a
    /// no-op (the first write wins).
    pub fn resolve(self, value: T) {
        let _ = self.inner.cell.set(value);
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => write!(f, "Value({:?})", v),
            None => write!(f, "Value(<pending>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_projects_immediately() {
        let v = Value::ready(7);
        assert_eq!(v.get(), Some(7));
    }

    #[test]
    fn deferred_is_none_until_resolved() {
        let (v, tx) = Value::deferred();
        assert_eq!(v.get(), None);
        tx.resolve("svc-a".to_string());
        assert_eq!(v.get().as_deref(), Some("svc-a"));
    }

    #[test]
    fn map_composes_before_resolution() {
        let (v, tx) = Value::deferred();
        let url = v.map(|name: String| format!("http://{}:3100", name));
        assert_eq!(url.get(), None);
        tx.resolve("loki".to_string());
        assert_eq!(url.get().as_deref(), Some("http://loki:3100"));
        // Projection is stable across repeated reads.
        assert_eq!(url.get().as_deref(), Some("http://loki:3100"));
    }

    #[test]
    fn zip_waits_for_both_sides() {
        let (a, ta) = Value::deferred();
        let (b, tb) = Value::deferred();
        let joined = a.zip(&b).map(|(n, ns): (String, String)| format!("{}.{}", n, ns));
        ta.resolve("grafana".to_string());
        assert_eq!(joined.get(), None);
        tb.resolve("default".to_string());
        assert_eq!(joined.get().as_deref(), Some("grafana.default"));
    }

    #[test]
    fn clones_share_resolution() {
        let (v, tx) = Value::deferred();
        let c = v.clone();
        tx.resolve(42);
        assert_eq!(c.get(), Some(42));
    }
}
