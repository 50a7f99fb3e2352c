//! Mutation diff engine
//!
//! Decides whether a Tape value changed relative to what the scope inherited.
//! A value counts as unchanged only when it is still the very object that was
//! inherited *and* its reachable state is deep-equal to the pristine copy
//! taken when the Tape was created.

use std::collections::HashMap;

use crate::value::Value;

/// Structural equality probe over value graphs.
///
/// Pairs of heap nodes are memoized by address. A pair that is already being
/// compared further up the stack answers `true`, which keeps the probe finite
/// on cyclic graphs and linear on shared substructure.
#[derive(Debug, Default)]
pub struct Comparator {
    cache: HashMap<(usize, usize), bool>,
}

impl Comparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::List(x), Value::List(y)) => self.memo(x.addr(), y.addr(), |probe| {
                let (xs, ys) = (x.borrow(), y.borrow());
                xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(l, r)| probe.equal(l, r))
            }),
            (Value::Map(x), Value::Map(y)) => self.memo(x.addr(), y.addr(), |probe| {
                let (xs, ys) = (x.borrow(), y.borrow());
                xs.len() == ys.len()
                    && xs.iter().all(|(k, v)| {
                        ys.iter()
                            .any(|(k2, v2)| probe.equal(k, k2) && probe.equal(v, v2))
                    })
            }),
            (Value::Object(x), Value::Object(y)) => self.memo(x.addr(), y.addr(), |probe| {
                let (xs, ys) = (x.borrow(), y.borrow());
                xs.class == ys.class
                    && xs.fields.len() == ys.fields.len()
                    && xs.fields.iter().all(|(name, v)| {
                        ys.fields.get(name).is_some_and(|v2| probe.equal(v, v2))
                    })
            }),
            (Value::Opaque(x), Value::Opaque(y)) => x.ptr_eq(y),
            _ => false,
        }
    }

    fn memo(&mut self, a: usize, b: usize, compare: impl FnOnce(&mut Self) -> bool) -> bool {
        if let Some(&known) = self.cache.get(&(a, b)) {
            return known;
        }
        self.cache.insert((a, b), true);
        let result = compare(self);
        self.cache.insert((a, b), result);
        result
    }
}

/// Whether `live` must be re-serialized by the current scope.
///
/// `pristine` is the deep copy of the inherited value and `identity` the
/// inherited instance itself; either being absent means the key is new here.
pub fn mutated(
    live: &Value,
    pristine: Option<&Value>,
    identity: Option<&Value>,
    probe: &mut Comparator,
) -> bool {
    match (pristine, identity) {
        (Some(pristine), Some(identity)) => {
            !live.same(identity) || !probe.equal(pristine, live)
        }
        _ => true,
    }
}
