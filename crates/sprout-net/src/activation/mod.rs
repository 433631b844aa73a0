mod provider;

pub use provider::{ActivationProvider, DefaultActivationProvider, RandomActivationProvider};

use crate::ids::{ActivationId, UniqueIdCounter};
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Saturation bound applied wherever a raw activation value could overflow.
const FLOAT_HIGH: f32 = 1e10;

#[inline]
fn saturate(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-FLOAT_HIGH, FLOAT_HIGH)
    }
}

pub type ActivationFn = Box<dyn Fn(f32) -> f32 + Send + Sync>;

/// A shared handle to an activation. Nodes hold these; the baked network
/// dedups its activation table through pointer identity of the handle.
pub type ActivationRef = Arc<Activation>;

/// A named scalar function `f: R -> R` addressable by [ActivationId].
///
/// The id is assigned by the [ActivationLibrary] at registration time and is
/// invalid before that. Activations are plain values; mutation swaps the
/// handle stored in a node rather than dispatching through a type hierarchy.
pub struct Activation {
    id: ActivationId,
    name: String,
    func: ActivationFn,
}

impl Activation {
    pub fn new(name: impl Into<String>, func: impl Fn(f32) -> f32 + Send + Sync + 'static) -> Self {
        Activation {
            id: ActivationId::INVALID,
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn id(&self) -> ActivationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn activate(&self, value: f32) -> f32 {
        (self.func)(value)
    }

    /// `1 / (1 + e^(-4.9x))` — the NEAT sigmoid with its steepened slope.
    pub fn sigmoid() -> Self {
        Activation::new("sigmoid", |v| 1.0 / (1.0 + (-4.9 * v).exp()))
    }

    pub fn bipolar_sigmoid() -> Self {
        Activation::new("bipolar sigmoid", |v| {
            saturate(1.0 - (-v).exp()) / saturate(1.0 + (-v).exp())
        })
    }

    pub fn relu() -> Self {
        Activation::new("relu", |v| v.max(0.0))
    }

    pub fn gaussian() -> Self {
        Activation::new("gaussian", |v| saturate((-v * v).exp()))
    }

    pub fn absolute() -> Self {
        Activation::new("abs", |v| v.abs())
    }

    pub fn sine() -> Self {
        Activation::new("sin", |v| v.sin())
    }

    pub fn cosine() -> Self {
        Activation::new("cos", |v| v.cos())
    }

    pub fn tangent() -> Self {
        Activation::new("tan", |v| v.tan().clamp(-10_000.0, 10_000.0))
    }

    pub fn hyperbolic_tangent() -> Self {
        Activation::new("tanh", |v| v.tanh())
    }

    pub fn ramp() -> Self {
        Activation::new("ramp", |v| 1.0 - 2.0 * (v - v.floor()))
    }

    pub fn step() -> Self {
        Activation::new("step", |v| {
            if (v.floor() as i64) % 2 != 0 { -1.0 } else { 1.0 }
        })
    }

    pub fn spike() -> Self {
        Activation::new("spike", |v| {
            let fract = v - v.floor();
            if (v.floor() as i64) % 2 != 0 {
                -1.0 + 2.0 * fract
            } else {
                1.0 - 2.0 * fract
            }
        })
    }

    pub fn inverse() -> Self {
        Activation::new("inverse", |v| saturate(1.0 / v))
    }

    pub fn identity() -> Self {
        Activation::new("identity", |v| v)
    }

    pub fn clamped() -> Self {
        Activation::new("clamped", |v| v.clamp(0.0, 1.0))
    }

    pub fn logarithmic() -> Self {
        Activation::new("log", |v| saturate(v.ln()))
    }

    pub fn exponential() -> Self {
        Activation::new("exp", |v| saturate(v.exp()))
    }

    pub fn hat() -> Self {
        Activation::new("hat", |v| {
            let v_abs = v.abs();
            if v_abs < 1.0 { 1.0 - v_abs } else { 0.0 }
        })
    }

    pub fn square() -> Self {
        Activation::new("square", |v| saturate(v * v))
    }

    pub fn cube() -> Self {
        Activation::new("cube", |v| saturate(v * v * v))
    }
}

impl Debug for Activation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Activation {{ id: {}, name: {:?} }}", self.id, self.name)
    }
}

/// A registry mapping [ActivationId] to activation values.
///
/// Ids are allocated in insertion order and never reused. Registering the
/// same function twice yields two distinct entries; the library performs no
/// deduplication. The library is populated before evolution begins and is
/// read-only afterwards.
#[derive(Debug, Default)]
pub struct ActivationLibrary {
    registry: BTreeMap<ActivationId, ActivationRef>,
    next_id: UniqueIdCounter<ActivationId>,
}

impl ActivationLibrary {
    pub fn new() -> Self {
        ActivationLibrary::default()
    }

    /// A library holding every builtin activation.
    pub fn builtins() -> Self {
        let mut library = ActivationLibrary::new();
        for activation in [
            Activation::sigmoid(),
            Activation::bipolar_sigmoid(),
            Activation::relu(),
            Activation::gaussian(),
            Activation::absolute(),
            Activation::sine(),
            Activation::cosine(),
            Activation::tangent(),
            Activation::hyperbolic_tangent(),
            Activation::ramp(),
            Activation::step(),
            Activation::spike(),
            Activation::inverse(),
            Activation::identity(),
            Activation::clamped(),
            Activation::logarithmic(),
            Activation::exponential(),
            Activation::hat(),
            Activation::square(),
            Activation::cube(),
        ] {
            library.register(activation);
        }
        library
    }

    /// The function set used by CPPN pattern generators.
    pub fn cppn() -> Self {
        let mut library = ActivationLibrary::new();
        for activation in [
            Activation::sigmoid(),
            Activation::bipolar_sigmoid(),
            Activation::relu(),
            Activation::gaussian(),
            Activation::identity(),
            Activation::absolute(),
            Activation::sine(),
            Activation::cosine(),
            Activation::tangent(),
            Activation::hyperbolic_tangent(),
            Activation::ramp(),
            Activation::step(),
            Activation::spike(),
            Activation::inverse(),
        ] {
            library.register(activation);
        }
        library
    }

    /// Register an activation, assigning it the next id.
    pub fn register(&mut self, mut activation: Activation) -> ActivationId {
        let id = self.next_id.next_id();
        activation.id = id;
        self.registry.insert(id, Arc::new(activation));
        id
    }

    pub fn unregister(&mut self, id: ActivationId) -> Option<ActivationRef> {
        self.registry.remove(&id)
    }

    pub fn get(&self, id: ActivationId) -> Option<ActivationRef> {
        self.registry.get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<ActivationId> {
        self.registry.keys().copied().collect()
    }

    pub fn has(&self, activation: &ActivationRef) -> bool {
        self.registry.values().any(|a| Arc::ptr_eq(a, activation))
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_has_steep_slope() {
        let sigmoid = Activation::sigmoid();
        assert!((sigmoid.activate(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid.activate(1.0) > 0.99);
        assert!(sigmoid.activate(-1.0) < 0.01);
    }

    #[test]
    fn saturation_bounds_extreme_values() {
        let exp = Activation::exponential();
        assert_eq!(exp.activate(1000.0), FLOAT_HIGH);

        let inverse = Activation::inverse();
        assert_eq!(inverse.activate(0.0), FLOAT_HIGH);

        let log = Activation::logarithmic();
        assert_eq!(log.activate(0.0), -FLOAT_HIGH);
    }

    #[test]
    fn registration_allocates_ids_in_order() {
        let mut library = ActivationLibrary::new();
        let a = library.register(Activation::relu());
        let b = library.register(Activation::relu());
        assert!(a < b);
        assert_eq!(library.len(), 2);
        assert_ne!(a, b);
    }

    #[test]
    fn unregistered_ids_are_not_reused() {
        let mut library = ActivationLibrary::new();
        let a = library.register(Activation::relu());
        library.unregister(a);
        let b = library.register(Activation::sine());
        assert!(b > a);
        assert!(library.get(a).is_none());
    }

    #[test]
    fn has_checks_handle_identity() {
        let mut library = ActivationLibrary::new();
        let id = library.register(Activation::tangent());
        let handle = library.get(id).unwrap();
        assert!(library.has(&handle));

        let other = Arc::new(Activation::tangent());
        assert!(!library.has(&other));
    }

    #[test]
    fn builtins_cover_the_full_set() {
        let library = ActivationLibrary::builtins();
        assert_eq!(library.len(), 20);

        let cppn = ActivationLibrary::cppn();
        assert_eq!(cppn.len(), 14);
    }
}
