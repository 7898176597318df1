//! Registry of pure numeric functions usable from rule expressions.

use std::fmt;
use std::rc::Rc;

use absolution_core::ConstraintError;
use indexmap::IndexMap;

/// A pure function of its inputs.
pub type Function = Rc<dyn Fn(&[f64]) -> f64>;

/// Named functions available to `call` relationships.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    funcs: IndexMap<String, Function>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.funcs.keys()).finish()
    }
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `min`, `max` and `abs`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert("min", |args| args.iter().copied().fold(f64::INFINITY, f64::min));
        registry.insert("max", |args| args.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        registry.insert("abs", |args| args.first().map_or(f64::NAN, |v| v.abs()));
        registry
    }

    fn insert(&mut self, name: &str, func: impl Fn(&[f64]) -> f64 + 'static) {
        self.funcs.insert(name.to_string(), Rc::new(func));
    }

    /// Register a function under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&[f64]) -> f64 + 'static,
    ) -> Result<(), ConstraintError> {
        let name = name.into();
        if self.funcs.contains_key(&name) {
            return Err(ConstraintError::DuplicateFunction { name });
        }
        self.funcs.insert(name, Rc::new(func));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Look up a function by name.
    pub fn get(&self, name: &str) -> Result<Function, ConstraintError> {
        self.funcs
            .get(name)
            .cloned()
            .ok_or_else(|| ConstraintError::UnknownFunction { name: name.to_string() })
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }
}
