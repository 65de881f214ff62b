//! Recipes
//!
//! This module defines what the task graph stores per node: either a literal
//! value, or a function together with its bound arguments.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::error::BindError;

/// Bound argument list. Most recipes take a handful of arguments.
pub type Args = SmallVec<[Value; 4]>;

type Body = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync;

/// A declared parameter of a [`Function`].
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    default: Option<Value>,
}

impl Param {
    /// A parameter the caller must supply.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter that falls back to `default` when omitted.
    pub fn optional(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// A named callable with a declared signature.
///
/// Cloning is cheap; clones share the body and compare equal.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    params: Arc<[Param]>,
    body: Arc<Body>,
}

impl Function {
    /// Create a new function from its name, parameter list and body.
    ///
    /// The body receives the resolved arguments positionally, in parameter
    /// declaration order.
    pub fn new<P, F>(name: &str, params: P, body: F) -> Self
    where
        P: IntoIterator<Item = Param>,
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            params: params.into_iter().collect(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Return a copy of this function whose parameter `param` defaults to
    /// `value`.
    ///
    /// Recipes already recorded with `self` keep the arguments they
    /// were bound with.
    pub fn with_default(&self, param: &str, value: Value) -> Self {
        let params = self
            .params
            .iter()
            .map(|p| {
                if p.name == param {
                    Param::optional(p.name.clone(), value.clone())
                } else {
                    p.clone()
                }
            })
            .collect();

        Self {
            name: Arc::clone(&self.name),
            params,
            body: Arc::clone(&self.body),
        }
    }

    /// Bind positional and keyword arguments against the declared
    /// parameters, filling omitted ones from their defaults.
    ///
    /// The result is ordered by parameter declaration.
    pub fn bind(
        &self,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Result<Args, BindError> {
        if args.len() > self.params.len() {
            return Err(BindError::TooManyPositional {
                function: self.name.to_string(),
                expected: self.params.len(),
                given: args.len(),
            });
        }

        let mut slots: Vec<Option<Value>> = vec![None; self.params.len()];
        for (slot, value) in slots.iter_mut().zip(args) {
            *slot = Some(value);
        }

        for (key, value) in kwargs {
            let index = self
                .params
                .iter()
                .position(|p| p.name == key)
                .ok_or_else(|| BindError::UnexpectedKeyword {
                    function: self.name.to_string(),
                    param: key.clone(),
                })?;

            if slots[index].is_some() {
                return Err(BindError::MultipleValues {
                    function: self.name.to_string(),
                    param: key,
                });
            }
            slots[index] = Some(value);
        }

        slots
            .into_iter()
            .zip(self.params.iter())
            .map(|(slot, param)| {
                slot.or_else(|| param.default.clone())
                    .ok_or_else(|| BindError::MissingArgument {
                        function: self.name.to_string(),
                        param: param.name.clone(),
                    })
            })
            .collect()
    }

    /// Invoke the body with already-resolved arguments.
    pub fn call(&self, args: &[Value]) -> anyhow::Result<Value> {
        (self.body)(args)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body) && self.name == other.name
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// What the graph stores for a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipe {
    /// A raw value, stored verbatim.
    Literal(Value),

    /// A function applied to bound arguments. String arguments name other
    /// nodes whenever such a node exists.
    Call { function: Function, args: Args },
}

impl Recipe {
    /// The string-valued arguments of this recipe, in argument order.
    ///
    /// Repeated references are reported once per occurrence.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        let args: &[Value] = match self {
            Recipe::Literal(_) => &[],
            Recipe::Call { args, .. } => args.as_slice(),
        };
        args.iter().filter_map(Value::as_str)
    }

    /// Whether any argument is the string `name`.
    pub fn references_name(&self, name: &str) -> bool {
        self.references().any(|r| r == name)
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipe::Literal(value) => write!(f, "{value}"),
            Recipe::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
