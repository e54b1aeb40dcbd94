//! Handler signatures and argument binding.
//!
//! A [`Signature`] lists the parameters a handler accepts. Binding a
//! command against it follows keyword-call rules: positional values fill
//! positional-capable parameters in order, named values fill parameters by
//! name, and missing parameters take their defaults. Leftovers go to the
//! variadic tails when the signature has them and are errors otherwise.

use koi_ir::{Command, Parameter, Scalar, Value};

use crate::errors::{ArgumentError, RuntimeError};

/// How a parameter may be supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrNamed,
    NamedOnly,
}

/// One declared handler parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<Value>,
}

impl Param {
    pub fn required(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            kind: ParamKind::PositionalOrNamed,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Param {
            name: name.into(),
            kind: ParamKind::PositionalOrNamed,
            default: Some(default.into()),
        }
    }

    #[must_use]
    pub fn positional_only(mut self) -> Self {
        self.kind = ParamKind::PositionalOnly;
        self
    }

    #[must_use]
    pub fn named_only(mut self) -> Self {
        self.kind = ParamKind::NamedOnly;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    #[inline]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Parameters accepted by a handler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
    rest: bool,
    rest_named: bool,
}

impl Signature {
    /// A signature that accepts no arguments.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: impl IntoIterator<Item = Param>) -> Self {
        Signature {
            params: params.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Accepts anything: every argument lands in the variadic tails.
    pub fn variadic() -> Self {
        Signature {
            params: Vec::new(),
            rest: true,
            rest_named: true,
        }
    }

    #[must_use]
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Collect extra positional values instead of rejecting them.
    #[must_use]
    pub fn rest(mut self) -> Self {
        self.rest = true;
        self
    }

    /// Collect unknown named values instead of rejecting them.
    #[must_use]
    pub fn rest_named(mut self) -> Self {
        self.rest_named = true;
        self
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Bind `command`'s parameters for the handler `method`.
    pub fn bind(&self, method: &str, command: &Command) -> Result<Arguments, RuntimeError> {
        self.bind_values(command)
            .map(|(values, rest, rest_named)| Arguments {
                method: method.to_owned(),
                values,
                rest,
                rest_named,
            })
            .map_err(|kind| RuntimeError::arguments(method, kind))
    }

    #[expect(
        clippy::type_complexity,
        reason = "private helper returning the three binding outputs"
    )]
    fn bind_values(
        &self,
        command: &Command,
    ) -> Result<(Vec<(String, Value)>, Vec<Value>, Vec<(String, Value)>), ArgumentError> {
        let mut slots: Vec<Option<Value>> = vec![None; self.params.len()];
        let mut rest = Vec::new();
        let mut rest_named: Vec<(String, Value)> = Vec::new();

        // Positional values first, whatever their order relative to named ones.
        let mut positional_slots = self
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind != ParamKind::NamedOnly)
            .map(|(i, _)| i);
        for value in command.positional() {
            if let Some(idx) = positional_slots.next() {
                slots[idx] = Some(value.clone());
            } else if self.rest {
                rest.push(value.clone());
            } else {
                let expected = self
                    .params
                    .iter()
                    .filter(|p| p.kind != ParamKind::NamedOnly)
                    .count();
                return Err(ArgumentError::TooManyPositional {
                    expected,
                    got: command.positional().count(),
                });
            }
        }

        for param in command.params() {
            let Parameter::Named(name, value) = param else {
                continue;
            };
            match self.params.iter().position(|p| p.name == *name) {
                Some(idx) if self.params[idx].kind == ParamKind::PositionalOnly => {
                    if !self.rest_named {
                        return Err(ArgumentError::PositionalOnly { name: name.clone() });
                    }
                    push_unique(&mut rest_named, name, value)?;
                }
                Some(idx) => {
                    if slots[idx].is_some() {
                        return Err(ArgumentError::Duplicate { name: name.clone() });
                    }
                    slots[idx] = Some(value.clone());
                }
                None if self.rest_named => push_unique(&mut rest_named, name, value)?,
                None => return Err(ArgumentError::UnexpectedNamed { name: name.clone() }),
            }
        }

        let values = self
            .params
            .iter()
            .zip(slots)
            .map(|(p, slot)| match slot.or_else(|| p.default.clone()) {
                Some(value) => Ok((p.name.clone(), value)),
                None => Err(ArgumentError::Missing {
                    name: p.name.clone(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((values, rest, rest_named))
    }
}

fn push_unique(
    into: &mut Vec<(String, Value)>,
    name: &str,
    value: &Value,
) -> Result<(), ArgumentError> {
    if into.iter().any(|(n, _)| n == name) {
        return Err(ArgumentError::Duplicate {
            name: name.to_owned(),
        });
    }
    into.push((name.to_owned(), value.clone()));
    Ok(())
}

/// Arguments bound for one handler call.
#[derive(Clone, Debug, PartialEq)]
pub struct Arguments {
    method: String,
    values: Vec<(String, Value)>,
    rest: Vec<Value>,
    rest_named: Vec<(String, Value)>,
}

impl Arguments {
    /// Handler method the arguments were bound for.
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// A declared parameter or a collected named extra.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .chain(&self.rest_named)
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn value(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.get(name).ok_or_else(|| {
            RuntimeError::arguments(
                &self.method,
                ArgumentError::UnknownParameter {
                    name: name.to_owned(),
                },
            )
        })
    }

    pub fn int(&self, name: &str) -> Result<i64, RuntimeError> {
        let value = self.value(name)?;
        value.as_int().ok_or_else(|| self.mismatch(name, "int", value))
    }

    /// Float argument; integers widen.
    pub fn float(&self, name: &str) -> Result<f64, RuntimeError> {
        let value = self.value(name)?;
        value
            .as_float()
            .ok_or_else(|| self.mismatch(name, "float", value))
    }

    pub fn str(&self, name: &str) -> Result<&str, RuntimeError> {
        let value = self.value(name)?;
        value
            .as_str()
            .ok_or_else(|| self.mismatch(name, "string", value))
    }

    pub fn list(&self, name: &str) -> Result<&[Scalar], RuntimeError> {
        let value = self.value(name)?;
        value
            .as_list()
            .ok_or_else(|| self.mismatch(name, "list", value))
    }

    pub fn map(&self, name: &str) -> Result<&[(String, Scalar)], RuntimeError> {
        let value = self.value(name)?;
        value
            .as_map()
            .ok_or_else(|| self.mismatch(name, "map", value))
    }

    /// Extra positional values.
    #[inline]
    pub fn rest(&self) -> &[Value] {
        &self.rest
    }

    /// Extra named values, in command order.
    #[inline]
    pub fn rest_named(&self) -> &[(String, Value)] {
        &self.rest_named
    }

    fn mismatch(&self, name: &str, expected: &'static str, got: &Value) -> RuntimeError {
        RuntimeError::arguments(
            &self.method,
            ArgumentError::TypeMismatch {
                name: name.to_owned(),
                expected,
                got: got.type_name(),
            },
        )
    }
}
