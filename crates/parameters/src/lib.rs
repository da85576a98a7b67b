//! Named render inputs with read-and-clear change tracking.
//!
//! Techniques register a schema once and keep the returned [`ParamHandle`]s;
//! the UI writes values through ids or handles. Each parameter declares whether
//! a change affects rendered content (and therefore resets accumulation) or
//! only the display.

mod value;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use slotmap::SlotMap;
use smallvec::SmallVec;
use thiserror::Error;

pub use value::{Domain, ParameterKind, ParameterType, ParameterValue};

slotmap::new_key_type! {
    pub struct ParameterKey;
}

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterId {
    store_id: u64,
    key: ParameterKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Invalidation {
    ContentAffecting,
    DisplayOnly,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    #[error("parameter does not belong to this store")]
    UnknownParameter,
    #[error("parameter `{name}` holds {expected:?} values, got {actual:?}")]
    TypeMismatch {
        name: &'static str,
        expected: ParameterKind,
        actual: ParameterKind,
    },
    #[error("parameter name `{0}` is already registered")]
    DuplicateName(&'static str),
    #[error("parameter `{name}` has an invalid domain {min}..={max}")]
    InvalidDomain {
        name: &'static str,
        min: f64,
        max: f64,
    },
    #[error("parameter `{0}` is not a scalar")]
    NotScalar(&'static str),
}

/// Registration-time description of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec<T: ParameterType> {
    pub name: &'static str,
    pub default: T,
    pub domain: Option<Domain>,
    pub invalidation: Invalidation,
    pub animatable: bool,
}

impl<T: ParameterType> ParameterSpec<T> {
    pub fn new(name: &'static str, default: T) -> Self {
        Self {
            name,
            default,
            domain: None,
            invalidation: Invalidation::ContentAffecting,
            animatable: false,
        }
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.domain = Some(Domain::new(min, max));
        self
    }

    pub fn display_only(mut self) -> Self {
        self.invalidation = Invalidation::DisplayOnly;
        self
    }

    pub fn animatable(mut self) -> Self {
        self.animatable = true;
        self
    }
}

pub struct ParamHandle<T> {
    id: ParameterId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParamHandle<T> {
    pub fn id(&self) -> ParameterId {
        self.id
    }
}

impl<T> Clone for ParamHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ParamHandle<T> {}

impl<T> PartialEq for ParamHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ParamHandle<T> {}

impl<T> std::fmt::Debug for ParamHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ParamHandle").field(&self.id).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterInfo {
    pub id: ParameterId,
    pub name: &'static str,
    pub kind: ParameterKind,
    pub domain: Option<Domain>,
    pub invalidation: Invalidation,
    pub animatable: bool,
    pub default: ParameterValue,
}

#[derive(Debug, Clone)]
struct Parameter {
    info: ParameterInfo,
    current: ParameterValue,
    changed_since_last_read: bool,
}

/// Parameters whose change flags were cleared by one [`ParameterStore::drain_changes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changed: SmallVec<[ParameterId; 8]>,
    content_affecting: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changed.len()
    }

    pub fn content_affecting(&self) -> bool {
        self.content_affecting
    }

    pub fn contains<T>(&self, handle: ParamHandle<T>) -> bool {
        self.contains_id(handle.id)
    }

    pub fn contains_id(&self, id: ParameterId) -> bool {
        self.changed.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = ParameterId> + '_ {
        self.changed.iter().copied()
    }
}

#[derive(Debug)]
pub struct ParameterStore {
    store_id: u64,
    parameters: SlotMap<ParameterKey, Parameter>,
    order: Vec<ParameterKey>,
    by_name: HashMap<&'static str, ParameterKey>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            store_id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            parameters: SlotMap::with_key(),
            order: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn register<T: ParameterType>(
        &mut self,
        spec: ParameterSpec<T>,
    ) -> Result<ParamHandle<T>, ParameterError> {
        if self.by_name.contains_key(spec.name) {
            return Err(ParameterError::DuplicateName(spec.name));
        }
        if let Some(domain) = spec.domain.filter(|domain| !domain.is_valid()) {
            return Err(ParameterError::InvalidDomain {
                name: spec.name,
                min: domain.min,
                max: domain.max,
            });
        }
        let default = spec.default.into_value().clamped(spec.domain);
        let store_id = self.store_id;
        let key = self.parameters.insert_with_key(|key| Parameter {
            info: ParameterInfo {
                id: ParameterId { store_id, key },
                name: spec.name,
                kind: T::KIND,
                domain: spec.domain,
                invalidation: spec.invalidation,
                animatable: spec.animatable,
                default,
            },
            current: default,
            changed_since_last_read: false,
        });
        self.order.push(key);
        self.by_name.insert(spec.name, key);
        tracing::trace!(name = spec.name, kind = ?T::KIND, "registered parameter");
        Ok(ParamHandle {
            id: ParameterId { store_id, key },
            _marker: PhantomData,
        })
    }

    pub fn find(&self, name: &str) -> Option<ParameterId> {
        self.by_name.get(name).map(|key| ParameterId {
            store_id: self.store_id,
            key: *key,
        })
    }

    pub fn info(&self, id: ParameterId) -> Result<&ParameterInfo, ParameterError> {
        self.parameter(id).map(|parameter| &parameter.info)
    }

    /// Registration order, which is also the order a UI lists them in.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterInfo> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.parameters.get(*key))
            .map(|parameter| &parameter.info)
    }

    pub fn get<T: ParameterType>(&self, handle: ParamHandle<T>) -> Result<T, ParameterError> {
        let parameter = self.parameter(handle.id)?;
        T::from_value(parameter.current).ok_or(ParameterError::TypeMismatch {
            name: parameter.info.name,
            expected: T::KIND,
            actual: parameter.current.kind(),
        })
    }

    /// Returns whether the stored value changed.
    pub fn set<T: ParameterType>(
        &mut self,
        handle: ParamHandle<T>,
        value: T,
    ) -> Result<bool, ParameterError> {
        self.set_value(handle.id, value.into_value())
    }

    pub fn get_value(&self, id: ParameterId) -> Result<ParameterValue, ParameterError> {
        self.parameter(id).map(|parameter| parameter.current)
    }

    pub fn set_value(
        &mut self,
        id: ParameterId,
        value: ParameterValue,
    ) -> Result<bool, ParameterError> {
        let parameter = self.parameter_mut(id)?;
        if value.kind() != parameter.info.kind {
            return Err(ParameterError::TypeMismatch {
                name: parameter.info.name,
                expected: parameter.info.kind,
                actual: value.kind(),
            });
        }
        let value = value.clamped(parameter.info.domain);
        if value == parameter.current {
            return Ok(false);
        }
        parameter.current = value;
        parameter.changed_since_last_read = true;
        tracing::trace!(name = parameter.info.name, ?value, "parameter changed");
        Ok(true)
    }

    /// Read-and-clear: a second call without an intervening change returns `false`.
    pub fn take_changed(&mut self, id: ParameterId) -> Result<bool, ParameterError> {
        let parameter = self.parameter_mut(id)?;
        Ok(std::mem::take(&mut parameter.changed_since_last_read))
    }

    /// Clears every change flag and reports which parameters had one set.
    pub fn drain_changes(&mut self) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for key in &self.order {
            let Some(parameter) = self.parameters.get_mut(*key) else {
                continue;
            };
            if std::mem::take(&mut parameter.changed_since_last_read) {
                changes.changed.push(parameter.info.id);
                if parameter.info.invalidation == Invalidation::ContentAffecting {
                    changes.content_affecting = true;
                }
            }
        }
        changes
    }

    pub fn scalar(&self, id: ParameterId) -> Result<f64, ParameterError> {
        let parameter = self.parameter(id)?;
        parameter
            .current
            .as_scalar()
            .ok_or(ParameterError::NotScalar(parameter.info.name))
    }

    /// Writes a scalar into a `Float` or `Int` parameter, rounding for `Int`.
    pub fn set_scalar(&mut self, id: ParameterId, value: f64) -> Result<bool, ParameterError> {
        let info = *self.info(id)?;
        let value = match info.kind {
            ParameterKind::Float => ParameterValue::Float(value),
            ParameterKind::Int => ParameterValue::Int(value.round() as i64),
            _ => return Err(ParameterError::NotScalar(info.name)),
        };
        self.set_value(id, value)
    }

    pub fn reset_to_defaults(&mut self) {
        for key in &self.order {
            let Some(parameter) = self.parameters.get_mut(*key) else {
                continue;
            };
            if parameter.current != parameter.info.default {
                parameter.current = parameter.info.default;
                parameter.changed_since_last_read = true;
            }
        }
    }

    fn parameter(&self, id: ParameterId) -> Result<&Parameter, ParameterError> {
        if id.store_id != self.store_id {
            return Err(ParameterError::UnknownParameter);
        }
        self.parameters
            .get(id.key)
            .ok_or(ParameterError::UnknownParameter)
    }

    fn parameter_mut(&mut self, id: ParameterId) -> Result<&mut Parameter, ParameterError> {
        if id.store_id != self.store_id {
            return Err(ParameterError::UnknownParameter);
        }
        self.parameters
            .get_mut(id.key)
            .ok_or(ParameterError::UnknownParameter)
    }
}
