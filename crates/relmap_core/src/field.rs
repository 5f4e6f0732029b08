//! Typed value cells with change tracking.
//!
//! A [`Field`] holds the value a caller last set and the value it had at
//! the last [`Field::freeze`]. The two are compared to decide whether the
//! column must be written again.
//!
//! The set of types a field may hold is closed: text, 32-bit integer,
//! 64-bit integer, boolean, double, UTC timestamp, and `Option` of each
//! for nullable columns. [`FieldType`] is sealed, so every kind is
//! handled exhaustively at compile time.

use chrono::{DateTime, Utc};
use relmap_store::{parse_timestamp, Value};
use serde::Serialize;
use std::fmt;

/// Scalar part of a column kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    /// UTF-8 text.
    Text,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    BigInt,
    /// Boolean.
    Bool,
    /// Double precision float.
    Double,
    /// UTC timestamp.
    Timestamp,
}

impl ScalarKind {
    fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Bool => "bool",
            Self::Double => "double",
            Self::Timestamp => "timestamp",
        }
    }
}

/// Kind of a field: a scalar kind, possibly nullable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Kind {
    scalar: ScalarKind,
    nullable: bool,
}

impl Kind {
    /// A non-nullable kind.
    #[must_use]
    pub const fn new(scalar: ScalarKind) -> Self {
        Self {
            scalar,
            nullable: false,
        }
    }

    /// The nullable variant of `scalar`.
    #[must_use]
    pub const fn nullable(scalar: ScalarKind) -> Self {
        Self {
            scalar,
            nullable: true,
        }
    }

    /// Returns the scalar part.
    #[must_use]
    pub const fn scalar(self) -> ScalarKind {
        self.scalar
    }

    /// Whether the kind admits "no value".
    #[must_use]
    pub const fn is_nullable(self) -> bool {
        self.nullable
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scalar.name())?;
        if self.nullable {
            f.write_str("?")?;
        }
        Ok(())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A type a [`Field`] can hold.
///
/// Sealed: implemented for `String`, `i32`, `i64`, `bool`, `f64`,
/// `DateTime<Utc>` and `Option` of each.
pub trait FieldType: sealed::Sealed + Clone + Default + PartialEq + fmt::Debug + Send + 'static {
    /// Kind reported for fields of this type.
    const KIND: Kind;

    /// Whether the value counts as "empty" (zero text, zero number,
    /// `false`, the epoch, or `None`).
    fn is_empty(&self) -> bool;

    /// Converts to the storage value bound as a statement argument.
    fn encode(&self) -> Value;

    /// Converts a value read from the store.
    ///
    /// Lenient about storage representations: integers are accepted for
    /// booleans and doubles, text for timestamps. Returns `None` when the
    /// value cannot represent this type.
    fn decode(value: Value) -> Option<Self>;

    /// Converts a value offered by a caller, accepting only the exact kind.
    fn from_value(value: &Value) -> Option<Self>;

    /// Equality used for change tracking.
    fn same(&self, other: &Self) -> bool {
        self == other
    }
}

/// Non-nullable scalar types. `Option<T>` is a [`FieldType`] for each.
pub trait Scalar: FieldType {}

impl sealed::Sealed for String {}
impl FieldType for String {
    const KIND: Kind = Kind::new(ScalarKind::Text);

    fn is_empty(&self) -> bool {
        String::is_empty(self)
    }

    fn encode(&self) -> Value {
        Value::Text(self.clone())
    }

    fn decode(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(str::to_owned)
    }
}
impl Scalar for String {}

impl sealed::Sealed for i32 {}
impl FieldType for i32 {
    const KIND: Kind = Kind::new(ScalarKind::Integer);

    fn is_empty(&self) -> bool {
        *self == 0
    }

    fn encode(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn decode(value: Value) -> Option<Self> {
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer().and_then(|n| i32::try_from(n).ok())
    }
}
impl Scalar for i32 {}

impl sealed::Sealed for i64 {}
impl FieldType for i64 {
    const KIND: Kind = Kind::new(ScalarKind::BigInt);

    fn is_empty(&self) -> bool {
        *self == 0
    }

    fn encode(&self) -> Value {
        Value::Integer(*self)
    }

    fn decode(value: Value) -> Option<Self> {
        value.as_integer()
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer()
    }
}
impl Scalar for i64 {}

impl sealed::Sealed for bool {}
impl FieldType for bool {
    const KIND: Kind = Kind::new(ScalarKind::Bool);

    fn is_empty(&self) -> bool {
        !*self
    }

    fn encode(&self) -> Value {
        Value::Bool(*self)
    }

    fn decode(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            Value::Integer(n) => Some(n != 0),
            _ => None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}
impl Scalar for bool {}

impl sealed::Sealed for f64 {}
impl FieldType for f64 {
    const KIND: Kind = Kind::new(ScalarKind::Double);

    fn is_empty(&self) -> bool {
        *self == 0.0
    }

    fn encode(&self) -> Value {
        Value::Double(*self)
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode(value: Value) -> Option<Self> {
        match value {
            Value::Double(n) => Some(n),
            Value::Integer(n) => Some(n as f64),
            _ => None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_double()
    }

    // NaN matches any NaN so a frozen NaN does not read as changed.
    fn same(&self, other: &Self) -> bool {
        self == other || (self.is_nan() && other.is_nan())
    }
}
impl Scalar for f64 {}

impl sealed::Sealed for DateTime<Utc> {}
impl FieldType for DateTime<Utc> {
    const KIND: Kind = Kind::new(ScalarKind::Timestamp);

    // Compared by instant; the zero instant is the Unix epoch.
    fn is_empty(&self) -> bool {
        *self == DateTime::<Utc>::default()
    }

    fn encode(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn decode(value: Value) -> Option<Self> {
        match value {
            Value::Timestamp(ts) => Some(ts),
            Value::Text(s) => parse_timestamp(&s).ok(),
            _ => None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_timestamp()
    }
}
impl Scalar for DateTime<Utc> {}

impl<T: Scalar> sealed::Sealed for Option<T> {}
impl<T: Scalar> FieldType for Option<T> {
    const KIND: Kind = Kind::nullable(T::KIND.scalar);

    // Empty only when absent; `Some(0)` is a populated value.
    fn is_empty(&self) -> bool {
        self.is_none()
    }

    fn encode(&self) -> Value {
        self.as_ref().map_or(Value::Null, |v| v.encode())
    }

    fn decode(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::decode(other).map(Some),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// A typed value cell tracking its current and last frozen value.
///
/// # Example
///
/// ```rust
/// use relmap_core::Field;
///
/// let mut name: Field<String> = Field::new();
/// name.set("Ada");
/// assert!(name.changed());
/// name.freeze();
/// assert!(!name.changed());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field<T: FieldType> {
    value: T,
    old: T,
}

impl<T: FieldType> Field<T> {
    /// Creates a field with both values at the type's zero value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Returns the value as of the last freeze.
    pub fn baseline(&self) -> &T {
        &self.old
    }

    /// Replaces the current value.
    pub fn set(&mut self, value: impl Into<T>) {
        self.value = value.into();
    }

    /// Whether the current value differs from the baseline.
    ///
    /// Timestamps compare by instant; nullable values compare presence and
    /// inner value together. A NaN double equals any other NaN.
    pub fn changed(&self) -> bool {
        !self.value.same(&self.old)
    }

    /// Whether the current value is the type's empty value.
    pub fn empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Makes the current value the new baseline.
    pub fn freeze(&mut self) {
        self.old = self.value.clone();
    }

    /// Returns both values to the zero value.
    pub fn reset(&mut self) {
        self.value = T::default();
        self.old = T::default();
    }

    /// Returns the kind of this field.
    pub fn kind(&self) -> Kind {
        T::KIND
    }
}

/// Type-erased access to a [`Field`], used by the schema and workarea.
pub trait FieldCell: Send {
    /// Kind of the field.
    fn kind(&self) -> Kind;
    /// See [`Field::changed`].
    fn changed(&self) -> bool;
    /// See [`Field::empty`].
    fn empty(&self) -> bool;
    /// See [`Field::freeze`].
    fn freeze(&mut self);
    /// See [`Field::reset`].
    fn reset(&mut self);
    /// Current value in storage form.
    fn value(&self) -> Value;
    /// Sets the current value from a store value; hands the value back if
    /// it does not fit the kind.
    fn scan(&mut self, value: Value) -> Result<(), Value>;
    /// Sets the current value if `value` has exactly this field's kind.
    ///
    /// Returns whether the value was taken.
    fn load(&mut self, value: &Value) -> bool;
}

impl<T: FieldType> FieldCell for Field<T> {
    fn kind(&self) -> Kind {
        T::KIND
    }

    fn changed(&self) -> bool {
        Field::changed(self)
    }

    fn empty(&self) -> bool {
        Field::empty(self)
    }

    fn freeze(&mut self) {
        Field::freeze(self);
    }

    fn reset(&mut self) {
        Field::reset(self);
    }

    fn value(&self) -> Value {
        self.value.encode()
    }

    fn scan(&mut self, value: Value) -> Result<(), Value> {
        match T::decode(value.clone()) {
            Some(v) => {
                self.value = v;
                Ok(())
            }
            None => Err(value),
        }
    }

    fn load(&mut self, value: &Value) -> bool {
        match T::from_value(value) {
            Some(v) => {
                self.value = v;
                true
            }
            None => false,
        }
    }
}
