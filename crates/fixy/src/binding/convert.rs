//! Conversion of bind values into typed Rust values.
//!
//! Scalars convert to the field's declared type with textual parsing where
//! needed, so `"30"` binds to an integer field and `"yes"` to a `bool`.
//! Dates use fixed canonical formats ([`DATE_FORMAT`], [`DATETIME_FORMAT`],
//! RFC 3339 for zoned timestamps). A reference bound to a scalar field
//! yields the referenced instance's primary key.

use std::any::Any;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use super::{BindValue, FieldBinder};
use crate::document::Scalar;
use crate::error::CoercionError;

/// Canonical date format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical date-time format. A space may replace the `T`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Canonical time format.
pub const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Conversion from a bind value.
pub trait FromFixture: Sized {
	/// Converts `value`, binding nested value objects with `binder`.
	fn from_fixture(value: &BindValue, binder: &FieldBinder) -> Result<Self, CoercionError>;
}

/// A value usable as a primary or natural key.
pub trait KeyValue: FromFixture {
	/// Returns the key as a scalar, or `None` when unset.
	fn to_key(&self) -> Option<Scalar>;

	/// Converts a store-assigned key back into the field type.
	fn from_key(key: &Scalar) -> Result<Self, CoercionError> {
		Self::from_fixture(&BindValue::Scalar(key.clone()), &FieldBinder::default())
	}
}

fn mismatch(expected: &'static str, found: impl Into<String>) -> CoercionError {
	CoercionError::Mismatch {
		expected,
		found: found.into(),
	}
}

fn out_of_range(expected: &'static str, value: impl Display) -> CoercionError {
	CoercionError::OutOfRange {
		expected,
		value: value.to_string(),
	}
}

fn parse_text<T>(text: &str, expected: &'static str) -> Result<T, CoercionError>
where
	T: FromStr,
	T::Err: Display,
{
	text.trim().parse::<T>().map_err(|e| CoercionError::Parse {
		expected,
		value: text.to_string(),
		reason: e.to_string(),
	})
}

/// Returns the scalar behind `value`; a referenced instance contributes
/// its primary key.
fn scalar<'a>(value: &'a BindValue, expected: &'static str) -> Result<Cow<'a, Scalar>, CoercionError> {
	match value {
		BindValue::Scalar(scalar) => Ok(Cow::Borrowed(scalar)),
		BindValue::Instance(instance) => instance
			.key()
			.cloned()
			.map(Cow::Owned)
			.ok_or_else(|| CoercionError::ReferenceType {
				entry: instance.entry().to_string(),
				actual: instance.type_name().to_string(),
				expected,
			}),
		other => Err(mismatch(expected, other.describe())),
	}
}

/// Returns the text behind `value`, rejecting other scalar kinds.
fn text<'a>(value: &'a BindValue, expected: &'static str) -> Result<Cow<'a, str>, CoercionError> {
	match scalar(value, expected)? {
		Cow::Borrowed(Scalar::String(s)) => Ok(Cow::Borrowed(s.as_str())),
		Cow::Owned(Scalar::String(s)) => Ok(Cow::Owned(s)),
		other => Err(mismatch(expected, BindValue::Scalar(other.into_owned()).describe())),
	}
}

impl FromFixture for String {
	fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
		match scalar(value, "string")?.as_ref() {
			Scalar::Null => Err(mismatch("string", "null")),
			other => Ok(other.to_string()),
		}
	}
}

impl FromFixture for char {
	fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
		let text = text(value, "char")?;
		let mut chars = text.chars();
		match (chars.next(), chars.next()) {
			(Some(c), None) => Ok(c),
			_ => Err(CoercionError::Parse {
				expected: "char",
				value: text.into_owned(),
				reason: "expected exactly one character".to_string(),
			}),
		}
	}
}

impl FromFixture for bool {
	fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
		match scalar(value, "bool")?.as_ref() {
			Scalar::Bool(b) => Ok(*b),
			Scalar::Int(0) => Ok(false),
			Scalar::Int(1) => Ok(true),
			Scalar::String(s) => match s.trim().to_lowercase().as_str() {
				"true" | "yes" | "on" | "1" => Ok(true),
				"false" | "no" | "off" | "0" => Ok(false),
				_ => Err(CoercionError::Parse {
					expected: "bool",
					value: s.clone(),
					reason: "expected true/false, yes/no, on/off or 1/0".to_string(),
				}),
			},
			other => Err(mismatch("bool", BindValue::Scalar(other.clone()).describe())),
		}
	}
}

macro_rules! impl_from_fixture_int {
	($($ty:ty),*) => {
		$(
			impl FromFixture for $ty {
				fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
					const EXPECTED: &str = stringify!($ty);
					match scalar(value, EXPECTED)?.as_ref() {
						Scalar::Int(i) => <$ty>::try_from(*i).map_err(|_| out_of_range(EXPECTED, i)),
						Scalar::String(s) => parse_text::<$ty>(s, EXPECTED),
						Scalar::Float(f) if f.is_finite() && f.fract() == 0.0 => {
							<$ty>::try_from(*f as i128).map_err(|_| out_of_range(EXPECTED, f))
						}
						Scalar::Float(f) => Err(CoercionError::Parse {
							expected: EXPECTED,
							value: f.to_string(),
							reason: "not a whole number".to_string(),
						}),
						other => Err(mismatch(EXPECTED, BindValue::Scalar(other.clone()).describe())),
					}
				}
			}

			impl KeyValue for $ty {
				fn to_key(&self) -> Option<Scalar> {
					Some(
						i64::try_from(*self)
							.map(Scalar::Int)
							.unwrap_or_else(|_| Scalar::String(self.to_string())),
					)
				}
			}
		)*
	};
}

impl_from_fixture_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! impl_from_fixture_float {
	($($ty:ty),*) => {
		$(
			impl FromFixture for $ty {
				fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
					const EXPECTED: &str = stringify!($ty);
					match scalar(value, EXPECTED)?.as_ref() {
						Scalar::Int(i) => Ok(*i as $ty),
						Scalar::Float(f) => Ok(*f as $ty),
						Scalar::String(s) => parse_text::<$ty>(s, EXPECTED),
						other => Err(mismatch(EXPECTED, BindValue::Scalar(other.clone()).describe())),
					}
				}
			}
		)*
	};
}

impl_from_fixture_float!(f32, f64);

impl FromFixture for NaiveDate {
	fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
		let text = text(value, "date")?;
		NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map_err(|e| CoercionError::Parse {
			expected: "date",
			value: text.to_string(),
			reason: e.to_string(),
		})
	}
}

impl FromFixture for NaiveDateTime {
	fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
		let text = text(value, "date-time")?;
		let trimmed = text.trim();
		NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
			.or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
			.map_err(|e| CoercionError::Parse {
				expected: "date-time",
				value: text.to_string(),
				reason: e.to_string(),
			})
	}
}

impl FromFixture for NaiveTime {
	fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
		let text = text(value, "time")?;
		NaiveTime::parse_from_str(text.trim(), TIME_FORMAT).map_err(|e| CoercionError::Parse {
			expected: "time",
			value: text.to_string(),
			reason: e.to_string(),
		})
	}
}

impl FromFixture for DateTime<Utc> {
	fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
		let text = text(value, "RFC 3339 timestamp")?;
		DateTime::parse_from_rfc3339(text.trim())
			.map(|dt| dt.with_timezone(&Utc))
			.map_err(|e| CoercionError::Parse {
				expected: "RFC 3339 timestamp",
				value: text.to_string(),
				reason: e.to_string(),
			})
	}
}

impl FromFixture for Uuid {
	fn from_fixture(value: &BindValue, _binder: &FieldBinder) -> Result<Self, CoercionError> {
		let text = text(value, "uuid")?;
		Uuid::parse_str(text.trim()).map_err(|e| CoercionError::Parse {
			expected: "uuid",
			value: text.to_string(),
			reason: e.to_string(),
		})
	}
}

impl<T: FromFixture> FromFixture for Option<T> {
	fn from_fixture(value: &BindValue, binder: &FieldBinder) -> Result<Self, CoercionError> {
		match value {
			BindValue::Scalar(Scalar::Null) => Ok(None),
			other => T::from_fixture(other, binder).map(Some),
		}
	}
}

impl<T: FromFixture> FromFixture for Vec<T> {
	fn from_fixture(value: &BindValue, binder: &FieldBinder) -> Result<Self, CoercionError> {
		match value {
			BindValue::Sequence(items) => items
				.iter()
				.map(|item| T::from_fixture(item, binder))
				.collect(),
			other => Err(mismatch("sequence", other.describe())),
		}
	}
}

macro_rules! impl_from_fixture_map {
	($($map:ident),*) => {
		$(
			impl<T: FromFixture> FromFixture for $map<String, T> {
				fn from_fixture(value: &BindValue, binder: &FieldBinder) -> Result<Self, CoercionError> {
					match value {
						BindValue::Mapping(fields) => fields
							.iter()
							.map(|(key, item)| Ok::<_, CoercionError>((key.clone(), T::from_fixture(item, binder)?)))
							.collect(),
						other => Err(mismatch("mapping", other.describe())),
					}
				}
			}
		)*
	};
}

impl_from_fixture_map!(BTreeMap, HashMap, IndexMap);

impl<T: FromFixture> FromFixture for Box<T> {
	fn from_fixture(value: &BindValue, binder: &FieldBinder) -> Result<Self, CoercionError> {
		T::from_fixture(value, binder).map(Box::new)
	}
}

impl<T: FromFixture + Any + Send + Sync> FromFixture for Arc<T> {
	fn from_fixture(value: &BindValue, binder: &FieldBinder) -> Result<Self, CoercionError> {
		match value {
			BindValue::Instance(instance) => {
				instance
					.downcast::<T>()
					.ok_or_else(|| CoercionError::ReferenceType {
						entry: instance.entry().to_string(),
						actual: instance.type_name().to_string(),
						expected: std::any::type_name::<T>(),
					})
			}
			other => T::from_fixture(other, binder).map(Arc::new),
		}
	}
}

impl KeyValue for String {
	fn to_key(&self) -> Option<Scalar> {
		Some(Scalar::String(self.clone()))
	}
}

impl KeyValue for Uuid {
	fn to_key(&self) -> Option<Scalar> {
		Some(Scalar::String(self.to_string()))
	}
}

impl<T: KeyValue> KeyValue for Option<T> {
	fn to_key(&self) -> Option<Scalar> {
		self.as_ref().and_then(KeyValue::to_key)
	}
}
