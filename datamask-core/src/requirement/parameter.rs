//! Typed parameters of anonymization functions.
//!
//! A parameter always stores its value as text. The declared type tag names
//! one of a fixed vocabulary, and [`Parameter::type_value`] parses the text
//! into the matching [`TypedValue`] variant on demand.

use crate::{Result, error::DataMaskError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vocabulary of declared parameter types.
///
/// The textual names are case-sensitive and match the `type` attribute of
/// persisted requirement documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    /// `String`: the text as is
    String,
    /// `Boolean`: `true` or `false`, any case
    Boolean,
    /// `Byte`: 8-bit signed integer
    Byte,
    /// `Short`: 16-bit signed integer
    Short,
    /// `Integer`: 32-bit signed integer
    Integer,
    /// `Long`: 64-bit signed integer
    Long,
    /// `Character`: exactly one character
    Character,
    /// `Float`: 32-bit floating point
    Float,
    /// `Double`: 64-bit floating point
    Double,
    /// `String[]`: comma-separated text items
    StringArray,
    /// `int[]`: comma-separated 32-bit integers
    IntArray,
    /// `double[]`: comma-separated 64-bit floats
    DoubleArray,
}

impl DeclaredType {
    /// Every member of the vocabulary, in declaration order.
    pub const ALL: [DeclaredType; 12] = [
        DeclaredType::String,
        DeclaredType::Boolean,
        DeclaredType::Byte,
        DeclaredType::Short,
        DeclaredType::Integer,
        DeclaredType::Long,
        DeclaredType::Character,
        DeclaredType::Float,
        DeclaredType::Double,
        DeclaredType::StringArray,
        DeclaredType::IntArray,
        DeclaredType::DoubleArray,
    ];

    /// Returns the persisted name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclaredType::String => "String",
            DeclaredType::Boolean => "Boolean",
            DeclaredType::Byte => "Byte",
            DeclaredType::Short => "Short",
            DeclaredType::Integer => "Integer",
            DeclaredType::Long => "Long",
            DeclaredType::Character => "Character",
            DeclaredType::Float => "Float",
            DeclaredType::Double => "Double",
            DeclaredType::StringArray => "String[]",
            DeclaredType::IntArray => "int[]",
            DeclaredType::DoubleArray => "double[]",
        }
    }

    /// Looks up a type by its persisted name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == name)
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeclaredType {
    type Err = DataMaskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
            .ok_or_else(|| DataMaskError::configuration(format!("Unknown declared type '{}'", s)))
    }
}

/// A parameter value coerced to its declared type.
///
/// Floating values compare by bit pattern, so a coerced `NaN` equals itself
/// and `0.0` differs from `-0.0`.
#[derive(Debug, Clone)]
pub enum TypedValue {
    /// Value of a `String` parameter
    String(String),
    /// Value of a `Boolean` parameter
    Boolean(bool),
    /// Value of a `Byte` parameter
    Byte(i8),
    /// Value of a `Short` parameter
    Short(i16),
    /// Value of an `Integer` parameter
    Integer(i32),
    /// Value of a `Long` parameter
    Long(i64),
    /// Value of a `Character` parameter
    Character(char),
    /// Value of a `Float` parameter
    Float(f32),
    /// Value of a `Double` parameter
    Double(f64),
    /// Items of a `String[]` parameter
    StringArray(Vec<String>),
    /// Items of an `int[]` parameter
    IntArray(Vec<i32>),
    /// Items of a `double[]` parameter
    DoubleArray(Vec<f64>),
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypedValue::String(a), TypedValue::String(b)) => a == b,
            (TypedValue::Boolean(a), TypedValue::Boolean(b)) => a == b,
            (TypedValue::Byte(a), TypedValue::Byte(b)) => a == b,
            (TypedValue::Short(a), TypedValue::Short(b)) => a == b,
            (TypedValue::Integer(a), TypedValue::Integer(b)) => a == b,
            (TypedValue::Long(a), TypedValue::Long(b)) => a == b,
            (TypedValue::Character(a), TypedValue::Character(b)) => a == b,
            (TypedValue::Float(a), TypedValue::Float(b)) => a.to_bits() == b.to_bits(),
            (TypedValue::Double(a), TypedValue::Double(b)) => a.to_bits() == b.to_bits(),
            (TypedValue::StringArray(a), TypedValue::StringArray(b)) => a == b,
            (TypedValue::IntArray(a), TypedValue::IntArray(b)) => a == b,
            (TypedValue::DoubleArray(a), TypedValue::DoubleArray(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }
}

impl Eq for TypedValue {}

impl TypedValue {
    /// Returns the declared type this value was produced for.
    pub fn declared_type(&self) -> DeclaredType {
        match self {
            TypedValue::String(_) => DeclaredType::String,
            TypedValue::Boolean(_) => DeclaredType::Boolean,
            TypedValue::Byte(_) => DeclaredType::Byte,
            TypedValue::Short(_) => DeclaredType::Short,
            TypedValue::Integer(_) => DeclaredType::Integer,
            TypedValue::Long(_) => DeclaredType::Long,
            TypedValue::Character(_) => DeclaredType::Character,
            TypedValue::Float(_) => DeclaredType::Float,
            TypedValue::Double(_) => DeclaredType::Double,
            TypedValue::StringArray(_) => DeclaredType::StringArray,
            TypedValue::IntArray(_) => DeclaredType::IntArray,
            TypedValue::DoubleArray(_) => DeclaredType::DoubleArray,
        }
    }

    /// Returns the `String` value, or `None` for other variants.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the `Boolean` value, or `None` for other variants.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Widens any of the integer variants to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Byte(value) => Some(i64::from(*value)),
            TypedValue::Short(value) => Some(i64::from(*value)),
            TypedValue::Integer(value) => Some(i64::from(*value)),
            TypedValue::Long(value) => Some(*value),
            _ => None,
        }
    }

    /// Widens either floating variant to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Float(value) => Some(f64::from(*value)),
            TypedValue::Double(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the `Character` value, or `None` for other variants.
    pub fn as_char(&self) -> Option<char> {
        match self {
            TypedValue::Character(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the `String[]` value, or `None` for other variants.
    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            TypedValue::StringArray(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Returns the `int[]` value, or `None` for other variants.
    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            TypedValue::IntArray(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Returns the `double[]` value, or `None` for other variants.
    pub fn as_double_array(&self) -> Option<&[f64]> {
        match self {
            TypedValue::DoubleArray(values) => Some(values.as_slice()),
            _ => None,
        }
    }
}

/// A named, typed argument passed to an anonymization function.
///
/// `value` is the single source of truth; [`Parameter::type_value`] derives
/// the typed form from it without modifying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, unique within its column by convention
    pub name: String,
    /// Raw text of the value
    pub value: String,
    /// Persisted type name; kept as text so unknown types survive a round-trip
    #[serde(rename = "type")]
    pub declared_type: String,
}

impl Parameter {
    /// Creates a parameter with a type from the known vocabulary.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        declared_type: DeclaredType,
    ) -> Self {
        Self::with_raw_type(name, value, declared_type.as_str())
    }

    /// Creates a parameter with an arbitrary type name, as read from a document.
    pub fn with_raw_type(
        name: impl Into<String>,
        value: impl Into<String>,
        declared_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            declared_type: declared_type.into(),
        }
    }

    /// Resolves the declared type name against the vocabulary.
    ///
    /// # Errors
    /// Returns `TypeCoercion` when the name is not a recognized type.
    pub fn type_tag(&self) -> Result<DeclaredType> {
        DeclaredType::from_name(&self.declared_type).ok_or_else(|| {
            DataMaskError::type_coercion(
                &self.name,
                &self.declared_type,
                &self.value,
                "unrecognized declared type",
            )
        })
    }

    /// Parses the stored text as the declared type.
    ///
    /// # Errors
    /// Returns `TypeCoercion` naming this parameter, its declared type, and
    /// the raw text when the type is unknown or the text does not parse.
    pub fn type_value(&self) -> Result<TypedValue> {
        let tag = self.type_tag()?;
        let text = self.value.as_str();

        match tag {
            DeclaredType::String => Ok(TypedValue::String(text.to_string())),
            DeclaredType::Boolean => parse_bool(text)
                .map(TypedValue::Boolean)
                .ok_or_else(|| self.coercion_error("expected 'true' or 'false'")),
            DeclaredType::Byte => self.parse_scalar::<i8>().map(TypedValue::Byte),
            DeclaredType::Short => self.parse_scalar::<i16>().map(TypedValue::Short),
            DeclaredType::Integer => self.parse_scalar::<i32>().map(TypedValue::Integer),
            DeclaredType::Long => self.parse_scalar::<i64>().map(TypedValue::Long),
            DeclaredType::Character => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(TypedValue::Character(c)),
                    _ => Err(self.coercion_error(format!(
                        "expected exactly one character, found {}",
                        text.chars().count()
                    ))),
                }
            }
            DeclaredType::Float => self.parse_scalar::<f32>().map(TypedValue::Float),
            DeclaredType::Double => self.parse_scalar::<f64>().map(TypedValue::Double),
            DeclaredType::StringArray => Ok(TypedValue::StringArray(
                split_list(text).map(str::to_string).collect(),
            )),
            DeclaredType::IntArray => self.parse_list::<i32>().map(TypedValue::IntArray),
            DeclaredType::DoubleArray => self.parse_list::<f64>().map(TypedValue::DoubleArray),
        }
    }

    fn parse_scalar<T>(&self) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        parse_number(&self.value).map_err(|reason| self.coercion_error(reason))
    }

    fn parse_list<T>(&self) -> Result<Vec<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        split_list(&self.value)
            .map(|item| {
                parse_number(item)
                    .map_err(|reason| self.coercion_error(format!("element '{}': {}", item, reason)))
            })
            .collect()
    }

    fn coercion_error(&self, reason: impl Into<String>) -> DataMaskError {
        DataMaskError::type_coercion(&self.name, &self.declared_type, &self.value, reason)
    }
}

/// Parses numeric text. Non-finite floats are only accepted under their
/// exact names `NaN` and `Infinity`, optionally signed.
fn parse_number<T>(text: &str) -> std::result::Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned.starts_with(|c: char| c.is_ascii_alphabetic())
        && !matches!(unsigned, "NaN" | "Infinity")
    {
        return Err("invalid number".to_string());
    }
    text.parse::<T>().map_err(|e| e.to_string())
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Splits a comma-separated list, trimming each element. Blank text is an
/// empty list.
fn split_list(text: &str) -> impl Iterator<Item = &str> {
    let items = if text.trim().is_empty() {
        None
    } else {
        Some(text.split(',').map(str::trim))
    };
    items.into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(value: &str, declared_type: DeclaredType) -> Parameter {
        Parameter::new("p", value, declared_type)
    }

    #[test]
    fn test_declared_type_names_round_trip() {
        for declared_type in DeclaredType::ALL {
            let name = declared_type.to_string();
            assert_eq!(name.parse::<DeclaredType>().unwrap(), declared_type);
        }
        assert!("string".parse::<DeclaredType>().is_err());
        assert!("Int[]".parse::<DeclaredType>().is_err());
    }

    #[test]
    fn test_primitive_values() {
        assert_eq!(
            param("true", DeclaredType::Boolean).type_value().unwrap(),
            TypedValue::Boolean(true)
        );
        assert_eq!(
            param("FALSE", DeclaredType::Boolean).type_value().unwrap(),
            TypedValue::Boolean(false)
        );
        assert_eq!(
            param("1", DeclaredType::Byte).type_value().unwrap(),
            TypedValue::Byte(1)
        );
        assert_eq!(
            param("2", DeclaredType::Short).type_value().unwrap(),
            TypedValue::Short(2)
        );
        assert_eq!(
            param("s", DeclaredType::Character).type_value().unwrap(),
            TypedValue::Character('s')
        );
        assert_eq!(
            param("-3", DeclaredType::Integer).type_value().unwrap(),
            TypedValue::Integer(-3)
        );
        assert_eq!(
            param("4", DeclaredType::Long).type_value().unwrap(),
            TypedValue::Long(4)
        );
        assert_eq!(
            param("0.25", DeclaredType::Float).type_value().unwrap(),
            TypedValue::Float(0.25)
        );
        assert_eq!(
            param("0.5", DeclaredType::Double).type_value().unwrap(),
            TypedValue::Double(0.5)
        );
        assert_eq!(
            param("pvalue/file.txt", DeclaredType::String)
                .type_value()
                .unwrap(),
            TypedValue::String("pvalue/file.txt".to_string())
        );
    }

    #[test]
    fn test_array_values() {
        let value = param("column1, column2,column3", DeclaredType::StringArray)
            .type_value()
            .unwrap();
        assert_eq!(
            value.as_string_array().unwrap(),
            ["column1", "column2", "column3"]
        );

        let value = param("1,10,-20", DeclaredType::IntArray).type_value().unwrap();
        assert_eq!(value.as_int_array().unwrap(), [1, 10, -20]);

        let value = param("1.2,10.5,-20.1", DeclaredType::DoubleArray)
            .type_value()
            .unwrap();
        assert_eq!(value.as_double_array().unwrap(), [1.2, 10.5, -20.1]);
    }

    #[test]
    fn test_empty_arrays() {
        for declared_type in [
            DeclaredType::StringArray,
            DeclaredType::IntArray,
            DeclaredType::DoubleArray,
        ] {
            let value = param("", declared_type).type_value().unwrap();
            assert_eq!(value.declared_type(), declared_type);
        }
        assert_eq!(
            param("", DeclaredType::StringArray).type_value().unwrap(),
            TypedValue::StringArray(Vec::new())
        );
    }

    #[test]
    fn test_non_numeric_integer_fails() {
        let parameter = Parameter::new("count", "abc", DeclaredType::Integer);
        match parameter.type_value() {
            Err(DataMaskError::TypeCoercion {
                parameter,
                declared_type,
                value,
                ..
            }) => {
                assert_eq!(parameter, "count");
                assert_eq!(declared_type, "Integer");
                assert_eq!(value, "abc");
            }
            other => panic!("expected TypeCoercion, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_fails() {
        assert!(param("128", DeclaredType::Byte).type_value().is_err());
        assert!(param("-129", DeclaredType::Byte).type_value().is_err());
        assert!(param("40000", DeclaredType::Short).type_value().is_err());
        assert!(param("3000000000", DeclaredType::Integer).type_value().is_err());
        assert!(param("3000000000", DeclaredType::Long).type_value().is_ok());
    }

    #[test]
    fn test_character_length_must_be_one() {
        assert!(param("", DeclaredType::Character).type_value().is_err());
        assert!(param("ab", DeclaredType::Character).type_value().is_err());
        assert_eq!(
            param("é", DeclaredType::Character).type_value().unwrap(),
            TypedValue::Character('é')
        );
    }

    #[test]
    fn test_boolean_rejects_other_text() {
        assert!(param("yes", DeclaredType::Boolean).type_value().is_err());
        assert!(param("", DeclaredType::Boolean).type_value().is_err());
    }

    #[test]
    fn test_bad_array_element_fails() {
        let error = param("1,x,3", DeclaredType::IntArray)
            .type_value()
            .unwrap_err();
        assert!(error.to_string().contains("'x'"));
        assert!(param("1.5,,2", DeclaredType::DoubleArray).type_value().is_err());
    }

    #[test]
    fn test_unknown_declared_type_fails() {
        let parameter = Parameter::with_raw_type("p", "1", "BigDecimal");
        assert!(matches!(
            parameter.type_value(),
            Err(DataMaskError::TypeCoercion { .. })
        ));
        assert!(parameter.type_tag().is_err());
    }

    #[test]
    fn test_type_value_is_repeatable() {
        let parameter = param("1,10,-20", DeclaredType::IntArray);
        let first = parameter.type_value().unwrap();
        let second = parameter.type_value().unwrap();
        assert_eq!(first, second);
        assert_eq!(parameter.value, "1,10,-20");
    }

    #[test]
    fn test_non_finite_floats() {
        let parameter = param("NaN", DeclaredType::Double);
        assert_eq!(
            parameter.type_value().unwrap(),
            parameter.type_value().unwrap()
        );

        let value = param("-Infinity", DeclaredType::Float).type_value().unwrap();
        assert_eq!(value, TypedValue::Float(f32::NEG_INFINITY));

        let value = param("NaN, 1", DeclaredType::DoubleArray)
            .type_value()
            .unwrap();
        assert!(value.as_double_array().unwrap()[0].is_nan());

        for text in ["nan", "inf", "-inf", "infinity", "INFINITY"] {
            assert!(
                param(text, DeclaredType::Double).type_value().is_err(),
                "{} should be rejected",
                text
            );
        }
        assert!(param("1,inf", DeclaredType::DoubleArray).type_value().is_err());
    }

    #[test]
    fn test_widening_accessors() {
        let value = param("-7", DeclaredType::Short).type_value().unwrap();
        assert_eq!(value.as_i64(), Some(-7));
        assert_eq!(value.as_f64(), None);

        let value = param("0.25", DeclaredType::Float).type_value().unwrap();
        assert_eq!(value.as_f64(), Some(0.25));
    }
}
