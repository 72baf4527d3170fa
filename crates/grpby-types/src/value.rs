use std::cmp::Ordering;
use std::fmt;

use grpby_error::{GroupByError, Result};

/// A dynamically-typed column value.
///
/// The group-by engine reads these out of input rows, feeds them into
/// accumulators and appends finalized ones to output rows. There are five
/// storage classes: NULL, INTEGER, NUMBER, TEXT, and BINARY.
#[derive(Clone, Debug)]
pub enum Value {
    /// Absent value.
    Null,
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit IEEE 754 floating-point number.
    Number(f64),
    /// A UTF-8 text string.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
}

/// Shared NULL, handed out when a row is shorter than its layout says.
pub static NULL: Value = Value::Null;

impl Value {
    /// Returns true if this is a NULL value.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for INTEGER and NUMBER values.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Number(_))
    }

    /// Try to extract an integer value.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to extract a float value.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to extract a text reference.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a float.
    ///
    /// Text must parse as a number; binary values and unparseable text are
    /// conversion errors. NULL has no numeric value and is also an error, so
    /// callers check [`is_null`](Self::is_null) first.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_number(&self) -> Result<f64> {
        match self {
            Self::Integer(i) => Ok(*i as f64),
            Self::Number(f) => Ok(*f),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| GroupByError::conversion(self.to_string(), "Number")),
            Self::Null | Self::Binary(_) => {
                Err(GroupByError::conversion(self.to_string(), "Number"))
            }
        }
    }

    /// Convert to an integer, rounding floats half away from zero.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_integer(&self) -> Result<i64> {
        match self {
            Self::Integer(i) => Ok(*i),
            Self::Number(f) => {
                if f.is_finite()
                    && *f >= -9_223_372_036_854_775_808.0
                    && *f < 9_223_372_036_854_775_808.0
                {
                    Ok(f.round() as i64)
                } else {
                    Err(GroupByError::conversion(self.to_string(), "Integer"))
                }
            }
            Self::Text(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Ok(i);
                }
                match trimmed.parse::<f64>() {
                    Ok(f) => Self::Number(f).to_integer(),
                    Err(_) => Err(GroupByError::conversion(self.to_string(), "Integer")),
                }
            }
            Self::Null | Self::Binary(_) => {
                Err(GroupByError::conversion(self.to_string(), "Integer"))
            }
        }
    }

    /// Text form used by concatenation aggregates.
    ///
    /// NULL renders as the empty string; binary values are decoded as UTF-8
    /// with lossy replacement.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(i) => i.to_string(),
            Self::Number(f) => format_number(*f),
            Self::Text(s) => s.clone(),
            Self::Binary(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Add two non-NULL numeric values.
    ///
    /// - Integer + Integer: checked add; overflow is an error.
    /// - Any NUMBER operand: float addition.
    /// - Text operands are parsed as numbers.
    #[allow(clippy::cast_precision_loss)]
    pub fn plus(&self, other: &Self) -> Result<Self> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a
                .checked_add(*b)
                .map(Self::Integer)
                .ok_or(GroupByError::IntegerOverflow),
            _ => Ok(Self::Number(self.to_number()? + other.to_number()?)),
        }
    }

    /// The sort class (NULLs sort first).
    const fn sort_class(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Integer(_) | Self::Number(_) => 1,
            Self::Text(_) => 2,
            Self::Binary(_) => 3,
        }
    }

    /// Total order over all values: NULL < numeric < text < binary, with
    /// floats ordered by `f64::total_cmp` so NaN has a stable position.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        let class_a = self.sort_class();
        let class_b = other.sort_class();
        if class_a != class_b {
            return class_a.cmp(&class_b);
        }
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Integer(a), Self::Number(b)) => int_float_cmp(*a, *b),
            (Self::Number(a), Self::Integer(b)) => int_float_cmp(*b, *a).reverse(),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Binary(a), Self::Binary(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Wrapper that gives [`Value`] a total `Ord`, for distinct-value sets.
#[derive(Clone, Debug)]
pub struct DistinctValue(pub Value);

impl PartialEq for DistinctValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for DistinctValue {}

impl PartialOrd for DistinctValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistinctValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(v) => f.write_str(&format_number(*v)),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Binary(b) => {
                f.write_str("X'")?;
                for byte in b {
                    write!(f, "{byte:02X}")?;
                }
                f.write_str("'")
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Equal))
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Integer(_), Self::Number(b)) | (Self::Number(b), Self::Integer(_))
                if b.is_nan() =>
            {
                None
            }
            _ => Some(self.total_cmp(other)),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Number(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// Compare an integer with a float without losing precision for |i| > 2^53.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn int_float_cmp(i: i64, r: f64) -> Ordering {
    if r.is_nan() {
        return Ordering::Less;
    }
    if r < -9_223_372_036_854_775_808.0 {
        return Ordering::Greater;
    }
    if r >= 9_223_372_036_854_775_808.0 {
        return Ordering::Less;
    }
    let y = r as i64;
    match i.cmp(&y) {
        Ordering::Equal => {
            let s = i as f64;
            s.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
        other => other,
    }
}

/// Format a float for text output.
///
/// Whole numbers keep one decimal place (`2.0`, not `2`) so a NUMBER never
/// reads like an INTEGER after concatenation.
#[must_use]
pub fn format_number(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_owned();
    }
    if f.is_infinite() {
        return if f.is_sign_positive() {
            "Inf".to_owned()
        } else {
            "-Inf".to_owned()
        };
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}
