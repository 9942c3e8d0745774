use std::fmt;

/// A typed property value as parsed from `zfs get -p` text.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Integer(i64),
    Float(f64),
    Text(String),
}
impl PropertyValue {
    /// `None` for `-`, empty and `none`; integers for plain digit strings, then float, then text.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(i) = raw.parse::<i64>() {
                return Some(PropertyValue::Integer(i));
            }
        }
        if raw.is_empty() || raw == "-" || raw.eq_ignore_ascii_case("none") {
            return None;
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Some(PropertyValue::Float(f));
            }
        }
        Some(PropertyValue::Text(raw.to_owned()))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}
impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_owned())
    }
}
impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}
impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Integer(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

/// An immutable `name = value (source)` triple of a dataset or snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: Option<PropertyValue>,
    pub source: Option<PropertyValue>,
}
impl Property {
    pub fn from_params(name: &str, value: &str, source: &str) -> Self {
        Self {
            name: name.to_owned(),
            value: PropertyValue::parse(value),
            source: PropertyValue::parse(source),
        }
    }

    pub fn absent(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            value: None,
            source: None,
        }
    }

    pub fn integer(&self) -> Option<i64> {
        self.value.as_ref().and_then(PropertyValue::as_integer)
    }

    pub fn text(&self) -> Option<&str> {
        self.value.as_ref().and_then(PropertyValue::as_text)
    }
}
