use serde::Serialize;
use serde::Serializer;
use std::borrow::Cow;
use std::fmt::Display;

// Largest magnitude below which every integral f64 is an exact i64.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// A typed cell value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl Value {
    /// Types one field of a delimited file.
    ///
    /// Empty text is `Null` and `true`/`false` in any case is a `Boolean`. Text is a `Number`
    /// only when the number renders back to exactly the same text, so `007` or `1.50`
    /// remain strings and search sees what the file contains.
    pub fn infer(text: &str) -> Value {
        if text.is_empty() {
            Value::Null
        } else if text.eq_ignore_ascii_case("true") {
            Value::Boolean(true)
        } else if text.eq_ignore_ascii_case("false") {
            Value::Boolean(false)
        } else {
            match text.parse::<f64>() {
                Ok(number) if number.is_finite() && format_number(number) == text => Value::Number(number),
                _ => Value::String(text.to_owned()),
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text the searcher matches against.
    pub fn search_text(&self) -> Cow<'_, str> {
        match self {
            Value::String(text) => Cow::Borrowed(text),
            Value::Null => Cow::Borrowed(""),
            other => Cow::Owned(other.to_string()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(text) => f.write_str(text),
            Value::Number(number) => f.write_str(&format_number(*number)),
            Value::Boolean(true) => f.write_str("True"),
            Value::Boolean(false) => f.write_str("False"),
            Value::Null => Ok(()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(text) => serializer.serialize_str(text),
            Value::Number(number) if is_exact_integer(*number) => serializer.serialize_i64(*number as i64),
            Value::Number(number) if number.is_finite() => serializer.serialize_f64(*number),
            Value::Number(_) | Value::Null => serializer.serialize_unit(),
            Value::Boolean(flag) => serializer.serialize_bool(*flag),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Boolean(flag)
    }
}

fn is_exact_integer(number: f64) -> bool {
    number.is_finite() && number.fract() == 0.0 && number.abs() < EXACT_INTEGER_LIMIT
}

/// Integral numbers print without a fractional part (`30`, not `30.0`).
pub(crate) fn format_number(number: f64) -> String {
    if is_exact_integer(number) {
        (number as i64).to_string()
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_delimited_fields() {
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("TRUE"), Value::Boolean(true));
        assert_eq!(Value::infer("false"), Value::Boolean(false));
        assert_eq!(Value::infer("30"), Value::Number(30.0));
        assert_eq!(Value::infer("-2.5"), Value::Number(-2.5));
        assert_eq!(Value::infer("007"), Value::from("007"));
        assert_eq!(Value::infer("1.50"), Value::from("1.50"));
        assert_eq!(Value::infer("1e3"), Value::from("1e3"));
        assert_eq!(Value::infer("NaN"), Value::from("NaN"));
        assert_eq!(Value::infer("Bob"), Value::from("Bob"));
    }

    #[test]
    fn renders_for_search() {
        assert_eq!(Value::Number(30.0).search_text(), "30");
        assert_eq!(Value::Number(0.1).search_text(), "0.1");
        assert_eq!(Value::Boolean(true).search_text(), "True");
        assert_eq!(Value::Null.search_text(), "");
        assert_eq!(Value::from("Alice").search_text(), "Alice");
    }

    #[test]
    fn serializes_with_json_types() {
        let values = vec![
            Value::Number(25.0),
            Value::Number(2.5),
            Value::Number(f64::NAN),
            Value::Boolean(false),
            Value::Null,
            Value::from("célula"),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[25,2.5,null,false,null,"célula"]"#);
    }
}
