//! Value helpers - truthiness and text rendering of resolved values
//!
//! Blueprint values follow the conventions of the documents they come from:
//! `null`, `false`, `0`, `""`, `[]` and `{}` are falsy, and scalars render the
//! way the blueprint format has always rendered them (`None`, `True`, `3.0`).

use serde_json::Value;

/// Truthiness of a resolved value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(u) = n.as_u64() {
                u != 0
            } else {
                n.as_f64().is_some_and(|f| f != 0.0)
            }
        }
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Short type name used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Render a value for `%s` and for model-name coercion
pub fn display_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => repr_str(other),
    }
}

/// Render a value for `%r` and inside containers
pub fn repr_str(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                float_repr(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(repr_str).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), repr_str(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// Shortest round-trip float text, always with a fractional part or exponent
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        return pad_exponent(&format!("{:e}", f));
    }
    let s = f.to_string();
    if s.contains('.') {
        s
    } else {
        format!("{}.0", s)
    }
}

/// Rewrite Rust exponent notation (`1.5e-5`) to the two-digit signed form (`1.5e-05`)
pub fn pad_exponent(s: &str) -> String {
    let Some((mantissa, exp)) = s.split_once(['e', 'E']) else {
        return s.to_string();
    };
    let marker = if s.contains('E') { 'E' } else { 'e' };
    let (sign, digits) = match exp.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exp.trim_start_matches('+')),
    };
    let digits = if digits.len() < 2 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    format!("{}{}{}{}", mantissa, marker, sign, digits)
}

fn quote(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falsy_values() {
        let values = [
            json!(null),
            json!(false),
            json!(0),
            json!(0.0),
            json!(""),
            json!([]),
            json!({}),
        ];
        for v in values {
            assert!(!is_truthy(&v), "{} should be falsy", v);
        }
    }

    #[test]
    fn truthy_values() {
        let values = [
            json!(true),
            json!(1),
            json!(-2),
            json!(0.5),
            json!("x"),
            json!([0]),
            json!({"a": null}),
        ];
        for v in values {
            assert!(is_truthy(&v), "{} should be truthy", v);
        }
    }

    #[test]
    fn py_str_scalars() {
        assert_eq!(display_str(&json!(null)), "None");
        assert_eq!(display_str(&json!(true)), "True");
        assert_eq!(display_str(&json!(3)), "3");
        assert_eq!(display_str(&json!(3.0)), "3.0");
        assert_eq!(display_str(&json!("abc")), "abc");
    }

    #[test]
    fn py_repr_containers() {
        assert_eq!(repr_str(&json!(["a", 1, null])), "['a', 1, None]");
        assert_eq!(repr_str(&json!({"k": false})), "{'k': False}");
        assert_eq!(repr_str(&json!("it's")), "\"it's\"");
    }

    #[test]
    fn float_repr_uses_exponent_for_extremes() {
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-5), "1.5e-05");
        assert_eq!(float_repr(0.25), "0.25");
        assert_eq!(float_repr(-2.0), "-2.0");
    }

    #[test]
    fn type_names() {
        assert_eq!(type_name(&json!(1)), "int");
        assert_eq!(type_name(&json!(1.5)), "float");
        assert_eq!(type_name(&json!("s")), "str");
        assert_eq!(type_name(&json!([])), "list");
    }
}
