//! Format - printf-style string interpolation for `!Format`
//!
//! Supported conversion specifiers:
//!
//! ```text
//! %s %r %a     text (str / repr / ascii repr)
//! %d %i %u     signed decimal (floats are truncated)
//! %x %X %o     hex / octal (integers only, `#` adds 0x / 0X / 0o)
//! %f %F        fixed point
//! %e %E        exponent notation
//! %g %G        general (shortest of fixed / exponent)
//! %c           single character (code point or 1-char string)
//! %%           literal percent
//! ```
//!
//! Flags `-+ 0#`, width and precision (both may be `*`) are honoured.
//! Length modifiers (`h`, `l`, `L`) are accepted and ignored.

use serde_json::Value;

use super::ResolveTag;
use crate::ast::Node;
use crate::error::EntryInvalid;
use crate::resolve::TagResolver;
use crate::util::value::pad_exponent;
use crate::util::{display_str, repr_str, type_name};

/// Largest width or precision a specifier may request
const MAX_FIELD: usize = 1 << 16;

/// Format a string with resolved arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    pub format_string: String,
    pub args: Vec<Node>,
}

impl Format {
    pub fn new(format_string: impl Into<String>, args: Vec<Node>) -> Self {
        Self {
            format_string: format_string.into(),
            args,
        }
    }
}

impl ResolveTag for Format {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        let args = self
            .args
            .iter()
            .map(|arg| resolver.resolve(arg))
            .collect::<Result<Vec<_>, _>>()?;
        format_values(&self.format_string, &args).map(Value::String)
    }
}

/// Substitute `args` into `template`.
///
/// Every argument must be consumed and every specifier must get one.
pub fn format_values(template: &str, args: &[Value]) -> Result<String, EntryInvalid> {
    Formatter::new(template, args)
        .run()
        .map_err(|reason| EntryInvalid::new(format!("Format: {}", reason)))
}

// ═══════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

struct Formatter<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    args: &'a [Value],
    next_arg: usize,
}

impl<'a> Formatter<'a> {
    fn new(template: &str, args: &'a [Value]) -> Self {
        Self {
            chars: template.char_indices().collect(),
            pos: 0,
            args,
            next_arg: 0,
        }
    }

    fn run(mut self) -> Result<String, String> {
        let mut out = String::new();
        while let Some(ch) = self.bump() {
            if ch != '%' {
                out.push(ch);
                continue;
            }
            let start = self.chars[self.pos - 1].0;
            let spec = self.parse_spec(start)?;
            if spec.conversion == '%' {
                out.push('%');
                continue;
            }
            let arg = self.take_arg()?;
            out.push_str(&render(&spec, arg)?);
        }

        if self.next_arg < self.args.len() {
            return Err("not all arguments converted during string formatting".to_string());
        }
        Ok(out)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).map(|(_, c)| *c);
        self.pos += 1;
        ch
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn take_arg(&mut self) -> Result<&'a Value, String> {
        let arg = self
            .args
            .get(self.next_arg)
            .ok_or_else(|| "not enough arguments for format string".to_string())?;
        self.next_arg += 1;
        Ok(arg)
    }

    fn take_star(&mut self, field: &str) -> Result<usize, String> {
        let n = match self.take_arg()? {
            Value::Number(n) if n.is_i64() || n.is_u64() => {
                n.as_i64().map_or(u64::MAX, i64::unsigned_abs)
            }
            _ => return Err("* wants int".to_string()),
        };
        usize::try_from(n)
            .ok()
            .filter(|n| *n <= MAX_FIELD)
            .ok_or_else(|| format!("{} too big", field))
    }

    fn number(&mut self, field: &str) -> Result<usize, String> {
        let mut n = 0usize;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            n = n * 10 + d as usize;
            if n > MAX_FIELD {
                return Err(format!("{} too big", field));
            }
            self.pos += 1;
        }
        Ok(n)
    }

    fn parse_spec(&mut self, start: usize) -> Result<Spec, String> {
        let mut spec = Spec::default();

        if self.peek() == Some('(') {
            return Err("format requires a mapping".to_string());
        }

        while let Some(flag) = self.peek() {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.alt = true,
                _ => break,
            }
            self.pos += 1;
        }

        if self.peek() == Some('*') {
            self.pos += 1;
            if let Some(Value::Number(n)) = self.args.get(self.next_arg) {
                if n.as_i64().is_some_and(|i| i < 0) {
                    spec.left = true;
                }
            }
            spec.width = self.take_star("width")?;
        } else {
            spec.width = self.number("width")?;
        }

        if self.peek() == Some('.') {
            self.pos += 1;
            if self.peek() == Some('*') {
                self.pos += 1;
                spec.precision = Some(self.take_star("precision")?);
            } else {
                spec.precision = Some(self.number("precision")?);
            }
        }

        while matches!(self.peek(), Some('h' | 'l' | 'L')) {
            self.pos += 1;
        }

        match self.bump() {
            None => Err("incomplete format".to_string()),
            Some(
                c @ ('s' | 'r' | 'a' | 'd' | 'i' | 'u' | 'x' | 'X' | 'o' | 'f' | 'F' | 'e' | 'E'
                | 'g' | 'G' | 'c' | '%'),
            ) => {
                spec.conversion = c;
                Ok(spec)
            }
            Some(c) => Err(format!(
                "unsupported format character '{}' (0x{:x}) at index {}",
                c,
                c as u32,
                self.chars.get(self.pos - 1).map_or(start, |(i, _)| *i)
            )),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Rendering
// ═══════════════════════════════════════════════════════════════

fn render(spec: &Spec, arg: &Value) -> Result<String, String> {
    match spec.conversion {
        's' | 'r' | 'a' => {
            let mut text = match spec.conversion {
                's' => display_str(arg),
                'r' => repr_str(arg),
                _ => ascii_escape(&repr_str(arg)),
            };
            if let Some(precision) = spec.precision {
                text = text.chars().take(precision).collect();
            }
            Ok(pad_text(spec, text))
        }
        'c' => {
            let ch = match arg {
                Value::String(s) if s.chars().count() == 1 => s.clone(),
                Value::Number(n) if n.is_i64() || n.is_u64() => n
                    .as_u64()
                    .and_then(|c| u32::try_from(c).ok())
                    .and_then(char::from_u32)
                    .map(String::from)
                    .ok_or_else(|| "%c arg not in range(0x110000)".to_string())?,
                _ => return Err("%c requires int or char".to_string()),
            };
            Ok(pad_text(spec, ch))
        }
        'd' | 'i' | 'u' => {
            let (negative, mut digits) = decimal(arg, spec.conversion)?;
            if let Some(precision) = spec.precision {
                digits = format!("{:0>width$}", digits, width = precision);
            }
            Ok(pad_number(spec, negative, "", digits))
        }
        'x' | 'X' | 'o' => {
            let n = integer(arg, spec.conversion)?;
            let abs = n.unsigned_abs();
            let (mut digits, prefix) = match spec.conversion {
                'x' => (format!("{:x}", abs), "0x"),
                'X' => (format!("{:X}", abs), "0X"),
                _ => (format!("{:o}", abs), "0o"),
            };
            if let Some(precision) = spec.precision {
                digits = format!("{:0>width$}", digits, width = precision);
            }
            let prefix = if spec.alt { prefix } else { "" };
            Ok(pad_number(spec, n < 0, prefix, digits))
        }
        'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
            let f = real(arg, spec.conversion)?;
            let precision = spec.precision.unwrap_or(6);
            let upper = spec.conversion.is_ascii_uppercase();
            let digits = if f.is_nan() {
                "nan".to_string()
            } else if f.is_infinite() {
                "inf".to_string()
            } else {
                match spec.conversion.to_ascii_lowercase() {
                    'f' => fixed(f.abs(), precision, spec.alt),
                    'e' => exponent(f.abs(), precision, spec.alt),
                    _ => general(f.abs(), precision, spec.alt),
                }
            };
            let digits = if upper { digits.to_uppercase() } else { digits };
            let negative = f.is_sign_negative() && !f.is_nan();
            Ok(pad_number(spec, negative, "", digits))
        }
        other => Err(format!("unsupported format character '{}'", other)),
    }
}

/// Sign and decimal digits for `%d`; floats are truncated toward zero
fn decimal(arg: &Value, conversion: char) -> Result<(bool, String), String> {
    match arg {
        Value::Number(n) if n.is_f64() => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err(format!("cannot convert float {} to integer", repr_str(arg)));
            }
            let truncated = f.trunc();
            Ok((truncated < 0.0, format!("{:.0}", truncated.abs())))
        }
        _ => integer(arg, conversion).map(|n| (n < 0, n.unsigned_abs().to_string())),
    }
}

/// Integer value of a non-float argument
fn integer(arg: &Value, conversion: char) -> Result<i128, String> {
    match arg {
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i128::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(i128::from(u))
            } else {
                Err(format!(
                    "%{} format: an integer is required, not float",
                    conversion
                ))
            }
        }
        other if matches!(conversion, 'd' | 'i' | 'u') => Err(format!(
            "%{} format: a real number is required, not {}",
            conversion,
            type_name(other)
        )),
        other => Err(format!(
            "%{} format: an integer is required, not {}",
            conversion,
            type_name(other)
        )),
    }
}

fn real(arg: &Value, conversion: char) -> Result<f64, String> {
    match arg {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(f64::NAN)),
        other => Err(format!(
            "%{} format: must be real number, not {}",
            conversion,
            type_name(other)
        )),
    }
}

fn fixed(f: f64, precision: usize, alt: bool) -> String {
    let s = format!("{:.*}", precision, f);
    if alt && precision == 0 {
        format!("{}.", s)
    } else {
        s
    }
}

fn exponent(f: f64, precision: usize, alt: bool) -> String {
    let s = pad_exponent(&format!("{:.*e}", precision, f));
    if alt && precision == 0 {
        s.replacen('e', ".e", 1)
    } else {
        s
    }
}

fn general(f: f64, precision: usize, alt: bool) -> String {
    let precision = precision.max(1);
    if f == 0.0 {
        return if alt {
            format!("{:.*}", precision - 1, 0.0)
        } else {
            "0".to_string()
        };
    }

    // exponent after rounding to `precision` significant digits
    let rounded = format!("{:.*e}", precision - 1, f);
    let exp: i64 = rounded
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    let s = if exp < -4 || exp >= precision as i64 {
        pad_exponent(&rounded)
    } else {
        let decimals = (precision as i64 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, f)
    };

    if alt {
        return s;
    }
    match s.split_once('e') {
        Some((mantissa, exp)) => format!("{}e{}", strip_zeros(mantissa), exp),
        None => strip_zeros(&s).to_string(),
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn ascii_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch as u32 {
            0..=0x7f => out.push(ch),
            c @ 0x80..=0xff => out.push_str(&format!("\\x{:02x}", c)),
            c @ 0x100..=0xffff => out.push_str(&format!("\\u{:04x}", c)),
            c => out.push_str(&format!("\\U{:08x}", c)),
        }
    }
    out
}

fn pad_text(spec: &Spec, text: String) -> String {
    let len = text.chars().count();
    if len >= spec.width {
        return text;
    }
    let fill = " ".repeat(spec.width - len);
    if spec.left {
        format!("{}{}", text, fill)
    } else {
        format!("{}{}", fill, text)
    }
}

fn pad_number(spec: &Spec, negative: bool, prefix: &str, digits: String) -> String {
    let sign = if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };

    let len = sign.len() + prefix.len() + digits.chars().count();
    if len >= spec.width {
        return format!("{}{}{}", sign, prefix, digits);
    }
    let fill = spec.width - len;
    if spec.left {
        format!("{}{}{}{}", sign, prefix, digits, " ".repeat(fill))
    } else if spec.zero {
        format!("{}{}{}{}", sign, prefix, "0".repeat(fill), digits)
    } else {
        format!("{}{}{}{}", " ".repeat(fill), sign, prefix, digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fmt(template: &str, args: Vec<Value>) -> String {
        format_values(template, &args).unwrap()
    }

    fn fmt_err(template: &str, args: Vec<Value>) -> String {
        format_values(template, &args).unwrap_err().reason
    }

    #[test]
    fn text_conversions() {
        assert_eq!(fmt("%s-%s", vec![json!("a"), json!(1)]), "a-1");
        assert_eq!(fmt("%s %s %s", vec![json!(null), json!(true), json!(2.0)]), "None True 2.0");
        assert_eq!(fmt("%r", vec![json!("x")]), "'x'");
        assert_eq!(fmt("%a", vec![json!("é")]), "'\\xe9'");
        assert_eq!(
            fmt("[%5s|%-5s|%.2s]", vec![json!("ab"), json!("ab"), json!("abc")]),
            "[   ab|ab   |ab]"
        );
        assert_eq!(fmt("%s", vec![json!(["a", 1])]), "['a', 1]");
    }

    #[test]
    fn integer_conversions() {
        assert_eq!(fmt("%d", vec![json!(42)]), "42");
        assert_eq!(fmt("%i", vec![json!(3.9)]), "3");
        assert_eq!(fmt("%05d", vec![json!(-42)]), "-0042");
        assert_eq!(fmt("%+d % d", vec![json!(5), json!(5)]), "+5  5");
        assert_eq!(fmt("%.3d", vec![json!(7)]), "007");
        assert_eq!(
            fmt("%x %X %#x %#o", vec![json!(255), json!(255), json!(255), json!(8)]),
            "ff FF 0xff 0o10"
        );
        assert_eq!(fmt("%d", vec![json!(true)]), "1");
        assert_eq!(fmt("%*d", vec![json!(4), json!(1)]), "   1");
    }

    #[test]
    fn float_conversions() {
        assert_eq!(fmt("%f", vec![json!(1.5)]), "1.500000");
        assert_eq!(fmt("%.2f", vec![json!(2)]), "2.00");
        assert_eq!(fmt("%e", vec![json!(12345.678)]), "1.234568e+04");
        assert_eq!(fmt("%.1E", vec![json!(0.00012)]), "1.2E-04");
        assert_eq!(
            fmt("%g %g %g", vec![json!(0.0001), json!(123456789), json!(1.5)]),
            "0.0001 1.23457e+08 1.5"
        );
        assert_eq!(fmt("%08.3f", vec![json!(-3.14159)]), "-003.142");
    }

    #[test]
    fn char_and_percent() {
        assert_eq!(fmt("%c%c", vec![json!(65), json!("b")]), "Ab");
        assert_eq!(fmt("100%%", vec![]), "100%");
        assert_eq!(fmt("no specifiers", vec![]), "no specifiers");
    }

    #[test]
    fn type_mismatches_fail() {
        assert_eq!(
            fmt_err("%d", vec![json!("foo")]),
            "Format: %d format: a real number is required, not str"
        );
        assert!(fmt_err("%x", vec![json!(1.5)]).contains("an integer is required, not float"));
        assert!(fmt_err("%f", vec![json!("x")]).contains("must be real number, not str"));
        assert!(fmt_err("%c", vec![json!("ab")]).contains("%c requires int or char"));
    }

    #[test]
    fn arity_mismatches_fail() {
        assert_eq!(
            fmt_err("%s %s", vec![json!(1)]),
            "Format: not enough arguments for format string"
        );
        assert_eq!(
            fmt_err("%s", vec![json!(1), json!(2)]),
            "Format: not all arguments converted during string formatting"
        );
        assert_eq!(
            fmt_err("plain", vec![json!(1)]),
            "Format: not all arguments converted during string formatting"
        );
    }

    #[test]
    fn huge_floats_keep_their_digits() {
        let big = fmt("%d", vec![json!(1e300)]);
        assert_eq!(big.len(), 301);
        assert!(big.starts_with("1000000000"));
        assert_eq!(fmt("%d", vec![json!(-2.5e38)]), format!("-{:.0}", 2.5e38_f64));
        assert_eq!(fmt("%d", vec![json!(-0.5)]), "0");
    }

    #[test]
    fn oversized_fields_fail() {
        assert_eq!(fmt_err("%*s", vec![json!(i64::MAX), json!("x")]), "Format: width too big");
        assert_eq!(fmt_err("%*s", vec![json!(u64::MAX), json!("x")]), "Format: width too big");
        assert_eq!(fmt_err("%99999999999999999999d", vec![json!(1)]), "Format: width too big");
        assert_eq!(fmt_err("%.*f", vec![json!(i64::MIN), json!(1.0)]), "Format: precision too big");
        assert_eq!(fmt_err("%.100000000f", vec![json!(1.0)]), "Format: precision too big");
        assert_eq!(fmt("%*d", vec![json!(3), json!(7)]), "  7");
    }

    #[test]
    fn malformed_templates_fail() {
        assert_eq!(fmt_err("50%", vec![]), "Format: incomplete format");
        assert!(fmt_err("%q", vec![json!(1)])
            .contains("unsupported format character 'q' (0x71) at index 1"));
        assert!(fmt_err("%(name)s", vec![json!(1)]).contains("format requires a mapping"));
    }
}
