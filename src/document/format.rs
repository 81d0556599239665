use bson::{Bson, Document};
use std::fmt;

/// Renders a value the way the server prints it inside error messages.
#[must_use]
pub fn format_value(v: &Bson) -> String {
    Shown(v).to_string()
}

struct Shown<'a>(&'a Bson);

fn fmt_document(f: &mut fmt::Formatter<'_>, d: &Document) -> fmt::Result {
    if d.is_empty() {
        return f.write_str("{}");
    }
    f.write_str("{ ")?;
    for (i, (k, v)) in d.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{k}: {}", Shown(v))?;
    }
    f.write_str(" }")
}

impl fmt::Display for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Bson::Double(x) => f.write_str(&format_double(*x)),
            Bson::String(s) | Bson::Symbol(s) => write!(f, "\"{s}\""),
            Bson::Document(d) => fmt_document(f, d),
            Bson::Array(a) => {
                if a.is_empty() {
                    return f.write_str("[]");
                }
                f.write_str("[ ")?;
                for (i, e) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Shown(e))?;
                }
                f.write_str(" ]")
            }
            Bson::Binary(b) => {
                write!(f, "BinData({}, ", u8::from(b.subtype))?;
                for byte in &b.bytes {
                    write!(f, "{byte:02X}")?;
                }
                f.write_str(")")
            }
            Bson::ObjectId(oid) => write!(f, "ObjectId('{}')", oid.to_hex()),
            Bson::Boolean(b) => write!(f, "{b}"),
            Bson::DateTime(dt) => write!(f, "new Date({})", dt.timestamp_millis()),
            Bson::Null => f.write_str("null"),
            Bson::Undefined => f.write_str("undefined"),
            Bson::RegularExpression(re) => write!(f, "/{}/{}", re.pattern.as_str(), re.options.as_str()),
            Bson::Int32(i) => write!(f, "{i}"),
            Bson::Int64(i) => write!(f, "{i}"),
            Bson::Timestamp(ts) => write!(f, "Timestamp({}, {})", ts.time, ts.increment),
            Bson::Decimal128(d) => write!(f, "NumberDecimal(\"{d}\")"),
            Bson::MinKey => f.write_str("MinKey"),
            Bson::MaxKey => f.write_str("MaxKey"),
            other => write!(f, "{other}"),
        }
    }
}

/// Doubles keep a trailing `.0` when whole, like the shell prints them.
#[must_use]
pub fn format_double(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let s = format!("{f}");
    if s.contains('.') || s.contains('e') { s } else { format!("{s}.0") }
}
