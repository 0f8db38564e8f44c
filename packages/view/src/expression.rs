//! Evaluates the subset of MapLibre style-spec expressions the viewer
//! emits, against one feature's properties and transient state.
//!
//! Supported operators: `all`, `any`, `!`, `in`, `literal`, `get`,
//! `coalesce`, `boolean`, `feature-state`, `case`, `match`, `==`, `!=`,
//! `<`, `<=`, `>`, `>=`. Anything else evaluates to `null`.

use std::cmp::Ordering;

use geojson::JsonObject;
use serde_json::Value;

/// Inputs an expression can read.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    /// Feature properties read by `get`.
    pub properties: &'a JsonObject,
    /// Transient flags read by `feature-state`.
    pub state: Option<&'a JsonObject>,
}

impl<'a> Context<'a> {
    /// A context with properties only.
    #[must_use]
    pub const fn new(properties: &'a JsonObject) -> Self {
        Self {
            properties,
            state: None,
        }
    }
}

/// Whether a layer filter admits a feature. `None` admits everything.
#[must_use]
pub fn passes(filter: Option<&Value>, properties: &JsonObject) -> bool {
    filter.is_none_or(|expr| evaluate(expr, Context::new(properties)) == Value::Bool(true))
}

/// Evaluates `expr`.
#[must_use]
pub fn evaluate(expr: &Value, ctx: Context<'_>) -> Value {
    let Value::Array(items) = expr else {
        return expr.clone();
    };
    let Some((Value::String(op), args)) = items.split_first() else {
        return expr.clone();
    };

    match op.as_str() {
        "literal" => args.first().cloned().unwrap_or(Value::Null),
        "get" => args
            .first()
            .map(|key| evaluate(key, ctx))
            .and_then(|key| key.as_str().and_then(|k| ctx.properties.get(k)).cloned())
            .unwrap_or(Value::Null),
        "feature-state" => args
            .first()
            .map(|key| evaluate(key, ctx))
            .and_then(|key| {
                key.as_str()
                    .and_then(|k| ctx.state.and_then(|state| state.get(k)))
                    .cloned()
            })
            .unwrap_or(Value::Null),
        "coalesce" => args
            .iter()
            .map(|arg| evaluate(arg, ctx))
            .find(|value| !value.is_null())
            .unwrap_or(Value::Null),
        "boolean" => {
            let mut values = args.iter().map(|arg| evaluate(arg, ctx));
            Value::Bool(
                values
                    .find_map(|value| value.as_bool())
                    .unwrap_or(false),
            )
        }
        "all" => Value::Bool(args.iter().all(|arg| truthy(&evaluate(arg, ctx)))),
        "any" => Value::Bool(args.iter().any(|arg| truthy(&evaluate(arg, ctx)))),
        "!" => Value::Bool(!args.first().is_some_and(|arg| truthy(&evaluate(arg, ctx)))),
        "in" => {
            let [needle, haystack] = args else {
                return Value::Null;
            };
            let needle = evaluate(needle, ctx);
            Value::Bool(match evaluate(haystack, ctx) {
                Value::Array(values) => values.contains(&needle),
                Value::String(text) => needle.as_str().is_some_and(|n| text.contains(n)),
                _ => false,
            })
        }
        "==" | "!=" | "<" | "<=" | ">" | ">=" => {
            let [lhs, rhs] = args else {
                return Value::Null;
            };
            let ordering = compare(&evaluate(lhs, ctx), &evaluate(rhs, ctx));
            Value::Bool(match op.as_str() {
                "==" => ordering == Some(Ordering::Equal),
                "!=" => ordering != Some(Ordering::Equal),
                "<" => ordering == Some(Ordering::Less),
                "<=" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                ">" => ordering == Some(Ordering::Greater),
                _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            })
        }
        "case" => {
            let mut pairs = args.chunks_exact(2);
            for pair in pairs.by_ref() {
                if truthy(&evaluate(&pair[0], ctx)) {
                    return evaluate(&pair[1], ctx);
                }
            }
            pairs
                .remainder()
                .first()
                .map_or(Value::Null, |fallback| evaluate(fallback, ctx))
        }
        "match" => {
            let Some((input, rest)) = args.split_first() else {
                return Value::Null;
            };
            let input = evaluate(input, ctx);
            let mut pairs = rest.chunks_exact(2);
            for pair in pairs.by_ref() {
                if evaluate(&pair[0], ctx) == input {
                    return evaluate(&pair[1], ctx);
                }
            }
            pairs
                .remainder()
                .first()
                .map_or(Value::Null, |fallback| evaluate(fallback, ctx))
        }
        _ => Value::Null,
    }
}

const fn truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
