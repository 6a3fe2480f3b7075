// In crates/strategies/src/schema.rs

use core_types::Timeframe;
use toml::Value;

/// The type a strategy parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    /// Integers are accepted and widened.
    Float,
    Bool,
    /// An array of timeframe strings such as `["5m", "15m"]`.
    TimeframeList,
}

/// One declared parameter of a strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    /// Inclusive bounds for numeric kinds.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub required: bool,
}

impl ParamSpec {
    pub const fn integer(name: &'static str, min: i64) -> Self {
        Self { name, kind: ParamKind::Integer, min: Some(min as f64), max: None, required: false }
    }

    pub const fn float(name: &'static str, min: f64, max: Option<f64>) -> Self {
        Self { name, kind: ParamKind::Float, min: Some(min), max, required: false }
    }

    pub const fn flag(name: &'static str) -> Self {
        Self { name, kind: ParamKind::Bool, min: None, max: None, required: false }
    }

    pub const fn timeframes(name: &'static str) -> Self {
        Self { name, kind: ParamKind::TimeframeList, min: None, max: None, required: false }
    }
}

/// Checks a parameter table against a schema.
///
/// Unknown keys, missing required keys, wrong types and out-of-range values are
/// all rejected; the message names the offending parameter.
pub fn check(params: &Value, schema: &[ParamSpec]) -> Result<(), String> {
    let table = params.as_table().ok_or_else(|| "parameters must be a table".to_string())?;

    if let Some(unknown) = table.keys().find(|k| !schema.iter().any(|s| s.name == k.as_str())) {
        let known: Vec<&str> = schema.iter().map(|s| s.name).collect();
        return Err(format!("unknown parameter `{unknown}` (expected one of: {})", known.join(", ")));
    }

    for spec in schema {
        let Some(value) = table.get(spec.name) else {
            if spec.required {
                return Err(format!("missing required parameter `{}`", spec.name));
            }
            continue;
        };

        let number = match (spec.kind, value) {
            (ParamKind::Integer, Value::Integer(i)) => Some(*i as f64),
            (ParamKind::Float, Value::Integer(i)) => Some(*i as f64),
            (ParamKind::Float, Value::Float(f)) if f.is_finite() => Some(*f),
            (ParamKind::Bool, Value::Boolean(_)) => None,
            (ParamKind::TimeframeList, Value::Array(items)) => {
                for item in items {
                    let parsed = item.as_str().map(str::parse::<Timeframe>);
                    if !matches!(parsed, Some(Ok(_))) {
                        return Err(format!("`{}` entry {item} is not a timeframe", spec.name));
                    }
                }
                None
            }
            (kind, other) => {
                return Err(format!("`{}` must be {kind:?}, got {}", spec.name, other.type_str()));
            }
        };

        if let Some(number) = number {
            if spec.min.is_some_and(|min| number < min) || spec.max.is_some_and(|max| number > max) {
                return Err(format!(
                    "`{}` = {number} is outside [{}, {}]",
                    spec.name,
                    spec.min.map_or("-inf".to_string(), |v| v.to_string()),
                    spec.max.map_or("inf".to_string(), |v| v.to_string()),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &[ParamSpec] = &[
        ParamSpec::integer("window", 2),
        ParamSpec::float("threshold", 0.0, Some(10.0)),
        ParamSpec::flag("allow_short"),
        ParamSpec::timeframes("horizons"),
        ParamSpec { required: true, ..ParamSpec::integer("period", 1) },
    ];

    fn params(s: &str) -> Value {
        Value::Table(toml::from_str(s).unwrap())
    }

    #[test]
    fn well_formed_params_pass() {
        let p = params("window = 5\nthreshold = 2\nallow_short = true\nhorizons = [\"5m\", \"1h\"]\nperiod = 3");
        assert_eq!(check(&p, SCHEMA), Ok(()));
    }

    #[test]
    fn violations_name_the_parameter() {
        let cases = [
            ("period = 3\nwindo = 5", "windo"),
            ("window = 5", "period"),
            ("period = 3\nwindow = 1", "window"),
            ("period = 3\nwindow = 2.5", "window"),
            ("period = 3\nthreshold = 11.0", "threshold"),
            ("period = 3\nallow_short = 1", "allow_short"),
            ("period = 3\nhorizons = [\"5x\"]", "horizons"),
        ];
        for (input, param) in cases {
            let err = check(&params(input), SCHEMA).unwrap_err();
            assert!(err.contains(param), "{input:?} -> {err}");
        }
    }
}
