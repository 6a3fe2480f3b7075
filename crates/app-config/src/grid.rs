// In crates/app-config/src/grid.rs

use core_types::StrategyConfig;
use toml::{Table, Value};

use crate::error::{Error, Result};

/// Upper bound on the number of parameter sets a single strategy entry may expand to.
const MAX_COMBINATIONS: usize = 10_000;

/// Expands one strategy entry into one config per point of its parameter grid.
///
/// A parameter written as `{ start = 10, end = 30, step = 10 }` becomes the values
/// `10, 20, 30`; `{ values = [...] }` lists them explicitly. Every other value is
/// fixed. Integer bounds produce integers, anything else produces floats.
pub fn expand_params(config: &StrategyConfig) -> Result<Vec<StrategyConfig>> {
    let Some(params) = config.params.as_table() else {
        return Err(Error::InvalidGrid {
            param: config.name.clone(),
            reason: "`params` must be a table".to_string(),
        });
    };

    let mut keys = Vec::with_capacity(params.len());
    let mut value_lists = Vec::with_capacity(params.len());
    let mut total: usize = 1;
    for (key, value) in params {
        let values = expand_value(key, value)?;
        total = total.saturating_mul(values.len());
        keys.push(key.clone());
        value_lists.push(values);
    }
    if total > MAX_COMBINATIONS {
        return Err(Error::InvalidGrid {
            param: config.name.clone(),
            reason: format!("{total} combinations exceed the limit of {MAX_COMBINATIONS}"),
        });
    }

    // Odometer over the value lists; the last key varies fastest.
    let mut configs = Vec::with_capacity(total);
    let mut indices = vec![0usize; value_lists.len()];
    loop {
        let mut table = Table::new();
        for (i, key) in keys.iter().enumerate() {
            table.insert(key.clone(), value_lists[i][indices[i]].clone());
        }
        configs.push(StrategyConfig {
            name: config.name.clone(),
            params: Value::Table(table),
            fee_rate: config.fee_rate,
            slippage_rate: config.slippage_rate,
        });

        let mut idx = value_lists.len();
        loop {
            if idx == 0 {
                return Ok(configs);
            }
            idx -= 1;
            indices[idx] += 1;
            if indices[idx] < value_lists[idx].len() {
                break;
            }
            indices[idx] = 0;
        }
    }
}

fn expand_value(key: &str, value: &Value) -> Result<Vec<Value>> {
    let Some(table) = value.as_table() else {
        return Ok(vec![value.clone()]);
    };

    if let Some(values) = table.get("values") {
        return match values.as_array() {
            Some(list) if !list.is_empty() => Ok(list.clone()),
            _ => Err(grid_error(key, "`values` must be a non-empty array")),
        };
    }

    let (Some(start), Some(end)) = (table.get("start"), table.get("end")) else {
        return Ok(vec![value.clone()]);
    };
    let step = table.get("step");

    match (start, end, step) {
        (Value::Integer(start), Value::Integer(end), None | Some(Value::Integer(_))) => {
            let step = step.and_then(Value::as_integer).unwrap_or(1);
            if step <= 0 {
                return Err(grid_error(key, "`step` must be positive"));
            }
            if start > end {
                return Err(grid_error(key, "`start` is greater than `end`"));
            }
            Ok((*start..=*end).step_by(step as usize).map(Value::Integer).collect())
        }
        _ => {
            let start = as_number(start).ok_or_else(|| grid_error(key, "`start` must be a number"))?;
            let end = as_number(end).ok_or_else(|| grid_error(key, "`end` must be a number"))?;
            let step = match step {
                Some(v) => as_number(v).ok_or_else(|| grid_error(key, "`step` must be a number"))?,
                None => 1.0,
            };
            if !(step > 0.0) {
                return Err(grid_error(key, "`step` must be positive"));
            }
            if start > end {
                return Err(grid_error(key, "`start` is greater than `end`"));
            }
            let count = ((end - start) / step + 1e-9).floor() as usize + 1;
            if count > MAX_COMBINATIONS {
                return Err(grid_error(key, "too many values"));
            }
            Ok((0..count)
                .map(|i| Value::Float(round_grid(start + step * i as f64)))
                .collect())
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) if f.is_finite() => Some(*f),
        _ => None,
    }
}

// Strip accumulated binary noise, e.g. 0.30000000000000004.
fn round_grid(value: f64) -> f64 {
    (value * 1e9).round() / 1e9
}

fn grid_error(param: &str, reason: &str) -> Error {
    Error::InvalidGrid {
        param: param.to_string(),
        reason: reason.to_string(),
    }
}
