// In crates/core-types/src/strategy.rs

use serde::{Deserialize, Serialize};
use toml::Value;

/// A named strategy plus the parameter set bound to one run.
///
/// Cost fields override the global defaults when present.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    // This will hold the `params = { ... }` table from the TOML
    #[serde(default = "empty_params")]
    pub params: Value,
    #[serde(default)]
    pub fee_rate: Option<f64>,
    #[serde(default)]
    pub slippage_rate: Option<f64>,
}

impl StrategyConfig {
    pub fn new(name: impl Into<String>, params: toml::Table) -> Self {
        Self {
            name: name.into(),
            params: Value::Table(params),
            fee_rate: None,
            slippage_rate: None,
        }
    }

    /// Compact human-readable form, e.g. `crossover{long_window=20, short_window=5}`.
    pub fn label(&self) -> String {
        match self.params.as_table() {
            Some(table) if !table.is_empty() => {
                let params: Vec<String> = table.iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!("{}{{{}}}", self.name, params.join(", "))
            }
            _ => self.name.clone(),
        }
    }
}

fn empty_params() -> Value {
    Value::Table(toml::Table::new())
}
