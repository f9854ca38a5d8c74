use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::error::{Result, TezpackError};
use super::model::formula::Formula;

/// The formula records shipped with this build. The set is fixed, so the
/// records are embedded rather than fetched.
const EMBEDDED_FORMULAE: &[&str] = &[
    include_str!("../formulae/tezos-accuser-PtNairob.json"),
    include_str!("../formulae/tezos-dal-node.json"),
    include_str!("../formulae/tezos-smart-rollup-node-PtNairob.json"),
];

pub struct Formulary {
    parsed_cache: Mutex<HashMap<String, Arc<Formula>>>,
}

impl Default for Formulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Formulary {
    pub fn new() -> Self {
        Self {
            parsed_cache: Mutex::new(HashMap::new()),
        }
    }

    fn ensure_parsed(&self) -> Result<()> {
        let mut guard = self.parsed_cache.lock().unwrap();
        if !guard.is_empty() {
            return Ok(());
        }
        for raw in EMBEDDED_FORMULAE {
            let formula: Formula = serde_json::from_str(raw).map_err(|e| {
                TezpackError::Config(format!("Failed to parse embedded formula record: {e}"))
            })?;
            debug!(
                "Parsed embedded formula '{}' version {}",
                formula.name,
                formula.version_str_full()
            );
            guard.insert(formula.name.clone(), Arc::new(formula));
        }
        Ok(())
    }

    pub fn load_formula(&self, name: &str) -> Result<Formula> {
        self.ensure_parsed()?;
        let guard = self.parsed_cache.lock().unwrap();
        match guard.get(name) {
            Some(formula_arc) => {
                debug!("Loaded formula '{}' from formulary.", name);
                Ok(formula_arc.as_ref().clone())
            }
            None => Err(TezpackError::NotFound(format!(
                "Formula '{name}' not found in the formulary."
            ))),
        }
    }

    pub fn formula_names(&self) -> Result<Vec<String>> {
        self.ensure_parsed()?;
        let guard = self.parsed_cache.lock().unwrap();
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
