//! Model plugins: per-model hyperparameters, graph inputs, and run naming.

pub mod dgcf;
pub mod egcfv2;

/// Identifies a configured model run.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    /// Model family, e.g. `DGCF`.
    pub model: &'static str,
    /// `(shortcut, value)` hyperparameter pairs, in display order.
    pub params: Vec<(&'static str, String)>,
}

impl ModelDescriptor {
    pub fn new(model: &'static str) -> Self {
        Self {
            model,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, shortcut: &'static str, value: impl ToString) -> Self {
        self.params.push((shortcut, value.to_string()));
        self
    }

    /// Run name used for recommendation files:
    /// `MODEL_seed=S_e=E_bs=B_shortcut=value_...`, with `.` written as `$`.
    pub fn name(&self, seed: u64, epochs: usize, batch_size: usize) -> String {
        let base = [
            ("seed", seed.to_string()),
            ("e", epochs.to_string()),
            ("bs", batch_size.to_string()),
        ];
        let base = join_params(base.iter().map(|(k, v)| (*k, v.as_str())));
        let params = join_params(self.params.iter().map(|(k, v)| (*k, v.as_str())));
        format!("{}_{base}_{params}", self.model)
    }
}

fn join_params<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .map(|(k, v)| format!("{k}={}", v.replace('.', "$")))
        .collect::<Vec<_>>()
        .join("_")
}
