use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{OrchestratorError, Result};

/// The names of the supported models.
pub const MODELS: [&str; 3] = ["tcn", "lstm", "mlp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActFnConfig {
    Sigmoid,
    Tanh,
    Relu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationConfig {
    BatchNorm,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MlpOptions {
    pub hidden_size: usize,
    pub max_past_input: usize,
    pub ar: bool,
    pub io_delay: i64,
    pub activation_fn: ActFnConfig,
}

impl Default for MlpOptions {
    fn default() -> Self {
        Self {
            hidden_size: 8,
            max_past_input: 4,
            ar: true,
            io_delay: 0,
            activation_fn: ActFnConfig::Sigmoid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcnOptions {
    pub ksize: usize,
    pub dropout: f32,
    pub n_channels: Vec<usize>,
    pub dilation_sizes: Option<Vec<usize>>,
    pub ar: bool,
    pub io_delay: i64,
    pub normalization: NormalizationConfig,
}

impl Default for TcnOptions {
    fn default() -> Self {
        Self {
            ksize: 3,
            dropout: 0.05,
            n_channels: vec![50, 50, 50, 50],
            dilation_sizes: None,
            ar: true,
            io_delay: 0,
            normalization: NormalizationConfig::BatchNorm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LstmOptions {
    pub hidden_size: usize,
    pub ar: bool,
    pub io_delay: i64,
    pub num_layers: usize,
    pub dropout: f32,
}

impl Default for LstmOptions {
    fn default() -> Self {
        Self {
            hidden_size: 128,
            ar: true,
            io_delay: 0,
            num_layers: 1,
            dropout: 0.,
        }
    }
}

/// The model of a run along with its options.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelConfig {
    Tcn(TcnOptions),
    Lstm(LstmOptions),
    Mlp(MlpOptions),
}

impl ModelConfig {
    /// Parses the options of the model called `name`.
    ///
    /// # Arguments
    /// * `name` - One of `MODELS`.
    /// * `options` - The cleaned `model_options` group.
    pub fn from_parts(name: &str, options: Value) -> Result<Self> {
        let what = "model_options";
        let config = match name {
            "tcn" => Self::Tcn(serde_json::from_value(options).map_err(OrchestratorError::json(what))?),
            "lstm" => Self::Lstm(serde_json::from_value(options).map_err(OrchestratorError::json(what))?),
            "mlp" => Self::Mlp(serde_json::from_value(options).map_err(OrchestratorError::json(what))?),
            other => return Err(OrchestratorError::UnknownModel(other.to_string())),
        };

        Ok(config)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tcn(_) => "tcn",
            Self::Lstm(_) => "lstm",
            Self::Mlp(_) => "mlp",
        }
    }

    pub fn ar(&self) -> bool {
        match self {
            Self::Tcn(o) => o.ar,
            Self::Lstm(o) => o.ar,
            Self::Mlp(o) => o.ar,
        }
    }

    pub fn io_delay(&self) -> i64 {
        match self {
            Self::Tcn(o) => o.io_delay,
            Self::Lstm(o) => o.io_delay,
            Self::Mlp(o) => o.io_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn tcn_normalization_must_be_known() {
        let mut options = serde_json::to_value(TcnOptions::default()).unwrap();
        options["normalization"] = json!("none");
        let ModelConfig::Tcn(tcn) = ModelConfig::from_parts("tcn", options.clone()).unwrap() else {
            panic!("expected a tcn");
        };
        assert_eq!(tcn.normalization, NormalizationConfig::None);

        options["normalization"] = json!("layer_norm");
        assert!(ModelConfig::from_parts("tcn", options).is_err());
    }

    #[test]
    fn unknown_models_are_rejected() {
        let err = ModelConfig::from_parts("gru", json!({})).unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownModel(name) if name == "gru"));
    }
}
