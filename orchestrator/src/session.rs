use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use log::{info, warn};
use machine_learning::dynamic::DynamicModel;
use serde::Serialize;
use serde_json::{Map, Value, ser::PrettyFormatter};

use crate::{
    OrchestratorError, Result,
    configs::{OptionLayer, Options, create_full_options, recursive_merge},
    loader::{Loaders, load_dataset},
    logger,
    model_state::ModelState,
    normalizers::compute_normalizers,
    training::{TrainReport, run_train},
};

/// The options a restored model keeps from the run that saved it.
const FROM_CHECKPOINT: [&str; 7] = [
    "model",
    "dataset",
    "optimizer",
    "model_options",
    "dataset_options",
    "normalize",
    "normalize_n_std",
];

/// The file the options of a run are written to, next to its checkpoints.
pub const OPTIONS_FILE: &str = "options.txt";

/// Everything an interactive run assembles.
#[derive(Debug)]
pub struct Session {
    pub model: DynamicModel,
    pub loaders: Loaders,
    pub options: Map<String, Value>,
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// The model was trained.
    Trained(TrainReport),
    /// The model was assembled and handed back untrained.
    Session(Session),
}

/// Returns the directory of a run, `<logdir>/<run_name>`.
///
/// # Arguments
/// * `options` - The options of the run, `logdir` defaults to `log` and `run_name` to
///   `train_<ctime>`.
/// * `ctime` - The time the run started at.
pub fn get_run_path(options: &Map<String, Value>, ctime: &str) -> PathBuf {
    let logdir = options
        .get("logdir")
        .and_then(Value::as_str)
        .unwrap_or("log");

    let run_name = match options.get("run_name").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => format!("train_{ctime}"),
    };

    Path::new(logdir).join(run_name)
}

/// Assembles a run out of `options` and either trains it or hands it back.
///
/// # Arguments
/// * `options` - The options of the run, missing values are taken from the defaults.
/// * `load_model` - A checkpoint to restore. The model, dataset and optimizer options are then
///   taken from the `options.txt` next to it.
/// * `interactive` - Whether to return the assembled `Session` instead of training.
pub fn run(
    options: Map<String, Value>,
    load_model: Option<&Path>,
    interactive: bool,
) -> Result<Outcome> {
    let ctime = ctime();
    let run_path = if interactive {
        None
    } else {
        let run_path = get_run_path(&options, &ctime);
        fs::create_dir_all(&run_path)?;
        logger::set_redirects(&run_path)?;
        Some(run_path)
    };

    let options = match load_model {
        Some(path) => checkpoint_options(options, path)?,
        None => create_full_options(vec![OptionLayer::Inline(options)])?,
    };
    let typed = Options::from_map(&options)?;

    let mut loaders = load_dataset(
        &typed.dataset,
        typed.train.batch_size,
        typed.test.batch_size,
        typed.seed,
    )?;

    let normalizers = if typed.normalize {
        Some(compute_normalizers(
            &mut loaders.train,
            typed.normalize_n_std,
        )?)
    } else {
        None
    };

    let mut state = ModelState::new(
        typed.seed,
        loaders.train.nu(),
        loaders.train.ny(),
        typed.optimizer.optim,
        typed.train.init_lr,
        &typed.model,
        normalizers,
    )?;

    if typed.cuda {
        warn!("cuda isn't supported, running on the cpu");
    }

    let epoch = match load_model {
        Some(path) => state.load_model(path)?,
        None => 0,
    };

    let Some(run_path) = run_path else {
        return Ok(Outcome::Session(Session {
            model: state.model,
            loaders,
            options,
        }));
    };

    info!(ctime = ctime.as_str(); "training starting");
    let text = to_pretty_json(&options)?;
    fs::write(run_path.join(OPTIONS_FILE), &text)?;
    info!("{text}");

    let report = run_train(epoch, &mut state, &run_path, &mut loaders, &typed.train)?;
    Ok(Outcome::Trained(report))
}

/// Rebuilds the options of the run that saved the checkpoint at `path`, keeping the ones of
/// `options` that don't change the model.
fn checkpoint_options(mut options: Map<String, Value>, path: &Path) -> Result<Map<String, Value>> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut ckpt = create_full_options(vec![OptionLayer::File(dir.join(OPTIONS_FILE))])?;

    for key in FROM_CHECKPOINT {
        if let Some(value) = ckpt.get(key) {
            options.insert(key.to_string(), value.clone());
        }
    }

    recursive_merge(&mut ckpt, options, false)?;
    Ok(ckpt)
}

fn to_pretty_json(options: &Map<String, Value>) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    options
        .serialize(&mut ser)
        .map_err(OrchestratorError::json(OPTIONS_FILE))?;

    String::from_utf8(buf).map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))
}

fn ctime() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn run_path_defaults() {
        let path = get_run_path(&map(json!({"logdir": null})), "42");
        assert_eq!(path, Path::new("log").join("train_42"));

        let path = get_run_path(&map(json!({"logdir": "runs", "run_name": "a"})), "42");
        assert_eq!(path, Path::new("runs").join("a"));
    }

    #[test]
    fn options_are_written_with_a_single_space_indent() {
        let text = to_pretty_json(&map(json!({"a": {"b": 1}}))).unwrap();
        assert_eq!(text, "{\n \"a\": {\n  \"b\": 1\n }\n}");
    }
}
