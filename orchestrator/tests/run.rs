use std::{fs, path::PathBuf};

use orchestrator::{
    OPTIONS_FILE, Outcome,
    configs::{OptionLayer, create_full_options},
    model_state::{BEST_MODEL, FINAL_MODEL},
    run,
};
use serde_json::{Map, Value, json};

fn map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sysid-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn small_chen_run(logdir: &PathBuf) -> Map<String, Value> {
    let options = json!({
        "logdir": logdir.display().to_string(),
        "run_name": "chen",
        "seed": 3,
        "normalize": true,
        "dataset": "chen",
        "dataset_options": {
            "seq_len": 20,
            "train": {"ntotbatch": 4},
            "valid": {"ntotbatch": 2},
            "test": {"ntotbatch": 2},
        },
        "model": "mlp",
        "model_options": {"hidden_size": 4},
        "train_options": {"epochs": 2, "batch_size": 2, "init_lr": 0.01},
    });

    create_full_options(vec![OptionLayer::Inline(map(options))]).unwrap()
}

#[test]
fn option_file_and_override_select_the_mlp() {
    let dir = temp_dir("options");
    let file = dir.join("options.json");
    fs::write(&file, r#"{"model": "mlp"}"#).unwrap();

    let options = create_full_options(vec![
        OptionLayer::Inline(map(json!({"model_options": {"ar": false}}))),
        OptionLayer::File(file),
    ])
    .unwrap();

    assert_eq!(options["model"], json!("mlp"));
    assert_eq!(options["model_options"]["ar"], json!(false));
    assert_eq!(options["model_options"]["hidden_size"], json!(8));
    assert_eq!(options["model_options"]["max_past_input"], json!(4));
    assert_eq!(options["model_options"]["activation_fn"], json!("sigmoid"));
    assert!(!options.contains_key("mlp_options"));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn interactive_runs_hand_back_the_session() {
    let dir = temp_dir("interactive");
    let Outcome::Session(session) = run(small_chen_run(&dir), None, true).unwrap() else {
        panic!("expected a session");
    };

    assert_eq!(session.model.io().nu, 1);
    assert_eq!(session.model.num_model_inputs(), 2);
    assert_eq!(session.loaders.train.dataset().len(), 4);
    assert_eq!(session.options["model_options"]["hidden_size"], json!(4));
    // nothing is written without training
    assert!(!dir.join("chen").exists());

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn training_writes_the_run_and_can_be_resumed() {
    let dir = temp_dir("train");
    let run_path = dir.join("chen");

    let Outcome::Trained(report) = run(small_chen_run(&dir), None, false).unwrap() else {
        panic!("expected a trained model");
    };
    assert_eq!(report.epoch, 2);
    assert!(report.test_loss_free_run.is_finite());

    for file in [OPTIONS_FILE, BEST_MODEL, FINAL_MODEL, "log.txt"] {
        assert!(run_path.join(file).exists(), "{file} is missing");
    }

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(run_path.join(OPTIONS_FILE)).unwrap()).unwrap();
    assert_eq!(saved["model"], json!("mlp"));

    // the checkpoint options win over the ones of the caller
    let mut options = small_chen_run(&dir);
    options.insert("run_name".into(), json!("resumed"));
    options["model_options"]["hidden_size"] = json!(16);
    options["train_options"]["epochs"] = json!(3);

    let ckpt = run_path.join(FINAL_MODEL);
    let Outcome::Trained(report) = run(options, Some(&ckpt), false).unwrap() else {
        panic!("expected a trained model");
    };
    assert_eq!(report.epoch, 3);

    let resumed: Value = serde_json::from_str(
        &fs::read_to_string(dir.join("resumed").join(OPTIONS_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(resumed["model_options"]["hidden_size"], json!(4));
    assert_eq!(resumed["train_options"]["epochs"], json!(3));

    fs::remove_dir_all(dir).unwrap();
}
