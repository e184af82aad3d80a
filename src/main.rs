//! Command-line front end for the delivery-delay dashboard.

use std::path::PathBuf;
use std::sync::Arc;

use delay_dashboard::config::{self, DashboardConfig};
use delay_dashboard::logging;
use delay_dashboard::model_status::{ModelInfo, ModelStatusCache};
use delay_dashboard::prediction::{PredictionInput, PredictionResult};
use delay_dashboard::service::{DelayService, HttpDelayService};
use delay_dashboard::upload::FileValidator;
use delay_dashboard::{TrainingWorkflowController, WorkflowState, WorkflowUpdate};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Status,
    Train { file: PathBuf, retrain: bool },
    Predict { input: PathBuf },
    Metrics,
}

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    command: Command,
    api_url: Option<String>,
    test_split: Option<f64>,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let mut config = config::load_or_default().map_err(|err| err.to_string())?;
    logging::init(&config.logging);

    if let Some(url) = &options.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(split) = options.test_split {
        config.default_test_split = split;
        config.test_split().map_err(|err| err.to_string())?;
    }
    let service = HttpDelayService::from_config(&config).map_err(|err| err.to_string())?;
    tracing::info!("Using delay service at {}", service.base_url());

    match options.command {
        Command::Status => status(&service),
        Command::Metrics => metrics(&service),
        Command::Train { file, retrain } => train(Arc::new(service), &config, file, retrain),
        Command::Predict { input } => predict(Arc::new(service), &config, input),
    }
}

fn status(service: &HttpDelayService) -> Result<(), String> {
    let health = service.health().map_err(|err| err.operator_message())?;
    println!("service: {} (model loaded: {})", health.status, health.model_loaded);
    let mut cache = ModelStatusCache::new();
    let info = cache.refresh(service).map_err(|err| err.operator_message())?;
    print_model_info(&info);
    Ok(())
}

fn print_model_info(info: &ModelInfo) {
    if !info.is_trained {
        println!("model: not trained");
        return;
    }
    println!("model: version {}", info.version);
    if let Some(date) = &info.training_date {
        println!("trained at: {date}");
    }
    println!(
        "features: {} categorical, {} numerical",
        info.categorical_features.len(),
        info.numerical_features.len()
    );
    if let Some(metrics) = &info.last_metrics {
        println!(
            "last metrics: accuracy {:.2}%, AUC {:.4}",
            metrics.accuracy * 100.0,
            metrics.auc
        );
    }
}

fn metrics(service: &HttpDelayService) -> Result<(), String> {
    let metrics = service.metrics().map_err(|err| err.operator_message())?;
    println!("accuracy: {:.2}%", metrics.accuracy * 100.0);
    println!("auc: {:.4}", metrics.auc);
    println!("train size: {}", metrics.train_size);
    println!("test size: {}", metrics.test_size);
    if let Some(matrix) = metrics.confusion_matrix {
        println!("confusion matrix: {:?}", matrix.0);
    }
    let features = service
        .feature_importance()
        .map_err(|err| err.operator_message())?;
    for entry in features {
        println!("{:<32} {:.4}", entry.feature, entry.importance);
    }
    Ok(())
}

fn train(
    service: Arc<dyn DelayService>,
    config: &DashboardConfig,
    file: PathBuf,
    retrain: bool,
) -> Result<(), String> {
    let mut controller = TrainingWorkflowController::new(service, config);
    if retrain {
        controller
            .load_model_status()
            .map_err(|err| err.operator_message())?;
        for update in controller.wait_for_jobs() {
            if let WorkflowUpdate::ModelStatusFailed(err) = update {
                return Err(err.operator_message());
            }
        }
    }

    let candidate = FileValidator::new(config.max_upload_bytes)
        .read_path(&file)
        .map_err(|err| err.to_string())?;
    controller
        .select_file(candidate)
        .map_err(|err| err.operator_message())?;
    let started = if retrain {
        controller.retrain()
    } else {
        controller.train()
    };
    started.map_err(|err| err.operator_message())?;
    controller.wait_for_jobs();

    for entry in controller.log_entries() {
        println!("{entry}");
    }
    if controller.state() == WorkflowState::Failed {
        let message = controller
            .last_error()
            .map(|err| err.operator_message())
            .unwrap_or_else(|| "training failed".to_string());
        return Err(message);
    }
    Ok(())
}

fn predict(
    service: Arc<dyn DelayService>,
    config: &DashboardConfig,
    input: PathBuf,
) -> Result<(), String> {
    let text = std::fs::read_to_string(&input)
        .map_err(|err| format!("Failed to read {}: {err}", input.display()))?;
    let form: PredictionInput = serde_json::from_str(&text)
        .map_err(|err| format!("Invalid prediction input {}: {err}", input.display()))?;

    let mut controller = TrainingWorkflowController::new(service, config);
    controller
        .load_model_status()
        .map_err(|err| err.operator_message())?;
    for update in controller.wait_for_jobs() {
        if let WorkflowUpdate::ModelStatusFailed(err) = update {
            return Err(err.operator_message());
        }
    }
    controller
        .request_prediction(form)
        .map_err(|err| err.operator_message())?;
    for update in controller.wait_for_jobs() {
        match update {
            WorkflowUpdate::PredictionReady(result) => print_prediction(&result),
            WorkflowUpdate::PredictionFailed(err) => return Err(err.operator_message()),
            _ => {}
        }
    }
    Ok(())
}

fn print_prediction(result: &PredictionResult) {
    println!("delay probability: {}%", result.probability_percent);
    println!("prediction: {}", result.predicted_label.as_str());
    println!(
        "risk: {} ({})",
        result.risk_level.label(),
        result.risk_color.as_str()
    );
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut command_name: Option<String> = None;
    let mut file: Option<PathBuf> = None;
    let mut input: Option<PathBuf> = None;
    let mut api_url: Option<String> = None;
    let mut test_split: Option<f64> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--api-url" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--api-url requires a value".to_string())?;
                api_url = Some(value.clone());
            }
            "--file" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--file requires a value".to_string())?;
                file = Some(PathBuf::from(value));
            }
            "--input" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--input requires a value".to_string())?;
                input = Some(PathBuf::from(value));
            }
            "--test-split" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--test-split requires a value".to_string())?;
                test_split = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --test-split value: {value}"))?,
                );
            }
            other if command_name.is_none() && !other.starts_with('-') => {
                command_name = Some(other.to_string());
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let command = match command_name.as_deref() {
        Some("status") => Command::Status,
        Some("metrics") => Command::Metrics,
        Some(name @ ("train" | "retrain")) => Command::Train {
            file: file.ok_or_else(|| format!("{name} requires --file"))?,
            retrain: name == "retrain",
        },
        Some("predict") => Command::Predict {
            input: input.ok_or_else(|| "predict requires --input".to_string())?,
        },
        Some(other) => return Err(format!("Unknown command: {other}\n\n{}", help_text())),
        None => return Err(help_text()),
    };
    Ok(CliOptions {
        command,
        api_url,
        test_split,
    })
}

fn help_text() -> String {
    [
        "Usage: delay-dashboard <command> [options]",
        "",
        "Commands:",
        "  status                 Service health and model status",
        "  train --file CSV       Train a model from a CSV file",
        "  retrain --file CSV     Retrain the current model",
        "  predict --input JSON   Predict delay risk for one shipment",
        "  metrics                Model metrics and feature importance",
        "",
        "Options:",
        "  --api-url URL          Service base URL (overrides config)",
        "  --test-split RATIO     Test split for training, 0.10 to 0.50",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn parses_train_with_split_and_url() {
        let options = parse_args(args(&[
            "train",
            "--file",
            "entregas.csv",
            "--test-split",
            "0.3",
            "--api-url",
            "http://10.0.0.5:8000",
        ]))
        .unwrap();
        assert_eq!(
            options.command,
            Command::Train {
                file: PathBuf::from("entregas.csv"),
                retrain: false
            }
        );
        assert_eq!(options.test_split, Some(0.3));
        assert_eq!(options.api_url.as_deref(), Some("http://10.0.0.5:8000"));
    }

    #[test]
    fn retrain_and_predict_need_their_inputs() {
        assert!(parse_args(args(&["retrain"])).unwrap_err().contains("--file"));
        assert!(parse_args(args(&["predict"])).unwrap_err().contains("--input"));
        assert_eq!(
            parse_args(args(&["retrain", "--file", "x.csv"])).unwrap().command,
            Command::Train {
                file: PathBuf::from("x.csv"),
                retrain: true
            }
        );
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse_args(args(&["status", "--verbose"])).is_err());
        assert!(parse_args(args(&["deploy"])).is_err());
        assert!(parse_args(Vec::new()).unwrap_err().starts_with("Usage"));
    }
}
