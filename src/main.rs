use std::process::ExitCode;

use weekly_demand_service::config::Config;
use weekly_demand_service::logging::{self, Stage};
use weekly_demand_service::pipeline;
use weekly_demand_service::sink::UploadError;
use weekly_demand_service::verify;

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    println!("🌾 Weekly demand service");
    println!("   Input:     {}", config.input.path.display());
    println!("   Output:    {}", config.output.csv_path.display());
    println!("   Scale:     {}", config.output.scale);
    println!("   Amplitude: {}", config.redistribution.amplitude);
    if config.upload.enabled {
        println!("   Upload:    {:?} -> {}", config.upload.backend, config.upload.table);
    }
    println!();

    // Errors are logged by the pipeline itself
    let summary = match pipeline::run(&config) {
        Ok(summary) => summary,
        Err(_) => return ExitCode::FAILURE,
    };

    verify::print_summary(&summary.validation);
    println!(
        "\nGenerated {} weekly rows for {} crops from {} monthly rows.",
        summary.weekly.len(),
        summary.crops,
        summary.monthly_rows
    );

    match &summary.upload {
        None => {}
        Some(Ok(report)) => {
            println!("Uploaded {} rows to '{}'.", report.uploaded_records, report.table);
        }
        Some(Err(UploadError::BatchesFailed { report })) => {
            for failure in &report.failures {
                eprintln!(
                    "   ✗ batch {} (ids from {}, {} rows): {}",
                    failure.batch_index, failure.first_id, failure.records, failure.message
                );
            }
        }
        Some(Err(e)) => logging::error(Stage::Upload, None, &e.to_string()),
    }

    if summary.upload_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
