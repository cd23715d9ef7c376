//! CLI entry point for ncapi-rs.

use anyhow::{Context, Result};
use ndarray::{ArrayD, IxDyn};
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ncapi_rs::cli::{Cli, Commands};
use ncapi_rs::config::Config;
use ncapi_rs::{global, Device, Graph, LibMvnc, NcApi};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    // Load optional config
    let config = if let Some(config_path) = &cli.config {
        Config::from_yaml_file(config_path)
            .with_context(|| format!("Failed to load config: {}", config_path.display()))?
    } else {
        Config::default()
    };

    // Load the driver
    let library = cli.library.clone().or_else(|| config.driver.library.clone());
    let api: Arc<dyn NcApi> = match &library {
        Some(path) => Arc::new(
            LibMvnc::load_from(path)
                .with_context(|| format!("Failed to load driver: {}", path.display()))?,
        ),
        None => Arc::new(LibMvnc::load().context("Failed to load driver")?),
    };
    if let Some(level) = config.driver.log_level()? {
        global::set_log_level(api.as_ref(), level)?;
    }

    let output = match cli.command {
        Commands::Devices => list_devices(&api, &config)?,
        Commands::Info { index } => device_info(&api, index)?,
        Commands::Infer {
            graph,
            input,
            index,
        } => {
            let blob = fs::read(&graph)
                .with_context(|| format!("Failed to read graph: {}", graph.display()))?;
            let input_json: Value = serde_json::from_str(
                &fs::read_to_string(&input)
                    .with_context(|| format!("Failed to read input: {}", input.display()))?,
            )?;
            infer(&api, &config, index, &blob, &input_json)?
        }
    };

    // Format output
    if cli.format == "pretty" {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", serde_json::to_string(&output)?);
    }

    Ok(())
}

fn list_devices(api: &Arc<dyn NcApi>, config: &Config) -> Result<Value> {
    let enumeration = Device::enumerate(api, config.driver.max_devices);

    let devices: Vec<Value> = enumeration
        .devices
        .iter()
        .map(|device| {
            serde_json::json!({
                "index": device.index(),
                "name": device.name().ok(),
                "state": device.state().map(|s| format!("{:?}", s)).ok(),
            })
        })
        .collect();
    let failures: Vec<Value> = enumeration
        .failures
        .iter()
        .map(|slot| {
            serde_json::json!({
                "index": slot.index,
                "error": slot.error.to_string(),
            })
        })
        .collect();

    enumeration.dispose_all()?;
    Ok(serde_json::json!({
        "api_version": global::api_version(api.as_ref()).ok(),
        "devices": devices,
        "failures": failures,
    }))
}

fn device_info(api: &Arc<dyn NcApi>, index: i32) -> Result<Value> {
    let device = Device::create(Arc::clone(api), index)?;
    device
        .open()
        .with_context(|| format!("Failed to open device {}", index))?;

    let info = serde_json::json!({
        "index": device.index(),
        "name": device.name()?,
        "state": format!("{:?}", device.state()?),
        "hardware_version": format!("{:?}", device.hardware_version()?),
        "firmware_version": device.firmware_version()?,
        "memory_used": device.memory_used()?,
        "memory_size": device.memory_size()?,
        "max_graphs": device.max_graphs()?,
        "max_fifos": device.max_fifos()?,
        "thermal_throttling": format!("{:?}", device.thermal_throttling()?),
        "thermal_stats": device.thermal_stats()?,
    });

    device.dispose()?;
    Ok(info)
}

fn infer(
    api: &Arc<dyn NcApi>,
    config: &Config,
    index: i32,
    blob: &[u8],
    input_json: &Value,
) -> Result<Value> {
    // Parse input tensor from JSON
    // Expected format: { "data": [...], "shape": [...] }, shape optional
    let data: Vec<f32> = input_json["data"]
        .as_array()
        .context("Input must have 'data' array")?
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect();
    let shape: Vec<usize> = match input_json["shape"].as_array() {
        Some(dims) => dims
            .iter()
            .map(|v| v.as_u64().unwrap_or(1) as usize)
            .collect(),
        None => vec![data.len()],
    };
    let input_tensor =
        ArrayD::from_shape_vec(IxDyn(&shape), data).context("Failed to create input tensor")?;

    let device = Device::create(Arc::clone(api), index)?;
    let result = run_graph(api, config, &device, blob, &input_tensor);
    if let Err(e) = device.dispose() {
        warn!("Failed to dispose device {}: {}", index, e);
    }
    result
}

fn run_graph(
    api: &Arc<dyn NcApi>,
    config: &Config,
    device: &Device,
    blob: &[u8],
    input: &ArrayD<f32>,
) -> Result<Value> {
    device.open()?;

    let graph = Graph::create(Arc::clone(api), "ncapi")?;
    graph.allocate_with_fifos(device, blob, &config.fifo.options()?)?;
    let output_fifo = graph.output().context("Graph has no output fifo")?;
    if config.fifo.dont_block {
        output_fifo.set_dont_block(true)?;
    }

    info!("Running inference...");
    let start = Instant::now();
    graph.queue_inference_array(input)?;
    let output = output_fifo.read_array()?;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!("Inference complete in {:.2}ms", latency_ms);

    Ok(serde_json::json!({
        "latency_ms": latency_ms,
        "time_taken": graph.time_taken().ok(),
        "shape": output.shape(),
        "data": output.iter().copied().collect::<Vec<f32>>(),
    }))
}
