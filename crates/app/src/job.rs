use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing_subscriber::filter::LevelFilter;
use voxmorph_core::{
    AttributeStorage, AttributeType, DataArray, ExecutionContext, FilterConfig, ImageGeometry,
    ParallelTaskRunner, ProgressEvent, ProgressSink, RunOutcome, VoxelData,
};

use crate::logging::parse_level;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Job {
    geometry: GeometryRecord,
    #[serde(default)]
    arrays: Vec<ArrayRecord>,
    filter: FilterConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threads: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeometryRecord {
    dims: [usize; 3],
    #[serde(default)]
    origin: [f32; 3],
    #[serde(default = "unit_spacing")]
    spacing: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArrayRecord {
    name: String,
    #[serde(rename = "type")]
    data_type: AttributeType,
    #[serde(default = "single_component")]
    components: usize,
    values: Value,
}

fn unit_spacing() -> [f32; 3] {
    [1.0; 3]
}

fn single_component() -> usize {
    1
}

pub(crate) struct JobArgs {
    pub(crate) job_path: PathBuf,
    pub(crate) out_path: Option<PathBuf>,
    pub(crate) threads: Option<usize>,
    pub(crate) serial: bool,
    pub(crate) log_level: LevelFilter,
    pub(crate) print: bool,
}

pub(crate) fn parse_args(args: &[String]) -> Result<JobArgs, String> {
    let mut job_path = None;
    let mut out_path = None;
    let mut threads = None;
    let mut serial = false;
    let mut log_level = LevelFilter::INFO;
    let mut print = false;
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--out" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--out requires a path".to_string())?;
                out_path = Some(PathBuf::from(value));
            }
            "--threads" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--threads requires a number".to_string())?;
                let count = value
                    .parse::<usize>()
                    .map_err(|err| format!("--threads {value}: {err}"))?;
                threads = Some(count);
            }
            "--serial" => {
                serial = true;
            }
            "--log-level" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--log-level requires a level".to_string())?;
                log_level = parse_level(value)?;
            }
            "--print" => {
                print = true;
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option '{other}'"));
            }
            other => {
                if job_path.replace(PathBuf::from(other)).is_some() {
                    return Err("only one job file can be given".to_string());
                }
            }
        }
    }

    let job_path = job_path.ok_or_else(|| "missing job file (see --help)".to_string())?;
    Ok(JobArgs {
        job_path,
        out_path,
        threads,
        serial,
        log_level,
        print,
    })
}

fn print_help() {
    println!(
        "Usage: voxmorph <job.json> [options]\n  --out <path>\n  --threads <n>\n  --serial\n  --log-level <error|warn|info|debug|trace>\n  --print"
    );
}

pub(crate) fn run(args: &JobArgs) -> Result<(), String> {
    let mut job = load_job(&args.job_path)?;
    let mut data = build_voxel_data(&job)?;
    let ctx = execution_context(args, job.threads)?;
    tracing::info!(
        "job {:?}: {} on {:?} with {} arrays",
        args.job_path,
        job.filter.kind().name(),
        job.geometry.dims,
        job.arrays.len()
    );

    let outcome = job
        .filter
        .run(&mut data, &ctx)
        .map_err(|err| err.to_string())?;
    match outcome {
        RunOutcome::Completed { passes } => tracing::info!("job: completed after {} passes", passes),
        RunOutcome::Cancelled { completed_passes } => {
            tracing::warn!("job: cancelled after {} passes", completed_passes)
        }
    }

    store_arrays(&mut job, &data)?;
    if let Some(path) = args.out_path.as_ref() {
        save_job(&job, path)?;
        tracing::info!("job: wrote {:?}", path);
    }
    if args.print {
        let json = serde_json::to_string_pretty(&job).map_err(|err| err.to_string())?;
        println!("{json}");
    }
    Ok(())
}

fn load_job(path: &Path) -> Result<Job, String> {
    let data = std::fs::read(path).map_err(|err| format!("{path:?}: {err}"))?;
    serde_json::from_slice(&data).map_err(|err| format!("{path:?}: {err}"))
}

fn save_job(job: &Job, path: &Path) -> Result<(), String> {
    let json = serde_json::to_vec_pretty(job).map_err(|err| err.to_string())?;
    std::fs::write(path, json).map_err(|err| format!("{path:?}: {err}"))
}

fn execution_context(args: &JobArgs, job_threads: Option<usize>) -> Result<ExecutionContext, String> {
    let runner = if args.serial {
        ParallelTaskRunner::serial()
    } else {
        match args.threads.or(job_threads) {
            Some(threads) => ParallelTaskRunner::new(threads),
            None => ParallelTaskRunner::with_default_parallelism(),
        }
    }
    .map_err(|err| err.to_string())?;
    Ok(ExecutionContext::with_runner(runner).with_progress(tracing_sink()))
}

fn tracing_sink() -> ProgressSink {
    Arc::new(|event| match event {
        ProgressEvent::Advance { filter, fraction } => {
            tracing::info!("{}: {:.0}%", filter, fraction * 100.0)
        }
        ProgressEvent::Message { filter, text } => tracing::info!("{}: {}", filter, text),
        ProgressEvent::PassStarted { pass } => tracing::debug!("pass {}", pass),
        ProgressEvent::ArrayRemapped { pass, name, copied } => {
            tracing::trace!("pass {}: '{}' copied {} tuples", pass, name, copied)
        }
        ProgressEvent::LabelsRemapped { pass, copied } => {
            tracing::debug!("pass {}: labels copied {} values", pass, copied)
        }
        ProgressEvent::Start { .. } | ProgressEvent::Finish { .. } => {}
    })
}

fn build_voxel_data(job: &Job) -> Result<VoxelData, String> {
    let geometry = ImageGeometry::new(job.geometry.dims)
        .with_origin(job.geometry.origin.into())
        .with_spacing(job.geometry.spacing.into());
    let mut data = VoxelData::new(geometry);
    for record in &job.arrays {
        let storage = storage_from_json(record)?;
        let array = DataArray::new(storage, record.components)
            .map_err(|err| format!("array '{}': {err}", record.name))?;
        if data.insert(record.name.clone(), array).is_some() {
            return Err(format!("array '{}' appears twice", record.name));
        }
    }
    Ok(data)
}

fn storage_from_json(record: &ArrayRecord) -> Result<AttributeStorage, String> {
    fn parse<T: serde::de::DeserializeOwned>(record: &ArrayRecord) -> Result<Vec<T>, String> {
        serde_json::from_value(record.values.clone())
            .map_err(|err| format!("array '{}' ({:?}): {err}", record.name, record.data_type))
    }

    Ok(match record.data_type {
        AttributeType::Bool => AttributeStorage::Bool(parse(record)?),
        AttributeType::Int8 => AttributeStorage::Int8(parse(record)?),
        AttributeType::Int16 => AttributeStorage::Int16(parse(record)?),
        AttributeType::Int32 => AttributeStorage::Int32(parse(record)?),
        AttributeType::Int64 => AttributeStorage::Int64(parse(record)?),
        AttributeType::UInt8 => AttributeStorage::UInt8(parse(record)?),
        AttributeType::UInt16 => AttributeStorage::UInt16(parse(record)?),
        AttributeType::UInt32 => AttributeStorage::UInt32(parse(record)?),
        AttributeType::UInt64 => AttributeStorage::UInt64(parse(record)?),
        AttributeType::Float32 => AttributeStorage::Float32(parse(record)?),
        AttributeType::Float64 => AttributeStorage::Float64(parse(record)?),
        AttributeType::Text => AttributeStorage::Text(parse(record)?),
    })
}

fn storage_to_json(storage: &AttributeStorage) -> Result<Value, serde_json::Error> {
    match storage {
        AttributeStorage::Bool(values) => serde_json::to_value(values),
        AttributeStorage::Int8(values) => serde_json::to_value(values),
        AttributeStorage::Int16(values) => serde_json::to_value(values),
        AttributeStorage::Int32(values) => serde_json::to_value(values),
        AttributeStorage::Int64(values) => serde_json::to_value(values),
        AttributeStorage::UInt8(values) => serde_json::to_value(values),
        AttributeStorage::UInt16(values) => serde_json::to_value(values),
        AttributeStorage::UInt32(values) => serde_json::to_value(values),
        AttributeStorage::UInt64(values) => serde_json::to_value(values),
        AttributeStorage::Float32(values) => serde_json::to_value(values),
        AttributeStorage::Float64(values) => serde_json::to_value(values),
        AttributeStorage::Text(values) => serde_json::to_value(values),
    }
}

fn store_arrays(job: &mut Job, data: &VoxelData) -> Result<(), String> {
    for record in &mut job.arrays {
        let array = data
            .get(&record.name)
            .ok_or_else(|| format!("array '{}' disappeared", record.name))?;
        record.values = storage_to_json(array.storage())
            .map_err(|err| format!("array '{}': {err}", record.name))?;
    }
    Ok(())
}
