mod draw;

use anyhow::{ensure, Context, Result};
use augment::{registry, Pipeline, PipelineConfig, Stage};
use clap::Parser;
use prettytable::{cell, row, Table};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};
use train::{
    config::Config,
    data::{DetectionDataset, Phase},
};

#[derive(Debug, Clone, Parser)]
/// Inspect augmentation pipelines of a run configuration
enum Opts {
    /// Build both pipelines and list their resolved steps
    Check {
        /// configuration file
        config_file: PathBuf,
    },
    /// Write augmented dataset samples with their boxes drawn
    Preview {
        /// configuration file
        config_file: PathBuf,
        /// output directory
        output_dir: PathBuf,
        /// train or val
        #[clap(long, default_value = "train")]
        phase: String,
        /// number of samples to write
        #[clap(long, default_value = "16")]
        num_samples: usize,
        /// random seed
        #[clap(long, default_value = "0")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    match Opts::parse() {
        Opts::Check { config_file } => {
            check(config_file)?;
        }
        Opts::Preview {
            config_file,
            output_dir,
            phase,
            num_samples,
            seed,
        } => {
            let phase = match phase.as_str() {
                "train" => Phase::Train,
                "val" => Phase::Val,
                _ => anyhow::bail!("phase must be 'train' or 'val', but get '{}'", phase),
            };
            preview(config_file, output_dir, phase, num_samples, seed)?;
        }
    }

    Ok(())
}

fn open_config(config_file: &Path) -> Result<Config> {
    Config::open(config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))
}

fn check(config_file: impl AsRef<Path>) -> Result<()> {
    let config = open_config(config_file.as_ref())?;
    let format = config.data.bbox_fmt;
    let mut rng = StdRng::seed_from_u64(0);

    let pipelines = [
        ("train", &config.data.train_pipeline),
        ("val", &config.data.val_pipeline),
    ];
    for (phase, pipeline_config) in pipelines {
        Pipeline::new(pipeline_config, format, &mut rng)
            .with_context(|| format!("invalid {} pipeline", phase))?;
    }

    // print step information
    {
        let mut table = Table::new();
        table.add_row(row!["phase", "stage", "index", "step", "catalog", "params"]);

        for (phase, pipeline_config) in pipelines {
            add_stage_rows(&mut table, phase, Stage::Geometric, pipeline_config);
            add_stage_rows(&mut table, phase, Stage::Tensor, pipeline_config);
        }

        table.printstd();
    }

    println!("box format: {}", format);
    Ok(())
}

fn add_stage_rows(table: &mut Table, phase: &str, stage: Stage, config: &PipelineConfig) {
    let steps = match stage {
        Stage::Geometric => &config.albu,
        Stage::Tensor => &config.torch,
    };

    steps.iter().enumerate().for_each(|(index, step)| {
        let catalog = registry::lookup(stage, &step.name)
            .map(|tier| format!("{:?}", tier))
            .unwrap_or_default();
        let params = serde_json::to_string(&step.params).unwrap_or_default();
        table.add_row(row![phase, stage, index, step.name, catalog, params]);
    });
}

fn preview(
    config_file: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    phase: Phase,
    num_samples: usize,
    seed: u64,
) -> Result<()> {
    let config = open_config(config_file.as_ref())?;
    let output_dir = output_dir.as_ref();
    let mut rng = StdRng::seed_from_u64(seed);

    let pipeline_config = match phase {
        Phase::Train => &config.data.train_pipeline,
        Phase::Val => &config.data.val_pipeline,
    };
    let pipeline = Pipeline::new(pipeline_config, config.data.bbox_fmt, &mut rng)?;
    let dataset = DetectionDataset::open(&config.data.data_dir, phase, pipeline)?;
    ensure!(!dataset.is_empty(), "the {} dataset is empty", phase);

    fs::create_dir_all(output_dir)?;

    for index in 0..num_samples.min(dataset.len()) {
        let sample = dataset.get(index, &mut rng)?;
        let image = sample.meta.denormalize(&sample.image)?;
        let mut canvas = draw::tensor_to_image(&image)?;

        for values in &sample.boxes {
            let rect = config.data.bbox_fmt.decode(*values)?;
            draw::draw_rect(&mut canvas, &rect, draw::BOX_COLOR);
        }

        let stem = Path::new(&dataset.records()[index].file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("sample")
            .to_owned();
        let path = output_dir.join(format!("{:04}_{}.png", index, stem));
        canvas.save(&path)?;
        info!(
            "wrote {} with {} boxes, labels {:?}",
            path.display(),
            sample.boxes.len(),
            sample.labels
        );
    }

    Ok(())
}
