//! The epoch loop.

use crate::{
    common::*,
    config::Config,
    data::{DataLoader, DetectionDataset, Phase},
    evaluation::{self, Evaluator, MERGED_DETECTIONS_FILE},
    logging::{format_losses, ScalarLogger},
    model::{loss_values, DetectionModel, TOTAL_LOSS_KEY},
    utils::{self, LrScheduler, RateCounter, RunDirs, TrainingState},
};

/// What happened in one epoch.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub epoch: usize,
    pub lr: f64,
    /// Losses averaged over samples, per phase.
    pub losses: IndexMap<Phase, IndexMap<String, f64>>,
    /// Evaluation metrics, if evaluation ran and anything was detected.
    pub metrics: Option<IndexMap<String, f64>>,
    /// Whether the validation loss improved and the checkpoint was replaced.
    pub improved: bool,
}

/// Trains a model with chained train and validation phases per epoch.
///
/// Outputs go to `<out_dir>/<version>/{logs,weights,interim}`. The single
/// checkpoint `weights/latest.ckpt` holds the parameters with the lowest
/// validation loss so far.
pub struct Trainer<M>
where
    M: DetectionModel,
{
    config: Config,
    dirs: RunDirs,
    vs: nn::VarStore,
    model: M,
    optimizer: nn::Optimizer,
    scheduler: LrScheduler,
    train_loader: DataLoader,
    val_loader: DataLoader,
    evaluator: Box<dyn Evaluator>,
    logger: ScalarLogger,
    rng: StdRng,
    initial_epoch: usize,
    min_val_loss: Option<f64>,
}

impl<M> Trainer<M>
where
    M: DetectionModel,
{
    pub fn new(config: Config, evaluator: Box<dyn Evaluator>) -> Result<Self> {
        let runtime = &config.runtime;
        ensure!(runtime.eval_interval > 0, "eval_interval must be positive");

        // prepare dirs and save config
        let dirs = RunDirs::new(&config.run_dir());
        dirs.prepare(runtime.resume)?;
        {
            let path = config.run_dir().join("config.json");
            let text = serde_json::to_string_pretty(&config)?;
            fs::write(&path, text)?;
        }

        let mut rng = match runtime.seed {
            Some(seed) => {
                tch::manual_seed(seed as i64);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        // load datasets
        info!("loading dataset");
        let train_loader = {
            let pipeline = Pipeline::new(
                &config.data.train_pipeline,
                config.data.bbox_fmt,
                &mut rng,
            )
            .context("invalid train pipeline")?;
            let dataset = DetectionDataset::open(&config.data.data_dir, Phase::Train, pipeline)?;
            DataLoader::new(dataset, runtime.batch_size.get(), true)?
        };
        let val_loader = {
            let pipeline =
                Pipeline::new(&config.data.val_pipeline, config.data.bbox_fmt, &mut rng)
                    .context("invalid val pipeline")?;
            let dataset = DetectionDataset::open(&config.data.data_dir, Phase::Val, pipeline)?;
            DataLoader::new(dataset, runtime.batch_size.get(), false)?
        };
        for loader in [&train_loader, &val_loader] {
            let dataset = loader.dataset();
            ensure!(!dataset.is_empty(), "the {} dataset is empty", dataset.phase());
            ensure!(
                dataset.num_classes() == config.model.num_classes.get(),
                "the model has {} classes, but the {} dataset has {}",
                config.model.num_classes,
                dataset.phase(),
                dataset.num_classes()
            );
        }

        // init model
        info!("initializing model");
        let mut vs = nn::VarStore::new(runtime.device);
        let model = M::build(&vs.root(), &config.model)?;

        // resume
        let (initial_epoch, min_val_loss) = if runtime.resume {
            utils::try_load_checkpoint(&mut vs, &dirs)?;
            match TrainingState::load(&dirs.weights)? {
                Some(state) => {
                    info!("resume after epoch {}", state.epoch);
                    (state.epoch + 1, state.min_val_loss)
                }
                None => (1, None),
            }
        } else {
            (1, None)
        };

        let optimizer = config.optimizer.build(&vs)?;
        let scheduler = LrScheduler::new(&config.scheduler, config.optimizer.lr())?;
        let logger = ScalarLogger::new(&dirs.logs)?;

        let trainer = Self {
            config,
            dirs,
            vs,
            model,
            optimizer,
            scheduler,
            train_loader,
            val_loader,
            evaluator,
            logger,
            rng,
            initial_epoch,
            min_val_loss,
        };
        trainer.print_banner();

        Ok(trainer)
    }

    pub fn initial_epoch(&self) -> usize {
        self.initial_epoch
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Train until the configured number of epochs is reached.
    pub fn run(&mut self) -> Result<Vec<EpochSummary>> {
        let epochs = self.config.runtime.epochs;
        if self.initial_epoch > epochs {
            info!("all {} epochs are already finished", epochs);
            return Ok(vec![]);
        }

        (self.initial_epoch..=epochs)
            .map(|epoch| self.run_epoch(epoch))
            .collect()
    }

    fn run_epoch(&mut self, epoch: usize) -> Result<EpochSummary> {
        let _span = info_span!("epoch", epoch).entered();

        let lr = self.scheduler.lr(epoch);
        self.optimizer.set_lr(lr);

        let detection_dir = if epoch % self.config.runtime.eval_interval == 0 {
            let dir = self.dirs.interim.join(format!("epoch_{:04}", epoch));
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
            fs::create_dir_all(&dir)?;
            Some(dir)
        } else {
            None
        };

        let mut losses = IndexMap::new();
        for phase in Phase::ALL {
            let phase_losses = self.run_phase(epoch, phase, detection_dir.as_deref())?;
            losses.insert(phase, phase_losses);
        }

        let metrics = match &detection_dir {
            Some(dir) => self.evaluate(dir)?,
            None => None,
        };

        // write logs
        for (&phase, phase_losses) in &losses {
            self.logger.log_losses(epoch, phase, phase_losses)?;
        }
        self.logger.log_learning_rates(epoch, &[lr])?;
        if let Some(metrics) = &metrics {
            self.logger.log_metrics(epoch, metrics)?;
        }
        self.logger.flush()?;

        info!(
            "epoch {}  loss     : {}",
            epoch,
            format_losses(&losses[&Phase::Train], TOTAL_LOSS_KEY)
        );
        info!(
            "epoch {}  val_loss : {}",
            epoch,
            format_losses(&losses[&Phase::Val], TOTAL_LOSS_KEY)
        );

        // keep the best weights
        let val_loss = losses[&Phase::Val][TOTAL_LOSS_KEY];
        let improved = self.min_val_loss.map_or(true, |min| val_loss < min);
        if improved {
            let path = utils::save_checkpoint(&self.vs, &self.dirs)?;
            info!("val_loss improved to {:.4}, saved {}", val_loss, path.display());
            self.min_val_loss = Some(val_loss);
        }
        TrainingState::new(epoch, self.min_val_loss).save(&self.dirs.weights)?;

        Ok(EpochSummary {
            epoch,
            lr,
            losses,
            metrics,
            improved,
        })
    }

    /// Run one pass over a phase's data and return sample-averaged losses.
    ///
    /// In the validation phase, detections are written to `detection_dir` if given.
    fn run_phase(
        &mut self,
        epoch: usize,
        phase: Phase,
        detection_dir: Option<&Path>,
    ) -> Result<IndexMap<String, f64>> {
        let Self {
            config,
            vs,
            model,
            optimizer,
            train_loader,
            val_loader,
            rng,
            ..
        } = self;
        let device = vs.device();
        let loader: &DataLoader = match phase {
            Phase::Train => train_loader,
            Phase::Val => val_loader,
        };
        let num_batches = loader.num_batches();

        let mut sums: IndexMap<String, f64> = IndexMap::new();
        let mut count = 0;
        let mut rate_counter = RateCounter::with_second_interval();

        for (index, batch) in loader.iter(rng).enumerate() {
            let batch = batch?;
            let images = batch.images.to_device(device);
            let batch_size = batch.len();

            let values = match phase {
                Phase::Train => {
                    let output = model.forward_t(&images, true)?;
                    let losses = model.loss(&output, &batch.boxes, &batch.labels)?;
                    let values = loss_values(&losses)?;
                    optimizer.backward_step(&losses[TOTAL_LOSS_KEY]);
                    values
                }
                Phase::Val => tch::no_grad(|| -> Result<_> {
                    let output = model.forward_t(&images, false)?;
                    let losses = model.loss(&output, &batch.boxes, &batch.labels)?;

                    if let Some(dir) = detection_dir {
                        let (_b, _c, height, width) = images.size4()?;
                        let input_size = Size::from_hw([height as f64, width as f64]);
                        let predictions =
                            model.detect(&output, &batch.metas, &config.predictor)?;
                        let detections = evaluation::to_detections(
                            &predictions,
                            &batch.metas,
                            &input_size,
                            loader.dataset(),
                        )?;
                        if !detections.is_empty() {
                            let path = dir.join(format!("batch_{:05}.json", index));
                            evaluation::save_detections(&path, &detections)?;
                        }
                    }

                    loss_values(&losses)
                })?,
            };

            for (kind, value) in values {
                *sums.entry(kind).or_insert(0.0) += value * batch_size as f64;
            }
            count += batch_size;

            rate_counter.add(1.0);
            if let Some(batch_rate) = rate_counter.rate() {
                info!(
                    "epoch: {}\t{}: {}/{}\t{:.2} batches/s",
                    epoch,
                    phase,
                    index + 1,
                    num_batches,
                    batch_rate
                );
            }
        }

        ensure!(count > 0, "no {} samples were processed", phase);
        let averages = sums
            .into_iter()
            .map(|(kind, sum)| (kind, sum / count as f64))
            .collect();
        Ok(averages)
    }

    /// Merge the epoch's detections and score them.
    fn evaluate(&mut self, detection_dir: &Path) -> Result<Option<IndexMap<String, f64>>> {
        let detections = evaluation::merge_detections(detection_dir)?;
        if detections.is_empty() {
            info!("no object detected, skip evaluation");
            return Ok(None);
        }

        let merged_path = self.dirs.interim.join(MERGED_DETECTIONS_FILE);
        evaluation::save_detections(&merged_path, &detections)?;

        if let Some(pred_path) = &self.config.evaluator.pred_path {
            if let Some(parent) = pred_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&merged_path, pred_path)?;
        }

        let metrics = self
            .evaluator
            .evaluate(&self.config.annotation_path(), &merged_path)
            .context("evaluation failed")?;
        for (name, value) in &metrics {
            info!("{} = {:.4}", name, value);
        }

        Ok(Some(metrics))
    }

    fn print_banner(&self) {
        let Config {
            data,
            model,
            optimizer,
            runtime,
            ..
        } = &self.config;
        let train = self.train_loader.dataset();
        let val = self.val_loader.dataset();

        info!("training start");
        info!("[CONFIG]");
        info!("- version    : {}", runtime.version);
        info!("- batch_size : {}", runtime.batch_size);
        info!("- epochs     : {}", runtime.epochs);
        info!("- out_dir    : {}", runtime.out_dir.display());
        info!("[RUNTIME]");
        info!("- {:?}", runtime.device);
        info!("[DATASET]");
        info!("- {}", data.data_dir.display());
        info!("- {} train / {} val images", train.len(), val.len());
        info!("- train steps: {}", train.pipeline().geometric_steps().join(", "));
        info!("[MODEL]");
        info!("- {} ({} classes)", model.kind, model.num_classes);
        info!(
            "- {} parameters",
            self.vs
                .trainable_variables()
                .iter()
                .map(|var| var.numel())
                .sum::<usize>()
        );
        info!("[OPTIMIZER]");
        info!("- {:?}", optimizer);
        info!("[SCHEDULER]");
        info!("- {}", self.scheduler.describe());
    }
}
