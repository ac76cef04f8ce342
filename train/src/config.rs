//! Training program configuration format.

use crate::common::*;

pub use data::*;
pub use model::*;
pub use optimizer::*;
pub use runtime::*;

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }

    /// The run directory `<out_dir>/<version>`.
    pub fn run_dir(&self) -> PathBuf {
        self.runtime.out_dir.join(&self.runtime.version)
    }

    /// The ground truth annotation file used for evaluation.
    pub fn annotation_path(&self) -> PathBuf {
        self.evaluator.anno_path.clone().unwrap_or_else(|| {
            self.data
                .data_dir
                .join("annotations")
                .join("instances_val.json")
        })
    }
}

mod data {
    use super::*;

    /// Dataset and augmentation options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DataConfig {
        /// The directory containing `annotations/` and `images/`.
        pub data_dir: PathBuf,
        /// The box format shared by the pipelines, the loss and the detector.
        pub bbox_fmt: BoxFormat,
        pub train_pipeline: PipelineConfig,
        pub val_pipeline: PipelineConfig,
    }
}

mod model {
    use super::*;

    /// The model configuration.
    ///
    /// Options other than `type` and `num_classes` are kept verbatim for the
    /// model implementation to interpret.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ModelConfig {
        #[serde(rename = "type", alias = "kind")]
        pub kind: String,
        pub num_classes: NonZeroUsize,
        #[serde(flatten)]
        pub params: serde_json::Map<String, serde_json::Value>,
    }

    impl ModelConfig {
        /// Deserialize the extra options into a typed structure.
        pub fn parse_params<T>(&self) -> Result<T>
        where
            T: DeserializeOwned,
        {
            let value = serde_json::Value::Object(self.params.clone());
            serde_json::from_value(value)
                .with_context(|| format!("invalid options for model '{}'", self.kind))
        }
    }

    /// Prediction thresholds used by the detector.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PredictorConfig {
        pub conf_thresh: R64,
        pub iou_thresh: R64,
    }

    impl Default for PredictorConfig {
        fn default() -> Self {
            Self {
                conf_thresh: r64(0.4),
                iou_thresh: r64(0.45),
            }
        }
    }

    /// Evaluation file locations.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct EvaluatorConfig {
        /// The ground truth annotation file. Defaults to
        /// `<data_dir>/annotations/instances_val.json`.
        pub anno_path: Option<PathBuf>,
        /// If set, merged detections are also copied here after each evaluation.
        pub pred_path: Option<PathBuf>,
    }
}

mod optimizer {
    use super::*;

    /// The optimizer and its hyper-parameters.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum OptimizerConfig {
        #[serde(rename = "SGD", alias = "Sgd")]
        Sgd {
            lr: R64,
            #[serde(default = "zero")]
            momentum: R64,
            #[serde(default = "zero")]
            weight_decay: R64,
            #[serde(default)]
            nesterov: bool,
        },
        Adam {
            lr: R64,
            #[serde(default = "default_beta1")]
            beta1: R64,
            #[serde(default = "default_beta2")]
            beta2: R64,
            #[serde(default = "zero")]
            weight_decay: R64,
        },
    }

    impl OptimizerConfig {
        pub fn lr(&self) -> R64 {
            match *self {
                Self::Sgd { lr, .. } => lr,
                Self::Adam { lr, .. } => lr,
            }
        }

        /// Build an optimizer over all variables of a var store.
        pub fn build(&self, vs: &nn::VarStore) -> Result<nn::Optimizer> {
            ensure!(self.lr() > 0.0, "lr must be positive");

            let optimizer = match *self {
                Self::Sgd {
                    lr,
                    momentum,
                    weight_decay,
                    nesterov,
                } => {
                    ensure!(
                        !nesterov || momentum > 0.0,
                        "nesterov momentum requires a positive momentum"
                    );
                    nn::Sgd {
                        momentum: momentum.raw(),
                        wd: weight_decay.raw(),
                        nesterov,
                        ..Default::default()
                    }
                    .build(vs, lr.raw())?
                }
                Self::Adam {
                    lr,
                    beta1,
                    beta2,
                    weight_decay,
                } => nn::Adam {
                    beta1: beta1.raw(),
                    beta2: beta2.raw(),
                    wd: weight_decay.raw(),
                    ..Default::default()
                }
                .build(vs, lr.raw())?,
            };

            Ok(optimizer)
        }
    }

    /// The epoch-based learning rate schedule.
    ///
    /// The warm-up variants ramp the rate linearly from `eta_min` to the base
    /// rate during the first `T_up` epochs before the decay takes over.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum SchedulerConfig {
        #[serde(rename = "ConstantLR")]
        Constant,
        #[serde(rename = "MultiStepLR")]
        MultiStep { milestones: Vec<usize>, gamma: R64 },
        #[serde(rename = "ExponentialLR")]
        Exponential { gamma: R64 },
        #[serde(rename = "MultiStepLRWarmUpRestarts")]
        MultiStepWarmUp {
            milestones: Vec<usize>,
            gamma: R64,
            eta_min: R64,
            #[serde(rename = "T_up")]
            t_up: usize,
        },
        #[serde(rename = "ExponentialLRWarmUpRestarts")]
        ExponentialWarmUp {
            gamma: R64,
            eta_min: R64,
            #[serde(rename = "T_up")]
            t_up: usize,
        },
    }

    impl Default for SchedulerConfig {
        fn default() -> Self {
            Self::Constant
        }
    }

    fn zero() -> R64 {
        r64(0.0)
    }

    fn default_beta1() -> R64 {
        r64(0.9)
    }

    fn default_beta2() -> R64 {
        r64(0.999)
    }
}

mod runtime {
    use super::*;

    /// Run-level options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct RuntimeConfig {
        pub batch_size: NonZeroUsize,
        /// The total number of epochs of the run.
        pub epochs: usize,
        pub out_dir: PathBuf,
        /// The name of the run directory under `out_dir`.
        #[serde(default = "default_version")]
        pub version: String,
        /// Continue an interrupted run instead of starting over.
        #[serde(default)]
        pub resume: bool,
        /// Run detection and evaluation every this many epochs.
        #[serde(default = "default_eval_interval")]
        pub eval_interval: usize,
        /// Seed of the augmentation and shuffling generator.
        #[serde(default)]
        pub seed: Option<u64>,
        #[serde(with = "tch_serde::serde_device", default = "default_device")]
        pub device: Device,
    }

    fn default_version() -> String {
        "default".into()
    }

    fn default_eval_interval() -> usize {
        10
    }

    fn default_device() -> Device {
        Device::cuda_if_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN_CONFIG: &str = r#"{
        // the yolov3 run layout
        data: {
            data_dir: "data/voc",
            bbox_fmt: "xywh",
            train_pipeline: {
                albu: [
                    { type: "ShiftScaleRotate", rotate_limit: 15, scale_limit: [-0.25, 0.0] },
                    { type: "RGBShift" },
                ],
                torch: [
                    { type: "ToTensor" },
                    { type: "GridErasing", min_stride_ratio: 0.1, max_stride_ratio: 0.2 },
                ],
            },
            val_pipeline: {
                albu: [{ type: "Resize", height: 416, width: 416 }],
                torch: [{ type: "ToTensor" }],
            },
        },
        model: { type: "yolov3", num_classes: 20, backborn: "Darknet53", backborn_weight: null },
        optimizer: { type: "SGD", lr: 0.0026, momentum: 0.9, weight_decay: 0.0005 },
        scheduler: { type: "MultiStepLRWarmUpRestarts", milestones: [50, 75], gamma: 0.1, eta_min: 0.0001, T_up: 10 },
        runtime: { batch_size: 2, epochs: 100, out_dir: "result", resume: true, eval_interval: 10, device: "cpu" },
        predictor: { conf_thresh: 0.4, iou_thresh: 0.45 },
    }"#;

    #[test]
    fn parse_run_config() -> Result<()> {
        let config: Config = json5::from_str(RUN_CONFIG)?;

        assert_eq!(config.data.bbox_fmt, BoxFormat::XYWH);
        assert_eq!(config.data.train_pipeline.albu.len(), 2);
        assert_eq!(config.data.val_pipeline.albu[0].name, "Resize");
        assert_eq!(config.model.kind, "yolov3");
        assert_eq!(config.model.num_classes.get(), 20);
        assert_eq!(
            config.model.params.get("backborn"),
            Some(&serde_json::json!("Darknet53"))
        );
        assert_eq!(config.optimizer.lr(), r64(0.0026));
        assert_eq!(
            config.scheduler,
            SchedulerConfig::MultiStepWarmUp {
                milestones: vec![50, 75],
                gamma: r64(0.1),
                eta_min: r64(0.0001),
                t_up: 10,
            }
        );
        assert_eq!(config.runtime.device, Device::Cpu);
        assert_eq!(config.runtime.version, "default");
        assert_eq!(
            config.annotation_path(),
            Path::new("data/voc/annotations/instances_val.json")
        );
        assert_eq!(config.run_dir(), Path::new("result/default"));
        Ok(())
    }

    #[test]
    fn optimizer_defaults() -> Result<()> {
        let config: OptimizerConfig = json5::from_str(r#"{ type: "Adam", lr: 0.001 }"#)?;
        assert_eq!(
            config,
            OptimizerConfig::Adam {
                lr: r64(0.001),
                beta1: r64(0.9),
                beta2: r64(0.999),
                weight_decay: r64(0.0),
            }
        );
        Ok(())
    }
}
