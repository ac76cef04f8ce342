use anyhow::Result;
use image::{Rgb, RgbImage};
use serde_json::json;
use std::{fs, path::Path};
use tch::{nn, nn::Module, Kind, Tensor};
use train::{
    config::{Config, ModelConfig, PredictorConfig},
    data::Phase,
    evaluation::CocoEvaluator,
    model::{DetectionModel, Losses, Prediction, TOTAL_LOSS_KEY},
    utils::TrainingState,
    Trainer,
};

/// Regresses the number of boxes per image and detects the whole input.
struct CountingModel {
    conv: nn::Conv2D,
    linear: nn::Linear,
}

struct CountingOutput {
    counts: Tensor,
    height: i64,
    width: i64,
}

impl DetectionModel for CountingModel {
    type Output = CountingOutput;

    fn build<'a>(
        path: impl std::borrow::Borrow<nn::Path<'a>>,
        _config: &ModelConfig,
    ) -> Result<Self> {
        let path = path.borrow();
        Ok(Self {
            conv: nn::conv2d(path / "conv", 3, 4, 3, Default::default()),
            linear: nn::linear(path / "linear", 4, 1, Default::default()),
        })
    }

    fn forward_t(&self, images: &Tensor, _train: bool) -> Result<Self::Output> {
        let (_b, _c, height, width) = images.size4()?;
        let counts = self
            .conv
            .forward(images)
            .relu()
            .mean_dim(&[2, 3], false, Kind::Float)
            .apply(&self.linear)
            .view([-1]);
        Ok(CountingOutput {
            counts,
            height,
            width,
        })
    }

    fn loss(
        &self,
        output: &Self::Output,
        boxes: &[Vec<[f64; 4]>],
        labels: &[Vec<i64>],
    ) -> Result<Losses> {
        assert_eq!(boxes.len(), labels.len());
        let targets: Vec<f32> = boxes.iter().map(|boxes| boxes.len() as f32).collect();
        let targets = Tensor::of_slice(&targets).to_device(output.counts.device());
        let loss = output
            .counts
            .mse_loss(&targets, tch::Reduction::Mean);

        let mut losses = Losses::new();
        losses.insert("count".into(), loss.detach());
        losses.insert(TOTAL_LOSS_KEY.into(), loss);
        Ok(losses)
    }

    fn detect(
        &self,
        output: &Self::Output,
        metas: &[augment::ImageMeta],
        predictor: &PredictorConfig,
    ) -> Result<Vec<Prediction>> {
        assert!(predictor.conf_thresh > 0.0);
        let predictions = (0..metas.len())
            .map(|batch_index| Prediction {
                batch_index,
                class: 0,
                bbox: [0.0, 0.0, output.width as f64, output.height as f64],
                score: 0.9,
            })
            .collect();
        Ok(predictions)
    }
}

/// Write a dataset of 32x24 images, each with one box.
fn write_dataset(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir.join("annotations"))?;
    fs::create_dir_all(data_dir.join("images"))?;

    for (phase, num_images) in [("train", 5), ("val", 3)] {
        let mut images = vec![];
        let mut annotations = vec![];

        for index in 0..num_images {
            let id = index + 1;
            let category_id = if index % 2 == 0 { 7 } else { 3 };
            let file_name = format!("{}_{}.png", phase, id);
            let image =
                RgbImage::from_fn(32, 24, |x, y| Rgb([(x * 8) as u8, (y * 10) as u8, 128]));
            image.save(data_dir.join("images").join(&file_name))?;

            images.push(json!({"id": id, "file_name": file_name, "height": 24, "width": 32}));
            annotations.push(json!({
                "id": id,
                "image_id": id,
                "category_id": category_id,
                "bbox": [4.0, 4.0, 12.0, 10.0],
                "iscrowd": 0,
            }));
        }

        let instances = json!({
            "images": images,
            "annotations": annotations,
            "categories": [{"id": 3, "name": "cat"}, {"id": 7, "name": "dog"}],
        });
        fs::write(
            data_dir
                .join("annotations")
                .join(format!("instances_{}.json", phase)),
            serde_json::to_string(&instances)?,
        )?;
    }

    Ok(())
}

fn run_config(
    data_dir: &Path,
    out_dir: &Path,
    epochs: usize,
    resume: bool,
    num_classes: usize,
) -> Result<Config> {
    let text = format!(
        r#"{{
            data: {{
                data_dir: "{data_dir}",
                bbox_fmt: "cxcywh",
                train_pipeline: {{
                    albu: [{{ type: "HorizontalFlip" }}, {{ type: "RGBShift" }}],
                    torch: [
                        {{ type: "ToTensor" }},
                        {{ type: "Normalize", mean: [0.485, 0.456, 0.406], std: [0.229, 0.224, 0.225] }},
                        {{ type: "Dropout", p: [0.0, 0.05] }},
                    ],
                }},
                val_pipeline: {{
                    albu: [{{ type: "Resize", height: 16, width: 16 }}],
                    torch: [{{ type: "ToTensor" }}],
                }},
            }},
            model: {{ type: "counting", num_classes: {num_classes} }},
            optimizer: {{ type: "SGD", lr: 0.01, momentum: 0.9, weight_decay: 0.0005 }},
            scheduler: {{ type: "MultiStepLR", milestones: [2], gamma: 0.1 }},
            runtime: {{
                batch_size: 2,
                epochs: {epochs},
                out_dir: "{out_dir}",
                version: "counting",
                resume: {resume},
                eval_interval: 2,
                seed: 0,
                device: "cpu",
            }},
        }}"#,
        data_dir = data_dir.display(),
        out_dir = out_dir.display(),
        epochs = epochs,
        resume = resume,
        num_classes = num_classes,
    );
    Ok(json5::from_str(&text)?)
}

#[test]
fn train_evaluate_and_resume() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let data_dir = dir.path().join("data");
    let out_dir = dir.path().join("result");
    write_dataset(&data_dir)?;

    let run_dir = out_dir.join("counting");
    let weights_dir = run_dir.join("weights");

    // fresh run
    {
        let config = run_config(&data_dir, &out_dir, 2, false, 2)?;
        let mut trainer =
            Trainer::<CountingModel>::new(config, Box::new(CocoEvaluator::default()))?;
        assert_eq!(trainer.initial_epoch(), 1);

        let summaries = trainer.run()?;
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].improved);
        assert!(summaries[0].metrics.is_none());

        for summary in &summaries {
            for phase in [Phase::Train, Phase::Val] {
                let losses = &summary.losses[&phase];
                assert!(losses[TOTAL_LOSS_KEY].is_finite());
                assert!(losses.contains_key("count"));
            }
        }
        assert!((summaries[0].lr - 0.01).abs() < 1e-12);
        assert!((summaries[1].lr - 0.01).abs() < 1e-12);

        // the whole-image boxes never reach the 0.5 IoU threshold
        let metrics = summaries[1].metrics.as_ref().expect("evaluation must run");
        assert_eq!(metrics["AP50"], 0.0);
    }

    assert!(weights_dir.join("latest.ckpt").is_file());
    assert!(run_dir.join("interim").join("instances_val.json").is_file());
    assert_eq!(fs::read_dir(run_dir.join("logs"))?.count(), 1);
    let state = TrainingState::load(&weights_dir)?.expect("state must be saved");
    assert_eq!(state.epoch, 2);
    assert!(state.min_val_loss.is_some());

    // the merged detections are mapped back to the original image size
    let detections: Vec<train::evaluation::Detection> = serde_json::from_str(&fs::read_to_string(
        run_dir.join("interim").join("instances_val.json"),
    )?)?;
    assert_eq!(detections.len(), 3);
    assert!(detections
        .iter()
        .all(|det| det.bbox == [0.0, 0.0, 32.0, 24.0] && det.category_id == 3));

    // resumed run continues from the recorded epoch
    {
        let config = run_config(&data_dir, &out_dir, 3, true, 2)?;
        let mut trainer =
            Trainer::<CountingModel>::new(config, Box::new(CocoEvaluator::default()))?;
        assert_eq!(trainer.initial_epoch(), 3);

        let summaries = trainer.run()?;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].epoch, 3);
        assert!((summaries[0].lr - 0.001).abs() < 1e-12);
    }
    assert_eq!(TrainingState::load(&weights_dir)?.map(|state| state.epoch), Some(3));

    // a fresh run starts over
    {
        let config = run_config(&data_dir, &out_dir, 1, false, 2)?;
        let trainer = Trainer::<CountingModel>::new(config, Box::new(CocoEvaluator::default()))?;
        assert_eq!(trainer.initial_epoch(), 1);
    }
    assert!(!weights_dir.join("latest.ckpt").exists());
    assert!(!run_dir.join("interim").join("instances_val.json").exists());

    Ok(())
}

#[test]
fn class_count_mismatch_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let data_dir = dir.path().join("data");
    write_dataset(&data_dir)?;

    let config = run_config(&data_dir, &dir.path().join("result"), 1, false, 5)?;
    let result = Trainer::<CountingModel>::new(config, Box::new(CocoEvaluator::default()));
    assert!(result.is_err());
    Ok(())
}
