//! COCO-format detection results and their evaluation.

use crate::{
    common::*,
    data::{coco::Instances, DetectionDataset, IMAGE_ID_KEY, ORIG_HEIGHT_KEY, ORIG_WIDTH_KEY},
    model::Prediction,
};

/// The file name of the merged detections of an evaluation.
pub const MERGED_DETECTIONS_FILE: &str = "instances_val.json";

/// One detection in COCO result format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub image_id: u64,
    pub category_id: u64,
    /// `[x, y, w, h]` in pixels of the original image.
    pub bbox: [f64; 4],
    pub score: f64,
}

/// Map predictions on network inputs back to original images.
///
/// Predictions are rescaled from `input_size` to the size recorded in each
/// image's metadata, clipped to the image and dropped if nothing is left.
pub fn to_detections(
    predictions: &[Prediction],
    metas: &[ImageMeta],
    input_size: &Size<f64>,
    dataset: &DetectionDataset,
) -> Result<Vec<Detection>> {
    let meta_int = |meta: &ImageMeta, key: &str| -> Result<i64> {
        meta.get(key)
            .and_then(MetaValue::as_int)
            .ok_or_else(|| format_err!("metadata entry '{}' is missing", key))
    };

    let mut detections = vec![];

    for pred in predictions {
        let meta = metas.get(pred.batch_index).ok_or_else(|| {
            format_err!(
                "prediction refers to image {} of a batch of {}",
                pred.batch_index,
                metas.len()
            )
        })?;
        let image_id = meta_int(meta, IMAGE_ID_KEY)? as u64;
        let orig_size = Size::from_hw([
            meta_int(meta, ORIG_HEIGHT_KEY)? as f64,
            meta_int(meta, ORIG_WIDTH_KEY)? as f64,
        ]);
        let category_id = dataset
            .category_id(pred.class)
            .ok_or_else(|| format_err!("invalid class index {}", pred.class))?;

        let sy = orig_size.h() / input_size.h();
        let sx = orig_size.w() / input_size.w();
        let [x, y, w, h] = pred.bbox;
        let rect = TLBR::try_from_xywh([x * sx, y * sy, w * sx, h * sy])?;
        let rect = match rect.clip_to(&orig_size) {
            Some(rect) => rect,
            None => continue,
        };

        detections.push(Detection {
            image_id,
            category_id,
            bbox: rect.xywh(),
            score: pred.score,
        });
    }

    Ok(detections)
}

pub fn save_detections(path: &Path, detections: &[Detection]) -> Result<()> {
    let writer = BufWriter::new(
        fs::File::create(path).with_context(|| format!("unable to create '{}'", path.display()))?,
    );
    serde_json::to_writer(writer, detections)?;
    Ok(())
}

pub fn load_detections(path: &Path) -> Result<Vec<Detection>> {
    let reader = BufReader::new(
        fs::File::open(path).with_context(|| format!("unable to open '{}'", path.display()))?,
    );
    let detections = serde_json::from_reader(reader)
        .with_context(|| format!("unable to parse '{}'", path.display()))?;
    Ok(detections)
}

/// Concatenate all detection files in a directory in file name order.
pub fn merge_detections(dir: &Path) -> Result<Vec<Detection>> {
    let pattern = format!("{}/*.json", dir.display());
    let paths: Vec<_> = glob::glob(&pattern)?.try_collect()?;

    let mut merged = vec![];
    for path in paths.into_iter().sorted() {
        merged.extend(load_detections(&path)?);
    }
    Ok(merged)
}

/// Scores detections against ground truth annotations.
pub trait Evaluator {
    /// Evaluate a COCO result file against a COCO annotation file and return
    /// named metrics.
    fn evaluate(&self, anno_path: &Path, detections_path: &Path) -> Result<IndexMap<String, f64>>;
}

/// Box average precision in the manner of the COCO benchmark.
///
/// Reports `AP` averaged over IoU thresholds 0.50:0.05:0.95, `AP50` and
/// `AP75`, each averaged over categories that have ground truth. Precision is
/// interpolated at 101 recall points. Crowd annotations neither count as
/// ground truth nor penalize detections that cover them.
#[derive(Debug, Clone)]
pub struct CocoEvaluator {
    pub max_detections: usize,
}

impl Default for CocoEvaluator {
    fn default() -> Self {
        Self {
            max_detections: 100,
        }
    }
}

const NUM_IOU_THRESHOLDS: usize = 10;
const NUM_RECALL_POINTS: usize = 101;

fn iou_threshold(index: usize) -> f64 {
    0.5 + 0.05 * index as f64
}

#[derive(Debug)]
struct Truth {
    rect: TLBR<f64>,
    crowd: bool,
}

#[derive(Debug)]
struct Scored {
    rect: TLBR<f64>,
    score: f64,
}

/// Per-threshold matching outcome of one detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    TruePositive,
    FalsePositive,
    Ignored,
}

impl Evaluator for CocoEvaluator {
    fn evaluate(&self, anno_path: &Path, detections_path: &Path) -> Result<IndexMap<String, f64>> {
        let instances = Instances::open(anno_path)?;
        let detections = load_detections(detections_path)?;
        self.evaluate_instances(&instances, &detections)
    }
}

impl CocoEvaluator {
    pub fn evaluate_instances(
        &self,
        instances: &Instances,
        detections: &[Detection],
    ) -> Result<IndexMap<String, f64>> {
        let image_ids: HashSet<_> = instances.images.iter().map(|img| img.id).collect();

        let mut truths: HashMap<(u64, u64), Vec<Truth>> = HashMap::new();
        for ann in &instances.annotations {
            truths
                .entry((ann.image_id, ann.category_id))
                .or_default()
                .push(Truth {
                    rect: TLBR::try_from_xywh(ann.bbox)?,
                    crowd: ann.iscrowd != 0,
                });
        }

        let mut scored: HashMap<(u64, u64), Vec<Scored>> = HashMap::new();
        for det in detections {
            ensure!(
                image_ids.contains(&det.image_id),
                "detection refers to unknown image id {}",
                det.image_id
            );
            ensure!(det.score.is_finite(), "detection score must be finite");
            scored
                .entry((det.image_id, det.category_id))
                .or_default()
                .push(Scored {
                    rect: TLBR::try_from_xywh(det.bbox)?,
                    score: det.score,
                });
        }

        // average precision per category and threshold
        let mut ap_table: Vec<[f64; NUM_IOU_THRESHOLDS]> = vec![];

        for category_id in instances.category_ids() {
            let num_truths: usize = instances
                .images
                .iter()
                .filter_map(|img| truths.get(&(img.id, category_id)))
                .flatten()
                .filter(|truth| !truth.crowd)
                .count();
            if num_truths == 0 {
                continue;
            }

            // (score, outcome per threshold) of every kept detection
            let mut outcomes: Vec<(f64, [Outcome; NUM_IOU_THRESHOLDS])> = vec![];
            for img in &instances.images {
                let dets = match scored.get_mut(&(img.id, category_id)) {
                    Some(dets) => dets,
                    None => continue,
                };
                dets.sort_by(|lhs, rhs| rhs.score.total_cmp(&lhs.score));
                let dets = &dets[..dets.len().min(self.max_detections)];
                let gts = truths
                    .get(&(img.id, category_id))
                    .map(|gts| gts.as_slice())
                    .unwrap_or(&[]);

                let per_threshold: Vec<Vec<Outcome>> = (0..NUM_IOU_THRESHOLDS)
                    .map(|index| match_image(dets, gts, iou_threshold(index)))
                    .collect();

                for (det_index, det) in dets.iter().enumerate() {
                    let mut row = [Outcome::FalsePositive; NUM_IOU_THRESHOLDS];
                    for (thresh_index, matches) in per_threshold.iter().enumerate() {
                        row[thresh_index] = matches[det_index];
                    }
                    outcomes.push((det.score, row));
                }
            }
            outcomes.sort_by(|lhs, rhs| rhs.0.total_cmp(&lhs.0));

            let mut row = [0.0; NUM_IOU_THRESHOLDS];
            for (thresh_index, ap) in row.iter_mut().enumerate() {
                let outcomes = outcomes.iter().map(|(_, row)| row[thresh_index]);
                *ap = average_precision(outcomes, num_truths);
            }
            ap_table.push(row);
        }

        let mean = |values: Vec<f64>| -> f64 {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let ap = mean(ap_table.iter().flatten().copied().collect());
        let ap50 = mean(ap_table.iter().map(|row| row[0]).collect());
        let ap75 = mean(ap_table.iter().map(|row| row[5]).collect());

        let mut metrics = IndexMap::new();
        metrics.insert("AP".to_string(), ap);
        metrics.insert("AP50".to_string(), ap50);
        metrics.insert("AP75".to_string(), ap75);
        Ok(metrics)
    }
}

/// Greedily match detections, sorted by descending score, to ground truth.
fn match_image(dets: &[Scored], gts: &[Truth], threshold: f64) -> Vec<Outcome> {
    let mut taken = vec![false; gts.len()];

    dets.iter()
        .map(|det| {
            let best = gts
                .iter()
                .enumerate()
                .filter(|(index, truth)| !truth.crowd && !taken[*index])
                .map(|(index, truth)| (index, det.rect.iou_with(&truth.rect, 0.0)))
                .filter(|(_, iou)| *iou >= threshold)
                .max_by(|lhs, rhs| lhs.1.total_cmp(&rhs.1));

            if let Some((index, _)) = best {
                taken[index] = true;
                return Outcome::TruePositive;
            }

            // a detection mostly inside a crowd region is not counted
            let covers_crowd = gts.iter().filter(|truth| truth.crowd).any(|truth| {
                let area = det.rect.area();
                area > 0.0 && det.rect.intersection_area_with(&truth.rect) / area >= threshold
            });

            if covers_crowd {
                Outcome::Ignored
            } else {
                Outcome::FalsePositive
            }
        })
        .collect()
}

/// Interpolated average precision of score-sorted outcomes.
fn average_precision(outcomes: impl Iterator<Item = Outcome>, num_truths: usize) -> f64 {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut recalls = vec![];
    let mut precisions = vec![];

    for outcome in outcomes {
        match outcome {
            Outcome::TruePositive => tp += 1,
            Outcome::FalsePositive => fp += 1,
            Outcome::Ignored => continue,
        }
        recalls.push(tp as f64 / num_truths as f64);
        precisions.push(tp as f64 / (tp + fp) as f64);
    }

    // make precision monotonically non-increasing
    for index in (1..precisions.len()).rev() {
        if precisions[index - 1] < precisions[index] {
            precisions[index - 1] = precisions[index];
        }
    }

    let sum: f64 = (0..NUM_RECALL_POINTS)
        .map(|point| {
            let recall = point as f64 / (NUM_RECALL_POINTS - 1) as f64;
            let index = recalls.partition_point(|&value| value < recall);
            precisions.get(index).copied().unwrap_or(0.0)
        })
        .sum();
    sum / NUM_RECALL_POINTS as f64
}
