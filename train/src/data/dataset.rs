use super::coco::Instances;
use crate::common::*;

pub const IMAGE_ID_KEY: &str = "image_id";
pub const FILE_NAME_KEY: &str = "file_name";
pub const ORIG_HEIGHT_KEY: &str = "orig_height";
pub const ORIG_WIDTH_KEY: &str = "orig_width";

/// The stage of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Train,
    Val,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Train, Phase::Val];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image and its ground truth, with boxes in the dataset's box format.
#[derive(Debug, Clone)]
pub struct Record {
    pub image_id: u64,
    pub path: PathBuf,
    pub file_name: String,
    pub height: u32,
    pub width: u32,
    pub boxes: Vec<[f64; 4]>,
    pub labels: Vec<i64>,
}

/// A COCO-format detection dataset feeding an augmentation pipeline.
///
/// The directory layout is `annotations/instances_{phase}.json` and
/// `images/{file_name}`. Class indices are the positions of the COCO
/// category ids in ascending order.
#[derive(Debug)]
pub struct DetectionDataset {
    phase: Phase,
    category_ids: Vec<u64>,
    records: Vec<Record>,
    pipeline: Pipeline,
}

impl DetectionDataset {
    pub fn open(data_dir: &Path, phase: Phase, pipeline: Pipeline) -> Result<Self> {
        let anno_path = data_dir
            .join("annotations")
            .join(format!("instances_{}.json", phase));
        let image_dir = data_dir.join("images");
        let instances = Instances::open(&anno_path)?;
        let format = pipeline.box_format();

        let category_ids = instances.category_ids();
        let class_indices: HashMap<u64, i64> = category_ids
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index as i64))
            .collect();
        let mut annotations = instances.annotations_by_image();
        let mut num_skipped = 0;

        let records: Vec<_> = instances
            .images
            .iter()
            .map(|image| -> Result<_> {
                let anns = annotations.remove(&image.id).unwrap_or_default();
                let mut boxes = vec![];
                let mut labels = vec![];

                for ann in anns {
                    let [_x, _y, w, h] = ann.bbox;
                    if ann.iscrowd != 0 || w <= 0.0 || h <= 0.0 {
                        num_skipped += 1;
                        continue;
                    }

                    let rect = BoxFormat::XYWH.decode(ann.bbox)?;
                    boxes.push(format.encode(&rect));
                    labels.push(class_indices[&ann.category_id]);
                }

                Ok(Record {
                    image_id: image.id,
                    path: image_dir.join(&image.file_name),
                    file_name: image.file_name.clone(),
                    height: image.height,
                    width: image.width,
                    boxes,
                    labels,
                })
            })
            .try_collect()?;

        if num_skipped > 0 {
            warn!(
                "skipped {} crowd or empty annotations in '{}'",
                num_skipped,
                anno_path.display()
            );
        }
        info!(
            "loaded {} {} images with {} categories",
            records.len(),
            phase,
            category_ids.len()
        );

        Ok(Self {
            phase,
            category_ids,
            records,
            pipeline,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn num_classes(&self) -> usize {
        self.category_ids.len()
    }

    /// The COCO category id of a class index.
    pub fn category_id(&self, class: i64) -> Option<u64> {
        usize::try_from(class)
            .ok()
            .and_then(|index| self.category_ids.get(index))
            .copied()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load the nth image with its metadata, before augmentation.
    pub fn raw_sample(&self, index: usize) -> Result<Sample> {
        let record = self
            .records
            .get(index)
            .ok_or_else(|| format_err!("index {} out of range", index))?;

        let image = image::open(&record.path)
            .with_context(|| format!("unable to open image '{}'", record.path.display()))?
            .to_rgb8();
        ensure!(
            image.height() == record.height && image.width() == record.width,
            "image '{}' has size {}x{}, but {}x{} is annotated",
            record.path.display(),
            image.height(),
            image.width(),
            record.height,
            record.width
        );

        let meta = ImageMeta::new()
            .with(IMAGE_ID_KEY, record.image_id as i64)?
            .with(FILE_NAME_KEY, record.file_name.as_str())?
            .with(ORIG_HEIGHT_KEY, record.height as i64)?
            .with(ORIG_WIDTH_KEY, record.width as i64)?;

        Ok(Sample {
            image,
            meta,
            boxes: record.boxes.clone(),
            labels: record.labels.clone(),
        })
    }

    /// Load the nth image and pass it through the pipeline.
    pub fn get(&self, index: usize, rng: &mut dyn RngCore) -> Result<TensorSample> {
        let sample = self.raw_sample(index)?;
        self.pipeline
            .forward(rng, sample)
            .with_context(|| format!("augmentation failed on '{}'", self.records[index].file_name))
    }
}
