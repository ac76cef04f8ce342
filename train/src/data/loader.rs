use super::DetectionDataset;
use crate::common::*;

/// A collated batch of augmented samples.
#[derive(Debug)]
pub struct Batch {
    /// Images stacked into a `[B, C, H, W]` tensor.
    pub images: Tensor,
    pub metas: Vec<ImageMeta>,
    pub boxes: Vec<Vec<[f64; 4]>>,
    pub labels: Vec<Vec<i64>>,
}

impl Batch {
    /// Stack samples into a batch. All images must have the same shape.
    pub fn collate(samples: Vec<TensorSample>) -> Result<Self> {
        ensure!(!samples.is_empty(), "cannot collate an empty batch");

        let shape = samples[0].image.size();
        let mut images = Vec::with_capacity(samples.len());
        let mut metas = Vec::with_capacity(samples.len());
        let mut boxes = Vec::with_capacity(samples.len());
        let mut labels = Vec::with_capacity(samples.len());

        for sample in samples {
            let TensorSample {
                image,
                meta,
                boxes: sample_boxes,
                labels: sample_labels,
            } = sample;
            ensure!(
                image.size() == shape,
                "images in a batch must have the same shape, but get {:?} and {:?}",
                shape,
                image.size()
            );
            images.push(image);
            metas.push(meta);
            boxes.push(sample_boxes);
            labels.push(sample_labels);
        }

        Ok(Self {
            images: Tensor::stack(&images, 0),
            metas,
            boxes,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}

/// Iterates a dataset in batches, reshuffling on every pass if asked.
#[derive(Debug)]
pub struct DataLoader {
    dataset: DetectionDataset,
    batch_size: usize,
    shuffle: bool,
}

impl DataLoader {
    pub fn new(dataset: DetectionDataset, batch_size: usize, shuffle: bool) -> Result<Self> {
        ensure!(batch_size > 0, "batch_size must be positive");
        Ok(Self {
            dataset,
            batch_size,
            shuffle,
        })
    }

    pub fn dataset(&self) -> &DetectionDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The number of batches per pass. The last batch may be partial.
    pub fn num_batches(&self) -> usize {
        (self.dataset.len() + self.batch_size - 1) / self.batch_size
    }

    /// Start a pass over the dataset.
    ///
    /// `rng` decides the sample order and drives the augmentation.
    pub fn iter<'a>(&'a self, rng: &'a mut StdRng) -> Batches<'a> {
        let mut indices: Vec<_> = (0..self.dataset.len()).collect();
        if self.shuffle {
            indices.shuffle(rng);
        }

        Batches {
            loader: self,
            indices,
            cursor: 0,
            rng,
        }
    }
}

/// The batch iterator returned by [DataLoader::iter].
#[derive(Debug)]
pub struct Batches<'a> {
    loader: &'a DataLoader,
    indices: Vec<usize>,
    cursor: usize,
    rng: &'a mut StdRng,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }

        let end = (self.cursor + self.loader.batch_size).min(self.indices.len());
        let range = self.cursor..end;
        self.cursor = end;

        let dataset = &self.loader.dataset;
        let rng = &mut *self.rng;
        let result = self.indices[range]
            .iter()
            .map(|&index| dataset.get(index, &mut *rng))
            .try_collect::<_, Vec<_>, _>()
            .and_then(Batch::collate);
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.indices.len() - self.cursor;
        let batches = (remaining + self.loader.batch_size - 1) / self.loader.batch_size;
        (batches, Some(batches))
    }
}
