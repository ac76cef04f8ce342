//! COCO-format instance annotations.

use crate::common::*;

/// The contents of an `instances_*.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instances {
    pub images: Vec<Image>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub file_name: String,
    pub height: u32,
    pub width: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    /// `[x, y, w, h]` in pixels.
    pub bbox: [f64; 4],
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub iscrowd: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub supercategory: Option<String>,
}

impl Instances {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let reader = BufReader::new(
            fs::File::open(path)
                .with_context(|| format!("unable to open '{}'", path.display()))?,
        );
        let instances: Self = serde_json::from_reader(reader)
            .with_context(|| format!("unable to parse '{}'", path.display()))?;
        instances.check()?;
        Ok(instances)
    }

    /// The category ids ordered by id.
    ///
    /// The position of an id in the returned list is its contiguous class index.
    pub fn category_ids(&self) -> Vec<u64> {
        self.categories.iter().map(|cat| cat.id).sorted().collect()
    }

    /// Annotations grouped by image id, in file order.
    pub fn annotations_by_image(&self) -> HashMap<u64, Vec<&Annotation>> {
        self.annotations
            .iter()
            .map(|ann| (ann.image_id, ann))
            .into_group_map()
    }

    fn check(&self) -> Result<()> {
        let image_ids: HashSet<_> = self.images.iter().map(|img| img.id).collect();
        ensure!(
            image_ids.len() == self.images.len(),
            "duplicated image ids found"
        );

        let category_ids: HashSet<_> = self.categories.iter().map(|cat| cat.id).collect();
        ensure!(
            category_ids.len() == self.categories.len(),
            "duplicated category ids found"
        );

        self.annotations.iter().try_for_each(|ann| {
            ensure!(
                image_ids.contains(&ann.image_id),
                "annotation {} refers to unknown image id {}",
                ann.id,
                ann.image_id
            );
            ensure!(
                category_ids.contains(&ann.category_id),
                "annotation {} refers to unknown category id {}",
                ann.id,
                ann.category_id
            );
            Ok(())
        })?;

        Ok(())
    }
}
