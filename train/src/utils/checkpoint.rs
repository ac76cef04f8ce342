use crate::common::*;

pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";
pub const CHECKPOINT_FILE: &str = "latest.ckpt";
pub const TRAINING_STATE_FILE: &str = "training_state.json";

/// The output directories of a run.
#[derive(Debug, Clone)]
pub struct RunDirs {
    pub logs: PathBuf,
    pub weights: PathBuf,
    pub interim: PathBuf,
}

impl RunDirs {
    pub fn new(run_dir: &Path) -> Self {
        Self {
            logs: run_dir.join("logs"),
            weights: run_dir.join("weights"),
            interim: run_dir.join("interim"),
        }
    }

    /// Create the directories. Unless resuming, existing contents are wiped.
    pub fn prepare(&self, resume: bool) -> Result<()> {
        for dir in [&self.logs, &self.weights, &self.interim] {
            if !resume && dir.exists() {
                fs::remove_dir_all(dir)
                    .with_context(|| format!("unable to remove '{}'", dir.display()))?;
            }
            fs::create_dir_all(dir)
                .with_context(|| format!("unable to create '{}'", dir.display()))?;
        }
        Ok(())
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.weights.join(CHECKPOINT_FILE)
    }
}

/// Progress recorded next to the checkpoint so that a run can be resumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// The last completed epoch, counting from 1.
    pub epoch: usize,
    /// The best validation loss so far.
    pub min_val_loss: Option<f64>,
    pub saved_at: String,
}

impl TrainingState {
    pub fn new(epoch: usize, min_val_loss: Option<f64>) -> Self {
        Self {
            epoch,
            min_val_loss,
            saved_at: Local::now().format(FILE_STRFTIME).to_string(),
        }
    }

    /// Load the state from a weights directory, if one was saved.
    pub fn load(weights_dir: &Path) -> Result<Option<Self>> {
        let path = weights_dir.join(TRAINING_STATE_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path)?;
        let state = serde_json::from_str(&text)
            .with_context(|| format!("unable to parse '{}'", path.display()))?;
        Ok(Some(state))
    }

    pub fn save(&self, weights_dir: &Path) -> Result<()> {
        let path = weights_dir.join(TRAINING_STATE_FILE);
        let text = serde_json::to_string_pretty(self)?;
        fs::write(&path, text)?;
        Ok(())
    }
}

/// Save parameters to the run's single checkpoint file, replacing the previous one.
pub fn save_checkpoint(vs: &nn::VarStore, dirs: &RunDirs) -> Result<PathBuf> {
    let path = dirs.checkpoint_path();
    let tmp_path = dirs.weights.join(format!("{}.tmp", CHECKPOINT_FILE));
    vs.save(&tmp_path)?;
    fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// Load parameters from the run's checkpoint file if it exists.
pub fn try_load_checkpoint(vs: &mut nn::VarStore, dirs: &RunDirs) -> Result<bool> {
    let path = dirs.checkpoint_path();
    if !path.is_file() {
        warn!("no checkpoint file found in '{}'", dirs.weights.display());
        return Ok(false);
    }

    info!("load checkpoint file {}", path.display());
    vs.load(&path)?;
    Ok(true)
}
