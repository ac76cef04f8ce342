//! Scalar logging to TensorBoard event files.

use crate::{common::*, data::Phase};

/// Writes per-epoch scalars into an event file under the log directory.
pub struct ScalarLogger {
    event_writer: EventWriter<BufWriter<fs::File>>,
}

impl Debug for ScalarLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarLogger").finish()
    }
}

impl ScalarLogger {
    pub fn new(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir)?;
        let event_path_prefix = log_dir
            .join("events")
            .into_os_string()
            .into_string()
            .map_err(|_| format_err!("the log directory must be a valid UTF-8 path"))?;

        let event_writer = EventWriterInit::default().from_prefix(event_path_prefix, None::<&str>)?;
        Ok(Self { event_writer })
    }

    /// Log averaged losses under `{kind}/{phase}`.
    pub fn log_losses(
        &mut self,
        epoch: usize,
        phase: Phase,
        losses: &IndexMap<String, f64>,
    ) -> Result<()> {
        for (kind, &value) in losses {
            self.event_writer
                .write_scalar(format!("{}/{}", kind, phase), epoch as i64, value as f32)?;
        }
        Ok(())
    }

    /// Log learning rates under `lr/lr_{i}` with `i` counting from 1.
    pub fn log_learning_rates(&mut self, epoch: usize, lrs: &[f64]) -> Result<()> {
        for (index, &lr) in lrs.iter().enumerate() {
            self.event_writer
                .write_scalar(format!("lr/lr_{}", index + 1), epoch as i64, lr as f32)?;
        }
        Ok(())
    }

    /// Log evaluation metrics under `eval/{name}`.
    pub fn log_metrics(&mut self, epoch: usize, metrics: &IndexMap<String, f64>) -> Result<()> {
        for (name, &value) in metrics {
            self.event_writer
                .write_scalar(format!("eval/{}", name), epoch as i64, value as f32)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.event_writer.flush()?;
        Ok(())
    }
}

/// Render losses as `total (kind: value, ...)` with the total taken from `key`.
pub fn format_losses(losses: &IndexMap<String, f64>, key: &str) -> String {
    let total = losses
        .get(key)
        .map(|value| format!("{:.4}", value))
        .unwrap_or_else(|| "-".into());
    let others = losses
        .iter()
        .filter(|(kind, _)| kind.as_str() != key)
        .map(|(kind, value)| format!("{}: {:.4}", kind, value))
        .join(", ");
    format!("{} ({})", total, others)
}
