use crate::{common::*, config::SchedulerConfig};

/// Epoch-based learning rate schedule.
///
/// Epochs count from 1. The rate for an epoch depends on the epoch alone, so
/// a resumed run picks up the same rate it would have had.
#[derive(Debug, Clone)]
pub enum LrScheduler {
    Constant {
        lr: f64,
    },
    MultiStep {
        lr: f64,
        gamma: f64,
        milestones: Vec<usize>,
        warmup: Option<Warmup>,
    },
    Exponential {
        lr: f64,
        gamma: f64,
        warmup: Option<Warmup>,
    },
}

/// Linear ramp from `eta_min` to the base rate over the first `epochs` epochs.
#[derive(Debug, Clone, Copy)]
pub struct Warmup {
    pub eta_min: f64,
    pub epochs: usize,
}

impl LrScheduler {
    pub fn new(config: &SchedulerConfig, base_lr: R64) -> Result<Self> {
        ensure!(base_lr > 0.0, "the lr must be positive");
        let lr = base_lr.raw();

        let check_milestones = |milestones: &[usize]| -> Result<()> {
            ensure!(
                milestones.iter().tuple_windows().all(|(lhs, rhs)| lhs < rhs),
                "the milestones must be strictly increasing"
            );
            Ok(())
        };
        let check_gamma = |gamma: R64| -> Result<()> {
            ensure!(gamma > 0.0, "gamma must be positive");
            Ok(())
        };
        let make_warmup = |eta_min: R64, epochs: usize| -> Result<Option<Warmup>> {
            ensure!(
                eta_min >= 0.0 && eta_min <= base_lr,
                "eta_min must be within [0, lr]"
            );
            Ok((epochs > 0).then(|| Warmup {
                eta_min: eta_min.raw(),
                epochs,
            }))
        };

        let scheduler = match *config {
            SchedulerConfig::Constant => Self::Constant { lr },
            SchedulerConfig::MultiStep {
                ref milestones,
                gamma,
            } => {
                check_milestones(milestones)?;
                check_gamma(gamma)?;
                Self::MultiStep {
                    lr,
                    gamma: gamma.raw(),
                    milestones: milestones.clone(),
                    warmup: None,
                }
            }
            SchedulerConfig::Exponential { gamma } => {
                check_gamma(gamma)?;
                Self::Exponential {
                    lr,
                    gamma: gamma.raw(),
                    warmup: None,
                }
            }
            SchedulerConfig::MultiStepWarmUp {
                ref milestones,
                gamma,
                eta_min,
                t_up,
            } => {
                check_milestones(milestones)?;
                check_gamma(gamma)?;
                Self::MultiStep {
                    lr,
                    gamma: gamma.raw(),
                    milestones: milestones.clone(),
                    warmup: make_warmup(eta_min, t_up)?,
                }
            }
            SchedulerConfig::ExponentialWarmUp {
                gamma,
                eta_min,
                t_up,
            } => {
                check_gamma(gamma)?;
                Self::Exponential {
                    lr,
                    gamma: gamma.raw(),
                    warmup: make_warmup(eta_min, t_up)?,
                }
            }
        };

        Ok(scheduler)
    }

    /// The learning rate used throughout an epoch.
    pub fn lr(&self, epoch: usize) -> f64 {
        // epochs already finished
        let done = epoch.saturating_sub(1);

        let (base, warmup) = match self {
            Self::Constant { lr } => return *lr,
            Self::MultiStep {
                lr,
                gamma,
                milestones,
                warmup,
            } => {
                let passed = milestones.iter().filter(|&&step| step <= done).count();
                (lr * gamma.powi(passed as i32), warmup)
            }
            Self::Exponential { lr, gamma, warmup } => (lr * gamma.powi(done as i32), warmup),
        };

        match warmup {
            Some(Warmup { eta_min, epochs }) if done < *epochs => {
                let ratio = done as f64 / *epochs as f64;
                eta_min + (base - eta_min) * ratio
            }
            _ => base,
        }
    }

    /// A one-line description of the schedule for the run banner.
    pub fn describe(&self) -> String {
        let warmup_text = |warmup: &Option<Warmup>| match warmup {
            Some(Warmup { eta_min, epochs }) => {
                format!("warm-up {:.1e} over {} epc -> ", eta_min, epochs)
            }
            None => String::new(),
        };

        match self {
            Self::Constant { lr } => format!("lr = {:.1e}", lr),
            Self::MultiStep {
                lr,
                gamma,
                milestones,
                warmup,
            } => {
                let steps = milestones
                    .iter()
                    .enumerate()
                    .map(|(index, step)| {
                        format!("{:.1e} ({} epc~)", lr * gamma.powi(index as i32 + 1), step)
                    })
                    .join(" -> ");
                if steps.is_empty() {
                    format!("lr = {}{:.1e}", warmup_text(warmup), lr)
                } else {
                    format!("lr = {}{:.1e} -> {}", warmup_text(warmup), lr, steps)
                }
            }
            Self::Exponential { lr, gamma, warmup } => {
                format!("lr = {}{:.1e} x {} per epoch", warmup_text(warmup), lr, gamma)
            }
        }
    }
}
