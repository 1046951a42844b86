//! Imaging log file name.

/// Global imaging order log.
pub struct ImagingPlanFile;

impl ImagingPlanFile {
    pub const NAME: &'static str = "imaging_plan.txt";
}
