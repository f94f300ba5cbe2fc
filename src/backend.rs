//! Execution backend for per-image work.
//!
//! NMS and ground-truth matching treat every image independently. The
//! backend decides whether those per-image jobs run on the calling thread or
//! on the rayon pool; either way results land in per-image slots, so output
//! order never depends on scheduling.

use crate::util::DetPostResult;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Where per-image work runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    /// Run images one after another on the calling thread.
    #[default]
    Sequential,
    /// Run images on the global rayon pool (requires the `rayon` feature).
    Parallel,
}

impl Backend {
    /// Fails if this backend is not compiled in.
    pub fn validate(self) -> DetPostResult<()> {
        match self {
            Backend::Sequential => Ok(()),
            #[cfg(feature = "rayon")]
            Backend::Parallel => Ok(()),
            #[cfg(not(feature = "rayon"))]
            Backend::Parallel => Err(crate::util::DetPostError::BackendUnavailable {
                backend: "parallel",
                feature: "rayon",
            }),
        }
    }

    /// Maps `job` over image indices `0..count`, returning results in index
    /// order. The first error in index order is returned.
    pub(crate) fn map_images<T, F>(self, count: usize, job: F) -> DetPostResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> DetPostResult<T> + Sync + Send,
    {
        match self {
            Backend::Sequential => (0..count).map(job).collect(),
            Backend::Parallel => {
                self.validate()?;
                #[cfg(feature = "rayon")]
                {
                    let slots: Vec<DetPostResult<T>> =
                        (0..count).into_par_iter().map(job).collect();
                    slots.into_iter().collect()
                }
                #[cfg(not(feature = "rayon"))]
                {
                    unreachable!("validate rejects the parallel backend without rayon")
                }
            }
        }
    }
}
