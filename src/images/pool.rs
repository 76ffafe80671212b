/// Bounded, order-preserving batch resolution
///
/// A batch of references is resolved on a dedicated rayon pool sized to the
/// configured concurrency. Results come back in input order regardless of
/// completion order.

use super::{CancelToken, ImageResolver, ImageResource};
use log::{debug, warn};
use rayon::prelude::*;

/// Count of real images versus placeholders in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct LoadSummary {
    pub loaded: usize,
    pub total: usize,
}

impl LoadSummary {
    pub fn of(resources: &[ImageResource]) -> Self {
        Self { loaded: resources.iter().filter(|r| r.is_loaded()).count(), total: resources.len() }
    }

    pub fn failed(&self) -> usize {
        self.total - self.loaded
    }

    /// "3 of 4 images loaded"
    pub fn describe(&self) -> String {
        format!("{} of {} images loaded", self.loaded, self.total)
    }
}

/// Resolve every reference with at most `concurrency` in flight.
///
/// The output has the same length and order as `references`, and every
/// resource has left the pending state.
pub fn resolve_all(resolver: &ImageResolver, references: &[String], cancel: &CancelToken) -> Vec<ImageResource> {
    let mut resources: Vec<ImageResource> = references.iter().map(|r| ImageResource::new(r)).collect();
    if resources.is_empty() {
        return resources;
    }

    let threads = resolver.config().concurrency.max(1).min(resources.len());
    debug!("resolving {} images with {} workers", resources.len(), threads);

    match rayon::ThreadPoolBuilder::new().num_threads(threads).thread_name(|i| format!("image-pool-{}", i)).build() {
        Ok(pool) => pool.install(|| resources.par_iter_mut().for_each(|r| r.resolve(resolver, cancel))),
        Err(e) => {
            warn!("failed to build image pool ({}); resolving sequentially", e);
            resources.iter_mut().for_each(|r| r.resolve(resolver, cancel));
        }
    }
    resources
}
