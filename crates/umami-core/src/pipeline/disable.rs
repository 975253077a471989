//! Scoped stage disabling.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::pipeline::Pipeline;

/// Mutable view of a pipeline with some stages switched off.
///
/// The stages this guard disabled are switched back on when it is dropped,
/// whether the scope ends normally, through `?`, or by unwinding. Stages that
/// were already disabled when the guard was created stay disabled.
#[must_use = "stages are re-enabled as soon as the guard is dropped"]
pub struct DisabledStages<'a> {
    pipeline: &'a mut Pipeline,
    disabled: Vec<String>,
}

impl<'a> DisabledStages<'a> {
    pub(crate) fn new(pipeline: &'a mut Pipeline, names: Vec<String>) -> Self {
        let mut disabled = Vec::new();
        for name in names {
            if pipeline.set_enabled(&name, false) {
                disabled.push(name);
            }
        }
        debug!(stages = ?disabled, "disabled pipeline stages");
        Self { pipeline, disabled }
    }

    /// Names of the stages this guard switched off.
    pub fn disabled(&self) -> &[String] {
        &self.disabled
    }

    /// Re-enable the stages now. Equivalent to dropping the guard.
    pub fn restore(self) {}
}

impl Deref for DisabledStages<'_> {
    type Target = Pipeline;

    fn deref(&self) -> &Pipeline {
        self.pipeline
    }
}

impl DerefMut for DisabledStages<'_> {
    fn deref_mut(&mut self) -> &mut Pipeline {
        self.pipeline
    }
}

impl Drop for DisabledStages<'_> {
    fn drop(&mut self) {
        for name in &self.disabled {
            self.pipeline.set_enabled(name, true);
        }
        debug!(stages = ?self.disabled, "re-enabled pipeline stages");
    }
}
