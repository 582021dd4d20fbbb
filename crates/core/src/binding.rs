//! Which document the editing session currently acts upon.
//!
//! Every timer and backend call is tagged with the [`BindingTag`] that was current when it
//! was scheduled. Rebinding bumps the epoch, so any tag issued before it stops matching and
//! its eventual result is dropped instead of being applied to the new target.

use practice_types::{PersistedId, TargetIdentity};

/// Identity of one binding, captured when work is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTag {
    pub target: TargetIdentity,
    pub epoch: u64,
}

#[derive(Debug, Default)]
pub(crate) struct TargetBinding {
    epoch: u64,
    target: Option<TargetIdentity>,
    persisted_id: Option<PersistedId>,
    hydrating: bool,
}

impl TargetBinding {
    /// Switch to `target`, invalidating every outstanding tag.
    ///
    /// The hydration guard is raised until the first genuine edit.
    pub(crate) fn bind(
        &mut self,
        target: TargetIdentity,
        persisted_id: Option<PersistedId>,
    ) -> BindingTag {
        self.epoch += 1;
        self.target = Some(target.clone());
        self.persisted_id = persisted_id;
        self.hydrating = true;
        BindingTag {
            target,
            epoch: self.epoch,
        }
    }

    /// End the session; outstanding tags stop matching.
    pub(crate) fn unbind(&mut self) {
        self.epoch += 1;
        self.target = None;
        self.persisted_id = None;
        self.hydrating = false;
    }

    pub(crate) fn tag(&self) -> Option<BindingTag> {
        self.target.as_ref().map(|target| BindingTag {
            target: target.clone(),
            epoch: self.epoch,
        })
    }

    pub(crate) fn is_current(&self, tag: &BindingTag) -> bool {
        self.epoch == tag.epoch && self.target.as_ref() == Some(&tag.target)
    }

    pub(crate) fn target(&self) -> Option<&TargetIdentity> {
        self.target.as_ref()
    }

    pub(crate) fn persisted_id(&self) -> Option<&PersistedId> {
        self.persisted_id.as_ref()
    }

    /// Record the id returned by a successful create or found by a load.
    ///
    /// Returns `false` without changing anything if the tag is stale or an id is already set;
    /// a persisted id never changes for the life of a binding.
    pub(crate) fn adopt_persisted_id(&mut self, tag: &BindingTag, id: PersistedId) -> bool {
        if !self.is_current(tag) || self.persisted_id.is_some() {
            return false;
        }
        self.persisted_id = Some(id);
        true
    }

    /// Record the id of a document created for `target` under an earlier binding.
    ///
    /// Applies only while `target` is still bound and has no id, so a later create for the
    /// same target becomes an update instead of a second document.
    pub(crate) fn adopt_created_for(&mut self, target: &TargetIdentity, id: PersistedId) -> bool {
        if self.target.as_ref() != Some(target) || self.persisted_id.is_some() {
            return false;
        }
        self.persisted_id = Some(id);
        true
    }

    pub(crate) fn is_hydrating(&self) -> bool {
        self.hydrating
    }

    pub(crate) fn raise_hydration_guard(&mut self) {
        self.hydrating = true;
    }

    /// Clear the hydration guard; returns whether it was raised.
    pub(crate) fn clear_hydration_guard(&mut self) -> bool {
        std::mem::replace(&mut self.hydrating, false)
    }
}
