use crate::{CommentState, ReviewProgress, StepCategory};
use crate::store::CommentStore;

/// One visual step per comment, in display order.
///
/// Steps are addressed by comment position, so nothing on the comment record
/// points back at its step.
#[derive(Debug, Clone, Default)]
pub struct ProgressIndicator {
    steps: Vec<StepCategory>,
}

impl ProgressIndicator {
    /// Create `len` neutral steps.
    pub fn new(len: usize) -> Self {
        Self {
            steps: vec![StepCategory::Neutral; len],
        }
    }

    /// Build one step per stored comment, projected from its current state.
    pub fn for_store(store: &CommentStore) -> Self {
        Self {
            steps: store
                .comments()
                .iter()
                .map(|c| StepCategory::from(c.state))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[StepCategory] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<StepCategory> {
        self.steps.get(index).copied()
    }

    /// Update the category of step `index` from a comment state.
    ///
    /// Out-of-range indices are ignored.
    pub fn set_step_state(&mut self, index: usize, state: CommentState) {
        if let Some(step) = self.steps.get_mut(index) {
            *step = StepCategory::from(state);
        }
    }

    /// 1-based label shown on a step.
    pub fn label(index: usize) -> String {
        (index + 1).to_string()
    }

    /// Count steps per category.
    pub fn summary(&self) -> ReviewProgress {
        let mut progress = ReviewProgress {
            total: self.steps.len(),
            ..ReviewProgress::default()
        };
        for step in &self.steps {
            match step {
                StepCategory::Neutral => progress.neutral += 1,
                StepCategory::Active => progress.active += 1,
                StepCategory::Done => progress.done += 1,
            }
        }
        progress
    }
}
