//! Which instances get replaced.

use aiops_core::{LabelSelector, WorkloadInstance};

/// Replace instances matching `selector` whose restart count is strictly
/// above `threshold`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    pub selector: LabelSelector,
    pub threshold: u32,
}

impl RestartPolicy {
    pub fn new(selector: LabelSelector, threshold: u32) -> Self {
        Self {
            selector,
            threshold,
        }
    }

    /// Whether the instance belongs to the managed workload.
    pub fn selects(&self, instance: &WorkloadInstance) -> bool {
        self.selector.matches(&instance.labels)
    }

    /// Whether this instance needs replacement.
    pub fn needs_replacement(&self, instance: &WorkloadInstance) -> bool {
        self.selects(instance) && instance.restart_count > self.threshold
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(LabelSelector::new("app", "backend"), 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_pod(restarts: u32) -> WorkloadInstance {
        WorkloadInstance::new("backend-0", restarts).with_label("app", "backend")
    }

    #[test]
    fn threshold_is_exclusive() {
        let policy = RestartPolicy::default();
        assert!(!policy.needs_replacement(&backend_pod(0)));
        assert!(!policy.needs_replacement(&backend_pod(3)));
        assert!(policy.needs_replacement(&backend_pod(4)));
    }

    #[test]
    fn other_workloads_are_ignored() {
        let policy = RestartPolicy::default();
        let frontend = WorkloadInstance::new("frontend-0", 50).with_label("app", "frontend");
        let unlabelled = WorkloadInstance::new("job-0", 50);

        assert!(!policy.needs_replacement(&frontend));
        assert!(!policy.needs_replacement(&unlabelled));
    }
}
