//! In-memory snapshot of known distributions.
//!
//! The registry is the single source of truth consumers query between
//! refreshes. It never self-mutates: every change is a wholesale snapshot
//! replacement driven by one more `--list --verbose` round trip, and a
//! failed listing leaves it empty rather than stale. It is owned by the
//! controller task, which is the only mutator; everyone else sees cloned
//! snapshots via [`crate::model::AppEvent::Registry`].

use crate::error::CommandError;
use crate::model::Instance;
use crate::parser::parse_listing;
use crate::runner::{CommandRunner, LIST_VERBOSE};

#[derive(Debug, Clone, Default)]
pub struct Registry {
    snapshot: Vec<Instance>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot wholesale; insertion order is the tool's
    /// listing order.
    pub fn apply(&mut self, instances: Vec<Instance>) {
        self.snapshot = instances;
    }

    /// Re-queries the control tool and replaces the snapshot.
    ///
    /// On command failure the snapshot is cleared, not merged with stale
    /// data: a transient blank list is preferred over an incorrect one. The
    /// error is still returned so callers can surface it.
    pub fn refresh(&mut self, runner: &impl CommandRunner) -> Result<(), CommandError> {
        match runner.run(LIST_VERBOSE) {
            Ok(raw) => {
                self.apply(parse_listing(&raw));
                Ok(())
            }
            Err(err) => {
                self.apply(Vec::new());
                Err(err)
            }
        }
    }

    pub fn all(&self) -> &[Instance] {
        &self.snapshot
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.snapshot.iter().find(|i| i.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn to_snapshot(&self) -> Vec<Instance> {
        self.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstanceState;
    use crate::runner::testing::{exit_error, MockRunner};

    fn instance(name: &str, state: InstanceState) -> Instance {
        Instance {
            name: name.into(),
            state,
            version: "2".into(),
            is_default: false,
        }
    }

    #[test]
    fn refresh_replaces_the_snapshot_wholesale() {
        let mut registry = Registry::new();
        registry.apply(vec![instance("Stale", InstanceState::Running)]);

        let runner = MockRunner::new(vec![Ok(
            "header\n  Ubuntu    Stopped    2\n".to_string()
        )]);
        registry.refresh(&runner).unwrap();

        assert_eq!(registry.all().len(), 1);
        assert!(registry.contains("Ubuntu"));
        assert!(!registry.contains("Stale"));
    }

    #[test]
    fn failed_refresh_empties_the_registry() {
        let mut registry = Registry::new();
        registry.apply(vec![instance("Ubuntu", InstanceState::Running)]);

        let runner = MockRunner::new(vec![Err(exit_error("boom"))]);
        assert!(registry.refresh(&runner).is_err());
        assert!(registry.all().is_empty());
    }

    #[test]
    fn refresh_issues_the_verbose_listing_command() {
        let mut registry = Registry::new();
        let runner = MockRunner::new(vec![Ok(String::new())]);
        registry.refresh(&runner).unwrap();
        assert_eq!(
            runner.recorded_calls(),
            vec![vec!["--list".to_string(), "--verbose".to_string()]]
        );
    }

    #[test]
    fn get_finds_by_exact_name() {
        let mut registry = Registry::new();
        registry.apply(vec![
            instance("Ubuntu", InstanceState::Stopped),
            instance("Ubuntu-22.04", InstanceState::Running),
        ]);
        assert_eq!(
            registry.get("Ubuntu").unwrap().state,
            InstanceState::Stopped
        );
        assert!(registry.get("ubuntu").is_none());
    }
}
