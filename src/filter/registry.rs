//! Strategy selection by first-match priority.

use super::{
    CargoBuildStrategy, CargoTestStrategy, DockerBuildStrategy, GenericErrorStrategy,
    GitDiffStrategy, GitLogStrategy, GitStatusStrategy, GoBuildStrategy, GoTestStrategy,
    GrepGroupStrategy, PassthroughStrategy, ProgressStripStrategy, Strategy,
};

/// Holds filter strategies in priority order plus a pass-through fallback.
pub struct Registry {
    strategies: Vec<Box<dyn Strategy>>,
    fallback: Box<dyn Strategy>,
}

impl Registry {
    /// Creates a registry with the given strategies and a passthrough fallback.
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self {
            strategies,
            fallback: Box::new(PassthroughStrategy),
        }
    }

    /// Returns a registry with all built-in strategies. The generic error
    /// filter matches unconditionally and must stay last so specific
    /// strategies take priority.
    pub fn default_set() -> Self {
        Self::new(vec![
            Box::new(GitStatusStrategy),
            Box::new(GitDiffStrategy),
            Box::new(GitLogStrategy),
            Box::new(GoTestStrategy),
            Box::new(GoBuildStrategy),
            Box::new(CargoTestStrategy),
            Box::new(CargoBuildStrategy),
            Box::new(DockerBuildStrategy),
            Box::new(GrepGroupStrategy),
            Box::new(ProgressStripStrategy),
            Box::new(GenericErrorStrategy),
        ])
    }

    /// Returns the first strategy that can handle the command, or the fallback.
    pub fn find(&self, command: &str, args: &[String]) -> &dyn Strategy {
        self.strategies
            .iter()
            .find(|s| s.can_handle(command, args))
            .map(|s| s.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::default_set()
    }
}
