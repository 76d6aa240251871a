use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::RepoGroup;
use crate::remote::RemoteTarget;

/// Group skeletons keyed by remote target.
///
/// Listing workspace directories over ssh is the slowest part of a refresh,
/// so the skeleton is computed once per target and reused by every tick.
/// Entries only go away through [`GroupCache::invalidate`] or
/// [`GroupCache::clear`].
#[derive(Debug, Clone, Default)]
pub struct GroupCache {
    data: Arc<RwLock<HashMap<RemoteTarget, Vec<RepoGroup>>>>,
}

impl GroupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached skeleton for `target`, with every session list emptied.
    pub fn get(&self, target: &RemoteTarget) -> Option<Vec<RepoGroup>> {
        self.data
            .read()
            .get(target)
            .map(|groups| groups.iter().map(RepoGroup::skeleton).collect())
    }

    /// Store a skeleton for `target`.
    pub fn insert(&self, target: RemoteTarget, groups: &[RepoGroup]) {
        let skeleton = groups.iter().map(RepoGroup::skeleton).collect();
        self.data.write().insert(target, skeleton);
    }

    /// Drop the entry for one target so the next load re-enumerates it.
    pub fn invalidate(&self, target: &RemoteTarget) {
        if self.data.write().remove(target).is_some() {
            tracing::debug!(%target, "group cache invalidated");
        }
    }

    /// Clear all targets
    pub fn clear(&self) {
        self.data.write().clear();
    }

    pub fn contains(&self, target: &RemoteTarget) -> bool {
        self.data.read().contains_key(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Session;

    #[test]
    fn test_hit_returns_copy_without_sessions() {
        let cache = GroupCache::new();
        let target = RemoteTarget::new("dev@box");
        let mut g = RepoGroup::new("git", "app", "/w/app");
        g.sessions.push(Session::new("app-shell-1", "/w/app"));
        cache.insert(target.clone(), &[RepoGroup::root(), g]);

        let hit = cache.get(&target).unwrap();
        assert_eq!(hit.len(), 2);
        assert!(hit.iter().all(|g| g.sessions.is_empty()));

        // Mutating the copy leaves the cached entry untouched.
        let mut hit = hit;
        hit[1].sessions.push(Session::new("x", "/w/app"));
        assert!(cache.get(&target).unwrap()[1].sessions.is_empty());
    }

    #[test]
    fn test_targets_are_independent() {
        let cache = GroupCache::new();
        let a = RemoteTarget::new("a@host");
        let b = RemoteTarget::local();
        cache.insert(a.clone(), &[RepoGroup::root()]);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));

        cache.insert(b.clone(), &[RepoGroup::root()]);
        cache.invalidate(&a);
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&b).is_some());

        cache.clear();
        assert!(cache.get(&b).is_none());
    }
}
