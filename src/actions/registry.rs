//! Action registry for lookup by name.
//!
//! Action steps refer to actions by name; the `ActionRegistry` is where
//! those names are bound. Iteration follows registration order so that
//! listings are stable across processes.

use rustc_hash::FxHashMap;

use super::action::Action;

/// Named actions of one game.
///
/// ## Example
///
/// ```
/// use rust_turnflow::actions::{Action, ActionRegistry, Selection};
///
/// let mut registry: ActionRegistry<()> = ActionRegistry::new();
/// registry.register("pass", Action::new().prompt("Pass"));
/// registry.register("bid", Action::new().select(Selection::number("amount")));
///
/// assert!(registry.contains("bid"));
/// assert_eq!(registry.names().collect::<Vec<_>>(), vec!["pass", "bid"]);
/// ```
pub struct ActionRegistry<G> {
    actions: Vec<(String, Action<G>)>,
    index: FxHashMap<String, usize>,
}

impl<G> Default for ActionRegistry<G> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<G> ActionRegistry<G> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under `name`.
    ///
    /// Panics if an action with the same name already exists.
    pub fn register(&mut self, name: impl Into<String>, action: Action<G>) {
        let name = name.into();
        if self.index.contains_key(&name) {
            panic!("Action `{name}` already registered");
        }
        self.index.insert(name.clone(), self.actions.len());
        self.actions.push((name, action));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Action<G>> {
        self.index.get(name).map(|&i| &self.actions[i].1)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over `(name, action)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Action<G>)> {
        self.actions.iter().map(|(name, action)| (name.as_str(), action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry: ActionRegistry<()> = ActionRegistry::new();
        assert!(registry.is_empty());

        registry.register("pass", Action::new().prompt("Pass"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("pass").and_then(Action::prompt_text), Some("Pass"));
        assert!(registry.get("bid").is_none());
    }

    #[test]
    fn test_registration_order() {
        let mut registry: ActionRegistry<()> = ActionRegistry::new();
        for name in ["c", "a", "b"] {
            registry.register(name, Action::new());
        }
        let names: Vec<_> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_panics() {
        let mut registry: ActionRegistry<()> = ActionRegistry::new();
        registry.register("pass", Action::new());
        registry.register("pass", Action::new());
    }
}
