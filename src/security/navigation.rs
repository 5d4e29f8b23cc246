//! Navigation collaborator
//!
//! The coordinator moves the application to a safe location after a login
//! flow is abandoned and after logout. What "location" means belongs to the
//! host application; [`MemoryNavigator`] keeps it as a path string.

use std::sync::Mutex;

use crate::security::lock;

/// Changes the application's current location.
pub trait Navigator: Send + Sync {
    /// Moves to `path`.
    fn redirect(&self, path: &str);
}

/// [`Navigator`] that records the current path and every redirect.
///
/// # Examples
///
/// ```
/// use gatekeeper::security::navigation::{MemoryNavigator, Navigator};
///
/// let nav = MemoryNavigator::new("/admin/users");
/// nav.redirect("/");
///
/// assert_eq!(nav.current(), "/");
/// assert_eq!(nav.history(), vec!["/".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    state: Mutex<NavigationState>,
}

#[derive(Debug, Default)]
struct NavigationState {
    current: String,
    history: Vec<String>,
}

impl MemoryNavigator {
    /// Starts at `initial` with an empty history.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(NavigationState {
                current: initial.into(),
                history: Vec::new(),
            }),
        }
    }

    /// Current path.
    pub fn current(&self) -> String {
        lock(&self.state).current.clone()
    }

    /// Every path redirected to, oldest first.
    pub fn history(&self) -> Vec<String> {
        lock(&self.state).history.clone()
    }
}

impl Navigator for MemoryNavigator {
    fn redirect(&self, path: &str) {
        tracing::info!(path, "Redirecting");
        let mut state = lock(&self.state);
        state.current = path.to_string();
        state.history.push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_navigator_starts_empty() {
        let nav = MemoryNavigator::default();
        assert_eq!(nav.current(), "");
        assert!(nav.history().is_empty());
    }

    #[test]
    fn test_redirects_are_recorded_in_order() {
        let nav = MemoryNavigator::new("/start");
        nav.redirect("/a");
        nav.redirect("/b");
        assert_eq!(nav.current(), "/b");
        assert_eq!(nav.history(), vec!["/a".to_string(), "/b".to_string()]);
    }
}
