//! Utility functions for the container
//!
//! This module provides common utility functions used throughout the crate:
//! bean naming conventions and the bookkeeping of beans that are in creation.

/// Naming convention utilities for bean names
pub mod naming {
    /// Converts a PascalCase type name to camelCase for bean naming.
    ///
    /// This is the default bean naming strategy: `UserService` becomes `userService`.
    /// A name starting with two upper-case characters is kept as is, so `URLResolver`
    /// stays `URLResolver`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sprig_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("UserService"), "userService");
    /// assert_eq!(to_camel_case("DatabaseConnectionPool"), "databaseConnectionPool");
    /// assert_eq!(to_camel_case("URLResolver"), "URLResolver");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                if first.is_uppercase() && chars.clone().next().is_some_and(char::is_uppercase) {
                    return s.to_string();
                }
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }
}

/// Creation bookkeeping utilities
pub mod dependency {
    use std::collections::{HashMap, HashSet};
    use std::thread::ThreadId;

    use parking_lot::{Mutex, RwLock};

    /// Tracks beans currently being created, across all threads.
    ///
    /// This is a thread-safe wrapper around a HashSet that maintains the set
    /// of beans currently in the creation process.
    #[derive(Debug, Default)]
    pub struct CreationTracker {
        creating: RwLock<HashSet<String>>,
    }

    impl CreationTracker {
        /// Creates a new empty creation tracker.
        pub fn new() -> Self {
            Self::default()
        }

        /// Checks if a bean is currently being created.
        pub fn is_creating(&self, name: &str) -> bool {
            self.creating.read().contains(name)
        }

        /// Marks a bean as being created.
        ///
        /// Returns `true` if the bean was not already being created,
        /// `false` if it was already in the creating set.
        pub fn start_creating(&self, name: &str) -> bool {
            self.creating.write().insert(name.to_string())
        }

        /// Marks a bean as finished being created.
        pub fn finish_creating(&self, name: &str) {
            self.creating.write().remove(name);
        }

        /// Gets a snapshot of all beans currently being created.
        ///
        /// This is useful for debugging and error messages.
        pub fn current_creating(&self) -> Vec<String> {
            self.creating.read().iter().cloned().collect()
        }
    }

    /// Tracks the creation stack of each thread separately.
    ///
    /// A bean that shows up twice on the same thread's stack is a circular
    /// reference; the same bean on two different threads is not.
    #[derive(Debug, Default)]
    pub struct ThreadCreationTracker {
        stacks: Mutex<HashMap<ThreadId, Vec<String>>>,
    }

    impl ThreadCreationTracker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pushes `name` on the current thread's stack.
        ///
        /// Returns `false` without pushing if the name is already on the stack.
        pub fn start_creating(&self, name: &str) -> bool {
            let mut stacks = self.stacks.lock();
            let stack = stacks.entry(std::thread::current().id()).or_default();
            if stack.iter().any(|n| n == name) {
                return false;
            }
            stack.push(name.to_string());
            true
        }

        /// Removes `name` from the current thread's stack.
        pub fn finish_creating(&self, name: &str) {
            let thread = std::thread::current().id();
            let mut stacks = self.stacks.lock();
            if let Some(stack) = stacks.get_mut(&thread) {
                if let Some(index) = stack.iter().rposition(|n| n == name) {
                    stack.remove(index);
                }
                if stack.is_empty() {
                    stacks.remove(&thread);
                }
            }
        }

        pub fn is_creating(&self, name: &str) -> bool {
            self.stacks
                .lock()
                .get(&std::thread::current().id())
                .is_some_and(|stack| stack.iter().any(|n| n == name))
        }

        /// Whether the current thread is in the middle of creating any bean.
        pub fn is_active(&self) -> bool {
            self.stacks.lock().contains_key(&std::thread::current().id())
        }

        /// The current thread's creation chain, outermost first.
        pub fn current_chain(&self) -> Vec<String> {
            self.stacks
                .lock()
                .get(&std::thread::current().id())
                .cloned()
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    mod naming_tests {
        use super::super::naming::*;

        #[test]
        fn test_to_camel_case() {
            assert_eq!(to_camel_case("UserService"), "userService");
            assert_eq!(to_camel_case("DatabaseService"), "databaseService");
            assert_eq!(to_camel_case("A"), "a");
            assert_eq!(to_camel_case("AB"), "AB");
            assert_eq!(to_camel_case(""), "");
            assert_eq!(to_camel_case("lowerCase"), "lowerCase");
        }
    }

    mod dependency_tests {
        use super::super::dependency::*;
        use std::sync::Arc;

        #[test]
        fn test_creation_tracker() {
            let tracker = CreationTracker::new();

            // Initially nothing is being created
            assert!(!tracker.is_creating("serviceA"));

            assert!(tracker.start_creating("serviceA"));
            assert!(tracker.is_creating("serviceA"));

            // Starting serviceA again signals a circular reference
            assert!(!tracker.start_creating("serviceA"));

            tracker.finish_creating("serviceA");
            assert!(!tracker.is_creating("serviceA"));
        }

        #[test]
        fn test_current_creating() {
            let tracker = CreationTracker::new();

            tracker.start_creating("serviceA");
            tracker.start_creating("serviceB");

            let creating = tracker.current_creating();
            assert_eq!(creating.len(), 2);
            assert!(creating.contains(&"serviceA".to_string()));
            assert!(creating.contains(&"serviceB".to_string()));
        }

        #[test]
        fn test_thread_tracker_is_per_thread() {
            let tracker = Arc::new(ThreadCreationTracker::new());
            assert!(tracker.start_creating("a"));
            assert!(tracker.start_creating("b"));
            assert!(!tracker.start_creating("a"));
            assert_eq!(tracker.current_chain(), vec!["a", "b"]);

            let other = tracker.clone();
            let started_elsewhere = std::thread::spawn(move || {
                let started = other.start_creating("a");
                other.finish_creating("a");
                started
            })
            .join()
            .unwrap();
            assert!(started_elsewhere);

            tracker.finish_creating("b");
            tracker.finish_creating("a");
            assert!(!tracker.is_active());
        }
    }
}
