//! Runnable test registry
//!
//! Maps each exposed canonical name to how it is invoked. Resolution happens once, at
//! registration: a name with a specialized handler is bound to that handler, every other
//! allow-listed binary is bound to the generic run-and-check behavior.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use super::discovery::DiscoveredTest;
use super::specialized::HandlerId;

/// How a registered test is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Run the binary and require exit code 0
    Generic(PathBuf),
    /// Delegate to a named handler
    Specialized(HandlerId),
}

impl Invocation {
    pub fn kind(&self) -> &'static str {
        match self {
            Invocation::Generic(_) => "generic",
            Invocation::Specialized(_) => "specialized",
        }
    }
}

/// A test exposed as a runnable case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredTest {
    pub name: String,
    pub binary: PathBuf,
    pub invocation: Invocation,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    tests: BTreeMap<String, RegisteredTest>,
}

impl Registry {
    /// Register the allow-listed subset of `discovered`.
    pub fn build(discovered: Vec<DiscoveredTest>, allow_list: &BTreeSet<String>) -> Self {
        let mut tests = BTreeMap::new();

        for test in discovered {
            if !allow_list.contains(&test.name) {
                tracing::debug!("{} discovered but not allow-listed", test.name);
                continue;
            }

            let invocation = match HandlerId::for_name(&test.name) {
                Some(handler) => Invocation::Specialized(handler),
                None => Invocation::Generic(test.path.clone()),
            };

            tests.insert(
                test.name.clone(),
                RegisteredTest {
                    name: test.name,
                    binary: test.path,
                    invocation,
                },
            );
        }

        Self { tests }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTest> {
        self.tests.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tests.contains_key(name)
    }

    /// Registered tests in name order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTest> {
        self.tests.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tests.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
