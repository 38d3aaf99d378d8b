//! Predicates for gitdeck command output.

#![allow(dead_code)]

use predicates::prelude::*;

/// A repository row: `<name>  [<branch>]`.
pub fn has_repository(name: &str, branch: &str) -> impl Predicate<str> {
    predicates::str::is_match(format!(r"{name}\s+\[{branch}\]")).expect("valid regex")
}

pub fn has_pending(count: usize) -> impl Predicate<str> {
    predicates::str::contains(format!("{count} pending"))
}

pub fn has_summary(repositories: usize) -> impl Predicate<str> {
    predicates::str::contains(format!("{repositories} repositories"))
}

pub fn not_in_workspace() -> impl Predicate<str> {
    predicates::str::contains("is not a repository in the current workspace")
}
