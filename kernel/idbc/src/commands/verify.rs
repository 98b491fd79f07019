use std::fmt;

use idb_ir::{IdCode, IdTag, WalkFlags};
use idb_lib::query::{collect_references, count_user_references};
use idb_lib::Main;
use rustc_hash::FxHashSet;

/// One inconsistency found in a database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Problem {
    UserCount { id: String, stored: i32, expected: i32 },
    Dangling { id: String },
    DuplicateName { code: IdCode, name: String },
    Unsorted { code: IdCode },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserCount { id, stored, expected } => {
                write!(f, "{id}: {stored} user(s) stored, {expected} expected")
            }
            Self::Dangling { id } => write!(f, "{id}: reference to a missing ID"),
            Self::DuplicateName { code, name } => write!(f, "{code}{name}: name used twice"),
            Self::Unsorted { code } => write!(f, "{code}: list not sorted by name"),
        }
    }
}

/// Check user counts against references, reference targets and names.
pub fn verify_main(main: &mut Main) -> Vec<Problem> {
    let mut problems = Vec::new();
    let counts = count_user_references(main);

    for handle in main.all_handles() {
        let refs = collect_references(main, handle, WalkFlags::INCLUDE_UI).unwrap_or_default();
        let id = main.id(handle);
        if refs.iter().any(|(target, _)| !main.contains(*target)) {
            problems.push(Problem::Dangling { id: id.name.prefixed() });
        }

        let limit = id.fake_users();
        let mut expected = counts.get(&handle).copied().unwrap_or(0) + limit;
        if id.tag.contains(IdTag::EXTRAUSER) {
            expected = expected.max(limit + 1);
        }
        if id.us != expected {
            problems.push(Problem::UserCount {
                id: id.name.prefixed(),
                stored: id.us,
                expected,
            });
        }
    }

    for &code in main.registry().codes() {
        let mut seen = FxHashSet::default();
        for &handle in main.handles(code) {
            let id = main.id(handle);
            if !seen.insert((id.lib, id.name.as_str())) {
                problems.push(Problem::DuplicateName {
                    code,
                    name: id.name.as_str().to_owned(),
                });
            }
        }
        if !main.is_list_sorted(code) {
            problems.push(Problem::Unsorted { code });
        }
    }

    tracing::debug!(problems = problems.len(), "verified database");
    problems
}
