//! Lifecycle engine of the ID database.
//!
//! [`Main`] stores every data-block of a session. This crate implements what
//! happens to those blocks over their lifetime:
//!
//! - allocation and registration ([`Main::id_new`], [`Main::id_new_ex`]),
//! - naming: unique names and sorted lists ([`Main::id_new_name_validate`]),
//! - user counting ([`Main::id_us_plus`], [`Main::refcount_recompute`]),
//! - copying and duplication ([`Main::id_copy_ex`]),
//! - reference remapping ([`Main::remap_multiple`]),
//! - freeing and deletion ([`Main::id_delete`], [`Main::id_multi_tagged_delete`]),
//! - library linking and make-local ([`blend::link_from`], [`Main::make_library_local`]).
//!
//! Concrete types plug in through [`IdTypeInfo`] descriptors registered in a
//! [`Session`].

mod alloc;
pub mod blend;
mod copy;
mod database;
mod error;
pub mod flags;
mod free;
pub mod idtype;
mod local;
mod naming;
pub mod query;
mod remap;
mod session;
pub mod stack;
mod users;

#[cfg(test)]
mod test_types;

pub use alloc::AllocatedId;
pub use copy::{CopyContext, DuplicateMap};
pub use database::{Main, MainLock, MainLockGuard};
pub use error::IdError;
pub use flags::{CopyFlags, DuplicateFlags, FreeFlags, MakeLocalFlags, RemapFlags};
pub use idtype::{payload_ref, IdTypeFlags, IdTypeInfo, IdTypeRegistry};
pub use local::LocalAction;
pub use naming::{IdNewNameAction, IdNewNameMode, IdNewNameResult};
pub use query::{ForeachIdData, IdLink, IdUsage, MainIdRelations};
pub use remap::{IdRemapper, RemapReport};
pub use session::Session;
pub use users::{us_clear_real, us_ensure_real, us_min, us_plus_no_lib};
