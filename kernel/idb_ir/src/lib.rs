//! Data model of the ID database.
//!
//! Every persistent entity of the application (meshes, materials, node trees,
//! screens...) is an [`Id`]: a typed, named, reference-counted record. This
//! crate holds the passive parts of that model; the lifecycle engine that
//! allocates, copies, remaps and frees IDs lives in `idb_lib`.
//!
//! # Design
//!
//! - IDs live in an arena owned by the database and refer to each other through
//!   [`IdHandle`]s (slot index + generation), never through pointers. Remapping
//!   a reference is a plain handle rewrite.
//! - The type of an ID is a two-character [`IdCode`]. Names are compared with
//!   the code first, so name order doubles as a type-filtered order.
//! - Persistent bits live in [`IdFlag`], runtime scratch bits in [`IdTag`].
//!   Tags are atomic so an external scheduler may set them concurrently.

mod code;
mod flags;
mod handle;
mod id;
pub mod name;
mod session;
mod tag;
mod walk;

pub use code::IdCode;
pub use flags::{IdFlag, IdTag};
pub use handle::IdHandle;
pub use id::{AnimData, Id, IdPayload, OverrideLibrary, PreviewImage};
pub use name::{IdName, MAX_ID_FULL_NAME, MAX_ID_FULL_NAME_UI, MAX_ID_NAME, MAX_NAME_LEN};
pub use session::{SessionUid, SessionUidGenerator, MAIN_ID_SESSION_UID_UNSET};
pub use tag::{AtomicIdTag, SharedTag};
pub use walk::{RefKind, WalkFlags, WalkStep};
