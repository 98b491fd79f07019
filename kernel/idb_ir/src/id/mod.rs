//! The ID record.
//!
//! An [`Id`] is the generic header shared by all data-blocks plus a
//! type-erased payload. What the payload contains, how it is copied, freed
//! and which references it holds is defined by the type's descriptor in the
//! registry of `idb_lib`.
//!
//! # Header references
//!
//! Besides the payload, the header itself may reference other IDs: the
//! animation action and the override reference. Reference walks visit these
//! before the payload.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{AtomicIdTag, IdCode, IdFlag, IdHandle, IdName, IdTag, SessionUid, SharedTag};

/// Type-specific data of an ID.
pub type IdPayload = Box<dyn Any + Send + Sync>;

/// Animation attached to an ID.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimData {
    /// Active action. Counted as a user.
    pub action: Option<IdHandle>,
    pub influence: f32,
}

/// Library override state: which linked ID this local ID overrides and which
/// properties differ from it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideLibrary {
    /// The linked ID being overridden.
    pub reference: Option<IdHandle>,
    /// RNA-style paths of the overridden properties.
    pub properties: Vec<String>,
}

/// Small thumbnail of an ID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewImage {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u32>,
}

/// A data-block.
pub struct Id {
    pub name: IdName,
    /// Zero until the ID is given an identity by a session.
    pub session_uid: SessionUid,
    /// Library the ID is linked from, `None` for local data.
    pub lib: Option<IdHandle>,
    /// Number of users.
    pub us: i32,
    pub flag: IdFlag,
    pub tag: SharedTag,
    pub anim_data: Option<AnimData>,
    pub override_library: Option<OverrideLibrary>,
    pub preview: Option<PreviewImage>,
    pub data: IdPayload,
}

impl Id {
    /// A header with no users, no identity and no tags.
    pub fn new(code: IdCode, name: &str, data: IdPayload) -> Self {
        Self {
            name: IdName::new(code, name),
            session_uid: SessionUid::UNSET,
            lib: None,
            us: 0,
            flag: IdFlag::empty(),
            tag: Arc::new(AtomicIdTag::default()),
            anim_data: None,
            override_library: None,
            preview: None,
            data,
        }
    }

    #[inline]
    pub fn code(&self) -> IdCode {
        self.name.code()
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.lib.is_some()
    }

    #[inline]
    pub fn is_embedded(&self) -> bool {
        self.flag.contains(IdFlag::EMBEDDED_DATA)
    }

    #[inline]
    pub fn is_override_library(&self) -> bool {
        self.override_library.is_some()
            || self.flag.contains(IdFlag::EMBEDDED_DATA_LIB_OVERRIDE)
    }

    #[inline]
    pub fn has_fake_user(&self) -> bool {
        self.flag.contains(IdFlag::FAKEUSER)
    }

    /// Users granted by the fake-user flag (0 or 1).
    #[inline]
    pub fn fake_users(&self) -> i32 {
        i32::from(self.has_fake_user())
    }

    /// Users not coming from the fake-user flag.
    #[inline]
    pub fn real_users(&self) -> i32 {
        self.us - self.fake_users()
    }

    #[inline]
    pub fn tags(&self) -> IdTag {
        self.tag.get()
    }

    pub fn data<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }

    pub fn data_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut()
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Id")
            .field("name", &self.name)
            .field("session_uid", &self.session_uid)
            .field("lib", &self.lib)
            .field("us", &self.us)
            .field("flag", &self.flag)
            .field("tag", &self.tags())
            .finish_non_exhaustive()
    }
}
