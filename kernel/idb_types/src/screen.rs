//! Screen layouts.
//!
//! Screens only hold UI references. They are invisible to walks that do not
//! ask for UI data, and never keep what they show alive, except for the
//! image editor, which guarantees its image one (extra) user.

use std::any::Any;

use idb_ir::{IdCode, IdHandle, IdPayload, RefKind};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{CopyContext, ForeachIdData, IdError, IdTypeFlags, IdTypeInfo};
use serde::{Deserialize, Serialize};

use crate::{read_plain, write_plain};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpaceKind {
    #[default]
    Properties,
    Outliner,
    Image,
}

impl SpaceKind {
    pub fn ref_kind(self) -> RefKind {
        match self {
            Self::Image => RefKind::USER_ONE,
            Self::Properties | Self::Outliner => RefKind::NOP,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub space: SpaceKind,
    /// Data-block shown or pinned by the area.
    pub id: Option<IdHandle>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub areas: Vec<Area>,
}

pub(crate) struct ScreenType;

impl IdTypeInfo for ScreenType {
    fn code(&self) -> IdCode {
        IdCode::SCR
    }

    fn name(&self) -> &'static str {
        "Screen"
    }

    fn name_plural(&self) -> &'static str {
        "screens"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Screen>()
    }

    fn flags(&self) -> IdTypeFlags {
        IdTypeFlags::NO_COPY | IdTypeFlags::NO_LIBLINKING | IdTypeFlags::NO_ANIMDATA
    }

    fn init_data(&self) -> IdPayload {
        Box::<Screen>::default()
    }

    fn copy_data(&self, _ctx: &mut CopyContext<'_>, _src: &dyn Any) -> Result<IdPayload, IdError> {
        Err(IdError::CopyUnsupported(IdCode::SCR))
    }

    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if !walk.include_ui() {
            return;
        }
        if let Some(screen) = data.downcast_mut::<Screen>() {
            for area in &mut screen.areas {
                walk.process(&mut area.id, area.space.ref_kind());
            }
        }
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        write_plain::<Screen>(writer, data, self.name())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        read_plain::<Screen>(reader)
    }
}
