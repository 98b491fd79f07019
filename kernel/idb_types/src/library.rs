//! External library files.

use std::any::Any;

use idb_ir::{IdCode, IdHandle, IdPayload, RefKind};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{CopyContext, ForeachIdData, IdError, IdTypeFlags, IdTypeInfo};
use serde::{Deserialize, Serialize};

use crate::{read_plain, write_plain};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Absolute path of the library file.
    pub filepath: String,
    /// Library that pulled this one in, for nested libraries.
    pub parent: Option<IdHandle>,
}

pub(crate) struct LibraryType;

impl IdTypeInfo for LibraryType {
    fn code(&self) -> IdCode {
        IdCode::LI
    }

    fn name(&self) -> &'static str {
        "Library"
    }

    fn name_plural(&self) -> &'static str {
        "libraries"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Library>()
    }

    fn flags(&self) -> IdTypeFlags {
        IdTypeFlags::NO_COPY | IdTypeFlags::NO_LIBLINKING | IdTypeFlags::NO_ANIMDATA
    }

    fn init_data(&self) -> IdPayload {
        Box::<Library>::default()
    }

    fn copy_data(&self, _ctx: &mut CopyContext<'_>, _src: &dyn Any) -> Result<IdPayload, IdError> {
        Err(IdError::CopyUnsupported(IdCode::LI))
    }

    fn foreach_id(&self, data: &mut dyn Any, walk: &mut ForeachIdData<'_>) {
        if let Some(lib) = data.downcast_mut::<Library>() {
            walk.process(&mut lib.parent, RefKind::NEVER_SELF);
        }
    }

    fn foreach_path(&self, data: &mut dyn Any, visit: &mut dyn FnMut(&mut String)) {
        if let Some(lib) = data.downcast_mut::<Library>() {
            visit(&mut lib.filepath);
        }
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        write_plain::<Library>(writer, data, self.name())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        read_plain::<Library>(reader)
    }
}
