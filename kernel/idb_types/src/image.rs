//! Images.

use std::any::Any;

use idb_ir::{IdCode, IdPayload};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, CopyContext, CopyFlags, ForeachIdData, IdError, IdTypeInfo};
use serde::{Deserialize, Serialize};

use crate::{read_plain, write_plain};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    #[default]
    File,
    Sequence,
    /// Generated in memory, no file behind it.
    Generated,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub filepath: String,
    pub source: ImageSource,
    pub size: [u32; 2],
    /// Decoded pixels. Runtime only.
    #[serde(skip)]
    pub cache: Option<Vec<u32>>,
}

impl Image {
    pub fn has_file(&self) -> bool {
        self.source != ImageSource::Generated && !self.filepath.is_empty()
    }
}

pub(crate) struct ImageType;

impl IdTypeInfo for ImageType {
    fn code(&self) -> IdCode {
        IdCode::IM
    }

    fn name(&self) -> &'static str {
        "Image"
    }

    fn name_plural(&self) -> &'static str {
        "images"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Image>()
    }

    fn init_data(&self) -> IdPayload {
        Box::<Image>::default()
    }

    fn copy_data(&self, ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        let src = payload_ref::<Image>(src, self.name())?;
        let keep_cache = ctx.flags().contains(CopyFlags::COPY_CACHES);
        Ok(Box::new(Image {
            filepath: src.filepath.clone(),
            source: src.source,
            size: src.size,
            cache: src.cache.clone().filter(|_| keep_cache),
        }))
    }

    fn free_data(&self, data: &mut dyn Any) {
        if let Some(image) = data.downcast_mut::<Image>() {
            image.cache = None;
        }
    }

    fn foreach_id(&self, _data: &mut dyn Any, _walk: &mut ForeachIdData<'_>) {}

    fn foreach_path(&self, data: &mut dyn Any, visit: &mut dyn FnMut(&mut String)) {
        if let Some(image) = data.downcast_mut::<Image>() {
            if image.has_file() {
                visit(&mut image.filepath);
            }
        }
    }

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        write_plain::<Image>(writer, data, self.name())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        read_plain::<Image>(reader)
    }
}
