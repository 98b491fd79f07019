//! Animation actions.

use std::any::Any;

use idb_ir::{IdCode, IdPayload};
use idb_lib::blend::{BlendDataReader, BlendWriter};
use idb_lib::{payload_ref, CopyContext, ForeachIdData, IdError, IdTypeFlags, IdTypeInfo};
use serde::{Deserialize, Serialize};

use crate::{read_plain, write_plain};

/// One animated property.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FCurve {
    pub rna_path: String,
    pub array_index: i32,
    /// `(frame, value)` pairs, sorted by frame.
    pub keyframes: Vec<[f32; 2]>,
}

impl FCurve {
    /// Value at `frame`, linearly interpolated and held constant outside
    /// the keyed range.
    pub fn evaluate(&self, frame: f32) -> Option<f32> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        if frame <= first[0] {
            return Some(first[1]);
        }
        if frame >= last[0] {
            return Some(last[1]);
        }
        let next = self.keyframes.partition_point(|key| key[0] <= frame);
        let [x0, y0] = self.keyframes[next - 1];
        let [x1, y1] = self.keyframes[next];
        if x1 <= x0 {
            return Some(y1);
        }
        Some(y0 + (y1 - y0) * (frame - x0) / (x1 - x0))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub curves: Vec<FCurve>,
    /// Type of the IDs this action is meant for, if restricted.
    pub id_root: Option<IdCode>,
}

impl Action {
    pub fn find_curve(&self, rna_path: &str, array_index: i32) -> Option<&FCurve> {
        self.curves
            .iter()
            .find(|curve| curve.rna_path == rna_path && curve.array_index == array_index)
    }
}

pub(crate) struct ActionType;

impl IdTypeInfo for ActionType {
    fn code(&self) -> IdCode {
        IdCode::AC
    }

    fn name(&self) -> &'static str {
        "Action"
    }

    fn name_plural(&self) -> &'static str {
        "actions"
    }

    fn struct_size(&self) -> usize {
        std::mem::size_of::<Action>()
    }

    fn flags(&self) -> IdTypeFlags {
        IdTypeFlags::NO_ANIMDATA
    }

    fn init_data(&self) -> IdPayload {
        Box::<Action>::default()
    }

    fn copy_data(&self, _ctx: &mut CopyContext<'_>, src: &dyn Any) -> Result<IdPayload, IdError> {
        Ok(Box::new(payload_ref::<Action>(src, self.name())?.clone()))
    }

    fn foreach_id(&self, _data: &mut dyn Any, _walk: &mut ForeachIdData<'_>) {}

    fn blend_write(&self, writer: &mut BlendWriter<'_>, data: &dyn Any) -> Result<(), IdError> {
        write_plain::<Action>(writer, data, self.name())
    }

    fn blend_read_data(&self, reader: &mut BlendDataReader<'_>) -> Result<IdPayload, IdError> {
        read_plain::<Action>(reader)
    }
}
