use color_eyre::Result;
use glam::{Vec2, Vec3};

/// Corners of the quad in clip space
pub const QUAD_VERTICES: [Vec3; 4] = [
    Vec3::new(-0.4, -0.7, 0.0),
    Vec3::new(-0.4, 0.7, 0.0),
    Vec3::new(0.4, -0.7, 0.0),
    Vec3::new(0.4, 0.7, 0.0),
];

/// Position followed by a texture coordinate, both read by the input
/// assembler from one interleaved buffer
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TexturedVertex {
    pub position: Vec3,
    pub uv: Vec2,
}

/// The same corners, mapped onto the whole texture with v growing downwards
pub const TEXTURED_QUAD_VERTICES: [TexturedVertex; 4] = [
    TexturedVertex { position: QUAD_VERTICES[0], uv: Vec2::new(0.0, 1.0) },
    TexturedVertex { position: QUAD_VERTICES[1], uv: Vec2::new(0.0, 0.0) },
    TexturedVertex { position: QUAD_VERTICES[2], uv: Vec2::new(1.0, 1.0) },
    TexturedVertex { position: QUAD_VERTICES[3], uv: Vec2::new(1.0, 0.0) },
];

pub const QUAD_INDICES: [u16; 6] = [
    0, 1, 2,
    2, 1, 3,
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
}

impl IndexFormat {
    pub fn size_in_bytes(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
        }
    }
}

/// Copies `data` to the start of a mapped allocation.
pub fn write_to_slab<T, S>(data: &[T], slab: &mut S) -> Result<presser::CopyRecord>
where
    T: Copy,
    S: presser::Slab,
{
    Ok(presser::copy_from_slice_to_offset(data, slab, 0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr::NonNull;

    #[test]
    fn quad_geometry_matches_literals() {
        let floats: &[f32] = bytemuck::cast_slice(&QUAD_VERTICES);
        assert_eq!(
            floats,
            &[
                -0.4, -0.7, 0.0,
                -0.4, 0.7, 0.0,
                0.4, -0.7, 0.0,
                0.4, 0.7, 0.0,
            ]
        );
        assert_eq!(QUAD_INDICES, [0, 1, 2, 2, 1, 3]);
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_VERTICES.len()));
    }

    #[test]
    fn textured_vertices_interleave_position_and_uv() {
        assert_eq!(std::mem::size_of::<TexturedVertex>(), 20);
        assert_eq!(std::mem::offset_of!(TexturedVertex, uv), 12);

        let positions: Vec<Vec3> = TEXTURED_QUAD_VERTICES.iter().map(|v| v.position).collect();
        assert_eq!(positions, QUAD_VERTICES);

        // Left edge samples u = 0, top edge samples v = 0
        for vertex in TEXTURED_QUAD_VERTICES {
            assert_eq!(vertex.uv.x, if vertex.position.x < 0.0 { 0.0 } else { 1.0 });
            assert_eq!(vertex.uv.y, if vertex.position.y > 0.0 { 0.0 } else { 1.0 });
        }
    }

    #[test]
    fn uploads_land_at_start_of_allocation() {
        // u32 backing keeps the base address aligned for f32 copies
        let mut backing = vec![0u32; 16];
        {
            let mut raw = presser::RawAllocation::from_raw_parts(
                NonNull::new(backing.as_mut_ptr() as *mut u8).unwrap(),
                backing.len() * 4,
            );
            let mut slab = unsafe { raw.borrow_as_slab() };
            let record = write_to_slab(&QUAD_VERTICES, &mut slab).unwrap();
            assert_eq!(record.copy_start_offset, 0);
            assert_eq!(record.copy_end_offset, 48);
        }

        let written: &[f32] = bytemuck::cast_slice(&backing[..12]);
        let expected: &[f32] = bytemuck::cast_slice(&QUAD_VERTICES);
        assert_eq!(written, expected);
        assert!(backing[12..].iter().all(|&word| word == 0));
    }

    #[test]
    fn index_upload_is_twelve_bytes() {
        let mut backing = vec![0u32; 4];
        {
            let mut raw = presser::RawAllocation::from_raw_parts(
                NonNull::new(backing.as_mut_ptr() as *mut u8).unwrap(),
                backing.len() * 4,
            );
            let mut slab = unsafe { raw.borrow_as_slab() };
            write_to_slab(&QUAD_INDICES, &mut slab).unwrap();
        }

        let written: &[u16] = bytemuck::cast_slice(&backing[..3]);
        assert_eq!(written, &QUAD_INDICES);
        assert_eq!(std::mem::size_of_val(&QUAD_INDICES), 12);
    }

    #[test]
    fn oversized_upload_is_rejected() {
        let mut backing = vec![0u32; 2];
        let mut raw = presser::RawAllocation::from_raw_parts(
            NonNull::new(backing.as_mut_ptr() as *mut u8).unwrap(),
            backing.len() * 4,
        );
        let mut slab = unsafe { raw.borrow_as_slab() };
        assert!(write_to_slab(&QUAD_VERTICES, &mut slab).is_err());
    }
}
