//! Vertex format of the 2D batch pipeline.
//!
//! Every primitive the batcher emits, textured or not, uses [`Vertex2D`].

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};

/// Sampler id marking a vertex as untextured. The fragment shader outputs
/// the vertex color directly for it.
pub const UNTEXTURED: i32 = -1;

/// Batch vertex.
///
/// Fields are plain arrays so the layout is tightly packed (36 bytes) on
/// every target.
///
/// # Shader Locations
///
/// - location 0: position (vec2)
/// - location 1: color (vec4)
/// - location 2: tex_coord (vec2)
/// - location 3: sampler_id (int)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex2D {
    pub position: [f32; 2],
    pub color: [f32; 4],
    pub tex_coord: [f32; 2],
    pub sampler_id: i32,
}

impl Vertex2D {
    #[inline]
    pub fn new(position: Vec2, color: Vec4, tex_coord: Vec2, sampler_id: i32) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
            tex_coord: tex_coord.to_array(),
            sampler_id,
        }
    }

    /// A vertex drawn with its color only.
    #[inline]
    pub fn untextured(position: Vec2, color: Vec4, tex_coord: Vec2) -> Self {
        Self::new(position, color, tex_coord, UNTEXTURED)
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::from_array(self.position)
    }

    #[inline]
    pub fn color(&self) -> Vec4 {
        Vec4::from_array(self.color)
    }

    #[inline]
    pub fn tex_coord(&self) -> Vec2 {
        Vec2::from_array(self.tex_coord)
    }

    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: Self::size() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Vertex2D, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: std::mem::offset_of!(Vertex2D, color) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Vertex2D, tex_coord) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 3,
                format: vk::Format::R32_SINT,
                offset: std::mem::offset_of!(Vertex2D, sampler_id) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(Vertex2D::size(), 36);
        assert_eq!(Vertex2D::binding_description().stride, 36);
    }

    #[test]
    fn attribute_layout() {
        let attrs = Vertex2D::attribute_descriptions();
        let offsets: Vec<u32> = attrs.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 8, 24, 32]);
        assert_eq!(attrs[3].format, vk::Format::R32_SINT);
        for (i, attr) in attrs.iter().enumerate() {
            assert_eq!(attr.location, i as u32);
            assert_eq!(attr.binding, 0);
        }
    }

    #[test]
    fn untextured_uses_sentinel() {
        let v = Vertex2D::untextured(Vec2::new(1.0, 2.0), Vec4::ONE, Vec2::ZERO);
        assert_eq!(v.sampler_id, UNTEXTURED);
        assert_eq!(v.position(), Vec2::new(1.0, 2.0));
        assert_eq!(v.color(), Vec4::ONE);
    }

    #[test]
    fn casts_to_bytes() {
        let vertices = [Vertex2D::default(); 3];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 108);
    }
}
