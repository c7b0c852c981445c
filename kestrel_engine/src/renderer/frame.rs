/// Frame - draw commands recorded on the game thread
///
/// Commands only carry resource ids. The renderer checks that every
/// referenced resource is ready before the device executes the frame.

use crate::error::{Error, Result};
use crate::renderer::buffer::Buffer;
use crate::renderer::render_state::{BlendState, DepthStencilState};
use crate::renderer::render_target::RenderTarget;
use crate::renderer::resource_table::ResourceId;
use crate::renderer::texture::Texture;
use crate::renderer::types::{BufferUsage, IndexFormat};

/// Number of texture slots a draw can sample from
pub const MAX_TEXTURE_SLOTS: usize = 4;

/// Viewport in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scissor rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// `None` selects the backbuffer
    SetRenderTarget(Option<ResourceId>),
    /// Clear the current target with its clear state
    Clear,
    SetViewport(Viewport),
    /// `None` disables the scissor test
    SetScissor(Option<ScissorRect>),
    SetBlendState(Option<ResourceId>),
    SetDepthStencilState(Option<ResourceId>),
    SetTextures(Vec<ResourceId>),
    SetVertexBuffer(ResourceId),
    SetIndexBuffer { buffer: ResourceId, format: IndexFormat },
    DrawIndexed { index_count: u32, start_index: u32 },
}

impl DrawCommand {
    /// Resources the command requires to be ready
    pub fn resources(&self) -> Vec<ResourceId> {
        match self {
            DrawCommand::SetRenderTarget(Some(id))
            | DrawCommand::SetBlendState(Some(id))
            | DrawCommand::SetDepthStencilState(Some(id))
            | DrawCommand::SetVertexBuffer(id)
            | DrawCommand::SetIndexBuffer { buffer: id, .. } => vec![*id],
            DrawCommand::SetTextures(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }
}

/// Commands of one frame, in submission order
#[derive(Debug, Clone, Default)]
pub struct Frame {
    number: u64,
    commands: Vec<DrawCommand>,
}

impl Frame {
    pub(crate) fn new(number: u64) -> Self {
        Self {
            number,
            commands: Vec::new(),
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Every resource the frame references, in command order
    pub fn referenced_resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.commands.iter().flat_map(DrawCommand::resources)
    }

    /// Render into `target`, or into the backbuffer when `None`
    pub fn set_render_target(&mut self, target: Option<&RenderTarget>) {
        self.commands.push(DrawCommand::SetRenderTarget(target.map(RenderTarget::id)));
    }

    pub fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(DrawCommand::SetViewport(viewport));
    }

    pub fn set_scissor(&mut self, scissor: Option<ScissorRect>) {
        self.commands.push(DrawCommand::SetScissor(scissor));
    }

    pub fn set_blend_state(&mut self, state: Option<&BlendState>) {
        self.commands.push(DrawCommand::SetBlendState(state.map(BlendState::id)));
    }

    pub fn set_depth_stencil_state(&mut self, state: Option<&DepthStencilState>) {
        self.commands
            .push(DrawCommand::SetDepthStencilState(state.map(DepthStencilState::id)));
    }

    pub fn set_textures(&mut self, textures: &[&Texture]) -> Result<()> {
        if textures.len() > MAX_TEXTURE_SLOTS {
            return Err(Error::InvalidArgument(format!(
                "{} textures bound, at most {} slots",
                textures.len(),
                MAX_TEXTURE_SLOTS
            )));
        }
        self.commands
            .push(DrawCommand::SetTextures(textures.iter().map(|t| t.id()).collect()));
        Ok(())
    }

    pub fn set_vertex_buffer(&mut self, buffer: &Buffer) -> Result<()> {
        if buffer.usage() != BufferUsage::Vertex {
            return Err(Error::InvalidArgument("Not a vertex buffer".to_string()));
        }
        self.commands.push(DrawCommand::SetVertexBuffer(buffer.id()));
        Ok(())
    }

    pub fn set_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat) -> Result<()> {
        if buffer.usage() != BufferUsage::Index {
            return Err(Error::InvalidArgument("Not an index buffer".to_string()));
        }
        self.commands.push(DrawCommand::SetIndexBuffer {
            buffer: buffer.id(),
            format,
        });
        Ok(())
    }

    pub fn draw_indexed(&mut self, index_count: u32, start_index: u32) {
        self.commands.push(DrawCommand::DrawIndexed {
            index_count,
            start_index,
        });
    }
}
