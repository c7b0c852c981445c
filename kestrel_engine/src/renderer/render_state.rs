/// Immutable pipeline states: blending and depth/stencil

use std::sync::Arc;

use bitflags::bitflags;

use crate::renderer::dirty::ResourceState;
use crate::renderer::resource_table::{
    NativeHandle, ResourceContext, ResourceDesc, ResourceHandle, ResourceId,
};

// ===== BLEND =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
    DestColor,
    InvDestColor,
    SrcAlphaSat,
    BlendFactor,
    InvBlendFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

bitflags! {
    /// Color channels written by the output merger
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const RED = 0x01;
        const GREEN = 0x02;
        const BLUE = 0x04;
        const ALPHA = 0x08;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// Blend state descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateDesc {
    pub enabled: bool,
    pub color_src: BlendFactor,
    pub color_dst: BlendFactor,
    pub color_op: BlendOperation,
    pub alpha_src: BlendFactor,
    pub alpha_dst: BlendFactor,
    pub alpha_op: BlendOperation,
    pub color_mask: ColorMask,
}

impl Default for BlendStateDesc {
    fn default() -> Self {
        Self {
            enabled: false,
            color_src: BlendFactor::One,
            color_dst: BlendFactor::Zero,
            color_op: BlendOperation::Add,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::Zero,
            alpha_op: BlendOperation::Add,
            color_mask: ColorMask::ALL,
        }
    }
}

impl BlendStateDesc {
    /// Straight alpha blending
    pub fn alpha() -> Self {
        Self {
            enabled: true,
            color_src: BlendFactor::SrcAlpha,
            color_dst: BlendFactor::InvSrcAlpha,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::InvSrcAlpha,
            ..Self::default()
        }
    }

    /// Additive blending
    pub fn additive() -> Self {
        Self {
            enabled: true,
            color_src: BlendFactor::SrcAlpha,
            color_dst: BlendFactor::One,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::One,
            ..Self::default()
        }
    }
}

// ===== DEPTH/STENCIL =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Depth/stencil state descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDesc {
    pub depth_test: bool,
    pub depth_write: bool,
    pub compare_function: CompareFunction,
}

impl Default for DepthStencilStateDesc {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            compare_function: CompareFunction::LessEqual,
        }
    }
}

// ===== FACADES =====

/// Game-thread handle to a blend state
#[derive(Debug)]
pub struct BlendState {
    handle: ResourceHandle,
    desc: BlendStateDesc,
}

impl BlendState {
    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    pub fn desc(&self) -> &BlendStateDesc {
        &self.desc
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.handle.native_handle()
    }

    pub fn resource_state(&self) -> ResourceState {
        self.handle.state()
    }
}

/// Game-thread handle to a depth/stencil state
#[derive(Debug)]
pub struct DepthStencilState {
    handle: ResourceHandle,
    desc: DepthStencilStateDesc,
}

impl DepthStencilState {
    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    pub fn desc(&self) -> &DepthStencilStateDesc {
        &self.desc
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.handle.native_handle()
    }

    pub fn resource_state(&self) -> ResourceState {
        self.handle.state()
    }
}

pub(crate) fn register_blend(context: &Arc<ResourceContext>, desc: BlendStateDesc) -> BlendState {
    BlendState {
        handle: context.register(ResourceDesc::BlendState(desc)),
        desc,
    }
}

pub(crate) fn register_depth_stencil(
    context: &Arc<ResourceContext>,
    desc: DepthStencilStateDesc,
) -> DepthStencilState {
    DepthStencilState {
        handle: context.register(ResourceDesc::DepthStencilState(desc)),
        desc,
    }
}
