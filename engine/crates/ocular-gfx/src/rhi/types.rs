use std::fmt;

/// 适配器的本地唯一标识（Windows 上的 LUID，Vulkan 上的 `deviceLUID`）
///
/// 头显运行时会告诉我们头显连接在哪一张显卡上，bootstrap 时用它来选择显卡
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AdapterLuid(pub [u8; 8]);
impl fmt::Debug for AdapterLuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdapterLuid(")?;
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

/// 已经打开的显卡的基本信息
#[derive(Clone, Debug)]
pub struct AdapterInfo {
    pub name: String,
    pub luid: Option<AdapterLuid>,
    pub vendor_id: u32,
    pub device_id: u32,
    pub discrete: bool,
    /// push constants 的最大字节数
    pub max_push_constants_size: u32,
}

/// 选择显卡时的要求
#[derive(Clone, Debug, Default)]
pub struct AdapterRequest {
    /// 头显所在的显卡；为 None 时优先选择独立显卡
    pub luid: Option<AdapterLuid>,
    pub app_name: String,
    /// 是否开启 validation layer / debug messenger
    pub validation: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeapKind {
    /// GPU 本地显存，CPU 不可见
    Default,
    /// CPU 可写、GPU 可读的暂存内存
    Upload,
}

#[derive(Clone, Debug)]
pub struct HeapDesc {
    pub kind: HeapKind,
    pub size: u64,
    pub name: String,
}

/// 资源状态，barrier 在两个状态之间进行转换
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// 刚创建、还没有任何用途的状态
    Common,
    /// upload heap 中 buffer 的状态，只作为 copy 的源
    GenericRead,
    CopySource,
    CopyDest,
    /// 顶点 + 索引可读
    VertexAndIndex,
    RenderTarget,
    /// 由合成器读取（像素着色器采样）的状态
    CompositorRead,
    DepthWrite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}
impl Extent2D {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}
impl Viewport {
    /// 覆盖整个 extent，depth 范围 [0, 1]
    pub fn full(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
impl ScissorRect {
    pub fn full(extent: Extent2D) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Rgba8UnormSrgb,
    Rgba8Unorm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthFormat {
    D32Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageUsage {
    /// 可以作为 render target，也可以被合成器采样
    ColorTarget(ColorFormat),
    Depth(DepthFormat),
}

#[derive(Clone, Debug)]
pub struct ImageDesc {
    pub extent: Extent2D,
    pub usage: ImageUsage,
    /// 创建之后图像所处的状态
    pub initial_state: ResourceState,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}
impl IndexFormat {
    #[inline]
    pub const fn size_in_bytes(self) -> u64 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// 顶点 buffer 的视图：一个 buffer 内的一段字节范围
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexBufferView {
    /// 在 buffer 内的字节偏移
    pub offset: u64,
    /// GPU 虚拟地址 = buffer 基址 + offset，buffer 放置之后不会再变
    pub gpu_address: u64,
    pub size: u64,
    pub stride: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexBufferView {
    pub offset: u64,
    pub gpu_address: u64,
    pub size: u64,
    pub format: IndexFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stage: ShaderStage,
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexAttributeFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexAttributeFormat,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessOrEqual,
    Always,
}

/// 图形管线的描述，shader 是不透明的字节流（Vulkan 下为 SPIR-V）
#[derive(Clone, Debug)]
pub struct PipelineDesc<'a> {
    pub name: &'a str,
    pub vertex_shader: &'a [u8],
    pub pixel_shader: &'a [u8],
    pub vertex_stride: u32,
    pub vertex_attributes: &'a [VertexAttribute],
    pub push_constants: &'a [PushConstantRange],
    pub color_format: ColorFormat,
    pub depth_format: DepthFormat,
    pub cull_mode: CullMode,
    /// 按照 D3D 的传统默认为 false，即顺时针为 front face
    pub front_counter_clockwise: bool,
    pub depth_compare: CompareOp,
    pub depth_write: bool,
}
