use crate::data_structures::{
    collection::GeometryCollectionType,
    geometry::{MeshVertex, Vertex},
    instance::InstanceRaw,
};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Pipeline for one collection type: instanced primitives share one shader,
/// merged triangle meshes use per-vertex attributes only.
pub fn mk_primitive_pipeline(
    device: &wgpu::Device,
    kind: GeometryCollectionType,
    color_format: wgpu::TextureFormat,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{kind} Pipeline Layout")),
        bind_group_layouts: &[Some(camera_bind_group_layout)],
        immediate_size: 0,
    });

    let (shader, vertex_layouts) = if kind.is_instanced() {
        (
            wgpu::ShaderModuleDescriptor {
                label: Some("Primitive Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("primitive.wgsl").into()),
            },
            vec![MeshVertex::desc(), InstanceRaw::desc()],
        )
    } else {
        (
            wgpu::ShaderModuleDescriptor {
                label: Some("Triangle Mesh Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("triangle_mesh.wgsl").into()),
            },
            vec![MeshVertex::desc()],
        )
    };
    // flat primitives and merged meshes have no reliable winding
    let cull_mode = if kind.is_double_sided() || !kind.is_instanced() {
        None
    } else {
        Some(wgpu::Face::Back)
    };

    mk_render_pipeline(
        device,
        &render_pipeline_layout,
        &format!("{kind} Pipeline"),
        color_format,
        Some(wgpu::BlendState {
            alpha: wgpu::BlendComponent::REPLACE,
            color: wgpu::BlendComponent::REPLACE,
        }),
        Some(DEPTH_FORMAT),
        cull_mode,
        &vertex_layouts,
        shader,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    label: &str,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_format: Option<wgpu::TextureFormat>,
    cull_mode: Option<wgpu::Face>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: wgpu::ShaderModuleDescriptor,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
