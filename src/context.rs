use crate::{
    pipelines::{
        camera::CameraResources,
        materials::{Materials, ShaderMaterial, mk_shader_materials},
    },
    sector::mesh_manager::CadMeshManager,
};

/// Settings for [`Context::new`].
#[derive(Debug, Clone, Copy)]
pub struct ContextConfig {
    /// Format of the color attachment the sector pipelines render into.
    pub color_format: wgpu::TextureFormat,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            power_preference: wgpu::PowerPreference::default(),
        }
    }
}

/// GPU state shared by every sector: device, queue, camera and the material
/// bundle. The host owns the surface and hands its format in via
/// [`ContextConfig`].
#[derive(Debug)]
pub struct Context {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub camera: CameraResources,
    pub materials: Materials<ShaderMaterial>,
    pub config: ContextConfig,
}

impl Context {
    pub async fn new(config: ContextConfig) -> anyhow::Result<Self> {
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("cad-ngin device"),
                required_features: wgpu::Features::empty(),
                // WebGL lacks several of wgpu's default limits
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await?;

        let camera = CameraResources::new(&device);
        let materials = mk_shader_materials(&device, config.color_format, &camera.bind_group_layout);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            camera,
            materials,
            config,
        })
    }

    /// A mesh manager uploading through this context's device.
    pub fn mesh_manager(&self) -> CadMeshManager<wgpu::Device, ShaderMaterial> {
        CadMeshManager::new(self.device.clone(), self.materials.clone())
    }
}

/// Routes `log` output to stderr natively and to the browser console on wasm.
/// Safe to call more than once.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::debug!("Logger already initialized: {}", e);
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("Logger already initialized: {}", e);
        }
    }
}
