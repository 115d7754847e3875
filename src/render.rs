//! Drawing of sector groups.
//!
//! [`DrawSector`] extends `wgpu::RenderPass` the way the mesh pipelines expect:
//! camera at group 0, template or mesh vertices in slot 0 and per-instance data
//! in slot 1. Each mesh binds the pipeline of its own material.

use crate::{
    data_structures::{auto_dispose::AutoDisposeGroup, geometry::GpuGeometry, scene_graph::MeshNode},
    pipelines::materials::ShaderMaterial,
    sector::render_target::SectorRenderTarget,
};

pub type GpuSectorGroup = AutoDisposeGroup<GpuGeometry, ShaderMaterial>;

pub trait DrawSector {
    fn draw_mesh(&mut self, mesh: &MeshNode<GpuGeometry, ShaderMaterial>, camera_bind_group: &wgpu::BindGroup);

    fn draw_sector_group(&mut self, group: &GpuSectorGroup, camera_bind_group: &wgpu::BindGroup);

    fn draw_render_target(
        &mut self,
        target: &SectorRenderTarget<GpuGeometry, ShaderMaterial>,
        camera_bind_group: &wgpu::BindGroup,
    );
}

impl DrawSector for wgpu::RenderPass<'_> {
    fn draw_mesh(&mut self, mesh: &MeshNode<GpuGeometry, ShaderMaterial>, camera_bind_group: &wgpu::BindGroup) {
        let geometry = &mesh.geometry;
        if geometry.is_disposed() {
            log::warn!("Skipping disposed mesh {}", mesh.name);
            return;
        }
        self.set_pipeline(&mesh.material.pipeline);
        self.set_bind_group(0, camera_bind_group, &[]);
        self.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
        if let Some(instances) = &geometry.instance_buffer {
            self.set_vertex_buffer(1, instances.slice(..));
        }
        match &geometry.index_buffer {
            Some(indices) => {
                self.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                self.draw_indexed(0..geometry.num_elements, 0, 0..geometry.num_instances);
            }
            None => self.draw(0..geometry.num_elements, 0..geometry.num_instances),
        }
    }

    fn draw_sector_group(&mut self, group: &GpuSectorGroup, camera_bind_group: &wgpu::BindGroup) {
        group.for_each_mesh(&mut |mesh| self.draw_mesh(mesh, camera_bind_group));
    }

    fn draw_render_target(
        &mut self,
        target: &SectorRenderTarget<GpuGeometry, ShaderMaterial>,
        camera_bind_group: &wgpu::BindGroup,
    ) {
        for (_, group) in target.groups() {
            self.draw_sector_group(group, camera_bind_group);
        }
    }
}

impl SectorRenderTarget<GpuGeometry, ShaderMaterial> {
    /// Draws every sector this target holds.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>, camera_bind_group: &wgpu::BindGroup) {
        render_pass.draw_render_target(self, camera_bind_group);
    }
}
