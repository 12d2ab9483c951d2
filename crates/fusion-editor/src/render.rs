//! Shadow-mapped scene rendering against an abstract backend.
//!
//! The GPU side (shader binding, framebuffers, draw calls) lives behind
//! [`RenderBackend`]. This module only decides what each pass sets and in
//! which order.

use std::f32::consts::PI;

use fusion_core::components::{Camera, DirectionalLight, MeshHandle, PointLight, Transform};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Texture unit the shadow map is bound to in the lit pass.
pub const SHADOW_MAP_UNIT: u32 = 4;

pub const SKY_COLOR: [f32; 4] = [0.53, 0.81, 0.98, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    ShadowMap,
    Scene,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullFace {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassSetup {
    pub target: PassTarget,
    pub cull: CullFace,
    pub clear_color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
    Float(f32),
    Int(i32),
}

/// The host renderer.
pub trait RenderBackend {
    fn begin_pass(&mut self, setup: &PassSetup);
    fn bind_shader(&mut self, shader: &str);
    fn set_uniform(&mut self, name: &str, value: UniformValue);
    /// Upload a std140-compatible block.
    fn set_uniform_block(&mut self, name: &str, bytes: &[u8]);
    fn bind_shadow_map(&mut self, unit: u32);
    fn draw_mesh(&mut self, mesh: MeshHandle, instance: usize);
    fn end_pass(&mut self);
}

/// Per-pass behaviour plugged into [`render_pass`].
pub struct PassHooks<'a> {
    /// Runs once, right after the shader is bound.
    pub after_bind: Box<dyn FnMut(&mut dyn RenderBackend) + 'a>,
    /// Runs before each instance is drawn.
    pub per_instance: Box<dyn FnMut(&mut dyn RenderBackend, &Transform) + 'a>,
}

/// Hook that uploads the instance model matrix.
fn model_matrix_hook<'a>() -> Box<dyn FnMut(&mut dyn RenderBackend, &Transform) + 'a> {
    Box::new(|backend: &mut dyn RenderBackend, transform: &Transform| {
        backend.set_uniform("model", UniformValue::Mat4(transform.matrix()))
    })
}

/// Bind the shader, run the hooks and draw every instance of every batch.
/// Returns the number of draw calls issued.
pub fn render_pass(
    backend: &mut dyn RenderBackend,
    setup: &PassSetup,
    shader: &str,
    batches: &[(MeshHandle, Vec<Transform>)],
    hooks: &mut PassHooks<'_>,
) -> usize {
    backend.begin_pass(setup);
    backend.bind_shader(shader);
    (hooks.after_bind)(&mut *backend);

    let mut draws = 0;
    for (mesh, instances) in batches {
        for (index, transform) in instances.iter().enumerate() {
            (hooks.per_instance)(&mut *backend, transform);
            backend.draw_mesh(*mesh, index);
            draws += 1;
        }
    }

    backend.end_pass();
    draws
}

// ---------------------------------------------------------------------------
// Light uniforms
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightUniform {
    pub position: [f32; 3],
    pub constant: f32,
    pub ambient: [f32; 3],
    pub linear: f32,
    pub diffuse: [f32; 3],
    pub quadratic: f32,
    pub specular: [f32; 3],
    pub _pad: f32,
}

impl From<&PointLight> for PointLightUniform {
    fn from(light: &PointLight) -> Self {
        Self {
            position: light.position,
            constant: light.constant,
            ambient: light.ambient,
            linear: light.linear,
            diffuse: light.diffuse,
            quadratic: light.quadratic,
            specular: light.specular,
            _pad: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirLightUniform {
    pub direction: [f32; 3],
    pub _pad0: f32,
    pub ambient: [f32; 3],
    pub _pad1: f32,
    pub diffuse: [f32; 3],
    pub _pad2: f32,
    pub specular: [f32; 3],
    pub _pad3: f32,
}

impl From<&DirectionalLight> for DirLightUniform {
    fn from(light: &DirectionalLight) -> Self {
        Self {
            direction: light.direction.to_array(),
            _pad0: 0.0,
            ambient: light.ambient.to_array(),
            _pad1: 0.0,
            diffuse: light.diffuse.to_array(),
            _pad2: 0.0,
            specular: light.specular.to_array(),
            _pad3: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Sun
// ---------------------------------------------------------------------------

/// Directional light that sweeps across the sky, one step per lit pass.
#[derive(Debug, Clone)]
pub struct SunCycle {
    pub angle: f32,
    pub speed: f32,
    pub light: DirectionalLight,
}

impl SunCycle {
    pub fn new(speed: f32) -> Self {
        let mut sun = Self {
            angle: 0.0,
            speed,
            light: DirectionalLight::default(),
        };
        sun.light.direction = sun_direction(sun.angle);
        sun
    }

    /// Move the sun one step and return its new direction.
    pub fn advance(&mut self) -> Vec3 {
        self.angle += self.speed;
        self.light.direction = sun_direction(self.angle);
        if self.angle >= 2.0 * PI {
            self.angle = -PI;
        }
        self.light.direction
    }

    pub fn direction(&self) -> Vec3 {
        self.light.direction
    }
}

fn sun_direction(angle: f32) -> Vec3 {
    Vec3::new(angle.sin(), angle.cos().max(-PI), angle.cos()).normalize()
}

/// Orthographic shadow frustum placed along the sun direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    pub center: [f32; 3],
    pub distance: f32,
    pub extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            distance: 200.0,
            extent: 50.0,
            near: 1.0,
            far: 500.0,
        }
    }
}

impl ShadowSettings {
    pub fn light_space_matrix(&self, direction: Vec3) -> Mat4 {
        let center = Vec3::from(self.center);
        let eye = center - direction * self.distance;
        let up = if direction.normalize_or_zero().dot(Vec3::Y).abs() > 0.999 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(eye, center, up);
        let e = self.extent;
        let projection = Mat4::orthographic_rh(-e, e, -e, e, self.near, self.far);
        projection * view
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub depth_draws: usize,
    pub lit_draws: usize,
    pub sun_direction: Vec3,
}

/// Depth pass into the shadow map, then the lit scene pass.
pub struct ShadowRenderer {
    pub depth_shader: String,
    pub lit_shader: String,
    pub shadow: ShadowSettings,
    pub point_light: PointLight,
    pub sun: SunCycle,
    pub gamma: f32,
}

impl ShadowRenderer {
    pub fn new(shadow: ShadowSettings, point_light: PointLight, sun_speed: f32, gamma: f32) -> Self {
        Self {
            depth_shader: "depth".to_string(),
            lit_shader: "world".to_string(),
            shadow,
            point_light,
            sun: SunCycle::new(sun_speed),
            gamma,
        }
    }

    pub fn render_frame(
        &mut self,
        backend: &mut dyn RenderBackend,
        camera: &Camera,
        batches: &[(MeshHandle, Vec<Transform>)],
    ) -> FrameStats {
        let light_space = self.shadow.light_space_matrix(self.sun.direction());

        let depth_setup = PassSetup {
            target: PassTarget::ShadowMap,
            cull: CullFace::Front,
            clear_color: SKY_COLOR,
        };
        let mut depth_hooks = PassHooks {
            after_bind: Box::new(|backend: &mut dyn RenderBackend| {
                backend.set_uniform("lightSpaceMatrix", UniformValue::Mat4(light_space));
            }),
            per_instance: model_matrix_hook(),
        };
        let depth_draws = render_pass(backend, &depth_setup, &self.depth_shader, batches, &mut depth_hooks);

        let lit_setup = PassSetup {
            target: PassTarget::Scene,
            cull: CullFace::Back,
            clear_color: SKY_COLOR,
        };
        let point_light = PointLightUniform::from(&self.point_light);
        let gamma = self.gamma;
        let sun = &mut self.sun;
        let mut lit_hooks = PassHooks {
            after_bind: Box::new(|backend: &mut dyn RenderBackend| {
                backend.set_uniform("projection", UniformValue::Mat4(camera.projection_matrix()));
                backend.set_uniform("view", UniformValue::Mat4(camera.view_matrix()));
                backend.set_uniform("viewPos", UniformValue::Vec3(camera.position()));
                backend.set_uniform("lightSpaceMatrix", UniformValue::Mat4(light_space));
                backend.set_uniform("shadowMap", UniformValue::Int(SHADOW_MAP_UNIT as i32));
                backend.bind_shadow_map(SHADOW_MAP_UNIT);
                backend.set_uniform_block("light", bytemuck::bytes_of(&point_light));

                sun.advance();
                let dir_light = DirLightUniform::from(&sun.light);
                backend.set_uniform_block("dirLight", bytemuck::bytes_of(&dir_light));
                backend.set_uniform("gamma", UniformValue::Float(gamma));
            }),
            per_instance: model_matrix_hook(),
        };
        let lit_draws = render_pass(backend, &lit_setup, &self.lit_shader, batches, &mut lit_hooks);
        drop(lit_hooks);

        FrameStats {
            depth_draws,
            lit_draws,
            sun_direction: self.sun.direction(),
        }
    }
}

// ---------------------------------------------------------------------------
// Recording backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    BeginPass(PassSetup),
    BindShader(String),
    SetUniform(String, UniformValue),
    SetUniformBlock(String, Vec<u8>),
    BindShadowMap(u32),
    DrawMesh(MeshHandle, usize),
    EndPass,
}

/// Backend that records every command. Used by headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub commands: Vec<RenderCommand>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawMesh(..)))
            .count()
    }

    /// Last value uploaded to a named uniform.
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.commands.iter().rev().find_map(|c| match c {
            RenderCommand::SetUniform(n, value) if n == name => Some(*value),
            _ => None,
        })
    }
}

impl RenderBackend for RecordingBackend {
    fn begin_pass(&mut self, setup: &PassSetup) {
        self.commands.push(RenderCommand::BeginPass(*setup));
    }

    fn bind_shader(&mut self, shader: &str) {
        self.commands.push(RenderCommand::BindShader(shader.to_string()));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.commands.push(RenderCommand::SetUniform(name.to_string(), value));
    }

    fn set_uniform_block(&mut self, name: &str, bytes: &[u8]) {
        self.commands
            .push(RenderCommand::SetUniformBlock(name.to_string(), bytes.to_vec()));
    }

    fn bind_shadow_map(&mut self, unit: u32) {
        self.commands.push(RenderCommand::BindShadowMap(unit));
    }

    fn draw_mesh(&mut self, mesh: MeshHandle, instance: usize) {
        self.commands.push(RenderCommand::DrawMesh(mesh, instance));
    }

    fn end_pass(&mut self) {
        self.commands.push(RenderCommand::EndPass);
    }
}
