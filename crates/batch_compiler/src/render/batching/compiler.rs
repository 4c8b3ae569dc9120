//! # Batch Compiler
//!
//! Owns everything that outlives a single compile: the configuration, the
//! binding point allocator, the program cache, the observer table and the
//! render groups of the last compile.
//!
//! ## Pipeline
//!
//! ```text
//! classify -> group (dimension key, then capacity) -> RenderGroup::build
//!                                                      (split, layout, pack, commands)
//! ```
//!
//! A compile runs on demand (scene load or a renderable-set change). Between
//! compiles, [`BatchCompiler::update_frame`] refreshes the matrix buffers and
//! [`BatchCompiler::submit`] draws. Group build failures are logged, counted
//! in [`CompileStats`] and skipped; they never fail the compile.

use crate::backend::{GpuBackend, ProgramGenerator};
use crate::config::ConfigError;
use crate::core::config::CompilerConfig;
use crate::foundation::collections::MaterialKey;
use crate::foundation::math::Mat4;
use crate::render::material::{MaterialError, MaterialParameter};
use crate::render::scene::Scene;

use super::bindings::BindingAllocator;
use super::draw_commands::DrawMode;
use super::error::BuildError;
use super::grouper::{self, GroupLimits};
use super::observers::{GroupId, ParameterObservers};
use super::program_cache::ProgramCache;
use super::render_group::{BuildOptions, RenderGroup};
use super::signature::classify;

/// Statistics of the last compile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Distinct feature signatures seen
    pub signature_groups: usize,
    /// Render groups built
    pub render_groups: usize,
    /// Sub-groups skipped by a build error
    pub skipped_groups: usize,
    /// Renderables dropped at classification
    pub dropped_renderables: usize,
    /// Objects drawn through batch lists
    pub batched_objects: usize,
    /// Objects drawn through instancing
    pub instanced_objects: usize,
    /// Mesh-usage draw units across all groups
    pub draw_commands: usize,
    /// Material field writes that found no struct field
    pub dropped_field_writes: usize,
    /// Programs generated by this compile (cache misses)
    pub programs_generated: usize,
}

impl CompileStats {
    /// Objects that will render
    pub fn objects_drawn(&self) -> usize {
        self.batched_objects + self.instanced_objects
    }

    /// Average objects per render group
    pub fn avg_objects_per_group(&self) -> f32 {
        if self.render_groups == 0 {
            0.0
        } else {
            self.objects_drawn() as f32 / self.render_groups as f32
        }
    }
}

/// Render-batch compiler
#[derive(Debug)]
pub struct BatchCompiler {
    config: CompilerConfig,
    limits: GroupLimits,
    options: BuildOptions,
    bindings: BindingAllocator,
    programs: ProgramCache,
    observers: ParameterObservers,
    groups: Vec<RenderGroup>,
    stats: CompileStats,
    needs_recompile: bool,
}

impl BatchCompiler {
    /// Create a compiler; limits and draw mode are fixed from `config`
    pub fn new(config: CompilerConfig) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;

        let limits = config.group_limits();
        let options = BuildOptions {
            draw_mode: config.device.draw_mode(),
            generate_mipmaps: config.generate_mipmaps,
            max_uniform_block_size: config.device.max_uniform_block_size,
        };

        log::info!(
            "Batch compiler ready: {:?} draws, {} objects/group, {} textures/slot, {} binding points",
            options.draw_mode,
            limits.max_objects_per_group,
            limits.max_distinct_textures,
            config.device.max_uniform_buffer_bindings
        );

        Ok(Self {
            bindings: BindingAllocator::new(config.device.max_uniform_buffer_bindings),
            config,
            limits,
            options,
            programs: ProgramCache::new(),
            observers: ParameterObservers::new(),
            groups: Vec::new(),
            stats: CompileStats::default(),
            needs_recompile: true,
        })
    }

    /// Compile the scene's renderables into render groups
    ///
    /// Groups of the previous compile are released first.
    pub fn compile(
        &mut self,
        scene: &Scene,
        generator: &mut dyn ProgramGenerator,
        backend: &mut dyn GpuBackend,
    ) -> &CompileStats {
        self.release_groups(backend);

        let generated_before = self.programs.generated();
        let classification = classify(scene);
        let mut stats = CompileStats {
            signature_groups: classification.groups.len(),
            dropped_renderables: classification.dropped,
            ..CompileStats::default()
        };

        for signature_group in &classification.groups {
            let sub_groups = grouper::group(&signature_group.members, scene, self.limits);
            let program = match self
                .programs
                .get_or_generate(&signature_group.signature, generator)
                .cloned()
                .map_err(BuildError::from)
            {
                Ok(program) => program,
                Err(e) => {
                    log::warn!(
                        "Skipping {} sub-groups of {} renderables: {}",
                        sub_groups.len(),
                        signature_group.members.len(),
                        e
                    );
                    stats.skipped_groups += sub_groups.len();
                    continue;
                }
            };

            for members in sub_groups {
                let id = GroupId(self.groups.len());
                let built = RenderGroup::build(
                    id,
                    &members,
                    &signature_group.signature,
                    &program,
                    scene,
                    &mut self.bindings,
                    self.options,
                    backend,
                );

                match built {
                    Ok(group) => {
                        self.subscribe(&group, scene);
                        stats.render_groups += 1;
                        stats.batched_objects += group.batched_count();
                        stats.instanced_objects += group.instanced_count();
                        stats.draw_commands += group.commands().unit_count();
                        if self.config.strict_struct_fields {
                            stats.dropped_field_writes += group.dropped_field_writes();
                        }
                        self.groups.push(group);
                    }
                    Err(e) => {
                        log::warn!("Skipping render group of {} objects: {}", members.len(), e);
                        stats.skipped_groups += 1;
                    }
                }
            }
        }

        stats.programs_generated = self.programs.generated() - generated_before;
        log::info!(
            "Compiled {} renderables into {} render groups ({} skipped, {} dropped, {} draws)",
            scene.renderables().len(),
            stats.render_groups,
            stats.skipped_groups,
            stats.dropped_renderables,
            stats.draw_commands
        );

        self.stats = stats;
        self.needs_recompile = false;
        &self.stats
    }

    fn subscribe(&mut self, group: &RenderGroup, scene: &Scene) {
        for material_key in group.materials_used() {
            let Some(material) = scene.material(material_key) else {
                continue;
            };
            for (name, _, _) in material.uniform_parameters() {
                self.observers.subscribe(material_key, name, group.id());
            }
        }
    }

    /// Refresh every group's matrix buffers, in group order
    pub fn update_frame(&self, scene: &Scene, view_projection: &Mat4, backend: &mut dyn GpuBackend) {
        for group in &self.groups {
            if let Err(e) = group.update_transforms(scene, view_projection, backend) {
                log::warn!("Render group {:?} kept stale transforms: {}", group.id(), e);
            }
        }
    }

    /// Draw every group, in group order
    pub fn submit(&self, backend: &mut dyn GpuBackend) {
        for group in &self.groups {
            group.submit(backend);
        }
    }

    /// Change a material parameter and propagate it to subscribed groups
    ///
    /// Non-texture values are rewritten in place. Texture changes alter the
    /// signature or the layer packing, so they only mark the compiler as
    /// needing a recompile.
    pub fn set_material_parameter(
        &mut self,
        scene: &mut Scene,
        material: MaterialKey,
        name: &str,
        value: MaterialParameter,
        backend: &mut dyn GpuBackend,
    ) -> Result<(), MaterialError> {
        scene
            .material_mut(material)
            .ok_or(MaterialError::MissingMaterial)?
            .set_parameter(name, value)?;

        if matches!(value, MaterialParameter::Texture(_)) {
            log::debug!("Texture parameter '{}' changed, recompile required", name);
            self.needs_recompile = true;
            return Ok(());
        }

        let subscribers = self.observers.subscribers(material, name).to_vec();
        for id in subscribers {
            let Some(group) = self.groups.get_mut(id.0) else {
                continue;
            };
            let dropped = group.apply_material_parameter(material, name, &value, backend);
            if self.config.strict_struct_fields {
                self.stats.dropped_field_writes += dropped;
            }
        }

        Ok(())
    }

    /// Toggle a material feature flag; always requires a recompile
    pub fn set_material_flag(
        &mut self,
        scene: &mut Scene,
        material: MaterialKey,
        flag: &str,
        enabled: bool,
    ) -> Result<(), MaterialError> {
        scene
            .material_mut(material)
            .ok_or(MaterialError::MissingMaterial)?
            .set_flag(flag, enabled)?;
        self.needs_recompile = true;
        Ok(())
    }

    /// Mark the renderable set as changed
    pub fn invalidate(&mut self) {
        self.needs_recompile = true;
    }

    /// Whether groups are stale relative to the scene
    pub fn needs_recompile(&self) -> bool {
        self.needs_recompile
    }

    /// Release every render group and forget cached programs
    pub fn release(&mut self, backend: &mut dyn GpuBackend) {
        self.release_groups(backend);
        self.programs.clear();
        self.needs_recompile = true;
    }

    fn release_groups(&mut self, backend: &mut dyn GpuBackend) {
        if !self.groups.is_empty() {
            log::debug!("Releasing {} render groups", self.groups.len());
        }
        for group in self.groups.drain(..) {
            self.observers.remove_group(group.id());
            group.release(backend);
        }
        self.observers.clear();
    }

    /// Render groups of the last compile
    pub fn groups(&self) -> &[RenderGroup] {
        &self.groups
    }

    /// Statistics of the last compile
    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    /// Grouping limits in effect
    pub fn limits(&self) -> GroupLimits {
        self.limits
    }

    /// Draw mode in effect
    pub fn draw_mode(&self) -> DrawMode {
        self.options.draw_mode
    }

    /// Configuration
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Binding points handed out so far
    pub fn bindings(&self) -> &BindingAllocator {
        &self.bindings
    }

    /// Programs currently cached
    pub fn cached_programs(&self) -> usize {
        self.programs.len()
    }

    /// Observed `(material, parameter)` pairs
    pub fn observers(&self) -> &ParameterObservers {
        &self.observers
    }
}
