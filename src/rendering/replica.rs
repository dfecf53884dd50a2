//! Replica-parallel pipelines.
//!
//! Each replica is a complete geometry processor plus sink writing to its own
//! target. Draw calls and setters fan out to every replica; `for_each` runs
//! independent work per replica. All of it happens on one rayon pool and
//! returns only after every replica has finished.

use super::geometry::{CullMode, GeometryProcessor};
use super::rasterizer::PrimitiveSink;
use super::shader::VertexShader;
use super::tiled::build_pool;
use super::vertex::VertexAttribs;
use crate::error::ConfigError;
use crate::fixed::Fixed;
use rayon::prelude::*;
use rayon::ThreadPool;

pub struct ReplicaPipelines<V, R> {
    replicas: Vec<GeometryProcessor<V, R>>,
    pool: ThreadPool,
}

impl<V, R> ReplicaPipelines<V, R>
where
    V: VertexShader + Send,
    R: PrimitiveSink + Send,
{
    /// `thread_count == 0` uses one thread per available core.
    pub fn new(thread_count: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            replicas: Vec::new(),
            pool: build_pool(thread_count)?,
        })
    }

    pub fn add(&mut self, pipeline: GeometryProcessor<V, R>) {
        self.replicas.push(pipeline);
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn replicas(&self) -> &[GeometryProcessor<V, R>] {
        &self.replicas
    }

    pub fn replicas_mut(&mut self) -> &mut [GeometryProcessor<V, R>] {
        &mut self.replicas
    }

    pub fn into_replicas(self) -> Vec<GeometryProcessor<V, R>> {
        self.replicas
    }

    /// Stops at the first replica that rejects the viewport.
    pub fn set_viewport(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), ConfigError> {
        self.replicas
            .iter_mut()
            .try_for_each(|gp| gp.set_viewport(x, y, width, height))
    }

    pub fn set_depth_range(&mut self, near: Fixed, far: Fixed) -> Result<(), ConfigError> {
        self.replicas
            .iter_mut()
            .try_for_each(|gp| gp.set_depth_range(near, far))
    }

    pub fn set_cull_mode(&mut self, mode: CullMode) {
        for gp in &mut self.replicas {
            gp.set_cull_mode(mode);
        }
    }

    pub fn set_vertex_shader(&mut self, shader: V)
    where
        V: Clone,
    {
        for gp in &mut self.replicas {
            gp.set_vertex_shader(shader.clone());
        }
    }

    pub fn draw_triangles(
        &mut self,
        attribs: &VertexAttribs<'_>,
        indices: &[u32],
    ) -> Result<(), ConfigError> {
        self.try_for_each(|_, gp| gp.draw_triangles(attribs, indices))
    }

    pub fn draw_lines(
        &mut self,
        attribs: &VertexAttribs<'_>,
        indices: &[u32],
    ) -> Result<(), ConfigError> {
        self.try_for_each(|_, gp| gp.draw_lines(attribs, indices))
    }

    pub fn draw_points(
        &mut self,
        attribs: &VertexAttribs<'_>,
        indices: &[u32],
    ) -> Result<(), ConfigError> {
        self.try_for_each(|_, gp| gp.draw_points(attribs, indices))
    }

    /// Run `f(replica_index, replica)` on every replica in parallel.
    pub fn for_each<F>(&mut self, f: F)
    where
        F: Fn(usize, &mut GeometryProcessor<V, R>) + Sync + Send,
    {
        let replicas = &mut self.replicas;
        self.pool.install(|| {
            replicas
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, gp)| f(i, gp));
        });
    }

    /// Like [`for_each`](Self::for_each); reports the first error any
    /// replica returns once all of them have stopped.
    pub fn try_for_each<F>(&mut self, f: F) -> Result<(), ConfigError>
    where
        F: Fn(usize, &mut GeometryProcessor<V, R>) -> Result<(), ConfigError> + Sync + Send,
    {
        let replicas = &mut self.replicas;
        self.pool.install(|| {
            replicas
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(i, gp)| f(i, gp))
        })
    }
}
