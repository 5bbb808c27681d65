// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loads a batch of procedural meshes on the worker threads, builds a scene
//! summary from them and hands the result to the main thread.
//!
//! Usage: `sandbox [config.json]`, where the optional file holds a
//! `TaskSystemConfig` (missing fields take their defaults).

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tessera_core::{EngineContext, Handle};
use tessera_data::DynamicHandleObjectSet;
use tessera_tasks::{Ready, TaskFuture, TaskSystem, TaskSystemConfig};

type MeshPool = DynamicHandleObjectSet<Mesh, 32>;

#[derive(Debug)]
struct Mesh {
    name: String,
    positions: Vec<[f32; 3]>,
    indices: Vec<u32>,
}

impl Mesh {
    /// A flat `side` x `side` grid of quads.
    fn grid(name: String, side: u32) -> Self {
        let positions = (0..=side)
            .flat_map(|z| (0..=side).map(move |x| [x as f32, 0.0, z as f32]))
            .collect();
        let stride = side + 1;
        let indices = (0..side)
            .flat_map(|z| (0..side).map(move |x| z * stride + x))
            .flat_map(|i| [i, i + 1, i + stride, i + 1, i + stride + 1, i + stride])
            .collect();
        Self {
            name,
            positions,
            indices,
        }
    }

    fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn load_config() -> Result<TaskSystemConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading task config from {path}"))?;
            TaskSystemConfig::from_json(&json).with_context(|| format!("parsing {path}"))
        }
        None => Ok(TaskSystemConfig::default()),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!("starting sandbox with {config:?}");
    let tasks = TaskSystem::new(config)?;
    let context = EngineContext::new().with_service(MeshPool::with_label("meshes"));
    let meshes = context.require::<MeshPool>()?;

    let loads: Vec<TaskFuture<Handle>> = (1..=48u32)
        .map(|side| {
            let meshes = Arc::clone(&meshes);
            tasks.push_on_worker_thread(move || meshes.create(Mesh::grid(format!("grid_{side}"), side)))
        })
        .collect();

    let pool = Arc::clone(&meshes);
    let triangles = tasks.push_awaitable_on_worker_thread(loads.clone(), move |handles: Vec<Handle>| {
        handles
            .into_iter()
            .filter_map(|handle| pool.fetch(handle).map(|mesh| mesh.triangle_count()))
            .sum::<usize>()
    });

    // The summary is "uploaded" on the main thread, like GPU work would be.
    let pool = Arc::clone(&meshes);
    let uploaded = tasks.push_awaitable_on_owner_thread(
        (triangles, loads.clone(), Ready(Instant::now())),
        move |(triangles, handles, started): (usize, Vec<Handle>, Instant)| {
            let largest = handles
                .iter()
                .filter_map(|&handle| pool.fetch(handle))
                .max_by_key(|mesh| mesh.positions.len())
                .map(|mesh| mesh.name.clone())
                .unwrap_or_default();
            log::info!(
                "{} meshes, {triangles} triangles, largest is {largest} ({:?})",
                handles.len(),
                started.elapsed()
            );
            triangles
        },
    );

    let mut frames = 0;
    while !uploaded.is_ready() {
        let executed = tasks.run_on_owner_thread(Duration::from_millis(16));
        frames += 1;
        log::debug!("frame {frames}: {executed} owner tasks");
    }
    let triangles = uploaded.get()?;
    println!("{}", serde_json::to_string_pretty(&tasks.get_info())?);

    let released = loads
        .iter()
        .filter_map(|load| load.try_get())
        .filter_map(Result::ok)
        .filter(|&handle| meshes.free(handle))
        .count();
    log::info!("{triangles} triangles over {frames} frames, released {released} meshes");
    Ok(())
}
