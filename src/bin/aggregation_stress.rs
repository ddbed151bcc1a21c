/// Stress run for the aggregation layer
/// Allocates ranges from many threads, commits, drops half of them and
/// garbage collects, printing the allocation report after each stage.
///
/// Usage: aggregation_stress [config.toml]

use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;

use earth_buffers::{
    BufferArrayUsageHint, BufferSpec, BufferValue, RangeHandle, RegistryConfig, ResourceRegistry,
    TupleType, ValueBufferSource, ValueType,
};

const NUM_PRIMS: usize = 4096;
const POINTS_PER_PRIM: usize = 64;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RegistryConfig::load(&path).with_context(|| format!("loading {}", path))?,
        // small buffers so arrays split
        None => RegistryConfig {
            max_vbo_size: 256 * 1024,
            ..RegistryConfig::default()
        },
    };
    let mut registry = ResourceRegistry::new(config);

    let specs = vec![
        BufferSpec::new("points", TupleType::single(ValueType::Float32Vec3)),
        BufferSpec::new("normals", TupleType::single(ValueType::Float32Vec3)),
    ];
    let constants = vec![
        BufferSpec::new("transform", TupleType::single(ValueType::Float64Mat4)),
        BufferSpec::new("color", TupleType::single(ValueType::Float32Vec4)),
    ];

    let start = Instant::now();
    let ranges: Vec<(RangeHandle, RangeHandle)> = (0..NUM_PRIMS)
        .into_par_iter()
        .map(|prim| -> Result<(RangeHandle, RangeHandle)> {
            let hint = BufferArrayUsageHint::default();
            let vertex = registry.allocate_non_uniform_range("primvar", &specs, hint)?;
            let constant = registry.allocate_shader_storage_range("constant", &constants, hint)?;

            let points: Vec<f32> = (0..POINTS_PER_PRIM * 3).map(|i| (prim * i) as f32).collect();
            let value = BufferValue::from_pod(TupleType::single(ValueType::Float32Vec3), &points);
            registry.add_sources(
                &vertex,
                vec![
                    ValueBufferSource::new("points", value.clone()).into_handle(),
                    ValueBufferSource::new("normals", value).into_handle(),
                ],
            )?;
            Ok((vertex, constant))
        })
        .collect::<Result<_>>()?;
    println!("Allocated {} prims in {:?}", ranges.len(), start.elapsed());

    let start = Instant::now();
    let stats = registry.commit();
    println!(
        "Commit took {:?}: {}",
        start.elapsed(),
        serde_json::to_string(&stats).context("serialising commit stats")?
    );
    println!("{}", registry.resource_allocation().to_json()?);

    let kept: Vec<_> = ranges.into_iter().step_by(2).collect();
    let evicted = registry.garbage_collect();
    println!("Kept {} prims, evicted {} arrays", kept.len(), evicted);

    // collection already repacked the survivors
    let stats = registry.commit();
    anyhow::ensure!(stats.arrays_reallocated == 0, "arrays left dirty after collection");
    println!("{}", registry.resource_allocation().to_json()?);

    let damaged = kept
        .iter()
        .filter(|(vertex, _)| vertex.read_data("points").num_elements() != POINTS_PER_PRIM)
        .count();
    anyhow::ensure!(damaged == 0, "{} ranges lost data while repacking", damaged);

    println!(
        "{}",
        serde_json::to_string_pretty(&registry.perf_counters().snapshot())?
    );
    Ok(())
}
