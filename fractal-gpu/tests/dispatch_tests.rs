use std::sync::Arc;

use fractal_core::{EngineConfig, PixelGrid};
use fractal_gpu::buffers::dispatch_dimensions;
use fractal_gpu::{AcceleratorManager, ComputeEngine, GenerateOutcome, SequentialBackend};
use proptest::prelude::*;

proptest! {
    #[test]
    fn dispatch_covers_every_work_unit(
        work_units in 1u32..5_000_000,
        workgroup_size in 1u32..1025,
        max_per_dimension in 1u32..65_536,
    ) {
        let (x, y) = dispatch_dimensions(work_units, workgroup_size, max_per_dimension);
        prop_assert!(x >= 1 && y >= 1);
        prop_assert!(x <= max_per_dimension);
        let invocations = u64::from(x) * u64::from(y) * u64::from(workgroup_size);
        prop_assert!(invocations >= u64::from(work_units));
        // Never more than one spare row of workgroups.
        let spare = invocations - u64::from(work_units);
        prop_assert!(spare < u64::from(x) * u64::from(workgroup_size) + u64::from(workgroup_size));
    }

    #[test]
    fn every_success_has_grid_length_and_bounded_counts(
        width in 1u32..24,
        height in 1u32..24,
        center_real in -2.0f64..1.0,
        center_imag in -1.5f64..1.5,
        zoom in 0.1f64..1e6,
    ) {
        let mut config = EngineConfig::default();
        config.grid = PixelGrid::new(width, height);
        config.budget.base_iterations = 20;
        config.budget.max_iterations = 80;
        config.budget.scaling_factor = 4.0;
        let manager = Arc::new(AcceleratorManager::from_backend(SequentialBackend::new()));
        let engine = ComputeEngine::new(manager, config).unwrap();

        match engine.generate(center_real, center_imag, zoom) {
            GenerateOutcome::Success(s) => {
                prop_assert_eq!(s.data.len(), (width * height) as usize);
                prop_assert!(s.data.iter().all(|&n| n <= s.budget));
                prop_assert!((20..=80).contains(&s.budget));
            }
            GenerateOutcome::Failure(f) => prop_assert!(false, "unexpected failure: {}", f.error),
        }
    }
}
