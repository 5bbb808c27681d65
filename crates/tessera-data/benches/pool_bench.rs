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

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tessera_data::{DynamicHandleObjectSet, HandleObjectSet};

#[derive(Debug, Clone, Copy, Default)]
struct Transform([f32; 16]);

fn bench_pools(c: &mut Criterion) {
    let mut group = c.benchmark_group("Handle Object Sets");

    group.bench_function("fixed create+free (1024)", |b| {
        let pool = HandleObjectSet::<Transform, 1024>::new();
        b.iter(|| {
            let handles: Vec<_> = (0..1024).map(|_| pool.create(Transform::default())).collect();
            for handle in handles {
                black_box(pool.free(handle));
            }
        });
    });

    group.bench_function("dynamic create+free (1024)", |b| {
        let pool = DynamicHandleObjectSet::<Transform, 256>::new();
        b.iter(|| {
            let handles: Vec<_> = (0..1024).map(|_| pool.create(Transform::default())).collect();
            for handle in handles {
                black_box(pool.free(handle));
            }
        });
    });

    let pool = DynamicHandleObjectSet::<Transform, 256>::new();
    let handles: Vec<_> = (0..10_000).map(|_| pool.create(Transform::default())).collect();
    group.bench_function("dynamic fetch (10k)", |b| {
        b.iter(|| {
            let mut sum = 0.0;
            for handle in &handles {
                if let Some(transform) = pool.fetch(*handle) {
                    sum += transform.0[0];
                }
            }
            black_box(sum)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_pools);
criterion_main!(benches);
