/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

mod admission_bench;
mod cache_bench;

use criterion::{criterion_group, criterion_main};

criterion_group!(
    benches,
    admission_bench::bench_admission,
    admission_bench::bench_purchase,
    admission_bench::bench_id_generation,
    cache_bench::bench_cache_hit,
);
criterion_main!(benches);
