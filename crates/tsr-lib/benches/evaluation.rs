use criterion::{criterion_group, criterion_main, Criterion};
use once_cell::sync::Lazy;
use std::hint::black_box;
use tsr_lib::{
    find_route, CostModel, EdgeGeometry, EvalContext, FeatureConfig, Point3, RasterSources,
    RouteState, SearchOptions, TriangleMesh,
};

const GRID: usize = 60;

static MODEL: Lazy<CostModel> = Lazy::new(|| {
    FeatureConfig::hiking()
        .and_then(|config| config.build(&RasterSources::new()))
        .expect("built-in model")
});

static MESH: Lazy<TriangleMesh> = Lazy::new(|| {
    let mut vertices = Vec::with_capacity(GRID * GRID);
    for row in 0..GRID {
        for col in 0..GRID {
            let (x, y) = (col as f64 * 10.0, row as f64 * 10.0);
            let z = 15.0 * (x / 90.0).sin() + 10.0 * (y / 70.0).cos();
            vertices.push(Point3::new(x, y, z));
        }
    }
    let mut faces = Vec::new();
    for row in 0..GRID - 1 {
        for col in 0..GRID - 1 {
            let a = row * GRID + col;
            faces.push([a, a + 1, a + GRID + 1]);
            faces.push([a, a + GRID + 1, a + GRID]);
        }
    }
    TriangleMesh::new(vertices, faces).expect("grid mesh")
});

fn benchmark_evaluation(c: &mut Criterion) {
    let model = &*MODEL;

    c.bench_function("hiking_edge_cost", |b| {
        let ctx = EvalContext::Edge(EdgeGeometry {
            face: None,
            source: Point3::new(0.0, 0.0, 0.0),
            target: Point3::new(10.0, 0.0, 3.0),
        });
        b.iter(|| black_box(model.cost(black_box(&ctx)).expect("edge cost")));
    });

    c.bench_function("hiking_grid_search", |b| {
        let mesh = &*MESH;
        let goal = GRID * GRID - 1;
        b.iter(|| {
            let mut state = RouteState::new(0, goal);
            let stats = find_route(mesh, model, &mut state, &SearchOptions::default())
                .expect("route exists");
            black_box(stats.expansions)
        });
    });
}

criterion_group!(benches, benchmark_evaluation);
criterion_main!(benches);
