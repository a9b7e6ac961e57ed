//! Builds a random triangle soup with every builder, then dumps the AAC tree
//! next to the given path (`aac.bin` by default): binary, text and Graphviz
//! (`.dot`) renditions.
//!
//! ```text
//! RUST_LOG=info cargo run --example aac_dump --features metrics -- out.bin
//! ```

use std::env;
use std::error::Error;
use std::path::Path;

use bvhkit::{AacBuilder, BuilderKind, BvhConfig, BvhPrinter, TriangleMesh};
use glam::vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TRIANGLES: u32 = 10_000;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| "aac.bin".into());
    let mesh = triangle_soup(TRIANGLES)?;
    let triangles = mesh.triangles();

    for kind in BuilderKind::all() {
        let Some(root) = BvhConfig::new(kind).build(&triangles)? else {
            continue;
        };

        let stats = root.stats();

        println!(
            "{:>14}: nodes = {:>6}, depth = {:>3}, sah-cost = {:.2}",
            kind.name(),
            stats.nodes,
            stats.depth,
            stats.sah_cost
        );
    }

    let tree = AacBuilder::default().prepare_mesh(&mesh)?.build()?;

    tree.save(&path)?;

    println!("AAC tree ({} nodes) saved to {path}", tree.len());

    if let Some(root) = tree.to_bvh() {
        let dot_path = Path::new(&path).with_extension("dot");

        BvhPrinter::save(&root, &dot_path)?;

        println!("AAC graph saved to {}", dot_path.display());
    }

    Ok(())
}

fn triangle_soup(len: u32) -> Result<TriangleMesh, Box<dyn Error>> {
    let mut rng = StdRng::seed_from_u64(0);
    let mut vertices = Vec::new();
    let mut faces = Vec::new();

    for i in 0..len {
        let origin = vec3(
            rng.gen_range(0.0..100.0),
            rng.gen_range(0.0..100.0),
            rng.gen_range(0.0..100.0),
        );

        for _ in 0..3 {
            let offset = vec3(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );

            vertices.push(origin + offset);
        }

        faces.push([3 * i, 3 * i + 1, 3 * i + 2]);
    }

    Ok(TriangleMesh::new(vertices, faces)?)
}
