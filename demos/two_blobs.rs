//! # Two-blob clustering walkthrough
//!
//! Draws two well-separated Gaussian-ish blobs, runs every stage of the
//! pipeline on one arena, and prints the cluster each point lands in along
//! with what the arena held at the end.
//!
//! ```bash
//! cargo run --example two_blobs
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use symnmf::factorize::assign_clusters;
use symnmf::report::write_matrix;
use symnmf::{Goal, GoalOutput, Pipeline, PipelineConfig, PoolKind};

// ── Data ─────────────────────────────────────────────────────────────────────

fn blobs(rng: &mut StdRng, per_blob: usize) -> Vec<Vec<f64>> {
    let centres = [(0.0, 0.0), (7.0, 3.0)];
    let mut points = Vec::with_capacity(per_blob * centres.len());
    for (cx, cy) in centres {
        for _ in 0..per_blob {
            points.push(vec![
                cx + rng.gen_range(-0.6..0.6),
                cy + rng.gen_range(-0.6..0.6),
            ]);
        }
    }
    points
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(2026);
    let points = blobs(&mut rng, 8);

    let mut pipeline = Pipeline::new(PipelineConfig::default());

    // ── Normalized similarity ────────────────────────────────────────────────
    let p = pipeline.load_rows(&points)?;
    if let GoalOutput::Matrix(w) = pipeline.run(p, Goal::Norm, None)? {
        println!("normalized similarity (first 4 rows):");
        let mut out = Vec::new();
        write_matrix(&mut out, pipeline.arena(), w)?;
        for line in String::from_utf8_lossy(&out).lines().take(4) {
            println!("  {line}");
        }
    }
    pipeline.reset();

    // ── Factorization ────────────────────────────────────────────────────────
    let p = pipeline.load_rows(&points)?;
    let GoalOutput::Association(result) = pipeline.run(p, Goal::Symnmf, Some(2))? else {
        unreachable!("symnmf always yields an association matrix");
    };

    println!(
        "\nfactorization: {} iterations, converged = {}, last step = {:.2e}",
        result.iterations, result.converged, result.last_delta
    );

    let labels = assign_clusters(pipeline.arena(), result.matrix);
    for (point, label) in points.iter().zip(&labels) {
        println!("  ({:6.2}, {:6.2}) -> cluster {label}", point[0], point[1]);
    }

    let stats = pipeline.arena().stats();
    println!(
        "\narena: {} buffers, {} tables, {} headers, {} bytes",
        stats.live_in(PoolKind::Scalar),
        stats.live_in(PoolKind::RowTable),
        stats.live_in(PoolKind::Header),
        stats.bytes_in_use
    );

    pipeline.finish();
    Ok(())
}
