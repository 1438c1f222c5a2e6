use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rnn_ukernels::activation::{apply_layer_norm, apply_sigmoid, apply_tanh3};
use rnn_ukernels::matmul::{
    hybrid_matrix_batch_vector_multiply_accumulate, matrix_batch_vector_multiply_accumulate,
    quantized_matrix_batch_vector_multiply_accumulate, BlockSparseMatrix, SPARSE_BLOCK_SIZE,
};
use rnn_ukernels::parallel::{par_hybrid_matrix_batch_vector_multiply_accumulate, par_matrix_batch_vector_multiply_accumulate};
use rnn_ukernels::quantize::symmetric_quantize;
use rnn_ukernels::Requant;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Kernel {
    Dense,
    Hybrid,
    Sparse,
    SparseHybrid,
    Quantized,
    Tanh,
    Sigmoid,
    LayerNorm,
}

#[derive(Parser, Debug)]
#[command(name = "kernel-bench", version, about = "Time and cross-check recurrent-cell micro-kernels")]
struct Args {
    /// Kernel to run
    #[arg(long, value_enum, default_value_t = Kernel::Dense)]
    kernel: Kernel,

    /// Matrix rows (output size)
    #[arg(long, default_value_t = 256)]
    rows: usize,

    /// Matrix columns (input size); sparse kernels need a multiple of 16
    #[arg(long, default_value_t = 256)]
    cols: usize,

    #[arg(long, default_value_t = 8)]
    batch: usize,

    #[arg(long, default_value_t = 200)]
    iters: usize,

    /// Threads for the batch-parallel drivers (dense and hybrid only)
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Fraction of 16-wide blocks zeroed before sparse encoding
    #[arg(long, default_value_t = 0.5)]
    sparsity: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write a JSON report here
    #[arg(long)]
    json: Option<PathBuf>,

    /// Compare against the reference path before timing
    #[arg(long, default_value_t = false)]
    check: bool,
}

#[derive(Serialize, Debug)]
struct Report {
    kernel: Kernel,
    rows: usize,
    cols: usize,
    batch: usize,
    iters: usize,
    threads: usize,
    density: Option<f64>,
    elapsed_s: f64,
    per_iter_us: f64,
    gmacs: f64,
    checksum: f64,
}

struct Data {
    matrix: Vec<f32>,
    vectors: Vec<f32>,
    matrix_q: Vec<i8>,
    vectors_q: Vec<i8>,
    scaling_factors: Vec<f32>,
    matrix_scale: f32,
}

fn gen_data(args: &Args, rng: &mut SmallRng) -> Result<Data> {
    let normal = Normal::new(0.0f32, 1.0).context("normal distribution")?;
    let mut matrix: Vec<f32> = (0..args.rows * args.cols).map(|_| normal.sample(rng)).collect();
    if matches!(args.kernel, Kernel::Sparse | Kernel::SparseHybrid) {
        for row in matrix.chunks_exact_mut(args.cols) {
            for block in row.chunks_exact_mut(SPARSE_BLOCK_SIZE) {
                if rng.gen_bool(args.sparsity) { block.fill(0.0); }
            }
        }
    }
    let vectors: Vec<f32> = (0..args.batch * args.cols).map(|_| normal.sample(rng)).collect();

    let mut matrix_q = vec![0i8; matrix.len()];
    let matrix_scale = symmetric_quantize(&matrix, &mut matrix_q).scale;
    let mut vectors_q = vec![0i8; vectors.len()];
    let mut scaling_factors = Vec::with_capacity(args.batch);
    for (v, q) in vectors.chunks_exact(args.cols).zip(vectors_q.chunks_exact_mut(args.cols)) {
        scaling_factors.push(symmetric_quantize(v, q).scale * matrix_scale);
    }
    Ok(Data { matrix, vectors, matrix_q, vectors_q, scaling_factors, matrix_scale })
}

fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max) }

fn check(args: &Args, data: &Data) -> Result<()> {
    let (rows, cols, batch) = (args.rows, args.cols, args.batch);
    let mut want = vec![0.0f32; rows * batch];
    let mut got = vec![0.0f32; rows * batch];
    match args.kernel {
        Kernel::Dense => {
            matrix_batch_vector_multiply_accumulate(&data.matrix, rows, cols, &data.vectors, batch, &mut want, 1);
            par_matrix_batch_vector_multiply_accumulate(&data.matrix, rows, cols, &data.vectors, batch, &mut got, 1);
        }
        Kernel::Hybrid => {
            let (m, v, s) = (&data.matrix_q, &data.vectors_q, &data.scaling_factors);
            hybrid_matrix_batch_vector_multiply_accumulate(m, rows, cols, v, s, batch, &mut want, 1);
            par_hybrid_matrix_batch_vector_multiply_accumulate(m, rows, cols, v, s, batch, &mut got, 1);
        }
        Kernel::Sparse => {
            let sparse = BlockSparseMatrix::from_dense(&data.matrix, rows, cols).context("encode sparse matrix")?;
            matrix_batch_vector_multiply_accumulate(&data.matrix, rows, cols, &data.vectors, batch, &mut want, 1);
            sparse.multiply_accumulate(&data.vectors, batch, &mut got, 1);
        }
        Kernel::SparseHybrid => {
            let sparse = BlockSparseMatrix::from_dense(&data.matrix_q, rows, cols).context("encode sparse matrix")?;
            let (v, s) = (&data.vectors_q, &data.scaling_factors);
            hybrid_matrix_batch_vector_multiply_accumulate(&data.matrix_q, rows, cols, v, s, batch, &mut want, 1);
            sparse.hybrid_multiply_accumulate(v, s, batch, &mut got, 1);
        }
        _ => {
            info!("no reference path for {:?}, skipping check", args.kernel);
            return Ok(());
        }
    }
    // Sparse sums skip zero blocks, so float rounding may differ slightly
    let diff = max_abs_diff(&want, &got);
    if diff > 1e-3 {
        bail!("{:?} disagrees with reference: max abs diff {}", args.kernel, diff);
    }
    info!("check passed for {:?} (max abs diff {})", args.kernel, diff);
    Ok(())
}

fn run(args: &Args, data: &Data, rng: &mut SmallRng) -> Result<(f64, Option<f64>)> {
    let (rows, cols, batch) = (args.rows, args.cols, args.batch);
    let pb = ProgressBar::new(args.iters as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .context("progress template")?,
    );
    pb.set_message(format!("{:?}", args.kernel));

    let mut result = vec![0.0f32; rows * batch];
    let mut density = None;
    let checksum = match args.kernel {
        Kernel::Dense | Kernel::Hybrid => {
            let parallel = args.threads > 1;
            for _ in 0..args.iters {
                match (args.kernel, parallel) {
                    (Kernel::Dense, false) => matrix_batch_vector_multiply_accumulate(
                        &data.matrix, rows, cols, &data.vectors, batch, &mut result, 1,
                    ),
                    (Kernel::Dense, true) => par_matrix_batch_vector_multiply_accumulate(
                        &data.matrix, rows, cols, &data.vectors, batch, &mut result, 1,
                    ),
                    (_, false) => hybrid_matrix_batch_vector_multiply_accumulate(
                        &data.matrix_q, rows, cols, &data.vectors_q, &data.scaling_factors, batch, &mut result, 1,
                    ),
                    (_, true) => par_hybrid_matrix_batch_vector_multiply_accumulate(
                        &data.matrix_q, rows, cols, &data.vectors_q, &data.scaling_factors, batch, &mut result, 1,
                    ),
                }
                pb.inc(1);
            }
            result.iter().map(|&v| v as f64).sum()
        }
        Kernel::Sparse => {
            let sparse = BlockSparseMatrix::from_dense(&data.matrix, rows, cols).context("encode sparse matrix")?;
            density = Some(sparse.density());
            for _ in 0..args.iters {
                sparse.multiply_accumulate(&data.vectors, batch, &mut result, 1);
                pb.inc(1);
            }
            result.iter().map(|&v| v as f64).sum()
        }
        Kernel::SparseHybrid => {
            let sparse = BlockSparseMatrix::from_dense(&data.matrix_q, rows, cols).context("encode sparse matrix")?;
            density = Some(sparse.density());
            for _ in 0..args.iters {
                sparse.hybrid_multiply_accumulate(&data.vectors_q, &data.scaling_factors, batch, &mut result, 1);
                pb.inc(1);
            }
            result.iter().map(|&v| v as f64).sum()
        }
        Kernel::Quantized => {
            let requant = Requant::from_scale(data.matrix_scale as f64 * 4.0);
            let mut out = vec![0i8; rows * batch];
            for _ in 0..args.iters {
                out.fill(0);
                quantized_matrix_batch_vector_multiply_accumulate(
                    &data.vectors_q, None, &data.matrix_q, requant, batch, cols, rows, 0, &mut out,
                );
                pb.inc(1);
            }
            out.iter().map(|&v| v as f64).sum()
        }
        Kernel::Tanh | Kernel::Sigmoid | Kernel::LayerNorm => {
            let input: Vec<i16> = (0..batch * cols).map(|_| rng.gen_range(-16384..16384)).collect();
            let weights: Vec<i16> = (0..cols).map(|_| rng.gen_range(16384..32767)).collect();
            let bias = vec![0i32; cols];
            let mut out = vec![0i16; batch * cols];
            for _ in 0..args.iters {
                match args.kernel {
                    Kernel::Tanh => apply_tanh3(&input, batch, cols, &mut out),
                    Kernel::Sigmoid => apply_sigmoid(&input, batch, cols, &mut out),
                    _ => apply_layer_norm(&input, &weights, &bias, 1 << 30, -13, 1, batch, cols, &mut out),
                }
                pb.inc(1);
            }
            out.iter().map(|&v| v as f64).sum()
        }
    };
    pb.finish_and_clear();
    Ok((checksum, density))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.rows == 0 || args.cols == 0 || args.batch == 0 {
        bail!("rows, cols and batch must be positive");
    }
    if matches!(args.kernel, Kernel::Sparse | Kernel::SparseHybrid) && args.cols % SPARSE_BLOCK_SIZE != 0 {
        bail!("sparse kernels need cols to be a multiple of {}", SPARSE_BLOCK_SIZE);
    }
    if !(0.0..=1.0).contains(&args.sparsity) {
        bail!("sparsity must be within [0, 1], got {}", args.sparsity);
    }

    let mut rng = SmallRng::seed_from_u64(args.seed);
    let data = gen_data(&args, &mut rng)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads.max(1))
        .build()
        .context("build thread pool")?;

    if args.check {
        pool.install(|| check(&args, &data))?;
    }

    let t0 = Instant::now();
    let (checksum, density) = pool.install(|| run(&args, &data, &mut rng))?;
    let dt = t0.elapsed().as_secs_f64();

    let macs = match args.kernel {
        Kernel::Tanh | Kernel::Sigmoid | Kernel::LayerNorm => args.batch * args.cols,
        _ => args.rows * args.cols * args.batch,
    } as f64;
    let per_iter = if args.iters > 0 { dt / args.iters as f64 } else { 0.0 };
    let report = Report {
        kernel: args.kernel,
        rows: args.rows,
        cols: args.cols,
        batch: args.batch,
        iters: args.iters,
        threads: args.threads.max(1),
        density,
        elapsed_s: dt,
        per_iter_us: per_iter * 1e6,
        gmacs: if per_iter > 0.0 { macs / per_iter / 1e9 } else { 0.0 },
        checksum,
    };
    info!("{:?}: {:.3}s total, {:.2}us/iter", report.kernel, report.elapsed_s, report.per_iter_us);
    println!(
        "kernel={:?} rows={} cols={} batch={} iters={} elapsed={:.3}s per_iter={:.2}us gmacs={:.3} checksum={:.4}",
        report.kernel, report.rows, report.cols, report.batch, report.iters, report.elapsed_s, report.per_iter_us,
        report.gmacs, report.checksum
    );

    if let Some(path) = args.json.as_ref() {
        let text = serde_json::to_string_pretty(&report).context("serialize report")?;
        std::fs::write(path, text).with_context(|| format!("write report to {}", path.display()))?;
        info!("wrote report to {}", path.display());
    }
    Ok(())
}
