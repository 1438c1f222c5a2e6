use pretty_assertions::assert_eq;

// Every other 16-wide block per row, alternating between rows. The count byte
// is max_chunks / 2, so rows with an odd number of chunks under-report one block.
struct SparseData {
    matrix: Vec<i8>,
    zeroed_matrix: Vec<i8>,
    sparse_matrix: Vec<i8>,
    ledger: Vec<u8>,
    vectors: Vec<i8>,
    scale_factors: Vec<f32>,
}

fn setup_sparse_data(rows: usize, cols: usize, batch: usize, negative: bool) -> SparseData {
    let matrix: Vec<i8> = (0..rows * cols)
        .map(|i| {
            let sign = if i % 3 == 0 && negative { -1 } else { 1 };
            (sign * (i % 70) as i32) as i8
        })
        .collect();
    let vectors = (0..cols * batch)
        .map(|i| {
            let sign = if i % 5 == 0 && negative { -1 } else { 1 };
            (sign * (i % 50) as i32) as i8
        })
        .collect();
    let mut zeroed_matrix = matrix.clone();
    let mut sparse_matrix = Vec::new();
    let mut ledger = Vec::new();
    for i in 0..rows {
        let max_chunks = cols / 16;
        ledger.push((max_chunks / 2) as u8);
        for j in 0..max_chunks {
            let chunk = i * cols + j * 16..i * cols + j * 16 + 16;
            if j % 2 == i % 2 {
                ledger.push(j as u8);
                sparse_matrix.extend_from_slice(&matrix[chunk]);
            } else {
                zeroed_matrix[chunk].fill(0);
            }
        }
    }
    let scale_factors = (0..batch).map(|b| (b % 8 + 1) as f32).collect();
    SparseData { matrix, zeroed_matrix, sparse_matrix, ledger, vectors, scale_factors }
}

fn sparse_dotprod(rows: usize, cols: usize, batch: usize, negative: bool) -> Vec<f32> {
    use rnn_ukernels::matmul::sparse_hybrid_matrix_batch_vector_multiply_accumulate;
    let d = setup_sparse_data(rows, cols, batch, negative);
    let mut results = vec![0.0f32; rows * batch];
    sparse_hybrid_matrix_batch_vector_multiply_accumulate(
        &d.sparse_matrix, &d.ledger, rows, cols, &d.vectors, &d.scale_factors, batch, &mut results, 1,
    );
    results
}

fn as_f32(v: &[i64]) -> Vec<f32> { v.iter().map(|&x| x as f32).collect() }

#[test]
fn sparse_hybrid_dotprod_matches_reference() {
    assert_eq!(sparse_dotprod(1, 16, 1, false), as_f32(&[0]));
    assert_eq!(sparse_dotprod(1, 32, 1, false), as_f32(&[1240]));
    assert_eq!(sparse_dotprod(1, 64, 1, false), as_f32(&[26544]));
    assert_eq!(sparse_dotprod(1, 64, 2, false), as_f32(&[26544, 24344]));
    assert_eq!(
        sparse_dotprod(4, 64, 4, false),
        as_f32(&[
            26544, 15866, 22140, 11408, 24344, 53248, 42704, 39900, 48000, 94146, 101892, 81876, 87712, 105160,
            148304, 75936,
        ])
    );
    assert_eq!(sparse_dotprod(1, 64, 1, true), as_f32(&[8764]));
    assert_eq!(sparse_dotprod(2, 64, 2, true), as_f32(&[8764, 5196, 7204, 11148]));
}

#[test]
fn sparse_hybrid_equals_dense_on_zeroed_matrix() {
    use rnn_ukernels::matmul::{
        hybrid_matrix_batch_vector_multiply_accumulate, sparse_hybrid_matrix_batch_vector_multiply_accumulate,
    };
    let (rows, cols, batch) = (6, 128, 3);
    let d = setup_sparse_data(rows, cols, batch, true);
    let mut dense = vec![1.5f32; rows * batch * 2];
    let mut sparse = dense.clone();
    hybrid_matrix_batch_vector_multiply_accumulate(
        &d.zeroed_matrix, rows, cols, &d.vectors, &d.scale_factors, batch, &mut dense, 2,
    );
    sparse_hybrid_matrix_batch_vector_multiply_accumulate(
        &d.sparse_matrix, &d.ledger, rows, cols, &d.vectors, &d.scale_factors, batch, &mut sparse, 2,
    );
    assert_eq!(dense, sparse);
    assert_ne!(d.matrix, d.zeroed_matrix);
}

#[test]
fn encoder_reproduces_alternating_ledger() {
    use rnn_ukernels::matmul::BlockSparseMatrix;
    let d = setup_sparse_data(4, 64, 1, false);
    let m = BlockSparseMatrix::from_dense(&d.zeroed_matrix, 4, 64).unwrap();
    assert_eq!(m.ledger(), &d.ledger[..]);
    assert_eq!(m.values(), &d.sparse_matrix[..]);
    assert_eq!(m.to_dense(), d.zeroed_matrix);
    assert_eq!(m.kept_blocks(), 8);
    assert!((m.density() - 0.5).abs() < 1e-12);
    m.validate().unwrap();
}

static FLOAT_MATRIX: [f32; 4 * 48] = [
    // row 0
    1.1, 2.2, 3.3, 4.4, 5.5, 6.6, 7.7, 8.8, 9.9, 10.1, 11.11, 12.12, 13.13, 14.14, 15.15, 16.16, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 33.33, 34.34, 35.35, 36.36, 37.37, 38.38, 39.39, 40.40,
    41.41, 42.42, 43.43, 44.44, 0.0, 0.0, 0.0, 0.0,
    // row 1
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -17.17, -18.18, -19.19, -20.2,
    -21.21, -22.22, -23.23, -24.24, -25.25, -26.26, -27.27, -28.28, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    // row 2
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 17.17, -18.18, 19.19, -20.2, 21.21,
    -22.22, 23.23, -24.24, 25.25, -26.26, 27.27, -28.28, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    // row 3
    -1.1, 2.2, -3.3, 4.4, -5.5, 6.6, -7.7, 8.8, -9.9, 10.1, -11.11, 12.12, -13.13, 14.14, -15.15, 16.16, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -33.33, 34.34, -35.35, 36.36, -37.37, 38.38,
    -39.39, 40.40, -41.41, 42.42, -43.43, 44.44, 0.0, 0.0, 0.0, 0.0,
];

static FLOAT_LEDGER: [u8; 10] = [2, 0, 2, 1, 1, 1, 1, 2, 0, 2];

static FLOAT_VECTOR: [f32; 2 * 48] = [
    // batch 0
    1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0,
    -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0,
    1.0, -1.0, 1.0, -1.0, 1.0, -1.0,
    // batch 1
    2.5, 0.0, -2.1, 0.0, 3.0, 0.0, -1.3, 0.0, 1.3, 0.0, -1.1, 0.0, 2.0, 0.0, -1.7, 0.0, 1.9, 0.0, -1.5, 0.0, 0.5, 0.0,
    -0.7, 0.0, 0.8, 0.0, -0.3, 0.0, 2.8, 0.0, -2.8, 0.0, 1.1, -2.3, 1.9, -1.9, 2.1, -0.5, 2.4, -0.1, 1.0, -2.5, 0.7,
    -1.9, 0.2, 0.0, 0.1, 0.2,
];

fn assert_near(got: &[f32], want: &[f32], tol: f32) {
    assert_eq!(got.len(), want.len());
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        assert!((g - w).abs() <= tol, "index {}: got {} want {}", i, g, w);
    }
}

#[test]
fn sparse_float_matmul_matches_dense() {
    use rnn_ukernels::matmul::{matrix_batch_vector_multiply_accumulate, sparse_matrix_batch_vector_multiply_accumulate};
    let values: Vec<f32> = {
        let m = rnn_ukernels::matmul::BlockSparseMatrix::from_parts(
            FLOAT_LEDGER.to_vec(),
            // rows 0 and 3 keep blocks 0 and 2, rows 1 and 2 keep block 1
            [(0, 0), (0, 2), (1, 1), (2, 1), (3, 0), (3, 2)]
                .iter()
                .flat_map(|&(r, b)| FLOAT_MATRIX[r * 48 + b * 16..r * 48 + b * 16 + 16].iter().copied())
                .collect(),
            4,
            48,
        )
        .unwrap();
        assert_eq!(m.to_dense(), FLOAT_MATRIX.to_vec());
        m.values().to_vec()
    };

    let mut dense_output = vec![0.0f32; 8];
    matrix_batch_vector_multiply_accumulate(&FLOAT_MATRIX, 4, 48, &FLOAT_VECTOR, 2, &mut dense_output, 1);
    assert_near(&dense_output, &[-13.69, 6.06001, 272.7, -608.03, -9.66602, -10.201, 10.201, -713.897949], 1e-4);

    let mut sparse_output = vec![0.0f32; 8];
    sparse_matrix_batch_vector_multiply_accumulate(&values, &FLOAT_LEDGER, 4, 48, &FLOAT_VECTOR, 2, &mut sparse_output, 1);
    assert_near(&sparse_output, &dense_output, 1e-4);
}

#[test]
fn sparse_hybrid_quantized_matrix() {
    use rnn_ukernels::matmul::{hybrid_matrix_batch_vector_multiply_accumulate, BlockSparseMatrix};
    #[rustfmt::skip]
    let quantized_matrix: [i8; 4 * 48] = [
        3, 6, 9, 13, 16, 19, 22, 25, 28, 29, 32, 35, 38, 40, 43, 46, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        95, 98, 101, 104, 107, 110, 113, 115, 118, 121, 124, 127, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, -49, -52, -55, -58, -61, -64, -66, -69, -72, -75, -78, -81,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 49, -52, 55, -58, 61, -64, 66, -69, 72, -75, 78, -81,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        -3, 6, -9, 13, -16, 19, -22, 25, -28, 29, -32, 35, -38, 40, -43, 46, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, -95, 98, -101, 104, -107, 110, -113, 115, -118, 121, -124, 127, 0, 0, 0, 0,
    ];
    #[rustfmt::skip]
    let quantized_vector: [i8; 2 * 48] = [
        127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127,
        127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127, 127, -127,
        127, -127, 127, -127, 127, -127, 127, -127,
        106, 0, -89, 0, 127, 0, -55, 0, 55, 0, -47, 0, 85, 0, -72, 0, 80, 0, -64, 0, 21, 0, -30, 0, 34, 0, -13, 0,
        119, 0, -119, 0, 47, -97, 80, -80, 89, -21, 102, -4, 42, -106, 30, -80, 8, 1, 2, 3,
    ];
    let matrix_scaling_factor = 0.349921f32;
    let scaling = [matrix_scaling_factor * 0.00787402, matrix_scaling_factor * 0.023622];
    let expected = [-13.646927f32, 6.298582, 272.938538, -607.813110, -6.637464, -9.381721, 9.381721, -713.845642];

    let mut dense_output = vec![0.0f32; 8];
    hybrid_matrix_batch_vector_multiply_accumulate(&quantized_matrix, 4, 48, &quantized_vector, &scaling, 2, &mut dense_output, 1);
    assert_near(&dense_output, &expected, 1e-3);

    let sparse = BlockSparseMatrix::from_dense(&quantized_matrix, 4, 48).unwrap();
    assert_eq!(sparse.ledger(), &FLOAT_LEDGER[..]);
    let mut sparse_output = vec![0.0f32; 8];
    sparse.hybrid_multiply_accumulate(&quantized_vector, &scaling, 2, &mut sparse_output, 1);
    assert_near(&sparse_output, &expected, 1e-3);
}

#[test]
fn sparse_quantized_matches_dense_quantized() {
    use rnn_ukernels::fixed_point::Requant;
    use rnn_ukernels::matmul::{
        quantized_matrix_batch_vector_multiply_accumulate, sparse_quantized_matrix_batch_vector_multiply_accumulate,
        BlockSparseMatrix,
    };
    let (rows, cols, batch) = (5, 64, 3);
    let d = setup_sparse_data(rows, cols, batch, true);
    let sparse = BlockSparseMatrix::from_dense(&d.zeroed_matrix, rows, cols).unwrap();
    let bias: Vec<i32> = (0..rows as i32).map(|r| r * 100 - 250).collect();
    let requant = Requant::from_scale(1.0 / 512.0);

    let mut dense_out = vec![3i16; rows * batch];
    let mut sparse_out = dense_out.clone();
    quantized_matrix_batch_vector_multiply_accumulate(
        &d.vectors, Some(&bias), &d.zeroed_matrix, requant, batch, cols, rows, 7, &mut dense_out,
    );
    sparse_quantized_matrix_batch_vector_multiply_accumulate(
        &d.vectors, Some(&bias), sparse.values(), sparse.ledger(), requant, batch, cols, rows, 7, &mut sparse_out,
    );
    assert_eq!(dense_out, sparse_out);
}

#[test]
fn all_zero_rows_encode_to_empty_ledger_entries() {
    use rnn_ukernels::matmul::BlockSparseMatrix;
    let m = BlockSparseMatrix::<f32>::from_dense(&[0.0; 3 * 32], 3, 32).unwrap();
    assert_eq!(m.ledger(), &[0u8, 0, 0][..]);
    assert!(m.values().is_empty());
    assert_eq!(m.density(), 0.0);
    let mut out = vec![2.0f32; 3];
    m.multiply_accumulate(&[1.0; 32], 1, &mut out, 1);
    assert_eq!(out, vec![2.0; 3]);
}

#[test]
fn encoder_rejects_bad_shapes() {
    use rnn_ukernels::matmul::BlockSparseMatrix;
    use rnn_ukernels::SparseError;
    assert_eq!(
        BlockSparseMatrix::<i8>::from_dense(&[0; 20], 1, 20).unwrap_err(),
        SparseError::ColumnsNotBlockAligned { cols: 20, block: 16 }
    );
    assert_eq!(
        BlockSparseMatrix::<i8>::from_dense(&[0; 20], 2, 16).unwrap_err(),
        SparseError::BufferSize { expected: 32, actual: 20 }
    );
}

#[test]
fn ledger_validation_catches_malformed_ledgers() {
    use rnn_ukernels::matmul::validate_ledger;
    use rnn_ukernels::SparseError;
    // 2 rows x 48 cols => 3 blocks per row
    assert_eq!(validate_ledger(&[1, 0, 2, 0, 2], 2, 48, 48), Ok(()));
    assert_eq!(validate_ledger(&[1, 3, 0], 2, 48, 16), Err(SparseError::BlockOutOfRange { row: 0, block: 3, blocks_per_row: 3 }));
    assert_eq!(validate_ledger(&[2, 1, 1, 0], 2, 48, 32), Err(SparseError::BlockOrder { row: 0, block: 1 }));
    assert_eq!(validate_ledger(&[2, 2, 1, 0], 2, 48, 32), Err(SparseError::BlockOrder { row: 0, block: 1 }));
    assert_eq!(validate_ledger(&[4, 0, 1, 2, 2, 0], 2, 48, 64), Err(SparseError::TooManyBlocks { row: 0, count: 4, blocks_per_row: 3 }));
    assert_eq!(validate_ledger(&[1, 0], 2, 48, 16), Err(SparseError::LedgerTruncated { row: 1 }));
    assert_eq!(validate_ledger(&[1, 0, 2, 0], 2, 48, 48), Err(SparseError::LedgerTruncated { row: 1 }));
    assert_eq!(validate_ledger(&[0, 0, 7], 2, 48, 0), Err(SparseError::TrailingLedgerBytes { extra: 1 }));
    assert_eq!(validate_ledger(&[1, 0, 0], 2, 48, 20), Err(SparseError::ValueCount { expected: 16, actual: 20 }));
    assert_eq!(validate_ledger(&[0], 1, 40, 0), Err(SparseError::ColumnsNotBlockAligned { cols: 40, block: 16 }));
}

#[test]
fn from_parts_validates() {
    use rnn_ukernels::matmul::BlockSparseMatrix;
    assert!(BlockSparseMatrix::<f32>::from_parts(vec![1, 0], vec![0.0; 16], 1, 16).is_ok());
    let err = BlockSparseMatrix::<f32>::from_parts(vec![1, 0], vec![0.0; 15], 1, 16).unwrap_err();
    assert_eq!(err.to_string(), "value buffer holds 15 values, ledger describes 16");
}
