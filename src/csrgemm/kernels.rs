//! CSRGEMM device kernels
//!
//! Each row group runs with its own [`GroupKernel`] geometry:
//!
//! | group | shape         | block | wavefront | hash slots |
//! |-------|---------------|-------|-----------|------------|
//! | 0     | WfPerRow      | 128   | 8         | 32         |
//! | 1     | WfPerRow      | 128   | 32        | 64         |
//! | 2     | BlockPerRow   | 128   | 16        | 512        |
//! | 3     | BlockPerRow   | 256   | 32        | 1024       |
//! | 4     | BlockPerRow   | 512   | 32        | 2048       |
//! | 5     | BlockPerRow   | 1024  | 32        | 4096       |
//! | 6     | BlockPerRow   | 1024  | 64        | 8192       |
//! | 7     | Global        | 1024  | 64        | per call   |
//!
//! The symbolic kernels count the distinct columns of each row with a
//! [`HashTable`]; the numeric kernels accumulate values in a [`PairTable`]
//! and write the row sorted by column.

use std::ops::Range;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::constants::{CSRGEMM_DIM, CSRGEMM_GLOBAL_DIM, CSRGEMM_GLOBAL_SUB, CSRGEMM_GROUPS};
use crate::csrgemm::hash::{HashTable, PairTable};
use crate::device::memory::GlobalMut;
use crate::device::reduce::wf_reduce_sum;
use crate::device::{grid_size, Scalar, Stream};
use crate::matrix::{CsrPattern, CsrRef};

/// How the lanes of a kernel map onto rows of C
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelShape {
    /// One wavefront per row, several rows per block
    WfPerRow,
    /// One block per row
    BlockPerRow,
    /// One block per row with a table sized at launch
    Global,
}

/// Launch geometry of one row group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupKernel {
    /// Lane-to-row mapping
    pub shape: KernelShape,
    /// Lanes per block
    pub block: usize,
    /// Lanes per wavefront; caps the lanes on one row for [`KernelShape::WfPerRow`]
    pub wavefront: usize,
    /// Hash table slots; zero for the global group, sized per call
    pub hash: usize,
}

impl GroupKernel {
    const fn new(shape: KernelShape, block: usize, wavefront: usize, hash: usize) -> Self {
        Self {
            shape,
            block,
            wavefront,
            hash,
        }
    }

    /// Same geometry with wavefronts no wider than the device's
    pub fn for_device(self, wavefront_size: u32) -> Self {
        Self {
            wavefront: self.wavefront.min(wavefront_size as usize),
            ..self
        }
    }

    /// Lanes cooperating on one row
    pub fn lanes_per_row(&self) -> usize {
        match self.shape {
            KernelShape::WfPerRow => self.wavefront,
            KernelShape::BlockPerRow | KernelShape::Global => self.block,
        }
    }

    /// Rows handled by one block
    pub fn rows_per_block(&self) -> usize {
        match self.shape {
            KernelShape::WfPerRow => self.block / self.wavefront,
            KernelShape::BlockPerRow | KernelShape::Global => 1,
        }
    }
}

/// Kernel geometry of every row group
pub const GROUP_KERNELS: [GroupKernel; CSRGEMM_GROUPS] = [
    GroupKernel::new(KernelShape::WfPerRow, 128, 8, 32),
    GroupKernel::new(KernelShape::WfPerRow, 128, 32, 64),
    GroupKernel::new(KernelShape::BlockPerRow, 128, 16, 512),
    GroupKernel::new(KernelShape::BlockPerRow, 256, 32, 1024),
    GroupKernel::new(KernelShape::BlockPerRow, 512, 32, 2048),
    GroupKernel::new(KernelShape::BlockPerRow, 1024, 32, 4096),
    GroupKernel::new(KernelShape::BlockPerRow, 1024, 64, 8192),
    GroupKernel::new(KernelShape::Global, CSRGEMM_GLOBAL_DIM, CSRGEMM_GLOBAL_SUB, 0),
];

/// Rows a group kernel iterates over
#[derive(Debug, Clone, Copy)]
pub(crate) enum Rows<'a> {
    /// Rows `0..m` in order
    All(usize),
    /// Rows listed by a group permutation
    Subset(&'a [i32]),
}

impl Rows<'_> {
    pub fn len(&self) -> usize {
        match self {
            Rows::All(m) => *m,
            Rows::Subset(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, idx: usize) -> usize {
        match self {
            Rows::All(_) => idx,
            Rows::Subset(rows) => rows[idx] as usize,
        }
    }
}

/// One contribution to a row of C
#[derive(Debug, Clone, Copy)]
pub(crate) enum Term {
    /// `A[i, k] * B[k, j]` from entries `ja` of A and `jb` of B
    Product { ja: usize, jb: usize },
    /// `D[i, j]` from entry `jd` of D
    Addend { jd: usize },
}

/// Structure of the operands that contribute to C
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TermPatterns<'a> {
    pub ab: Option<(CsrPattern<'a>, CsrPattern<'a>)>,
    pub d: Option<CsrPattern<'a>>,
}

impl TermPatterns<'_> {
    /// Visits every term of `row` as lane `tid` of `kernel` would produce it
    ///
    /// `visit` receives the lane, the zero-based column of C and the term.
    fn visit_row<F>(&self, kernel: &GroupKernel, row: usize, mut visit: F)
    where
        F: FnMut(usize, usize, Term),
    {
        let lanes = kernel.lanes_per_row();

        if let Some((a, b)) = &self.ab {
            let ra = a.row_range(row);
            match kernel.shape {
                KernelShape::WfPerRow => {
                    for lid in 0..lanes {
                        for ja in strided(&ra, lid, lanes) {
                            for jb in b.row_range(a.col(ja)) {
                                visit(lid, b.col(jb), Term::Product { ja, jb });
                            }
                        }
                    }
                }
                KernelShape::BlockPerRow | KernelShape::Global => {
                    let wf = kernel.wavefront;
                    let wavefronts = kernel.block / wf;
                    for wid in 0..wavefronts {
                        for ja in strided(&ra, wid, wavefronts) {
                            let rb = b.row_range(a.col(ja));
                            for lid in 0..wf {
                                for jb in strided(&rb, lid, wf) {
                                    visit(wid * wf + lid, b.col(jb), Term::Product { ja, jb });
                                }
                            }
                        }
                    }
                }
            }
        }

        if let Some(d) = &self.d {
            let rd = d.row_range(row);
            for tid in 0..lanes {
                for jd in strided(&rd, tid, lanes) {
                    visit(tid, d.col(jd), Term::Addend { jd });
                }
            }
        }
    }
}

#[inline]
fn strided(range: &Range<usize>, lane: usize, stride: usize) -> impl Iterator<Item = usize> {
    (range.start + lane..range.end).step_by(stride)
}

/// Operands and scalars of `C := alpha * A * B + beta * D`
#[derive(Debug, Clone, Copy)]
pub(crate) struct TermValues<'a, T> {
    pub mul: Option<(T, CsrRef<'a, T>, CsrRef<'a, T>)>,
    pub add: Option<(T, CsrRef<'a, T>)>,
}

impl<'a, T: Scalar> TermValues<'a, T> {
    pub fn patterns(&self) -> TermPatterns<'a> {
        TermPatterns {
            ab: self.mul.map(|(_, a, b)| (a.pattern, b.pattern)),
            d: self.add.map(|(_, d)| d.pattern),
        }
    }

    #[inline]
    fn value(&self, term: Term) -> T {
        match (term, &self.mul, &self.add) {
            (Term::Product { ja, jb }, Some((alpha, a, b)), _) => *alpha * a.val[ja] * b.val[jb],
            (Term::Addend { jd }, _, Some((beta, d))) => *beta * d.val[jd],
            _ => T::zero(),
        }
    }
}

/// Sums per-lane counters wavefront by wavefront, then across wavefronts
fn sum_lanes(lanes: &mut [usize], wavefront: usize) -> usize {
    let mut totals: Vec<usize> = lanes
        .chunks_mut(wavefront)
        .map(|wf| wf_reduce_sum(wf))
        .collect();
    wf_reduce_sum(&mut totals)
}

/// Counts the non-zeros of the C rows in `rows`
///
/// `capacity` is the hash table size per row (a power of two); `n` is the
/// number of columns of C and doubles as the empty-slot sentinel.
pub(crate) fn csrgemm_nnz_group(
    stream: &Stream,
    kernel: &GroupKernel,
    capacity: usize,
    terms: &TermPatterns<'_>,
    n: usize,
    rows: Rows<'_>,
    row_nnz: &[AtomicI32],
) {
    if rows.is_empty() {
        return;
    }
    let rows_per_block = kernel.rows_per_block();

    stream.launch(grid_size(rows.len(), rows_per_block), |block| {
        let table = HashTable::new(capacity, n as i32);
        let mut lanes = vec![0usize; kernel.lanes_per_row()];

        for w in 0..rows_per_block {
            let idx = block * rows_per_block + w;
            if idx >= rows.len() {
                break;
            }
            let row = rows.get(idx);

            table.reset();
            lanes.fill(0);
            terms.visit_row(kernel, row, |tid, col, _| {
                if table.insert_key(col as i32) {
                    lanes[tid] += 1;
                }
            });

            let nnz = sum_lanes(&mut lanes, kernel.wavefront);
            row_nnz[row].store(nnz as i32, Ordering::Relaxed);
        }
    });
}

/// Output buffers of the numeric phase
pub(crate) struct FillTarget<'a, 'b, T> {
    pub row_ptr: &'a [i32],
    pub base: i32,
    pub col_ind: &'a GlobalMut<'b, i32>,
    pub val: &'a GlobalMut<'b, T>,
}

impl<T: Copy> FillTarget<'_, '_, T> {
    /// # Safety
    ///
    /// `pos` must lie in the span of a row owned by the calling block.
    #[inline]
    unsafe fn write(&self, pos: usize, col: i32, value: T) {
        self.col_ind.write(pos, col + self.base);
        self.val.write(pos, value);
    }
}

/// Computes the entries of the C rows in `rows`, each sorted by column
pub(crate) fn csrgemm_fill_group<T: Scalar>(
    stream: &Stream,
    kernel: &GroupKernel,
    capacity: usize,
    terms: &TermValues<'_, T>,
    n: usize,
    rows: Rows<'_>,
    out: &FillTarget<'_, '_, T>,
) {
    if rows.is_empty() {
        return;
    }
    let rows_per_block = kernel.rows_per_block();
    let patterns = terms.patterns();

    stream.launch(grid_size(rows.len(), rows_per_block), |block| {
        let table = PairTable::<T>::new(capacity, n as i32);
        let mut sorted: Vec<(i32, T)> = Vec::new();

        for w in 0..rows_per_block {
            let idx = block * rows_per_block + w;
            if idx >= rows.len() {
                break;
            }
            let row = rows.get(idx);
            let start = (out.row_ptr[row] - out.base) as usize;

            table.reset();
            patterns.visit_row(kernel, row, |_, col, term| {
                table.insert_pair(col as i32, terms.value(term));
            });

            // SAFETY: the span of a row of C is written by its own block only.
            match kernel.shape {
                KernelShape::WfPerRow => {
                    for slot in 0..table.capacity() {
                        if table.is_valid(slot) {
                            let (col, value) = table.entry(slot);
                            let pos = start + table.rank(col, table.capacity());
                            unsafe { out.write(pos, col, value) };
                        }
                    }
                }
                KernelShape::BlockPerRow => {
                    let len = table.compress(kernel.block);
                    for slot in 0..len {
                        let (col, value) = table.entry(slot);
                        let pos = start + table.rank(col, len);
                        unsafe { out.write(pos, col, value) };
                    }
                }
                KernelShape::Global => {
                    let len = table.compress(kernel.block);
                    sorted.clear();
                    sorted.extend((0..len).map(|slot| table.entry(slot)));
                    sorted.sort_unstable_by_key(|&(col, _)| col);
                    for (i, &(col, value)) in sorted.iter().enumerate() {
                        unsafe { out.write(start + i, col, value) };
                    }
                }
            }
        }
    });
}

/// Copies the row pointers of D into C, rebased to `base_c`
pub(crate) fn csrgemm_copy_row_ptr(stream: &Stream, d: &CsrPattern<'_>, base_c: i32, row_ptr_c: &mut [i32]) {
    let shift = base_c - d.base();
    let len = d.m + 1;
    let out = GlobalMut::new(&mut row_ptr_c[..len]);

    stream.launch(grid_size(len, CSRGEMM_DIM), |block| {
        for tid in 0..CSRGEMM_DIM {
            let i = block * CSRGEMM_DIM + tid;
            if i < len {
                // SAFETY: one lane per index.
                unsafe { out.write(i, d.row_ptr[i] + shift) };
            }
        }
    });
}

/// Writes `beta * D` into the entries of C
pub(crate) fn csrgemm_copy_scale<T: Scalar>(
    stream: &Stream,
    beta: T,
    d: &CsrRef<'_, T>,
    base_c: i32,
    col_ind: &GlobalMut<'_, i32>,
    val: &GlobalMut<'_, T>,
) {
    let nnz = d.pattern.nnz;
    let shift = base_c - d.pattern.base();

    stream.launch(grid_size(nnz, CSRGEMM_DIM), |block| {
        for tid in 0..CSRGEMM_DIM {
            let j = block * CSRGEMM_DIM + tid;
            if j < nnz {
                // SAFETY: one lane per entry.
                unsafe {
                    col_ind.write(j, d.pattern.col_ind[j] + shift);
                    val.write(j, beta * d.val[j]);
                }
            }
        }
    });
}
