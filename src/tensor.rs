use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

use crate::error::Result;

// every live handle is counted so callers can verify nothing leaked
// across an estimate_faces call
static LIVE_HANDLES: AtomicUsize = AtomicUsize::new(0);

/// Number of currently live [`Tensor`] handles in the process.
pub fn live_count() -> usize {
    LIVE_HANDLES.load(Ordering::SeqCst)
}

/// Handle to a runtime-owned single-precision buffer.
///
/// Reading the values out (`read`/`read_scalar`) is asynchronous; the handle
/// stays live until it is dropped or explicitly consumed with [`dispose`].
/// Results returned with raw buffers transfer exactly their embedded handles
/// to the caller, who then owns their disposal.
///
/// [`dispose`]: Tensor::dispose
#[derive(Debug)]
pub struct Tensor {
    data: ArrayD<f32>,
}

impl Tensor {
    pub fn from_array(data: ArrayD<f32>) -> Self {
        LIVE_HANDLES.fetch_add(1, Ordering::SeqCst);
        Self { data }
    }

    pub fn from_vec(shape: &[usize], values: Vec<f32>) -> Result<Self> {
        Ok(Self::from_array(ArrayD::from_shape_vec(
            IxDyn(shape),
            values,
        )?))
    }

    /// Single-element buffer, as produced for per-face confidence flags.
    pub fn scalar(value: f32) -> Self {
        Self::from_array(ArrayD::from_elem(IxDyn(&[1]), value))
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    /// Materialize the buffer into a plain, caller-owned value vector.
    pub async fn read(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// Materialize the first element. NaN for an empty buffer.
    pub async fn read_scalar(&self) -> f32 {
        self.data.iter().next().copied().unwrap_or(f32::NAN)
    }

    /// Remap the x-coordinate of every point lane in place.
    ///
    /// The buffer is interpreted as packed `(x, y, ..)` lanes along the last
    /// axis; only lane element 0 is touched. This is the buffer-typed side of
    /// the horizontal-flip transform.
    pub fn map_x(&mut self, mut f: impl FnMut(f32) -> f32) {
        let last = Axis(self.data.ndim().saturating_sub(1));
        for mut lane in self.data.lanes_mut(last) {
            if !lane.is_empty() {
                lane[0] = f(lane[0]);
            }
        }
    }

    /// Release the buffer. Equivalent to dropping the handle; spelled out at
    /// call sites where the release is part of the contract.
    pub fn dispose(self) {}

    /// Consume the handle and take the backing array.
    pub fn into_array(self) -> ArrayD<f32> {
        // Drop bookkeeping must still run; moving the array out needs a
        // manual swap because Tensor implements Drop.
        let mut tensor = self;
        std::mem::replace(&mut tensor.data, ArrayD::zeros(IxDyn(&[0])))
    }
}

impl Drop for Tensor {
    fn drop(&mut self) {
        LIVE_HANDLES.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Clone for Tensor {
    fn clone(&self) -> Self {
        Self::from_array(self.data.clone())
    }
}
