//! C ABI wrapper for the Resonar convolution engine.
//!
//! Exposes a small set of functions to create/destroy an engine, initialize it
//! for a sample rate, set parameters, and process mono f32 blocks.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `ResonarEngine` (heap-allocated; free with `resonar_destroy`).
//! - Parameter ids: 0 roomSize, 1 decayTime, 2 preDelay, 3 damping, 4 lowFreq,
//!   5 diffusion, 6 mix, 7 earlyReflections, 8 highFreq, 9 lateMix.
//! - Unknown ids, names and IR types are ignored. A null handle is a no-op
//!   everywhere except `resonar_process`, which then copies input to output.
//! - `in` and `out` of `resonar_process` may point at the same buffer.
//!
//! Threading
//! - A handle is NOT thread-safe; serialize all calls on it. Parameter setters
//!   are cheap, and the kernel is rebuilt inside the next `resonar_process`.

use std::ffi::{c_char, c_int, CStr};
use std::{ptr, slice};

use resonar_engine::{ConvolutionEngine, EngineConfig};

/// Returned by `resonar_init` for a null handle.
pub const RESONAR_ERR_NULL_HANDLE: c_int = -5;

/// Samples copied through the stack per `resonar_process` step.
const CHUNK: usize = 1024;

static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Opaque engine handle.
pub struct ResonarEngine {
    inner: ConvolutionEngine,
}

/// Borrow the engine behind `h`, or `None` for null.
///
/// # Safety
/// `h` must be null or a live pointer from `resonar_create`.
unsafe fn engine<'a>(h: *mut ResonarEngine) -> Option<&'a mut ConvolutionEngine> {
    h.as_mut().map(|e| &mut e.inner)
}

/// Read a NUL-terminated UTF-8 string; `None` for null or invalid UTF-8.
///
/// # Safety
/// `s` must be null or point at a NUL-terminated string.
unsafe fn c_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

// --- Creation / destruction -------------------------------------------------------

/// Create an uninitialized engine with default configuration.
#[no_mangle]
pub extern "C" fn resonar_create() -> *mut ResonarEngine {
    let engine = ResonarEngine { inner: ConvolutionEngine::new(EngineConfig::default()) };
    Box::into_raw(Box::new(engine))
}

/// Destroy an engine previously returned by `resonar_create`. Null is ignored.
///
/// # Safety
/// `h` must be null or a pointer from `resonar_create` not yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn resonar_destroy(h: *mut ResonarEngine) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

/// Allocate buffers for `sample_rate`. Returns 0 on success or a negative code:
/// -1 bad sample rate, -2 already initialized, -3 out of memory,
/// -4 bad configuration, -5 null handle.
///
/// # Safety
/// `h` must be null or a live pointer from `resonar_create`.
#[no_mangle]
pub unsafe extern "C" fn resonar_init(h: *mut ResonarEngine, sample_rate: c_int) -> c_int {
    let Some(e) = engine(h) else { return RESONAR_ERR_NULL_HANDLE };
    let rate = u32::try_from(sample_rate).unwrap_or(0);
    match e.initialize(rate) {
        Ok(()) => 0,
        Err(err) => err.code(),
    }
}

/// Release the engine's buffers; it processes as passthrough until re-initialized.
///
/// # Safety
/// `h` must be null or a live pointer from `resonar_create`.
#[no_mangle]
pub unsafe extern "C" fn resonar_cleanup(h: *mut ResonarEngine) {
    if let Some(e) = engine(h) {
        e.cleanup();
    }
}

// --- Parameters -------------------------------------------------------------------

/// Set a parameter by numeric id (see the crate docs for the table).
///
/// # Safety
/// `h` must be null or a live pointer from `resonar_create`.
#[no_mangle]
pub unsafe extern "C" fn resonar_set_parameter(h: *mut ResonarEngine, id: c_int, value: f32) {
    let Some(e) = engine(h) else { return };
    if let Ok(id) = u32::try_from(id) {
        e.set_parameter_id(id, value);
    }
}

/// Set a parameter by camelCase name, e.g. `"decayTime"`. Trailing spaces and
/// NUL padding are tolerated.
///
/// # Safety
/// `h` must be null or a live pointer from `resonar_create`; `name` must be null
/// or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn resonar_set_parameter_by_name(
    h: *mut ResonarEngine,
    name: *const c_char,
    value: f32,
) {
    if let (Some(e), Some(name)) = (engine(h), c_str(name)) {
        e.set_parameter_by_name(name, value);
    }
}

/// Select the IR character: `"hall"`, `"cathedral"`, `"room"`, `"plate"` or `"spring"`.
///
/// # Safety
/// `h` must be null or a live pointer from `resonar_create`; `name` must be null
/// or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn resonar_set_ir_type(h: *mut ResonarEngine, name: *const c_char) {
    if let (Some(e), Some(name)) = (engine(h), c_str(name)) {
        e.set_impulse_response_type(name);
    }
}

// --- Processing -------------------------------------------------------------------

/// Process `n` mono samples from `input` into `output`.
///
/// # Safety
/// `input` and `output` must each be null or valid for `n` f32s. They may alias.
/// `h` must be null or a live pointer from `resonar_create`.
#[no_mangle]
pub unsafe extern "C" fn resonar_process(
    h: *mut ResonarEngine,
    input: *const f32,
    output: *mut f32,
    n: usize,
) {
    if input.is_null() || output.is_null() || n == 0 {
        return;
    }
    let Some(e) = engine(h) else {
        ptr::copy(input, output, n);
        return;
    };

    // Stage each chunk on the stack so aliased in/out never overlap as slices.
    let mut staged = [0.0_f32; CHUNK];
    let mut done = 0;
    while done < n {
        let len = (n - done).min(CHUNK);
        staged[..len].copy_from_slice(slice::from_raw_parts(input.add(done), len));
        let out = slice::from_raw_parts_mut(output.add(done), len);
        e.process(&staged[..len], out);
        done += len;
    }
}

// --- Queries ----------------------------------------------------------------------

/// 1 if initialized, 0 otherwise (including null).
///
/// # Safety
/// `h` must be null or a live pointer from `resonar_create`.
#[no_mangle]
pub unsafe extern "C" fn resonar_is_initialized(h: *mut ResonarEngine) -> c_int {
    engine(h).map_or(0, |e| c_int::from(e.is_initialized()))
}

/// Sample rate of the last successful init (48000 before any), 0 for null.
///
/// # Safety
/// `h` must be null or a live pointer from `resonar_create`.
#[no_mangle]
pub unsafe extern "C" fn resonar_get_sample_rate(h: *mut ResonarEngine) -> c_int {
    engine(h).map_or(0, |e| c_int::try_from(e.sample_rate()).unwrap_or(c_int::MAX))
}

/// Library version as a static NUL-terminated string. Do not free.
#[no_mangle]
pub extern "C" fn resonar_version() -> *const c_char {
    VERSION.as_ptr().cast()
}

// --- Buffer helpers ---------------------------------------------------------------

/// Allocate `n` zeroed f32s for use with `resonar_process`. Null when `n` is 0.
#[no_mangle]
pub extern "C" fn resonar_alloc_buffer(n: usize) -> *mut f32 {
    if n == 0 {
        return ptr::null_mut();
    }
    let buf: Box<[f32]> = vec![0.0_f32; n].into_boxed_slice();
    Box::into_raw(buf).cast()
}

/// Free a buffer from `resonar_alloc_buffer`. `n` must be the length it was
/// allocated with. Null is ignored.
///
/// # Safety
/// `p` must be null or come from `resonar_alloc_buffer(n)` and not be freed yet.
#[no_mangle]
pub unsafe extern "C" fn resonar_free_buffer(p: *mut f32, n: usize) {
    if !p.is_null() && n > 0 {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(p, n)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_copies_through() {
        let input = [0.1_f32, -0.2, 0.3];
        let mut output = [0.0_f32; 3];
        unsafe {
            resonar_process(ptr::null_mut(), input.as_ptr(), output.as_mut_ptr(), 3);
            assert_eq!(resonar_init(ptr::null_mut(), 48_000), RESONAR_ERR_NULL_HANDLE);
            assert_eq!(resonar_is_initialized(ptr::null_mut()), 0);
            resonar_set_parameter(ptr::null_mut(), 0, 1.0);
            resonar_cleanup(ptr::null_mut());
            resonar_destroy(ptr::null_mut());
        }
        assert_eq!(output, input);
    }

    #[test]
    fn lifecycle_and_error_codes() {
        unsafe {
            let h = resonar_create();
            assert_eq!(resonar_is_initialized(h), 0);
            assert_eq!(resonar_get_sample_rate(h), 48_000);
            assert_eq!(resonar_init(h, 0), -1);
            assert_eq!(resonar_init(h, -44_100), -1);
            assert_eq!(resonar_init(h, 8_000), 0);
            assert_eq!(resonar_init(h, 8_000), -2);
            assert_eq!(resonar_is_initialized(h), 1);
            assert_eq!(resonar_get_sample_rate(h), 8_000);
            resonar_cleanup(h);
            resonar_cleanup(h);
            assert_eq!(resonar_is_initialized(h), 0);
            resonar_destroy(h);
        }
    }

    #[test]
    fn setters_reach_the_engine() {
        unsafe {
            let h = resonar_create();
            resonar_init(h, 8_000);
            resonar_set_parameter(h, 1, 99.0);
            resonar_set_parameter(h, -1, 5.0);
            resonar_set_parameter(h, 42, 5.0);
            resonar_set_parameter_by_name(h, b"mix   \0".as_ptr().cast(), 75.0);
            resonar_set_parameter_by_name(h, b"nope\0".as_ptr().cast(), 1.0);
            resonar_set_ir_type(h, b"Cathedral\0".as_ptr().cast());
            resonar_set_ir_type(h, ptr::null());

            let e = &(*h).inner;
            assert_eq!(e.params().decay_time, 10.0);
            assert_eq!(e.params().mix, 75.0);
            assert_eq!(e.ir_type(), resonar_engine::IrType::Cathedral);
            resonar_destroy(h);
        }
    }

    #[test]
    fn in_place_processing_matches_separate_buffers() {
        let input: Vec<f32> = (0..3_000).map(|i| ((i as f32) * 0.01).sin() * 0.4).collect();
        unsafe {
            let a = resonar_create();
            let b = resonar_create();
            for h in [a, b] {
                (*h).inner = ConvolutionEngine::new(EngineConfig::default().with_seed(5));
                resonar_init(h, 8_000);
                resonar_set_parameter(h, 1, 0.5);
            }

            let mut separate = vec![0.0_f32; input.len()];
            resonar_process(a, input.as_ptr(), separate.as_mut_ptr(), input.len());

            let mut in_place = input.clone();
            let p = in_place.as_mut_ptr();
            resonar_process(b, p, p, in_place.len());

            assert_eq!(separate, in_place);
            assert_ne!(separate, input);
            resonar_destroy(a);
            resonar_destroy(b);
        }
    }

    #[test]
    fn uninitialized_engine_is_passthrough() {
        unsafe {
            let h = resonar_create();
            let input = [0.5_f32; 16];
            let mut out = [0.0_f32; 16];
            resonar_process(h, input.as_ptr(), out.as_mut_ptr(), 16);
            assert_eq!(out, input);
            resonar_destroy(h);
        }
    }

    #[test]
    fn buffer_helpers_round_trip() {
        unsafe {
            let p = resonar_alloc_buffer(256);
            assert!(!p.is_null());
            let buf = slice::from_raw_parts_mut(p, 256);
            assert!(buf.iter().all(|&v| v == 0.0));
            buf[255] = 1.0;
            resonar_free_buffer(p, 256);
            assert!(resonar_alloc_buffer(0).is_null());
            resonar_free_buffer(ptr::null_mut(), 4);
        }
    }

    #[test]
    fn version_is_nul_terminated() {
        let v = unsafe { CStr::from_ptr(resonar_version()) };
        assert_eq!(v.to_str().unwrap(), resonar_engine::VERSION);
    }
}
