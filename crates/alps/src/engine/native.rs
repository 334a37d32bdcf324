//! Binding to the vendor presentation selection library.
//!
//! Requires `libdlb_alps_native` to be available to the linker.

use std::{
    ffi::{c_char, c_int, c_uchar, c_void, CStr},
    ptr,
};

use super::{Engine, EngineResult, PresentationsChangedCallback};
use crate::{error::EngineError, presentation::Presentation, PresentationId};

#[repr(C)]
struct AlpsCtx {
    _private: [u8; 0],
}

#[repr(C)]
struct AlpsPresentation {
    presentation_id: c_int,
    label: *mut c_char,
    language: *mut c_char,
}

type AlpsRet = c_int;
type ChangedCallback = unsafe extern "C" fn(*mut c_void);

#[link(name = "dlb_alps_native")]
extern "C" {
    fn alps_version() -> *mut c_char;
    fn alps_query_mem(mem_size: *mut usize) -> AlpsRet;
    fn alps_init(ctx: *mut *mut AlpsCtx, mem: *mut c_void) -> AlpsRet;
    fn alps_destroy(ctx: *mut AlpsCtx);
    fn alps_set_presentations_changed_callback(
        ctx: *mut AlpsCtx,
        callback: Option<ChangedCallback>,
        cb_ctx: *mut c_void,
    );
    fn alps_process_isobmff_segment(ctx: *mut AlpsCtx, buffer: *mut c_uchar, size: usize)
        -> AlpsRet;
    fn alps_get_presentations(
        ctx: *mut AlpsCtx,
        presentations: *mut *mut AlpsPresentation,
        count: *mut usize,
    ) -> AlpsRet;
    fn alps_get_active_presentation_id(ctx: *mut AlpsCtx, presentation_id: *mut c_int) -> AlpsRet;
    fn alps_set_active_presentation_id(ctx: *mut AlpsCtx, presentation_id: c_int) -> AlpsRet;
}

fn check(ret: AlpsRet) -> EngineResult<()> {
    match ret {
        0 => Ok(()),
        2 => Err(EngineError::InvalidArg),
        3 => Err(EngineError::BufferTooSmall),
        4 => Err(EngineError::ParseFailed),
        5 => Err(EngineError::NextSegment),
        6 => Err(EngineError::NoMovieInfo),
        7 => Err(EngineError::PresentationIdNotFound),
        _ => Err(EngineError::Undefined),
    }
}

/// Version string reported by the linked library.
pub fn version() -> String {
    // SAFETY: the library returns a static, null-terminated string.
    unsafe {
        let version = alps_version();
        if version.is_null() {
            return String::new();
        }
        CStr::from_ptr(version).to_string_lossy().into_owned()
    }
}

unsafe fn owned_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

unsafe extern "C" fn on_presentations_changed(cb_ctx: *mut c_void) {
    if cb_ctx.is_null() {
        return;
    }
    let callback = &*(cb_ctx as *const PresentationsChangedCallback);
    callback();
}

pub struct NativeEngine {
    ctx: *mut AlpsCtx,
    // Owned by us, used by the library until `alps_destroy`.
    _memory: Vec<u64>,
    callback: Option<Box<PresentationsChangedCallback>>,
}

// SAFETY: the context is only reached through `&mut self` or `&self` behind the handle's
// mutex, and the library keeps no thread-local state.
unsafe impl Send for NativeEngine {}

impl NativeEngine {
    pub fn new() -> EngineResult<Self> {
        let mut size = 0usize;
        // SAFETY: `size` is a valid out pointer.
        check(unsafe { alps_query_mem(&mut size) })?;

        let mut memory = vec![0u64; size.div_ceil(std::mem::size_of::<u64>())];
        let mut ctx = ptr::null_mut();
        // SAFETY: `memory` holds at least `size` bytes and outlives the context.
        check(unsafe { alps_init(&mut ctx, memory.as_mut_ptr().cast()) })
            .map_err(|e| EngineError::InitFailed(e.to_string()))?;
        if ctx.is_null() {
            return Err(EngineError::InitFailed("null context".to_string()));
        }

        tracing::info!(version = %version(), mem_size = size, "Native engine initialized");
        Ok(Self {
            ctx,
            _memory: memory,
            callback: None,
        })
    }
}

impl Engine for NativeEngine {
    fn process_segment(&mut self, segment: &mut [u8]) -> EngineResult<()> {
        // SAFETY: the buffer is valid for `segment.len()` bytes for the whole call.
        check(unsafe {
            alps_process_isobmff_segment(self.ctx, segment.as_mut_ptr(), segment.len())
        })
    }

    fn presentations(&self) -> EngineResult<Vec<Presentation>> {
        let mut list: *mut AlpsPresentation = ptr::null_mut();
        let mut count = 0usize;
        // SAFETY: out pointers are valid; the returned array is owned by the library and
        // stays valid until the next call on this context.
        unsafe {
            check(alps_get_presentations(self.ctx, &mut list, &mut count))?;
            if list.is_null() || count == 0 {
                return Ok(Vec::new());
            }
            Ok(std::slice::from_raw_parts(list, count)
                .iter()
                .map(|p| Presentation {
                    id: PresentationId(p.presentation_id),
                    label: owned_string(p.label),
                    language: owned_string(p.language),
                })
                .collect())
        }
    }

    fn active_presentation_id(&self) -> EngineResult<PresentationId> {
        let mut id: c_int = PresentationId::DEVICE_DEFAULT.0;
        // SAFETY: `id` is a valid out pointer.
        check(unsafe { alps_get_active_presentation_id(self.ctx, &mut id) })?;
        Ok(PresentationId(id))
    }

    fn set_active_presentation_id(&mut self, id: PresentationId) -> EngineResult<()> {
        // SAFETY: plain value call on a live context.
        check(unsafe { alps_set_active_presentation_id(self.ctx, id.0) })
    }

    fn set_presentations_changed_callback(&mut self, callback: PresentationsChangedCallback) {
        let callback = Box::new(callback);
        let cb_ctx = &*callback as *const PresentationsChangedCallback as *mut c_void;
        // SAFETY: the boxed callback is stored in `self` and outlives the registration,
        // which ends with `alps_destroy` in `Drop`.
        unsafe {
            alps_set_presentations_changed_callback(
                self.ctx,
                Some(on_presentations_changed),
                cb_ctx,
            );
        }
        self.callback = Some(callback);
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        // SAFETY: the context is live and destroyed exactly once here.
        unsafe { alps_destroy(self.ctx) };
        self.ctx = ptr::null_mut();
        tracing::debug!("Native engine destroyed");
    }
}
