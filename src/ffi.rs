//! C FFI — bridges [`ArmTts`] to iOS / Android callers.
//!
//! Functions are `#[no_mangle] extern "C"` so Swift / Kotlin can call them
//! through a thin bridging header without any Objective-C wrapper.
//!
//! ## Memory contract
//!
//! | Function                       | Caller frees with        |
//! |--------------------------------|--------------------------|
//! | [`armtts_load`]                | [`armtts_free`]          |
//! | [`armtts_speak`]               | [`armtts_free_error`]    |
//! | [`armtts_speak_to_file`]       | [`armtts_free_error`]    |

use std::ffi::{c_char, CStr, CString};
use std::path::Path;

use crate::{
    audio::{PlaybackSink, WavFileSink},
    error::SpeakError,
    ArmTts,
};

/// Opaque handle to a loaded engine.
pub struct ArmTtsHandle {
    tts: ArmTts,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Convert a `*const c_char` to an owned `String`; `None` if `ptr` is null.
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Heap-allocate an owned C string.  Returns null on interior nul bytes.
fn to_c_str(s: &str) -> *const c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => std::ptr::null(),
    }
}

#[cfg(feature = "playback")]
fn device_sink() -> Box<dyn PlaybackSink> {
    Box::new(crate::playback::CpalSink::new())
}

#[cfg(not(feature = "playback"))]
fn device_sink() -> Box<dyn PlaybackSink> {
    Box::new(crate::audio::NullSink)
}

fn speak_result(result: Result<crate::SpeakSummary, SpeakError>) -> *const c_char {
    match result {
        Ok(_) => std::ptr::null(),
        Err(e) => to_c_str(&e.to_string()),
    }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Load the engine from a resource bundle directory.
///
/// @param api_key     Key for the preprocessing API.
/// @param bundle_dir  UTF-8 path to the bundle (`arm-gor.onnx`, optional `config.json`).
/// @return            Opaque handle, or `NULL` on failure (details are logged).
///                    Free with [`armtts_free`].
#[no_mangle]
pub unsafe extern "C" fn armtts_load(
    api_key: *const c_char,
    bundle_dir: *const c_char,
) -> *mut ArmTtsHandle {
    let (Some(key), Some(dir)) = (
        unsafe { cstr_to_string(api_key) },
        unsafe { cstr_to_string(bundle_dir) },
    ) else {
        log::error!("armtts_load: null argument");
        return std::ptr::null_mut();
    };

    match ArmTts::load(Path::new(&dir), &key, device_sink()) {
        Ok(tts) => Box::into_raw(Box::new(ArmTtsHandle { tts })),
        Err(e) => {
            log::error!("load error: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Synthesise `text` and play it on the default output device.
///
/// Without the `playback` feature the audio is discarded.
///
/// @param handle  Handle from [`armtts_load`]; `NULL` reports "not initialised".
/// @param text    UTF-8 Armenian text.
/// @param speed   User speed, 1.0 = normal; clamped to the configured range.
/// @return        `NULL` on success, otherwise an error message to release
///                with [`armtts_free_error`].
#[no_mangle]
pub unsafe extern "C" fn armtts_speak(
    handle: *const ArmTtsHandle,
    text: *const c_char,
    speed: f32,
) -> *const c_char {
    if handle.is_null() {
        log::error!("armtts_speak called without a loaded engine");
        return to_c_str(&SpeakError::NotInitialized.to_string());
    }
    let Some(txt) = (unsafe { cstr_to_string(text) }) else {
        return to_c_str("null text");
    };

    let h = unsafe { &*handle };
    speak_result(h.tts.speak(&txt, speed))
}

/// Synthesise `text` into a 32-bit float WAV at `output_path`.
///
/// @return  `NULL` on success, otherwise an error message to release with
///          [`armtts_free_error`].
#[no_mangle]
pub unsafe extern "C" fn armtts_speak_to_file(
    handle: *const ArmTtsHandle,
    text: *const c_char,
    speed: f32,
    output_path: *const c_char,
) -> *const c_char {
    if handle.is_null() {
        return to_c_str(&SpeakError::NotInitialized.to_string());
    }
    let (Some(txt), Some(out)) = (
        unsafe { cstr_to_string(text) },
        unsafe { cstr_to_string(output_path) },
    ) else {
        return to_c_str("null argument (text or output_path)");
    };

    let h = unsafe { &*handle };
    speak_result(h.tts.speak_with(&txt, speed, &WavFileSink::new(out)))
}

/// Free an error string returned by [`armtts_speak`] / [`armtts_speak_to_file`].
#[no_mangle]
pub unsafe extern "C" fn armtts_free_error(s: *const c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s as *mut c_char) });
    }
}

/// Destroy a handle and release the models.
#[no_mangle]
pub unsafe extern "C" fn armtts_free(handle: *mut ArmTtsHandle) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}
