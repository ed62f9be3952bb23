//! FFI bindings for NutriScan
//!
//! This module provides C-compatible functions for calling the engine from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `nutri_free_string`.
//!
//! Time zones are passed as a UTC offset in minutes, so the hour of day is
//! resolved exactly as the calling device sees it.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use chrono::FixedOffset;

use crate::engine::BioavailabilityEngine;
use crate::error::NutriError;
use crate::interactions::{classify, InteractionCatalog, InteractionObservation};
use crate::pipeline::ScoringPipeline;
use crate::rules::RuleSet;
use crate::types::NutrientProfile;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, NutriError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| NutriError::InvalidInput(format!("invalid UTC offset: {} minutes", minutes)))
}

/// Rules from an optional JSON string; NULL selects the built-in rules
unsafe fn rules_arg(rules_json: *const c_char) -> Result<RuleSet, NutriError> {
    if rules_json.is_null() {
        return Ok(RuleSet::default());
    }
    let json = cstr_to_string(rules_json)
        .ok_or_else(|| NutriError::InvalidInput("rules string is not valid UTF-8".to_string()))?;
    RuleSet::from_json(&json)
}

/// Turn a result into a heap string or NULL with the last error set
fn finish(result: Result<String, NutriError>) -> *mut c_char {
    match result {
        Ok(s) => string_to_cstr(&s),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score a raw provider payload and return the meal report as JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - `rules_json` must be a valid null-terminated C string or NULL (built-in rules).
/// - Returns a newly allocated string that must be freed with `nutri_free_string`.
/// - Returns NULL on error; call `nutri_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nutri_score_payload(
    json: *const c_char,
    consumed_at_ms: i64,
    utc_offset_minutes: i32,
    rules_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    finish((|| -> Result<String, NutriError> {
        let rules = rules_arg(rules_json)?;
        let offset = offset_from_minutes(utc_offset_minutes)?;
        let report = ScoringPipeline::new(Arc::new(rules))
            .with_utc_offset(offset)
            .score_payload(&json_str, consumed_at_ms)?;
        Ok(serde_json::to_string(&report)?)
    })())
}

/// Score a nutrient profile and return the score breakdown as JSON.
///
/// # Safety
/// - `profile_json` must be a valid null-terminated C string.
/// - `rules_json` must be a valid null-terminated C string or NULL (built-in rules).
/// - Returns a newly allocated string that must be freed with `nutri_free_string`.
/// - Returns NULL on error; call `nutri_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nutri_score_profile(
    profile_json: *const c_char,
    consumed_at_ms: i64,
    utc_offset_minutes: i32,
    rules_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let profile_str = match cstr_to_string(profile_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid profile string pointer");
            return ptr::null_mut();
        }
    };

    finish((|| -> Result<String, NutriError> {
        let profile: NutrientProfile = serde_json::from_str(&profile_str)?;
        let rules = rules_arg(rules_json)?;
        let offset = offset_from_minutes(utc_offset_minutes)?;
        let breakdown =
            BioavailabilityEngine::explain_in(&profile, consumed_at_ms, &rules, &offset)?;
        Ok(serde_json::to_string(&breakdown)?)
    })())
}

/// Classify a JSON array of provider interactions.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `nutri_free_string`.
/// - Returns NULL on error; call `nutri_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nutri_classify_interactions(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    finish((|| -> Result<String, NutriError> {
        let observations: Vec<InteractionObservation> = serde_json::from_str(&json_str)?;
        Ok(serde_json::to_string(&classify(&observations))?)
    })())
}

/// Return the built-in rule set as JSON.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `nutri_free_string`.
#[no_mangle]
pub unsafe extern "C" fn nutri_default_rules() -> *mut c_char {
    clear_last_error();
    finish(RuleSet::default().to_json())
}

// ============================================================================
// Pipeline API (rules and catalog loaded once)
// ============================================================================

/// Opaque handle to a ScoringPipeline
pub struct NutriPipelineHandle {
    pipeline: ScoringPipeline,
}

/// Create a pipeline.
///
/// # Safety
/// - `rules_json` must be a valid null-terminated C string or NULL (built-in rules).
/// - `catalog_json` must be a valid null-terminated C string or NULL (no
///   interaction adjustment).
/// - Returns a pointer that must be freed with `nutri_pipeline_free`.
/// - Returns NULL on error; call `nutri_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nutri_pipeline_new(
    rules_json: *const c_char,
    catalog_json: *const c_char,
) -> *mut NutriPipelineHandle {
    clear_last_error();

    let build = || -> Result<ScoringPipeline, NutriError> {
        let rules = rules_arg(rules_json)?;
        let mut pipeline = ScoringPipeline::new(Arc::new(rules));
        if !catalog_json.is_null() {
            let json = cstr_to_string(catalog_json).ok_or_else(|| {
                NutriError::InvalidInput("catalog string is not valid UTF-8".to_string())
            })?;
            pipeline = pipeline.with_interactions(Arc::new(InteractionCatalog::from_json(&json)?));
        }
        Ok(pipeline)
    };

    match build() {
        Ok(pipeline) => Box::into_raw(Box::new(NutriPipelineHandle { pipeline })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a pipeline.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `nutri_pipeline_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn nutri_pipeline_free(pipeline: *mut NutriPipelineHandle) {
    if !pipeline.is_null() {
        drop(Box::from_raw(pipeline));
    }
}

/// Score a raw provider payload with a pipeline.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `nutri_pipeline_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `nutri_free_string`.
/// - Returns NULL on error; call `nutri_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nutri_pipeline_score_payload(
    pipeline: *const NutriPipelineHandle,
    json: *const c_char,
    consumed_at_ms: i64,
    utc_offset_minutes: i32,
) -> *mut c_char {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }
    let handle = &*pipeline;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    finish((|| -> Result<String, NutriError> {
        let offset = offset_from_minutes(utc_offset_minutes)?;
        let report = handle
            .pipeline
            .clone()
            .with_utc_offset(offset)
            .score_payload(&json_str, consumed_at_ms)?;
        Ok(serde_json::to_string(&report)?)
    })())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by NutriScan functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a NutriScan function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn nutri_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next NutriScan call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn nutri_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn nutri_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> CString {
        CString::new(
            r#"{
            "foodName": "Orange",
            "estimatedCalories": 62,
            "nutrients": [
                { "name": "Vitamin C", "amount": "70mg", "dailyValuePercentage": 78 }
            ],
            "benefits": [],
            "chronoAdvice": {
                "bestTime": "Morning",
                "reasoning": "Vitamin C early in the day",
                "currentBioavailabilityScore": 90
            },
            "synergy": []
        }"#,
        )
        .unwrap()
    }

    // 2024-01-15T08:00:00Z
    const MORNING_UTC_MS: i64 = 1_705_305_600_000;

    #[test]
    fn test_ffi_score_payload() {
        let json = sample_payload();

        unsafe {
            let result = nutri_score_payload(json.as_ptr(), MORNING_UTC_MS, 0, ptr::null());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value["breakdown"]["hour"], 8);
            let score = value["breakdown"]["score"].as_f64().unwrap();
            assert!((score - 120.0).abs() < 1e-9);

            nutri_free_string(result);
        }
    }

    #[test]
    fn test_ffi_score_profile_with_offset() {
        let profile = CString::new(r#"{"vitaminC": 50, "iron": 10}"#).unwrap();
        let rules = CString::new(
            r#"[
            {"nutrient": "Vitamin C", "windowStart": 6, "windowEnd": 10, "efficiencyFactor": 1.2, "reason": ""},
            {"nutrient": "Iron", "windowStart": 18, "windowEnd": 20, "efficiencyFactor": 1.3, "reason": ""}
        ]"#,
        )
        .unwrap();

        unsafe {
            // 08:00 UTC is 18:00 at +10:00
            let result =
                nutri_score_profile(profile.as_ptr(), MORNING_UTC_MS, 600, rules.as_ptr());
            assert!(!result.is_null());
            let value: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(value["hour"], 18);
            let score = value["score"].as_f64().unwrap();
            assert!((score - 117.0).abs() < 1e-9);
            nutri_free_string(result);
        }
    }

    #[test]
    fn test_ffi_classify() {
        let json = CString::new(
            r#"[{"nutrientA": "Iron", "nutrientB": "Calcium", "interaction": "ANTAGONISM", "description": ""}]"#,
        )
        .unwrap();

        unsafe {
            let result = nutri_classify_interactions(json.as_ptr());
            assert!(!result.is_null());
            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("\"antagonism\""));
            nutri_free_string(result);
        }
    }

    #[test]
    fn test_ffi_pipeline_lifecycle() {
        let json = sample_payload();

        unsafe {
            let pipeline = nutri_pipeline_new(ptr::null(), ptr::null());
            assert!(!pipeline.is_null());

            let result = nutri_pipeline_score_payload(pipeline, json.as_ptr(), MORNING_UTC_MS, 0);
            assert!(!result.is_null());
            nutri_free_string(result);

            nutri_pipeline_free(pipeline);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = nutri_score_payload(invalid_json.as_ptr(), MORNING_UTC_MS, 0, ptr::null());
            assert!(result.is_null());

            let error = nutri_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("Analysis unavailable"));

            let bad_rules = CString::new(
                r#"[{"nutrient": "Iron", "windowStart": 20, "windowEnd": 4, "efficiencyFactor": 1.0}]"#,
            )
            .unwrap();
            let pipeline = nutri_pipeline_new(bad_rules.as_ptr(), ptr::null());
            assert!(pipeline.is_null());
            let error_str = CStr::from_ptr(nutri_last_error()).to_str().unwrap();
            assert!(error_str.contains("Invalid input"));
        }
    }

    #[test]
    fn test_ffi_default_rules_and_version() {
        unsafe {
            let rules = nutri_default_rules();
            assert!(!rules.is_null());
            let parsed = RuleSet::from_json(CStr::from_ptr(rules).to_str().unwrap()).unwrap();
            assert_eq!(parsed, RuleSet::default());
            nutri_free_string(rules);

            let version = nutri_version();
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
