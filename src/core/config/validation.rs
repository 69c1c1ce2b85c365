use serde_json::{Map, Value};

use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(
            rag,
            "rag.max_context_length",
            "max_context_length",
            500,
            200_000,
        )?;
        validate_u64_field(
            rag,
            "rag.max_snippet_length",
            "max_snippet_length",
            1,
            100_000,
        )?;
        validate_u64_field(rag, "rag.fetch_timeout_ms", "fetch_timeout_ms", 100, 120_000)?;
        validate_u64_field(
            rag,
            "rag.max_results_to_process",
            "max_results_to_process",
            1,
            20,
        )?;
        validate_u64_field(
            rag,
            "rag.fetch_max_bytes",
            "fetch_max_bytes",
            1024,
            50_000_000,
        )?;
        validate_u64_field(
            rag,
            "rag.min_partial_segment",
            "min_partial_segment",
            0,
            10_000,
        )?;
        validate_optional_string_field(rag, "rag.user_agent", "user_agent")?;
        validate_priority_sources(rag)?;
    }

    if let Some(search) = expect_optional_object(root, "search")? {
        validate_optional_string_field(search, "search.provider", "provider")?;
        validate_optional_string_field(
            search,
            "search.google_search_api_key",
            "google_search_api_key",
        )?;
        validate_optional_string_field(
            search,
            "search.google_search_engine_id",
            "google_search_engine_id",
        )?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    Ok(())
}

fn validate_priority_sources(rag: &Map<String, Value>) -> Result<(), ApiError> {
    let Some(value) = rag.get("priority_sources") else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error("rag.priority_sources", "array"));
    };
    for (index, item) in items.iter().enumerate() {
        let path_prefix = format!("rag.priority_sources[{}]", index);
        let entry = item
            .as_object()
            .ok_or_else(|| config_type_error(&path_prefix, "object"))?;
        validate_required_string_field(entry, &format!("{}.pattern", path_prefix), "pattern")?;
        validate_required_string_field(entry, &format!("{}.label", path_prefix), "label")?;
    }
    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_required_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let value = section.get(key).ok_or_else(|| {
        ApiError::BadRequest(format!("Invalid config at '{}': value is required", path))
    })?;
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
