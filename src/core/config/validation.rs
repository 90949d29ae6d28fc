use serde_json::{Map, Value};
use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_required_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 1, 65_535)?;
    }

    if let Some(storage) = expect_optional_object(root, "storage")? {
        validate_required_string_field(storage, "storage.index_dir", "index_dir")?;
        validate_required_string_field(storage, "storage.data_dir", "data_dir")?;
        validate_required_string_field(storage, "storage.log_dir", "log_dir")?;
    }

    if let Some(mongo) = expect_optional_object(root, "mongo")? {
        validate_optional_string_field(mongo, "mongo.uri", "uri")?;
        validate_required_string_field(mongo, "mongo.database", "database")?;
        validate_u64_field(
            mongo,
            "mongo.server_selection_timeout_secs",
            "server_selection_timeout_secs",
            1,
            600,
        )?;
        validate_u64_field(
            mongo,
            "mongo.connect_timeout_secs",
            "connect_timeout_secs",
            1,
            600,
        )?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 50)?;
        validate_u64_field(retrieval, "retrieval.chunk_size", "chunk_size", 100, 20_000)?;
        validate_u64_field(
            retrieval,
            "retrieval.chunk_overlap",
            "chunk_overlap",
            0,
            10_000,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.embed_batch_size",
            "embed_batch_size",
            1,
            96,
        )?;

        let size = retrieval.get("chunk_size").and_then(Value::as_u64);
        let overlap = retrieval.get("chunk_overlap").and_then(Value::as_u64);
        if let (Some(size), Some(overlap)) = (size, overlap) {
            if overlap >= size {
                return Err(ApiError::BadRequest(format!(
                    "Invalid config at 'retrieval.chunk_overlap': must be smaller than chunk_size ({})",
                    size
                )));
            }
        }
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_optional_string_field(embedding, "embedding.api_key", "api_key")?;
        validate_required_string_field(embedding, "embedding.model", "model")?;
        validate_required_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_u64_field(embedding, "embedding.timeout_secs", "timeout_secs", 1, 600)?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_required_string_field(llm, "llm.model", "model")?;
        validate_required_string_field(llm, "llm.base_url", "base_url")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 131_072)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 600)?;
    }

    if let Some(session) = expect_optional_object(root, "session")? {
        validate_u64_field(session, "session.ttl_minutes", "ttl_minutes", 1, 10_080)?;
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
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
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

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
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
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
