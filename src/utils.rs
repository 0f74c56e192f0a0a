//! Small helpers shared by the HTTP and MCP surfaces

use serde::de::DeserializeOwned;
use serde_json::{from_value, Value};
use validator::ValidationError;

use crate::blockchain::models::Address;
use crate::mcp::protocol::{error_codes, Response};

/// Helper function to extract a required argument from a JSON object
pub fn get_required_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<T, Response> {
    from_value(args.get(key).cloned().unwrap_or(Value::Null)).map_err(|_| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Missing or invalid required argument: '{}'", key),
        )
    })
}

/// Optional string argument; blank strings count as missing.
pub fn get_optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `validator` hook for `0x` + 40 hex address fields.
pub fn validate_address(value: &str) -> Result<(), ValidationError> {
    match Address::parse(value) {
        Some(_) => Ok(()),
        None => {
            let mut err = ValidationError::new("address");
            err.message = Some("must be 0x followed by 40 hex characters".into());
            Err(err)
        }
    }
}
