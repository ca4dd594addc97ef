pub mod metrics;
pub mod plan;

use serde_json::json;

use crate::api::ClientError;

/// Print a structured error and return the matching exit code.
pub fn report_error(err: &ClientError) -> i32 {
    let mut body = json!({
        "error": "cli_error",
        "message": err.to_string()
    });
    if let ClientError::Api { code, .. } = err {
        body["error"] = json!(code);
        if code == "acknowledgment_required" {
            body["docs_hint"] =
                json!("Run `vitalis metrics ack` to confirm today's numbers, then retry.");
        }
    }
    if matches!(err, ClientError::Timeout | ClientError::Network(_)) {
        body["docs_hint"] = json!("Is the API server running? Check VITALIS_API_URL.");
    }
    eprintln!("{}", serde_json::to_string_pretty(&body).unwrap());
    err.exit_code()
}
