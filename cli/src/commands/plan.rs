use std::path::PathBuf;

use serde_json::json;

use crate::api::ApiClient;
use crate::cache::PlanCache;
use crate::store::FilePlanStore;

pub struct ShowArgs {
    pub force: bool,
    pub cache_path: Option<PathBuf>,
    pub ttl_seconds: Option<i64>,
}

/// Show the current plan through the cache: a fresh entry is served without
/// touching the network, a failed refresh falls back to the last saved plan.
pub async fn show(client: ApiClient, args: ShowArgs) -> i32 {
    let store = FilePlanStore::new(
        args.cache_path
            .unwrap_or_else(FilePlanStore::default_path),
    );
    let cache = match args.ttl_seconds {
        Some(ttl) => PlanCache::with_ttl(client, store, ttl).await,
        None => PlanCache::new(client, store).await,
    };

    match cache.fetch(args.force).await {
        Ok(readout) => {
            let mut body = json!({
                "targets": readout.entry.targets,
                "fetched_at": readout.entry.fetched_at,
                "ttl_seconds": readout.entry.ttl_seconds,
                "from_cache": readout.from_cache,
            });
            if let Some(change) = readout.change {
                body["change"] = serde_json::to_value(change).unwrap();
            }
            if let Some(reason) = readout.degraded {
                body["degraded"] = json!(reason);
            }
            println!("{}", serde_json::to_string_pretty(&body).unwrap());
            0
        }
        Err(failure) => {
            let mut body = json!({
                "error": failure.code.clone().unwrap_or_else(|| "cli_error".to_string()),
                "message": failure.message,
            });
            if failure.code.as_deref() == Some("acknowledgment_required") {
                body["docs_hint"] =
                    json!("Run `vitalis metrics ack` to confirm today's numbers, then retry.");
            }
            eprintln!("{}", serde_json::to_string_pretty(&body).unwrap());
            match failure.status {
                Some(status) if status < 500 => 1,
                Some(_) => 2,
                None => 3,
            }
        }
    }
}
