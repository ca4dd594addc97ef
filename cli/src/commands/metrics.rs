use serde_json::json;

use crate::api::{ApiClient, ClientError, TodayMetricsView};
use crate::commands::report_error;
use crate::state::{AckSnapshot, AckState};

fn publish(ack_state: &AckState, view: &TodayMetricsView) {
    ack_state.update(AckSnapshot {
        acknowledged: view.acknowledged,
        metrics_computed_at: view.metrics.computed_at,
        formula_version: view.metrics.formula_version,
    });
}

/// Show today's snapshot with its acknowledgment status.
pub async fn today(client: &ApiClient, ack_state: &AckState) -> i32 {
    match client.today_metrics().await {
        Ok(view) => {
            publish(ack_state, &view);
            println!("{}", serde_json::to_string_pretty(&view).unwrap());
            0
        }
        Err(ClientError::Api { status: 404, .. }) => {
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "error": "not_found",
                    "message": "No metrics computed for today yet.",
                    "docs_hint": "Run `vitalis plan show` to trigger the first computation, or wait for the daily batch."
                }))
                .unwrap()
            );
            1
        }
        Err(err) => report_error(&err),
    }
}

/// Acknowledge today's snapshot. Safe to repeat: the server returns the
/// original acknowledgment for a duplicate.
pub async fn ack(client: &ApiClient, ack_state: &AckState) -> i32 {
    let view = match client.today_metrics().await {
        Ok(view) => view,
        Err(err) => return report_error(&err),
    };

    if view.acknowledged {
        publish(ack_state, &view);
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "status": "already_acknowledged",
                "acknowledgement": view.acknowledgement
            }))
            .unwrap()
        );
        return 0;
    }

    match client
        .acknowledge(view.metrics.formula_version, view.metrics.computed_at)
        .await
    {
        Ok(acknowledgment) => {
            ack_state.update(AckSnapshot {
                acknowledged: true,
                metrics_computed_at: acknowledgment.metrics_computed_at,
                formula_version: acknowledgment.formula_version,
            });
            // Render the flag from the shared state, not the transport response.
            let acknowledged = ack_state
                .current()
                .map(|s| s.acknowledged)
                .unwrap_or(false);
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "acknowledged": acknowledged,
                    "acknowledgment": acknowledgment,
                }))
                .unwrap()
            );
            0
        }
        Err(err) => report_error(&err),
    }
}
