//! HTTP handler functions for the blockwatch API.

use actix_web::{HttpResponse, web};
use blockwatch_alert_models::{IncidentSeverity, RawReport};
use blockwatch_cluster::AlertCluster;
use blockwatch_geo::NormalizedCoordinate;
use blockwatch_moderation::ModerationError;
use blockwatch_notify::registration;
use blockwatch_server_models::{
    AcceptResponse, ApiCluster, ApiFanoutSummary, ApiHealth, LocationUpdateRequest,
    ModerationDecisionRequest, RejectResponse, SubmitReportRequest, SubmitReportResponse,
    TokenUpdateRequest,
};
use blockwatch_store::ReportStore as _;
use chrono::Utc;
use uuid::Uuid;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/reports`
///
/// Stores a new incident report in the pending queue. Severity defaults
/// to the incident type's severity when the request omits it.
pub async fn submit_report(
    state: web::Data<AppState>,
    body: web::Json<SubmitReportRequest>,
) -> HttpResponse {
    let req = body.into_inner();

    if req.location.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "location must not be empty"
        }));
    }

    let severity = match req.severity {
        Some(value) => match IncidentSeverity::from_value(value) {
            Ok(severity) => severity,
            Err(e) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": e.to_string()
                }));
            }
        },
        None => req.incident_type.default_severity(),
    };

    let report = RawReport {
        id: Uuid::new_v4(),
        incident_type: req.incident_type,
        severity,
        location: req.location,
        description: req.description,
        image_ref: req.image_ref,
        submitter_id: req.submitter_id,
        created_at: Utc::now(),
    };

    match state.reports.create_report(report).await {
        Ok(id) => HttpResponse::Created().json(SubmitReportResponse { id }),
        Err(e) => {
            log::error!("Failed to store report: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to store report"
            }))
        }
    }
}

/// `GET /api/moderation/queue`
///
/// Returns the pending reports grouped into duplicate clusters. The
/// queue is recomputed from the live pending list on every call.
pub async fn moderation_queue(state: web::Data<AppState>) -> HttpResponse {
    match state.moderation.load_queue().await {
        Ok(queue) => {
            let clusters: Vec<ApiCluster> = queue.into_iter().map(ApiCluster::from).collect();
            HttpResponse::Ok().json(clusters)
        }
        Err(e) => {
            log::error!("Failed to load moderation queue: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to load moderation queue"
            }))
        }
    }
}

/// `POST /api/moderation/accept`
///
/// Publishes one alert from the reviewed cluster, removes its member
/// reports, and fans the alert out to nearby subscribers. A fan-out
/// abort is reported in the response but the alert stays published.
pub async fn moderation_accept(
    state: web::Data<AppState>,
    body: web::Json<ModerationDecisionRequest>,
) -> HttpResponse {
    let cluster = match materialize_decision(&state, &body.into_inner()).await {
        Ok(cluster) => cluster,
        Err(response) => return response,
    };

    let outcome = match state.moderation.accept(cluster).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Failed to accept cluster: {e}");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to accept cluster"
            }));
        }
    };

    let (notified, fanout_error) = match &state.fanout {
        Some(fanout) => match fanout.notify_nearby(&outcome.alert).await {
            Ok(summary) => (
                Some(ApiFanoutSummary {
                    scanned: summary.scanned,
                    in_range: summary.in_range,
                    dispatched: summary.dispatched,
                }),
                None,
            ),
            Err(e) => {
                log::error!("Fan-out for alert {} aborted: {e}", outcome.alert.id);
                (None, Some(e.to_string()))
            }
        },
        None => (None, None),
    };

    HttpResponse::Ok().json(AcceptResponse {
        alert_id: outcome.alert.id,
        deleted: outcome.deleted,
        failed_deletes: outcome.failed_deletes,
        notified,
        fanout_error,
    })
}

/// `POST /api/moderation/reject`
///
/// Removes the reviewed cluster's member reports without publishing.
pub async fn moderation_reject(
    state: web::Data<AppState>,
    body: web::Json<ModerationDecisionRequest>,
) -> HttpResponse {
    let cluster = match materialize_decision(&state, &body.into_inner()).await {
        Ok(cluster) => cluster,
        Err(response) => return response,
    };

    match state.moderation.reject(cluster).await {
        Ok(outcome) => HttpResponse::Ok().json(RejectResponse {
            deleted: outcome.deleted,
            failed_deletes: outcome.failed_deletes,
        }),
        Err(e) => {
            log::error!("Failed to reject cluster: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to reject cluster"
            }))
        }
    }
}

/// `PUT /api/subscribers/{user_id}/location`
///
/// Upserts the subscriber's last known location.
pub async fn update_location(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<LocationUpdateRequest>,
) -> HttpResponse {
    let user_id = path.into_inner();
    let req = body.into_inner();

    if let Err(e) = NormalizedCoordinate::new(req.latitude, req.longitude) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": e.to_string()
        }));
    }

    match registration::record_location(
        state.subscribers.as_ref(),
        &user_id,
        req.latitude,
        req.longitude,
    )
    .await
    {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => {
            log::error!("Failed to store location for subscriber {user_id}: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to store location"
            }))
        }
    }
}

/// `PUT /api/subscribers/{user_id}/token`
///
/// Registers the subscriber's push token, evicting any other subscriber
/// currently holding the same token.
pub async fn update_token(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<TokenUpdateRequest>,
) -> HttpResponse {
    let user_id = path.into_inner();
    let token = body.into_inner().push_token;

    if token.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "pushToken must not be empty"
        }));
    }

    match registration::register_push_token(state.subscribers.as_ref(), &user_id, &token).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => {
            log::error!("Failed to register push token for subscriber {user_id}: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to register push token"
            }))
        }
    }
}

/// Rebuilds the cluster a moderation decision refers to, mapping the
/// failure modes to HTTP responses.
async fn materialize_decision(
    state: &web::Data<AppState>,
    decision: &ModerationDecisionRequest,
) -> Result<AlertCluster, HttpResponse> {
    if decision.report_ids.is_empty() {
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "reportIds must not be empty"
        })));
    }

    match state.moderation.materialize(&decision.report_ids).await {
        Ok(cluster) => Ok(cluster),
        Err(e @ ModerationError::NothingPending) => {
            Err(HttpResponse::Conflict().json(serde_json::json!({
                "error": e.to_string()
            })))
        }
        Err(e) => {
            log::error!("Failed to materialize cluster: {e}");
            Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to materialize cluster"
            })))
        }
    }
}
