//! Route handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::server::AppState;
use crate::api::views::{
    CampaignDetail, CampaignList, CampaignView, ChallengeView, ExportStatus, LoginView,
    WalletView, WithdrawStatus,
};
use crate::chain::Lamports;
use crate::challenge::{ChallengeError, UpdateStatus, WithdrawPayload};
use crate::ledger::{CampaignFilter, CampaignKind, CampaignMetadata, CampaignStatus};

const DEFAULT_PAGE: usize = 20;
const MAX_PAGE: usize = 100;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub x_handle: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginView>, ApiError> {
    let (account, is_new) = state.services.accounts().login(&request.x_handle).await?;
    Ok(Json(LoginView::new(&account, is_new)))
}

pub async fn wallet(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<WalletView>, ApiError> {
    let (wallet_pub, balance) = state.services.accounts().wallet(&user_id).await?;
    Ok(Json(WalletView {
        wallet_pub,
        balance,
        balance_sol: balance.as_sol(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub user_id: String,
    pub x_handle: String,
}

pub async fn export_request(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ChallengeView>, ApiError> {
    let issued = state
        .services
        .export
        .begin(&request.user_id, &request.x_handle, ())
        .await?;
    Ok(Json(issued.into()))
}

pub async fn export_status(
    State(state): State<AppState>,
    Path(delivery_key): Path<String>,
) -> Result<Json<ExportStatus>, ApiError> {
    let delivered = state.services.export.collect(&delivery_key).await?;
    Ok(Json(delivered.into()))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub user_id: String,
    pub x_handle: String,
    pub destination_address: String,
    /// Amount in SOL.
    pub amount: serde_json::Number,
}

/// Lamports for a JSON amount, read from its decimal text so `4.1` is exact.
fn lamports_from_json(amount: &serde_json::Number) -> Option<Lamports> {
    Lamports::parse_sol(&amount.to_string()).or_else(|| amount.as_f64().and_then(Lamports::from_sol))
}

pub async fn withdraw_request(
    State(state): State<AppState>,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<ChallengeView>, ApiError> {
    let amount = lamports_from_json(&request.amount)
        .filter(|l| l.0 > 0)
        .ok_or_else(|| ApiError::BadRequest("amount must be a positive number".to_string()))?;

    let issued = state
        .services
        .withdraw
        .begin(
            &request.user_id,
            &request.x_handle,
            WithdrawPayload {
                destination: request.destination_address,
                amount,
            },
        )
        .await?;
    Ok(Json(issued.into()))
}

pub async fn withdraw_status(
    State(state): State<AppState>,
    Path(delivery_key): Path<String>,
) -> Result<Json<WithdrawStatus>, ApiError> {
    let delivered = state.services.withdraw.collect(&delivery_key).await?;
    Ok(Json(delivered.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub campaign_id: String,
    pub x_handle: String,
}

pub async fn update_request(
    State(state): State<AppState>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<ChallengeView>, ApiError> {
    let issued = state
        .services
        .update
        .request(&request.campaign_id, &request.x_handle)
        .await?;
    Ok(Json(issued.into()))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(delivery_key): Path<String>,
) -> Result<Json<UpdateStatus>, ApiError> {
    match state.services.update.status(&delivery_key).await {
        Ok(status) => Ok(Json(status)),
        Err(ChallengeError::NotFound | ChallengeError::Expired) => Ok(Json(UpdateStatus {
            verified: false,
            campaign_id: None,
        })),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMetadataRequest {
    pub delivery_key: String,
    pub metadata: CampaignMetadata,
}

pub async fn update_metadata(
    State(state): State<AppState>,
    Json(request): Json<UpdateMetadataRequest>,
) -> Result<Json<CampaignView>, ApiError> {
    if request.metadata.is_empty() {
        return Err(ApiError::BadRequest("metadata has no fields".to_string()));
    }
    let campaign = state
        .services
        .update
        .apply(&request.delivery_key, &request.metadata)
        .await?;
    Ok(Json(CampaignView::from(&campaign)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CampaignsQuery {
    #[serde(alias = "type")]
    pub kind: Option<CampaignKind>,
    pub status: Option<CampaignStatus>,
    pub limit: Option<usize>,
}

impl CampaignsQuery {
    fn page_size(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<CampaignsQuery>,
) -> Result<Json<CampaignList>, ApiError> {
    let limit = query.page_size();
    let campaigns = state
        .services
        .ledger
        .list(&CampaignFilter {
            kind: query.kind,
            status: query.status,
            limit: Some(limit),
        })
        .await?;
    let campaigns: Vec<CampaignView> = campaigns.iter().map(CampaignView::from).collect();
    Ok(Json(CampaignList {
        count: campaigns.len(),
        campaigns,
        limit,
    }))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignDetail>, ApiError> {
    let ledger = &state.services.ledger;
    let campaign = ledger
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("campaign {} not found", id)))?;
    let contributions = ledger.contributions(&id).await?;
    let balance = ledger.wallet_balance(&campaign).await?;
    Ok(Json(CampaignDetail {
        campaign: CampaignView::from(&campaign),
        contributions,
        balance,
    }))
}
