// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound payouts.
//!
//! The reward calculator only computes amounts. This module hands them to a
//! [`PayoutSender`], one call per participant with a positive payout and a
//! known recipient address.

use crate::models::RewardResult;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Estimates below this success probability are not confirmed.
const MIN_SUCCESS_PROBABILITY: f64 = 0.9;

/// Capability to send a payment to one recipient.
pub trait PayoutSender: Send + Sync {
    fn send_payout<'a>(
        &'a self,
        recipient: &'a str,
        amount_sats: u64,
        memo: &'a str,
    ) -> BoxFuture<'a, Result<PayoutReceipt, PayoutError>>;
}

/// Confirmation of a sent payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub id: String,
    pub amount_sats: u64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayoutError {
    #[error("Payout API request failed: {0}")]
    Http(String),

    #[error("Payout API rate limit exceeded")]
    RateLimited,

    #[error("Payout API rejected credentials")]
    Unauthorized,

    #[error("Payment unlikely to succeed (probability {0:.2})")]
    LowSuccessProbability(f64),

    #[error("Invalid payout API response: {0}")]
    InvalidResponse(String),

    #[error("Failed to load recipient addresses: {0}")]
    Addresses(String),
}

// ─── HTTP sender ─────────────────────────────────────────────

/// Payments API client (bearer key, estimate then confirm).
#[derive(Clone)]
pub struct HttpPayoutClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct WithdrawRequest<'a> {
    amount: u64,
    currency: &'static str,
    destination: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<WithdrawMetadata<'a>>,
}

#[derive(Serialize)]
struct WithdrawMetadata<'a> {
    reason: &'a str,
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct EstimateData {
    success_probability: f64,
}

#[derive(Deserialize)]
struct ConfirmData {
    id: String,
    amount_sats: u64,
}

impl HttpPayoutClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &WithdrawRequest<'_>,
    ) -> Result<T, PayoutError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PayoutError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Payout API rate limit hit (429)");
                return Err(PayoutError::RateLimited);
            }
            if status.as_u16() == 401 {
                return Err(PayoutError::Unauthorized);
            }
            return Err(PayoutError::Http(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<ApiEnvelope<T>>()
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| PayoutError::InvalidResponse(e.to_string()))
    }

    async fn pay(
        &self,
        recipient: &str,
        amount_sats: u64,
        memo: &str,
    ) -> Result<PayoutReceipt, PayoutError> {
        let estimate: EstimateData = self
            .post(
                "/bitcoin/withdraw/estimate",
                &WithdrawRequest {
                    amount: amount_sats,
                    currency: "sats",
                    destination: recipient,
                    metadata: None,
                },
            )
            .await?;

        if estimate.success_probability < MIN_SUCCESS_PROBABILITY {
            return Err(PayoutError::LowSuccessProbability(
                estimate.success_probability,
            ));
        }

        let confirmed: ConfirmData = self
            .post(
                "/bitcoin/withdraw/confirm",
                &WithdrawRequest {
                    amount: amount_sats,
                    currency: "sats",
                    destination: recipient,
                    metadata: Some(WithdrawMetadata { reason: memo }),
                },
            )
            .await?;

        Ok(PayoutReceipt {
            id: confirmed.id,
            amount_sats: confirmed.amount_sats,
        })
    }
}

impl PayoutSender for HttpPayoutClient {
    fn send_payout<'a>(
        &'a self,
        recipient: &'a str,
        amount_sats: u64,
        memo: &'a str,
    ) -> BoxFuture<'a, Result<PayoutReceipt, PayoutError>> {
        Box::pin(self.pay(recipient, amount_sats, memo))
    }
}

// ─── Dry-run sender ──────────────────────────────────────────

/// Logs payouts without sending anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPayoutSender;

impl PayoutSender for DryRunPayoutSender {
    fn send_payout<'a>(
        &'a self,
        recipient: &'a str,
        amount_sats: u64,
        memo: &'a str,
    ) -> BoxFuture<'a, Result<PayoutReceipt, PayoutError>> {
        Box::pin(async move {
            tracing::info!(recipient, amount_sats, memo, "Dry run: payout not sent");
            Ok(PayoutReceipt {
                id: format!("dry-run-{}", recipient),
                amount_sats,
            })
        })
    }
}

// ─── Distribution ────────────────────────────────────────────

/// Load a participant -> recipient address map from a JSON object file.
pub fn load_addresses(path: &Path) -> Result<HashMap<String, String>, PayoutError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| PayoutError::Addresses(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&json).map_err(|e| PayoutError::Addresses(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaidPayout {
    pub participant: String,
    pub recipient: String,
    pub receipt: PayoutReceipt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutFailure {
    pub participant: String,
    pub amount_sats: u64,
    pub reason: String,
}

/// Result of a payout batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PayoutSummary {
    pub paid: Vec<PaidPayout>,
    pub failed: Vec<PayoutFailure>,
    /// Participants with a positive payout but no known address
    pub missing_address: Vec<String>,
    pub total_paid_sats: u64,
}

impl PayoutSummary {
    /// Returns true if no payout failed.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Send every positive payout with a known address.
///
/// Payouts go out one at a time. A failure is recorded and the batch
/// continues with the next participant.
pub async fn distribute_payouts(
    sender: &dyn PayoutSender,
    results: &[RewardResult],
    addresses: &HashMap<String, String>,
    memo: &str,
) -> PayoutSummary {
    let mut summary = PayoutSummary::default();

    for result in results.iter().filter(|r| r.total_payout > 0) {
        let Some(recipient) = addresses.get(&result.participant) else {
            tracing::debug!(participant = %result.participant, "No recipient address, skipping payout");
            summary.missing_address.push(result.participant.clone());
            continue;
        };

        match sender
            .send_payout(recipient, result.total_payout, memo)
            .await
        {
            Ok(receipt) => {
                tracing::info!(
                    participant = %result.participant,
                    amount_sats = result.total_payout,
                    payment_id = %receipt.id,
                    "Payout sent"
                );
                summary.total_paid_sats = summary.total_paid_sats.saturating_add(receipt.amount_sats);
                summary.paid.push(PaidPayout {
                    participant: result.participant.clone(),
                    recipient: recipient.clone(),
                    receipt,
                });
            }
            Err(e) => {
                tracing::warn!(
                    participant = %result.participant,
                    amount_sats = result.total_payout,
                    error = %e,
                    "Payout failed"
                );
                summary.failed.push(PayoutFailure {
                    participant: result.participant.clone(),
                    amount_sats: result.total_payout,
                    reason: e.to_string(),
                });
            }
        }
    }

    summary
}
