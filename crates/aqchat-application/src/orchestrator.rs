//! The per-turn orchestration state machine.
//!
//! A message runs through `SessionEnsured → ContextLoaded → TenantResolved
//! → IntentClassified → Dispatched → Enriched → Persisted`. Downstream
//! failures on the dispatched call are converted into an apology reply and
//! a structured error record; best-effort sub-calls (secondary intent
//! pass, vector-store save, retrieval-augmentation) degrade silently.
//! Nothing propagates to the caller except overall cancellation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use aqchat_core::analysis::{AggregateEngine, AnalysisService, VectorAnalysisStore};
use aqchat_core::config::{ChatConfig, DeployMode};
use aqchat_core::error::{ChatError, Result};
use aqchat_core::extract::{
    DateRange, extract_date_range, extract_month_pair, extract_pollutant, extract_pollutants,
    normalize_db_parameter,
};
use aqchat_core::intent::{
    IntentKind, RuleBasedClassifier, SecondaryClassifier, apply_guardrail, combine_intents,
    heuristic_intent,
};
use aqchat_core::safety::ResponseSafetyFilter;
use aqchat_core::session::{ChatSession, ChatStore, ConversationContext, StoredMessage};
use aqchat_core::tenant::{TenantDirectory, TenantResolver, TenantSignals};

use crate::reply::{
    append_related_analyses, clean_reply, format_measurement, is_trivial_search_text,
    truncate_chars,
};

const EMPTY_MESSAGE_REPLY: &str = "Mesaj boş olamaz.";
const UNKNOWN_INTENT_REPLY: &str =
    "Üzgünüm, sadece hava kalitesi ölçüm verileri ve analizleri hakkında sorulara cevap verebilirim.";
const GENERIC_ERROR_REPLY: &str = "Bir hata oluştu. Lütfen tekrar deneyin.";
const MISSING_TENANT_QUERY_PROMPT: &str =
    "Hangi tenant için sorgu yapmak istiyorsunuz? (örn: akcansa)";
const MISSING_TENANT_ANALYSIS_PROMPT: &str = "Hangi tenant için analiz yapalım? (örn: akcansa)";
const MISSING_TENANT_COMPARISON_PROMPT: &str =
    "Hangi tenant için aylık karşılaştırma yapalım? (örn: akcansa)";
const MISSING_MONTHS_PROMPT: &str = "Hangi iki ayı karşılaştıralım? (örn: 2025-01 ve 2025-02)";
const DEFAULT_POLLUTANT: &str = "PM2.5";
const DEFAULT_ANALYSIS_POLLUTANTS: [&str; 3] = ["PM2.5", "PM10", "NO2"];
const DEFAULT_UNIT: &str = "µg/m³";

/// One incoming turn at the boundary surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
    pub domain: Option<String>,
    pub tenant_slug: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Terminal output of one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub intent: IntentKind,
    pub tenant_slug: Option<String>,
}

/// What one dispatch branch produced: a reply plus the extracted
/// parameters recorded on the turn.
struct HandlerOutcome {
    reply: String,
    parameters: Option<serde_json::Value>,
}

impl HandlerOutcome {
    fn new(reply: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            reply: reply.into(),
            parameters: Some(parameters),
        }
    }

    fn bare(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            parameters: None,
        }
    }
}

/// Routes classified turns to downstream analysis collaborators.
///
/// Each turn is one logical unit of work; the only shared mutable state
/// between concurrent turns is the backing stores, which own their
/// consistency. Same-session races resolve last-write-wins.
pub struct ChatOrchestrator {
    store: Arc<dyn ChatStore>,
    directory: Arc<dyn TenantDirectory>,
    aggregates: Arc<dyn AggregateEngine>,
    analysis: Arc<dyn AnalysisService>,
    vector_store: Arc<dyn VectorAnalysisStore>,
    secondary: Option<Arc<dyn SecondaryClassifier>>,
    resolver: TenantResolver,
    safety: ResponseSafetyFilter,
    config: ChatConfig,
}

impl ChatOrchestrator {
    /// Creates an orchestrator over the given collaborators, with the
    /// in-tree rule-based secondary classifier installed.
    pub fn new(
        store: Arc<dyn ChatStore>,
        directory: Arc<dyn TenantDirectory>,
        aggregates: Arc<dyn AggregateEngine>,
        analysis: Arc<dyn AnalysisService>,
        vector_store: Arc<dyn VectorAnalysisStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            store,
            resolver: TenantResolver::new(directory.clone()),
            directory,
            aggregates,
            analysis,
            vector_store,
            secondary: Some(Arc::new(RuleBasedClassifier)),
            safety: ResponseSafetyFilter::new(),
            config,
        }
    }

    /// Replaces the secondary intent classifier.
    pub fn with_secondary_classifier(mut self, classifier: Arc<dyn SecondaryClassifier>) -> Self {
        self.secondary = Some(classifier);
        self
    }

    /// Removes the secondary pass entirely; the heuristic result stands.
    pub fn without_secondary_classifier(mut self) -> Self {
        self.secondary = None;
        self
    }

    /// Handles one turn end to end.
    ///
    /// Returns `Err` only when `cancel` fires; every other failure is
    /// materialized as a normal [`ChatResponse`].
    pub async fn handle_message(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse> {
        let now = Utc::now();
        let mut session = guarded(&cancel, self.ensure_session(&request, now)).await?;

        let message = request.message.trim().to_string();
        if message.is_empty() {
            session.last_activity_at = Some(now);
            guarded(&cancel, self.store.save_session(&session)).await?;
            return Ok(ChatResponse {
                session_id: session.session_id,
                reply: EMPTY_MESSAGE_REPLY.to_string(),
                intent: IntentKind::Unknown,
                tenant_slug: session.tenant_slug,
            });
        }

        let mut context = guarded(&cancel, self.ensure_context(&session, now)).await?;

        let signals = TenantSignals {
            explicit_slug: request.tenant_slug.as_deref(),
            context_tenant: context.tenant_slug.as_deref(),
            domain: request.domain.as_deref(),
            message: &message,
        };
        if let Some(tenant) = guarded(&cancel, self.resolver.resolve(signals)).await? {
            session.tenant_slug = Some(tenant.clone());
            context.tenant_slug = Some(tenant);
            context.tenant_invalid_attempts = 0;
        }

        let intent = self.classify(&message, &session, &cancel).await?;

        guarded(
            &cancel,
            self.store.append_message(&StoredMessage::user(
                session.session_id.as_str(),
                message.as_str(),
                intent,
                now,
            )),
        )
        .await?;

        let resolved_tenant = session
            .tenant_slug
            .clone()
            .or_else(|| context.tenant_slug.clone());
        let outcome = self
            .dispatch(intent, resolved_tenant, &mut context, &message, &cancel, now)
            .await;

        let (mut reply, parameters, error_detail, response_metadata) = match outcome {
            Ok(mut outcome) => {
                if let Some(tenant) = session.tenant_slug.clone() {
                    if let Some(related) = self.related_analyses(&tenant, &message, &cancel).await? {
                        outcome.reply = append_related_analyses(&outcome.reply, &related);
                    }
                }
                (outcome.reply, outcome.parameters, None, None)
            }
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                tracing::error!(
                    session_id = %session.session_id,
                    tenant = ?session.tenant_slug,
                    intent = %intent,
                    error = %err,
                    "chat turn handling failed"
                );
                let reply = match self.config.deploy_mode {
                    DeployMode::Development => format!(
                        "Hata: {}",
                        truncate_error(&err.to_string(), self.config.error_detail_budget)
                    ),
                    DeployMode::Production => GENERIC_ERROR_REPLY.to_string(),
                };
                let metadata = json!({ "error": err.to_string() });
                (reply, None, Some(err.to_string()), Some(metadata))
            }
        };

        reply = clean_reply(&reply);
        reply = self
            .safety
            .validate(&reply, session.tenant_slug.as_deref(), &message);

        let mut assistant =
            StoredMessage::assistant(session.session_id.as_str(), reply.as_str(), intent, Utc::now());
        assistant.error_detail = error_detail;
        assistant.parameters = parameters;
        assistant.response_metadata = response_metadata;
        guarded(&cancel, self.store.append_message(&assistant)).await?;

        session.last_activity_at = Some(Utc::now());
        context.current_intent = Some(intent);
        context.last_activity = Utc::now();
        guarded(&cancel, self.store.save_session(&session)).await?;
        guarded(&cancel, self.store.save_context(&context)).await?;

        Ok(ChatResponse {
            session_id: session.session_id.clone(),
            reply,
            intent,
            tenant_slug: session.tenant_slug.clone(),
        })
    }

    /// Create-or-fetch the session, filling in request metadata the stored
    /// record is still missing and mapping the originating domain to a
    /// tenant on first contact.
    async fn ensure_session(&self, request: &ChatRequest, now: DateTime<Utc>) -> Result<ChatSession> {
        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut session = match self.store.find_session(&session_id).await? {
            Some(existing) => existing,
            None => ChatSession::new(session_id, now),
        };

        if session.domain.is_none() {
            session.domain = request.domain.clone();
        }
        if session.ip_address.is_none() {
            session.ip_address = request.ip_address.clone();
        }
        if session.user_agent.is_none() {
            session.user_agent = request.user_agent.clone();
        }

        if session.tenant_slug.is_none() {
            if let Some(domain) = request.domain.as_deref().filter(|d| !d.is_empty()) {
                if let Some(mapped) = self.directory.tenant_slug_for_domain(domain).await? {
                    if !mapped.is_empty() {
                        session.tenant_slug = Some(mapped);
                    }
                }
            }
        }

        Ok(session)
    }

    /// Create-or-fetch the conversation context, inheriting the session's
    /// domain and tenant where the context has none yet.
    async fn ensure_context(
        &self,
        session: &ChatSession,
        now: DateTime<Utc>,
    ) -> Result<ConversationContext> {
        let mut context = match self.store.find_context(&session.session_id).await? {
            Some(existing) => existing,
            None => ConversationContext::new(
                session.session_id.as_str(),
                session.domain.clone(),
                session.tenant_slug.clone(),
                now,
            ),
        };

        if context.domain.is_none() {
            context.domain = session.domain.clone();
        }
        if context.tenant_slug.is_none() {
            context.tenant_slug = session.tenant_slug.clone();
        }

        Ok(context)
    }

    /// Heuristic pass, best-effort secondary pass, then the guardrail.
    async fn classify(
        &self,
        message: &str,
        session: &ChatSession,
        cancel: &CancellationToken,
    ) -> Result<IntentKind> {
        let heuristic = heuristic_intent(message);

        let secondary = match &self.secondary {
            Some(classifier) => {
                let verdict = optional(
                    cancel,
                    self.config.secondary_intent_timeout(),
                    classifier.detect(message, session.domain.as_deref(), session.tenant_slug.as_deref()),
                )
                .await?;
                if verdict.is_none() {
                    tracing::debug!("secondary intent pass unavailable, heuristic result stands");
                }
                verdict.map(|detection| detection.intent)
            }
            None => None,
        };

        Ok(apply_guardrail(combine_intents(heuristic, secondary), message))
    }

    async fn dispatch(
        &self,
        intent: IntentKind,
        tenant: Option<String>,
        context: &mut ConversationContext,
        message: &str,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<HandlerOutcome> {
        match intent {
            IntentKind::AirQualityQuery => {
                self.handle_air_quality(tenant, context, message, cancel, now).await
            }
            IntentKind::StatisticalAnalysis => {
                self.handle_statistical(tenant, context, message, cancel, now).await
            }
            IntentKind::ComparisonAnalysis => {
                self.handle_comparison(tenant, context, message, cancel, now).await
            }
            IntentKind::Unknown => Ok(HandlerOutcome::bare(UNKNOWN_INTENT_REPLY)),
        }
    }

    /// Single-pollutant aggregate query over the tenant's device set.
    async fn handle_air_quality(
        &self,
        tenant: Option<String>,
        context: &mut ConversationContext,
        message: &str,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<HandlerOutcome> {
        let Some(tenant) = tenant else {
            context.tenant_invalid_attempts += 1;
            return Ok(HandlerOutcome::new(
                MISSING_TENANT_QUERY_PROMPT,
                json!({ "missing": "tenantSlug" }),
            ));
        };

        let pollutant = extract_pollutant(message).unwrap_or(DEFAULT_POLLUTANT);
        let parameter = normalize_db_parameter(pollutant);
        let range = extract_date_range(message, now).unwrap_or_else(|| DateRange::last_week(now));
        let (start_date, end_date) = range.format_dates();

        let devices = guarded(
            cancel,
            self.directory.devices_by_tenant(&tenant, self.config.device_limit),
        )
        .await?;
        if devices.is_empty() {
            return Ok(HandlerOutcome::new(
                format!("{tenant} için cihaz bulunamadı."),
                json!({ "tenantSlug": tenant }),
            ));
        }

        let rows = guarded(
            cancel,
            self.aggregates
                .aggregates(&devices, range, std::slice::from_ref(&parameter)),
        )
        .await?;

        let Some(row) = rows.first() else {
            return Ok(HandlerOutcome::new(
                format!("{tenant} için {parameter} verisi bulunamadı ({start_date} - {end_date})."),
                json!({
                    "tenantSlug": tenant,
                    "pollutant": parameter,
                    "startDate": start_date,
                    "endDate": end_date,
                }),
            ));
        };

        let unit = row.unit.as_deref().unwrap_or(DEFAULT_UNIT);
        let reply = format!(
            "{tenant} için {parameter} ({start_date} - {end_date})\n\
             Ortalama: {} {unit}\n\
             Minimum: {} {unit}\n\
             Maksimum: {} {unit}\n\
             Ölçüm sayısı: {}",
            format_measurement(row.average),
            format_measurement(row.minimum),
            format_measurement(row.maximum),
            row.measurement_count,
        );

        // Best-effort save for later retrieval; absence of this record is a
        // normal outcome.
        let metadata = json!({
            "analysis_type": "air_quality_query",
            "tenant_slug": tenant,
            "pollutant": parameter,
            "start_date": start_date,
            "end_date": end_date,
            "device_count": devices.len(),
        });
        let saved = optional(
            cancel,
            self.config.enrichment_timeout(),
            self.vector_store
                .save_analysis(&tenant, &reply, "air_quality_query", metadata),
        )
        .await?;
        if saved.is_none() {
            tracing::debug!(tenant = %tenant, "analysis save skipped or failed");
        }

        context.pollutant = Some(parameter.clone());
        context.start_date = Some(range.start);
        context.end_date = Some(range.end);

        Ok(HandlerOutcome::new(
            reply,
            json!({
                "tenantSlug": tenant,
                "pollutant": parameter,
                "startDate": start_date,
                "endDate": end_date,
                "deviceCount": devices.len(),
            }),
        ))
    }

    /// Multi-pollutant long-form analysis, delegated to the external
    /// analysis collaborator; the reply is its text verbatim.
    async fn handle_statistical(
        &self,
        tenant: Option<String>,
        context: &mut ConversationContext,
        message: &str,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<HandlerOutcome> {
        let Some(tenant) = tenant else {
            context.tenant_invalid_attempts += 1;
            return Ok(HandlerOutcome::new(
                MISSING_TENANT_ANALYSIS_PROMPT,
                json!({ "missing": "tenantSlug" }),
            ));
        };

        let range = extract_date_range(message, now).unwrap_or_else(|| DateRange::last_week(now));
        let (start_date, end_date) = range.format_dates();

        let mut pollutants = extract_pollutants(message);
        if pollutants.is_empty() {
            pollutants = DEFAULT_ANALYSIS_POLLUTANTS
                .iter()
                .map(|p| p.to_string())
                .collect();
        }

        let result = guarded(
            cancel,
            self.analysis
                .time_range_analysis(&tenant, range, &pollutants, None),
        )
        .await?;

        context.start_date = Some(range.start);
        context.end_date = Some(range.end);

        let reply = if result.raw_text.trim().is_empty() {
            "Analiz tamamlandı.".to_string()
        } else {
            result.raw_text
        };

        Ok(HandlerOutcome::new(
            reply,
            json!({
                "tenantSlug": tenant,
                "startDate": start_date,
                "endDate": end_date,
                "pollutants": pollutants,
            }),
        ))
    }

    /// Month-over-month comparison under its own generous deadline; the
    /// most data-intensive path.
    async fn handle_comparison(
        &self,
        tenant: Option<String>,
        context: &mut ConversationContext,
        message: &str,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<HandlerOutcome> {
        let Some(tenant) = tenant else {
            context.tenant_invalid_attempts += 1;
            return Ok(HandlerOutcome::new(
                MISSING_TENANT_COMPARISON_PROMPT,
                json!({ "missing": "tenantSlug" }),
            ));
        };

        let Some((month1, month2)) = extract_month_pair(message, now) else {
            return Ok(HandlerOutcome::new(
                MISSING_MONTHS_PROMPT,
                json!({ "missing": "month1/month2" }),
            ));
        };

        context.month1 = Some(month1.clone());
        context.month2 = Some(month2.clone());

        let result = bounded(
            cancel,
            self.config.comparison_timeout(),
            "monthly-comparison",
            self.analysis.monthly_comparison(&tenant, &month1, &month2, None),
        )
        .await?;

        let reply = if result.raw_text.trim().is_empty() {
            "Karşılaştırma tamamlandı.".to_string()
        } else {
            result.raw_text
        };

        Ok(HandlerOutcome::new(
            reply,
            json!({
                "tenantSlug": tenant,
                "month1": month1,
                "month2": month2,
            }),
        ))
    }

    /// Bounded best-effort similarity search over prior analyses. Any
    /// failure, timeout, or trivial result is absence, never an error.
    async fn related_analyses(
        &self,
        tenant: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let hits = optional(
            cancel,
            self.config.enrichment_timeout(),
            self.vector_store.search_analysis(
                tenant,
                message,
                self.config.enrichment_limit,
                self.config.enrichment_score_threshold,
                None,
            ),
        )
        .await?;

        let Some(hits) = hits else {
            tracing::debug!(tenant = %tenant, "related-analyses search skipped or failed");
            return Ok(None);
        };
        let Some(top) = hits.first() else {
            return Ok(None);
        };
        if top.text.trim().is_empty() || is_trivial_search_text(&top.text) {
            return Ok(None);
        }

        Ok(Some(truncate_chars(
            &top.text,
            self.config.enrichment_char_budget,
        )))
    }
}

/// Awaits a required operation, aborting the turn if the caller's
/// cancellation signal fires first.
async fn guarded<T, F>(cancel: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ChatError::Cancelled),
        result = operation => result,
    }
}

/// Awaits an optional enrichment operation under its own deadline nested
/// inside the caller's cancellation scope. Expiry or failure of the child
/// scope is graceful absence; only parent cancellation aborts the turn.
async fn optional<T, F>(
    cancel: &CancellationToken,
    budget: Duration,
    operation: F,
) -> Result<Option<T>>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ChatError::Cancelled),
        outcome = tokio::time::timeout(budget, operation) => {
            Ok(outcome.ok().and_then(|result| result.ok()))
        }
    }
}

/// Awaits a primary dispatched operation under its own deadline nested
/// inside the caller's cancellation scope. Child expiry is a downstream
/// failure; parent cancellation aborts the turn.
async fn bounded<T, F>(
    cancel: &CancellationToken,
    budget: Duration,
    collaborator: &'static str,
    operation: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ChatError::Cancelled),
        outcome = tokio::time::timeout(budget, operation) => match outcome {
            Ok(result) => result,
            Err(_) => Err(ChatError::collaborator(collaborator, "deadline exceeded")),
        }
    }
}

fn truncate_error(message: &str, budget: usize) -> String {
    message.chars().take(budget).collect()
}
