// src/commands/api.rs
use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

use contracts::{Evaluation, RiskAssessment, Scorer};

use crate::config::CoreConfig;
use crate::services::audit::{AuditLog, RequestRecord};
use crate::services::ingest::{DocumentIngestor, IngestError, TextExtractor, UploadedFile};
use crate::services::limiter::RateLimiter;

pub const ROUTE_ANALYZE: &str = "analyze";
pub const ROUTE_UPLOAD: &str = "upload";

/// Caller-facing failure categories. `Display` is the message sent back.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Request payload too large. Maximum size is {limit_mb}MB.")]
    PayloadTooLarge { limit_mb: usize },
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("Failed to extract text from PDF")]
    ExtractionFailed,
    #[error("An unexpected error occurred")]
    Internal,
}

impl RequestError {
    pub fn status(&self) -> u16 {
        match self {
            RequestError::BadRequest(_) => 400,
            RequestError::PayloadTooLarge { .. } => 413,
            RequestError::RateLimited => 429,
            RequestError::ExtractionFailed | RequestError::Internal => 500,
        }
    }

    fn from_ingest(e: &IngestError, limit_mb: usize) -> Self {
        match e {
            IngestError::NoFileSelected => RequestError::BadRequest("No selected file"),
            IngestError::InvalidFileType { .. } => {
                RequestError::BadRequest("Invalid file type. Only PDF files are allowed.")
            }
            IngestError::PayloadTooLarge { .. } => RequestError::PayloadTooLarge { limit_mb },
            IngestError::Extraction(_) => RequestError::ExtractionFailed,
            IngestError::TempFile(_) => RequestError::Internal,
        }
    }
}

/// Transport-agnostic response: a status code and a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    pub body: Value,
}

impl HandlerResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn from_error(err: &RequestError) -> Self {
        Self {
            status: err.status(),
            body: json!({ "error": err.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Serialize)]
struct AnalyzeBody<'a> {
    analysis: &'a RiskAssessment,
}

#[derive(Serialize)]
struct UploadBody<'a> {
    text: &'a str,
    analysis: &'a RiskAssessment,
}

// What the handler learned before answering, for logs and the audit record.
#[derive(Default)]
struct Outcome {
    evaluation: Option<Evaluation>,
    text_len: usize,
    content_hash: Option<String>,
}

/// Exposes the scorer to callers: validation, rate limiting, serialization.
pub struct RequestHandler {
    config: CoreConfig,
    scorer: Scorer<'static>,
    ingestor: DocumentIngestor,
    limiter: RateLimiter,
    audit: AuditLog,
}

impl RequestHandler {
    /// Build from config: custom rulebook if configured, `pdftotext` extraction.
    pub fn new(config: CoreConfig) -> Result<Self> {
        let scorer = config.rules.scorer()?;
        let ingestor = DocumentIngestor::from_config(&config.ingest);
        Ok(Self::from_parts(config, scorer, ingestor))
    }

    pub fn with_extractor(
        config: CoreConfig,
        scorer: Scorer<'static>,
        extractor: Box<dyn TextExtractor>,
    ) -> Self {
        let ingestor = DocumentIngestor::new(config.ingest.clone(), extractor);
        Self::from_parts(config, scorer, ingestor)
    }

    fn from_parts(config: CoreConfig, scorer: Scorer<'static>, ingestor: DocumentIngestor) -> Self {
        let audit = AuditLog::from_config(&config.audit);
        Self {
            config,
            scorer,
            ingestor,
            limiter: RateLimiter::new(),
            audit,
        }
    }

    pub fn scorer(&self) -> &Scorer<'static> {
        &self.scorer
    }

    /// Score text submitted as a JSON body `{"text": "..."}`.
    pub fn analyze(&self, client: &str, body: Option<&str>) -> HandlerResponse {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("request", id = %request_id, route = ROUTE_ANALYZE);
        let _enter = span.enter();

        let mut outcome = Outcome::default();
        let result = self.run_analyze(client, body, &mut outcome);
        self.finish(&request_id, ROUTE_ANALYZE, client, result, &outcome)
    }

    /// Score the text of an uploaded PDF.
    pub fn upload(&self, client: &str, file: Option<&UploadedFile>) -> HandlerResponse {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("request", id = %request_id, route = ROUTE_UPLOAD);
        let _enter = span.enter();

        let mut outcome = Outcome::default();
        let result = self.run_upload(client, file, &mut outcome);
        self.finish(&request_id, ROUTE_UPLOAD, client, result, &outcome)
    }

    fn run_analyze(
        &self,
        client: &str,
        body: Option<&str>,
        outcome: &mut Outcome,
    ) -> Result<Value, RequestError> {
        self.limit(ROUTE_ANALYZE, client)?;

        let raw = body.unwrap_or("");
        if raw.len() > self.config.ingest.max_upload_bytes {
            return Err(RequestError::PayloadTooLarge {
                limit_mb: self.config.ingest.max_upload_mb(),
            });
        }

        let data: Value = match serde_json::from_str(raw) {
            Ok(Value::Object(map)) if !map.is_empty() => Value::Object(map),
            _ => {
                tracing::error!("No JSON data in the request");
                return Err(RequestError::BadRequest("No JSON data"));
            }
        };

        let text = match data.get("text").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => t,
            _ => {
                tracing::error!("Empty contract text");
                return Err(RequestError::BadRequest("Empty contract text"));
            }
        };

        let evaluation = self.scorer.evaluate(text);
        let body = serde_json::to_value(AnalyzeBody {
            analysis: &evaluation.assessment,
        })
        .map_err(|_| RequestError::Internal)?;

        outcome.text_len = text.chars().count();
        outcome.evaluation = Some(evaluation);
        Ok(body)
    }

    fn run_upload(
        &self,
        client: &str,
        file: Option<&UploadedFile>,
        outcome: &mut Outcome,
    ) -> Result<Value, RequestError> {
        self.limit(ROUTE_UPLOAD, client)?;

        let Some(file) = file else {
            tracing::error!("No file part in the request");
            return Err(RequestError::BadRequest("No file part"));
        };

        let doc = self.ingestor.ingest(file).map_err(|e| {
            match &e {
                IngestError::PayloadTooLarge { .. } => {
                    tracing::warn!("Request payload too large: {e}")
                }
                IngestError::Extraction(_) => {
                    tracing::error!("Error extracting text from PDF: {e}")
                }
                _ => tracing::error!("{e}"),
            }
            RequestError::from_ingest(&e, self.config.ingest.max_upload_mb())
        })?;
        outcome.content_hash = Some(doc.content_hash.clone());

        if doc.text.trim().is_empty() {
            tracing::error!(filename = %doc.filename, "Empty contract text");
            return Err(RequestError::BadRequest("Empty contract text"));
        }

        let evaluation = self.scorer.evaluate(&doc.text);
        let body = serde_json::to_value(UploadBody {
            text: &doc.text,
            analysis: &evaluation.assessment,
        })
        .map_err(|_| RequestError::Internal)?;

        outcome.text_len = doc.text.chars().count();
        outcome.evaluation = Some(evaluation);
        Ok(body)
    }

    fn limit(&self, route: &str, client: &str) -> Result<(), RequestError> {
        let limits = match route {
            ROUTE_UPLOAD => self.config.limits.upload_limits(),
            ROUTE_ANALYZE => self.config.limits.analyze_limits(),
            _ => self.config.limits.default_limits(),
        };
        self.limiter.check(route, client, &limits).map_err(|hit| {
            tracing::warn!(
                client,
                max = hit.limit.max,
                window_secs = hit.limit.window.as_secs(),
                retry_after_secs = hit.retry_after.as_secs(),
                "Rate limit exceeded"
            );
            RequestError::RateLimited
        })
    }

    fn finish(
        &self,
        request_id: &str,
        route: &str,
        client: &str,
        result: Result<Value, RequestError>,
        outcome: &Outcome,
    ) -> HandlerResponse {
        let (response, error) = match result {
            Ok(body) => (HandlerResponse::ok(body), None),
            Err(e) => (HandlerResponse::from_error(&e), Some(e.to_string())),
        };

        let level = outcome
            .evaluation
            .as_ref()
            .map(|ev| ev.assessment.risk_level.as_str());
        let score = outcome.evaluation.as_ref().map(|ev| ev.score);

        tracing::info!(
            status = response.status,
            risk_level = level.unwrap_or("-"),
            score = score.unwrap_or_default(),
            text_len = outcome.text_len,
            "request finished"
        );

        self.audit.record_request(&RequestRecord {
            request_id,
            route,
            client,
            status: response.status,
            risk_level: level,
            score,
            text_len: outcome.text_len,
            content_hash: outcome.content_hash.as_deref(),
            error,
        });

        response
    }
}
