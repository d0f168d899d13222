use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use taxlens_core::{ClassifiedTransaction, Money, ParsedTransaction};
use taxlens_import::import::import_statement;
use taxlens_import::BankFormat;
use taxlens_tax::{QuickPit, TaxCalculationRequest, TaxEngine, TaxReport};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{self, CallerId};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::AppState;

/// Largest accepted request body, uploads included.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let protected = Router::new()
        .route("/api/tax/calculate", post(calculate))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_caller,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/parse", post(parse_statement))
        .route("/api/classify", post(classify))
        .route("/api/tax/quick-pit", post(quick_pit))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors(cors_origins))
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// ── Health ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: "taxlens",
    })
}

// ── Parse ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub transactions: Vec<ParsedTransaction>,
    pub count: usize,
    pub bank_format: BankFormat,
    pub filename: String,
    pub skipped_rows: usize,
}

/// Multipart upload: `file` (required), plus optional `bank_format` and
/// `delimiter` overrides.
async fn parse_statement(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<ParseResponse>, AppError> {
    let mut multipart = multipart?;
    let mut profile = state.import_profile.clone();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                upload = Some((filename, field.bytes().await?));
            }
            "bank_format" => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    profile.format = Some(text.parse().map_err(AppError::BadRequest)?);
                }
            }
            "delimiter" => {
                let text = field.text().await?;
                if !text.is_empty() {
                    profile.delimiter = text;
                }
            }
            _ => {}
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| AppError::BadRequest("No file provided".into()))?;
    let import = import_statement(&filename, &data, &profile)?;
    tracing::info!(
        filename = %filename,
        bank_format = %import.format,
        count = import.transactions.len(),
        skipped = import.skipped_rows,
        "statement parsed"
    );

    Ok(ApiResponse::ok(ParseResponse {
        count: import.transactions.len(),
        transactions: import.transactions,
        bank_format: import.format,
        filename,
        skipped_rows: import.skipped_rows,
    }))
}

// ── Classify ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub transactions: Vec<ClassifiedTransaction>,
    pub count: usize,
}

async fn classify(
    State(state): State<AppState>,
    payload: Result<Json<Vec<ParsedTransaction>>, JsonRejection>,
) -> Result<ApiResponse<ClassifyResponse>, AppError> {
    let Json(transactions) = payload?;

    // Outstanding AI calls stop if the client goes away.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let results = state.classifier.classify_batch(&transactions, &cancel).await;

    let transactions: Vec<ClassifiedTransaction> = transactions
        .into_iter()
        .zip(results)
        .map(|(transaction, classification)| ClassifiedTransaction {
            transaction,
            classification,
        })
        .collect();
    tracing::info!(count = transactions.len(), "transactions classified");

    Ok(ApiResponse::ok(ClassifyResponse {
        count: transactions.len(),
        transactions,
    }))
}

// ── Tax ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QuickPitRequest {
    pub annual_income: Money,
}

async fn quick_pit(
    payload: Result<Json<QuickPitRequest>, JsonRejection>,
) -> Result<ApiResponse<QuickPit>, AppError> {
    let Json(body) = payload?;
    Ok(ApiResponse::ok(TaxEngine::quick_pit(body.annual_income)))
}

async fn calculate(
    Extension(caller): Extension<CallerId>,
    payload: Result<Json<TaxCalculationRequest>, JsonRejection>,
) -> Result<ApiResponse<TaxReport>, AppError> {
    let Json(mut request) = payload?;
    request.user_id = Some(caller.0);
    let report = TaxEngine::calculate(&request)?;
    tracing::info!(
        report_id = %report.id,
        tax_year = %report.tax_year,
        transactions = request.transactions.len(),
        "tax report calculated"
    );
    Ok(ApiResponse::ok(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, TokenVerifier};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use taxlens_classify::{HybridClassifier, RuleClassifier};
    use taxlens_core::{TaxYear, Transaction};
    use taxlens_tax::ReliefInput;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn app_with_secret(secret: &str) -> Router {
        let state = AppState::new(
            HybridClassifier::rules_only(RuleClassifier::new()),
            TokenVerifier::new(secret),
        );
        router(state, &["http://localhost:3000".to_string()])
    }

    fn app() -> Router {
        app_with_secret(SECRET)
    }

    fn bearer(sub: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + 600) as u64,
        };
        let token =
            encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        format!("Bearer {token}")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload(filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n--XBOUNDARY--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/api/parse")
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    // ── Health ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn health_reports_service() {
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "healthy", "service": "taxlens"}));
    }

    // ── Parse ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn parse_gtbank_csv() {
        let csv = "Trans Date,Narration,Debit,Credit,Balance\n\
                   15-Jan-2026,SALARY JAN,,500000.00,700000.00\n\
                   16-Jan-2026,POS/SHOPRITE,12500.00,,687500.00";
        let (status, body) = send(app(), upload("jan.csv", csv)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["count"], 2);
        assert_eq!(body["data"]["bank_format"], "gtbank");
        assert_eq!(body["data"]["filename"], "jan.csv");
        assert_eq!(body["data"]["transactions"][0]["type"], "credit");
        assert_eq!(body["data"]["transactions"][1]["type"], "debit");
    }

    #[tokio::test]
    async fn parse_rejects_pdf() {
        let (status, body) = send(app(), upload("jan.pdf", "%PDF-1.7")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("PDF"));
    }

    #[tokio::test]
    async fn parse_rejects_header_only_csv() {
        let (status, body) = send(app(), upload("empty.csv", "Date,Description,Amount")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn parse_requires_file_field() {
        let body = "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--XBOUNDARY--\r\n";
        let req = Request::builder()
            .method("POST")
            .uri("/api/parse")
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file provided");
    }

    // ── Classify ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn classify_enriches_each_transaction() {
        let req = post_json(
            "/api/classify",
            json!([
                {"date": "2026-01-31", "description": "SALARY FOR JANUARY 2026", "amount": 450000, "type": "credit"},
                {"date": null, "description": "NIP TRF TO JOHN DOE", "amount": 20000, "type": "debit"}
            ]),
        );
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::OK);
        let txs = &body["data"]["transactions"];
        assert_eq!(body["data"]["count"], 2);
        assert_eq!(txs[0]["category"], "employment_income");
        assert_eq!(txs[0]["method"], "rules");
        assert_eq!(txs[0]["description"], "SALARY FOR JANUARY 2026");
        assert_eq!(txs[1]["category"], "transfer");
    }

    #[tokio::test]
    async fn classify_rejects_malformed_json() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/classify")
            .header("content-type", "application/json")
            .body(Body::from("[{not json"))
            .unwrap();
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/classify")
            .header("content-type", "application/json")
            .body(Body::from(vec![b' '; MAX_UPLOAD_BYTES + 1]))
            .unwrap();
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["success"], false);
    }

    // ── Tax ───────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn quick_pit_for_one_million() {
        let (status, body) =
            send(app(), post_json("/api/tax/quick-pit", json!({"annual_income": 1000000}))).await;
        assert_eq!(status, StatusCode::OK);
        let pit = body["data"]["pit_amount"].as_f64().unwrap();
        assert!((pit - 29999.85).abs() < 1e-6);
        let rate = body["data"]["effective_rate"].as_f64().unwrap();
        assert!((rate - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn quick_pit_zero_income_has_null_rate() {
        let (_, body) = send(app(), post_json("/api/tax/quick-pit", json!({"annual_income": 0}))).await;
        assert!(body["data"]["effective_rate"].is_null());
    }

    fn calculate_body() -> Value {
        json!({
            "tax_year": 2026,
            "transactions": [
                {"date": "2026-03-31", "description": "SALARY MARCH", "amount": 5575000,
                 "type": "credit", "category": "employment_income", "confidence": 0.85}
            ],
            "reliefs": {
                "annual_rent": 2000000, "pension_contribution": 100000,
                "nhis_contribution": 50000, "nhf_contribution": 25000
            }
        })
    }

    #[tokio::test]
    async fn calculate_requires_token() {
        let (status, body) = send(app(), post_json("/api/tax/calculate", calculate_body())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn calculate_rejects_non_bearer_scheme() {
        let mut req = post_json("/api/tax/calculate", calculate_body());
        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        let (status, _) = send(app(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn calculate_with_valid_token() {
        let mut req = post_json("/api/tax/calculate", calculate_body());
        req.headers_mut()
            .insert("authorization", HeaderValue::from_str(&bearer("user-7")).unwrap());
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::OK);
        let report = &body["data"];
        assert_eq!(report["user_id"], "user-7");
        assert_eq!(report["tax_year"], 2026);
        assert_eq!(report["total_reliefs"].as_f64().unwrap(), 575000.0);
        assert_eq!(report["taxable_income"].as_f64().unwrap(), 5000000.0);
        assert!((report["pit_amount"].as_f64().unwrap() - 689999.67).abs() < 1e-6);
        assert_eq!(report["cgt_amount"].as_f64().unwrap(), 0.0);
    }

    #[tokio::test]
    async fn calculate_without_configured_secret_is_unauthorized() {
        let mut req = post_json("/api/tax/calculate", calculate_body());
        req.headers_mut()
            .insert("authorization", HeaderValue::from_str(&bearer("user-7")).unwrap());
        let (status, _) = send(app_with_secret(""), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn calculate_negative_income_is_server_error() {
        let mut body = calculate_body();
        body["transactions"][0]["amount"] = json!(-5);
        let mut req = post_json("/api/tax/calculate", body);
        req.headers_mut()
            .insert("authorization", HeaderValue::from_str(&bearer("user-7")).unwrap());
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn calculate_with_overflowing_reliefs_is_server_error() {
        let mut body = calculate_body();
        body["reliefs"] = json!({"pension_contribution": 7.9e28, "nhis_contribution": 7.9e28});
        let mut req = post_json("/api/tax/calculate", body);
        req.headers_mut()
            .insert("authorization", HeaderValue::from_str(&bearer("user-7")).unwrap());
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
    }

    // ── Statement to report ───────────────────────────────────────────────────

    #[tokio::test]
    async fn parsed_statement_flows_into_a_report() {
        let csv = "Trans Date,Narration,Debit,Credit,Balance\n\
                   31-Jan-2026,SALARY FOR JANUARY 2026,,1000000.00,1000000.00\n\
                   02-Feb-2026,POS/SHOPRITE,12500.00,,987500.00";
        let (status, parsed) = send(app(), upload("jan.csv", csv)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, classified) =
            send(app(), post_json("/api/classify", parsed["data"]["transactions"].clone())).await;
        assert_eq!(status, StatusCode::OK);
        let classified: Vec<ClassifiedTransaction> =
            serde_json::from_value(classified["data"]["transactions"].clone()).unwrap();
        assert_eq!(classified.len(), 2);

        let transactions: Vec<Transaction> = classified
            .into_iter()
            .map(|c| Transaction::from_classification(c.transaction, c.classification))
            .collect();
        assert!(transactions.iter().all(|t| !t.is_manual));

        let request = TaxCalculationRequest {
            user_id: None,
            tax_year: TaxYear::new(2026),
            transactions,
            reliefs: ReliefInput::default(),
        };
        let mut req = post_json("/api/tax/calculate", serde_json::to_value(&request).unwrap());
        req.headers_mut()
            .insert("authorization", HeaderValue::from_str(&bearer("user-9")).unwrap());
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::OK);
        let report = &body["data"];
        assert_eq!(report["employment_income"].as_f64().unwrap(), 1000000.0);
        assert_eq!(report["total_income"].as_f64().unwrap(), 1000000.0);
        assert!((report["pit_amount"].as_f64().unwrap() - 29999.85).abs() < 1e-6);
    }
}
