use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use agreewise_core::commands::{HandlerResponse, RequestHandler};
use agreewise_core::config::CoreConfig;
use agreewise_core::services::ingest::{ExtractError, TextExtractor, UploadedFile};
use contracts::Scorer;
use serde_json::{Value, json};

/// Returns fixed text and remembers where the spooled PDF lived.
struct FixedText {
    text: String,
    seen: Arc<Mutex<Option<PathBuf>>>,
}

impl TextExtractor for FixedText {
    fn extract(&self, pdf_path: &Path) -> Result<String, ExtractError> {
        assert!(pdf_path.exists(), "temp upload should exist during extraction");
        *self.seen.lock().unwrap() = Some(pdf_path.to_path_buf());
        Ok(self.text.clone())
    }
}

struct Broken;

impl TextExtractor for Broken {
    fn extract(&self, _pdf_path: &Path) -> Result<String, ExtractError> {
        Err(ExtractError::Encoding)
    }
}

fn handler_with(cfg: CoreConfig, text: &str) -> (RequestHandler, Arc<Mutex<Option<PathBuf>>>) {
    let seen = Arc::new(Mutex::new(None));
    let extractor = FixedText { text: text.to_string(), seen: seen.clone() };
    let handler = RequestHandler::with_extractor(cfg, Scorer::default(), Box::new(extractor));
    (handler, seen)
}

fn handler() -> RequestHandler {
    handler_with(CoreConfig::default(), "").0
}

fn analyze_text(h: &RequestHandler, text: &str) -> HandlerResponse {
    let body = json!({ "text": text }).to_string();
    h.analyze("127.0.0.1", Some(&body))
}

fn error_of(resp: &HandlerResponse) -> &str {
    resp.body["error"].as_str().unwrap_or_default()
}

#[test]
fn test_analyze_returns_assessment() {
    let resp = analyze_text(
        &handler(),
        "This agreement includes a broad non-compete and strict indemnification terms.",
    );
    assert_eq!(resp.status, 200);
    assert!(resp.is_success());
    let analysis = &resp.body["analysis"];
    assert_eq!(analysis["riskLevel"], "high");
    assert_eq!(analysis["verdict"], false);
    assert_eq!(
        analysis["findings"],
        json!([
            "Non-compete clause is overly broad",
            "Indemnification clause is too one-sided"
        ])
    );
    assert_eq!(resp.body.as_object().map(|o| o.len()), Some(1));
}

#[test]
fn test_analyze_rejects_missing_body() {
    let h = handler();
    for body in [None, Some(""), Some("{}"), Some("not json"), Some("[1,2]")] {
        let resp = h.analyze("c", body);
        assert_eq!(resp.status, 400, "body {body:?}");
        assert_eq!(error_of(&resp), "No JSON data");
    }
}

#[test]
fn test_analyze_rejects_empty_text() {
    let h = handler();
    for body in [r#"{"text": ""}"#, r#"{"other": 1}"#, r#"{"text": 42}"#] {
        let resp = h.analyze("c", Some(body));
        assert_eq!(resp.status, 400, "body {body}");
        assert_eq!(error_of(&resp), "Empty contract text");
    }
}

#[test]
fn test_analyze_enforces_payload_limit() {
    let cfg = CoreConfig::from_toml_str(
        r#"
        [ingest]
        max_upload_bytes = 2097152
        "#,
    )
    .unwrap();
    let h = handler_with(cfg, "").0;
    let resp = analyze_text(&h, &"a".repeat(3 * 1024 * 1024));
    assert_eq!(resp.status, 413);
    assert_eq!(error_of(&resp), "Request payload too large. Maximum size is 2MB.");
}

#[test]
fn test_analyze_rate_limit() {
    let cfg = CoreConfig::from_toml_str(
        r#"
        [limits]
        analyze_per_minute = 2
        "#,
    )
    .unwrap();
    let h = handler_with(cfg, "").0;
    assert_eq!(analyze_text(&h, "fair").status, 200);
    assert_eq!(analyze_text(&h, "fair").status, 200);
    let resp = analyze_text(&h, "fair");
    assert_eq!(resp.status, 429);
    assert_eq!(error_of(&resp), "Rate limit exceeded. Please try again later.");

    // Another client still has budget
    let body = json!({ "text": "fair" }).to_string();
    assert_eq!(h.analyze("10.0.0.9", Some(&body)).status, 200);
}

#[test]
fn test_upload_scores_extracted_text_and_removes_temp_file() {
    let text = "Mutual confidential obligations. Termination on notice.";
    let (h, seen) = handler_with(CoreConfig::default(), text);
    let file = UploadedFile::new("Contract.PDF", b"%PDF-1.4 fake".to_vec());
    let resp = h.upload("c", Some(&file));

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["text"], text);
    // confidential 2 + termination 2 + mutual -1
    assert_eq!(resp.body["analysis"]["riskLevel"], "medium");
    assert_eq!(resp.body["analysis"]["verdict"], false);

    let path = seen.lock().unwrap().clone().expect("extractor was called");
    assert!(!path.exists(), "temp upload should be deleted");
}

#[test]
fn test_upload_validation_errors() {
    let h = handler();
    let resp = h.upload("c", None);
    assert_eq!((resp.status, error_of(&resp)), (400, "No file part"));

    let resp = h.upload("c", Some(&UploadedFile::new("", b"x".to_vec())));
    assert_eq!((resp.status, error_of(&resp)), (400, "No selected file"));

    for name in ["contract.docx", "contract", "pdf", "contract.pdf.exe"] {
        let resp = h.upload("c", Some(&UploadedFile::new(name, b"x".to_vec())));
        assert_eq!(resp.status, 400, "filename {name}");
        assert_eq!(error_of(&resp), "Invalid file type. Only PDF files are allowed.");
    }
}

#[test]
fn test_upload_payload_too_large() {
    let cfg = CoreConfig::from_toml_str("[ingest]\nmax_upload_bytes = 1048576\n").unwrap();
    let h = handler_with(cfg, "liability").0;
    let file = UploadedFile::new("big.pdf", vec![0u8; 1024 * 1024 + 1]);
    let resp = h.upload("c", Some(&file));
    assert_eq!(resp.status, 413);
    assert_eq!(error_of(&resp), "Request payload too large. Maximum size is 1MB.");
}

#[test]
fn test_payload_limit_below_one_megabyte_reports_rounded_up_size() {
    let cfg = CoreConfig::from_toml_str("[ingest]\nmax_upload_bytes = 1000\n").unwrap();
    let h = handler_with(cfg, "liability").0;
    let resp = h.upload("c", Some(&UploadedFile::new("a.pdf", vec![0u8; 2000])));
    assert_eq!(resp.status, 413);
    assert_eq!(error_of(&resp), "Request payload too large. Maximum size is 1MB.");
}

#[test]
fn test_upload_extraction_failure_is_server_error() {
    let h = RequestHandler::with_extractor(CoreConfig::default(), Scorer::default(), Box::new(Broken));
    let resp = h.upload("c", Some(&UploadedFile::new("a.pdf", b"%PDF".to_vec())));
    assert_eq!(resp.status, 500);
    assert_eq!(error_of(&resp), "Failed to extract text from PDF");
}

#[test]
fn test_upload_with_missing_pdftotext_binary() {
    let cfg = CoreConfig::from_toml_str(
        "[ingest]\npdftotext_bin = \"/nonexistent/agreewise/pdftotext\"\n",
    )
    .unwrap();
    let h = RequestHandler::new(cfg).expect("handler");
    let resp = h.upload("c", Some(&UploadedFile::new("a.pdf", b"%PDF".to_vec())));
    assert_eq!(resp.status, 500);
    assert_eq!(error_of(&resp), "Failed to extract text from PDF");
}

#[test]
fn test_upload_with_blank_extracted_text_is_rejected() {
    let h = handler_with(CoreConfig::default(), " \n\u{c}").0;
    let resp = h.upload("c", Some(&UploadedFile::new("scan.pdf", b"%PDF".to_vec())));
    assert_eq!((resp.status, error_of(&resp)), (400, "Empty contract text"));
}

#[test]
fn test_upload_rate_limit_is_separate_from_analyze() {
    let cfg = CoreConfig::from_toml_str("[limits]\nupload_per_minute = 1\n").unwrap();
    let h = handler_with(cfg, "fair terms").0;
    let file = UploadedFile::new("a.pdf", b"%PDF".to_vec());
    assert_eq!(h.upload("c", Some(&file)).status, 200);
    assert_eq!(h.upload("c", Some(&file)).status, 429);
    assert_eq!(analyze_text(&h, "fair").status, 200);
}

#[test]
fn test_audit_logbook_records_outcomes_without_text() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit").join("requests.jsonl");
    let cfg = CoreConfig::from_toml_str(&format!(
        "[audit]\nenabled = true\npath = {:?}\n",
        log_path.to_string_lossy()
    ))
    .unwrap();
    let h = handler_with(cfg, "").0;

    analyze_text(&h, "Secret liability wording");
    h.analyze("c", Some("{}"));

    let content = std::fs::read_to_string(&log_path).expect("logbook written");
    let lines: Vec<Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "request_handled");
    assert_eq!(lines[0]["data"]["route"], "analyze");
    assert_eq!(lines[0]["data"]["status"], 200);
    assert_eq!(lines[0]["data"]["risk_level"], "medium");
    assert_eq!(lines[0]["data"]["score"], 3);
    assert_eq!(lines[1]["event"], "request_rejected");
    assert_eq!(lines[1]["data"]["error"], "No JSON data");
    assert!(!content.contains("Secret"));
}

#[test]
fn test_audit_logbook_lines_stay_whole_under_concurrent_requests() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("requests.jsonl");
    let cfg = CoreConfig::from_toml_str(&format!(
        "[limits]\nanalyze_per_minute = 1000000\n\n[audit]\nenabled = true\npath = {:?}\n",
        log_path.to_string_lossy()
    ))
    .unwrap();
    let h = handler_with(cfg, "").0;

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let h = &h;
            s.spawn(move || {
                let client = format!("client-{t}");
                let body = json!({ "text": "Mutual termination with confidential arbitration." })
                    .to_string();
                for _ in 0..PER_THREAD {
                    assert_eq!(h.analyze(&client, Some(&body)).status, 200);
                }
            });
        }
    });

    let content = std::fs::read_to_string(&log_path).expect("logbook written");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    for line in lines {
        let record: Value = serde_json::from_str(line).expect("each line is one JSON record");
        assert_eq!(record["event"], "request_handled");
    }
}

#[test]
fn test_custom_rulebook_from_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("rules.toml"),
        "[[risky]]\nterm = \"penalty\"\nweight = 5\nmessage = \"Penalty clause\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("agreewise.toml"),
        "[rules]\npath = \"rules.toml\"\n",
    )
    .unwrap();

    let cfg = CoreConfig::load(dir.path()).unwrap();
    let h = RequestHandler::new(cfg).unwrap();
    let resp = analyze_text(&h, "A penalty applies.");
    assert_eq!(resp.body["analysis"]["riskLevel"], "high");
    assert_eq!(resp.body["analysis"]["findings"], json!(["Penalty clause"]));
}
