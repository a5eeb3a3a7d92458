//! 端到端测试：脚本化的生成器 + 临时目录中的真实文件

use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assignment_autofill::error::GenerationError;
use assignment_autofill::formats::DocumentParser;
use assignment_autofill::models::{ConfidenceBucket, ContentType};
use assignment_autofill::orchestrator::cancellation;
use assignment_autofill::services::{Generation, Instruction};
use assignment_autofill::{
    CompletionJob, Config, FormatRegistry, JobOrchestrator, JobResult, JobStatus, LocalFileStore,
    SubscriptionTier, TextGenerator,
};
use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const HOMEWORK: &str = "# Homework\n\n1. Water boils at ____ degrees Celsius.\n\n2. The largest planet is ____.\n\n3. Write a short essay of 50 words about the water cycle.\n[ANSWER]\n";

const ESSAY: &str = "The water cycle describes how water moves continuously between the oceans, the atmosphere and the land. It is driven by energy from the sun.\n\nFirst, heat causes water to evaporate from seas and lakes. The vapour rises, cools and condenses into clouds. When the droplets grow heavy they fall back to the ground as rain or snow.\n\nIn conclusion, the cycle refreshes rivers, feeds plants and supplies the water that people drink every day, so protecting it matters for everyone.";

type Route = fn(&str) -> Result<String, GenerationError>;

/// 按题目内容回答的生成器（并发下调用顺序不确定）
struct Routed {
    route: Route,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl Routed {
    fn new(route: Route) -> Arc<Self> {
        Self::with_delay(route, Duration::ZERO)
    }

    fn with_delay(route: Route, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            route,
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }
}

/// 只取 `Question:` 之后的题目部分，避免上下文里的相邻题目干扰路由
fn question_of(instruction: &Instruction) -> &str {
    instruction
        .user
        .split("Question:\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\n").next())
        .unwrap_or_default()
}

#[async_trait]
impl TextGenerator for Routed {
    async fn generate(&self, instruction: &Instruction) -> Result<Generation, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.route)(question_of(instruction)).map(|text| Generation { text, tokens_used: 11 })
    }

    fn model_name(&self) -> &str {
        "routed"
    }
}

fn homework_route(question: &str) -> Result<String, GenerationError> {
    if question.contains("boils") {
        Ok("100".to_string())
    } else if question.contains("planet") {
        Ok("Jupiter".to_string())
    } else if question.contains("essay") {
        Ok(ESSAY.to_string())
    } else {
        Ok("unknown".to_string())
    }
}

fn planet_fails_route(question: &str) -> Result<String, GenerationError> {
    if question.contains("planet") {
        Err(GenerationError::transport("routed", "503 service unavailable"))
    } else {
        homework_route(question)
    }
}

fn test_config() -> Config {
    Config {
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 2,
        request_timeout_secs: 10,
        ..Config::default()
    }
}

fn orchestrator(dir: &std::path::Path, generator: Arc<Routed>) -> JobOrchestrator {
    JobOrchestrator::new(test_config(), generator, Arc::new(LocalFileStore::with_root(dir)))
}

fn write_input(dir: &std::path::Path, name: &str, content: &[u8]) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn read_output(dir: &std::path::Path, result: &JobResult) -> Vec<u8> {
    let name = result.completed_file.as_ref().expect("completed job has an output file");
    std::fs::read(dir.join(name)).unwrap()
}

fn remaining_blanks(bytes: &[u8], format: &str) -> usize {
    FormatRegistry::with_defaults()
        .parser(format)
        .unwrap()
        .parse(bytes, format)
        .unwrap()
        .remaining_blanks()
}

/// 每道题恰好一条明细，分档数之和等于有内容的题目数
fn assert_summary_consistent(result: &JobResult) {
    let summary = &result.validation_results;
    assert_eq!(summary.section_details.len(), summary.total_sections);
    let indices: Vec<usize> = summary.section_details.iter().map(|d| d.section_index).collect();
    assert_eq!(indices, (0..summary.total_sections).collect::<Vec<_>>());

    let with_content = summary.section_details.iter().filter(|d| d.has_content).count();
    assert_eq!(
        summary.high_confidence_sections + summary.medium_confidence_sections + summary.low_confidence_sections,
        with_content
    );
    assert_eq!(summary.validated_sections, with_content);
    for detail in &summary.section_details {
        assert!((0.0..=1.0).contains(&detail.confidence));
        assert_eq!(detail.confidence_bucket.is_some(), detail.has_content);
    }
    assert!((0.0..=1.0).contains(&summary.overall_confidence));
}

#[tokio::test]
async fn test_fills_blanks_and_essay() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path(), "homework.md", HOMEWORK.as_bytes());

    let job = CompletionJob::for_file("homework.md", "student-1", SubscriptionTier::Paid);
    let result = orchestrator(dir.path(), Routed::new(homework_route)).run(&job).await;

    assert_eq!(result.status, JobStatus::Completed, "{:?}", result.error);
    assert_eq!(result.sections_processed, 3);
    assert_eq!(result.completed_file.as_deref(), Some("homework_completed.md"));
    assert_summary_consistent(&result);

    let types: Vec<ContentType> = result
        .validation_results
        .section_details
        .iter()
        .map(|d| d.content_type)
        .collect();
    assert_eq!(
        types,
        vec![ContentType::FillInBlank, ContentType::FillInBlank, ContentType::Text]
    );

    let output = read_output(dir.path(), &result);
    assert_eq!(remaining_blanks(&output, "md"), 0);

    let text = String::from_utf8(output).unwrap();
    assert!(text.starts_with("# Homework\n\n1. Water boils at 100 degrees Celsius.\n\n2. The largest planet is Jupiter.\n"));
    assert!(!text.contains("[ANSWER]"));
    let essay_words = text
        .split("water cycle.\n")
        .nth(1)
        .unwrap()
        .split_whitespace()
        .count();
    assert!(essay_words >= 50, "essay has {} words", essay_words);

    let metadata = &result.processing_metadata;
    assert!(metadata.analysis_completed && metadata.content_filled && metadata.write_back_completed);
    assert_eq!(metadata.file_size_bytes, text.len() as u64);
}

#[tokio::test]
async fn test_math_worded_code_stub_gets_code() {
    let dir = tempfile::tempdir().unwrap();
    let source = "def solve_linear(a, b):\n    \"\"\"Solve the equation a*x + b = 0 and return x.\"\"\"\n    # TODO\n";
    write_input(dir.path(), "linear.py", source.as_bytes());

    let generator = Routed::new(|question| {
        if question.contains("solve_linear") {
            Ok("Rearranging gives x = -b / a.\n```python\nif a == 0:\n    raise ValueError(\"a must be non-zero\")\nreturn -b / a\n```\nFinal answer: x = -b/a".to_string())
        } else {
            Ok("unknown".to_string())
        }
    });
    let job = CompletionJob::for_file("linear.py", "u", SubscriptionTier::Paid);
    let result = orchestrator(dir.path(), generator).run(&job).await;

    assert_eq!(result.status, JobStatus::Completed, "{:?}", result.error);
    assert_summary_consistent(&result);
    // 分类顺序不变：仍然是数学题
    assert_eq!(result.validation_results.section_details[0].content_type, ContentType::Math);

    let output = String::from_utf8(read_output(dir.path(), &result)).unwrap();
    assert_eq!(
        output,
        "def solve_linear(a, b):\n    \"\"\"Solve the equation a*x + b = 0 and return x.\"\"\"\n    if a == 0:\n        raise ValueError(\"a must be non-zero\")\n    return -b / a\n"
    );
    assert!(!output.contains("Final answer"));
}

#[tokio::test]
async fn test_crlf_text_keeps_line_endings() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path(), "hamlet.txt", b"Who wrote Hamlet? Answer:\r\nNext line\r\n");

    let generator = Routed::new(|question| {
        if question.contains("Hamlet") {
            Ok("Shakespeare".to_string())
        } else {
            Ok("unknown".to_string())
        }
    });
    let job = CompletionJob::for_file("hamlet.txt", "u", SubscriptionTier::Paid);
    let result = orchestrator(dir.path(), generator).run(&job).await;

    assert_eq!(result.status, JobStatus::Completed, "{:?}", result.error);
    assert_eq!(
        String::from_utf8(read_output(dir.path(), &result)).unwrap(),
        "Who wrote Hamlet? Answer: Shakespeare\r\nNext line\r\n"
    );
}

#[tokio::test]
async fn test_one_failed_section_does_not_fail_job() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path(), "homework.md", HOMEWORK.as_bytes());

    let generator = Routed::new(planet_fails_route);
    let job = CompletionJob::for_file("homework.md", "student-1", SubscriptionTier::Free);
    let result = orchestrator(dir.path(), generator.clone()).run(&job).await;

    assert_eq!(result.status, JobStatus::Completed);
    assert_summary_consistent(&result);

    let summary = &result.validation_results;
    assert_eq!(summary.total_sections, 3);
    assert_eq!(summary.validated_sections, 2);

    let failed = &summary.section_details[1];
    assert!(!failed.is_valid);
    assert!(!failed.has_content);
    assert_eq!(failed.confidence, 0.0);
    assert!(failed.validation_error.as_deref().unwrap().contains("503"));

    // 两道成功各一次，失败的那道重试满 3 次
    assert_eq!(generator.calls.load(Ordering::SeqCst), 5);

    // 失败题目的空白原样保留
    let text = String::from_utf8(read_output(dir.path(), &result)).unwrap();
    assert!(text.contains("2. The largest planet is ____."));
    assert!(text.contains("Water boils at 100 degrees"));
}

#[tokio::test]
async fn test_unsupported_format_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path(), "report.pdf", b"%PDF-1.7");

    let generator = Routed::new(homework_route);
    let job = CompletionJob::for_file("report.pdf", "student-1", SubscriptionTier::Free);
    let result = orchestrator(dir.path(), generator.clone()).run(&job).await;

    assert_eq!(result.status, JobStatus::Failed);
    assert!(result.completed_file.is_none());
    assert!(!result.watermark_applied);
    assert_eq!(result.sections_processed, 0);
    assert!(result.error.as_deref().unwrap().contains("pdf"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("report_completed.pdf").exists());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "failed");
    assert!(json["completed_file"].is_null());
}

#[tokio::test]
async fn test_watermark_follows_tier() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    write_input(dir.path(), "free.txt", b"The sky is ____.\n");
    write_input(dir.path(), "paid.txt", b"The sky is ____.\n");

    let orchestrator = orchestrator(dir.path(), Routed::new(|_| Ok("blue".to_string())));

    let free = orchestrator
        .run(&CompletionJob::for_file("free.txt", "u", SubscriptionTier::Free))
        .await;
    let paid = orchestrator
        .run(&CompletionJob::for_file("paid.txt", "u", SubscriptionTier::Paid))
        .await;

    assert!(free.watermark_applied);
    assert!(!paid.watermark_applied);

    let free_text = String::from_utf8(read_output(dir.path(), &free)).unwrap();
    let paid_text = String::from_utf8(read_output(dir.path(), &paid)).unwrap();
    assert!(free_text.contains(&config.watermark_text));
    assert!(!paid_text.contains(&config.watermark_text));
    assert_eq!(paid_text, "The sky is blue.\n");
}

#[tokio::test]
async fn test_free_tier_concurrency_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let input: String = (1..=6).map(|i| format!("Item {} goes here ____.\n\n", i)).collect();
    write_input(dir.path(), "many.txt", input.as_bytes());

    let generator = Routed::with_delay(|_| Ok("done".to_string()), Duration::from_millis(30));
    let job = CompletionJob::for_file("many.txt", "u", SubscriptionTier::Free);
    let result = orchestrator(dir.path(), generator.clone()).run(&job).await;

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.sections_processed, 6);
    let max = generator.max_in_flight.load(Ordering::SeqCst);
    assert!(max >= 1 && max <= test_config().max_concurrent_sections_free, "max in flight {}", max);
}

#[tokio::test]
async fn test_cancelled_job_produces_no_output() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path(), "homework.md", HOMEWORK.as_bytes());

    let generator = Routed::with_delay(homework_route, Duration::from_secs(30));
    let orchestrator = orchestrator(dir.path(), generator);
    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let job = CompletionJob::for_file("homework.md", "u", SubscriptionTier::Paid);
    let result = orchestrator.run_with_cancellation(&job, signal, false).await;

    assert_eq!(result.status, JobStatus::Failed);
    assert!(result.completed_file.is_none());
    assert!(result.error.as_deref().unwrap().starts_with("cancelled"));
    assert!(!dir.path().join("homework_completed.md").exists());
}

#[tokio::test]
async fn test_panicking_generator_degrades_one_section() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path(), "homework.md", HOMEWORK.as_bytes());

    let generator = Routed::new(|question| {
        if question.contains("boils") {
            panic!("generator crashed");
        }
        homework_route(question)
    });
    let job = CompletionJob::for_file("homework.md", "u", SubscriptionTier::Paid);
    let result = orchestrator(dir.path(), generator).run(&job).await;

    assert_eq!(result.status, JobStatus::Completed);
    assert_summary_consistent(&result);
    let detail = &result.validation_results.section_details[0];
    assert!(!detail.has_content);
    assert!(detail.validation_error.as_deref().unwrap().contains("panicked"));
    assert_eq!(result.validation_results.validated_sections, 2);
}

// ========== DOCX ==========

const DOCUMENT_XML: &str = "word/document.xml";

fn build_docx(body: &str) -> Vec<u8> {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        body
    );
    let options = || SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("[Content_Types].xml", options()).unwrap();
    zip.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
    zip.start_file(DOCUMENT_XML, options()).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn document_xml(docx: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut xml = String::new();
    archive.by_name(DOCUMENT_XML).unwrap().read_to_string(&mut xml).unwrap();
    xml
}

#[tokio::test]
async fn test_docx_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let body = concat!(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Biology Quiz</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:rPr><w:i/></w:rPr><w:t xml:space="preserve">The capital of France is </w:t></w:r><w:r><w:t>_____</w:t></w:r></w:p>"#,
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Term</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Meaning</w:t></w:r></w:p></w:tc></w:tr>"#,
        r#"<w:tr><w:tc><w:p><w:r><w:t>Osmosis</w:t></w:r></w:p></w:tc><w:tc><w:p/></w:tc></w:tr></w:tbl>"#,
    );
    write_input(dir.path(), "quiz.docx", &build_docx(body));

    let generator = Routed::new(|question| {
        if question.contains("capital") {
            Ok("Paris".to_string())
        } else if question.contains("Osmosis") {
            Ok("Diffusion of water across a membrane".to_string())
        } else {
            Ok("unknown".to_string())
        }
    });
    let job = CompletionJob::for_file("quiz.docx", "u", SubscriptionTier::Free);
    let result = orchestrator(dir.path(), generator).run(&job).await;

    assert_eq!(result.status, JobStatus::Completed, "{:?}", result.error);
    assert_eq!(result.sections_processed, 2);
    assert_summary_consistent(&result);
    assert!(result
        .validation_results
        .section_details
        .iter()
        .all(|d| d.confidence_bucket.is_some()));
    assert!(result.validation_results.section_details[0].confidence_bucket == Some(ConfidenceBucket::High));

    let output = read_output(dir.path(), &result);
    assert_eq!(remaining_blanks(&output, "docx"), 0);

    let reparsed = FormatRegistry::with_defaults()
        .parser("docx")
        .unwrap()
        .parse(&output, "docx")
        .unwrap();
    assert_eq!(reparsed.blocks[1].prompt_text(), "The capital of France is Paris");

    // 原有 run 的格式保留，答案只替换空白所在的文本
    let xml = document_xml(&output);
    assert!(xml.contains(r#"<w:i/></w:rPr><w:t xml:space="preserve">The capital of France is </w:t>"#));
    assert!(xml.contains(r#"<w:t xml:space="preserve">Paris</w:t>"#));
    assert!(xml.contains("Diffusion of water across a membrane"));
    assert!(xml.contains("<w:i/>"));
    assert!(xml.contains("Biology Quiz"));
    assert!(xml.contains(&test_config().watermark_text));
}
