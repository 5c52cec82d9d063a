//! Integration tests for the summary-forge pipeline.
//!
//! These tests validate:
//! - The YAML fixtures load and validate
//! - Markdown converts into the expected blocks
//! - Layout and pagination keep every line, in order, inside the margins
//! - Decorations are applied to every page
//! - PDF output exists and has valid format
//! - The chat summary and survey use cases work end to end

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;

use summary_forge::config::PdfConfig;
use summary_forge::crypto::AesCbcDecryptor;
use summary_forge::decoration::Decoration;
use summary_forge::document::SummaryMeta;
use summary_forge::inline::{parse_inline, Span};
use summary_forge::layout_config::{LayoutBox, LayoutConfig};
use summary_forge::markdown::{convert, Block, ConvertOptions, StyleTag};
use summary_forge::pipeline::SummaryRenderer;
use summary_forge::style::resolve_color;
use summary_forge::summary::{
    ChatMessage, ChatRoom, ChatStore, Role, SummarizeChat, Summarizer,
};
use summary_forge::survey::{
    HiddenReason, InMemorySurveyRepository, SurveyPolicy, SurveyService, SurveyTemplate,
    SurveyVisibility,
};
use summary_forge::{Error, Result};

// =====================================================================
// Helper
// =====================================================================

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pdf_config.yaml")
}

fn fixture_config() -> PdfConfig {
    PdfConfig::load_from_path(fixture_path()).expect("fixture config loads")
}

fn renderer() -> SummaryRenderer {
    SummaryRenderer::new(Arc::new(fixture_config())).expect("renderer")
}

fn created_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(21, 30, 0)
        .unwrap()
}

fn meta(title: &str, count: usize) -> SummaryMeta {
    SummaryMeta {
        room_title: title.to_string(),
        created_at: created_at(),
        message_count: count,
    }
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn all_boxes(layout: &LayoutConfig) -> Vec<&LayoutBox> {
    fn visit<'a>(b: &'a LayoutBox, out: &mut Vec<&'a LayoutBox>) {
        out.push(b);
        for child in &b.children {
            visit(child, out);
        }
    }
    let mut out = Vec::new();
    for page in &layout.pages {
        for b in &page.boxes {
            visit(b, &mut out);
        }
    }
    out
}

const FULL_SUMMARY: &str = "\
# 상담 요약

오늘은 **관계 고민**에 대해 *깊이* 이야기했습니다. `메모` 참고: [가이드](https://example.com)

## 주요 내용
- 첫 번째 고민
- 두 번째 고민

1. 대화하기
2. 기다리기

> 마음을 전하는 것이 중요해요.

| 항목 | 내용 |
|------|------|
| 감정 | 불안 |
| 제안 | 대화 |

```
plain **code** stays
```

---
### 마무리
끝.";

// =====================================================================
// Configuration
// =====================================================================

#[test]
fn fixture_and_shipped_configs_load() {
    let config = fixture_config();
    assert_eq!(config.branding.service_name_en, "Love-Note");
    assert!(config.table_style.header.background.is_none());

    let shipped = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("pdf_config.yaml");
    let shipped = PdfConfig::load_from_path(shipped).expect("shipped config loads");
    assert_eq!(shipped.fonts.default, "Helvetica");
}

#[test]
fn invalid_config_fails_at_construction() {
    let yaml = std::fs::read_to_string(fixture_path())
        .unwrap()
        .replace("opacity: 0.05", "opacity: 2.0");
    assert!(matches!(
        PdfConfig::from_yaml_str(&yaml),
        Err(Error::ConfigInvalid(_))
    ));
}

#[test]
fn color_resolution() {
    let config = fixture_config();
    assert_eq!(resolve_color(&config.colors, "#abc123"), "#abc123");
    assert_eq!(resolve_color(&config.colors, "primary"), "#7C3AED");
    assert_eq!(resolve_color(&config.colors, "no_such_color"), "#000000");
}

// =====================================================================
// Markdown conversion
// =====================================================================

#[test]
fn converter_block_sequence() {
    let blocks = convert(FULL_SUMMARY, &ConvertOptions::from_config(&fixture_config()));

    let kinds: Vec<&str> = blocks
        .iter()
        .map(|b| match b {
            Block::Paragraph { .. } => "p",
            Block::Spacer { .. } => "s",
            Block::Table { .. } => "t",
            Block::Preformatted { .. } => "pre",
            Block::Rule => "hr",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "p", "s", "p", "s", "p", "p", "p", "s", "s", "p", "p", "s", "s", "p", "s", "s", "t",
            "s", "s", "pre", "s", "s", "hr", "s", "p", "p",
        ]
    );

    let texts: Vec<String> = blocks.iter().filter_map(Block::text).collect();
    assert_eq!(texts[0], "상담 요약");
    assert_eq!(texts[3], "  \u{2022} 첫 번째 고민");
    assert_eq!(texts[5], "  1. 대화하기");
    assert!(texts.contains(&"plain **code** stays".to_string()));
    assert_eq!(texts.last().map(String::as_str), Some("끝."));
}

#[test]
fn table_without_data_rows_is_dropped() {
    let blocks = convert("| only | header |\n|---|---|\nafter", &ConvertOptions::default());
    assert_eq!(blocks, vec![Block::paragraph("after", StyleTag::Body)]);
}

#[test]
fn inline_code_is_literal() {
    assert_eq!(parse_inline("`**x**`"), vec![Span::code("**x**")]);
}

// =====================================================================
// Layout, pagination, decoration
// =====================================================================

#[test]
fn story_order_in_layout() {
    let layout = renderer()
        .layout_summary(&meta("Weekly", 12), "Body line")
        .unwrap();
    let lines = layout.text_lines();
    assert_eq!(
        lines,
        vec![
            "러브노트 Love-Note",
            "Conversation summary",
            "대화방: Weekly",
            "일시: 2025.06.01 21:30",
            "메시지: 12개",
            "대화 요약",
            "Body line",
        ]
    );
}

#[test]
fn long_summary_paginates_without_losing_lines() {
    let body: String = (0..200).map(|i| format!("Line number {i}\n")).collect();
    let layout = renderer().layout_summary(&meta("Long", 200), &body).unwrap();
    assert!(layout.pages.len() >= 3, "got {} pages", layout.pages.len());

    let lines = layout.text_lines();
    let body_lines: Vec<&String> = lines.iter().filter(|l| l.starts_with("Line number")).collect();
    assert_eq!(body_lines.len(), 200);
    assert_eq!(body_lines[0], "Line number 0");
    assert_eq!(body_lines[199], "Line number 199");

    let config = fixture_config();
    let bottom_limit = layout.page_height_pt - config.page.margin_bottom * 28.3465;
    for page in &layout.pages {
        for b in &page.boxes {
            assert!(b.y + b.height <= bottom_limit + 0.5, "box below bottom margin");
        }
    }
}

fn assert_inside_bottom_margin(layout: &LayoutConfig) {
    let config = fixture_config();
    let bottom_limit = layout.page_height_pt - config.page.margin_bottom * 28.3465 + 0.5;
    for (i, page) in layout.pages.iter().enumerate() {
        for b in &page.boxes {
            assert!(b.y + b.height <= bottom_limit, "page {i}: box below bottom margin");
            if let Some(text) = &b.text {
                for line in &text.lines {
                    assert!(
                        b.y + line.y_offset + text.line_height <= bottom_limit,
                        "page {i}: line {:?} below bottom margin",
                        line.text()
                    );
                }
            }
        }
    }
}

#[test]
fn unterminated_code_block_flows_across_pages() {
    let mut md = String::from("## Log\n```\n");
    for i in 0..150 {
        md.push_str(&format!("step {i}: ok\n"));
    }
    let r = renderer();
    let layout = r.layout_summary(&meta("Code", 1), &md).unwrap();
    assert!(layout.pages.len() >= 2, "got {} pages", layout.pages.len());
    assert_inside_bottom_margin(&layout);

    let lines = layout.text_lines();
    let code: Vec<&String> = lines.iter().filter(|l| l.starts_with("step ")).collect();
    assert_eq!(code.len(), 150);
    assert_eq!(code[0], "step 0: ok");
    assert_eq!(code[149], "step 149: ok");
    assert_valid_pdf(&r.render_layout(&layout).unwrap());
}

#[test]
fn very_long_paragraph_flows_across_pages() {
    let words: Vec<String> = (0..6000).map(|i| format!("w{i}")).collect();
    let layout = renderer()
        .layout_summary(&meta("Long", 1), &words.join(" "))
        .unwrap();
    assert!(layout.pages.len() >= 3, "got {} pages", layout.pages.len());
    assert_inside_bottom_margin(&layout);

    let text = layout.text_lines().join(" ");
    let body: Vec<&str> = text
        .split_whitespace()
        .filter(|w| w.starts_with('w') && w[1..].parse::<u32>().is_ok())
        .collect();
    assert_eq!(body.len(), 6000);
    assert_eq!(body.last().copied(), Some("w5999"));
}

#[test]
fn room_title_and_tagline_are_printed_literally() {
    let yaml = std::fs::read_to_string(fixture_path())
        .unwrap()
        .replace("tagline: \"Conversation summary\"", "tagline: \"__private__ notes\"");
    let config = PdfConfig::from_yaml_str(&yaml).unwrap();
    let r = SummaryRenderer::new(Arc::new(config)).unwrap();
    let layout = r
        .layout_summary(&meta("my_room_name_v2 *draft*", 1), "")
        .unwrap();
    let lines = layout.text_lines();
    assert_eq!(lines[1], "__private__ notes");
    assert_eq!(lines[2], "대화방: my_room_name_v2 *draft*");
}

#[test]
fn every_page_has_header_footer_and_watermark() {
    let body: String = (0..150).map(|i| format!("row {i}\n")).collect();
    let layout = renderer().layout_summary(&meta("Deco", 3), &body).unwrap();

    for (i, page) in layout.pages.iter().enumerate() {
        let texts: Vec<&str> = page
            .decorations
            .iter()
            .filter_map(|d| match d {
                Decoration::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let number = (i + 1).to_string();
        assert_eq!(texts, vec!["Private summary", number.as_str(), "Love-Note"]);
        assert!(page
            .decorations
            .iter()
            .any(|d| matches!(d, Decoration::Watermark { .. })));
        assert!(page
            .decorations
            .iter()
            .any(|d| matches!(d, Decoration::Line { .. })));
    }
}

#[test]
fn table_rows_are_striped_and_header_unfilled() {
    let md = "| a | b |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |\n| 5 | 6 |";
    let layout = renderer().layout_summary(&meta("T", 1), md).unwrap();
    let rows: Vec<&LayoutBox> = all_boxes(&layout)
        .into_iter()
        .filter(|b| b.children.len() == 2 && b.children.iter().all(|c| c.border.is_some()))
        .collect();
    assert_eq!(rows.len(), 4);
    let striped: Vec<bool> = rows.iter().map(|r| r.background_color.is_some()).collect();
    assert_eq!(striped, vec![false, false, true, false]);
}

#[test]
fn layout_json_round_trip_renders() {
    let r = renderer();
    let layout = r.layout_summary(&meta("JSON", 2), FULL_SUMMARY).unwrap();
    let restored = LayoutConfig::from_json(&layout.to_json()).unwrap();
    assert_eq!(restored.text_lines(), layout.text_lines());
    assert_valid_pdf(&r.render_layout(&restored).unwrap());
}

// =====================================================================
// PDF output
// =====================================================================

#[test]
fn full_summary_renders_pdf() {
    let bytes = renderer()
        .render_summary(&meta("전체", 24), FULL_SUMMARY)
        .unwrap();
    assert_valid_pdf(&bytes);
}

#[test]
fn empty_summary_still_renders() {
    let bytes = renderer().render_summary(&meta("", 0), "").unwrap();
    assert_valid_pdf(&bytes);
}

// =====================================================================
// Chat summary use case
// =====================================================================

const KEY: [u8; 32] = [0x42; 32];

fn encrypt(plain: &str, iv: &[u8; 16]) -> Vec<u8> {
    cbc::Encryptor::<aes::Aes256>::new(&KEY.into(), &(*iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes())
}

struct FixedStore {
    room: ChatRoom,
    messages: Vec<ChatMessage>,
}

impl ChatStore for FixedStore {
    fn find_room(&self, room_id: &str) -> Result<Option<ChatRoom>> {
        Ok((room_id == self.room.id).then(|| self.room.clone()))
    }

    fn find_messages(&self, _room_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self.messages.clone())
    }
}

/// Returns a markdown summary quoting the last transcript line.
struct MarkdownSummarizer;

impl Summarizer for MarkdownSummarizer {
    fn summarize(&self, prompt: &str) -> Result<String> {
        let last = prompt.lines().last().unwrap_or_default();
        Ok(format!("\n## 요약\n- {last}\n"))
    }
}

#[test]
fn encrypted_chat_to_pdf() {
    let iv = [7u8; 16];
    let mut prefixed = iv.to_vec();
    prefixed.extend(encrypt("요즘 힘들어요", &iv));

    let store = FixedStore {
        room: ChatRoom {
            id: "r1".to_string(),
            account_id: 5,
            title: None,
            created_at: created_at(),
        },
        messages: vec![
            ChatMessage {
                id: 2,
                role: Role::Assistant,
                content_enc: encrypt("이야기해 주세요", &iv),
                iv: Some(iv.to_vec()),
            },
            ChatMessage {
                id: 1,
                role: Role::User,
                content_enc: prefixed,
                iv: None,
            },
            ChatMessage {
                id: 3,
                role: Role::User,
                content_enc: vec![1, 2, 3],
                iv: Some(iv.to_vec()),
            },
        ],
    };

    let config = fixture_config();
    let use_case = SummarizeChat::new(
        store,
        AesCbcDecryptor::new(KEY),
        MarkdownSummarizer,
        config.labels.clone(),
    );
    let summary = use_case.execute("r1", 5).unwrap();
    assert_eq!(summary.summary, "## 요약\n- 상담사: 이야기해 주세요");
    assert_eq!(summary.room_title, "제목 없음");
    assert_eq!(summary.message_count, 3);

    let r = SummaryRenderer::new(Arc::new(config)).unwrap();
    let layout = r.layout_summary(&summary.meta(), &summary.summary).unwrap();
    assert!(layout.text_lines().contains(&"메시지: 3개".to_string()));
    assert_valid_pdf(&r.render_layout(&layout).unwrap());

    assert!(matches!(use_case.execute("r1", 6), Err(Error::Forbidden { .. })));
    assert!(matches!(use_case.execute("r2", 5), Err(Error::RoomNotFound(_))));
}

// =====================================================================
// Survey flow
// =====================================================================

#[test]
fn survey_lifecycle() {
    let repo = InMemorySurveyRepository::new();
    repo.add_template(SurveyTemplate {
        version: 2,
        is_active: true,
        title: "대화는 어떠셨나요?".to_string(),
        subtitle: None,
        footer: Some("감사합니다".to_string()),
        questions_json: Some(
            r#"[{"id":"organize","type":"single","question":"정리가 됐나요?","options":["네","아니요"]}]"#
                .to_string(),
        ),
    });
    repo.set_message_count(11, 2);
    let service = SurveyService::new(repo, SurveyPolicy { trigger_message_count: 3 });

    assert_eq!(
        service.questions(11).unwrap(),
        SurveyVisibility::Hidden(HiddenReason::NotEnoughMessages { trigger: 3, current: 2 })
    );

    service.repository().set_message_count(11, 3);
    match service.questions(11).unwrap() {
        SurveyVisibility::Show(payload) => {
            assert_eq!(payload.version, 2);
            assert_eq!(payload.questions.len(), 1);
        }
        other => panic!("expected survey to show, got {other:?}"),
    }

    let answers = BTreeMap::from([("organize".to_string(), "네".to_string())]);
    let first = service.submit(Some(11), &answers).unwrap();
    assert!(first.ok && !first.duplicated);
    let second = service.submit(Some(11), &answers).unwrap();
    assert!(!second.ok && second.duplicated);

    assert_eq!(
        service.questions(11).unwrap().to_json(),
        serde_json::json!({"show": false, "reason": "already_responded"})
    );
}
