//! # PDF Report
//!
//! Front page with the case data, followed by content pages whose sections
//! depend on the acquisition type: WHOIS record (web), hash listing, archive
//! manifests and a produced/not-produced table of the expected artifacts.
//! Rendered with the standard Type 1 fonts, so text outside Latin-1 is
//! replaced.

use crate::constants::artifacts;
use crate::error;
use crate::i18n::Translations;
use crate::options::{AcquisitionOptions, AcquisitionType};
use crate::task::{TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
use crate::time_source::{formatted_now, TimeSource};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const TITLE_KEY: &str = "REPORTFILE";
const ERROR_KEY: &str = "GENERATE_PDF_REPORT_FAILED_MGS";

// A4 in points
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const LINE_HEIGHT: i64 = 14;
const WRAP_COLUMNS: usize = 90;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LINE_HEIGHT) as usize - 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Heading,
    Body,
    Mono,
}

impl Style {
    fn font(self) -> (&'static str, i64) {
        match self {
            Style::Title => ("F2", 18),
            Style::Heading => ("F2", 13),
            Style::Body => ("F1", 10),
            Style::Mono => ("F3", 8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    style: Style,
    text: String,
}

/// Page-oriented text layout
#[derive(Debug, Default)]
struct ReportLayout {
    pages: Vec<Vec<Line>>,
}

impl ReportLayout {
    fn new_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn push(&mut self, style: Style, text: &str) {
        for chunk in wrap(text, WRAP_COLUMNS) {
            if self.pages.last().map_or(true, |page| page.len() >= LINES_PER_PAGE) {
                self.new_page();
            }
            if let Some(page) = self.pages.last_mut() {
                page.push(Line { style, text: chunk });
            }
        }
    }

    fn blank(&mut self) {
        self.push(Style::Body, "");
    }
}

fn wrap(text: &str, columns: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(columns).map(|c| c.iter().collect()).collect()
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Everything the report prints, gathered from the acquisition directory
#[derive(Debug, Clone, Default)]
pub struct ReportData {
    pub ntp_time: String,
    pub whois: Option<String>,
    pub hash_listing: Option<String>,
    pub archives: Vec<(String, Vec<String>)>,
    pub artifacts: Vec<(String, bool)>,
}

/// Artifacts whose presence the report attests for `acquisition_type`
pub fn expected_artifacts(acquisition_type: AcquisitionType) -> Vec<&'static str> {
    let mut expected = vec![
        artifacts::HASH_REPORT,
        artifacts::ACQUISITION_LOG,
        artifacts::PACKET_CAPTURE,
        artifacts::SCREEN_RECORDING,
        artifacts::CASE_INFO,
    ];
    if matches!(acquisition_type, AcquisitionType::Web | AcquisitionType::EntireWebsite) {
        expected.extend([
            artifacts::WHOIS,
            artifacts::HEADERS,
            artifacts::NSLOOKUP,
            artifacts::SSL_CERTIFICATE,
            artifacts::SSL_KEYLOG,
            artifacts::TRACEROUTE,
        ]);
    }
    expected
}

fn zip_manifest(path: &Path) -> error::Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}

impl ReportData {
    pub fn collect(options: &AcquisitionOptions, ntp_time: String) -> error::Result<Self> {
        let dir = &options.acquisition_directory;

        let whois = match options.acquisition_type {
            AcquisitionType::Web => std::fs::read_to_string(dir.join(artifacts::WHOIS))
                .ok()
                .filter(|text| !text.trim().is_empty()),
            _ => None,
        };
        let hash_listing = std::fs::read_to_string(dir.join(artifacts::HASH_REPORT)).ok();

        let mut archives = Vec::new();
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "zip") {
                let name = entry.file_name().to_string_lossy().into_owned();
                archives.push((name, zip_manifest(&path)?));
            }
        }

        let artifacts = expected_artifacts(options.acquisition_type)
            .into_iter()
            .map(|name| (name.to_string(), dir.join(name).exists()))
            .chain(archives.iter().map(|(name, _)| (name.clone(), true)))
            .collect();

        Ok(Self {
            ntp_time,
            whois,
            hash_listing,
            archives,
            artifacts,
        })
    }
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

fn layout(options: &AcquisitionOptions, data: &ReportData, t: &Translations) -> ReportLayout {
    let case = &options.case_info;
    let mut doc = ReportLayout::default();

    doc.push(Style::Title, &t.get("REPORT_TITLE"));
    doc.blank();
    doc.push(Style::Heading, &t.get("CASEDATA"));
    let proceeding = case.proceeding_type.map(|p| p.to_string()).unwrap_or_default();
    for (key, value) in [
        ("CASE", case.name.as_str()),
        ("LAWYER", case.lawyer_name.as_str()),
        ("OPERATOR", case.operator.as_str()),
        ("PROCEEDING", proceeding.as_str()),
        ("COURT", case.courthouse.as_str()),
        ("NUMBER", case.proceeding_number.as_str()),
        ("ACQUISITION_TYPE", options.acquisition_type.as_str()),
        ("ACQUISITION_DATE", data.ntp_time.as_str()),
    ] {
        doc.push(Style::Body, &format!("{}: {}", t.get(key), or_na(value)));
    }
    if let Some(url) = &options.url {
        doc.push(Style::Body, &format!("{}: {url}", t.get("URL")));
    }
    doc.push(Style::Body, &format!("{}:", t.get("NOTES")));
    for line in or_na(&case.notes).lines() {
        doc.push(Style::Body, line);
    }

    doc.new_page();
    if options.acquisition_type == AcquisitionType::Web {
        doc.push(Style::Heading, &t.get("WHOIS"));
        match &data.whois {
            Some(text) => text.lines().for_each(|line| doc.push(Style::Mono, line)),
            None => doc.push(Style::Body, &t.get("NOT_PRODUCED")),
        }
        doc.blank();
    }

    doc.push(Style::Heading, &t.get("ARTIFACTS"));
    for (name, present) in &data.artifacts {
        let state = if *present { t.get("PRODUCED") } else { t.get("NOT_PRODUCED") };
        doc.push(Style::Body, &format!("{name}: {state}"));
    }
    doc.blank();

    doc.push(Style::Heading, &t.get("HASHD"));
    match &data.hash_listing {
        Some(listing) => listing.lines().for_each(|line| doc.push(Style::Mono, line)),
        None => doc.push(Style::Body, &t.get("NOT_PRODUCED")),
    }

    if !data.archives.is_empty() {
        doc.blank();
        doc.push(Style::Heading, &t.get("ZIPD"));
        for (archive, entries) in &data.archives {
            doc.push(Style::Body, archive);
            entries
                .iter()
                .for_each(|entry| doc.push(Style::Mono, &format!("    {entry}")));
        }
    }

    doc
}

fn page_content(lines: &[Line], footer: &str) -> Content {
    let mut operations = Vec::with_capacity(lines.len() * 3 + 8);
    let mut current_font = None;

    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new("TL", vec![Object::Integer(LINE_HEIGHT)]));
    operations.push(Operation::new(
        "Td",
        vec![Object::Integer(MARGIN), Object::Integer(PAGE_HEIGHT - MARGIN)],
    ));
    for line in lines {
        let (font, size) = line.style.font();
        if current_font != Some((font, size)) {
            operations.push(Operation::new("Tf", vec![font.into(), Object::Integer(size)]));
            current_font = Some((font, size));
        }
        operations.push(Operation::new("Tj", vec![Object::string_literal(latin1(&line.text))]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new("Tf", vec!["F1".into(), Object::Integer(8)]));
    operations.push(Operation::new(
        "Td",
        vec![Object::Integer(PAGE_WIDTH / 2 - 20), Object::Integer(MARGIN / 2)],
    ));
    operations.push(Operation::new("Tj", vec![Object::string_literal(latin1(footer))]));
    operations.push(Operation::new("ET", vec![]));

    Content { operations }
}

fn font(doc: &mut Document, base: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Render the report to `path`
pub fn write_report(
    path: &Path,
    options: &AcquisitionOptions,
    data: &ReportData,
    translations: &Translations,
) -> error::Result<usize> {
    let layout = layout(options, data, translations);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular = font(&mut doc, "Helvetica");
    let bold = font(&mut doc, "Helvetica-Bold");
    let mono = font(&mut doc, "Courier");
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
            "F3" => mono,
        },
    });

    let total = layout.pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);
    for (index, lines) in layout.pages.iter().enumerate() {
        let footer = format!(
            "{} {} {} {}",
            translations.get("PAGE"),
            index + 1,
            translations.get("OF"),
            total
        );
        let content = page_content(lines, &footer);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(total as i64),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    doc.save(path)?;

    Ok(total)
}

pub struct ReportWorker {
    time_source: Arc<dyn TimeSource>,
}

impl ReportWorker {
    pub fn new(time_source: Arc<dyn TimeSource>) -> Self {
        Self { time_source }
    }
}

impl std::fmt::Debug for ReportWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportWorker")
            .field("time_source", &self.time_source.describe())
            .finish()
    }
}

#[async_trait]
impl TaskWorker for ReportWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let ntp_time = formatted_now(self.time_source.as_ref()).await;
        let options = ctx.shared_options();
        let translations = ctx.translations().clone();

        let (path, pages) = tokio::task::spawn_blocking(move || -> error::Result<_> {
            let data = ReportData::collect(&options, ntp_time)?;
            let path = options.artifact_path(options.pdf_filename());
            let pages = write_report(&path, &options, &data, &translations)?;
            Ok((path, pages))
        })
        .await
        .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, e))?
        .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, e))?;

        debug!(task = %ctx.task_name(), path = %path.display(), pages, "Report generated");
        Ok(WorkerOutcome::success_with(path.display().to_string()))
    }
}
