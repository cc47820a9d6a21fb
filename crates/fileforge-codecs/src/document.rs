//! Document conversion.
//!
//! Plain-text family conversions are done natively. Office formats go
//! through LibreOffice in headless mode, markup to and from word-processor
//! formats goes through pandoc, and PDF text extraction uses pdftotext.

use crate::adapter::{target_format, CodecAdapter, MediaSummary};
use crate::tools::{get_tool_path, run_with_timeout, ToolSettings};
use crate::{CodecError, ConversionOptions, Result, Workspace};
use fileforge_common::{FileCategory, FileDescriptor, FormatTag};
use serde_json::{Map, Value};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::Command;

const INPUTS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf", "txt", "md",
    "csv", "json", "xml", "yaml", "html",
];
const OUTPUTS: &[&str] = &[
    "pdf", "doc", "docx", "odt", "rtf", "txt", "html", "md", "json", "csv", "xls", "xlsx", "ods",
    "ppt", "pptx", "odp",
];

const WORD: &[&str] = &["doc", "docx", "odt", "rtf"];
const SHEET: &[&str] = &["xls", "xlsx", "ods", "csv"];
const SLIDES: &[&str] = &["ppt", "pptx", "odp"];
const PANDOC_IN: &[&str] = &["md", "html", "docx", "odt"];
const PANDOC_OUT: &[&str] = &["md", "html", "docx", "odt", "rtf"];
const ZIP_FORMATS: &[&str] = &["docx", "xlsx", "pptx", "odt", "ods", "odp"];

/// How a particular document conversion is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Tag stripping from HTML or XML to plain text.
    StripMarkup,
    TextToHtml,
    MarkdownToHtml,
    /// The bytes are already valid in the target format.
    Copy,
    CsvToJson,
    JsonToCsv,
    JsonPretty,
    PdfToText,
    Pandoc,
    Soffice,
}

impl Route {
    /// Choose a route, preferring native conversions over external tools.
    pub fn between(from: &str, to: &str) -> Option<Self> {
        let route = match (from, to) {
            ("html" | "xml", "txt") => Self::StripMarkup,
            ("txt", "html") => Self::TextToHtml,
            ("md", "html") => Self::MarkdownToHtml,
            ("txt", "md") | ("md", "txt") | ("yaml", "txt") => Self::Copy,
            ("csv", "json") => Self::CsvToJson,
            ("json", "csv") => Self::JsonToCsv,
            ("json", "json") => Self::JsonPretty,
            ("pdf", "txt") => Self::PdfToText,
            (f, t) if f != t && PANDOC_IN.contains(&f) && PANDOC_OUT.contains(&t) => Self::Pandoc,
            (f, "pdf") if f != "pdf" && soffice_reads(f) => Self::Soffice,
            (f, t) if f != t && same_family(f, t) => Self::Soffice,
            (f, "txt" | "html") if WORD.contains(&f) => Self::Soffice,
            _ => return None,
        };
        Some(route)
    }

    fn tool(self) -> Option<&'static str> {
        match self {
            Self::PdfToText => Some("pdftotext"),
            Self::Pandoc => Some("pandoc"),
            Self::Soffice => Some("soffice"),
            _ => None,
        }
    }
}

fn soffice_reads(format: &str) -> bool {
    WORD.contains(&format)
        || SHEET.contains(&format)
        || SLIDES.contains(&format)
        || matches!(format, "txt" | "html")
}

fn same_family(a: &str, b: &str) -> bool {
    [WORD, SHEET, SLIDES]
        .iter()
        .any(|family| family.contains(&a) && family.contains(&b))
}

/// Document adapter.
#[derive(Debug, Clone)]
pub struct DocumentAdapter {
    tools: ToolSettings,
}

impl DocumentAdapter {
    pub fn new(tools: ToolSettings) -> Self {
        Self { tools }
    }

    fn run_tool(
        &self,
        route: Route,
        source: &Path,
        target: &FormatTag,
        workspace: &Workspace,
        options: &ConversionOptions,
    ) -> Result<()> {
        let Some(tool) = route.tool() else {
            return Err(CodecError::Unsupported(format!("{route:?} is not a tool route")));
        };
        let configured = match route {
            Route::PdfToText => self.tools.pdftotext.as_deref(),
            Route::Pandoc => self.tools.pandoc.as_deref(),
            _ => self.tools.soffice.as_deref(),
        };
        let program = get_tool_path(tool, configured)?;
        let mut command = Command::new(program);

        match route {
            Route::PdfToText => {
                command.args(["-enc", "UTF-8"]);
                if let Some(password) = &options.password {
                    command.arg("-upw").arg(password);
                }
                command.arg(source).arg(workspace.output());
            }
            Route::Pandoc => {
                command
                    .arg(source)
                    .args(["-f", pandoc_name(source)?, "-t", pandoc_format(target.as_str())])
                    .arg("-s")
                    .arg("-o")
                    .arg(workspace.output());
            }
            _ => {
                let outdir = workspace.temp_file("out");
                let profile = workspace.temp_file("profile");
                command
                    .arg(format!("-env:UserInstallation=file://{}", profile.display()))
                    .args(["--headless", "--norestore", "--convert-to"])
                    .arg(soffice_filter(target.as_str()))
                    .arg("--outdir")
                    .arg(&outdir)
                    .arg(source);
                run_with_timeout(command, tool, self.tools.timeout)?;

                let stem = source
                    .file_stem()
                    .ok_or_else(|| CodecError::InvalidInput(format!("{source:?}")))?;
                let produced = outdir.join(stem).with_extension(target.as_str());
                if !produced.exists() {
                    return Err(CodecError::tool_failed(tool, "no output produced"));
                }
                std::fs::rename(produced, workspace.output())?;
                return Ok(());
            }
        }

        run_with_timeout(command, tool, self.tools.timeout)?;
        Ok(())
    }
}

impl CodecAdapter for DocumentAdapter {
    fn name(&self) -> &str {
        "document"
    }

    fn category(&self) -> FileCategory {
        FileCategory::Document
    }

    fn input_formats(&self) -> &[&'static str] {
        INPUTS
    }

    fn output_formats(&self) -> &[&'static str] {
        OUTPUTS
    }

    fn supports_conversion(&self, from: &FormatTag, to: &FormatTag) -> bool {
        self.supports_input(from)
            && self.supports_output(to)
            && Route::between(from.as_str(), to.as_str()).is_some()
    }

    fn convert(
        &self,
        source: &Path,
        dest: &Path,
        options: &ConversionOptions,
    ) -> Result<FileDescriptor> {
        let from = FormatTag::from_path(source)
            .ok_or_else(|| CodecError::InvalidInput(format!("no format for {source:?}")))?;
        let target = target_format(dest, options)?;
        let route = Route::between(from.as_str(), target.as_str())
            .ok_or_else(|| CodecError::unsupported_conversion(&from, &target))?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Document route {:?} for {} -> {}", route, from, target);

        let workspace = Workspace::new(dest)?;
        match route {
            Route::PdfToText | Route::Pandoc | Route::Soffice => {
                self.run_tool(route, source, &target, &workspace, options)?
            }
            native => {
                let input = std::fs::read(source)?;
                let text = String::from_utf8_lossy(&input);
                let output = convert_text(native, &text, source)?;
                std::fs::write(workspace.output(), output)?;
            }
        }

        let finalized = workspace.finalize()?;
        Ok(FileDescriptor::snapshot(&finalized)?)
    }

    fn inspect(&self, path: &Path) -> Result<MediaSummary> {
        let mut summary = MediaSummary::basic(path)?;
        let format = FormatTag::from_path(path);
        match format.as_ref().map(FormatTag::as_str) {
            Some("pdf") => {
                let bytes = std::fs::read(path)?;
                if !bytes.starts_with(b"%PDF-") || !tail_contains(&bytes, b"%%EOF", 2048) {
                    return Err(CodecError::parse_error("pdf", "missing header or %%EOF trailer"));
                }
                summary.pages = Some(count_pdf_pages(&bytes)).filter(|&n| n > 0);
            }
            Some("json") => {
                let bytes = std::fs::read(path)?;
                serde_json::from_slice::<serde::de::IgnoredAny>(&bytes)?;
            }
            Some(f) if ZIP_FORMATS.contains(&f) => {
                if !has_zip_directory(path)? {
                    return Err(CodecError::parse_error(f, "zip central directory not found"));
                }
            }
            _ => {}
        }
        Ok(summary)
    }
}

fn pandoc_format(format: &str) -> &'static str {
    match format {
        "md" => "markdown",
        "html" => "html",
        "docx" => "docx",
        "odt" => "odt",
        "rtf" => "rtf",
        _ => "plain",
    }
}

fn pandoc_name(source: &Path) -> Result<&'static str> {
    FormatTag::from_path(source)
        .map(|f| pandoc_format(f.as_str()))
        .ok_or_else(|| CodecError::InvalidInput(format!("no format for {source:?}")))
}

fn soffice_filter(format: &str) -> String {
    match format {
        "txt" => "txt:Text (encoded):UTF8".to_string(),
        other => other.to_string(),
    }
}

fn convert_text(route: Route, text: &str, source: &Path) -> Result<String> {
    let title = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(match route {
        Route::StripMarkup => strip_markup(text),
        Route::TextToHtml => html_page(&title, &paragraphs_to_html(text)),
        Route::MarkdownToHtml => html_page(&title, &markdown_to_html(text)),
        Route::Copy => text.to_string(),
        Route::CsvToJson => csv_to_json(text)?,
        Route::JsonToCsv => json_to_csv(text)?,
        Route::JsonPretty => {
            let value: Value = serde_json::from_str(text)?;
            serde_json::to_string_pretty(&value)? + "\n"
        }
        other => return Err(CodecError::Unsupported(format!("{other:?} is not native"))),
    })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn paragraphs_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>\n", escape_html(p).replace('\n', "<br>\n")))
        .collect()
}

/// Headings and paragraphs only; inline markup passes through escaped.
fn markdown_to_html(text: &str) -> String {
    let mut out = String::new();
    let mut paragraph: Vec<&str> = Vec::new();

    fn flush(paragraph: &mut Vec<&str>, out: &mut String) {
        if !paragraph.is_empty() {
            out.push_str(&format!("<p>{}</p>\n", escape_html(&paragraph.join(" "))));
            paragraph.clear();
        }
    }

    for line in text.lines() {
        let trimmed = line.trim();
        let level = trimmed.chars().take_while(|&c| c == '#').count();
        if (1..=6).contains(&level) && trimmed[level..].starts_with(' ') {
            flush(&mut paragraph, &mut out);
            out.push_str(&format!(
                "<h{level}>{}</h{level}>\n",
                escape_html(trimmed[level..].trim())
            ));
        } else if trimmed.is_empty() {
            flush(&mut paragraph, &mut out);
        } else {
            paragraph.push(trimmed);
        }
    }
    flush(&mut paragraph, &mut out);
    out
}

/// Remove tags, drop script and style bodies, decode common entities.
fn strip_markup(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = after[1..end].trim().to_lowercase();
        rest = &after[end + 1..];

        for hidden in ["script", "style"] {
            if tag == hidden || tag.starts_with(&format!("{hidden} ")) {
                let close = format!("</{hidden}");
                let lower = rest.to_ascii_lowercase();
                rest = match lower.find(&close) {
                    Some(pos) => &rest[pos..],
                    None => "",
                };
            }
        }

        let name = tag.trim_start_matches('/');
        if ["p", "br", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6"]
            .iter()
            .any(|block| name == *block || name.starts_with(&format!("{block} ")))
        {
            out.push('\n');
        }
    }
    out.push_str(rest);

    let decoded = decode_entities(&out);
    let mut lines: Vec<&str> = Vec::new();
    for line in decoded.lines().map(str::trim) {
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parse CSV with quoted fields, doubled quotes and embedded newlines.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            (true, '"') => quoted = false,
            (true, _) => field.push(c),
            (false, '"') if field.is_empty() => quoted = true,
            (false, ',') => row.push(std::mem::take(&mut field)),
            (false, '\r') => {}
            (false, '\n') => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            (false, _) => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    rows
}

fn csv_to_json(text: &str) -> Result<String> {
    let mut rows = parse_csv(text).into_iter();
    let headers = rows
        .next()
        .ok_or_else(|| CodecError::InvalidInput("CSV has no header row".to_string()))?;

    let records: Vec<Value> = rows
        .map(|row| {
            let mut record = Map::new();
            for (i, header) in headers.iter().enumerate() {
                let cell = row.get(i).cloned().unwrap_or_default();
                record.insert(header.clone(), Value::String(cell));
            }
            Value::Object(record)
        })
        .collect();

    Ok(serde_json::to_string_pretty(&records)? + "\n")
}

fn json_to_csv(text: &str) -> Result<String> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Array(items) = value else {
        return Err(CodecError::InvalidInput(
            "JSON to CSV needs an array of objects".to_string(),
        ));
    };

    let mut headers: Vec<String> = Vec::new();
    for item in &items {
        let Value::Object(map) = item else {
            return Err(CodecError::InvalidInput(
                "JSON to CSV needs an array of objects".to_string(),
            ));
        };
        for key in map.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut out = csv_line(headers.iter().map(String::as_str));
    for item in &items {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| match item.get(h) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        out.push_str(&csv_line(cells.iter().map(String::as_str)));
    }
    Ok(out)
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = cells
        .map(|cell| {
            if cell.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Count `/Type /Page` objects, skipping the `/Pages` tree nodes.
fn count_pdf_pages(bytes: &[u8]) -> u32 {
    let mut count = 0;
    let mut i = 0;
    while let Some(pos) = find(&bytes[i..], b"/Type") {
        let mut j = i + pos + b"/Type".len();
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes[j..].starts_with(b"/Page")
            && !bytes
                .get(j + b"/Page".len())
                .is_some_and(|b| b.is_ascii_alphanumeric())
        {
            count += 1;
        }
        i = j;
    }
    count
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn tail_contains(bytes: &[u8], needle: &[u8], window: usize) -> bool {
    let start = bytes.len().saturating_sub(window);
    find(&bytes[start..], needle).is_some()
}

/// The end-of-central-directory record sits in the last 64 KiB of a zip.
fn has_zip_directory(path: &Path) -> Result<bool> {
    const EOCD: &[u8] = b"PK\x05\x06";
    const MAX_TAIL: u64 = 65_536 + 22;

    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(MAX_TAIL);
    file.seek(SeekFrom::Start(start))?;
    let mut tail = Vec::new();
    file.read_to_end(&mut tail)?;
    Ok(find(&tail, EOCD).is_some())
}
