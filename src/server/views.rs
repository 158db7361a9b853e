//! HTML rendering for the web front end

use crate::types::prediction::Prediction;
use crate::types::taxonomy::LesionClass;
use axum::http::StatusCode;
use std::fmt::Write;

/// What the main page shows besides the upload form
#[derive(Debug, Default)]
pub struct MainView<'a> {
    /// Served path of the uploaded image, if any
    pub image_path: Option<&'a str>,
    /// Result for that image, if it was classified
    pub prediction: Option<&'a Prediction>,
}

/// Static facts shown on the model info page
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub repo_id: String,
    pub backbone_file: String,
    pub head_file: String,
    pub temperature: f32,
    pub input_size: u32,
}

/// Escape text for inclusion in HTML body or attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title}</title>
  <link rel="stylesheet" href="/static/style.css">
</head>
<body>
  <nav><a href="/">Classifier</a> | <a href="/model-info">Model info</a></nav>
  <main>
{body}
  </main>
  <footer>Research tool only. Not a medical diagnosis.</footer>
</body>
</html>
"#,
        title = escape_html(title),
        body = body
    )
}

/// Upload form, uploaded image, and prediction (when present)
pub fn main_page(view: &MainView<'_>) -> String {
    let mut body = String::new();

    body.push_str(
        r#"    <h1>Skin Lesion Classifier</h1>
    <form action="/upload-image" method="post" enctype="multipart/form-data">
      <input type="file" name="file" accept="image/*" required>
      <button type="submit">Upload</button>
    </form>
"#,
    );

    if let Some(path) = view.image_path {
        let path = escape_html(path);
        let _ = write!(
            body,
            r#"    <section class="upload">
      <img src="{path}" alt="Uploaded lesion" width="224">
      <form action="/predict" method="post">
        <input type="hidden" name="image_path" value="{path}">
        <button type="submit">Classify</button>
      </form>
    </section>
"#
        );
    }

    if let Some(prediction) = view.prediction {
        let _ = write!(
            body,
            r#"    <section class="result">
      <h2>Prediction</h2>
      <p class="label">{label}</p>
      <p class="confidence">Confidence: {confidence}</p>
      <table>
        <tr><th>Class</th><th>Confidence</th></tr>
"#,
            label = escape_html(prediction.label()),
            confidence = prediction.confidence_percent()
        );
        for entry in &prediction.distribution {
            let _ = writeln!(
                body,
                "        <tr><td>{}</td><td>{:.4}</td></tr>",
                escape_html(&entry.label),
                entry.confidence
            );
        }
        body.push_str("      </table>\n    </section>\n");
    }

    layout("Skin Lesion Classifier", &body)
}

/// Model description page
pub fn model_info_page(info: &ModelInfo) -> String {
    let mut body = String::new();

    let _ = write!(
        body,
        r#"    <h1>About the model</h1>
    <p>An EfficientNetV2-S convolutional network fine-tuned to recognise seven
    categories of dermatoscopic skin lesions.</p>
    <dl>
      <dt>Registry repository</dt><dd>{repo}</dd>
      <dt>Feature extractor</dt><dd>{backbone}</dd>
      <dt>Classifier head</dt><dd>{head}</dd>
      <dt>Input</dt><dd>{size}&times;{size} RGB, scaled to [-1, 1]</dd>
      <dt>Calibration</dt><dd>temperature scaling, T = {temperature:.2}</dd>
    </dl>
    <p>Confidence values are calibrated: the logits of the final layer are
    divided by T before softmax so that reported probabilities track observed
    accuracy more closely.</p>
    <h2>Classes</h2>
    <table>
      <tr><th>Code</th><th>Name</th></tr>
"#,
        repo = escape_html(&info.repo_id),
        backbone = escape_html(&info.backbone_file),
        head = escape_html(&info.head_file),
        size = info.input_size,
        temperature = info.temperature
    );
    for class in LesionClass::ALL {
        let _ = writeln!(
            body,
            "      <tr><td>{}</td><td>{}</td></tr>",
            class.code(),
            escape_html(class.display_name())
        );
    }
    body.push_str("    </table>\n");

    layout("Model info", &body)
}

/// Generic error page
pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(
        "    <h1>{} {}</h1>\n    <p>{}</p>\n    <p><a href=\"/\">Back</a></p>\n",
        status.as_u16(),
        escape_html(status.canonical_reason().unwrap_or("Error")),
        escape_html(message)
    );
    layout("Error", &body)
}
