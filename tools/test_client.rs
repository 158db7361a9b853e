//! Test Client
//!
//! Generates synthetic images and drives the classifier's upload and predict
//! endpoints end to end.

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};
use rand::Rng;
use std::io::Cursor;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Synthetic image generator for testing
struct ImageGenerator {
    rng: rand::rngs::ThreadRng,
    image_counter: u64,
}

impl ImageGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            image_counter: 0,
        }
    }

    /// Random RGB noise at a random size
    fn generate_noise(&mut self) -> (String, RgbImage) {
        self.image_counter += 1;
        let width = self.rng.gen_range(64..640);
        let height = self.rng.gen_range(64..480);
        let mut image = ImageBuffer::new(width, height);
        for pixel in image.pixels_mut() {
            *pixel = Rgb([self.rng.gen(), self.rng.gen(), self.rng.gen()]);
        }
        (format!("noise_{:06}.png", self.image_counter), image)
    }

    /// Skin-toned background with a darker blob in the middle
    fn generate_blob(&mut self) -> (String, RgbImage) {
        self.image_counter += 1;
        let size = self.rng.gen_range(200..400u32);
        let skin = Rgb([
            self.rng.gen_range(180..240),
            self.rng.gen_range(130..190),
            self.rng.gen_range(100..160),
        ]);
        let lesion = Rgb([
            self.rng.gen_range(40..120),
            self.rng.gen_range(20..80),
            self.rng.gen_range(10..60),
        ]);
        let radius = self.rng.gen_range(size / 8..size / 3) as i64;
        let centre = (size / 2) as i64;

        let image = ImageBuffer::from_fn(size, size, |x, y| {
            let dx = x as i64 - centre;
            let dy = y as i64 - centre;
            if dx * dx + dy * dy <= radius * radius {
                lesion
            } else {
                skin
            }
        });
        (format!("blob_{:06}.png", self.image_counter), image)
    }
}

fn encode_png(image: RgbImage) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Pull the value of the hidden `image_path` input out of the rendered page
fn extract_image_path(html: &str) -> Option<String> {
    let marker = r#"name="image_path" value=""#;
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')? + start;
    Some(html[start..end].to_string())
}

/// Pull the predicted label out of the rendered page
fn extract_label(html: &str) -> Option<String> {
    let marker = r#"<p class="label">"#;
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find("</p>")? + start;
    Some(html[start..end].to_string())
}

async fn classify(
    client: &reqwest::Client,
    base_url: &str,
    name: String,
    png: Vec<u8>,
) -> anyhow::Result<String> {
    let part = reqwest::multipart::Part::bytes(png)
        .file_name(name)
        .mime_str("image/png")?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let upload = client
        .post(format!("{}/upload-image", base_url))
        .multipart(form)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let image_path = extract_image_path(&upload)
        .ok_or_else(|| anyhow::anyhow!("upload response has no image path"))?;

    let result = client
        .post(format!("{}/predict", base_url))
        .form(&[("image_path", image_path.as_str())])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    extract_label(&result).ok_or_else(|| anyhow::anyhow!("predict response has no label"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .map(|s| s.trim_end_matches('/'))
        .unwrap_or("http://localhost:8000");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
    let noise_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.3);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(200);

    info!(
        base_url = %base_url,
        count = count,
        noise_rate = noise_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::new();
    let mut generator = ImageGenerator::new();
    let mut rng = rand::thread_rng();

    let mut succeeded = 0;
    let mut failed = 0;
    let started = Instant::now();

    for i in 0..count {
        let (name, image) = if rng.gen_bool(noise_rate) {
            generator.generate_noise()
        } else {
            generator.generate_blob()
        };
        let png = encode_png(image)?;

        let request_start = Instant::now();
        match classify(&client, base_url, name.clone(), png).await {
            Ok(label) => {
                succeeded += 1;
                info!(
                    image = %name,
                    label = %label,
                    latency_ms = request_start.elapsed().as_millis() as u64,
                    "Classified"
                );
            }
            Err(e) => {
                failed += 1;
                warn!(image = %name, error = %e, "Request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!("Sent {}/{} images ({} ok, {} failed)", i + 1, count, succeeded, failed);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! {} images in {:.1}s ({} ok, {} failed)",
        count,
        started.elapsed().as_secs_f64(),
        succeeded,
        failed
    );

    Ok(())
}
