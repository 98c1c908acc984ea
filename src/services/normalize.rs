use std::path::{Path, PathBuf};

use image::ImageFormat;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tokio::io::AsyncReadExt;
use tracing::{debug, error};

use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Leading bytes of every well-formed PDF.
const PDF_SIGNATURE: &[u8] = b"%PDF";

/// Classification of one staged file, decided once before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Content carries the `%PDF` signature, whatever the name says.
    RealPdf,
    Png,
    Jpeg,
    Doc,
    Docx,
    Unsupported,
}

/// Classify a file from its leading bytes, filename, and declared MIME
/// type. The content signature is authoritative for PDFs because uploads
/// can be mislabeled; everything else goes by extension or declared MIME,
/// with sniffed content type as a fallback when the client declared none.
pub fn classify(header: &[u8], filename: &str, content_type: Option<&str>) -> DocumentKind {
    if header.starts_with(PDF_SIGNATURE) {
        return DocumentKind::RealPdf;
    }

    let extension = file_extension(filename);
    let declared = match content_type {
        Some(mime) => mime.to_ascii_lowercase(),
        None => infer::get(header)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_default(),
    };

    if extension == "png" || declared == "image/png" {
        DocumentKind::Png
    } else if extension == "jpg" || extension == "jpeg" || declared == "image/jpeg" {
        DocumentKind::Jpeg
    } else if extension == "doc" || declared.contains("msword") {
        DocumentKind::Doc
    } else if extension == "docx" || declared.contains("wordprocessingml") {
        DocumentKind::Docx
    } else {
        DocumentKind::Unsupported
    }
}

/// Converts one staged file into a single-file PDF equivalent.
pub struct FormatNormalizer {
    config: PipelineConfig,
}

impl FormatNormalizer {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Produce a path to a PDF with the same page content as `input`.
    ///
    /// Real PDFs are returned unchanged. Everything else is written to a
    /// fresh file under `out_dir`, keyed by `index` so two inputs sharing
    /// a basename can never collide.
    pub async fn normalize(
        &self,
        input: &Path,
        content_type: Option<&str>,
        index: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let header = read_header(input).await?;
        let filename = input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let kind = classify(&header, filename, content_type);
        debug!(file = %input.display(), ?kind, "classified upload");

        match kind {
            DocumentKind::RealPdf => Ok(input.to_path_buf()),
            DocumentKind::Png | DocumentKind::Jpeg => {
                let bytes = tokio::fs::read(input).await?;
                let pdf = image_to_pdf(&bytes, kind, input)?;
                let target = out_dir.join(format!("{index:03}.pdf"));
                tokio::fs::write(&target, pdf).await?;
                Ok(target)
            }
            DocumentKind::Doc | DocumentKind::Docx => {
                self.convert_office_document(input, index, out_dir).await
            }
            DocumentKind::Unsupported => Err(PipelineError::UnsupportedFormat {
                path: input.display().to_string(),
                extension: file_extension(filename),
            }),
        }
    }

    /// Convert a DOC/DOCX through headless LibreOffice.
    ///
    /// LibreOffice names its output after the input's stem inside the
    /// requested outdir, so each conversion gets its own subdirectory and
    /// the result is renamed to the index-keyed target afterwards.
    async fn convert_office_document(
        &self,
        input: &Path,
        index: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let conversion_err = |detail: String| PipelineError::Conversion {
            path: input.display().to_string(),
            detail,
        };

        let conv_dir = out_dir.join(format!("convert-{index:03}"));
        tokio::fs::create_dir_all(&conv_dir).await?;

        let mut command = tokio::process::Command::new(&self.config.soffice_bin);
        command
            .arg("--headless")
            .arg("--norestore")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(&conv_dir)
            .arg(input);

        let output = tokio::time::timeout(self.config.convert_timeout, command.output())
            .await
            .map_err(|_| {
                conversion_err(format!(
                    "timed out after {}s",
                    self.config.convert_timeout.as_secs()
                ))
            })?
            .map_err(|e| conversion_err(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("document conversion failed: {}", stderr.trim());
            return Err(conversion_err(stderr.trim().to_string()));
        }

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let produced = conv_dir.join(format!("{stem}.pdf"));
        if !tokio::fs::try_exists(&produced).await? {
            return Err(conversion_err(
                "converter reported success but produced no output".to_string(),
            ));
        }

        let target = out_dir.join(format!("{index:03}.pdf"));
        tokio::fs::rename(&produced, &target).await?;
        Ok(target)
    }
}

/// Build a single-page PDF sized exactly to the image's pixel dimensions
/// (one pixel per point), with the image drawn filling the page.
///
/// JPEG bytes are embedded losslessly through `DCTDecode`; PNG pixels are
/// embedded raw and picked up by document-level Flate compression.
fn image_to_pdf(bytes: &[u8], kind: DocumentKind, path: &Path) -> Result<Vec<u8>, PipelineError> {
    let format = match kind {
        DocumentKind::Png => ImageFormat::Png,
        DocumentKind::Jpeg => ImageFormat::Jpeg,
        _ => unreachable!("image_to_pdf only handles image kinds"),
    };

    let img = image::load_from_memory_with_format(bytes, format).map_err(|source| {
        PipelineError::Decode {
            path: path.display().to_string(),
            source,
        }
    })?;
    let (width, height) = (i64::from(img.width()), i64::from(img.height()));

    let mut doc = Document::with_version("1.5");

    let grayscale = matches!(
        img.color(),
        image::ColorType::L8 | image::ColorType::L16 | image::ColorType::La8
    );

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "BitsPerComponent" => 8,
    };

    let image_stream = match kind {
        DocumentKind::Jpeg => {
            image_dict.set(
                "ColorSpace",
                Object::Name(if grayscale { b"DeviceGray".to_vec() } else { b"DeviceRGB".to_vec() }),
            );
            image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
            Stream::new(image_dict, bytes.to_vec()).with_compression(false)
        }
        _ => {
            image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
            Stream::new(image_dict, img.to_rgb8().into_raw())
        }
    };
    let image_id = doc.add_object(image_stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content.encode().map_err(std::io::Error::other)?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(std::io::Error::other)?;
    Ok(out)
}

async fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buffer = [0u8; 512];
    let n = file.read(&mut buffer).await?;
    Ok(buffer[..n].to_vec())
}

fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
