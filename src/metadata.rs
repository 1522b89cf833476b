//! Metadata embedding for downloaded photos
//!
//! After a JPEG is fetched, its title, description, tags and author can be
//! attached to it. Embedding is best effort: a failure is logged by the job
//! runner and the photo is kept.

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Descriptive metadata of one photo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoMetadata {
    /// Photo title
    pub title: String,
    /// Photo description
    pub description: String,
    /// Keywords
    pub tags: Vec<String>,
    /// Owner display name
    pub author: String,
}

/// Trait for metadata embedders
#[async_trait]
pub trait MetadataEmbedder: Send + Sync {
    /// Attach `metadata` to the image at `path`
    ///
    /// Returns the path of any extra file written next to the image (e.g. a
    /// sidecar), which is then packaged together with the photo.
    async fn embed(&self, path: &Path, metadata: &PhotoMetadata) -> Result<Option<PathBuf>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Embedder that leaves files untouched
pub struct NoOpEmbedder;

#[async_trait]
impl MetadataEmbedder for NoOpEmbedder {
    async fn embed(&self, _path: &Path, _metadata: &PhotoMetadata) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Embedder writing an XMP sidecar (`photo.jpg.xmp`) next to each image
///
/// The sidecar carries `dc:title`, `dc:description`, `dc:subject` and
/// `dc:creator`, which photo managers pick up on import.
pub struct XmpSidecarEmbedder;

impl XmpSidecarEmbedder {
    /// Path of the sidecar for `image`
    pub fn sidecar_path(image: &Path) -> PathBuf {
        let mut name = image.as_os_str().to_os_string();
        name.push(".xmp");
        PathBuf::from(name)
    }

    fn render(metadata: &PhotoMetadata) -> String {
        let lang_alt = |value: &str| {
            format!(
                "<rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt>",
                escape_xml(value)
            )
        };

        let mut fields = String::new();
        if !metadata.title.is_empty() {
            fields.push_str(&format!("   <dc:title>{}</dc:title>\n", lang_alt(&metadata.title)));
        }
        if !metadata.description.is_empty() {
            fields.push_str(&format!(
                "   <dc:description>{}</dc:description>\n",
                lang_alt(&metadata.description)
            ));
        }
        if !metadata.tags.is_empty() {
            let items: String = metadata
                .tags
                .iter()
                .map(|tag| format!("<rdf:li>{}</rdf:li>", escape_xml(tag)))
                .collect();
            fields.push_str(&format!("   <dc:subject><rdf:Bag>{items}</rdf:Bag></dc:subject>\n"));
        }
        if !metadata.author.is_empty() {
            fields.push_str(&format!(
                "   <dc:creator><rdf:Seq><rdf:li>{}</rdf:li></rdf:Seq></dc:creator>\n",
                escape_xml(&metadata.author)
            ));
        }

        format!(
            "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n\
             <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n\
             <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n\
             \x20<rdf:Description rdf:about=\"\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n\
             {fields}\
             \x20</rdf:Description>\n\
             </rdf:RDF>\n\
             </x:xmpmeta>\n\
             <?xpacket end=\"w\"?>\n"
        )
    }
}

#[async_trait]
impl MetadataEmbedder for XmpSidecarEmbedder {
    async fn embed(&self, path: &Path, metadata: &PhotoMetadata) -> Result<Option<PathBuf>> {
        let sidecar = Self::sidecar_path(path);
        tokio::fs::write(&sidecar, Self::render(metadata)).await?;
        Ok(Some(sidecar))
    }

    fn name(&self) -> &'static str {
        "xmp-sidecar"
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            // XML 1.0 forbids most control characters outright
            c if c.is_control() && !matches!(c, '\n' | '\t' | '\r') => {}
            c => escaped.push(c),
        }
    }
    escaped
}
